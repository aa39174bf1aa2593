// Example runner for the `beacon_vision` library: synthesizes a short
// stream of frames with a moving bright square and drives it through the
// `FramePipeline` the way a capture loop would. The main library entry
// point is `src/lib.rs`.

use beacon_vision::pipeline::{FramePipeline, PipelineConfig};
use image::GrayImage;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// One synthetic 64x64 frame with a 4x4 bright square at the given offset.
fn synthetic_frame(offset: u32) -> GrayImage {
    let mut frame = GrayImage::new(64, 64);
    for y in offset..offset + 4 {
        for x in offset..offset + 4 {
            frame.put_pixel(x, y, image::Luma([255]));
        }
    }
    frame
}

fn main() {
    init_logging();

    let config = PipelineConfig {
        threshold: 128,
        min_area: 4,
        max_area: 64,
        reserved_capacity: 16,
    };
    info!(?config, "starting frame pipeline");
    let mut pipeline = FramePipeline::new(config);

    // Drive 30 frames at roughly camera cadence, reading results back at
    // the producer's own pace.
    for step in 0..30 {
        let frame = synthetic_frame(step);
        pipeline.submit(&(&frame).into());
        std::thread::sleep(Duration::from_millis(33));

        for blob in pipeline.latest_blobs() {
            info!(step, x = blob.x, y = blob.y, area = blob.area, "blob");
        }
    }

    pipeline.shutdown();
    info!(
        failed_passes = pipeline.failed_passes(),
        "pipeline stopped"
    );
}
