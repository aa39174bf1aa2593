// THEORY:
// This file is the main entry point for the `beacon_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the
// public API exposed to external consumers (a capture loop, an overlay
// renderer, a parameter UI).
//
// The primary surface is the `FramePipeline` in the `pipeline` module, which
// owns the detection worker and the producer/consumer handoff. The
// `core_modules` tree stays public for consumers that want to run the
// detector synchronously (tests, offline analysis) without the pipeline.

pub mod core_modules;
pub mod pipeline;
