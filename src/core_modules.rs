// THEORY:
// The `core_modules` tree holds the engine's leaf layers, ordered
// dependencies-first: dumb data containers (`frame`, `blob`, `params`), the
// binary-mask operations (`mask`), and the detector that composes them
// (`blob_detector`). Nothing in this tree owns a thread or a lock; all
// concurrency lives one level up in `pipeline`.

pub mod blob;
pub mod blob_detector;
pub mod frame;
pub mod mask;
pub mod params;
