//! wgpu renderer for the procedural lightning background.
//!
//! The crate splits into untestable-without-a-GPU plumbing (`gpu`, `window`)
//! and pure run-loop policy (`runtime`), with the burst timing itself living
//! in the `storm` crate. `run_windowed` is the single entry point: it opens a
//! window, compiles the embedded shader, and drives the effect until the
//! window closes (or one frame has been exported).

mod compile;
mod gpu;
mod runtime;
mod types;
mod window;

pub use runtime::{
    time_source_for_policy, BoxedTimeSource, FixedTimeSource, FrameScheduler, RenderPolicy,
    SystemTimeSource, TimeSample, TimeSource,
};
pub use types::{Antialiasing, EffectParams, RendererConfig};
pub use window::run_windowed;
