mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
