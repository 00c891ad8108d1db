use storm::BurstTuning;

use crate::runtime::RenderPolicy;

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl Default for Antialiasing {
    fn default() -> Self {
        Self::Auto
    }
}

/// Visual parameters pushed to the lightning shader as uniforms.
///
/// These stay constant for the lifetime of a run; only time and burst
/// intensity vary per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// Hue angle in degrees; the default is a stormy blue.
    pub hue_degrees: f32,
    /// Multiplier on how fast the noise field scrolls.
    pub speed: f32,
    /// Scale of the noise field, controlling bolt thickness and wander.
    pub noise_scale: f32,
    /// Horizontal offset of the bolt centre line in normalized units.
    pub x_offset: f32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            hue_degrees: 230.0,
            speed: 0.6,
            noise_scale: 1.8,
            x_offset: 0.0,
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or surface size in physical pixels.
    pub surface_size: (u32, u32),
    /// Title of the preview window.
    pub window_title: String,
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    /// Shader uniform constants.
    pub params: EffectParams,
    /// Burst timing bounds for the storm state machine.
    pub tuning: BurstTuning,
    /// Burst RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// High-level render behaviour requested by the caller.
    pub policy: RenderPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            window_title: "boltshade".to_string(),
            antialiasing: Antialiasing::default(),
            params: EffectParams::default(),
            tuning: BurstTuning::default(),
            seed: None,
            policy: RenderPolicy::default(),
        }
    }
}
