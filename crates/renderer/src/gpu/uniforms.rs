use bytemuck::{Pod, Zeroable};

use crate::types::EffectParams;

/// CPU mirror of the shader's `Params` uniform block.
///
/// Field order and alignment follow std140: the leading vec2 sits at offset 0
/// with 8-byte alignment and the six scalars pack behind it, so the struct is
/// 32 bytes with no interior padding.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct LightningUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub hue: f32,
    pub x_offset: f32,
    pub speed: f32,
    pub intensity: f32,
    pub size: f32,
}

unsafe impl Zeroable for LightningUniforms {}
unsafe impl Pod for LightningUniforms {}

impl LightningUniforms {
    pub fn new(width: u32, height: u32, params: &EffectParams) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            time: 0.0,
            hue: params.hue_degrees,
            x_offset: params.x_offset,
            speed: params.speed,
            intensity: 0.0,
            size: params.noise_scale,
        }
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.resolution = [width, height];
    }

    pub fn set_frame(&mut self, time_seconds: f32, intensity: f32) {
        self.time = time_seconds;
        self.intensity = intensity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(std::mem::size_of::<LightningUniforms>(), 32);
        assert_eq!(std::mem::align_of::<LightningUniforms>(), 16);
    }

    #[test]
    fn new_frame_starts_dark() {
        let uniforms = LightningUniforms::new(1920, 1080, &EffectParams::default());
        assert_eq!(uniforms.intensity, 0.0);
        assert_eq!(uniforms.resolution, [1920.0, 1080.0]);
    }

    #[test]
    fn scalars_land_after_resolution() {
        let mut uniforms = LightningUniforms::new(4, 2, &EffectParams::default());
        uniforms.set_frame(7.5, 1.2);
        let bytes = bytemuck::bytes_of(&uniforms);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats[0], 4.0);
        assert_eq!(floats[1], 2.0);
        assert_eq!(floats[2], 7.5);
        assert_eq!(floats[6], 1.2);
    }
}
