use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::types::{Antialiasing, EffectParams};

use super::context::GpuContext;
use super::pipeline::{create_uniform_layout, EffectPipeline, QUAD_VERTEX_COUNT};
use super::uniforms::LightningUniforms;

/// Offscreen MSAA colour target, recreated on resize.
struct MultisampleTarget {
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }
}

/// Aggregated GPU state: context, pipeline, and the uniform buffer.
///
/// Construction performs the whole init sequence from the top: context,
/// shader compilation, pipeline link, quad setup, uniform handles. Any
/// failure along the way aborts setup with the diagnostic attached; a
/// half-initialised state is never returned.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: EffectPipeline,
    uniforms: LightningUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_layout: wgpu::BindGroupLayout,
    multisample_target: Option<MultisampleTarget>,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        size: PhysicalSize<u32>,
        antialiasing: Antialiasing,
        params: &EffectParams,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size, antialiasing)?;
        let uniform_layout = create_uniform_layout(&context.device);
        let pipeline = EffectPipeline::new(
            &context.device,
            &uniform_layout,
            context.surface_format,
            context.sample_count,
        )?;

        let uniforms = LightningUniforms::new(context.size.width, context.size.height, params);
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lightning uniforms"),
            size: std::mem::size_of::<LightningUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lightning uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let multisample_target = (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        });

        debug!(
            width = context.size.width,
            height = context.size.height,
            samples = context.sample_count,
            format = ?context.surface_format,
            "lightning renderer initialised"
        );

        Ok(Self {
            context,
            pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            uniform_layout,
            multisample_target,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.multisample_target = (self.context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &self.context.device,
                self.context.surface_format,
                self.context.size,
                self.context.sample_count,
            )
        });
        self.uniforms
            .set_resolution(self.context.size.width as f32, self.context.size.height as f32);
    }

    /// Renders one frame to the swapchain.
    pub(crate) fn render(
        &mut self,
        time_seconds: f32,
        intensity: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        self.uniforms.set_frame(time_seconds, intensity);

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        self.encode_pass(&mut encoder, &view);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Renders one frame at the given timestamp into an offscreen texture and
    /// writes it to `path` as PNG.
    pub(crate) fn render_export(
        &mut self,
        time_seconds: f32,
        intensity: f32,
        path: &Path,
    ) -> Result<PathBuf> {
        let width = self.context.size.width;
        let height = self.context.size.height;
        let format = wgpu::TextureFormat::Rgba8Unorm;

        // Export renders single-sampled into its own target; the swapchain
        // format may not be copyable, RGBA8 always is.
        let export_pipeline =
            EffectPipeline::new(&self.context.device, &self.uniform_layout, format, 1)?;
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("export target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.uniforms.set_frame(time_seconds, intensity);
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let unpadded_bytes_per_row = width * 4;
        let padded_bytes_per_row = padded_bytes_per_row(unpadded_bytes_per_row);
        let readback = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("export encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("export pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&export_pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }
        encoder.copy_texture_to_buffer(
            texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed to wait for GPU readback: {err:?}"))?;
        rx.recv()
            .context("readback mapping callback dropped")?
            .context("failed to map export readback buffer")?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in 0..height {
                let start = (row * padded_bytes_per_row) as usize;
                pixels.extend_from_slice(&mapped[start..start + unpadded_bytes_per_row as usize]);
            }
        }
        readback.unmap();

        let image = image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("export pixel buffer has unexpected size"))?;
        image
            .save(path)
            .with_context(|| format!("failed to write exported frame to {}", path.display()))?;
        Ok(path.to_path_buf())
    }

    fn encode_pass(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let (attachment_view, resolve_target) = match &self.multisample_target {
            Some(target) => (&target.view, Some(view)),
            None => (view, None),
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lightning pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: attachment_view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.pipeline.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
    }
}

/// Rounds a row length up to wgpu's copy alignment (256 bytes).
fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::padded_bytes_per_row;

    #[test]
    fn row_padding_rounds_up_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
        assert_eq!(padded_bytes_per_row(1280 * 4), 5120);
        assert_eq!(padded_bytes_per_row(1279 * 4), 5120);
    }
}
