use std::borrow::Cow;

use anyhow::Result;
use wgpu::naga::ShaderStage;

/// Compiles the static full-screen quad vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(
        device,
        "fullscreen quad vertex",
        VERTEX_SHADER_GLSL,
        ShaderStage::Vertex,
    )
}

/// Compiles the embedded lightning fragment shader.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_glsl(
        device,
        "lightning fragment",
        LIGHTNING_FRAGMENT_GLSL,
        ShaderStage::Fragment,
    )
}

/// Compiles GLSL through naga, surfacing the compiler diagnostic on failure.
///
/// `create_shader_module` reports validation problems through the device error
/// machinery rather than its return value, so the call is wrapped in an error
/// scope and the scope is drained synchronously.
fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &'static str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        anyhow::bail!("failed to compile {label} shader: {error}");
    }
    Ok(module)
}

/// Full-screen quad as two clip-space triangles; no vertex buffer needed.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[6] = vec2[6](
    vec2(-1.0, -1.0),
    vec2(1.0, -1.0),
    vec2(-1.0, 1.0),
    vec2(-1.0, 1.0),
    vec2(1.0, -1.0),
    vec2(1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Procedural lightning bolt: fractal value noise warps a vertical centre
/// line, an inverse-distance falloff turns it into a glowing filament, and
/// the burst intensity uniform gates the whole thing. The uniform block
/// layout must match `LightningUniforms` in `gpu/uniforms.rs`.
const LIGHTNING_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform Params {
    vec2 uResolution;
    float uTime;
    float uHue;
    float uXOffset;
    float uSpeed;
    float uIntensity;
    float uSize;
};

const int OCTAVES = 5;

float hash11(float p) {
    p = fract(p * 0.1031);
    p *= p + 33.33;
    p *= p + p;
    return fract(p);
}

float hash12(vec2 p) {
    vec3 p3 = fract(vec3(p.xyx) * 0.1031);
    p3 += dot(p3, p3.yzx + 33.33);
    return fract((p3.x + p3.y) * p3.z);
}

mat2 rotate2d(float theta) {
    float c = cos(theta);
    float s = sin(theta);
    return mat2(c, -s, s, c);
}

float valueNoise(vec2 p) {
    vec2 ip = floor(p);
    vec2 fp = fract(p);
    float a = hash12(ip);
    float b = hash12(ip + vec2(1.0, 0.0));
    float c = hash12(ip + vec2(0.0, 1.0));
    float d = hash12(ip + vec2(1.0, 1.0));
    vec2 t = smoothstep(0.0, 1.0, fp);
    return mix(mix(a, b, t.x), mix(c, d, t.x), t.y);
}

float fbm(vec2 p) {
    float value = 0.0;
    float amplitude = 0.5;
    for (int i = 0; i < OCTAVES; ++i) {
        value += amplitude * valueNoise(p);
        p = rotate2d(0.45) * p;
        p *= 2.0;
        amplitude *= 0.5;
    }
    return value;
}

vec3 hsv2rgb(vec3 c) {
    vec4 k = vec4(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    vec3 p = abs(fract(c.xxx + k.xyz) * 6.0 - k.www);
    return c.z * mix(k.xxx, clamp(p - k.xxx, 0.0, 1.0), c.y);
}

void main() {
    vec2 uv = v_uv * 2.0 - 1.0;
    uv.x *= uResolution.x / max(uResolution.y, 1.0);
    uv.x += uXOffset;

    // Warp the centre line with scrolling fbm so the bolt wanders.
    uv.x += 2.0 * fbm(uv * uSize + 0.8 * uTime * uSpeed) - 1.0;

    float dist = abs(uv.x);
    vec3 base = hsv2rgb(vec3(uHue / 360.0, 0.7, 0.8));

    // Per-frame flicker on the core brightness keeps the glow from looking static.
    float core = mix(0.04, 0.07, hash11(uTime));
    vec3 color = base * (core / max(dist, 1e-4)) * uIntensity;

    outColor = vec4(color, 1.0);
}
";
