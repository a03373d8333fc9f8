//! WGSL sources for the four pipelines: shadow depth pre-pass, main lit
//! pass, procedural sky, and the depth-map debug blit.
//!
//! The uniform struct layouts here mirror the `#[repr(C)]` structs in
//! `render::mod`; wgpu validates the two against each other when the
//! pipelines are created, so a mismatch is a fatal startup error rather
//! than a silently ignored uniform.

pub(crate) const SCENE_SHADER: &str = r#"
struct PointLight {
    position: vec4<f32>,
    color: vec4<f32>,
    // x = constant, y = linear, z = quadratic
    attenuation: vec4<f32>,
}

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    light_space: mat4x4<f32>,
    camera_position: vec4<f32>,
    // xyz = direction toward the sun, w = intensity
    sun_direction: vec4<f32>,
    // xyz = sun color, w = active point light count
    sun_color: vec4<f32>,
    point_lights: array<PointLight, 4>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;
@group(0) @binding(1)
var shadow_map: texture_depth_2d;
@group(0) @binding(2)
var shadow_sampler: sampler_comparison;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) light_space_pos: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;
    out.light_space_pos = globals.light_space * world_position;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;
    out.normal = normalize(world_normal);
    return out;
}

fn shadow_factor(light_space_pos: vec4<f32>) -> f32 {
    let projected = light_space_pos.xyz / light_space_pos.w;
    // Fragments beyond the light's far plane are never occluded.
    if (projected.z > 1.0) {
        return 1.0;
    }
    let uv = projected.xy * vec2<f32>(0.5, -0.5) + vec2<f32>(0.5, 0.5);
    return textureSampleCompare(shadow_map, shadow_sampler, uv, projected.z - 0.002);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let sun_dir = normalize(globals.sun_direction.xyz);
    let intensity = globals.sun_direction.w;

    let ambient = 0.15;
    let sun_diffuse = max(dot(normal, sun_dir), 0.0) * intensity;
    let lit = shadow_factor(input.light_space_pos);
    var color = (ambient + sun_diffuse * lit) * globals.sun_color.xyz;

    let light_count = u32(globals.sun_color.w);
    for (var i = 0u; i < light_count; i = i + 1u) {
        let light = globals.point_lights[i];
        let to_light = light.position.xyz - input.world_pos;
        let distance = length(to_light);
        let diffuse = max(dot(normal, to_light / distance), 0.0);
        let attenuation = 1.0 / (light.attenuation.x
            + light.attenuation.y * distance
            + light.attenuation.z * distance * distance);
        color = color + diffuse * attenuation * light.color.xyz;
    }

    return vec4<f32>(color * object.color.rgb, object.color.a);
}
"#;

pub(crate) const SHADOW_SHADER: &str = r#"
struct PointLight {
    position: vec4<f32>,
    color: vec4<f32>,
    attenuation: vec4<f32>,
}

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    light_space: mat4x4<f32>,
    camera_position: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    point_lights: array<PointLight, 4>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;
@group(1) @binding(0)
var<uniform> object: ObjectConstants;

// Depth-only: positions and the light-space transform, nothing else.
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return globals.light_space * object.model * vec4<f32>(position, 1.0);
}
"#;

pub(crate) const SKY_SHADER: &str = r#"
struct SkyUniform {
    horizon: vec4<f32>,
    zenith: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> sky: SkyUniform;

struct SkyOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) height: f32,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> SkyOutput {
    // One oversized triangle covering the viewport.
    let x = f32(i32(index) / 2) * 4.0 - 1.0;
    let y = f32(i32(index) % 2) * 4.0 - 1.0;
    var out: SkyOutput;
    out.position = vec4<f32>(x, y, 1.0, 1.0);
    out.height = y * 0.5 + 0.5;
    return out;
}

@fragment
fn fs_main(input: SkyOutput) -> @location(0) vec4<f32> {
    let color = mix(sky.horizon.xyz, sky.zenith.xyz, clamp(input.height, 0.0, 1.0));
    return vec4<f32>(color, 1.0);
}
"#;

pub(crate) const DEPTH_DEBUG_SHADER: &str = r#"
@group(0) @binding(0)
var depth_map: texture_depth_2d;
@group(0) @binding(1)
var depth_sampler: sampler;

struct BlitOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> BlitOutput {
    let x = f32(i32(index) / 2) * 4.0 - 1.0;
    let y = f32(i32(index) % 2) * 4.0 - 1.0;
    var out: BlitOutput;
    out.position = vec4<f32>(x, y, 0.0, 1.0);
    out.uv = vec2<f32>(x, -y) * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}

@fragment
fn fs_main(input: BlitOutput) -> @location(0) vec4<f32> {
    let depth = textureSample(depth_map, depth_sampler, input.uv);
    return vec4<f32>(depth, depth, depth, 1.0);
}
"#;
