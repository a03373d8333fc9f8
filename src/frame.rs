use glam::{Mat3, Mat4, Vec3};

use crate::lighting::{PointLight, SkyPhase};
use crate::scene::{MeshSource, SceneState};
use crate::shadow;

/// Vertical field of view of the display camera, in degrees.
pub const FOV_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 1000.0;

/// Edge length of the cube marking the sun position.
const SUN_MARKER_SCALE: f32 = 0.3;
/// Edge length of the cubes marking point lights.
const POINT_MARKER_SCALE: f32 = 0.2;

/// One draw call's worth of state: which mesh, where, and how to shade it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub mesh: MeshSource,
    pub model: Mat4,
    /// Inverse-transpose of the upper 3x3 of view * model, rebuilt from
    /// this frame's matrices so it can never go stale against them.
    pub normal: Mat3,
    pub color: Vec3,
    pub casts_shadow: bool,
}

/// Everything the renderer needs for one frame, assembled in one place.
///
/// `light_space` is the single light-space transform: the depth pass
/// populates the shadow map through it and the main pass projects
/// fragments with it. Carrying one copy makes divergence unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub light_space: Mat4,
    pub sun_direction: Vec3,
    pub sun_color: Vec3,
    pub sun_intensity: f32,
    /// Point lights with their render-time (possibly night-boosted) colors.
    pub point_lights: Vec<PointLight>,
    pub draws: Vec<DrawItem>,
    pub phase: SkyPhase,
    pub show_depth_map: bool,
}

fn normal_matrix(view: Mat4, model: Mat4) -> Mat3 {
    Mat3::from_mat4(view * model).inverse().transpose()
}

/// Assembles the per-frame packet from the current scene state. Pure:
/// same state and aspect always produce the same packet.
pub fn assemble_frame(state: &SceneState, aspect: f32) -> FramePacket {
    let view = state.camera.view_matrix();
    let projection =
        Mat4::perspective_rh(FOV_DEGREES.to_radians(), aspect.max(0.01), NEAR_PLANE, FAR_PLANE);
    let time = state.cycle.time_of_day();
    let phase = state.cycle.phase();

    let mut draws = Vec::with_capacity(state.objects.len() + state.point_lights.len() + 1);
    for object in &state.objects {
        let model = object.model_matrix(state.orbit_degrees());
        draws.push(DrawItem {
            mesh: object.mesh.clone(),
            model,
            normal: normal_matrix(view, model),
            color: object.color,
            casts_shadow: object.casts_shadow,
        });
    }

    // Indicator cubes: one at the sun's implied position, one per point
    // light. Markers never cast shadows.
    let sun_marker = Mat4::from_translation(state.cycle.sun_arc_position())
        * Mat4::from_scale(Vec3::splat(SUN_MARKER_SCALE));
    draws.push(DrawItem {
        mesh: MeshSource::BuiltinCube,
        model: sun_marker,
        normal: normal_matrix(view, sun_marker),
        color: state.cycle.sun_color(),
        casts_shadow: false,
    });
    for light in &state.point_lights {
        let model = Mat4::from_translation(light.position)
            * Mat4::from_scale(Vec3::splat(POINT_MARKER_SCALE));
        draws.push(DrawItem {
            mesh: MeshSource::BuiltinCube,
            model,
            normal: normal_matrix(view, model),
            color: light.effective_color(phase),
            casts_shadow: false,
        });
    }

    let point_lights = state
        .point_lights
        .iter()
        .map(|light| PointLight {
            color: light.effective_color(phase),
            ..*light
        })
        .collect();

    FramePacket {
        view,
        projection,
        camera_position: state.camera.position(),
        light_space: shadow::light_space_transform(time),
        sun_direction: state.cycle.sun_direction(),
        sun_color: state.cycle.sun_color(),
        sun_intensity: state.cycle.sun_intensity(),
        point_lights,
        draws,
        phase,
        show_depth_map: state.show_depth_map(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Action;
    use crate::lighting::POINT_LIGHT_NIGHT_BOOST;

    fn mat4_bits(m: Mat4) -> [u32; 16] {
        m.to_cols_array().map(f32::to_bits)
    }

    #[test]
    fn both_passes_receive_the_identical_light_space_transform() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 16.0 / 9.0);
        // The packet carries one matrix; it must be the one the shadow
        // module derives for the same clock value, bit for bit.
        let expected = shadow::light_space_transform(state.cycle.time_of_day());
        assert_eq!(mat4_bits(packet.light_space), mat4_bits(expected));
    }

    #[test]
    fn assembly_is_deterministic() {
        let state = SceneState::new();
        let a = assemble_frame(&state, 1.5);
        let b = assemble_frame(&state, 1.5);
        assert_eq!(a, b);
    }

    #[test]
    fn view_matrix_comes_from_the_camera() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 1.0);
        assert_eq!(mat4_bits(packet.view), mat4_bits(state.camera.view_matrix()));
    }

    #[test]
    fn normal_matrices_track_the_model_they_were_derived_from() {
        let mut state = SceneState::new();
        let before = assemble_frame(&state, 1.0);
        for _ in 0..45 {
            state.apply(Action::OrbitRight);
        }
        let after = assemble_frame(&state, 1.0);
        // The motorcycle orbited, so both its model and normal matrices move.
        assert_ne!(after.draws[0].model, before.draws[0].model);
        assert_ne!(after.draws[0].normal, before.draws[0].normal);
        // And the normal matrix is exactly the inverse-transpose of this
        // frame's view * model, not a cached one.
        let expected = Mat3::from_mat4(after.view * after.draws[0].model)
            .inverse()
            .transpose();
        assert_eq!(after.draws[0].normal, expected);
    }

    #[test]
    fn markers_follow_the_lights_and_never_cast_shadows() {
        let state = SceneState::new();
        let packet = assemble_frame(&state, 1.0);
        let object_count = state.objects.len();
        let marker_count = 1 + state.point_lights.len();
        assert_eq!(packet.draws.len(), object_count + marker_count);
        for marker in &packet.draws[object_count..] {
            assert_eq!(marker.mesh, MeshSource::BuiltinCube);
            assert!(!marker.casts_shadow);
        }
        // The sun marker sits at the sun's implied position.
        let sun_marker = &packet.draws[object_count];
        let translation = sun_marker.model.w_axis.truncate();
        assert!((translation - state.cycle.sun_arc_position()).length() < 1e-6);
    }

    #[test]
    fn point_light_colors_are_boosted_after_dark() {
        let mut state = SceneState::new();
        state.apply(Action::ToggleDayNight);
        assert_eq!(state.cycle.phase(), SkyPhase::Night);
        let packet = assemble_frame(&state, 1.0);
        for (packed, base) in packet.point_lights.iter().zip(&state.point_lights) {
            assert_eq!(packed.color, base.color * POINT_LIGHT_NIGHT_BOOST);
            // Base colors stay untouched.
            assert_eq!(packed.position, base.position);
        }
    }
}
