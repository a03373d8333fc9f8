use glam::{Mat4, Vec3};

use crate::camera::WORLD_UP;
use crate::lighting;

/// Side length of the square depth-only shadow target, in texels.
pub const SHADOW_RESOLUTION: u32 = 2048;

/// Half-extent of the orthographic box the light projects through.
pub const LIGHT_ORTHO_EXTENT: f32 = 10.0;
pub const LIGHT_NEAR: f32 = 0.1;
pub const LIGHT_FAR: f32 = 100.0;

/// Projection-times-view matrix from the shadow-casting light's point of
/// view. The depth pass populates the shadow map through this matrix and
/// the main pass must receive the very same matrix in the same frame; any
/// divergence misregisters every shadow in the scene.
pub fn light_space_transform(time_of_day: f32) -> Mat4 {
    let projection = Mat4::orthographic_rh(
        -LIGHT_ORTHO_EXTENT,
        LIGHT_ORTHO_EXTENT,
        -LIGHT_ORTHO_EXTENT,
        LIGHT_ORTHO_EXTENT,
        LIGHT_NEAR,
        LIGHT_FAR,
    );
    let eye = lighting::sun_arc_position(time_of_day);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, WORLD_UP);
    projection * view
}
