//! Real-time showcase viewer: a motorcycle on a parking lot under a
//! day-night cycle, with directional sunlight, point lights and shadow
//! mapping via a depth pre-pass.
//!
//! The library is split along the seams the frame loop exercises:
//! [`scene::SceneState`] owns all mutable viewer state, [`input`] turns
//! key events into actions, [`frame::assemble_frame`] snapshots the state
//! into an immutable [`frame::FramePacket`], and [`render::Renderer`]
//! turns packets into GPU passes.

pub mod camera;
pub mod frame;
pub mod input;
pub mod lighting;
pub mod obj;
pub mod render;
pub mod scene;
pub mod shadow;

pub use camera::{Camera, MoveDirection};
pub use frame::{assemble_frame, DrawItem, FramePacket};
pub use input::{default_bindings, Action, Binding, InputState, KeyCode, NamedKey, Trigger};
pub use lighting::{DayNightCycle, PointLight, SkyPhase};
pub use obj::{load_mesh_file, parse_obj, unit_cube, AssetError, Mesh, Vertex};
pub use render::Renderer;
pub use scene::{showcase_scene, MeshSource, SceneObject, SceneState};
pub use shadow::{light_space_transform, SHADOW_RESOLUTION};
