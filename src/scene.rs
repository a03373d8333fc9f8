use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, MoveDirection};
use crate::input::Action;
use crate::lighting::{showcase_point_lights, DayNightCycle, PointLight, SkyPhase};

/// World units moved per frame while a movement key is held.
///
/// Deliberately a fixed per-keypress step, not delta-time scaled: motion
/// speed is coupled to frame rate, as the showcase always was.
pub const CAMERA_SPEED: f32 = 0.1;

/// Degrees added to the orbit angle per frame while an orbit key is held.
pub const ORBIT_STEP_DEGREES: f32 = 1.0;

/// Where an object's geometry comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshSource {
    /// OBJ file resolved against the assets directory.
    File(String),
    /// The built-in unit cube, used for light markers and placeholders.
    BuiltinCube,
}

/// Static description of one object in the showcase scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub mesh: MeshSource,
    pub position: Vec3,
    pub rotation_degrees: Vec3,
    pub scale: Vec3,
    pub color: Vec3,
    pub casts_shadow: bool,
    /// Spins with the orbit angle when the camera is locked on it.
    pub orbits: bool,
}

impl SceneObject {
    /// Model matrix for this object given the current orbit angle.
    pub fn model_matrix(&self, orbit_degrees: f32) -> Mat4 {
        let yaw = if self.orbits {
            self.rotation_degrees.y + orbit_degrees
        } else {
            self.rotation_degrees.y
        };
        let translation = Mat4::from_translation(self.position);
        let rotation = Mat4::from_rotation_z(self.rotation_degrees.z.to_radians())
            * Mat4::from_rotation_y(yaw.to_radians())
            * Mat4::from_rotation_x(self.rotation_degrees.x.to_radians());
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }
}

/// The fixed showcase scene: a motorcycle on a parking lot.
pub fn showcase_scene() -> Vec<SceneObject> {
    vec![
        SceneObject {
            name: "motorcycle".to_string(),
            mesh: MeshSource::File("motorcycle.obj".to_string()),
            position: Vec3::new(0.0, 0.0, 0.0),
            rotation_degrees: Vec3::ZERO,
            scale: Vec3::ONE,
            color: Vec3::new(0.85, 0.1, 0.12),
            casts_shadow: true,
            orbits: true,
        },
        SceneObject {
            name: "parking_lot".to_string(),
            mesh: MeshSource::File("parking_lot.obj".to_string()),
            position: Vec3::new(0.0, -0.05, 0.0),
            rotation_degrees: Vec3::ZERO,
            scale: Vec3::ONE,
            color: Vec3::new(0.45, 0.45, 0.48),
            casts_shadow: true,
            orbits: false,
        },
    ]
}

/// All mutable state of the viewer, owned in one place and mutated only
/// through [`SceneState::apply`] and [`SceneState::advance_frame`].
#[derive(Debug, Clone)]
pub struct SceneState {
    pub camera: Camera,
    pub cycle: DayNightCycle,
    pub point_lights: Vec<PointLight>,
    pub objects: Vec<SceneObject>,
    orbit_degrees: f32,
    camera_locked: bool,
    show_depth_map: bool,
    quit_requested: bool,
}

impl SceneState {
    pub fn new() -> Self {
        Self {
            camera: Camera::new(
                Vec3::new(5.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, -1.0),
                Vec3::new(0.0, 1.0, 0.0),
            ),
            cycle: DayNightCycle::default(),
            point_lights: showcase_point_lights(),
            objects: showcase_scene(),
            orbit_degrees: 0.0,
            camera_locked: true,
            show_depth_map: false,
            quit_requested: false,
        }
    }

    pub fn orbit_degrees(&self) -> f32 {
        self.orbit_degrees
    }

    pub fn camera_locked(&self) -> bool {
        self.camera_locked
    }

    pub fn show_depth_map(&self) -> bool {
        self.show_depth_map
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Applies one input action. Camera movement is gated on the lock
    /// toggle; orbiting the focal object is always available. Returns a
    /// sky phase event when a manual day-night toggle crosses the
    /// boundary.
    pub fn apply(&mut self, action: Action) -> Option<SkyPhase> {
        match action {
            Action::MoveForward => self.move_camera(MoveDirection::Forward),
            Action::MoveBackward => self.move_camera(MoveDirection::Backward),
            Action::StrafeLeft => self.move_camera(MoveDirection::Left),
            Action::StrafeRight => self.move_camera(MoveDirection::Right),
            Action::OrbitLeft => self.orbit_degrees -= ORBIT_STEP_DEGREES,
            Action::OrbitRight => self.orbit_degrees += ORBIT_STEP_DEGREES,
            Action::ToggleCameraLock => self.camera_locked = !self.camera_locked,
            Action::ToggleAutoCycle => self.cycle.toggle_auto_cycle(),
            Action::ToggleDayNight => return self.cycle.toggle_day_night(),
            Action::ToggleDepthView => self.show_depth_map = !self.show_depth_map,
            Action::Quit => self.quit_requested = true,
        }
        None
    }

    fn move_camera(&mut self, direction: MoveDirection) {
        if !self.camera_locked {
            self.camera.shift(direction, CAMERA_SPEED);
        }
    }

    /// Advances the day-night clock for this frame; edge-triggered sky
    /// phase events surface here exactly once per boundary crossing.
    pub fn advance_frame(&mut self) -> Option<SkyPhase> {
        self.cycle.advance()
    }
}

impl Default for SceneState {
    fn default() -> Self {
        Self::new()
    }
}
