use std::f32::consts::PI;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Sun color at full daylight intensity.
pub const DAY_SUN_COLOR: Vec3 = Vec3::new(1.0, 0.98, 0.92);
/// Sun color once the intensity clamp bottoms out at night.
pub const NIGHT_SUN_COLOR: Vec3 = Vec3::new(0.18, 0.22, 0.45);

/// Radius of the arc the sun travels on, in world units.
pub const SUN_ARC_RADIUS: f32 = 10.0;

pub const MIN_SUN_INTENSITY: f32 = 0.1;
pub const MAX_SUN_INTENSITY: f32 = 1.0;

/// Hours added per frame while the automatic cycle runs.
pub const AUTO_CYCLE_STEP_HOURS: f32 = 0.01;

/// Time the manual toggle jumps to for day and for night.
pub const MANUAL_DAY_HOUR: f32 = 8.0;
pub const MANUAL_NIGHT_HOUR: f32 = 0.0;

const DAY_START_HOUR: f32 = 6.0;
const DAY_END_HOUR: f32 = 18.0;

/// Which half of the cycle the sky is in. Emitted as an edge-triggered
/// event when the 6h/18h boundary is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkyPhase {
    Day,
    Night,
}

fn wrap_hours(time: f32) -> f32 {
    time.rem_euclid(24.0)
}

/// Angle of the sun on its arc; zero at 6h (sunrise), `pi/2` at noon.
pub fn sun_angle(time_of_day: f32) -> f32 {
    (((wrap_hours(time_of_day) - DAY_START_HOUR) / 24.0) * 360.0).to_radians()
}

pub fn phase_at(time_of_day: f32) -> SkyPhase {
    let time = wrap_hours(time_of_day);
    if (DAY_START_HOUR..DAY_END_HOUR).contains(&time) {
        SkyPhase::Day
    } else {
        SkyPhase::Night
    }
}

/// Position of the sun (or moon stand-in) on its arc.
///
/// In the night half the angle is shifted by `pi` so the light source
/// arcs back through the visible hemisphere instead of dipping below the
/// ground plane. This mirrors the arc the showcase always drew and must
/// not be simplified away.
pub fn sun_arc_position(time_of_day: f32) -> Vec3 {
    let mut angle = sun_angle(time_of_day);
    if phase_at(time_of_day) == SkyPhase::Night {
        angle += PI;
    }
    Vec3::new(
        0.0,
        angle.sin() * SUN_ARC_RADIUS,
        angle.cos() * SUN_ARC_RADIUS,
    )
}

/// Direction from the scene origin toward the sun.
pub fn sun_direction(time_of_day: f32) -> Vec3 {
    sun_arc_position(time_of_day).normalize()
}

/// Sun intensity, clamped so deep night keeps a residual glow.
pub fn sun_intensity(time_of_day: f32) -> f32 {
    (sun_angle(time_of_day).sin() * 1.2).clamp(MIN_SUN_INTENSITY, MAX_SUN_INTENSITY)
}

/// Sun color interpolated between the night and day palettes.
///
/// The clamp boundaries must land exactly on the palette constants, so the
/// endpoints bypass the lerp instead of trusting float round-trips.
pub fn sun_color(time_of_day: f32) -> Vec3 {
    let blend =
        (sun_intensity(time_of_day) - MIN_SUN_INTENSITY) / (MAX_SUN_INTENSITY - MIN_SUN_INTENSITY);
    if blend <= 0.0 {
        NIGHT_SUN_COLOR
    } else if blend >= 1.0 {
        DAY_SUN_COLOR
    } else {
        NIGHT_SUN_COLOR.lerp(DAY_SUN_COLOR, blend)
    }
}

/// Continuous day-night state machine over `time_of_day` in `[0, 24)`.
///
/// Sun direction and color are pure functions of the stored time; once the
/// automatic cycle is engaged they are never set independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayNightCycle {
    time_of_day: f32,
    auto_cycle: bool,
    phase: SkyPhase,
}

impl DayNightCycle {
    pub fn new(start_hour: f32) -> Self {
        let time_of_day = wrap_hours(start_hour);
        Self {
            time_of_day,
            auto_cycle: false,
            phase: phase_at(time_of_day),
        }
    }

    pub fn time_of_day(&self) -> f32 {
        self.time_of_day
    }

    pub fn phase(&self) -> SkyPhase {
        self.phase
    }

    pub fn auto_cycle(&self) -> bool {
        self.auto_cycle
    }

    pub fn toggle_auto_cycle(&mut self) {
        self.auto_cycle = !self.auto_cycle;
    }

    /// Jumps to the manual day or night hour, whichever half we are not in.
    pub fn toggle_day_night(&mut self) -> Option<SkyPhase> {
        let target = match self.phase {
            SkyPhase::Day => MANUAL_NIGHT_HOUR,
            SkyPhase::Night => MANUAL_DAY_HOUR,
        };
        self.set_time(target)
    }

    /// Sets the clock and reports a phase flip if the 6h/18h boundary was
    /// crossed. Fires once per crossing, never while the time merely stays
    /// on one side.
    pub fn set_time(&mut self, hours: f32) -> Option<SkyPhase> {
        self.time_of_day = wrap_hours(hours);
        let phase = phase_at(self.time_of_day);
        if phase == self.phase {
            None
        } else {
            self.phase = phase;
            Some(phase)
        }
    }

    /// Advances the clock by one frame step when the automatic cycle is on.
    pub fn advance(&mut self) -> Option<SkyPhase> {
        if !self.auto_cycle {
            return None;
        }
        self.set_time(self.time_of_day + AUTO_CYCLE_STEP_HOURS)
    }

    pub fn sun_direction(&self) -> Vec3 {
        sun_direction(self.time_of_day)
    }

    pub fn sun_arc_position(&self) -> Vec3 {
        sun_arc_position(self.time_of_day)
    }

    pub fn sun_intensity(&self) -> f32 {
        sun_intensity(self.time_of_day)
    }

    pub fn sun_color(&self) -> Vec3 {
        sun_color(self.time_of_day)
    }
}

impl Default for DayNightCycle {
    fn default() -> Self {
        Self::new(MANUAL_DAY_HOUR)
    }
}

/// Color boost applied to point lights after dark.
pub const POINT_LIGHT_NIGHT_BOOST: f32 = 1.6;

/// Fixed-position point light with quadratic distance attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    /// Attenuation factor at `distance` from the light.
    pub fn attenuation(&self, distance: f32) -> f32 {
        1.0 / (self.constant + self.linear * distance + self.quadratic * distance * distance)
    }

    /// Render-time color; the stored base color is never mutated.
    pub fn effective_color(&self, phase: SkyPhase) -> Vec3 {
        match phase {
            SkyPhase::Day => self.color,
            SkyPhase::Night => self.color * POINT_LIGHT_NIGHT_BOOST,
        }
    }
}

/// Lamp posts around the parking lot.
pub fn showcase_point_lights() -> Vec<PointLight> {
    vec![
        PointLight {
            position: Vec3::new(4.0, 3.0, 4.0),
            color: Vec3::new(1.0, 0.85, 0.55),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        },
        PointLight {
            position: Vec3::new(-4.0, 3.0, 4.0),
            color: Vec3::new(1.0, 0.85, 0.55),
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        },
        PointLight {
            position: Vec3::new(0.0, 3.0, -5.0),
            color: Vec3::new(0.7, 0.8, 1.0),
            constant: 1.0,
            linear: 0.14,
            quadratic: 0.07,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sun_state_is_periodic_over_24_hours() {
        // Hours chosen so t + 24.0 is exactly representable in f32;
        // otherwise the sum rounds before the wrap ever runs and the
        // comparison measures the addition, not the periodicity.
        for &t in &[0.0f32, 3.25, 6.0, 11.875, 18.5, 23.5] {
            let a = sun_arc_position(t);
            let b = sun_arc_position(t + 24.0);
            assert_eq!(a.to_array().map(f32::to_bits), b.to_array().map(f32::to_bits));
            let ca = sun_color(t);
            let cb = sun_color(t + 24.0);
            assert_eq!(
                ca.to_array().map(f32::to_bits),
                cb.to_array().map(f32::to_bits)
            );
        }
    }

    #[test]
    fn noon_color_is_exactly_the_day_palette() {
        assert_eq!(sun_color(12.0), DAY_SUN_COLOR);
        assert_eq!(sun_intensity(12.0), MAX_SUN_INTENSITY);
    }

    #[test]
    fn deep_night_color_is_exactly_the_night_palette() {
        assert_eq!(sun_color(0.0), NIGHT_SUN_COLOR);
        assert_eq!(sun_intensity(0.0), MIN_SUN_INTENSITY);
    }

    #[test]
    fn night_arc_stays_in_the_visible_hemisphere() {
        for &t in &[0.0f32, 2.0, 20.0, 23.0] {
            assert!(
                sun_arc_position(t).y > 0.0,
                "arc dipped below the horizon at t={t}"
            );
        }
        // Noon is the top of the arc.
        assert!((sun_arc_position(12.0).y - SUN_ARC_RADIUS).abs() < 1e-3);
    }

    #[test]
    fn boundary_crossing_fires_exactly_once() {
        let mut cycle = DayNightCycle::new(17.4);
        cycle.toggle_auto_cycle();
        let mut flips = 0;
        for _ in 0..100 {
            if cycle.advance().is_some() {
                flips += 1;
            }
        }
        assert_eq!(flips, 1);
        assert_eq!(cycle.phase(), SkyPhase::Night);
    }

    #[test]
    fn midnight_wrap_does_not_fire_a_flip() {
        let mut cycle = DayNightCycle::new(23.7);
        cycle.toggle_auto_cycle();
        let mut flips = 0;
        for _ in 0..100 {
            if cycle.advance().is_some() {
                flips += 1;
            }
        }
        // 23.7 -> 0.7 stays in the night half.
        assert_eq!(flips, 0);
        assert!(cycle.time_of_day() < 1.0);
    }

    #[test]
    fn advance_is_inert_without_auto_cycle() {
        let mut cycle = DayNightCycle::new(17.99);
        assert_eq!(cycle.advance(), None);
        assert_eq!(cycle.time_of_day(), 17.99);
    }

    #[test]
    fn manual_toggle_swaps_halves() {
        let mut cycle = DayNightCycle::new(MANUAL_DAY_HOUR);
        assert_eq!(cycle.phase(), SkyPhase::Day);
        assert_eq!(cycle.toggle_day_night(), Some(SkyPhase::Night));
        assert_eq!(cycle.time_of_day(), MANUAL_NIGHT_HOUR);
        assert_eq!(cycle.toggle_day_night(), Some(SkyPhase::Day));
        assert_eq!(cycle.time_of_day(), MANUAL_DAY_HOUR);
    }

    #[test]
    fn point_light_night_boost_leaves_base_color_alone() {
        let light = showcase_point_lights()[0];
        let day = light.effective_color(SkyPhase::Day);
        let night = light.effective_color(SkyPhase::Night);
        assert_eq!(day, light.color);
        assert_eq!(night, light.color * POINT_LIGHT_NIGHT_BOOST);
    }

    #[test]
    fn attenuation_decreases_with_distance() {
        let light = showcase_point_lights()[0];
        assert!(light.attenuation(1.0) > light.attenuation(5.0));
        assert!(light.attenuation(5.0) > light.attenuation(20.0));
    }
}
