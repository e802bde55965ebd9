use crate::settings::{
    DEFAULT_ACCELERATION, DEFAULT_ADDED_MARGIN, DEFAULT_DRAG, DEFAULT_FALL_SPEED, DEFAULT_FRICTION,
    DEFAULT_JUMP_SPEED, DEFAULT_MAX_PENETRATION_DEPTH, DEFAULT_MAX_SPEED,
};

/// Plain tunables of a character controller.
///
/// All values can be changed between ticks. Coupled state that carries an
/// invariant (the up axis, gravity magnitude and the slope angle/cosine pair)
/// lives on [`crate::character::CharacterController`] behind setters instead.
#[derive(Clone, Copy, Debug)]
pub struct CharacterConfig {
    /// Maximum speed while grounded (m/s).
    pub walk_max_speed: f32,
    pub run_max_speed: f32,
    /// Maximum speed while airborne (m/s).
    pub air_max_speed: f32,
    pub fly_max_speed: f32,

    /// Acceleration while grounded (m/s^2).
    pub walk_acceleration: f32,
    pub run_acceleration: f32,
    /// Acceleration while airborne (m/s^2).
    pub air_acceleration: f32,
    pub fly_acceleration: f32,

    /// Ground friction coefficient, applied per tick to the horizontal
    /// velocity when grounded on consecutive ticks.
    pub friction: f32,
    /// Air drag coefficient, applied per tick to the full velocity when not
    /// grounded on consecutive ticks.
    pub drag: f32,
    /// Scales acceleration, max speed and the jump impulse.
    pub speed_modifier: f32,

    /// Terminal fall speed (m/s).
    pub fall_speed: f32,
    /// Takeoff speed of a default jump (m/s).
    pub jump_speed: f32,

    /// Maximum height climbed by the step-up stage (meters).
    pub step_height: f32,
    /// Penetrations deeper than this get pushed out by recovery (meters).
    pub max_penetration_depth: f32,
    /// Extra collision margin for the forward sweep (meters).
    pub added_margin: f32,

    /// Per-second velocity decay factors in `[0, 1]`.
    pub linear_damping: f32,
    pub angular_damping: f32,

    /// Interpolate the step-up climb by the hit fraction instead of snapping
    /// to the full step height.
    pub interpolate_up: bool,
    /// Alternate step-down resolution that compensates for hit-fraction
    /// inaccuracy on large polygons. Off by default; both behaviors are kept
    /// because callers may depend on either.
    pub bounce_fix: bool,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            walk_max_speed: DEFAULT_MAX_SPEED,
            run_max_speed: DEFAULT_MAX_SPEED,
            air_max_speed: DEFAULT_MAX_SPEED,
            fly_max_speed: DEFAULT_MAX_SPEED,
            walk_acceleration: DEFAULT_ACCELERATION,
            run_acceleration: DEFAULT_ACCELERATION,
            air_acceleration: DEFAULT_ACCELERATION,
            fly_acceleration: DEFAULT_ACCELERATION,
            friction: DEFAULT_FRICTION,
            drag: DEFAULT_DRAG,
            speed_modifier: 1.0,
            fall_speed: DEFAULT_FALL_SPEED,
            jump_speed: DEFAULT_JUMP_SPEED,
            step_height: 0.35,
            max_penetration_depth: DEFAULT_MAX_PENETRATION_DEPTH,
            added_margin: DEFAULT_ADDED_MARGIN,
            linear_damping: 0.0,
            angular_damping: 0.0,
            interpolate_up: true,
            bounce_fix: false,
        }
    }
}
