//! Kinematic character controller tunables.
//!
//! Centralizes the construction-time defaults for the properties enumerated
//! in §6 of the spec. Unlike the crate this grew out of (which hard-coded
//! its tolerances as module-level constants), every one of these is a
//! runtime, per-instance, mutable property on `KinematicCharacterController`
//! — callers who only need the defaults can build one `KccSettings` instead
//! of calling every setter.

/// Construction-time defaults for a [`crate::controller::KinematicCharacterController`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KccSettings {
    pub capsule_radius: f32,
    pub capsule_height: f32,
    /// Radians, in `[0, pi/2)`.
    pub slope_limit: f32,
    pub step_height: f32,
    pub max_velocity: f32,
    pub gravity: f32,
    pub push_force: f32,
    pub jump_maneuverability: f32,
    pub number_of_slide_iterations: u32,
    pub number_of_solver_iterations: u32,
}

impl Default for KccSettings {
    fn default() -> Self {
        Self {
            capsule_radius: 0.4,
            capsule_height: 1.8,
            slope_limit: std::f32::consts::FRAC_PI_4,
            step_height: 0.4,
            max_velocity: 20.0,
            gravity: 9.81,
            push_force: 10.0,
            jump_maneuverability: 1.0,
            number_of_slide_iterations: 4,
            number_of_solver_iterations: 4,
        }
    }
}

/// Minimum squared movement threshold below which a movement is treated as
/// zero, avoiding tiny oscillations in the slide loop (m^2).
pub const MIN_MOVE_SQ: f32 = 1.0e-8;

/// Pair-angle threshold for pincer-support ground classification: contacts
/// more than 120 degrees apart around the bottom cap imply support. See
/// `ground_classifier`.
pub const PINCER_COS_LIMIT: f32 = -0.5; // cos(120 deg)
