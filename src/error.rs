//! Error kinds surfaced to callers.
//!
//! Per the propagation policy: only construction/setter preconditions are
//! returned as `Result`. Runtime motion problems (numeric failure, solver
//! non-convergence, calling into a disabled controller) are absorbed
//! internally via rollback and are never returned here — see `slide_phases`
//! and `orchestrator` for how each is handled.

use thiserror::Error;

/// Precondition violations raised by the constructor and property setters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KccError {
    #[error("up_vector must be non-zero and finite")]
    ZeroUpVector,

    #[error("capsule height must be finite and at least twice the radius")]
    InvalidCapsuleDimensions,

    #[error("slope_limit must be in [0, pi/2)")]
    InvalidSlopeLimit,

    #[error("step_height must be >= 0")]
    InvalidStepHeight,

    #[error("max_velocity must be >= 0")]
    InvalidMaxVelocity,

    #[error("gravity must be >= 0")]
    InvalidGravity,

    #[error("push_force must be >= 0")]
    InvalidPushForce,

    #[error("jump_maneuverability must be in [0, 1]")]
    InvalidJumpManeuverability,

    #[error("number_of_slide_iterations must be >= 1")]
    InvalidSlideIterations,

    #[error("number_of_solver_iterations must be >= 1")]
    InvalidSolverIterations,
}

pub type KccResult<T> = Result<T, KccError>;
