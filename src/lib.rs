//! Kinematic character controller core: capsule sweep-and-slide movement
//! against a rigid-body simulation, generic over a `CollisionWorld` +
//! `Simulation` pair of external collaborators.
//!
//! Public API policy
//! -----------------
//! The algorithm modules (`contact_cache` through `orchestrator`) never
//! depend on a concrete physics engine; `controller::KinematicCharacterController`
//! is the type a host actually drives. `rapier_backend` ships the one
//! concrete `CollisionWorld`/`Simulation` implementation in this crate.

pub mod bounds;
pub mod contact_cache;
pub mod controller;
pub mod error;
pub mod force_effect;
pub mod ground_classifier;
pub mod math;
pub mod orchestrator;
pub mod rapier_backend;
pub mod settings;
pub mod sim;
pub mod simplex_solver;
pub mod slide_phases;
pub mod types;

pub use controller::KinematicCharacterController;
pub use error::{KccError, KccResult};
pub use settings::KccSettings;
