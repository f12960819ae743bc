//! §4.7 CharacterForceEffect — the per-simulation-step callback that lets
//! the CC participate in the host simulation: pushes dynamic bodies, applies
//! the CC's weight as a gravity reaction on the ground body, and gives the
//! CC traction on moving platforms.
//!
//! Per §9's design note on the original's implicit back-pointer: this type
//! owns no KCC state directly. It holds a shared handle (`SharedKccInputs`
//! behind an `Rc<Cell<_>>`) that `controller` updates after every `Move`
//! call, plus the CC's own body handle for the mutable access it needs
//! (pushing bodies, setting the CC's own linear velocity for traction).

use std::cell::Cell;
use std::rc::Rc;

use crate::math::{Vec3, EPS};
use crate::sim::{ForceEffect, RigidBody, Simulation};
use crate::types::Capsule;

/// Read-only inputs the force effect needs from the KCC, refreshed by
/// `controller` after each `Move` call.
#[derive(Clone, Copy, Debug)]
pub struct SharedKccInputs {
    pub last_desired_velocity: Vec3,
    pub up_vector: Vec3,
    pub capsule: Capsule,
    pub cos_slope_limit: f32,
    pub gravity: f32,
    pub push_force: f32,
}

impl Default for SharedKccInputs {
    fn default() -> Self {
        Self {
            last_desired_velocity: Vec3::zeros(),
            up_vector: Vec3::new(0.0, 1.0, 0.0),
            capsule: Capsule::new(0.4, 1.8),
            cos_slope_limit: std::f32::consts::FRAC_PI_4.cos(),
            gravity: 9.81,
            push_force: 10.0,
        }
    }
}

pub type SharedKccInputsHandle = Rc<Cell<SharedKccInputs>>;

pub struct CharacterForceEffect<S: Simulation> {
    body_handle: S::BodyHandle,
    inputs: SharedKccInputsHandle,
}

impl<S: Simulation> CharacterForceEffect<S> {
    pub fn new(body_handle: S::BodyHandle, inputs: SharedKccInputsHandle) -> Self {
        Self { body_handle, inputs }
    }
}

impl<S: Simulation> ForceEffect<S> for CharacterForceEffect<S> {
    fn on_apply(&mut self, sim: &mut S, dt: f32) {
        let inputs = self.inputs.get();
        let cc = self.body_handle;
        let bottom_of_cylinder = -inputs.capsule.height * 0.5 + inputs.capsule.radius;
        let mass_cc = sim.body(cc).mass();

        let constraints = sim.contact_constraints().to_vec();

        let mut ground_velocity_sum = Vec3::zeros();
        let mut ground_contact_count: u32 = 0;

        for constraint in constraints {
            let (cc_is_a, other) = if constraint.body_a == cc {
                (true, constraint.body_b)
            } else if constraint.body_b == cc {
                (false, constraint.body_a)
            } else {
                continue;
            };

            // Oriented from the CC toward the other body; `contact.normal`
            // points from A to B.
            let n = if cc_is_a {
                constraint.contact.normal
            } else {
                -constraint.contact.normal
            };
            let pos_world = constraint.contact.position_world;
            let pos_local_cc = if cc_is_a {
                constraint.contact.position_a_local
            } else {
                constraint.contact.position_b_local
            };

            let is_bottom_cap = pos_local_cc.dot(&inputs.up_vector) < bottom_of_cylinder;

            if is_bottom_cap {
                if sim.body(other).is_dynamic() {
                    let weight_impulse = -inputs.up_vector * (inputs.gravity * mass_cc * dt);
                    sim.body_mut(other).apply_impulse(weight_impulse, pos_world);
                }

                let inward = -n;
                if inward.dot(&inputs.up_vector) >= inputs.cos_slope_limit {
                    ground_contact_count += 1;
                    let other_body = sim.body(other);
                    ground_velocity_sum += other_body.velocity_at_world_point(pos_world);
                    if let Some(surface_motion) = other_body.surface_motion() {
                        ground_velocity_sum += surface_motion;
                    }
                }
            } else if sim.body(other).is_dynamic() {
                let v_b = sim.body(other).velocity_at_world_point(pos_world);
                let v_rel = inputs.last_desired_velocity - v_b;
                let v_n = v_rel.dot(&n);

                if v_n > 0.0 {
                    if let Some(k_inv) = constraint.k_matrix.try_inverse() {
                        let mut j = k_inv * v_rel;
                        let max_mag = inputs.push_force * dt;
                        let mag = j.norm();
                        if mag > max_mag && mag > EPS {
                            j *= max_mag / mag;
                        }
                        sim.body_mut(other).apply_impulse(j, pos_world);
                    }
                }
            }
        }

        if ground_contact_count > 0 {
            let averaged = ground_velocity_sum / (ground_contact_count as f32);
            sim.body_mut(cc).set_linear_velocity(averaged);
        }
    }
}
