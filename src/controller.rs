//! §6 Public KCC surface — construction, lifecycle and the properties/
//! methods a host calls every frame.

use std::cell::Cell;
use std::rc::Rc;

use crate::contact_cache::ContactCache;
use crate::error::{KccError, KccResult};
use crate::force_effect::{CharacterForceEffect, SharedKccInputs, SharedKccInputsHandle};
use crate::math::{Vec3, EPS};
use crate::orchestrator::{self, MoveConfig, OrchestratorState};
use crate::settings::KccSettings;
use crate::sim::{CollisionObject, RigidBody, Simulation};
use crate::slide_phases::{self, PhaseContext};
use crate::types::{Capsule, Pose, Quat};

/// A kinematic capsule moved through `E`'s world by sweep-and-slide against
/// its contacts, with gravity/jump integration and a force effect that lets
/// it push dynamic bodies and ride moving platforms.
pub struct KinematicCharacterController<E: Simulation> {
    body_handle: E::BodyHandle,
    cc_object: E::ObjectHandle,
    force_effect_handle: Option<E::ForceEffectHandle>,
    cache: ContactCache<E>,
    orientation: Quat,
    up_vector: Vec3,
    capsule: Capsule,
    slope_limit: f32,
    cos_slope_limit: f32,
    step_height: f32,
    max_velocity: f32,
    gravity: f32,
    push_force: f32,
    is_climbing: bool,
    jump_maneuverability: f32,
    number_of_slide_iterations: u32,
    number_of_solver_iterations: u32,
    collision_group: u32,
    enabled: bool,
    state: OrchestratorState,
    shared_inputs: SharedKccInputsHandle,
}

impl<E: Simulation> KinematicCharacterController<E> {
    /// Builds the capsule body in `sim` (via `Simulation::spawn_capsule_body`,
    /// which performs the §3 lifecycle: shape, frictionless zero-restitution
    /// material, `mass=100` mass frame, rotation locks, sleep disabled, CCD
    /// enabled) and enables the controller.
    pub fn new(sim: &mut E, up_vector: Vec3) -> KccResult<Self> {
        let up = up_vector.try_normalize(EPS).ok_or(KccError::ZeroUpVector)?;
        let settings = KccSettings::default();
        let capsule = Capsule::new(settings.capsule_radius, settings.capsule_height);

        let body_handle = sim.spawn_capsule_body(capsule, up, Vec3::zeros());
        let cc_object = sim.object_handle_for_body(body_handle);
        let orientation = sim.body(body_handle).pose().orientation;
        let cos_slope_limit = settings.slope_limit.cos();

        let shared_inputs = Rc::new(Cell::new(SharedKccInputs {
            last_desired_velocity: Vec3::zeros(),
            up_vector: up,
            capsule,
            cos_slope_limit,
            gravity: settings.gravity,
            push_force: settings.push_force,
        }));

        let mut controller = Self {
            body_handle,
            cc_object,
            force_effect_handle: None,
            cache: ContactCache::new(),
            orientation,
            up_vector: up,
            capsule,
            slope_limit: settings.slope_limit,
            cos_slope_limit,
            step_height: settings.step_height,
            max_velocity: settings.max_velocity,
            gravity: settings.gravity,
            push_force: settings.push_force,
            is_climbing: false,
            jump_maneuverability: settings.jump_maneuverability,
            number_of_slide_iterations: settings.number_of_slide_iterations,
            number_of_solver_iterations: settings.number_of_solver_iterations,
            collision_group: 0,
            enabled: false,
            state: OrchestratorState::default(),
            shared_inputs,
        };
        controller.set_enabled(sim, true);
        Ok(controller)
    }

    /// Setting `enabled` eagerly registers/unregisters the body and the
    /// force effect in `sim`.
    pub fn set_enabled(&mut self, sim: &mut E, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;

        if enabled {
            let effect = CharacterForceEffect::new(self.body_handle, self.shared_inputs.clone());
            self.force_effect_handle = Some(sim.add_force_effect(effect));
            sim.body_mut(self.body_handle).set_enabled(true);
        } else {
            if let Some(handle) = self.force_effect_handle.take() {
                sim.remove_force_effect(handle);
            }
            sim.body_mut(self.body_handle).set_enabled(false);
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn set_gravity(&mut self, value: f32) -> KccResult<()> {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(KccError::InvalidGravity);
        }
        self.gravity = value;
        self.sync_shared_inputs();
        Ok(())
    }

    pub fn max_velocity(&self) -> f32 {
        self.max_velocity
    }

    pub fn set_max_velocity(&mut self, value: f32) -> KccResult<()> {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(KccError::InvalidMaxVelocity);
        }
        self.max_velocity = value;
        Ok(())
    }

    pub fn push_force(&self) -> f32 {
        self.push_force
    }

    pub fn set_push_force(&mut self, value: f32) -> KccResult<()> {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(KccError::InvalidPushForce);
        }
        self.push_force = value;
        self.sync_shared_inputs();
        Ok(())
    }

    pub fn slope_limit(&self) -> f32 {
        self.slope_limit
    }

    /// Setting `slope_limit` recomputes `cos_slope_limit`.
    pub fn set_slope_limit(&mut self, value: f32) -> KccResult<()> {
        if !(value.is_finite() && value >= 0.0 && value < std::f32::consts::FRAC_PI_2) {
            return Err(KccError::InvalidSlopeLimit);
        }
        self.slope_limit = value;
        self.cos_slope_limit = value.cos();
        self.sync_shared_inputs();
        Ok(())
    }

    pub fn step_height(&self) -> f32 {
        self.step_height
    }

    pub fn set_step_height(&mut self, value: f32) -> KccResult<()> {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(KccError::InvalidStepHeight);
        }
        self.step_height = value;
        Ok(())
    }

    pub fn is_climbing(&self) -> bool {
        self.is_climbing
    }

    pub fn set_is_climbing(&mut self, value: bool) {
        self.is_climbing = value;
    }

    pub fn jump_maneuverability(&self) -> f32 {
        self.jump_maneuverability
    }

    pub fn set_jump_maneuverability(&mut self, value: f32) -> KccResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(KccError::InvalidJumpManeuverability);
        }
        self.jump_maneuverability = value;
        Ok(())
    }

    pub fn number_of_slide_iterations(&self) -> u32 {
        self.number_of_slide_iterations
    }

    pub fn set_number_of_slide_iterations(&mut self, value: u32) -> KccResult<()> {
        if value < 1 {
            return Err(KccError::InvalidSlideIterations);
        }
        self.number_of_slide_iterations = value;
        Ok(())
    }

    pub fn number_of_solver_iterations(&self) -> u32 {
        self.number_of_solver_iterations
    }

    pub fn set_number_of_solver_iterations(&mut self, value: u32) -> KccResult<()> {
        if value < 1 {
            return Err(KccError::InvalidSolverIterations);
        }
        self.number_of_solver_iterations = value;
        Ok(())
    }

    pub fn collision_group(&self) -> u32 {
        self.collision_group
    }

    pub fn set_collision_group(&mut self, sim: &mut E, group: u32) {
        self.collision_group = group;
        sim.body_mut(self.body_handle).set_collision_group(group);
    }

    pub fn width(&self) -> f32 {
        self.capsule.radius * 2.0
    }

    pub fn set_width(&mut self, sim: &mut E, width: f32) -> KccResult<()> {
        let radius = width * 0.5;
        if !(radius.is_finite() && self.capsule.height >= 2.0 * radius) {
            return Err(KccError::InvalidCapsuleDimensions);
        }
        let bottom = self.position(sim);
        self.capsule.radius = radius;
        self.set_position(sim, bottom);
        self.sync_shared_inputs();
        Ok(())
    }

    pub fn height(&self) -> f32 {
        self.capsule.height
    }

    /// Setting `height` preserves `position` (the bottom point stays fixed;
    /// the body's pose is adjusted so the capsule grows/shrinks from there).
    pub fn set_height(&mut self, sim: &mut E, height: f32) -> KccResult<()> {
        if !(height.is_finite() && height >= 2.0 * self.capsule.radius) {
            return Err(KccError::InvalidCapsuleDimensions);
        }
        let bottom = self.position(sim);
        self.capsule.height = height;
        self.set_position(sim, bottom);
        self.sync_shared_inputs();
        Ok(())
    }

    /// The bottom point of the capsule: `body.pose.position - (height/2)*up_vector`.
    pub fn position(&self, sim: &E) -> Vec3 {
        sim.body(self.body_handle).pose().position - self.up_vector * (self.capsule.height * 0.5)
    }

    pub fn set_position(&mut self, sim: &mut E, bottom_point: Vec3) {
        let center = bottom_point + self.up_vector * (self.capsule.height * 0.5);
        let pose = Pose::new(center, self.orientation);
        sim.body_mut(self.body_handle).set_pose(pose);
        sim.set_object_pose(self.cc_object, pose);
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    pub fn has_ground_contact(&self) -> bool {
        self.state.had_ground_contact
    }

    pub fn up_vector(&self) -> Vec3 {
        self.up_vector
    }

    pub fn body(&self) -> E::BodyHandle {
        self.body_handle
    }

    fn sync_shared_inputs(&self) {
        let mut inputs = self.shared_inputs.get();
        inputs.up_vector = self.up_vector;
        inputs.capsule = self.capsule;
        inputs.cos_slope_limit = self.cos_slope_limit;
        inputs.gravity = self.gravity;
        inputs.push_force = self.push_force;
        self.shared_inputs.set(inputs);
    }

    /// `Move(desired_velocity, jump_velocity, dt)`. Returns the character's
    /// new `position` (bottom point). A no-op returning the current position
    /// when `enabled` is false.
    pub fn move_character(
        &mut self,
        sim: &mut E,
        desired_velocity: Vec3,
        jump_velocity: f32,
        dt: f32,
    ) -> Vec3 {
        let cfg = MoveConfig {
            up_vector: self.up_vector,
            capsule: self.capsule,
            cos_slope_limit: self.cos_slope_limit,
            step_height: self.step_height,
            max_velocity: self.max_velocity,
            gravity: self.gravity,
            jump_maneuverability: self.jump_maneuverability,
            is_climbing: self.is_climbing,
            number_of_slide_iterations: self.number_of_slide_iterations,
            number_of_solver_iterations: self.number_of_solver_iterations,
        };

        orchestrator::move_character(
            sim,
            &mut self.cache,
            self.cc_object,
            self.body_handle,
            self.orientation,
            &cfg,
            &mut self.state,
            self.enabled,
            desired_velocity,
            jump_velocity,
            dt,
        );

        let mut inputs = self.shared_inputs.get();
        inputs.last_desired_velocity = self.state.last_desired_velocity;
        self.shared_inputs.set(inputs);

        self.position(sim)
    }

    /// Validates the current position against the contact cache, rolling
    /// back on any remaining forbidden contact. Returns `false` (a no-op) if
    /// disabled.
    pub fn resolve_penetrations(&mut self, sim: &mut E) -> bool {
        if !self.enabled {
            return false;
        }

        let center = sim.body(self.body_handle).pose().position;

        // Unlike `Move` (which already holds a fresh contact-set list from
        // its own obstacle collection), a direct `resolve_penetrations` call
        // — e.g. right after `set_position` teleports the controller — must
        // re-query the broad phase at the current pose itself, or it would
        // validate against whatever stale contact list (possibly empty) the
        // last `Move` left behind.
        let cc_aabb = sim.object_aabb(self.cc_object);
        self.cache
            .collect_obstacles(sim, self.cc_object, cc_aabb, true, self.capsule.radius);
        self.cache.update_contacts(sim);

        let allowed_penetration = sim.allowed_penetration();
        let mut ctx = PhaseContext {
            world: sim,
            cache: &mut self.cache,
            cc_object: self.cc_object,
            orientation: self.orientation,
            capsule: self.capsule,
            up_vector: self.up_vector,
            cos_slope_limit: self.cos_slope_limit,
            allowed_penetration,
            number_of_slide_iterations: self.number_of_slide_iterations,
            number_of_solver_iterations: self.number_of_solver_iterations,
        };
        let (new_center, ok) = slide_phases::resolve_penetrations(&mut ctx, center);
        let sim = ctx.world;

        if ok {
            sim.body_mut(self.body_handle)
                .set_pose(Pose::new(new_center, self.orientation));
        }
        ok
    }
}
