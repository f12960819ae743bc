//! End-to-end seed scenarios against the `rapier_backend` adapter.
//!
//! Shared numbers throughout: `up = (0,1,0)`, `gravity=9.81`, `slope_limit=pi/4`,
//! `step_height=0.4`, `width=0.8`, `height=1.8`, `max_velocity=20`,
//! `allowed_penetration=0.01` — exactly `KccSettings::default()` plus a
//! `RapierWorld` built with `allowed_penetration=0.01`.

use kcc::controller::KinematicCharacterController;
use kcc::math::Vec3;
use kcc::rapier_backend::{RapierShape, RapierWorld};
use kcc::sim::{RigidBody, Simulation};
use kcc::types::Pose;

const DT: f32 = 1.0 / 60.0;

/// Routes the crate's `log::trace!`/`log::debug!` call sites (slide-phase
/// fallbacks, solver non-convergence, orchestrator phase choice) to the test
/// harness output; harmless to call more than once per process.
fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

fn flat_ground(world: &mut RapierWorld) {
    world.add_body(
        RapierShape::HalfSpace {
            normal: Vec3::new(0.0, 1.0, 0.0),
        },
        Pose::identity_at(Vec3::zeros()),
        0.0,
        false,
    );
}

#[test]
fn s1_flat_ground_walk() {
    init_logging();
    let mut world = RapierWorld::new(0.01, DT);
    flat_ground(&mut world);
    let mut cc = KinematicCharacterController::new(&mut world, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    cc.set_position(&mut world, Vec3::zeros());

    let pos = cc.move_character(&mut world, Vec3::new(1.0, 0.0, 0.0), 0.0, DT);

    assert!((pos.x - 1.0 / 60.0).abs() < 0.01, "pos.x = {}", pos.x);
    assert!(pos.y.abs() < 0.01, "pos.y = {}", pos.y);
    assert!(cc.has_ground_contact());
    assert!((cc.velocity().x - 1.0).abs() < 0.1, "velocity.x = {}", cc.velocity().x);
}

#[test]
fn s2_jump_apex() {
    init_logging();
    let mut world = RapierWorld::new(0.01, DT);
    flat_ground(&mut world);
    let mut cc = KinematicCharacterController::new(&mut world, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    cc.set_position(&mut world, Vec3::zeros());

    cc.move_character(&mut world, Vec3::zeros(), 5.0, DT);

    let mut max_y = cc.position(&world).y;
    for _ in 0..300 {
        cc.move_character(&mut world, Vec3::zeros(), 0.0, DT);
        max_y = max_y.max(cc.position(&world).y);
        if cc.velocity().y <= 0.0 {
            break;
        }
    }

    let expected = 5.0f32 * 5.0 / (2.0 * 9.81);
    assert!(
        (max_y - expected).abs() < 0.05,
        "max_y = {max_y}, expected ~{expected}"
    );
}

#[test]
fn s3_blocking_wall() {
    init_logging();
    let mut world = RapierWorld::new(0.01, DT);
    flat_ground(&mut world);
    world.add_body(
        RapierShape::Cuboid {
            half_extents: Vec3::new(0.1, 5.0, 5.0),
        },
        Pose::identity_at(Vec3::new(0.6, 5.0, 0.0)),
        0.0,
        false,
    );

    let mut cc = KinematicCharacterController::new(&mut world, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    cc.set_position(&mut world, Vec3::zeros());
    cc.move_character(&mut world, Vec3::zeros(), 0.0, DT);

    let pos = cc.move_character(&mut world, Vec3::new(10.0, 0.0, 0.0), 0.0, DT);

    assert!(pos.x <= 0.11 + 0.02, "pos.x = {}", pos.x);
    assert!(cc.has_ground_contact());
}

#[test]
fn s4_step_up() {
    init_logging();
    let mut world = RapierWorld::new(0.01, DT);
    flat_ground(&mut world);
    world.add_body(
        RapierShape::Cuboid {
            half_extents: Vec3::new(0.35, 0.15, 5.0),
        },
        Pose::identity_at(Vec3::new(0.65, 0.15, 0.0)),
        0.0,
        false,
    );

    let mut cc = KinematicCharacterController::new(&mut world, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    cc.set_position(&mut world, Vec3::new(0.0, 0.0, 0.0));
    cc.move_character(&mut world, Vec3::zeros(), 0.0, DT);

    let pos = cc.move_character(&mut world, Vec3::new(5.0, 0.0, 0.0), 0.0, DT);

    assert!(pos.x >= 0.0, "pos.x = {}", pos.x);
    assert!((pos.y - 0.3).abs() < 0.05, "pos.y = {}", pos.y);
}

#[test]
fn s5_slope_block() {
    init_logging();
    let mut world = RapierWorld::new(0.01, DT);
    let angle = 60f32.to_radians();
    let normal = Vec3::new(angle.sin(), angle.cos(), 0.0);
    world.add_body(
        RapierShape::HalfSpace { normal },
        Pose::identity_at(Vec3::zeros()),
        0.0,
        false,
    );

    let mut cc = KinematicCharacterController::new(&mut world, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    cc.set_position(&mut world, Vec3::new(0.0, 0.05, 0.0));
    cc.move_character(&mut world, Vec3::zeros(), 0.0, DT);

    let start_x = cc.position(&world).x;
    for _ in 0..20 {
        cc.move_character(&mut world, Vec3::new(3.0, 0.0, 0.0), 0.0, DT);
    }
    let end_x = cc.position(&world).x;

    assert!(end_x - start_x <= 0.01 * 20.0 + 0.02, "dx = {}", end_x - start_x);
}

#[test]
fn s6_moving_platform_traction() {
    init_logging();
    let mut world = RapierWorld::new(0.01, DT);
    let platform = world.add_body(
        RapierShape::Cuboid {
            half_extents: Vec3::new(5.0, 0.5, 5.0),
        },
        Pose::identity_at(Vec3::new(0.0, -0.5, 0.0)),
        0.0,
        false,
    );

    let mut cc = KinematicCharacterController::new(&mut world, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    cc.set_position(&mut world, Vec3::zeros());
    cc.move_character(&mut world, Vec3::zeros(), 0.0, DT);
    assert!(cc.has_ground_contact());

    world.body_mut(platform).set_linear_velocity(Vec3::new(2.0, 0.0, 0.0));

    let before = cc.position(&world);
    world.step(DT);
    let after = cc.position(&world);

    // `CharacterForceEffect` averages ground-contact velocity onto the CC's
    // own body as its traction mechanism, and `RapierWorld::step` integrates
    // every enabled body's position from its linear velocity in the same
    // call — so the character's world position has already advanced by
    // `v_p * dt` by the time `step` returns, with no extra `Move` needed.
    assert!(
        (after.x - before.x - 2.0 * DT).abs() < 0.01,
        "dx = {}",
        after.x - before.x
    );
}
