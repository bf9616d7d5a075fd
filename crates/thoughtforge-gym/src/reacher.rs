// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Planar two-joint reacher: move the fingertip onto a randomly placed target
//!
//! Joint dynamics are a damped, torque-driven rotor per joint (gear 200,
//! damping 1, armature 1, two 0.01 s substeps per step). The elbow is limited to
//! +/-3 rad. Link-coupling forces are not modelled.

use crate::env::{Environment, StepResult, TimeLimit};
use crate::handler::EnvironmentAdapter;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use thoughtforge_client::{motor_value, LookupError, NamedValues};

pub const LINK_LENGTH_0: f64 = 0.1;
/// Second link plus fingertip offset
pub const LINK_LENGTH_1: f64 = 0.11;
pub const ELBOW_LIMIT: f64 = 3.0;
pub const TARGET_RADIUS: f64 = 0.2;
pub const MAX_EPISODE_STEPS: u32 = 500;

const GEAR: f64 = 200.0;
const DAMPING: f64 = 1.0;
const ARMATURE: f64 = 1.0;
const SUBSTEP: f64 = 0.01;
const FRAME_SKIP: usize = 2;

pub type Vec2 = [f64; 2];

/// `[cos q0, cos q1, sin q0, sin q1, target x, target y, qvel0, qvel1,
/// fingertip x - target x, fingertip y - target y]`
pub type ReacherObservation = [f64; 10];

/// Joint positions and velocities of the arm
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmState {
    pub qpos: Vec2,
    pub qvel: Vec2,
}

#[derive(Debug, Clone)]
pub struct ReacherEnv {
    arm: ArmState,
    target: Vec2,
    preserve_arm_on_reset: bool,
    rng: StdRng,
}

impl ReacherEnv {
    pub fn new(seed: u64) -> Self {
        Self {
            arm: ArmState::default(),
            target: [0.0; 2],
            preserve_arm_on_reset: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Keep the arm's pose and velocity across resets; only the target moves
    pub fn preserve_arm_on_reset(mut self, preserve: bool) -> Self {
        self.preserve_arm_on_reset = preserve;
        self
    }

    pub fn preserves_arm_on_reset(&self) -> bool {
        self.preserve_arm_on_reset
    }

    pub fn arm(&self) -> ArmState {
        self.arm
    }

    pub fn set_arm(&mut self, arm: ArmState) {
        self.arm = arm;
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    /// Shoulder position (the arm's fixed base)
    pub fn body0(&self) -> Vec2 {
        [0.0, 0.0]
    }

    /// Elbow position
    pub fn body1(&self) -> Vec2 {
        let q0 = self.arm.qpos[0];
        [LINK_LENGTH_0 * q0.cos(), LINK_LENGTH_0 * q0.sin()]
    }

    pub fn fingertip(&self) -> Vec2 {
        let [x, y] = self.body1();
        let angle = self.arm.qpos[0] + self.arm.qpos[1];
        [x + LINK_LENGTH_1 * angle.cos(), y + LINK_LENGTH_1 * angle.sin()]
    }

    /// World-frame angular velocity of the upper link
    pub fn body0_angular_velocity(&self) -> f64 {
        self.arm.qvel[0]
    }

    /// World-frame angular velocity of the lower link
    pub fn body1_angular_velocity(&self) -> f64 {
        self.arm.qvel[0] + self.arm.qvel[1]
    }

    fn sample_target(&mut self) -> Vec2 {
        loop {
            let goal = [
                self.rng.gen_range(-TARGET_RADIUS..TARGET_RADIUS),
                self.rng.gen_range(-TARGET_RADIUS..TARGET_RADIUS),
            ];
            if norm(goal) < TARGET_RADIUS {
                return goal;
            }
        }
    }

    fn observation(&self) -> ReacherObservation {
        let [q0, q1] = self.arm.qpos;
        let [v0, v1] = self.arm.qvel;
        let tip = self.fingertip();
        [
            q0.cos(),
            q1.cos(),
            q0.sin(),
            q1.sin(),
            self.target[0],
            self.target[1],
            v0,
            v1,
            tip[0] - self.target[0],
            tip[1] - self.target[1],
        ]
    }

    fn integrate(&mut self, torque: Vec2) {
        for _ in 0..FRAME_SKIP {
            for joint in 0..2 {
                let qacc = (GEAR * torque[joint] - DAMPING * self.arm.qvel[joint]) / ARMATURE;
                self.arm.qvel[joint] += SUBSTEP * qacc;
                self.arm.qpos[joint] += SUBSTEP * self.arm.qvel[joint];
            }
            if self.arm.qpos[1].abs() > ELBOW_LIMIT {
                self.arm.qpos[1] = self.arm.qpos[1].clamp(-ELBOW_LIMIT, ELBOW_LIMIT);
                self.arm.qvel[1] = 0.0;
            }
        }
        // Shoulder is unlimited; keep its angle bounded for the observation
        self.arm.qpos[0] = (self.arm.qpos[0] + PI).rem_euclid(2.0 * PI) - PI;
    }
}

impl Environment for ReacherEnv {
    type Observation = ReacherObservation;
    /// Shoulder and elbow torque, each clipped to `[-1, 1]`
    type Action = Vec2;

    fn id(&self) -> &'static str {
        "reacher"
    }

    fn reset(&mut self) -> Result<ReacherObservation> {
        if !self.preserve_arm_on_reset {
            self.arm = ArmState {
                qpos: [self.rng.gen_range(-0.1..0.1), self.rng.gen_range(-0.1..0.1)],
                qvel: [
                    self.rng.gen_range(-0.005..0.005),
                    self.rng.gen_range(-0.005..0.005),
                ],
            };
        }
        self.target = self.sample_target();
        Ok(self.observation())
    }

    fn step(&mut self, action: Vec2) -> Result<StepResult<ReacherObservation>> {
        anyhow::ensure!(
            action.iter().all(|a| a.is_finite()),
            "reacher torques must be finite, got {:?}",
            action
        );
        let torque = action.map(|a| a.clamp(-1.0, 1.0));

        // Reward is computed for the pose the action was applied in
        let distance = norm(sub(self.fingertip(), self.target));
        let control_cost: f64 = torque.iter().map(|t| t * t).sum();
        self.integrate(torque);

        Ok(StepResult {
            observation: self.observation(),
            reward: -distance - control_cost,
            terminated: false,
            truncated: false,
        })
    }
}

fn sub(a: Vec2, b: Vec2) -> Vec2 {
    [a[0] - b[0], a[1] - b[1]]
}

fn norm(v: Vec2) -> f64 {
    v[0].hypot(v[1])
}

/// Unsigned angle between two vectors, `0` if either is zero-length
fn angle_between(a: Vec2, b: Vec2) -> f64 {
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    ((a[0] * b[0] + a[1] * b[1]) / (na * nb)).clamp(-1.0, 1.0).acos()
}

/// Sign of the z component of `a x b`
fn cross_sign(a: Vec2, b: Vec2) -> f64 {
    let z = a[0] * b[1] - a[1] * b[0];
    if z > 0.0 {
        1.0
    } else if z < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Motors `joint_1_torque` and `joint_2_torque`. Sensors describe the target
/// relative to the shoulder (signed angle, radius difference) and the links'
/// rotational velocity with its first two finite differences.
#[derive(Debug, Clone, Default)]
pub struct ReacherAdapter {
    last_rotvel0: f64,
    last_rotvel1: f64,
    last_delta1_rotvel0: f64,
    last_delta1_rotvel1: f64,
}

impl EnvironmentAdapter for ReacherAdapter {
    type Env = TimeLimit<ReacherEnv>;

    fn make_env(&self, seed: u64) -> Self::Env {
        TimeLimit::new(
            ReacherEnv::new(seed).preserve_arm_on_reset(true),
            MAX_EPISODE_STEPS,
        )
    }

    fn action(&self, motor_command: &NamedValues) -> Result<Vec2, LookupError> {
        Ok([
            motor_value(motor_command, "joint_1_torque")?,
            motor_value(motor_command, "joint_2_torque")?,
        ])
    }

    fn sensors(&mut self, env: &Self::Env, _observation: &ReacherObservation) -> NamedValues {
        let env = env.inner();
        let body0 = env.body0();
        let to_target = sub(env.target(), body0);
        let to_fingertip = sub(env.fingertip(), body0);

        let angle0 = angle_between(to_target, to_fingertip) / PI;
        let angle0_sensor = cross_sign(to_target, to_fingertip) * angle0;
        let clamped_angle0 = angle0.max(0.25);

        let rotvel0 = env.body0_angular_velocity();
        let mut rotvel0_scaled = rotvel0 / 10.0;
        if rotvel0_scaled.abs() < 0.04 {
            rotvel0_scaled = 0.0;
        }
        let rotvel0_sensor = rotvel0_scaled / clamped_angle0;

        let delta1_rotvel0 = self.last_rotvel0 - rotvel0;
        self.last_rotvel0 = rotvel0;
        let delta2_rotvel0 = self.last_delta1_rotvel0 - delta1_rotvel0;
        self.last_delta1_rotvel0 = delta1_rotvel0;

        let radius = norm(to_target) - norm(to_fingertip);

        let rotvel1 = env.body1_angular_velocity();
        // Scaled from the upper link's velocity, like the rotvel0 sensor
        let mut rotvel1_sensor = rotvel0 / 20.0;
        if rotvel1_sensor.abs() < 0.08 {
            rotvel1_sensor = 0.0;
        }
        let delta1_rotvel1 = self.last_rotvel1 - rotvel1;
        self.last_rotvel1 = rotvel1;
        let delta2_rotvel1 = self.last_delta1_rotvel1 - delta1_rotvel1;
        self.last_delta1_rotvel1 = delta1_rotvel1;

        let mut sensors = NamedValues::new();
        for i in 1..=4 {
            sensors.insert(format!("angle0_sensor{}", i), angle0_sensor);
        }
        sensors.insert("radius_sensor1".to_string(), radius);
        sensors.insert("radius_sensor2".to_string(), radius);
        sensors.insert("rotvel0_sensor".to_string(), rotvel0_sensor);
        sensors.insert("delta1_rotvel0_sensor".to_string(), delta1_rotvel0 / clamped_angle0);
        sensors.insert("delta2_rotvel0_sensor".to_string(), delta2_rotvel0 / clamped_angle0);
        sensors.insert("rotvel1_sensor".to_string(), rotvel1_sensor);
        sensors.insert("delta1_rotvel1_sensor".to_string(), delta1_rotvel1);
        sensors.insert("delta2_rotvel1_sensor".to_string(), delta2_rotvel1);
        sensors
    }

    fn episode_reset(&mut self) {
        *self = Self::default();
    }
}
