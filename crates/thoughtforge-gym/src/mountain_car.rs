// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Continuous mountain car: drive an under-powered car up a hill

use crate::env::{Environment, StepResult, TimeLimit};
use crate::handler::EnvironmentAdapter;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thoughtforge_client::{motor_value, LookupError, NamedValues};

const MIN_ACTION: f64 = -1.0;
const MAX_ACTION: f64 = 1.0;
pub const MIN_POSITION: f64 = -1.2;
pub const MAX_POSITION: f64 = 0.6;
pub const MAX_SPEED: f64 = 0.07;
pub const GOAL_POSITION: f64 = 0.45;
const GOAL_VELOCITY: f64 = 0.0;
const POWER: f64 = 0.0015;
pub const MAX_EPISODE_STEPS: u32 = 999;

/// Keeps the height/velocity ratio finite when the car is at rest
const EPSILON: f64 = 0.000001;

/// `[position, velocity]`
pub type MountainCarState = [f64; 2];

#[derive(Debug, Clone)]
pub struct MountainCarContinuousEnv {
    state: MountainCarState,
    rng: StdRng,
}

impl MountainCarContinuousEnv {
    pub fn new(seed: u64) -> Self {
        Self {
            state: [0.0; 2],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> MountainCarState {
        self.state
    }

    pub fn set_state(&mut self, state: MountainCarState) {
        self.state = state;
    }
}

impl Environment for MountainCarContinuousEnv {
    type Observation = MountainCarState;
    /// Engine force, clipped to `[-1, 1]`
    type Action = f64;

    fn id(&self) -> &'static str {
        "mountaincar-continuous"
    }

    fn reset(&mut self) -> Result<MountainCarState> {
        self.state = [self.rng.gen_range(-0.6..-0.4), 0.0];
        Ok(self.state)
    }

    fn step(&mut self, action: f64) -> Result<StepResult<MountainCarState>> {
        anyhow::ensure!(action.is_finite(), "mountain car force must be finite, got {}", action);

        let [mut position, mut velocity] = self.state;
        let force = action.clamp(MIN_ACTION, MAX_ACTION);

        velocity += force * POWER - 0.0025 * (3.0 * position).cos();
        velocity = velocity.clamp(-MAX_SPEED, MAX_SPEED);
        position += velocity;
        position = position.clamp(MIN_POSITION, MAX_POSITION);
        if position == MIN_POSITION && velocity < 0.0 {
            velocity = 0.0;
        }
        self.state = [position, velocity];

        let terminated = position >= GOAL_POSITION && velocity >= GOAL_VELOCITY;
        let reward = if terminated { 100.0 } else { 0.0 } - 0.1 * force * force;

        Ok(StepResult {
            observation: self.state,
            reward,
            terminated,
            truncated: false,
        })
    }
}

/// Motor `force_motor` is the engine force; sensors report the offset position
/// and the ratio of height to velocity
#[derive(Debug, Clone, Default)]
pub struct MountainCarAdapter;

impl EnvironmentAdapter for MountainCarAdapter {
    type Env = TimeLimit<MountainCarContinuousEnv>;

    fn make_env(&self, seed: u64) -> Self::Env {
        TimeLimit::new(MountainCarContinuousEnv::new(seed), MAX_EPISODE_STEPS)
    }

    fn action(&self, motor_command: &NamedValues) -> Result<f64, LookupError> {
        motor_value(motor_command, "force_motor")
    }

    fn sensors(&mut self, _env: &Self::Env, observation: &MountainCarState) -> NamedValues {
        let [position, velocity] = *observation;
        let height = (3.0 * position).sin() - 1.0;
        NamedValues::from([
            ("pos_sensor".to_string(), position - 0.5),
            ("height_vel_sensor".to_string(), height / (velocity + EPSILON)),
        ])
    }
}
