// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cart-pole balancing, with 500-step episodes

use crate::env::{Environment, StepResult, TimeLimit};
use crate::handler::EnvironmentAdapter;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thoughtforge_client::{motor_value, LookupError, NamedValues};

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
/// Half the pole's length
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

pub const THETA_THRESHOLD_RADIANS: f64 = 12.0 * 2.0 * std::f64::consts::PI / 360.0;
pub const X_THRESHOLD: f64 = 2.4;
pub const MAX_EPISODE_STEPS: u32 = 500;

/// `[x, x_dot, theta, theta_dot]`
pub type CartPoleState = [f64; 4];

/// Push left (`0`) or right (`1`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct CartPoleEnv {
    state: CartPoleState,
    rng: StdRng,
}

impl CartPoleEnv {
    pub fn new(seed: u64) -> Self {
        Self {
            state: [0.0; 4],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> CartPoleState {
        self.state
    }

    pub fn set_state(&mut self, state: CartPoleState) {
        self.state = state;
    }

    fn is_terminal(&self) -> bool {
        let [x, _, theta, _] = self.state;
        !(-X_THRESHOLD..=X_THRESHOLD).contains(&x)
            || !(-THETA_THRESHOLD_RADIANS..=THETA_THRESHOLD_RADIANS).contains(&theta)
    }
}

impl Environment for CartPoleEnv {
    type Observation = CartPoleState;
    type Action = Push;

    fn id(&self) -> &'static str {
        "cartpole"
    }

    fn reset(&mut self) -> Result<CartPoleState> {
        for value in self.state.iter_mut() {
            *value = self.rng.gen_range(-0.05..0.05);
        }
        Ok(self.state)
    }

    fn step(&mut self, action: Push) -> Result<StepResult<CartPoleState>> {
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = match action {
            Push::Right => FORCE_MAG,
            Push::Left => -FORCE_MAG,
        };
        let (sin_theta, cos_theta) = theta.sin_cos();

        let temp = (force + POLE_MASS_LENGTH * theta_dot * theta_dot * sin_theta) / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos_theta * cos_theta / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        // Explicit Euler
        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];

        Ok(StepResult {
            observation: self.state,
            reward: 1.0,
            terminated: self.is_terminal(),
            truncated: false,
        })
    }
}

/// Single motor `motor` (non-negative pushes right); the angle and angular
/// velocity are each reported on two sensors
#[derive(Debug, Clone, Default)]
pub struct CartPoleAdapter;

impl EnvironmentAdapter for CartPoleAdapter {
    type Env = TimeLimit<CartPoleEnv>;

    fn make_env(&self, seed: u64) -> Self::Env {
        TimeLimit::new(CartPoleEnv::new(seed), MAX_EPISODE_STEPS)
    }

    fn action(&self, motor_command: &NamedValues) -> Result<Push, LookupError> {
        Ok(if motor_value(motor_command, "motor")? >= 0.0 {
            Push::Right
        } else {
            Push::Left
        })
    }

    fn sensors(&mut self, _env: &Self::Env, observation: &CartPoleState) -> NamedValues {
        let [x, x_dot, theta, theta_dot] = *observation;
        NamedValues::from([
            ("pos_sensor".to_string(), x),
            ("vel_sensor".to_string(), x_dot),
            ("angle_sensor1".to_string(), theta),
            ("angle_sensor2".to_string(), theta),
            ("angle_vel_sensor1".to_string(), theta_dot),
            ("angle_vel_sensor2".to_string(), theta_dot),
        ])
    }
}
