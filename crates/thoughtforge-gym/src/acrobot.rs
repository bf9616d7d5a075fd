// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Acrobot: swing a two-link pendulum's tip above the bar

use crate::env::{Environment, StepResult, TimeLimit};
use crate::handler::EnvironmentAdapter;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use thoughtforge_client::{motor_value, LookupError, NamedValues};

const DT: f64 = 0.2;
const LINK_LENGTH_1: f64 = 1.0;
const LINK_MASS_1: f64 = 1.0;
const LINK_MASS_2: f64 = 1.0;
const LINK_COM_POS_1: f64 = 0.5;
const LINK_COM_POS_2: f64 = 0.5;
const LINK_MOI: f64 = 1.0;
const GRAVITY: f64 = 9.8;
pub const MAX_VEL_1: f64 = 4.0 * PI;
pub const MAX_VEL_2: f64 = 9.0 * PI;
pub const MAX_EPISODE_STEPS: u32 = 500;

/// `[theta1, theta2, dtheta1, dtheta2]`
pub type AcrobotState = [f64; 4];

/// `[cos theta1, sin theta1, cos theta2, sin theta2, dtheta1, dtheta2]`
pub type AcrobotObservation = [f64; 6];

/// Torque applied at the joint between the links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Torque {
    Negative,
    Zero,
    Positive,
}

impl Torque {
    fn value(self) -> f64 {
        match self {
            Torque::Negative => -1.0,
            Torque::Zero => 0.0,
            Torque::Positive => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcrobotEnv {
    state: AcrobotState,
    rng: StdRng,
}

impl AcrobotEnv {
    pub fn new(seed: u64) -> Self {
        Self {
            state: [0.0; 4],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn state(&self) -> AcrobotState {
        self.state
    }

    pub fn set_state(&mut self, state: AcrobotState) {
        self.state = state;
    }

    pub fn observation(&self) -> AcrobotObservation {
        let [theta1, theta2, dtheta1, dtheta2] = self.state;
        [
            theta1.cos(),
            theta1.sin(),
            theta2.cos(),
            theta2.sin(),
            dtheta1,
            dtheta2,
        ]
    }

    /// Tip height above the pivot, in link lengths
    pub fn tip_height(&self) -> f64 {
        let [theta1, theta2, _, _] = self.state;
        -theta1.cos() - (theta2 + theta1).cos()
    }
}

/// Equations of motion (Sutton & Barto formulation)
fn derivatives(state: &AcrobotState, torque: f64) -> AcrobotState {
    let [theta1, theta2, dtheta1, dtheta2] = *state;
    let (m1, m2) = (LINK_MASS_1, LINK_MASS_2);
    let (l1, lc1, lc2) = (LINK_LENGTH_1, LINK_COM_POS_1, LINK_COM_POS_2);
    let (i1, i2) = (LINK_MOI, LINK_MOI);

    let d1 = m1 * lc1 * lc1 + m2 * (l1 * l1 + lc2 * lc2 + 2.0 * l1 * lc2 * theta2.cos()) + i1 + i2;
    let d2 = m2 * (lc2 * lc2 + l1 * lc2 * theta2.cos()) + i2;
    let phi2 = m2 * lc2 * GRAVITY * (theta1 + theta2 - PI / 2.0).cos();
    let phi1 = -m2 * l1 * lc2 * dtheta2 * dtheta2 * theta2.sin()
        - 2.0 * m2 * l1 * lc2 * dtheta2 * dtheta1 * theta2.sin()
        + (m1 * lc1 + m2 * l1) * GRAVITY * (theta1 - PI / 2.0).cos()
        + phi2;
    let ddtheta2 = (torque + d2 / d1 * phi1 - m2 * l1 * lc2 * dtheta1 * dtheta1 * theta2.sin() - phi2)
        / (m2 * lc2 * lc2 + i2 - d2 * d2 / d1);
    let ddtheta1 = -(d2 * ddtheta2 + phi1) / d1;

    [dtheta1, dtheta2, ddtheta1, ddtheta2]
}

fn add_scaled(a: &AcrobotState, k: &AcrobotState, h: f64) -> AcrobotState {
    [a[0] + h * k[0], a[1] + h * k[1], a[2] + h * k[2], a[3] + h * k[3]]
}

/// One classical fourth-order Runge-Kutta step of length `dt`
fn rk4(state: &AcrobotState, torque: f64, dt: f64) -> AcrobotState {
    let k1 = derivatives(state, torque);
    let k2 = derivatives(&add_scaled(state, &k1, dt / 2.0), torque);
    let k3 = derivatives(&add_scaled(state, &k2, dt / 2.0), torque);
    let k4 = derivatives(&add_scaled(state, &k3, dt), torque);
    std::array::from_fn(|i| state[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
}

/// Wrap an angle into `[-pi, pi)`
fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for AcrobotEnv {
    type Observation = AcrobotObservation;
    type Action = Torque;

    fn id(&self) -> &'static str {
        "acrobot"
    }

    fn reset(&mut self) -> Result<AcrobotObservation> {
        for value in self.state.iter_mut() {
            *value = self.rng.gen_range(-0.1..0.1);
        }
        Ok(self.observation())
    }

    fn step(&mut self, action: Torque) -> Result<StepResult<AcrobotObservation>> {
        let [theta1, theta2, dtheta1, dtheta2] = rk4(&self.state, action.value(), DT);
        self.state = [
            wrap_angle(theta1),
            wrap_angle(theta2),
            dtheta1.clamp(-MAX_VEL_1, MAX_VEL_1),
            dtheta2.clamp(-MAX_VEL_2, MAX_VEL_2),
        ];

        let terminated = self.tip_height() > 1.0;
        Ok(StepResult {
            observation: self.observation(),
            reward: if terminated { 0.0 } else { -1.0 },
            terminated,
            truncated: false,
        })
    }
}

/// Motors `motor1` and `motor2` vote on the torque (both positive: +1, both
/// negative: -1, otherwise 0); `height_sensor` is the tip height signed by the
/// direction of the first link
#[derive(Debug, Clone, Default)]
pub struct AcrobotAdapter;

impl EnvironmentAdapter for AcrobotAdapter {
    type Env = TimeLimit<AcrobotEnv>;

    fn make_env(&self, seed: u64) -> Self::Env {
        TimeLimit::new(AcrobotEnv::new(seed), MAX_EPISODE_STEPS)
    }

    fn action(&self, motor_command: &NamedValues) -> Result<Torque, LookupError> {
        let motor1 = motor_value(motor_command, "motor1")?;
        let motor2 = motor_value(motor_command, "motor2")?;
        Ok(if motor1 > 0.0 && motor2 > 0.0 {
            Torque::Positive
        } else if motor1 < 0.0 && motor2 < 0.0 {
            Torque::Negative
        } else {
            Torque::Zero
        })
    }

    fn sensors(&mut self, _env: &Self::Env, observation: &AcrobotObservation) -> NamedValues {
        NamedValues::from([("height_sensor".to_string(), height_sensor(observation))])
    }
}

fn height_sensor(observation: &AcrobotObservation) -> f64 {
    let s0 = observation[1].atan2(observation[0]);
    let s1 = observation[3].atan2(observation[2]);
    let h = -s0.cos() - (s1 + s0).cos();
    let value = 2.0 - h;
    // Fold the swing direction into the sign
    if observation[1] < 0.0 {
        -value
    } else {
        value
    }
}
