// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # ThoughtForge Gym
//!
//! Self-contained classic-control environments (cart-pole, continuous mountain
//! car, acrobot and a planar reacher) plus the adapters that turn them into
//! [`SessionHandler`]s for a ThoughtForge session.
//!
//! ```ignore
//! use thoughtforge_gym::ExampleEnvironment;
//!
//! let mut handler = ExampleEnvironment::CartPole.handler(42);
//! thoughtforge_client::run_session(&mut session, handler.as_mut(), None)?;
//! ```

pub mod acrobot;
pub mod cartpole;
pub mod env;
pub mod handler;
pub mod mountain_car;
pub mod reacher;

pub use acrobot::{AcrobotAdapter, AcrobotEnv};
pub use cartpole::{CartPoleAdapter, CartPoleEnv};
pub use env::{Environment, Episode, StepResult, TimeLimit};
pub use handler::{EnvironmentAdapter, GymHandler};
pub use mountain_car::{MountainCarAdapter, MountainCarContinuousEnv};
pub use reacher::{ReacherAdapter, ReacherEnv};

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use thoughtforge_client::SessionHandler;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown environment '{0}' (expected one of: cartpole, mountaincar, acrobot, reacher)")]
pub struct UnknownEnvironment(pub String);

/// The example environments shipped with the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleEnvironment {
    CartPole,
    MountainCar,
    Acrobot,
    Reacher,
}

impl ExampleEnvironment {
    pub const ALL: [ExampleEnvironment; 4] = [
        ExampleEnvironment::CartPole,
        ExampleEnvironment::MountainCar,
        ExampleEnvironment::Acrobot,
        ExampleEnvironment::Reacher,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExampleEnvironment::CartPole => "cartpole",
            ExampleEnvironment::MountainCar => "mountaincar",
            ExampleEnvironment::Acrobot => "acrobot",
            ExampleEnvironment::Reacher => "reacher",
        }
    }

    /// Session config file shipped for this environment, relative to the repository root
    pub fn default_params_file(self) -> String {
        format!("configs/{}.params", self.name())
    }

    /// Session handler driving a fresh instance of this environment
    pub fn handler(self, seed: u64) -> Box<dyn SessionHandler> {
        match self {
            ExampleEnvironment::CartPole => Box::new(GymHandler::new(CartPoleAdapter, seed)),
            ExampleEnvironment::MountainCar => Box::new(GymHandler::new(MountainCarAdapter, seed)),
            ExampleEnvironment::Acrobot => Box::new(GymHandler::new(AcrobotAdapter, seed)),
            ExampleEnvironment::Reacher => {
                Box::new(GymHandler::new(ReacherAdapter::default(), seed))
            }
        }
    }
}

impl Display for ExampleEnvironment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExampleEnvironment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|env| env.name() == normalized)
            .ok_or_else(|| UnknownEnvironment(s.to_string()))
    }
}
