// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Session handler that drives an [`Environment`] from motor commands

use crate::env::{Environment, Episode};
use thoughtforge_client::{ClientError, LookupError, NamedValues, SessionHandler, SessionInfo};
use tracing::{debug, info};

type Observation<A> = <<A as EnvironmentAdapter>::Env as Environment>::Observation;
type Action<A> = <<A as EnvironmentAdapter>::Env as Environment>::Action;

/// Maps between one environment and the sensors and motors of its session config
pub trait EnvironmentAdapter {
    type Env: Environment;

    /// Create a fresh environment seeded with `seed`
    fn make_env(&self, seed: u64) -> Self::Env;

    /// Translate a motor command into an environment action
    fn action(&self, motor_command: &NamedValues) -> Result<Action<Self>, LookupError>;

    /// Derive sensor readings from the environment after a step
    fn sensors(&mut self, env: &Self::Env, observation: &Observation<Self>) -> NamedValues;

    /// Clear per-episode state; called at start and after every episode reset
    fn episode_reset(&mut self) {}
}

/// [`SessionHandler`] running one environment per simulation
///
/// The environment is created when the simulation starts and dropped when it ends.
pub struct GymHandler<A: EnvironmentAdapter> {
    adapter: A,
    seed: u64,
    episode: Option<Episode<A::Env>>,
    scores: Vec<f64>,
}

impl<A: EnvironmentAdapter> GymHandler<A> {
    pub fn new(adapter: A, seed: u64) -> Self {
        Self {
            adapter,
            seed,
            episode: None,
            scores: Vec::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn episode(&self) -> Option<&Episode<A::Env>> {
        self.episode.as_ref()
    }

    /// Scores of every completed episode, including those of ended simulations
    pub fn scores(&self) -> Vec<f64> {
        let mut scores = self.scores.clone();
        if let Some(episode) = &self.episode {
            scores.extend_from_slice(episode.scores());
        }
        scores
    }
}

impl<A: EnvironmentAdapter> SessionHandler for GymHandler<A> {
    fn update(&mut self, motor_command: &NamedValues) -> thoughtforge_client::Result<NamedValues> {
        let episode = self.episode.as_mut().ok_or(ClientError::SessionNotActive)?;

        let action = self.adapter.action(motor_command)?;
        if episode.advance(action)? {
            self.adapter.episode_reset();
        }
        Ok(self.adapter.sensors(episode.env(), episode.observation()))
    }

    fn sim_started(&mut self, info: &SessionInfo) -> thoughtforge_client::Result<()> {
        let env = self.adapter.make_env(self.seed);
        info!("Initializing {} for session {}", env.id(), info.session_id);
        self.episode = Some(Episode::start(env)?);
        self.adapter.episode_reset();
        Ok(())
    }

    fn sim_ended(&mut self) {
        if let Some(episode) = self.episode.take() {
            debug!(
                "{}: closing environment after {} completed episodes",
                episode.env().id(),
                episode.scores().len()
            );
            self.scores.extend_from_slice(episode.scores());
        }
    }
}
