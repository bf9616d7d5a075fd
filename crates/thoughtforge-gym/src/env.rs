// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Environment interface shared by the example environments

use anyhow::Result;
use tracing::info;

/// A resettable, steppable simulation
pub trait Environment {
    type Observation: Clone;
    type Action;

    /// Short identifier used in logs
    fn id(&self) -> &'static str;

    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Result<Self::Observation>;

    /// Advance the simulation by one step
    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>>;
}

/// Result of an environment step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult<O> {
    pub observation: O,
    pub reward: f64,
    /// The episode reached a terminal state
    pub terminated: bool,
    /// The episode was cut short by a step limit
    pub truncated: bool,
}

impl<O> StepResult<O> {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Caps episodes at a fixed number of steps
#[derive(Debug, Clone)]
pub struct TimeLimit<E> {
    inner: E,
    max_episode_steps: u32,
    elapsed_steps: u32,
}

impl<E: Environment> TimeLimit<E> {
    pub fn new(inner: E, max_episode_steps: u32) -> Self {
        Self {
            inner,
            max_episode_steps,
            elapsed_steps: 0,
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.inner
    }

    pub fn elapsed_steps(&self) -> u32 {
        self.elapsed_steps
    }

    pub fn max_episode_steps(&self) -> u32 {
        self.max_episode_steps
    }
}

impl<E: Environment> Environment for TimeLimit<E> {
    type Observation = E::Observation;
    type Action = E::Action;

    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn reset(&mut self) -> Result<Self::Observation> {
        self.elapsed_steps = 0;
        self.inner.reset()
    }

    fn step(&mut self, action: Self::Action) -> Result<StepResult<Self::Observation>> {
        let mut result = self.inner.step(action)?;
        self.elapsed_steps += 1;
        if self.elapsed_steps >= self.max_episode_steps {
            result.truncated = true;
        }
        Ok(result)
    }
}

/// Runs consecutive episodes, resetting whenever one ends
pub struct Episode<E: Environment> {
    env: E,
    observation: E::Observation,
    score: f64,
    scores: Vec<f64>,
}

impl<E: Environment> Episode<E> {
    /// Reset `env` and begin the first episode
    pub fn start(mut env: E) -> Result<Self> {
        let observation = env.reset()?;
        Ok(Self {
            env,
            observation,
            score: 0.0,
            scores: Vec::new(),
        })
    }

    /// Step with `action`; returns true if an episode ended and a new one began
    pub fn advance(&mut self, action: E::Action) -> Result<bool> {
        let result = self.env.step(action)?;
        self.score += result.reward;

        if result.is_done() {
            info!(
                "{}: end of episode {}. Score = {:.2}",
                self.env.id(),
                self.scores.len() + 1,
                self.score
            );
            self.scores.push(self.score);
            self.score = 0.0;
            self.observation = self.env.reset()?;
            return Ok(true);
        }

        self.observation = result.observation;
        Ok(false)
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn observation(&self) -> &E::Observation {
        &self.observation
    }

    /// Reward accumulated in the running episode
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Final scores of completed episodes
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}
