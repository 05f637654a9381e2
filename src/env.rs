//! The agent-facing environment driver.
//!
//! The two space families are separate types behind the [`Environment`]
//! trait; [`ToyMdp`] dispatches between them and is what callers normally
//! hold.

pub mod continuous;
pub mod discrete;

use enum_dispatch::enum_dispatch;
use log::info;
use ndarray::prelude::*;
use thiserror::Error;

use crate::config::{ConfigError, EnvConfig, SpacesConfig};
use crate::reward::RewardError;
use crate::spaces::{Space, SpaceElement, SpaceError};

pub use continuous::ContinuousMdp;
pub use discrete::DiscreteMdp;

/// Error types for the environment driver
#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigError),
    #[error("Invalid sampler argument")]
    Space(#[from] SpaceError),
    #[error("Invalid reward configuration")]
    Reward(#[from] RewardError),
    #[error("Step called on a terminated episode")]
    TerminalStep(String),
    #[error("Action outside the action space")]
    InvalidAction(String),
    #[error("Unsupported method")]
    UnsupportedMethod(String),
}

/// Everything the engine knows about the underlying Markov state after a
/// transition.
#[derive(Clone, Debug)]
pub struct StepInfo {
    /// The externally visible current state.
    pub curr_state: SpaceElement,
    /// The relevant state history the reward reads. `None` entries are the
    /// padding left by the last reset.
    pub augmented_state: Vec<Option<SpaceElement>>,
    /// Current state derivatives, continuous environments only.
    pub state_derivatives: Option<Vec<Array1<f64>>>,
}

/// Outcome of one transition.
#[derive(Clone, Debug)]
pub struct Step {
    pub observation: SpaceElement,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Per-episode bookkeeping, cleared by `reset`.
#[derive(Clone, Debug, Default)]
pub struct EpisodeStats {
    pub total_transitions: u64,
    pub total_noisy_transitions: u64,
    pub total_abs_noise_in_transition: f64,
    pub total_abs_noise_in_reward: f64,
    /// Sum of the rewards before noise and shift.
    pub total_reward: f64,
}

impl EpisodeStats {
    pub(crate) fn log_summary(&self, episode: u64) {
        info!(
            "Noise stats for episode {}: abs reward noise {}, abs transition noise {}, total reward {}, noisy transitions {}, transitions {}",
            episode,
            self.total_abs_noise_in_reward,
            self.total_abs_noise_in_transition,
            self.total_reward,
            self.total_noisy_transitions,
            self.total_transitions
        );
    }
}

/// The step/reset contract shared by both space families.
#[enum_dispatch(ToyMdp)]
pub trait Environment {
    /// Begin a new episode and return its start observation.
    fn reset(&mut self) -> SpaceElement;

    /// Perform one transition of the MDP.
    fn step(&mut self, action: &SpaceElement) -> Result<Step, EnvError>;

    /// The seed the engine was actually built with.
    fn seed(&self) -> u64;

    fn observation_space(&mut self) -> &mut Space;

    fn action_space(&mut self) -> &mut Space;

    /// Next state for `(state, action)` without touching the environment.
    /// Noise is skipped, so the answer is the deterministic model.
    fn query_transition(
        &self,
        state: &SpaceElement,
        action: &SpaceElement,
    ) -> Result<SpaceElement, EnvError>;

    /// Reward for a caller-supplied augmented state sequence, without
    /// touching the environment. Noise is skipped; the reward shift still
    /// applies.
    fn query_reward(
        &self,
        augmented: &[SpaceElement],
        action: &SpaceElement,
    ) -> Result<f64, EnvError>;

    fn episode_stats(&self) -> &EpisodeStats;

    fn total_episodes(&self) -> u64;
}

/// A generated toy MDP of either space family.
#[enum_dispatch]
pub enum ToyMdp {
    Discrete(DiscreteMdp),
    Continuous(ContinuousMdp),
}

impl ToyMdp {
    /// Validate the configuration and build the engine. The engine comes
    /// back ready to step, with its first episode already started.
    pub fn new(config: EnvConfig) -> Result<ToyMdp, EnvError> {
        match &config.spaces {
            SpacesConfig::Discrete(_) => Ok(ToyMdp::Discrete(DiscreteMdp::new(config)?)),
            SpacesConfig::Continuous(_) => Ok(ToyMdp::Continuous(ContinuousMdp::new(config)?)),
        }
    }
}
