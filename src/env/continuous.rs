//! The continuous toy MDP: an n-th order point mass with a choice of
//! predefined reward functions over the relevant coordinates.

use log::{info, warn};
use ndarray::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::{
    ContinuousRewardKind, ContinuousSpaces, EnvConfig, NoiseStrategy, SpacesConfig,
};
use crate::reward::continuous::{line_deviation, move_to_point_delta, within_target_radius};
use crate::seeding::SeedSuite;
use crate::spaces::{BoxSpace, Space, SpaceElement, SpaceError, SpaceTrait};
use crate::terminal::ContinuousTerminals;
use crate::transition::ContinuousDynamics;

use super::{EnvError, Environment, EpisodeStats, Step, StepInfo};

/// A point mass MDP over continuous state and action spaces.
///
/// The action sets the highest state derivative and the state evolves by
/// truncated Taylor integration. States escaping the observation box are
/// clipped, with all derivatives reset. The reward reads the relevant
/// coordinates of the augmented state history.
pub struct ContinuousMdp {
    seeds: SeedSuite,
    env_rng: ChaCha8Rng,
    dim: usize,
    relevant_indices: Vec<usize>,
    augmented_state_length: usize,
    delay: usize,
    sequence_length: usize,
    reward_scale: f64,
    reward_shift: f64,
    term_state_reward: f64,
    make_denser: bool,
    reward_noise: NoiseStrategy,
    transition_noise: NoiseStrategy,
    state_space_max: f64,
    observation_space: Space,
    action_space: Space,
    dynamics: ContinuousDynamics,
    terminals: ContinuousTerminals,
    reward_kind: ContinuousRewardKind,
    target_point: Option<Array1<f64>>,
    target_radius: f64,
    state_derivatives: Vec<Array1<f64>>,
    augmented_state: Vec<Array1<f64>>,
    curr_state: Array1<f64>,
    reached_terminal: bool,
    done: bool,
    stats: EpisodeStats,
    total_episodes: u64,
}

impl ContinuousMdp {
    pub fn new(config: EnvConfig) -> Result<ContinuousMdp, EnvError> {
        config.validate()?;
        let spaces_config: ContinuousSpaces = match &config.spaces {
            SpacesConfig::Continuous(spaces) => spaces.clone(),
            SpacesConfig::Discrete(_) => {
                return Err(EnvError::UnsupportedMethod(String::from(
                    "ContinuousMdp requires a continuous spaces configuration",
                )))
            }
        };
        let (seeds, env_rng) = SeedSuite::derive(config.seed);
        warn!("Seeds set to {:?}", seeds);

        let dim = spaces_config.state_space_dim;
        let observation_space = Space::Box(BoxSpace::symmetric(
            spaces_config.state_space_max,
            dim,
            seeds.state_space,
        )?);
        let action_space = Space::Box(BoxSpace::symmetric(
            spaces_config.action_space_max,
            dim,
            seeds.action_space,
        )?);

        let terminals = ContinuousTerminals::new(
            &spaces_config.terminal_states,
            spaces_config.term_state_edge,
            seeds.env,
        )?;
        let dynamics = ContinuousDynamics::new(
            spaces_config.transition_dynamics_order,
            spaces_config.inertia,
            spaces_config.time_unit,
        );

        let mut env = ContinuousMdp {
            seeds,
            env_rng,
            dim,
            relevant_indices: spaces_config.relevant_indices(),
            augmented_state_length: config.augmented_state_length(),
            delay: config.delay,
            sequence_length: config.sequence_length,
            reward_scale: config.reward_scale,
            reward_shift: config.reward_shift,
            term_state_reward: config.term_state_reward,
            make_denser: config.make_denser,
            reward_noise: config.reward_noise.clone(),
            transition_noise: spaces_config.transition_noise.clone(),
            state_space_max: spaces_config.state_space_max,
            observation_space,
            action_space,
            dynamics,
            terminals,
            reward_kind: spaces_config.reward_function,
            target_point: spaces_config.target_point.clone(),
            target_radius: spaces_config.target_radius,
            state_derivatives: Vec::new(),
            augmented_state: Vec::new(),
            curr_state: Array1::zeros(dim),
            reached_terminal: false,
            done: false,
            stats: EpisodeStats::default(),
            total_episodes: 0,
        };
        env.reset();
        Ok(env)
    }

    /// Current state derivatives, entry k being the k-th time derivative.
    pub fn state_derivatives(&self) -> &[Array1<f64>] {
        &self.state_derivatives
    }

    /// The full state history the reward reads, oldest first. Entries of a
    /// fresh episode are NaN filled.
    pub fn augmented_state(&self) -> &[Array1<f64>] {
        &self.augmented_state
    }

    /// Begin a new episode from a caller-fixed start state instead of a
    /// drawn one. Useful for scripted rollouts.
    pub fn reset_to(&mut self, state: Array1<f64>) -> Result<SpaceElement, EnvError> {
        if state.len() != self.dim {
            return Err(EnvError::Space(SpaceError::InvalidArgument(format!(
                "Start state of dimensionality {} instead of {}",
                state.len(),
                self.dim
            ))));
        }
        if self.total_episodes != 0 {
            self.stats.log_summary(self.total_episodes);
        }
        self.total_episodes += 1;
        self.begin_episode(state);
        Ok(SpaceElement::Continuous(self.curr_state.clone()))
    }

    fn begin_episode(&mut self, state: Array1<f64>) {
        self.curr_state = state;
        self.state_derivatives = vec![Array1::zeros(self.dim); self.dynamics.order() + 1];
        self.state_derivatives[0] = self.curr_state.clone();
        self.augmented_state =
            vec![Array1::from_elem(self.dim, f64::NAN); self.augmented_state_length - 1];
        self.augmented_state.push(self.curr_state.clone());
        self.reached_terminal = false;
        self.done = false;
        self.stats = EpisodeStats::default();
        info!(
            "Reset: episode {}, state {}",
            self.total_episodes, self.curr_state
        );
    }

    fn relevant_of(&self, state: &Array1<f64>) -> Array1<f64> {
        self.relevant_indices.iter().map(|&i| state[i]).collect()
    }

    /// Whether the buffer still carries post-reset padding at its head.
    fn buffer_warming_up(augmented: &[Array1<f64>]) -> bool {
        augmented[0][0].is_nan()
    }

    /// Reward of the supplied history, before noise and shift.
    fn compute_reward(&self, augmented: &[Array1<f64>]) -> f64 {
        if ContinuousMdp::buffer_warming_up(augmented) {
            return 0.0;
        }
        let length = augmented.len();
        match self.reward_kind {
            ContinuousRewardKind::MoveAlongALine => {
                let window = &augmented[1..length - self.delay];
                let mut points = Array2::zeros((window.len(), self.relevant_indices.len()));
                for (row, state) in window.iter().enumerate() {
                    points.row_mut(row).assign(&self.relevant_of(state));
                }
                -line_deviation(&points) * self.reward_scale / self.sequence_length as f64
            }
            ContinuousRewardKind::MoveToAPoint => {
                let target = self.target_point.as_ref().unwrap();
                let new_relevant = self.relevant_of(&augmented[length - 1 - self.delay]);
                if self.make_denser {
                    let old_relevant = self.relevant_of(&augmented[length - 2 - self.delay]);
                    self.reward_scale * move_to_point_delta(&old_relevant, &new_relevant, target)
                } else if within_target_radius(&new_relevant, target, self.target_radius) {
                    self.reward_scale
                } else {
                    0.0
                }
            }
        }
    }

    /// Flag the episode as terminal once the undelayed current state enters
    /// the target radius of `move_to_a_point`.
    fn update_reached_terminal(&mut self) {
        if self.reward_kind != ContinuousRewardKind::MoveToAPoint {
            return;
        }
        if ContinuousMdp::buffer_warming_up(&self.augmented_state) {
            return;
        }
        let target = self.target_point.as_ref().unwrap();
        let curr_relevant = self.relevant_of(&self.curr_state);
        if within_target_radius(&curr_relevant, target, self.target_radius) {
            self.reached_terminal = true;
        }
    }
}

impl Environment for ContinuousMdp {
    fn reset(&mut self) -> SpaceElement {
        if self.total_episodes != 0 {
            self.stats.log_summary(self.total_episodes);
        }
        self.total_episodes += 1;

        // Rejection sample until the start state is non-terminal.
        let start = loop {
            let candidate = match self.observation_space.sample() {
                SpaceElement::Continuous(point) => point,
                _ => unreachable!(),
            };
            let relevant = self.relevant_of(&candidate);
            if !self.terminals.is_terminal(relevant.view()) {
                break candidate;
            }
            info!(
                "Start state {} inside a terminal region, resampling",
                candidate
            );
        };
        self.begin_episode(start);
        SpaceElement::Continuous(self.curr_state.clone())
    }

    fn step(&mut self, action: &SpaceElement) -> Result<Step, EnvError> {
        if self.done {
            return Err(EnvError::TerminalStep(format!(
                "Episode {} has already terminated",
                self.total_episodes
            )));
        }
        let action_vector = match action {
            SpaceElement::Continuous(vector) if vector.len() == self.dim => vector.clone(),
            _ => {
                return Err(EnvError::InvalidAction(format!(
                    "Action {:?} does not match the action space type",
                    action
                )))
            }
        };
        let previous_state = self.curr_state.clone();

        if self.action_space.contains(action) {
            self.dynamics
                .integrate(&mut self.state_derivatives, &action_vector);
            // Noise goes on the state only, never on higher derivatives.
            let noise = self.transition_noise.draw(&mut self.env_rng);
            self.stats.total_abs_noise_in_transition += noise.abs();
            self.state_derivatives[0].mapv_inplace(|v| v + noise);

            let next_state = SpaceElement::Continuous(self.state_derivatives[0].clone());
            if !self.observation_space.contains(&next_state) {
                let clipped = self.state_derivatives[0]
                    .mapv(|v| v.clamp(-self.state_space_max, self.state_space_max));
                warn!(
                    "Next state {} outside the observation space, clipping to {}",
                    self.state_derivatives[0], clipped
                );
                for derivative in self.state_derivatives.iter_mut().skip(1) {
                    derivative.fill(0.0);
                }
                self.state_derivatives[0] = clipped;
            }
            self.curr_state = self.state_derivatives[0].clone();
        } else {
            warn!(
                "Action {} outside the action space, applying no-op",
                action_vector
            );
        }

        self.augmented_state.remove(0);
        self.augmented_state.push(self.curr_state.clone());
        self.stats.total_transitions += 1;

        let base_reward = self.compute_reward(&self.augmented_state);
        self.update_reached_terminal();
        let noise = self.reward_noise.draw(&mut self.env_rng);
        self.stats.total_abs_noise_in_reward += noise.abs();
        self.stats.total_reward += base_reward;
        let mut reward = base_reward + noise + self.reward_shift;

        let last_relevant = self.relevant_of(self.augmented_state.last().unwrap());
        let done = self.terminals.is_terminal(last_relevant.view()) || self.reached_terminal;
        if done {
            reward += self.term_state_reward * self.reward_scale;
            self.done = true;
        }

        info!(
            "Episode {} step {}: s {} a {} s' {} r {}",
            self.total_episodes,
            self.stats.total_transitions,
            previous_state,
            action_vector,
            self.curr_state,
            reward
        );
        Ok(Step {
            observation: SpaceElement::Continuous(self.curr_state.clone()),
            reward,
            done,
            info: StepInfo {
                curr_state: SpaceElement::Continuous(self.curr_state.clone()),
                augmented_state: self
                    .augmented_state
                    .iter()
                    .map(|state| {
                        if state[0].is_nan() {
                            None
                        } else {
                            Some(SpaceElement::Continuous(state.clone()))
                        }
                    })
                    .collect(),
                state_derivatives: Some(self.state_derivatives.clone()),
            },
        })
    }

    fn seed(&self) -> u64 {
        self.seeds.env
    }

    fn observation_space(&mut self) -> &mut Space {
        &mut self.observation_space
    }

    fn action_space(&mut self) -> &mut Space {
        &mut self.action_space
    }

    fn query_transition(
        &self,
        _state: &SpaceElement,
        _action: &SpaceElement,
    ) -> Result<SpaceElement, EnvError> {
        Err(EnvError::UnsupportedMethod(String::from(
            "Imagined transitions are not supported for continuous spaces",
        )))
    }

    fn query_reward(
        &self,
        augmented: &[SpaceElement],
        _action: &SpaceElement,
    ) -> Result<f64, EnvError> {
        if augmented.len() != self.augmented_state_length {
            return Err(EnvError::Space(SpaceError::InvalidArgument(format!(
                "Augmented state of length {} instead of {}",
                augmented.len(),
                self.augmented_state_length
            ))));
        }
        let mut buffer = Vec::with_capacity(augmented.len());
        for state in augmented {
            match state {
                SpaceElement::Continuous(vector) if vector.len() == self.dim => {
                    buffer.push(vector.clone())
                }
                _ => {
                    return Err(EnvError::Space(SpaceError::InvalidArgument(format!(
                        "State {:?} does not match the state space type",
                        state
                    ))))
                }
            }
        }
        Ok(self.compute_reward(&buffer) + self.reward_shift)
    }

    fn episode_stats(&self) -> &EpisodeStats {
        &self.stats
    }

    fn total_episodes(&self) -> u64 {
        self.total_episodes
    }
}
