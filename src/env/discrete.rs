//! The discrete toy MDP: transition table and rewardable sequences
//! generated at construction, flat internal states, factored external
//! states when the space is multi-discrete.

use log::{info, warn};
use rand_chacha::ChaCha8Rng;

use crate::codec::DimensionPartition;
use crate::config::{DiscreteSpaces, EnvConfig, NoiseStrategy, SpacesConfig};
use crate::reward::SequenceRewards;
use crate::seeding::SeedSuite;
use crate::spaces::{
    categorical_index, DiscreteSpace, MultiDiscreteSpace, Space, SpaceElement, SpaceError,
};
use crate::terminal::DiscreteTerminals;
use crate::transition::DiscreteTransitions;

use super::{EnvError, Environment, EpisodeStats, Step, StepInfo};

/// A generated MDP over discrete state and action spaces.
///
/// Internally every state and action is a flat index into its relevant or
/// irrelevant sub-space; the codec translates to and from factored points
/// at the boundary. The relevant and irrelevant dynamics are independent,
/// each generated from its own seeded sampler.
pub struct DiscreteMdp {
    seeds: SeedSuite,
    env_rng: ChaCha8Rng,
    augmented_state_length: usize,
    reward_scale: f64,
    reward_shift: f64,
    term_state_reward: f64,
    reward_noise: NoiseStrategy,
    transition_noise: f64,
    state_partition: Option<DimensionPartition>,
    action_partition: Option<DimensionPartition>,
    relevant_state_space: DiscreteSpace,
    irrelevant_state_space: Option<DiscreteSpace>,
    observation_space: Space,
    action_space: Space,
    transitions: DiscreteTransitions,
    irrelevant_transitions: Option<DiscreteTransitions>,
    terminals: DiscreteTerminals,
    init_state_dist: Vec<f64>,
    irrelevant_init_state_dist: Option<Vec<f64>>,
    rewards: SequenceRewards,
    augmented_state: Vec<Option<usize>>,
    curr_state_relevant: usize,
    curr_state_irrelevant: Option<usize>,
    done: bool,
    stats: EpisodeStats,
    total_episodes: u64,
}

impl DiscreteMdp {
    /// Build the engine from a validated configuration. Generation order is
    /// fixed: terminal states, initial state distribution, transition
    /// tables, rewardable sequences, then the first reset.
    pub fn new(config: EnvConfig) -> Result<DiscreteMdp, EnvError> {
        config.validate()?;
        let spaces_config: DiscreteSpaces = match &config.spaces {
            SpacesConfig::Discrete(spaces) => spaces.clone(),
            SpacesConfig::Continuous(_) => {
                return Err(EnvError::UnsupportedMethod(String::from(
                    "DiscreteMdp requires a discrete spaces configuration",
                )))
            }
        };
        let (seeds, mut env_rng) = SeedSuite::derive(config.seed);
        warn!("Seeds set to {:?}", seeds);

        let state_partition = spaces_config.state_partition();
        let action_partition = spaces_config.action_partition();
        let num_relevant_states = spaces_config.relevant_state_size();
        let num_irrelevant_states = spaces_config.irrelevant_state_size();
        let num_relevant_actions = spaces_config.relevant_action_size();
        let num_irrelevant_actions = spaces_config.irrelevant_action_size();
        info!(
            "Relevant state space size {}, irrelevant state space size {}",
            num_relevant_states, num_irrelevant_states
        );

        let mut relevant_state_space =
            DiscreteSpace::new(num_relevant_states, seeds.relevant_state_space);
        let mut irrelevant_state_space = if num_irrelevant_states > 0 {
            Some(DiscreteSpace::new(
                num_irrelevant_states,
                seeds.irrelevant_state_space,
            ))
        } else {
            None
        };

        let observation_space = match &state_partition {
            Some(partition) => Space::MultiDiscrete(MultiDiscreteSpace::new(
                partition.sizes().to_vec(),
                seeds.state_space,
            )),
            None => Space::Discrete(DiscreteSpace::new(
                num_relevant_states,
                seeds.relevant_state_space,
            )),
        };
        let action_space = match &action_partition {
            Some(partition) => Space::MultiDiscrete(MultiDiscreteSpace::new(
                partition.sizes().to_vec(),
                seeds.action_space,
            )),
            None => Space::Discrete(DiscreteSpace::new(
                num_relevant_actions,
                seeds.relevant_action_space,
            )),
        };

        let terminals =
            DiscreteTerminals::new(num_relevant_states, spaces_config.num_terminal_states());
        info!(
            "Terminal states are the {} states from {} up",
            terminals.num_terminal(),
            terminals.first_terminal()
        );

        let num_non_terminal = terminals.first_terminal();
        let mut init_state_dist = vec![1.0 / num_non_terminal as f64; num_non_terminal];
        init_state_dist.extend(std::iter::repeat(0.0).take(terminals.num_terminal()));
        let irrelevant_init_state_dist = irrelevant_state_space.as_ref().map(|space| {
            vec![1.0 / space.size() as f64; space.size()]
        });

        let transitions = DiscreteTransitions::generate(
            num_relevant_states,
            num_relevant_actions,
            spaces_config.completely_connected,
            terminals.first_terminal(),
            &mut relevant_state_space,
        )?;
        let irrelevant_transitions = match &mut irrelevant_state_space {
            Some(space) if num_irrelevant_actions > 0 => Some(DiscreteTransitions::generate(
                num_irrelevant_states,
                num_irrelevant_actions,
                spaces_config.completely_connected,
                num_irrelevant_states,
                space,
            )?),
            _ => None,
        };

        let rewards = SequenceRewards::generate(
            num_non_terminal,
            config.sequence_length,
            config.delay,
            config.reward_density,
            config.reward_scale,
            config.make_denser,
            spaces_config.repeats_in_sequences,
            &mut env_rng,
        )?;

        let mut env = DiscreteMdp {
            seeds,
            env_rng,
            augmented_state_length: config.augmented_state_length(),
            reward_scale: config.reward_scale,
            reward_shift: config.reward_shift,
            term_state_reward: config.term_state_reward,
            reward_noise: config.reward_noise.clone(),
            transition_noise: spaces_config.transition_noise,
            state_partition,
            action_partition,
            relevant_state_space,
            irrelevant_state_space,
            observation_space,
            action_space,
            transitions,
            irrelevant_transitions,
            terminals,
            init_state_dist,
            irrelevant_init_state_dist,
            rewards,
            augmented_state: Vec::new(),
            curr_state_relevant: 0,
            curr_state_irrelevant: None,
            done: false,
            stats: EpisodeStats::default(),
            total_episodes: 0,
        };
        env.reset();
        Ok(env)
    }

    /// The generated transition table over the relevant sub-space.
    pub fn transition_table(&self) -> &ndarray::Array2<usize> {
        self.transitions.table()
    }

    /// The rewardable sequences selected at construction.
    pub fn rewardable_sequences(&self) -> &std::collections::HashSet<Vec<usize>> {
        self.rewards.sequences()
    }

    pub fn terminals(&self) -> &DiscreteTerminals {
        &self.terminals
    }

    /// The relevant state history, oldest first.
    pub fn augmented_state(&self) -> &[Option<usize>] {
        &self.augmented_state
    }

    fn observation(&self) -> SpaceElement {
        match &self.state_partition {
            Some(partition) => SpaceElement::MultiDiscrete(
                partition.join(self.curr_state_relevant, self.curr_state_irrelevant),
            ),
            None => SpaceElement::Discrete(self.curr_state_relevant),
        }
    }

    fn step_info(&self) -> StepInfo {
        StepInfo {
            curr_state: self.observation(),
            augmented_state: self
                .augmented_state
                .iter()
                .map(|state| state.map(SpaceElement::Discrete))
                .collect(),
            state_derivatives: None,
        }
    }

    fn decode_action(&self, action: &SpaceElement) -> Result<(usize, Option<usize>), EnvError> {
        match (action, &self.action_partition) {
            (SpaceElement::Discrete(action), None) => {
                if *action >= self.transitions.num_actions() {
                    return Err(EnvError::InvalidAction(format!(
                        "Action {} outside the action space",
                        action
                    )));
                }
                Ok((*action, None))
            }
            (SpaceElement::MultiDiscrete(coords), Some(partition)) => {
                if coords.len() != partition.num_dimensions()
                    || coords.iter().zip(partition.sizes()).any(|(c, s)| c >= s)
                {
                    return Err(EnvError::InvalidAction(format!(
                        "Action {:?} outside the action space",
                        coords
                    )));
                }
                Ok(partition.split(coords))
            }
            _ => Err(EnvError::InvalidAction(format!(
                "Action {:?} does not match the action space type",
                action
            ))),
        }
    }

    fn decode_state(&self, state: &SpaceElement) -> Result<(usize, Option<usize>), EnvError> {
        match (state, &self.state_partition) {
            (SpaceElement::Discrete(state), None) => {
                if *state >= self.transitions.num_states() {
                    return Err(EnvError::Space(SpaceError::InvalidArgument(format!(
                        "State {} outside the state space",
                        state
                    ))));
                }
                Ok((*state, None))
            }
            (SpaceElement::MultiDiscrete(coords), Some(partition)) => {
                if coords.len() != partition.num_dimensions()
                    || coords.iter().zip(partition.sizes()).any(|(c, s)| c >= s)
                {
                    return Err(EnvError::Space(SpaceError::InvalidArgument(format!(
                        "State {:?} outside the state space",
                        coords
                    ))));
                }
                Ok(partition.split(coords))
            }
            _ => Err(EnvError::Space(SpaceError::InvalidArgument(format!(
                "State {:?} does not match the state space type",
                state
            )))),
        }
    }
}

impl Environment for DiscreteMdp {
    fn reset(&mut self) -> SpaceElement {
        if self.total_episodes != 0 {
            self.stats.log_summary(self.total_episodes);
        }
        self.total_episodes += 1;

        self.curr_state_relevant =
            categorical_index(&mut self.env_rng, &self.init_state_dist).unwrap();
        self.curr_state_irrelevant = self
            .irrelevant_init_state_dist
            .as_ref()
            .map(|dist| categorical_index(&mut self.env_rng, dist).unwrap());

        self.augmented_state = vec![None; self.augmented_state_length - 1];
        self.augmented_state.push(Some(self.curr_state_relevant));
        self.done = false;
        self.stats = EpisodeStats::default();
        self.rewards.reset();

        info!(
            "Reset: episode {}, relevant state {}, irrelevant state {:?}",
            self.total_episodes, self.curr_state_relevant, self.curr_state_irrelevant
        );
        self.observation()
    }

    fn step(&mut self, action: &SpaceElement) -> Result<Step, EnvError> {
        if self.done {
            return Err(EnvError::TerminalStep(format!(
                "Episode {} has already terminated",
                self.total_episodes
            )));
        }
        let (action_relevant, action_irrelevant) = self.decode_action(action)?;
        let previous_relevant = self.curr_state_relevant;

        let (next_relevant, noisy) = self.transitions.noisy_next_state(
            self.curr_state_relevant,
            action_relevant,
            self.transition_noise,
            &mut self.relevant_state_space,
        )?;
        if noisy {
            self.stats.total_noisy_transitions += 1;
        }
        self.curr_state_relevant = next_relevant;

        // The irrelevant sub-space only transitions when it exists and the
        // action has an irrelevant part.
        if let (Some(transitions), Some(space), Some(current), Some(action_irrelevant)) = (
            &self.irrelevant_transitions,
            &mut self.irrelevant_state_space,
            self.curr_state_irrelevant,
            action_irrelevant,
        ) {
            let (next_irrelevant, _) = transitions.noisy_next_state(
                current,
                action_irrelevant,
                self.transition_noise,
                space,
            )?;
            self.curr_state_irrelevant = Some(next_irrelevant);
        }

        self.augmented_state.remove(0);
        self.augmented_state.push(Some(self.curr_state_relevant));
        self.stats.total_transitions += 1;

        let base_reward = self.rewards.evaluate(&self.augmented_state);
        let noise = self.reward_noise.draw(&mut self.env_rng);
        self.stats.total_abs_noise_in_reward += noise.abs();
        self.stats.total_reward += base_reward;
        let mut reward = base_reward + noise + self.reward_shift;

        let done = self.terminals.is_terminal(self.curr_state_relevant);
        if done {
            reward += self.term_state_reward * self.reward_scale;
            self.done = true;
        }

        info!(
            "Episode {} step {}: s {} a {:?} s' {} r {}",
            self.total_episodes,
            self.stats.total_transitions,
            previous_relevant,
            action,
            self.curr_state_relevant,
            reward
        );
        Ok(Step {
            observation: self.observation(),
            reward,
            done,
            info: self.step_info(),
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
        state: &SpaceElement,
        action: &SpaceElement,
    ) -> Result<SpaceElement, EnvError> {
        let (state_relevant, state_irrelevant) = self.decode_state(state)?;
        let (action_relevant, action_irrelevant) = self.decode_action(action)?;
        let next_relevant = self.transitions.next_state(state_relevant, action_relevant);
        let next_irrelevant = match (&self.irrelevant_transitions, state_irrelevant, action_irrelevant)
        {
            (Some(transitions), Some(state), Some(action)) => {
                Some(transitions.next_state(state, action))
            }
            _ => state_irrelevant,
        };
        Ok(match &self.state_partition {
            Some(partition) => {
                SpaceElement::MultiDiscrete(partition.join(next_relevant, next_irrelevant))
            }
            None => SpaceElement::Discrete(next_relevant),
        })
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
            let (relevant, _) = self.decode_state(state)?;
            buffer.push(Some(relevant));
        }
        Ok(self.rewards.evaluate_query(&buffer) + self.reward_shift)
    }

    fn episode_stats(&self) -> &EpisodeStats {
        &self.stats
    }

    fn total_episodes(&self) -> u64 {
        self.total_episodes
    }
}
