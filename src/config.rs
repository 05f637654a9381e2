//! Environment configuration record, defaults and validation.

use itertools::Itertools;
use log::warn;
use ndarray::prelude::*;
use rand::distributions::Distribution;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;
use thiserror::Error;

use crate::codec::DimensionPartition;

/// Error types for the configuration record
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration")]
    Invalid(String),
}

/// Size of a discrete space: a single cardinality, or one cardinality per
/// dimension for factored (multi-discrete) spaces.
#[derive(Clone, Debug, PartialEq)]
pub enum SizeSpec {
    Flat(usize),
    Factored(Vec<usize>),
}

/// Additive noise expressed as a small strategy drawing through the
/// environment generator.
#[derive(Clone, Debug, PartialEq)]
pub enum NoiseStrategy {
    None,
    Gaussian { std_dev: f64 },
    Uniform { low: f64, high: f64 },
}

impl NoiseStrategy {
    /// Draw one noise value. The `None` strategy returns 0 without touching
    /// the generator, so a noise-free engine consumes the same stream as one
    /// where the option was never set.
    pub fn draw(&self, rng: &mut ChaCha8Rng) -> f64 {
        match self {
            NoiseStrategy::None => 0.0,
            NoiseStrategy::Gaussian { std_dev } => {
                Normal::new(0.0, *std_dev).unwrap().sample(rng)
            }
            NoiseStrategy::Uniform { low, high } => rng.gen_range(*low..*high),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, NoiseStrategy::None)
    }

    fn validate(&self, what: &str) -> Result<(), ConfigError> {
        match self {
            NoiseStrategy::None => Ok(()),
            NoiseStrategy::Gaussian { std_dev } => {
                if !std_dev.is_finite() || *std_dev <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{}: Gaussian std_dev must be positive and finite, was {}",
                        what, std_dev
                    )));
                }
                Ok(())
            }
            NoiseStrategy::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return Err(ConfigError::Invalid(format!(
                        "{}: Uniform bounds must be finite with low < high, were [{}, {})",
                        what, low, high
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Predefined reward functions for continuous spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinuousRewardKind {
    MoveToAPoint,
    MoveAlongALine,
}

/// Options specific to discrete state and action spaces.
#[derive(Clone, Debug)]
pub struct DiscreteSpaces {
    pub state_space_size: SizeSpec,
    pub action_space_size: SizeSpec,
    /// Relevant dimensions of a factored state space. `None` means every
    /// dimension is relevant. Ignored with a warning for flat spaces.
    pub state_space_relevant_indices: Option<Vec<usize>>,
    pub action_space_relevant_indices: Option<Vec<usize>>,
    /// Fraction of relevant states that are terminal. Terminal states are
    /// the last states of the flat range.
    pub terminal_state_density: f64,
    /// Every row of the transition table becomes a permutation of the
    /// relevant state set.
    pub completely_connected: bool,
    /// Whether rewardable sequences may contain a state twice.
    pub repeats_in_sequences: bool,
    /// Probability of transitioning to a uniformly drawn other state
    /// instead of the one the table prescribes.
    pub transition_noise: f64,
}

impl Default for DiscreteSpaces {
    fn default() -> DiscreteSpaces {
        DiscreteSpaces {
            state_space_size: SizeSpec::Flat(6),
            action_space_size: SizeSpec::Flat(6),
            state_space_relevant_indices: None,
            action_space_relevant_indices: None,
            terminal_state_density: 0.25,
            completely_connected: false,
            repeats_in_sequences: false,
            transition_noise: 0.0,
        }
    }
}

impl DiscreteSpaces {
    /// Partition of the factored state dimensions, or `None` for a flat
    /// space.
    pub fn state_partition(&self) -> Option<DimensionPartition> {
        DiscreteSpaces::partition(&self.state_space_size, &self.state_space_relevant_indices)
    }

    /// Partition of the factored action dimensions, or `None` for a flat
    /// space.
    pub fn action_partition(&self) -> Option<DimensionPartition> {
        DiscreteSpaces::partition(&self.action_space_size, &self.action_space_relevant_indices)
    }

    fn partition(
        size: &SizeSpec,
        relevant: &Option<Vec<usize>>,
    ) -> Option<DimensionPartition> {
        match size {
            SizeSpec::Flat(_) => None,
            SizeSpec::Factored(sizes) => {
                let relevant = match relevant {
                    Some(indices) => indices.clone(),
                    None => (0..sizes.len()).collect(),
                };
                Some(DimensionPartition::new(sizes, &relevant))
            }
        }
    }

    pub fn relevant_state_size(&self) -> usize {
        match self.state_partition() {
            Some(partition) => partition.relevant_flat_size(),
            None => match self.state_space_size {
                SizeSpec::Flat(n) => n,
                SizeSpec::Factored(_) => unreachable!(),
            },
        }
    }

    pub fn irrelevant_state_size(&self) -> usize {
        self.state_partition()
            .map_or(0, |partition| partition.irrelevant_flat_size())
    }

    pub fn relevant_action_size(&self) -> usize {
        match self.action_partition() {
            Some(partition) => partition.relevant_flat_size(),
            None => match self.action_space_size {
                SizeSpec::Flat(n) => n,
                SizeSpec::Factored(_) => unreachable!(),
            },
        }
    }

    pub fn irrelevant_action_size(&self) -> usize {
        self.action_partition()
            .map_or(0, |partition| partition.irrelevant_flat_size())
    }

    /// Number of terminal states implied by the terminal state density.
    pub fn num_terminal_states(&self) -> usize {
        (self.terminal_state_density * self.relevant_state_size() as f64).round() as usize
    }
}

/// Options specific to continuous state and action spaces.
#[derive(Clone, Debug)]
pub struct ContinuousSpaces {
    pub state_space_dim: usize,
    pub action_space_dim: usize,
    /// Bound of the observation box `[-max, max]^dim`. May be infinite.
    pub state_space_max: f64,
    pub action_space_max: f64,
    pub state_space_relevant_indices: Option<Vec<usize>>,
    pub action_space_relevant_indices: Option<Vec<usize>>,
    /// The action sets the derivative of this order.
    pub transition_dynamics_order: usize,
    /// Divisor on the action magnitude.
    pub inertia: f64,
    /// Integration step.
    pub time_unit: f64,
    pub reward_function: ContinuousRewardKind,
    pub target_point: Option<Array1<f64>>,
    pub target_radius: f64,
    /// Centres of the terminal hypercubes, in relevant coordinates.
    pub terminal_states: Vec<Array1<f64>>,
    /// Edge length of the terminal hypercubes.
    pub term_state_edge: f64,
    pub transition_noise: NoiseStrategy,
}

impl Default for ContinuousSpaces {
    fn default() -> ContinuousSpaces {
        ContinuousSpaces {
            state_space_dim: 2,
            action_space_dim: 2,
            state_space_max: f64::INFINITY,
            action_space_max: f64::INFINITY,
            state_space_relevant_indices: None,
            action_space_relevant_indices: None,
            transition_dynamics_order: 1,
            inertia: 1.0,
            time_unit: 1.0,
            reward_function: ContinuousRewardKind::MoveAlongALine,
            target_point: None,
            target_radius: 0.5,
            terminal_states: Vec::new(),
            term_state_edge: 1.0,
            transition_noise: NoiseStrategy::None,
        }
    }
}

impl ContinuousSpaces {
    /// The relevant dimension indices, defaulting to every dimension.
    pub fn relevant_indices(&self) -> Vec<usize> {
        match &self.state_space_relevant_indices {
            Some(indices) => indices.clone(),
            None => (0..self.state_space_dim).collect(),
        }
    }
}

/// Branch selector between the two space families. Mixed discrete and
/// continuous spaces are not representable.
#[derive(Clone, Debug)]
pub enum SpacesConfig {
    Discrete(DiscreteSpaces),
    Continuous(ContinuousSpaces),
}

/// Full configuration of one environment. Immutable after construction.
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// Seed for the generator suite. Drawn from entropy when `None`.
    pub seed: Option<u64>,
    /// The reward is paid for a sequence that ended this many steps ago.
    pub delay: usize,
    /// Length of the rewardable sequences.
    pub sequence_length: usize,
    /// Fraction of the possible sequences selected as rewardable.
    pub reward_density: f64,
    pub reward_scale: f64,
    pub reward_shift: f64,
    /// Added (scaled) to the reward of a terminal transition.
    pub term_state_reward: f64,
    /// Hand out partial rewards for prefixes of rewardable sequences.
    pub make_denser: bool,
    pub reward_noise: NoiseStrategy,
    pub spaces: SpacesConfig,
}

impl Default for EnvConfig {
    fn default() -> EnvConfig {
        EnvConfig {
            seed: None,
            delay: 0,
            sequence_length: 1,
            reward_density: 0.25,
            reward_scale: 1.0,
            reward_shift: 0.0,
            term_state_reward: 0.0,
            make_denser: false,
            reward_noise: NoiseStrategy::None,
            spaces: SpacesConfig::Discrete(DiscreteSpaces::default()),
        }
    }
}

impl EnvConfig {
    /// Length of the augmented state buffer.
    pub fn augmented_state_length(&self) -> usize {
        self.delay + self.sequence_length + 1
    }

    /// Check the whole record for contradictions. Field combinations that
    /// are merely meaningless for the selected branch are warned about and
    /// ignored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequence_length == 0 {
            return Err(ConfigError::Invalid(String::from(
                "sequence_length must be positive",
            )));
        }
        if !(0.0..=1.0).contains(&self.reward_density) {
            return Err(ConfigError::Invalid(format!(
                "reward_density must lie in [0, 1], was {}",
                self.reward_density
            )));
        }
        self.reward_noise.validate("reward_noise")?;

        match &self.spaces {
            SpacesConfig::Discrete(spaces) => self.validate_discrete(spaces),
            SpacesConfig::Continuous(spaces) => self.validate_continuous(spaces),
        }
    }

    fn validate_discrete(&self, spaces: &DiscreteSpaces) -> Result<(), ConfigError> {
        validate_size(&spaces.state_space_size, "state_space_size")?;
        validate_size(&spaces.action_space_size, "action_space_size")?;
        validate_relevant_indices(
            &spaces.state_space_size,
            &spaces.state_space_relevant_indices,
            "state_space_relevant_indices",
        )?;
        validate_relevant_indices(
            &spaces.action_space_size,
            &spaces.action_space_relevant_indices,
            "action_space_relevant_indices",
        )?;

        if !(0.0..=1.0).contains(&spaces.terminal_state_density) {
            return Err(ConfigError::Invalid(format!(
                "terminal_state_density must lie in [0, 1], was {}",
                spaces.terminal_state_density
            )));
        }
        if !(0.0..1.0).contains(&spaces.transition_noise) {
            return Err(ConfigError::Invalid(format!(
                "transition_noise must lie in [0, 1), was {}",
                spaces.transition_noise
            )));
        }

        let num_terminal = spaces.num_terminal_states();
        let non_terminal = spaces.relevant_state_size() - num_terminal;
        if non_terminal == 0 {
            return Err(ConfigError::Invalid(String::from(
                "terminal_state_density leaves no non-terminal state",
            )));
        }

        if spaces.completely_connected {
            if spaces.relevant_state_size() != spaces.relevant_action_size() {
                return Err(ConfigError::Invalid(format!(
                    "completely_connected requires equal relevant state and action sizes, were {} and {}",
                    spaces.relevant_state_size(),
                    spaces.relevant_action_size()
                )));
            }
            if spaces.irrelevant_state_size() != spaces.irrelevant_action_size() {
                return Err(ConfigError::Invalid(format!(
                    "completely_connected requires equal irrelevant state and action sizes, were {} and {}",
                    spaces.irrelevant_state_size(),
                    spaces.irrelevant_action_size()
                )));
            }
        }

        if !spaces.repeats_in_sequences && self.sequence_length > non_terminal {
            return Err(ConfigError::Invalid(format!(
                "sequence_length {} exceeds the {} non-terminal states and repeats are disabled",
                self.sequence_length, non_terminal
            )));
        }
        Ok(())
    }

    fn validate_continuous(&self, spaces: &ContinuousSpaces) -> Result<(), ConfigError> {
        if spaces.state_space_dim == 0 {
            return Err(ConfigError::Invalid(String::from(
                "state_space_dim must be positive",
            )));
        }
        if spaces.state_space_dim != spaces.action_space_dim {
            return Err(ConfigError::Invalid(format!(
                "state_space_dim {} != action_space_dim {}",
                spaces.state_space_dim, spaces.action_space_dim
            )));
        }
        if !(spaces.state_space_max > 0.0) || !(spaces.action_space_max > 0.0) {
            return Err(ConfigError::Invalid(String::from(
                "space bounds must be positive",
            )));
        }
        if spaces.transition_dynamics_order == 0 {
            return Err(ConfigError::Invalid(String::from(
                "transition_dynamics_order must be positive",
            )));
        }
        if !spaces.inertia.is_finite() || spaces.inertia <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "inertia must be positive and finite, was {}",
                spaces.inertia
            )));
        }
        if !spaces.time_unit.is_finite() || spaces.time_unit <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_unit must be positive and finite, was {}",
                spaces.time_unit
            )));
        }
        spaces.transition_noise.validate("transition_noise")?;

        validate_index_list(
            &spaces.state_space_relevant_indices,
            spaces.state_space_dim,
            "state_space_relevant_indices",
        )?;
        validate_index_list(
            &spaces.action_space_relevant_indices,
            spaces.action_space_dim,
            "action_space_relevant_indices",
        )?;
        let relevant = spaces.relevant_indices();
        let action_relevant = match &spaces.action_space_relevant_indices {
            Some(indices) => indices.clone(),
            None => (0..spaces.action_space_dim).collect(),
        };
        if relevant != action_relevant {
            return Err(ConfigError::Invalid(String::from(
                "state and action relevant indices must be equal for continuous spaces",
            )));
        }
        if !(spaces.term_state_edge > 0.0) {
            return Err(ConfigError::Invalid(String::from(
                "term_state_edge must be positive",
            )));
        }
        for (i, centre) in spaces.terminal_states.iter().enumerate() {
            if centre.len() != relevant.len() {
                return Err(ConfigError::Invalid(format!(
                    "terminal state centre {} has dimensionality {} instead of {}",
                    i,
                    centre.len(),
                    relevant.len()
                )));
            }
        }

        match spaces.reward_function {
            ContinuousRewardKind::MoveToAPoint => {
                let target = spaces.target_point.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(String::from(
                        "move_to_a_point requires a target_point",
                    ))
                })?;
                if target.len() != relevant.len() {
                    return Err(ConfigError::Invalid(format!(
                        "target_point has dimensionality {} instead of {}",
                        target.len(),
                        relevant.len()
                    )));
                }
                if !(spaces.target_radius > 0.0) {
                    return Err(ConfigError::Invalid(String::from(
                        "target_radius must be positive",
                    )));
                }
                if self.sequence_length != 1 {
                    return Err(ConfigError::Invalid(format!(
                        "move_to_a_point requires sequence_length 1, was {}",
                        self.sequence_length
                    )));
                }
            }
            ContinuousRewardKind::MoveAlongALine => {
                if spaces.target_point.is_some() {
                    warn!("target_point is ignored by move_along_a_line");
                }
            }
        }
        Ok(())
    }
}

fn validate_size(size: &SizeSpec, what: &str) -> Result<(), ConfigError> {
    match size {
        SizeSpec::Flat(n) => {
            if *n == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", what)));
            }
        }
        SizeSpec::Factored(sizes) => {
            if sizes.is_empty() || sizes.iter().any(|s| *s == 0) {
                return Err(ConfigError::Invalid(format!(
                    "{} must hold positive cardinalities, was {:?}",
                    what, sizes
                )));
            }
        }
    }
    Ok(())
}

fn validate_relevant_indices(
    size: &SizeSpec,
    indices: &Option<Vec<usize>>,
    what: &str,
) -> Result<(), ConfigError> {
    match (size, indices) {
        (_, None) => Ok(()),
        (SizeSpec::Flat(_), Some(_)) => {
            warn!("{} is ignored for a flat discrete space", what);
            Ok(())
        }
        (SizeSpec::Factored(sizes), Some(indices)) => {
            validate_index_list(&Some(indices.clone()), sizes.len(), what)
        }
    }
}

fn validate_index_list(
    indices: &Option<Vec<usize>>,
    num_dimensions: usize,
    what: &str,
) -> Result<(), ConfigError> {
    let indices = match indices {
        Some(indices) => indices,
        None => return Ok(()),
    };
    if indices.is_empty() {
        return Err(ConfigError::Invalid(format!("{} must not be empty", what)));
    }
    if indices.iter().any(|i| *i >= num_dimensions) {
        return Err(ConfigError::Invalid(format!(
            "{} contains an index outside the {} dimensions",
            what, num_dimensions
        )));
    }
    if !indices.iter().tuple_windows().all(|(a, b)| a < b) {
        return Err(ConfigError::Invalid(format!(
            "{} must be strictly increasing",
            what
        )));
    }
    Ok(())
}
