use mdplab::config::{
    ContinuousRewardKind, ContinuousSpaces, DiscreteSpaces, EnvConfig, SizeSpec, SpacesConfig,
};
use mdplab::spaces::SpaceElement;
use ndarray::prelude::*;

/// Discrete configuration with a completely connected transition table and
/// no terminal states. Every state is reachable from every state in one
/// step, so tests can script exact trajectories off the transition table.
#[allow(dead_code)]
pub fn connected_discrete_config(seed: u64) -> EnvConfig {
    let mut config = EnvConfig::default();
    config.seed = Some(seed);
    config.spaces = SpacesConfig::Discrete(DiscreteSpaces {
        state_space_size: SizeSpec::Flat(6),
        action_space_size: SizeSpec::Flat(6),
        terminal_state_density: 0.0,
        completely_connected: true,
        ..DiscreteSpaces::default()
    });
    config
}

/// Two dimensional point mass rewarded for moving to the origin.
#[allow(dead_code)]
pub fn point_mass_config(seed: u64) -> EnvConfig {
    let mut config = EnvConfig::default();
    config.seed = Some(seed);
    config.sequence_length = 1;
    config.spaces = SpacesConfig::Continuous(ContinuousSpaces {
        state_space_dim: 2,
        action_space_dim: 2,
        state_space_max: 10.0,
        action_space_max: 10.0,
        reward_function: ContinuousRewardKind::MoveToAPoint,
        target_point: Some(array![0.0, 0.0]),
        target_radius: 0.5,
        ..ContinuousSpaces::default()
    });
    config
}

/// The action leading from `state` to `target` in one step.
#[allow(dead_code)]
pub fn action_towards(table: &Array2<usize>, state: usize, target: usize) -> usize {
    (0..table.shape()[1])
        .find(|a| table[[state, *a]] == target)
        .expect("target state not reachable in one step")
}

#[allow(dead_code)]
pub fn as_discrete(observation: &SpaceElement) -> usize {
    match observation {
        SpaceElement::Discrete(state) => *state,
        _ => panic!("expected a discrete observation"),
    }
}

#[allow(dead_code)]
pub fn as_continuous(observation: &SpaceElement) -> Array1<f64> {
    match observation {
        SpaceElement::Continuous(state) => state.clone(),
        _ => panic!("expected a continuous observation"),
    }
}
