mod utils;

use std::collections::HashSet;

use approx::assert_abs_diff_eq;
use mdplab::config::{DiscreteSpaces, EnvConfig, SizeSpec, SpacesConfig};
use mdplab::env::{DiscreteMdp, EnvError, Environment, ToyMdp};
use mdplab::reward::RewardError;
use mdplab::spaces::{SpaceElement, SpaceTrait};
use utils::{action_towards, as_discrete, connected_discrete_config};

#[test]
fn quarter_density_selects_two_single_state_sequences() {
    let mut env = DiscreteMdp::new(connected_discrete_config(0)).unwrap();
    assert_eq!(env.rewardable_sequences().len(), 2);

    let rewardable: Vec<usize> = env.rewardable_sequences().iter().map(|s| s[0]).collect();
    for target in rewardable {
        let current = as_discrete(&env.reset());
        let table = env.transition_table().clone();
        let action = action_towards(&table, current, target);
        let step = env.step(&SpaceElement::Discrete(action)).unwrap();
        assert_eq!(step.reward, 1.0);
        assert_eq!(as_discrete(&step.observation), target);
        assert!(!step.done);
    }
}

#[test]
fn reward_is_delayed_by_the_configured_number_of_steps() {
    let mut config = connected_discrete_config(0);
    config.delay = 2;
    let mut env = DiscreteMdp::new(config).unwrap();
    let rewardable: HashSet<usize> = env.rewardable_sequences().iter().map(|s| s[0]).collect();
    let target = *rewardable.iter().next().unwrap();
    let resting = (0..6).find(|s| !rewardable.contains(s)).unwrap();

    let start = as_discrete(&env.reset());
    let table = env.transition_table().clone();

    let step1 = env
        .step(&SpaceElement::Discrete(action_towards(&table, start, target)))
        .unwrap();
    assert_eq!(step1.reward, 0.0);

    let step2 = env
        .step(&SpaceElement::Discrete(action_towards(&table, target, resting)))
        .unwrap();
    let expected = if rewardable.contains(&start) { 1.0 } else { 0.0 };
    assert_eq!(step2.reward, expected);

    // The rewardable state was entered two steps ago, so it pays now.
    let step3 = env
        .step(&SpaceElement::Discrete(action_towards(&table, resting, resting)))
        .unwrap();
    assert_eq!(step3.reward, 1.0);

    let step4 = env
        .step(&SpaceElement::Discrete(action_towards(&table, resting, resting)))
        .unwrap();
    assert_eq!(step4.reward, 0.0);
}

#[test]
fn sequence_reward_fires_on_the_final_state_only() {
    let mut config = connected_discrete_config(0);
    config.sequence_length = 3;
    config.reward_density = 1.0 / 120.0;
    let mut env = DiscreteMdp::new(config).unwrap();
    assert_eq!(env.rewardable_sequences().len(), 1);
    let sequence = env.rewardable_sequences().iter().next().unwrap().clone();
    let table = env.transition_table().clone();

    let mut current = as_discrete(&env.reset());
    let mut rewards = Vec::new();
    for target in &sequence {
        let step = env
            .step(&SpaceElement::Discrete(action_towards(&table, current, *target)))
            .unwrap();
        rewards.push(step.reward);
        current = *target;
    }
    assert_eq!(rewards, vec![0.0, 0.0, 1.0]);

    let step = env
        .step(&SpaceElement::Discrete(action_towards(&table, current, sequence[0])))
        .unwrap();
    assert_eq!(step.reward, 0.0);
}

#[test]
fn dense_rewards_pay_for_prefixes() {
    let mut config = connected_discrete_config(0);
    config.sequence_length = 3;
    config.reward_density = 1.0 / 120.0;
    config.make_denser = true;
    let mut env = DiscreteMdp::new(config).unwrap();
    assert_eq!(env.rewardable_sequences().len(), 1);
    let sequence = env.rewardable_sequences().iter().next().unwrap().clone();
    let table = env.transition_table().clone();

    let mut current = as_discrete(&env.reset());
    let mut rewards = Vec::new();
    for target in &sequence {
        let step = env
            .step(&SpaceElement::Discrete(action_towards(&table, current, *target)))
            .unwrap();
        rewards.push(step.reward);
        current = *target;
    }
    assert_abs_diff_eq!(rewards[0], 1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(rewards[1], 2.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(rewards[2], 1.0, epsilon = 1e-12);

    // Restarting the sequence pays the first prefix again.
    let step = env
        .step(&SpaceElement::Discrete(action_towards(&table, current, sequence[0])))
        .unwrap();
    assert_abs_diff_eq!(step.reward, 1.0 / 3.0, epsilon = 1e-12);
}

#[test]
fn terminal_states_absorb_and_pay_the_bonus() {
    let mut config = EnvConfig::default();
    config.seed = Some(3);
    config.term_state_reward = 10.0;
    config.spaces = SpacesConfig::Discrete(DiscreteSpaces {
        state_space_size: SizeSpec::Flat(6),
        action_space_size: SizeSpec::Flat(6),
        terminal_state_density: 0.5,
        completely_connected: true,
        ..DiscreteSpaces::default()
    });
    let mut env = DiscreteMdp::new(config).unwrap();
    assert_eq!(env.terminals().first_terminal(), 3);

    let table = env.transition_table().clone();
    for s in 3..6 {
        for a in 0..6 {
            assert_eq!(table[[s, a]], s);
        }
    }

    let start = as_discrete(&env.reset());
    let step = env
        .step(&SpaceElement::Discrete(action_towards(&table, start, 4)))
        .unwrap();
    assert!(step.done);
    assert_eq!(step.reward, 10.0);

    match env.step(&SpaceElement::Discrete(0)) {
        Err(EnvError::TerminalStep(_)) => {}
        other => panic!("expected TerminalStep, got {:?}", other.map(|s| s.reward)),
    }
}

#[test]
fn completely_connected_rows_are_permutations() {
    let env = DiscreteMdp::new(connected_discrete_config(5)).unwrap();
    let table = env.transition_table();
    for s in 0..6 {
        let mut row: Vec<usize> = (0..6).map(|a| table[[s, a]]).collect();
        row.sort();
        assert_eq!(row, (0..6).collect::<Vec<usize>>());
    }
}

#[test]
fn reward_set_cardinality_follows_the_density() {
    // Without repeats there are 6 * 5 = 30 ordered pairs.
    let mut config = connected_discrete_config(1);
    config.sequence_length = 2;
    config.reward_density = 0.1;
    let env = DiscreteMdp::new(config).unwrap();
    assert_eq!(env.rewardable_sequences().len(), 3);
    for sequence in env.rewardable_sequences() {
        assert_eq!(sequence.len(), 2);
        assert_ne!(sequence[0], sequence[1]);
    }

    // With repeats there are 6 * 6 = 36 pairs.
    let mut config = connected_discrete_config(1);
    config.sequence_length = 2;
    config.reward_density = 0.1;
    if let SpacesConfig::Discrete(spaces) = &mut config.spaces {
        spaces.repeats_in_sequences = true;
    }
    let env = DiscreteMdp::new(config).unwrap();
    assert_eq!(env.rewardable_sequences().len(), 4);
}

#[test]
fn noise_free_runs_report_zero_noise() {
    let mut env = DiscreteMdp::new(connected_discrete_config(2)).unwrap();
    env.reset();
    for a in 0..20 {
        env.step(&SpaceElement::Discrete(a % 6)).unwrap();
    }
    let stats = env.episode_stats();
    assert_eq!(stats.total_noisy_transitions, 0);
    assert_eq!(stats.total_abs_noise_in_reward, 0.0);
    assert_eq!(stats.total_abs_noise_in_transition, 0.0);
    assert_eq!(stats.total_transitions, 20);
}

#[test]
fn transition_noise_is_counted() {
    let mut config = connected_discrete_config(4);
    if let SpacesConfig::Discrete(spaces) = &mut config.spaces {
        spaces.transition_noise = 0.9;
    }
    let mut env = DiscreteMdp::new(config).unwrap();
    env.reset();
    for a in 0..50 {
        env.step(&SpaceElement::Discrete(a % 6)).unwrap();
    }
    assert!(env.episode_stats().total_noisy_transitions > 0);
}

#[test]
fn query_transition_matches_the_table() {
    let env = DiscreteMdp::new(connected_discrete_config(7)).unwrap();
    let table = env.transition_table();
    for s in 0..6 {
        for a in 0..6 {
            let next = env
                .query_transition(&SpaceElement::Discrete(s), &SpaceElement::Discrete(a))
                .unwrap();
            assert_eq!(as_discrete(&next), table[[s, a]]);
        }
    }
}

#[test]
fn query_reward_scores_a_supplied_history() {
    let env = DiscreteMdp::new(connected_discrete_config(8)).unwrap();
    let target = env.rewardable_sequences().iter().next().unwrap()[0];
    let other = (0..6).find(|s| *s != target).unwrap();

    let reward = env
        .query_reward(
            &[SpaceElement::Discrete(other), SpaceElement::Discrete(target)],
            &SpaceElement::Discrete(0),
        )
        .unwrap();
    assert_eq!(reward, 1.0);

    let reward = env
        .query_reward(
            &[SpaceElement::Discrete(target), SpaceElement::Discrete(other)],
            &SpaceElement::Discrete(0),
        )
        .unwrap();
    assert_eq!(reward, 0.0);
}

#[test]
fn queries_do_not_disturb_the_trajectory() {
    let mut reference = DiscreteMdp::new(connected_discrete_config(6)).unwrap();
    let mut probed = DiscreteMdp::new(connected_discrete_config(6)).unwrap();
    reference.reset();
    probed.reset();
    for a in 0..20 {
        let action = SpaceElement::Discrete(a % 6);
        probed
            .query_transition(&SpaceElement::Discrete(0), &action)
            .unwrap();
        probed
            .query_reward(
                &[SpaceElement::Discrete(0), SpaceElement::Discrete(1)],
                &action,
            )
            .unwrap();
        let expected = reference.step(&action).unwrap();
        let observed = probed.step(&action).unwrap();
        assert_eq!(expected.observation, observed.observation);
        assert_eq!(expected.reward, observed.reward);
        assert_eq!(expected.done, observed.done);
    }
}

#[test]
fn factored_spaces_round_trip_at_the_boundary() {
    let mut config = EnvConfig::default();
    config.seed = Some(0);
    config.spaces = SpacesConfig::Discrete(DiscreteSpaces {
        state_space_size: SizeSpec::Factored(vec![2, 2, 3]),
        action_space_size: SizeSpec::Factored(vec![2, 2, 3]),
        state_space_relevant_indices: Some(vec![0, 1]),
        action_space_relevant_indices: Some(vec![0, 1]),
        ..DiscreteSpaces::default()
    });
    let mut env = DiscreteMdp::new(config).unwrap();

    let observation = env.reset();
    match &observation {
        SpaceElement::MultiDiscrete(coords) => assert_eq!(coords.len(), 3),
        other => panic!("expected a factored observation, got {:?}", other),
    }

    for _ in 0..15 {
        let action = env.action_space().sample();
        let step = env.step(&action).unwrap();
        match &step.observation {
            SpaceElement::MultiDiscrete(coords) => {
                assert!(coords[0] < 2 && coords[1] < 2 && coords[2] < 3);
            }
            other => panic!("expected a factored observation, got {:?}", other),
        }
        if step.done {
            env.reset();
        }
    }
}

#[test]
fn irrelevant_action_dimensions_do_not_move_the_relevant_state() {
    let mut config = EnvConfig::default();
    config.seed = Some(9);
    config.spaces = SpacesConfig::Discrete(DiscreteSpaces {
        state_space_size: SizeSpec::Factored(vec![2, 2, 3]),
        action_space_size: SizeSpec::Factored(vec![2, 2, 3]),
        state_space_relevant_indices: Some(vec![0, 1]),
        action_space_relevant_indices: Some(vec![0, 1]),
        ..DiscreteSpaces::default()
    });
    let mut plain = DiscreteMdp::new(config.clone()).unwrap();
    let mut twisted = DiscreteMdp::new(config).unwrap();
    plain.reset();
    twisted.reset();

    for i in 0..12 {
        let base = vec![i % 2, (i / 2) % 2, 0];
        let mut other = base.clone();
        other[2] = i % 3;
        let step_plain = plain.step(&SpaceElement::MultiDiscrete(base)).unwrap();
        let step_twisted = twisted.step(&SpaceElement::MultiDiscrete(other)).unwrap();

        let coords_plain = match &step_plain.observation {
            SpaceElement::MultiDiscrete(coords) => coords.clone(),
            _ => unreachable!(),
        };
        let coords_twisted = match &step_twisted.observation {
            SpaceElement::MultiDiscrete(coords) => coords.clone(),
            _ => unreachable!(),
        };
        assert_eq!(coords_plain[..2], coords_twisted[..2]);
        assert_eq!(step_plain.reward, step_twisted.reward);
        assert_eq!(step_plain.done, step_twisted.done);
        if step_plain.done {
            plain.reset();
            twisted.reset();
        }
    }
}

#[test]
fn contradictory_configurations_are_rejected() {
    let mut config = connected_discrete_config(0);
    if let SpacesConfig::Discrete(spaces) = &mut config.spaces {
        spaces.action_space_size = SizeSpec::Flat(5);
    }
    assert!(DiscreteMdp::new(config).is_err());

    let mut config = connected_discrete_config(0);
    config.reward_density = 1.5;
    assert!(DiscreteMdp::new(config).is_err());

    let mut config = connected_discrete_config(0);
    config.sequence_length = 7;
    assert!(DiscreteMdp::new(config).is_err());
}

#[test]
fn overdense_reward_sets_are_rejected() {
    let mut config = connected_discrete_config(0);
    config.sequence_length = 7;
    config.reward_density = 1.0;
    if let SpacesConfig::Discrete(spaces) = &mut config.spaces {
        spaces.repeats_in_sequences = true;
    }
    match DiscreteMdp::new(config) {
        Err(EnvError::Reward(RewardError::RewardSetTooLarge(_))) => {}
        Err(other) => panic!("expected RewardSetTooLarge, got {:?}", other),
        Ok(_) => panic!("expected RewardSetTooLarge, got an engine"),
    }
}

#[test]
fn the_dispatching_wrapper_runs_end_to_end() {
    let mut config = EnvConfig::default();
    config.seed = Some(0);
    let mut env = ToyMdp::new(config).unwrap();
    assert_eq!(env.seed(), 0);

    env.reset();
    for _ in 0..10 {
        let action = env.action_space().sample();
        let step = env.step(&action).unwrap();
        if step.done {
            env.reset();
        }
    }
    assert!(env.total_episodes() >= 1);
}
