//! Reward structures: the rewardable sequence model of discrete
//! environments and the predefined continuous reward functions.

pub mod continuous;

use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Above this many rewardable sequences the engine warns that stepping will
/// be slow.
pub const SEQUENCE_SOFT_CAP: usize = 1_000;
/// Above this many rewardable sequences construction fails.
pub const SEQUENCE_HARD_CAP: usize = 100_000;

/// Error types for the reward model
#[derive(Error, Debug, PartialEq)]
pub enum RewardError {
    #[error("Too many rewardable sequences")]
    RewardSetTooLarge(String),
}

/// The rewardable sequence model of a discrete environment.
///
/// A fixed set of state sequences of length `sequence_length` over the
/// non-terminal relevant states is selected at construction. The sparse
/// variant pays `reward_scale` when the window of the augmented state that
/// ended `delay` steps ago equals a rewardable sequence. The dense variant
/// additionally pays partial rewards for prefixes, scaled by the prefix
/// fraction, and keeps a count map of the prefixes that are still
/// attainable given the recent history.
#[derive(Clone, Debug)]
pub struct SequenceRewards {
    sequence_length: usize,
    delay: usize,
    reward_scale: f64,
    make_denser: bool,
    sequences: HashSet<Vec<usize>>,
    possible_remaining: Vec<HashMap<Vec<usize>, usize>>,
}

impl SequenceRewards {
    /// Select the rewardable sequences, drawing from the environment
    /// generator.
    ///
    /// With repeats allowed, sequence indices are drawn without replacement
    /// from the base-n index space; without repeats, from the space of
    /// n-permutations, decoded through the factorial number system.
    pub fn generate(
        num_non_terminal: usize,
        sequence_length: usize,
        delay: usize,
        reward_density: f64,
        reward_scale: f64,
        make_denser: bool,
        repeats_in_sequences: bool,
        rng: &mut ChaCha8Rng,
    ) -> Result<SequenceRewards, RewardError> {
        let num_possible = if repeats_in_sequences {
            (num_non_terminal as u128).checked_pow(sequence_length as u32)
        } else {
            (num_non_terminal + 1 - sequence_length..=num_non_terminal)
                .try_fold(1u128, |acc, factor| acc.checked_mul(factor as u128))
        }
        .ok_or_else(|| {
            RewardError::RewardSetTooLarge(String::from(
                "The sequence index space exceeds the supported range",
            ))
        })?;

        let num_selected = (reward_density * num_possible as f64).round();
        if num_selected > SEQUENCE_HARD_CAP as f64 {
            return Err(RewardError::RewardSetTooLarge(format!(
                "reward_density selects {} sequences, the cap is {}",
                num_selected, SEQUENCE_HARD_CAP
            )));
        }
        let num_selected = num_selected as usize;
        if num_selected > SEQUENCE_SOFT_CAP {
            warn!(
                "{} rewardable sequences selected, stepping may be slow",
                num_selected
            );
        }

        let mut sequences = HashSet::with_capacity(num_selected);
        for index in sample_distinct_indices(num_possible, num_selected, rng) {
            let sequence = if repeats_in_sequences {
                decode_with_repeats(index, num_non_terminal, sequence_length)
            } else {
                decode_permutation(index, num_non_terminal, sequence_length)
            };
            debug!("Rewardable sequence: {:?}", sequence);
            sequences.insert(sequence);
        }
        info!(
            "Selected {} rewardable sequences out of {} possible",
            sequences.len(),
            num_possible
        );

        let mut rewards = SequenceRewards {
            sequence_length,
            delay,
            reward_scale,
            make_denser,
            sequences,
            possible_remaining: vec![HashMap::new(); sequence_length],
        };
        rewards.reset();
        Ok(rewards)
    }

    pub fn sequences(&self) -> &HashSet<Vec<usize>> {
        &self.sequences
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Reinitialise the attainable-prefix counts for a new episode: every
    /// rewardable sequence contributes its first state, longer prefixes
    /// become attainable only by matching history.
    pub fn reset(&mut self) {
        for prefixes in self.possible_remaining.iter_mut() {
            prefixes.clear();
        }
        for sequence in &self.sequences {
            *self.possible_remaining[0]
                .entry(sequence[..1].to_vec())
                .or_insert(0) += 1;
        }
    }

    /// Score the augmented state after a transition and, in the dense
    /// variant, rebuild the attainable-prefix counts.
    pub fn evaluate(&mut self, augmented: &[Option<usize>]) -> f64 {
        if !self.make_denser {
            return self.sparse_reward(augmented);
        }
        let reward = self.dense_reward(augmented);
        self.rebuild_possible_remaining(augmented);
        reward
    }

    /// Score a caller-supplied augmented state without mutating anything.
    pub fn evaluate_query(&self, augmented: &[Option<usize>]) -> f64 {
        if self.make_denser {
            self.dense_reward(augmented)
        } else {
            self.sparse_reward(augmented)
        }
    }

    fn sparse_reward(&self, augmented: &[Option<usize>]) -> f64 {
        let end = augmented.len() - self.delay;
        match defined_window(augmented, 1, end) {
            Some(window) if self.sequences.contains(&window) => self.reward_scale,
            _ => 0.0,
        }
    }

    fn dense_reward(&self, augmented: &[Option<usize>]) -> f64 {
        let length = augmented.len();
        let mut reward = 0.0;
        for j in 1..=self.sequence_length {
            let window = defined_window(augmented, length - j - self.delay, length - self.delay);
            if let Some(window) = window {
                if let Some(count) = self.possible_remaining[j - 1].get(&window) {
                    reward += *count as f64 * self.reward_scale * j as f64
                        / self.sequence_length as f64;
                }
            }
        }
        reward
    }

    fn rebuild_possible_remaining(&mut self, augmented: &[Option<usize>]) {
        let length = augmented.len();
        for prefixes in self.possible_remaining.iter_mut() {
            prefixes.clear();
        }
        for sequence in &self.sequences {
            for j in 0..self.sequence_length {
                let start = length - j - self.delay;
                let end = length - self.delay;
                if window_matches(augmented, start, end, &sequence[..j]) {
                    *self.possible_remaining[j]
                        .entry(sequence[..j + 1].to_vec())
                        .or_insert(0) += 1;
                }
            }
        }
    }
}

/// Draw `count` distinct indices from `[0, total)` without replacement.
fn sample_distinct_indices(total: u128, count: usize, rng: &mut ChaCha8Rng) -> Vec<u128> {
    if total <= 1 << 16 {
        let mut pool: Vec<u128> = (0..total).collect();
        let n = pool.len();
        for i in 0..count.min(n) {
            let j = rng.gen_range(i..n);
            pool.swap(i, j);
        }
        pool.truncate(count);
        return pool;
    }
    // The index space dwarfs the selection, so rejection sampling rarely
    // retries.
    let mut seen = HashSet::with_capacity(count);
    let mut indices = Vec::with_capacity(count);
    while indices.len() < count {
        let candidate = rng.gen_range(0..total);
        if seen.insert(candidate) {
            indices.push(candidate);
        }
    }
    indices
}

/// Decode a base-n index into a sequence, least significant digit first.
fn decode_with_repeats(index: u128, base: usize, length: usize) -> Vec<usize> {
    let mut index = index;
    let mut sequence = Vec::with_capacity(length);
    for _ in 0..length {
        sequence.push((index % base as u128) as usize);
        index /= base as u128;
    }
    sequence
}

/// Decode a permutation index through the factorial number system, keeping
/// a list of the digits not used yet.
fn decode_permutation(index: u128, base: usize, length: usize) -> Vec<usize> {
    let mut index = index;
    let mut remaining: Vec<usize> = (0..base).collect();
    let mut sequence = Vec::with_capacity(length);
    for radix in (base + 1 - length..=base).rev() {
        let position = (index % radix as u128) as usize;
        sequence.push(remaining[position]);
        remaining.remove(position);
        index /= radix as u128;
    }
    sequence
}

/// The window `[start, end)` as concrete states, or `None` while it still
/// touches the post-reset padding.
fn defined_window(augmented: &[Option<usize>], start: usize, end: usize) -> Option<Vec<usize>> {
    augmented[start..end].iter().copied().collect()
}

/// Whether the window `[start, end)` equals `prefix`. Padding entries match
/// nothing.
fn window_matches(
    augmented: &[Option<usize>],
    start: usize,
    end: usize,
    prefix: &[usize],
) -> bool {
    augmented[start..end]
        .iter()
        .zip(prefix.iter())
        .all(|(state, expected)| *state == Some(*expected))
}
