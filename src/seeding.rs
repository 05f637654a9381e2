//! Derivation of the named sub-seeds owned by an environment.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Named sub-seeds of one environment instance.
///
/// All sub-seeds are derived from the `env` seed by drawing successive
/// 63 bit integers from the environment generator. The draw order is a
/// compatibility contract: two engines built with the same seed must end up
/// with the same sub-seeds, and therefore with bit-identical trajectories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSuite {
    pub env: u64,
    pub relevant_state_space: u64,
    pub relevant_action_space: u64,
    pub irrelevant_state_space: u64,
    pub irrelevant_action_space: u64,
    pub state_space: u64,
    pub action_space: u64,
    pub image_representations: u64,
}

impl SeedSuite {
    /// Derive the sub-seeds for `seed`, or for a seed drawn from entropy
    /// when none is given.
    ///
    /// Returns the suite together with the environment generator advanced
    /// past the derivation draws. The same generator keeps serving the
    /// engine afterwards (reward set selection, reset draws, noise), so the
    /// derivation draws are part of its stream.
    pub fn derive(seed: Option<u64>) -> (SeedSuite, ChaCha8Rng) {
        let env = match seed {
            Some(seed) => seed,
            None => ChaCha8Rng::from_entropy().gen_range(0..1u64 << 63),
        };
        let mut rng: ChaCha8Rng = SeedableRng::seed_from_u64(env);
        let suite = SeedSuite {
            env,
            relevant_state_space: next_sub_seed(&mut rng),
            relevant_action_space: next_sub_seed(&mut rng),
            irrelevant_state_space: next_sub_seed(&mut rng),
            irrelevant_action_space: next_sub_seed(&mut rng),
            state_space: next_sub_seed(&mut rng),
            action_space: next_sub_seed(&mut rng),
            image_representations: next_sub_seed(&mut rng),
        };
        (suite, rng)
    }
}

fn next_sub_seed(rng: &mut ChaCha8Rng) -> u64 {
    rng.gen_range(0..1u64 << 63)
}
