//! Transition structures: random table generation for discrete spaces and
//! the n-th order point mass integrator for continuous spaces.

use log::{debug, info};
use ndarray::prelude::*;

use crate::spaces::{DiscreteSpace, SpaceError};

/// Random transition table over one discrete sub-space.
///
/// Rows are indexed by state, columns by action. Under
/// `completely_connected` every row is a without-replacement draw from the
/// state set, so every state is reachable from every state in one step.
/// Terminal states are absorbing for every action.
#[derive(Clone, Debug)]
pub struct DiscreteTransitions {
    table: Array2<usize>,
}

impl DiscreteTransitions {
    /// Generate a table, drawing from the generator owned by `space`.
    pub fn generate(
        num_states: usize,
        num_actions: usize,
        completely_connected: bool,
        first_terminal: usize,
        space: &mut DiscreteSpace,
    ) -> Result<DiscreteTransitions, SpaceError> {
        let mut table = Array2::zeros((num_states, num_actions));
        if completely_connected {
            for s in 0..num_states {
                let row = space.sample_without_replacement(num_actions)?;
                for (a, next) in row.iter().enumerate() {
                    table[[s, a]] = *next;
                }
            }
        } else {
            for s in 0..num_states {
                for a in 0..num_actions {
                    table[[s, a]] = space.sample_index();
                }
            }
        }
        // Terminal states transition to themselves for every action.
        for s in first_terminal..num_states {
            for a in 0..num_actions {
                table[[s, a]] = s;
            }
        }
        debug!("Generated transition table: {:?}", table);
        Ok(DiscreteTransitions { table })
    }

    pub fn num_states(&self) -> usize {
        self.table.shape()[0]
    }

    pub fn num_actions(&self) -> usize {
        self.table.shape()[1]
    }

    pub fn next_state(&self, state: usize, action: usize) -> usize {
        self.table[[state, action]]
    }

    pub fn table(&self) -> &Array2<usize> {
        &self.table
    }

    /// Look up the next state and resample it from the categorical
    /// distribution that keeps mass `1 - noise` on the table entry and
    /// spreads `noise` uniformly over the other states. Returns the state
    /// and whether the resampling changed it.
    pub fn noisy_next_state(
        &self,
        state: usize,
        action: usize,
        noise: f64,
        space: &mut DiscreteSpace,
    ) -> Result<(usize, bool), SpaceError> {
        let next = self.next_state(state, action);
        let n = self.num_states();
        if noise <= 0.0 || n < 2 {
            return Ok((next, false));
        }
        let mut probs = vec![noise / (n - 1) as f64; n];
        probs[next] = 1.0 - noise;
        let resampled = space.sample_with_prob(&probs)?;
        if resampled != next {
            info!("Noise inserted: next state {} replaced by {}", next, resampled);
        }
        Ok((resampled, resampled != next))
    }
}

/// Deterministic dynamics of an n-th order point mass.
///
/// The action sets the n-th state derivative, after division by the
/// inertia, and the state evolves by a truncated Taylor expansion over one
/// time unit. The factorial table is computed once.
#[derive(Clone, Debug)]
pub struct ContinuousDynamics {
    order: usize,
    inertia: f64,
    time_unit: f64,
    factorials: Array1<f64>,
}

impl ContinuousDynamics {
    pub fn new(order: usize, inertia: f64, time_unit: f64) -> ContinuousDynamics {
        let mut factorials = Array1::zeros(order);
        let mut acc = 1.0;
        for k in 1..=order {
            acc *= k as f64;
            factorials[k - 1] = acc;
        }
        ContinuousDynamics {
            order,
            inertia,
            time_unit,
            factorials,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Advance the derivative stack by one time unit.
    ///
    /// `derivatives[0]` is the state and `derivatives[k]` its k-th time
    /// derivative; the slice must hold `order + 1` entries. Updates run in
    /// ascending derivative order so that every update reads the higher
    /// order values from before this step.
    pub fn integrate(&self, derivatives: &mut [Array1<f64>], action: &Array1<f64>) {
        derivatives[self.order] = action / self.inertia;
        for i in 0..self.order {
            for j in 0..self.order - i {
                let contribution = &derivatives[i + j + 1]
                    * (self.time_unit.powi(j as i32 + 1) / self.factorials[j]);
                derivatives[i] = &derivatives[i] + &contribution;
            }
        }
    }
}
