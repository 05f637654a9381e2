//! Terminal state sets for the two space families.

use ndarray::prelude::*;

use crate::spaces::{BoxSpace, SpaceError};

/// Terminal set of a discrete environment: the tail of the relevant flat
/// state range.
#[derive(Clone, Debug)]
pub struct DiscreteTerminals {
    num_states: usize,
    num_terminal: usize,
}

impl DiscreteTerminals {
    pub fn new(num_states: usize, num_terminal: usize) -> DiscreteTerminals {
        if num_terminal > num_states {
            panic!("More terminal states than states");
        }
        DiscreteTerminals {
            num_states,
            num_terminal,
        }
    }

    pub fn num_terminal(&self) -> usize {
        self.num_terminal
    }

    /// First terminal state, equal to the number of non-terminal states.
    pub fn first_terminal(&self) -> usize {
        self.num_states - self.num_terminal
    }

    pub fn is_terminal(&self, state: usize) -> bool {
        state >= self.first_terminal() && state < self.num_states
    }
}

/// Terminal set of a continuous environment: a union of axis-aligned
/// hypercubes over the relevant coordinates.
#[derive(Clone, Debug)]
pub struct ContinuousTerminals {
    regions: Vec<BoxSpace>,
}

impl ContinuousTerminals {
    /// Build one hypercube of edge `edge` around each centre. The centres
    /// are given in relevant coordinates.
    pub fn new(
        centres: &[Array1<f64>],
        edge: f64,
        seed: u64,
    ) -> Result<ContinuousTerminals, SpaceError> {
        let mut regions = Vec::with_capacity(centres.len());
        for centre in centres {
            let low = centre.mapv(|c| c - edge / 2.0);
            let high = centre.mapv(|c| c + edge / 2.0);
            regions.push(BoxSpace::new(low, high, seed)?);
        }
        Ok(ContinuousTerminals { regions })
    }

    /// Whether the relevant coordinates lie inside any terminal hypercube.
    pub fn is_terminal(&self, relevant_state: ArrayView1<f64>) -> bool {
        self.regions
            .iter()
            .any(|region| region.contains_point(relevant_state))
    }
}
