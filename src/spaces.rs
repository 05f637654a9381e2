//! Sampler and containment primitives for observation and action spaces.

use enum_dispatch::enum_dispatch;
use ndarray::prelude::*;
use rand::distributions::Distribution;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::distribution::{Exp, Normal};
use thiserror::Error;

/// Error types for the space samplers
#[derive(Error, Debug, PartialEq)]
pub enum SpaceError {
    #[error("Invalid argument for sampler")]
    InvalidArgument(String),
}

/// A single point of one of the supported spaces.
#[derive(Clone, Debug, PartialEq)]
pub enum SpaceElement {
    Discrete(usize),
    MultiDiscrete(Vec<usize>),
    Continuous(Array1<f64>),
}

/// The set of methods shared by every space. Each space owns its generator,
/// so sampling never touches the environment generator.
#[enum_dispatch(Space)]
pub trait SpaceTrait {
    /// Draw one point of the space.
    fn sample(&mut self) -> SpaceElement;

    /// Membership test. Elements of the wrong variant or shape are simply
    /// not contained.
    fn contains(&self, x: &SpaceElement) -> bool;
}

/// All the supported space types.
#[derive(Clone, Debug)]
#[enum_dispatch]
pub enum Space {
    Discrete(DiscreteSpace),
    MultiDiscrete(MultiDiscreteSpace),
    Box(BoxSpace),
}

/// The finite space `{0, 1, .., n - 1}`.
#[derive(Clone, Debug)]
pub struct DiscreteSpace {
    n: usize,
    rng: ChaCha8Rng,
}

impl DiscreteSpace {
    pub fn new(n: usize, seed: u64) -> DiscreteSpace {
        DiscreteSpace {
            n,
            rng: SeedableRng::seed_from_u64(seed),
        }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn sample_index(&mut self) -> usize {
        self.rng.gen_range(0..self.n)
    }

    /// Draw `size` distinct indices, uniformly without replacement.
    pub fn sample_without_replacement(&mut self, size: usize) -> Result<Vec<usize>, SpaceError> {
        if size > self.n {
            return Err(SpaceError::InvalidArgument(format!(
                "Cannot draw {} distinct values out of {} without replacement",
                size, self.n
            )));
        }
        let mut pool: Vec<usize> = (0..self.n).collect();
        for i in 0..size {
            let j = self.rng.gen_range(i..self.n);
            pool.swap(i, j);
        }
        pool.truncate(size);
        Ok(pool)
    }

    /// Draw one index from the categorical distribution `prob`.
    pub fn sample_with_prob(&mut self, prob: &[f64]) -> Result<usize, SpaceError> {
        if prob.len() != self.n {
            return Err(SpaceError::InvalidArgument(format!(
                "Probability vector of length {} for a space of size {}",
                prob.len(),
                self.n
            )));
        }
        categorical_index(&mut self.rng, prob)
    }

    pub fn contains_index(&self, x: usize) -> bool {
        x < self.n
    }
}

impl SpaceTrait for DiscreteSpace {
    fn sample(&mut self) -> SpaceElement {
        SpaceElement::Discrete(self.sample_index())
    }

    fn contains(&self, x: &SpaceElement) -> bool {
        match x {
            SpaceElement::Discrete(x) => self.contains_index(*x),
            _ => false,
        }
    }
}

/// A product of finite spaces, one per dimension.
#[derive(Clone, Debug)]
pub struct MultiDiscreteSpace {
    sizes: Vec<usize>,
    rng: ChaCha8Rng,
}

impl MultiDiscreteSpace {
    pub fn new(sizes: Vec<usize>, seed: u64) -> MultiDiscreteSpace {
        MultiDiscreteSpace {
            sizes,
            rng: SeedableRng::seed_from_u64(seed),
        }
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }
}

impl SpaceTrait for MultiDiscreteSpace {
    fn sample(&mut self) -> SpaceElement {
        let mut coords = Vec::with_capacity(self.sizes.len());
        for i in 0..self.sizes.len() {
            let size = self.sizes[i];
            coords.push(self.rng.gen_range(0..size));
        }
        SpaceElement::MultiDiscrete(coords)
    }

    fn contains(&self, x: &SpaceElement) -> bool {
        match x {
            SpaceElement::MultiDiscrete(coords) => {
                coords.len() == self.sizes.len()
                    && coords.iter().zip(self.sizes.iter()).all(|(c, s)| c < s)
            }
            _ => false,
        }
    }
}

/// An axis-aligned box in `R^n`, with possibly infinite bounds.
#[derive(Clone, Debug)]
pub struct BoxSpace {
    low: Array1<f64>,
    high: Array1<f64>,
    rng: ChaCha8Rng,
}

impl BoxSpace {
    pub fn new(low: Array1<f64>, high: Array1<f64>, seed: u64) -> Result<BoxSpace, SpaceError> {
        if low.len() != high.len() {
            return Err(SpaceError::InvalidArgument(format!(
                "Bounds of different lengths: {} and {}",
                low.len(),
                high.len()
            )));
        }
        if low.iter().zip(high.iter()).any(|(l, h)| l > h) {
            return Err(SpaceError::InvalidArgument(String::from(
                "Lower bound above upper bound",
            )));
        }
        Ok(BoxSpace {
            low,
            high,
            rng: SeedableRng::seed_from_u64(seed),
        })
    }

    /// A box of the form `[-max, max]^dim`.
    pub fn symmetric(max: f64, dim: usize, seed: u64) -> Result<BoxSpace, SpaceError> {
        BoxSpace::new(Array1::from_elem(dim, -max), Array1::from_elem(dim, max), seed)
    }

    pub fn dim(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self) -> &Array1<f64> {
        &self.low
    }

    pub fn high(&self) -> &Array1<f64> {
        &self.high
    }

    /// Draw one point. Each dimension is sampled independently: uniformly
    /// when both bounds are finite, from a shifted exponential when exactly
    /// one bound is finite and from a standard normal when both are
    /// infinite.
    pub fn sample_point(&mut self) -> Array1<f64> {
        let normal = Normal::new(0.0, 1.0).unwrap();
        let exponential = Exp::new(1.0).unwrap();
        let mut point = Array1::zeros(self.low.len());
        for i in 0..self.low.len() {
            let (low, high) = (self.low[i], self.high[i]);
            point[i] = match (low.is_finite(), high.is_finite()) {
                (true, true) => self.rng.gen_range(low..=high),
                (true, false) => low + exponential.sample(&mut self.rng),
                (false, true) => high - exponential.sample(&mut self.rng),
                (false, false) => normal.sample(&mut self.rng),
            };
        }
        point
    }

    /// Membership test on a bare vector. Inclusive on both bounds and false
    /// for NaN entries.
    pub fn contains_point(&self, x: ArrayView1<f64>) -> bool {
        x.len() == self.low.len()
            && x.iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(v, (l, h))| v >= l && v <= h)
    }
}

impl SpaceTrait for BoxSpace {
    fn sample(&mut self) -> SpaceElement {
        SpaceElement::Continuous(self.sample_point())
    }

    fn contains(&self, x: &SpaceElement) -> bool {
        match x {
            SpaceElement::Continuous(x) => self.contains_point(x.view()),
            _ => false,
        }
    }
}

/// Draw an index from a categorical distribution through `rng`.
///
/// Shared between the space samplers and the reset draws of the discrete
/// engine, which go through the environment generator instead of a space
/// generator.
pub(crate) fn categorical_index(
    rng: &mut ChaCha8Rng,
    prob: &[f64],
) -> Result<usize, SpaceError> {
    if prob.iter().any(|p| *p < 0.0) {
        return Err(SpaceError::InvalidArgument(String::from(
            "Negative probability entry",
        )));
    }
    let urand: f64 = rng.gen_range(0.0..1.0);
    let mut cumulative = 0.0;
    let mut fallback = 0;
    for (idx, p) in prob.iter().enumerate() {
        if *p > 0.0 {
            fallback = idx;
        }
        cumulative += p;
        if urand < cumulative {
            return Ok(idx);
        }
    }
    // The cumulative sum can fall short of 1 by rounding; fall back to the
    // last index carrying mass.
    Ok(fallback)
}
