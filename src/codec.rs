//! Bijection between flat discrete indices and factored multi-discrete
//! coordinates, and the partition of factored dimensions into a relevant and
//! an irrelevant group.
//!
//! The codec convention is that the rightmost coordinate varies fastest.
//! Internal storage is always flat; the codec is applied at the boundary of
//! every operation that accepts or returns multi-discrete points.

use bimap::BiMap;

/// Encode factored coordinates into a flat index, rightmost fastest.
pub fn encode(coords: &[usize], sizes: &[usize]) -> usize {
    coords
        .iter()
        .zip(sizes.iter())
        .fold(0, |acc, (c, s)| acc * s + c)
}

/// Decode a flat index into factored coordinates, rightmost fastest.
pub fn decode(index: usize, sizes: &[usize]) -> Vec<usize> {
    let mut index = index;
    let mut coords = vec![0; sizes.len()];
    for (pos, size) in sizes.iter().enumerate().rev() {
        coords[pos] = index % size;
        index = index / size;
    }
    coords
}

/// Partition of the dimensions of a factored space into a relevant and an
/// irrelevant group, with flat encodings per group.
///
/// The two `BiMap`s associate a global dimension index with its position
/// inside its group, so points can be split into the two flat sub-indices
/// and joined back without scanning.
#[derive(Clone, Debug)]
pub struct DimensionPartition {
    sizes: Vec<usize>,
    relevant: BiMap<usize, usize>,
    irrelevant: BiMap<usize, usize>,
    relevant_sizes: Vec<usize>,
    irrelevant_sizes: Vec<usize>,
}

impl DimensionPartition {
    /// Build a partition from the per-dimension cardinalities and the sorted
    /// list of relevant dimension indices. The indices must be valid; the
    /// configuration layer validates them before this is reached.
    pub fn new(sizes: &[usize], relevant_indices: &[usize]) -> DimensionPartition {
        let mut relevant = BiMap::new();
        let mut relevant_sizes = Vec::with_capacity(relevant_indices.len());
        for (pos, dim) in relevant_indices.iter().enumerate() {
            if *dim >= sizes.len() {
                panic!("Relevant dimension index out of range");
            }
            relevant.insert(*dim, pos);
            relevant_sizes.push(sizes[*dim]);
        }

        let mut irrelevant = BiMap::new();
        let mut irrelevant_sizes = Vec::new();
        for dim in 0..sizes.len() {
            if !relevant.contains_left(&dim) {
                irrelevant.insert(dim, irrelevant_sizes.len());
                irrelevant_sizes.push(sizes[dim]);
            }
        }

        DimensionPartition {
            sizes: sizes.to_vec(),
            relevant,
            irrelevant,
            relevant_sizes,
            irrelevant_sizes,
        }
    }

    pub fn num_dimensions(&self) -> usize {
        self.sizes.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn is_relevant(&self, dim: usize) -> bool {
        self.relevant.contains_left(&dim)
    }

    /// Product of the relevant cardinalities.
    pub fn relevant_flat_size(&self) -> usize {
        self.relevant_sizes.iter().product()
    }

    /// Product of the irrelevant cardinalities, or 0 when every dimension is
    /// relevant.
    pub fn irrelevant_flat_size(&self) -> usize {
        if self.irrelevant_sizes.is_empty() {
            0
        } else {
            self.irrelevant_sizes.iter().product()
        }
    }

    /// Split a factored point into the flat encodings of its relevant and
    /// irrelevant parts.
    pub fn split(&self, coords: &[usize]) -> (usize, Option<usize>) {
        let relevant_part: Vec<usize> = (0..self.relevant_sizes.len())
            .map(|pos| coords[*self.relevant.get_by_right(&pos).unwrap()])
            .collect();
        let relevant_flat = encode(&relevant_part, &self.relevant_sizes);

        if self.irrelevant_sizes.is_empty() {
            return (relevant_flat, None);
        }
        let irrelevant_part: Vec<usize> = (0..self.irrelevant_sizes.len())
            .map(|pos| coords[*self.irrelevant.get_by_right(&pos).unwrap()])
            .collect();
        (relevant_flat, Some(encode(&irrelevant_part, &self.irrelevant_sizes)))
    }

    /// Join the flat encodings of the two parts back into a factored point.
    pub fn join(&self, relevant_flat: usize, irrelevant_flat: Option<usize>) -> Vec<usize> {
        let mut coords = vec![0; self.sizes.len()];
        for (pos, value) in decode(relevant_flat, &self.relevant_sizes).iter().enumerate() {
            coords[*self.relevant.get_by_right(&pos).unwrap()] = *value;
        }
        if let Some(irrelevant_flat) = irrelevant_flat {
            for (pos, value) in decode(irrelevant_flat, &self.irrelevant_sizes)
                .iter()
                .enumerate()
            {
                coords[*self.irrelevant.get_by_right(&pos).unwrap()] = *value;
            }
        }
        coords
    }
}
