//! Structure-of-arrays cell storage with toroidal Moore neighborhoods.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SimulationError;

/// Upper bound on distinct species a grid can hold.
pub const MAX_SPECIES: usize = 255;

/// Largest supported side length; keeps every cell index inside `u32`.
pub const MAX_WORLD_SIZE: usize = 65_535;

/// Copy of the three per-cell fields at one index.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellSnapshot {
    pub species: u8,
    pub times_mutated: u32,
    pub last_mutation: u32,
}

/// Square world of cells stored as parallel columns, flattened row-major.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grid {
    world_size: usize,
    species: Vec<u8>,
    times_mutated: Vec<u32>,
    last_mutation: Vec<u32>,
}

impl Grid {
    /// Allocate a `world_size × world_size` grid with every field zeroed.
    pub fn new(world_size: usize) -> Result<Self, SimulationError> {
        if world_size == 0 {
            return Err(SimulationError::InvalidConfig(
                "world_size must be non-zero",
            ));
        }
        if world_size > MAX_WORLD_SIZE {
            return Err(SimulationError::InvalidConfig(
                "world_size must not exceed 65535",
            ));
        }
        let len = world_size * world_size;
        Ok(Self {
            world_size,
            species: vec![0; len],
            times_mutated: vec![0; len],
            last_mutation: vec![0; len],
        })
    }

    /// Build a grid from an explicit row-major species layout with zeroed counters.
    pub fn from_species(world_size: usize, species: Vec<u8>) -> Result<Self, SimulationError> {
        let mut grid = Self::new(world_size)?;
        if species.len() != grid.len() {
            return Err(SimulationError::InvalidConfig(
                "species layout must contain world_size² cells",
            ));
        }
        grid.species = species;
        Ok(grid)
    }

    #[must_use]
    pub const fn world_size(&self) -> usize {
        self.world_size
    }

    /// Number of cells (`world_size²`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.species.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    #[must_use]
    pub fn species(&self) -> &[u8] {
        &self.species
    }

    #[must_use]
    pub fn times_mutated(&self) -> &[u32] {
        &self.times_mutated
    }

    #[must_use]
    pub fn last_mutation(&self) -> &[u32] {
        &self.last_mutation
    }

    /// Returns the flat index for `(x, y)` without bounds checks.
    #[inline]
    #[must_use]
    pub const fn offset(&self, x: usize, y: usize) -> usize {
        y * self.world_size + x
    }

    /// Copy out the fields of a single cell.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<CellSnapshot> {
        Some(CellSnapshot {
            species: *self.species.get(index)?,
            times_mutated: self.times_mutated[index],
            last_mutation: self.last_mutation[index],
        })
    }

    /// Overwrite the species of one cell without touching its counters.
    pub fn set_species(&mut self, index: usize, species: u8) {
        self.species[index] = species;
    }

    /// Assign every cell a species drawn uniformly from `[0, num_species)`.
    pub fn randomize<R: Rng + ?Sized>(&mut self, num_species: usize, rng: &mut R) {
        debug_assert!((1..=MAX_SPECIES).contains(&num_species));
        // num_species <= 255, so the exclusive upper bound fits in u8.
        let upper = num_species as u8;
        for species in &mut self.species {
            *species = rng.random_range(0..upper);
        }
    }

    /// Zero the mutation counters while keeping the species layout.
    pub fn reset_counters(&mut self) {
        self.times_mutated.fill(0);
        self.last_mutation.fill(0);
    }

    /// Full comparison of all three columns.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.world_size == other.world_size
            && self.species == other.species
            && self.times_mutated == other.times_mutated
            && self.last_mutation == other.last_mutation
    }

    /// The 8 wrapped neighbors of `index`.
    #[must_use]
    pub fn neighbors(&self, index: usize) -> [usize; 8] {
        moore_neighbors(self.world_size, index)
    }

    /// Apply a species change at `index` during `iteration`.
    pub fn record_mutation(&mut self, index: usize, species: u8, iteration: u32) {
        self.species[index] = species;
        self.times_mutated[index] += 1;
        self.last_mutation[index] = iteration;
    }

    /// Mutable access to all three columns at once, for band-partitioned writers.
    pub(crate) fn columns_mut(&mut self) -> (&mut [u8], &mut [u32], &mut [u32]) {
        (
            &mut self.species,
            &mut self.times_mutated,
            &mut self.last_mutation,
        )
    }
}

/// Indices of the toroidal Moore neighborhood of `index`, row by row
/// (north-west first, south-east last).
#[inline]
#[must_use]
pub fn moore_neighbors(world_size: usize, index: usize) -> [usize; 8] {
    let x = index % world_size;
    let y = index / world_size;
    let left = if x == 0 { world_size - 1 } else { x - 1 };
    let right = if x + 1 == world_size { 0 } else { x + 1 };
    let up = if y == 0 { world_size - 1 } else { y - 1 };
    let down = if y + 1 == world_size { 0 } else { y + 1 };

    let up_row = up * world_size;
    let row = y * world_size;
    let down_row = down * world_size;
    [
        up_row + left,
        up_row + x,
        up_row + right,
        row + left,
        row + right,
        down_row + left,
        down_row + x,
        down_row + right,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn new_grid_is_zeroed() {
        let grid = Grid::new(4).expect("grid");
        assert_eq!(grid.world_size(), 4);
        assert_eq!(grid.len(), 16);
        assert!(grid.species().iter().all(|&s| s == 0));
        assert!(grid.times_mutated().iter().all(|&t| t == 0));
        assert!(grid.last_mutation().iter().all(|&t| t == 0));
    }

    #[test]
    fn rejects_zero_and_oversized_worlds() {
        assert!(matches!(
            Grid::new(0),
            Err(SimulationError::InvalidConfig(_))
        ));
        assert!(Grid::new(MAX_WORLD_SIZE + 1).is_err());
    }

    #[test]
    fn randomize_stays_within_species_range() {
        let mut grid = Grid::new(32).expect("grid");
        let mut rng = SmallRng::seed_from_u64(7);
        grid.randomize(3, &mut rng);
        assert!(grid.species().iter().all(|&s| s < 3));
        assert!(grid.species().iter().any(|&s| s == 2));
    }

    #[test]
    fn neighbors_wrap_on_both_axes() {
        let grid = Grid::new(3).expect("grid");
        let mut corner = grid.neighbors(grid.offset(0, 0));
        corner.sort_unstable();
        assert_eq!(corner, [1, 2, 3, 4, 5, 6, 7, 8]);

        let center = grid.neighbors(grid.offset(1, 1));
        assert_eq!(center, [0, 1, 2, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn single_cell_is_its_own_neighbor() {
        assert_eq!(moore_neighbors(1, 0), [0; 8]);
    }

    #[test]
    fn equals_compares_counters_too() {
        let mut a = Grid::new(2).expect("grid");
        let b = a.clone();
        assert!(a.equals(&b));
        a.record_mutation(3, 0, 9);
        assert!(!a.equals(&b));
        assert_eq!(
            a.cell(3),
            Some(CellSnapshot {
                species: 0,
                times_mutated: 1,
                last_mutation: 9,
            })
        );
        a.reset_counters();
        assert!(a.equals(&b));
        assert!(a.cell(4).is_none());
    }

    #[test]
    fn from_species_checks_length() {
        assert!(Grid::from_species(2, vec![0, 1, 0]).is_err());
        let grid = Grid::from_species(2, vec![0, 1, 1, 0]).expect("grid");
        assert_eq!(grid.species(), &[0, 1, 1, 0]);
    }
}
