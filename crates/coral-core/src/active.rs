//! Sparse set of cell indices awaiting evaluation.

use rand::{Rng, seq::SliceRandom};

const ABSENT: u32 = u32::MAX;

/// Dense index list plus a per-cell slot map.
///
/// `slots[cell]` holds the position of `cell` inside `dense`, or `ABSENT`.
/// Membership, insertion, and unordered removal are all O(1).
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    dense: Vec<u32>,
    slots: Vec<u32>,
}

impl ActiveSet {
    /// Empty set able to address `cells` indices.
    #[must_use]
    pub fn new(cells: usize) -> Self {
        Self {
            dense: Vec::with_capacity(cells),
            slots: vec![ABSENT; cells],
        }
    }

    /// Number of scheduled cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Number of addressable cells.
    #[must_use]
    pub fn capacity_cells(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn contains(&self, cell: u32) -> bool {
        self.slots
            .get(cell as usize)
            .is_some_and(|&slot| slot != ABSENT)
    }

    /// Scheduled indices in current evaluation order.
    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.dense
    }

    /// Schedule `cell`; returns false when it was already present.
    pub fn insert(&mut self, cell: u32) -> bool {
        let slot = &mut self.slots[cell as usize];
        if *slot != ABSENT {
            return false;
        }
        *slot = self.dense.len() as u32;
        self.dense.push(cell);
        true
    }

    /// Unschedule `cell` by swapping the last entry into its slot.
    pub fn remove(&mut self, cell: u32) -> bool {
        let slot = self.slots[cell as usize];
        if slot == ABSENT {
            return false;
        }
        self.slots[cell as usize] = ABSENT;
        self.dense.swap_remove(slot as usize);
        if let Some(&moved) = self.dense.get(slot as usize) {
            self.slots[moved as usize] = slot;
        }
        true
    }

    /// Reset to every one of `cells` indices, visited in a shuffled order.
    pub fn fill_shuffled<R: Rng + ?Sized>(&mut self, cells: usize, rng: &mut R) {
        self.dense.clear();
        self.dense.extend(0..cells as u32);
        self.dense.shuffle(rng);
        self.slots.clear();
        self.slots.resize(cells, ABSENT);
        for (slot, &cell) in self.dense.iter().enumerate() {
            self.slots[cell as usize] = slot as u32;
        }
    }

    /// Rebuild the dense list in ascending index order from the slot map and
    /// release capacity left behind by removals.
    pub fn compact(&mut self) {
        self.dense.clear();
        for (cell, slot) in self.slots.iter_mut().enumerate() {
            if *slot != ABSENT {
                *slot = self.dense.len() as u32;
                self.dense.push(cell as u32);
            }
        }
        self.dense.shrink_to_fit();
    }

    pub fn clear(&mut self) {
        for &cell in &self.dense {
            self.slots[cell as usize] = ABSENT;
        }
        self.dense.clear();
    }

    #[cfg(test)]
    fn assert_coherent(&self) {
        for (slot, &cell) in self.dense.iter().enumerate() {
            assert_eq!(self.slots[cell as usize], slot as u32);
        }
        let present = self.slots.iter().filter(|&&s| s != ABSENT).count();
        assert_eq!(present, self.dense.len());
    }
}
