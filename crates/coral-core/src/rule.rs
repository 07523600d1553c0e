//! Majority-vote transition rule with position-seeded tie-breaking.

use rand::{RngCore, SeedableRng, rngs::SmallRng};

use crate::grid::moore_neighbors;

/// Neighbor agreement (out of 8) at which a cell goes dormant.
pub const DORMANT_THRESHOLD: u32 = 5;

/// Odd multiplier mixing cell index and iteration into a tie-break seed.
const TIE_BREAK_MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// Result of evaluating one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Majority species among the 8 neighbors.
    pub species: u8,
    /// The winning species held at least [`DORMANT_THRESHOLD`] neighbors.
    pub dormant: bool,
}

/// Seed for the tie-break generator of `index` at `iteration`.
///
/// Depends on nothing else, so every thread derives the same bits for the
/// same cell and round.
#[inline]
#[must_use]
pub fn tie_break_seed(index: usize, iteration: u32) -> u64 {
    ((index as u64) ^ (u64::from(iteration) << 32)).wrapping_mul(TIE_BREAK_MULTIPLIER)
}

/// Evaluate cell `index` against a read-only species snapshot.
///
/// `histogram` is caller-owned scratch and must hold one slot per species.
/// Ties with the running maximum are settled in ascending species order, one
/// generator bit per tie: a set bit hands the win to the later species.
pub fn evaluate(
    species: &[u8],
    world_size: usize,
    index: usize,
    iteration: u32,
    histogram: &mut [u32],
) -> Transition {
    histogram.fill(0);
    for neighbor in moore_neighbors(world_size, index) {
        histogram[usize::from(species[neighbor])] += 1;
    }

    let mut winner = 0usize;
    let mut best = histogram[0];
    let mut tie_bits: Option<u64> = None;
    let mut ties = 0u32;
    for (candidate, &count) in histogram.iter().enumerate().skip(1) {
        if count > best {
            best = count;
            winner = candidate;
        } else if count == best && count > 0 {
            let bits = *tie_bits.get_or_insert_with(|| {
                SmallRng::seed_from_u64(tie_break_seed(index, iteration)).next_u64()
            });
            if (bits >> ties) & 1 == 1 {
                winner = candidate;
            }
            ties += 1;
        }
    }

    Transition {
        // histogram.len() <= 255, so the index fits.
        species: winner as u8,
        dormant: best >= DORMANT_THRESHOLD,
    }
}
