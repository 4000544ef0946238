//! Candidate-set construction.
//!
//! Two policies select the item indices eligible for scoring: the
//! restricted catalog (the "mine" subset) and the full catalog, which is
//! deterministically subsampled when it exceeds a fixed ceiling. Both
//! exclude courses the user has already rated, unless that exclusion would
//! leave nothing to recommend.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::model::IdentifierMapping;

/// Ceiling on the number of candidates scored per request.
pub const MAX_CANDIDATES: usize = 1000;

/// Base offset mixed into the per-user sampling seed.
const SAMPLE_SEED_BASE: u64 = 42;

/// Selects the item indices eligible for scoring.
///
/// With `mine_only` set and a restricted subset available, candidates come
/// from that subset; otherwise from the full catalog. Always returns a set,
/// possibly empty when the catalog itself is empty; an empty result is a
/// terminal state for the caller, not an error.
pub fn select_candidates(
    user_id: &str,
    item_mapping: &IdentifierMapping,
    rated_items: &HashSet<String>,
    mine_only: bool,
    mine_indices: Option<&[usize]>,
) -> Vec<usize> {
    if mine_only {
        if let Some(mine) = mine_indices {
            return restricted_candidates(item_mapping, rated_items, mine);
        }
    }
    full_catalog_candidates(user_id, item_mapping, rated_items)
}

/// Restricted-catalog policy: the "mine" subset minus rated courses.
///
/// A user who has rated the whole restricted subset is still served from
/// it, unfiltered.
fn restricted_candidates(
    item_mapping: &IdentifierMapping,
    rated_items: &HashSet<String>,
    mine: &[usize],
) -> Vec<usize> {
    let filtered: Vec<usize> = mine
        .iter()
        .copied()
        .filter(|&index| !is_rated(item_mapping, rated_items, index))
        .collect();

    if filtered.is_empty() {
        mine.to_vec()
    } else {
        filtered
    }
}

/// Full-catalog policy: every item minus rated courses, subsampled down to
/// [`MAX_CANDIDATES`] when the pool is larger.
fn full_catalog_candidates(
    user_id: &str,
    item_mapping: &IdentifierMapping,
    rated_items: &HashSet<String>,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = (0..item_mapping.len())
        .filter(|&index| !is_rated(item_mapping, rated_items, index))
        .collect();

    if candidates.is_empty() {
        candidates = (0..item_mapping.len()).collect();
    }

    if candidates.len() > MAX_CANDIDATES {
        candidates = sample_candidates(user_id, candidates);
    }
    candidates
}

fn is_rated(
    item_mapping: &IdentifierMapping,
    rated_items: &HashSet<String>,
    index: usize,
) -> bool {
    item_mapping
        .external_of(index)
        .is_some_and(|id| rated_items.contains(id))
}

/// Deterministically reduces an oversized pool to exactly [`MAX_CANDIDATES`].
///
/// The seed mixes a stable hash of the external user id with a fixed base,
/// so repeated requests for the same user and policy sample the same
/// subset.
fn sample_candidates(user_id: &str, candidates: Vec<usize>) -> Vec<usize> {
    let seed = SAMPLE_SEED_BASE + stable_hash(user_id) % 100_000;
    let mut rng = StdRng::seed_from_u64(seed);
    rand::seq::index::sample(&mut rng, candidates.len(), MAX_CANDIDATES)
        .iter()
        .map(|position| candidates[position])
        .collect()
}

/// FNV-1a over the id bytes. The standard library hasher is not guaranteed
/// stable across releases and the sample seed must be.
fn stable_hash(value: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in value.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
