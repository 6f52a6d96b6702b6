//! Particle identity generation.
//!
//! Two independent strategies issue [`ParticleId`]s: [`IdPool`] hands out
//! monotonically increasing ids and recycles released ones, while
//! [`SpatialIdGrid`] derives an id deterministically from discretized
//! release coordinates. They are never combined. [`IdLedger`] tracks the
//! highest id any caller has used explicitly, so auto-issued ids can be
//! seeded past it.
//!
//! None of these are internally synchronized beyond the ledger's atomic;
//! callers needing concurrent issuance serialize externally.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use indexmap::IndexMap;
use rand::Rng;

/// Identity of one particle.
///
/// Pool-issued ids are small non-negative integers; grid-issued ids pack
/// discretized coordinates in the high 32 bits and a per-cell sequence in
/// the low 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub i64);

impl ParticleId {
    /// The geospatial component of a grid-issued id.
    pub fn geo_word(&self) -> u32 {
        (self.0 as u64 >> 32) as u32
    }

    /// The per-cell sequence component of a grid-issued id.
    pub fn sequence_word(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ParticleId {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Process-scoped high-water mark of the last explicitly used identity.
///
/// Advanced whenever a particle is constructed with an explicit id, so a
/// pool seeded from [`IdLedger::last`] never re-issues an id a caller
/// already chose. An explicit object passed by reference, never hidden
/// class state; the atomic makes `observe` usable through a shared
/// reference.
#[derive(Debug)]
pub struct IdLedger {
    last: AtomicI64,
}

impl IdLedger {
    /// Create a ledger with no observed ids.
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(-1),
        }
    }

    /// Record an explicitly used id. Never decreases the mark.
    pub fn observe(&self, id: ParticleId) {
        self.last.fetch_max(id.0, Ordering::Relaxed);
    }

    /// The highest id observed so far, or -1 if none.
    pub fn last(&self) -> i64 {
        self.last.load(Ordering::Relaxed)
    }
}

impl Default for IdLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic id issuer with LIFO recycling.
#[derive(Clone, Debug, Default)]
pub struct IdPool {
    released: Vec<i64>,
    next: i64,
}

impl IdPool {
    /// Create an empty pool issuing from 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool whose first fresh id is `next`.
    ///
    /// Typically seeded with `ledger.last() + 1` to step over explicitly
    /// used ids.
    pub fn starting_at(next: i64) -> Self {
        Self {
            released: Vec::new(),
            next,
        }
    }

    /// Issue an id: the most recently released one if any, else a fresh
    /// monotonic value.
    pub fn next(&mut self) -> ParticleId {
        match self.released.pop() {
            Some(id) => ParticleId(id),
            None => {
                let id = self.next;
                self.next += 1;
                ParticleId(id)
            }
        }
    }

    /// Return an id to the pool for reuse.
    pub fn release(&mut self, id: ParticleId) {
        self.released.push(id.0);
    }

    /// Reset the pool to hold exactly the ids `0..n` and set the fresh
    /// counter to `n`.
    ///
    /// `next()` pops from the back, so the range is stored high-to-low and
    /// an unshuffled pool hands the ids back in ascending order.
    pub fn pregenerate(&mut self, n: i64) {
        self.released.clear();
        self.released.extend((0..n).rev());
        self.next = n;
    }

    /// Scramble the reuse order with `2n` random-position pop/push-back
    /// cycles. No uniformity guarantee.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let n = self.released.len();
        for _ in 0..2 * n {
            let index = rng.gen_range(0..n);
            let id = self.released.remove(index);
            self.released.push(id);
        }
    }

    /// How many fresh ids have been set aside (the monotonic counter).
    pub fn issued(&self) -> i64 {
        self.next
    }

    /// How many released ids are waiting for reuse.
    pub fn available(&self) -> usize {
        self.released.len()
    }
}

/// Number of depth buckets a configured depth range is divided into.
pub const DEPTH_BUCKETS: u32 = 128;

/// Number of time buckets a configured time range is divided into.
pub const TIME_BUCKETS: u32 = 256;

/// Derives 64-bit ids from discretized release coordinates.
///
/// Longitude discretizes to an integer degree in `[-180, 180)`, latitude
/// to `[-90, 90)`, depth and time to [`DEPTH_BUCKETS`]/[`TIME_BUCKETS`]
/// buckets over configured ranges. Each occupied cell of the resulting
/// 4-D grid carries a running sequence counter; the cell table is sparse,
/// which keeps an almost-empty 360x180x128x256 grid from costing
/// gigabytes while preserving per-cell counting exactly.
///
/// Degenerate bounds (`min == max`), out-of-range coordinates, and
/// per-cell sequence overflow are caller errors and are not guarded.
#[derive(Clone, Debug)]
pub struct SpatialIdGrid {
    depth_bounds: (f64, f64),
    time_bounds: (f64, f64),
    cells: IndexMap<(u16, u16, u8, u8), u32>,
}

impl SpatialIdGrid {
    /// Create a grid with depth and time bounds of `[0, 1]`.
    pub fn new() -> Self {
        Self {
            depth_bounds: (0.0, 1.0),
            time_bounds: (0.0, 1.0),
            cells: IndexMap::new(),
        }
    }

    /// Configure the depth range mapped onto the depth buckets.
    pub fn set_depth_bounds(&mut self, min: f64, max: f64) {
        self.depth_bounds = (min, max);
    }

    /// Configure the time range mapped onto the time buckets.
    pub fn set_time_bounds(&mut self, min: f64, max: f64) {
        self.time_bounds = (min, max);
    }

    /// Derive the next id for a release at the given coordinates.
    ///
    /// The high 32 bits pack `(lon_idx << 23) | (lat_idx << 15) |
    /// (depth_idx << 8) | raw_time`, where `raw_time` is the time value
    /// truncated to an integer; the low 32 bits are the cell's
    /// post-incremented sequence counter. Two releases in the same cell
    /// therefore share a geo word and differ by one in sequence.
    pub fn id_for(&mut self, lon: f64, lat: f64, depth: f64, time: f64) -> ParticleId {
        let lon_idx = (lon as i32 + 180) as u32;
        let lat_idx = (lat as i32 + 90) as u32;
        let depth_frac =
            (depth - self.depth_bounds.0) / (self.depth_bounds.1 - self.depth_bounds.0);
        let depth_idx = ((DEPTH_BUCKETS - 1) as f64 * depth_frac) as i32 as u32;
        let time_frac = (time - self.time_bounds.0) / (self.time_bounds.1 - self.time_bounds.0);
        let time_idx = ((TIME_BUCKETS - 1) as f64 * time_frac) as i32 as u32;

        let key = (lon_idx as u16, lat_idx as u16, depth_idx as u8, time_idx as u8);
        let counter = self.cells.entry(key).or_insert(0);
        let sequence = *counter;
        *counter += 1;

        let raw_time = time as i64 as u32;
        let geo = (lon_idx << 23) | (lat_idx << 15) | (depth_idx << 8) | raw_time;
        ParticleId((((geo as u64) << 32) | sequence as u64) as i64)
    }

    /// Number of grid cells that have issued at least one id.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

impl Default for SpatialIdGrid {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn pool_issues_monotonically_when_empty() {
        let mut pool = IdPool::new();
        assert_eq!(pool.next(), ParticleId(0));
        assert_eq!(pool.next(), ParticleId(1));
        assert_eq!(pool.next(), ParticleId(2));
        assert_eq!(pool.issued(), 3);
    }

    #[test]
    fn released_id_is_reused_first() {
        let mut pool = IdPool::new();
        let id = pool.next();
        pool.release(id);
        assert_eq!(pool.next(), id);
    }

    #[test]
    fn reuse_is_lifo() {
        let mut pool = IdPool::new();
        let a = pool.next();
        let b = pool.next();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.next(), b);
        assert_eq!(pool.next(), a);
    }

    #[test]
    fn pregenerated_ids_come_back_ascending() {
        let mut pool = IdPool::new();
        pool.pregenerate(5);
        let ids: Vec<i64> = (0..5).map(|_| pool.next().0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        // The pool is drained; the next id is fresh.
        assert_eq!(pool.next(), ParticleId(5));
    }

    #[test]
    fn shuffle_permutes_without_loss() {
        let mut pool = IdPool::new();
        pool.pregenerate(5);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        pool.shuffle(&mut rng);
        let mut ids: Vec<i64> = (0..5).map(|_| pool.next().0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shuffle_of_empty_pool_is_a_no_op() {
        let mut pool = IdPool::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        pool.shuffle(&mut rng);
        assert_eq!(pool.next(), ParticleId(0));
    }

    #[test]
    fn ledger_never_decreases() {
        let ledger = IdLedger::new();
        assert_eq!(ledger.last(), -1);
        ledger.observe(ParticleId(10));
        ledger.observe(ParticleId(3));
        assert_eq!(ledger.last(), 10);
    }

    #[test]
    fn same_cell_shares_geo_word_and_increments_sequence() {
        let mut grid = SpatialIdGrid::new();
        let first = grid.id_for(0.0, 0.0, 0.5, 0.5);
        let second = grid.id_for(0.0, 0.0, 0.5, 0.5);
        assert_eq!(first.geo_word(), second.geo_word());
        assert_eq!(second.sequence_word(), first.sequence_word() + 1);
        assert_eq!(first.sequence_word(), 0);
        assert_eq!(grid.occupied_cells(), 1);
    }

    #[test]
    fn distinct_cells_get_distinct_geo_words() {
        let mut grid = SpatialIdGrid::new();
        let a = grid.id_for(12.0, -30.0, 0.1, 0.2);
        let b = grid.id_for(13.0, -30.0, 0.1, 0.2);
        assert_ne!(a.geo_word(), b.geo_word());
        assert_eq!(a.sequence_word(), 0);
        assert_eq!(b.sequence_word(), 0);
        assert_eq!(grid.occupied_cells(), 2);
    }

    #[test]
    fn geo_word_packs_the_documented_bit_fields() {
        let mut grid = SpatialIdGrid::new();
        let id = grid.id_for(0.0, 0.0, 0.5, 0.5);
        let geo = id.geo_word();
        assert_eq!(geo >> 23, 180); // lon index
        assert_eq!((geo >> 15) & 0xff, 90); // lat index
        assert_eq!((geo >> 8) & 0x7f, 63); // depth bucket, floor(127 * 0.5)
        assert_eq!(geo & 0xff, 0); // raw time truncates to 0
    }

    #[test]
    fn rescaled_bounds_move_the_buckets() {
        let mut grid = SpatialIdGrid::new();
        grid.set_depth_bounds(0.0, 100.0);
        grid.set_time_bounds(0.0, 10.0);
        let shallow = grid.id_for(0.0, 0.0, 1.0, 0.0);
        let deep = grid.id_for(0.0, 0.0, 99.0, 0.0);
        assert_ne!(shallow.geo_word(), deep.geo_word());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn fresh_ids_are_unique(count in 1usize..200) {
                let mut pool = IdPool::new();
                let mut seen = std::collections::HashSet::new();
                for _ in 0..count {
                    prop_assert!(seen.insert(pool.next()));
                }
            }

            #[test]
            fn release_then_next_round_trips(id in 0i64..1_000_000) {
                let mut pool = IdPool::starting_at(1_000_000);
                pool.release(ParticleId(id));
                prop_assert_eq!(pool.next(), ParticleId(id));
            }

            #[test]
            fn shuffle_preserves_the_id_set(n in 0i64..64, seed in 0u64..1024) {
                let mut pool = IdPool::new();
                pool.pregenerate(n);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                pool.shuffle(&mut rng);
                let mut ids: Vec<i64> = (0..n).map(|_| pool.next().0).collect();
                ids.sort_unstable();
                prop_assert_eq!(ids, (0..n).collect::<Vec<_>>());
            }

            #[test]
            fn sequence_counts_releases_per_cell(releases in 1u32..32) {
                let mut grid = SpatialIdGrid::new();
                let mut last = None;
                for _ in 0..releases {
                    last = Some(grid.id_for(5.0, 5.0, 0.25, 0.75));
                }
                prop_assert_eq!(last.unwrap().sequence_word(), releases - 1);
            }
        }
    }
}
