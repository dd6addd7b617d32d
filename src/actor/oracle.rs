use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::fmt::Debug;

/// Source of the manager's hit/miss outcomes and write-hit frame choices.
pub trait AccessOracle: Send + Debug {
    /// Decides whether an access to a non-empty table hits.
    fn is_hit(&mut self) -> bool;

    /// Picks a position in `0..loaded` among the loaded frames for a write
    /// hit. `loaded` is never zero.
    fn choose_frame(&mut self, loaded: usize) -> usize;
}

/// Builds the RNG for one consumer. With a seed, each `stream` gets its own
/// reproducible sequence.
pub fn seeded_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_entropy(),
    }
}

/// Draws hits with a fixed probability and picks frames uniformly.
#[derive(Debug)]
pub struct RandomOracle {
    rng: StdRng,
    hit_rate: f64,
}

impl RandomOracle {
    pub fn new(hit_rate: f64, seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed, 0),
            hit_rate,
        }
    }
}

impl AccessOracle for RandomOracle {
    fn is_hit(&mut self) -> bool {
        self.rng.gen_bool(self.hit_rate)
    }

    fn choose_frame(&mut self, loaded: usize) -> usize {
        self.rng.gen_range(0..loaded)
    }
}

/// Replays a fixed list of outcomes. Once the script runs out every access
/// misses and every pick is the first loaded frame.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    outcomes: VecDeque<bool>,
    picks: VecDeque<usize>,
}

impl ScriptedOracle {
    /// `true` entries are hits, `false` entries misses.
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            picks: VecDeque::new(),
        }
    }

    pub fn always_miss() -> Self {
        Self::default()
    }

    /// Positions returned by successive [`AccessOracle::choose_frame`] calls.
    pub fn with_picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks = picks.into_iter().collect();
        self
    }
}

impl AccessOracle for ScriptedOracle {
    fn is_hit(&mut self) -> bool {
        self.outcomes.pop_front().unwrap_or(false)
    }

    fn choose_frame(&mut self, loaded: usize) -> usize {
        self.picks
            .pop_front()
            .unwrap_or(0)
            .min(loaded.saturating_sub(1))
    }
}
