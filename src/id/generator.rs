//! ID Generator
//!
//! Mints strictly increasing KSIDs under a single mutex.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use parking_lot::Mutex;

use crate::error::{Result, StoreError};

use super::ksid::{tick_at, Ksid, SLICE_MASK, TIME_MASK};

/// Thread-safe KSID source
///
/// Each cooperating process owns one generator configured with its own
/// `instance` out of `total` instances; every ID it mints satisfies
/// `slice % total == instance`, so configured instances never collide.
/// Share it between tables with an `Arc`; [`IdGenerator::global`] is the
/// one every default [`Config`](crate::Config) uses.
pub struct IdGenerator {
    state: Mutex<GeneratorState>,
}

#[derive(Debug)]
struct GeneratorState {
    instance: u64,
    total: u64,
    last_tick: u64,
    slice: u64,
}

impl IdGenerator {
    /// A generator for a single-instance deployment
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                instance: 0,
                total: 1,
                last_tick: 0,
                slice: 0,
            }),
        }
    }

    /// The process-wide generator
    ///
    /// Tables opened with a default config all mint from this instance, so
    /// their IDs never collide within one process. Calling `init_slice` on
    /// it repartitions every such table.
    pub fn global() -> Arc<IdGenerator> {
        static GLOBAL: OnceLock<Arc<IdGenerator>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(IdGenerator::new())))
    }

    /// A generator owning slice residue `instance` out of `total`
    pub fn with_slice(instance: u32, total: u32) -> Result<Self> {
        let generator = Self::new();
        generator.init_slice(instance, total)?;
        Ok(generator)
    }

    /// Reconfigure the slice partition
    ///
    /// Only IDs minted after this call are affected. Fails if `total` is
    /// zero, `instance >= total`, or the partition does not fit the slice
    /// field.
    pub fn init_slice(&self, instance: u32, total: u32) -> Result<()> {
        let (instance, total) = (u64::from(instance), u64::from(total));
        if total == 0 {
            return Err(StoreError::Config(
                "total instances must be positive".to_string(),
            ));
        }
        if instance >= total {
            return Err(StoreError::Config(format!(
                "instance {} out of range for {} instances",
                instance, total
            )));
        }
        if total - 1 > SLICE_MASK {
            return Err(StoreError::Config(format!(
                "{} instances do not fit in the {}-value slice field",
                total,
                SLICE_MASK + 1
            )));
        }

        let mut state = self.state.lock();
        state.instance = instance;
        state.total = total;
        // Exhaust the current tick so the next ID starts a fresh residue class
        state.slice = SLICE_MASK;
        Ok(())
    }

    /// Mint the next ID
    pub fn new_id(&self) -> Ksid {
        // Clocks before the epoch collapse to tick 0; the same-tick path
        // still keeps IDs increasing.
        let tick = tick_at(Utc::now()).unwrap_or(0).min(TIME_MASK);
        self.next_at(tick)
    }

    /// Configured `(instance, total)` pair
    pub fn slice_config(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.instance as u32, state.total as u32)
    }

    fn next_at(&self, now_tick: u64) -> Ksid {
        let mut state = self.state.lock();

        // Never step backwards, even if the wall clock does
        let mut tick = now_tick.max(state.last_tick);

        if tick == state.last_tick {
            let next = state.slice + state.total;
            if next > SLICE_MASK {
                // Slice space for this tick is used up: borrow the next tick
                tick += 1;
                state.slice = state.instance;
            } else {
                state.slice = next;
            }
        } else {
            state.slice = state.instance;
        }

        state.last_tick = tick;
        Ksid::from_parts(tick, state.slice)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IdGenerator")
            .field("instance", &state.instance)
            .field("total", &state.total)
            .field("last_tick", &state.last_tick)
            .finish()
    }
}
