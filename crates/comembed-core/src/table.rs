//! Negative-sampling table.
//!
//! Drawing from the smoothed unigram distribution is done by drawing a
//! uniform slot from a large table in which each node occupies a number of
//! slots proportional to `count^power` (Mikolov et al. 2013 use `power = 0.75`).
//!
//! ```text
//! freq^1    over-samples hubs
//! freq^0    over-samples rare nodes
//! freq^0.75 in between
//! ```

use crate::error::{Error, Result};
use crate::vocab::Vocab;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Table construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Number of slots in the table.
    pub size: usize,
    /// Smoothing exponent applied to counts.
    pub power: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            size: 100_000_000,
            power: 0.75,
        }
    }
}

impl TableConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }
}

/// Precomputed array of vocabulary indices; uniform draws over it follow the
/// smoothed unigram distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingTable {
    slots: Vec<u32>,
}

impl SamplingTable {
    /// Wrap an explicit slot array.
    pub fn from_indices(slots: Vec<u32>) -> Self {
        Self { slots }
    }

    /// Build a table from per-index frequencies (`counts[i]` is node `i`).
    pub fn from_counts(counts: &[u64], config: TableConfig) -> Result<Self> {
        if config.size == 0 {
            return Err(Error::InvalidConfig("table size must be positive".into()));
        }
        if counts.is_empty() {
            return Ok(Self::default());
        }
        if counts.len() > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "vocabulary of {} entries does not fit u32 slots",
                counts.len()
            )));
        }

        let total: f64 = counts.iter().map(|&c| (c as f64).powf(config.power)).sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(Error::InvalidConfig(
                "counts must contain at least one positive entry".into(),
            ));
        }

        let mut slots = Vec::with_capacity(config.size);
        let mut cumulative = 0.0;
        for (node, &count) in counts.iter().enumerate() {
            cumulative += (count as f64).powf(config.power) / total;
            let upto = ((cumulative * config.size as f64) as usize).min(config.size);
            let take = upto.saturating_sub(slots.len());
            slots.extend(std::iter::repeat(node as u32).take(take));
        }

        // Rounding can leave a short tail; give it to the last node with mass.
        if let Some(last) = counts.iter().rposition(|&c| c > 0) {
            slots.resize(config.size, last as u32);
        }

        debug!(
            vocab = counts.len(),
            slots = slots.len(),
            power = config.power,
            "built negative sampling table"
        );
        Ok(Self { slots })
    }

    /// Build a table from vocabulary entries, placing each at its `index`.
    pub fn from_vocab<'a, I>(vocab: I, config: TableConfig) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Vocab>,
    {
        let mut counts = Vec::new();
        for v in vocab {
            if v.index >= counts.len() {
                counts.resize(v.index + 1, 0);
            }
            counts[v.index] = v.count;
        }
        Self::from_counts(&counts, config)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Raw slot array.
    pub fn as_slice(&self) -> &[u32] {
        &self.slots
    }

    /// Number of distinct indices present.
    pub fn distinct(&self) -> usize {
        self.slots.iter().collect::<HashSet<_>>().len()
    }

    /// Largest index present, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.slots.iter().max().map(|&v| v as usize)
    }

    /// One uniform draw; `None` when the table is empty.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        Some(self.slots[rng.random_range(0..self.slots.len())] as usize)
    }
}
