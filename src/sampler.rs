//! Reproducible Sampler - seeded winner selection without replacement

use crate::error::{DrawError, DrawResult};
use crate::query::executor::FilteredResult;
use crate::storage::dataset::Dataset;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Seed of one draw; recording it makes the draw replayable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawSeed(pub u64);

impl DrawSeed {
    /// Fresh seed from the thread RNG
    pub fn random() -> Self {
        Self(rand::thread_rng().gen())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DrawSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DrawSeed {
    fn from(seed: u64) -> Self {
        Self(seed)
    }
}

/// Winners picked from a filtered result
#[derive(Clone, Debug)]
pub struct Draw {
    pub seed: DrawSeed,
    /// Positions within the filtered result, in sampled order
    pub positions: Vec<usize>,
    /// Positions within the source dataset, in sampled order
    pub source_rows: Vec<usize>,
    /// The winning rows
    pub rows: Dataset,
    pub drawn_at: DateTime<Utc>,
}

impl Draw {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

pub struct ReproducibleSampler;

impl ReproducibleSampler {
    /// Pick `k` distinct rows; same seed and same input give the same draw
    pub fn draw(filtered: &FilteredResult, k: usize, seed: DrawSeed) -> DrawResult<Draw> {
        let available = filtered.num_rows();
        if k == 0 || k > available {
            return Err(DrawError::invalid_draw_size(k, available));
        }

        let mut rng = StdRng::seed_from_u64(seed.0);
        let positions = rand::seq::index::sample(&mut rng, available, k).into_vec();
        let source_rows = positions.iter().map(|&p| filtered.source_rows[p]).collect();
        let rows = filtered
            .dataset
            .take(&positions)
            .map_err(|e| DrawError::query_execution(format!("failed to gather winners: {}", e)))?;

        info!(seed = seed.0, k, available, "Drew winners");
        Ok(Draw {
            seed,
            positions,
            source_rows,
            rows,
            drawn_at: Utc::now(),
        })
    }
}
