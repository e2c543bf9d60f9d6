//! Similarity index and the weighted cosine score
//!
//! Vectors are compared in their flattened canonical layout. Each dimension is
//! weighted by the square root of its feature's weight, so the inner product
//! of two weighted vectors weights each dimension's product by the full weight.

use crate::summary::{Field, NormalizedVector, SUMMARY_DIM};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;


/// Per-dimension weights in flattened canonical order
#[derive(Debug, Clone)]
pub struct WeightTable {
    weights: [f64; SUMMARY_DIM],
    sqrt_weights: [f64; SUMMARY_DIM],
}

impl WeightTable {
    fn build() -> Self {
        let mut weights = [0.0; SUMMARY_DIM];
        for field in Field::ALL {
            let start = field.offset();
            weights[start..start + field.width()].fill(field.weight());
        }
        Self {
            weights,
            sqrt_weights: weights.map(f64::sqrt),
        }
    }

    /// The process-wide table, built on first use
    pub fn global() -> &'static WeightTable {
        static TABLE: OnceLock<WeightTable> = OnceLock::new();
        TABLE.get_or_init(WeightTable::build)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn sqrt_weights(&self) -> &[f64] {
        &self.sqrt_weights
    }
}

fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Unit-normalize and apply the square-root weights
fn weighted_unit(values: &[f64], sqrt_weights: &[f64]) -> Option<Vec<f64>> {
    let norm = l2_norm(values);
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(
        values
            .iter()
            .zip(sqrt_weights)
            .map(|(v, w)| v / norm * w)
            .collect(),
    )
}

/// Weighted cosine similarity of two flattened vectors
///
/// Returns `None` when either vector does not have the canonical dimension.
/// A zero vector scores 0.0 against everything.
pub fn weighted_cosine(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != SUMMARY_DIM || b.len() != SUMMARY_DIM {
        return None;
    }
    let sqrt_weights = WeightTable::global().sqrt_weights();

    let (Some(wa), Some(wb)) = (weighted_unit(a, sqrt_weights), weighted_unit(b, sqrt_weights))
    else {
        return Some(0.0);
    };

    let denom = l2_norm(&wa) * l2_norm(&wb);
    if denom == 0.0 {
        return Some(0.0);
    }
    let dot: f64 = wa.iter().zip(&wb).map(|(x, y)| x * y).sum();
    let score = dot / denom;

    Some(if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    })
}

/// A recording's identity and its flattened normalized vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub identity: String,
    pub vector: Vec<f64>,
}

impl CorpusEntry {
    pub fn new(identity: impl Into<String>, vector: &NormalizedVector) -> Self {
        Self {
            identity: identity.into(),
            vector: vector.flatten(),
        }
    }

    /// Entry as loaded from a store, not yet checked for shape
    pub fn from_raw(identity: impl Into<String>, vector: Vec<f64>) -> Self {
        Self {
            identity: identity.into(),
            vector,
        }
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub identity: String,
    pub score: f64,
}

/// A corpus entry left out of a ranking because its shape is wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub identity: String,
    pub got: usize,
    pub want: usize,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skipped {}: vector has {} dimensions, expected {}",
            self.identity, self.got, self.want
        )
    }
}

/// Ranked hits plus the entries that could not be scored
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    pub hits: Vec<Hit>,
    pub skipped: Vec<SkippedEntry>,
}

/// In-memory index over one corpus snapshot
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    entries: Vec<CorpusEntry>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, entry: CorpusEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank every entry against `query` and keep the best `top_n`
    ///
    /// Ties are broken by identity in ascending order. Entries with the wrong
    /// dimension are skipped and reported.
    pub fn query(&self, query: &NormalizedVector, top_n: usize) -> QueryOutcome {
        let query = query.flatten();

        let scored: Vec<Result<Hit, SkippedEntry>> = self
            .entries
            .par_iter()
            .map(|entry| match weighted_cosine(&query, &entry.vector) {
                Some(score) => Ok(Hit {
                    identity: entry.identity.clone(),
                    score,
                }),
                None => Err(SkippedEntry {
                    identity: entry.identity.clone(),
                    got: entry.vector.len(),
                    want: SUMMARY_DIM,
                }),
            })
            .collect();

        let mut outcome = QueryOutcome::default();
        for result in scored {
            match result {
                Ok(hit) => outcome.hits.push(hit),
                Err(skipped) => {
                    log::warn!("{}", skipped);
                    outcome.skipped.push(skipped);
                }
            }
        }

        outcome.hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        outcome.hits.truncate(top_n);

        log::debug!(
            "Ranked {} of {} entries, returning {}",
            self.entries.len() - outcome.skipped.len(),
            self.entries.len(),
            outcome.hits.len()
        );
        outcome
    }
}
