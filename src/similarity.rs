//! Similarity index: exact cosine k-NN over movie feature vectors.
//!
//! The full N x N similarity matrix is quadratic in catalog size, so the
//! index instead materializes the L2-normalized feature matrix once and
//! answers each query with a single matrix-vector product. Scores are exact
//! cosine, no approximate-nearest-neighbor recall trade-off, and the same
//! method is used for the whole process lifetime.

use crate::catalog::MovieId;
use crate::error::{RecommendError, Result};
use crate::features::FeatureMatrix;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use std::collections::HashMap;

/// Precomputed unit-norm feature rows, in catalog order.
#[derive(Debug)]
pub struct SimilarityIndex {
    normalized: Array2<f32>,
    movie_ids: Vec<MovieId>,
    row_of: HashMap<MovieId, usize>,
}

impl SimilarityIndex {
    pub fn build(features: &FeatureMatrix) -> Self {
        let mut normalized = features.matrix().clone();

        // Zero rows (movies with no metadata) stay zero and score 0 against
        // everything, which keeps them out of similarity results.
        normalized
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    row.mapv_inplace(|v| v / norm);
                }
            });

        let movie_ids: Vec<MovieId> = (0..features.num_movies())
            .map(|row| features.movie_id_of_row(row))
            .collect();
        let row_of = movie_ids
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        Self {
            normalized,
            movie_ids,
            row_of,
        }
    }

    pub fn num_movies(&self) -> usize {
        self.movie_ids.len()
    }

    /// Exact cosine similarity between two movies in [0, 1].
    ///
    /// Self-similarity is 1 by definition, including for zero vectors.
    pub fn score(&self, a: MovieId, b: MovieId) -> Result<f32> {
        let row_a = self.row_checked(a)?;
        let row_b = self.row_checked(b)?;
        if row_a == row_b {
            return Ok(1.0);
        }
        Ok(self
            .normalized
            .row(row_a)
            .dot(&self.normalized.row(row_b)))
    }

    /// The k most similar movies to the query, ordered by descending score
    /// with ties broken by lower movie id. The query itself and movies with
    /// zero similarity are excluded, so fewer than k results is a normal
    /// outcome.
    pub fn similar(&self, movie_id: MovieId, k: usize) -> Result<Vec<(MovieId, f32)>> {
        let row = self.row_checked(movie_id)?;
        let scores = self.normalized.dot(&self.normalized.row(row));

        let mut candidates: Vec<(MovieId, f32)> = scores
            .iter()
            .enumerate()
            .filter(|&(other, &score)| other != row && score > 0.0)
            .map(|(other, &score)| (self.movie_ids[other], score))
            .collect();

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(k);
        Ok(candidates)
    }

    fn row_checked(&self, id: MovieId) -> Result<usize> {
        self.row_of.get(&id).copied().ok_or_else(|| {
            RecommendError::InsufficientData(format!("movie {id} not in similarity index"))
        })
    }
}
