//! Collaborative filtering recommender.
//!
//! Treats "liked these three movies" as a stand-in for a rating history:
//! a pseudo-user latent vector is synthesized from the seeds' item factors
//! (the cold-start path, since the requester has no user-factor row), then
//! every rated movie in the catalog is scored against it. The full scoring
//! pass is O(N) per request and dominates per-request cost.

use crate::catalog::{Catalog, MovieId};
use crate::content_based::SEED_COUNT;
use crate::error::{RecommendError, Result};
use crate::matrix_factorization::MatrixFactorization;
use std::sync::Arc;
use tracing::warn;

/// Stateless orchestrator over the shared, read-only latent factor model.
pub struct CollaborativeRecommender {
    catalog: Arc<Catalog>,
    model: Arc<MatrixFactorization>,
}

impl CollaborativeRecommender {
    pub fn new(catalog: Arc<Catalog>, model: Arc<MatrixFactorization>) -> Self {
        Self { catalog, model }
    }

    /// Top `top_n` titles by predicted pseudo-user affinity.
    ///
    /// Only movies with rating history are eligible: cold items have no
    /// item factors and belong to the content engine instead. Seeds never
    /// appear in the output.
    pub fn recommend(&self, seed_titles: [&str; SEED_COUNT], top_n: usize) -> Result<Vec<String>> {
        let mut seed_ids = Vec::with_capacity(SEED_COUNT);
        for title in seed_titles {
            seed_ids.push(self.catalog.resolve_title(title)?);
        }

        let pseudo_user = self.model.pseudo_user(&seed_ids)?;

        let mut ranked: Vec<(MovieId, f32)> = Vec::with_capacity(self.model.rated_movies().len());
        for &movie_id in self.model.rated_movies() {
            if seed_ids.contains(&movie_id) {
                continue;
            }
            let score = self.model.predict(pseudo_user.view(), movie_id)?;
            ranked.push((movie_id, score));
        }

        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_n);

        if ranked.len() < top_n {
            warn!(
                requested = top_n,
                returned = ranked.len(),
                "collaborative candidate pool exhausted"
            );
        }

        ranked
            .into_iter()
            .map(|(id, _)| {
                self.catalog
                    .title_of(id)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        RecommendError::InvalidCatalog(format!("movie {id} missing from catalog"))
                    })
            })
            .collect()
    }

    /// Predicted scores for the ranked titles, in output order. Exposed so
    /// callers can assert the non-increasing ordering contract.
    pub fn scored(&self, seed_titles: [&str; SEED_COUNT], top_n: usize) -> Result<Vec<(String, f32)>> {
        let titles = self.recommend(seed_titles, top_n)?;
        let mut seed_ids = Vec::with_capacity(SEED_COUNT);
        for title in seed_titles {
            seed_ids.push(self.catalog.resolve_title(title)?);
        }
        let pseudo_user = self.model.pseudo_user(&seed_ids)?;

        titles
            .into_iter()
            .map(|title| {
                let id = self.catalog.resolve_title(&title)?;
                let score = self.model.predict(pseudo_user.view(), id)?;
                Ok((title, score))
            })
            .collect()
    }
}
