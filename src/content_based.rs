//! Content-based recommender.
//!
//! Resolves the three seed titles, pulls each seed's nearest neighbors from
//! the similarity index, and merges the candidate lists into one ranking.
//! The merge rule is a tunable policy; the default sums scores so a movie
//! close to several seeds outranks one close to a single seed.

use crate::catalog::{Catalog, MovieId};
use crate::error::{RecommendError, Result};
use crate::similarity::SimilarityIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Requests carry exactly three seed titles.
pub const SEED_COUNT: usize = 3;

/// Policy for combining a candidate's scores across seed lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedMerge {
    #[default]
    Sum,
    Average,
    Max,
}

/// Stateless orchestrator over the shared, read-only similarity index.
pub struct ContentRecommender {
    catalog: Arc<Catalog>,
    index: Arc<SimilarityIndex>,
    merge: SeedMerge,
}

impl ContentRecommender {
    pub fn new(catalog: Arc<Catalog>, index: Arc<SimilarityIndex>, merge: SeedMerge) -> Self {
        Self {
            catalog,
            index,
            merge,
        }
    }

    /// Top `top_n` titles by merged content similarity to the seeds.
    ///
    /// Seeds never appear in the output. A result shorter than `top_n` is a
    /// valid outcome for sparse catalogs, not an error.
    pub fn recommend(&self, seed_titles: [&str; SEED_COUNT], top_n: usize) -> Result<Vec<String>> {
        let mut seed_ids = Vec::with_capacity(SEED_COUNT);
        for title in seed_titles {
            let id = self.catalog.resolve_title(title)?;
            if !seed_ids.contains(&id) {
                seed_ids.push(id);
            }
        }

        // Accumulate (sum, max, hit count) per candidate, then finalize per
        // the merge policy. Over-fetch by the seed count so excluding the
        // seeds themselves does not starve the pool.
        let mut accumulated: HashMap<MovieId, (f32, f32, u32)> = HashMap::new();
        for &seed in &seed_ids {
            for (candidate, score) in self.index.similar(seed, top_n + SEED_COUNT)? {
                if seed_ids.contains(&candidate) {
                    continue;
                }
                let entry = accumulated.entry(candidate).or_insert((0.0, 0.0, 0));
                entry.0 += score;
                entry.1 = entry.1.max(score);
                entry.2 += 1;
            }
        }

        let mut ranked: Vec<(MovieId, f32)> = accumulated
            .into_iter()
            .map(|(id, (sum, max, hits))| {
                let merged = match self.merge {
                    SeedMerge::Sum => sum,
                    SeedMerge::Average => sum / hits as f32,
                    SeedMerge::Max => max,
                };
                (id, merged)
            })
            .collect();

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
                "content candidate pool exhausted"
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Movie;
    use crate::features::{FeatureConfig, FeatureMatrix};

    fn movie(id: MovieId, title: &str, genres: &[&str]) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            year: None,
            genres: genres.iter().map(|s| s.to_string()).collect(),
            cast: Vec::new(),
            director: None,
            keywords: Vec::new(),
        }
    }

    fn recommender(movies: Vec<Movie>, merge: SeedMerge) -> ContentRecommender {
        let catalog = Arc::new(Catalog::new(movies).unwrap());
        let features = FeatureMatrix::build(&catalog, &FeatureConfig::default());
        let index = Arc::new(SimilarityIndex::build(&features));
        ContentRecommender::new(catalog, index, merge)
    }

    fn toy_movies() -> Vec<Movie> {
        vec![
            movie(1, "Heat", &["Crime", "Drama"]),
            movie(2, "Ronin", &["Crime", "Drama"]),
            movie(3, "Collateral", &["Crime", "Thriller"]),
            movie(4, "The Insider", &["Drama", "Thriller"]),
            movie(5, "March of the Penguins", &["Documentary"]),
            movie(6, "Spirited Away", &["Animation", "Fantasy"]),
        ]
    }

    #[test]
    fn test_seeds_never_in_output() {
        let rec = recommender(toy_movies(), SeedMerge::Sum);
        let result = rec.recommend(["Heat", "Ronin", "Collateral"], 10).unwrap();

        for seed in ["Heat", "Ronin", "Collateral"] {
            assert!(!result.contains(&seed.to_string()));
        }
        assert!(!result.is_empty());
    }

    #[test]
    fn test_output_distinct_and_bounded() {
        let rec = recommender(toy_movies(), SeedMerge::Sum);
        let result = rec.recommend(["Heat", "Ronin", "Collateral"], 2).unwrap();

        assert!(result.len() <= 2);
        let mut dedup = result.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), result.len());
    }

    #[test]
    fn test_unknown_seed_title_fails() {
        let rec = recommender(toy_movies(), SeedMerge::Sum);
        let err = rec
            .recommend(["Not A Real Movie", "Heat", "Ronin"], 10)
            .unwrap_err();
        assert!(matches!(err, RecommendError::UnknownTitle(t) if t == "Not A Real Movie"));
    }

    #[test]
    fn test_idempotent_for_same_seeds() {
        let rec = recommender(toy_movies(), SeedMerge::Sum);
        let a = rec.recommend(["Heat", "Ronin", "Collateral"], 10).unwrap();
        let b = rec.recommend(["Heat", "Ronin", "Collateral"], 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_result_when_pool_exhausted() {
        // The only content neighbors of the seeds are each other.
        let rec = recommender(
            vec![
                movie(1, "Heat", &["Crime"]),
                movie(2, "Ronin", &["Crime"]),
                movie(3, "Collateral", &["Crime"]),
                movie(4, "March of the Penguins", &["Documentary"]),
            ],
            SeedMerge::Sum,
        );

        let result = rec.recommend(["Heat", "Ronin", "Collateral"], 10).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_sum_merge_prefers_multi_seed_candidates() {
        // "Ronin" matches both seeds' genres, "The Insider" only one.
        let rec = recommender(toy_movies(), SeedMerge::Sum);
        let result = rec
            .recommend(["Heat", "Collateral", "March of the Penguins"], 10)
            .unwrap();
        assert_eq!(result[0], "Ronin");
    }

    #[test]
    fn test_duplicate_seed_titles_tolerated() {
        let rec = recommender(toy_movies(), SeedMerge::Average);
        let result = rec.recommend(["Heat", "Heat", "Heat"], 10).unwrap();
        assert!(!result.contains(&"Heat".to_string()));
        assert!(!result.is_empty());
    }
}
