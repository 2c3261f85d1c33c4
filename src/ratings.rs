//! Immutable rating store.
//!
//! Holds the (user, movie, score) observations the latent factor model is
//! trained from. A user rates a given movie at most once: duplicate
//! observations keep the last one seen, matching load order of the source
//! table. Orphaned ratings (movie missing from the catalog) are kept here
//! but filtered out at training time to avoid dangling references.

use crate::catalog::{Catalog, MovieId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MIN_SCORE: f32 = 0.5;
pub const MAX_SCORE: f32 = 5.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub score: f32,
}

/// Immutable in-memory rating store, deduplicated by (user, movie).
#[derive(Debug)]
pub struct RatingStore {
    ratings: Vec<Rating>,
}

impl RatingStore {
    pub fn new(raw: Vec<Rating>) -> Self {
        // Last observation wins for a (user, movie) pair; scores are clamped
        // to the valid range rather than rejected, the source table is
        // community data and off-scale values are noise, not faults.
        let mut index: HashMap<(UserId, MovieId), usize> = HashMap::with_capacity(raw.len());
        let mut ratings: Vec<Rating> = Vec::with_capacity(raw.len());

        for mut rating in raw {
            rating.score = rating.score.clamp(MIN_SCORE, MAX_SCORE);
            match index.get(&(rating.user_id, rating.movie_id)) {
                Some(&pos) => ratings[pos] = rating,
                None => {
                    index.insert((rating.user_id, rating.movie_id), ratings.len());
                    ratings.push(rating);
                }
            }
        }

        Self { ratings }
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rating> {
        self.ratings.iter()
    }

    /// Observations usable for training: ratings whose movie exists in the
    /// catalog.
    pub fn observations<'a>(&'a self, catalog: &'a Catalog) -> impl Iterator<Item = &'a Rating> {
        self.ratings
            .iter()
            .filter(move |r| catalog.contains(r.movie_id))
    }
}
