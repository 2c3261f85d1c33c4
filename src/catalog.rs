//! Immutable movie catalog.
//!
//! Built once at process start from the externally parsed movies table and
//! never mutated afterwards. Titles are the user-facing selection key, so
//! title resolution must be deterministic: duplicate titles keep the first
//! occurrence, duplicate ids are a construction error.

use crate::error::{RecommendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type MovieId = u32;
pub type UserId = u32;

/// A single catalog entry. All metadata fields may be absent or empty;
/// such movies simply carry less content signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default)]
    pub director: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Immutable in-memory catalog with id and title lookup.
///
/// Internal row order is the insertion order of the movies it was built
/// from; the feature matrix and similarity index reuse that row order.
#[derive(Debug)]
pub struct Catalog {
    movies: Vec<Movie>,
    by_id: HashMap<MovieId, usize>,
    by_title: HashMap<String, MovieId>,
}

impl Catalog {
    pub fn new(movies: Vec<Movie>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(movies.len());
        let mut by_title = HashMap::with_capacity(movies.len());

        for (row, movie) in movies.iter().enumerate() {
            if by_id.insert(movie.id, row).is_some() {
                return Err(RecommendError::InvalidCatalog(format!(
                    "duplicate movie id {}",
                    movie.id
                )));
            }
            // First occurrence wins so a title always resolves to one movie.
            by_title.entry(movie.title.clone()).or_insert(movie.id);
        }

        Ok(Self {
            movies,
            by_id,
            by_title,
        })
    }

    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn contains(&self, id: MovieId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn get(&self, id: MovieId) -> Option<&Movie> {
        self.by_id.get(&id).map(|&row| &self.movies[row])
    }

    /// Row index of a movie in catalog order, shared with the feature matrix.
    pub fn row_of(&self, id: MovieId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn title_of(&self, id: MovieId) -> Option<&str> {
        self.get(id).map(|m| m.title.as_str())
    }

    /// Resolve a user-supplied title to a movie id.
    pub fn resolve_title(&self, title: &str) -> Result<MovieId> {
        self.by_title
            .get(title)
            .copied()
            .ok_or_else(|| RecommendError::UnknownTitle(title.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Movie> {
        self.movies.iter()
    }
}
