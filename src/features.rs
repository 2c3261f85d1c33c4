//! Feature builder: weighted multi-hot movie vectors.
//!
//! Scans the catalog once to assemble a controlled vocabulary per metadata
//! field, then emits one fixed-length row per movie. Field weights bias the
//! cosine similarity toward genre agreement; they are tuning constants, not
//! derived data. Rebuilt in full if the catalog ever changes; the catalog
//! is static per process lifetime, so there is no incremental path.

use crate::catalog::{Catalog, MovieId};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-field weights applied to vocabulary hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub genre_weight: f32,
    pub cast_weight: f32,
    pub director_weight: f32,
    pub keyword_weight: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            genre_weight: 2.0,
            cast_weight: 1.0,
            director_weight: 1.5,
            keyword_weight: 1.0,
        }
    }
}

/// Vocabulary namespace. Keeps a genre token and an identically spelled
/// cast or keyword token on separate feature columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Genre,
    Cast,
    Director,
    Keyword,
}

/// Dense movie-by-token feature matrix, rows in catalog order.
#[derive(Debug)]
pub struct FeatureMatrix {
    matrix: Array2<f32>,
    movie_ids: Vec<MovieId>,
}

impl FeatureMatrix {
    /// Build the vocabulary and the weighted multi-hot matrix in two passes
    /// over the catalog. Column indices follow first sighting in catalog
    /// order, so the layout is deterministic for a given catalog.
    pub fn build(catalog: &Catalog, config: &FeatureConfig) -> Self {
        let mut vocab: HashMap<(Field, String), usize> = HashMap::new();

        for movie in catalog.iter() {
            for (field, token) in Self::tokens(movie) {
                let next = vocab.len();
                vocab.entry((field, token)).or_insert(next);
            }
        }

        let dim = vocab.len();
        let mut matrix = Array2::<f32>::zeros((catalog.len(), dim));
        let mut movie_ids = Vec::with_capacity(catalog.len());

        for (row, movie) in catalog.iter().enumerate() {
            movie_ids.push(movie.id);
            for (field, token) in Self::tokens(movie) {
                let col = vocab[&(field, token)];
                matrix[[row, col]] = match field {
                    Field::Genre => config.genre_weight,
                    Field::Cast => config.cast_weight,
                    Field::Director => config.director_weight,
                    Field::Keyword => config.keyword_weight,
                };
            }
        }

        Self { matrix, movie_ids }
    }

    fn tokens(movie: &crate::catalog::Movie) -> impl Iterator<Item = (Field, String)> + '_ {
        let genres = movie
            .genres
            .iter()
            .map(|g| (Field::Genre, g.trim().to_string()));
        let cast = movie
            .cast
            .iter()
            .map(|c| (Field::Cast, c.trim().to_string()));
        let director = movie
            .director
            .iter()
            .map(|d| (Field::Director, d.trim().to_string()));
        // Keywords are free text, normalize case so "Heist" and "heist"
        // share a column.
        let keywords = movie
            .keywords
            .iter()
            .map(|k| (Field::Keyword, k.trim().to_lowercase()));

        genres
            .chain(cast)
            .chain(director)
            .chain(keywords)
            .filter(|(_, t)| !t.is_empty())
    }

    pub fn num_movies(&self) -> usize {
        self.matrix.nrows()
    }

    /// Feature dimensionality: total distinct (field, token) pairs.
    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f32> {
        self.matrix.row(row)
    }

    pub fn movie_id_of_row(&self, row: usize) -> MovieId {
        self.movie_ids[row]
    }

    pub fn matrix(&self) -> &Array2<f32> {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Movie;

    fn movie(id: MovieId, genres: &[&str], cast: &[&str], director: Option<&str>) -> Movie {
        Movie {
            id,
            title: format!("Movie {id}"),
            year: None,
            genres: genres.iter().map(|s| s.to_string()).collect(),
            cast: cast.iter().map(|s| s.to_string()).collect(),
            director: director.map(|s| s.to_string()),
            keywords: Vec::new(),
        }
    }

    #[test]
    fn test_dimension_counts_distinct_tokens_per_field() {
        let catalog = Catalog::new(vec![
            movie(1, &["Drama", "Crime"], &["Al Pacino"], Some("Michael Mann")),
            movie(2, &["Drama"], &["Al Pacino"], None),
        ])
        .unwrap();

        let features = FeatureMatrix::build(&catalog, &FeatureConfig::default());
        // Drama, Crime, Al Pacino, Michael Mann
        assert_eq!(features.dim(), 4);
        assert_eq!(features.num_movies(), 2);
    }

    #[test]
    fn test_field_weights_applied() {
        let catalog = Catalog::new(vec![movie(1, &["Drama"], &["Al Pacino"], None)]).unwrap();
        let config = FeatureConfig::default();
        let features = FeatureMatrix::build(&catalog, &config);

        let row = features.row(0);
        let mut values: Vec<f32> = row.iter().copied().collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![config.cast_weight, config.genre_weight]);
    }

    #[test]
    fn test_same_token_in_different_fields_gets_separate_columns() {
        // "Clint Eastwood" both directs and stars.
        let catalog = Catalog::new(vec![movie(
            1,
            &[],
            &["Clint Eastwood"],
            Some("Clint Eastwood"),
        )])
        .unwrap();

        let features = FeatureMatrix::build(&catalog, &FeatureConfig::default());
        assert_eq!(features.dim(), 2);
    }

    #[test]
    fn test_empty_metadata_yields_zero_vector() {
        let catalog = Catalog::new(vec![movie(1, &[], &[], None)]).unwrap();
        let features = FeatureMatrix::build(&catalog, &FeatureConfig::default());
        assert_eq!(features.dim(), 0);
        assert!(features.row(0).iter().all(|&v| v == 0.0));
    }
}
