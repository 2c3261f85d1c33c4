//! Latent factor model trained with Alternating Least Squares (ALS).
//!
//! Factorizes the explicit user-item rating matrix into low-rank user and
//! item factors so that dot(user, item) approximates the observed rating.
//! Training is a one-time batch computation: each epoch solves a regularized
//! normal-equation system per user row (items fixed), then per item row
//! (users fixed), via Cholesky decomposition. Iteration is bounded by a
//! maximum epoch count and a loss-improvement threshold, whichever triggers
//! first, and a non-finite loss aborts training instead of producing a
//! degenerate model.

use crate::catalog::{Catalog, MovieId, UserId};
use crate::error::{RecommendError, Result};
use crate::ratings::RatingStore;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ALS hyperparameters. The seed pins factor initialization so training is
/// reproducible run to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlsConfig {
    /// Number of latent factors (embedding dimension).
    pub latent_factors: usize,
    /// L2 regularization on both factor matrices.
    pub regularization: f32,
    /// Upper bound on training epochs.
    pub max_iterations: usize,
    /// Stop early once per-epoch loss improvement drops below this.
    pub convergence_threshold: f32,
    /// RNG seed for factor initialization.
    pub seed: u64,
}

impl Default for AlsConfig {
    fn default() -> Self {
        Self {
            latent_factors: 32,
            regularization: 0.1,
            max_iterations: 20,
            convergence_threshold: 1e-4,
            seed: 42,
        }
    }
}

/// ALS-based matrix factorization over the rating store.
#[derive(Debug)]
pub struct MatrixFactorization {
    config: AlsConfig,
    user_factors: Option<Array2<f32>>,
    item_factors: Option<Array2<f32>>,
    user_row: HashMap<UserId, usize>,
    item_row: HashMap<MovieId, usize>,
    rated_movie_ids: Vec<MovieId>,
    training_loss: Option<f32>,
}

impl MatrixFactorization {
    pub fn new(config: AlsConfig) -> Self {
        Self {
            config,
            user_factors: None,
            item_factors: None,
            user_row: HashMap::new(),
            item_row: HashMap::new(),
            rated_movie_ids: Vec::new(),
            training_loss: None,
        }
    }

    /// Train on every rating whose movie exists in the catalog. Orphaned
    /// ratings are skipped so item factors never reference dangling ids.
    pub fn fit(&mut self, catalog: &Catalog, ratings: &RatingStore) -> Result<()> {
        self.user_row.clear();
        self.item_row.clear();
        self.rated_movie_ids.clear();

        // Observation adjacency: per-user item list and per-item user list.
        let mut user_items: Vec<Vec<(usize, f32)>> = Vec::new();
        let mut item_users: Vec<Vec<(usize, f32)>> = Vec::new();

        for rating in ratings.observations(catalog) {
            let next_user = self.user_row.len();
            let u = *self.user_row.entry(rating.user_id).or_insert(next_user);
            if u == user_items.len() {
                user_items.push(Vec::new());
            }

            let next_item = self.item_row.len();
            let i = *self.item_row.entry(rating.movie_id).or_insert(next_item);
            if i == item_users.len() {
                item_users.push(Vec::new());
                self.rated_movie_ids.push(rating.movie_id);
            }

            user_items[u].push((i, rating.score));
            item_users[i].push((u, rating.score));
        }

        let num_users = user_items.len();
        let num_items = item_users.len();
        if num_users == 0 || num_items == 0 {
            return Err(RecommendError::InsufficientData(
                "no usable ratings to train on".to_string(),
            ));
        }

        let k = self.config.latent_factors;
        let lambda = self.config.regularization as f64;

        // Small random initialization from a fixed seed.
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut user_factors =
            Array2::from_shape_fn((num_users, k), |_| rng.gen_range(-0.1f32..0.1));
        let mut item_factors =
            Array2::from_shape_fn((num_items, k), |_| rng.gen_range(-0.1f32..0.1));

        let mut prev_loss = f32::INFINITY;
        let mut final_loss = f32::INFINITY;
        let mut epochs_run = 0;

        for iteration in 0..self.config.max_iterations {
            Self::update_factors(&mut user_factors, &user_items, &item_factors, lambda, k)
                .map_err(|_| Self::diverged(iteration, f32::NAN))?;
            Self::update_factors(&mut item_factors, &item_users, &user_factors, lambda, k)
                .map_err(|_| Self::diverged(iteration, f32::NAN))?;

            let loss = Self::mse(&user_items, &user_factors, &item_factors);
            if !loss.is_finite() {
                return Err(Self::diverged(iteration, loss));
            }
            tracing::debug!(iteration, loss, "ALS epoch complete");

            epochs_run = iteration + 1;
            final_loss = loss;
            if prev_loss - loss < self.config.convergence_threshold {
                break;
            }
            prev_loss = loss;
        }

        tracing::info!(
            epochs = epochs_run,
            mse = final_loss,
            users = num_users,
            items = num_items,
            "ALS training finished"
        );

        self.user_factors = Some(user_factors);
        self.item_factors = Some(item_factors);
        self.training_loss = Some(final_loss);
        Ok(())
    }

    fn diverged(iteration: usize, loss: f32) -> RecommendError {
        RecommendError::TrainingDiverged { iteration, loss }
    }

    /// One half-epoch: re-solve every row of `target` against the fixed
    /// opposite factors. Rows solve independently, so this runs in parallel.
    fn update_factors(
        target: &mut Array2<f32>,
        adjacency: &[Vec<(usize, f32)>],
        fixed: &Array2<f32>,
        lambda: f64,
        k: usize,
    ) -> std::result::Result<(), ()> {
        let solved: std::result::Result<Vec<Option<Array1<f32>>>, ()> = adjacency
            .par_iter()
            .map(|observed| {
                if observed.is_empty() {
                    // No observations: leave the row at its current value.
                    return Ok(None);
                }
                Self::solve_row(observed, fixed, lambda, k).map(Some).ok_or(())
            })
            .collect();

        for (row, factors) in solved?.into_iter().enumerate() {
            if let Some(factors) = factors {
                target.row_mut(row).assign(&factors);
            }
        }
        Ok(())
    }

    /// Regularized least squares for one factor row: accumulate the normal
    /// equations A x = b over the observed entries and solve by Cholesky.
    /// Returns None when A is not positive definite, which with lambda > 0
    /// only happens if the factors have already gone non-finite.
    fn solve_row(
        observed: &[(usize, f32)],
        fixed: &Array2<f32>,
        lambda: f64,
        k: usize,
    ) -> Option<Array1<f32>> {
        let mut a = Array2::<f64>::zeros((k, k));
        let mut b = Array1::<f64>::zeros(k);

        for &(other, score) in observed {
            let vec = fixed.row(other);
            for i in 0..k {
                let vi = vec[i] as f64;
                b[i] += score as f64 * vi;
                for j in 0..k {
                    a[[i, j]] += vi * vec[j] as f64;
                }
            }
        }
        for i in 0..k {
            a[[i, i]] += lambda;
        }

        let x = Self::cholesky_solve(&a, &b)?;
        Some(x.mapv(|v| v as f32))
    }

    /// Solve A x = b for symmetric positive definite A via A = L L^T.
    fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
        let n = a.nrows();
        let mut l = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;
                for m in 0..j {
                    sum += l[[i, m]] * l[[j, m]];
                }
                if i == j {
                    let diag = a[[i, i]] - sum;
                    if diag <= 0.0 || !diag.is_finite() {
                        return None;
                    }
                    l[[i, j]] = diag.sqrt();
                } else {
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
                }
            }
        }

        // Forward substitution: L y = b
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += l[[i, j]] * y[j];
            }
            y[i] = (b[i] - sum) / l[[i, i]];
        }

        // Backward substitution: L^T x = y
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += l[[j, i]] * x[j];
            }
            x[i] = (y[i] - sum) / l[[i, i]];
        }

        Some(x)
    }

    /// Mean squared reconstruction error over the observed ratings.
    fn mse(
        user_items: &[Vec<(usize, f32)>],
        user_factors: &Array2<f32>,
        item_factors: &Array2<f32>,
    ) -> f32 {
        let mut loss = 0.0f32;
        let mut count = 0usize;

        for (u, observed) in user_items.iter().enumerate() {
            let user_vec = user_factors.row(u);
            for &(i, score) in observed {
                let prediction = user_vec.dot(&item_factors.row(i));
                loss += (score - prediction).powi(2);
                count += 1;
            }
        }

        if count > 0 {
            loss / count as f32
        } else {
            0.0
        }
    }

    /// Predicted affinity of an arbitrary user factor vector for a movie.
    pub fn predict(&self, user_vector: ArrayView1<'_, f32>, movie_id: MovieId) -> Result<f32> {
        let item_factors = self
            .item_factors
            .as_ref()
            .ok_or(RecommendError::ModelNotReady("latent factor model untrained"))?;
        let row = self.item_row.get(&movie_id).ok_or_else(|| {
            RecommendError::InsufficientData(format!("movie {movie_id} has no rating history"))
        })?;
        Ok(user_vector.dot(&item_factors.row(*row)))
    }

    /// Synthesize a pseudo-user factor vector as the mean of the seed
    /// movies' item factors. Seeds with no rating history carry no latent
    /// signal and are skipped; if every seed is unrated the request fails.
    pub fn pseudo_user(&self, seed_ids: &[MovieId]) -> Result<Array1<f32>> {
        let item_factors = self
            .item_factors
            .as_ref()
            .ok_or(RecommendError::ModelNotReady("latent factor model untrained"))?;

        let mut sum = Array1::<f32>::zeros(self.config.latent_factors);
        let mut found = 0usize;
        for id in seed_ids {
            if let Some(&row) = self.item_row.get(id) {
                sum += &item_factors.row(row);
                found += 1;
            }
        }

        if found == 0 {
            return Err(RecommendError::InsufficientData(
                "no seed movie has rating history".to_string(),
            ));
        }
        Ok(sum / found as f32)
    }

    /// Learned factor row for an observed user.
    pub fn user_factor(&self, user_id: UserId) -> Result<ArrayView1<'_, f32>> {
        let user_factors = self
            .user_factors
            .as_ref()
            .ok_or(RecommendError::ModelNotReady("latent factor model untrained"))?;
        let row = self.user_row.get(&user_id).ok_or_else(|| {
            RecommendError::InsufficientData(format!("user {user_id} not in training set"))
        })?;
        Ok(user_factors.row(*row))
    }

    /// Movie ids the model can score, in first-observation order.
    pub fn rated_movies(&self) -> &[MovieId] {
        &self.rated_movie_ids
    }

    pub fn is_trained(&self) -> bool {
        self.item_factors.is_some()
    }

    /// Final training MSE, for sanity diagnostics.
    pub fn training_loss(&self) -> Option<f32> {
        self.training_loss
    }

    pub fn config(&self) -> &AlsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Movie;
    use crate::ratings::Rating;

    fn movie(id: MovieId) -> Movie {
        Movie {
            id,
            title: format!("Movie {id}"),
            year: None,
            genres: Vec::new(),
            cast: Vec::new(),
            director: None,
            keywords: Vec::new(),
        }
    }

    fn rating(user_id: UserId, movie_id: MovieId, score: f32) -> Rating {
        Rating {
            user_id,
            movie_id,
            score,
        }
    }

    fn small_config() -> AlsConfig {
        AlsConfig {
            latent_factors: 4,
            regularization: 0.1,
            max_iterations: 15,
            convergence_threshold: 1e-5,
            seed: 7,
        }
    }

    #[test]
    fn test_fit_reconstructs_observed_ratings() {
        let catalog = Catalog::new((1..=4).map(movie).collect()).unwrap();
        let store = RatingStore::new(vec![
            rating(1, 1, 5.0),
            rating(1, 2, 4.0),
            rating(1, 3, 1.0),
            rating(2, 1, 4.5),
            rating(2, 2, 4.0),
            rating(2, 4, 1.5),
            rating(3, 3, 5.0),
            rating(3, 4, 4.5),
            rating(3, 1, 1.0),
        ]);

        let mut model = MatrixFactorization::new(small_config());
        model.fit(&catalog, &store).unwrap();

        assert!(model.is_trained());
        let loss = model.training_loss().unwrap();
        assert!(loss.is_finite());
        assert!(loss < 1.0, "MSE too high: {loss}");

        let user_vec = model.user_factor(1).unwrap();
        let predicted = model.predict(user_vec, 1).unwrap();
        assert!((predicted - 5.0).abs() < 1.5);
    }

    #[test]
    fn test_training_is_reproducible() {
        let catalog = Catalog::new((1..=3).map(movie).collect()).unwrap();
        let store = RatingStore::new(vec![
            rating(1, 1, 5.0),
            rating(1, 2, 3.0),
            rating(2, 2, 4.0),
            rating(2, 3, 2.0),
        ]);

        let mut a = MatrixFactorization::new(small_config());
        let mut b = MatrixFactorization::new(small_config());
        a.fit(&catalog, &store).unwrap();
        b.fit(&catalog, &store).unwrap();

        let va = a.pseudo_user(&[1, 2]).unwrap();
        let vb = b.pseudo_user(&[1, 2]).unwrap();
        for (x, y) in va.iter().zip(vb.iter()) {
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_identical_users_get_matching_predictions() {
        // Two users rate the same 4 movies identically; a third user links
        // the held-out 5th movie into the factor space.
        let catalog = Catalog::new((1..=5).map(movie).collect()).unwrap();
        let mut ratings = Vec::new();
        for user in [1, 2] {
            ratings.push(rating(user, 1, 5.0));
            ratings.push(rating(user, 2, 4.0));
            ratings.push(rating(user, 3, 2.0));
            ratings.push(rating(user, 4, 1.0));
        }
        ratings.push(rating(3, 1, 5.0));
        ratings.push(rating(3, 5, 4.5));
        let store = RatingStore::new(ratings);

        let mut model = MatrixFactorization::new(small_config());
        model.fit(&catalog, &store).unwrap();

        let p1 = model.predict(model.user_factor(1).unwrap(), 5).unwrap();
        let p2 = model.predict(model.user_factor(2).unwrap(), 5).unwrap();
        assert!((p1 - p2).abs() < 1e-3, "shared taste not captured: {p1} vs {p2}");
    }

    #[test]
    fn test_nan_rating_aborts_training() {
        // A NaN score is preserved by the rating store's clamp and poisons
        // the normal equations; training must abort instead of handing back
        // a degenerate model.
        let catalog = Catalog::new(vec![movie(1), movie(2)]).unwrap();
        let store = RatingStore::new(vec![
            rating(1, 1, 4.0),
            rating(1, 2, f32::NAN),
            rating(2, 2, 3.0),
        ]);

        let mut model = MatrixFactorization::new(small_config());
        let err = model.fit(&catalog, &store).unwrap_err();
        assert!(matches!(err, RecommendError::TrainingDiverged { .. }));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_empty_ratings_rejected() {
        let catalog = Catalog::new(vec![movie(1)]).unwrap();
        let store = RatingStore::new(Vec::new());

        let mut model = MatrixFactorization::new(small_config());
        let err = model.fit(&catalog, &store).unwrap_err();
        assert!(matches!(err, RecommendError::InsufficientData(_)));
    }

    #[test]
    fn test_orphaned_ratings_ignored() {
        let catalog = Catalog::new(vec![movie(1), movie(2)]).unwrap();
        let store = RatingStore::new(vec![
            rating(1, 1, 4.0),
            rating(1, 2, 3.0),
            rating(1, 999, 5.0),
        ]);

        let mut model = MatrixFactorization::new(small_config());
        model.fit(&catalog, &store).unwrap();
        assert_eq!(model.rated_movies(), &[1, 2]);
    }

    #[test]
    fn test_predict_before_fit_is_model_not_ready() {
        let model = MatrixFactorization::new(small_config());
        let err = model.pseudo_user(&[1]).unwrap_err();
        assert!(matches!(err, RecommendError::ModelNotReady(_)));
    }

    #[test]
    fn test_pseudo_user_skips_unrated_seeds() {
        let catalog = Catalog::new(vec![movie(1), movie(2), movie(3)]).unwrap();
        let store = RatingStore::new(vec![rating(1, 1, 4.0), rating(2, 1, 5.0), rating(1, 2, 3.0)]);

        let mut model = MatrixFactorization::new(small_config());
        model.fit(&catalog, &store).unwrap();

        // Movie 3 has no ratings: synthesis falls back to the rated seeds.
        let with_unrated = model.pseudo_user(&[1, 3]).unwrap();
        let rated_only = model.pseudo_user(&[1]).unwrap();
        for (x, y) in with_unrated.iter().zip(rated_only.iter()) {
            assert!((x - y).abs() < 1e-6);
        }

        let err = model.pseudo_user(&[3]).unwrap_err();
        assert!(matches!(err, RecommendError::InsufficientData(_)));
    }

    #[test]
    fn test_cholesky_solves_identity() {
        let a = Array2::<f64>::eye(3);
        let b = Array1::from(vec![1.0, 2.0, 3.0]);
        let x = MatrixFactorization::cholesky_solve(&a, &b).unwrap();
        for (xi, bi) in x.iter().zip(b.iter()) {
            assert!((xi - bi).abs() < 1e-12);
        }
    }
}
