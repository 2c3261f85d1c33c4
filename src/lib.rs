//! Movie recommendation core.
//!
//! Two independent engines recommend ten movies from three liked titles:
//! content-based filtering over movie metadata similarity, and collaborative
//! filtering over the community rating matrix via an ALS latent factor
//! model. The caller parses the movies and ratings tables, builds [`Catalog`]
//! and [`RatingStore`], and hands both to [`RecommenderEngine::build`]; every
//! model structure is constructed eagerly at that point, so per-request calls
//! are read-only and safe to run concurrently without locking.

pub mod catalog;
pub mod collaborative;
pub mod content_based;
pub mod error;
pub mod features;
pub mod matrix_factorization;
pub mod ratings;
pub mod similarity;

pub use catalog::{Catalog, Movie, MovieId, UserId};
pub use collaborative::CollaborativeRecommender;
pub use content_based::{ContentRecommender, SeedMerge, SEED_COUNT};
pub use error::{RecommendError, Result};
pub use features::{FeatureConfig, FeatureMatrix};
pub use matrix_factorization::{AlsConfig, MatrixFactorization};
pub use ratings::{Rating, RatingStore};
pub use similarity::SimilarityIndex;

use std::sync::Arc;
use tracing::info;

/// Default recommendation list length.
pub const DEFAULT_TOP_N: usize = 10;

/// Engine-wide configuration, one knob set per model stage.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    pub als: AlsConfig,
    pub seed_merge: SeedMerge,
}

/// The recommendation engine facade.
///
/// Owns the catalog, the similarity index, and the trained latent factor
/// model behind `Arc`s; the two recommenders share them read-only. All
/// construction happens in [`build`](Self::build); there is no lazy path,
/// both engines are reused across every request.
pub struct RecommenderEngine {
    catalog: Arc<Catalog>,
    similarity: Arc<SimilarityIndex>,
    model: Arc<MatrixFactorization>,
    content: ContentRecommender,
    collaborative: CollaborativeRecommender,
}

impl RecommenderEngine {
    /// One-time batch construction: feature matrix, similarity index, then
    /// ALS training. Fails instead of starting with a degenerate model.
    pub fn build(catalog: Catalog, ratings: RatingStore, config: EngineConfig) -> Result<Self> {
        let catalog = Arc::new(catalog);

        let features = FeatureMatrix::build(&catalog, &config.features);
        let similarity = Arc::new(SimilarityIndex::build(&features));
        info!(
            movies = catalog.len(),
            feature_dim = features.dim(),
            "similarity index built"
        );

        let mut model = MatrixFactorization::new(config.als);
        model.fit(&catalog, &ratings)?;
        let model = Arc::new(model);

        let content = ContentRecommender::new(
            Arc::clone(&catalog),
            Arc::clone(&similarity),
            config.seed_merge,
        );
        let collaborative =
            CollaborativeRecommender::new(Arc::clone(&catalog), Arc::clone(&model));

        Ok(Self {
            catalog,
            similarity,
            model,
            content,
            collaborative,
        })
    }

    /// Content-based entry point: top `top_n` titles by metadata similarity
    /// to the three seeds.
    pub fn content_model(&self, seed_titles: [&str; SEED_COUNT], top_n: usize) -> Result<Vec<String>> {
        self.content.recommend(seed_titles, top_n)
    }

    /// Collaborative entry point: top `top_n` titles by predicted affinity
    /// of a pseudo-user synthesized from the three seeds.
    pub fn collab_model(&self, seed_titles: [&str; SEED_COUNT], top_n: usize) -> Result<Vec<String>> {
        self.collaborative.recommend(seed_titles, top_n)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn similarity(&self) -> &SimilarityIndex {
        &self.similarity
    }

    pub fn model(&self) -> &MatrixFactorization {
        &self.model
    }
}

#[cfg(test)]
mod tests;
