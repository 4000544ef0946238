use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::models::{Course, Review};

use super::ModelError;

/// On-disk layout of the trained model artifact (JSON export).
///
/// The mappings, factor matrices and bias vectors are required; everything
/// else is optional and degrades gracefully when absent.
#[derive(Debug, Deserialize)]
pub struct ModelArtifact {
    /// External user id to internal user index.
    pub user_mapping: HashMap<String, usize>,
    /// External course id to internal item index.
    pub item_mapping: HashMap<String, usize>,
    /// Latent user factors, one row per user index.
    pub user_factors: Vec<Vec<f32>>,
    /// Latent item factors, one row per item index.
    pub item_factors: Vec<Vec<f32>>,
    #[serde(default)]
    pub user_biases: Vec<f32>,
    #[serde(default)]
    pub item_biases: Vec<f32>,
    /// Per-item feature rows, opaque to the pipeline (passed through to
    /// `predict` untouched).
    #[serde(default)]
    pub course_features: Option<Vec<Vec<f32>>>,
    /// Latent embedding per feature column; folded into item vectors when
    /// both this and `course_features` are present.
    #[serde(default)]
    pub feature_factors: Option<Vec<Vec<f32>>>,
    /// Item indices of the restricted ("mine") subset.
    #[serde(default)]
    pub mine_course_indices: Option<Vec<usize>>,
    /// Sampled interaction log, used to exclude already-rated courses.
    #[serde(default)]
    pub sampled_reviews: Option<Vec<Review>>,
    /// Course metadata table.
    #[serde(default)]
    pub courses: Option<Vec<Course>>,
    /// Free-form training metadata, echoed by the status endpoint.
    #[serde(default)]
    pub metadata: Value,
}

impl ModelArtifact {
    /// Reads and parses an artifact file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let file = File::open(path.as_ref())?;
        let artifact = serde_json::from_reader(BufReader::new(file))?;
        Ok(artifact)
    }
}
