use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::Value;

use crate::models::{Course, CourseSummary, ModelInfo, Review};
use crate::services::{PipelineError, PipelineResult, ScoreModel};

pub mod artifact;
pub mod mapping;

pub use artifact::ModelArtifact;
pub use mapping::{IdentifierMapping, KeyKind};

/// Dense per-item feature rows, passed through to `predict` untouched.
pub type ItemFeatures = Vec<Vec<f32>>;

/// Errors raised while loading or validating the model artifact.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model artifact is unreadable: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model artifact is malformed: {0}")]
    Malformed(String),
}

/// The loaded collaborative-filtering model.
///
/// Read-only after load: the identifier bijections, factor matrices and
/// catalog never change for the lifetime of the process, so concurrent
/// readers need no synchronization.
pub struct RecommenderModel {
    user_mapping: IdentifierMapping,
    item_mapping: IdentifierMapping,
    user_factors: Vec<Vec<f32>>,
    item_factors: Vec<Vec<f32>>,
    user_biases: Vec<f32>,
    item_biases: Vec<f32>,
    item_features: Option<ItemFeatures>,
    feature_factors: Option<Vec<Vec<f32>>>,
    mine_indices: Option<Vec<usize>>,
    reviews: Vec<Review>,
    catalog: Vec<Course>,
    catalog_by_id: HashMap<String, usize>,
    metadata: Value,
}

impl RecommenderModel {
    /// Loads the artifact from disk and assembles the in-memory model.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let artifact = ModelArtifact::read(path)?;
        Self::from_artifact(artifact)
    }

    /// Assembles and validates a model from a parsed artifact.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ModelError> {
        let user_mapping = IdentifierMapping::from_raw(artifact.user_mapping)?;
        let item_mapping = IdentifierMapping::from_raw(artifact.item_mapping)?;

        if artifact.user_factors.len() != user_mapping.len() {
            return Err(ModelError::Malformed(format!(
                "{} user factor rows for {} mapped users",
                artifact.user_factors.len(),
                user_mapping.len()
            )));
        }
        if artifact.item_factors.len() != item_mapping.len() {
            return Err(ModelError::Malformed(format!(
                "{} item factor rows for {} mapped items",
                artifact.item_factors.len(),
                item_mapping.len()
            )));
        }

        let dim = artifact.user_factors.first().map_or(0, Vec::len);
        for row in artifact.user_factors.iter().chain(&artifact.item_factors) {
            if row.len() != dim {
                return Err(ModelError::Malformed(format!(
                    "factor row of width {} in a model of dimension {dim}",
                    row.len()
                )));
            }
        }

        let user_biases = check_biases(artifact.user_biases, user_mapping.len(), "user")?;
        let item_biases = check_biases(artifact.item_biases, item_mapping.len(), "item")?;

        if let Some(features) = &artifact.course_features {
            if features.len() != item_mapping.len() {
                return Err(ModelError::Malformed(format!(
                    "{} feature rows for {} mapped items",
                    features.len(),
                    item_mapping.len()
                )));
            }
        }
        if let Some(factors) = &artifact.feature_factors {
            for row in factors {
                if row.len() != dim {
                    return Err(ModelError::Malformed(format!(
                        "feature factor row of width {} in a model of dimension {dim}",
                        row.len()
                    )));
                }
            }
            if let Some(features) = &artifact.course_features {
                for row in features {
                    if row.len() != factors.len() {
                        return Err(ModelError::Malformed(format!(
                            "feature row of width {} for {} feature factors",
                            row.len(),
                            factors.len()
                        )));
                    }
                }
            }
        }

        let mine_indices = match artifact.mine_course_indices {
            Some(raw) => Some(check_mine_indices(raw, item_mapping.len())?),
            None => None,
        };

        let catalog = artifact.courses.unwrap_or_default();
        let mut catalog_by_id = HashMap::with_capacity(catalog.len());
        for (position, course) in catalog.iter().enumerate() {
            // first row wins when the export carries duplicates
            catalog_by_id
                .entry(course.course_id.clone())
                .or_insert(position);
        }

        Ok(Self {
            user_mapping,
            item_mapping,
            user_factors: artifact.user_factors,
            item_factors: artifact.item_factors,
            user_biases,
            item_biases,
            item_features: artifact.course_features,
            feature_factors: artifact.feature_factors,
            mine_indices,
            reviews: artifact.sampled_reviews.unwrap_or_default(),
            catalog,
            catalog_by_id,
            metadata: artifact.metadata,
        })
    }

    /// Scores `candidates` for one user in a single batch call.
    ///
    /// Scores are positionally aligned with `candidates`. When feature rows
    /// are supplied alongside trained feature factors, each item vector is
    /// the base item factor plus its features projected through the feature
    /// embeddings.
    pub fn predict(
        &self,
        user_index: usize,
        candidates: &[usize],
        item_features: Option<&ItemFeatures>,
    ) -> PipelineResult<Vec<f32>> {
        let user_vec = self.user_factors.get(user_index).ok_or_else(|| {
            PipelineError::Prediction(format!("user index {user_index} out of range"))
        })?;
        let user_bias = self.user_biases.get(user_index).copied().unwrap_or(0.0);

        let mut scores = Vec::with_capacity(candidates.len());
        for &item in candidates {
            let item_vec = self.item_factors.get(item).ok_or_else(|| {
                PipelineError::Prediction(format!("item index {item} out of range"))
            })?;
            let item_bias = self.item_biases.get(item).copied().unwrap_or(0.0);

            let mut score = user_bias + item_bias + dot(user_vec, item_vec);
            if let (Some(features), Some(factors)) = (item_features, &self.feature_factors) {
                if let Some(row) = features.get(item) {
                    for (weight, factor) in row.iter().zip(factors) {
                        if *weight != 0.0 {
                            score += weight * dot(user_vec, factor);
                        }
                    }
                }
            }
            scores.push(score);
        }
        Ok(scores)
    }

    pub fn user_mapping(&self) -> &IdentifierMapping {
        &self.user_mapping
    }

    pub fn item_mapping(&self) -> &IdentifierMapping {
        &self.item_mapping
    }

    pub fn item_features(&self) -> Option<&ItemFeatures> {
        self.item_features.as_ref()
    }

    /// The restricted ("mine") item subset, when the artifact carries one.
    pub fn mine_indices(&self) -> Option<&[usize]> {
        self.mine_indices.as_deref()
    }

    /// External ids of every course the user has reviewed.
    ///
    /// `user_key` must be the canonical mapping key, not the raw request
    /// input: the interaction log stores ids in the same canonical form.
    pub fn rated_items(&self, user_key: &str) -> HashSet<String> {
        self.reviews
            .iter()
            .filter(|review| review.user_id == user_key)
            .map(|review| review.course_id.clone())
            .collect()
    }

    /// Catalog row for an external course id.
    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.catalog_by_id
            .get(course_id)
            .and_then(|&position| self.catalog.get(position))
    }

    /// Known user ids, sorted numerically for numeric-keyed models and
    /// lexically otherwise. Numeric ids are emitted as JSON numbers.
    pub fn users(&self) -> Vec<Value> {
        match self.user_mapping.kind() {
            KeyKind::NumericKeyed => {
                let mut ids: Vec<i64> = self
                    .user_mapping
                    .keys()
                    .filter_map(|key| key.trim().parse::<f64>().ok())
                    .map(|value| value.trunc() as i64)
                    .collect();
                ids.sort_unstable();
                ids.into_iter().map(Value::from).collect()
            }
            KeyKind::StringKeyed => {
                let mut ids: Vec<&str> = self.user_mapping.keys().collect();
                ids.sort_unstable();
                ids.into_iter().map(Value::from).collect()
            }
        }
    }

    /// Catalog listing, optionally filtered by data source.
    pub fn courses(&self, source: Option<&str>) -> Vec<CourseSummary> {
        let rows: Vec<&Course> = match source {
            Some(s @ ("mine" | "udemy")) => self
                .catalog
                .iter()
                .filter(|course| course.matches_source(s))
                .collect(),
            _ => self.catalog.iter().collect(),
        };
        rows.into_iter().map(CourseSummary::from).collect()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            user_count: self.user_mapping.len(),
            item_count: self.item_mapping.len(),
            mine_count: self.mine_indices.as_ref().map_or(0, Vec::len),
            metadata: self.metadata.clone(),
        }
    }
}

impl ScoreModel for RecommenderModel {
    fn predict_batch(&self, user_index: usize, candidates: &[usize]) -> PipelineResult<Vec<f32>> {
        self.predict(user_index, candidates, self.item_features.as_ref())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_biases(biases: Vec<f32>, expected: usize, kind: &str) -> Result<Vec<f32>, ModelError> {
    if biases.is_empty() {
        return Ok(vec![0.0; expected]);
    }
    if biases.len() != expected {
        return Err(ModelError::Malformed(format!(
            "{} {kind} biases for {expected} mapped {kind}s",
            biases.len()
        )));
    }
    Ok(biases)
}

fn check_mine_indices(raw: Vec<usize>, item_count: usize) -> Result<Vec<usize>, ModelError> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut indices = Vec::with_capacity(raw.len());
    for index in raw {
        if index >= item_count {
            return Err(ModelError::Malformed(format!(
                "restricted course index {index} out of range for {item_count} items"
            )));
        }
        if seen.insert(index) {
            indices.push(index);
        }
    }
    Ok(indices)
}
