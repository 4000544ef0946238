//! The recommendation resolution pipeline.
//!
//! A request flows through identifier mapping, candidate selection, batch
//! scoring, ranking and the metadata join. The response cache sits in
//! front of this pipeline at the HTTP layer and short-circuits it entirely
//! on a hit.

use std::sync::Arc;

use crate::model::RecommenderModel;
use crate::models::{Recommendation, RecommendationResponse};

use super::scoring::ScoredCandidate;
use super::{candidates, scoring, PipelineError, PipelineResult};

/// Facade over the loaded model that resolves one recommendation request
/// end to end. Cheap to clone; the model is shared and read-only.
#[derive(Clone)]
pub struct Recommender {
    model: Arc<RecommenderModel>,
}

impl Recommender {
    pub fn new(model: Arc<RecommenderModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &RecommenderModel {
        &self.model
    }

    /// Resolves recommendations for one user.
    ///
    /// An unknown user is not a fault: it resolves to a payload carrying an
    /// error message and an empty recommendation list. Prediction failures
    /// and malformed model state propagate to the caller.
    pub fn recommend(
        &self,
        user_id: &str,
        count: usize,
        mine_only: bool,
    ) -> PipelineResult<RecommendationResponse> {
        let user_index = match self.model.user_mapping().to_internal(user_id) {
            Some(index) => index,
            None => {
                tracing::warn!(user_id = %user_id, "User not present in model");
                let reason = PipelineError::UnknownUser(user_id.to_string());
                return Ok(RecommendationResponse {
                    user_id: user_id.to_string(),
                    count: 0,
                    mine_only,
                    error: Some(reason.to_string()),
                    recommendations: Vec::new(),
                });
            }
        };

        // The review log stores ids in the canonical mapping form, so the
        // rated-set lookup uses the key that matched, not the raw input.
        let user_key = self
            .model
            .user_mapping()
            .external_of(user_index)
            .unwrap_or(user_id);
        let rated = self.model.rated_items(user_key);

        let candidate_set = candidates::select_candidates(
            user_id,
            self.model.item_mapping(),
            &rated,
            mine_only,
            self.model.mine_indices(),
        );

        tracing::debug!(
            user_id = %user_id,
            mine_only,
            rated = rated.len(),
            candidates = candidate_set.len(),
            "Candidate set selected"
        );

        let scored = scoring::score_candidates(&*self.model, user_index, &candidate_set)?;
        let top = scoring::rank(scored, count);
        let recommendations = self.assemble(&top)?;

        Ok(RecommendationResponse {
            user_id: user_id.to_string(),
            count: recommendations.len(),
            mine_only,
            error: None,
            recommendations,
        })
    }

    /// Joins ranked candidates with catalog metadata.
    ///
    /// A course missing from the catalog still yields a recommendation with
    /// just its id and scores. When a catalog row exists, the title falls
    /// back from `title` to `course_title` to a synthesized placeholder.
    fn assemble(&self, ranked: &[ScoredCandidate]) -> PipelineResult<Vec<Recommendation>> {
        let item_mapping = self.model.item_mapping();

        ranked
            .iter()
            .map(|candidate| {
                let course_id = item_mapping
                    .external_of(candidate.item_index)
                    .ok_or_else(|| {
                        PipelineError::MalformedModel(format!(
                            "item index {} has no external identifier",
                            candidate.item_index
                        ))
                    })?
                    .to_string();

                let mut recommendation = Recommendation {
                    course_id: course_id.clone(),
                    score: candidate.display_score,
                    original_score: candidate.raw_score,
                    title: None,
                    category: None,
                    price: None,
                    level: None,
                    language: None,
                };

                if let Some(course) = self.model.course(&course_id) {
                    recommendation.title = course
                        .title
                        .clone()
                        .or_else(|| course.course_title.clone())
                        .or_else(|| Some(format!("Course {course_id}")));
                    recommendation.category = course.category.clone();
                    recommendation.price = course.price;
                    recommendation.level = course.level.clone();
                    recommendation.language = course.language.clone();
                }

                Ok(recommendation)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelArtifact;
    use serde_json::json;

    /// Two users, four courses. User "101" (index 0) has rated CR2; the
    /// restricted subset is {CR1, CR2}. Raw scores for user 101 against
    /// items [CR1, CR2, 201, 202] are [2.0, 1.0, 3.0, 0.5].
    fn recommender() -> Recommender {
        let artifact: ModelArtifact = serde_json::from_value(json!({
            "user_mapping": { "101": 0, "102": 1 },
            "item_mapping": { "CR1": 0, "CR2": 1, "201": 2, "202": 3 },
            "user_factors": [[1.0, 0.0], [0.0, 1.0]],
            "item_factors": [[2.0, 0.0], [1.0, 0.0], [3.0, 0.0], [0.5, 0.0]],
            "mine_course_indices": [0, 1],
            "sampled_reviews": [
                { "user_id": "101", "course_id": "CR2" }
            ],
            "courses": [
                { "course_id": "CR1", "title": "Intro to Data", "category": "Data", "price": 19.99 },
                { "course_id": "CR2", "course_title": "Advanced Data" },
                { "course_id": "201", "level": "Beginner" }
            ]
        }))
        .unwrap();
        Recommender::new(Arc::new(
            crate::model::RecommenderModel::from_artifact(artifact).unwrap(),
        ))
    }

    #[test]
    fn test_unknown_user_resolves_to_an_error_payload() {
        let payload = recommender().recommend("9999", 10, true).unwrap();
        assert_eq!(payload.user_id, "9999");
        assert_eq!(payload.count, 0);
        assert!(payload.recommendations.is_empty());
        let error = payload.error.unwrap();
        assert!(!error.is_empty());
        assert!(error.contains("9999"));
    }

    #[test]
    fn test_mine_only_excludes_rated_courses() {
        let payload = recommender().recommend("101", 10, true).unwrap();
        assert_eq!(payload.count, 1);
        assert_eq!(payload.recommendations[0].course_id, "CR1");
        // a single-candidate batch sits at the scale floor
        assert_eq!(payload.recommendations[0].score, 1.0);
        assert_eq!(payload.recommendations[0].title.as_deref(), Some("Intro to Data"));
        assert_eq!(payload.recommendations[0].price, Some(19.99));
    }

    #[test]
    fn test_full_catalog_ranking_and_metadata_join() {
        let payload = recommender().recommend("101.0", 10, false).unwrap();
        // CR2 is rated away; the rest ranked by raw score: 201, CR1, 202
        let ids: Vec<&str> = payload
            .recommendations
            .iter()
            .map(|r| r.course_id.as_str())
            .collect();
        assert_eq!(ids, vec!["201", "CR1", "202"]);

        // top of the batch sits at the top of the display scale
        let top = &payload.recommendations[0];
        assert_eq!(top.original_score, 3.0);
        assert!((top.score - 5.0).abs() < 1e-5);
        assert_eq!(top.level.as_deref(), Some("Beginner"));
        // catalog row without any title column synthesizes one
        assert_eq!(top.title.as_deref(), Some("Course 201"));

        // no catalog row at all: bare id + scores
        let bare = &payload.recommendations[2];
        assert_eq!(bare.course_id, "202");
        assert!(bare.title.is_none());
        assert!(bare.category.is_none());
    }

    #[test]
    fn test_count_truncates_the_ranking() {
        let payload = recommender().recommend("102", 2, false).unwrap();
        assert_eq!(payload.count, 2);
        assert_eq!(payload.recommendations.len(), 2);
    }

    #[test]
    fn test_user_who_rated_the_whole_restricted_subset_is_still_served() {
        let artifact: ModelArtifact = serde_json::from_value(json!({
            "user_mapping": { "101": 0 },
            "item_mapping": { "CR1": 0, "CR2": 1 },
            "user_factors": [[1.0]],
            "item_factors": [[2.0], [1.0]],
            "mine_course_indices": [0, 1],
            "sampled_reviews": [
                { "user_id": "101", "course_id": "CR1" },
                { "user_id": "101", "course_id": "CR2" }
            ]
        }))
        .unwrap();
        let recommender = Recommender::new(Arc::new(
            crate::model::RecommenderModel::from_artifact(artifact).unwrap(),
        ));

        let payload = recommender.recommend("101", 10, true).unwrap();
        assert_eq!(payload.count, 2);
        assert!(payload.error.is_none());
    }
}
