use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A course row from the catalog table shipped inside the model artifact.
///
/// Different exports disagree on column names: the title may live in `title`
/// or `course_title`, and the data source in `source` or `data_source`. All
/// metadata columns are optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "string_or_number")]
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}

impl Course {
    /// Whether this course belongs to the given data source.
    ///
    /// Prefers an explicit source column (either export name). Catalogs
    /// without one fall back to the `CR<digits>` id prefix that marks
    /// in-house courses.
    pub fn matches_source(&self, source: &str) -> bool {
        if let Some(s) = self.source.as_deref().or(self.data_source.as_deref()) {
            return s == source;
        }
        match source {
            "mine" => self.has_mine_id_prefix(),
            _ => !self.has_mine_id_prefix(),
        }
    }

    fn has_mine_id_prefix(&self) -> bool {
        self.course_id
            .strip_prefix("CR")
            .is_some_and(|rest| rest.chars().next().is_some_and(|c| c.is_ascii_digit()))
    }
}

/// Catalog listing row: a course with the title fallback already applied.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub course_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.course_id.clone(),
            title: course.title.clone().or_else(|| course.course_title.clone()),
            category: course.category.clone(),
            price: course.price,
            level: course.level.clone(),
            language: course.language.clone(),
        }
    }
}

/// One row of the interaction log sampled into the model artifact.
///
/// Only used to derive the set of courses a user has already rated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

/// A single recommended course as returned to the client.
///
/// `score` is the 1-5 display score, relative to the scored batch only;
/// `original_score` is the raw model output. Metadata fields are omitted
/// when the catalog has no value for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub course_id: String,
    pub score: f32,
    pub original_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Payload of the recommend operation.
///
/// An unknown user is reported through the `error` field with an empty
/// recommendation list, never as a transport-level fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub count: usize,
    pub mine_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recommendations: Vec<Recommendation>,
}

/// Model summary for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub user_count: usize,
    pub item_count: usize,
    pub mine_count: usize,
    pub metadata: Value,
}

/// Accepts identifiers serialized either as JSON strings or as numbers.
///
/// Interaction logs and catalogs mix both forms: an id may arrive as
/// `"101"`, `101`, or `101.0` depending on the export that produced it.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number identifier, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_course_id_accepts_numbers() {
        let course: Course = serde_json::from_value(json!({ "course_id": 950612 })).unwrap();
        assert_eq!(course.course_id, "950612");

        let course: Course = serde_json::from_value(json!({ "course_id": "CR42" })).unwrap();
        assert_eq!(course.course_id, "CR42");
    }

    #[test]
    fn test_review_user_id_accepts_float_form() {
        let review: Review =
            serde_json::from_value(json!({ "user_id": 101.0, "course_id": "CR1" })).unwrap();
        assert_eq!(review.user_id, "101.0");
    }

    #[test]
    fn test_matches_source_prefers_explicit_column() {
        let course: Course =
            serde_json::from_value(json!({ "course_id": "CR7", "source": "udemy" })).unwrap();
        assert!(course.matches_source("udemy"));
        assert!(!course.matches_source("mine"));
    }

    #[test]
    fn test_matches_source_falls_back_to_id_prefix() {
        let mine: Course = serde_json::from_value(json!({ "course_id": "CR7" })).unwrap();
        let udemy: Course = serde_json::from_value(json!({ "course_id": "950612" })).unwrap();
        assert!(mine.matches_source("mine"));
        assert!(udemy.matches_source("udemy"));
        // "CR" with no digits is not an in-house id
        let odd: Course = serde_json::from_value(json!({ "course_id": "CRx" })).unwrap();
        assert!(!odd.matches_source("mine"));
    }

    #[test]
    fn test_recommendation_omits_absent_metadata() {
        let rec = Recommendation {
            course_id: "CR1".to_string(),
            score: 5.0,
            original_score: 0.8,
            title: Some("Intro".to_string()),
            category: None,
            price: None,
            level: None,
            language: None,
        };
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["title"], "Intro");
        assert!(value.get("category").is_none());
        assert!(value.get("price").is_none());
    }
}
