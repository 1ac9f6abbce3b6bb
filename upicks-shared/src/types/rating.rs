use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const REPLY_MAX_CHARS: usize = 500;
pub const MAX_TAGS_PER_RATING: usize = 3;
pub const TAG_MAX_CHARS: usize = 40;

/// Which rating table a rating id belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum RatingKind {
    Professor,
    Campus,
}

impl RatingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingKind::Professor => "professor",
            RatingKind::Campus => "campus",
        }
    }

    /// Path segment of the rated target collection.
    pub fn collection(&self) -> &'static str {
        match self {
            RatingKind::Professor => "professors",
            RatingKind::Campus => "campuses",
        }
    }
}

impl std::fmt::Display for RatingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RatingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "professor" => Ok(RatingKind::Professor),
            "campus" => Ok(RatingKind::Campus),
            _ => Err(format!("unknown rating kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSort {
    #[default]
    Newest,
    Oldest,
    MostHelpful,
    Highest,
    Lowest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionAverage {
    pub dimension: String,
    pub average: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub count: usize,
    pub averages: Vec<DimensionAverage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub would_take_again_percent: Option<f64>,
    pub top_tags: Vec<TagCount>,
    pub recent_review: Option<String>,
}

impl RatingSummary {
    /// Redis key of the cached summary for one professor or campus.
    pub fn cache_key(kind: RatingKind, target_id: Uuid) -> String {
        format!("summary:{kind}:{target_id}")
    }

    pub fn average(&self, dimension: &str) -> f64 {
        self.averages
            .iter()
            .find(|a| a.dimension == dimension)
            .map(|a| a.average)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HelpfulDelta {
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpfulCount {
    pub rating_id: Uuid,
    pub helpful_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteRef {
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingListParams {
    #[serde(default)]
    pub sort: RatingSort,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 10 }

impl RatingListParams {
    pub fn pagination(&self) -> crate::types::PaginationParams {
        crate::types::PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfessorSearchParams {
    pub campus_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_search_per_page")]
    pub per_page: u64,
}

fn default_search_per_page() -> u64 { 20 }

// --- Submissions ---

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitProfessorRating {
    pub course_id: Option<Uuid>,
    #[validate(range(min = 1, max = 5))]
    pub overall: i16,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: i16,
    #[validate(range(min = 1, max = 5))]
    pub clarity: i16,
    #[validate(range(min = 1, max = 5))]
    pub helpfulness: i16,
    pub would_take_again: Option<bool>,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
    #[serde(default)]
    #[validate(length(max = 3))]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitCampusRating {
    #[validate(range(min = 1, max = 5))]
    pub overall: i16,
    #[validate(range(min = 1, max = 5))]
    pub facilities: i16,
    #[validate(range(min = 1, max = 5))]
    pub safety: i16,
    #[validate(range(min = 1, max = 5))]
    pub location: i16,
    #[validate(range(min = 1, max = 5))]
    pub opportunities: i16,
    #[validate(range(min = 1, max = 5))]
    pub internet: i16,
    #[validate(range(min = 1, max = 5))]
    pub food: i16,
    #[validate(range(min = 1, max = 5))]
    pub clubs: i16,
    #[validate(length(max = 2000))]
    pub review: Option<String>,
    #[serde(default)]
    #[validate(length(max = 3))]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddReplyRequest {
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub campus_id: Option<Uuid>,
    pub program: Option<String>,
    pub year_level: Option<i16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitProfessorRequest {
    #[validate(length(min = 1, max = 80))]
    pub first_name: String,
    #[validate(length(min = 1, max = 80))]
    pub last_name: String,
    pub campus_id: Uuid,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitDepartmentRequest {
    pub campus_id: Uuid,
    #[validate(length(min = 2, max = 120))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitCourseRequest {
    pub department_id: Uuid,
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(max = 160))]
    pub title: Option<String>,
}

/// Trim reply text and check it is 1..=500 characters.
pub fn normalize_reply_content(content: &str) -> Result<String, String> {
    let trimmed = content.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err("reply cannot be empty".to_string());
    }
    if len > REPLY_MAX_CHARS {
        return Err(format!("reply must be at most {REPLY_MAX_CHARS} characters"));
    }
    Ok(trimmed.to_string())
}

/// Trim, lower-case and de-duplicate submitted tags, keeping their order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > TAG_MAX_CHARS {
            return Err(format!("tags must be at most {TAG_MAX_CHARS} characters"));
        }
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    if out.len() > MAX_TAGS_PER_RATING {
        return Err(format!("at most {MAX_TAGS_PER_RATING} tags per rating"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_cache_key_includes_kind_and_target() {
        let id = Uuid::nil();
        assert_eq!(
            RatingSummary::cache_key(RatingKind::Campus, id),
            "summary:campus:00000000-0000-0000-0000-000000000000"
        );
        assert_ne!(
            RatingSummary::cache_key(RatingKind::Professor, id),
            RatingSummary::cache_key(RatingKind::Campus, id)
        );
    }

    #[test]
    fn reply_content_is_trimmed() {
        assert_eq!(normalize_reply_content("  thanks!  ").unwrap(), "thanks!");
        assert!(normalize_reply_content("   ").is_err());
    }

    #[test]
    fn reply_limit_counts_characters_after_trim() {
        let exactly = "ñ".repeat(REPLY_MAX_CHARS);
        assert!(normalize_reply_content(&format!("  {exactly}\n")).is_ok());
        assert!(normalize_reply_content(&"a".repeat(REPLY_MAX_CHARS + 1)).is_err());
    }

    #[test]
    fn tags_are_normalized() {
        let tags = vec![" Clear ".to_string(), "clear".to_string(), "".to_string(), "Strict".to_string()];
        assert_eq!(normalize_tags(&tags).unwrap(), vec!["clear", "strict"]);

        let too_many: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert!(normalize_tags(&too_many).is_err());
    }

    #[test]
    fn rating_scores_are_range_checked() {
        let rating = SubmitCampusRating {
            overall: 6,
            facilities: 3,
            safety: 3,
            location: 3,
            opportunities: 3,
            internet: 3,
            food: 3,
            clubs: 0,
            review: None,
            tags: vec![],
            is_anonymous: true,
        };
        let errors = rating.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("overall"));
        assert!(fields.contains_key("clubs"));
    }

    #[test]
    fn rating_kind_parses_path_segment() {
        assert_eq!("campus".parse::<RatingKind>(), Ok(RatingKind::Campus));
        assert_eq!(RatingKind::Professor.collection(), "professors");
    }
}
