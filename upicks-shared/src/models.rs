use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::io::Write;
use uuid::Uuid;

use crate::schema::{
    campus_ratings, campuses, courses, departments, helpful_votes, moderation_actions,
    professor_ratings, professors, profiles, rating_tags, replies, reports,
};
use crate::types::RatingKind;

impl ToSql<Text, Pg> for RatingKind {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for RatingKind {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = std::str::from_utf8(bytes.as_bytes())?;
        raw.parse().map_err(Into::into)
    }
}

// --- Profile ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub nickname: Option<String>,
    pub campus_id: Option<Uuid>,
    pub program: Option<String>,
    pub year_level: Option<i16>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = profiles)]
pub struct ProfileChanges {
    pub nickname: Option<String>,
    pub campus_id: Option<Uuid>,
    pub program: Option<String>,
    pub year_level: Option<i16>,
}

// --- Catalog ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = campuses)]
pub struct Campus {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: Uuid,
    pub campus_id: Uuid,
    pub name: String,
    pub is_verified: bool,
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = departments)]
pub struct NewDepartment {
    pub campus_id: Uuid,
    pub name: String,
    pub submitted_by: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = courses)]
pub struct Course {
    pub id: Uuid,
    pub department_id: Uuid,
    pub code: String,
    pub title: Option<String>,
    pub is_verified: bool,
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = courses)]
pub struct NewCourse {
    pub department_id: Uuid,
    pub code: String,
    pub title: Option<String>,
    pub submitted_by: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = professors)]
pub struct Professor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub campus_id: Uuid,
    pub department_id: Option<Uuid>,
    pub is_verified: bool,
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Professor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = professors)]
pub struct NewProfessor {
    pub first_name: String,
    pub last_name: String,
    pub campus_id: Uuid,
    pub department_id: Option<Uuid>,
    pub submitted_by: Option<Uuid>,
}

// --- Ratings ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = professor_ratings)]
pub struct ProfessorRating {
    pub id: Uuid,
    pub professor_id: Uuid,
    pub user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub overall: i16,
    pub difficulty: i16,
    pub clarity: i16,
    pub helpfulness: i16,
    pub would_take_again: Option<bool>,
    pub review: Option<String>,
    pub helpful_count: i32,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl ProfessorRating {
    /// Hide the author of anonymous ratings.
    pub fn redacted(mut self) -> Self {
        if self.is_anonymous {
            self.user_id = None;
        }
        self
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = professor_ratings)]
pub struct NewProfessorRating {
    pub professor_id: Uuid,
    pub user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub overall: i16,
    pub difficulty: i16,
    pub clarity: i16,
    pub helpfulness: i16,
    pub would_take_again: Option<bool>,
    pub review: Option<String>,
    pub is_anonymous: bool,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = campus_ratings)]
pub struct CampusRating {
    pub id: Uuid,
    pub campus_id: Uuid,
    pub user_id: Option<Uuid>,
    pub overall: i16,
    pub facilities: i16,
    pub safety: i16,
    pub location: i16,
    pub opportunities: i16,
    pub internet: i16,
    pub food: i16,
    pub clubs: i16,
    pub review: Option<String>,
    pub helpful_count: i32,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl CampusRating {
    pub fn redacted(mut self) -> Self {
        if self.is_anonymous {
            self.user_id = None;
        }
        self
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = campus_ratings)]
pub struct NewCampusRating {
    pub campus_id: Uuid,
    pub user_id: Option<Uuid>,
    pub overall: i16,
    pub facilities: i16,
    pub safety: i16,
    pub location: i16,
    pub opportunities: i16,
    pub internet: i16,
    pub food: i16,
    pub clubs: i16,
    pub review: Option<String>,
    pub is_anonymous: bool,
}

#[derive(Debug, Queryable, Selectable, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = rating_tags)]
pub struct RatingTag {
    pub id: Uuid,
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
    pub tag: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rating_tags)]
pub struct NewRatingTag {
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
    pub tag: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = helpful_votes)]
pub struct NewHelpfulVote {
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
    pub user_id: Uuid,
}

// --- Replies ---

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = replies)]
pub struct Reply {
    pub id: Uuid,
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = replies)]
pub struct NewReply {
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_anonymous: bool,
}

/// Public shape of a reply; `author_id` is withheld for anonymous replies.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReplyView {
    pub id: Uuid,
    pub rating_kind: RatingKind,
    pub rating_id: Uuid,
    pub author_id: Option<Uuid>,
    pub content: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Reply> for ReplyView {
    fn from(reply: Reply) -> Self {
        Self {
            id: reply.id,
            rating_kind: reply.rating_kind,
            rating_id: reply.rating_id,
            author_id: (!reply.is_anonymous).then_some(reply.user_id),
            content: reply.content,
            is_anonymous: reply.is_anonymous,
            created_at: reply.created_at,
        }
    }
}

// --- Moderation ---

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(table_name = reports)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_kind: String,
    pub target_id: Uuid,
    pub reason: String,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport {
    pub reporter_id: Uuid,
    pub target_kind: String,
    pub target_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Deserialize, Clone)]
#[diesel(table_name = moderation_actions)]
pub struct ModerationAction {
    pub id: Uuid,
    pub moderator_id: Uuid,
    pub action: String,
    pub target_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = moderation_actions)]
pub struct NewModerationAction {
    pub moderator_id: Uuid,
    pub action: String,
    pub target_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(is_anonymous: bool) -> Reply {
        Reply {
            id: Uuid::new_v4(),
            rating_kind: RatingKind::Professor,
            rating_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: "Agree, very fair grader.".into(),
            is_anonymous,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn anonymous_reply_hides_author() {
        assert_eq!(ReplyView::from(reply(true)).author_id, None);

        let named = reply(false);
        let author = named.user_id;
        assert_eq!(ReplyView::from(named).author_id, Some(author));
    }

    #[test]
    fn anonymous_rating_is_redacted() {
        let rating = CampusRating {
            id: Uuid::new_v4(),
            campus_id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            overall: 4,
            facilities: 3,
            safety: 4,
            location: 5,
            opportunities: 4,
            internet: 2,
            food: 4,
            clubs: 5,
            review: None,
            helpful_count: 0,
            is_anonymous: true,
            created_at: Utc::now(),
        };
        assert_eq!(rating.redacted().user_id, None);
    }
}
