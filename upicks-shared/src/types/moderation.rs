use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::auth::UserRole;
use crate::types::pagination::PaginationParams;

/// Moderation queues of user-submitted reference entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Professors,
    Departments,
    Courses,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Professors => "professors",
            QueueKind::Departments => "departments",
            QueueKind::Courses => "courses",
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QueueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "professors" => Ok(QueueKind::Professors),
            "departments" => Ok(QueueKind::Departments),
            "courses" => Ok(QueueKind::Courses),
            _ => Err(format!("unknown queue: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTargetKind {
    ProfessorRating,
    CampusRating,
    Reply,
    Professor,
    Department,
    Course,
}

impl ReportTargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportTargetKind::ProfessorRating => "professor_rating",
            ReportTargetKind::CampusRating => "campus_rating",
            ReportTargetKind::Reply => "reply",
            ReportTargetKind::Professor => "professor",
            ReportTargetKind::Department => "department",
            ReportTargetKind::Course => "course",
        }
    }
}

/// One row of a moderation queue, whatever table it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub id: Uuid,
    pub queue: QueueKind,
    pub label: String,
    pub detail: Option<String>,
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl PendingEntry {
    /// Case-insensitive match on label and detail.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.label.to_lowercase().contains(&query)
            || self
                .detail
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub requested: usize,
    pub affected: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueParams {
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilterParams {
    pub status: Option<ReportStatus>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFilterParams {
    pub role: Option<UserRole>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl QueueParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

impl ReportFilterParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

impl UserFilterParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateReportRequest {
    pub target_kind: ReportTargetKind,
    pub target_id: Uuid,
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReportRequest {
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationStats {
    pub pending_professors: i64,
    pub pending_departments: i64,
    pub pending_courses: i64,
    pub pending_reports: i64,
    pub moderators: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, detail: Option<&str>) -> PendingEntry {
        PendingEntry {
            id: Uuid::new_v4(),
            queue: QueueKind::Courses,
            label: label.to_string(),
            detail: detail.map(str::to_string),
            submitted_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_entry_search_is_case_insensitive() {
        let e = entry("CS 11", Some("Introduction to Computer Programming"));
        assert!(e.matches("cs 1"));
        assert!(e.matches("programming"));
        assert!(e.matches("  "));
        assert!(!e.matches("math"));
    }

    #[test]
    fn queue_kind_parses_path_segment() {
        assert_eq!("departments".parse::<QueueKind>(), Ok(QueueKind::Departments));
        assert!("campuses".parse::<QueueKind>().is_err());
    }

    #[test]
    fn report_status_wire_form() {
        let json = serde_json::to_value(ReviewReportRequest { status: ReportStatus::Dismissed }).unwrap();
        assert_eq!(json["status"], "dismissed");
    }
}
