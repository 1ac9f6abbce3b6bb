use axum::extract::State;
use axum::Json;
use diesel::dsl::exists;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use upicks_shared::clients::db;
use upicks_shared::errors::{AppError, AppResult, ErrorCode};
use upicks_shared::middleware::record_event;
use upicks_shared::models::{NewReport, Report};
use upicks_shared::schema::{
    campus_ratings, courses, departments, professor_ratings, professors, replies, reports,
};
use upicks_shared::types::auth::AuthUser;
use upicks_shared::types::{ApiResponse, CreateReportRequest, ReportStatus, ReportTargetKind};

use crate::AppState;

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateReportRequest>,
) -> AppResult<Json<ApiResponse<Report>>> {
    body.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    let reason = body.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "reason cannot be empty"));
    }

    let mut conn = db::conn(&state.db)?;

    if !target_exists(&mut conn, body.target_kind, body.target_id)? {
        return Err(AppError::not_found(format!("{} not found", body.target_kind.as_str())));
    }

    // One pending report per reporter and target
    let existing: i64 = reports::table
        .filter(reports::reporter_id.eq(auth.id))
        .filter(reports::target_kind.eq(body.target_kind.as_str()))
        .filter(reports::target_id.eq(body.target_id))
        .filter(reports::status.eq(ReportStatus::Pending.as_str()))
        .count()
        .get_result(&mut conn)?;

    if existing > 0 {
        return Err(AppError::new(
            ErrorCode::DuplicateReport,
            "you already have a pending report on this",
        ));
    }

    let report: Report = diesel::insert_into(reports::table)
        .values(&NewReport {
            reporter_id: auth.id,
            target_kind: body.target_kind.as_str().to_string(),
            target_id: body.target_id,
            reason,
        })
        .get_result(&mut conn)?;

    record_event("reports_filed_total", body.target_kind.as_str());
    tracing::info!(report_id = %report.id, target_kind = body.target_kind.as_str(), "report filed");

    Ok(Json(ApiResponse::ok(report)))
}

fn target_exists(conn: &mut PgConnection, kind: ReportTargetKind, id: Uuid) -> AppResult<bool> {
    let found = match kind {
        ReportTargetKind::ProfessorRating => {
            diesel::select(exists(professor_ratings::table.find(id))).get_result(conn)?
        }
        ReportTargetKind::CampusRating => {
            diesel::select(exists(campus_ratings::table.find(id))).get_result(conn)?
        }
        ReportTargetKind::Reply => diesel::select(exists(replies::table.find(id))).get_result(conn)?,
        ReportTargetKind::Professor => {
            diesel::select(exists(professors::table.find(id))).get_result(conn)?
        }
        ReportTargetKind::Department => {
            diesel::select(exists(departments::table.find(id))).get_result(conn)?
        }
        ReportTargetKind::Course => diesel::select(exists(courses::table.find(id))).get_result(conn)?,
    };
    Ok(found)
}
