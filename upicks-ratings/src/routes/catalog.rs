use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::pg::Pg;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use upicks_shared::clients::db;
use upicks_shared::errors::{is_unique_violation, AppError, AppResult, ErrorCode};
use upicks_shared::models::{
    Campus, Course, Department, NewCourse, NewDepartment, NewProfessor, Professor,
};
use upicks_shared::schema::{campuses, courses, departments, professors};
use upicks_shared::types::auth::AuthUser;
use upicks_shared::types::{
    ApiResponse, Paginated, PaginationParams, ProfessorSearchParams, SubmitCourseRequest,
    SubmitDepartmentRequest, SubmitProfessorRequest,
};

use crate::AppState;

// --- Campuses ---

pub async fn list_campuses(State(state): State<Arc<AppState>>) -> AppResult<Json<ApiResponse<Vec<Campus>>>> {
    let mut conn = db::conn(&state.db)?;
    let rows = campuses::table
        .filter(campuses::is_verified.eq(true))
        .order(campuses::name.asc())
        .select(Campus::as_select())
        .load(&mut conn)?;
    Ok(Json(ApiResponse::ok(rows)))
}

pub async fn get_campus(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Campus>>> {
    let mut conn = db::conn(&state.db)?;
    let campus = verified_campus(&mut conn, id)?;
    Ok(Json(ApiResponse::ok(campus)))
}

pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    Path(campus_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Department>>>> {
    let mut conn = db::conn(&state.db)?;
    let rows = departments::table
        .filter(departments::campus_id.eq(campus_id))
        .filter(departments::is_verified.eq(true))
        .order(departments::name.asc())
        .select(Department::as_select())
        .load(&mut conn)?;
    Ok(Json(ApiResponse::ok(rows)))
}

pub async fn list_courses(
    State(state): State<Arc<AppState>>,
    Path(department_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Course>>>> {
    let mut conn = db::conn(&state.db)?;
    let rows = courses::table
        .filter(courses::department_id.eq(department_id))
        .filter(courses::is_verified.eq(true))
        .order(courses::code.asc())
        .select(Course::as_select())
        .load(&mut conn)?;
    Ok(Json(ApiResponse::ok(rows)))
}

// --- Professors ---

fn professor_search(params: &ProfessorSearchParams) -> professors::BoxedQuery<'static, Pg> {
    let mut query = professors::table
        .filter(professors::is_verified.eq(true))
        .into_boxed();

    if let Some(campus_id) = params.campus_id {
        query = query.filter(professors::campus_id.eq(campus_id));
    }
    if let Some(department_id) = params.department_id {
        query = query.filter(professors::department_id.eq(department_id));
    }
    if let Some(pattern) = params.q.as_deref().and_then(like_pattern) {
        query = query.filter(
            professors::first_name
                .ilike(pattern.clone())
                .or(professors::last_name.ilike(pattern)),
        );
    }
    query
}

/// `%term%` with LIKE metacharacters escaped, `None` for a blank term.
pub(crate) fn like_pattern(term: &str) -> Option<String> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Some(format!("%{escaped}%"))
}

pub async fn search_professors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProfessorSearchParams>,
) -> AppResult<Json<ApiResponse<Paginated<Professor>>>> {
    let page = PaginationParams::new(params.page, params.per_page);
    let mut conn = db::conn(&state.db)?;

    let total: i64 = professor_search(&params).count().get_result(&mut conn)?;
    let items = professor_search(&params)
        .order((professors::last_name.asc(), professors::first_name.asc()))
        .limit(page.sql_limit())
        .offset(page.sql_offset())
        .select(Professor::as_select())
        .load(&mut conn)?;

    Ok(Json(ApiResponse::ok(Paginated::new(items, total as u64, &page))))
}

pub async fn get_professor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Professor>>> {
    let mut conn = db::conn(&state.db)?;
    let professor = verified_professor(&mut conn, id)?;
    Ok(Json(ApiResponse::ok(professor)))
}

// --- Submissions (unverified until a moderator approves) ---

pub async fn submit_professor(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitProfessorRequest>,
) -> AppResult<Json<ApiResponse<Professor>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let mut conn = db::conn(&state.db)?;
    verified_campus(&mut conn, req.campus_id)?;

    let new_professor = NewProfessor {
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        campus_id: req.campus_id,
        department_id: req.department_id,
        submitted_by: Some(user.id),
    };

    let professor: Professor = diesel::insert_into(professors::table)
        .values(&new_professor)
        .get_result(&mut conn)
        .map_err(already_exists("professor"))?;

    tracing::info!(professor_id = %professor.id, user_id = %user.id, "professor submitted for review");
    Ok(Json(ApiResponse::ok_with_message(professor, "submitted for review")))
}

pub async fn submit_department(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitDepartmentRequest>,
) -> AppResult<Json<ApiResponse<Department>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let mut conn = db::conn(&state.db)?;
    verified_campus(&mut conn, req.campus_id)?;

    let department: Department = diesel::insert_into(departments::table)
        .values(&NewDepartment {
            campus_id: req.campus_id,
            name: req.name.trim().to_string(),
            submitted_by: Some(user.id),
        })
        .get_result(&mut conn)
        .map_err(already_exists("department"))?;

    tracing::info!(department_id = %department.id, user_id = %user.id, "department submitted for review");
    Ok(Json(ApiResponse::ok_with_message(department, "submitted for review")))
}

pub async fn submit_course(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitCourseRequest>,
) -> AppResult<Json<ApiResponse<Course>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let mut conn = db::conn(&state.db)?;
    let department_exists: i64 = departments::table
        .filter(departments::id.eq(req.department_id))
        .filter(departments::is_verified.eq(true))
        .count()
        .get_result(&mut conn)?;
    if department_exists == 0 {
        return Err(AppError::new(ErrorCode::DepartmentNotFound, "department not found"));
    }

    let course: Course = diesel::insert_into(courses::table)
        .values(&NewCourse {
            department_id: req.department_id,
            code: req.code.trim().to_uppercase(),
            title: req.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            submitted_by: Some(user.id),
        })
        .get_result(&mut conn)
        .map_err(already_exists("course"))?;

    tracing::info!(course_id = %course.id, user_id = %user.id, "course submitted for review");
    Ok(Json(ApiResponse::ok_with_message(course, "submitted for review")))
}

// --- Helpers ---

pub(crate) fn verified_campus(conn: &mut PgConnection, id: Uuid) -> AppResult<Campus> {
    campuses::table
        .find(id)
        .filter(campuses::is_verified.eq(true))
        .select(Campus::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::CampusNotFound, "campus not found"))
}

pub(crate) fn verified_professor(conn: &mut PgConnection, id: Uuid) -> AppResult<Professor> {
    professors::table
        .find(id)
        .filter(professors::is_verified.eq(true))
        .select(Professor::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ProfessorNotFound, "professor not found"))
}

fn already_exists(entity: &'static str) -> impl Fn(diesel::result::Error) -> AppError {
    move |e| {
        if is_unique_violation(&e) {
            AppError::new(ErrorCode::EntityAlreadyExists, format!("{entity} already exists"))
        } else {
            AppError::Database(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("  dela Cruz ").as_deref(), Some("%dela Cruz%"));
        assert_eq!(like_pattern("100%_sure").as_deref(), Some("%100\\%\\_sure%"));
        assert_eq!(like_pattern("   "), None);
    }

    #[test]
    fn unique_violation_maps_to_already_exists() {
        let err = diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        );
        assert_eq!(already_exists("course")(err).code(), ErrorCode::EntityAlreadyExists);
        assert_eq!(
            already_exists("course")(diesel::result::Error::NotFound).code(),
            ErrorCode::NotFound
        );
    }
}
