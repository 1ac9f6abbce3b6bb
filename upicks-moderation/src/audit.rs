use diesel::prelude::*;
use uuid::Uuid;

use upicks_shared::errors::AppResult;
use upicks_shared::models::NewModerationAction;
use upicks_shared::schema::moderation_actions;

/// Append one entry to the moderation audit log.
pub fn log_action(
    conn: &mut PgConnection,
    moderator_id: Uuid,
    action: impl Into<String>,
    target_id: Option<Uuid>,
    details: serde_json::Value,
) -> AppResult<()> {
    let action = action.into();
    diesel::insert_into(moderation_actions::table)
        .values(&NewModerationAction {
            moderator_id,
            action: action.clone(),
            target_id,
            details: Some(details),
        })
        .execute(conn)?;

    tracing::info!(moderator_id = %moderator_id, action = %action, target_id = ?target_id, "moderation action");
    Ok(())
}
