use diesel::prelude::*;
use uuid::Uuid;

use upicks_shared::errors::AppResult;
use upicks_shared::models::{NewProfile, Profile};
use upicks_shared::schema::profiles;

/// Load the viewer's profile, creating an empty one on first use.
///
/// Accounts live with the hosted auth provider, so the first authenticated
/// request is the earliest point a profile row can be created.
pub fn ensure_profile(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Profile> {
    let inserted = diesel::insert_into(profiles::table)
        .values(&NewProfile { id: user_id })
        .on_conflict_do_nothing()
        .execute(conn)?;

    if inserted > 0 {
        tracing::info!(user_id = %user_id, "default profile created");
    }

    let profile = profiles::table.find(user_id).first::<Profile>(conn)?;
    Ok(profile)
}
