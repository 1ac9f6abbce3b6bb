use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "moderator" => Ok(UserRole::Moderator),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Claims of an access token issued by the hosted auth provider.
///
/// Only `sub` and `exp` are required; the provider puts the UPicks role
/// in `user_role` and omits it for ordinary users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, rename = "user_role")]
    pub role: UserRole,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + duration_secs,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn is_moderator(&self) -> bool {
        self.role == UserRole::Moderator
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_user_when_claim_missing() {
        let claims: Claims = serde_json::from_value(serde_json::json!({
            "sub": Uuid::nil(),
            "exp": 4_102_444_800i64,
        }))
        .unwrap();

        assert_eq!(claims.role, UserRole::User);
        assert!(!claims.is_expired());
    }

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("Moderator".parse::<UserRole>(), Ok(UserRole::Moderator));
        assert_eq!(UserRole::Moderator.to_string(), "moderator");
        assert!("admin".parse::<UserRole>().is_err());
    }
}
