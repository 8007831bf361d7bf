use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub user_type: UserType,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Customer,
    Driver,
}

/// Fields for a user created lazily from a phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone: String,
    pub user_type: UserType,
    pub is_online: bool,
}

impl NewUser {
    /// Placeholder identity derived from the last four digits of the phone.
    /// Drivers start online.
    pub fn from_phone(phone: &str, user_type: UserType) -> Self {
        let suffix: String = {
            let chars: Vec<char> = phone.chars().collect();
            let start = chars.len().saturating_sub(4);
            chars[start..].iter().collect()
        };

        let (label, is_online) = match user_type {
            UserType::Customer => ("Cliente", false),
            UserType::Driver => ("Motoboy", true),
        };

        Self {
            username: format!("{}_{}", label, suffix),
            email: format!("{}_{}@email.com", label.to_lowercase(), suffix),
            phone: phone.to_string(),
            user_type,
            is_online,
        }
    }
}

/// Profile fields to overwrite; `None` keeps the current value. The role is
/// fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}
