use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{NewUser, User, UserChanges, UserType},
    storage::{RideStore, StoreTx},
};

const MAX_PHONE_LEN: usize = 20;
const MAX_USERNAME_LEN: usize = 80;
const MAX_EMAIL_LEN: usize = 120;

/// Trim an optional profile field, rejecting blanks and overlong values.
fn profile_field(field: &str, value: Option<String>, max: usize) -> AppResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("Field {} cannot be empty", field)));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "Field {} must be at most {} characters",
            field, max
        )));
    }
    Ok(Some(value.to_string()))
}

/// Customer and driver identities, keyed by phone number.
#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn RideStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn RideStore>) -> Self {
        Self { store }
    }

    /// Find the user with this phone and role, creating a placeholder
    /// identity if there is none. Runs inside the caller's transaction so a
    /// failed business operation also discards the new user.
    pub async fn resolve_or_create(
        tx: &mut dyn StoreTx,
        phone: &str,
        user_type: UserType,
    ) -> AppResult<User> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(AppError::Validation("Phone number is required".to_string()));
        }
        if phone.chars().count() > MAX_PHONE_LEN {
            return Err(AppError::Validation(format!(
                "Phone number must be at most {} characters",
                MAX_PHONE_LEN
            )));
        }

        if let Some(user) = tx.find_user_by_phone(phone, user_type).await? {
            return Ok(user);
        }

        let user = tx
            .upsert_user_by_phone(&NewUser::from_phone(phone, user_type))
            .await?;
        tracing::info!(user_id = user.id, ?user_type, "Created user from phone");

        Ok(user)
    }

    /// Set a driver's online flag
    pub async fn set_driver_online(&self, phone: &str, is_online: bool) -> AppResult<User> {
        let mut tx = self.store.begin().await?;

        let driver = tx
            .find_user_by_phone(phone.trim(), UserType::Driver)
            .await?
            .ok_or(AppError::DriverNotFound)?;

        let driver = tx
            .set_user_online(driver.id, is_online)
            .await?
            .ok_or(AppError::DriverNotFound)?;

        tx.commit().await?;

        tracing::info!(driver_id = driver.id, is_online, "Driver availability changed");
        Ok(driver)
    }

    /// Drivers currently online
    pub async fn list_online_drivers(&self) -> AppResult<Vec<User>> {
        let mut tx = self.store.begin().await?;
        tx.list_online_drivers().await
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut tx = self.store.begin().await?;
        tx.list_users().await
    }

    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        let mut tx = self.store.begin().await?;
        tx.find_user(id).await?.ok_or(AppError::UserNotFound)
    }

    /// Edit a user's name, email or phone. The role never changes, and a
    /// phone already used by another user of the same role is a conflict.
    pub async fn update_user(&self, id: i64, changes: UserChanges) -> AppResult<User> {
        let changes = UserChanges {
            username: profile_field("username", changes.username, MAX_USERNAME_LEN)?,
            email: profile_field("email", changes.email, MAX_EMAIL_LEN)?,
            phone: profile_field("phone", changes.phone, MAX_PHONE_LEN)?,
        };

        let mut tx = self.store.begin().await?;

        let user = tx
            .update_user(id, &changes)
            .await?
            .ok_or(AppError::UserNotFound)?;

        tx.commit().await?;

        tracing::info!(user_id = id, "Updated user");
        Ok(user)
    }

    /// Delete a user no ride refers to.
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        if tx.find_user(id).await?.is_none() {
            return Err(AppError::UserNotFound);
        }
        if tx.count_rides_for_user(id).await? > 0 {
            return Err(AppError::UserInUse);
        }
        if !tx.delete_user(id).await? {
            return Err(AppError::UserNotFound);
        }

        tx.commit().await?;

        tracing::info!(user_id = id, "Deleted user");
        Ok(())
    }
}
