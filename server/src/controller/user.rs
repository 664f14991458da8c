use crate::app::{AppError, AppResult, ParamsError};
use contracts::{
    user::{delete_account, list_users, login, register, reset_password},
    User, DEFAULT_AVATAR,
};
use database::{User as DbUser, UserDatabase};
use serde_json::Value;
use std::{convert::TryFrom, sync::Arc};
use uuid::Uuid;

/// Account operations. Every existence check here is a separate query from
/// the write that follows it, concurrent requests for the same username can
/// interleave between the two.
pub struct UserController {
    user_db: Arc<UserDatabase>,
}

impl UserController {
    pub fn new(user_db: Arc<UserDatabase>) -> Self {
        Self { user_db }
    }

    pub async fn get_users(&self) -> AppResult<list_users::MethodResult> {
        let users = self
            .user_db
            .get_users()
            .await?
            .into_iter()
            .map(|db_user| UserWrapper::from(db_user).0)
            .collect();

        Ok(list_users::MethodResult::new(users))
    }

    /// `avatar` is the stored name of an already written upload.
    pub async fn register(
        &self,
        fields: Value,
        avatar: Option<String>,
    ) -> AppResult<register::MethodResult> {
        use register::{MethodResult, Params};
        let params = Params::try_from(fields)?;
        let avatar = avatar.unwrap_or_else(|| DEFAULT_AVATAR.to_owned());

        if self
            .user_db
            .get_user_by_username(params.username.as_deref())
            .await?
            .is_some()
        {
            info!("username {:?} is already taken", params.username);
            return Ok(MethodResult::already_exists());
        }

        let id = Uuid::new_v4().to_string();

        self.user_db
            .insert_user(
                &id,
                params.username.as_deref(),
                params.password.as_deref(),
                &avatar,
            )
            .await?;

        info!("registered {:?} as {}", params.username, id);
        Ok(MethodResult::added())
    }

    pub async fn login(&self, fields: Value) -> AppResult<login::MethodResult> {
        use login::{MethodResult, Params};
        let params = Params::try_from(fields)?;

        match self
            .user_db
            .validate_user(params.username.as_deref(), params.password.as_deref())
            .await?
        {
            Some(db_user) => {
                info!("{} successfully logged in", db_user.id);
                Ok(MethodResult::success(UserWrapper::from(db_user).0))
            }
            None => Ok(MethodResult::invalid_credentials()),
        }
    }

    pub async fn reset_password(&self, fields: Value) -> AppResult<reset_password::MethodResult> {
        use reset_password::{MethodResult, Params};
        let params = Params::try_from(fields)?;

        let db_user = match self
            .user_db
            .get_user_by_username(params.username.as_deref())
            .await?
        {
            Some(db_user) => db_user,
            None => return Ok(MethodResult::user_not_found()),
        };

        self.set_password(&db_user.id, params.password.as_deref()).await?;

        Ok(MethodResult::updated())
    }

    /// The user may have been deleted since it was looked up, in which case
    /// nothing is written and the update fails.
    async fn set_password(&self, id: &str, password: Option<&str>) -> AppResult<()> {
        if !self.user_db.update_password(id, password).await? {
            return Err(AppError::database_error()
                .with_message("user vanished before its password was updated")
                .with_context(&id));
        }

        info!("updated password of {}", id);
        Ok(())
    }

    pub async fn delete_account(&self, fields: Value) -> AppResult<delete_account::MethodResult> {
        use delete_account::{MethodResult, Params};
        let params = Params::try_from(fields)?;

        let db_user = match self
            .user_db
            .get_user_by_username(params.username.as_deref())
            .await?
        {
            Some(db_user) => db_user,
            None => return Ok(MethodResult::user_not_found()),
        };

        info!("deleting user with id '{}'", db_user.id);
        if !self.user_db.delete_user(&db_user.id).await? {
            warn!("user {} was already deleted", db_user.id);
        }

        Ok(MethodResult::deleted())
    }
}

impl ParamsError for register::InvalidParams {}
impl ParamsError for login::InvalidParams {}
impl ParamsError for reset_password::InvalidParams {}
impl ParamsError for delete_account::InvalidParams {}

/// Used in order to convert from `database::User` to `contracts::User` (orphan rule).
struct UserWrapper(User);

impl From<DbUser> for UserWrapper {
    fn from(value: DbUser) -> Self {
        UserWrapper(User::new(
            value.id,
            value.username,
            value.password,
            value.avatar,
        ))
    }
}
