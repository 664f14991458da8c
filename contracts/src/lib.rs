#![allow(clippy::new_without_default)]

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::{fmt::Display, str::FromStr};

pub use user::*;

pub mod user;

pub const DEFAULT_AVATAR: &str = "default.png";

mod route_paths {
    pub const USERS: &str = "/users";
    pub const REGISTER: &str = "/register";
    pub const LOGIN: &str = "/login";
    pub const RESET_PASSWORD: &str = "/reset-password";
    pub const DELETE_ACCOUNT: &str = "/delete-account";
}

/// Path prefix under which uploaded avatars are served.
pub const UPLOADS_PREFIX: &str = "/uploads/";

pub mod messages {
    pub const USER_ADDED: &str = "user added";
    pub const ACCOUNT_EXISTS: &str = "account already exists";
    pub const LOGIN_SUCCESSFUL: &str = "login successful";
    pub const INVALID_CREDENTIALS: &str = "invalid username or password";
    pub const USER_NOT_FOUND: &str = "user not found";
    pub const PASSWORD_UPDATED: &str = "password updated";
    pub const ACCOUNT_DELETED: &str = "account deleted";

    pub const SERVER_ERROR: &str = "server error";
    pub const INVALID_REQUEST_BODY: &str = "invalid request body";
    pub const INVALID_ROUTE: &str = "invalid route";
}

/// An API route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// List every user
    Users,
    /// Create a user, optionally with an avatar
    Register,
    /// Check a username and password
    Login,
    /// Overwrite a user's password
    ResetPassword,
    /// Remove a user
    DeleteAccount,
}

impl Route {
    /// The only HTTP method this route answers to.
    pub fn method(&self) -> &'static str {
        match self {
            Route::Users => "GET",
            Route::Register | Route::Login => "POST",
            Route::ResetPassword => "PUT",
            Route::DeleteAccount => "DELETE",
        }
    }
}

impl FromStr for Route {
    type Err = (); // any failure means the route simply doesn't exist
    fn from_str(s: &str) -> Result<Route, Self::Err> {
        use route_paths::*;
        use Route::*;
        match s {
            USERS => Ok(Users),
            REGISTER => Ok(Register),
            LOGIN => Ok(Login),
            RESET_PASSWORD => Ok(ResetPassword),
            DELETE_ACCOUNT => Ok(DeleteAccount),
            _ => Err(()),
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use route_paths::*;
        use Route::*;
        let output = match self {
            Users => USERS,
            Register => REGISTER,
            Login => LOGIN,
            ResetPassword => RESET_PASSWORD,
            DeleteAccount => DELETE_ACCOUNT,
        };
        write!(f, "{}", output)
    }
}

/// Body returned for anything that is not a domain outcome.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[non_exhaustive]
pub struct ErrorResult {
    pub success: bool,
    pub message: String,
}

impl ErrorResult {
    pub fn new(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_owned(),
        }
    }

    pub fn server_error() -> Self {
        Self::new(messages::SERVER_ERROR)
    }
}

/// Reads a form field as text.
///
/// Form bodies only ever carry strings, JSON bodies may carry scalars which
/// are stringified. Arrays and objects are rejected.
pub(crate) fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a text value, found '{}'",
            other
        ))),
    }
}

fn invalid_params_serde_message(err: &serde_json::Error) -> String {
    format!("invalid format of params object: '{}'", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_from_str_test() {
        assert_eq!(Route::from_str("/users"), Ok(Route::Users));
        assert_eq!(Route::from_str("/reset-password"), Ok(Route::ResetPassword));
        assert_eq!(Route::from_str("/users/"), Err(()));
        assert_eq!(Route::from_str("/unknown"), Err(()));
    }

    #[test]
    fn route_display_test() {
        for route in &[
            Route::Users,
            Route::Register,
            Route::Login,
            Route::ResetPassword,
            Route::DeleteAccount,
        ] {
            assert_eq!(Route::from_str(&route.to_string()), Ok(*route));
        }
    }

    #[test]
    fn route_method_test() {
        assert_eq!(Route::Users.method(), "GET");
        assert_eq!(Route::Login.method(), "POST");
        assert_eq!(Route::ResetPassword.method(), "PUT");
        assert_eq!(Route::DeleteAccount.method(), "DELETE");
    }

    #[test]
    fn server_error_body_test() {
        let body = serde_json::to_value(ErrorResult::server_error()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "success": false, "message": "server error" })
        );
    }
}
