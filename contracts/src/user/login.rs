use super::User;
use crate::messages;
use serde_json::Value;
use std::{
    convert::{TryFrom, TryInto},
    error::Error,
    fmt::Display,
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "ParamsBuilder")]
#[non_exhaustive]
pub struct Params {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Params {
    pub fn new(username: Option<String>, password: Option<String>) -> Result<Self, InvalidParams> {
        Ok(Self { username, password })
    }
}

impl TryFrom<Value> for Params {
    type Error = InvalidParams;

    fn try_from(fields: Value) -> Result<Self, Self::Error> {
        let builder: ParamsBuilder =
            serde_json::from_value(fields).map_err(InvalidParams::InvalidFormat)?;
        builder.try_into()
    }
}

impl TryFrom<ParamsBuilder> for Params {
    type Error = InvalidParams;

    fn try_from(builder: ParamsBuilder) -> Result<Self, Self::Error> {
        Params::new(builder.username, builder.password)
    }
}

#[derive(serde::Deserialize)]
struct ParamsBuilder {
    #[serde(default, deserialize_with = "crate::optional_text")]
    username: Option<String>,
    #[serde(default, deserialize_with = "crate::optional_text")]
    password: Option<String>,
}

#[derive(Debug)]
pub enum InvalidParams {
    InvalidFormat(serde_json::Error),
}

impl Error for InvalidParams {}

impl Display for InvalidParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            InvalidParams::InvalidFormat(serde_error) => {
                crate::invalid_params_serde_message(&serde_error)
            }
        };
        write!(f, "{}", output)
    }
}

/// Unknown usernames and wrong passwords share one failure message.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[non_exhaustive]
pub struct MethodResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl MethodResult {
    pub fn success(user: User) -> Self {
        Self {
            success: true,
            message: messages::LOGIN_SUCCESSFUL.to_owned(),
            user: Some(user),
        }
    }

    pub fn invalid_credentials() -> Self {
        Self {
            success: false,
            message: messages::INVALID_CREDENTIALS.to_owned(),
            user: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_has_no_user_key() {
        let body = serde_json::to_value(MethodResult::invalid_credentials()).unwrap();
        assert_eq!(
            body,
            json!({ "success": false, "message": "invalid username or password" })
        );
    }

    #[test]
    fn success_carries_full_user() {
        let user = User::new(
            "id".to_string(),
            "bob".to_string(),
            "pw".to_string(),
            "default.png".to_string(),
        );
        let body = serde_json::to_value(MethodResult::success(user)).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["user"]["username"], json!("bob"));
        assert_eq!(body["user"]["password"], json!("pw"));
    }
}
