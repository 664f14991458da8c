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
    /// The new password
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

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[non_exhaustive]
pub struct MethodResult {
    pub success: bool,
    pub message: String,
}

impl MethodResult {
    pub fn updated() -> Self {
        Self {
            success: true,
            message: messages::PASSWORD_UPDATED.to_owned(),
        }
    }

    pub fn user_not_found() -> Self {
        Self {
            success: false,
            message: messages::USER_NOT_FOUND.to_owned(),
        }
    }
}
