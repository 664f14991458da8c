pub mod delete_account;
pub mod list_users;
pub mod login;
pub mod register;
pub mod reset_password;

/// A user record as it is sent to clients.
///
/// The password is included, clients have always received it.
#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[non_exhaustive]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub password: String,
    pub avatar: String,
}

impl User {
    pub fn new(id: String, username: String, password: String, avatar: String) -> Self {
        Self {
            id,
            username,
            password,
            avatar,
        }
    }
}
