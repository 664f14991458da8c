use super::User;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
#[serde(transparent)]
#[non_exhaustive]
pub struct MethodResult {
    pub users: Vec<User>,
}

impl MethodResult {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}
