use serde::Serialize;

use super::repo_types::{Gender, User};

/// Public profile of the authenticated user.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub name: String,
    pub dob: String,
    pub gender: Gender,
    pub phone: Option<String>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            dob: user.dob,
            gender: user.gender,
            phone: user.phone,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserListItem {
    pub id: i64,
    pub name: String,
    pub gender: Gender,
    pub age: i64,
}
