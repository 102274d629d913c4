use serde::Serialize;
use sqlx::FromRow;

use super::dates;

/// One of `0`, `1`, `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Gender(u8);

impl Gender {
    pub const ALLOWED: [u8; 3] = [0, 1, 2];

    pub fn new(value: i64) -> Option<Self> {
        Self::ALLOWED
            .iter()
            .find(|&&allowed| i64::from(allowed) == value)
            .map(|&allowed| Gender(allowed))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Raw `users` row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub gender: i64,
    pub dob: String,
    pub phone: Option<String>,
    pub ip: String,
    pub access_token: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub gender: Gender,
    pub dob: String,
    pub phone: Option<String>,
    pub ip: String,
    pub access_token: String,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let gender = Gender::new(row.gender)
            .ok_or_else(|| anyhow::anyhow!("user {} has invalid gender {}", row.id, row.gender))?;
        anyhow::ensure!(
            dates::is_exact_date(&row.dob),
            "user {} has malformed dob {:?}",
            row.id,
            row.dob
        );
        anyhow::ensure!(
            !row.password_hash.is_empty(),
            "user {} has empty password hash",
            row.id
        );

        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            gender,
            dob: row.dob,
            phone: row.phone,
            ip: row.ip,
            access_token: row.access_token,
            created_at: row.created_at,
        })
    }
}

/// A user that has not been stored yet; `id` and `created_at` are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub gender: Gender,
    pub dob: String,
    pub phone: Option<String>,
    pub ip: String,
    pub access_token: String,
}
