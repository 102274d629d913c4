use anyhow::Context;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::{
    dates,
    dto::UserListItem,
    repo_types::{Gender, NewUser, User},
    validator::{NewProfile, ProfileChanges, UserFilter},
};
use crate::{auth::password::hash_password, auth::token::TokenCodec, error::AppError};

/// Stores a validated profile with a freshly issued access token.
pub async fn register(
    db: &SqlitePool,
    tokens: &TokenCodec,
    profile: NewProfile,
    ip: String,
) -> Result<User, AppError> {
    let access_token = tokens.issue_for_email(&profile.email)?;
    let password_hash = hash_password(&profile.password)?;

    User::create(
        db,
        NewUser {
            email: profile.email,
            name: profile.name,
            password_hash,
            gender: profile.gender,
            dob: profile.dob,
            phone: profile.phone,
            ip,
            access_token,
        },
    )
    .await
}

fn user_not_found(id: i64) -> AppError {
    AppError::not_found(format!("Can not find user with id: {id}"))
}

/// Writes back a changed profile. The row may have been deleted since the
/// guard resolved it.
pub async fn save(db: &SqlitePool, user: &User) -> Result<(), AppError> {
    if !user.update(db).await? {
        return Err(user_not_found(user.id));
    }
    Ok(())
}

pub async fn remove(db: &SqlitePool, id: i64) -> Result<(), AppError> {
    if !User::delete(db, id).await? {
        return Err(user_not_found(id));
    }
    Ok(())
}

/// Copies the present fields onto `user`; a new password is re-hashed.
pub fn apply_changes(user: &mut User, changes: ProfileChanges) -> anyhow::Result<()> {
    if let Some(email) = changes.email {
        user.email = email;
    }
    if let Some(name) = changes.name {
        user.name = name;
    }
    if let Some(password) = changes.password {
        user.password_hash = hash_password(&password)?;
    }
    if let Some(dob) = changes.dob {
        user.dob = dob;
    }
    if let Some(gender) = changes.gender {
        user.gender = gender;
    }
    if let Some(phone) = changes.phone {
        user.phone = Some(phone);
    }
    Ok(())
}

/// Users matching every present filter, by ascending id, with their age at `now`.
pub async fn filter_users(
    db: &SqlitePool,
    filter: UserFilter,
    now: OffsetDateTime,
) -> Result<Vec<UserListItem>, AppError> {
    let users = match filter.gender {
        None => User::list(db, None).await?,
        Some(raw) => match Gender::new(raw) {
            Some(gender) => User::list(db, Some(gender)).await?,
            None => return Ok(Vec::new()),
        },
    };

    let mut items = Vec::with_capacity(users.len());
    for user in users {
        let born = dates::parse(&user.dob)
            .with_context(|| format!("user {} has malformed dob", user.id))?;
        let age = dates::age_at(born, now);
        if filter.accepts_age(age) {
            items.push(UserListItem {
                id: user.id,
                name: user.name,
                gender: user.gender,
                age,
            });
        }
    }
    Ok(items)
}
