use sqlx::SqlitePool;
use tracing::instrument;

use super::{
    dates,
    repo_types::{Gender, NewUser, User, UserRow},
};
use crate::error::AppError;

const USER_COLUMNS: &str =
    "id, email, name, password_hash, gender, dob, phone, ip, access_token, created_at";

fn hydrate(row: Option<UserRow>) -> Result<Option<User>, AppError> {
    row.map(User::try_from).transpose().map_err(AppError::Internal)
}

impl User {
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        hydrate(row)
    }

    /// Exact match on the stored token; signature validity is not checked here.
    #[instrument(skip_all)]
    pub async fn find_by_access_token(
        db: &SqlitePool,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE access_token = ?"
        ))
        .bind(token)
        .fetch_optional(db)
        .await?;
        hydrate(row)
    }

    /// Whether a user other than `except_id` owns `email`.
    pub async fn has_email(db: &SqlitePool, email: &str, except_id: i64) -> Result<bool, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(except_id)
                .fetch_one(db)
                .await?;
        Ok(count > 0)
    }

    /// Whether a user other than `except_id` owns `name`.
    pub async fn has_name(db: &SqlitePool, name: &str, except_id: i64) -> Result<bool, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE name = ? AND id != ?")
                .bind(name)
                .bind(except_id)
                .fetch_one(db)
                .await?;
        Ok(count > 0)
    }

    /// Inserts the user and stamps `created_at`. A unique-constraint violation
    /// is returned as a storage error.
    #[instrument(skip_all, fields(email = %new.email))]
    pub async fn create(db: &SqlitePool, new: NewUser) -> Result<User, AppError> {
        let created_at = dates::now()?;

        let result = sqlx::query(
            r#"
            INSERT INTO users
                (email, name, password_hash, gender, dob, phone, ip, access_token, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_hash)
        .bind(i64::from(new.gender.value()))
        .bind(&new.dob)
        .bind(&new.phone)
        .bind(&new.ip)
        .bind(&new.access_token)
        .bind(&created_at)
        .execute(db)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            gender: new.gender,
            dob: new.dob,
            phone: new.phone,
            ip: new.ip,
            access_token: new.access_token,
            created_at,
        })
    }

    /// Persists the mutable profile fields. `ip`, `created_at` and the token are left alone.
    /// Returns `false` when the row no longer exists.
    #[instrument(skip_all, fields(user_id = self.id))]
    pub async fn update(&self, db: &SqlitePool) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET email = ?, name = ?, password_hash = ?, dob = ?, gender = ?, phone = ?
             WHERE id = ?
            "#,
        )
        .bind(&self.email)
        .bind(&self.name)
        .bind(&self.password_hash)
        .bind(&self.dob)
        .bind(i64::from(self.gender.value()))
        .bind(&self.phone)
        .bind(self.id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(db, token))]
    pub async fn update_access_token(
        db: &SqlitePool,
        id: i64,
        token: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET access_token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &SqlitePool, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All users, optionally restricted to one gender, by ascending id.
    #[instrument(skip(db))]
    pub async fn list(db: &SqlitePool, gender: Option<Gender>) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE (?1 IS NULL OR gender = ?1) ORDER BY id ASC"
        ))
        .bind(gender.map(|g| i64::from(g.value())))
        .fetch_all(db)
        .await?;

        rows.into_iter()
            .map(|row| User::try_from(row).map_err(AppError::Internal))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::AppState;

    pub(crate) fn new_user(email: &str, name: &str, token: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: name.into(),
            password_hash: crate::auth::password::hash_password("123456").unwrap(),
            gender: Gender::new(1).unwrap(),
            dob: "2014-11-09T16:22:21+00:00".into(),
            phone: None,
            ip: "127.0.0.1".into(),
            access_token: token.into(),
        }
    }

    async fn db() -> SqlitePool {
        AppState::in_memory("secret").await.unwrap().db
    }

    #[tokio::test]
    async fn create_assigns_id_and_created_at() {
        let db = db().await;
        let first = User::create(&db, new_user("a@test.ru", "a", "t1")).await.unwrap();
        let second = User::create(&db, new_user("b@test.ru", "b", "t2")).await.unwrap();
        assert!(first.id > 0);
        assert!(second.id > first.id);
        assert!(dates::is_exact_date(&first.created_at));

        let stored = User::find_by_email(&db, "a@test.ru").await.unwrap().unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_storage_error() {
        let db = db().await;
        User::create(&db, new_user("a@test.ru", "a", "t1")).await.unwrap();
        let err = User::create(&db, new_user("a@test.ru", "other", "t2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn duplicate_name_is_a_storage_error() {
        let db = db().await;
        User::create(&db, new_user("a@test.ru", "first", "t1")).await.unwrap();
        let err = User::create(&db, new_user("b@test.ru", "first", "t2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn lookups_by_email_and_token() {
        let db = db().await;
        let user = User::create(&db, new_user("a@test.ru", "a", "tok")).await.unwrap();

        let by_email = User::find_by_email(&db, "a@test.ru").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
        assert!(User::find_by_email(&db, "x@test.ru").await.unwrap().is_none());

        let by_token = User::find_by_access_token(&db, "tok").await.unwrap();
        assert_eq!(by_token.map(|u| u.id), Some(user.id));
        assert!(User::find_by_access_token(&db, "tok2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_token_supersedes_old() {
        let db = db().await;
        let user = User::create(&db, new_user("a@test.ru", "a", "old")).await.unwrap();
        User::update_access_token(&db, user.id, "new").await.unwrap();

        assert!(User::find_by_access_token(&db, "old").await.unwrap().is_none());
        assert!(User::find_by_access_token(&db, "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn uniqueness_checks_exclude_own_id() {
        let db = db().await;
        let user = User::create(&db, new_user("a@test.ru", "a", "t")).await.unwrap();

        assert!(User::has_email(&db, "a@test.ru", 0).await.unwrap());
        assert!(!User::has_email(&db, "a@test.ru", user.id).await.unwrap());
        assert!(User::has_name(&db, "a", 0).await.unwrap());
        assert!(!User::has_name(&db, "a", user.id).await.unwrap());
        assert!(!User::has_name(&db, "b", 0).await.unwrap());
    }

    #[tokio::test]
    async fn update_persists_profile_fields_only() {
        let db = db().await;
        let mut user = User::create(&db, new_user("a@test.ru", "a", "t")).await.unwrap();
        user.name = "renamed".into();
        user.phone = Some("+79990001122".into());
        user.access_token = "ignored".into();
        assert!(user.update(&db).await.unwrap());

        let stored = User::find_by_email(&db, "a@test.ru").await.unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.phone.as_deref(), Some("+79990001122"));
        assert_eq!(stored.access_token, "t");
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let db = db().await;
        let user = User::create(&db, new_user("a@test.ru", "a", "t")).await.unwrap();
        assert!(User::delete(&db, user.id).await.unwrap());
        assert!(!User::delete(&db, user.id).await.unwrap());
        assert!(User::find_by_email(&db, "a@test.ru").await.unwrap().is_none());
        assert!(!user.update(&db).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_gender_in_id_order() {
        let db = db().await;
        let mut second = new_user("b@test.ru", "b", "t2");
        second.gender = Gender::new(2).unwrap();
        User::create(&db, new_user("a@test.ru", "a", "t1")).await.unwrap();
        User::create(&db, second).await.unwrap();
        User::create(&db, new_user("c@test.ru", "c", "t3")).await.unwrap();

        let all: Vec<String> = User::list(&db, None)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(all, ["a", "b", "c"]);

        let ones: Vec<String> = User::list(&db, Gender::new(1))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(ones, ["a", "c"]);
    }
}
