use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::warn;

use super::{dates, repo_types::Gender};
use crate::{error::AppError, extractors::RequestFields, users::repo_types::User};

/// Mandatory fields for registration, in the order they are reported.
pub const REQUIRED_FIELDS: [&str; 5] = ["email", "name", "password", "dob", "gender"];

pub const PASSWORD_MIN_CHARS: usize = 6;
pub const PASSWORD_MAX_CHARS: usize = 255;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@([A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$"
    )
    .unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[-.a-zа-яё0-9]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^\+[0-9]{7,16}$").unwrap();
}

fn rejected(message: impl Into<String>) -> AppError {
    let message = message.into();
    warn!(%message, "validation failed");
    AppError::Validation(message)
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration input that passed every check.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub name: String,
    pub password: String,
    pub gender: Gender,
    pub dob: String,
    pub phone: Option<String>,
}

/// Fields present in an update request; `None` means "leave untouched".
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
    pub gender: Option<Gender>,
    pub dob: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub gender: Option<i64>,
    pub age_min: Option<i64>,
    pub age_max: Option<i64>,
}

impl UserFilter {
    pub fn accepts_age(&self, age: i64) -> bool {
        self.age_min.map_or(true, |min| age >= min) && self.age_max.map_or(true, |max| age <= max)
    }
}

pub fn validate_auth_request(fields: &RequestFields) -> Result<Credentials, AppError> {
    let email = fields.get("email").ok_or_else(|| rejected("Missing email!"))?;
    let password = fields
        .get("password")
        .ok_or_else(|| rejected("Missing password!"))?;
    Ok(Credentials {
        email: email.to_owned(),
        password: password.to_owned(),
    })
}

pub fn validate_filter(fields: &RequestFields) -> Result<UserFilter, AppError> {
    let int = |name: &str| -> Result<Option<i64>, AppError> {
        fields
            .get(name)
            .map(|raw| {
                raw.parse::<i64>().map_err(|_| {
                    rejected(format!("Filter parameter <{name}> must be an integer!"))
                })
            })
            .transpose()
    };
    Ok(UserFilter {
        gender: int("gender")?,
        age_min: int("age_min")?,
        age_max: int("age_max")?,
    })
}

pub fn is_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    local.len() <= 64 && domain.len() <= 253 && EMAIL_RE.is_match(email)
}

pub fn check_password(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();
    if !(PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&length) {
        return Err(rejected(format!(
            "User password must have length greater or equal to {PASSWORD_MIN_CHARS} chars and less or equal to {PASSWORD_MAX_CHARS} chars!"
        )));
    }
    Ok(())
}

pub fn check_gender(raw: &str) -> Result<Gender, AppError> {
    raw.parse::<i64>()
        .ok()
        .and_then(Gender::new)
        .ok_or_else(|| {
            let allowed: Vec<String> = Gender::ALLOWED.iter().map(u8::to_string).collect();
            rejected(format!("User gender must be one of [{}]", allowed.join(", ")))
        })
}

pub fn check_date_of_birth(dob: &str) -> Result<(), AppError> {
    if !dates::is_exact_date(dob) {
        return Err(rejected("Seem`s that date of birth has wrong format!"));
    }
    Ok(())
}

pub fn check_phone(phone: &str) -> Result<(), AppError> {
    if !PHONE_RE.is_match(phone) {
        return Err(rejected(
            "Seem`s that phone not in international phone number format!",
        ));
    }
    Ok(())
}

/// Checks that need the user table. Uniqueness here is a fast pre-check;
/// the unique indexes remain the final word.
pub struct UserValidator<'a> {
    db: &'a SqlitePool,
}

impl<'a> UserValidator<'a> {
    pub fn new(db: &'a SqlitePool) -> Self {
        Self { db }
    }

    /// `except_id` is the id allowed to already own the address (0 for none).
    pub async fn check_email(&self, email: &str, except_id: i64) -> Result<(), AppError> {
        if !is_email(email) {
            return Err(rejected("Seem`s user email is not an email!"));
        }
        if User::has_email(self.db, email, except_id).await? {
            return Err(rejected("User with this email already exists!"));
        }
        Ok(())
    }

    pub async fn check_name(&self, name: &str, except_id: i64) -> Result<(), AppError> {
        if !NAME_RE.is_match(name) {
            return Err(rejected(
                "User name must contain only latin or russian characters, digits and . and -",
            ));
        }
        if User::has_name(self.db, name, except_id).await? {
            return Err(rejected("User with this name already exists!"));
        }
        Ok(())
    }

    pub async fn validate_user_input(
        &self,
        fields: &RequestFields,
    ) -> Result<NewProfile, AppError> {
        let missing: Vec<&str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|name| !fields.has(name))
            .collect();
        if !missing.is_empty() {
            return Err(rejected(format!("Missing fields: [{}]", missing.join(", "))));
        }

        let field = |name: &str| fields.get(name).unwrap_or_default().to_owned();
        let (email, name, password, dob) =
            (field("email"), field("name"), field("password"), field("dob"));
        let phone = fields.get("phone").map(str::to_owned);

        self.check_email(&email, 0).await?;
        self.check_name(&name, 0).await?;
        check_password(&password)?;
        let gender = check_gender(&field("gender"))?;
        check_date_of_birth(&dob)?;
        if let Some(phone) = &phone {
            check_phone(phone)?;
        }

        Ok(NewProfile {
            email,
            name,
            password,
            gender,
            dob,
            phone,
        })
    }

    /// Validates only the fields present in the request.
    pub async fn validate_optional_user_input(
        &self,
        fields: &RequestFields,
        user_id: i64,
    ) -> Result<ProfileChanges, AppError> {
        let mut changes = ProfileChanges::default();

        if let Some(email) = fields.get("email") {
            self.check_email(email, user_id).await?;
            changes.email = Some(email.to_owned());
        }
        if let Some(name) = fields.get("name") {
            self.check_name(name, user_id).await?;
            changes.name = Some(name.to_owned());
        }
        if let Some(password) = fields.get("password") {
            check_password(password)?;
            changes.password = Some(password.to_owned());
        }
        if let Some(gender) = fields.get("gender") {
            changes.gender = Some(check_gender(gender)?);
        }
        if let Some(dob) = fields.get("dob") {
            check_date_of_birth(dob)?;
            changes.dob = Some(dob.to_owned());
        }
        if let Some(phone) = fields.get("phone") {
            check_phone(phone)?;
            changes.phone = Some(phone.to_owned());
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{state::AppState, users::repo::tests::new_user};

    const DOB: &str = "2018-11-09T16:22:21+00:00";

    fn fields(pairs: &[(&str, &str)]) -> RequestFields {
        pairs.iter().copied().collect()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("email", "test@test.ru"),
            ("name", "name"),
            ("password", "123456"),
            ("dob", DOB),
            ("gender", "1"),
        ]
    }

    fn message(err: AppError) -> String {
        assert!(matches!(err, AppError::Validation(_)), "{err:?}");
        err.to_string()
    }

    #[test]
    fn auth_request_needs_email_then_password() {
        let err = validate_auth_request(&fields(&[("password", "x")])).unwrap_err();
        assert_eq!(message(err), "Missing email!");
        let err = validate_auth_request(&fields(&[("email", "x")])).unwrap_err();
        assert_eq!(message(err), "Missing password!");

        let creds = validate_auth_request(&fields(&[("email", "a"), ("password", "b")])).unwrap();
        assert_eq!(creds.email, "a");
        assert_eq!(creds.password, "b");
    }

    #[test]
    fn email_format() {
        for good in ["test@test.ru", "first.last+tag@mail.example.com", "a_b@x-y.io"] {
            assert!(is_email(good), "{good}");
        }
        for bad in [
            "",
            "plain",
            "@test.ru",
            "a@",
            "a@@b.ru",
            "a b@test.ru",
            ".a@test.ru",
            "a..b@test.ru",
            "a@-x.ru",
            "a@x",
        ] {
            assert!(!is_email(bad), "{bad}");
        }
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(check_password("12345").is_err());
        assert!(check_password("123456").is_ok());
        // six cyrillic letters are twelve bytes
        assert!(check_password("пароль").is_ok());
        assert!(check_password("парол").is_err());
        assert!(check_password(&"я".repeat(255)).is_ok());
        assert!(check_password(&"я".repeat(256)).is_err());
    }

    #[test]
    fn gender_must_be_known_integer() {
        assert_eq!(check_gender("2").unwrap().value(), 2);
        for bad in ["3", "-1", "abc", "", "1.0"] {
            let err = check_gender(bad).unwrap_err();
            assert_eq!(message(err), "User gender must be one of [0, 1, 2]");
        }
    }

    #[test]
    fn phone_format() {
        assert!(check_phone("+7999123").is_ok());
        assert!(check_phone("+7999123456789012").is_ok());
        for bad in ["+799912", "+79991234567890123", "79991234567", "+7999-123-45", ""] {
            assert_eq!(
                message(check_phone(bad).unwrap_err()),
                "Seem`s that phone not in international phone number format!"
            );
        }
    }

    #[test]
    fn date_of_birth_must_round_trip() {
        assert!(check_date_of_birth(DOB).is_ok());
        let err = check_date_of_birth("Mon, 09 Nov 2018 16:22:21 +0000").unwrap_err();
        assert_eq!(message(err), "Seem`s that date of birth has wrong format!");
    }

    #[test]
    fn filter_parameters_are_optional_integers() {
        assert_eq!(validate_filter(&fields(&[])).unwrap(), UserFilter::default());

        let filter = validate_filter(&fields(&[("gender", "1"), ("age_min", "4")])).unwrap();
        assert_eq!(filter.gender, Some(1));
        assert_eq!(filter.age_min, Some(4));
        assert_eq!(filter.age_max, None);
        assert!(filter.accepts_age(4));
        assert!(!filter.accepts_age(3));

        let err = validate_filter(&fields(&[("age_max", "old")])).unwrap_err();
        assert_eq!(message(err), "Filter parameter <age_max> must be an integer!");
    }

    #[tokio::test]
    async fn missing_fields_are_listed_in_declared_order() {
        let state = AppState::in_memory("secret").await.unwrap();
        let validator = UserValidator::new(&state.db);

        let err = validator
            .validate_user_input(&fields(&[("email", "test@test.ru")]))
            .await
            .unwrap_err();
        assert_eq!(message(err), "Missing fields: [name, password, dob, gender]");

        let mut partial = complete();
        partial.retain(|(k, _)| *k != "dob");
        let err = validator.validate_user_input(&fields(&partial)).await.unwrap_err();
        assert_eq!(message(err), "Missing fields: [dob]");
    }

    #[tokio::test]
    async fn complete_input_is_parsed() {
        let state = AppState::in_memory("secret").await.unwrap();
        let validator = UserValidator::new(&state.db);

        let mut input = complete();
        input.push(("phone", "+79991234567"));
        let profile = validator.validate_user_input(&fields(&input)).await.unwrap();
        assert_eq!(profile.email, "test@test.ru");
        assert_eq!(profile.gender.value(), 1);
        assert_eq!(profile.phone.as_deref(), Some("+79991234567"));
    }

    #[tokio::test]
    async fn first_failing_rule_wins() {
        let state = AppState::in_memory("secret").await.unwrap();
        let validator = UserValidator::new(&state.db);

        let input = fields(&[
            ("email", "not-an-email"),
            ("name", "BAD NAME"),
            ("password", "1"),
            ("dob", "yesterday"),
            ("gender", "9"),
        ]);
        let err = validator.validate_user_input(&input).await.unwrap_err();
        assert_eq!(message(err), "Seem`s user email is not an email!");
    }

    #[tokio::test]
    async fn name_rules() {
        let state = AppState::in_memory("secret").await.unwrap();
        let validator = UserValidator::new(&state.db);

        for good in ["first", "ivan.petrov-2", "иван", "ёжик"] {
            assert!(validator.check_name(good, 0).await.is_ok(), "{good}");
        }
        for bad in ["First", "Иван", "with space", "under_score", ""] {
            let err = validator.check_name(bad, 0).await.unwrap_err();
            assert_eq!(
                message(err),
                "User name must contain only latin or russian characters, digits and . and -"
            );
        }
    }

    #[tokio::test]
    async fn duplicates_are_rejected_except_for_self() {
        let state = AppState::in_memory("secret").await.unwrap();
        let user = User::create(&state.db, new_user("test@test.ru", "first", "t"))
            .await
            .unwrap();
        let validator = UserValidator::new(&state.db);

        let err = validator.check_name("first", 0).await.unwrap_err();
        assert_eq!(message(err), "User with this name already exists!");
        let err = validator.check_email("test@test.ru", 0).await.unwrap_err();
        assert_eq!(message(err), "User with this email already exists!");

        assert!(validator.check_name("first", user.id).await.is_ok());
        assert!(validator.check_email("test@test.ru", user.id).await.is_ok());
    }

    #[tokio::test]
    async fn partial_input_validates_present_fields_only() {
        let state = AppState::in_memory("secret").await.unwrap();
        let validator = UserValidator::new(&state.db);

        let changes = validator
            .validate_optional_user_input(&fields(&[("name", "new-name")]), 1)
            .await
            .unwrap();
        assert_eq!(changes.name.as_deref(), Some("new-name"));
        assert!(changes.email.is_none());
        assert!(changes.password.is_none());
        assert!(changes.gender.is_none());
        assert!(changes.dob.is_none());
        assert!(changes.phone.is_none());

        let err = validator
            .validate_optional_user_input(&fields(&[("phone", "123")]), 1)
            .await
            .unwrap_err();
        assert_eq!(
            message(err),
            "Seem`s that phone not in international phone number format!"
        );
    }
}
