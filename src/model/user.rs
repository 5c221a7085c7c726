use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::error::DomainError;
use crate::model::ids::UserId;
use crate::model::role::Role;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static email pattern")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3}-[0-9]{4}-[0-9]{4}$").expect("static phone pattern"));
static ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3}-[0-9]{4}$").expect("static zip pattern"));

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// A user account with its profile and contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub first_name: Option<String>,
    pub first_name_ruby: Option<String>,
    pub last_name: Option<String>,
    pub last_name_ruby: Option<String>,
    pub gender: Option<Gender>,
    pub birth_day: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
    /// Active role names, loaded alongside the account.
    pub roles: Vec<Role>,
    pub delete_flag: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Registration payload after deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct NewUser {
    #[schema(example = "taro")]
    pub username: String,
    #[schema(example = "taro@example.com")]
    pub email: String,
    #[schema(example = "correct-horse-battery")]
    pub password: String,
    pub first_name: Option<String>,
    pub first_name_ruby: Option<String>,
    pub last_name: Option<String>,
    pub last_name_ruby: Option<String>,
    pub gender: Gender,
    #[schema(example = "1990-04-01", format = "date", value_type = String)]
    pub birth_day: NaiveDate,
    #[schema(example = "090-1234-5678")]
    pub phone_number: Option<String>,
    #[schema(example = "100-0001")]
    pub zip_code: Option<String>,
    pub address: Option<String>,
}

/// Profile and contact fields that may be changed after registration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub first_name_ruby: Option<String>,
    pub last_name: Option<String>,
    pub last_name_ruby: Option<String>,
    pub gender: Option<Gender>,
    #[schema(example = "1990-04-01", format = "date", value_type = Option<String>)]
    pub birth_day: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub zip_code: Option<String>,
    pub address: Option<String>,
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    if email.is_empty() {
        return Err(DomainError::validation("email", "Email cannot be empty"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(DomainError::validation(
            "email",
            format!("Invalid email format: {email}"),
        ));
    }
    Ok(())
}

fn validate_phone(phone: Option<&str>) -> Result<(), DomainError> {
    match phone {
        Some(p) if !PHONE_RE.is_match(p) => Err(DomainError::validation(
            "phone_number",
            "Phone number must be in format: 000-0000-0000",
        )),
        _ => Ok(()),
    }
}

fn validate_zip(zip: Option<&str>) -> Result<(), DomainError> {
    match zip {
        Some(z) if !ZIP_RE.is_match(z) => Err(DomainError::validation(
            "zip_code",
            "Zip code must be in format: 000-0000",
        )),
        _ => Ok(()),
    }
}

impl NewUser {
    pub fn validate(&self) -> Result<(), DomainError> {
        let len = self.username.trim().chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(DomainError::validation(
                "username",
                format!("Username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"),
            ));
        }
        validate_email(&self.email)?;
        if self.password.chars().count() < PASSWORD_MIN_LEN {
            return Err(DomainError::validation(
                "password",
                format!("Password must be at least {PASSWORD_MIN_LEN} characters"),
            ));
        }
        validate_phone(self.phone_number.as_deref())?;
        validate_zip(self.zip_code.as_deref())?;
        Ok(())
    }
}

impl UserPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_phone(self.phone_number.as_deref())?;
        validate_zip(self.zip_code.as_deref())?;
        Ok(())
    }
}

impl User {
    /// Builds an account from validated registration data.
    pub fn register(new: NewUser, hashed_password: String, actor: &str) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::generate(),
            username: new.username.trim().to_string(),
            email: new.email,
            hashed_password,
            first_name: new.first_name,
            first_name_ruby: new.first_name_ruby,
            last_name: new.last_name,
            last_name_ruby: new.last_name_ruby,
            gender: Some(new.gender),
            birth_day: Some(new.birth_day),
            phone_number: new.phone_number,
            zip_code: new.zip_code,
            address: new.address,
            roles: vec![Role::default_for_new_user()],
            delete_flag: false,
            created_at: now,
            created_by: actor.to_string(),
            updated_at: now,
            updated_by: actor.to_string(),
        }
    }

    pub fn apply(&self, patch: UserPatch, updated_by: &str) -> Self {
        Self {
            first_name: patch.first_name.or_else(|| self.first_name.clone()),
            first_name_ruby: patch.first_name_ruby.or_else(|| self.first_name_ruby.clone()),
            last_name: patch.last_name.or_else(|| self.last_name.clone()),
            last_name_ruby: patch.last_name_ruby.or_else(|| self.last_name_ruby.clone()),
            gender: patch.gender.or(self.gender),
            birth_day: patch.birth_day.or(self.birth_day),
            phone_number: patch.phone_number.or_else(|| self.phone_number.clone()),
            zip_code: patch.zip_code.or_else(|| self.zip_code.clone()),
            address: patch.address.or_else(|| self.address.clone()),
            updated_at: Utc::now(),
            updated_by: updated_by.to_string(),
            ..self.clone()
        }
    }

    /// Highest-ranked hierarchical role among the active ones.
    pub fn primary_role(&self) -> Option<Role> {
        self.roles
            .iter()
            .copied()
            .filter(|r| r.is_hierarchical())
            .max_by_key(|r| r.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user() -> NewUser {
        NewUser {
            username: "taro".to_string(),
            email: "taro@example.com".to_string(),
            password: "correct-horse".to_string(),
            first_name: Some("Taro".to_string()),
            first_name_ruby: None,
            last_name: Some("Yamada".to_string()),
            last_name_ruby: None,
            gender: Gender::Male,
            birth_day: NaiveDate::from_ymd_opt(1990, 4, 1).unwrap(),
            phone_number: Some("090-1234-5678".to_string()),
            zip_code: Some("100-0001".to_string()),
            address: None,
        }
    }

    fn invalid_field(u: &NewUser) -> Option<String> {
        match u.validate() {
            Err(DomainError::Validation { field, .. }) => Some(field),
            _ => None,
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert!(new_user().validate().is_ok());
    }

    #[test]
    fn rejects_bad_fields() {
        let mut u = new_user();
        u.username = "ab".to_string();
        assert_eq!(invalid_field(&u).as_deref(), Some("username"));

        let mut u = new_user();
        u.email = "not-an-email".to_string();
        assert_eq!(invalid_field(&u).as_deref(), Some("email"));

        let mut u = new_user();
        u.password = "short".to_string();
        assert_eq!(invalid_field(&u).as_deref(), Some("password"));

        let mut u = new_user();
        u.phone_number = Some("09012345678".to_string());
        assert_eq!(invalid_field(&u).as_deref(), Some("phone_number"));

        let mut u = new_user();
        u.zip_code = Some("1000001".to_string());
        assert_eq!(invalid_field(&u).as_deref(), Some("zip_code"));
    }

    #[test]
    fn register_assigns_default_role() {
        let user = User::register(new_user(), "hash".to_string(), "system");
        assert_eq!(user.roles, vec![Role::User]);
        assert_eq!(user.primary_role(), Some(Role::User));
        assert!(!user.delete_flag);
    }

    #[test]
    fn apply_only_overwrites_supplied_fields() {
        let user = User::register(new_user(), "hash".to_string(), "system");
        let patched = user.apply(
            UserPatch {
                address: Some("Chiyoda, Tokyo".to_string()),
                ..Default::default()
            },
            "admin",
        );
        assert_eq!(patched.address.as_deref(), Some("Chiyoda, Tokyo"));
        assert_eq!(patched.first_name, user.first_name);
        assert_eq!(patched.updated_by, "admin");
        assert_eq!(patched.created_by, "system");
    }

    #[test]
    fn primary_role_ignores_guest() {
        let mut user = User::register(new_user(), "hash".to_string(), "system");
        user.roles = vec![Role::Guest, Role::Manager];
        assert_eq!(user.primary_role(), Some(Role::Manager));
        user.roles = vec![Role::Guest];
        assert_eq!(user.primary_role(), None);
    }
}
