use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    config::Config,
    constants::USER_COUNT_PER_PAGE,
    error::DomainError,
    pagination::PageContext,
    schema::{Id, User, UserRow},
};

/// Fields of the sign-up form.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), DomainError> {
        let username = self.username.trim();
        if username.is_empty() || username.chars().count() > 150 {
            return Err(DomainError::validation(
                "Username must be between 1 and 150 characters",
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
        {
            return Err(DomainError::validation(
                "Username may contain only letters, digits and @/./+/-/_",
            ));
        }
        if username.eq_ignore_ascii_case("me") {
            return Err(DomainError::validation("Username 'me' is reserved"));
        }
        if !is_email(&self.email) {
            return Err(DomainError::validation("Invalid email address"));
        }
        validate_password(&self.password)
    }
}

pub async fn get_user(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, DomainError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, DomainError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn fetch_users(
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserRow>, DomainError> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT id, username, email, first_name, last_name, role, date_joined, COUNT(*) OVER() AS count
        FROM users
        ORDER BY username
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|u| u.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}

/// Creates a user; the stored password is the argon2 hash of the given one.
pub async fn register_user(
    registration: &Registration,
    pool: &Pool<Postgres>,
) -> Result<User, DomainError> {
    registration.validate()?;

    let password = hash_password(&registration.password)?;

    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, email, password, first_name, last_name)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(registration.username.trim())
    .bind(registration.email.trim())
    .bind(password)
    .bind(registration.first_name.trim())
    .bind(registration.last_name.trim())
    .fetch_optional(pool)
    .await?;

    match user {
        Some(user) => {
            log::info!("Registered user {} ({})", user.username, user.id);
            Ok(user)
        }
        None => Err(DomainError::conflict("Username or email is already taken")),
    }
}

pub async fn login_user(
    username: &str,
    password: &str,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<String, DomainError> {
    let user = get_user(pool, username)
        .await?
        .ok_or_else(|| DomainError::validation("Invalid credentials"))?;

    if !verify_password(password, &user.password)? {
        return Err(DomainError::validation("Invalid credentials"));
    }

    generate_jwt_session(&user, config)
}

/// Changes the password after checking the current one.
pub async fn set_password(
    user_id: Id,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), DomainError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| DomainError::not_found("User doesn't exist"))?;

    if !verify_password(current_password, &user.password)? {
        return Err(DomainError::validation("Current password is incorrect"));
    }
    validate_password(new_password)?;

    let password = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await?;

    log::info!("Password changed for user {user_id}");
    Ok(())
}

fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < 8 {
        return Err(DomainError::validation(
            "Password must be at least 8 characters long",
        ));
    }
    Ok(())
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}
