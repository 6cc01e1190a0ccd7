//! User directory consumed for courier validation and demo seeding.
//! Registration, credentials and profiles live elsewhere.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::actor::Role;
use crate::repository::postgres::map_sqlx_error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub role: Role,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("user directory unavailable: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<DirectoryUser>, DirectoryError>;

    /// Registers a user, or returns the existing record when the email is
    /// already known so repeated seeding stays idempotent.
    async fn register(&self, user: DirectoryUser) -> Result<DirectoryUser, DirectoryError>;
}

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<Uuid, DirectoryUser>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, id: Uuid, role: Role) -> Self {
        self.users.insert(
            id,
            DirectoryUser {
                id,
                role,
                email: None,
            },
        );
        self
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<DirectoryUser>, DirectoryError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn register(&self, user: DirectoryUser) -> Result<DirectoryUser, DirectoryError> {
        if let Some(email) = user.email.as_deref() {
            let existing = self
                .users
                .iter()
                .find(|entry| entry.email.as_deref() == Some(email))
                .map(|entry| entry.value().clone());
            if let Some(existing) = existing {
                return Ok(existing);
            }
        }

        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    role: String,
    email: Option<String>,
}

impl UserRow {
    fn into_user(self) -> Result<DirectoryUser, DirectoryError> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|err| DirectoryError::Backend(format!("user {}: {err}", self.id)))?;
        Ok(DirectoryUser {
            id: self.id,
            role,
            email: self.email,
        })
    }
}

fn backend_error(err: sqlx::Error) -> DirectoryError {
    DirectoryError::Backend(map_sqlx_error(err).to_string())
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<DirectoryUser>, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, role, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn register(&self, user: DirectoryUser) -> Result<DirectoryUser, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, role, email) VALUES ($1, $2, $3)
             ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
             RETURNING id, role, email",
        )
        .bind(user.id)
        .bind(user.role.as_str())
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_error)?;

        row.into_user()
    }
}
