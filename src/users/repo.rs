use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserRow};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_external_id(&self, external_id: &str) -> anyhow::Result<Option<User>>;

    /// Inserts `new`, or returns the row another request created first.
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_external_id(&self, external_id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, external_id, email, name, role, created_at
            FROM users
            WHERE external_id = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.db)
        .await
        .context("find user by external id")?;
        row.map(User::try_from).transpose()
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, external_id, email, name, role)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_id) DO UPDATE SET external_id = EXCLUDED.external_id
            RETURNING id, external_id, email, name, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.external_id)
        .bind(&new.email)
        .bind(&new.name)
        .bind(new.role.as_str())
        .fetch_one(&self.db)
        .await
        .context("create user")?;
        row.try_into()
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryUserRepo;
