use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tokio::sync::RwLock;

use crate::scheme::Registration;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent key <-> token associations.
///
/// Every method is a single statement. Callers sequencing several of them get
/// no transaction around the group.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<Registration>, StoreError>;

    async fn delete_by_key(&self, key: &str) -> Result<u64, StoreError>;

    async fn delete_by_token(&self, token: &str) -> Result<u64, StoreError>;

    async fn insert(&self, key: &str, token: &str) -> Result<(), StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

pub struct MySqlStore {
    db: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to the database")?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self { db: pool })
    }
}

#[async_trait]
impl RegistrationStore for MySqlStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Registration>, StoreError> {
        let r: Option<Registration> = sqlx::query_as(
            "select id, device_key, device_token from devices where device_key = ? order by id limit 1",
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;
        Ok(r)
    }

    async fn delete_by_key(&self, key: &str) -> Result<u64, StoreError> {
        let r = sqlx::query("delete from devices where device_key = ?")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(r.rows_affected())
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, StoreError> {
        let r = sqlx::query("delete from devices where device_token = ?")
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(r.rows_affected())
    }

    async fn insert(&self, key: &str, token: &str) -> Result<(), StoreError> {
        sqlx::query("insert into devices (device_key, device_token) values (?, ?)")
            .bind(key)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = sqlx::query_scalar("select count(*) from devices")
            .fetch_one(&self.db)
            .await?;
        Ok(n.max(0) as u64)
    }
}

/// In-process store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Registration>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn registrations(&self) -> Vec<Registration> {
        self.rows.read().await.clone()
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn find_by_key(&self, key: &str) -> Result<Option<Registration>, StoreError> {
        Ok(self.rows.read().await.iter().find(|r| r.key == key).cloned())
    }

    async fn delete_by_key(&self, key: &str) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| r.key != key);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| r.token != token);
        Ok((before - rows.len()) as u64)
    }

    async fn insert(&self, key: &str, token: &str) -> Result<(), StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.rows.write().await.push(Registration {
            id,
            key: key.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.rows.read().await.len() as u64)
    }
}
