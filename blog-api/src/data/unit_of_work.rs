use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::DomainError;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

/// Shared handle to the store. Hands out one unit-of-work per request.
#[async_trait]
pub trait Database: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError>;
    async fn ping(&self) -> Result<(), DomainError>;
}

/// A request-scoped transaction. Dropping it without `commit` discards
/// every change made through it.
#[async_trait]
pub trait UnitOfWork: Send {
    fn users(&mut self) -> &mut dyn UserRepository;
    fn posts(&mut self) -> &mut dyn PostRepository;
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// Commits on success and rolls back on failure, returning the original outcome.
pub async fn complete<T>(
    uow: Box<dyn UnitOfWork>,
    outcome: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match outcome {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::error!("Failed to roll back unit of work: {}", rollback_err);
            }
            Err(err)
        }
    }
}

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!("Failed to open transaction: {}", e);
            DomainError::DatabaseError(e.to_string())
        })?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgUnitOfWork {
    pub(crate) tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }

    fn posts(&mut self) -> &mut dyn PostRepository {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit transaction: {}", e);
            DomainError::DatabaseError(e.to_string())
        })
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
