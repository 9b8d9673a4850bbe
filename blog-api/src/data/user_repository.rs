use crate::data::unit_of_work::PgUnitOfWork;
use crate::domain::user::{CreateUserRequest, UpdateUserRequest};
use crate::domain::{DomainError, User};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

#[async_trait]
pub trait UserRepository: Send {
    async fn insert(&mut self, req: CreateUserRequest) -> Result<User, DomainError>;
    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, DomainError>;
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError>;
    async fn list(&mut self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), DomainError>;
    async fn update(&mut self, id: i64, patch: UpdateUserRequest) -> Result<User, DomainError>;
    async fn delete(&mut self, id: i64) -> Result<(), DomainError>;
}

fn user_from_row(row: &PgRow) -> Result<User, DomainError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
    })
}

fn map_write_error(err: sqlx::Error, email: &str) -> DomainError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            tracing::warn!("Email already registered: {}", email);
            DomainError::Conflict(format!("User with email {} already exists", email))
        }
        _ => {
            tracing::error!("Failed to write user: {}", err);
            DomainError::DatabaseError(err.to_string())
        }
    }
}

#[async_trait]
impl UserRepository for PgUnitOfWork {
    async fn insert(&mut self, req: CreateUserRequest) -> Result<User, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (email, name)
            VALUES ($1, $2)
            RETURNING id, email, name
            "#,
        )
        .bind(&req.email)
        .bind(&req.name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &req.email))?;

        user_from_row(&row)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list(&mut self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.tx)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, email, name
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<User>, DomainError>>()?;

        Ok((users, total))
    }

    async fn update(&mut self, id: i64, patch: UpdateUserRequest) -> Result<User, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, name
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let mut user = match row {
            Some(row) => user_from_row(&row)?,
            None => return Err(DomainError::UserNotFound),
        };
        user.apply(patch);

        let row = sqlx::query(
            r#"
            UPDATE users
            SET email = $1, name = $2
            WHERE id = $3
            RETURNING id, email, name
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, &user.email))?;

        user_from_row(&row)
    }

    async fn delete(&mut self, id: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                DomainError::Conflict(format!("User {} still owns posts", id))
            }
            _ => DomainError::DatabaseError(e.to_string()),
        })?;

        if result.rows_affected() == 0 {
            Err(DomainError::UserNotFound)
        } else {
            Ok(())
        }
    }
}
