use crate::data::unit_of_work::PgUnitOfWork;
use crate::domain::post::{CreatePostRequest, UpdatePostRequest};
use crate::domain::{DomainError, Post, PostFilter};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

#[async_trait]
pub trait PostRepository: Send {
    async fn insert(&mut self, req: CreatePostRequest) -> Result<Post, DomainError>;
    async fn find_by_id(&mut self, id: i64) -> Result<Option<Post>, DomainError>;
    async fn list(
        &mut self,
        filter: PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Post>, i64), DomainError>;
    async fn count_by_author(&mut self, author_id: i64) -> Result<i64, DomainError>;
    async fn update(&mut self, id: i64, patch: UpdatePostRequest) -> Result<Post, DomainError>;
    async fn delete(&mut self, id: i64) -> Result<(), DomainError>;
    async fn delete_by_author(&mut self, author_id: i64) -> Result<u64, DomainError>;
}

fn post_from_row(row: &PgRow) -> Result<Post, DomainError> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        published: row.try_get("published")?,
        author_id: row.try_get("author_id")?,
    })
}

#[async_trait]
impl PostRepository for PgUnitOfWork {
    async fn insert(&mut self, req: CreatePostRequest) -> Result<Post, DomainError> {
        let row = sqlx::query(
            r#"
            INSERT INTO posts (title, content, published, author_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, content, published, author_id
            "#,
        )
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.published)
        .bind(req.author_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                tracing::warn!("Rejected post for unknown author_id={}", req.author_id);
                DomainError::ValidationError(format!("Author {} does not exist", req.author_id))
            }
            _ => {
                tracing::error!("Failed to create post: {}", e);
                DomainError::DatabaseError(e.to_string())
            }
        })?;

        post_from_row(&row)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<Post>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, published, author_id
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list(
        &mut self,
        filter: PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Post>, i64), DomainError> {
        // A NULL author filter matches every row
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM posts
            WHERE ($1::BIGINT IS NULL OR author_id = $1)
            "#,
        )
        .bind(filter.author_id)
        .fetch_one(&mut *self.tx)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, title, content, published, author_id
            FROM posts
            WHERE ($1::BIGINT IS NULL OR author_id = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.author_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;

        let posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<Post>, DomainError>>()?;

        Ok((posts, total))
    }

    async fn count_by_author(&mut self, author_id: i64) -> Result<i64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count)
    }

    async fn update(&mut self, id: i64, patch: UpdatePostRequest) -> Result<Post, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, title, content, published, author_id
            FROM posts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let mut post = match row {
            Some(row) => post_from_row(&row)?,
            None => return Err(DomainError::PostNotFound),
        };
        post.apply(patch);

        let row = sqlx::query(
            r#"
            UPDATE posts
            SET title = $1, content = $2, published = $3
            WHERE id = $4
            RETURNING id, title, content, published, author_id
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.published)
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update post {}: {}", id, e);
            DomainError::DatabaseError(e.to_string())
        })?;

        post_from_row(&row)
    }

    async fn delete(&mut self, id: i64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            DELETE FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            Err(DomainError::PostNotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_by_author(&mut self, author_id: i64) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM posts WHERE author_id = $1")
            .bind(author_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::data::unit_of_work::{Database, PgDatabase};
    use crate::domain::post::CreatePostRequest;
    use crate::domain::user::CreateUserRequest;
    use crate::domain::{DomainError, PostFilter};
    use sqlx::PgPool;

    fn new_post(title: &str, author_id: i64) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            content: None,
            published: true,
            author_id,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn post_for_missing_author_is_rejected(pool: PgPool) {
        let db = PgDatabase::new(pool);

        let mut uow = db.begin().await.unwrap();
        let err = uow.posts().insert(new_post("Orphan", 4242)).await.unwrap_err();

        assert!(matches!(err, DomainError::ValidationError(_)), "{:?}", err);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at a Postgres server"]
    async fn listing_filters_by_author_and_counts_all_matches(pool: PgPool) {
        let db = PgDatabase::new(pool);
        let mut uow = db.begin().await.unwrap();

        let mut authors = Vec::new();
        for email in ["ada@example.com", "grace@example.com"] {
            let user = uow
                .users()
                .insert(CreateUserRequest {
                    email: email.to_string(),
                    name: None,
                })
                .await
                .unwrap();
            authors.push(user.id);
        }
        for title in ["First", "Second", "Third"] {
            uow.posts().insert(new_post(title, authors[0])).await.unwrap();
        }
        uow.posts().insert(new_post("Other", authors[1])).await.unwrap();

        let (page, total) = uow
            .posts()
            .list(PostFilter::by_author(authors[0]), 1, 1)
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Second");

        let (all, total) = uow.posts().list(PostFilter::default(), 0, 10).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(all.len(), 4);

        assert_eq!(uow.posts().count_by_author(authors[1]).await.unwrap(), 1);
    }
}
