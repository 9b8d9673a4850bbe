//! In-memory store used by the test suite.
//!
//! Each unit-of-work works on a private copy of the state and publishes it
//! on commit, so a rolled-back or dropped unit-of-work leaves no trace. The
//! unique-email and author foreign-key constraints of the schema are enforced
//! the same way Postgres enforces them.

use crate::data::post_repository::PostRepository;
use crate::data::unit_of_work::{Database, UnitOfWork};
use crate::data::user_repository::UserRepository;
use crate::domain::post::{CreatePostRequest, UpdatePostRequest};
use crate::domain::user::{CreateUserRequest, UpdateUserRequest};
use crate::domain::{DomainError, Post, PostFilter, User};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
struct State {
    users: Vec<User>,
    posts: Vec<Post>,
    last_user_id: i64,
    last_post_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
    unavailable: bool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails, for exercising degraded paths.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.lock().unwrap().posts.clone()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable {
            return Err(DomainError::DatabaseError(
                "connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        self.check_available()?;
        let working = self.state.lock().unwrap().clone();
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.state),
            working,
        }))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.check_available()
    }
}

pub struct MemoryUnitOfWork {
    shared: Arc<Mutex<State>>,
    working: State,
}

fn window<T: Clone>(items: Vec<&T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }

    fn posts(&mut self) -> &mut dyn PostRepository {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let this = *self;
        *this.shared.lock().unwrap() = this.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryUnitOfWork {
    async fn insert(&mut self, req: CreateUserRequest) -> Result<User, DomainError> {
        if self.working.users.iter().any(|u| u.email == req.email) {
            return Err(DomainError::Conflict(format!(
                "User with email {} already exists",
                req.email
            )));
        }
        self.working.last_user_id += 1;
        let user = User {
            id: self.working.last_user_id,
            email: req.email,
            name: req.name,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<User>, DomainError> {
        Ok(self.working.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError> {
        Ok(self.working.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&mut self, offset: i64, limit: i64) -> Result<(Vec<User>, i64), DomainError> {
        let all: Vec<&User> = self.working.users.iter().collect();
        let total = all.len() as i64;
        Ok((window(all, offset, limit), total))
    }

    async fn update(&mut self, id: i64, patch: UpdateUserRequest) -> Result<User, DomainError> {
        if let Some(email) = patch.email.as_present() {
            if self
                .working
                .users
                .iter()
                .any(|u| u.id != id && &u.email == email)
            {
                return Err(DomainError::Conflict(format!(
                    "User with email {} already exists",
                    email
                )));
            }
        }
        let user = self
            .working
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(DomainError::UserNotFound)?;
        user.apply(patch);
        Ok(user.clone())
    }

    async fn delete(&mut self, id: i64) -> Result<(), DomainError> {
        if self.working.posts.iter().any(|p| p.author_id == id) {
            return Err(DomainError::Conflict(format!(
                "User {} still owns posts",
                id
            )));
        }
        let before = self.working.users.len();
        self.working.users.retain(|u| u.id != id);
        if self.working.users.len() == before {
            Err(DomainError::UserNotFound)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PostRepository for MemoryUnitOfWork {
    async fn insert(&mut self, req: CreatePostRequest) -> Result<Post, DomainError> {
        if !self.working.users.iter().any(|u| u.id == req.author_id) {
            return Err(DomainError::ValidationError(format!(
                "Author {} does not exist",
                req.author_id
            )));
        }
        self.working.last_post_id += 1;
        let post = Post {
            id: self.working.last_post_id,
            title: req.title,
            content: req.content,
            published: req.published,
            author_id: req.author_id,
        };
        self.working.posts.push(post.clone());
        Ok(post)
    }

    async fn find_by_id(&mut self, id: i64) -> Result<Option<Post>, DomainError> {
        Ok(self.working.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn list(
        &mut self,
        filter: PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Post>, i64), DomainError> {
        let matching: Vec<&Post> = self
            .working
            .posts
            .iter()
            .filter(|p| filter.author_id.map_or(true, |id| p.author_id == id))
            .collect();
        let total = matching.len() as i64;
        Ok((window(matching, offset, limit), total))
    }

    async fn count_by_author(&mut self, author_id: i64) -> Result<i64, DomainError> {
        Ok(self
            .working
            .posts
            .iter()
            .filter(|p| p.author_id == author_id)
            .count() as i64)
    }

    async fn update(&mut self, id: i64, patch: UpdatePostRequest) -> Result<Post, DomainError> {
        let post = self
            .working
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(DomainError::PostNotFound)?;
        post.apply(patch);
        Ok(post.clone())
    }

    async fn delete(&mut self, id: i64) -> Result<(), DomainError> {
        let before = self.working.posts.len();
        self.working.posts.retain(|p| p.id != id);
        if self.working.posts.len() == before {
            Err(DomainError::PostNotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_by_author(&mut self, author_id: i64) -> Result<u64, DomainError> {
        let before = self.working.posts.len();
        self.working.posts.retain(|p| p.author_id != author_id);
        Ok((before - self.working.posts.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::unit_of_work::complete;

    fn new_user(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn dropped_unit_of_work_publishes_nothing() {
        let db = MemoryDatabase::new();
        {
            let mut uow = db.begin().await.unwrap();
            uow.users().insert(new_user("a@b.com")).await.unwrap();
        }
        assert!(db.users().is_empty());
    }

    #[tokio::test]
    async fn failed_outcome_rolls_back() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();
        uow.users().insert(new_user("a@b.com")).await.unwrap();

        let result: Result<(), DomainError> = complete(uow, Err(DomainError::PostNotFound)).await;

        assert!(matches!(result, Err(DomainError::PostNotFound)));
        assert!(db.users().is_empty());
    }

    #[tokio::test]
    async fn successful_outcome_commits() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();
        let user = uow.users().insert(new_user("a@b.com")).await.unwrap();

        let result = complete(uow, Ok(user.id)).await.unwrap();

        assert_eq!(result, 1);
        assert_eq!(db.users().len(), 1);
    }

    #[tokio::test]
    async fn default_filter_lists_every_author() {
        let db = MemoryDatabase::new();
        let mut uow = db.begin().await.unwrap();
        let ada = uow.users().insert(new_user("ada@b.com")).await.unwrap();
        let grace = uow.users().insert(new_user("grace@b.com")).await.unwrap();
        for author_id in [ada.id, grace.id, ada.id] {
            uow.posts()
                .insert(CreatePostRequest {
                    title: "Post".to_string(),
                    content: None,
                    published: true,
                    author_id,
                })
                .await
                .unwrap();
        }

        let (all, total) = uow.posts().list(PostFilter::default(), 0, 10).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);

        let (own, total) = uow
            .posts()
            .list(PostFilter::by_author(grace.id), 0, 10)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(own[0].author_id, grace.id);
    }
}
