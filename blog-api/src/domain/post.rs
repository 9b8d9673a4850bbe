use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::patch::Patch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub published: bool,
    pub author_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub author_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub content: Patch<Option<String>>,
    #[serde(default)]
    pub published: Patch<bool>,
}

/// Selection for post listings. Unset fields do not constrain the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub author_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub published: bool,
    pub author_id: i64,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
            published: post.published,
            author_id: post.author_id,
        }
    }
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    Ok(())
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_title(&self.title)
    }
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        match self.title.as_present() {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }
}

impl PostFilter {
    pub fn by_author(author_id: i64) -> Self {
        Self {
            author_id: Some(author_id),
        }
    }
}

impl Post {
    pub fn apply(&mut self, patch: UpdatePostRequest) {
        patch.title.apply_to(&mut self.title);
        patch.content.apply_to(&mut self.content);
        patch.published.apply_to(&mut self.published);
    }
}
