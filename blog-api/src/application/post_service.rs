use crate::data::UnitOfWork;
use crate::domain::post::{CreatePostRequest, PostResponse, UpdatePostRequest};
use crate::domain::{DomainError, Page, PageRequest, PostFilter};

pub struct PostService {
    max_page_size: i64,
}

impl PostService {
    pub fn new(max_page_size: i64) -> Self {
        Self { max_page_size }
    }

    pub async fn create_post(
        &self,
        uow: &mut dyn UnitOfWork,
        req: CreatePostRequest,
    ) -> Result<PostResponse, DomainError> {
        req.validate()?;

        // The author reference is checked by the store's foreign key
        let author_id = req.author_id;
        let post = uow.posts().insert(req).await?;

        tracing::info!("Post created: id={}, author_id={}", post.id, author_id);

        Ok(PostResponse::from(post))
    }

    pub async fn get_post(
        &self,
        uow: &mut dyn UnitOfWork,
        id: i64,
    ) -> Result<PostResponse, DomainError> {
        let post = uow
            .posts()
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound)?;
        Ok(PostResponse::from(post))
    }

    /// Lists one author's posts. An author that does not exist is reported as
    /// `UserNotFound`; an existing author without posts yields an empty page.
    pub async fn list_posts(
        &self,
        uow: &mut dyn UnitOfWork,
        author_id: i64,
        page: PageRequest,
    ) -> Result<Page<PostResponse>, DomainError> {
        page.validate(self.max_page_size)?;

        uow.users()
            .find_by_id(author_id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        let (posts, count) = uow
            .posts()
            .list(PostFilter::by_author(author_id), page.skip, page.limit)
            .await?;

        Ok(Page { data: posts, count }.map(PostResponse::from))
    }

    pub async fn update_post(
        &self,
        uow: &mut dyn UnitOfWork,
        id: i64,
        req: UpdatePostRequest,
    ) -> Result<PostResponse, DomainError> {
        req.validate()?;

        let post = uow.posts().update(id, req).await?;

        tracing::info!("Post updated: id={}", id);

        Ok(PostResponse::from(post))
    }

    pub async fn delete_post(&self, uow: &mut dyn UnitOfWork, id: i64) -> Result<(), DomainError> {
        uow.posts()
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound)?;

        uow.posts().delete(id).await?;

        tracing::info!("Post deleted: id={}", id);

        Ok(())
    }
}
