use crate::data::UnitOfWork;
use crate::domain::user::{CreateUserRequest, UpdateUserRequest, UserDeletePolicy, UserResponse};
use crate::domain::{DomainError, Page, PageRequest};

pub struct UserService {
    delete_policy: UserDeletePolicy,
    max_page_size: i64,
}

impl UserService {
    pub fn new(delete_policy: UserDeletePolicy, max_page_size: i64) -> Self {
        Self {
            delete_policy,
            max_page_size,
        }
    }

    pub async fn create_user(
        &self,
        uow: &mut dyn UnitOfWork,
        req: CreateUserRequest,
    ) -> Result<UserResponse, DomainError> {
        let req = req.normalized();
        req.validate()?;

        let user = uow.users().insert(req).await?;

        tracing::info!("User created: id={}", user.id);

        Ok(UserResponse::from(user))
    }

    pub async fn get_user(
        &self,
        uow: &mut dyn UnitOfWork,
        id: i64,
    ) -> Result<UserResponse, DomainError> {
        let user = uow
            .users()
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound)?;
        Ok(UserResponse::from(user))
    }

    pub async fn get_user_by_email(
        &self,
        uow: &mut dyn UnitOfWork,
        email: &str,
    ) -> Result<UserResponse, DomainError> {
        let user = uow
            .users()
            .find_by_email(email.trim())
            .await?
            .ok_or(DomainError::UserNotFound)?;
        Ok(UserResponse::from(user))
    }

    pub async fn list_users(
        &self,
        uow: &mut dyn UnitOfWork,
        page: PageRequest,
    ) -> Result<Page<UserResponse>, DomainError> {
        page.validate(self.max_page_size)?;

        let (users, count) = uow.users().list(page.skip, page.limit).await?;

        Ok(Page { data: users, count }.map(UserResponse::from))
    }

    pub async fn update_user(
        &self,
        uow: &mut dyn UnitOfWork,
        id: i64,
        req: UpdateUserRequest,
    ) -> Result<UserResponse, DomainError> {
        let req = req.normalized();
        req.validate()?;

        let user = uow.users().update(id, req).await?;

        tracing::info!("User updated: id={}", id);

        Ok(UserResponse::from(user))
    }

    pub async fn delete_user(&self, uow: &mut dyn UnitOfWork, id: i64) -> Result<(), DomainError> {
        uow.users()
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        let owned = uow.posts().count_by_author(id).await?;
        if owned > 0 {
            match self.delete_policy {
                UserDeletePolicy::Reject => {
                    tracing::warn!("Refusing to delete user {} who owns {} posts", id, owned);
                    return Err(DomainError::Conflict(format!(
                        "User {} still owns {} posts",
                        id, owned
                    )));
                }
                UserDeletePolicy::Cascade => {
                    let removed = uow.posts().delete_by_author(id).await?;
                    tracing::info!("Cascade deleted {} posts of user {}", removed, id);
                }
            }
        }

        uow.users().delete(id).await?;

        tracing::info!("User deleted: id={}", id);

        Ok(())
    }
}
