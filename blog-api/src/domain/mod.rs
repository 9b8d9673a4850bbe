pub mod error;
pub mod page;
pub mod patch;
pub mod post;
pub mod user;

pub use error::DomainError;
pub use page::{Page, PageRequest};
pub use post::{Post, PostFilter};
pub use user::User;
