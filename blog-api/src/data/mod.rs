#[cfg(test)]
pub mod memory;
pub mod post_repository;
pub mod unit_of_work;
pub mod user_repository;

pub use unit_of_work::{complete, Database, PgDatabase, UnitOfWork};
