use serde::Serialize;

use super::error::DomainError;

pub const DEFAULT_SKIP: i64 = 0;
pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(DEFAULT_SKIP),
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn validate(&self, max_limit: i64) -> Result<(), DomainError> {
        if !(1..=max_limit).contains(&self.limit) {
            return Err(DomainError::ValidationError(format!(
                "Limit must be between 1 and {}",
                max_limit
            )));
        }
        if self.skip < 0 {
            return Err(DomainError::ValidationError(
                "Skip cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// One window of a listing plus the number of rows matching overall.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            count: self.count,
        }
    }
}
