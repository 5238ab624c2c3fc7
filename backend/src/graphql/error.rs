//! Mapping of internal errors onto GraphQL errors
//!
//! Every error leaving a resolver carries an extension `code` so clients can
//! tell bad input from upstream failures without parsing messages.

use async_graphql::ErrorExtensions;
use thiserror::Error;

use super::filters::FilterError;
use super::pagination::PaginationError;
use crate::gmp::GmpError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid filter string: {0}")]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Gmp(#[from] GmpError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Filter(_) | ApiError::Pagination(PaginationError::Validation(_)) => {
                "BAD_USER_INPUT"
            }
            ApiError::Pagination(PaginationError::InvalidCursor(_)) => "INVALID_CURSOR",
            ApiError::Gmp(_) => "UPSTREAM_ERROR",
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}
