//! GraphQL API over the Greenbone Management Protocol
//!
//! This is the single API surface of the service. Entity queries and
//! mutations are generated from one table in `entities.rs` and resolve
//! through the generic functions in `operations.rs`; session handling lives
//! in `queries/` and `mutations/`. `schema.rs` merges them with
//! `#[derive(MergedObject)]`.

pub mod auth;
mod entities;
pub mod error;
pub mod filters;
pub mod mutations;
pub mod operations;
pub mod pagination;
pub mod queries;
mod schema;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthUser, JwtSecret, verify_token};
pub use schema::{SeleneSchema, build_schema};
