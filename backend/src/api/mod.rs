//! API route definitions
//!
//! The primary API is GraphQL at /graphql. Only health checks are plain REST.

pub mod health;
