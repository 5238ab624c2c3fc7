//! GraphQL schema definition with queries and mutations
//!
//! All operations require authentication except `login`.

use std::sync::Arc;

use async_graphql::extensions::Tracing;
use async_graphql::{EmptySubscription, MergedObject, Schema};

use super::auth::JwtSecret;
use super::entities::{EntityMutations, EntityQueries};
use super::mutations::AuthMutations;
use super::queries::SessionQueries;
use crate::gmp::Connector;
use crate::services::SessionStore;

#[derive(MergedObject, Default)]
pub struct QueryRoot(EntityQueries, SessionQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(EntityMutations, AuthMutations);

/// The GraphQL schema type
pub type SeleneSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the GraphQL schema with all resolvers
pub fn build_schema(
    connector: Arc<dyn Connector>,
    sessions: Arc<SessionStore>,
    secret: JwtSecret,
) -> SeleneSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(connector)
        .data(sessions)
        .data(secret)
        .extension(Tracing)
        .finish()
}
