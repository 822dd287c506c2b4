use async_graphql::{EmptySubscription, MergedObject, Schema};

use crate::api::catalog::resolvers::{CatalogMutation, CatalogQuery};
use crate::api::user::resolvers::{UserMutation, UserQuery};
use crate::state::AppState;

#[derive(MergedObject, Default)]
pub struct QueryRoot(UserQuery, CatalogQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(UserMutation, CatalogMutation);

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Create the GraphQL schema
pub fn create_schema(state: AppState) -> AppSchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .data(state)
        .finish()
}
