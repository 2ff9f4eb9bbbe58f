//! HTTP routes

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::EmptySubscription;
use axum::{response::Html, routing::get, Extension, Router};

use crate::auth::{graphql_handler, TokenKeys};
use crate::schema::{AppSchema, MutationRoot, QueryRoot};

/// `POST /graphql`, playground on `GET /graphql`, and `GET /health`
pub fn router(schema: AppSchema, keys: TokenKeys) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/graphql",
            get(playground).post(graphql_handler::<QueryRoot, MutationRoot, EmptySubscription>),
        )
        .layer(Extension(schema))
        .layer(Extension(keys))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn playground() -> Html<String> {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}
