//! # links-graphql
//!
//! GraphQL backend for a links feed with voting.
//!
//! ## Features
//!
//! - **Feed** - Filtered, ordered, skip/take paginated view over links with a total count
//! - **Mutations** - Post, update, delete links and vote on them
//! - **Auth** - Bearer JWT decoding into a per-request identity claim
//! - **Stores** - PostgreSQL (`sqlx`) and in-memory implementations of one store trait
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use links_graphql::{build_schema, router, MemoryStore, TokenKeys};
//!
//! let schema = build_schema(Arc::new(MemoryStore::new()));
//! let app = router(schema, TokenKeys::from_secret(b"GraphQL-is-awesome"));
//! ```

pub mod auth;
pub mod config;
pub mod pagination;
pub mod result_ext;
pub mod schema;
pub mod server;
pub mod store;
pub mod types;

pub use auth::{graphql_handler, AuthClaim, TokenKeys};
pub use config::AppConfig;
pub use pagination::{FeedIdCodec, FeedQuery, OrderField, OrderKey};
pub use schema::{build_schema, AppSchema, MutationRoot, QueryRoot};
pub use server::router;
pub use store::{memory::MemoryStore, postgres::PgStore, seed_users, FeedPage, LinkStore, SeedUser, SharedStore};
pub use types::{DateTime, Feed, Link, LinkOrderByInput, Sort, User, Vote};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// API errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("No {entity} found with id {id}")]
    NotFound { entity: &'static str, id: i32 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Machine-readable code exposed under `extensions.code`
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::InvalidArgument(_) => "BAD_USER_INPUT",
            ApiError::Store(_) => "STORE_ERROR",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Store(err.to_string())
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
