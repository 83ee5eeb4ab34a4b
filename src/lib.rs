//! # quill-graphql
//!
//! GraphQL API layer for the Quill writing platform.
//!
//! ## Features
//!
//! - **Cursor Pagination** - Relay-style connections over filtered, sorted collections
//! - **Filter Normalization** - JSON filters with id coercion and soft-delete exclusion
//! - **Document Store** - In-memory document collections implementing the paging contract
//! - **DataLoader** - Batch loading for single-record lookups
//! - **Schema & Handler** - Paginated query fields and an axum GraphQL endpoint
//!
//! ## Usage
//!
//! ```rust,no_run
//! use quill_graphql::{find_all, MemoryCollection, PaginationArgs, PaginationConfig};
//!
//! # async fn example() -> quill_graphql::Result<()> {
//! let documents = MemoryCollection::new("documents");
//! let args = PaginationArgs {
//!     sort_by: Some("createdAt".into()),
//!     limit: Some(10),
//!     ..Default::default()
//! };
//! let connection = find_all(&documents, args, &PaginationConfig::default()).await?;
//! println!("next page: {:?}", connection.page_info.end_cursor);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod dataloaders;
pub mod filter;
pub mod handler;
pub mod pagination;
pub mod schema;
pub mod store;
pub mod types;
pub mod value;

pub use config::PaginationConfig;
pub use cursor::{parse_cursor, CursorCodec, CursorDirection, ParsedCursor};
pub use dataloaders::{BatchLoader, DataLoader, RecordLoader};
pub use filter::{setup_filter, FilterInput};
pub use handler::{graphql_handler, router};
pub use pagination::{find_all, make_connection, Connection, Edge, PageInfo, PaginationArgs};
pub use schema::{build_schema, AppSchema, AppState};
pub use store::{MemoryCollection, Paginate, PaginateOptions, PaginatedResults, RecordStore, StoreError};
pub use types::DateTime;
pub use value::{Document, Value, PRIMARY_KEY};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// GraphQL errors
#[derive(Error, Debug)]
pub enum GraphQLError {
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GraphQLError {
    /// Extension code reported to GraphQL clients
    pub fn code(&self) -> &'static str {
        match self {
            GraphQLError::InvalidCursor(_)
            | GraphQLError::InvalidFilter(_)
            | GraphQLError::InvalidLimit(_) => "BAD_REQUEST",
            GraphQLError::Storage(_) => "DATABASE_ERROR",
            GraphQLError::Config(_) => "INTERNAL_ERROR",
        }
    }
}

impl ErrorExtensions for GraphQLError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

impl From<StoreError> for GraphQLError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidCursor(msg) => GraphQLError::InvalidCursor(msg),
            StoreError::InvalidQuery(msg) => GraphQLError::InvalidFilter(msg),
            StoreError::Unavailable(msg) => GraphQLError::Storage(msg),
        }
    }
}

impl From<figment::Error> for GraphQLError {
    fn from(err: figment::Error) -> Self {
        GraphQLError::Config(err.to_string())
    }
}

/// Result type for GraphQL operations
pub type Result<T> = std::result::Result<T, GraphQLError>;
