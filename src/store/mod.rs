//! Storage contract for paginated collections
//!
//! The paginator only ever talks to storage through [`Paginate`]. Any backend
//! that can filter, order by `(paginated_field, _id)` and seek past a position
//! token can sit behind it; [`MemoryCollection`] is the in-process one.

mod memory;
pub mod query;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::value::{Document, Value};

pub use memory::MemoryCollection;
pub use query::{Condition, Query};

/// Storage-layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Options for a single page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PaginateOptions {
    /// Normalized predicate
    pub query: Value,
    pub limit: usize,
    /// Primary sort attribute; ties break on `_id`
    pub paginated_field: String,
    pub sort_ascending: bool,
    /// Token to page forward from
    pub next: Option<String>,
    /// Token to page backward from; wins over `next` when both are set
    pub previous: Option<String>,
}

/// One page of results with the tokens needed to fetch its neighbours
#[derive(Debug, Clone)]
pub struct PaginatedResults<T> {
    /// Nodes in sort order, each with its own position token
    pub results: Vec<(String, T)>,
    /// Token of the first result
    pub previous: Option<String>,
    pub has_previous: bool,
    /// Token of the last result
    pub next: Option<String>,
    pub has_next: bool,
}

impl<T> PaginatedResults<T> {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            previous: None,
            has_previous: false,
            next: None,
            has_next: false,
        }
    }
}

/// Cursor pagination over a collection
#[async_trait]
pub trait Paginate: Send + Sync {
    type Node: Send;

    /// Fetch one page
    async fn paginate(
        &self,
        options: PaginateOptions,
    ) -> Result<PaginatedResults<Self::Node>, StoreError>;
}

/// A document collection: paging plus direct lookups by id
#[async_trait]
pub trait RecordStore: Paginate<Node = Document> {
    /// Collection name, for logging
    fn name(&self) -> &str;

    /// Look up live (not soft-deleted) records by id
    async fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Document>, StoreError>;
}
