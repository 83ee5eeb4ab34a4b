//! Relay-style cursor pagination
//!
//! [`find_all`] is the single entry point every paginated field goes through:
//! it normalizes the filter, parses the cursor, resolves the page size and
//! hands the request to the collection's [`Paginate`] implementation.

use std::borrow::Cow;

use async_graphql::{Object, OutputType, SimpleObject, TypeName};

use crate::config::PaginationConfig;
use crate::cursor::{parse_cursor, NEXT_PREFIX, PREVIOUS_PREFIX};
use crate::filter::{setup_filter, FilterInput};
use crate::store::{Paginate, PaginateOptions, PaginatedResults};
use crate::value::PRIMARY_KEY;
use crate::{GraphQLError, Result};

/// Page information
#[derive(SimpleObject, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Edge in a connection
#[derive(Debug, Clone)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

impl<T: OutputType> TypeName for Edge<T> {
    fn type_name() -> Cow<'static, str> {
        format!("{}Edge", T::type_name()).into()
    }
}

#[Object(name_type)]
impl<T: OutputType> Edge<T> {
    async fn cursor(&self) -> &str {
        &self.cursor
    }

    async fn node(&self) -> &T {
        &self.node
    }
}

/// Connection (paginated result)
#[derive(Debug, Clone)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T: OutputType> TypeName for Connection<T> {
    fn type_name() -> Cow<'static, str> {
        format!("{}Connection", T::type_name()).into()
    }
}

#[Object(name_type)]
impl<T: OutputType> Connection<T> {
    async fn edges(&self) -> &[Edge<T>] {
        &self.edges
    }

    async fn page_info(&self) -> &PageInfo {
        &self.page_info
    }
}

impl<T> Connection<T> {
    /// Create empty connection
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Convert every node, keeping cursors and page info
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            edges: self
                .edges
                .into_iter()
                .map(|edge| Edge {
                    cursor: edge.cursor,
                    node: f(edge.node),
                })
                .collect(),
            page_info: self.page_info,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }
}

/// Build a connection from one page of storage results.
///
/// Edges carry bare position tokens. The start cursor points before the first
/// node and the end cursor after the last one.
pub fn make_connection<T>(page: PaginatedResults<T>) -> Connection<T> {
    if page.results.is_empty() {
        return Connection {
            edges: Vec::new(),
            page_info: PageInfo {
                has_next_page: page.has_next,
                has_previous_page: page.has_previous,
                ..PageInfo::default()
            },
        };
    }

    Connection {
        edges: page
            .results
            .into_iter()
            .map(|(cursor, node)| Edge { cursor, node })
            .collect(),
        page_info: PageInfo {
            has_next_page: page.has_next,
            has_previous_page: page.has_previous,
            start_cursor: page.previous.map(|token| format!("{PREVIOUS_PREFIX}{token}")),
            end_cursor: page.next.map(|token| format!("{NEXT_PREFIX}{token}")),
        },
    }
}

/// Arguments accepted by every paginated field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginationArgs {
    pub limit: Option<i32>,
    /// URI-encoded JSON filter
    pub filter: Option<String>,
    /// Structured filter; takes precedence over `filter`
    pub filter_object: Option<serde_json::Value>,
    /// Defaults to the primary key
    pub sort_by: Option<String>,
    /// Defaults to descending
    pub sort_ascending: Option<bool>,
    pub cursor: Option<String>,
}

impl PaginationArgs {
    /// Resolve the page size.
    ///
    /// An absent limit uses the configured default. Zero, negative and
    /// over-maximum limits are rejected rather than clamped.
    pub fn resolve_limit(&self, config: &PaginationConfig) -> Result<usize> {
        let Some(limit) = self.limit else {
            return Ok(config.default_limit);
        };
        match usize::try_from(limit) {
            Ok(limit) if limit > 0 && limit <= config.max_limit => Ok(limit),
            Ok(limit) if limit > config.max_limit => Err(GraphQLError::InvalidLimit(format!(
                "limit {limit} exceeds maximum of {}",
                config.max_limit
            ))),
            _ => Err(GraphQLError::InvalidLimit(format!(
                "limit must be positive, got {limit}"
            ))),
        }
    }

    fn filter_input(&mut self) -> Option<FilterInput> {
        let filter = self.filter.take();
        self.filter_object
            .take()
            .map(FilterInput::Object)
            .or_else(|| filter.map(FilterInput::Encoded))
    }
}

/// Fetch one page from a collection as a connection
pub async fn find_all<S>(
    store: &S,
    mut args: PaginationArgs,
    config: &PaginationConfig,
) -> Result<Connection<S::Node>>
where
    S: Paginate + ?Sized,
{
    let limit = args.resolve_limit(config)?;
    let query = setup_filter(args.filter_input())?;
    let (next, previous) = parse_cursor(args.cursor.as_deref()).into_options();
    let paginated_field = args
        .sort_by
        .take()
        .filter(|field| !field.is_empty())
        .unwrap_or_else(|| PRIMARY_KEY.to_string());

    let options = PaginateOptions {
        query,
        limit,
        paginated_field,
        sort_ascending: args.sort_ascending.unwrap_or(false),
        next,
        previous,
    };
    tracing::debug!(
        limit,
        filter = %options.query.to_json(),
        sort_by = %options.paginated_field,
        ascending = options.sort_ascending,
        forward = options.next.is_some(),
        backward = options.previous.is_some(),
        "paginating"
    );

    let page = store.paginate(options).await.map_err(|err| {
        tracing::error!(error = %err, "page fetch failed");
        GraphQLError::from(err)
    })?;

    Ok(make_connection(page))
}
