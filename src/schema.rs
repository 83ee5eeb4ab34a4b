//! GraphQL schema for the writing platform's collections
//!
//! Every list field is a connection built by [`find_all`] and accepts the same
//! arguments: `limit`, `filter` (URI-encoded JSON), `filterObject`, `sortBy`,
//! `sortAscending` and `cursor`.

use std::sync::Arc;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Json, Object, OutputType, Request,
    Result, Schema, SimpleObject,
};
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::dataloaders::{DataLoader, RecordDataLoader, RecordLoader};
use crate::pagination::{find_all, Connection, PaginationArgs};
use crate::store::RecordStore;
use crate::types::DateTime;
use crate::value::{lookup, Document, Value, PRIMARY_KEY};

pub type AppSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Collections and settings shared by all resolvers
#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<dyn RecordStore>,
    pub prompts: Arc<dyn RecordStore>,
    pub activities: Arc<dyn RecordStore>,
    pub config: PaginationConfig,
}

impl AppState {
    /// A fresh document loader; its cache lives as long as one request
    pub fn document_loader(&self) -> RecordDataLoader {
        DataLoader::new(RecordLoader::new(self.documents.clone()))
    }

    /// Attach per-request data to a GraphQL request
    pub fn prepare(&self, request: Request) -> Request {
        request.data(self.document_loader())
    }
}

/// Build the schema with its collections injected as context data
pub fn build_schema(state: AppState) -> AppSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(state)
        .finish()
}

fn text(doc: &Document, field: &str) -> Option<String> {
    lookup(doc, field).and_then(Value::as_str).map(str::to_string)
}

fn id(doc: &Document, field: &str) -> Option<Uuid> {
    lookup(doc, field).and_then(Value::as_id)
}

fn timestamp(doc: &Document, field: &str) -> Option<DateTime> {
    lookup(doc, field).and_then(DateTime::from_value)
}

/// A piece of writing
#[derive(SimpleObject, Debug, Clone)]
#[graphql(name = "Document")]
pub struct WritingDocument {
    pub id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
    pub owner_id: Option<Uuid>,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

impl From<Document> for WritingDocument {
    fn from(doc: Document) -> Self {
        Self {
            id: id(&doc, PRIMARY_KEY).unwrap_or_default(),
            title: text(&doc, "title"),
            body: text(&doc, "body"),
            owner_id: id(&doc, "ownerId"),
            created_at: timestamp(&doc, "createdAt"),
            updated_at: timestamp(&doc, "updatedAt"),
        }
    }
}

/// A reusable writing prompt
#[derive(SimpleObject, Debug, Clone)]
pub struct Prompt {
    pub id: Uuid,
    pub name: Option<String>,
    pub template: Option<String>,
    pub owner_id: Option<Uuid>,
    pub created_at: Option<DateTime>,
}

impl From<Document> for Prompt {
    fn from(doc: Document) -> Self {
        Self {
            id: id(&doc, PRIMARY_KEY).unwrap_or_default(),
            name: text(&doc, "name"),
            template: text(&doc, "template"),
            owner_id: id(&doc, "ownerId"),
            created_at: timestamp(&doc, "createdAt"),
        }
    }
}

/// Something a user did in the editor
#[derive(SimpleObject, Debug, Clone)]
pub struct Activity {
    pub id: Uuid,
    pub kind: Option<String>,
    pub client_id: Option<String>,
    pub document_id: Option<Uuid>,
    pub created_at: Option<DateTime>,
}

impl From<Document> for Activity {
    fn from(doc: Document) -> Self {
        Self {
            id: id(&doc, PRIMARY_KEY).unwrap_or_default(),
            kind: text(&doc, "kind"),
            client_id: text(&doc, "activity.clientId"),
            document_id: id(&doc, "documentId"),
            created_at: timestamp(&doc, "createdAt"),
        }
    }
}

async fn connection<T>(
    store: &dyn RecordStore,
    args: PaginationArgs,
    config: &PaginationConfig,
) -> Result<Connection<T>>
where
    T: From<Document> + OutputType,
{
    let connection = find_all(store, args, config).await.map_err(|err| {
        tracing::warn!(collection = store.name(), error = %err, "paginated query failed");
        err.extend()
    })?;
    Ok(connection.map(T::from))
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Paginated documents
    #[allow(clippy::too_many_arguments)]
    async fn documents(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
        filter: Option<String>,
        filter_object: Option<Json<serde_json::Value>>,
        sort_by: Option<String>,
        sort_ascending: Option<bool>,
        cursor: Option<String>,
    ) -> Result<Connection<WritingDocument>> {
        let state = ctx.data::<AppState>()?;
        let args = PaginationArgs {
            limit,
            filter,
            filter_object: filter_object.map(|Json(value)| value),
            sort_by,
            sort_ascending,
            cursor,
        };
        connection(state.documents.as_ref(), args, &state.config).await
    }

    /// Paginated prompts
    #[allow(clippy::too_many_arguments)]
    async fn prompts(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
        filter: Option<String>,
        filter_object: Option<Json<serde_json::Value>>,
        sort_by: Option<String>,
        sort_ascending: Option<bool>,
        cursor: Option<String>,
    ) -> Result<Connection<Prompt>> {
        let state = ctx.data::<AppState>()?;
        let args = PaginationArgs {
            limit,
            filter,
            filter_object: filter_object.map(|Json(value)| value),
            sort_by,
            sort_ascending,
            cursor,
        };
        connection(state.prompts.as_ref(), args, &state.config).await
    }

    /// Paginated activities
    #[allow(clippy::too_many_arguments)]
    async fn activities(
        &self,
        ctx: &Context<'_>,
        limit: Option<i32>,
        filter: Option<String>,
        filter_object: Option<Json<serde_json::Value>>,
        sort_by: Option<String>,
        sort_ascending: Option<bool>,
        cursor: Option<String>,
    ) -> Result<Connection<Activity>> {
        let state = ctx.data::<AppState>()?;
        let args = PaginationArgs {
            limit,
            filter,
            filter_object: filter_object.map(|Json(value)| value),
            sort_by,
            sort_ascending,
            cursor,
        };
        connection(state.activities.as_ref(), args, &state.config).await
    }

    /// A single document by id
    async fn document(&self, ctx: &Context<'_>, id: Uuid) -> Result<Option<WritingDocument>> {
        let loader = ctx.data::<RecordDataLoader>()?;
        let doc = loader.load(id).await.map_err(|err| {
            tracing::error!(%id, error = %err, "document lookup failed");
            crate::GraphQLError::from(err).extend()
        })?;
        Ok(doc.map(WritingDocument::from))
    }
}
