//! In-memory document collection

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cursor::{CursorCodec, Position};
use crate::filter::DELETED_FIELD;
use crate::store::{Paginate, PaginateOptions, PaginatedResults, Query, RecordStore, StoreError};
use crate::value::{lookup, Document, Value, PRIMARY_KEY};

/// A named collection of documents held in process memory.
///
/// Every record carries a `_id`; inserting a document without one assigns a
/// fresh v4 id.
pub struct MemoryCollection {
    name: String,
    records: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a document, returning its id
    pub async fn insert(&self, mut doc: Document) -> Uuid {
        let id = match doc.get(PRIMARY_KEY).and_then(Value::as_id) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                doc.insert(PRIMARY_KEY.to_string(), Value::Id(id));
                id
            }
        };
        self.records.write().await.push(doc);
        id
    }

    /// Store several documents, returning their ids in order
    pub async fn insert_many(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for doc in docs {
            ids.push(self.insert(doc).await);
        }
        ids
    }

    /// Mark a record as deleted. Returns false if no record has this id.
    pub async fn soft_delete(&self, id: Uuid) -> bool {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|doc| record_id(doc) == id) {
            Some(doc) => {
                doc.insert(DELETED_FIELD.to_string(), Value::Bool(true));
                true
            }
            None => false,
        }
    }

    /// Fetch a live record by id
    pub async fn find_by_id(&self, id: Uuid) -> Option<Document> {
        self.records
            .read()
            .await
            .iter()
            .find(|doc| record_id(doc) == id && !is_deleted(doc))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn record_id(doc: &Document) -> Uuid {
    doc.get(PRIMARY_KEY)
        .and_then(Value::as_id)
        .unwrap_or_else(Uuid::nil)
}

fn is_deleted(doc: &Document) -> bool {
    matches!(doc.get(DELETED_FIELD), Some(Value::Bool(true)))
}

/// Composite `(paginated_field, _id)` ordering in the requested direction
struct SortOrder<'a> {
    field: &'a str,
    ascending: bool,
}

impl SortOrder<'_> {
    fn position(&self, doc: &Document) -> Position {
        Position {
            value: lookup(doc, self.field).cloned().unwrap_or(Value::Null),
            id: record_id(doc),
        }
    }

    fn compare(&self, a: &Position, b: &Position) -> Ordering {
        let ord = a.value.cmp_order(&b.value).then_with(|| a.id.cmp(&b.id));
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

#[async_trait]
impl Paginate for MemoryCollection {
    type Node = Document;

    async fn paginate(
        &self,
        options: PaginateOptions,
    ) -> Result<PaginatedResults<Document>, StoreError> {
        let query = Query::compile(&options.query)?;
        let decode = |token: &str| {
            CursorCodec::decode_position(token).map_err(|e| StoreError::InvalidCursor(e.to_string()))
        };
        let backward = options.previous.as_deref().map(decode).transpose()?;
        let forward = match backward {
            Some(_) => None,
            None => options.next.as_deref().map(decode).transpose()?,
        };

        let order = SortOrder {
            field: &options.paginated_field,
            ascending: options.sort_ascending,
        };

        let records = self.records.read().await;
        let mut matched: Vec<(Position, &Document)> = records
            .iter()
            .filter(|doc| query.matches(doc))
            .map(|doc| (order.position(doc), doc))
            .collect();
        matched.sort_by(|(a, _), (b, _)| order.compare(a, b));

        let total = matched.len();
        let (start, end) = match (&forward, &backward) {
            (Some(after), _) => {
                let start = matched.partition_point(|(pos, _)| order.compare(pos, after).is_le());
                (start, (start + options.limit).min(total))
            }
            (None, Some(before)) => {
                let end = matched.partition_point(|(pos, _)| order.compare(pos, before).is_lt());
                (end.saturating_sub(options.limit), end)
            }
            (None, None) => (0, options.limit.min(total)),
        };

        let results = matched[start..end]
            .iter()
            .map(|(pos, doc)| {
                let token = CursorCodec::encode_position(&pos.value, pos.id)
                    .map_err(|e| StoreError::InvalidCursor(e.to_string()))?;
                Ok((token, (*doc).clone()))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        tracing::debug!(
            collection = %self.name,
            matched = total,
            start,
            end,
            "fetched page"
        );

        Ok(PaginatedResults {
            previous: results.first().map(|(token, _)| token.clone()),
            next: results.last().map(|(token, _)| token.clone()),
            has_previous: start > 0,
            has_next: end < total,
            results,
        })
    }
}

#[async_trait]
impl RecordStore for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_many_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Document>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|doc| !is_deleted(doc))
            .map(|doc| (record_id(doc), doc))
            .filter(|(id, _)| ids.contains(id))
            .map(|(id, doc)| (id, doc.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::setup_filter;

    fn record(title: &str, words: i64) -> Document {
        Document::from([
            ("title".to_string(), Value::from(title)),
            ("words".to_string(), Value::Int(words)),
        ])
    }

    fn options(limit: usize, ascending: bool) -> PaginateOptions {
        PaginateOptions {
            query: setup_filter(None).unwrap(),
            limit,
            paginated_field: "words".into(),
            sort_ascending: ascending,
            next: None,
            previous: None,
        }
    }

    fn scored(title: &str, score: Value) -> Document {
        Document::from([
            ("title".to_string(), Value::from(title)),
            ("score".to_string(), score),
        ])
    }

    fn by_score(limit: usize, next: Option<String>) -> PaginateOptions {
        PaginateOptions {
            paginated_field: "score".into(),
            next,
            ..options(limit, true)
        }
    }

    fn titles(page: &PaginatedResults<Document>) -> Vec<String> {
        page.results
            .iter()
            .filter_map(|(_, doc)| doc.get("title").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    async fn seeded() -> MemoryCollection {
        let collection = MemoryCollection::new("documents");
        collection
            .insert_many([
                record("a", 10),
                record("b", 20),
                record("c", 30),
                record("d", 40),
                record("e", 50),
            ])
            .await;
        collection
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let collection = MemoryCollection::new("documents");
        let id = collection.insert(record("a", 1)).await;
        let doc = collection.find_by_id(id).await.unwrap();
        assert_eq!(doc.get(PRIMARY_KEY), Some(&Value::Id(id)));
        assert_eq!(collection.len().await, 1);
    }

    #[tokio::test]
    async fn test_first_page_and_forward_paging() {
        let collection = seeded().await;

        let first = collection.paginate(options(2, true)).await.unwrap();
        assert_eq!(titles(&first), ["a", "b"]);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let second = collection
            .paginate(PaginateOptions {
                next: first.next.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        assert_eq!(titles(&second), ["c", "d"]);
        assert!(second.has_next);
        assert!(second.has_previous);

        let last = collection
            .paginate(PaginateOptions {
                next: second.next.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        assert_eq!(titles(&last), ["e"]);
        assert!(!last.has_next);
    }

    #[tokio::test]
    async fn test_backward_paging_returns_forward_order() {
        let collection = seeded().await;
        let first = collection.paginate(options(2, false)).await.unwrap();
        assert_eq!(titles(&first), ["e", "d"]);

        let second = collection
            .paginate(PaginateOptions {
                next: first.next.clone(),
                ..options(2, false)
            })
            .await
            .unwrap();
        assert_eq!(titles(&second), ["c", "b"]);

        let back = collection
            .paginate(PaginateOptions {
                previous: second.previous.clone(),
                ..options(2, false)
            })
            .await
            .unwrap();
        assert_eq!(titles(&back), ["e", "d"]);
        assert!(!back.has_previous);
        assert!(back.has_next);
    }

    #[tokio::test]
    async fn test_ties_break_on_id() {
        let collection = MemoryCollection::new("documents");
        collection
            .insert_many((0..5).map(|i| record(&i.to_string(), 7)))
            .await;

        let mut seen = Vec::new();
        let mut next = None;
        loop {
            let page = collection
                .paginate(PaginateOptions {
                    next: next.clone(),
                    ..options(2, true)
                })
                .await
                .unwrap();
            seen.extend(titles(&page));
            if !page.has_next {
                break;
            }
            next = page.next;
        }

        seen.sort();
        assert_eq!(seen, ["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_backward_paging_inside_equal_sort_values() {
        let collection = MemoryCollection::new("documents");
        collection
            .insert_many((0..5).map(|i| record(&i.to_string(), 7)))
            .await;
        let ids = |page: &PaginatedResults<Document>| -> Vec<Uuid> {
            page.results.iter().map(|(_, doc)| record_id(doc)).collect()
        };

        let first = collection.paginate(options(2, true)).await.unwrap();
        let second = collection
            .paginate(PaginateOptions {
                next: first.next.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        let third = collection
            .paginate(PaginateOptions {
                next: second.next.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        assert_eq!(third.results.len(), 1);

        let back = collection
            .paginate(PaginateOptions {
                previous: second.previous.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        assert_eq!(ids(&back), ids(&first));
        assert!(!back.has_previous);

        let back = collection
            .paginate(PaginateOptions {
                previous: third.previous.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        assert_eq!(ids(&back), ids(&second));
        assert!(back.has_previous);
        assert!(back.has_next);
    }

    #[tokio::test]
    async fn test_adjacent_float_values_page_exactly() {
        let f: f64 = 0.10001604780272777;
        let collection = MemoryCollection::new("documents");
        collection
            .insert_many([
                scored("a", Value::Float(f64::from_bits(f.to_bits() - 1))),
                scored("b", Value::Float(f)),
                scored("c", Value::Float(f64::from_bits(f.to_bits() + 1))),
            ])
            .await;

        let first = collection.paginate(by_score(2, None)).await.unwrap();
        assert_eq!(titles(&first), ["a", "b"]);

        let second = collection.paginate(by_score(2, first.next.clone())).await.unwrap();
        assert_eq!(titles(&second), ["c"]);
        assert!(!second.has_next);
    }

    #[tokio::test]
    async fn test_large_ints_and_floats_share_a_sort_field() {
        let two_53: i64 = 1 << 53;
        let collection = MemoryCollection::new("documents");
        collection
            .insert_many((0..40).map(|i| {
                let score = match i % 3 {
                    0 => Value::Int(two_53),
                    1 => Value::Int(two_53 + 1),
                    _ => Value::Float(two_53 as f64),
                };
                scored(&i.to_string(), score)
            }))
            .await;

        let mut seen = Vec::new();
        let mut next = None;
        for _ in 0..40 {
            let page = collection.paginate(by_score(3, next.clone())).await.unwrap();
            seen.extend(titles(&page));
            if !page.has_next {
                break;
            }
            next = page.next;
        }

        assert_eq!(seen.len(), 40);
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 40);
    }

    #[tokio::test]
    async fn test_cursor_is_a_position_not_an_identity() {
        let collection = seeded().await;
        let first = collection.paginate(options(2, true)).await.unwrap();
        let (_, b) = &first.results[1];
        collection.soft_delete(record_id(b)).await;

        let second = collection
            .paginate(PaginateOptions {
                next: first.next.clone(),
                ..options(2, true)
            })
            .await
            .unwrap();
        assert_eq!(titles(&second), ["c", "d"]);
    }

    #[tokio::test]
    async fn test_soft_deleted_records_are_hidden() {
        let collection = seeded().await;
        let page = collection.paginate(options(10, true)).await.unwrap();
        let (_, a) = &page.results[0];
        let id = record_id(a);

        assert!(collection.soft_delete(id).await);
        assert!(collection.find_by_id(id).await.is_none());
        assert!(collection.find_many_by_ids(&[id]).await.unwrap().is_empty());

        let page = collection.paginate(options(10, true)).await.unwrap();
        assert_eq!(titles(&page), ["b", "c", "d", "e"]);
        assert!(!collection.soft_delete(Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_bad_token_is_invalid_cursor() {
        let collection = seeded().await;
        let result = collection
            .paginate(PaginateOptions {
                next: Some("%%%".into()),
                ..options(2, true)
            })
            .await;
        assert!(matches!(result, Err(StoreError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_empty_page_past_the_end() {
        let collection = seeded().await;
        let all = collection.paginate(options(5, true)).await.unwrap();
        let page = collection
            .paginate(PaginateOptions {
                next: all.next.clone(),
                ..options(5, true)
            })
            .await
            .unwrap();
        assert!(page.results.is_empty());
        assert!(page.has_previous);
        assert!(!page.has_next);
        assert!(page.next.is_none());
    }
}
