//! Cursor grammar and position tokens
//!
//! A cursor is `prev__<token>`, `next__<token>` or a bare `<token>` (read as
//! "next"). The token itself is an opaque, URL-safe encoding of a sort
//! position: the paginated field's value plus the record's primary key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;
use crate::{GraphQLError, Result};

pub const PREVIOUS_PREFIX: &str = "prev__";
pub const NEXT_PREFIX: &str = "next__";

/// Which side of the token a page is requested from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorDirection {
    /// No cursor: first page
    #[default]
    None,
    Next,
    Previous,
}

/// A cursor split into direction and position token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCursor {
    pub direction: CursorDirection,
    pub token: Option<String>,
}

impl ParsedCursor {
    /// Split into the `(next, previous)` pair expected by the storage layer
    pub fn into_options(self) -> (Option<String>, Option<String>) {
        match self.direction {
            CursorDirection::None => (None, None),
            CursorDirection::Next => (self.token, None),
            CursorDirection::Previous => (None, self.token),
        }
    }
}

/// Parse a cursor string.
///
/// A prefix with nothing after it carries no position and is treated like an
/// absent cursor.
pub fn parse_cursor(cursor: Option<&str>) -> ParsedCursor {
    let Some(cursor) = cursor.filter(|c| !c.is_empty()) else {
        return ParsedCursor::default();
    };

    let (direction, token) = if let Some(token) = cursor.strip_prefix(PREVIOUS_PREFIX) {
        (CursorDirection::Previous, token)
    } else if let Some(token) = cursor.strip_prefix(NEXT_PREFIX) {
        (CursorDirection::Next, token)
    } else {
        (CursorDirection::Next, cursor)
    };

    if token.is_empty() {
        return ParsedCursor::default();
    }

    ParsedCursor {
        direction,
        token: Some(token.to_string()),
    }
}

/// Sort position encoded in a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub value: Value,
    pub id: Uuid,
}

/// Cursor token encoding/decoding
pub struct CursorCodec;

impl CursorCodec {
    /// Encode a sort position as an opaque token
    pub fn encode_position(value: &Value, id: Uuid) -> Result<String> {
        Self::encode_structured(&(value, id))
    }

    /// Decode a token produced by [`CursorCodec::encode_position`]
    pub fn decode_position(token: &str) -> Result<Position> {
        let (value, id): (Value, Uuid) = Self::decode_structured(token)?;
        Ok(Position { value, id })
    }

    /// Encode any serializable value as base64 JSON
    pub fn encode_structured<T: Serialize>(value: &T) -> Result<String> {
        let json = serde_json::to_vec(value)
            .map_err(|e| GraphQLError::InvalidCursor(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Decode base64 JSON into a value
    pub fn decode_structured<T: for<'de> Deserialize<'de>>(token: &str) -> Result<T> {
        let bytes = BASE64
            .decode(token.as_bytes())
            .map_err(|e| GraphQLError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| GraphQLError::InvalidCursor(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_prefixed_cursors() {
        assert_eq!(
            parse_cursor(Some("prev__abc")),
            ParsedCursor {
                direction: CursorDirection::Previous,
                token: Some("abc".into())
            }
        );
        assert_eq!(
            parse_cursor(Some("next__abc")),
            ParsedCursor {
                direction: CursorDirection::Next,
                token: Some("abc".into())
            }
        );
    }

    #[test]
    fn test_bare_token_means_next() {
        assert_eq!(parse_cursor(Some("abc")), parse_cursor(Some("next__abc")));
    }

    #[test]
    fn test_absent_or_empty_cursor_is_first_page() {
        assert_eq!(parse_cursor(None), ParsedCursor::default());
        assert_eq!(parse_cursor(Some("")), ParsedCursor::default());
        assert_eq!(parse_cursor(Some("prev__")), ParsedCursor::default());
    }

    #[test]
    fn test_into_options() {
        assert_eq!(
            parse_cursor(Some("prev__t")).into_options(),
            (None, Some("t".to_string()))
        );
        assert_eq!(parse_cursor(Some("t")).into_options(), (Some("t".to_string()), None));
        assert_eq!(parse_cursor(None).into_options(), (None, None));
    }

    #[test]
    fn test_position_token_is_url_safe() {
        let id = Uuid::new_v4();
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let token = CursorCodec::encode_position(&Value::DateTime(created), id).unwrap();

        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let position = CursorCodec::decode_position(&token).unwrap();
        assert_eq!(position.id, id);
        assert_eq!(position.value, Value::DateTime(created));
    }

    #[test]
    fn test_garbage_token_is_invalid_cursor() {
        let err = CursorCodec::decode_position("not base64!").unwrap_err();
        assert!(matches!(err, GraphQLError::InvalidCursor(_)));

        let not_a_position = CursorCodec::encode_structured(&"hello").unwrap();
        let err = CursorCodec::decode_position(&not_a_position).unwrap_err();
        assert!(matches!(err, GraphQLError::InvalidCursor(_)));
    }
}
