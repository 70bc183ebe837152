//! Cursor pagination types shared by every paginator backend.
//!
//! A page request carries [`PaginationOptions`]; the paginator resolves it
//! into a [`PageRequest`] for its [`Sorter`], runs the query, and hands back a
//! fresh [`PageToken`] built from the first and last record of the page.
//! Tokens are stateless: everything needed to resume lives in the token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::id::RecordId;

/// Page size used when the caller does not supply one.
pub const DEFAULT_LIMIT: usize = 10;

/// Maximum encoded token length accepted from callers.
pub const MAX_TOKEN_LEN: usize = 1024;

/// Error returned for tokens that cannot be decoded or do not match the sorter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("pagination token too long: {len} bytes (max: {MAX_TOKEN_LEN})")]
    TooLong { len: usize },
    #[error("malformed pagination token: {0}")]
    Malformed(String),
    #[error("pagination token was issued for a different sort order")]
    SorterMismatch,
    #[error("negative {field} in pagination options")]
    Negative { field: &'static str },
}

/// Caller-supplied pagination options, as they arrive on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub backward: Option<bool>,
    pub last_token: Option<String>,
}

/// Sort strategy, fixed per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sorter {
    /// Id descending (newest first).
    ById,
    /// Relevance score descending, tie-broken by id descending.
    ByScore,
}

/// Sort key of a single record under a [`Sorter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "k", rename_all = "snake_case")]
pub enum SortKey {
    Id { id: RecordId },
    Score { score: f64, id: RecordId },
}

impl SortKey {
    /// Id component, present in every key.
    #[must_use]
    pub fn id(&self) -> RecordId {
        match self {
            Self::Id { id } | Self::Score { id, .. } => *id,
        }
    }

    fn matches(&self, sorter: Sorter) -> bool {
        matches!(
            (self, sorter),
            (Self::Id { .. }, Sorter::ById) | (Self::Score { .. }, Sorter::ByScore)
        )
    }
}

/// Direction of a page request relative to the canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Keys of the first and last record of the previous page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageToken {
    pub front: SortKey,
    pub back: SortKey,
}

impl PageToken {
    /// Encodes the token as unpadded base64url JSON.
    #[must_use]
    pub fn encode(&self) -> String {
        // SortKey has no maps with non-string keys, serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a token produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] for oversized, non-base64, or non-JSON input.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::TooLong { len: token.len() });
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
    }
}

/// Normalized page request produced from [`PaginationOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
    pub direction: Direction,
    /// Key to start strictly after, in the direction of travel.
    pub anchor: Option<SortKey>,
}

impl PaginationOptions {
    /// Resolves the options for the given sorter.
    ///
    /// Forward requests anchor on the token's `back` key, backward requests
    /// on its `front` key.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if the token is malformed, was issued for a
    /// different sorter, or limit/offset is negative.
    pub fn resolve(&self, sorter: Sorter) -> Result<PageRequest, TokenError> {
        let limit = match self.limit {
            None => DEFAULT_LIMIT,
            Some(l) => usize::try_from(l).map_err(|_| TokenError::Negative { field: "limit" })?,
        };
        let offset = match self.offset {
            None => 0,
            Some(o) => usize::try_from(o).map_err(|_| TokenError::Negative { field: "offset" })?,
        };
        let direction = if self.backward.unwrap_or(false) {
            Direction::Backward
        } else {
            Direction::Forward
        };

        let anchor = match self.last_token.as_deref() {
            None | Some("") => None,
            Some(raw) => {
                let token = PageToken::decode(raw)?;
                if !token.front.matches(sorter) || !token.back.matches(sorter) {
                    return Err(TokenError::SorterMismatch);
                }
                Some(match direction {
                    Direction::Forward => token.back,
                    Direction::Backward => token.front,
                })
            }
        };

        Ok(PageRequest {
            limit,
            offset,
            direction,
            anchor,
        })
    }
}
