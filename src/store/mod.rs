//! Content-store collaborators.
//!
//! The list controller and the mutation coordinator only ever talk to the
//! store through [`ContentQueryClient`] and [`ContentMutationClient`]. Wire
//! payloads are decoded into the tagged [`QueryOutcome`] and
//! [`MutationOutcome`] types at this boundary, so callers never have to probe
//! for optional fields.

pub mod http;
pub mod memory;

use crate::core::{
    Comment, ContentKind, Cursor, FeedError, ItemId, LikeState, Page, Result, Session, SortOrder,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

pub use http::HttpContentClient;
pub use memory::InMemoryContentStore;

/// What to fetch: one page of one content kind under one search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub kind: ContentKind,
    pub term: String,
    pub cursor: Option<Cursor>,
    pub sort: SortOrder,
    pub limit: usize,
    /// Restricts comment queries to a single post
    pub scope: Option<ItemId>,
}

impl QueryDescriptor {
    pub fn first_page(kind: ContentKind, limit: usize) -> Self {
        Self {
            kind,
            term: String::new(),
            cursor: None,
            sort: SortOrder::default(),
            limit,
            scope: None,
        }
    }

    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn scope(mut self, scope: ItemId) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Tagged page response as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutcome<T> {
    Ok {
        items: Vec<T>,
        next_cursor: Option<Cursor>,
    },
    Error {
        reason: String,
    },
}

impl<T> QueryOutcome<T> {
    pub fn into_result(self) -> Result<Page<T>> {
        match self {
            QueryOutcome::Ok { items, next_cursor } => Ok(Page::new(items, next_cursor)),
            QueryOutcome::Error { reason } => Err(FeedError::Store(reason)),
        }
    }
}

impl<T> From<Result<Page<T>>> for QueryOutcome<T> {
    fn from(result: Result<Page<T>>) -> Self {
        match result {
            Ok(page) => QueryOutcome::Ok {
                items: page.items,
                next_cursor: page.next_cursor,
            },
            Err(err) => QueryOutcome::Error {
                reason: err.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait ContentQueryClient<T>: Send + Sync {
    async fn query(&self, descriptor: QueryDescriptor) -> Result<Page<T>>;
}

/// Create, patch or delete a record in the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationDescriptor {
    ToggleLike {
        target: ItemId,
    },
    CreateComment {
        post_id: ItemId,
        #[serde(default)]
        parent_id: Option<ItemId>,
        body: String,
    },
    DeleteComment {
        comment_id: ItemId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationRecord {
    Like {
        target: ItemId,
        state: LikeState,
    },
    Comment(Comment),
    Deleted {
        id: ItemId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl From<&FeedError> for ErrorPayload {
    fn from(err: &FeedError) -> Self {
        let code = match err {
            FeedError::Validation { .. } | FeedError::InvalidCursor(_) => ErrorCode::Validation,
            FeedError::Unauthorized => ErrorCode::Unauthorized,
            FeedError::NotFound(_) => ErrorCode::NotFound,
            FeedError::Conflict(_) | FeedError::Locked(_) => ErrorCode::Conflict,
            _ => ErrorCode::Internal,
        };
        let message = match err {
            FeedError::Validation { message, .. }
            | FeedError::NotFound(message)
            | FeedError::Conflict(message) => message.clone(),
            other => other.to_string(),
        };
        let fields = err.field_errors().cloned().unwrap_or_default();
        Self {
            code,
            message,
            fields,
        }
    }
}

impl From<ErrorPayload> for FeedError {
    fn from(payload: ErrorPayload) -> Self {
        match payload.code {
            ErrorCode::Validation => FeedError::Validation {
                message: payload.message,
                fields: payload.fields,
            },
            ErrorCode::Unauthorized => FeedError::Unauthorized,
            ErrorCode::NotFound => FeedError::NotFound(payload.message),
            ErrorCode::Conflict => FeedError::Conflict(payload.message),
            ErrorCode::Internal => FeedError::Store(payload.message),
        }
    }
}

/// Store response to a mutation
///
/// `success == false` with an `error` payload is an application-level
/// rejection even when the transport call itself succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MutationRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl MutationOutcome {
    pub fn ok(data: MutationRecord) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(err: &FeedError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorPayload::from(err)),
        }
    }

    /// Collapse into the authoritative record or a typed failure.
    pub fn into_result(self) -> Result<MutationRecord> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (true, None, _) => Err(FeedError::Decode(
                "successful mutation carried no record".into(),
            )),
            (false, _, Some(payload)) => Err(payload.into()),
            (false, _, None) => Err(FeedError::Store("mutation rejected".into())),
        }
    }
}

#[async_trait]
pub trait ContentMutationClient: Send + Sync {
    async fn mutate(
        &self,
        session: Option<&Session>,
        descriptor: MutationDescriptor,
    ) -> Result<MutationOutcome>;
}

/// Bound a store request; an expired deadline becomes [`FeedError::Timeout`].
pub async fn with_deadline<T, F>(limit: Duration, request: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(FeedError::Timeout(limit)),
    }
}
