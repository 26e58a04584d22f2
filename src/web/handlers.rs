use super::AppState;
use super::error::{WebError, mutation_status};
use crate::config::MAX_PAGE_SIZE;
use crate::core::{
    Comment, ContentKind, Cursor, Document, FeedError, ItemId, Session, SortOrder,
};
use crate::store::{
    ContentMutationClient, ContentQueryClient, MutationDescriptor, MutationOutcome,
    QueryDescriptor, QueryOutcome,
};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Raw listing parameters; parsed by hand so bad values still get a tagged body.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub q: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
}

impl PageParams {
    fn descriptor(
        &self,
        kind: ContentKind,
        default_limit: usize,
        default_sort: SortOrder,
    ) -> Result<QueryDescriptor, WebError> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => default_limit,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| WebError::Input(format!("limit must be a number, got '{raw}'")))?,
        }
        .clamp(1, MAX_PAGE_SIZE);

        let sort = match self.sort.as_deref() {
            None | Some("") => default_sort,
            Some("newest_first") => SortOrder::NewestFirst,
            Some("oldest_first") => SortOrder::OldestFirst,
            Some(other) => return Err(WebError::Input(format!("unknown sort order '{other}'"))),
        };

        let cursor = self
            .cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
            .map(Cursor::new);

        Ok(QueryDescriptor::first_page(kind, limit)
            .term(self.q.clone().unwrap_or_default())
            .cursor(cursor)
            .sort(sort))
    }
}

pub async fn healthcheck() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn list_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<QueryOutcome<Document>>, WebError> {
    let kind = kind.parse::<ContentKind>()?;
    let descriptor = params.descriptor(kind, state.page_size, SortOrder::NewestFirst)?;
    let page = ContentQueryClient::<Document>::query(state.store.as_ref(), descriptor).await?;
    Ok(Json(QueryOutcome::from(Ok::<_, FeedError>(page))))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<QueryOutcome<Comment>>, WebError> {
    let descriptor = params
        .descriptor(ContentKind::Comment, state.page_size, SortOrder::OldestFirst)?
        .scope(ItemId::new(post_id));
    let page = ContentQueryClient::<Comment>::query(state.store.as_ref(), descriptor).await?;
    Ok(Json(QueryOutcome::from(Ok::<_, FeedError>(page))))
}

pub async fn mutate(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<MutationDescriptor>, JsonRejection>,
) -> (StatusCode, Json<MutationOutcome>) {
    // A body that is not a mutation still gets a MutationOutcome back.
    let descriptor = match payload {
        Ok(Json(descriptor)) => descriptor,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "malformed mutation body");
            let err = FeedError::validation(rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(MutationOutcome::failed(&err)));
        }
    };

    let session = bearer_session(&headers);
    let outcome = match state.store.mutate(session.as_ref(), descriptor).await {
        Ok(outcome) => outcome,
        Err(err) => MutationOutcome::failed(&err),
    };

    let status = match &outcome.error {
        None if outcome.success => StatusCode::OK,
        None => StatusCode::INTERNAL_SERVER_ERROR,
        Some(payload) => mutation_status(payload.code),
    };
    debug!(%status, success = outcome.success, "mutation handled");
    (status, Json(outcome))
}

fn bearer_session(headers: &HeaderMap) -> Option<Session> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| Session::new(token))
}
