use super::{
    ContentMutationClient, ContentQueryClient, MutationDescriptor, MutationOutcome,
    MutationRecord, QueryDescriptor,
};
use crate::core::{
    Comment, ContentKind, Cursor, Document, FeedError, ItemId, LikeState, Page, Result, Session,
    SortOrder,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Longest comment body the store accepts
pub const MAX_COMMENT_LEN: usize = 2000;

/// Reference content store kept entirely in memory.
///
/// Pages are cut with keyset cursors over `(timestamp, id)`, so a cursor keeps
/// pointing at the same position when new content is published after it was
/// issued.
#[derive(Default)]
pub struct InMemoryContentStore {
    documents: RwLock<HashMap<ItemId, Document>>,
    comments: RwLock<HashMap<ItemId, Comment>>,
    /// target id -> users who liked it
    likes: RwLock<HashMap<ItemId, HashSet<String>>>,
    /// bearer token -> user name
    sessions: RwLock<HashMap<String, String>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a small set of site content
    pub async fn with_fixtures() -> Self {
        let store = Self::new();
        let fixtures = [
            (ContentKind::Sermon, "Walking by Faith", "faith", "Pastor Daniel", 1),
            (ContentKind::Sermon, "Grace for the Weary", "grace", "Pastor Daniel", 8),
            (ContentKind::Sermon, "Faith that Moves Mountains", "faith", "Ruth A.", 15),
            (ContentKind::Post, "Welcome Week Recap", "community", "Esther K.", 3),
            (ContentKind::Post, "Grace Community Outreach", "grace", "Samuel O.", 10),
            (ContentKind::Post, "Finding Rest During Exams", "rest", "Miriam T.", 17),
            (ContentKind::Gallery, "Spring Retreat 2024", "retreat", "Media Team", 5),
            (ContentKind::Gallery, "Worship Night", "worship", "Media Team", 12),
            (ContentKind::Event, "Freshers Fellowship Dinner", "community", "Events Team", 20),
        ];

        for (kind, title, tag, author, day) in fixtures {
            let published_at = Utc
                .with_ymd_and_hms(2024, 3, day, 18, 0, 0)
                .single()
                .unwrap_or_else(Utc::now);
            store
                .insert_document(Document {
                    id: ItemId::new(format!("{}-{}", kind.as_str(), slugify(title))),
                    kind,
                    title: title.to_string(),
                    slug: slugify(title),
                    excerpt: String::new(),
                    author: author.to_string(),
                    published_at,
                    like_count: 0,
                    tags: vec![tag.to_string()],
                })
                .await;
        }

        store
    }

    pub async fn insert_document(&self, document: Document) {
        self.documents
            .write()
            .await
            .insert(document.id.clone(), document);
    }

    pub async fn insert_comment(&self, comment: Comment) {
        self.comments
            .write()
            .await
            .insert(comment.id.clone(), comment);
    }

    /// Accept `token` as a signed-in session for `user`
    pub async fn register_session(&self, token: &str, user: &str) {
        self.sessions
            .write()
            .await
            .insert(token.to_string(), user.to_string());
    }

    pub async fn document(&self, id: &ItemId) -> Option<Document> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn comment(&self, id: &ItemId) -> Option<Comment> {
        self.comments.read().await.get(id).cloned()
    }

    /// Like state of `target` as seen by `user`
    pub async fn like_state(&self, target: &ItemId, user: &str) -> LikeState {
        let likes = self.likes.read().await;
        match likes.get(target) {
            Some(users) => LikeState::new(users.contains(user), users.len() as u64),
            None => LikeState::default(),
        }
    }

    async fn authenticate(&self, session: Option<&Session>) -> Result<String> {
        let session = session.ok_or(FeedError::Unauthorized)?;
        self.sessions
            .read()
            .await
            .get(session.token())
            .cloned()
            .ok_or(FeedError::Unauthorized)
    }

    async fn apply(&self, user: &str, descriptor: MutationDescriptor) -> Result<MutationRecord> {
        match descriptor {
            MutationDescriptor::ToggleLike { target } => self.toggle_like(user, target).await,
            MutationDescriptor::CreateComment {
                post_id,
                parent_id,
                body,
            } => self.create_comment(user, post_id, parent_id, body).await,
            MutationDescriptor::DeleteComment { comment_id } => {
                self.delete_comment(user, comment_id).await
            }
        }
    }

    async fn toggle_like(&self, user: &str, target: ItemId) -> Result<MutationRecord> {
        let mut documents = self.documents.write().await;
        let mut comments = self.comments.write().await;
        let mut likes = self.likes.write().await;

        let counter = if let Some(document) = documents.get_mut(&target) {
            &mut document.like_count
        } else if let Some(comment) = comments.get_mut(&target) {
            &mut comment.like_count
        } else {
            return Err(FeedError::NotFound(format!("record '{target}'")));
        };

        let users = likes.entry(target.clone()).or_default();
        let liked = if users.remove(user) {
            false
        } else {
            users.insert(user.to_string());
            true
        };
        *counter = users.len() as u64;

        let state = LikeState::new(liked, *counter);
        debug!(%target, user, liked, count = state.like_count, "like toggled");
        Ok(MutationRecord::Like { target, state })
    }

    async fn create_comment(
        &self,
        user: &str,
        post_id: ItemId,
        parent_id: Option<ItemId>,
        body: String,
    ) -> Result<MutationRecord> {
        let body = body.trim();
        if body.is_empty() {
            return Err(FeedError::field("body", "comment must not be empty"));
        }
        if body.chars().count() > MAX_COMMENT_LEN {
            return Err(FeedError::field(
                "body",
                format!("comment must be at most {MAX_COMMENT_LEN} characters"),
            ));
        }

        let documents = self.documents.read().await;
        if !documents.contains_key(&post_id) {
            return Err(FeedError::NotFound(format!("post '{post_id}'")));
        }

        let mut comments = self.comments.write().await;
        if let Some(parent) = &parent_id {
            match comments.get(parent) {
                Some(existing) if existing.post_id == post_id => {}
                Some(_) => {
                    return Err(FeedError::field(
                        "parent_id",
                        "reply must belong to the same post",
                    ));
                }
                None => return Err(FeedError::NotFound(format!("comment '{parent}'"))),
            }
        }

        let comment = Comment {
            id: ItemId::generate(),
            post_id,
            parent_id,
            author: user.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            like_count: 0,
            pending: false,
        };
        comments.insert(comment.id.clone(), comment.clone());

        debug!(comment = %comment.id, post = %comment.post_id, user, "comment created");
        Ok(MutationRecord::Comment(comment))
    }

    async fn delete_comment(&self, user: &str, comment_id: ItemId) -> Result<MutationRecord> {
        let mut comments = self.comments.write().await;
        let author = comments
            .get(&comment_id)
            .map(|comment| comment.author.clone())
            .ok_or_else(|| FeedError::NotFound(format!("comment '{comment_id}'")))?;

        if author != user {
            return Err(FeedError::validation("only the author may delete a comment"));
        }

        // Replies go with their parent.
        let mut doomed = vec![comment_id.clone()];
        let mut seen: HashSet<ItemId> = doomed.iter().cloned().collect();
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor].clone();
            for reply in comments
                .values()
                .filter(|c| c.parent_id.as_ref() == Some(&parent))
            {
                if seen.insert(reply.id.clone()) {
                    doomed.push(reply.id.clone());
                }
            }
            cursor += 1;
        }
        for id in &doomed {
            comments.remove(id);
        }

        debug!(comment = %comment_id, removed = doomed.len(), "comment deleted");
        Ok(MutationRecord::Deleted { id: comment_id })
    }
}

#[async_trait]
impl ContentQueryClient<Document> for InMemoryContentStore {
    async fn query(&self, descriptor: QueryDescriptor) -> Result<Page<Document>> {
        if descriptor.kind == ContentKind::Comment {
            return Err(FeedError::validation(
                "comments are listed per post, not as documents",
            ));
        }

        let term = descriptor.term.trim().to_lowercase();
        let candidates = self
            .documents
            .read()
            .await
            .values()
            .filter(|doc| doc.kind == descriptor.kind)
            .filter(|doc| term.is_empty() || document_matches(doc, &term))
            .cloned()
            .collect::<Vec<_>>();

        let page = paginate(candidates, &descriptor, |doc| (doc.published_at, &doc.id))?;
        debug!(
            kind = %descriptor.kind,
            term = %descriptor.term,
            returned = page.items.len(),
            has_more = page.has_more(),
            "documents queried"
        );
        Ok(page)
    }
}

#[async_trait]
impl ContentQueryClient<Comment> for InMemoryContentStore {
    async fn query(&self, descriptor: QueryDescriptor) -> Result<Page<Comment>> {
        let Some(post_id) = descriptor.scope.clone() else {
            return Err(FeedError::validation("comment queries need a post scope"));
        };

        let term = descriptor.term.trim().to_lowercase();
        let candidates = self
            .comments
            .read()
            .await
            .values()
            .filter(|comment| comment.post_id == post_id)
            .filter(|comment| {
                term.is_empty()
                    || comment.body.to_lowercase().contains(&term)
                    || comment.author.to_lowercase().contains(&term)
            })
            .cloned()
            .collect::<Vec<_>>();

        paginate(candidates, &descriptor, |comment| {
            (comment.created_at, &comment.id)
        })
    }
}

#[async_trait]
impl ContentMutationClient for InMemoryContentStore {
    async fn mutate(
        &self,
        session: Option<&Session>,
        descriptor: MutationDescriptor,
    ) -> Result<MutationOutcome> {
        let result = match self.authenticate(session).await {
            Ok(user) => self.apply(&user, descriptor).await,
            Err(err) => Err(err),
        };

        Ok(match result {
            Ok(record) => MutationOutcome::ok(record),
            Err(err) => {
                debug!(error = %err, "mutation rejected");
                MutationOutcome::failed(&err)
            }
        })
    }
}

fn document_matches(doc: &Document, term: &str) -> bool {
    doc.title.to_lowercase().contains(term)
        || doc.excerpt.to_lowercase().contains(term)
        || doc.author.to_lowercase().contains(term)
        || doc.tags.iter().any(|tag| tag.to_lowercase().contains(term))
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// `"{seconds}.{nanos}:{id}"`, at the precision keys are compared at.
fn encode_cursor(at: DateTime<Utc>, id: &ItemId) -> Cursor {
    Cursor::new(format!(
        "{}.{:09}:{}",
        at.timestamp(),
        at.timestamp_subsec_nanos(),
        id
    ))
}

fn decode_cursor(cursor: &Cursor) -> Result<(DateTime<Utc>, ItemId)> {
    let invalid = || FeedError::InvalidCursor(cursor.to_string());
    let (stamp, id) = cursor.as_str().split_once(':').ok_or_else(invalid)?;
    let (secs, nanos) = stamp.split_once('.').ok_or_else(invalid)?;
    let secs = secs.parse::<i64>().map_err(|_| invalid())?;
    let nanos = nanos.parse::<u32>().map_err(|_| invalid())?;
    let at = Utc.timestamp_opt(secs, nanos).single().ok_or_else(invalid)?;
    if id.is_empty() {
        return Err(invalid());
    }
    Ok((at, ItemId::new(id)))
}

fn paginate<T, K>(mut items: Vec<T>, descriptor: &QueryDescriptor, key: K) -> Result<Page<T>>
where
    K: Fn(&T) -> (DateTime<Utc>, &ItemId),
{
    if descriptor.limit == 0 {
        return Err(FeedError::validation("limit must be > 0"));
    }

    let order = |a: &T, b: &T| -> Ordering {
        let ascending = key(a).cmp(&key(b));
        match descriptor.sort {
            SortOrder::OldestFirst => ascending,
            SortOrder::NewestFirst => ascending.reverse(),
        }
    };
    items.sort_by(order);

    if let Some(cursor) = &descriptor.cursor {
        let (at, id) = decode_cursor(cursor)?;
        let boundary = (at, &id);
        items.retain(|item| match descriptor.sort {
            SortOrder::OldestFirst => key(item) > boundary,
            SortOrder::NewestFirst => key(item) < boundary,
        });
    }

    let has_more = items.len() > descriptor.limit;
    items.truncate(descriptor.limit);

    let next_cursor = if has_more {
        items.last().map(|last| {
            let (at, id) = key(last);
            encode_cursor(at, id)
        })
    } else {
        None
    };

    Ok(Page::new(items, next_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sermon(id: &str, title: &str, minutes_ago: i64) -> Document {
        Document {
            id: ItemId::new(id),
            kind: ContentKind::Sermon,
            title: title.to_string(),
            slug: slugify(title),
            excerpt: String::new(),
            author: "Pastor Daniel".to_string(),
            published_at: Utc::now() - Duration::minutes(minutes_ago),
            like_count: 0,
            tags: Vec::new(),
        }
    }

    async fn seeded() -> InMemoryContentStore {
        let store = InMemoryContentStore::new();
        for (idx, title) in ["Faith I", "Faith II", "Faith III", "Hope"].iter().enumerate() {
            store
                .insert_document(sermon(&format!("s{idx}"), title, idx as i64 * 10))
                .await;
        }
        store.register_session("token-ruth", "ruth").await;
        store
    }

    fn sermons(term: &str, limit: usize) -> QueryDescriptor {
        QueryDescriptor::first_page(ContentKind::Sermon, limit).term(term)
    }

    #[tokio::test]
    async fn pages_follow_keyset_cursor() {
        let store = seeded().await;

        let first = ContentQueryClient::<Document>::query(&store, sermons("faith", 2))
            .await
            .unwrap();
        let ids: Vec<_> = first.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["s0", "s1"]);
        assert!(first.has_more());

        let second = ContentQueryClient::<Document>::query(
            &store,
            sermons("faith", 2).cursor(first.next_cursor),
        )
        .await
        .unwrap();
        let ids: Vec<_> = second.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["s2"]);
        assert!(!second.has_more());
    }

    #[tokio::test]
    async fn cursor_survives_new_publication() {
        let store = seeded().await;
        let first = ContentQueryClient::<Document>::query(&store, sermons("", 2))
            .await
            .unwrap();

        store.insert_document(sermon("fresh", "Brand new", -5)).await;

        let second = ContentQueryClient::<Document>::query(
            &store,
            sermons("", 2).cursor(first.next_cursor),
        )
        .await
        .unwrap();
        let ids: Vec<_> = second.items.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3"]);
    }

    #[tokio::test]
    async fn garbage_cursor_is_rejected() {
        let store = seeded().await;
        let result = ContentQueryClient::<Document>::query(
            &store,
            sermons("", 2).cursor(Some(Cursor::new("nonsense"))),
        )
        .await;
        assert!(matches!(result, Err(FeedError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn like_toggle_requires_session() {
        let store = seeded().await;
        let outcome = store
            .mutate(
                None,
                MutationDescriptor::ToggleLike {
                    target: ItemId::new("s0"),
                },
            )
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.into_result().unwrap_err().requires_authentication());
    }

    #[tokio::test]
    async fn like_toggle_flips_and_counts() {
        let store = seeded().await;
        let session = Session::new("token-ruth");
        let toggle = || MutationDescriptor::ToggleLike {
            target: ItemId::new("s0"),
        };

        let liked = store.mutate(Some(&session), toggle()).await.unwrap();
        assert_eq!(
            liked.into_result().unwrap(),
            MutationRecord::Like {
                target: ItemId::new("s0"),
                state: LikeState::new(true, 1),
            }
        );

        let unliked = store.mutate(Some(&session), toggle()).await.unwrap();
        assert_eq!(
            unliked.into_result().unwrap(),
            MutationRecord::Like {
                target: ItemId::new("s0"),
                state: LikeState::new(false, 0),
            }
        );
        assert_eq!(store.document(&ItemId::new("s0")).await.unwrap().like_count, 0);
    }

    #[tokio::test]
    async fn empty_comment_reports_body_field() {
        let store = seeded().await;
        let outcome = store
            .mutate(
                Some(&Session::new("token-ruth")),
                MutationDescriptor::CreateComment {
                    post_id: ItemId::new("s0"),
                    parent_id: None,
                    body: "   ".into(),
                },
            )
            .await
            .unwrap();

        let err = outcome.into_result().unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("body"));
    }

    #[tokio::test]
    async fn deleting_comment_removes_replies() {
        let store = seeded().await;
        let session = Session::new("token-ruth");

        let parent = match store
            .mutate(
                Some(&session),
                MutationDescriptor::CreateComment {
                    post_id: ItemId::new("s0"),
                    parent_id: None,
                    body: "Blessed".into(),
                },
            )
            .await
            .unwrap()
            .into_result()
            .unwrap()
        {
            MutationRecord::Comment(comment) => comment,
            other => panic!("unexpected record {other:?}"),
        };

        store
            .mutate(
                Some(&session),
                MutationDescriptor::CreateComment {
                    post_id: ItemId::new("s0"),
                    parent_id: Some(parent.id.clone()),
                    body: "Amen".into(),
                },
            )
            .await
            .unwrap();

        store
            .mutate(
                Some(&session),
                MutationDescriptor::DeleteComment {
                    comment_id: parent.id.clone(),
                },
            )
            .await
            .unwrap();

        let page = ContentQueryClient::<Comment>::query(
            &store,
            QueryDescriptor::first_page(ContentKind::Comment, 10).scope(ItemId::new("s0")),
        )
        .await
        .unwrap();
        assert!(page.items.is_empty());
    }

    fn comment_at(id: &str, parent: Option<&str>, at: DateTime<Utc>) -> Comment {
        Comment {
            id: ItemId::new(id),
            post_id: ItemId::new("s0"),
            parent_id: parent.map(ItemId::new),
            author: "ruth".to_string(),
            body: format!("comment {id}"),
            created_at: at,
            like_count: 0,
            pending: false,
        }
    }

    async fn walk_comments(store: &InMemoryContentStore, sort: SortOrder) -> Vec<String> {
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let descriptor = QueryDescriptor::first_page(ContentKind::Comment, 1)
                .scope(ItemId::new("s0"))
                .sort(sort)
                .cursor(cursor);
            let page = ContentQueryClient::<Comment>::query(store, descriptor)
                .await
                .unwrap();
            seen.extend(page.items.iter().map(|c| c.id.as_str().to_string()));
            if !page.has_more() {
                return seen;
            }
            assert!(seen.len() < 10, "pagination did not terminate: {seen:?}");
            cursor = page.next_cursor;
        }
    }

    #[tokio::test]
    async fn sub_millisecond_comments_page_newest_first() {
        let store = seeded().await;
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        for (id, micros) in [("c1", 100), ("c2", 500), ("c3", 900)] {
            store
                .insert_comment(comment_at(id, None, base + Duration::microseconds(micros)))
                .await;
        }

        let ids = walk_comments(&store, SortOrder::NewestFirst).await;
        assert_eq!(ids, ["c3", "c2", "c1"]);
    }

    #[tokio::test]
    async fn sub_millisecond_comments_page_oldest_first() {
        let store = seeded().await;
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        store
            .insert_comment(comment_at("early", None, base + Duration::microseconds(100)))
            .await;
        store
            .insert_comment(comment_at("later", None, base + Duration::milliseconds(5)))
            .await;

        let ids = walk_comments(&store, SortOrder::OldestFirst).await;
        assert_eq!(ids, ["early", "later"]);
    }

    #[test]
    fn cursor_keeps_nanoseconds() {
        let at = Utc.timestamp_opt(1_714_554_000, 123_456_789).unwrap();
        let cursor = encode_cursor(at, &ItemId::new("c:1"));
        assert_eq!(cursor.as_str(), "1714554000.123456789:c:1");
        assert_eq!(decode_cursor(&cursor).unwrap(), (at, ItemId::new("c:1")));
    }

    #[tokio::test]
    async fn deleting_comment_in_reply_cycle_terminates() {
        let store = seeded().await;
        let at = Utc::now();
        store.insert_comment(comment_at("loop-a", Some("loop-b"), at)).await;
        store.insert_comment(comment_at("loop-b", Some("loop-a"), at)).await;

        let outcome = store
            .mutate(
                Some(&Session::new("token-ruth")),
                MutationDescriptor::DeleteComment {
                    comment_id: ItemId::new("loop-a"),
                },
            )
            .await
            .unwrap();

        assert!(outcome.success);
        assert!(store.comment(&ItemId::new("loop-a")).await.is_none());
        assert!(store.comment(&ItemId::new("loop-b")).await.is_none());
    }
}
