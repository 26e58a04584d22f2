use super::{
    ContentMutationClient, ContentQueryClient, MutationDescriptor, MutationOutcome, QueryDescriptor,
    QueryOutcome,
};
use crate::core::{Comment, ContentKind, Document, FeedError, Page, Result, Session, SortOrder};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Content-store client speaking the JSON API served by [`crate::web`].
#[derive(Debug, Clone)]
pub struct HttpContentClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpContentClient {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| FeedError::Config(format!("invalid base url '{base_url}': {err}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| FeedError::Config(format!("invalid endpoint '{path}': {err}")))
    }

    /// Listing URL under the base; each segment is percent-encoded, so ids
    /// containing `/`, `?` or `#` stay a single path segment.
    fn page_url(&self, segments: &[&str], descriptor: &QueryDescriptor) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FeedError::Config(format!("base url '{}' cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        {
            let mut pairs = url.query_pairs_mut();
            if !descriptor.term.is_empty() {
                pairs.append_pair("q", &descriptor.term);
            }
            if let Some(cursor) = &descriptor.cursor {
                pairs.append_pair("cursor", cursor.as_str());
            }
            pairs.append_pair("limit", &descriptor.limit.to_string());
            pairs.append_pair(
                "sort",
                match descriptor.sort {
                    SortOrder::NewestFirst => "newest_first",
                    SortOrder::OldestFirst => "oldest_first",
                },
            );
        }
        Ok(url)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, url: Url) -> Result<Page<T>> {
        debug!(%url, "fetching page");
        let response = self.http.get(url).send().await.map_err(transport)?;
        let body = response.bytes().await.map_err(transport)?;
        let outcome: QueryOutcome<T> = serde_json::from_slice(&body)?;
        outcome.into_result()
    }
}

fn transport(err: reqwest::Error) -> FeedError {
    FeedError::Transport(err.to_string())
}

#[async_trait]
impl ContentQueryClient<Document> for HttpContentClient {
    async fn query(&self, descriptor: QueryDescriptor) -> Result<Page<Document>> {
        if descriptor.kind == ContentKind::Comment {
            return Err(FeedError::validation(
                "comments are listed per post, not as documents",
            ));
        }
        let url = self.page_url(&["api", "v1", "content", descriptor.kind.as_str()], &descriptor)?;
        self.fetch_page(url).await
    }
}

#[async_trait]
impl ContentQueryClient<Comment> for HttpContentClient {
    async fn query(&self, descriptor: QueryDescriptor) -> Result<Page<Comment>> {
        let Some(post_id) = &descriptor.scope else {
            return Err(FeedError::validation("comment queries need a post scope"));
        };
        let url = self.page_url(
            &["api", "v1", "posts", post_id.as_str(), "comments"],
            &descriptor,
        )?;
        self.fetch_page(url).await
    }
}

#[async_trait]
impl ContentMutationClient for HttpContentClient {
    async fn mutate(
        &self,
        session: Option<&Session>,
        descriptor: MutationDescriptor,
    ) -> Result<MutationOutcome> {
        let mut request = self
            .http
            .post(self.endpoint("api/v1/mutations")?)
            .json(&descriptor);
        if let Some(session) = session {
            request = request.bearer_auth(session.token());
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        // Error statuses still carry a MutationOutcome; only an undecodable
        // body is a transport-level failure.
        serde_json::from_slice::<MutationOutcome>(&body).map_err(|err| {
            FeedError::Transport(format!("unexpected {status} response: {err}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Cursor;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = HttpContentClient::new("http://localhost:8080/feed").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/feed/");
    }

    #[test]
    fn page_url_carries_query_context() {
        let client = HttpContentClient::new("http://localhost:8080").unwrap();
        let descriptor = QueryDescriptor::first_page(ContentKind::Sermon, 9)
            .term("grace community")
            .cursor(Some(Cursor::new("1700000000.000000000:s1")));

        let url = client
            .page_url(&["api", "v1", "content", "sermon"], &descriptor)
            .unwrap();
        assert_eq!(url.path(), "/api/v1/content/sermon");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "grace community".into())));
        assert!(pairs.contains(&("cursor".into(), "1700000000.000000000:s1".into())));
        assert!(pairs.contains(&("limit".into(), "9".into())));
        assert!(pairs.contains(&("sort".into(), "newest_first".into())));
    }

    #[test]
    fn post_id_is_encoded_as_one_segment() {
        let client = HttpContentClient::new("http://localhost:8080/feed").unwrap();
        let descriptor = QueryDescriptor::first_page(ContentKind::Comment, 5);

        let url = client
            .page_url(&["api", "v1", "posts", "a/b?c#d", "comments"], &descriptor)
            .unwrap();
        assert_eq!(url.path(), "/feed/api/v1/posts/a%2Fb%3Fc%23d/comments");
        assert!(url.fragment().is_none());
        assert!(url.query_pairs().all(|(key, _)| key != "c"));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            HttpContentClient::new("not a url"),
            Err(FeedError::Config(_))
        ));
    }

    #[tokio::test]
    async fn comment_query_without_scope_fails_fast() {
        let client = HttpContentClient::new("http://localhost:1").unwrap();
        let result = ContentQueryClient::<Comment>::query(
            &client,
            QueryDescriptor::first_page(ContentKind::Comment, 5),
        )
        .await;
        assert!(matches!(result, Err(FeedError::Validation { .. })));
    }
}
