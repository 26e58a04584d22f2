/// Content API tests
///
/// Router-level checks through `tower::ServiceExt::oneshot`, plus the HTTP
/// client, list controller and mutation coordinator against a live server.
/// Run with: cargo test --test http_api_tests

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use fellowship_feed::list::{ListController, ListSource};
use fellowship_feed::mutation::MutationCoordinator;
use fellowship_feed::store::{
    ContentMutationClient, ContentQueryClient, HttpContentClient, QueryDescriptor,
};
use fellowship_feed::sync::NoUrlSync;
use fellowship_feed::{
    AppState, Comment, ContentKind, Document, FeedConfig, FeedError, InMemoryContentStore,
    ItemId, LikeState, Session, build_router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "token-esther";

async fn app() -> axum::Router {
    let store = InMemoryContentStore::with_fixtures().await;
    store.register_session(TOKEN, "esther").await;
    build_router(AppState::new(Arc::new(store), 9))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("response expected");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");

    if body.is_empty() {
        return (status, Value::Null);
    }
    let json = serde_json::from_slice::<Value>(&body).expect("body should be valid JSON");
    (status, json)
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, request).await
}

async fn mutate(app: &axum::Router, token: Option<&str>, payload: Value) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/mutations")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(payload.to_string()))
        .expect("request should build");
    send(app, request).await
}

fn titles(body: &Value) -> Vec<String> {
    body["items"]
        .as_array()
        .expect("items should be an array")
        .iter()
        .map(|item| item["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_healthcheck() {
    let app = app().await;
    let (status, body) = get(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_search_pages_follow_cursor() {
    let app = app().await;

    let (status, first) = get(&app, "/api/v1/content/sermons?q=faith&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["kind"], "ok");
    assert_eq!(titles(&first), ["Faith that Moves Mountains"]);
    let cursor = first["next_cursor"]
        .as_str()
        .expect("first page should carry a cursor")
        .to_string();

    let (status, second) = get(
        &app,
        &format!("/api/v1/content/sermons?q=faith&limit=1&cursor={cursor}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&second), ["Walking by Faith"]);
    assert!(second["next_cursor"].is_null());
}

#[tokio::test]
async fn test_oldest_first_sort() {
    let app = app().await;
    let (status, body) = get(&app, "/api/v1/content/sermon?sort=oldest_first").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        titles(&body),
        [
            "Walking by Faith",
            "Grace for the Weary",
            "Faith that Moves Mountains"
        ]
    );
}

#[tokio::test]
async fn test_bad_listing_requests_get_tagged_errors() {
    let app = app().await;

    for uri in [
        "/api/v1/content/podcasts",
        "/api/v1/content/posts?cursor=garbage",
        "/api/v1/content/posts?limit=lots",
        "/api/v1/content/posts?sort=sideways",
        "/api/v1/content/comments",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["kind"], "error", "{uri}");
        assert!(body["reason"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_mutation_without_session_is_unauthorized() {
    let app = app().await;
    let (status, body) = mutate(
        &app,
        None,
        json!({ "op": "toggle_like", "target": "post-welcome-week-recap" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_like_toggles_with_session() {
    let app = app().await;
    let (_, listing) = get(&app, "/api/v1/content/posts").await;
    let target = listing["items"][0]["id"].as_str().unwrap().to_string();

    let payload = json!({ "op": "toggle_like", "target": target });
    let (status, body) = mutate(&app, Some(TOKEN), payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["type"], "like");
    assert_eq!(body["data"]["state"], json!({ "liked": true, "like_count": 1 }));

    let (_, body) = mutate(&app, Some(TOKEN), payload).await;
    assert_eq!(body["data"]["state"], json!({ "liked": false, "like_count": 0 }));
}

#[tokio::test]
async fn test_comment_validation_reports_fields() {
    let app = app().await;
    let (status, body) = mutate(
        &app,
        Some(TOKEN),
        json!({ "op": "create_comment", "post_id": "post-welcome-week-recap", "body": "   " }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation");
    assert!(body["error"]["fields"]["body"].is_string());
}

#[tokio::test]
async fn test_mutation_on_missing_record_is_not_found() {
    let app = app().await;
    let (status, body) = mutate(
        &app,
        Some(TOKEN),
        json!({ "op": "delete_comment", "comment_id": "nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

async fn post_raw(
    app: &axum::Router,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/mutations")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, request).await
}

#[tokio::test]
async fn test_unreadable_mutation_body_still_gets_an_outcome() {
    let app = app().await;

    for (content_type, body) in [
        (Some("application/json"), "{ not json"),
        (Some("application/json"), r#"{ "op": "smite", "target": "post-1" }"#),
        (Some("application/json"), r#"{ "op": "create_comment", "post_id": "post-1" }"#),
        (None, r#"{ "op": "toggle_like", "target": "post-1" }"#),
    ] {
        let (status, outcome) = post_raw(&app, content_type, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(outcome["success"], false, "{body}");
        assert_eq!(outcome["error"]["code"], "validation", "{body}");
        assert!(outcome["error"]["message"].is_string(), "{body}");
    }
}

async fn serve() -> HttpContentClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener has an address");
    let app = app().await;
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    HttpContentClient::new(&format!("http://{addr}")).expect("client should build")
}

#[tokio::test]
async fn test_list_controller_over_http() {
    let http = Arc::new(serve().await);
    let client: Arc<dyn ContentQueryClient<Document>> = http.clone();
    let config = FeedConfig::new().page_size(2);
    let list = ListController::new(
        client,
        Arc::new(NoUrlSync),
        config,
        ListSource::new(ContentKind::Post),
    )
    .unwrap();

    list.fetch_next_page().await.unwrap();
    assert_eq!(list.snapshot().unwrap().items.len(), 2);
    list.on_bottom_reached().await.unwrap();

    let snapshot = list.snapshot().unwrap();
    assert_eq!(snapshot.items.len(), 3);
    assert!(!snapshot.has_more);

    list.set_search_input("grace").unwrap();
    list.submit_search().await.unwrap();
    let snapshot = list.snapshot().unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].title, "Grace Community Outreach");
}

#[tokio::test]
async fn test_comment_listing_keeps_reserved_characters_in_post_id() {
    let http = serve().await;
    let descriptor = QueryDescriptor::first_page(ContentKind::Comment, 5)
        .scope(ItemId::new("youth/retreat?day=1#photos"));

    let page = ContentQueryClient::<Comment>::query(&http, descriptor)
        .await
        .expect("listing should reach the comments route");
    assert!(page.items.is_empty());
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_coordinator_over_http() {
    let http = Arc::new(serve().await);
    let mutations: Arc<dyn ContentMutationClient> = http.clone();
    let coordinator = MutationCoordinator::new(mutations, &FeedConfig::new());
    let post = ItemId::new("post-welcome-week-recap");

    let err = coordinator.toggle_like(post.clone(), None).await.unwrap_err();
    assert_eq!(err, FeedError::Unauthorized);

    let session = Some(Session::new(TOKEN));
    let state = coordinator.toggle_like(post.clone(), session.clone()).await.unwrap();
    assert_eq!(state, LikeState::new(true, 1));

    let comment = coordinator
        .submit_comment(post.clone(), None, "See you all on Friday", session)
        .await
        .unwrap();
    assert_eq!(comment.author, "esther");

    let comments: Arc<dyn ContentQueryClient<Comment>> = http.clone();
    let thread = ListController::new(
        comments,
        Arc::new(NoUrlSync),
        FeedConfig::new(),
        ListSource::comments_of(post),
    )
    .unwrap();
    thread.fetch_next_page().await.unwrap();
    let snapshot = thread.snapshot().unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].id, comment.id);
}
