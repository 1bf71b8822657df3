//! HTML dashboard and JSON endpoints over `axum`

use axum::{
    Form, Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Duration as ChronoDuration;
use newsroom_domain::{
    Clock, MetricsSummary, RecentPost, SlotTime, Store, StoreError,
    usecases::{PublishError, SlotPublisher, TARGET_CHAT_SETTING},
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

const RECENT_POSTS: usize = 30;

/// Shared state for dashboard handlers
#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<dyn Store>,
    pub publisher: Arc<SlotPublisher>,
    pub clock: Arc<dyn Clock>,
    pub post_times: Vec<SlotTime>,
}

/// Build the dashboard router
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/metrics", get(metrics))
        .route("/set-target", post(set_target))
        .route("/post-now", post(post_now))
        .fallback(not_found)
        .with_state(state)
}

/// Bind `port` on all interfaces and serve until `shutdown` resolves
pub async fn serve<F>(port: u16, state: DashboardState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Dashboard listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Handler failure rendered as a JSON 500
struct DashboardError(String);

impl From<StoreError> for DashboardError {
    fn from(e: StoreError) -> Self {
        Self(e.to_string())
    }
}

impl From<PublishError> for DashboardError {
    fn from(e: PublishError) -> Self {
        Self(e.to_string())
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "Dashboard request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct PostNowResponse {
    ok: bool,
    info: String,
}

#[derive(Deserialize)]
struct SetTargetForm {
    #[serde(default)]
    target_chat_id: String,
}

async fn index(State(state): State<DashboardState>) -> Result<Html<String>, DashboardError> {
    let since = state.clock.now() - ChronoDuration::hours(24);
    let summary = state.store.metrics_summary(since).await?;
    let recent = state.store.recent_posts(RECENT_POSTS).await?;
    let target = state
        .store
        .setting_get(TARGET_CHAT_SETTING)
        .await?
        .unwrap_or_default();

    Ok(Html(render_index(
        &summary,
        &recent,
        &state.publisher.timezone().to_string(),
        &state.post_times,
        &target,
    )))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn metrics(
    State(state): State<DashboardState>,
) -> Result<Json<MetricsSummary>, DashboardError> {
    let since = state.clock.now() - ChronoDuration::hours(24);
    Ok(Json(state.store.metrics_summary(since).await?))
}

async fn set_target(
    State(state): State<DashboardState>,
    Form(form): Form<SetTargetForm>,
) -> Result<Response, DashboardError> {
    let target = form.target_chat_id.trim();
    if !target.is_empty() {
        state.store.setting_set(TARGET_CHAT_SETTING, target).await?;
        tracing::info!(target, "Target chat updated from dashboard");
    }
    Ok((StatusCode::FOUND, [(header::LOCATION, "/")]).into_response())
}

async fn post_now(State(state): State<DashboardState>) -> Result<Response, DashboardError> {
    let Some(target) = state.publisher.resolve_target().await? else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(PostNowResponse {
                ok: false,
                info: "target_chat_id not set".to_string(),
            }),
        )
            .into_response());
    };

    match state.publisher.try_post_one(&target).await? {
        None => Ok((
            StatusCode::CONFLICT,
            Json(PostNowResponse {
                ok: false,
                info: "busy".to_string(),
            }),
        )
            .into_response()),
        Some(outcome) => Ok(Json(PostNowResponse {
            ok: outcome.is_posted(),
            info: outcome.to_string(),
        })
        .into_response()),
    }
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
}

fn esc(value: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_text(value)
}

fn attr(value: &str) -> std::borrow::Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(value)
}

fn render_index(
    summary: &MetricsSummary,
    recent: &[RecentPost],
    timezone: &str,
    post_times: &[SlotTime],
    target: &str,
) -> String {
    let times = post_times
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let sources: String = summary
        .top_sources
        .iter()
        .map(|s| format!("<li>{}: {}</li>\n", esc(&s.source), s.count))
        .collect();

    let posts: String = recent
        .iter()
        .map(|p| {
            let title = if p.link.is_empty() {
                esc(&p.title).into_owned()
            } else {
                format!("<a href=\"{}\">{}</a>", attr(&p.link), esc(&p.title))
            };
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                esc(&p.posted_at.format("%Y-%m-%d %H:%M UTC").to_string()),
                esc(&p.source),
                title
            )
        })
        .collect();

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>AI News Dashboard</title></head>
<body>
<h1>AI News Dashboard</h1>
<p>Total posts: {total}</p>
<p>Last 24h: {last24}</p>
<p>Timezone: {tz}</p>
<p>Post times: {times}</p>
<form method="post" action="/set-target">
<input name="target_chat_id" value="{target}" placeholder="@channel or -100...">
<button type="submit">Set target</button>
</form>
<form method="post" action="/post-now"><button type="submit">Post now</button></form>
<h2>Top sources</h2>
<ul>
{sources}</ul>
<h2>Recent posts</h2>
<table>
{posts}</table>
</body>
</html>
"#,
        total = summary.total_posts,
        last24 = summary.posts_last_24h,
        tz = esc(timezone),
        times = esc(&times),
        target = attr(target),
        sources = sources,
        posts = posts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_http::StubFeedSource;
    use crate::llm::StubLlm;
    use crate::store::InMemoryStore;
    use crate::telegram::StubChatSender;
    use axum::body::Body;
    use axum::http::Request;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use http_body_util::BodyExt;
    use newsroom_domain::{ChatSender, NewItem, SendError, SentMessage};
    use newsroom_domain::usecases::{
        Critic, IngestConfig, Ingestor, LlmClient, Planner, PlannerConfig, PublisherConfig,
        Reviser, Writer,
    };
    use std::time::Duration;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Sender that blocks every send until released
    #[derive(Default)]
    struct GatedSender {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ChatSender for GatedSender {
        async fn send_message(
            &self,
            _chat_id: &str,
            _html: &str,
        ) -> Result<SentMessage, SendError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(SentMessage { message_id: 1 })
        }
    }

    fn state_with(store: Arc<InMemoryStore>) -> DashboardState {
        state_with_sender(store, Arc::new(StubChatSender::new()))
    }

    fn state_with_sender(
        store: Arc<InMemoryStore>,
        sender: Arc<dyn ChatSender>,
    ) -> DashboardState {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
        ));
        let llm = Arc::new(LlmClient::new(
            Some(Arc::new(StubLlm::fixed("Rewritten post"))),
            None,
            true,
            Duration::from_secs(5),
        ));
        let writer = Arc::new(Writer::new(llm.clone(), "en"));
        let ingestor = Arc::new(Ingestor::new(
            Arc::new(StubFeedSource::new()),
            store.clone(),
            IngestConfig::default(),
        ));
        let post_times = vec!["09:00".parse().unwrap()];
        let planner = Arc::new(Planner::new(
            store.clone(),
            ingestor,
            writer.clone(),
            Arc::new(Critic::new(llm.clone(), "en")),
            Arc::new(Reviser::new(llm, "en")),
            clock.clone(),
            PlannerConfig {
                post_times: post_times.clone(),
                max_posts_per_day: 1,
                ..Default::default()
            },
            Duration::from_secs(5),
        ));
        let publisher = Arc::new(SlotPublisher::new(
            store.clone(),
            planner,
            writer,
            sender,
            clock.clone(),
            PublisherConfig::default(),
        ));

        DashboardState {
            store,
            publisher,
            clock,
            post_times,
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state_with(Arc::new(InMemoryStore::new())));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let app = router(state_with(Arc::new(InMemoryStore::new())));

        let response = app
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, r#"{"error":"not found"}"#);
    }

    #[tokio::test]
    async fn test_metrics_json() {
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_item(&NewItem {
                guid: "g1".to_string(),
                source: "OpenAI".to_string(),
                title: "t".to_string(),
                link: String::new(),
                published: String::new(),
                summary: String::new(),
            })
            .await
            .unwrap();
        store
            .mark_item_posted(
                "g1",
                "text",
                Utc.with_ymd_and_hms(2026, 7, 1, 7, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        let app = router(state_with(store));

        let response = app
            .oneshot(Request::get("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["total_posts"], 1);
        assert_eq!(json["posts_last_24h"], 1);
        assert_eq!(json["top_sources"][0]["source"], "OpenAI");
    }

    #[tokio::test]
    async fn test_set_target_redirects_and_stores() {
        let store = Arc::new(InMemoryStore::new());
        let app = router(state_with(store.clone()));

        let response = app
            .oneshot(
                Request::post("/set-target")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from("target_chat_id=%40ai_news"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(
            store.setting_get(TARGET_CHAT_SETTING).await.unwrap(),
            Some("@ai_news".to_string())
        );
    }

    #[tokio::test]
    async fn test_post_now_without_target_is_400() {
        let app = router(state_with(Arc::new(InMemoryStore::new())));

        let response = app
            .oneshot(Request::post("/post-now").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["ok"], false);
    }

    #[tokio::test]
    async fn test_post_now_with_empty_store_reports_info() {
        let store = Arc::new(InMemoryStore::new());
        store.setting_set(TARGET_CHAT_SETTING, "@ai_news").await.unwrap();
        let app = router(state_with(store));

        let response = app
            .oneshot(Request::post("/post-now").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["info"], "no unposted items");
    }

    #[tokio::test]
    async fn test_post_now_while_manual_post_running_is_409() {
        let store = Arc::new(InMemoryStore::new());
        for guid in ["g1", "g2"] {
            store
                .upsert_item(&NewItem {
                    guid: guid.to_string(),
                    source: "OpenAI".to_string(),
                    title: format!("OpenAI agent launch {}", guid),
                    link: String::new(),
                    published: String::new(),
                    summary: String::new(),
                })
                .await
                .unwrap();
        }
        store.setting_set(TARGET_CHAT_SETTING, "@ai_news").await.unwrap();
        let sender = Arc::new(GatedSender::default());
        let state = state_with_sender(store, sender.clone());

        let publisher = state.publisher.clone();
        let running = tokio::spawn(async move { publisher.post_one("@ai_news").await });
        sender.entered.notified().await;

        let response = router(state)
            .oneshot(Request::post("/post-now").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["ok"], false);

        sender.release.notify_one();
        assert!(running.await.unwrap().unwrap().is_posted());
    }

    #[test]
    fn test_index_escapes_dynamic_values() {
        let summary = MetricsSummary {
            total_posts: 1,
            posts_last_24h: 1,
            top_sources: vec![newsroom_domain::SourceCount {
                source: "<script>".to_string(),
                count: 1,
            }],
        };
        let recent = vec![RecentPost {
            source: "A&B".to_string(),
            title: "<b>bold</b>".to_string(),
            link: "https://x.test/?a=\"1\"".to_string(),
            posted_at: Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
        }];

        let html = render_index(
            &summary,
            &recent,
            "Europe/Moscow",
            &["09:00".parse().unwrap()],
            "\"><x>",
        );

        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(html.contains("A&amp;B"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("\"><x>"));
        assert!(html.contains("Post times: 09:00"));
    }
}
