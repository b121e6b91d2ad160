use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Html;
use axum::routing::get;
use http_body_util::BodyExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use trawl_server::config::ServerConfig;
use trawl_server::routes;
use trawl_server::state::AppState;

pub const TEST_API_KEY: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

impl TestApp {
    fn new(api_key: Option<&str>) -> Self {
        let config = ServerConfig {
            api_key: api_key.map(str::to_string),
            allow_private_urls: true,
            ..ServerConfig::default()
        };
        let state = Arc::new(AppState::new(&config));
        Self {
            router: routes::router(state.clone()),
            state,
        }
    }

    /// Send a request with the test API key and decode the JSON body (if any).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {TEST_API_KEY}"));
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

pub async fn setup_test_app() -> TestApp {
    TestApp::new(Some(TEST_API_KEY))
}

pub async fn setup_test_app_no_auth() -> TestApp {
    TestApp::new(None)
}

const ROBOTS: &str = "User-agent: *\nDisallow: /private\nCrawl-delay: 0.01\n";

/// Serve a small site on a random local port:
///
/// ```text
/// /  -> /a, /b, /private/x, https://elsewhere.test/
/// /b -> /c
/// ```
pub async fn serve_site() -> SocketAddr {
    let app = Router::new()
        .route("/robots.txt", get(|| async { ROBOTS }))
        .route(
            "/",
            get(|| async {
                Html(
                    r#"<html><head><title>Home</title>
                    <meta name="description" content="Fixture home"></head>
                    <body><p>Welcome</p>
                    <a href="/a">A</a> <a href="/b">B</a>
                    <a href="/private/x">Hidden</a>
                    <a href="https://elsewhere.test/">Away</a>
                    </body></html>"#,
                )
            }),
        )
        .route(
            "/a",
            get(|| async { Html("<html><title>A</title><p>Page A</p></html>") }),
        )
        .route(
            "/b",
            get(|| async {
                Html(r#"<html><title>B</title><p>Page B</p><a href="/c">C</a></html>"#)
            }),
        )
        .route(
            "/c",
            get(|| async { Html("<html><title>C</title><p>Page C</p></html>") }),
        )
        .route(
            "/private/x",
            get(|| async { Html("<html><title>Secret</title></html>") }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
