use atomicdocs::{
    config::{Config, RetryPolicy},
    extractor::{hono::HonoSource, RouteBatch, RouteDescriptor},
    middleware::AtomicDocs,
    proxy::{ProxyOutcome, TOO_LARGE_BODY},
    registration::{RegistrationOutcome, REGISTER_PATH},
    service::{ServiceHandle, ServiceState},
};
use http::header::CONTENT_TYPE;
use http::{Request, Response, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Server};

/// A request seen by the mock documentation service
#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    app_port: Option<String>,
    content_type: Option<String>,
    body: String,
}

/// (status, content type, body)
type Reply = (u16, &'static str, Vec<u8>);

/// Extra response headers as (name, value)
type ExtraHeaders = Vec<(&'static str, &'static str)>;

/// Loopback stand-in for the documentation service
struct MockService {
    port: u16,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockService {
    fn start<F>(respond: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + 'static,
    {
        Self::start_with_headers(move |recorded| (respond(recorded), Vec::new()))
    }

    fn start_with_headers<F>(respond: F) -> Self
    where
        F: Fn(&Recorded) -> (Reply, ExtraHeaders) + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.to_string())
                };
                let app_port = header("X-App-Port");
                let content_type = header("Content-Type");

                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    app_port,
                    content_type,
                    body,
                };
                let ((status, content_type, data), extra) = respond(&recorded);
                seen.lock().unwrap().push(recorded);

                let mut response = tiny_http::Response::from_data(data)
                    .with_status_code(status)
                    .with_header(
                        Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap(),
                    );
                for (name, value) in extra {
                    response.add_header(
                        Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap(),
                    );
                }
                let _ = request.respond(response);
            }
        });

        Self { port, requests }
    }

    fn accepting_everything() -> Self {
        Self::start(|_| (200, "application/json", b"{\"ok\":true}".to_vec()))
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn requests_to(&self, url: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.service.port = self.port;
        config.service.spawn = false;
        config.service.connect_timeout_ms = 500;
        config.probe.initial_delay_ms = 10;
        config.probe.timeout_ms = 2000;
        config.retry = RetryPolicy {
            initial_delay_ms: 10,
            max_delay_ms: 20,
            max_attempts: None,
            max_elapsed_ms: Some(5000),
            ..RetryPolicy::default()
        };
        config
    }
}

fn hono_source() -> HonoSource {
    HonoSource::from_value(&json!({
        "routes": [
            {"method": "GET", "path": "/users", "handler": "(c) => c.json(users)"},
            {"method": "post", "path": "/users/:id{[0-9]+}/like", "handler": "(c) => c.json(post)"},
            {"method": "GET", "path": "/docs", "handler": ""}
        ]
    }))
}

#[tokio::test]
async fn test_registers_normalized_routes() {
    let mock = MockService::accepting_everything();
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();

    docs.service().ensure_started().await.unwrap();
    assert_eq!(docs.service().state(), ServiceState::Ready);

    let outcome = docs.register(&hono_source()).wait().await;
    assert_eq!(outcome, RegistrationOutcome::Registered { attempts: 1 });

    let registrations = mock.requests_to(REGISTER_PATH);
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].method, "POST");
    assert!(registrations[0]
        .content_type
        .as_deref()
        .unwrap_or_default()
        .starts_with("application/json"));

    let body: serde_json::Value = serde_json::from_str(&registrations[0].body).unwrap();
    assert_eq!(
        body,
        json!({
            "routes": [
                {"method": "GET", "path": "/users", "handler": "(c) => c.json(users)"},
                {"method": "POST", "path": "/users/:id/like", "handler": "(c) => c.json(post)"}
            ],
            "port": 3000
        })
    );
}

#[tokio::test]
async fn test_empty_batch_is_still_sent() {
    let mock = MockService::accepting_everything();
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();

    docs.registration()
        .register_now(&RouteBatch::new(Vec::new(), 3000))
        .await
        .unwrap();

    let registrations = mock.requests_to(REGISTER_PATH);
    assert_eq!(registrations.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&registrations[0].body).unwrap();
    assert_eq!(body, json!({"routes": [], "port": 3000}));
}

#[tokio::test]
async fn test_registration_waits_for_readiness() {
    let mock = MockService::accepting_everything();
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();

    let handle = docs.register(&hono_source());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mock.requests_to(REGISTER_PATH).is_empty());

    docs.service().ensure_started().await.unwrap();

    match handle.wait().await {
        RegistrationOutcome::Registered { attempts } => assert!(attempts > 1),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let urls: Vec<String> = mock.requests().into_iter().map(|r| r.url).collect();
    let probe = urls.iter().position(|u| u == "/health").unwrap();
    let register = urls.iter().position(|u| u == REGISTER_PATH).unwrap();
    assert!(probe < register);
}

#[tokio::test]
async fn test_readiness_wakes_deferred_registration() {
    let mock = MockService::accepting_everything();
    let mut config = mock.config();
    config.retry.initial_delay_ms = 30_000;
    config.retry.max_delay_ms = 30_000;
    let docs = AtomicDocs::new(config, 3000).unwrap();

    let handle = docs.register(&hono_source());
    tokio::time::sleep(Duration::from_millis(50)).await;
    docs.service().ensure_started().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("registration should not wait out the retry delay");
    assert_eq!(outcome, RegistrationOutcome::Registered { attempts: 2 });
}

#[tokio::test]
async fn test_rejected_registration_is_not_retried() {
    let mock = MockService::start(|r| {
        if r.url == REGISTER_PATH {
            (400, "text/plain", b"bad routes".to_vec())
        } else {
            (200, "text/plain", b"ok".to_vec())
        }
    });
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();
    docs.service().ensure_started().await.unwrap();

    let outcome = docs.register(&hono_source()).wait().await;

    assert_eq!(outcome, RegistrationOutcome::Rejected { status: 400 });
    assert_eq!(mock.requests_to(REGISTER_PATH).len(), 1);
}

#[tokio::test]
async fn test_proxy_relays_docs_json() {
    let openapi = br#"{"openapi":"3.0.0","paths":{"/users":{}}}"#;
    let mock = MockService::start(move |_| (200, "application/json", openapi.to_vec()));
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();

    let ProxyOutcome::Respond(response) = docs.proxy().handle("/docs/json").await else {
        panic!("docs json path was not intercepted");
    };

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    assert_eq!(response.body().as_slice(), &openapi[..]);

    let forwarded = mock.requests_to("/docs/json");
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].method, "GET");
    assert_eq!(forwarded[0].app_port.as_deref(), Some("3000"));
}

#[tokio::test]
async fn test_proxy_relays_error_status() {
    let mock = MockService::start(|_| (404, "text/html", b"<p>No routes registered</p>".to_vec()));
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();

    let ProxyOutcome::Respond(response) = docs.proxy().handle("/docs").await else {
        panic!("docs path was not intercepted");
    };

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/html");
    assert_eq!(response.body().as_slice(), b"<p>No routes registered</p>");
}

#[tokio::test]
async fn test_proxy_relays_redirect_without_following() {
    let mock = MockService::start_with_headers(|r| {
        if r.url == "/docs" {
            (
                (302, "text/html", b"moved".to_vec()),
                vec![("Location", "/elsewhere")],
            )
        } else {
            ((200, "text/html", b"target page".to_vec()), Vec::new())
        }
    });
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();

    let ProxyOutcome::Respond(response) = docs.proxy().handle("/docs").await else {
        panic!("docs path was not intercepted");
    };

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.body().as_slice(), b"moved");
    assert!(mock.requests_to("/elsewhere").is_empty());
}

#[tokio::test]
async fn test_proxy_rejects_oversized_body() {
    let mock = MockService::start(|_| (200, "text/html", vec![b'x'; 4096]));
    let mut config = mock.config();
    config.docs.max_body_bytes = 1024;
    let docs = AtomicDocs::new(config, 3000).unwrap();

    let ProxyOutcome::Respond(response) = docs.proxy().handle("/docs").await else {
        panic!("docs path was not intercepted");
    };

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.body().as_slice(), TOO_LARGE_BODY.as_bytes());
}

#[tokio::test]
async fn test_app_requests_never_reach_service() {
    let mock = MockService::accepting_everything();
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();
    let request = Request::builder().uri("/users/7").body(()).unwrap();

    let response = docs
        .proxy()
        .call(request, |_| async { Response::new(b"user 7".to_vec()) })
        .await;

    assert_eq!(response.body().as_slice(), b"user 7");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_shared_service_scopes_by_app_port() {
    let mock = MockService::accepting_everything();
    let config = mock.config();
    let service = Arc::new(ServiceHandle::new(&config).unwrap());
    let api = AtomicDocs::with_service(config.clone(), 3000, Arc::clone(&service));
    let admin = AtomicDocs::with_service(config, 4000, Arc::clone(&service));

    api.start().await.unwrap();
    assert_eq!(service.state(), ServiceState::Ready);

    let api_source = hono_source();
    let admin_source = HonoSource::new(vec![RouteDescriptor::new("DELETE", "/admin/:id", "")]);
    assert!(matches!(
        api.register(&api_source).wait().await,
        RegistrationOutcome::Registered { .. }
    ));
    assert!(matches!(
        admin.register(&admin_source).wait().await,
        RegistrationOutcome::Registered { .. }
    ));
    admin.proxy().handle("/docs").await;

    let ports: Vec<u64> = mock
        .requests_to(REGISTER_PATH)
        .iter()
        .map(|r| serde_json::from_str::<serde_json::Value>(&r.body).unwrap()["port"].as_u64().unwrap())
        .collect();
    assert_eq!(ports, vec![3000, 4000]);
    assert_eq!(mock.requests_to("/docs")[0].app_port.as_deref(), Some("4000"));
}

#[tokio::test]
async fn test_shutdown_marks_service_unavailable() {
    let mock = MockService::accepting_everything();
    let docs = AtomicDocs::new(mock.config(), 3000).unwrap();
    docs.service().ensure_started().await.unwrap();

    docs.shutdown().await;

    assert_eq!(docs.service().state(), ServiceState::Unavailable);
}
