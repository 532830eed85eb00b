//! In-process harness: the full router over the in-memory store with stub
//! text-generation and payment providers.

#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use chatgate::{
    config::Config,
    error::{AppError, Result},
    models::payment::{CreatedPayment, PaymentIntent, PaymentRecord},
    providers::{gemini::TextGenerator, paypal::PaymentGateway},
    repositories::{memory::MemoryStore, user::UserRepository},
    routes,
    state::AppState,
};

pub const PASSWORD: &str = "correct-horse-battery";

/// Answers every message with a fixed prefix.
pub struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, message: &str) -> Result<String> {
        Ok(format!("You said: {}", message))
    }
}

/// Always fails like an unreachable endpoint.
pub struct DownGenerator;

#[async_trait]
impl TextGenerator for DownGenerator {
    async fn generate(&self, _message: &str) -> Result<String> {
        Err(AppError::Upstream("connection refused".to_string()))
    }
}

/// Knows a single payment, `PAY-1`.
///
/// Executing it yields `approved` or `failed`. Once approved, `find` reports
/// it as `approved` and a second execute is refused, as the processor does.
pub struct FakeGateway {
    pub approve: bool,
    executed: AtomicBool,
    execute_calls: AtomicUsize,
}

pub const PAYMENT_ID: &str = "PAY-1";

impl FakeGateway {
    pub fn new(approve: bool) -> Self {
        Self {
            approve,
            executed: AtomicBool::new(false),
            execute_calls: AtomicUsize::new(0),
        }
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create(&self, _intent: &PaymentIntent) -> Result<CreatedPayment> {
        Ok(CreatedPayment {
            id: PAYMENT_ID.to_string(),
            approval_url: format!("https://paypal.test/approve?token={}", PAYMENT_ID),
        })
    }

    async fn find(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        let state = if self.executed.load(Ordering::SeqCst) {
            "approved"
        } else {
            "created"
        };
        Ok((payment_id == PAYMENT_ID).then(|| PaymentRecord {
            id: payment_id.to_string(),
            state: state.to_string(),
        }))
    }

    async fn execute(&self, payment_id: &str, _payer_id: &str) -> Result<PaymentRecord> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        if self.executed.load(Ordering::SeqCst) {
            return Err(AppError::Payment("PAYMENT_ALREADY_DONE".to_string()));
        }
        if self.approve {
            self.executed.store(true, Ordering::SeqCst);
        }
        Ok(PaymentRecord {
            id: payment_id.to_string(),
            state: if self.approve { "approved" } else { "failed" }.to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub gateway: Arc<FakeGateway>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(Arc::new(EchoGenerator), true)
    }

    pub fn with(generator: Arc<dyn TextGenerator>, approve_payments: bool) -> Self {
        let store = MemoryStore::new();
        let gateway = Arc::new(FakeGateway::new(approve_payments));
        let state = AppState::from_parts(
            Config::default(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            generator,
            gateway.clone(),
        );

        Self {
            router: routes::router(state),
            store,
            gateway,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            body,
            set_cookie,
        }
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, Some(body), cookie).await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, None, cookie).await
    }

    /// Registers `email` with `PASSWORD`, logs in and returns the cookie
    /// header value for the new session.
    pub async fn signed_in(&self, email: &str) -> String {
        let register = self
            .post(
                "/api/register",
                serde_json::json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(register.status, StatusCode::CREATED);

        let login = self
            .post(
                "/api/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
        login.session_cookie().expect("login sets a session cookie")
    }

    pub async fn token_count(&self, email: &str) -> i32 {
        self.store
            .find_by_email(email)
            .await
            .unwrap()
            .expect("user exists")
            .token_count
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookie: Option<String>,
}

impl TestResponse {
    /// `session_id=<uuid>` from the `Set-Cookie` header, if one was set.
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookie
            .as_deref()
            .and_then(|value| value.split(';').next())
            .filter(|pair| pair.starts_with("session_id=") && pair.len() > "session_id=".len())
            .map(str::to_string)
    }
}
