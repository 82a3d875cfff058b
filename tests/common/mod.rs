//! Shared fixtures for the HTTP-level integration tests.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use homelift_server::auth::generate_access_token;
use homelift_server::build_router;
use homelift_server::config::{Config, Environment, PaymentConfig};
use homelift_server::payment::gateway::{GatewayError, IntentRequest, PaymentGateway, PaymentIntent};
use homelift_server::state::AppState;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Gateway double that hands out sequential intent ids
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicU64,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError> {
        if request.amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(request.amount));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentIntent {
            id: format!("pi_test_{}", n),
            client_secret: format!("pi_test_{}_secret", n),
        })
    }
}

pub fn test_config(system_user_id: Option<i64>, webhook_secret: Option<&str>) -> Config {
    Config {
        database_url: "postgresql://localhost/homelift_test".to_string(),
        environment: Environment::Development,
        port: 0,
        db_max_connections: 5,
        cors_allowed_origins: Some("http://localhost:3000".to_string()),
        log_level: "debug".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        system_user_id,
        payment: PaymentConfig {
            secret_key: String::new(),
            api_base: "http://localhost:12111".to_string(),
            webhook_secret: webhook_secret.map(str::to_string),
            webhook_tolerance_seconds: 300,
            currency: "inr".to_string(),
        },
    }
}

/// Router over `pool` with the production middleware stack
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config(None, None))
}

pub fn build_test_app_with(pool: PgPool, config: Config) -> Router {
    let state = AppState::new(pool, &config, Arc::new(FakeGateway::default()));
    build_router(state, &config)
}

pub fn token_for(user_id: i64) -> String {
    generate_access_token(user_id, JWT_SECRET, 3600).unwrap()
}

pub fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

/// Decimal field of a JSON body, serialized as a string
pub fn json_dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => dec(s),
        Value::Number(n) => dec(&n.to_string()),
        other => panic!("not a decimal: {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn patch_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

async fn insert_user(pool: &PgPool, username: &str, is_staff: bool, is_provider: bool) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO users (username, email, first_name, last_name, is_staff, is_provider)
        VALUES ($1, $2, $3, 'Tester', $4, $5)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(format!("{}@example.com", username))
    .bind(username)
    .bind(is_staff)
    .bind(is_provider)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_user(pool: &PgPool, username: &str) -> i64 {
    insert_user(pool, username, false, false).await
}

pub async fn create_admin(pool: &PgPool, username: &str) -> i64 {
    insert_user(pool, username, true, false).await
}

/// Approved, active provider offering each of `service_ids`
pub async fn create_provider(pool: &PgPool, username: &str, service_ids: &[i64]) -> i64 {
    let user_id = insert_user(pool, username, false, true).await;
    let details_id: i64 = sqlx::query_scalar(
        "INSERT INTO provider_details (user_id, is_active, approved_at) VALUES ($1, TRUE, NOW()) RETURNING id",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap();

    for service_id in service_ids {
        sqlx::query("INSERT INTO provider_services (provider_id, service_id) VALUES ($1, $2)")
            .bind(details_id)
            .bind(service_id)
            .execute(pool)
            .await
            .unwrap();
    }

    user_id
}

pub async fn create_service(pool: &PgPool, name: &str, price: &str) -> i64 {
    let category_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO categories (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(format!("{} category", name))
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query_scalar(
        "INSERT INTO services (name, category_id, price) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(category_id)
    .bind(dec(price))
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn create_address(pool: &PgPool, user_id: i64) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO addresses (user_id, address_line, city, state, postal_code)
        VALUES ($1, '12 MG Road', 'Pune', 'Maharashtra', '411001')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub struct BookingFixture {
    pub owner_id: i64,
    pub service_id: i64,
    pub price: &'static str,
    pub advance: &'static str,
    pub status: &'static str,
    pub provider_id: Option<i64>,
    pub is_advance_paid: bool,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl BookingFixture {
    /// Paid, pending, unassigned booking at 2030-05-01 10:00
    pub fn paid(owner_id: i64, service_id: i64) -> Self {
        Self {
            owner_id,
            service_id,
            price: "1000.00",
            advance: "50.00",
            status: "pending",
            provider_id: None,
            is_advance_paid: true,
            date: NaiveDate::from_ymd_opt(2030, 5, 1).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        }
    }

    pub async fn insert(self, pool: &PgPool) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO bookings (
                user_id, service_id, provider_id, full_name, phone,
                booking_date, booking_time, price, advance, status, is_advance_paid
            )
            VALUES ($1, $2, $3, 'Asha Kulkarni', '9876543210', $4, $5, $6, $7, $8::booking_status, $9)
            RETURNING id
            "#,
        )
        .bind(self.owner_id)
        .bind(self.service_id)
        .bind(self.provider_id)
        .bind(self.date)
        .bind(self.time)
        .bind(dec(self.price))
        .bind(dec(self.advance))
        .bind(self.status)
        .bind(self.is_advance_paid)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}

pub async fn fund_wallet(pool: &PgPool, user_id: i64, amount: &str) {
    sqlx::query(
        r#"
        INSERT INTO wallets (user_id, balance) VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET balance = EXCLUDED.balance
        "#,
    )
    .bind(user_id)
    .bind(dec(amount))
    .execute(pool)
    .await
    .unwrap();
}

pub async fn wallet_balance(pool: &PgPool, user_id: i64) -> Decimal {
    sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .unwrap()
        .unwrap_or(Decimal::ZERO)
}

pub async fn notification_titles(pool: &PgPool, recipient_id: i64) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT COALESCE(title, '') FROM notifications WHERE recipient_id = $1 ORDER BY id",
    )
    .bind(recipient_id)
    .fetch_all(pool)
    .await
    .unwrap()
}
