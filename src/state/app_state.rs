//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::Authenticator;
use crate::booking::BookingService;
use crate::config::Config;
use crate::notification::{NotificationService, Notifier};
use crate::payment::{PaymentGateway, PaymentService};
use crate::provider::ProviderService;
use crate::wallet::WalletService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub authenticator: Arc<Authenticator>,
    pub booking_service: Arc<BookingService>,
    pub payment_service: Arc<PaymentService>,
    pub wallet_service: Arc<WalletService>,
    pub notification_service: Arc<NotificationService>,
    pub provider_service: Arc<ProviderService>,
    pub notifier: Arc<Notifier>,
    pub ws_state: WsState,
}

impl AppState {
    /// Wire every service onto one pool
    pub fn new(db_pool: PgPool, config: &Config, gateway: Arc<dyn PaymentGateway>) -> Self {
        let ws_state = WsState::new();
        let notifier = Arc::new(Notifier::new(
            db_pool.clone(),
            ws_state.clone(),
            config.system_user_id,
        ));

        let booking_service = BookingService::new(db_pool.clone(), notifier.clone());
        let payment_service = PaymentService::new(
            db_pool.clone(),
            gateway,
            booking_service.clone(),
            notifier.clone(),
            config.payment.clone(),
        );

        Self {
            authenticator: Arc::new(Authenticator::new(
                db_pool.clone(),
                config.jwt_secret.clone(),
            )),
            booking_service: Arc::new(booking_service),
            payment_service: Arc::new(payment_service),
            wallet_service: Arc::new(WalletService::new(db_pool.clone())),
            notification_service: Arc::new(NotificationService::new(db_pool.clone())),
            provider_service: Arc::new(ProviderService::new(db_pool.clone(), notifier.clone())),
            notifier,
            ws_state,
            db_pool,
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<Authenticator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.authenticator.clone()
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.booking_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_service.clone()
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<NotificationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.notification_service.clone()
    }
}

impl FromRef<AppState> for Arc<ProviderService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.provider_service.clone()
    }
}
