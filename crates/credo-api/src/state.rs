use std::sync::Arc;
use std::time::Duration;

use credo_auth::Authenticator;
use credo_core::{EnvelopeKms, Kms};
use credo_store::Store;

use crate::metrics::Metrics;
use crate::middleware::RateLimiter;
use crate::settings::Settings;

/// Shared application state across all routes and middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub settings: Arc<Settings>,
    pub kms: Arc<dyn Kms>,
    pub authenticator: Arc<Authenticator>,
    pub http: reqwest::Client,
    pub metrics: Arc<Metrics>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(settings: Settings, store: Store) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let kms: Arc<dyn Kms> = Arc::new(EnvelopeKms::from_secret(&settings.secret_key));
        let authenticator = Arc::new(Authenticator::new(settings.auth_config(), http.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(
            settings.rate_limit_per_minute,
            Duration::from_secs(60),
        ));

        Self {
            store: Arc::new(store),
            settings: Arc::new(settings),
            kms,
            authenticator,
            http,
            metrics: Arc::new(Metrics::default()),
            rate_limiter,
        }
    }
}
