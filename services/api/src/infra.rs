use lead_market::config::AppConfig;
use lead_market::marketplace::{
    InMemoryMarketStore, JwtIdentityGate, MarketplaceService, PaymentVerifier, WorkflowConfig,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type Marketplace = MarketplaceService<InMemoryMarketStore, JwtIdentityGate>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Marketplace wired to the process-local store and the configured secrets.
pub(crate) fn build_marketplace(
    config: &AppConfig,
    store: Arc<InMemoryMarketStore>,
) -> Arc<Marketplace> {
    let identity = Arc::new(JwtIdentityGate::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.audience.as_deref(),
    ));
    let payments = PaymentVerifier::new(config.payments.key_secret.clone());
    let workflow = WorkflowConfig {
        max_applications_per_lead: config.market.max_applications_per_lead,
    };

    Arc::new(MarketplaceService::new(store, identity, payments, workflow))
}
