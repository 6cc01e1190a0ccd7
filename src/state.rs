use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::directory::UserDirectory;
use crate::engine::service::ShipmentService;
use crate::notify::BroadcastNotifier;
use crate::observability::metrics::Metrics;

/// Everything request handlers need, built once by the composition root.
pub struct AppState {
    pub service: ShipmentService,
    pub users: Arc<dyn UserDirectory>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<BroadcastNotifier>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        service: ShipmentService,
        users: Arc<dyn UserDirectory>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<BroadcastNotifier>,
        metrics: Metrics,
    ) -> Self {
        Self {
            service,
            users,
            identity,
            notifier,
            metrics,
        }
    }
}
