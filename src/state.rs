use crate::engine::store::DispatchStore;
use crate::observability::metrics::Metrics;
use crate::pricing::PricingConfig;

pub struct AppState {
    pub store: DispatchStore,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pricing: PricingConfig, event_buffer_size: usize) -> Self {
        Self {
            store: DispatchStore::new(pricing, event_buffer_size),
            metrics: Metrics::new(),
        }
    }

    pub fn refresh_driver_gauge(&self) {
        self.metrics
            .drivers_available
            .set(self.store.available_driver_count() as i64);
    }
}
