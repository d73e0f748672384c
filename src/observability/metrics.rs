use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub missions_created_total: IntCounter,
    pub mission_transitions_total: IntCounterVec,
    pub drivers_available: IntGauge,
    pub quoted_price: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let missions_created_total =
            IntCounter::new("missions_created_total", "Total missions booked")
                .expect("valid missions_created_total metric");

        let mission_transitions_total = IntCounterVec::new(
            Opts::new(
                "mission_transitions_total",
                "Mission status transitions by action and outcome",
            ),
            &["action", "outcome"],
        )
        .expect("valid mission_transitions_total metric");

        let drivers_available =
            IntGauge::new("drivers_available", "Drivers currently free to take a mission")
                .expect("valid drivers_available metric");

        let quoted_price = Histogram::with_opts(
            HistogramOpts::new("quoted_price", "Prices quoted or booked, in DH").buckets(vec![
                50.0, 75.0, 100.0, 150.0, 250.0, 500.0, 1000.0, 2500.0,
            ]),
        )
        .expect("valid quoted_price metric");

        registry
            .register(Box::new(missions_created_total.clone()))
            .expect("register missions_created_total");
        registry
            .register(Box::new(mission_transitions_total.clone()))
            .expect("register mission_transitions_total");
        registry
            .register(Box::new(drivers_available.clone()))
            .expect("register drivers_available");
        registry
            .register(Box::new(quoted_price.clone()))
            .expect("register quoted_price");

        Self {
            registry,
            missions_created_total,
            mission_transitions_total,
            drivers_available,
            quoted_price,
        }
    }

    pub fn record_transition(&self, action: &str, success: bool) {
        let outcome = if success { "success" } else { "rejected" };
        self.mission_transitions_total
            .with_label_values(&[action, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
