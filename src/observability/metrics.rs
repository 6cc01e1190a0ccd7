use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub shipments_created_total: IntCounter,
    pub claims_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub geocode_latency_seconds: HistogramVec,
    pub notifications_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let shipments_created_total =
            IntCounter::new("shipments_created_total", "Total shipments created")
                .expect("valid shipments_created_total metric");

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Courier claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Status change attempts by target status and outcome",
            ),
            &["to", "outcome"],
        )
        .expect("valid status_transitions_total metric");

        let geocode_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "geocode_latency_seconds",
                "Latency of geocoding provider calls in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 1.5, 2.0, 5.0]),
            &["direction", "outcome"],
        )
        .expect("valid geocode_latency_seconds metric");

        let notifications_total = IntCounterVec::new(
            Opts::new("notifications_total", "Recipient notifications by outcome"),
            &["outcome"],
        )
        .expect("valid notifications_total metric");

        registry
            .register(Box::new(shipments_created_total.clone()))
            .expect("register shipments_created_total");
        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(geocode_latency_seconds.clone()))
            .expect("register geocode_latency_seconds");
        registry
            .register(Box::new(notifications_total.clone()))
            .expect("register notifications_total");

        Self {
            registry,
            shipments_created_total,
            claims_total,
            status_transitions_total,
            geocode_latency_seconds,
            notifications_total,
        }
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
