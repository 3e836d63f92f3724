use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_placed_total: IntCounterVec,
    pub assignments_open: IntGauge,
    pub accept_attempts_total: IntCounterVec,
    pub status_transitions_total: IntCounterVec,
    pub deliveries_total: IntCounter,
    pub ws_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_placed_total = IntCounterVec::new(
            Opts::new("orders_placed_total", "Orders placed by payment method"),
            &["payment_method"],
        )
        .expect("valid orders_placed_total metric");

        let assignments_open =
            IntGauge::new("assignments_open", "Delivery assignments currently open")
                .expect("valid assignments_open metric");

        let accept_attempts_total = IntCounterVec::new(
            Opts::new(
                "accept_attempts_total",
                "Assignment acceptance attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid accept_attempts_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Shop order status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let deliveries_total =
            IntCounter::new("deliveries_total", "Shop orders marked delivered")
                .expect("valid deliveries_total metric");

        let ws_connections =
            IntGauge::new("ws_connections", "Live push-channel connections")
                .expect("valid ws_connections metric");

        registry
            .register(Box::new(orders_placed_total.clone()))
            .expect("register orders_placed_total");
        registry
            .register(Box::new(assignments_open.clone()))
            .expect("register assignments_open");
        registry
            .register(Box::new(accept_attempts_total.clone()))
            .expect("register accept_attempts_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(deliveries_total.clone()))
            .expect("register deliveries_total");
        registry
            .register(Box::new(ws_connections.clone()))
            .expect("register ws_connections");

        Self {
            registry,
            orders_placed_total,
            assignments_open,
            accept_attempts_total,
            status_transitions_total,
            deliveries_total,
            ws_connections,
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
