use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings admitted.
pub const ADMISSIONS_TOTAL: &str = "roomly_admissions_total";

/// Counter: bookings rejected because the slot was taken.
pub const CONFLICTS_TOTAL: &str = "roomly_conflicts_total";

/// Counter: reservations cancelled (soft deletes).
pub const CANCELLATIONS_TOTAL: &str = "roomly_cancellations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: rooms in the catalog.
pub const ROOMS: &str = "roomly_rooms";

/// Gauge: non-cancelled reservations on the books.
pub const RESERVATIONS_ACTIVE: &str = "roomly_reservations_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomly_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomly_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
