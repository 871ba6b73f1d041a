use std::net::SocketAddr;

use crate::command::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "chauffeur_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "chauffeur_command_duration_seconds";

// ── Booking arbitration ─────────────────────────────────────────

/// Counter: bookings and blocks committed to the store. Labels: kind.
pub const BOOKINGS_COMMITTED_TOTAL: &str = "chauffeur_bookings_committed_total";

/// Counter: writes rejected because the interval was taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "chauffeur_booking_conflicts_total";

/// Counter: availability answered from the bare template after a store failure.
pub const AVAILABILITY_DEGRADED_TOTAL: &str = "chauffeur_availability_degraded_total";

// ── Routing ─────────────────────────────────────────────────────

pub const ROUTE_CACHE_HITS_TOTAL: &str = "chauffeur_route_cache_hits_total";
pub const ROUTE_CACHE_MISSES_TOTAL: &str = "chauffeur_route_cache_misses_total";
pub const ROUTE_CACHE_EXPIRED_TOTAL: &str = "chauffeur_route_cache_expired_total";

/// Counter: calls to the routing collaborator. Labels: status.
pub const ROUTE_COMPUTATIONS_TOTAL: &str = "chauffeur_route_computations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "chauffeur_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "chauffeur_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "chauffeur_connections_rejected_total";

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

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Availability { .. } => "availability",
        Command::Quote { .. } => "quote",
        Command::QuoteTier { .. } => "quote_tier",
        Command::Book { .. } => "book",
        Command::Block { .. } => "block",
        Command::Reschedule { .. } => "reschedule",
        Command::Transition { .. } => "transition",
        Command::Cancel { .. } => "cancel",
        Command::List { .. } => "list",
        Command::ClearRouteCache => "clear_route_cache",
    }
}
