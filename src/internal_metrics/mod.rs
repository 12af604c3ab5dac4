//! Metric descriptions for the dispatch layer.
//!
//! Metrics are emitted through the `metrics` facade at the call sites; this
//! module only registers their descriptions with whatever recorder the
//! embedding application installed.

use metrics::Unit;

/// Registers descriptions for every metric the dispatch layer emits.
pub fn describe() {
    metrics::describe_counter!(
        "destination_dispatch_total",
        Unit::Count,
        "Total number of dispatched messages, labeled by destination and outcome."
    );
    metrics::describe_histogram!(
        "destination_dispatch_duration_seconds",
        Unit::Seconds,
        "Time from dispatch to a normalized response, labeled by destination."
    );
    metrics::describe_counter!(
        "destination_client_constructions_total",
        Unit::Count,
        "Total number of transport clients built, labeled by destination."
    );
    metrics::describe_counter!(
        "destination_client_evictions_total",
        Unit::Count,
        "Total number of transport clients evicted as stale, labeled by destination."
    );
}
