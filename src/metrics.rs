use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

use crate::error::ProviderError;
use crate::router::ResourceKind;

/// Metric names and recording helpers for provider operations
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    /// Provider operations by operation, kind and status
    pub operations_total: &'static str,
    /// Provider operation latency
    pub operation_duration: &'static str,
    /// Monitor dedup lookups by outcome
    pub monitor_dedup_total: &'static str,
    /// Observer deliveries
    pub notifications_total: &'static str,
    /// Failed operations by error kind
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            operations_total: "rapidsms_provider_operations_total",
            operation_duration: "rapidsms_provider_operation_duration_seconds",
            monitor_dedup_total: "rapidsms_provider_monitor_dedup_total",
            notifications_total: "rapidsms_provider_notifications_total",
            errors_total: "rapidsms_provider_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Register descriptions with whatever recorder is installed
    pub fn describe(&self) {
        describe_counter!(self.operations_total, "Provider operations");
        describe_histogram!(self.operation_duration, Unit::Seconds, "Provider operation latency");
        describe_counter!(self.monitor_dedup_total, "Monitor insert-if-absent outcomes");
        describe_counter!(self.notifications_total, "Change notifications delivered to observers");
        describe_counter!(self.errors_total, "Failed provider operations");
    }

    /// Record one insert/query/delete/update
    pub fn record_operation(
        &self,
        operation: &'static str,
        kind: Option<ResourceKind>,
        duration: Duration,
        error: Option<&ProviderError>,
    ) {
        let kind = kind.map_or("unrouted", ResourceKind::path);
        let status = if error.is_some() { "error" } else { "success" };

        counter!(self.operations_total, "operation" => operation, "kind" => kind, "status" => status).increment(1);
        histogram!(self.operation_duration, "operation" => operation, "kind" => kind).record(duration.as_secs_f64());

        if let Some(error) = error {
            counter!(self.errors_total, "operation" => operation, "type" => error.kind().as_str()).increment(1);
        }
    }

    /// Record a dedup lookup
    pub fn record_dedup(&self, created: bool) {
        let outcome = if created { "created" } else { "existing" };
        counter!(self.monitor_dedup_total, "outcome" => outcome).increment(1);
    }

    /// Record observer deliveries for one change
    pub fn record_notification(&self, kind: ResourceKind, delivered: usize) {
        counter!(self.notifications_total, "kind" => kind.path()).increment(delivered as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::default();
        assert_eq!(collector.operations_total, "rapidsms_provider_operations_total");
        assert!(collector.operation_duration.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let collector = MetricsCollector::default();
        collector.describe();
        collector.record_operation("insert", Some(ResourceKind::Monitor), Duration::from_millis(3), None);
        collector.record_operation(
            "query",
            None,
            Duration::from_millis(1),
            Some(&ProviderError::UnknownResource("bogus".into())),
        );
        collector.record_dedup(true);
        collector.record_notification(ResourceKind::Message, 2);
    }
}
