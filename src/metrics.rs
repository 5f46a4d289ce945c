// ABOUTME: Counter helpers on the metrics facade for core events.
// ABOUTME: Exporter installation is left to the embedding application.

use crate::endpoint::EndpointKind;

/// Record one successfully executed UI action.
pub fn record_action(kind: &'static str) {
    metrics::counter!("vigil_actions_total", "kind" => kind).increment(1);
}

/// Record one failed or timed-out UI action.
pub fn record_action_error() {
    metrics::counter!("vigil_action_errors_total").increment(1);
}

/// Record one message entering the dispatch pipeline.
pub fn record_message(kind: EndpointKind) {
    metrics::counter!("vigil_messages_total", "endpoint_kind" => kind.to_string()).increment(1);
}

/// Record one message vetoed by a filter plugin.
pub fn record_filtered() {
    metrics::counter!("vigil_messages_filtered_total").increment(1);
}

/// Record one message discarded because its source is unregistered.
pub fn record_unknown_endpoint() {
    metrics::counter!("vigil_unknown_endpoint_total").increment(1);
}

/// Record one plugin invocation that returned an error.
pub fn record_plugin_error(kind: &'static str) {
    metrics::counter!("vigil_plugin_errors_total", "plugin_kind" => kind).increment(1);
}
