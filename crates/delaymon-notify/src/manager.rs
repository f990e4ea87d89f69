use crate::routing::SinkRoute;
use crate::AlertSink;
use delaymon_common::types::DelayAlert;

/// Fans alerts out to the configured sinks.
pub struct AlertDispatcher {
    sinks: Vec<Box<dyn AlertSink>>,
    routes: Vec<SinkRoute>,
}

impl AlertDispatcher {
    pub fn new(sinks: Vec<Box<dyn AlertSink>>, routes: Vec<SinkRoute>) -> Self {
        Self { sinks, routes }
    }

    /// One unfiltered route per sink.
    pub fn broadcast(sinks: Vec<Box<dyn AlertSink>>) -> Self {
        let routes = (0..sinks.len()).map(SinkRoute::new).collect();
        Self::new(sinks, routes)
    }

    /// Sends the alert to every matching sink and returns how many accepted
    /// it. Failures are logged and not retried.
    pub async fn dispatch(&self, alert: &DelayAlert) -> usize {
        let mut delivered = 0;
        for route in &self.routes {
            if !route.should_send(alert) {
                continue;
            }

            let Some(sink) = self.sinks.get(route.sink_index) else {
                tracing::warn!(sink_index = route.sink_index, "Route points to a missing sink");
                continue;
            };

            match sink.emit(alert).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(
                    sink = sink.sink_name(),
                    rule = %alert.rule_name,
                    entity_id = alert.entity_id,
                    error = %e,
                    "Failed to deliver alert"
                ),
            }
        }
        delivered
    }

    pub fn sinks(&self) -> &[Box<dyn AlertSink>] {
        &self.sinks
    }
}
