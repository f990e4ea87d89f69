use delaymon_common::types::DelayAlert;

/// Which alerts a sink receives.
#[derive(Debug, Clone, Default)]
pub struct SinkRoute {
    pub sink_index: usize,
    /// Only forward alerts whose bucket label is listed; empty means all
    pub labels: Vec<String>,
    /// Drop alerts of an entity that keeps flapping, except the one where
    /// flapping starts
    pub mute_flapping: bool,
}

impl SinkRoute {
    pub fn new(sink_index: usize) -> Self {
        Self {
            sink_index,
            ..Self::default()
        }
    }

    pub fn should_send(&self, alert: &DelayAlert) -> bool {
        if self.mute_flapping && alert.flapping && !alert.begin_flapping {
            return false;
        }
        self.labels.is_empty() || self.labels.iter().any(|l| l == &alert.label)
    }
}
