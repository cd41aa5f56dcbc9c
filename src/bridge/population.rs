//! Player population tracking for the status channel label.

/// Placeholder replaced by the player count in the label template.
pub const COUNT_PLACEHOLDER: &str = "%count";

/// Last known population and the label currently on the status channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationState {
    pub last_known_count: Option<u32>,
    pub last_applied_label: Option<String>,
}

/// A rename the status channel needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelUpdate {
    pub label: String,
    pub count: u32,
}

/// Computes status channel labels and skips renames that change nothing.
#[derive(Debug)]
pub struct PopulationTracker {
    format: String,
    state: PopulationState,
}

impl PopulationTracker {
    /// `initial_label` is the status channel's current name, if known.
    pub fn new(format: impl Into<String>, initial_label: Option<String>) -> Self {
        Self {
            format: format.into(),
            state: PopulationState {
                last_known_count: None,
                last_applied_label: initial_label,
            },
        }
    }

    pub fn label_for(&self, count: u32) -> String {
        self.format.replace(COUNT_PLACEHOLDER, &count.to_string())
    }

    /// Returns an update only when the label would change.
    pub fn observe(&self, count: u32) -> Option<LabelUpdate> {
        let label = self.label_for(count);
        if self.state.last_applied_label.as_deref() == Some(label.as_str()) {
            return None;
        }
        Some(LabelUpdate { label, count })
    }

    /// Record a rename that succeeded.
    pub fn apply(&mut self, update: &LabelUpdate) {
        self.state.last_known_count = Some(update.count);
        self.state.last_applied_label = Some(update.label.clone());
    }

    #[cfg(test)]
    pub fn state(&self) -> &PopulationState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::DEFAULT_STATUS_FORMAT;

    #[test]
    fn test_default_label() {
        let tracker = PopulationTracker::new(DEFAULT_STATUS_FORMAT, None);
        assert_eq!(tracker.label_for(57), "🛜 Survivors Online: 57");
    }

    #[test]
    fn test_same_count_updates_once() {
        let mut tracker = PopulationTracker::new(DEFAULT_STATUS_FORMAT, None);

        let update = tracker.observe(4).unwrap();
        tracker.apply(&update);
        assert!(tracker.observe(4).is_none());

        assert_eq!(tracker.state().last_known_count, Some(4));
        assert_eq!(
            tracker.state().last_applied_label.as_deref(),
            Some("🛜 Survivors Online: 4")
        );
    }

    #[test]
    fn test_unapplied_update_is_retried() {
        let tracker = PopulationTracker::new(DEFAULT_STATUS_FORMAT, None);
        assert!(tracker.observe(4).is_some());
        // Rename failed, nothing applied
        assert!(tracker.observe(4).is_some());
        assert_eq!(tracker.state(), &PopulationState::default());
    }

    #[test]
    fn test_seeded_label_not_reapplied() {
        let tracker = PopulationTracker::new(
            DEFAULT_STATUS_FORMAT,
            Some("🛜 Survivors Online: 0".to_string()),
        );
        assert!(tracker.observe(0).is_none());
        assert_eq!(
            tracker.observe(1),
            Some(LabelUpdate {
                label: "🛜 Survivors Online: 1".to_string(),
                count: 1,
            })
        );
    }

    #[test]
    fn test_custom_format() {
        let tracker = PopulationTracker::new("players-%count", None);
        assert_eq!(tracker.label_for(12), "players-12");
    }
}
