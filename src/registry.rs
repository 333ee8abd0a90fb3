//! Channel registry derived from resolved subscriptions
//!
//! Built once at startup, after the packet source has opened its session
//! and resolved what it is subscribed to. The registry defines the
//! universe of channel ids the store and the sink must track; it is never
//! mutated afterwards, so the scheduler reads it without any lock.
//!
//! # Selector Rule
//!
//! A selector of length 3 is a bare channel code with an empty location
//! (`BHE` → `..BHE`); anything longer contributes its first two characters
//! as the location code and its last three as the channel code
//! (`00BHZ` → `.00.BHZ`). Selectors shorter than three characters, and
//! groups with no selectors at all, cannot be expanded into concrete
//! channel ids and are skipped with a warning.

use crate::source::StreamSubscription;
use crate::types::ChannelId;

/// Sorted, deduplicated set of channel ids the feed is subscribed to
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    ids: Vec<ChannelId>,
}

impl ChannelRegistry {
    /// Derive the registry from resolved subscription groups
    pub fn from_subscriptions(subscriptions: &[StreamSubscription]) -> Self {
        let mut ids = Vec::new();
        for sub in subscriptions {
            if sub.selectors.is_empty() {
                tracing::warn!(
                    network = %sub.network,
                    station = %sub.station,
                    "subscription group without selectors cannot be expanded; skipping"
                );
                continue;
            }
            for selector in &sub.selectors {
                match split_selector(selector) {
                    Some((location, channel)) => {
                        ids.push(ChannelId::new(
                            sub.network.clone(),
                            sub.station.clone(),
                            location,
                            channel,
                        ));
                    }
                    None => {
                        tracing::warn!(selector = %selector, "selector too short; skipping");
                    }
                }
            }
        }
        ids.sort();
        ids.dedup();
        Self { ids }
    }

    /// The sorted channel id list
    pub fn channel_ids(&self) -> &[ChannelId] {
        &self.ids
    }

    /// Whether the registry tracks the given channel
    pub fn contains(&self, id: &ChannelId) -> bool {
        self.ids.binary_search(id).is_ok()
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Split a selector into (location, channel) per the selector-length rule
///
/// Lengths count characters, not bytes, so a selector containing
/// multi-byte text is split (or skipped) rather than panicking.
fn split_selector(selector: &str) -> Option<(String, String)> {
    let count = selector.chars().count();
    if count < 3 {
        return None;
    }
    if count == 3 {
        Some((String::new(), selector.to_string()))
    } else {
        Some((
            selector.chars().take(2).collect(),
            selector.chars().skip(count - 3).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_multiselect_scenario() {
        let subs =
            StreamSubscription::parse_multiselect("IU_KONO:BHE BHN,MN_AQU:HH?.D").unwrap();
        let registry = ChannelRegistry::from_subscriptions(&subs);
        let ids: Vec<String> = registry
            .channel_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        // `HH?.D` has length 5: location = first two chars, channel = last
        // three, per the selector-length rule.
        assert_eq!(ids, vec!["IU.KONO..BHE", "IU.KONO..BHN", "MN.AQU.HH.?.D"]);
    }

    #[test]
    fn test_registry_sorted_and_deduplicated() {
        let subs = vec![
            StreamSubscription::new("MN", "AQU", vec!["HHZ".into()]),
            StreamSubscription::new("IU", "KONO", vec!["BHZ".into(), "BHE".into()]),
            StreamSubscription::new("IU", "KONO", vec!["BHZ".into()]),
        ];
        let registry = ChannelRegistry::from_subscriptions(&subs);
        let ids: Vec<String> = registry
            .channel_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["IU.KONO..BHE", "IU.KONO..BHZ", "MN.AQU..HHZ"]);
    }

    #[test]
    fn test_registry_five_char_selector_location_split() {
        let subs = vec![StreamSubscription::new("GE", "APE", vec!["00BHZ".into()])];
        let registry = ChannelRegistry::from_subscriptions(&subs);
        assert_eq!(registry.channel_ids()[0].to_string(), "GE.APE.00.BHZ");
    }

    #[test]
    fn test_registry_skips_unexpandable_groups() {
        let subs = vec![
            StreamSubscription::new("GE", "APE", vec![]),
            StreamSubscription::new("IU", "KONO", vec!["BH".into(), "BHZ".into()]),
        ];
        let registry = ChannelRegistry::from_subscriptions(&subs);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&ChannelId::new("IU", "KONO", "", "BHZ")));
    }

    #[test]
    fn test_registry_non_ascii_selector_splits_by_chars() {
        // Selector lengths are measured in characters; multi-byte text
        // must not crash the expansion
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BÉHZ").unwrap();
        let registry = ChannelRegistry::from_subscriptions(&subs);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.channel_ids()[0].to_string(), "IU.KONO.BÉ.ÉHZ");

        // A two-character multi-byte selector is skipped, not a panic
        let subs = StreamSubscription::parse_multiselect("IU_KONO:BÉ").unwrap();
        let registry = ChannelRegistry::from_subscriptions(&subs);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_contains() {
        let subs = vec![StreamSubscription::new("IU", "KONO", vec!["BHE".into()])];
        let registry = ChannelRegistry::from_subscriptions(&subs);
        assert!(registry.contains(&ChannelId::new("IU", "KONO", "", "BHE")));
        assert!(!registry.contains(&ChannelId::new("XX", "YYY", "", "ZZZ")));
        assert!(!registry.is_empty());
    }
}
