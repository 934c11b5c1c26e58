//! Active alert set carried across poll cycles.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::Serialize;

use super::Alert;

// ---

/// How the active set evolves between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPolicy {
    /// The active set is exactly the current cycle's ids; both appearances
    /// and resolutions are reported.
    #[default]
    Resolving,
    /// Ids accumulate until a cycle produces no alerts at all, which clears
    /// the set. Ids that vanish from a non-empty cycle stay active.
    Accumulate,
}

impl FromStr for AlertPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resolving" => Ok(AlertPolicy::Resolving),
            "accumulate" => Ok(AlertPolicy::Accumulate),
            other => Err(format!("unknown alert policy '{other}'")),
        }
    }
}

/// Ids that changed state in one [`AlertTracker::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertChanges {
    // ---
    /// Newly seen, in the order the alerts were produced.
    pub appeared: Vec<String>,
    /// No longer active, in id order.
    pub resolved: Vec<String>,
}

impl AlertChanges {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.resolved.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertTracker {
    // ---
    policy: AlertPolicy,
    active: BTreeSet<String>,
}

impl AlertTracker {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            active: BTreeSet::new(),
        }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn active(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// Fold one cycle's alerts into the active set.
    pub fn update(&mut self, alerts: &[Alert]) -> AlertChanges {
        // ---
        if alerts.is_empty() {
            let resolved = std::mem::take(&mut self.active).into_iter().collect();
            return AlertChanges {
                appeared: Vec::new(),
                resolved,
            };
        }

        let mut appeared = Vec::new();
        for alert in alerts {
            if self.active.insert(alert.id.clone()) {
                appeared.push(alert.id.clone());
            }
        }

        let resolved = match self.policy {
            AlertPolicy::Accumulate => Vec::new(),
            AlertPolicy::Resolving => {
                let current: BTreeSet<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
                let gone: Vec<String> = self
                    .active
                    .iter()
                    .filter(|id| !current.contains(id.as_str()))
                    .cloned()
                    .collect();
                for id in &gone {
                    self.active.remove(id);
                }
                gone
            }
        };

        AlertChanges { appeared, resolved }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::alerts::Severity;

    fn alert(id: &str) -> Alert {
        Alert {
            id: id.into(),
            severity: Severity::Warning,
            title: String::new(),
            message: String::new(),
            value: Some(1.0),
        }
    }

    fn active(t: &AlertTracker) -> Vec<&str> {
        t.active().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_cycle_clears_set() {
        // ---
        for policy in [AlertPolicy::Resolving, AlertPolicy::Accumulate] {
            let mut t = AlertTracker::new(policy);
            let changes = t.update(&[alert("A"), alert("B")]);
            assert_eq!(changes.appeared, ["A", "B"]);

            let changes = t.update(&[]);
            assert!(changes.appeared.is_empty());
            assert_eq!(changes.resolved, ["A", "B"]);
            assert!(t.active().is_empty());
        }
    }

    #[test]
    fn test_only_new_ids_reported() {
        // ---
        for policy in [AlertPolicy::Resolving, AlertPolicy::Accumulate] {
            let mut t = AlertTracker::new(policy);
            t.update(&[alert("A")]);
            let changes = t.update(&[alert("A"), alert("B")]);
            assert_eq!(changes.appeared, ["B"]);
            assert!(changes.resolved.is_empty());
        }
    }

    #[test]
    fn test_resolving_drops_vanished_ids() {
        // ---
        let mut t = AlertTracker::new(AlertPolicy::Resolving);
        t.update(&[alert("water-warning"), alert("ph-warning-low")]);
        let changes = t.update(&[alert("water-critical"), alert("ph-warning-low")]);

        assert_eq!(changes.appeared, ["water-critical"]);
        assert_eq!(changes.resolved, ["water-warning"]);
        assert_eq!(active(&t), ["ph-warning-low", "water-critical"]);
    }

    #[test]
    fn test_accumulate_keeps_vanished_ids() {
        // ---
        let mut t = AlertTracker::new(AlertPolicy::Accumulate);
        t.update(&[alert("water-warning")]);
        let changes = t.update(&[alert("water-critical")]);

        assert_eq!(changes.appeared, ["water-critical"]);
        assert!(changes.resolved.is_empty());
        assert_eq!(active(&t), ["water-critical", "water-warning"]);

        // A returning id is not re-reported while it is still held.
        let changes = t.update(&[alert("water-warning")]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_policy_parsing() {
        // ---
        assert_eq!("Resolving".parse::<AlertPolicy>().unwrap(), AlertPolicy::Resolving);
        assert_eq!("accumulate".parse::<AlertPolicy>().unwrap(), AlertPolicy::Accumulate);
        assert!("sticky".parse::<AlertPolicy>().is_err());
        assert_eq!(AlertTracker::default().policy(), AlertPolicy::Resolving);
    }
}
