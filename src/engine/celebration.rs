//! New-tier-reached detection
//!
//! Each authenticated session owns a [`CelebrationTracker`]. Every time the
//! owner looks at their own totals the tracker is fed the fresh total; it
//! reports a [`Celebration`] only when a threshold above the last celebrated
//! one has been crossed. Supervisors looking at other people's numbers never
//! touch it.

use dashmap::DashMap;
use serde::Serialize;

use super::tier::{CommissionPolicy, Tier};

/// One-time congratulation for reaching a new threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Celebration {
    pub threshold: f64,
    pub tier: Tier,
    pub message: String,
}

/// Per-session celebration state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CelebrationTracker {
    last_celebrated: f64,
}

impl CelebrationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_celebrated(&self) -> f64 {
        self.last_celebrated
    }

    /// Feed a freshly computed total. Fires at most once per threshold.
    pub fn observe(&mut self, total: f64, policy: CommissionPolicy) -> Option<Celebration> {
        let band = policy.band_for(total);
        if band.threshold <= self.last_celebrated {
            return None;
        }

        self.last_celebrated = band.threshold;
        Some(Celebration {
            threshold: band.threshold,
            tier: band.tier,
            message: format!(
                "CONGRATULATIONS! {:.0}K TARGET HIT!",
                band.threshold / 1000.0
            ),
        })
    }
}

/// Trackers for every live session, keyed by session id
#[derive(Debug, Default)]
pub struct CelebrationRegistry {
    trackers: DashMap<String, CelebrationTracker>,
}

impl CelebrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the session's tracker against `total`, creating it on first use
    pub fn observe(
        &self,
        session_id: &str,
        total: f64,
        policy: CommissionPolicy,
    ) -> Option<Celebration> {
        let mut tracker = self.trackers.entry(session_id.to_string()).or_default();
        tracker.observe(total, policy)
    }

    /// Drop a session's state (logout)
    pub fn end_session(&self, session_id: &str) {
        self.trackers.remove(session_id);
    }

    /// Ids of every session currently holding a tracker
    pub fn session_ids(&self) -> Vec<String> {
        self.trackers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop the trackers of sessions for which `keep` returns false
    pub fn retain_sessions<F>(&self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.trackers.retain(|session_id, _| keep(session_id));
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_threshold() {
        let mut tracker = CelebrationTracker::new();
        let policy = CommissionPolicy::Progressive;

        let fired: Vec<bool> = [10_000.0, 60_000.0, 60_000.0, 90_000.0]
            .iter()
            .map(|total| tracker.observe(*total, policy).is_some())
            .collect();

        assert_eq!(fired, vec![false, true, false, true]);
        assert_eq!(tracker.last_celebrated(), 80_000.0);
    }

    #[test]
    fn test_celebration_payload() {
        let mut tracker = CelebrationTracker::new();
        let celebration = tracker
            .observe(52_000.0, CommissionPolicy::Progressive)
            .unwrap();

        assert_eq!(celebration.threshold, 50_000.0);
        assert_eq!(celebration.tier, Tier::Silver);
        assert_eq!(celebration.message, "CONGRATULATIONS! 50K TARGET HIT!");
    }

    #[test]
    fn test_lower_total_never_refires() {
        let mut tracker = CelebrationTracker::new();
        let policy = CommissionPolicy::Progressive;

        assert!(tracker.observe(120_000.0, policy).is_some());
        // A sale got deleted and the total dropped a band
        assert!(tracker.observe(85_000.0, policy).is_none());
        assert!(tracker.observe(120_000.0, policy).is_none());
        assert!(tracker.observe(150_000.0, policy).is_some());
    }

    #[test]
    fn test_jumping_several_bands_fires_once() {
        let mut tracker = CelebrationTracker::new();
        let celebration = tracker
            .observe(160_000.0, CommissionPolicy::Progressive)
            .unwrap();
        assert_eq!(celebration.tier, Tier::Diamond);
        assert!(tracker
            .observe(160_000.0, CommissionPolicy::Progressive)
            .is_none());
    }

    #[test]
    fn test_registry_isolates_sessions() {
        let registry = CelebrationRegistry::new();
        let policy = CommissionPolicy::Progressive;

        assert!(registry.observe("s1", 55_000.0, policy).is_some());
        assert!(registry.observe("s1", 55_000.0, policy).is_none());
        // Same user logged in elsewhere gets their own celebration
        assert!(registry.observe("s2", 55_000.0, policy).is_some());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_resets_on_new_session() {
        let registry = CelebrationRegistry::new();
        let policy = CommissionPolicy::Progressive;

        assert!(registry.observe("s1", 55_000.0, policy).is_some());
        registry.end_session("s1");
        assert!(registry.is_empty());
        assert!(registry.observe("s1", 55_000.0, policy).is_some());
    }

    #[test]
    fn test_retain_sessions_drops_ended_sessions() {
        let registry = CelebrationRegistry::new();
        let policy = CommissionPolicy::Progressive;
        registry.observe("live", 60_000.0, policy);
        registry.observe("gone", 60_000.0, policy);

        let mut ids = registry.session_ids();
        ids.sort();
        assert_eq!(ids, vec!["gone".to_string(), "live".to_string()]);

        registry.retain_sessions(|id| id == "live");
        assert_eq!(registry.session_ids(), vec!["live".to_string()]);
        // The surviving session keeps its marker
        assert!(registry.observe("live", 60_000.0, policy).is_none());
    }
}
