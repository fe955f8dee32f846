//! Tier and commission calculation
//!
//! Maps a cumulative sales total to a tier, the next target, the commission
//! earned and the copy shown on the status banner. Two commission policies
//! are available as named profiles; the active one comes from config.
//!
//! Commission is a step function: the rate of the band the total falls in
//! applies to the entire total, not just the part above the threshold.

use serde::{Deserialize, Serialize};

/// Default goal of the fixed-target profile
const FIXED_GOAL: f64 = 50_000.0;

/// Target shown once the top progressive band has been passed
const PROGRESSIVE_CEILING_TARGET: f64 = 200_000.0;

/// Named tier, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        }
    }

    /// Banner color (CSS hex)
    pub fn color(&self) -> &'static str {
        match self {
            Tier::Bronze => "#cd7f32",
            Tier::Silver => "#C0C0C0",
            Tier::Gold => "#FFD700",
            Tier::Platinum => "#E5E4E2",
            Tier::Diamond => "#b9f2ff",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Tier::Bronze => "🥉",
            Tier::Silver => "🥈",
            Tier::Gold => "🥇",
            Tier::Platinum => "💠",
            Tier::Diamond => "💎",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which commission table is in effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionPolicy {
    /// Fixed 50k goal split at 20/50/80/100%, flat 1% once the goal is hit
    FixedTarget,
    /// Moving target per band, 0.5% to 1.5% on the whole total
    #[default]
    Progressive,
}

impl CommissionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionPolicy::FixedTarget => "fixed_target",
            CommissionPolicy::Progressive => "progressive",
        }
    }

    /// The band table for this policy, ordered by ascending threshold
    pub fn bands(&self) -> &'static [Band; 5] {
        match self {
            CommissionPolicy::FixedTarget => &FIXED_TARGET_BANDS,
            CommissionPolicy::Progressive => &PROGRESSIVE_BANDS,
        }
    }

    /// Band containing `total`. Thresholds are inclusive on the upper band.
    pub fn band_for(&self, total: f64) -> &'static Band {
        let total = sanitize_total(total);
        let bands = self.bands();
        bands
            .iter()
            .rev()
            .find(|band| total >= band.threshold)
            .unwrap_or(&bands[0])
    }

    pub fn tier_for(&self, total: f64) -> Tier {
        self.band_for(total).tier
    }

    /// Target for the next tier; stays one band above past the top threshold
    pub fn target_for(&self, total: f64) -> f64 {
        self.band_for(total).target
    }

    pub fn rate_for(&self, total: f64) -> f64 {
        self.band_for(total).rate
    }

    /// `rate(T) * T`
    pub fn commission_for(&self, total: f64) -> f64 {
        let total = sanitize_total(total);
        self.rate_for(total) * total
    }

    /// Highest non-zero threshold at or below `total`, 0 if none reached
    pub fn threshold_reached(&self, total: f64) -> f64 {
        self.band_for(total).threshold
    }

    /// Lowest non-zero threshold; the entry bar for leaderboard messages
    pub fn first_threshold(&self) -> f64 {
        self.bands()[1].threshold
    }

    /// Evaluate everything the status banner needs for a total
    pub fn evaluate(&self, total: f64) -> TierStatus {
        let total = sanitize_total(total);
        let band = self.band_for(total);
        let commission = band.rate * total;

        TierStatus {
            total,
            tier: band.tier,
            label: band.label.to_string(),
            color: band.tier.color().to_string(),
            icon: band.icon.to_string(),
            message: band.message.to_string(),
            target: band.target,
            remaining: (band.target - total).max(0.0),
            progress: progress_fraction(total, band.target),
            commission_rate: band.rate,
            commission,
            effective_rate_percent: if total > 0.0 {
                commission / total * 100.0
            } else {
                0.0
            },
        }
    }
}

impl std::fmt::Display for CommissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of a commission table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub tier: Tier,
    /// Minimum total for this band (inclusive)
    pub threshold: f64,
    /// Target shown while in this band
    pub target: f64,
    /// Commission rate as a fraction (0.005 = 0.5%)
    pub rate: f64,
    pub label: &'static str,
    pub icon: &'static str,
    pub message: &'static str,
}

static PROGRESSIVE_BANDS: [Band; 5] = [
    Band {
        tier: Tier::Bronze,
        threshold: 0.0,
        target: 50_000.0,
        rate: 0.0,
        label: "BRONZE",
        icon: "🥉",
        message: "Push to unlock commission at 50k!",
    },
    Band {
        tier: Tier::Silver,
        threshold: 50_000.0,
        target: 80_000.0,
        rate: 0.005,
        label: "SILVER",
        icon: "⛓️",
        message: "COMMISSION UNLOCKED (0.50%)!",
    },
    Band {
        tier: Tier::Gold,
        threshold: 80_000.0,
        target: 101_000.0,
        rate: 0.01,
        label: "GOLD",
        icon: "🥇",
        message: "GREAT JOB! 1.00% COMMISSION",
    },
    Band {
        tier: Tier::Platinum,
        threshold: 101_000.0,
        target: 150_000.0,
        rate: 0.0125,
        label: "PLATINUM",
        icon: "💠",
        message: "EXCELLENT! 1.25% COMMISSION",
    },
    Band {
        tier: Tier::Diamond,
        threshold: 150_000.0,
        target: PROGRESSIVE_CEILING_TARGET,
        rate: 0.015,
        label: "DIAMOND (MAX)",
        icon: "💎",
        message: "LEGENDARY! MAXIMUM 1.5% COMMISSION",
    },
];

static FIXED_TARGET_BANDS: [Band; 5] = [
    Band {
        tier: Tier::Bronze,
        threshold: 0.0,
        target: FIXED_GOAL,
        rate: 0.0,
        label: "BRONZE",
        icon: "🥉",
        message: "Warming up! First checkpoint at 10k",
    },
    Band {
        tier: Tier::Silver,
        threshold: 10_000.0,
        target: FIXED_GOAL,
        rate: 0.0,
        label: "SILVER",
        icon: "🥈",
        message: "20% of the goal done, keep going!",
    },
    Band {
        tier: Tier::Gold,
        threshold: 25_000.0,
        target: FIXED_GOAL,
        rate: 0.0,
        label: "GOLD",
        icon: "🥇",
        message: "Halfway there!",
    },
    Band {
        tier: Tier::Platinum,
        threshold: 40_000.0,
        target: FIXED_GOAL,
        rate: 0.0,
        label: "PLATINUM",
        icon: "💠",
        message: "Almost there! 1% commission at 50k",
    },
    Band {
        tier: Tier::Diamond,
        threshold: FIXED_GOAL,
        target: FIXED_GOAL,
        rate: 0.01,
        label: "DIAMOND",
        icon: "💎",
        message: "GOAL REACHED! 1% COMMISSION EARNED",
    },
];

/// Everything the status banner and KPI cards show for one total
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatus {
    pub total: f64,
    pub tier: Tier,
    pub label: String,
    pub color: String,
    pub icon: String,
    pub message: String,
    pub target: f64,
    pub remaining: f64,
    /// Fraction of the target reached, capped at 1.0
    pub progress: f64,
    pub commission_rate: f64,
    pub commission: f64,
    pub effective_rate_percent: f64,
}

/// Fraction of `target` covered by `total`, in `[0, 1]`. A zero target yields 0.
pub fn progress_fraction(total: f64, target: f64) -> f64 {
    if target <= 0.0 || !target.is_finite() {
        return 0.0;
    }
    (sanitize_total(total) / target).clamp(0.0, 1.0)
}

/// Totals are non-negative; anything else is treated as zero
fn sanitize_total(total: f64) -> f64 {
    if total.is_finite() && total > 0.0 {
        total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_zero_total_is_bronze() {
        let policy = CommissionPolicy::Progressive;
        let status = policy.evaluate(0.0);
        assert_eq!(status.tier, Tier::Bronze);
        assert_eq!(status.commission, 0.0);
        assert_eq!(status.target, 50_000.0);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.effective_rate_percent, 0.0);
    }

    #[test]
    fn test_progressive_boundaries_belong_to_upper_tier() {
        let policy = CommissionPolicy::Progressive;
        assert_eq!(policy.tier_for(49_999.99), Tier::Bronze);
        assert_eq!(policy.tier_for(50_000.00), Tier::Silver);
        assert_eq!(policy.tier_for(80_000.0), Tier::Gold);
        assert_eq!(policy.tier_for(101_000.0), Tier::Platinum);
        assert_eq!(policy.tier_for(150_000.0), Tier::Diamond);
    }

    #[test]
    fn test_progressive_targets() {
        let policy = CommissionPolicy::Progressive;
        assert_eq!(policy.target_for(10_000.0), 50_000.0);
        assert_eq!(policy.target_for(60_000.0), 80_000.0);
        assert_eq!(policy.target_for(90_000.0), 101_000.0);
        assert_eq!(policy.target_for(120_000.0), 150_000.0);
        assert_eq!(policy.target_for(150_000.0), 200_000.0);
        // Past the top band the target still points one band above
        assert_eq!(policy.target_for(500_000.0), 200_000.0);
    }

    #[test]
    fn test_commission_applies_rate_to_whole_total() {
        let policy = CommissionPolicy::Progressive;
        assert_eq!(policy.commission_for(0.0), 0.0);
        assert_eq!(policy.commission_for(49_999.0), 0.0);
        assert!(approx(policy.commission_for(50_000.0), 250.0));
        assert!(approx(policy.commission_for(80_000.0), 800.0));
        assert!(approx(policy.commission_for(101_000.0), 1_262.5));
        assert!(approx(policy.commission_for(200_000.0), 3_000.0));
    }

    #[test]
    fn test_fixed_target_policy() {
        let policy = CommissionPolicy::FixedTarget;
        assert_eq!(policy.tier_for(9_999.0), Tier::Bronze);
        assert_eq!(policy.tier_for(10_000.0), Tier::Silver);
        assert_eq!(policy.tier_for(25_000.0), Tier::Gold);
        assert_eq!(policy.tier_for(40_000.0), Tier::Platinum);
        assert_eq!(policy.tier_for(50_000.0), Tier::Diamond);

        assert_eq!(policy.commission_for(49_000.0), 0.0);
        assert!(approx(policy.commission_for(60_000.0), 600.0));
        assert_eq!(policy.target_for(0.0), 50_000.0);
        assert_eq!(policy.target_for(75_000.0), 50_000.0);
    }

    #[test]
    fn test_tier_is_monotonic() {
        for policy in [CommissionPolicy::Progressive, CommissionPolicy::FixedTarget] {
            let mut previous = Tier::Bronze;
            let mut total = 0.0;
            while total <= 250_000.0 {
                let tier = policy.tier_for(total);
                assert!(tier >= previous, "{} downgraded at {}", policy, total);
                previous = tier;
                total += 250.0;
            }
        }
    }

    #[test]
    fn test_invalid_totals_are_clamped() {
        let policy = CommissionPolicy::Progressive;
        assert_eq!(policy.tier_for(-10.0), Tier::Bronze);
        assert_eq!(policy.commission_for(-10.0), 0.0);
        assert_eq!(policy.tier_for(f64::NAN), Tier::Bronze);
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(progress_fraction(25_000.0, 50_000.0), 0.5);
        assert_eq!(progress_fraction(75_000.0, 50_000.0), 1.0);
        assert_eq!(progress_fraction(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_evaluate_silver_status() {
        let status = CommissionPolicy::Progressive.evaluate(60_000.0);
        assert_eq!(status.tier, Tier::Silver);
        assert_eq!(status.color, "#C0C0C0");
        assert_eq!(status.message, "COMMISSION UNLOCKED (0.50%)!");
        assert!(approx(status.remaining, 20_000.0));
        assert!(approx(status.progress, 0.75));
        assert!(approx(status.commission, 300.0));
        assert!(approx(status.effective_rate_percent, 0.5));
    }

    #[test]
    fn test_threshold_reached() {
        let policy = CommissionPolicy::Progressive;
        assert_eq!(policy.threshold_reached(10_000.0), 0.0);
        assert_eq!(policy.threshold_reached(60_000.0), 50_000.0);
        assert_eq!(policy.first_threshold(), 50_000.0);
        assert_eq!(CommissionPolicy::FixedTarget.first_threshold(), 10_000.0);
    }
}
