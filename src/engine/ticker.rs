//! Achievements ticker
//!
//! Builds the scrolling feed shown to everyone: either one milestone line per
//! seller that has cleared the first threshold (leaderboard), or the latest
//! individual sales. Messages are produced lazily from the borrowed input and
//! the feed can be iterated any number of times.

use serde::{Deserialize, Serialize};

use super::tier::CommissionPolicy;
use crate::utils::format_money;

/// Shown when nobody qualifies yet
pub const FALLBACK_MESSAGE: &str = "🚀 THE RACE TO 50K IS ON! LET'S SELL!";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickerMode {
    #[default]
    Leaderboard,
    Recent,
}

/// Aggregated total for one seller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerTotal {
    pub username: String,
    pub total: f64,
}

/// A single sale rendered as a live event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEvent {
    pub username: String,
    pub value: f64,
    /// Display label of the product category
    pub product: String,
}

/// A ready-to-iterate feed
#[derive(Debug, Clone)]
pub enum Ticker<'a> {
    Leaderboard {
        ranked: Vec<&'a SellerTotal>,
        policy: CommissionPolicy,
    },
    Recent {
        events: &'a [LiveEvent],
    },
}

impl<'a> Ticker<'a> {
    /// One message per seller at or above the first threshold, highest total first
    pub fn leaderboard(totals: &'a [SellerTotal], policy: CommissionPolicy) -> Self {
        let floor = policy.first_threshold();
        let mut ranked: Vec<&SellerTotal> = totals.iter().filter(|t| t.total >= floor).collect();
        ranked.sort_by(|a, b| {
            b.total
                .total_cmp(&a.total)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ticker::Leaderboard { ranked, policy }
    }

    /// The `limit` first events, which the caller supplies newest first
    pub fn recent(events: &'a [LiveEvent], limit: usize) -> Self {
        Ticker::Recent {
            events: &events[..events.len().min(limit)],
        }
    }

    /// Number of qualifying entries (0 means the fallback is shown)
    pub fn qualifying(&self) -> usize {
        match self {
            Ticker::Leaderboard { ranked, .. } => ranked.len(),
            Ticker::Recent { events } => events.len(),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = String> + '_> {
        if self.qualifying() == 0 {
            return Box::new(std::iter::once(FALLBACK_MESSAGE.to_string()));
        }

        match self {
            Ticker::Leaderboard { ranked, policy } => Box::new(
                ranked
                    .iter()
                    .map(move |seller| milestone_message(seller, *policy)),
            ),
            Ticker::Recent { events } => Box::new(events.iter().map(live_message)),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.iter().collect()
    }
}

fn milestone_message(seller: &SellerTotal, policy: CommissionPolicy) -> String {
    let band = policy.band_for(seller.total);
    format!(
        "{} {} HIT THE {:.0}K TARGET!",
        band.tier.icon(),
        display_name(&seller.username),
        band.threshold / 1000.0
    )
}

fn live_message(event: &LiveEvent) -> String {
    format!(
        "⚡ {} CLOSED R$ {} IN {}",
        display_name(&event.username),
        format_money(event.value),
        event.product.to_uppercase()
    )
}

/// First word of the username, uppercased
fn display_name(username: &str) -> String {
    username
        .split_whitespace()
        .next()
        .unwrap_or(username)
        .to_uppercase()
}
