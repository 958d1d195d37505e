//! Price alerts and their trigger history.

use crate::{Expr, PriceSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Alert lifecycle: `Active` moves once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Triggered,
    Cancelled,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Triggered => "triggered",
            AlertStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, AlertStatus::Active)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored request to be notified when `condition` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: Uuid,
    pub user_id: String,
    pub condition: Expr,
    pub created_at: DateTime<Utc>,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
    /// Prices of the referenced symbols at trigger time.
    #[serde(default, skip_serializing_if = "PriceSnapshot::is_empty")]
    pub triggered_prices: PriceSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl PriceAlert {
    pub fn new(user_id: impl Into<String>, condition: Expr) -> Self {
        Self::with_created_at(user_id, condition, Utc::now())
    }

    pub fn with_created_at(
        user_id: impl Into<String>,
        condition: Expr,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            condition,
            created_at,
            status: AlertStatus::Active,
            triggered_at: None,
            triggered_prices: PriceSnapshot::new(),
            cancelled_at: None,
        }
    }

    /// First 8 hex characters of the id, as shown to users.
    pub fn short_id(&self) -> String {
        short_id(&self.id)
    }

    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Whether `target` names this alert by full or short id (case-insensitive).
    pub fn matches_id(&self, target: &str) -> bool {
        let target = target.trim().to_ascii_lowercase();
        if target.len() == SHORT_ID_LEN {
            self.short_id() == target
        } else {
            self.id.to_string() == target
        }
    }
}

impl fmt::Display for PriceAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.short_id(), self.condition, self.status)
    }
}

const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &Uuid) -> String {
    let mut s = id.simple().to_string();
    s.truncate(SHORT_ID_LEN);
    s
}

/// Append-only record of a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryEntry {
    pub alert_id: Uuid,
    pub user_id: String,
    /// Formatted condition at trigger time.
    pub condition: String,
    pub triggered_at: DateTime<Utc>,
    pub prices: PriceSnapshot,
}

impl AlertHistoryEntry {
    pub fn from_alert(alert: &PriceAlert, prices: PriceSnapshot, triggered_at: DateTime<Utc>) -> Self {
        Self {
            alert_id: alert.id,
            user_id: alert.user_id.clone(),
            condition: alert.condition.to_string(),
            triggered_at,
            prices,
        }
    }
}
