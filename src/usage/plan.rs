//! Subscription Plans
//!
//! Maps the account's subscription flag to a plan tier and the tier to a
//! monthly generation allowance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monthly generations on the free plan
pub const FREE_MONTHLY_LIMIT: u32 = 10;
/// Monthly generations on the pro plan
pub const PRO_MONTHLY_LIMIT: u32 = 200;

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    /// Derive the plan from the account's subscription flag
    pub fn from_subscription(active: bool) -> Self {
        if active {
            Plan::Pro
        } else {
            Plan::Free
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monthly allowance per plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanLimits {
    pub free: u32,
    pub pro: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            free: FREE_MONTHLY_LIMIT,
            pro: PRO_MONTHLY_LIMIT,
        }
    }
}

impl PlanLimits {
    pub fn limit_for(&self, plan: Plan) -> u32 {
        match plan {
            Plan::Free => self.free,
            Plan::Pro => self.pro,
        }
    }
}
