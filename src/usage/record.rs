//! Generation Records and Usage Quota

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of content produced by a generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    /// Standalone post
    Generate,
    /// Reply to an existing post
    Reply,
    /// Multi-part thread
    Thread,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Generate => "generate",
            GenerationKind::Reply => "reply",
            GenerationKind::Thread => "thread",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful generation, owned by a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub content: String,
    pub kind: GenerationKind,
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    pub fn new(
        owner_id: impl Into<String>,
        content: impl Into<String>,
        kind: GenerationKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            content: content.into(),
            kind,
            created_at,
        }
    }
}

/// Derived view of an owner's consumption in the current period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageQuota {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub percentage: u32,
}

impl UsageQuota {
    pub fn new(used: u32, limit: u32) -> Self {
        let percentage = if limit == 0 {
            100
        } else {
            let pct = (f64::from(used) * 100.0 / f64::from(limit)).round();
            pct.min(100.0) as u32
        };

        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
            percentage,
        }
    }

    /// Whether one more generation fits under the limit
    pub fn has_capacity(&self) -> bool {
        self.used < self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_derivation() {
        let quota = UsageQuota::new(3, 10);
        assert_eq!(quota.remaining, 7);
        assert_eq!(quota.percentage, 30);
        assert!(quota.has_capacity());
    }

    #[test]
    fn test_quota_at_limit() {
        let quota = UsageQuota::new(10, 10);
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.percentage, 100);
        assert!(!quota.has_capacity());
    }

    #[test]
    fn test_quota_over_limit_is_clamped() {
        let quota = UsageQuota::new(12, 10);
        assert_eq!(quota.remaining, 0);
        assert_eq!(quota.percentage, 100);
    }

    #[test]
    fn test_quota_rounds_percentage() {
        // half percentages round up
        assert_eq!(UsageQuota::new(1, 200).percentage, 1);
        assert_eq!(UsageQuota::new(67, 200).percentage, 34);
    }

    #[test]
    fn test_zero_limit() {
        let quota = UsageQuota::new(0, 0);
        assert_eq!(quota.percentage, 100);
        assert!(!quota.has_capacity());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&GenerationKind::Thread).unwrap();
        assert_eq!(json, "\"thread\"");
    }
}
