//! Usage Meter
//!
//! Answers "may this owner generate another piece of content right now?"
//! and "how much of the monthly allowance is left?".
//!
//! Usage is recounted from the generation store on every query. The plain
//! check-then-record pair ([`UsageMeter::can_generate`] followed by
//! [`UsageMeter::record_generation`]) is two separate store round-trips, so
//! concurrent requests can both pass the check and push usage past the limit
//! by up to the number of in-flight requests minus one.
//! [`UsageMeter::record_generation_within_quota`] closes that gap with a
//! conditional insert.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::period::{month_start, MonthBoundary};
use super::plan::{Plan, PlanLimits};
use super::record::{GenerationKind, GenerationRecord, UsageQuota};
use super::store::{AccountStore, ConditionalInsert, GenerationStore, StoreError};
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::metrics;

/// Plan-gated usage meter
#[derive(Debug, Clone)]
pub struct UsageMeter {
    generations: Arc<dyn GenerationStore>,
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    limits: PlanLimits,
    boundary: MonthBoundary,
}

impl UsageMeter {
    pub fn new(
        generations: Arc<dyn GenerationStore>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            generations,
            accounts,
            clock,
            limits: PlanLimits::default(),
            boundary: MonthBoundary::default(),
        }
    }

    pub fn with_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_month_boundary(mut self, boundary: MonthBoundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn limits(&self) -> PlanLimits {
        self.limits
    }

    /// First instant of the current quota period
    pub fn period_start(&self) -> DateTime<Utc> {
        month_start(self.clock.now(), self.boundary)
    }

    /// Resolve the owner's plan from the account directory
    pub async fn plan_for(&self, owner_id: &str) -> Result<Plan> {
        let active = self
            .accounts
            .subscription_active(owner_id)
            .await
            .map_err(|e| unavailable("fetch account", e))?;
        Ok(Plan::from_subscription(active))
    }

    /// Number of records the owner created in the current calendar month
    pub async fn count_current_period_usage(&self, owner_id: &str) -> Result<u32> {
        let since = self.period_start();
        let used = self
            .generations
            .count_since(owner_id, since)
            .await
            .map_err(|e| unavailable("fetch usage", e))?;
        debug!(owner_id, used, %since, "Counted current period usage");
        Ok(used)
    }

    /// Persist a generation for the owner
    ///
    /// Not idempotent: every call creates a new record.
    pub async fn record_generation(
        &self,
        owner_id: &str,
        content: &str,
        kind: GenerationKind,
    ) -> Result<GenerationRecord> {
        let record = GenerationRecord::new(owner_id, content, kind, self.clock.now());
        self.generations
            .insert(record.clone())
            .await
            .map_err(|e| unavailable("record generation", e))?;
        metrics::GENERATIONS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
        debug!(owner_id, id = %record.id, %kind, "Recorded generation");
        Ok(record)
    }

    /// Persist a generation only if the owner still has quota left
    ///
    /// The count and the insert run as a single store operation, so
    /// concurrent callers can never push usage past the limit. Returns the
    /// record with the quota as it stands after the insert.
    pub async fn record_generation_within_quota(
        &self,
        owner_id: &str,
        content: &str,
        kind: GenerationKind,
    ) -> Result<(GenerationRecord, UsageQuota)> {
        let plan = self.plan_for(owner_id).await?;
        let limit = self.limits.limit_for(plan);
        let record = GenerationRecord::new(owner_id, content, kind, self.clock.now());

        let outcome = self
            .generations
            .insert_if_below(record.clone(), self.period_start(), limit)
            .await
            .map_err(|e| unavailable("record generation", e))?;

        match outcome {
            ConditionalInsert::Full { used } => {
                metrics::QUOTA_CHECKS_TOTAL
                    .with_label_values(&[plan.as_str(), "denied"])
                    .inc();
                Err(CoreError::QuotaExceeded { plan, used, limit })
            }
            ConditionalInsert::Inserted { used } => {
                metrics::GENERATIONS_TOTAL
                    .with_label_values(&[kind.as_str()])
                    .inc();
                debug!(owner_id, id = %record.id, %kind, used, "Recorded generation within quota");
                Ok((record, UsageQuota::new(used.saturating_add(1), limit)))
            }
        }
    }

    /// Whether the owner is below their plan's monthly limit
    pub async fn can_generate(&self, owner_id: &str) -> Result<bool> {
        Ok(self.get_usage_summary(owner_id).await?.has_capacity())
    }

    /// Full usage view for the owner
    pub async fn get_usage_summary(&self, owner_id: &str) -> Result<UsageQuota> {
        let plan = self.plan_for(owner_id).await?;
        let used = self.count_current_period_usage(owner_id).await?;
        Ok(UsageQuota::new(used, self.limits.limit_for(plan)))
    }

    /// Usage summary, or [`CoreError::QuotaExceeded`] when the owner is at
    /// or over the limit
    pub async fn ensure_can_generate(&self, owner_id: &str) -> Result<UsageQuota> {
        let plan = self.plan_for(owner_id).await?;
        let used = self.count_current_period_usage(owner_id).await?;
        let quota = UsageQuota::new(used, self.limits.limit_for(plan));

        if quota.has_capacity() {
            metrics::QUOTA_CHECKS_TOTAL
                .with_label_values(&[plan.as_str(), "allowed"])
                .inc();
            Ok(quota)
        } else {
            metrics::QUOTA_CHECKS_TOTAL
                .with_label_values(&[plan.as_str(), "denied"])
                .inc();
            debug!(owner_id, used, limit = quota.limit, %plan, "Quota exhausted");
            Err(CoreError::QuotaExceeded {
                plan,
                used,
                limit: quota.limit,
            })
        }
    }

    /// The owner's generation history, newest first
    pub async fn list_generations(&self, owner_id: &str) -> Result<Vec<GenerationRecord>> {
        self.generations
            .list(owner_id)
            .await
            .map_err(|e| unavailable("fetch generations", e))
    }

    /// Delete one of the owner's generations
    pub async fn delete_generation(&self, owner_id: &str, id: Uuid) -> Result<bool> {
        self.generations
            .delete(owner_id, id)
            .await
            .map_err(|e| unavailable("delete generation", e))
    }
}

fn unavailable(operation: &'static str, err: StoreError) -> CoreError {
    warn!(operation, error = %err, "Usage store call failed");
    metrics::PERSISTENCE_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
    CoreError::PersistenceUnavailable {
        operation,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::usage::store::{InMemoryAccountStore, InMemoryGenerationStore};
    use chrono::TimeZone;
    use std::time::Duration;

    struct Fixture {
        meter: UsageMeter,
        generations: InMemoryGenerationStore,
        accounts: InMemoryAccountStore,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let generations = InMemoryGenerationStore::new();
        let accounts = InMemoryAccountStore::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap(),
        ));
        let meter = UsageMeter::new(
            Arc::new(generations.clone()),
            Arc::new(accounts.clone()),
            clock.clone(),
        )
        .with_month_boundary(MonthBoundary::Utc);

        Fixture {
            meter,
            generations,
            accounts,
            clock,
        }
    }

    async fn record_n(meter: &UsageMeter, owner: &str, n: usize) {
        for i in 0..n {
            meter
                .record_generation(owner, &format!("post {}", i), GenerationKind::Generate)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_previous_month_not_counted() {
        let f = fixture();
        let last_month = Utc.with_ymd_and_hms(2026, 2, 20, 9, 0, 0).unwrap();
        for _ in 0..4 {
            f.generations
                .insert(GenerationRecord::new(
                    "user-1",
                    "old",
                    GenerationKind::Reply,
                    last_month,
                ))
                .await
                .unwrap();
        }
        record_n(&f.meter, "user-1", 3).await;

        assert_eq!(f.meter.count_current_period_usage("user-1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_usage_resets_with_new_month() {
        let f = fixture();
        record_n(&f.meter, "user-1", 5).await;

        f.clock.set(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 1).unwrap());
        assert_eq!(f.meter.count_current_period_usage("user-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_can_generate_boundary() {
        let f = fixture();
        record_n(&f.meter, "user-1", 9).await;
        assert!(f.meter.can_generate("user-1").await.unwrap());

        record_n(&f.meter, "user-1", 1).await;
        assert!(!f.meter.can_generate("user-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_plan_switch_changes_limit_immediately() {
        let f = fixture();
        record_n(&f.meter, "user-1", 10).await;
        assert!(!f.meter.can_generate("user-1").await.unwrap());

        f.accounts.set_subscription_active("user-1", true).await;
        let summary = f.meter.get_usage_summary("user-1").await.unwrap();
        assert_eq!(summary.limit, 200);
        assert_eq!(summary.used, 10);
        assert_eq!(summary.remaining, 190);
        assert_eq!(summary.percentage, 5);
        assert!(f.meter.can_generate("user-1").await.unwrap());

        f.accounts.set_subscription_active("user-1", false).await;
        assert!(!f.meter.can_generate("user-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_usage_summary() {
        let f = fixture();
        record_n(&f.meter, "user-1", 4).await;

        let summary = f.meter.get_usage_summary("user-1").await.unwrap();
        assert_eq!(
            summary,
            UsageQuota {
                used: 4,
                limit: 10,
                remaining: 6,
                percentage: 40,
            }
        );
    }

    #[tokio::test]
    async fn test_ensure_can_generate_reports_quota() {
        let f = fixture();
        record_n(&f.meter, "user-1", 10).await;

        match f.meter.ensure_can_generate("user-1").await {
            Err(CoreError::QuotaExceeded { plan, used, limit }) => {
                assert_eq!(plan, Plan::Free);
                assert_eq!(used, 10);
                assert_eq!(limit, 10);
            }
            other => panic!("expected quota exceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_limits() {
        let f = fixture();
        let meter = f.meter.clone().with_limits(PlanLimits { free: 2, pro: 5 });
        record_n(&meter, "user-1", 2).await;
        assert!(!meter.can_generate("user-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_check_then_record_race_is_tolerated() {
        let f = fixture();
        record_n(&f.meter, "user-1", 9).await;

        // Two requests pass the check before either records
        assert!(f.meter.can_generate("user-1").await.unwrap());
        assert!(f.meter.can_generate("user-1").await.unwrap());
        record_n(&f.meter, "user-1", 2).await;

        let summary = f.meter.get_usage_summary("user-1").await.unwrap();
        assert_eq!(summary.used, 11);
        assert_eq!(summary.remaining, 0);
        assert_eq!(summary.percentage, 100);
    }

    #[tokio::test]
    async fn test_record_within_quota_stops_at_limit() {
        let f = fixture();
        record_n(&f.meter, "user-1", 9).await;

        let (_, usage) = f
            .meter
            .record_generation_within_quota("user-1", "last one", GenerationKind::Thread)
            .await
            .unwrap();
        assert_eq!(usage, UsageQuota::new(10, 10));

        let second = f
            .meter
            .record_generation_within_quota("user-1", "one too many", GenerationKind::Thread)
            .await;
        assert!(matches!(
            second,
            Err(CoreError::QuotaExceeded { used: 10, limit: 10, .. })
        ));
        assert_eq!(f.meter.count_current_period_usage("user-1").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_record_within_quota_reports_real_usage_after_downgrade() {
        let f = fixture();
        f.accounts.set_subscription_active("user-1", true).await;
        record_n(&f.meter, "user-1", 15).await;
        f.accounts.set_subscription_active("user-1", false).await;

        match f
            .meter
            .record_generation_within_quota("user-1", "over", GenerationKind::Generate)
            .await
        {
            Err(CoreError::QuotaExceeded { plan, used, limit }) => {
                assert_eq!(plan, Plan::Free);
                assert_eq!(used, 15);
                assert_eq!(limit, 10);
            }
            other => panic!("expected quota exceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_reduces_usage() {
        let f = fixture();
        record_n(&f.meter, "user-1", 3).await;
        let record = f
            .meter
            .record_generation("user-1", "to delete", GenerationKind::Reply)
            .await
            .unwrap();
        assert_eq!(f.meter.count_current_period_usage("user-1").await.unwrap(), 4);

        assert!(f.meter.delete_generation("user-1", record.id).await.unwrap());
        assert_eq!(f.meter.count_current_period_usage("user-1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_generations_newest_first() {
        let f = fixture();
        f.meter
            .record_generation("user-1", "first", GenerationKind::Generate)
            .await
            .unwrap();
        f.clock.advance(Duration::from_secs(60));
        f.meter
            .record_generation("user-1", "second", GenerationKind::Reply)
            .await
            .unwrap();

        let history = f.meter.list_generations("user-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "second");
        assert_eq!(history[0].kind, GenerationKind::Reply);
    }

    #[tokio::test]
    async fn test_store_outage_surfaces_persistence_error() {
        let f = fixture();
        f.generations.set_unavailable(true);

        let err = f.meter.count_current_period_usage("user-1").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::PersistenceUnavailable { operation: "fetch usage", .. }
        ));

        let err = f
            .meter
            .record_generation("user-1", "post", GenerationKind::Generate)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PersistenceUnavailable { operation: "record generation", .. }
        ));

        assert!(f.meter.can_generate("user-1").await.is_err());
        assert!(f.meter.get_usage_summary("user-1").await.is_err());
    }

    #[tokio::test]
    async fn test_account_outage_surfaces_persistence_error() {
        let f = fixture();
        f.accounts.set_unavailable(true);

        let err = f.meter.can_generate("user-1").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::PersistenceUnavailable { operation: "fetch account", .. }
        ));
    }
}
