//! Generation Service
//!
//! Gates a generation on the owner's quota, calls the provider, and records
//! the result. Nothing is recorded when the provider fails.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::{ContentGenerator, GenerationRequest};
use crate::error::Result;
use crate::metrics;
use crate::usage::{GenerationRecord, UsageMeter, UsageQuota};

/// A recorded generation together with the owner's usage afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub record: GenerationRecord,
    pub usage: UsageQuota,
}

/// Quota-gated generation
#[derive(Debug, Clone)]
pub struct GenerationService {
    meter: Arc<UsageMeter>,
    generator: Arc<dyn ContentGenerator>,
    strict_enforcement: bool,
}

impl GenerationService {
    pub fn new(meter: Arc<UsageMeter>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            meter,
            generator,
            strict_enforcement: false,
        }
    }

    /// Record with a conditional insert so concurrent requests cannot
    /// overshoot the limit
    pub fn with_strict_enforcement(mut self, strict: bool) -> Self {
        self.strict_enforcement = strict;
        self
    }

    pub fn meter(&self) -> &Arc<UsageMeter> {
        &self.meter
    }

    /// Generate content for the owner if their quota allows it
    pub async fn generate(
        &self,
        owner_id: &str,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent> {
        request.validate()?;
        let quota = self.meter.ensure_can_generate(owner_id).await?;

        let started = Instant::now();
        let generated = self.generator.generate(request).await;
        metrics::GENERATION_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        let content = match generated {
            Ok(content) => content,
            Err(e) => {
                warn!(owner_id, kind = %request.kind, error = %e, "Generation provider failed");
                return Err(e.into());
            }
        };

        // Once the record is persisted the call succeeds; usage is not re-read.
        let (record, usage) = if self.strict_enforcement {
            self.meter
                .record_generation_within_quota(owner_id, &content, request.kind)
                .await?
        } else {
            let record = self
                .meter
                .record_generation(owner_id, &content, request.kind)
                .await?;
            (record, UsageQuota::new(quota.used.saturating_add(1), quota.limit))
        };

        info!(
            owner_id,
            id = %record.id,
            kind = %record.kind,
            used = usage.used,
            limit = usage.limit,
            "Generated content"
        );

        Ok(GeneratedContent { record, usage })
    }
}
