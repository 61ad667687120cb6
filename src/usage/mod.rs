//! Usage Metering Module
//!
//! Derives each owner's consumption for the current calendar month from
//! persisted generation records and gates new generations against the
//! monthly allowance of their subscription plan.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Usage Meter                 │
//! │   count · can_generate · summary · record    │
//! ├──────────────────────┬───────────────────────┤
//! │   GenerationStore    │     AccountStore      │
//! │ (generation records) │ (subscription flag)   │
//! └──────────────────────┴───────────────────────┘
//! ```

pub mod meter;
pub mod period;
pub mod plan;
pub mod record;
pub mod store;

pub use meter::UsageMeter;
pub use period::MonthBoundary;
pub use plan::{Plan, PlanLimits, FREE_MONTHLY_LIMIT, PRO_MONTHLY_LIMIT};
pub use record::{GenerationKind, GenerationRecord, UsageQuota};
pub use store::{
    AccountStore, ConditionalInsert, GenerationStore, InMemoryAccountStore,
    InMemoryGenerationStore, StoreError,
};
