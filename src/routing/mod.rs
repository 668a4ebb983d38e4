//! # Stage: Query Routing Intelligence
//!
//! ## Responsibility
//! Decide, per question, how much retrieval and generation work is
//! justified. The classifier scores a handful of lexical signals against a
//! configurable weight table and thresholds the sum into one of five ordered
//! complexity tiers; the budget planner maps that tier to a hard wall-clock
//! ceiling split across the pipeline stages.
//!
//! ## Guarantees
//! - Deterministic: the same normalized question text always produces the
//!   same score, tier, and routing decision (required for cache-key
//!   stability).
//! - Pure: classification performs no I/O and touches no shared state.
//! - Total: empty or unclassifiable input resolves to the `simple` tier
//!   rather than an error.
//! - Ordered: tier ceilings are validated to be strictly increasing, so a
//!   higher tier always buys strictly more time.
//!
//! ## NOT Responsible For
//! - Executing the pipeline stages (that belongs to `orchestrator`)
//! - Serving fast-lookup answers (that belongs to `lookup`)
//! - Enforcing deadlines at runtime (the planner allocates; the
//!   orchestrator enforces)

pub mod budget;
pub mod classifier;
pub mod config;
pub mod tier;

// Re-exports for convenience
pub use budget::{BudgetPlanner, Stage, TimeBudget};
pub use classifier::{ComplexityClassifier, RoutingDecision, ScoreBreakdown};
pub use config::{RoutingConfig, SignalWeights, TierBudget, TierCutPoints};
pub use tier::{ComplexityTier, QueryType};
