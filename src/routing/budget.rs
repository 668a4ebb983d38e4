//! Per-request time budgets.
//!
//! [`BudgetPlanner::plan`] is a pure lookup from tier into the configured
//! [`BudgetTable`](super::BudgetTable); the resulting [`TimeBudget`] captures
//! a monotonic start instant and answers every over-budget question the
//! pipeline asks. All stages consult the same `remaining(stage)` /
//! `elapsed_frac()` queries instead of carrying their own threshold checks,
//! so the degradation policy lives in one place.

use std::time::Duration;
use tokio::time::Instant;

use super::config::{BudgetTable, TierBudget};
use super::tier::ComplexityTier;

/// The three budgeted pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Document retrieval.
    Retrieval,
    /// Context selection (including the optional rerank).
    Selection,
    /// Answer generation.
    Generation,
}

impl Stage {
    /// Stable label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Retrieval => "retrieval",
            Stage::Selection => "selection",
            Stage::Generation => "generation",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a complexity tier to its stage-by-stage time allocation.
#[derive(Debug, Clone)]
pub struct BudgetPlanner {
    table: BudgetTable,
}

impl BudgetPlanner {
    /// Build a planner over a budget table.
    pub fn new(table: BudgetTable) -> Self {
        Self { table }
    }

    /// Allocate a fresh budget for a request in the given tier.
    ///
    /// The budget's clock starts now; it is derived once per request and
    /// never re-derived mid-flight.
    pub fn plan(&self, tier: ComplexityTier) -> TimeBudget {
        TimeBudget::start(tier, *self.table.get(tier))
    }

    /// The configured budget entry for a tier, without starting a clock.
    pub fn entry(&self, tier: ComplexityTier) -> &TierBudget {
        self.table.get(tier)
    }
}

impl Default for BudgetPlanner {
    fn default() -> Self {
        Self::new(BudgetTable::default())
    }
}

/// A started wall-clock budget for one request.
///
/// Stage deadlines are cumulative: retrieval must finish within its own
/// allocation, selection within retrieval + selection, and so on, with
/// every deadline clamped to the total ceiling.
#[derive(Debug, Clone)]
pub struct TimeBudget {
    tier: ComplexityTier,
    entry: TierBudget,
    started: Instant,
    total: Duration,
}

impl TimeBudget {
    fn start(tier: ComplexityTier, entry: TierBudget) -> Self {
        Self {
            tier,
            entry,
            started: Instant::now(),
            total: Duration::from_millis(entry.total_ms),
        }
    }

    /// The tier this budget was planned for.
    pub fn tier(&self) -> ComplexityTier {
        self.tier
    }

    /// Total wall-clock ceiling for the request.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// How many documents retrieval should request.
    pub fn document_count(&self) -> usize {
        self.entry.document_count
    }

    /// Generation token ceiling for this tier.
    pub fn max_tokens(&self) -> u32 {
        self.entry.max_tokens
    }

    /// Default context character budget for this tier.
    pub fn context_chars(&self) -> usize {
        self.entry.context_chars
    }

    /// Time elapsed since the budget clock started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed time as a fraction of the total ceiling.
    pub fn elapsed_frac(&self) -> f64 {
        self.elapsed().as_secs_f64() / self.total.as_secs_f64()
    }

    /// Whether elapsed time has crossed the given fraction of the ceiling.
    ///
    /// The single over-budget query every stage uses; thresholds live in
    /// the orchestrator's policy, not scattered across stages.
    pub fn over(&self, frac: f64) -> bool {
        self.elapsed_frac() > frac
    }

    /// Remaining time until the cumulative deadline of a stage.
    ///
    /// The deadline is `start + sum(allocations up to and including the
    /// stage)`, clamped to the total ceiling; the result is floored at
    /// zero.
    pub fn remaining(&self, stage: Stage) -> Duration {
        let cumulative_frac = match stage {
            Stage::Retrieval => self.entry.retrieval_frac,
            Stage::Selection => self.entry.retrieval_frac + self.entry.selection_frac,
            Stage::Generation => {
                self.entry.retrieval_frac + self.entry.selection_frac + self.entry.generation_frac
            }
        };
        let deadline = self.total.mul_f64(cumulative_frac.min(1.0));
        deadline.saturating_sub(self.elapsed())
    }

    /// The stage's own allocation, independent of elapsed time.
    pub fn allocation(&self, stage: Stage) -> Duration {
        let frac = match stage {
            Stage::Retrieval => self.entry.retrieval_frac,
            Stage::Selection => self.entry.selection_frac,
            Stage::Generation => self.entry.generation_frac,
        };
        self.total.mul_f64(frac)
    }

    /// Remaining time until the total ceiling.
    pub fn total_remaining(&self) -> Duration {
        self.total.saturating_sub(self.elapsed())
    }

    /// Whether the total ceiling has been spent entirely.
    pub fn exhausted(&self) -> bool {
        self.total_remaining().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::config::BudgetTable;

    fn planner() -> BudgetPlanner {
        BudgetPlanner::new(BudgetTable::default())
    }

    #[test]
    fn test_plan_ceilings_strictly_increase_across_tiers() {
        let p = planner();
        let mut prev = Duration::ZERO;
        for tier in ComplexityTier::ALL {
            let budget = p.plan(tier);
            assert!(
                budget.total() > prev,
                "{tier} ceiling {:?} must exceed previous {prev:?}",
                budget.total()
            );
            prev = budget.total();
        }
    }

    #[test]
    fn test_fresh_budget_has_full_remaining() {
        let budget = planner().plan(ComplexityTier::Moderate);
        // Immediately after planning, nearly the full retrieval allocation
        // remains and the elapsed fraction is effectively zero.
        assert!(budget.remaining(Stage::Retrieval) > Duration::from_millis(1));
        assert!(budget.elapsed_frac() < 0.01);
        assert!(!budget.exhausted());
    }

    #[test]
    fn test_stage_deadlines_are_cumulative() {
        let budget = planner().plan(ComplexityTier::Complex);
        let retrieval = budget.remaining(Stage::Retrieval);
        let selection = budget.remaining(Stage::Selection);
        let generation = budget.remaining(Stage::Generation);
        assert!(retrieval < selection, "selection deadline includes retrieval");
        assert!(selection < generation, "generation deadline includes selection");
        assert!(generation <= budget.total());
    }

    #[test]
    fn test_generation_deadline_clamped_to_ceiling() {
        let budget = planner().plan(ComplexityTier::Simple);
        assert!(budget.remaining(Stage::Generation) <= budget.total());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_frac_advances_with_time() {
        let budget = planner().plan(ComplexityTier::UltraSimple); // 1.5s ceiling
        tokio::time::advance(Duration::from_millis(750)).await;
        assert!(budget.over(0.4), "750ms of 1500ms must be over 40%");
        assert!(!budget.over(0.6), "750ms of 1500ms must not be over 60%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_floors_at_zero() {
        let budget = planner().plan(ComplexityTier::UltraSimple);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(budget.remaining(Stage::Retrieval), Duration::ZERO);
        assert_eq!(budget.total_remaining(), Duration::ZERO);
        assert!(budget.exhausted());
    }

    #[test]
    fn test_allocation_matches_fraction() {
        let budget = planner().plan(ComplexityTier::Simple); // 3s, retrieval 0.3
        let alloc = budget.allocation(Stage::Retrieval);
        assert_eq!(alloc, Duration::from_millis(900));
    }

    #[test]
    fn test_tier_resources_flow_through() {
        let budget = planner().plan(ComplexityTier::Complex);
        assert_eq!(budget.document_count(), 8);
        assert_eq!(budget.max_tokens(), 768);
        assert_eq!(budget.tier(), ComplexityTier::Complex);
    }
}
