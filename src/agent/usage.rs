//! Per-session token and cost tracking.
//!
//! Totals are provider-reported and only ever accumulate; the budget check
//! is a loop-termination condition, not an API-level limit.

use tracing::debug;

use crate::config::BudgetConfig;
use crate::ui;

use super::llm::ChatResult;

/// Approximate pricing per 1M tokens (input, output). Models without an
/// entry simply get no cost line in the summary.
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    ("claude-opus-4-6", 15.00, 75.00),
    ("claude-sonnet-4-5-20250929", 3.00, 15.00),
    ("claude-haiku-4-5-20251001", 0.80, 4.00),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-5.1", 1.25, 10.00),
];

/// Accumulates token usage across the turns of one session.
///
/// Created once per session, never reset or shared across sessions.
pub struct UsageTracker {
    budget: BudgetConfig,
    total_input: u64,
    total_output: u64,
    warned: bool,
}

impl UsageTracker {
    pub fn new(budget: BudgetConfig) -> Self {
        Self {
            budget,
            total_input: 0,
            total_output: 0,
            warned: false,
        }
    }

    /// Total tokens recorded so far.
    pub fn total_tokens(&self) -> u64 {
        self.total_input + self.total_output
    }

    /// True once cumulative usage has reached the session ceiling.
    /// Monotone: once true, stays true.
    pub fn over_budget(&self) -> bool {
        self.total_tokens() >= self.budget.max_tokens_per_session
    }

    /// Record usage from one model call.
    ///
    /// Emits a single warning the first time usage crosses the configured
    /// threshold percent, and an operator notice when the budget is
    /// exceeded. Usage cannot decrease, so the warning fires at most once.
    pub fn record(&mut self, result: &ChatResult) {
        self.total_input += result.usage.input_tokens;
        self.total_output += result.usage.output_tokens;

        debug!(
            input = result.usage.input_tokens,
            output = result.usage.output_tokens,
            total = self.total_tokens(),
            "Recorded token usage"
        );

        let pct = (self.total_tokens() as f64 / self.budget.max_tokens_per_session as f64) * 100.0;
        if pct >= self.budget.warn_at_percent && !self.warned {
            ui::print_warning(&format!(
                "Token budget {:.0}% used ({} / {})",
                pct,
                self.total_tokens(),
                self.budget.max_tokens_per_session
            ));
            self.warned = true;
        }

        if self.over_budget() {
            ui::print_warning(&format!(
                "Session token budget exceeded ({} / {})",
                self.total_tokens(),
                self.budget.max_tokens_per_session
            ));
        }
    }

    /// Human-readable usage summary, with an estimated cost line when the
    /// price table knows the model.
    pub fn summary(&self, model: &str) -> String {
        let mut lines = vec![format!(
            "Tokens: {} in + {} out = {} total",
            self.total_input,
            self.total_output,
            self.total_tokens()
        )];

        if let Some((_, input_price, output_price)) =
            PRICE_TABLE.iter().find(|(name, _, _)| *name == model)
        {
            let cost = (self.total_input as f64 / 1_000_000.0 * input_price)
                + (self.total_output as f64 / 1_000_000.0 * output_price);
            lines.push(format!("Estimated cost: ${cost:.4}"));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::{StopReason, Usage};
    use crate::agent::message::ContentBlock;

    fn budget(max: u64, warn_at: f64) -> BudgetConfig {
        BudgetConfig {
            max_tokens_per_session: max,
            warn_at_percent: warn_at,
        }
    }

    fn result_with(input: u64, output: u64) -> ChatResult {
        ChatResult {
            content: vec![ContentBlock::text("ok")],
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: input,
                output_tokens: output,
            },
        }
    }

    #[test]
    fn test_totals_accumulate_monotonically() {
        let mut tracker = UsageTracker::new(budget(1000, 80.0));
        let mut last = 0;
        for _ in 0..5 {
            tracker.record(&result_with(10, 5));
            assert!(tracker.total_tokens() >= last);
            last = tracker.total_tokens();
        }
        assert_eq!(tracker.total_tokens(), 75);
    }

    #[test]
    fn test_over_budget_threshold() {
        // Budget 100, warn at 50: record 60 then 50 more.
        let mut tracker = UsageTracker::new(budget(100, 50.0));

        tracker.record(&result_with(40, 20));
        assert!(!tracker.over_budget());
        assert!(tracker.warned);

        tracker.record(&result_with(30, 20));
        assert!(tracker.over_budget());

        // Stays true afterwards.
        tracker.record(&result_with(0, 0));
        assert!(tracker.over_budget());
    }

    #[test]
    fn test_over_budget_exact_boundary() {
        let mut tracker = UsageTracker::new(budget(100, 80.0));
        tracker.record(&result_with(60, 40));
        assert!(tracker.over_budget());
    }

    #[test]
    fn test_warning_fires_exactly_once() {
        let mut tracker = UsageTracker::new(budget(1000, 50.0));

        tracker.record(&result_with(400, 200));
        assert!(tracker.warned);

        // Further records keep the flag set; no way to re-arm within a session.
        tracker.record(&result_with(100, 0));
        tracker.record(&result_with(100, 0));
        assert!(tracker.warned);
    }

    #[test]
    fn test_summary_with_priced_model() {
        let mut tracker = UsageTracker::new(budget(1_000_000, 80.0));
        tracker.record(&result_with(1_000_000, 0));

        let summary = tracker.summary("gpt-4o");
        assert!(summary.contains("1000000 in + 0 out"));
        assert!(summary.contains("Estimated cost: $2.5000"));
    }

    #[test]
    fn test_summary_without_price_entry_omits_cost() {
        let tracker = UsageTracker::new(budget(1000, 80.0));
        let summary = tracker.summary("some-unknown-model");
        assert!(summary.contains("Tokens:"));
        assert!(!summary.contains("Estimated cost"));
    }
}
