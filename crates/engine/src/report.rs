//! Aggregate per-service outcomes into the final restart report.

use crate::lifecycle::{OutcomeStatus, RestartOutcome};
use serde::Serialize;

pub const BANNER_ALL_OK: &str = "All services restarted successfully.";
pub const BANNER_FAILED: &str = "One or more services failed to restart. Review the entries above.";

#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    outcomes: Vec<RestartOutcome>,
    success_count: usize,
    warning_count: usize,
    fail_count: usize,
    skip_count: usize,
    overall_failed: bool,
}

impl RestartReport {
    pub fn outcomes(&self) -> &[RestartOutcome] {
        &self.outcomes
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn fail_count(&self) -> usize {
        self.fail_count
    }

    pub fn skip_count(&self) -> usize {
        self.skip_count
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// True when at least one service FAILED. Warnings and skips alone
    /// never fail the batch.
    pub fn overall_failed(&self) -> bool {
        self.overall_failed
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Total: {}, Succeeded: {}, Failed: {}, Warnings: {}, Skipped: {}",
            self.total(),
            self.success_count,
            self.fail_count,
            self.warning_count,
            self.skip_count
        )
    }

    /// Human-readable report: one line per service in processing order,
    /// a summary line, then the closing banner.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for o in &self.outcomes {
            out.push_str(&format!(
                "{}: [{}] {}\n",
                o.service_name(),
                o.status(),
                o.message()
            ));
        }
        out.push('\n');
        out.push_str(&self.summary_line());
        out.push('\n');
        out.push_str(if self.overall_failed {
            BANNER_FAILED
        } else {
            BANNER_ALL_OK
        });
        out
    }
}

/// Append-only collector of outcomes.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Vec<RestartOutcome>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: RestartOutcome) {
        self.outcomes.push(outcome);
    }

    /// Last recorded status for `service_name`, if it was processed.
    pub fn status_of(&self, service_name: &str) -> Option<OutcomeStatus> {
        self.outcomes
            .iter()
            .rev()
            .find(|o| o.service_name().eq_ignore_ascii_case(service_name))
            .map(|o| o.status())
    }

    pub fn finish(self) -> RestartReport {
        Self::aggregate(self.outcomes)
    }

    pub fn aggregate(outcomes: Vec<RestartOutcome>) -> RestartReport {
        let count = |s: OutcomeStatus| outcomes.iter().filter(|o| o.status() == s).count();
        let success_count = count(OutcomeStatus::Success);
        let warning_count = count(OutcomeStatus::Warning);
        let fail_count = count(OutcomeStatus::Failed);
        let skip_count = count(OutcomeStatus::Skipped);

        RestartReport {
            outcomes,
            success_count,
            warning_count,
            fail_count,
            skip_count,
            overall_failed: fail_count > 0,
        }
    }
}
