//! Planner 的步骤结论日志
//!
//! 保留最近 N 条 Gatekeeper 结论（批准/拒绝），超出时丢弃最旧的；
//! 规划时作为显式上下文传给 Oracle，不会改写已发布的计划。

use serde::Serialize;

use crate::board::ValidationResult;

/// 一条步骤结论
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepOutcome {
    pub goal: String,
    pub action: String,
    pub approved: bool,
    pub verdict: String,
}

impl From<&ValidationResult> for StepOutcome {
    fn from(result: &ValidationResult) -> Self {
        Self {
            goal: result.step.goal().to_string(),
            action: result.action.to_string(),
            approved: result.verdict.is_approved(),
            verdict: result.verdict.to_string(),
        }
    }
}

/// 有界结论日志
#[derive(Clone, Debug)]
pub struct OutcomeLog {
    entries: Vec<StepOutcome>,
    max_entries: usize,
}

impl OutcomeLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, outcome: StepOutcome) {
        self.entries.push(outcome);
        self.prune();
    }

    pub fn entries(&self) -> &[StepOutcome] {
        &self.entries
    }

    fn prune(&mut self) {
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(goal: &str, approved: bool) -> StepOutcome {
        StepOutcome {
            goal: goal.into(),
            action: "land()".into(),
            approved,
            verdict: if approved { "approved".into() } else { "unsafe".into() },
        }
    }

    #[test]
    fn test_prunes_oldest() {
        let mut log = OutcomeLog::new(2);
        log.push(outcome("a", true));
        log.push(outcome("b", false));
        log.push(outcome("c", true));
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].goal, "b");
        assert_eq!(log.entries()[1].goal, "c");
    }
}
