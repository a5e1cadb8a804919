//! Outcomes and reports, in the JSON shape the UI consumes:
//! `[{"name": …, "status": "pass" | "fail", "error"?: …}]`.

use serde::{Deserialize, Serialize};

/// Name of the single outcome reported when the program fails before any
/// case runs.
pub const CODE_EXECUTION_ERROR: &str = "Code Execution Error";

/// Name of the single outcome reported when the harness itself fails.
pub const TEST_RUNNER_ERROR: &str = "Test Runner Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Pass,
            error: None,
        }
    }

    pub fn fail(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Fail,
            error: Some(error.into()),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

/// Every outcome of one run, in case registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestReport {
    outcomes: Vec<TestOutcome>,
}

impl TestReport {
    pub fn new(outcomes: Vec<TestOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn code_execution_error(message: impl Into<String>) -> Self {
        Self::new(vec![TestOutcome::fail(CODE_EXECUTION_ERROR, message)])
    }

    pub fn test_runner_error(message: impl Into<String>) -> Self {
        Self::new(vec![TestOutcome::fail(TEST_RUNNER_ERROR, message)])
    }

    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<TestOutcome> {
        self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// The challenge is solved: at least one case ran and all passed.
    pub fn is_complete(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == 0
    }
}

impl IntoIterator for TestReport {
    type Item = TestOutcome;
    type IntoIter = std::vec::IntoIter<TestOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialized_shape() {
        let report = TestReport::new(vec![
            TestOutcome::pass("adds"),
            TestOutcome::fail("subtracts", "expected 1 to equal 2"),
        ]);
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"[{"name":"adds","status":"pass"},{"name":"subtracts","status":"fail","error":"expected 1 to equal 2"}]"#
        );
        let back: TestReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_completion() {
        assert!(!TestReport::default().is_complete());
        assert!(TestReport::new(vec![TestOutcome::pass("a")]).is_complete());
        let mixed = TestReport::new(vec![TestOutcome::pass("a"), TestOutcome::fail("b", "x")]);
        assert!(!mixed.is_complete());
        assert_eq!((mixed.passed(), mixed.failed()), (1, 1));
    }
}
