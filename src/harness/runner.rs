//! Depth-first execution of a registered suite.

use tracing::{debug, warn};

use crate::harness::report::TestOutcome;
use crate::harness::suite::{TestCase, TestGroup};
use crate::runtime::inspect::{inspect, Style};
use crate::runtime::object::ObjectKind;
use crate::runtime::{ErrorKind, Interpreter, Thrown, Value};

/// Message for a case stopped by the step budget.
pub fn budget_message(budget: u64) -> String {
    format!("Execution budget of {} steps exceeded", budget)
}

/// The failure text for an abrupt completion: an error object's `message`,
/// otherwise the thrown value stringified.
pub fn thrown_message(interp: &mut Interpreter, thrown: Thrown) -> String {
    match thrown {
        Thrown::BudgetExceeded { budget } => budget_message(budget),
        Thrown::Exception(value) => exception_message(interp, &value),
    }
}

fn exception_message(interp: &mut Interpreter, value: &Value) -> String {
    if let Value::Object(object) = value {
        let is_error = matches!(object.borrow().kind, ObjectKind::Error)
            || object.inherits_from(&interp.realm.error_prototype(ErrorKind::Error));
        if is_error {
            return match interp.get_property(value, "message") {
                Ok(message) => stringify_or_inspect(interp, &message),
                Err(_) => inspect(value, Style::Console),
            };
        }
    }
    stringify_or_inspect(interp, value)
}

/// `String(value)`, falling back to inspection when conversion itself throws.
fn stringify_or_inspect(interp: &mut Interpreter, value: &Value) -> String {
    interp
        .to_string(value)
        .unwrap_or_else(|_| inspect(value, Style::Console))
}

/// Runs cases against one interpreter, collecting outcomes in order.
pub struct Runner<'a> {
    interp: &'a mut Interpreter,
    outcomes: Vec<TestOutcome>,
}

impl<'a> Runner<'a> {
    pub fn new(interp: &'a mut Interpreter) -> Self {
        Self {
            interp,
            outcomes: Vec::new(),
        }
    }

    /// Own cases first, then child groups, each in registration order.
    pub fn run(mut self, root: &TestGroup) -> Vec<TestOutcome> {
        self.run_group(root);
        self.outcomes
    }

    fn run_group(&mut self, group: &TestGroup) {
        for case in &group.cases {
            let outcome = self.run_case(case);
            self.outcomes.push(outcome);
        }
        for child in &group.groups {
            self.run_group(child);
        }
    }

    fn run_case(&mut self, case: &TestCase) -> TestOutcome {
        self.interp.reset_budget();
        let result = self.interp.call(&case.body, Value::Undefined, &[]);
        let steps = self.interp.steps_used();
        match result {
            Ok(_) => {
                debug!(case = %case.name, steps, "case passed");
                TestOutcome::pass(&case.name)
            }
            Err(thrown) => {
                if let Thrown::BudgetExceeded { budget } = thrown {
                    warn!(case = %case.name, budget, "case exhausted its step budget");
                }
                let message = thrown_message(self.interp, thrown);
                debug!(case = %case.name, steps, error = %message, "case failed");
                TestOutcome::fail(&case.name, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{InterpreterConfig, NullSink};

    #[test]
    fn test_thrown_message() {
        let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        let error = interp.make_error(ErrorKind::TypeError, "bad input");
        assert_eq!(thrown_message(&mut interp, Thrown::Exception(error)), "bad input");
        assert_eq!(
            thrown_message(&mut interp, Thrown::Exception(Value::Number(42.0))),
            "42"
        );
        assert_eq!(
            thrown_message(&mut interp, Thrown::BudgetExceeded { budget: 10 }),
            "Execution budget of 10 steps exceeded"
        );
    }
}
