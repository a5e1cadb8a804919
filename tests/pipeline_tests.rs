//! End to end: TypeScript submission in, report out.

use codetrial::challenge;
use codetrial::harness::{TestStatus, CODE_EXECUTION_ERROR};
use codetrial::{evaluate_submission, run_tests, transpile};
use pretty_assertions::assert_eq;

const ROMAN_SOLUTION: &str = r#"
const romanNumerals: Record<string, number> = {
  'I': 1,
  'V': 5,
  'X': 10,
  'L': 50,
  'C': 100,
  'D': 500,
  'M': 1000
};

function convertRomanToDecimal(roman: string): number {
  let total = 0;
  for (let i = 0; i < roman.length; i++) {
    const current = romanNumerals[roman[i]];
    const next = romanNumerals[roman[i + 1]] ?? 0;
    total += current < next ? -current : current;
  }
  return total;
}
"#;

const SHORT_SUITE: &str = r#"
describe('Convert Roman Numeral to Number', function () {
  it('should convert empty string to 0', function () {
    assert.equal(convertRomanToDecimal(''), 0);
  });
  it('should convert IV to 4', function () {
    assert.equal(convertRomanToDecimal('IV'), 4);
  });
  it('should convert III to 3', function () {
    assert.equal(convertRomanToDecimal('III'), 3);
  });
});
"#;

#[tokio::test]
async fn correct_solution_passes_the_builtin_challenge() {
    let challenge = challenge::builtin().unwrap();
    let report = evaluate_submission(ROMAN_SOLUTION, &challenge.suite).await.unwrap();
    assert_eq!(report.len(), 11);
    assert!(report.is_complete(), "{:#?}", report);
}

#[tokio::test]
async fn starter_code_fails_every_case() {
    let challenge = challenge::builtin().unwrap();
    let report = evaluate_submission(&challenge.starter_code, &challenge.suite).await.unwrap();
    assert_eq!(report.len(), 11);
    assert_eq!(report.passed(), 0);
    assert_eq!(
        report.outcomes()[1].error.as_deref(),
        Some("expected undefined to equal 3")
    );
}

#[tokio::test]
async fn partially_correct_solution() {
    let source = "function convertRomanToDecimal(roman) { return roman === 'IV' ? 4 : 0; }";
    let report = evaluate_submission(source, SHORT_SUITE).await.unwrap();
    let statuses: Vec<TestStatus> = report.outcomes().iter().map(|o| o.status).collect();
    assert_eq!(statuses, [TestStatus::Pass, TestStatus::Pass, TestStatus::Fail]);
    assert_eq!(report.outcomes()[2].name, "should convert III to 3");
    assert_eq!(report.outcomes()[2].error.as_deref(), Some("expected 0 to equal 3"));
}

#[tokio::test]
async fn missing_function_fails_each_case_with_a_reference_error() {
    let report = evaluate_submission("const unrelated = 1;", SHORT_SUITE).await.unwrap();
    assert_eq!(report.len(), 3);
    for outcome in report.outcomes() {
        assert_eq!(outcome.status, TestStatus::Fail);
        assert_eq!(outcome.error.as_deref(), Some("convertRomanToDecimal is not defined"));
    }
}

#[tokio::test]
async fn compilation_errors_produce_no_report() {
    let error = evaluate_submission("function broken( {", SHORT_SUITE).await.unwrap_err();
    assert!(error.to_string().starts_with("TypeScript compilation errors:\nLine 1, Column"));
}

#[tokio::test]
async fn top_level_throw_is_a_single_code_execution_error() {
    let report = evaluate_submission("throw new Error('load failed');", SHORT_SUITE).await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.outcomes()[0].name, CODE_EXECUTION_ERROR);
    assert_eq!(report.outcomes()[0].error.as_deref(), Some("load failed"));
}

#[tokio::test]
async fn typescript_features_survive_the_round_trip() {
    let source = r#"
enum Direction { Up = 1, Down }
interface Sized { size(): number }
class Stack<T> implements Sized {
  private items: T[] = [];
  push(item: T): this { this.items.push(item); return this; }
  size(): number { return this.items.length; }
}
function total(...ns: number[]): number { return ns.reduce((a, b) => a + b, 0); }
"#;
    let suite = r#"
it('enum', () => { assert.strictEqual(Direction.Down, 2); assert.strictEqual(Direction[1], 'Up'); });
it('class', () => { assert.strictEqual(new Stack().push(1).push(2).size(), 2); });
it('rest', () => { assert.strictEqual(total(1, 2, 3), 6); });
it('exponent', () => { assert.strictEqual(2 ** 10, 1024); });
"#;
    let executable = transpile(source).unwrap();
    let report = run_tests(&executable, suite).await;
    assert!(report.is_complete(), "{:#?}\n{}", report, executable);
}

#[tokio::test]
async fn optional_chaining_runs_after_lowering() {
    let source = "const o: any = { a: { b: 1 } };\nfunction f() { return o?.a?.b; }\nfunction g() { return o.x?.y ?? 'none'; }";
    let suite = "it('chain', () => { assert.strictEqual(f(), 1); assert.strictEqual(g(), 'none'); });";
    let report = evaluate_submission(source, suite).await.unwrap();
    assert!(report.is_complete(), "{:#?}", report);
}
