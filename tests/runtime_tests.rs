//! Interpreter and intrinsics through the sandbox interface.

mod common;

use codetrial::runtime::{
    compile_for_execution, invoke, ConsoleLevel, Interpreter, InterpreterConfig, NullSink, Value,
};
use codetrial::diagnostics::ExecutionSetupError;
use common::{console_of, eval, eval_with};
use pretty_assertions::assert_eq;

// ============================================================================
// SANDBOX
// ============================================================================

#[test]
fn only_listed_bindings_are_visible() {
    let invocable = compile_for_execution("return typeof describe + ' ' + typeof extra;", &["describe"]).unwrap();
    let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
    match invoke(&invocable, &mut interp, &[Value::Number(1.0)]) {
        Ok(Value::String(text)) => assert_eq!(&*text, "number undefined"),
        other => panic!("unexpected completion {:?}", other),
    }
}

#[test]
fn syntax_errors_are_setup_errors() {
    let error = compile_for_execution("let = ;", &[]).unwrap_err();
    assert!(matches!(error, ExecutionSetupError::Syntax { .. }));
}

#[test]
fn realms_are_not_shared() {
    let invocable = compile_for_execution("Array.prototype.sum = 1; return 0;", &[]).unwrap();
    let mut first = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
    invoke(&invocable, &mut first, &[]).unwrap();
    assert_eq!(eval("return [].sum;"), "undefined");
}

// ============================================================================
// LANGUAGE
// ============================================================================

#[test]
fn hoisting_and_closures() {
    assert_eq!(eval("return f(); function f() { return 7; }"), "7");
    assert_eq!(eval("var x = typeof y; var y = 1; return x;"), "'undefined'");
    let counter = "function make() { let n = 0; return () => ++n; } const c = make(); c(); c(); return c();";
    assert_eq!(eval(counter), "3");
}

#[test]
fn runtime_errors_use_engine_messages() {
    assert_eq!(eval("nope();"), "threw ReferenceError: nope is not defined");
    assert_eq!(
        eval("let o; o.p;"),
        "threw TypeError: Cannot read properties of undefined (reading 'p')"
    );
    assert_eq!(eval("const k = 1; k++;"), "threw TypeError: Assignment to constant variable.");
}

#[test]
fn call_depth_overflow_is_a_catchable_range_error() {
    let source = "function down(n) { return down(n + 1); } try { down(0); } catch (e) { return e instanceof RangeError; }";
    assert_eq!(eval(source), "true");
}

#[test]
fn step_budget_cannot_be_caught() {
    let config = InterpreterConfig {
        step_budget: 500,
        ..InterpreterConfig::default()
    };
    assert_eq!(eval_with("try { for (;;) {} } catch (e) { return 'caught'; }", config), "budget 500");
}

#[test]
fn classes_and_prototypes() {
    let source = "
        class Animal {
            constructor(name) { this.name = name; }
            speak() { return this.name + ' makes a sound'; }
        }
        class Dog extends Animal {
            speak() { return super.speak() + ' (woof)'; }
        }
        const d = new Dog('Rex');
        return [d.speak(), d instanceof Animal, Object.getPrototypeOf(d) === Dog.prototype];
    ";
    assert_eq!(eval(source), "[ 'Rex makes a sound (woof)', true, true ]");
}

#[test]
fn assignment_updates_adds_or_is_ignored_when_frozen() {
    let source = "const o = Object.freeze({ a: 1 }); o.a = 2; o.b = 3; const p = { x: 1 }; p.x = 5; p.y = 6; return [o.a, o.b, p.x, p.y, Object.keys(p)];";
    assert_eq!(eval(source), "[ 1, undefined, 5, 6, [ 'x', 'y' ] ]");
}

#[test]
fn optional_chains_short_circuit() {
    assert_eq!(eval("const o = { a: { b: 1 } }; return [o?.a?.b, o.x?.b, o.x?.b.c.d];"), "[ 1, undefined, undefined ]");
    assert_eq!(eval("let n = null; let hits = 0; n?.[hits++]; n?.f(hits++); return hits;"), "0");
    assert_eq!(
        eval("const o = { k: 2, get() { return this.k; } }; return [o.get?.(), o.missing?.(), o?.['k']];"),
        "[ 2, undefined, 2 ]"
    );
    assert_eq!(
        eval("const o = { a: null }; o?.a.b;"),
        "threw TypeError: Cannot read properties of null (reading 'b')"
    );
}

#[test]
fn enum_iife_runs() {
    let source = "var Color; (function (Color) { Color[Color['Red'] = 0] = 'Red'; })(Color || (Color = {})); return [Color.Red, Color[0]];";
    assert_eq!(eval(source), "[ 0, 'Red' ]");
}

// ============================================================================
// INTRINSICS
// ============================================================================

#[test]
fn array_methods() {
    assert_eq!(eval("return [3, 1, 2].sort();"), "[ 1, 2, 3 ]");
    assert_eq!(eval("return [1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10);"), "[ 20, 40 ]");
    assert_eq!(eval("return [1, 2, 3].reduce((a, b) => a + b, 0);"), "6");
    assert_eq!(eval("return ['a', 'b'].join('-');"), "'a-b'");
    assert_eq!(eval("return [1, [2, [3]]].flat(Infinity);"), "[ 1, 2, 3 ]");
}

#[test]
fn cyclic_arrays_join_without_recursing() {
    let source = "const a = [1]; a.push(a); return [a.join(), String(a), [a, 2].join('-'), `${a}`];";
    assert_eq!(eval(source), "[ '1,', '1,', '1,-2', '1,' ]");
}

#[test]
fn string_methods() {
    assert_eq!(eval("return 'MCMXCVI'.split('');"), "[ 'M', 'C', 'M', 'X', 'C', 'V', 'I' ]");
    assert_eq!(eval("return 'abc'.padStart(5, '*');"), "'**abc'");
    assert_eq!(eval("return 'a-b-c'.replace(/-/g, '+');"), "'a+b+c'");
    assert_eq!(eval("return 'Hello'.charCodeAt(1);"), "101");
}

#[test]
fn oversized_strings_are_range_errors() {
    assert_eq!(eval("'x'.repeat(2 ** 29);"), "threw RangeError: Invalid string length");
    assert_eq!(eval("'ab'.padStart(2 ** 30);"), "threw RangeError: Invalid string length");
    assert_eq!(eval("'ab'.padEnd(536870889, '-');"), "threw RangeError: Invalid string length");
    assert_eq!(eval("return ''.repeat(2 ** 40).length;"), "0");
}

#[test]
fn number_formatting() {
    assert_eq!(eval("return (1.005).toFixed(2);"), "'1.00'");
    assert_eq!(eval("return (255).toString(16);"), "'ff'");
    assert_eq!(eval("return [parseInt('42px'), parseFloat('3.5e1x'), 0.1 + 0.2];"), "[ 42, 35, 0.30000000000000004 ]");
}

#[test]
fn json_round_trips_through_text() {
    assert_eq!(eval("return JSON.stringify({ a: [1, 'x', null], b: undefined });"), "'{\"a\":[1,\"x\",null]}'");
    assert_eq!(eval("return JSON.parse('{\"k\": [1, 2]}').k[1];"), "2");
    assert_eq!(
        eval("try { JSON.parse('{'); } catch (e) { return e.name; }"),
        "'SyntaxError'"
    );
}

#[test]
fn map_and_set() {
    let source = "const m = new Map([['a', 1]]); m.set('b', 2); const s = new Set([1, 1, 2]); return [m.get('b'), m.size, s.size, s.has(2)];";
    assert_eq!(eval(source), "[ 2, 2, 2, true ]");
}

#[test]
fn math_random_is_deterministic() {
    assert_eq!(eval("return Math.random();"), eval("return Math.random();"));
}

#[test]
fn console_output_is_captured_by_level() {
    let lines = console_of("console.log('a', 1, [2]); console.warn('careful');");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text, "a 1 [ 2 ]");
    assert_eq!(lines[1].level, ConsoleLevel::Warn);
}
