//! Structural checks that need more context than the grammar has: jump
//! statements against their enclosing statements, `return` outside a
//! function, and unreachable code.

use crate::diagnostics::Diagnostic;
use crate::syntax::*;

pub fn check_program(program: &Program, source: &str) -> Vec<Diagnostic> {
    let mut checker = Checker {
        source,
        diagnostics: Vec::new(),
        context: JumpContext::default(),
        in_function: false,
    };
    checker.statements(&program.body);
    checker.diagnostics
}

/// What a `break` or `continue` can reach from the current position.
#[derive(Default, Clone)]
struct JumpContext {
    /// Enclosing labels, with whether each labels a loop.
    labels: Vec<(String, bool)>,
    loops: usize,
    switches: usize,
}

struct Checker<'a> {
    source: &'a str,
    diagnostics: Vec<Diagnostic>,
    context: JumpContext,
    in_function: bool,
}

impl<'a> Checker<'a> {
    fn error(&mut self, code: u32, message: &str, span: Span) {
        self.diagnostics.push(Diagnostic::error(code, message).at(self.source, span));
    }

    fn statements(&mut self, stmts: &[Statement]) {
        let mut abrupt = false;
        let mut warned = false;
        for stmt in stmts {
            if abrupt && !warned && !matches!(stmt.value, Stmt::Function(_) | Stmt::Empty) {
                self.diagnostics
                    .push(Diagnostic::warning(7027, "Unreachable code detected.").at(self.source, stmt.span));
                warned = true;
            }
            self.statement(stmt);
            abrupt |= stmt.value.is_abrupt();
        }
    }

    fn statement(&mut self, stmt: &Statement) {
        crate::stack::ensure_sufficient_stack(|| self.statement_inner(stmt))
    }

    fn statement_inner(&mut self, stmt: &Statement) {
        match &stmt.value {
            Stmt::Expression(expr) | Stmt::Throw(expr) => self.expression(expr),
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::Function(function) => self.function(function),
            Stmt::Class(class) => self.class(class),
            Stmt::Enum(decl) => {
                for member in &decl.members {
                    if let Some(init) = &member.init {
                        self.expression(init);
                    }
                }
            }
            Stmt::Return(value) => {
                if !self.in_function {
                    self.error(1108, "A 'return' statement can only be used within a function body.", stmt.span);
                }
                if let Some(value) = value {
                    self.expression(value);
                }
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.expression(test);
                self.statement(consequent);
                if let Some(alternate) = alternate {
                    self.statement(alternate);
                }
            }
            Stmt::Block(stmts) => self.statements(stmts),
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                match init {
                    Some(ForInit::VarDecl(decl)) => self.var_decl(decl),
                    Some(ForInit::Expression(expr)) => self.expression(expr),
                    None => {}
                }
                for expr in test.iter().chain(update.iter()) {
                    self.expression(expr);
                }
                self.loop_body(body);
            }
            Stmt::ForIn { head, object: value, body } | Stmt::ForOf { head, iterable: value, body } => {
                match head {
                    ForHead::VarDecl(_, pattern) | ForHead::Pattern(pattern) => self.pattern(pattern),
                }
                self.expression(value);
                self.loop_body(body);
            }
            Stmt::While { test, body } | Stmt::DoWhile { body, test } => {
                self.expression(test);
                self.loop_body(body);
            }
            Stmt::Break(label) => match label {
                None if self.context.loops == 0 && self.context.switches == 0 => self.error(
                    1105,
                    "A 'break' statement can only be used within an enclosing iteration or switch statement.",
                    stmt.span,
                ),
                Some(label) if !self.context.labels.iter().any(|(l, _)| l == label) => self.error(
                    1116,
                    "A 'break' statement can only jump to a label of an enclosing statement.",
                    stmt.span,
                ),
                _ => {}
            },
            Stmt::Continue(label) => match label {
                None if self.context.loops == 0 => self.error(
                    1104,
                    "A 'continue' statement can only be used within an enclosing iteration statement.",
                    stmt.span,
                ),
                Some(label) if !self.context.labels.iter().any(|(l, is_loop)| l == label && *is_loop) => {
                    self.error(
                        1115,
                        "A 'continue' statement can only jump to a label of an enclosing iteration statement.",
                        stmt.span,
                    )
                }
                _ => {}
            },
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                self.statements(block);
                if let Some(handler) = handler {
                    if let Some(param) = &handler.param {
                        self.pattern(param);
                    }
                    self.statements(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.statements(finalizer);
                }
            }
            Stmt::Switch { discriminant, cases } => {
                self.expression(discriminant);
                self.context.switches += 1;
                for case in cases {
                    if let Some(test) = &case.test {
                        self.expression(test);
                    }
                    self.statements(&case.body);
                }
                self.context.switches -= 1;
            }
            Stmt::Labeled { label, body } => {
                self.context.labels.push((label.clone(), body.value.is_loop()));
                self.statement(body);
                self.context.labels.pop();
            }
            Stmt::Empty | Stmt::Debugger => {}
        }
    }

    fn loop_body(&mut self, body: &Statement) {
        self.context.loops += 1;
        self.statement(body);
        self.context.loops -= 1;
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        for declarator in &decl.declarations {
            self.pattern(&declarator.target);
            if let Some(init) = &declarator.init {
                self.expression(init);
            }
        }
    }

    /// Function bodies start a fresh jump context.
    fn function(&mut self, function: &Function) {
        let saved = std::mem::take(&mut self.context);
        let was_in_function = std::mem::replace(&mut self.in_function, true);
        for param in &function.params {
            self.pattern(&param.pattern);
            if let Some(default) = &param.default {
                self.expression(default);
            }
        }
        match &function.body {
            FunctionBody::Block(stmts) => self.statements(stmts),
            FunctionBody::Expression(expr) => self.expression(expr),
        }
        self.in_function = was_in_function;
        self.context = saved;
    }

    fn class(&mut self, class: &Class) {
        if let Some(super_class) = &class.super_class {
            self.expression(super_class);
        }
        if let Some(constructor) = &class.constructor {
            self.function(constructor);
        }
        for member in &class.members {
            self.property_key(&member.key);
            match &member.kind {
                ClassMemberKind::Method(function)
                | ClassMemberKind::Getter(function)
                | ClassMemberKind::Setter(function) => self.function(function),
                ClassMemberKind::Field(Some(init)) => {
                    let was_in_function = std::mem::replace(&mut self.in_function, true);
                    self.expression(init);
                    self.in_function = was_in_function;
                }
                ClassMemberKind::Field(None) => {}
            }
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Identifier(_) => {}
            Pattern::Member(expr) => self.expression(expr),
            Pattern::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    self.pattern_element(element);
                }
                if let Some(rest) = rest {
                    self.pattern(rest);
                }
            }
            Pattern::Object { properties, rest } => {
                for property in properties {
                    self.property_key(&property.key);
                    self.pattern_element(&property.value);
                }
                if let Some(rest) = rest {
                    self.pattern(rest);
                }
            }
        }
    }

    fn pattern_element(&mut self, element: &PatternElement) {
        self.pattern(&element.target);
        if let Some(default) = &element.default {
            self.expression(default);
        }
    }

    fn property_key(&mut self, key: &PropertyKey) {
        if let PropertyKey::Computed(expr) = key {
            self.expression(expr);
        }
    }

    fn expression(&mut self, expr: &Expression) {
        crate::stack::ensure_sufficient_stack(|| self.expression_inner(expr))
    }

    fn expression_inner(&mut self, expr: &Expression) {
        match &expr.value {
            Expr::Number { .. }
            | Expr::String { .. }
            | Expr::Regex { .. }
            | Expr::Bool(_)
            | Expr::Null
            | Expr::Identifier(_)
            | Expr::This
            | Expr::Super => {}
            Expr::Template { exprs, .. } => {
                for expr in exprs {
                    self.expression(expr);
                }
            }
            Expr::Array(items) => {
                for item in items.iter().flatten() {
                    self.expression(item);
                }
            }
            Expr::Spread(inner) | Expr::Paren(inner) | Expr::Unary { argument: inner, .. } => self.expression(inner),
            Expr::Update { target, .. } => self.expression(target),
            Expr::Object(members) => {
                for member in members {
                    match member {
                        ObjectMember::Property { key, value, .. } => {
                            self.property_key(key);
                            self.expression(value);
                        }
                        ObjectMember::Method { key, function }
                        | ObjectMember::Getter { key, function }
                        | ObjectMember::Setter { key, function } => {
                            self.property_key(key);
                            self.function(function);
                        }
                        ObjectMember::Spread(value) => self.expression(value),
                    }
                }
            }
            Expr::Function(function) => self.function(function),
            Expr::Class(class) => self.class(class),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.expression(left);
                self.expression(right);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expression(test);
                self.expression(consequent);
                self.expression(alternate);
            }
            Expr::Assign { target, value, .. } => {
                self.pattern(target);
                self.expression(value);
            }
            Expr::Member { object, property } | Expr::OptionalMember { object, property } => {
                self.expression(object);
                if let MemberProperty::Computed(index) = property {
                    self.expression(index);
                }
            }
            Expr::OptionalChain(inner) => self.expression(inner),
            Expr::Call { callee, arguments }
            | Expr::New { callee, arguments }
            | Expr::OptionalCall { callee, arguments } => {
                self.expression(callee);
                for argument in arguments {
                    self.expression(argument);
                }
            }
            Expr::Sequence(items) => {
                for item in items {
                    self.expression(item);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;

    fn codes(source: &str) -> Vec<u32> {
        let parsed = parse_program(source);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        check_program(&parsed.program, source).iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_jumps_inside_loops_are_fine() {
        assert!(codes("for (;;) { if (x) break; else continue; }").is_empty());
        assert!(codes("switch (x) { case 1: break; }").is_empty());
        assert!(codes("outer: for (const a of b) { for (;;) { continue outer; } }").is_empty());
        assert!(codes("block: { break block; }").is_empty());
    }

    #[test]
    fn test_jumps_outside_loops() {
        assert_eq!(codes("break;"), vec![1105]);
        assert_eq!(codes("while (x) { const f = () => { continue; }; }"), vec![1104]);
        assert_eq!(codes("for (;;) { break nowhere; }"), vec![1116]);
        assert_eq!(codes("block: { for (;;) { continue block; } }"), vec![1115]);
    }

    #[test]
    fn test_top_level_return() {
        assert_eq!(codes("return 1;"), vec![1108]);
        assert!(codes("function f() { return 1; }").is_empty());
    }

    #[test]
    fn test_unreachable_code_is_a_warning() {
        let source = "function f() {\n  return 1;\n  g();\n  h();\n  function g() {}\n}";
        let parsed = parse_program(source);
        let diagnostics = check_program(&parsed.program, source);
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert_eq!(diagnostics[0].location.map(|l| l.line), Some(3));
    }

    #[test]
    fn test_hoisted_function_after_return_is_reachable() {
        assert!(codes("function f() { return g(); function g() { return 1; } }").is_empty());
    }
}
