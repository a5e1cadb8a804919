//! JavaScript printer.
//!
//! Prints the syntax tree back as JavaScript with 4-space indentation. Type
//! syntax never reaches the tree, so printing is erasure. Constructs newer
//! than the configured [`ScriptTarget`] are lowered while printing; lowering
//! that needs a temporary declares it with `var` at the top of the enclosing
//! function (or program), named `_a`, `_b`, … and never colliding with a name
//! used in the source.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::Diagnostic;
use crate::runtime::convert::{number_to_string, quote_json_string, to_int32, to_uint32};
use crate::stack::ensure_sufficient_stack;
use crate::syntax::*;
use crate::transpile::{CompilerOptions, ScriptTarget};

const INDENT: &str = "    ";

// Printing precedence; higher binds tighter.
const PREC_SEQUENCE: u8 = 0;
const PREC_ASSIGN: u8 = 1;
const PREC_CONDITIONAL: u8 = 2;
const PREC_UNARY: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_CALL: u8 = 17;
const PREC_PRIMARY: u8 = 18;

/// Print `program` for the configured target.
pub fn emit_program(program: &Program, source: &str, options: &CompilerOptions) -> (String, Vec<Diagnostic>) {
    let mut emitter = Emitter::new(source, options.target);
    emitter.push_scope();
    for stmt in &program.body {
        emitter.emit_statement(stmt);
    }
    emitter.pop_scope(0, 0);
    (emitter.out, emitter.diagnostics)
}

#[derive(Default)]
struct TempScope {
    declared: Vec<String>,
    next: usize,
}

/// One statement injected at the top of a constructor body.
enum InitLine<'c> {
    ParamProperty(&'c str),
    Field(&'c PropertyKey, &'c Expression),
}

enum EnumValue {
    Number(f64),
    String(String),
}

struct Emitter<'a> {
    source: &'a str,
    target: ScriptTarget,
    out: String,
    indent: usize,
    skip_indent: bool,
    taken: HashSet<String>,
    scopes: Vec<TempScope>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Emitter<'a> {
    fn new(source: &'a str, target: ScriptTarget) -> Self {
        Self {
            source,
            target,
            out: String::new(),
            indent: 0,
            skip_indent: false,
            taken: words_in(source),
            scopes: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    // ------------------------------------------------------------------------
    // Output helpers
    // ------------------------------------------------------------------------

    fn write(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn write_indent(&mut self) {
        if self.skip_indent {
            self.skip_indent = false;
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.out);
        f(self);
        std::mem::replace(&mut self.out, saved)
    }

    fn push_scope(&mut self) {
        self.scopes.push(TempScope::default());
    }

    /// Close the innermost scope, declaring its temporaries at `insert_at`.
    fn pop_scope(&mut self, insert_at: usize, indent: usize) {
        let Some(scope) = self.scopes.pop() else { return };
        if scope.declared.is_empty() {
            return;
        }
        let line = format!("{}var {};\n", INDENT.repeat(indent), scope.declared.join(", "));
        self.out.insert_str(insert_at, &line);
    }

    fn scope_has_temps(&self) -> bool {
        self.scopes.last().is_some_and(|s| !s.declared.is_empty())
    }

    /// A fresh temporary; `declare` adds it to the scope's `var` list.
    fn temp(&mut self, declare: bool) -> String {
        loop {
            let index = match self.scopes.last_mut() {
                Some(scope) => {
                    scope.next += 1;
                    scope.next - 1
                }
                None => 0,
            };
            let name = temp_name(index);
            if self.taken.contains(&name) {
                continue;
            }
            if declare {
                if let Some(scope) = self.scopes.last_mut() {
                    scope.declared.push(name.clone());
                }
            }
            return name;
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn emit_statement(&mut self, stmt: &Statement) {
        ensure_sufficient_stack(|| self.emit_statement_inner(stmt))
    }

    fn emit_statement_inner(&mut self, stmt: &Statement) {
        match &stmt.value {
            Stmt::Expression(expr) => {
                self.write_indent();
                self.emit_expr(expr, PREC_SEQUENCE);
                self.write(";\n");
            }
            Stmt::VarDecl(decl) => {
                self.write_indent();
                self.emit_var_decl(decl);
                self.write(";\n");
            }
            Stmt::Function(function) => {
                self.write_indent();
                self.write("function ");
                self.write(function.name.as_deref().unwrap_or_default());
                self.emit_function_rest(function);
                self.write("\n");
            }
            Stmt::Class(class) => self.emit_class_declaration(class),
            Stmt::Enum(decl) => self.emit_enum(decl),
            Stmt::Return(value) => {
                self.write_indent();
                self.write("return");
                if let Some(value) = value {
                    self.write(" ");
                    self.emit_expr(value, PREC_SEQUENCE);
                }
                self.write(";\n");
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.write_indent();
                self.emit_if(test, consequent, alternate.as_deref());
            }
            Stmt::Block(stmts) => {
                self.write_indent();
                self.emit_block(stmts);
                self.write("\n");
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.write_indent();
                self.write("for (");
                match init {
                    Some(ForInit::VarDecl(decl)) => self.emit_var_decl(decl),
                    Some(ForInit::Expression(expr)) => self.emit_expr(expr, PREC_SEQUENCE),
                    None => {}
                }
                self.write(";");
                if let Some(test) = test {
                    self.write(" ");
                    self.emit_expr(test, PREC_SEQUENCE);
                }
                self.write(";");
                if let Some(update) = update {
                    self.write(" ");
                    self.emit_expr(update, PREC_SEQUENCE);
                }
                self.write(")");
                self.emit_embedded(body);
            }
            Stmt::ForIn { head, object, body } => {
                self.write_indent();
                self.write("for (");
                self.emit_for_head(head);
                self.write(" in ");
                self.emit_expr(object, PREC_SEQUENCE);
                self.write(")");
                self.emit_embedded(body);
            }
            Stmt::ForOf { head, iterable, body } => {
                self.write_indent();
                self.write("for (");
                self.emit_for_head(head);
                self.write(" of ");
                self.emit_expr(iterable, PREC_ASSIGN);
                self.write(")");
                self.emit_embedded(body);
            }
            Stmt::While { test, body } => {
                self.write_indent();
                self.write("while (");
                self.emit_expr(test, PREC_SEQUENCE);
                self.write(")");
                self.emit_embedded(body);
            }
            Stmt::DoWhile { body, test } => {
                self.write_indent();
                self.write("do");
                if let Stmt::Block(stmts) = &body.value {
                    self.write(" ");
                    self.emit_block(stmts);
                    self.write(" ");
                } else {
                    self.write("\n");
                    self.indent += 1;
                    self.emit_statement(body);
                    self.indent -= 1;
                    self.write_indent();
                }
                self.write("while (");
                self.emit_expr(test, PREC_SEQUENCE);
                self.write(");\n");
            }
            Stmt::Break(label) => self.emit_jump("break", label.as_deref()),
            Stmt::Continue(label) => self.emit_jump("continue", label.as_deref()),
            Stmt::Throw(value) => {
                self.write_indent();
                self.write("throw ");
                self.emit_expr(value, PREC_SEQUENCE);
                self.write(";\n");
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                self.write_indent();
                self.write("try ");
                self.emit_block(block);
                self.write("\n");
                if let Some(handler) = handler {
                    self.write_indent();
                    self.write("catch ");
                    match &handler.param {
                        Some(param) => {
                            self.write("(");
                            self.emit_pattern(param);
                            self.write(") ");
                        }
                        None if !self.target.has_optional_catch_binding() => {
                            let name = self.temp(false);
                            self.write(&format!("({}) ", name));
                        }
                        None => {}
                    }
                    self.emit_block(&handler.body);
                    self.write("\n");
                }
                if let Some(finalizer) = finalizer {
                    self.write_indent();
                    self.write("finally ");
                    self.emit_block(finalizer);
                    self.write("\n");
                }
            }
            Stmt::Switch { discriminant, cases } => {
                self.write_indent();
                self.write("switch (");
                self.emit_expr(discriminant, PREC_SEQUENCE);
                self.write(") {\n");
                self.indent += 1;
                for case in cases {
                    self.write_indent();
                    match &case.test {
                        Some(test) => {
                            self.write("case ");
                            self.emit_expr(test, PREC_SEQUENCE);
                            self.write(":\n");
                        }
                        None => self.write("default:\n"),
                    }
                    self.indent += 1;
                    for stmt in &case.body {
                        self.emit_statement(stmt);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.write_indent();
                self.write("}\n");
            }
            Stmt::Labeled { label, body } => {
                self.write_indent();
                self.write(label);
                self.write(": ");
                self.skip_indent = true;
                self.emit_statement(body);
            }
            Stmt::Empty => {
                self.write_indent();
                self.write(";\n");
            }
            Stmt::Debugger => {
                self.write_indent();
                self.write("debugger;\n");
            }
        }
    }

    fn emit_jump(&mut self, keyword: &str, label: Option<&str>) {
        self.write_indent();
        self.write(keyword);
        if let Some(label) = label {
            self.write(" ");
            self.write(label);
        }
        self.write(";\n");
    }

    fn emit_if(&mut self, test: &Expression, consequent: &Statement, alternate: Option<&Statement>) {
        self.write("if (");
        self.emit_expr(test, PREC_SEQUENCE);
        self.write(")");
        self.emit_embedded(consequent);
        let Some(alternate) = alternate else { return };
        self.write_indent();
        self.write("else");
        match &alternate.value {
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                self.write(" ");
                self.emit_if(test, consequent, alternate.as_deref());
            }
            _ => self.emit_embedded(alternate),
        }
    }

    /// Body of a compound statement, after its header.
    fn emit_embedded(&mut self, body: &Statement) {
        if let Stmt::Block(stmts) = &body.value {
            self.write(" ");
            self.emit_block(stmts);
            self.write("\n");
        } else {
            self.write("\n");
            self.indent += 1;
            self.emit_statement(body);
            self.indent -= 1;
        }
    }

    fn emit_block(&mut self, stmts: &[Statement]) {
        if stmts.is_empty() {
            self.write("{ }");
            return;
        }
        self.write("{\n");
        self.indent += 1;
        for stmt in stmts {
            self.emit_statement(stmt);
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn emit_var_decl(&mut self, decl: &VarDecl) {
        self.write(decl.kind.as_str());
        self.write(" ");
        for (i, declarator) in decl.declarations.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_pattern(&declarator.target);
            if let Some(init) = &declarator.init {
                self.write(" = ");
                self.emit_expr(init, PREC_ASSIGN);
            }
        }
    }

    fn emit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::VarDecl(kind, pattern) => {
                self.write(kind.as_str());
                self.write(" ");
                self.emit_pattern(pattern);
            }
            ForHead::Pattern(pattern) => self.emit_pattern(pattern),
        }
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    /// `(params) { body }` with its own temporary scope.
    fn emit_function_rest(&mut self, function: &Function) {
        self.push_scope();
        self.write("(");
        self.emit_params(&function.params);
        self.write(") ");
        match &function.body {
            FunctionBody::Block(stmts) => self.emit_scoped_block(stmts, &[], None),
            FunctionBody::Expression(expr) => {
                let body = [Spanned {
                    value: Stmt::Return(Some((**expr).clone())),
                    span: expr.span,
                }];
                self.emit_scoped_block(&body, &[], None);
            }
        }
    }

    /// Writes a function body block and closes the scope opened by the caller.
    /// `prologue` lines go after statement `inject_after`, or first when `None`.
    fn emit_scoped_block(&mut self, stmts: &[Statement], prologue: &[InitLine], inject_after: Option<usize>) {
        let open = self.out.len();
        self.write("{\n");
        self.indent += 1;
        let insert_at = self.out.len();
        let inject_index = inject_after.map(|i| i + 1).unwrap_or(0);
        for (i, stmt) in stmts.iter().enumerate() {
            if i == inject_index {
                self.emit_prologue(prologue);
            }
            self.emit_statement(stmt);
        }
        if inject_index >= stmts.len() {
            self.emit_prologue(prologue);
        }
        let empty = self.out.len() == insert_at && !self.scope_has_temps();
        self.pop_scope(insert_at, self.indent);
        self.indent -= 1;
        if empty {
            self.out.truncate(open);
            self.write("{ }");
        } else {
            self.write_indent();
            self.write("}");
        }
    }

    fn emit_prologue(&mut self, lines: &[InitLine]) {
        for line in lines {
            self.write_indent();
            match line {
                InitLine::ParamProperty(name) => self.write(&format!("this.{} = {};", name, name)),
                InitLine::Field(key, init) => {
                    self.write("this");
                    self.emit_member_key(key);
                    self.write(" = ");
                    self.emit_expr(init, PREC_ASSIGN);
                    self.write(";");
                }
            }
            self.write("\n");
        }
    }

    fn emit_params(&mut self, params: &[Param]) {
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            if param.rest {
                self.write("...");
            }
            self.emit_pattern(&param.pattern);
            if let Some(default) = &param.default {
                self.write(" = ");
                self.emit_expr(default, PREC_ASSIGN);
            }
        }
    }

    fn emit_arrow(&mut self, function: &Function) {
        self.push_scope();
        self.write("(");
        self.emit_params(&function.params);
        self.write(") => ");
        match &function.body {
            FunctionBody::Block(stmts) => self.emit_scoped_block(stmts, &[], None),
            FunctionBody::Expression(expr) => {
                let start = self.out.len();
                self.emit_expr(expr, PREC_ASSIGN);
                let Some(scope) = self.scopes.pop() else { return };
                if scope.declared.is_empty() {
                    return;
                }
                // Temporaries need a statement body to be declared in.
                let text = self.out.split_off(start);
                let inner = INDENT.repeat(self.indent + 1);
                self.write(&format!(
                    "{{\n{inner}var {};\n{inner}return {};\n{}}}",
                    scope.declared.join(", "),
                    text,
                    INDENT.repeat(self.indent)
                ));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Classes and enums
    // ------------------------------------------------------------------------

    fn emit_class_declaration(&mut self, class: &Class) {
        self.write_indent();
        let statics = self.emit_class(class);
        self.write("\n");
        let name = class.name.clone().unwrap_or_default();
        for (key, init) in statics {
            self.write_indent();
            self.write(&name);
            self.emit_member_key(key);
            self.write(" = ");
            self.emit_expr(init, PREC_ASSIGN);
            self.write(";\n");
        }
    }

    /// Writes `class … { … }`; returns static field initializers that must
    /// be assigned after the class when fields are lowered.
    fn emit_class<'c>(&mut self, class: &'c Class) -> Vec<(&'c PropertyKey, &'c Expression)> {
        let lower_fields = !self.target.has_class_fields();
        self.write("class");
        if let Some(name) = &class.name {
            self.write(" ");
            self.write(name);
        }
        if let Some(super_class) = &class.super_class {
            self.write(" extends ");
            self.emit_expr(super_class, PREC_CALL);
        }
        self.write(" {\n");
        self.indent += 1;

        let mut prologue: Vec<InitLine<'c>> = Vec::new();
        if let Some(constructor) = &class.constructor {
            for param in constructor.params.iter().filter(|p| p.property) {
                if let Pattern::Identifier(name) = &param.pattern {
                    prologue.push(InitLine::ParamProperty(name));
                }
            }
        }
        let mut statics = Vec::new();
        if lower_fields {
            for member in &class.members {
                if let ClassMemberKind::Field(Some(init)) = &member.kind {
                    if member.is_static {
                        statics.push((&member.key, init));
                    } else {
                        prologue.push(InitLine::Field(&member.key, init));
                    }
                }
            }
        }

        if class.constructor.is_some() || !prologue.is_empty() {
            self.emit_constructor(class, &prologue);
        }

        for member in &class.members {
            match &member.kind {
                ClassMemberKind::Field(_) if lower_fields => continue,
                ClassMemberKind::Field(init) => {
                    self.write_indent();
                    if member.is_static {
                        self.write("static ");
                    }
                    self.emit_property_key(&member.key);
                    if let Some(init) = init {
                        self.write(" = ");
                        self.emit_expr(init, PREC_ASSIGN);
                    }
                    self.write(";\n");
                }
                ClassMemberKind::Method(function)
                | ClassMemberKind::Getter(function)
                | ClassMemberKind::Setter(function) => {
                    self.write_indent();
                    if member.is_static {
                        self.write("static ");
                    }
                    match member.kind {
                        ClassMemberKind::Getter(_) => self.write("get "),
                        ClassMemberKind::Setter(_) => self.write("set "),
                        _ => {}
                    }
                    self.emit_property_key(&member.key);
                    self.emit_function_rest(function);
                    self.write("\n");
                }
            }
        }

        self.indent -= 1;
        self.write_indent();
        self.write("}");
        statics
    }

    fn emit_constructor(&mut self, class: &Class, prologue: &[InitLine]) {
        self.write_indent();
        self.write("constructor");
        self.push_scope();
        self.write("(");
        let synthesized;
        let (params, stmts): (&[Param], &[Statement]) = match &class.constructor {
            Some(constructor) => {
                let stmts = match &constructor.body {
                    FunctionBody::Block(stmts) => stmts.as_slice(),
                    FunctionBody::Expression(_) => &[],
                };
                (constructor.params.as_slice(), stmts)
            }
            None if class.super_class.is_some() => {
                synthesized = [forward_super_call(class.span)];
                (&[], &synthesized[..])
            }
            None => (&[], &[]),
        };
        self.emit_params(params);
        self.write(") ");
        let inject_after = if class.super_class.is_some() {
            stmts.iter().position(is_super_call)
        } else {
            None
        };
        self.emit_scoped_block(stmts, prologue, inject_after);
        self.write("\n");
    }

    fn emit_enum(&mut self, decl: &EnumDecl) {
        let name = decl.name.as_str();
        self.write_indent();
        self.write(&format!("var {};\n", name));
        self.write_indent();
        self.write(&format!("(function ({}) {{\n", name));
        self.indent += 1;

        let mut next = Some(0.0);
        let mut known: HashMap<String, f64> = HashMap::new();
        for member in &decl.members {
            let quoted = quote_json_string(&member.name);
            self.write_indent();
            let value = match &member.init {
                None => match next {
                    Some(value) => Some(EnumValue::Number(value)),
                    None => {
                        self.diagnostics.push(
                            Diagnostic::error(1061, "Enum member must have initializer.").at(self.source, member.span),
                        );
                        None
                    }
                },
                Some(init) => const_eval(init, &known),
            };
            match (value, &member.init) {
                (Some(EnumValue::Number(value)), _) => {
                    known.insert(member.name.clone(), value);
                    next = Some(value + 1.0);
                    self.write(&format!(
                        "{name}[{name}[{quoted}] = {}] = {quoted};",
                        number_to_string(value)
                    ));
                }
                (Some(EnumValue::String(text)), _) => {
                    next = None;
                    self.write(&format!("{name}[{quoted}] = {};", quote_json_string(&text)));
                }
                (None, Some(init)) => {
                    next = None;
                    self.write(&format!("{name}[{name}[{quoted}] = "));
                    self.emit_expr(init, PREC_ASSIGN);
                    self.write(&format!("] = {quoted};"));
                }
                (None, None) => {
                    self.write(&format!("{name}[{name}[{quoted}] = void 0] = {quoted};"));
                }
            }
            self.write("\n");
        }

        self.indent -= 1;
        self.write_indent();
        self.write(&format!("}})({name} || ({name} = {{}}));\n"));
    }

    // ------------------------------------------------------------------------
    // Patterns and keys
    // ------------------------------------------------------------------------

    fn emit_pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Identifier(name) => self.write(name),
            Pattern::Member(expr) => self.emit_expr(expr, PREC_CALL),
            Pattern::Array { elements, rest } => {
                self.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if let Some(element) = element {
                        self.emit_pattern_element(element);
                    }
                }
                if let Some(rest) = rest {
                    if !elements.is_empty() {
                        self.write(", ");
                    }
                    self.write("...");
                    self.emit_pattern(rest);
                } else if matches!(elements.last(), Some(None)) {
                    self.write(",");
                }
                self.write("]");
            }
            Pattern::Object { properties, rest } => {
                if properties.is_empty() && rest.is_none() {
                    self.write("{}");
                    return;
                }
                self.write("{ ");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    let shorthand = property.shorthand
                        && matches!((&property.key, &property.value.target),
                            (PropertyKey::Identifier(key), Pattern::Identifier(name)) if key == name);
                    if !shorthand {
                        self.emit_property_key(&property.key);
                        self.write(": ");
                    }
                    self.emit_pattern_element(&property.value);
                }
                if let Some(rest) = rest {
                    if !properties.is_empty() {
                        self.write(", ");
                    }
                    self.write("...");
                    self.emit_pattern(rest);
                }
                self.write(" }");
            }
        }
    }

    fn emit_pattern_element(&mut self, element: &PatternElement) {
        self.emit_pattern(&element.target);
        if let Some(default) = &element.default {
            self.write(" = ");
            self.emit_expr(default, PREC_ASSIGN);
        }
    }

    fn emit_property_key(&mut self, key: &PropertyKey) {
        match key {
            PropertyKey::Identifier(name) => self.write(name),
            PropertyKey::String { raw, .. } => self.write(raw),
            PropertyKey::Number { raw, .. } => {
                let raw = self.number_text(raw);
                self.write(&raw);
            }
            PropertyKey::Computed(expr) => {
                self.write("[");
                self.emit_expr(expr, PREC_ASSIGN);
                self.write("]");
            }
        }
    }

    /// Key as a member access suffix: `.name` or `[key]`.
    fn emit_member_key(&mut self, key: &PropertyKey) {
        match key {
            PropertyKey::Identifier(name) => {
                self.write(".");
                self.write(name);
            }
            _ => {
                let inner = self.capture(|e| e.emit_property_key(key));
                if inner.starts_with('[') {
                    self.write(&inner);
                } else {
                    self.write(&format!("[{}]", inner));
                }
            }
        }
    }

    fn number_text(&self, raw: &str) -> String {
        if self.target.has_logical_assignment() {
            raw.to_string()
        } else {
            raw.replace('_', "")
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn precedence(&self, expr: &Expr) -> u8 {
        match expr {
            Expr::Sequence(_) => PREC_SEQUENCE,
            Expr::Assign { op, .. } => match op.logical() {
                Some(LogicalOp::And) if !self.target.has_logical_assignment() => LogicalOp::And.precedence(),
                Some(LogicalOp::Or) if !self.target.has_logical_assignment() => LogicalOp::Or.precedence(),
                Some(LogicalOp::Nullish) if !self.target.has_nullish() => PREC_CONDITIONAL,
                Some(LogicalOp::Nullish) if !self.target.has_logical_assignment() => {
                    LogicalOp::Nullish.precedence()
                }
                _ => PREC_ASSIGN,
            },
            Expr::Function(function) if function.is_arrow() => PREC_ASSIGN,
            Expr::Spread(_) => PREC_ASSIGN,
            Expr::Conditional { .. } => PREC_CONDITIONAL,
            Expr::Logical {
                op: LogicalOp::Nullish,
                ..
            } if !self.target.has_nullish() => PREC_CONDITIONAL,
            Expr::Logical { op, .. } => op.precedence(),
            Expr::Binary {
                op: BinaryOp::Exp, ..
            } if !self.target.has_exponent() => PREC_CALL,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => PREC_UNARY,
            Expr::Update { prefix: true, .. } => PREC_UNARY,
            Expr::Update { prefix: false, .. } => PREC_POSTFIX,
            Expr::OptionalChain(_) if !self.target.has_optional_chaining() => PREC_CONDITIONAL,
            Expr::Call { .. }
            | Expr::Member { .. }
            | Expr::New { .. }
            | Expr::OptionalChain(_)
            | Expr::OptionalMember { .. }
            | Expr::OptionalCall { .. } => PREC_CALL,
            Expr::Object(members)
                if !self.target.has_object_spread()
                    && members.iter().any(|m| matches!(m, ObjectMember::Spread(_))) =>
            {
                PREC_CALL
            }
            _ => PREC_PRIMARY,
        }
    }

    fn emit_expr(&mut self, expr: &Expression, min: u8) {
        ensure_sufficient_stack(|| {
            let wrap = self.precedence(&expr.value) < min;
            if wrap {
                self.write("(");
            }
            self.emit_expr_inner(expr);
            if wrap {
                self.write(")");
            }
        })
    }

    fn emit_expr_inner(&mut self, expr: &Expression) {
        match &expr.value {
            Expr::Number { raw, .. } => {
                let text = self.number_text(raw);
                self.write(&text);
            }
            Expr::String { raw, .. } => self.write(raw),
            Expr::Template { quasis, exprs } => {
                self.write("`");
                for (i, chunk) in quasis.iter().enumerate() {
                    self.write(&chunk.raw);
                    if let Some(expr) = exprs.get(i) {
                        self.write("${");
                        self.emit_expr(expr, PREC_SEQUENCE);
                        self.write("}");
                    }
                }
                self.write("`");
            }
            Expr::Regex { pattern, flags } => self.write(&format!("/{}/{}", pattern, flags)),
            Expr::Bool(value) => self.write(if *value { "true" } else { "false" }),
            Expr::Null => self.write("null"),
            Expr::Identifier(name) => self.write(name),
            Expr::This => self.write("this"),
            Expr::Super => self.write("super"),
            Expr::Array(items) => {
                self.write("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    if let Some(item) = item {
                        self.emit_expr(item, PREC_ASSIGN);
                    }
                }
                if matches!(items.last(), Some(None)) {
                    self.write(",");
                }
                self.write("]");
            }
            Expr::Spread(argument) => {
                self.write("...");
                self.emit_expr(argument, PREC_ASSIGN);
            }
            Expr::Object(members) => self.emit_object(members),
            Expr::Function(function) if function.is_arrow() => self.emit_arrow(function),
            Expr::Function(function) => {
                self.write("function");
                match &function.name {
                    Some(name) => {
                        self.write(" ");
                        self.write(name);
                    }
                    None => self.write(" "),
                }
                self.emit_function_rest(function);
            }
            Expr::Class(class) => self.emit_class_expression(class),
            Expr::Unary { op, argument } => {
                self.write(op.as_str());
                let clash = match (op, &argument.value) {
                    (UnaryOp::Minus, Expr::Unary { op: UnaryOp::Minus, .. })
                    | (UnaryOp::Plus, Expr::Unary { op: UnaryOp::Plus, .. }) => true,
                    (
                        UnaryOp::Minus,
                        Expr::Update {
                            op: UpdateOp::Decrement,
                            prefix: true,
                            ..
                        },
                    )
                    | (
                        UnaryOp::Plus,
                        Expr::Update {
                            op: UpdateOp::Increment,
                            prefix: true,
                            ..
                        },
                    ) => true,
                    _ => false,
                };
                if clash {
                    self.write(" ");
                }
                self.emit_expr(argument, PREC_UNARY);
            }
            Expr::Update { op, prefix, target } => {
                if *prefix {
                    self.write(op.as_str());
                    self.emit_expr(target, PREC_UNARY);
                } else {
                    self.emit_expr(target, PREC_POSTFIX);
                    self.write(op.as_str());
                }
            }
            Expr::Binary { op, left, right } => {
                if *op == BinaryOp::Exp && !self.target.has_exponent() {
                    self.write("Math.pow(");
                    self.emit_expr(left, PREC_ASSIGN);
                    self.write(", ");
                    self.emit_expr(right, PREC_ASSIGN);
                    self.write(")");
                    return;
                }
                let prec = op.precedence();
                let (left_min, right_min) = if *op == BinaryOp::Exp {
                    (prec + 1, prec)
                } else {
                    (prec, prec + 1)
                };
                self.emit_expr(left, left_min);
                self.write(&format!(" {} ", op.as_str()));
                self.emit_expr(right, right_min);
            }
            Expr::Logical { op, left, right } => {
                if *op == LogicalOp::Nullish && !self.target.has_nullish() {
                    self.emit_nullish_lowered(left, right);
                    return;
                }
                let prec = op.precedence();
                self.emit_expr(left, prec);
                self.write(&format!(" {} ", op.as_str()));
                self.emit_expr(right, prec + 1);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.emit_expr(test, PREC_CONDITIONAL + 1);
                self.write(" ? ");
                self.emit_expr(consequent, PREC_ASSIGN);
                self.write(" : ");
                self.emit_expr(alternate, PREC_ASSIGN);
            }
            Expr::Assign { op, target, value } => self.emit_assign(*op, target, value),
            Expr::Member { object, property } => {
                self.emit_expr(object, PREC_CALL);
                let access = self.member_access(property);
                self.write(&access);
            }
            Expr::Call { callee, arguments } => {
                self.emit_expr(callee, PREC_CALL);
                self.emit_arguments(arguments);
            }
            Expr::OptionalChain(inner) if !self.target.has_optional_chaining() => {
                let (guards, tail) = self.chain_parts(inner, None);
                self.write(&guards);
                self.write(&tail);
            }
            Expr::OptionalChain(inner) => self.emit_expr(inner, PREC_CALL),
            Expr::OptionalMember { object, property } => {
                self.emit_expr(object, PREC_CALL);
                self.write("?.");
                match property {
                    MemberProperty::Named(name) => self.write(name),
                    MemberProperty::Computed(index) => {
                        self.write("[");
                        self.emit_expr(index, PREC_SEQUENCE);
                        self.write("]");
                    }
                }
            }
            Expr::OptionalCall { callee, arguments } => {
                self.emit_expr(callee, PREC_CALL);
                self.write("?.");
                self.emit_arguments(arguments);
            }
            Expr::New { callee, arguments } => {
                self.write("new ");
                let min = if matches!(callee.value, Expr::Call { .. }) {
                    PREC_PRIMARY
                } else {
                    PREC_CALL
                };
                self.emit_expr(callee, min);
                self.emit_arguments(arguments);
            }
            Expr::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.write(", ");
                    }
                    self.emit_expr(item, PREC_ASSIGN);
                }
            }
            Expr::Paren(inner) => {
                self.write("(");
                self.emit_expr(inner, PREC_SEQUENCE);
                self.write(")");
            }
        }
    }

    fn emit_arguments(&mut self, arguments: &[Expression]) {
        self.write("(");
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_expr(argument, PREC_ASSIGN);
        }
        self.write(")");
    }

    fn emit_class_expression(&mut self, class: &Class) {
        let lowered_statics = !self.target.has_class_fields()
            && class
                .members
                .iter()
                .any(|m| m.is_static && matches!(m.kind, ClassMemberKind::Field(Some(_))));
        if !lowered_statics {
            self.emit_class(class);
            return;
        }
        let temp = self.temp(true);
        self.write(&format!("({} = ", temp));
        let statics = self.emit_class(class);
        for (key, init) in statics {
            self.write(", ");
            self.write(&temp);
            self.emit_member_key(key);
            self.write(" = ");
            self.emit_expr(init, PREC_ASSIGN);
        }
        self.write(&format!(", {})", temp));
    }

    fn emit_object(&mut self, members: &[ObjectMember]) {
        let has_spread = members.iter().any(|m| matches!(m, ObjectMember::Spread(_)));
        if !has_spread || self.target.has_object_spread() {
            let members: Vec<&ObjectMember> = members.iter().collect();
            self.emit_object_literal(&members);
            return;
        }

        // Object.assign(Object.assign({ a }, b), { c })
        let mut chunks: Vec<Vec<&ObjectMember>> = Vec::new();
        for member in members {
            let starts_new = match (member, chunks.last()) {
                (ObjectMember::Spread(_), _) => true,
                (_, Some(last)) => matches!(last.first(), Some(ObjectMember::Spread(_))),
                (_, None) => true,
            };
            if starts_new {
                chunks.push(Vec::new());
            }
            if let Some(last) = chunks.last_mut() {
                last.push(member);
            }
        }
        let leading_literal = chunks
            .first()
            .is_some_and(|chunk| !matches!(chunk.first(), Some(ObjectMember::Spread(_))));
        let mut chunks = chunks.into_iter();
        let mut acc = if leading_literal {
            let first = chunks.next().unwrap_or_default();
            self.capture(|e| e.emit_object_literal(&first))
        } else {
            "{}".to_string()
        };
        for chunk in chunks {
            let next = match chunk.first() {
                Some(ObjectMember::Spread(argument)) => self.capture(|e| e.emit_expr(argument, PREC_ASSIGN)),
                _ => self.capture(|e| e.emit_object_literal(&chunk)),
            };
            acc = format!("Object.assign({}, {})", acc, next);
        }
        self.write(&acc);
    }

    fn emit_object_literal(&mut self, members: &[&ObjectMember]) {
        if members.is_empty() {
            self.write("{}");
            return;
        }
        let multiline = members.iter().any(|m| match m {
            ObjectMember::Method { .. } | ObjectMember::Getter { .. } | ObjectMember::Setter { .. } => true,
            ObjectMember::Property { value, .. } => match &value.value {
                Expr::Function(function) => matches!(function.body, FunctionBody::Block(_)),
                _ => false,
            },
            ObjectMember::Spread(_) => false,
        });
        if !multiline {
            self.write("{ ");
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    self.write(", ");
                }
                self.emit_object_member(member);
            }
            self.write(" }");
            return;
        }
        self.write("{\n");
        self.indent += 1;
        for (i, member) in members.iter().enumerate() {
            self.write_indent();
            self.emit_object_member(member);
            if i + 1 < members.len() {
                self.write(",");
            }
            self.write("\n");
        }
        self.indent -= 1;
        self.write_indent();
        self.write("}");
    }

    fn emit_object_member(&mut self, member: &ObjectMember) {
        match member {
            ObjectMember::Property { key, value, shorthand } => {
                let is_shorthand = *shorthand
                    && matches!((key, &value.value), (PropertyKey::Identifier(k), Expr::Identifier(v)) if k == v);
                if is_shorthand {
                    self.emit_property_key(key);
                } else {
                    self.emit_property_key(key);
                    self.write(": ");
                    self.emit_expr(value, PREC_ASSIGN);
                }
            }
            ObjectMember::Method { key, function } => {
                self.emit_property_key(key);
                self.emit_function_rest(function);
            }
            ObjectMember::Getter { key, function } => {
                self.write("get ");
                self.emit_property_key(key);
                self.emit_function_rest(function);
            }
            ObjectMember::Setter { key, function } => {
                self.write("set ");
                self.emit_property_key(key);
                self.emit_function_rest(function);
            }
            ObjectMember::Spread(argument) => {
                self.write("...");
                self.emit_expr(argument, PREC_ASSIGN);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Lowering
    // ------------------------------------------------------------------------

    /// `a ?? b` below ES2020.
    fn emit_nullish_lowered(&mut self, left: &Expression, right: &Expression) {
        let value = if is_simple_reference(left) {
            self.capture(|e| e.emit_expr(left, PREC_CALL))
        } else {
            let temp = self.temp(true);
            let left_text = self.capture(|e| e.emit_expr(left, PREC_ASSIGN));
            self.write(&format!("({} = {}) !== null && {} !== void 0 ? {} : ", temp, left_text, temp, temp));
            self.emit_expr(right, PREC_ASSIGN);
            return;
        };
        self.write(&format!("{} !== null && {} !== void 0 ? {} : ", value, value, value));
        self.emit_expr(right, PREC_ASSIGN);
    }

    /// `.name` or `[index]`.
    fn member_access(&mut self, property: &MemberProperty) -> String {
        match property {
            MemberProperty::Named(name) => format!(".{}", name),
            MemberProperty::Computed(index) => {
                format!("[{}]", self.capture(|e| e.emit_expr(index, PREC_SEQUENCE)))
            }
        }
    }

    /// An optional chain below ES2020, split into the nullish guards
    /// (`x === null || x === void 0 ? void 0 : `, possibly nested) and the
    /// access expression they protect. Later links append to the tail, so a
    /// short circuit skips them too. When `this_temp` is given and `expr` is
    /// a property access, its object is saved there for a following call.
    fn chain_parts(&mut self, expr: &Expression, this_temp: Option<&str>) -> (String, String) {
        match &expr.value {
            Expr::OptionalMember { object, property } => {
                let (guard, base) = self.chain_guard(object);
                let base = match this_temp {
                    Some(temp) => format!("({} = {})", temp, base),
                    None => base,
                };
                let access = self.member_access(property);
                (format!("{} ? void 0 : ", guard), format!("{}{}", base, access))
            }
            Expr::Member { object, property } => {
                let (guards, tail) = self.chain_parts(object, None);
                let tail = match this_temp {
                    Some(temp) => format!("({} = {})", temp, tail),
                    None => tail,
                };
                let access = self.member_access(property);
                (guards, format!("{}{}", tail, access))
            }
            Expr::OptionalCall { callee, arguments } => {
                let args = self.capture(|e| e.emit_arguments(arguments));
                if matches!(callee.value, Expr::Member { .. } | Expr::OptionalMember { .. }) {
                    let this = self.temp(true);
                    let (guards, tail) = self.chain_parts(callee, Some(&this));
                    let function = self.temp(true);
                    let args = match args.as_str() {
                        "()" => format!("({})", this),
                        _ => format!("({}, {}", this, &args[1..]),
                    };
                    (
                        format!(
                            "({} = {}{}) === null || {} === void 0 ? void 0 : ",
                            function, guards, tail, function
                        ),
                        format!("{}.call{}", function, args),
                    )
                } else {
                    let (guard, base) = self.chain_guard(callee);
                    (format!("{} ? void 0 : ", guard), format!("{}{}", base, args))
                }
            }
            Expr::Call { callee, arguments } => {
                let (guards, tail) = self.chain_parts(callee, None);
                let args = self.capture(|e| e.emit_arguments(arguments));
                (guards, format!("{}{}", tail, args))
            }
            _ => (String::new(), self.capture(|e| e.emit_expr(expr, PREC_CALL))),
        }
    }

    /// The nullish test for the base of a `?.` link and the text that reads
    /// the tested value again. Bases other than plain names go through a
    /// temporary so they are evaluated once.
    fn chain_guard(&mut self, base: &Expression) -> (String, String) {
        let (guards, tail) = self.chain_parts(base, None);
        if guards.is_empty() && is_simple_reference(base) {
            return (format!("{} === null || {} === void 0", tail, tail), tail);
        }
        let temp = self.temp(true);
        (
            format!("({} = {}{}) === null || {} === void 0", temp, guards, tail, temp),
            temp,
        )
    }

    fn emit_assign(&mut self, op: AssignOp, target: &Pattern, value: &Expression) {
        let lower_logical = op.logical().is_some() && !self.target.has_logical_assignment();
        let lower_exp = op == AssignOp::Exp && !self.target.has_exponent();
        if !lower_logical && !lower_exp {
            self.emit_pattern(target);
            self.write(&format!(" {} ", op.as_str()));
            self.emit_expr(value, PREC_ASSIGN);
            return;
        }

        let (first, later) = self.reusable_target(target);
        let value_text = self.capture(|e| e.emit_expr(value, PREC_ASSIGN));
        let text = match op {
            AssignOp::Exp => format!("{} = Math.pow({}, {})", first, later, value_text),
            AssignOp::And => format!("{} && ({} = {})", first, later, value_text),
            AssignOp::Or => format!("{} || ({} = {})", first, later, value_text),
            _ if self.target.has_nullish() => format!("{} ?? ({} = {})", first, later, value_text),
            _ => {
                if let Pattern::Identifier(name) = target {
                    format!(
                        "{} !== null && {} !== void 0 ? {} : ({} = {})",
                        name, name, name, name, value_text
                    )
                } else {
                    let temp = self.temp(true);
                    format!(
                        "({} = {}) !== null && {} !== void 0 ? {} : ({} = {})",
                        temp, first, temp, temp, later, value_text
                    )
                }
            }
        };
        self.write(&text);
    }

    /// For a compound target, the text of its first evaluation and the text
    /// that re-reads it without evaluating the object expression twice.
    fn reusable_target(&mut self, target: &Pattern) -> (String, String) {
        let member = match target {
            Pattern::Member(expr) => expr,
            other => {
                let text = self.capture(|e| e.emit_pattern(other));
                return (text.clone(), text);
            }
        };
        let Expr::Member { object, property } = &member.value else {
            let text = self.capture(|e| e.emit_expr(member, PREC_CALL));
            return (text.clone(), text);
        };
        let (object_first, object_later) = if is_simple_reference(object) {
            let text = self.capture(|e| e.emit_expr(object, PREC_CALL));
            (text.clone(), text)
        } else {
            let temp = self.temp(true);
            let text = self.capture(|e| e.emit_expr(object, PREC_ASSIGN));
            (format!("({} = {})", temp, text), temp)
        };
        match property {
            MemberProperty::Named(name) => (
                format!("{}.{}", object_first, name),
                format!("{}.{}", object_later, name),
            ),
            MemberProperty::Computed(index) => {
                if is_simple_reference(index) || is_literal(index) {
                    let text = self.capture(|e| e.emit_expr(index, PREC_SEQUENCE));
                    (
                        format!("{}[{}]", object_first, text),
                        format!("{}[{}]", object_later, text),
                    )
                } else {
                    let temp = self.temp(true);
                    let text = self.capture(|e| e.emit_expr(index, PREC_ASSIGN));
                    (
                        format!("{}[{} = {}]", object_first, temp, text),
                        format!("{}[{}]", object_later, temp),
                    )
                }
            }
        }
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn temp_name(index: usize) -> String {
    if index < 26 {
        format!("_{}", (b'a' + index as u8) as char)
    } else {
        format!("_{}", index - 26)
    }
}

/// Every identifier-like word in the source; temporaries avoid all of them.
fn words_in(source: &str) -> HashSet<String> {
    let mut words = HashSet::new();
    let mut current = String::new();
    for c in source.chars() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            current.push(c);
        } else if !current.is_empty() {
            words.insert(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.insert(current);
    }
    words
}

fn unparen(expr: &Expression) -> &Expression {
    match &expr.value {
        Expr::Paren(inner) => unparen(inner),
        _ => expr,
    }
}

fn is_simple_reference(expr: &Expression) -> bool {
    matches!(unparen(expr).value, Expr::Identifier(_) | Expr::This)
}

fn is_literal(expr: &Expression) -> bool {
    matches!(unparen(expr).value, Expr::Number { .. } | Expr::String { .. })
}

fn is_super_call(stmt: &Statement) -> bool {
    match &stmt.value {
        Stmt::Expression(expr) => matches!(
            &expr.value,
            Expr::Call { callee, .. } if matches!(callee.value, Expr::Super)
        ),
        _ => false,
    }
}

/// `super(...arguments);` for a derived class without a constructor.
fn forward_super_call(span: Span) -> Statement {
    fn at<T>(value: T, span: Span) -> Spanned<T> {
        Spanned { value, span }
    }
    at(
        Stmt::Expression(at(
            Expr::Call {
                callee: Box::new(at(Expr::Super, span)),
                arguments: vec![at(
                    Expr::Spread(Box::new(at(Expr::Identifier("arguments".to_string()), span))),
                    span,
                )],
            },
            span,
        )),
        span,
    )
}

/// Constant value of an enum initializer, when it has one.
fn const_eval(expr: &Expression, known: &HashMap<String, f64>) -> Option<EnumValue> {
    let number = |e: &Expression| match const_eval(e, known) {
        Some(EnumValue::Number(n)) => Some(n),
        _ => None,
    };
    match &expr.value {
        Expr::Number { value, .. } => Some(EnumValue::Number(*value)),
        Expr::String { value, .. } => Some(EnumValue::String(value.clone())),
        Expr::Template { quasis, exprs } if exprs.is_empty() => {
            Some(EnumValue::String(quasis.first().map(|q| q.cooked.clone()).unwrap_or_default()))
        }
        Expr::Paren(inner) => const_eval(inner, known),
        Expr::Identifier(name) => known.get(name).map(|v| EnumValue::Number(*v)),
        Expr::Unary { op, argument } => {
            let value = number(argument)?;
            match op {
                UnaryOp::Minus => Some(EnumValue::Number(-value)),
                UnaryOp::Plus => Some(EnumValue::Number(value)),
                UnaryOp::BitNot => Some(EnumValue::Number(!to_int32(value) as f64)),
                _ => None,
            }
        }
        Expr::Binary { op, left, right } => {
            if let (Some(EnumValue::String(l)), Some(EnumValue::String(r)), BinaryOp::Add) =
                (const_eval(left, known), const_eval(right, known), op)
            {
                return Some(EnumValue::String(l + &r));
            }
            let (l, r) = (number(left)?, number(right)?);
            let value = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Mod => l % r,
                BinaryOp::Exp => l.powf(r),
                BinaryOp::Shl => to_int32(l).wrapping_shl(to_uint32(r) & 31) as f64,
                BinaryOp::Shr => (to_int32(l) >> (to_uint32(r) & 31)) as f64,
                BinaryOp::UShr => (to_uint32(l) >> (to_uint32(r) & 31)) as f64,
                BinaryOp::BitAnd => (to_int32(l) & to_int32(r)) as f64,
                BinaryOp::BitOr => (to_int32(l) | to_int32(r)) as f64,
                BinaryOp::BitXor => (to_int32(l) ^ to_int32(r)) as f64,
                _ => return None,
            };
            Some(EnumValue::Number(value))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_program;
    use pretty_assertions::assert_eq;

    fn emit(source: &str, target: ScriptTarget) -> String {
        let parsed = parse_program(source);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        emit_program(&parsed.program, source, &CompilerOptions::with_target(target)).0
    }

    #[test]
    fn test_reindents_blocks() {
        let out = emit("function f(a: number) {\n  if (a > 1) { return a; } else return 0;\n}", ScriptTarget::Es2015);
        assert_eq!(
            out,
            "function f(a) {\n    if (a > 1) {\n        return a;\n    }\n    else\n        return 0;\n}\n"
        );
    }

    #[test]
    fn test_exponent_lowering() {
        assert_eq!(emit("x = a ** 2;", ScriptTarget::Es2015), "x = Math.pow(a, 2);\n");
        assert_eq!(emit("x = a ** 2;", ScriptTarget::Es2020), "x = a ** 2;\n");
        assert_eq!(emit("x **= 3;", ScriptTarget::Es2015), "x = Math.pow(x, 3);\n");
    }

    #[test]
    fn test_nullish_lowering_uses_hoisted_temporary() {
        assert_eq!(
            emit("const v = f() ?? 1;", ScriptTarget::Es2015),
            "var _a;\nconst v = (_a = f()) !== null && _a !== void 0 ? _a : 1;\n"
        );
        assert_eq!(
            emit("const v = x ?? 1;", ScriptTarget::Es2015),
            "const v = x !== null && x !== void 0 ? x : 1;\n"
        );
        assert_eq!(emit("const v = x ?? 1;", ScriptTarget::Es2020), "const v = x ?? 1;\n");
    }

    #[test]
    fn test_optional_chain_lowering() {
        assert_eq!(
            emit("function f() { return o?.a?.b; }", ScriptTarget::Es2015),
            "function f() {\n    var _a;\n    return (_a = o === null || o === void 0 ? void 0 : o.a) === null || _a === void 0 ? void 0 : _a.b;\n}\n"
        );
        assert_eq!(
            emit("v = o?.[k].c(1);", ScriptTarget::Es2015),
            "v = o === null || o === void 0 ? void 0 : o[k].c(1);\n"
        );
        assert_eq!(
            emit("v = make()?.x;", ScriptTarget::Es2015),
            "var _a;\nv = (_a = make()) === null || _a === void 0 ? void 0 : _a.x;\n"
        );
        assert_eq!(emit("v = o?.a?.b;", ScriptTarget::Es2020), "v = o?.a?.b;\n");
    }

    #[test]
    fn test_optional_call_keeps_this() {
        assert_eq!(
            emit("a.b?.(1);", ScriptTarget::Es2015),
            "var _a, _b;\n(_b = (_a = a).b) === null || _b === void 0 ? void 0 : _b.call(_a, 1);\n"
        );
        assert_eq!(emit("f?.();", ScriptTarget::Es2015), "f === null || f === void 0 ? void 0 : f();\n");
        assert_eq!(emit("a.b?.(1);", ScriptTarget::Es2022), "a.b?.(1);\n");
    }

    #[test]
    fn test_lowered_optional_chain_nests_inside_operators() {
        assert_eq!(
            emit("v = (o?.a ?? 0) + 1;", ScriptTarget::Es2020),
            "v = (o?.a ?? 0) + 1;\n"
        );
        assert_eq!(
            emit("v = !o?.a;", ScriptTarget::Es2015),
            "v = !(o === null || o === void 0 ? void 0 : o.a);\n"
        );
    }

    #[test]
    fn test_temporaries_avoid_source_names() {
        let out = emit("const _a = 1;\nconst v = f() ?? _a;", ScriptTarget::Es2015);
        assert!(out.starts_with("var _b;\n"), "{}", out);
    }

    #[test]
    fn test_logical_assignment_lowering() {
        assert_eq!(emit("a ||= 1;", ScriptTarget::Es2020), "a || (a = 1);\n");
        assert_eq!(emit("a ??= 1;", ScriptTarget::Es2020), "a ?? (a = 1);\n");
        assert_eq!(emit("a &&= 1;", ScriptTarget::Es2022), "a &&= 1;\n");
    }

    #[test]
    fn test_class_fields_move_into_constructor() {
        let out = emit(
            "class A extends B {\n  x: number = 1;\n  static count = 0;\n  constructor(private name: string) {\n    super();\n    log();\n  }\n}",
            ScriptTarget::Es2015,
        );
        assert_eq!(
            out,
            "class A extends B {\n    constructor(name) {\n        super();\n        this.name = name;\n        this.x = 1;\n        log();\n    }\n}\nA.count = 0;\n"
        );
    }

    #[test]
    fn test_class_fields_kept_for_es2022() {
        let out = emit("class A { x = 1; static y = 2; }", ScriptTarget::Es2022);
        assert_eq!(out, "class A {\n    x = 1;\n    static y = 2;\n}\n");
    }

    #[test]
    fn test_derived_class_gets_forwarding_constructor() {
        let out = emit("class A extends B { x = 1; }", ScriptTarget::Es2015);
        assert_eq!(
            out,
            "class A extends B {\n    constructor() {\n        super(...arguments);\n        this.x = 1;\n    }\n}\n"
        );
    }

    #[test]
    fn test_enum_lowering() {
        let out = emit("enum Color { Red, Green = 5, Blue, Name = \"n\" }", ScriptTarget::Es2015);
        assert_eq!(
            out,
            "var Color;\n(function (Color) {\n    Color[Color[\"Red\"] = 0] = \"Red\";\n    Color[Color[\"Green\"] = 5] = \"Green\";\n    Color[Color[\"Blue\"] = 6] = \"Blue\";\n    Color[\"Name\"] = \"n\";\n})(Color || (Color = {}));\n"
        );
    }

    #[test]
    fn test_enum_member_after_string_needs_initializer() {
        let source = "enum E { A = \"a\", B }";
        let parsed = parse_program(source);
        let (_, diagnostics) = emit_program(&parsed.program, source, &CompilerOptions::default());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, 1061);
    }

    #[test]
    fn test_object_spread_lowering() {
        assert_eq!(
            emit("o = { a: 1, ...b, c };", ScriptTarget::Es2015),
            "o = Object.assign(Object.assign({ a: 1 }, b), { c });\n"
        );
        assert_eq!(emit("o = { ...b };", ScriptTarget::Es2020), "o = { ...b };\n");
    }

    #[test]
    fn test_optional_catch_binding_lowering() {
        assert_eq!(
            emit("try { f(); } catch { g(); }", ScriptTarget::Es2015),
            "try {\n    f();\n}\ncatch (_a) {\n    g();\n}\n"
        );
    }

    #[test]
    fn test_idempotent_output() {
        let source = "const xs: number[] = [1, 2, 3];\nconst doubled = xs.map((x) => x * 2);";
        assert_eq!(emit(source, ScriptTarget::Es2015), emit(source, ScriptTarget::Es2015));
    }

    #[test]
    fn test_emitted_code_parses_again() {
        let source = "describe('s', function () { it('c', () => { assert.equal(f(1) ?? 0, 1); }); });";
        let out = emit(source, ScriptTarget::Es2015);
        assert!(parse_program(&out).errors.is_empty(), "{}", out);
    }
}
