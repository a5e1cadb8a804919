//! Statement execution and expression evaluation.
//!
//! Every recursive step runs under [`ensure_sufficient_stack`], so deeply
//! nested programs grow the native stack instead of overflowing it. Statement
//! execution returns a [`Flow`] describing how control leaves the statement;
//! exceptions travel separately as [`Thrown`].

use std::rc::Rc;

use crate::intrinsics::regexp;
use crate::runtime::inspect::{describe_for_error, function_name};
use crate::runtime::object::{
    ClassInfo, Closure, FieldInit, FunctionObject, JsObject, Obj, ObjectKind, Property,
};
use crate::runtime::scope::{Env, Lookup, Store, ACTIVE_FUNCTION, HOME_OBJECT, NEW_TARGET, THIS};
use crate::runtime::{number_to_string, ErrorKind, Interpreter, Thrown, Value};
use crate::stack::ensure_sufficient_stack;
use crate::syntax::{
    AssignOp, CatchClause, Class, ClassMemberKind, Expr, Expression, ForHead, ForInit, Function,
    FunctionBody, FunctionKind, LogicalOp, MemberProperty, ObjectMember, Param, Pattern,
    PatternElement, PropertyKey, Span, Spanned, Statement, Stmt, UnaryOp, UpdateOp, VarDecl,
    VarKind,
};

type Eval = Result<Value, Thrown>;
type Exec = Result<Flow, Thrown>;

/// How control leaves a statement.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

enum LoopStep {
    Next,
    Exit(Flow),
}

/// Decide whether a loop keeps going after its body completed with `flow`.
fn loop_step(flow: Flow, labels: &[String]) -> LoopStep {
    match flow {
        Flow::Normal | Flow::Continue(None) => LoopStep::Next,
        Flow::Continue(Some(label)) if labels.contains(&label) => LoopStep::Next,
        Flow::Break(None) => LoopStep::Exit(Flow::Normal),
        Flow::Break(Some(label)) if labels.contains(&label) => LoopStep::Exit(Flow::Normal),
        other => LoopStep::Exit(other),
    }
}

/// How a pattern stores the values it destructures.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// Assign to a hoisted `var`.
    Var,
    /// Declare in the current scope.
    Lexical { mutable: bool },
    /// Plain assignment to existing targets.
    Assign,
}

enum Reference {
    Binding(String),
    Property { base: Value, key: String },
}

// ============================================================================
// HOISTING
// ============================================================================

fn collect_var_names(stmts: &[Statement], out: &mut Vec<String>) {
    for stmt in stmts {
        collect_var_names_in(stmt, out);
    }
}

fn collect_var_names_in(stmt: &Statement, out: &mut Vec<String>) {
    match &stmt.value {
        Stmt::VarDecl(decl) if decl.kind == VarKind::Var => {
            for declarator in &decl.declarations {
                declarator.target.bound_names(out);
            }
        }
        Stmt::Enum(decl) => out.push(decl.name.clone()),
        Stmt::If {
            consequent,
            alternate,
            ..
        } => {
            collect_var_names_in(consequent, out);
            if let Some(alternate) = alternate {
                collect_var_names_in(alternate, out);
            }
        }
        Stmt::Block(stmts) => collect_var_names(stmts, out),
        Stmt::For { init, body, .. } => {
            if let Some(ForInit::VarDecl(decl)) = init {
                if decl.kind == VarKind::Var {
                    for declarator in &decl.declarations {
                        declarator.target.bound_names(out);
                    }
                }
            }
            collect_var_names_in(body, out);
        }
        Stmt::ForIn { head, body, .. } | Stmt::ForOf { head, body, .. } => {
            if let ForHead::VarDecl(VarKind::Var, pattern) = head {
                pattern.bound_names(out);
            }
            collect_var_names_in(body, out);
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Labeled { body, .. } => {
            collect_var_names_in(body, out)
        }
        Stmt::Try {
            block,
            handler,
            finalizer,
        } => {
            collect_var_names(block, out);
            if let Some(handler) = handler {
                collect_var_names(&handler.body, out);
            }
            if let Some(finalizer) = finalizer {
                collect_var_names(finalizer, out);
            }
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                collect_var_names(&case.body, out);
            }
        }
        _ => {}
    }
}

fn declares_lexically(stmts: &[Statement]) -> bool {
    stmts.iter().any(|stmt| match &stmt.value {
        Stmt::VarDecl(decl) => decl.kind != VarKind::Var,
        Stmt::Function(_) | Stmt::Class(_) => true,
        _ => false,
    })
}

/// `constructor(...args) { super(...args); }` or an empty constructor.
fn default_constructor(derived: bool, span: Span) -> Rc<Function> {
    let spanned = |value| Spanned { value, span };
    let (params, body) = if derived {
        let forward = Expr::Call {
            callee: Box::new(spanned(Expr::Super)),
            arguments: vec![spanned(Expr::Spread(Box::new(spanned(Expr::Identifier(
                "args".to_string(),
            )))))],
        };
        (
            vec![Param {
                pattern: Pattern::Identifier("args".to_string()),
                default: None,
                rest: true,
                property: false,
            }],
            vec![Spanned {
                value: Stmt::Expression(spanned(forward)),
                span,
            }],
        )
    } else {
        (Vec::new(), Vec::new())
    };
    Rc::new(Function {
        name: None,
        params,
        body: FunctionBody::Block(body),
        kind: FunctionKind::Constructor,
        span,
    })
}

/// Source-like description of a callee, for "is not a function" messages.
fn describe_callee(expr: &Expression) -> String {
    match &expr.value {
        Expr::Identifier(name) => name.clone(),
        Expr::This => "this".to_string(),
        Expr::Member {
            object,
            property: MemberProperty::Named(name),
        } => format!("{}.{}", describe_callee(object), name),
        Expr::Member { object, .. } => format!("{}[...]", describe_callee(object)),
        Expr::OptionalMember {
            object,
            property: MemberProperty::Named(name),
        } => format!("{}?.{}", describe_callee(object), name),
        Expr::Call { callee, .. } | Expr::OptionalCall { callee, .. } => format!("{}(...)", describe_callee(callee)),
        Expr::OptionalChain(inner) => describe_callee(inner),
        Expr::Paren(inner) => describe_callee(inner),
        _ => "(intermediate value)".to_string(),
    }
}

impl Interpreter {
    // ========================================================================
    // STATEMENTS
    // ========================================================================

    /// Hoist the declarations of a function or program body into `env`.
    pub(crate) fn instantiate_body(&mut self, stmts: &[Statement], env: &Env) {
        let mut vars = Vec::new();
        collect_var_names(stmts, &mut vars);
        for name in &vars {
            env.declare_var(name);
        }
        self.declare_lexical(stmts, env);
    }

    /// `let`, `const` and `class` enter their dead zone; functions are ready.
    fn declare_lexical(&mut self, stmts: &[Statement], env: &Env) {
        for stmt in stmts {
            match &stmt.value {
                Stmt::VarDecl(decl) if decl.kind != VarKind::Var => {
                    let mut names = Vec::new();
                    for declarator in &decl.declarations {
                        declarator.target.bound_names(&mut names);
                    }
                    for name in names {
                        env.declare(&name, None, decl.kind == VarKind::Let);
                    }
                }
                Stmt::Class(class) => {
                    if let Some(name) = &class.name {
                        env.declare(name, None, true);
                    }
                }
                Stmt::Function(function) => {
                    if let Some(name) = &function.name {
                        let closure = self.make_closure(function, env, None);
                        env.declare(name, Some(closure), true);
                    }
                }
                _ => {}
            }
        }
    }

    fn block_scope(&mut self, stmts: &[Statement], env: &Env) -> Env {
        if !declares_lexically(stmts) {
            return env.clone();
        }
        let scope = env.child();
        self.declare_lexical(stmts, &scope);
        scope
    }

    pub(crate) fn exec_block(&mut self, stmts: &[Statement], env: &Env) -> Exec {
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, stmts: &[Statement], env: &Env) -> Exec {
        let scope = self.block_scope(stmts, env);
        self.exec_block(stmts, &scope)
    }

    pub(crate) fn exec(&mut self, stmt: &Statement, env: &Env) -> Exec {
        self.tick()?;
        ensure_sufficient_stack(|| self.exec_inner(stmt, env))
    }

    fn exec_inner(&mut self, stmt: &Statement, env: &Env) -> Exec {
        match &stmt.value {
            Stmt::Expression(expr) => {
                self.eval(expr, env)?;
                Ok(Flow::Normal)
            }
            Stmt::VarDecl(decl) => {
                self.exec_var_decl(decl, env)?;
                Ok(Flow::Normal)
            }
            Stmt::Function(_) | Stmt::Empty | Stmt::Debugger => Ok(Flow::Normal),
            Stmt::Class(class) => {
                let value = self.eval_class(class, env, None)?;
                if let Some(name) = &class.name {
                    env.initialize(name, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Enum(decl) => {
                let object = match env.lookup(&decl.name) {
                    Lookup::Value(Value::Object(object)) => object,
                    _ => {
                        let object = self.new_object();
                        self.assign_identifier(&decl.name, Value::Object(object.clone()), env)?;
                        object
                    }
                };
                let mut next = 0.0;
                for member in &decl.members {
                    let value = match &member.init {
                        Some(init) => self.eval(init, env)?,
                        None => Value::Number(next),
                    };
                    if let Value::Number(n) = value {
                        next = n + 1.0;
                        object.set_own(number_to_string(n), Value::from(member.name.as_str()));
                    }
                    object.set_own(member.name.clone(), value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.exec(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate, env)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Block(stmts) => self.exec_scoped(stmts, env),
            Stmt::For { .. }
            | Stmt::ForIn { .. }
            | Stmt::ForOf { .. }
            | Stmt::While { .. }
            | Stmt::DoWhile { .. } => self.exec_loop(stmt, env, &[]),
            Stmt::Break(label) => Ok(Flow::Break(label.clone())),
            Stmt::Continue(label) => Ok(Flow::Continue(label.clone())),
            Stmt::Throw(expr) => {
                let value = self.eval(expr, env)?;
                Err(Thrown::Exception(value))
            }
            Stmt::Try {
                block,
                handler,
                finalizer,
            } => {
                let mut result = self.exec_scoped(block, env);
                if let (Err(Thrown::Exception(error)), Some(handler)) = (&result, handler) {
                    let error = error.clone();
                    result = self.exec_catch(handler, error, env);
                }
                if matches!(result, Err(Thrown::BudgetExceeded { .. })) {
                    return result;
                }
                if let Some(finalizer) = finalizer {
                    match self.exec_scoped(finalizer, env)? {
                        Flow::Normal => {}
                        abrupt => return Ok(abrupt),
                    }
                }
                result
            }
            Stmt::Switch {
                discriminant,
                cases,
            } => {
                let value = self.eval(discriminant, env)?;
                let scope = env.child();
                for case in cases {
                    self.declare_lexical(&case.body, &scope);
                }
                let mut start = None;
                for (index, case) in cases.iter().enumerate() {
                    if let Some(test) = &case.test {
                        if self.eval(test, &scope)?.strict_equals(&value) {
                            start = Some(index);
                            break;
                        }
                    }
                }
                let Some(start) = start.or_else(|| cases.iter().position(|c| c.test.is_none())) else {
                    return Ok(Flow::Normal);
                };
                for case in &cases[start..] {
                    match self.exec_block(&case.body, &scope)? {
                        Flow::Normal => {}
                        Flow::Break(None) => return Ok(Flow::Normal),
                        abrupt => return Ok(abrupt),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Labeled { .. } => {
                let mut labels = Vec::new();
                let mut body = stmt;
                while let Stmt::Labeled { label, body: inner } = &body.value {
                    labels.push(label.clone());
                    body = inner;
                }
                let flow = if body.value.is_loop() {
                    self.tick()?;
                    self.exec_loop(body, env, &labels)?
                } else {
                    self.exec(body, env)?
                };
                match flow {
                    Flow::Break(Some(label)) if labels.contains(&label) => Ok(Flow::Normal),
                    other => Ok(other),
                }
            }
        }
    }

    fn exec_catch(&mut self, handler: &CatchClause, error: Value, env: &Env) -> Exec {
        let scope = env.child();
        if let Some(param) = &handler.param {
            self.bind_pattern(param, error, &scope, BindMode::Lexical { mutable: true })?;
        }
        self.exec_scoped(&handler.body, &scope)
    }

    fn exec_var_decl(&mut self, decl: &VarDecl, env: &Env) -> Result<(), Thrown> {
        let mode = match decl.kind {
            VarKind::Var => BindMode::Var,
            VarKind::Let => BindMode::Lexical { mutable: true },
            VarKind::Const => BindMode::Lexical { mutable: false },
        };
        for declarator in &decl.declarations {
            let value = match (&declarator.init, &declarator.target) {
                (Some(init), Pattern::Identifier(name)) => self.eval_named(init, env, name)?,
                (Some(init), _) => self.eval(init, env)?,
                // `var x;` leaves an existing value alone.
                (None, _) if decl.kind == VarKind::Var => continue,
                (None, _) => Value::Undefined,
            };
            self.bind_pattern(&declarator.target, value, env, mode)?;
        }
        Ok(())
    }

    fn exec_loop(&mut self, stmt: &Statement, env: &Env, labels: &[String]) -> Exec {
        match &stmt.value {
            Stmt::While { test, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                    let flow = self.exec(body, env)?;
                    if let LoopStep::Exit(flow) = loop_step(flow, labels) {
                        return Ok(flow);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::DoWhile { body, test } => {
                loop {
                    self.tick()?;
                    let flow = self.exec(body, env)?;
                    if let LoopStep::Exit(flow) = loop_step(flow, labels) {
                        return Ok(flow);
                    }
                    if !self.eval(test, env)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_env = env.child();
                let mut per_iteration = Vec::new();
                match init {
                    Some(ForInit::VarDecl(decl)) => {
                        if decl.kind != VarKind::Var {
                            for declarator in &decl.declarations {
                                declarator.target.bound_names(&mut per_iteration);
                            }
                            for name in &per_iteration {
                                loop_env.declare(name, None, decl.kind == VarKind::Let);
                            }
                        }
                        self.exec_var_decl(decl, &loop_env)?;
                    }
                    Some(ForInit::Expression(expr)) => {
                        self.eval(expr, &loop_env)?;
                    }
                    None => {}
                }
                // Each iteration sees its own copy of the loop's `let` bindings.
                let mut current = if per_iteration.is_empty() {
                    loop_env
                } else {
                    loop_env.copy_bindings(env, &per_iteration)
                };
                loop {
                    self.tick()?;
                    if let Some(test) = test {
                        if !self.eval(test, &current)?.truthy() {
                            break;
                        }
                    }
                    let flow = self.exec(body, &current)?;
                    if let LoopStep::Exit(flow) = loop_step(flow, labels) {
                        return Ok(flow);
                    }
                    if !per_iteration.is_empty() {
                        current = current.copy_bindings(env, &per_iteration);
                    }
                    if let Some(update) = update {
                        self.eval(update, &current)?;
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ForIn { head, object, body } => {
                let object = self.eval(object, env)?;
                let keys = self
                    .for_in_keys(&object)
                    .into_iter()
                    .map(Value::from)
                    .collect();
                self.exec_for_each(head, keys, body, env, labels)
            }
            Stmt::ForOf {
                head,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, env)?;
                let items = self.iterate(&iterable)?;
                self.exec_for_each(head, items, body, env, labels)
            }
            _ => self.exec(stmt, env),
        }
    }

    fn exec_for_each(
        &mut self,
        head: &ForHead,
        items: Vec<Value>,
        body: &Statement,
        env: &Env,
        labels: &[String],
    ) -> Exec {
        for item in items {
            self.tick()?;
            let scope = env.child();
            let mode = match head {
                ForHead::VarDecl(VarKind::Var, _) => BindMode::Var,
                ForHead::VarDecl(kind, _) => BindMode::Lexical {
                    mutable: *kind == VarKind::Let,
                },
                ForHead::Pattern(_) => BindMode::Assign,
            };
            let (ForHead::VarDecl(_, pattern) | ForHead::Pattern(pattern)) = head;
            self.bind_pattern(pattern, item, &scope, mode)?;
            let flow = self.exec(body, &scope)?;
            if let LoopStep::Exit(flow) = loop_step(flow, labels) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    // ========================================================================
    // BINDINGS
    // ========================================================================

    fn lookup_identifier(&mut self, name: &str, env: &Env) -> Eval {
        match env.lookup(name) {
            Lookup::Value(value) => Ok(value),
            Lookup::Uninitialized => Err(self.reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            ))),
            Lookup::Unbound => {
                let global = self.realm.global.clone();
                if self.has_property(&global, name) {
                    self.get_from(&global, name, &Value::Object(global.clone()))
                } else {
                    Err(self.reference_error(format!("{} is not defined", name)))
                }
            }
        }
    }

    fn assign_identifier(&mut self, name: &str, value: Value, env: &Env) -> Result<(), Thrown> {
        match env.assign(name, value.clone()) {
            Store::Done => Ok(()),
            Store::Constant => Err(self.type_error("Assignment to constant variable.")),
            Store::Uninitialized => Err(self.reference_error(format!(
                "Cannot access '{}' before initialization",
                name
            ))),
            // Sloppy-mode implicit global.
            Store::Unbound => {
                let global = Value::Object(self.realm.global.clone());
                self.set_property(&global, name, value)
            }
        }
    }

    fn this_value(&mut self, env: &Env) -> Eval {
        match env.lookup(THIS) {
            Lookup::Value(value) => Ok(value),
            Lookup::Uninitialized => Err(self.reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )),
            Lookup::Unbound => Ok(Value::Undefined),
        }
    }

    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        env: &Env,
        mode: BindMode,
    ) -> Result<(), Thrown> {
        match pattern {
            Pattern::Identifier(name) => match mode {
                BindMode::Lexical { mutable } => {
                    env.declare(name, Some(value), mutable);
                    Ok(())
                }
                BindMode::Var | BindMode::Assign => self.assign_identifier(name, value, env),
            },
            Pattern::Member(expr) => {
                let reference = self.reference(expr, env)?;
                self.put_reference(&reference, value, env)
            }
            Pattern::Array { elements, rest } => {
                if value.is_nullish() {
                    return Err(self.type_error(format!(
                        "{} is not iterable",
                        describe_for_error(&value)
                    )));
                }
                let items = self.iterate(&value)?;
                for (index, element) in elements.iter().enumerate() {
                    let Some(element) = element else {
                        continue;
                    };
                    let item = items.get(index).cloned().unwrap_or_default();
                    self.bind_element(element, item, env, mode)?;
                }
                if let Some(rest) = rest {
                    let remaining = items.get(elements.len()..).map(<[Value]>::to_vec).unwrap_or_default();
                    let array = self.new_array(remaining);
                    self.bind_pattern(rest, array, env, mode)?;
                }
                Ok(())
            }
            Pattern::Object { properties, rest } => {
                if value.is_nullish() {
                    let shown = describe_for_error(&value);
                    let message = match properties.first().and_then(|p| p.key.static_name()) {
                        Some(key) => format!(
                            "Cannot destructure property '{}' of '{}' as it is {}.",
                            key, shown, shown
                        ),
                        None => format!("Cannot destructure '{}' as it is {}.", shown, shown),
                    };
                    return Err(self.type_error(message));
                }
                let mut used = Vec::with_capacity(properties.len());
                for property in properties {
                    let key = self.property_key(&property.key, env)?;
                    let item = self.get_property(&value, &key)?;
                    used.push(key);
                    self.bind_element(&property.value, item, env, mode)?;
                }
                if let Some(rest) = rest {
                    let copy = self.new_object();
                    for key in self.own_keys(&value) {
                        if !used.contains(&key) {
                            let item = self.get_property(&value, &key)?;
                            copy.set_own(key, item);
                        }
                    }
                    self.bind_pattern(rest, Value::Object(copy), env, mode)?;
                }
                Ok(())
            }
        }
    }

    fn bind_element(
        &mut self,
        element: &PatternElement,
        value: Value,
        env: &Env,
        mode: BindMode,
    ) -> Result<(), Thrown> {
        let value = match (&value, &element.default) {
            (Value::Undefined, Some(default)) => match &element.target {
                Pattern::Identifier(name) => self.eval_named(default, env, name)?,
                _ => self.eval(default, env)?,
            },
            _ => value,
        };
        self.bind_pattern(&element.target, value, env, mode)
    }

    fn reference(&mut self, expr: &Expression, env: &Env) -> Result<Reference, Thrown> {
        match &expr.value {
            Expr::Identifier(name) => Ok(Reference::Binding(name.clone())),
            Expr::Paren(inner) => self.reference(inner, env),
            Expr::Member { object, property } => {
                let base = if matches!(object.value, Expr::Super) {
                    self.this_value(env)?
                } else {
                    self.eval(object, env)?
                };
                let key = self.member_key(property, env)?;
                Ok(Reference::Property { base, key })
            }
            _ => Err(self.throw(ErrorKind::SyntaxError, "Invalid left-hand side in assignment")),
        }
    }

    fn get_reference(&mut self, reference: &Reference, env: &Env) -> Eval {
        match reference {
            Reference::Binding(name) => self.lookup_identifier(name, env),
            Reference::Property { base, key } => self.get_property(base, key),
        }
    }

    fn put_reference(&mut self, reference: &Reference, value: Value, env: &Env) -> Result<(), Thrown> {
        match reference {
            Reference::Binding(name) => self.assign_identifier(name, value, env),
            Reference::Property { base, key } => self.set_property(base, key, value),
        }
    }

    fn property_key(&mut self, key: &PropertyKey, env: &Env) -> Result<String, Thrown> {
        match key {
            PropertyKey::Computed(expr) => {
                let value = self.eval(expr, env)?;
                self.to_property_key(&value)
            }
            other => Ok(other.static_name().unwrap_or_default()),
        }
    }

    fn member_key(&mut self, property: &MemberProperty, env: &Env) -> Result<String, Thrown> {
        match property {
            MemberProperty::Named(name) => Ok(name.clone()),
            MemberProperty::Computed(expr) => {
                let value = self.eval(expr, env)?;
                self.to_property_key(&value)
            }
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    pub(crate) fn eval(&mut self, expr: &Expression, env: &Env) -> Eval {
        ensure_sufficient_stack(|| self.eval_inner(expr, env))
    }

    /// Evaluate, naming anonymous functions and classes after their binding.
    fn eval_named(&mut self, expr: &Expression, env: &Env, name: &str) -> Eval {
        match &expr.value {
            Expr::Function(function) if function.name.is_none() => {
                Ok(self.make_closure(function, env, Some(name)))
            }
            Expr::Class(class) if class.name.is_none() => self.eval_class(class, env, Some(name)),
            Expr::Paren(inner) => self.eval_named(inner, env, name),
            _ => self.eval(expr, env),
        }
    }

    fn eval_inner(&mut self, expr: &Expression, env: &Env) -> Eval {
        match &expr.value {
            Expr::Number { value, .. } => Ok(Value::Number(*value)),
            Expr::String { value, .. } => Ok(Value::from(value.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Template { quasis, exprs } => {
                let mut text = String::new();
                for (index, chunk) in quasis.iter().enumerate() {
                    text.push_str(&chunk.cooked);
                    if let Some(expr) = exprs.get(index) {
                        let value = self.eval(expr, env)?;
                        let part = self.to_string(&value)?;
                        self.check_joined_length(&[&text, &part], "")?;
                        text.push_str(&part);
                    }
                }
                Ok(Value::from(text))
            }
            Expr::Regex { pattern, flags } => regexp::create_regexp(self, pattern, flags),
            Expr::Identifier(name) => self.lookup_identifier(name, env),
            Expr::This => self.this_value(env),
            Expr::Super => Err(self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here")),
            Expr::Spread(_) => Err(self.throw(ErrorKind::SyntaxError, "Unexpected token '...'")),
            Expr::Paren(inner) => self.eval(inner, env),
            Expr::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    match element {
                        Some(Spanned {
                            value: Expr::Spread(inner),
                            ..
                        }) => {
                            let spread = self.eval(inner, env)?;
                            items.extend(self.iterate(&spread)?);
                        }
                        Some(element) => items.push(self.eval(element, env)?),
                        None => items.push(Value::Undefined),
                    }
                }
                Ok(self.new_array(items))
            }
            Expr::Object(members) => self.eval_object(members, env),
            Expr::Function(function) => Ok(self.make_closure(function, env, None)),
            Expr::Class(class) => self.eval_class(class, env, None),
            Expr::Unary { op, argument } => self.eval_unary(*op, argument, env),
            Expr::Update {
                op,
                prefix,
                target,
            } => {
                let reference = self.reference(target, env)?;
                let old = self.get_reference(&reference, env)?;
                let old = self.to_number(&old)?;
                let new = match op {
                    UpdateOp::Increment => old + 1.0,
                    UpdateOp::Decrement => old - 1.0,
                };
                self.put_reference(&reference, Value::Number(new), env)?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary_op(*op, &left, &right)
            }
            Expr::Logical { op, left, right } => {
                let left = self.eval(left, env)?;
                let short = match op {
                    LogicalOp::And => !left.truthy(),
                    LogicalOp::Or => left.truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, env),
            Expr::Member { object, property } => {
                if matches!(object.value, Expr::Super) {
                    return self.super_get(property, env);
                }
                let base = self.eval(object, env)?;
                let key = self.member_key(property, env)?;
                self.get_property(&base, &key)
            }
            Expr::Call { callee, arguments } => self.eval_call(callee, arguments, env),
            Expr::OptionalChain(inner) => Ok(match self.eval_link(inner, env)? {
                Some((value, _)) => value,
                None => Value::Undefined,
            }),
            Expr::OptionalMember { .. } | Expr::OptionalCall { .. } => Ok(match self.eval_link(expr, env)? {
                Some((value, _)) => value,
                None => Value::Undefined,
            }),
            Expr::New { callee, arguments } => {
                let constructor = self.eval(callee, env)?;
                let args = self.eval_arguments(arguments, env)?;
                match &constructor {
                    Value::Object(object) if object.is_callable() => {
                        self.construct(object, &args, object)
                    }
                    _ => Err(self.type_error(format!(
                        "{} is not a constructor",
                        describe_callee(callee)
                    ))),
                }
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval(expr, env)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, argument: &Expression, env: &Env) -> Eval {
        match op {
            UnaryOp::TypeOf => {
                if let Expr::Identifier(name) = &argument.value {
                    let global = self.realm.global.clone();
                    if matches!(env.lookup(name), Lookup::Unbound) && !self.has_property(&global, name) {
                        return Ok(Value::from("undefined"));
                    }
                }
                let value = self.eval(argument, env)?;
                Ok(Value::from(value.type_of()))
            }
            UnaryOp::Delete => match &argument.value {
                Expr::Member { object, property } => {
                    let base = self.eval(object, env)?;
                    let key = self.member_key(property, env)?;
                    Ok(Value::Bool(self.delete_property(&base, &key)?))
                }
                _ => {
                    self.eval(argument, env)?;
                    Ok(Value::Bool(true))
                }
            },
            UnaryOp::Void => {
                self.eval(argument, env)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Not => Ok(Value::Bool(!self.eval(argument, env)?.truthy())),
            UnaryOp::Minus => {
                let value = self.eval(argument, env)?;
                Ok(Value::Number(-self.to_number(&value)?))
            }
            UnaryOp::Plus => {
                let value = self.eval(argument, env)?;
                Ok(Value::Number(self.to_number(&value)?))
            }
            UnaryOp::BitNot => {
                let value = self.eval(argument, env)?;
                let n = crate::runtime::convert::to_int32(self.to_number(&value)?);
                Ok(Value::Number(f64::from(!n)))
            }
        }
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Pattern, value: &Expression, env: &Env) -> Eval {
        match (op, target) {
            (AssignOp::Assign, Pattern::Identifier(name)) => {
                let result = self.eval_named(value, env, name)?;
                self.assign_identifier(name, result.clone(), env)?;
                Ok(result)
            }
            (AssignOp::Assign, Pattern::Member(expr)) => {
                let reference = self.reference(expr, env)?;
                let result = self.eval(value, env)?;
                self.put_reference(&reference, result.clone(), env)?;
                Ok(result)
            }
            (AssignOp::Assign, pattern) => {
                let result = self.eval(value, env)?;
                self.bind_pattern(pattern, result.clone(), env, BindMode::Assign)?;
                Ok(result)
            }
            (op, pattern) => {
                let reference = match pattern {
                    Pattern::Identifier(name) => Reference::Binding(name.clone()),
                    Pattern::Member(expr) => self.reference(expr, env)?,
                    _ => {
                        return Err(self.throw(
                            ErrorKind::SyntaxError,
                            "Invalid left-hand side in assignment",
                        ))
                    }
                };
                let current = self.get_reference(&reference, env)?;
                if let Some(logical) = op.logical() {
                    let short = match logical {
                        LogicalOp::And => !current.truthy(),
                        LogicalOp::Or => current.truthy(),
                        LogicalOp::Nullish => !current.is_nullish(),
                    };
                    if short {
                        return Ok(current);
                    }
                    let result = match &reference {
                        Reference::Binding(name) => self.eval_named(value, env, name)?,
                        Reference::Property { .. } => self.eval(value, env)?,
                    };
                    self.put_reference(&reference, result.clone(), env)?;
                    return Ok(result);
                }
                let Some(binary) = op.binary() else {
                    return Ok(current);
                };
                let rhs = self.eval(value, env)?;
                let result = self.binary_op(binary, &current, &rhs)?;
                self.put_reference(&reference, result.clone(), env)?;
                Ok(result)
            }
        }
    }

    fn eval_object(&mut self, members: &[ObjectMember], env: &Env) -> Eval {
        let object = self.new_object();
        for member in members {
            match member {
                ObjectMember::Property { key, value, .. } => {
                    let key = self.property_key(key, env)?;
                    let value = self.eval_named(value, env, &key)?;
                    self.define_own(&object, &key, value);
                }
                ObjectMember::Method { key, function } => {
                    let key = self.property_key(key, env)?;
                    let method = self.make_method(function, env, &object, &key);
                    self.define_own(&object, &key, Value::Object(method));
                }
                ObjectMember::Getter { key, function } => {
                    let key = self.property_key(key, env)?;
                    let getter = self.make_method(function, env, &object, &key);
                    self.define_accessor(&object, &key, Some(getter), None, true);
                }
                ObjectMember::Setter { key, function } => {
                    let key = self.property_key(key, env)?;
                    let setter = self.make_method(function, env, &object, &key);
                    self.define_accessor(&object, &key, None, Some(setter), true);
                }
                ObjectMember::Spread(expr) => {
                    let source = self.eval(expr, env)?;
                    self.copy_data_properties(&object, &source)?;
                }
            }
        }
        Ok(Value::Object(object))
    }

    /// Copy own enumerable properties, as spread and `Object.assign` do.
    pub(crate) fn copy_data_properties(&mut self, target: &Obj, source: &Value) -> Result<(), Thrown> {
        if source.is_nullish() {
            return Ok(());
        }
        for key in self.own_keys(source) {
            let value = self.get_property(source, &key)?;
            self.define_own(target, &key, value);
        }
        Ok(())
    }

    fn eval_arguments(&mut self, arguments: &[Expression], env: &Env) -> Result<Vec<Value>, Thrown> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            if let Expr::Spread(inner) = &argument.value {
                let spread = self.eval(inner, env)?;
                values.extend(self.iterate(&spread)?);
            } else {
                values.push(self.eval(argument, env)?);
            }
        }
        Ok(values)
    }

    fn eval_call(&mut self, callee: &Expression, arguments: &[Expression], env: &Env) -> Eval {
        if matches!(callee.value, Expr::Super) {
            let args = self.eval_arguments(arguments, env)?;
            return self.super_call(args, env);
        }
        let (function, this) = match &callee.value {
            Expr::Member { object, property } if matches!(object.value, Expr::Super) => {
                let this = self.this_value(env)?;
                (self.super_get(property, env)?, this)
            }
            Expr::Member { object, property } => {
                let base = self.eval(object, env)?;
                let key = self.member_key(property, env)?;
                (self.get_property(&base, &key)?, base)
            }
            _ => (self.eval(callee, env)?, Value::Undefined),
        };
        let args = self.eval_arguments(arguments, env)?;
        if !function.is_callable() {
            return Err(self.type_error(format!("{} is not a function", describe_callee(callee))));
        }
        self.call(&function, this, &args)
    }

    /// One link of an optional chain with the `this` a call on it would use.
    /// `None` means a `?.` met `null` or `undefined` and the rest of the
    /// chain is skipped.
    fn eval_link(&mut self, expr: &Expression, env: &Env) -> Result<Option<(Value, Value)>, Thrown> {
        match &expr.value {
            Expr::Member { object, .. } if matches!(object.value, Expr::Super) => {
                let value = self.eval(expr, env)?;
                Ok(Some((value, self.this_value(env)?)))
            }
            Expr::Call { callee, .. } if matches!(callee.value, Expr::Super) => {
                Ok(Some((self.eval(expr, env)?, Value::Undefined)))
            }
            Expr::OptionalMember { object, property } | Expr::Member { object, property } => {
                let Some((base, _)) = self.eval_link(object, env)? else {
                    return Ok(None);
                };
                if matches!(expr.value, Expr::OptionalMember { .. }) && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, env)?;
                let value = self.get_property(&base, &key)?;
                Ok(Some((value, base)))
            }
            Expr::OptionalCall { callee, arguments } | Expr::Call { callee, arguments } => {
                let Some((function, this)) = self.eval_link(callee, env)? else {
                    return Ok(None);
                };
                if matches!(expr.value, Expr::OptionalCall { .. }) && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_arguments(arguments, env)?;
                if !function.is_callable() {
                    return Err(self.type_error(format!("{} is not a function", describe_callee(callee))));
                }
                Ok(Some((self.call(&function, this, &args)?, Value::Undefined)))
            }
            _ => Ok(Some((self.eval(expr, env)?, Value::Undefined))),
        }
    }

    // ========================================================================
    // SUPER
    // ========================================================================

    fn super_get(&mut self, property: &MemberProperty, env: &Env) -> Eval {
        let key = self.member_key(property, env)?;
        let this = self.this_value(env)?;
        let Lookup::Value(Value::Object(home)) = env.lookup(HOME_OBJECT) else {
            return Err(self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here"));
        };
        match home.proto() {
            Some(proto) => self.get_from(&proto, &key, &this),
            None => Ok(Value::Undefined),
        }
    }

    fn super_call(&mut self, args: Vec<Value>, env: &Env) -> Eval {
        let (Lookup::Value(Value::Object(active)), Lookup::Value(Value::Object(new_target))) =
            (env.lookup(ACTIVE_FUNCTION), env.lookup(NEW_TARGET))
        else {
            return Err(self.throw(ErrorKind::SyntaxError, "'super' keyword unexpected here"));
        };
        let parent = match active.proto() {
            Some(parent) if parent.is_callable() => parent,
            _ => {
                return Err(self.type_error(format!(
                    "Super constructor null of {} is not a constructor",
                    match function_name(&active) {
                        name if name.is_empty() => "anonymous class".to_string(),
                        name => name,
                    }
                )))
            }
        };
        let this = self.construct(&parent, &args, &new_target)?;
        if !env.bind_this(this.clone()) {
            return Err(self.reference_error("Super constructor may only be called once"));
        }
        let class = match &active.borrow().kind {
            ObjectKind::Function(FunctionObject::Closure(closure)) => closure.class.clone(),
            _ => None,
        };
        if let (Some(class), Value::Object(object)) = (class, &this) {
            self.initialize_fields(object, &class)?;
        }
        Ok(Value::Undefined)
    }

    fn initialize_fields(&mut self, object: &Obj, class: &ClassInfo) -> Result<(), Thrown> {
        for field in &class.fields {
            let value = match &field.init {
                Some(init) => {
                    let scope = class.env.child();
                    scope.declare(THIS, Some(Value::Object(object.clone())), false);
                    self.eval_named(init, &scope, &field.key)?
                }
                None => Value::Undefined,
            };
            self.define_own(object, &field.key, value);
        }
        Ok(())
    }

    // ========================================================================
    // FUNCTIONS
    // ========================================================================

    /// A function object around `callable`, with `length` and `name`.
    pub fn create_function(&self, callable: FunctionObject, name: &str, length: usize) -> Obj {
        let object = self.alloc(JsObject::new(
            Some(self.realm.function_prototype.clone()),
            ObjectKind::Function(callable),
        ));
        {
            let mut borrowed = object.borrow_mut();
            borrowed
                .properties
                .insert("length".to_string(), Property::readonly(Value::from(length)));
            borrowed
                .properties
                .insert("name".to_string(), Property::readonly(Value::from(name)));
        }
        object
    }

    pub(crate) fn make_closure(&mut self, function: &Rc<Function>, env: &Env, name_hint: Option<&str>) -> Value {
        let name = function
            .name
            .as_deref()
            .or(name_hint)
            .unwrap_or_default()
            .to_string();
        let closure = Closure {
            function: function.clone(),
            env: env.clone(),
            home: None,
            class: None,
        };
        let object = self.create_function(FunctionObject::Closure(closure), &name, function.arity());
        if function.is_constructible() {
            let prototype = self.new_object();
            prototype.set_hidden("constructor", Value::Object(object.clone()));
            object.set_hidden("prototype", Value::Object(prototype));
        }
        Value::Object(object)
    }

    fn make_method(&mut self, function: &Rc<Function>, env: &Env, home: &Obj, key: &str) -> Obj {
        let name = match function.kind {
            FunctionKind::Getter => format!("get {}", key),
            FunctionKind::Setter => format!("set {}", key),
            _ => key.to_string(),
        };
        let closure = Closure {
            function: function.clone(),
            env: env.clone(),
            home: Some(home.clone()),
            class: None,
        };
        self.create_function(FunctionObject::Closure(closure), &name, function.arity())
    }

    /// Call `function` with `this`.
    pub fn call(&mut self, function: &Value, this: Value, args: &[Value]) -> Eval {
        let callable = match function {
            Value::Object(object) => match &object.borrow().kind {
                ObjectKind::Function(callable) => Some((object.clone(), callable.clone())),
                _ => None,
            },
            _ => None,
        };
        let Some((object, callable)) = callable else {
            return Err(self.type_error(format!(
                "{} is not a function",
                describe_for_error(function)
            )));
        };
        self.enter_call()?;
        let result = ensure_sufficient_stack(|| self.call_inner(&object, callable, this, args));
        self.exit_call();
        result
    }

    fn call_inner(&mut self, object: &Obj, callable: FunctionObject, this: Value, args: &[Value]) -> Eval {
        match callable {
            FunctionObject::Native(native) => (native.call)(self, &this, args),
            FunctionObject::Bound(bound) => {
                let mut all = bound.args.clone();
                all.extend_from_slice(args);
                self.call(&Value::Object(bound.target.clone()), bound.this.clone(), &all)
            }
            FunctionObject::Closure(closure) => {
                if let Some(class) = &closure.class {
                    return Err(self.type_error(format!(
                        "Class constructor {} cannot be invoked without 'new'",
                        class.name
                    )));
                }
                let (returned, _) = self.run_closure(&closure, object, Some(this), args, None)?;
                Ok(returned.unwrap_or_default())
            }
        }
    }

    /// `new constructor(...args)`, with `new_target` deciding the prototype.
    pub fn construct(&mut self, constructor: &Obj, args: &[Value], new_target: &Obj) -> Eval {
        let callable = match &constructor.borrow().kind {
            ObjectKind::Function(callable) => Some(callable.clone()),
            _ => None,
        };
        let Some(callable) = callable else {
            return Err(self.type_error(format!(
                "{} is not a constructor",
                describe_for_error(&Value::Object(constructor.clone()))
            )));
        };
        self.enter_call()?;
        let result =
            ensure_sufficient_stack(|| self.construct_inner(constructor, callable, args, new_target));
        self.exit_call();
        result
    }

    fn construct_inner(
        &mut self,
        constructor: &Obj,
        callable: FunctionObject,
        args: &[Value],
        new_target: &Obj,
    ) -> Eval {
        match callable {
            FunctionObject::Native(native) => {
                let Some(construct) = native.construct.clone() else {
                    return Err(self.type_error(format!("{} is not a constructor", native.name)));
                };
                let value = construct(self, &Value::Undefined, args)?;
                if !new_target.ptr_eq(constructor) {
                    let target = Value::Object(new_target.clone());
                    if let (Value::Object(object), Value::Object(proto)) =
                        (&value, self.get_property(&target, "prototype")?)
                    {
                        object.borrow_mut().proto = Some(proto);
                    }
                }
                Ok(value)
            }
            FunctionObject::Bound(bound) => {
                let mut all = bound.args.clone();
                all.extend_from_slice(args);
                let target = if new_target.ptr_eq(constructor) {
                    bound.target.clone()
                } else {
                    new_target.clone()
                };
                self.construct(&bound.target, &all, &target)
            }
            FunctionObject::Closure(closure) => {
                if !closure.function.is_constructible() {
                    let name = function_name(constructor);
                    return Err(self.type_error(format!(
                        "{} is not a constructor",
                        if name.is_empty() { "(intermediate value)" } else { &name }
                    )));
                }
                let derived = closure.class.as_ref().is_some_and(|class| class.derived);
                let this = if derived {
                    None
                } else {
                    let target = Value::Object(new_target.clone());
                    let proto = match self.get_property(&target, "prototype")? {
                        Value::Object(proto) => proto,
                        _ => self.realm.object_prototype.clone(),
                    };
                    let object = self.alloc(JsObject::new(Some(proto), ObjectKind::Ordinary));
                    if let Some(class) = &closure.class {
                        self.initialize_fields(&object, class)?;
                    }
                    Some(Value::Object(object))
                };
                let (returned, env) = self.run_closure(&closure, constructor, this, args, Some(new_target))?;
                if let Some(Value::Object(object)) = returned {
                    return Ok(Value::Object(object));
                }
                self.this_value(&env)
            }
        }
    }

    /// Run a closure's body; returns its `return` value and its scope.
    fn run_closure(
        &mut self,
        closure: &Closure,
        object: &Obj,
        this: Option<Value>,
        args: &[Value],
        new_target: Option<&Obj>,
    ) -> Result<(Option<Value>, Env), Thrown> {
        let function = closure.function.clone();
        let mut scope = closure.env.clone();
        if function.kind == FunctionKind::Expression {
            if let Some(name) = &function.name {
                scope = scope.child();
                scope.declare(name, Some(Value::Object(object.clone())), false);
            }
        }
        let env = scope.child();
        if !function.is_arrow() {
            env.declare(THIS, this, false);
            env.declare(ACTIVE_FUNCTION, Some(Value::Object(object.clone())), false);
            env.declare(
                NEW_TARGET,
                Some(new_target.map(|t| Value::Object(t.clone())).unwrap_or_default()),
                false,
            );
            if let Some(home) = &closure.home {
                env.declare(HOME_OBJECT, Some(Value::Object(home.clone())), false);
            }
            let arguments = self.new_array(args.to_vec());
            env.declare("arguments", Some(arguments), true);
        }
        self.bind_params(&function.params, args, &env)?;
        let returned = match &function.body {
            FunctionBody::Block(stmts) => {
                self.instantiate_body(stmts, &env);
                match self.exec_block(stmts, &env)? {
                    Flow::Return(value) => Some(value),
                    _ => None,
                }
            }
            FunctionBody::Expression(expr) => Some(self.eval(expr, &env)?),
        };
        Ok((returned, env))
    }

    fn bind_params(&mut self, params: &[Param], args: &[Value], env: &Env) -> Result<(), Thrown> {
        for (index, param) in params.iter().enumerate() {
            let value = if param.rest {
                let rest = args.get(index..).map(<[Value]>::to_vec).unwrap_or_default();
                self.new_array(rest)
            } else {
                args.get(index).cloned().unwrap_or_default()
            };
            let value = match (&value, &param.default) {
                (Value::Undefined, Some(default)) => match &param.pattern {
                    Pattern::Identifier(name) => self.eval_named(default, env, name)?,
                    _ => self.eval(default, env)?,
                },
                _ => value,
            };
            self.bind_pattern(&param.pattern, value, env, BindMode::Lexical { mutable: true })?;
        }
        Ok(())
    }

    // ========================================================================
    // CLASSES
    // ========================================================================

    pub(crate) fn eval_class(&mut self, class: &Rc<Class>, env: &Env, name_hint: Option<&str>) -> Eval {
        let name = class
            .name
            .as_deref()
            .or(name_hint)
            .unwrap_or_default()
            .to_string();
        let (parent, parent_proto) = match &class.super_class {
            None => (None, Some(self.realm.object_prototype.clone())),
            Some(expr) => {
                let parent = self.eval(expr, env)?;
                match &parent {
                    Value::Null => (None, None),
                    Value::Object(object) if object.is_callable() => {
                        let proto = match self.get_property(&parent, "prototype")? {
                            Value::Object(proto) => Some(proto),
                            Value::Null => None,
                            other => {
                                return Err(self.type_error(format!(
                                    "Class extends value does not have valid prototype property {}",
                                    describe_for_error(&other)
                                )))
                            }
                        };
                        (Some(object.clone()), proto)
                    }
                    other => {
                        return Err(self.type_error(format!(
                            "Class extends value {} is not a constructor or null",
                            describe_for_error(other)
                        )))
                    }
                }
            }
        };

        let class_env = env.child();
        if let Some(own_name) = &class.name {
            class_env.declare(own_name, None, false);
        }
        let prototype = self.alloc(JsObject::new(parent_proto, ObjectKind::Ordinary));

        let mut fields = Vec::new();
        for member in class.members.iter().filter(|m| !m.is_static) {
            if let ClassMemberKind::Field(init) = &member.kind {
                fields.push(FieldInit {
                    key: self.property_key(&member.key, &class_env)?,
                    init: init.clone(),
                });
            }
        }
        let info = Rc::new(ClassInfo {
            name: name.clone(),
            derived: class.super_class.is_some(),
            fields,
            env: class_env.clone(),
        });
        let function = class
            .constructor
            .clone()
            .unwrap_or_else(|| default_constructor(class.super_class.is_some(), class.span));
        let closure = Closure {
            function: function.clone(),
            env: class_env.clone(),
            home: Some(prototype.clone()),
            class: Some(info),
        };
        let constructor = self.create_function(FunctionObject::Closure(closure), &name, function.arity());
        if let Some(parent) = parent {
            constructor.borrow_mut().proto = Some(parent);
        }
        constructor
            .borrow_mut()
            .properties
            .insert("prototype".to_string(), Property::readonly(Value::Object(prototype.clone())));
        prototype.set_hidden("constructor", Value::Object(constructor.clone()));

        for member in &class.members {
            let target = if member.is_static { &constructor } else { &prototype };
            match &member.kind {
                ClassMemberKind::Method(function) => {
                    let key = self.property_key(&member.key, &class_env)?;
                    let method = self.make_method(function, &class_env, target, &key);
                    target.set_hidden(key, Value::Object(method));
                }
                ClassMemberKind::Getter(function) => {
                    let key = self.property_key(&member.key, &class_env)?;
                    let getter = self.make_method(function, &class_env, target, &key);
                    self.define_accessor(target, &key, Some(getter), None, false);
                }
                ClassMemberKind::Setter(function) => {
                    let key = self.property_key(&member.key, &class_env)?;
                    let setter = self.make_method(function, &class_env, target, &key);
                    self.define_accessor(target, &key, None, Some(setter), false);
                }
                ClassMemberKind::Field(_) => {}
            }
        }
        if let Some(own_name) = &class.name {
            class_env.initialize(own_name, Value::Object(constructor.clone()));
        }

        for member in class.members.iter().filter(|m| m.is_static) {
            if let ClassMemberKind::Field(init) = &member.kind {
                let key = self.property_key(&member.key, &class_env)?;
                let value = match init {
                    Some(init) => {
                        let scope = class_env.child();
                        scope.declare(THIS, Some(Value::Object(constructor.clone())), false);
                        self.eval_named(init, &scope, &key)?
                    }
                    None => Value::Undefined,
                };
                self.define_own(&constructor, &key, value);
            }
        }
        Ok(Value::Object(constructor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::inspect::{inspect, Style};
    use crate::runtime::{InterpreterConfig, NullSink};
    use crate::syntax::parse_program;

    fn run(interp: &mut Interpreter, source: &str) -> Result<Value, Thrown> {
        let parsed = parse_program(source);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let env = interp.global_env().child();
        interp.instantiate_body(&parsed.program.body, &env);
        match interp.exec_block(&parsed.program.body, &env)? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn run_text(source: &str) -> String {
        // The interpreter sweeps its heap on drop, so it must outlive inspection.
        let mut interp = Interpreter::new(InterpreterConfig::default(), Box::new(NullSink));
        match run(&mut interp, source) {
            Ok(value) => inspect(&value, Style::Assertion),
            Err(Thrown::Exception(error)) => format!("threw {}", inspect(&error, Style::Console)),
            Err(Thrown::BudgetExceeded { .. }) => "budget".to_string(),
        }
    }

    #[test]
    fn test_closures_and_loops() {
        let source = "var fs = []; for (let i = 0; i < 3; i++) { fs.push(() => i); } return fs.map(f => f());";
        assert_eq!(run_text(source), "[ 0, 1, 2 ]");
    }

    #[test]
    fn test_labeled_continue() {
        let source = "var n = 0; outer: for (var i = 0; i < 3; i++) { for (var j = 0; j < 3; j++) { if (j == 1) continue outer; n++; } } return n;";
        assert_eq!(run_text(source), "3");
    }

    #[test]
    fn test_dead_zone_and_constants() {
        assert_eq!(
            run_text("x; let x = 1;"),
            "threw ReferenceError: Cannot access 'x' before initialization"
        );
        assert_eq!(
            run_text("const c = 1; c = 2;"),
            "threw TypeError: Assignment to constant variable."
        );
        assert_eq!(run_text("return typeof missing;"), "'undefined'");
        assert_eq!(run_text("missing;"), "threw ReferenceError: missing is not defined");
    }

    #[test]
    fn test_try_finally_overrides() {
        assert_eq!(run_text("function f() { try { return 1; } finally { return 2; } } return f();"), "2");
        assert_eq!(
            run_text("try { null.x; } catch (e) { return e.message; }"),
            "'Cannot read properties of null (reading \\'x\\')'"
        );
    }

    #[test]
    fn test_classes() {
        let source = "
            class A { constructor(x) { this.x = x; } get double() { return this.x * 2; } }
            class B extends A { y = 5; sum() { return this.x + this.y + super.constructor.name.length; } }
            const b = new B(3);
            return [b.double, b.sum(), b instanceof A, B.name];
        ";
        assert_eq!(run_text(source), "[ 6, 9, true, 'B' ]");
        assert_eq!(
            run_text("class A {} A();"),
            "threw TypeError: Class constructor A cannot be invoked without 'new'"
        );
    }

    #[test]
    fn test_derived_this_before_super() {
        let source = "class A {} class B extends A { constructor() { this.x = 1; super(); } } new B();";
        assert!(run_text(source).starts_with("threw ReferenceError: Must call super constructor"));
    }

    #[test]
    fn test_destructuring() {
        let source = "const { a, b: [c, d = 4], ...rest } = { a: 1, b: [3], e: 5 }; return [a, c, d, rest.e];";
        assert_eq!(run_text(source), "[ 1, 3, 4, 5 ]");
        assert_eq!(
            run_text("const { a } = undefined;"),
            "threw TypeError: Cannot destructure property 'a' of 'undefined' as it is undefined."
        );
    }

    #[test]
    fn test_switch_fallthrough() {
        let source = "var out = ''; switch (2) { case 1: out += 'a'; case 2: out += 'b'; case 3: out += 'c'; break; default: out += 'd'; } return out;";
        assert_eq!(run_text(source), "'bc'");
    }

    #[test]
    fn test_not_a_function_message() {
        assert_eq!(
            run_text("var obj = {}; obj.method();"),
            "threw TypeError: obj.method is not a function"
        );
    }

    #[test]
    fn test_budget_is_not_catchable() {
        let parsed = parse_program("try { while (true) {} } catch (e) {}");
        let config = InterpreterConfig {
            step_budget: 1_000,
            ..InterpreterConfig::default()
        };
        let mut interp = Interpreter::new(config, Box::new(NullSink));
        let env = interp.global_env().child();
        let result = interp.exec_block(&parsed.program.body, &env);
        assert!(matches!(result, Err(Thrown::BudgetExceeded { budget: 1_000 })));
    }

    #[test]
    fn test_recursion_limit_is_catchable() {
        let source = "function f() { return f(); } try { f(); } catch (e) { return e.message; }";
        assert_eq!(run_text(source), "'Maximum call stack size exceeded'");
    }
}
