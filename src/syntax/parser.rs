//! Parser: pest pairs to syntax tree.
//!
//! Parsing never fails outright. When the grammar rejects the source, the
//! furthest failure position becomes a [`SyntaxError`] and parsing resumes at
//! the next plausible statement boundary after it, so one pass reports every
//! independent syntax error.

use std::fmt;
use std::rc::Rc;

use lazy_static::lazy_static;
use pest::error::{Error, InputLocation};
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use crate::stack::with_parser_stack;
use crate::syntax::*;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct TsParser;

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::op_nullish, Assoc::Left))
        .op(Op::infix(Rule::op_or, Assoc::Left))
        .op(Op::infix(Rule::op_and, Assoc::Left))
        .op(Op::infix(Rule::op_bit_or, Assoc::Left))
        .op(Op::infix(Rule::op_bit_xor, Assoc::Left))
        .op(Op::infix(Rule::op_bit_and, Assoc::Left))
        .op(Op::infix(Rule::op_eq, Assoc::Left)
            | Op::infix(Rule::op_ne, Assoc::Left)
            | Op::infix(Rule::op_strict_eq, Assoc::Left)
            | Op::infix(Rule::op_strict_ne, Assoc::Left))
        .op(Op::infix(Rule::op_lt, Assoc::Left)
            | Op::infix(Rule::op_gt, Assoc::Left)
            | Op::infix(Rule::op_le, Assoc::Left)
            | Op::infix(Rule::op_ge, Assoc::Left)
            | Op::infix(Rule::op_instanceof, Assoc::Left)
            | Op::infix(Rule::op_in, Assoc::Left)
            | Op::postfix(Rule::type_assertion))
        .op(Op::infix(Rule::op_shl, Assoc::Left)
            | Op::infix(Rule::op_shr, Assoc::Left)
            | Op::infix(Rule::op_ushr, Assoc::Left))
        .op(Op::infix(Rule::op_add, Assoc::Left) | Op::infix(Rule::op_sub, Assoc::Left))
        .op(Op::infix(Rule::op_mul, Assoc::Left)
            | Op::infix(Rule::op_div, Assoc::Left)
            | Op::infix(Rule::op_mod, Assoc::Left))
        .op(Op::infix(Rule::op_exp, Assoc::Right));
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// One problem found while parsing. `code` follows the TypeScript numbering
/// where an equivalent diagnostic exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub code: u32,
    pub message: String,
    pub span: Span,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of parsing a whole source unit.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub program: Program,
    pub errors: Vec<SyntaxError>,
}

impl ParseOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Deepest bracket nesting the grammar is run on.
pub const MAX_NESTING: usize = 128;

/// Parse a complete source unit, collecting every syntax error.
pub fn parse_program(source: &str) -> ParseOutput {
    if let Some(error) = nesting_error(source) {
        return ParseOutput {
            program: Program::default(),
            errors: vec![error],
        };
    }
    with_parser_stack(|| parse_statements(source))
}

fn parse_statements(source: &str) -> ParseOutput {
    let mut errors = Vec::new();
    let mut offset = 0;

    loop {
        let rest = &source[offset..];
        match TsParser::parse(Rule::program, rest) {
            Ok(mut pairs) => {
                let mut builder = AstBuilder::new(offset);
                let body = match pairs.next() {
                    Some(program) => builder.build_top_level(program.into_inner()),
                    None => Vec::new(),
                };
                errors.append(&mut builder.errors);
                return ParseOutput {
                    program: Program { body },
                    errors,
                };
            }
            Err(error) => {
                let error = convert_parse_error(&error, rest, offset);
                let resume = resync(source, offset, error.span.start);
                errors.push(error);
                if resume >= source.len() {
                    return ParseOutput {
                        program: Program::default(),
                        errors,
                    };
                }
                offset = resume;
            }
        }
    }
}

// ============================================================================
// AST BUILDER
// ============================================================================

type BuildResult<T> = Result<T, SyntaxError>;

struct AstBuilder {
    /// Byte offset of the parsed slice within the full source.
    base: usize,
    errors: Vec<SyntaxError>,
}

impl AstBuilder {
    fn new(base: usize) -> Self {
        Self {
            base,
            errors: Vec::new(),
        }
    }

    fn span(&self, pair: &Pair<Rule>) -> Span {
        let span = pair.as_span();
        Span::new(self.base + span.start(), self.base + span.end())
    }

    fn report(&mut self, code: u32, message: impl Into<String>, span: Span) {
        self.errors.push(SyntaxError {
            code,
            message: message.into(),
            span,
        });
    }

    fn malformed(&self, what: &str, span: Span) -> SyntaxError {
        SyntaxError {
            code: 1005,
            message: format!("Malformed {}", what),
            span,
        }
    }

    fn next_child<'i>(
        &self,
        pairs: &mut Pairs<'i, Rule>,
        what: &str,
        span: Span,
    ) -> BuildResult<Pair<'i, Rule>> {
        pairs.next().ok_or_else(|| self.malformed(what, span))
    }

    fn find_child<'i>(&self, pair: Pair<'i, Rule>, rule: Rule, what: &str) -> BuildResult<Pair<'i, Rule>> {
        let span = self.span(&pair);
        pair.into_inner()
            .find(|p| p.as_rule() == rule)
            .ok_or_else(|| self.malformed(what, span))
    }

    fn build_top_level(&mut self, pairs: Pairs<Rule>) -> Vec<Statement> {
        let mut body = Vec::new();
        for pair in pairs.filter(|p| p.as_rule() != Rule::EOI) {
            match self.build_statement(pair) {
                Ok(Some(stmt)) => body.push(stmt),
                Ok(None) => {}
                Err(error) => self.errors.push(error),
            }
        }
        body
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn build_statements(&mut self, pairs: Pairs<Rule>) -> BuildResult<Vec<Statement>> {
        let mut body = Vec::new();
        for pair in pairs {
            if let Some(stmt) = self.build_statement(pair)? {
                body.push(stmt);
            }
        }
        Ok(body)
    }

    fn build_block(&mut self, pair: Pair<Rule>) -> BuildResult<Vec<Statement>> {
        self.build_statements(pair.into_inner())
    }

    /// Nested statement position; erased declarations become empty statements.
    fn build_body(&mut self, pair: Pair<Rule>) -> BuildResult<Box<Statement>> {
        let span = self.span(&pair);
        let stmt = self.build_statement(pair)?.unwrap_or(Spanned {
            value: Stmt::Empty,
            span,
        });
        Ok(Box::new(stmt))
    }

    /// Builds one statement; `None` for declarations that only exist at the type level.
    fn build_statement(&mut self, pair: Pair<Rule>) -> BuildResult<Option<Statement>> {
        let span = self.span(&pair);
        let stmt = match pair.as_rule() {
            Rule::block => Stmt::Block(self.build_block(pair)?),
            Rule::empty_statement => Stmt::Empty,
            Rule::var_statement => {
                let decl = self.find_child(pair, Rule::var_declaration, "variable statement")?;
                Stmt::VarDecl(self.build_var_declaration(decl)?)
            }
            Rule::function_declaration => match self.build_function_declaration(pair)? {
                Some(function) => Stmt::Function(function),
                None => return Ok(None),
            },
            Rule::class_declaration => Stmt::Class(self.build_class(pair)?),
            Rule::enum_declaration => Stmt::Enum(self.build_enum(pair)?),
            Rule::interface_declaration | Rule::type_alias | Rule::declare_statement => {
                return Ok(None)
            }
            Rule::import_declaration => {
                let type_only = pair.into_inner().any(|p| p.as_rule() == Rule::kw_type);
                if !type_only {
                    self.report(
                        9003,
                        "Import declarations are not supported; a submission must be self-contained.",
                        span,
                    );
                }
                return Ok(None);
            }
            Rule::export_default | Rule::export_list => {
                let type_only = pair.into_inner().any(|p| p.as_rule() == Rule::kw_type);
                if !type_only {
                    self.report(
                        9004,
                        "Default and list exports are not supported; a submission must be self-contained.",
                        span,
                    );
                }
                return Ok(None);
            }
            Rule::export_declaration => {
                let Some(inner) = pair.into_inner().find(|p| p.as_rule() != Rule::kw_export) else {
                    return Err(self.malformed("export declaration", span));
                };
                return self.build_statement(inner);
            }
            Rule::if_statement => self.build_if(pair)?,
            Rule::for_statement => self.build_for(pair)?,
            Rule::for_of_statement | Rule::for_in_statement => self.build_for_each(pair)?,
            Rule::while_statement => {
                let mut test = None;
                let mut body = None;
                for child in pair.into_inner() {
                    match child.as_rule() {
                        Rule::kw_while => {}
                        Rule::expression => test = Some(self.build_expression(child)?),
                        _ => body = Some(self.build_body(child)?),
                    }
                }
                match (test, body) {
                    (Some(test), Some(body)) => Stmt::While { test, body },
                    _ => return Err(self.malformed("while statement", span)),
                }
            }
            Rule::do_while_statement => {
                let mut test = None;
                let mut body = None;
                for child in pair.into_inner() {
                    match child.as_rule() {
                        Rule::kw_do | Rule::kw_while => {}
                        Rule::expression => test = Some(self.build_expression(child)?),
                        _ => body = Some(self.build_body(child)?),
                    }
                }
                match (test, body) {
                    (Some(test), Some(body)) => Stmt::DoWhile { body, test },
                    _ => return Err(self.malformed("do statement", span)),
                }
            }
            Rule::return_statement => {
                let value = match pair.into_inner().find(|p| p.as_rule() == Rule::expression) {
                    Some(expr) => Some(self.build_expression(expr)?),
                    None => None,
                };
                Stmt::Return(value)
            }
            Rule::break_statement => Stmt::Break(label_of(pair)),
            Rule::continue_statement => Stmt::Continue(label_of(pair)),
            Rule::throw_statement => {
                let expr = self.find_child(pair, Rule::expression, "throw statement")?;
                Stmt::Throw(self.build_expression(expr)?)
            }
            Rule::try_statement => self.build_try(pair, span)?,
            Rule::switch_statement => self.build_switch(pair, span)?,
            Rule::debugger_statement => Stmt::Debugger,
            Rule::labeled_statement => {
                let mut inner = pair.into_inner();
                let label = self.next_child(&mut inner, "label", span)?.as_str().to_string();
                let body = self.next_child(&mut inner, "labeled statement", span)?;
                Stmt::Labeled {
                    label,
                    body: self.build_body(body)?,
                }
            }
            Rule::expression_statement => {
                let expr = self.find_child(pair, Rule::expression, "expression statement")?;
                Stmt::Expression(self.build_expression(expr)?)
            }
            other => return Err(self.malformed(&format!("statement ({:?})", other), span)),
        };
        Ok(Some(Spanned { value: stmt, span }))
    }

    fn build_var_declaration(&mut self, pair: Pair<Rule>) -> BuildResult<VarDecl> {
        let mut kind = VarKind::Var;
        let mut declarations = Vec::new();
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::var_kind => kind = var_kind_of(child.as_str()),
                Rule::var_declarator => declarations.push(self.build_var_declarator(child, kind)?),
                _ => {}
            }
        }
        Ok(VarDecl { kind, declarations })
    }

    fn build_var_declarator(&mut self, pair: Pair<Rule>, kind: VarKind) -> BuildResult<VarDeclarator> {
        let span = self.span(&pair);
        let mut target = None;
        let mut init = None;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier | Rule::array_pattern | Rule::object_pattern => {
                    target = Some(self.build_binding_target(child)?)
                }
                Rule::assignment_expr => init = Some(self.build_assignment(child)?),
                _ => {}
            }
        }
        let target = target.ok_or_else(|| self.malformed("variable declaration", span))?;
        if kind == VarKind::Const && init.is_none() {
            self.report(1155, "'const' declarations must be initialized.", span);
        }
        Ok(VarDeclarator { target, init, span })
    }

    fn build_if(&mut self, pair: Pair<Rule>) -> BuildResult<Stmt> {
        let span = self.span(&pair);
        let mut test = None;
        let mut branches = Vec::new();
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::kw_if | Rule::kw_else => {}
                Rule::expression => test = Some(self.build_expression(child)?),
                _ => branches.push(self.build_body(child)?),
            }
        }
        let mut branches = branches.into_iter();
        match (test, branches.next()) {
            (Some(test), Some(consequent)) => Ok(Stmt::If {
                test,
                consequent,
                alternate: branches.next(),
            }),
            _ => Err(self.malformed("if statement", span)),
        }
    }

    fn build_for(&mut self, pair: Pair<Rule>) -> BuildResult<Stmt> {
        let span = self.span(&pair);
        let mut init = None;
        let mut test = None;
        let mut update = None;
        let mut body = None;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::kw_for => {}
                Rule::for_init => {
                    let inner = child
                        .into_inner()
                        .next()
                        .ok_or_else(|| self.malformed("for initializer", span))?;
                    init = Some(match inner.as_rule() {
                        Rule::var_declaration => ForInit::VarDecl(self.build_var_declaration(inner)?),
                        _ => ForInit::Expression(self.build_expression(inner)?),
                    });
                }
                Rule::for_test => {
                    let expr = self.find_child(child, Rule::expression, "for condition")?;
                    test = Some(self.build_expression(expr)?);
                }
                Rule::for_update => {
                    let expr = self.find_child(child, Rule::expression, "for update")?;
                    update = Some(self.build_expression(expr)?);
                }
                _ => body = Some(self.build_body(child)?),
            }
        }
        let body = body.ok_or_else(|| self.malformed("for statement", span))?;
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn build_for_each(&mut self, pair: Pair<Rule>) -> BuildResult<Stmt> {
        let span = self.span(&pair);
        let is_of = pair.as_rule() == Rule::for_of_statement;
        let mut head = None;
        let mut subject = None;
        let mut body = None;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::kw_for | Rule::kw_of | Rule::kw_in => {}
                Rule::for_binding => head = Some(self.build_for_head(child)?),
                Rule::expression => subject = Some(self.build_expression(child)?),
                Rule::assignment_expr => subject = Some(self.build_assignment(child)?),
                _ => body = Some(self.build_body(child)?),
            }
        }
        match (head, subject, body) {
            (Some(head), Some(iterable), Some(body)) if is_of => Ok(Stmt::ForOf {
                head,
                iterable,
                body,
            }),
            (Some(head), Some(object), Some(body)) => Ok(Stmt::ForIn { head, object, body }),
            _ => Err(self.malformed("for statement", span)),
        }
    }

    fn build_for_head(&mut self, pair: Pair<Rule>) -> BuildResult<ForHead> {
        let span = self.span(&pair);
        let mut kind = None;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::var_kind => kind = Some(var_kind_of(child.as_str())),
                Rule::identifier | Rule::array_pattern | Rule::object_pattern => {
                    let target = self.build_binding_target(child)?;
                    return Ok(ForHead::VarDecl(kind.unwrap_or(VarKind::Var), target));
                }
                Rule::postfix_expr => {
                    let expr = self.build_postfix(child)?;
                    return Ok(ForHead::Pattern(self.to_assign_target(expr, true)));
                }
                _ => {}
            }
        }
        Err(self.malformed("for binding", span))
    }

    fn build_try(&mut self, pair: Pair<Rule>, span: Span) -> BuildResult<Stmt> {
        let mut block = None;
        let mut handler = None;
        let mut finalizer = None;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::block => block = Some(self.build_block(child)?),
                Rule::catch_clause => {
                    let mut param = None;
                    let mut body = Vec::new();
                    for part in child.into_inner() {
                        match part.as_rule() {
                            Rule::identifier | Rule::array_pattern | Rule::object_pattern => {
                                param = Some(self.build_binding_target(part)?)
                            }
                            Rule::block => body = self.build_block(part)?,
                            _ => {}
                        }
                    }
                    handler = Some(CatchClause { param, body });
                }
                Rule::finally_clause => {
                    let inner = self.find_child(child, Rule::block, "finally clause")?;
                    finalizer = Some(self.build_block(inner)?);
                }
                _ => {}
            }
        }
        let block = block.ok_or_else(|| self.malformed("try statement", span))?;
        if handler.is_none() && finalizer.is_none() {
            self.report(1472, "'catch' or 'finally' expected.", span);
        }
        Ok(Stmt::Try {
            block,
            handler,
            finalizer,
        })
    }

    fn build_switch(&mut self, pair: Pair<Rule>, span: Span) -> BuildResult<Stmt> {
        let mut discriminant = None;
        let mut cases = Vec::new();
        let mut seen_default = false;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::expression => discriminant = Some(self.build_expression(child)?),
                Rule::switch_case => {
                    let case_span = self.span(&child);
                    let mut test = None;
                    let mut body = Vec::new();
                    let mut is_default = false;
                    for part in child.into_inner() {
                        match part.as_rule() {
                            Rule::kw_case => {}
                            Rule::kw_default => is_default = true,
                            Rule::expression if test.is_none() && !is_default => {
                                test = Some(self.build_expression(part)?)
                            }
                            _ => {
                                if let Some(stmt) = self.build_statement(part)? {
                                    body.push(stmt);
                                }
                            }
                        }
                    }
                    if is_default {
                        if seen_default {
                            self.report(
                                1113,
                                "A 'default' clause cannot appear more than once in a 'switch' statement.",
                                case_span,
                            );
                        }
                        seen_default = true;
                    }
                    cases.push(SwitchCase { test, body });
                }
                _ => {}
            }
        }
        let discriminant = discriminant.ok_or_else(|| self.malformed("switch statement", span))?;
        Ok(Stmt::Switch {
            discriminant,
            cases,
        })
    }

    fn build_enum(&mut self, pair: Pair<Rule>) -> BuildResult<EnumDecl> {
        let span = self.span(&pair);
        let mut name = None;
        let mut members = Vec::new();
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier => name = Some(child.as_str().to_string()),
                Rule::enum_member => {
                    let member_span = self.span(&child);
                    let mut member_name = None;
                    let mut init = None;
                    for part in child.into_inner() {
                        match part.as_rule() {
                            Rule::identifier_name => member_name = Some(part.as_str().to_string()),
                            Rule::string_literal => member_name = Some(unescape_quoted(part.as_str())),
                            Rule::assignment_expr => init = Some(self.build_assignment(part)?),
                            _ => {}
                        }
                    }
                    let member_name = member_name.ok_or_else(|| self.malformed("enum member", member_span))?;
                    members.push(EnumMember {
                        name: member_name,
                        init,
                        span: member_span,
                    });
                }
                _ => {}
            }
        }
        let name = name.ok_or_else(|| self.malformed("enum declaration", span))?;
        Ok(EnumDecl { name, members })
    }

    // ------------------------------------------------------------------------
    // Functions and classes
    // ------------------------------------------------------------------------

    fn check_function_flavor(&mut self, is_async: bool, generator: bool, span: Span) {
        if is_async {
            self.report(9001, "Async functions are not supported.", span);
        }
        if generator {
            self.report(9002, "Generator functions are not supported.", span);
        }
    }

    fn build_function_declaration(&mut self, pair: Pair<Rule>) -> BuildResult<Option<Rc<Function>>> {
        let function = self.build_function_like(pair, FunctionKind::Declaration)?;
        Ok(function.map(Rc::new))
    }

    /// Shared by declarations, expressions, and object methods. `None` when
    /// the function has no body (an overload signature).
    fn build_function_like(&mut self, pair: Pair<Rule>, kind: FunctionKind) -> BuildResult<Option<Function>> {
        let span = self.span(&pair);
        let mut name = None;
        let mut params = Vec::new();
        let mut body = None;
        let mut is_async = false;
        let mut generator = false;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::kw_async => is_async = true,
                Rule::generator_mark => generator = true,
                Rule::identifier => name = Some(child.as_str().to_string()),
                Rule::identifier_name
                | Rule::string_literal
                | Rule::number_literal
                | Rule::computed_property_name => {
                    name = self.build_property_key(child)?.static_name();
                }
                Rule::formal_params => params = self.build_formal_params(child, false)?,
                Rule::block => body = Some(self.build_block(child)?),
                _ => {}
            }
        }
        self.check_function_flavor(is_async, generator, span);
        Ok(body.map(|body| Function {
            name,
            params,
            body: FunctionBody::Block(body),
            kind,
            span,
        }))
    }

    fn build_arrow(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut params = Vec::new();
        let mut body = None;
        let mut is_async = false;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::kw_async => is_async = true,
                Rule::arrow_params => {
                    let inner = child
                        .into_inner()
                        .next()
                        .ok_or_else(|| self.malformed("arrow parameters", span))?;
                    params = match inner.as_rule() {
                        Rule::identifier => vec![Param {
                            pattern: Pattern::Identifier(inner.as_str().to_string()),
                            default: None,
                            rest: false,
                            property: false,
                        }],
                        _ => self.build_formal_params(inner, false)?,
                    };
                }
                Rule::arrow_body => {
                    let inner = child
                        .into_inner()
                        .next()
                        .ok_or_else(|| self.malformed("arrow body", span))?;
                    body = Some(match inner.as_rule() {
                        Rule::block => FunctionBody::Block(self.build_block(inner)?),
                        _ => FunctionBody::Expression(Box::new(self.build_assignment(inner)?)),
                    });
                }
                _ => {}
            }
        }
        self.check_function_flavor(is_async, false, span);
        let body = body.ok_or_else(|| self.malformed("arrow function", span))?;
        let function = Function {
            name: None,
            params,
            body,
            kind: FunctionKind::Arrow,
            span,
        };
        Ok(Spanned {
            value: Expr::Function(Rc::new(function)),
            span,
        })
    }

    fn build_formal_params(&mut self, pair: Pair<Rule>, allow_properties: bool) -> BuildResult<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        for param in pair.into_inner() {
            let span = self.span(&param);
            if params.last().is_some_and(|p| p.rest) {
                self.report(1014, "A rest parameter must be last in a parameter list.", span);
            }
            let inner = param
                .into_inner()
                .next()
                .ok_or_else(|| self.malformed("parameter", span))?;
            let rest = inner.as_rule() == Rule::rest_param;
            let mut pattern = None;
            let mut default = None;
            let mut property = false;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::modifier => property = true,
                    Rule::identifier | Rule::array_pattern | Rule::object_pattern => {
                        pattern = Some(self.build_binding_target(part)?)
                    }
                    Rule::assignment_expr => default = Some(self.build_assignment(part)?),
                    _ => {}
                }
            }
            let pattern = pattern.ok_or_else(|| self.malformed("parameter", span))?;
            if property && !allow_properties {
                self.report(
                    2369,
                    "A parameter property is only allowed in a constructor implementation.",
                    span,
                );
            }
            if property && !matches!(pattern, Pattern::Identifier(_)) {
                self.report(
                    1187,
                    "A parameter property may not be declared using a binding pattern.",
                    span,
                );
            }
            params.push(Param {
                pattern,
                default,
                rest,
                property,
            });
        }
        Ok(params)
    }

    fn build_class(&mut self, pair: Pair<Rule>) -> BuildResult<Rc<Class>> {
        let span = self.span(&pair);
        let mut name = None;
        let mut super_class = None;
        let mut constructor = None;
        let mut members = Vec::new();
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::identifier => name = Some(child.as_str().to_string()),
                Rule::extends_clause => {
                    let target = self.find_child(child, Rule::postfix_expr, "extends clause")?;
                    super_class = Some(self.build_postfix(target)?);
                }
                Rule::class_body => {
                    for member in child.into_inner() {
                        self.build_class_member(member, &mut constructor, &mut members)?;
                    }
                }
                _ => {}
            }
        }
        Ok(Rc::new(Class {
            name,
            super_class,
            constructor,
            members,
            span,
        }))
    }

    fn build_class_member(
        &mut self,
        pair: Pair<Rule>,
        constructor: &mut Option<Rc<Function>>,
        members: &mut Vec<ClassMember>,
    ) -> BuildResult<()> {
        let rule = pair.as_rule();
        if matches!(rule, Rule::empty_statement | Rule::index_signature) {
            return Ok(());
        }
        let span = self.span(&pair);
        let mut is_static = false;
        let mut erased = false;
        let mut is_async = false;
        let mut generator = false;
        let mut key = None;
        let mut params = Vec::new();
        let mut body = None;
        let mut init = None;
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::static_mark => is_static = true,
                Rule::modifier => {
                    if matches!(child.as_str(), "declare" | "abstract") {
                        erased = true;
                    }
                }
                Rule::kw_async => is_async = true,
                Rule::generator_mark => generator = true,
                Rule::identifier_name
                | Rule::string_literal
                | Rule::number_literal
                | Rule::computed_property_name => key = Some(self.build_property_key(child)?),
                Rule::formal_params => {
                    let is_constructor = !is_static && is_constructor_key(key.as_ref());
                    params = self.build_formal_params(child, is_constructor)?;
                }
                Rule::block => body = Some(self.build_block(child)?),
                Rule::assignment_expr => init = Some(self.build_assignment(child)?),
                _ => {}
            }
        }
        let key = key.ok_or_else(|| self.malformed("class member", span))?;
        if erased {
            return Ok(());
        }
        let name = key.static_name();
        let make = |kind, body: Vec<Statement>, params: Vec<Param>| {
            Rc::new(Function {
                name: name.clone(),
                params,
                body: FunctionBody::Block(body),
                kind,
                span,
            })
        };
        let kind = match rule {
            Rule::class_method => {
                // Overload and abstract signatures have no body.
                let Some(body) = body else { return Ok(()) };
                self.check_function_flavor(is_async, generator, span);
                if !is_static && is_constructor_key(Some(&key)) {
                    if constructor.is_some() {
                        self.report(2392, "Multiple constructor implementations are not allowed.", span);
                    }
                    *constructor = Some(make(FunctionKind::Constructor, body, params));
                    return Ok(());
                }
                ClassMemberKind::Method(make(FunctionKind::Method, body, params))
            }
            Rule::class_getter => ClassMemberKind::Getter(make(
                FunctionKind::Getter,
                body.unwrap_or_default(),
                Vec::new(),
            )),
            Rule::class_setter => {
                ClassMemberKind::Setter(make(FunctionKind::Setter, body.unwrap_or_default(), params))
            }
            Rule::class_property => ClassMemberKind::Field(init),
            _ => return Err(self.malformed("class member", span)),
        };
        members.push(ClassMember {
            key,
            is_static,
            kind,
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------------

    fn build_binding_target(&mut self, pair: Pair<Rule>) -> BuildResult<Pattern> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::identifier => Ok(Pattern::Identifier(pair.as_str().to_string())),
            Rule::array_pattern => {
                let mut items: Vec<Pair<Rule>> = pair.into_inner().collect();
                // A trailing comma leaves an empty final item that is not a hole.
                if items.last().is_some_and(|item| item.clone().into_inner().next().is_none()) {
                    items.pop();
                }
                let count = items.len();
                let mut elements = Vec::new();
                let mut rest = None;
                for (index, item) in items.into_iter().enumerate() {
                    let item_span = self.span(&item);
                    let Some(inner) = item.into_inner().next() else {
                        elements.push(None);
                        continue;
                    };
                    match inner.as_rule() {
                        Rule::rest_binding => {
                            if index + 1 != count {
                                self.report(
                                    2462,
                                    "A rest element must be last in a destructuring pattern.",
                                    item_span,
                                );
                            }
                            let target = inner
                                .into_inner()
                                .next()
                                .ok_or_else(|| self.malformed("rest element", item_span))?;
                            rest = Some(Box::new(self.build_binding_target(target)?));
                        }
                        _ => elements.push(Some(self.build_binding_element(inner)?)),
                    }
                }
                Ok(Pattern::Array { elements, rest })
            }
            Rule::object_pattern => {
                let mut properties = Vec::new();
                let mut rest = None;
                for member in pair.into_inner() {
                    let member_span = self.span(&member);
                    match member.as_rule() {
                        Rule::rest_binding => {
                            let target = member
                                .into_inner()
                                .next()
                                .ok_or_else(|| self.malformed("rest element", member_span))?;
                            rest = Some(Box::new(self.build_binding_target(target)?));
                        }
                        Rule::pattern_property => {
                            let mut inner = member.into_inner();
                            let key = self.next_child(&mut inner, "property name", member_span)?;
                            let key = self.build_property_key(key)?;
                            let element = self.next_child(&mut inner, "property binding", member_span)?;
                            properties.push(PatternProperty {
                                key,
                                value: self.build_binding_element(element)?,
                                shorthand: false,
                            });
                        }
                        Rule::shorthand_binding => {
                            let mut inner = member.into_inner();
                            let name = self.next_child(&mut inner, "binding name", member_span)?;
                            let name = name.as_str().to_string();
                            let default = match inner.next() {
                                Some(expr) => Some(self.build_assignment(expr)?),
                                None => None,
                            };
                            properties.push(PatternProperty {
                                key: PropertyKey::Identifier(name.clone()),
                                value: PatternElement {
                                    target: Pattern::Identifier(name),
                                    default,
                                },
                                shorthand: true,
                            });
                        }
                        _ => {}
                    }
                }
                Ok(Pattern::Object { properties, rest })
            }
            _ => Err(self.malformed("binding pattern", span)),
        }
    }

    fn build_binding_element(&mut self, pair: Pair<Rule>) -> BuildResult<PatternElement> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let target = self.next_child(&mut inner, "binding element", span)?;
        let target = self.build_binding_target(target)?;
        let default = match inner.next() {
            Some(expr) => Some(self.build_assignment(expr)?),
            None => None,
        };
        Ok(PatternElement { target, default })
    }

    /// Reinterprets an expression parsed on the left of `=` as a target.
    fn to_assign_target(&mut self, expr: Expression, destructure: bool) -> Pattern {
        if matches!(expr.value, Expr::Member { .. }) {
            return Pattern::Member(Box::new(expr));
        }
        let span = expr.span;
        match expr.value {
            Expr::Identifier(name) => Pattern::Identifier(name),
            Expr::Paren(inner) if matches!(inner.value, Expr::Identifier(_) | Expr::Member { .. }) => {
                self.to_assign_target(*inner, false)
            }
            Expr::Array(items) if destructure => {
                let count = items.len();
                let mut elements = Vec::new();
                let mut rest = None;
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        None => elements.push(None),
                        Some(Spanned {
                            value: Expr::Spread(inner),
                            span,
                        }) => {
                            if index + 1 != count {
                                self.report(
                                    2462,
                                    "A rest element must be last in a destructuring pattern.",
                                    span,
                                );
                            }
                            rest = Some(Box::new(self.to_assign_target(*inner, true)));
                        }
                        Some(element) => elements.push(Some(self.to_pattern_element(element))),
                    }
                }
                Pattern::Array { elements, rest }
            }
            Expr::Object(members) if destructure => {
                let mut properties = Vec::new();
                let mut rest = None;
                for member in members {
                    match member {
                        ObjectMember::Property {
                            key,
                            value,
                            shorthand,
                        } => properties.push(PatternProperty {
                            key,
                            value: self.to_pattern_element(value),
                            shorthand,
                        }),
                        ObjectMember::Spread(inner) => {
                            rest = Some(Box::new(self.to_assign_target(inner, true)))
                        }
                        _ => self.report(
                            2364,
                            "The left-hand side of an assignment expression must be a variable or a property access.",
                            span,
                        ),
                    }
                }
                Pattern::Object { properties, rest }
            }
            Expr::OptionalChain(_) => {
                self.report(
                    2779,
                    "The left-hand side of an assignment expression may not be an optional property access.",
                    span,
                );
                Pattern::Identifier(String::new())
            }
            _ => {
                self.report(
                    2364,
                    "The left-hand side of an assignment expression must be a variable or a property access.",
                    span,
                );
                Pattern::Identifier(String::new())
            }
        }
    }

    fn to_pattern_element(&mut self, expr: Expression) -> PatternElement {
        match expr.value {
            Expr::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => PatternElement {
                target: *target,
                default: Some(*value),
            },
            value => PatternElement {
                target: self.to_assign_target(
                    Spanned {
                        value,
                        span: expr.span,
                    },
                    true,
                ),
                default: None,
            },
        }
    }

    fn check_update_target(&mut self, expr: &Expression) {
        if matches!(expr.value, Expr::OptionalChain(_)) {
            self.report(
                2777,
                "The operand of an increment or decrement operator may not be an optional property access.",
                expr.span,
            );
            return;
        }
        let valid = match &expr.value {
            Expr::Identifier(_) | Expr::Member { .. } => true,
            Expr::Paren(inner) => matches!(inner.value, Expr::Identifier(_) | Expr::Member { .. }),
            _ => false,
        };
        if !valid {
            self.report(
                2357,
                "The operand of an increment or decrement operator must be a variable or a property access.",
                expr.span,
            );
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn build_expression(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut items = Vec::new();
        for child in pair.into_inner() {
            items.push(self.build_assignment(child)?);
        }
        match items.len() {
            0 => Err(self.malformed("expression", span)),
            1 => Ok(items.remove(0)),
            _ => Ok(Spanned {
                value: Expr::Sequence(items),
                span,
            }),
        }
    }

    fn build_assignment(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = self.next_child(&mut inner, "expression", span)?;
        if first.as_rule() == Rule::arrow_function {
            return self.build_arrow(first);
        }
        let left = self.build_conditional(first)?;
        let Some(op_pair) = inner.next() else {
            return Ok(left);
        };
        let op = AssignOp::from_token(op_pair.as_str())
            .ok_or_else(|| self.malformed("assignment operator", span))?;
        let value = self.next_child(&mut inner, "assigned value", span)?;
        let value = self.build_assignment(value)?;
        let target = self.to_assign_target(left, op == AssignOp::Assign);
        Ok(Spanned {
            value: Expr::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        })
    }

    fn build_conditional(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let test = self.next_child(&mut inner, "expression", span)?;
        let test = self.build_binary(test)?;
        let Some(consequent) = inner.next() else {
            return Ok(test);
        };
        let consequent = self.build_assignment(consequent)?;
        let alternate = self.next_child(&mut inner, "conditional branch", span)?;
        let alternate = self.build_assignment(alternate)?;
        Ok(Spanned {
            value: Expr::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            span,
        })
    }

    fn build_binary(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut pairs = pair.into_inner();
        if pairs.clone().count() == 1 {
            let only = self.next_child(&mut pairs, "operand", span)?;
            return self.build_unary(only);
        }
        PRATT
            .map_primary(|primary| self.build_unary(primary))
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (lhs?, rhs?);
                let span = lhs.span.to(rhs.span);
                let (left, right) = (Box::new(lhs), Box::new(rhs));
                let value = match op.as_rule() {
                    Rule::op_nullish => Expr::Logical {
                        op: LogicalOp::Nullish,
                        left,
                        right,
                    },
                    Rule::op_or => Expr::Logical {
                        op: LogicalOp::Or,
                        left,
                        right,
                    },
                    Rule::op_and => Expr::Logical {
                        op: LogicalOp::And,
                        left,
                        right,
                    },
                    rule => Expr::Binary {
                        op: binary_op_of(rule).ok_or_else(|| SyntaxError {
                            code: 1005,
                            message: format!("Malformed operator ({:?})", rule),
                            span,
                        })?,
                        left,
                        right,
                    },
                };
                Ok(Spanned { value, span })
            })
            // `as` and `satisfies` only matter to the type checker.
            .map_postfix(|lhs, _assertion| lhs)
            .parse(pairs)
    }

    fn build_unary(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut children: Vec<Pair<Rule>> = pair.into_inner().collect();
        let operand = children
            .pop()
            .ok_or_else(|| self.malformed("unary expression", span))?;
        let mut expr = self.build_postfix(operand)?;
        for op in children.into_iter().rev() {
            let span = Span::new(self.span(&op).start, expr.span.end);
            let unary = |op| Expr::Unary {
                op,
                argument: Box::new(expr.clone()),
            };
            let value = match op.as_rule() {
                Rule::op_preinc | Rule::op_predec => {
                    self.check_update_target(&expr);
                    let op = if op.as_rule() == Rule::op_preinc {
                        UpdateOp::Increment
                    } else {
                        UpdateOp::Decrement
                    };
                    Expr::Update {
                        op,
                        prefix: true,
                        target: Box::new(expr.clone()),
                    }
                }
                Rule::op_not => unary(UnaryOp::Not),
                Rule::op_bitnot => unary(UnaryOp::BitNot),
                Rule::op_pos => unary(UnaryOp::Plus),
                Rule::op_neg => unary(UnaryOp::Minus),
                Rule::op_typeof => unary(UnaryOp::TypeOf),
                Rule::op_void => unary(UnaryOp::Void),
                Rule::op_delete => unary(UnaryOp::Delete),
                other => return Err(self.malformed(&format!("prefix operator ({:?})", other), span)),
            };
            expr = Spanned { value, span };
        }
        Ok(expr)
    }

    fn build_postfix(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let mut inner = pair.into_inner();
        let first = self.next_child(&mut inner, "expression", span)?;
        let mut expr = self.build_primary(first)?;
        let mut optional = false;
        for suffix in inner {
            match suffix.as_rule() {
                Rule::optional_member | Rule::optional_computed | Rule::optional_call => optional = true,
                Rule::op_postinc | Rule::op_postdec if optional => {
                    expr = close_chain(expr);
                    optional = false;
                }
                _ => {}
            }
            expr = self.apply_suffix(expr, suffix)?;
        }
        Ok(if optional { close_chain(expr) } else { expr })
    }

    fn apply_suffix(&mut self, expr: Expression, suffix: Pair<Rule>) -> BuildResult<Expression> {
        let suffix_span = self.span(&suffix);
        let span = Span::new(expr.span.start, suffix_span.end);
        let value = match suffix.as_rule() {
            Rule::member_access => {
                let name = self.find_child(suffix, Rule::identifier_name, "property access")?;
                Expr::Member {
                    object: Box::new(expr),
                    property: MemberProperty::Named(name.as_str().to_string()),
                }
            }
            Rule::computed_member => {
                let index = self.find_child(suffix, Rule::expression, "element access")?;
                Expr::Member {
                    object: Box::new(expr),
                    property: MemberProperty::Computed(Box::new(self.build_expression(index)?)),
                }
            }
            Rule::call_arguments => Expr::Call {
                callee: Box::new(expr),
                arguments: self.build_arguments(suffix)?,
            },
            Rule::optional_member => {
                let name = self.find_child(suffix, Rule::identifier_name, "property access")?;
                Expr::OptionalMember {
                    object: Box::new(expr),
                    property: MemberProperty::Named(name.as_str().to_string()),
                }
            }
            Rule::optional_computed => {
                let index = self.find_child(suffix, Rule::expression, "element access")?;
                Expr::OptionalMember {
                    object: Box::new(expr),
                    property: MemberProperty::Computed(Box::new(self.build_expression(index)?)),
                }
            }
            Rule::optional_call => {
                let arguments = self.find_child(suffix, Rule::call_arguments, "call")?;
                Expr::OptionalCall {
                    callee: Box::new(expr),
                    arguments: self.build_arguments(arguments)?,
                }
            }
            Rule::non_null => return Ok(expr),
            Rule::op_postinc | Rule::op_postdec => {
                self.check_update_target(&expr);
                let op = if suffix.as_rule() == Rule::op_postinc {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                Expr::Update {
                    op,
                    prefix: false,
                    target: Box::new(expr),
                }
            }
            other => return Err(self.malformed(&format!("postfix ({:?})", other), suffix_span)),
        };
        Ok(Spanned { value, span })
    }

    fn build_arguments(&mut self, pair: Pair<Rule>) -> BuildResult<Vec<Expression>> {
        let mut arguments = Vec::new();
        for child in pair.into_inner() {
            match child.as_rule() {
                Rule::spread_element => arguments.push(self.build_spread(child)?),
                Rule::assignment_expr => arguments.push(self.build_assignment(child)?),
                _ => {}
            }
        }
        Ok(arguments)
    }

    fn build_spread(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let inner = self.find_child(pair, Rule::assignment_expr, "spread element")?;
        Ok(Spanned {
            value: Expr::Spread(Box::new(self.build_assignment(inner)?)),
            span,
        })
    }

    fn build_primary(&mut self, pair: Pair<Rule>) -> BuildResult<Expression> {
        let span = self.span(&pair);
        let value = match pair.as_rule() {
            Rule::new_expr => {
                let mut callee = None;
                let mut arguments = Vec::new();
                for child in pair.into_inner() {
                    match child.as_rule() {
                        Rule::new_target => {
                            let target_span = self.span(&child);
                            let mut inner = child.into_inner();
                            let first = self.next_child(&mut inner, "constructor", target_span)?;
                            let mut target = self.build_primary(first)?;
                            for suffix in inner {
                                target = self.apply_suffix(target, suffix)?;
                            }
                            callee = Some(target);
                        }
                        Rule::call_arguments => arguments = self.build_arguments(child)?,
                        _ => {}
                    }
                }
                let callee = callee.ok_or_else(|| self.malformed("new expression", span))?;
                Expr::New {
                    callee: Box::new(callee),
                    arguments,
                }
            }
            Rule::paren_expr => {
                let inner = self.find_child(pair, Rule::expression, "parenthesized expression")?;
                Expr::Paren(Box::new(self.build_expression(inner)?))
            }
            Rule::function_expression => {
                let function = self
                    .build_function_like(pair, FunctionKind::Expression)?
                    .ok_or_else(|| self.malformed("function expression", span))?;
                Expr::Function(Rc::new(function))
            }
            Rule::class_expression => Expr::Class(self.build_class(pair)?),
            Rule::array_literal => {
                let mut items: Vec<Pair<Rule>> = pair.into_inner().collect();
                if items.last().is_some_and(|item| item.clone().into_inner().next().is_none()) {
                    items.pop();
                }
                let mut elements = Vec::new();
                for item in items {
                    match item.into_inner().next() {
                        None => elements.push(None),
                        Some(inner) if inner.as_rule() == Rule::spread_element => {
                            elements.push(Some(self.build_spread(inner)?))
                        }
                        Some(inner) => elements.push(Some(self.build_assignment(inner)?)),
                    }
                }
                Expr::Array(elements)
            }
            Rule::object_literal => Expr::Object(self.build_object(pair)?),
            Rule::template_literal => {
                let mut quasis = Vec::new();
                let mut exprs = Vec::new();
                let mut pending: Option<String> = None;
                for child in pair.into_inner() {
                    match child.as_rule() {
                        Rule::template_chars => pending = Some(child.as_str().to_string()),
                        Rule::template_substitution => {
                            let raw = pending.take().unwrap_or_default();
                            quasis.push(template_chunk(raw));
                            let inner = self.find_child(child, Rule::expression, "template substitution")?;
                            exprs.push(self.build_expression(inner)?);
                        }
                        _ => {}
                    }
                }
                quasis.push(template_chunk(pending.unwrap_or_default()));
                Expr::Template { quasis, exprs }
            }
            Rule::regex_literal => {
                let mut pattern = String::new();
                let mut flags = String::new();
                for child in pair.into_inner() {
                    match child.as_rule() {
                        Rule::regex_body => pattern = child.as_str().to_string(),
                        Rule::regex_flags => flags = child.as_str().to_string(),
                        _ => {}
                    }
                }
                Expr::Regex { pattern, flags }
            }
            Rule::number_literal => {
                let raw = pair.as_str();
                let value = parse_number_literal(raw).ok_or_else(|| SyntaxError {
                    code: 1125,
                    message: "Hexadecimal digit expected.".to_string(),
                    span,
                })?;
                Expr::Number {
                    value,
                    raw: raw.to_string(),
                }
            }
            Rule::string_literal => Expr::String {
                value: unescape_quoted(pair.as_str()),
                raw: pair.as_str().to_string(),
            },
            Rule::boolean_literal => Expr::Bool(pair.as_str() == "true"),
            Rule::null_literal => Expr::Null,
            Rule::this_expr => Expr::This,
            Rule::super_expr => Expr::Super,
            Rule::identifier => Expr::Identifier(pair.as_str().to_string()),
            other => return Err(self.malformed(&format!("expression ({:?})", other), span)),
        };
        Ok(Spanned { value, span })
    }

    fn build_object(&mut self, pair: Pair<Rule>) -> BuildResult<Vec<ObjectMember>> {
        let mut members = Vec::new();
        for member in pair.into_inner() {
            let span = self.span(&member);
            let built = match member.as_rule() {
                Rule::spread_element => ObjectMember::Spread(self.build_spread(member)?),
                Rule::property_assignment => {
                    let mut inner = member.into_inner();
                    let key = self.next_child(&mut inner, "property name", span)?;
                    let key = self.build_property_key(key)?;
                    let value = self.next_child(&mut inner, "property value", span)?;
                    ObjectMember::Property {
                        key,
                        value: self.build_assignment(value)?,
                        shorthand: false,
                    }
                }
                Rule::shorthand_property => {
                    let name = member.as_str().trim().to_string();
                    ObjectMember::Property {
                        key: PropertyKey::Identifier(name.clone()),
                        value: Spanned {
                            value: Expr::Identifier(name),
                            span,
                        },
                        shorthand: true,
                    }
                }
                Rule::object_method | Rule::object_getter | Rule::object_setter => {
                    let rule = member.as_rule();
                    let key_pair = member
                        .clone()
                        .into_inner()
                        .find(|p| {
                            matches!(
                                p.as_rule(),
                                Rule::identifier_name
                                    | Rule::string_literal
                                    | Rule::number_literal
                                    | Rule::computed_property_name
                            )
                        })
                        .ok_or_else(|| self.malformed("method name", span))?;
                    let key = self.build_property_key(key_pair)?;
                    let kind = match rule {
                        Rule::object_getter => FunctionKind::Getter,
                        Rule::object_setter => FunctionKind::Setter,
                        _ => FunctionKind::Method,
                    };
                    let function = self
                        .build_function_like(member, kind)?
                        .ok_or_else(|| self.malformed("method", span))?;
                    let function = Rc::new(function);
                    match kind {
                        FunctionKind::Getter => ObjectMember::Getter { key, function },
                        FunctionKind::Setter => ObjectMember::Setter { key, function },
                        _ => ObjectMember::Method { key, function },
                    }
                }
                other => return Err(self.malformed(&format!("object member ({:?})", other), span)),
            };
            members.push(built);
        }
        Ok(members)
    }

    fn build_property_key(&mut self, pair: Pair<Rule>) -> BuildResult<PropertyKey> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::identifier_name | Rule::identifier => Ok(PropertyKey::Identifier(pair.as_str().to_string())),
            Rule::string_literal => Ok(PropertyKey::String {
                value: unescape_quoted(pair.as_str()),
                raw: pair.as_str().to_string(),
            }),
            Rule::number_literal => {
                let raw = pair.as_str();
                let value = parse_number_literal(raw).ok_or_else(|| self.malformed("numeric key", span))?;
                Ok(PropertyKey::Number {
                    value,
                    raw: raw.to_string(),
                })
            }
            Rule::computed_property_name => {
                let inner = self.find_child(pair, Rule::assignment_expr, "computed property name")?;
                Ok(PropertyKey::Computed(Box::new(self.build_assignment(inner)?)))
            }
            other => Err(self.malformed(&format!("property name ({:?})", other), span)),
        }
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn close_chain(expr: Expression) -> Expression {
    let span = expr.span;
    Spanned {
        value: Expr::OptionalChain(Box::new(expr)),
        span,
    }
}

fn label_of(pair: Pair<Rule>) -> Option<String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::identifier)
        .map(|p| p.as_str().to_string())
}

fn var_kind_of(text: &str) -> VarKind {
    match text {
        "let" => VarKind::Let,
        "const" => VarKind::Const,
        _ => VarKind::Var,
    }
}

fn is_constructor_key(key: Option<&PropertyKey>) -> bool {
    match key {
        Some(PropertyKey::Identifier(name)) => name == "constructor",
        Some(PropertyKey::String { value, .. }) => value == "constructor",
        _ => false,
    }
}

fn binary_op_of(rule: Rule) -> Option<BinaryOp> {
    Some(match rule {
        Rule::op_strict_eq => BinaryOp::StrictEq,
        Rule::op_strict_ne => BinaryOp::StrictNotEq,
        Rule::op_eq => BinaryOp::Eq,
        Rule::op_ne => BinaryOp::NotEq,
        Rule::op_le => BinaryOp::LtEq,
        Rule::op_ge => BinaryOp::GtEq,
        Rule::op_lt => BinaryOp::Lt,
        Rule::op_gt => BinaryOp::Gt,
        Rule::op_ushr => BinaryOp::UShr,
        Rule::op_shl => BinaryOp::Shl,
        Rule::op_shr => BinaryOp::Shr,
        Rule::op_instanceof => BinaryOp::InstanceOf,
        Rule::op_in => BinaryOp::In,
        Rule::op_exp => BinaryOp::Exp,
        Rule::op_mul => BinaryOp::Mul,
        Rule::op_div => BinaryOp::Div,
        Rule::op_mod => BinaryOp::Mod,
        Rule::op_add => BinaryOp::Add,
        Rule::op_sub => BinaryOp::Sub,
        Rule::op_bit_or => BinaryOp::BitOr,
        Rule::op_bit_xor => BinaryOp::BitXor,
        Rule::op_bit_and => BinaryOp::BitAnd,
        _ => return None,
    })
}

fn template_chunk(raw: String) -> TemplateChunk {
    let normalized = raw.replace("\r\n", "\n");
    TemplateChunk {
        cooked: unescape(&normalized),
        raw,
    }
}

/// Numeric value of a literal as written in source: separators, hex,
/// octal, binary and legacy leading-zero octal forms.
pub fn parse_number_literal(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    if let Some(digits) = lower.strip_prefix("0x") {
        return parse_radix(digits, 16);
    }
    if let Some(digits) = lower.strip_prefix("0b") {
        return parse_radix(digits, 2);
    }
    if let Some(digits) = lower.strip_prefix("0o") {
        return parse_radix(digits, 8);
    }
    if cleaned.len() > 1
        && cleaned.starts_with('0')
        && cleaned.chars().all(|c| c.is_ascii_digit())
        && cleaned.chars().all(|c| c < '8')
    {
        return parse_radix(&cleaned[1..], 8);
    }
    cleaned.parse::<f64>().ok()
}

fn parse_radix(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    digits.chars().try_fold(0f64, |acc, c| {
        c.to_digit(radix).map(|d| acc * radix as f64 + d as f64)
    })
}

/// Decode a quoted string literal, quotes included.
pub fn unescape_quoted(text: &str) -> String {
    let inner = text
        .get(1..text.len().saturating_sub(1))
        .unwrap_or_default();
    unescape(inner)
}

/// Decode the escape sequences of string and template text.
pub fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('b') => result.push('\u{8}'),
            Some('f') => result.push('\u{c}'),
            Some('v') => result.push('\u{b}'),
            Some('0') if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => result.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => result.push_str(&hex),
                }
            }
            Some('u') => {
                let unit = read_unicode_escape(&mut chars);
                match unit {
                    Some(high @ 0xD800..=0xDBFF) => {
                        let mut lookahead = chars.clone();
                        let low = match (lookahead.next(), lookahead.next()) {
                            (Some('\\'), Some('u')) => read_unicode_escape(&mut lookahead),
                            _ => None,
                        };
                        match low {
                            Some(low @ 0xDC00..=0xDFFF) => {
                                chars = lookahead;
                                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                                result.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                            }
                            _ => result.push('\u{FFFD}'),
                        }
                    }
                    Some(code) => result.push(char::from_u32(code).unwrap_or('\u{FFFD}')),
                    None => result.push('u'),
                }
            }
            // Line continuations produce nothing.
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') | Some('\u{2028}') | Some('\u{2029}') => {}
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

fn read_unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u32> {
    if chars.peek() == Some(&'{') {
        chars.next();
        let mut hex = String::new();
        for c in chars.by_ref() {
            if c == '}' {
                break;
            }
            hex.push(c);
        }
        return u32::from_str_radix(&hex, 16).ok();
    }
    let hex: String = chars.by_ref().take(4).collect();
    if hex.len() != 4 {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok()
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn convert_parse_error(error: &Error<Rule>, text: &str, base: usize) -> SyntaxError {
    let pos = match error.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let pos = pos.min(text.len());
    let (message, len) = describe_token(&text[pos..]);
    SyntaxError {
        code: 1005,
        message,
        span: Span::new(base + pos, base + pos + len),
    }
}

/// Names the token a parse stopped at, in the wording JavaScript engines use.
fn describe_token(rest: &str) -> (String, usize) {
    let mut chars = rest.chars();
    let Some(first) = chars.next() else {
        return ("Unexpected end of input".to_string(), 0);
    };
    let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$';
    if first.is_ascii_digit() {
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
            .unwrap_or(rest.len());
        return ("Unexpected number".to_string(), len);
    }
    if is_ident(first) {
        let len = rest.find(|c: char| !is_ident(c)).unwrap_or(rest.len());
        let word = &rest[..len];
        let message = if is_keyword(word) {
            format!("Unexpected token '{}'", word)
        } else {
            format!("Unexpected identifier '{}'", word)
        };
        return (message, len);
    }
    if first == '"' || first == '\'' {
        let len = rest[1..].find(first).map(|i| i + 2).unwrap_or(rest.len());
        return ("Unexpected string".to_string(), len);
    }
    if first == '`' {
        return ("Unexpected template string".to_string(), 1);
    }
    (format!("Unexpected token '{}'", first), first.len_utf8())
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "break" | "case" | "catch" | "class" | "const" | "continue" | "debugger" | "default"
            | "delete" | "do" | "else" | "enum" | "export" | "extends" | "false" | "finally"
            | "for" | "function" | "if" | "import" | "in" | "instanceof" | "let" | "new"
            | "null" | "return" | "super" | "switch" | "this" | "throw" | "true" | "try"
            | "typeof" | "var" | "void" | "while" | "with"
    )
}

/// The bracket that takes nesting past [`MAX_NESTING`], if any. Strings,
/// template text and comments are skipped.
fn nesting_error(source: &str) -> Option<SyntaxError> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' | b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'(' | b'[' | b'{' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Some(SyntaxError {
                        code: 1005,
                        message: format!("Brackets are nested too deeply (more than {} levels)", MAX_NESTING),
                        span: Span::new(i, i + 1),
                    });
                }
            }
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Where to resume after a statement failed to parse at `error_pos`: just past
/// the first statement boundary at bracket depth zero at or after the error.
fn resync(source: &str, start: usize, error_pos: usize) -> usize {
    let bytes = source.as_bytes();
    let mut depth: i32 = 0;
    let mut i = start;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' | b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    if bytes[i] == b'\\' {
                        i += 1;
                    } else if bytes[i] == b'\n' && b != b'`' {
                        break;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' => depth -= 1,
            b'}' => {
                depth -= 1;
                if depth <= 0 && i >= error_pos {
                    return next_boundary(source, i + 1, start);
                }
            }
            b';' | b'\n' if depth <= 0 && i >= error_pos => {
                return next_boundary(source, i + 1, start);
            }
            _ => {}
        }
        i += 1;
    }
    source.len()
}

fn next_boundary(source: &str, mut pos: usize, start: usize) -> usize {
    pos = pos.max(start + 1).min(source.len());
    while !source.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let output = parse_program(source);
        assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
        output.program
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_ok("").body.is_empty());
        assert!(parse_ok("  // only a comment\n").body.is_empty());
    }

    #[test]
    fn test_type_declarations_are_erased() {
        let program = parse_ok(
            "interface Point { x: number; y: number }\ntype Id = string | number;\ndeclare const VERSION: string;\nlet p: Point = { x: 1, y: 2 };",
        );
        assert_eq!(program.body.len(), 1);
        assert!(matches!(program.body[0].value, Stmt::VarDecl(_)));
    }

    #[test]
    fn test_function_signature_with_types() {
        let program = parse_ok("function convertRomanToDecimal(roman: string): number { return 0; }");
        match &program.body[0].value {
            Stmt::Function(function) => {
                assert_eq!(function.name.as_deref(), Some("convertRomanToDecimal"));
                assert_eq!(function.params.len(), 1);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_precedence() {
        let program = parse_ok("x = 1 + 2 * 3;");
        let Stmt::Expression(expr) = &program.body[0].value else {
            panic!("expected expression statement");
        };
        let Expr::Assign { value, .. } = &expr.value else {
            panic!("expected assignment");
        };
        match &value.value {
            Expr::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.value, Expr::Binary { op: BinaryOp::Mul, .. }))
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let program = parse_ok("y = 2 ** 3 ** 2;");
        let Stmt::Expression(expr) = &program.body[0].value else {
            panic!("expected expression statement");
        };
        let Expr::Assign { value, .. } = &expr.value else {
            panic!("expected assignment");
        };
        assert!(matches!(
            &value.value,
            Expr::Binary { op: BinaryOp::Exp, right, .. } if matches!(right.value, Expr::Binary { op: BinaryOp::Exp, .. })
        ));
    }

    #[test]
    fn test_as_expression_is_erased() {
        let program = parse_ok("const n = (value as number) + 1;");
        let Stmt::VarDecl(decl) = &program.body[0].value else {
            panic!("expected declaration");
        };
        assert!(decl.declarations[0].init.is_some());
    }

    #[test]
    fn test_arrow_functions_and_generics() {
        parse_ok("const id = <T>(x: T): T => x;\nconst add = (a: number, b = 2) => { return a + b; };\nconst one = x => x;");
    }

    #[test]
    fn test_class_members() {
        let program = parse_ok(
            "class Counter extends Base implements Tick {\n  private count: number = 0;\n  static created = 0;\n  constructor(public readonly name: string) { super(); }\n  get value(): number { return this.count; }\n  increment(): void { this.count++; }\n  abstract reset(): void;\n}",
        );
        let Stmt::Class(class) = &program.body[0].value else {
            panic!("expected class");
        };
        assert!(class.super_class.is_some());
        let constructor = class.constructor.as_ref().expect("constructor");
        assert!(constructor.params[0].property);
        assert_eq!(class.members.len(), 4);
    }

    #[test]
    fn test_destructuring_assignment_targets() {
        let program = parse_ok("[a, b] = [b, a];\n({ x, y: [z = 1] } = point);");
        let Stmt::Expression(expr) = &program.body[0].value else {
            panic!("expected expression statement");
        };
        assert!(matches!(
            &expr.value,
            Expr::Assign { target, .. } if matches!(**target, Pattern::Array { .. })
        ));
    }

    #[test]
    fn test_invalid_assignment_target_is_reported() {
        let output = parse_program("1 = 2;");
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, 2364);
    }

    #[test]
    fn test_recovery_reports_each_broken_statement() {
        let source = "let a = ;\nlet ok = 1;\nlet b = );\n";
        let output = parse_program(source);
        assert_eq!(output.errors.len(), 2, "{:?}", output.errors);
        assert_eq!(output.errors[0].span.start, 8);
        assert_eq!(output.errors[0].message, "Unexpected token ';'");
        assert!(output.errors[0].span.start < output.errors[1].span.start);
        assert_eq!(output.errors[1].message, "Unexpected token ')'");
    }

    #[test]
    fn test_unclosed_block_reports_end_of_input() {
        let output = parse_program("function f() {\n  return 1;\n");
        assert!(!output.errors.is_empty());
        assert!(output.errors.iter().any(|e| e.message.contains("Unexpected")));
    }

    #[test]
    fn test_try_without_handler() {
        let output = parse_program("try { risky(); }");
        assert_eq!(output.errors[0].code, 1472);
    }

    #[test]
    fn test_module_syntax() {
        assert!(parse_program("import type { A } from './a';").errors.is_empty());
        assert_eq!(parse_program("import fs from 'fs';").errors[0].code, 9003);
        let program = parse_ok("export function f() { return 1; }");
        assert!(matches!(program.body[0].value, Stmt::Function(_)));
    }

    #[test]
    fn test_optional_chain_wraps_the_whole_postfix() {
        let program = parse_ok("v = o?.a.b?.[k]?.(1);");
        let Stmt::Expression(expr) = &program.body[0].value else {
            panic!("expected expression statement");
        };
        let Expr::Assign { value, .. } = &expr.value else {
            panic!("expected assignment");
        };
        let Expr::OptionalChain(chain) = &value.value else {
            panic!("expected optional chain, got {:?}", value.value);
        };
        let Expr::OptionalCall { callee, arguments } = &chain.value else {
            panic!("expected optional call");
        };
        assert_eq!(arguments.len(), 1);
        assert!(matches!(
            &callee.value,
            Expr::OptionalMember { property: MemberProperty::Computed(_), object }
                if matches!(object.value, Expr::Member { .. })
        ));
    }

    #[test]
    fn test_question_dot_before_digit_is_a_conditional() {
        let program = parse_ok("v = ok?.5:1;");
        let Stmt::Expression(expr) = &program.body[0].value else {
            panic!("expected expression statement");
        };
        assert!(matches!(
            &expr.value,
            Expr::Assign { value, .. } if matches!(value.value, Expr::Conditional { .. })
        ));
    }

    #[test]
    fn test_optional_chain_is_not_an_assignment_target() {
        assert_eq!(parse_program("o?.a = 1;").errors[0].code, 2779);
        assert_eq!(parse_program("o?.a++;").errors[0].code, 2777);
    }

    #[test]
    fn test_deep_nesting_is_reported_once() {
        let depth = MAX_NESTING + 1;
        let source = format!("x = {}1{};", "[".repeat(depth), "]".repeat(depth));
        let output = parse_program(&source);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(
            output.errors[0].message,
            "Brackets are nested too deeply (more than 128 levels)"
        );
        assert_eq!(output.errors[0].span.start, 4 + MAX_NESTING);

        let fits = format!("x = {}1{};", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        parse_ok(&fits);
        parse_ok(&format!("s = '{}';", "[".repeat(depth)));
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(parse_number_literal("0xff"), Some(255.0));
        assert_eq!(parse_number_literal("0b101"), Some(5.0));
        assert_eq!(parse_number_literal("0o17"), Some(15.0));
        assert_eq!(parse_number_literal("1_000"), Some(1000.0));
        assert_eq!(parse_number_literal(".5"), Some(0.5));
        assert_eq!(parse_number_literal("1e3"), Some(1000.0));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_quoted(r#""a\nb""#), "a\nb");
        assert_eq!(unescape_quoted(r"'\x41B\u{43}'"), "ABC");
        assert_eq!(unescape_quoted(r"'\uD83D\uDE00'"), "\u{1F600}");
        assert_eq!(unescape_quoted(r"'it\'s'"), "it's");
    }

    #[test]
    fn test_template_parts() {
        let program = parse_ok("s = `a${1}b${2}`;");
        let Stmt::Expression(expr) = &program.body[0].value else {
            panic!("expected expression statement");
        };
        let Expr::Assign { value, .. } = &expr.value else {
            panic!("expected assignment");
        };
        let Expr::Template { quasis, exprs } = &value.value else {
            panic!("expected template");
        };
        assert_eq!(quasis.len(), 3);
        assert_eq!(exprs.len(), 2);
        assert_eq!(quasis[2].cooked, "");
    }
}
