//! Syntax tree for the accepted TypeScript subset.
//!
//! The same tree describes both dialects: the transpiler builds it from
//! TypeScript source (type syntax is dropped while building), and the runtime
//! builds it again from the emitted JavaScript.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub mod parser;

pub use parser::{parse_program, ParseOutput, SyntaxError};

/// Byte range into the parsed source text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

pub type Expression = Spanned<Expr>;
pub type Statement = Spanned<Stmt>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Statement>,
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number { value: f64, raw: String },
    String { value: String, raw: String },
    Template { quasis: Vec<TemplateChunk>, exprs: Vec<Expression> },
    Regex { pattern: String, flags: String },
    Bool(bool),
    Null,
    Identifier(String),
    This,
    Super,
    /// `None` entries are holes.
    Array(Vec<Option<Expression>>),
    Spread(Box<Expression>),
    Object(Vec<ObjectMember>),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Unary {
        op: UnaryOp,
        argument: Box<Expression>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Assign {
        op: AssignOp,
        target: Box<Pattern>,
        value: Box<Expression>,
    },
    Member {
        object: Box<Expression>,
        property: MemberProperty,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    New {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    /// `object?.property` and `object?.[index]`. Only appears inside an
    /// [`Expr::OptionalChain`].
    OptionalMember {
        object: Box<Expression>,
        property: MemberProperty,
    },
    /// `callee?.(arguments)`.
    OptionalCall {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    /// The extent of a chain holding at least one `?.`; a nullish base at
    /// any `?.` makes the whole chain `undefined`.
    OptionalChain(Box<Expression>),
    Sequence(Vec<Expression>),
    Paren(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateChunk {
    pub cooked: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    Named(String),
    Computed(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Identifier(String),
    String { value: String, raw: String },
    Number { value: f64, raw: String },
    Computed(Box<Expression>),
}

impl PropertyKey {
    /// The key as a property name, when it is known without evaluation.
    pub fn static_name(&self) -> Option<String> {
        match self {
            PropertyKey::Identifier(name) => Some(name.clone()),
            PropertyKey::String { value, .. } => Some(value.clone()),
            PropertyKey::Number { value, .. } => Some(crate::runtime::number_to_string(*value)),
            PropertyKey::Computed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectMember {
    Property {
        key: PropertyKey,
        value: Expression,
        shorthand: bool,
    },
    Method {
        key: PropertyKey,
        function: Rc<Function>,
    },
    Getter {
        key: PropertyKey,
        function: Rc<Function>,
    },
    Setter {
        key: PropertyKey,
        function: Rc<Function>,
    },
    Spread(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
    Plus,
    Minus,
    TypeOf,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::TypeOf => "typeof ",
            UnaryOp::Void => "void ",
            UnaryOp::Delete => "delete ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    In,
    InstanceOf,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Exp => "**",
            Shl => "<<",
            Shr => ">>",
            UShr => ">>>",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            Eq => "==",
            NotEq => "!=",
            StrictEq => "===",
            StrictNotEq => "!==",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            In => "in",
            InstanceOf => "instanceof",
        }
    }

    /// Binding power used when printing; higher binds tighter.
    pub fn precedence(self) -> u8 {
        use BinaryOp::*;
        match self {
            BitOr => 6,
            BitXor => 7,
            BitAnd => 8,
            Eq | NotEq | StrictEq | StrictNotEq => 9,
            Lt | Gt | LtEq | GtEq | In | InstanceOf => 10,
            Shl | Shr | UShr => 11,
            Add | Sub => 12,
            Mul | Div | Mod => 13,
            Exp => 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            LogicalOp::Nullish => 3,
            LogicalOp::Or => 4,
            LogicalOp::And => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Nullish,
}

impl AssignOp {
    pub fn from_token(token: &str) -> Option<Self> {
        use AssignOp::*;
        Some(match token {
            "=" => Assign,
            "+=" => Add,
            "-=" => Sub,
            "*=" => Mul,
            "/=" => Div,
            "%=" => Mod,
            "**=" => Exp,
            "<<=" => Shl,
            ">>=" => Shr,
            ">>>=" => UShr,
            "&=" => BitAnd,
            "|=" => BitOr,
            "^=" => BitXor,
            "&&=" => And,
            "||=" => Or,
            "??=" => Nullish,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        use AssignOp::*;
        match self {
            Assign => "=",
            Add => "+=",
            Sub => "-=",
            Mul => "*=",
            Div => "/=",
            Mod => "%=",
            Exp => "**=",
            Shl => "<<=",
            Shr => ">>=",
            UShr => ">>>=",
            BitAnd => "&=",
            BitOr => "|=",
            BitXor => "^=",
            And => "&&=",
            Or => "||=",
            Nullish => "??=",
        }
    }

    /// The arithmetic operator behind a compound assignment.
    pub fn binary(self) -> Option<BinaryOp> {
        use AssignOp::*;
        Some(match self {
            Add => BinaryOp::Add,
            Sub => BinaryOp::Sub,
            Mul => BinaryOp::Mul,
            Div => BinaryOp::Div,
            Mod => BinaryOp::Mod,
            Exp => BinaryOp::Exp,
            Shl => BinaryOp::Shl,
            Shr => BinaryOp::Shr,
            UShr => BinaryOp::UShr,
            BitAnd => BinaryOp::BitAnd,
            BitOr => BinaryOp::BitOr,
            BitXor => BinaryOp::BitXor,
            Assign | And | Or | Nullish => return None,
        })
    }

    pub fn logical(self) -> Option<LogicalOp> {
        match self {
            AssignOp::And => Some(LogicalOp::And),
            AssignOp::Or => Some(LogicalOp::Or),
            AssignOp::Nullish => Some(LogicalOp::Nullish),
            _ => None,
        }
    }
}

// ============================================================================
// PATTERNS
// ============================================================================

/// Binding and assignment targets.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Identifier(String),
    /// A member expression used as an assignment target.
    Member(Box<Expression>),
    Array {
        elements: Vec<Option<PatternElement>>,
        rest: Option<Box<Pattern>>,
    },
    Object {
        properties: Vec<PatternProperty>,
        rest: Option<Box<Pattern>>,
    },
}

impl Pattern {
    /// Every identifier this pattern binds, in source order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Identifier(name) => out.push(name.clone()),
            Pattern::Member(_) => {}
            Pattern::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.target.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
            Pattern::Object { properties, rest } => {
                for property in properties {
                    property.value.target.bound_names(out);
                }
                if let Some(rest) = rest {
                    rest.bound_names(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternElement {
    pub target: Pattern,
    pub default: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternProperty {
    pub key: PropertyKey,
    pub value: PatternElement,
    pub shorthand: bool,
}

// ============================================================================
// FUNCTIONS AND CLASSES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Declaration,
    Expression,
    Arrow,
    Method,
    Getter,
    Setter,
    Constructor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    pub kind: FunctionKind,
    pub span: Span,
}

impl Function {
    pub fn is_arrow(&self) -> bool {
        self.kind == FunctionKind::Arrow
    }

    /// Only plain functions and class constructors may be used with `new`.
    pub fn is_constructible(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::Declaration | FunctionKind::Expression | FunctionKind::Constructor
        )
    }

    /// `length` of the function object: parameters before the first default or rest.
    pub fn arity(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !p.rest && p.default.is_none())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    Expression(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expression>,
    pub rest: bool,
    /// Constructor parameter carrying an accessibility or `readonly` modifier.
    pub property: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: Option<String>,
    pub super_class: Option<Expression>,
    pub constructor: Option<Rc<Function>>,
    pub members: Vec<ClassMember>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub key: PropertyKey,
    pub is_static: bool,
    pub kind: ClassMemberKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMemberKind {
    Method(Rc<Function>),
    Getter(Rc<Function>),
    Setter(Rc<Function>),
    Field(Option<Expression>),
}

// ============================================================================
// STATEMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarations: Vec<VarDeclarator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub target: Pattern,
    pub init: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub init: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    VarDecl(VarDecl),
    Expression(Expression),
}

/// Left side of `for…in` / `for…of`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    VarDecl(VarKind, Pattern),
    Pattern(Pattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expression>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expression),
    VarDecl(VarDecl),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Enum(EnumDecl),
    Return(Option<Expression>),
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },
    Block(Vec<Statement>),
    For {
        init: Option<ForInit>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },
    ForIn {
        head: ForHead,
        object: Expression,
        body: Box<Statement>,
    },
    ForOf {
        head: ForHead,
        iterable: Expression,
        body: Box<Statement>,
    },
    While {
        test: Expression,
        body: Box<Statement>,
    },
    DoWhile {
        body: Box<Statement>,
        test: Expression,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expression),
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Switch {
        discriminant: Expression,
        cases: Vec<SwitchCase>,
    },
    Labeled {
        label: String,
        body: Box<Statement>,
    },
    Empty,
    Debugger,
}

impl Stmt {
    /// Statements after which the rest of a block cannot run.
    pub fn is_abrupt(&self) -> bool {
        matches!(
            self,
            Stmt::Return(_) | Stmt::Throw(_) | Stmt::Break(_) | Stmt::Continue(_)
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            Stmt::For { .. } | Stmt::ForIn { .. } | Stmt::ForOf { .. } | Stmt::While { .. } | Stmt::DoWhile { .. }
        )
    }
}
