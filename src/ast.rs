//! Abstract Syntax Tree for the analyzed JavaScript subset
//!
//! Nodes are produced by [`crate::estree`] from an ESTree document. Every node
//! that the analysis needs to tell apart (scopes, allocation sites, call sites,
//! identifier reads) carries a [`NodeId`] assigned in document order.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::Serialize;

use crate::prelude::*;

/// Interned-by-reference identifier text
pub type Name = Rc<str>;

/// Position of a node in the original source (1-based line, 0-based column,
/// as emitted by esprima and acorn)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Index of a function literal in [`crate::extractor::StaticInfo::functions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A complete script
#[derive(Debug, Clone)]
pub struct Program {
    pub id: NodeId,
    pub body: Vec<Statement>,
    /// Number of function literals, i.e. the next free [`FunctionId`]
    pub function_count: u32,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone)]
pub enum Statement {
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<Function>),
    Expression(ExpressionStatement),
    Block(BlockStatement),
    If(IfStatement),
    Switch(SwitchStatement),
    While(WhileStatement),
    DoWhile(WhileStatement),
    For(ForStatement),
    Return(ReturnStatement),
    Break(Option<Span>),
    Continue(Option<Span>),
    Empty,
}

#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct BlockStatement {
    pub id: NodeId,
    pub body: Vec<Statement>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

impl VariableKind {
    pub fn is_lexical(self) -> bool {
        !matches!(self, VariableKind::Var)
    }
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Identifier,
    pub init: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct SwitchStatement {
    /// Scope node for `let`/`const` declared in any case
    pub id: NodeId,
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default`
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
}

/// Shared by `while` and `do ... while`
#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct ForStatement {
    /// Scope node for `let`/`const` declared in the initializer
    pub id: NodeId,
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Expression),
}

#[derive(Debug, Clone)]
pub struct ReturnStatement {
    pub argument: Option<Expression>,
    pub span: Option<Span>,
}

// ============ FUNCTIONS ============

#[derive(Debug, Clone)]
pub struct Function {
    pub id: FunctionId,
    pub node: NodeId,
    /// Name from the source (`function name() {}`)
    pub name: Option<Name>,
    /// Name taken from the assignment target, declarator or property key
    /// an anonymous function literal is stored into
    pub inferred_name: Option<Name>,
    pub params: Vec<Identifier>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    /// Declared with `function name() {}` as a statement
    pub is_declaration: bool,
    pub span: Option<Span>,
}

impl Function {
    pub fn display_name(&self) -> Option<&Name> {
        self.name.as_ref().or(self.inferred_name.as_ref())
    }
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(BlockStatement),
    /// Concise arrow body
    Expression(Box<Expression>),
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Identifier(Identifier),
    This(ThisExpression),
    Assignment(Box<AssignmentExpression>),
    Update(Box<UpdateExpression>),
    Binary(Box<BinaryExpression>),
    Logical(Box<LogicalExpression>),
    Unary(Box<UnaryExpression>),
    Conditional(Box<ConditionalExpression>),
    Sequence(SequenceExpression),
    Object(ObjectExpression),
    Array(ArrayExpression),
    Member(Box<MemberExpression>),
    Call(Box<CallExpression>),
    Function(Rc<Function>),
}

impl Expression {
    pub fn span(&self) -> Option<Span> {
        match self {
            Expression::Literal(lit) => lit.span,
            Expression::Identifier(id) => id.span,
            Expression::This(this) => this.span,
            Expression::Assignment(a) => a.span,
            Expression::Update(u) => u.span,
            Expression::Binary(b) => b.span,
            Expression::Logical(l) => l.span,
            Expression::Unary(u) => u.span,
            Expression::Conditional(c) => c.span,
            Expression::Sequence(s) => s.span,
            Expression::Object(o) => o.span,
            Expression::Array(a) => a.span,
            Expression::Member(m) => m.span,
            Expression::Call(c) => c.span,
            Expression::Function(f) => f.span,
        }
    }
}

/// A primitive JavaScript value as it appears in a literal
#[derive(Debug, Clone)]
pub enum LiteralValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(Name),
}

// Numbers compare by bit pattern so that NaN is equal to itself and the
// lattice join stays idempotent.
impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LiteralValue::Undefined, LiteralValue::Undefined) => true,
            (LiteralValue::Null, LiteralValue::Null) => true,
            (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a == b,
            (LiteralValue::Number(a), LiteralValue::Number(b)) => a.to_bits() == b.to_bits(),
            (LiteralValue::String(a), LiteralValue::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::Undefined | LiteralValue::Null => {}
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Number(n) => n.to_bits().hash(state),
            LiteralValue::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Undefined => write!(f, "undefined"),
            LiteralValue::Null => write!(f, "null"),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Number(n) => write!(f, "{}", n),
            LiteralValue::String(s) => write!(f, "{:?}", s.as_ref()),
        }
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::String(Rc::from(s))
    }
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct Identifier {
    pub id: NodeId,
    pub name: Name,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct ThisExpression {
    pub id: NodeId,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    Identifier(Identifier),
    Member(MemberExpression),
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    /// `None` for plain `=`, the combining operator for `+=` and friends
    pub operator: Option<BinaryOp>,
    pub target: AssignmentTarget,
    pub value: Expression,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub prefix: bool,
    pub target: AssignmentTarget,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    URShift,
    In,
    Instanceof,
}

impl BinaryOp {
    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Exp,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "===" => BinaryOp::StrictEq,
            "!==" => BinaryOp::StrictNotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::LShift,
            ">>" => BinaryOp::RShift,
            ">>>" => BinaryOp::URShift,
            "in" => BinaryOp::In,
            "instanceof" => BinaryOp::Instanceof,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Expression,
    pub right: Expression,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Expression,
    pub right: Expression,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
    BitNot,
    Typeof,
    Void,
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Expression,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub test: Expression,
    pub consequent: Expression,
    pub alternate: Expression,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct ObjectExpression {
    /// Allocation site
    pub id: NodeId,
    pub properties: Vec<ObjectProperty>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct ObjectProperty {
    pub key: PropertyKey,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Static(Name),
    Computed(Expression),
}

#[derive(Debug, Clone)]
pub struct ArrayExpression {
    /// Allocation site
    pub id: NodeId,
    pub elements: Vec<Option<Expression>>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct MemberExpression {
    pub object: Expression,
    pub property: PropertyKey,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    /// Call site, used as the activation context of the callee
    pub id: NodeId,
    pub callee: Expression,
    pub arguments: Vec<Expression>,
    pub span: Option<Span>,
}
