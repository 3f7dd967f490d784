//! ESTree document reader
//!
//! Lowers an already-parsed ESTree JSON document (the shape emitted by
//! esprima and acorn) into the typed [`ast`](crate::ast). Nothing is lexed or
//! parsed here: the reader only deconstructs the tree, checks node shapes and
//! rejects constructs outside the analyzed subset.
//!
//! - malformed shapes, missing fields and unknown node types are
//!   `InvalidProgramError`
//! - recognised JavaScript features the analysis does not model (exceptions,
//!   classes, generators, destructuring, ...) are `UnsupportedConstructError`

use serde_json::{Map, Value};

use crate::ast::*;
use crate::error::AnalysisError;
use crate::prelude::*;

type Node = Map<String, Value>;

/// Statement node types that are valid ESTree but outside the analyzed subset
const UNSUPPORTED_STATEMENTS: &[&str] = &[
    "TryStatement",
    "ThrowStatement",
    "ClassDeclaration",
    "ForInStatement",
    "ForOfStatement",
    "LabeledStatement",
    "WithStatement",
    "ImportDeclaration",
    "ExportNamedDeclaration",
    "ExportDefaultDeclaration",
    "ExportAllDeclaration",
];

/// Expression node types that are valid ESTree but outside the analyzed subset
const UNSUPPORTED_EXPRESSIONS: &[&str] = &[
    "NewExpression",
    "ClassExpression",
    "YieldExpression",
    "AwaitExpression",
    "TemplateLiteral",
    "TaggedTemplateExpression",
    "SpreadElement",
    "MetaProperty",
    "Super",
    "ChainExpression",
    "ImportExpression",
    "ObjectPattern",
    "ArrayPattern",
    "AssignmentPattern",
    "RestElement",
];

/// Decode and lower a JSON document
pub fn read_program(source: &str) -> Result<Program, AnalysisError> {
    let document: Value = serde_json::from_str(source)?;
    lower_program(&document)
}

/// Lower an already decoded JSON document
pub fn lower_program(document: &Value) -> Result<Program, AnalysisError> {
    Reader::default().program(document)
}

/// Statement and expression nesting accepted before a document is rejected.
/// Documents that went through `read_program` are already capped by
/// serde_json's own recursion limit; caller-built values are not.
pub const MAX_NESTING: u32 = 128;

#[derive(Default)]
struct Reader {
    next_node: u32,
    next_function: u32,
    depth: u32,
}

impl Reader {
    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    fn function_id(&mut self) -> FunctionId {
        let id = FunctionId(self.next_function);
        self.next_function += 1;
        id
    }

    /// Run `lower` one nesting level deeper
    fn nested<T>(
        &mut self,
        value: &Value,
        lower: impl FnOnce(&mut Self) -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError> {
        if self.depth >= MAX_NESTING {
            return Err(AnalysisError::invalid_program(
                format!("program nested deeper than {} levels", MAX_NESTING),
                value.as_object().and_then(span_of),
            ));
        }
        self.depth += 1;
        let result = lower(self);
        self.depth -= 1;
        result
    }

    fn program(&mut self, value: &Value) -> Result<Program, AnalysisError> {
        let node = as_node(value)?;
        match node_type(node)? {
            "Program" => {}
            // Babel wraps the program in a File node
            "File" => {
                let inner = field(node, "program")?;
                return self.nested(inner, |reader| reader.program(inner));
            }
            other => {
                return Err(AnalysisError::invalid_program(
                    format!("expected a Program node, found {}", other),
                    span_of(node),
                ));
            }
        }
        let id = self.node_id();
        let body = self.statements(array_field(node, "body")?)?;
        Ok(Program {
            id,
            body,
            function_count: self.next_function,
        })
    }

    fn statements(&mut self, values: &[Value]) -> Result<Vec<Statement>, AnalysisError> {
        values.iter().map(|v| self.statement(v)).collect()
    }

    fn statement(&mut self, value: &Value) -> Result<Statement, AnalysisError> {
        self.nested(value, |reader| reader.statement_node(value))
    }

    fn statement_node(&mut self, value: &Value) -> Result<Statement, AnalysisError> {
        let node = as_node(value)?;
        let span = span_of(node);
        match node_type(node)? {
            "VariableDeclaration" => Ok(Statement::VariableDeclaration(
                self.variable_declaration(node)?,
            )),
            "FunctionDeclaration" => Ok(Statement::FunctionDeclaration(
                self.function(node, true, None)?,
            )),
            "ExpressionStatement" => Ok(Statement::Expression(ExpressionStatement {
                expression: self.expression(field(node, "expression")?)?,
                span,
            })),
            "BlockStatement" => Ok(Statement::Block(self.block(node)?)),
            "IfStatement" => {
                let test = self.expression(field(node, "test")?)?;
                let consequent = Box::new(self.statement(field(node, "consequent")?)?);
                let alternate = match optional_field(node, "alternate") {
                    Some(alt) => Some(Box::new(self.statement(alt)?)),
                    None => None,
                };
                Ok(Statement::If(IfStatement {
                    test,
                    consequent,
                    alternate,
                    span,
                }))
            }
            "SwitchStatement" => Ok(Statement::Switch(self.switch(node)?)),
            kind @ ("WhileStatement" | "DoWhileStatement") => {
                let (test, body) = if kind == "WhileStatement" {
                    let test = self.expression(field(node, "test")?)?;
                    let body = self.statement(field(node, "body")?)?;
                    (test, body)
                } else {
                    let body = self.statement(field(node, "body")?)?;
                    let test = self.expression(field(node, "test")?)?;
                    (test, body)
                };
                let stmt = WhileStatement {
                    test,
                    body: Box::new(body),
                    span,
                };
                Ok(if kind == "WhileStatement" {
                    Statement::While(stmt)
                } else {
                    Statement::DoWhile(stmt)
                })
            }
            "ForStatement" => {
                let id = self.node_id();
                let init = match optional_field(node, "init") {
                    Some(init) => {
                        let init_node = as_node(init)?;
                        if node_type(init_node)? == "VariableDeclaration" {
                            Some(ForInit::Variable(self.variable_declaration(init_node)?))
                        } else {
                            Some(ForInit::Expression(self.expression(init)?))
                        }
                    }
                    None => None,
                };
                let test = match optional_field(node, "test") {
                    Some(test) => Some(self.expression(test)?),
                    None => None,
                };
                let update = match optional_field(node, "update") {
                    Some(update) => Some(self.expression(update)?),
                    None => None,
                };
                let body = Box::new(self.statement(field(node, "body")?)?);
                Ok(Statement::For(ForStatement {
                    id,
                    init,
                    test,
                    update,
                    body,
                    span,
                }))
            }
            "ReturnStatement" => {
                let argument = match optional_field(node, "argument") {
                    Some(arg) => Some(self.expression(arg)?),
                    None => None,
                };
                Ok(Statement::Return(ReturnStatement { argument, span }))
            }
            kind @ ("BreakStatement" | "ContinueStatement") => {
                if optional_field(node, "label").is_some() {
                    return Err(AnalysisError::unsupported("labeled jump", span));
                }
                Ok(if kind == "BreakStatement" {
                    Statement::Break(span)
                } else {
                    Statement::Continue(span)
                })
            }
            "EmptyStatement" | "DebuggerStatement" => Ok(Statement::Empty),
            other if UNSUPPORTED_STATEMENTS.contains(&other) => {
                Err(AnalysisError::unsupported(other, span))
            }
            other => Err(AnalysisError::invalid_program(
                format!("unknown statement type {}", other),
                span,
            )),
        }
    }

    fn switch(&mut self, node: &Node) -> Result<SwitchStatement, AnalysisError> {
        let id = self.node_id();
        let discriminant = self.expression(field(node, "discriminant")?)?;
        let mut cases = Vec::new();
        let mut has_default = false;
        for case in array_field(node, "cases")? {
            let case = as_node(case)?;
            if node_type(case)? != "SwitchCase" {
                return Err(AnalysisError::invalid_program(
                    "switch case must be a SwitchCase",
                    span_of(case),
                ));
            }
            let test = match optional_field(case, "test") {
                Some(test) => Some(self.expression(test)?),
                None if has_default => {
                    return Err(AnalysisError::invalid_program(
                        "more than one default clause in switch",
                        span_of(case),
                    ));
                }
                None => {
                    has_default = true;
                    None
                }
            };
            let consequent = self.statements(array_field(case, "consequent")?)?;
            cases.push(SwitchCase { test, consequent });
        }
        Ok(SwitchStatement {
            id,
            discriminant,
            cases,
            span: span_of(node),
        })
    }

    fn block(&mut self, node: &Node) -> Result<BlockStatement, AnalysisError> {
        if node_type(node)? != "BlockStatement" {
            return Err(AnalysisError::invalid_program(
                "expected a BlockStatement",
                span_of(node),
            ));
        }
        let id = self.node_id();
        let body = self.statements(array_field(node, "body")?)?;
        Ok(BlockStatement {
            id,
            body,
            span: span_of(node),
        })
    }

    fn variable_declaration(&mut self, node: &Node) -> Result<VariableDeclaration, AnalysisError> {
        let span = span_of(node);
        let kind = match str_field(node, "kind")? {
            "var" => VariableKind::Var,
            "let" => VariableKind::Let,
            "const" => VariableKind::Const,
            other => {
                return Err(AnalysisError::invalid_program(
                    format!("unknown declaration kind {}", other),
                    span,
                ));
            }
        };
        let mut declarations = Vec::new();
        for decl in array_field(node, "declarations")? {
            let decl = as_node(decl)?;
            let target = as_node(field(decl, "id")?)?;
            let id = match node_type(target)? {
                "Identifier" => self.identifier(target)?,
                "ObjectPattern" | "ArrayPattern" => {
                    return Err(AnalysisError::unsupported(
                        "destructuring declaration",
                        span_of(target),
                    ));
                }
                other => {
                    return Err(AnalysisError::invalid_program(
                        format!("invalid declaration target {}", other),
                        span_of(target),
                    ));
                }
            };
            let init = match optional_field(decl, "init") {
                Some(init) => Some(self.expression_named(init, Some(Rc::clone(&id.name)))?),
                None => None,
            };
            declarations.push(VariableDeclarator { id, init });
        }
        Ok(VariableDeclaration {
            kind,
            declarations,
            span,
        })
    }

    fn function(
        &mut self,
        node: &Node,
        is_declaration: bool,
        inferred_name: Option<Name>,
    ) -> Result<Rc<Function>, AnalysisError> {
        let span = span_of(node);
        if bool_field(node, "generator") {
            return Err(AnalysisError::unsupported("generator function", span));
        }
        if bool_field(node, "async") {
            return Err(AnalysisError::unsupported("async function", span));
        }
        let id = self.function_id();
        let node_id = self.node_id();
        let is_arrow = node_type(node)? == "ArrowFunctionExpression";

        let name = match optional_field(node, "id") {
            Some(ident) => Some(self.identifier(as_node(ident)?)?.name),
            None if is_declaration => {
                return Err(AnalysisError::invalid_program(
                    "function declaration without a name",
                    span,
                ));
            }
            None => None,
        };

        let mut params = Vec::new();
        for param in array_field(node, "params")? {
            let param = as_node(param)?;
            match node_type(param)? {
                "Identifier" => params.push(self.identifier(param)?),
                "AssignmentPattern" => {
                    return Err(AnalysisError::unsupported(
                        "default parameter",
                        span_of(param),
                    ));
                }
                "RestElement" => {
                    return Err(AnalysisError::unsupported("rest parameter", span_of(param)));
                }
                "ObjectPattern" | "ArrayPattern" => {
                    return Err(AnalysisError::unsupported(
                        "destructuring parameter",
                        span_of(param),
                    ));
                }
                other => {
                    return Err(AnalysisError::invalid_program(
                        format!("invalid parameter {}", other),
                        span_of(param),
                    ));
                }
            }
        }

        let body_value = field(node, "body")?;
        let body_node = as_node(body_value)?;
        let body = if node_type(body_node)? == "BlockStatement" {
            FunctionBody::Block(self.block(body_node)?)
        } else if is_arrow {
            FunctionBody::Expression(Box::new(self.expression(body_value)?))
        } else {
            return Err(AnalysisError::invalid_program(
                "function body must be a BlockStatement",
                span_of(body_node),
            ));
        };

        Ok(Rc::new(Function {
            id,
            node: node_id,
            name,
            inferred_name,
            params,
            body,
            is_arrow,
            is_declaration,
            span,
        }))
    }

    fn identifier(&mut self, node: &Node) -> Result<Identifier, AnalysisError> {
        let name = str_field(node, "name")?;
        Ok(Identifier {
            id: self.node_id(),
            name: Rc::from(name),
            span: span_of(node),
        })
    }

    fn expression(&mut self, value: &Value) -> Result<Expression, AnalysisError> {
        self.expression_named(value, None)
    }

    /// Lower an expression; `hint` names an anonymous function literal after
    /// the binding or property it is stored into
    fn expression_named(
        &mut self,
        value: &Value,
        hint: Option<Name>,
    ) -> Result<Expression, AnalysisError> {
        self.nested(value, |reader| reader.expression_node(value, hint))
    }

    fn expression_node(
        &mut self,
        value: &Value,
        hint: Option<Name>,
    ) -> Result<Expression, AnalysisError> {
        let node = as_node(value)?;
        let span = span_of(node);
        let expr = match node_type(node)? {
            "Literal" => Expression::Literal(Literal {
                value: literal_value(node)?,
                span,
            }),
            "Identifier" => {
                let ident = self.identifier(node)?;
                if ident.name.as_ref() == "undefined" {
                    Expression::Literal(Literal {
                        value: LiteralValue::Undefined,
                        span,
                    })
                } else {
                    Expression::Identifier(ident)
                }
            }
            "ThisExpression" => Expression::This(ThisExpression {
                id: self.node_id(),
                span,
            }),
            "AssignmentExpression" => {
                let op = str_field(node, "operator")?;
                let operator = match op {
                    "=" => None,
                    "&&=" | "||=" | "??=" => {
                        return Err(AnalysisError::unsupported("logical assignment", span));
                    }
                    _ => {
                        let binary = op
                            .strip_suffix('=')
                            .and_then(BinaryOp::from_operator)
                            .ok_or_else(|| {
                                AnalysisError::invalid_program(
                                    format!("unknown assignment operator {}", op),
                                    span,
                                )
                            })?;
                        Some(binary)
                    }
                };
                let target = self.assignment_target(field(node, "left")?)?;
                let hint = match &target {
                    AssignmentTarget::Identifier(id) => Some(Rc::clone(&id.name)),
                    AssignmentTarget::Member(member) => match &member.property {
                        PropertyKey::Static(name) => Some(Rc::clone(name)),
                        PropertyKey::Computed(_) => None,
                    },
                };
                let value = self.expression_named(field(node, "right")?, hint)?;
                Expression::Assignment(Box::new(AssignmentExpression {
                    operator,
                    target,
                    value,
                    span,
                }))
            }
            "UpdateExpression" => {
                let operator = match str_field(node, "operator")? {
                    "++" => UpdateOp::Increment,
                    "--" => UpdateOp::Decrement,
                    other => {
                        return Err(AnalysisError::invalid_program(
                            format!("unknown update operator {}", other),
                            span,
                        ));
                    }
                };
                let target = self.assignment_target(field(node, "argument")?)?;
                Expression::Update(Box::new(UpdateExpression {
                    operator,
                    prefix: bool_field(node, "prefix"),
                    target,
                    span,
                }))
            }
            "BinaryExpression" => {
                let op = str_field(node, "operator")?;
                let operator = BinaryOp::from_operator(op).ok_or_else(|| {
                    AnalysisError::invalid_program(format!("unknown binary operator {}", op), span)
                })?;
                let left = self.expression(field(node, "left")?)?;
                let right = self.expression(field(node, "right")?)?;
                Expression::Binary(Box::new(BinaryExpression {
                    operator,
                    left,
                    right,
                    span,
                }))
            }
            "LogicalExpression" => {
                let operator = match str_field(node, "operator")? {
                    "&&" => LogicalOp::And,
                    "||" => LogicalOp::Or,
                    "??" => LogicalOp::Nullish,
                    other => {
                        return Err(AnalysisError::invalid_program(
                            format!("unknown logical operator {}", other),
                            span,
                        ));
                    }
                };
                let left = self.expression(field(node, "left")?)?;
                let right = self.expression(field(node, "right")?)?;
                Expression::Logical(Box::new(LogicalExpression {
                    operator,
                    left,
                    right,
                    span,
                }))
            }
            "UnaryExpression" => {
                let operator = match str_field(node, "operator")? {
                    "!" => UnaryOp::Not,
                    "-" => UnaryOp::Minus,
                    "+" => UnaryOp::Plus,
                    "~" => UnaryOp::BitNot,
                    "typeof" => UnaryOp::Typeof,
                    "void" => UnaryOp::Void,
                    "delete" => return Err(AnalysisError::unsupported("delete operator", span)),
                    other => {
                        return Err(AnalysisError::invalid_program(
                            format!("unknown unary operator {}", other),
                            span,
                        ));
                    }
                };
                let argument = self.expression(field(node, "argument")?)?;
                Expression::Unary(Box::new(UnaryExpression {
                    operator,
                    argument,
                    span,
                }))
            }
            "ConditionalExpression" => {
                let test = self.expression(field(node, "test")?)?;
                let consequent = self.expression(field(node, "consequent")?)?;
                let alternate = self.expression(field(node, "alternate")?)?;
                Expression::Conditional(Box::new(ConditionalExpression {
                    test,
                    consequent,
                    alternate,
                    span,
                }))
            }
            "SequenceExpression" => {
                let expressions = array_field(node, "expressions")?
                    .iter()
                    .map(|e| self.expression(e))
                    .collect::<Result<Vec<_>, _>>()?;
                if expressions.is_empty() {
                    return Err(AnalysisError::invalid_program("empty sequence", span));
                }
                Expression::Sequence(SequenceExpression { expressions, span })
            }
            "ObjectExpression" => {
                let id = self.node_id();
                let mut properties = Vec::new();
                for prop in array_field(node, "properties")? {
                    let prop = as_node(prop)?;
                    if node_type(prop)? != "Property" {
                        return Err(AnalysisError::unsupported(
                            "object spread",
                            span_of(prop),
                        ));
                    }
                    match prop.get("kind").and_then(Value::as_str) {
                        None | Some("init") => {}
                        Some(_) => {
                            return Err(AnalysisError::unsupported(
                                "getter/setter property",
                                span_of(prop),
                            ));
                        }
                    }
                    let key = self.property_key(prop)?;
                    let hint = match &key {
                        PropertyKey::Static(name) => Some(Rc::clone(name)),
                        PropertyKey::Computed(_) => None,
                    };
                    let value = self.expression_named(field(prop, "value")?, hint)?;
                    properties.push(ObjectProperty { key, value });
                }
                Expression::Object(ObjectExpression {
                    id,
                    properties,
                    span,
                })
            }
            "ArrayExpression" => {
                let id = self.node_id();
                let mut elements = Vec::new();
                for element in array_field(node, "elements")? {
                    if element.is_null() {
                        elements.push(None);
                    } else {
                        elements.push(Some(self.expression(element)?));
                    }
                }
                Expression::Array(ArrayExpression { id, elements, span })
            }
            "MemberExpression" => Expression::Member(Box::new(self.member(node)?)),
            "CallExpression" => {
                if bool_field(node, "optional") {
                    return Err(AnalysisError::unsupported("optional call", span));
                }
                let id = self.node_id();
                let callee = self.expression(field(node, "callee")?)?;
                let arguments = array_field(node, "arguments")?
                    .iter()
                    .map(|a| self.expression(a))
                    .collect::<Result<Vec<_>, _>>()?;
                Expression::Call(Box::new(CallExpression {
                    id,
                    callee,
                    arguments,
                    span,
                }))
            }
            "FunctionExpression" | "ArrowFunctionExpression" => {
                Expression::Function(self.function(node, false, hint)?)
            }
            other if UNSUPPORTED_EXPRESSIONS.contains(&other) => {
                return Err(AnalysisError::unsupported(other, span));
            }
            other => {
                return Err(AnalysisError::invalid_program(
                    format!("unknown expression type {}", other),
                    span,
                ));
            }
        };
        Ok(expr)
    }

    fn member(&mut self, node: &Node) -> Result<MemberExpression, AnalysisError> {
        let span = span_of(node);
        if bool_field(node, "optional") {
            return Err(AnalysisError::unsupported("optional chaining", span));
        }
        let object = self.expression(field(node, "object")?)?;
        let property_value = field(node, "property")?;
        let property = if bool_field(node, "computed") {
            PropertyKey::Computed(self.expression(property_value)?)
        } else {
            let property_node = as_node(property_value)?;
            match node_type(property_node)? {
                "Identifier" => PropertyKey::Static(Rc::from(str_field(property_node, "name")?)),
                "PrivateIdentifier" => {
                    return Err(AnalysisError::unsupported("private field", span));
                }
                other => {
                    return Err(AnalysisError::invalid_program(
                        format!("invalid member property {}", other),
                        span,
                    ));
                }
            }
        };
        Ok(MemberExpression {
            object,
            property,
            span,
        })
    }

    fn property_key(&mut self, prop: &Node) -> Result<PropertyKey, AnalysisError> {
        let key_value = field(prop, "key")?;
        if bool_field(prop, "computed") {
            return Ok(PropertyKey::Computed(self.expression(key_value)?));
        }
        let key = as_node(key_value)?;
        match node_type(key)? {
            "Identifier" => Ok(PropertyKey::Static(Rc::from(str_field(key, "name")?))),
            "Literal" => Ok(PropertyKey::Static(literal_value(key)?.to_property_key())),
            other => Err(AnalysisError::invalid_program(
                format!("invalid property key {}", other),
                span_of(key),
            )),
        }
    }

    fn assignment_target(&mut self, value: &Value) -> Result<AssignmentTarget, AnalysisError> {
        let node = as_node(value)?;
        let span = span_of(node);
        match node_type(node)? {
            "Identifier" => {
                let ident = self.identifier(node)?;
                if ident.name.as_ref() == "undefined" {
                    return Err(AnalysisError::invalid_program(
                        "cannot assign to undefined",
                        span,
                    ));
                }
                Ok(AssignmentTarget::Identifier(ident))
            }
            "MemberExpression" => Ok(AssignmentTarget::Member(self.member(node)?)),
            "ObjectPattern" | "ArrayPattern" => {
                Err(AnalysisError::unsupported("destructuring assignment", span))
            }
            other => Err(AnalysisError::invalid_program(
                format!("invalid assignment target {}", other),
                span,
            )),
        }
    }
}

fn literal_value(node: &Node) -> Result<LiteralValue, AnalysisError> {
    let span = span_of(node);
    if node.contains_key("regex") {
        return Err(AnalysisError::unsupported(
            "regular expression literal",
            span,
        ));
    }
    if node.contains_key("bigint") {
        return Err(AnalysisError::unsupported("BigInt literal", span));
    }
    match node.get("value") {
        None | Some(Value::Null) => Ok(LiteralValue::Null),
        Some(Value::Bool(b)) => Ok(LiteralValue::Boolean(*b)),
        Some(Value::Number(n)) => n.as_f64().map(LiteralValue::Number).ok_or_else(|| {
            AnalysisError::invalid_program("numeric literal out of range", span)
        }),
        Some(Value::String(s)) => Ok(LiteralValue::String(Rc::from(s.as_str()))),
        Some(_) => Err(AnalysisError::invalid_program(
            "literal value must be a primitive",
            span,
        )),
    }
}

fn as_node(value: &Value) -> Result<&Node, AnalysisError> {
    value
        .as_object()
        .ok_or_else(|| AnalysisError::invalid_program("expected an AST node object", None))
}

fn node_type(node: &Node) -> Result<&str, AnalysisError> {
    node.get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AnalysisError::invalid_program("AST node without a type", span_of(node)))
}

/// Required, non-null field
fn field<'v>(node: &'v Node, name: &str) -> Result<&'v Value, AnalysisError> {
    match node.get(name) {
        Some(Value::Null) | None => Err(AnalysisError::invalid_program(
            format!(
                "{} node is missing field '{}'",
                node_type(node).unwrap_or("untyped"),
                name
            ),
            span_of(node),
        )),
        Some(value) => Ok(value),
    }
}

fn optional_field<'v>(node: &'v Node, name: &str) -> Option<&'v Value> {
    node.get(name).filter(|v| !v.is_null())
}

fn array_field<'v>(node: &'v Node, name: &str) -> Result<&'v [Value], AnalysisError> {
    field(node, name)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            AnalysisError::invalid_program(format!("field '{}' must be an array", name), span_of(node))
        })
}

fn str_field<'v>(node: &'v Node, name: &str) -> Result<&'v str, AnalysisError> {
    field(node, name)?.as_str().ok_or_else(|| {
        AnalysisError::invalid_program(format!("field '{}' must be a string", name), span_of(node))
    })
}

fn bool_field(node: &Node, name: &str) -> bool {
    node.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn span_of(node: &Node) -> Option<Span> {
    let start = node.get("loc")?.get("start")?;
    let line = start.get("line")?.as_u64()?;
    let column = start.get("column")?.as_u64()?;
    Some(Span::new(line as u32, column as u32))
}
