//! Constant substitution
//!
//! Rewrites a program so that every identifier read whose locations all hold
//! the same primitive constant becomes that literal. Reads are looked up by
//! node id in the heap of a finished analysis, so only reads that were
//! actually evaluated are candidates. Node and function ids are kept, which
//! lets the result be analyzed again and compared with the first run.

use crate::ast::*;
use crate::heap::Heap;
use crate::lattice::{AbstractValue, Value};
use crate::prelude::*;

/// Substitute constant reads; returns the rewritten program and the number
/// of identifiers replaced
pub fn substitute_constants(program: &Program, heap: &Heap) -> (Program, usize) {
    let mut substitution = Substitution { heap, replaced: 0 };
    let body = substitution.statements(&program.body);
    let rewritten = Program {
        id: program.id,
        body,
        function_count: program.function_count,
    };
    (rewritten, substitution.replaced)
}

/// The constant every evaluation of the read at `node` produced, if any
pub fn constant_for_read(heap: &Heap, node: NodeId) -> Option<LiteralValue> {
    let locations = heap.reads_of(node)?;
    let mut constant: Option<&LiteralValue> = None;
    for id in locations {
        let approx = &heap.get(*id)?.approx;
        if approx.unknown {
            return None;
        }
        let AbstractValue::Constant(Value::Primitive(value)) = &approx.value else {
            return None;
        };
        match constant {
            Some(seen) if seen != value => return None,
            _ => constant = Some(value),
        }
    }
    constant.cloned()
}

struct Substitution<'a> {
    heap: &'a Heap,
    replaced: usize,
}

impl Substitution<'_> {
    fn statements(&mut self, statements: &[Statement]) -> Vec<Statement> {
        statements.iter().map(|s| self.statement(s)).collect()
    }

    fn boxed(&mut self, statement: &Statement) -> Box<Statement> {
        Box::new(self.statement(statement))
    }

    fn statement(&mut self, statement: &Statement) -> Statement {
        match statement {
            Statement::VariableDeclaration(decl) => {
                Statement::VariableDeclaration(self.variable_declaration(decl))
            }
            Statement::FunctionDeclaration(function) => {
                Statement::FunctionDeclaration(self.function(function))
            }
            Statement::Expression(stmt) => Statement::Expression(ExpressionStatement {
                expression: self.expression(&stmt.expression),
                span: stmt.span,
            }),
            Statement::Block(block) => Statement::Block(self.block(block)),
            Statement::If(stmt) => Statement::If(IfStatement {
                test: self.expression(&stmt.test),
                consequent: self.boxed(&stmt.consequent),
                alternate: stmt.alternate.as_ref().map(|alt| self.boxed(alt)),
                span: stmt.span,
            }),
            Statement::Switch(stmt) => Statement::Switch(SwitchStatement {
                id: stmt.id,
                discriminant: self.expression(&stmt.discriminant),
                cases: stmt
                    .cases
                    .iter()
                    .map(|case| SwitchCase {
                        test: self.optional(case.test.as_ref()),
                        consequent: self.statements(&case.consequent),
                    })
                    .collect(),
                span: stmt.span,
            }),
            Statement::While(stmt) => Statement::While(self.while_statement(stmt)),
            Statement::DoWhile(stmt) => Statement::DoWhile(self.while_statement(stmt)),
            Statement::For(stmt) => Statement::For(ForStatement {
                id: stmt.id,
                init: stmt.init.as_ref().map(|init| match init {
                    ForInit::Variable(decl) => ForInit::Variable(self.variable_declaration(decl)),
                    ForInit::Expression(expr) => ForInit::Expression(self.expression(expr)),
                }),
                test: self.optional(stmt.test.as_ref()),
                update: self.optional(stmt.update.as_ref()),
                body: self.boxed(&stmt.body),
                span: stmt.span,
            }),
            Statement::Return(stmt) => Statement::Return(ReturnStatement {
                argument: self.optional(stmt.argument.as_ref()),
                span: stmt.span,
            }),
            Statement::Break(span) => Statement::Break(*span),
            Statement::Continue(span) => Statement::Continue(*span),
            Statement::Empty => Statement::Empty,
        }
    }

    fn variable_declaration(&mut self, decl: &VariableDeclaration) -> VariableDeclaration {
        VariableDeclaration {
            kind: decl.kind,
            declarations: decl
                .declarations
                .iter()
                .map(|d| VariableDeclarator {
                    id: d.id.clone(),
                    init: self.optional(d.init.as_ref()),
                })
                .collect(),
            span: decl.span,
        }
    }

    fn block(&mut self, block: &BlockStatement) -> BlockStatement {
        BlockStatement {
            id: block.id,
            body: self.statements(&block.body),
            span: block.span,
        }
    }

    fn while_statement(&mut self, stmt: &WhileStatement) -> WhileStatement {
        WhileStatement {
            test: self.expression(&stmt.test),
            body: self.boxed(&stmt.body),
            span: stmt.span,
        }
    }

    fn function(&mut self, function: &Rc<Function>) -> Rc<Function> {
        let body = match &function.body {
            FunctionBody::Block(block) => FunctionBody::Block(self.block(block)),
            FunctionBody::Expression(expr) => {
                FunctionBody::Expression(Box::new(self.expression(expr)))
            }
        };
        Rc::new(Function {
            body,
            ..Function::clone(function)
        })
    }

    fn optional(&mut self, expr: Option<&Expression>) -> Option<Expression> {
        expr.map(|e| self.expression(e))
    }

    fn expression(&mut self, expr: &Expression) -> Expression {
        match expr {
            Expression::Identifier(id) => match constant_for_read(self.heap, id.id) {
                Some(value) => {
                    self.replaced += 1;
                    Expression::Literal(Literal { value, span: id.span })
                }
                None => expr.clone(),
            },
            Expression::Literal(_) | Expression::This(_) => expr.clone(),
            Expression::Assignment(a) => Expression::Assignment(Box::new(AssignmentExpression {
                operator: a.operator,
                target: self.target(&a.target),
                value: self.expression(&a.value),
                span: a.span,
            })),
            Expression::Update(u) => Expression::Update(Box::new(UpdateExpression {
                operator: u.operator,
                prefix: u.prefix,
                target: self.target(&u.target),
                span: u.span,
            })),
            Expression::Binary(b) => Expression::Binary(Box::new(BinaryExpression {
                operator: b.operator,
                left: self.expression(&b.left),
                right: self.expression(&b.right),
                span: b.span,
            })),
            Expression::Logical(l) => Expression::Logical(Box::new(LogicalExpression {
                operator: l.operator,
                left: self.expression(&l.left),
                right: self.expression(&l.right),
                span: l.span,
            })),
            Expression::Unary(u) => Expression::Unary(Box::new(UnaryExpression {
                operator: u.operator,
                argument: self.expression(&u.argument),
                span: u.span,
            })),
            Expression::Conditional(c) => {
                Expression::Conditional(Box::new(ConditionalExpression {
                    test: self.expression(&c.test),
                    consequent: self.expression(&c.consequent),
                    alternate: self.expression(&c.alternate),
                    span: c.span,
                }))
            }
            Expression::Sequence(s) => Expression::Sequence(SequenceExpression {
                expressions: s.expressions.iter().map(|e| self.expression(e)).collect(),
                span: s.span,
            }),
            Expression::Object(o) => Expression::Object(ObjectExpression {
                id: o.id,
                properties: o
                    .properties
                    .iter()
                    .map(|p| ObjectProperty {
                        key: self.property_key(&p.key),
                        value: self.expression(&p.value),
                    })
                    .collect(),
                span: o.span,
            }),
            Expression::Array(a) => Expression::Array(ArrayExpression {
                id: a.id,
                elements: a
                    .elements
                    .iter()
                    .map(|e| self.optional(e.as_ref()))
                    .collect(),
                span: a.span,
            }),
            Expression::Member(m) => Expression::Member(Box::new(self.member(m))),
            Expression::Call(c) => Expression::Call(Box::new(CallExpression {
                id: c.id,
                callee: self.expression(&c.callee),
                arguments: c.arguments.iter().map(|e| self.expression(e)).collect(),
                span: c.span,
            })),
            Expression::Function(function) => Expression::Function(self.function(function)),
        }
    }

    // The written identifier stays; a member target's object is a read
    fn target(&mut self, target: &AssignmentTarget) -> AssignmentTarget {
        match target {
            AssignmentTarget::Identifier(id) => AssignmentTarget::Identifier(id.clone()),
            AssignmentTarget::Member(m) => AssignmentTarget::Member(self.member(m)),
        }
    }

    fn member(&mut self, member: &MemberExpression) -> MemberExpression {
        MemberExpression {
            object: self.expression(&member.object),
            property: self.property_key(&member.property),
            span: member.span,
        }
    }

    fn property_key(&mut self, key: &PropertyKey) -> PropertyKey {
        match key {
            PropertyKey::Static(name) => PropertyKey::Static(name.clone()),
            PropertyKey::Computed(expr) => PropertyKey::Computed(self.expression(expr)),
        }
    }
}
