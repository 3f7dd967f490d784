//! Abstract interpreter
//!
//! Executes one function body (top-level code counts as one) against the
//! abstract heap. Every write is a join, so running a statement twice, or
//! running both arms of an undecided branch one after the other, never loses
//! a value that either run could produce.
//!
//! The interpreter never decides when callbacks run. Callbacks it sees being
//! registered are handed back in the [`Outcome`] and invoked later by the
//! scheduler.

pub mod operators;

use tracing::trace;

use crate::ast::{
    ArrayExpression, AssignmentExpression, AssignmentTarget, BinaryOp, BlockStatement, CallExpression,
    ConditionalExpression, Expression, ForInit, ForStatement, Function, FunctionBody, FunctionId,
    Identifier, IfStatement, LiteralValue, LogicalExpression, LogicalOp, MemberExpression, Name,
    NodeId, ObjectExpression, Program, PropertyKey, Span, Statement, UnaryExpression, UnaryOp,
    SwitchCase, SwitchStatement, UpdateExpression, VariableDeclaration, WhileStatement,
};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::extractor::{StaticInfo, THIS};
use crate::heap::{
    Binding, ClosureValue, Context, DeclarationKind, Environment, Heap, LocationId, LocationKey,
    Scope, ScopeInstance,
};
use crate::lattice::{
    AbstractValue, Approx, ClosureId, HeapRef, Lattice, ObjectId, Value, function_label,
};
use crate::prelude::*;

/// Completion record of an abstract statement.
///
/// `Normal` means the statement may complete normally; the other variants
/// mean it never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Normal,
    Return,
    Break,
    Continue,
}

impl Completion {
    /// Completion of two alternative paths
    fn join(self, other: Completion) -> Completion {
        if self == Completion::Normal || other == Completion::Normal {
            Completion::Normal
        } else {
            self
        }
    }
}

/// A closure the host may call at any time, with the object it was
/// installed on as `this`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Callback {
    pub closure: ClosureId,
    pub this: Option<HeapRef>,
}

/// Result of interpreting one body
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Return value (undefined for top-level code)
    pub value: Approx,
    /// Callbacks registered while running, in registration order
    pub callbacks: Vec<Callback>,
}

/// Property key of a member access
#[derive(Debug, Clone)]
enum Key {
    Name(Name),
    /// Computed key whose value is not a single constant
    Any,
    /// Computed key that never produced a value
    Never,
}

struct Activation {
    function: FunctionId,
    context: Context,
    return_location: LocationId,
    /// A nested call re-entered this activation
    reentered: bool,
}

pub struct Interpreter<'a> {
    info: &'a StaticInfo,
    config: &'a AnalyzerConfig,
    heap: &'a mut Heap,
    /// Active calls, innermost last
    stack: Vec<Activation>,
    callbacks: IndexSet<Callback>,
}

impl<'a> Interpreter<'a> {
    pub fn new(info: &'a StaticInfo, config: &'a AnalyzerConfig, heap: &'a mut Heap) -> Self {
        Interpreter {
            info,
            config,
            heap,
            stack: Vec::new(),
            callbacks: index_set_new(),
        }
    }

    /// Build the global environment: host externals bound to unknown values,
    /// then every program-level declaration, with function declarations
    /// already initialized.
    pub fn global_environment(&mut self, program: &Program) -> Result<Environment, AnalysisError> {
        let (info, config) = (self.info, self.config);
        let scope = info.program_scope()?;
        let unknown = Approx::unknown();

        let mut env = Environment::new();
        env.push(Scope::new(ScopeInstance {
            node: program.id,
            context: Context::Root,
        }));
        for external in &config.externals {
            if scope.declares(external) {
                continue;
            }
            let name: Name = Rc::from(external.as_str());
            let location = env.declare(self.heap, &name, DeclarationKind::External, None)?;
            self.heap.join_into(location, &unknown);
        }
        self.declare_scope(&mut env, program.id, None)?;
        env.write(self.heap, THIS, &unknown, None)?;
        Ok(env)
    }

    /// Run top-level code once
    pub fn run_program(
        &mut self,
        program: &Program,
        env: &mut Environment,
    ) -> Result<Outcome, AnalysisError> {
        self.statements(env, &program.body)?;
        Ok(self.outcome(Approx::undefined()))
    }

    /// Invoke a registered callback the way the host would: with its
    /// installation object as `this` and unknown arguments
    pub fn invoke_callback(
        &mut self,
        callback: Callback,
        index: u32,
    ) -> Result<Outcome, AnalysisError> {
        let closure = self.closure(callback.closure)?;
        let arity = self.info.function(closure.function)?.function.params.len();
        let this = match callback.this {
            Some(owner) => Approx::reference(owner),
            None => Approx::unknown(),
        };
        let args = vec![Approx::unknown(); arity];
        let value = self.call_closure(callback.closure, &this, &args, Context::Callback(index))?;
        Ok(self.outcome(value))
    }

    fn outcome(&mut self, value: Approx) -> Outcome {
        Outcome {
            value,
            callbacks: core::mem::take(&mut self.callbacks).into_iter().collect(),
        }
    }

    fn context(&self) -> Context {
        self.stack.last().map_or(Context::Root, |a| a.context)
    }

    fn register(&mut self, callback: Callback) {
        if self.callbacks.insert(callback) {
            trace!(closure = callback.closure.0, this = ?callback.this, "callback registered");
        }
    }

    // ========== Scopes and closures ==========

    /// Declare every name of a static scope in the innermost environment
    /// scope, then initialize its function declarations. `callee` is the
    /// function being activated and its closure, which a named function
    /// expression sees under its own name.
    fn declare_scope(
        &mut self,
        env: &mut Environment,
        node: NodeId,
        callee: Option<(FunctionId, ClosureId)>,
    ) -> Result<(), AnalysisError> {
        let info = self.info;
        let Some(scope) = info.scope(node) else {
            return Ok(());
        };
        for declaration in &scope.declarations {
            env.declare(self.heap, &declaration.name, declaration.kind, declaration.span)?;
        }
        for declaration in &scope.declarations {
            let Some(function) = declaration.function else {
                continue;
            };
            let value = match callee {
                Some((id, closure)) if id == function => Approx::reference(HeapRef::Closure(closure)),
                _ => self.create_closure(env, function)?,
            };
            env.write(self.heap, &declaration.name, &value, declaration.span)?;
        }
        Ok(())
    }

    fn enter_block_scope(&mut self, env: &mut Environment, node: NodeId) -> Result<(), AnalysisError> {
        env.push(Scope::new(ScopeInstance {
            node,
            context: self.context(),
        }));
        self.declare_scope(env, node, None)
    }

    /// Evaluate a function literal: capture, by location, exactly the free
    /// variables that resolve here
    fn create_closure(&mut self, env: &Environment, function: FunctionId) -> Result<Approx, AnalysisError> {
        let info = self.info.function(function)?;
        let mut captured = Scope::captured();
        for name in &info.free_variables {
            if let Some(binding) = env.resolve(name) {
                captured.bindings.insert(
                    Rc::clone(name),
                    Binding {
                        location: binding.location,
                        kind: DeclarationKind::Captured,
                    },
                );
            }
        }
        let id = self.heap.intern_closure(function, captured);
        trace!(function = %function_label(&info.function), closure = id.0, "closure created");
        Ok(Approx::reference(HeapRef::Closure(id)))
    }

    fn closure(&self, id: ClosureId) -> Result<ClosureValue, AnalysisError> {
        self.heap.closure(id).cloned().ok_or_else(|| {
            AnalysisError::invalid_program(format!("unknown closure #{}", id.0), None)
        })
    }

    // ========== Calls ==========

    /// Call a closure in `context` and return everything the activation may
    /// return.
    ///
    /// A call that re-enters an activation already on the stack joins its
    /// arguments into that activation and reads the return value seen so
    /// far. The outer run then repeats the body until the heap stops
    /// changing, so effects of every recursion depth are covered.
    fn call_closure(
        &mut self,
        id: ClosureId,
        this: &Approx,
        args: &[Approx],
        context: Context,
    ) -> Result<Approx, AnalysisError> {
        let closure = self.closure(id)?;
        let function = Rc::clone(&self.info.function(closure.function)?.function);
        let instance = ScopeInstance {
            node: function.node,
            context,
        };
        let return_location = self.heap.location(LocationKey::Return(instance));

        let reentered = match self
            .stack
            .iter_mut()
            .rev()
            .find(|a| a.function == closure.function && a.context == context)
        {
            Some(active) => {
                active.reentered = true;
                true
            }
            None => false,
        };
        if reentered {
            trace!(function = %function_label(&function), %context, "recursive call joined");
            let mut env = Environment::for_closure(&closure);
            env.push(Scope::new(instance));
            self.bind_arguments(&mut env, &function, id, this, args)?;
            return Ok(self.heap.value(return_location));
        }
        if self.stack.len() >= self.config.max_call_depth {
            return Err(AnalysisError::diverged(format!(
                "call to {} exceeds the call depth limit of {}",
                function_label(&function),
                self.config.max_call_depth
            )));
        }

        let mut iterations = 0usize;
        loop {
            let generation = self.heap.generation();
            let mut env = Environment::for_closure(&closure);
            env.push(Scope::new(instance));
            self.stack.push(Activation {
                function: closure.function,
                context,
                return_location,
                reentered: false,
            });
            let result = self.activate(&mut env, &function, id, this, args);
            let activation = self.stack.pop();

            if result? == Completion::Normal {
                self.heap.join_into(return_location, &Approx::undefined());
            }
            iterations += 1;
            if !activation.is_some_and(|a| a.reentered) || self.heap.generation() == generation {
                break;
            }
            if iterations >= self.config.max_loop_iterations {
                return Err(AnalysisError::diverged(format!(
                    "recursion through {} did not stabilise after {} iterations",
                    function_label(&function),
                    iterations
                )));
            }
        }
        Ok(self.heap.value(return_location))
    }

    /// Prologue of an activation: declarations, `this` and parameters
    fn bind_arguments(
        &mut self,
        env: &mut Environment,
        function: &Function,
        closure: ClosureId,
        this: &Approx,
        args: &[Approx],
    ) -> Result<(), AnalysisError> {
        self.declare_scope(env, function.node, Some((function.id, closure)))?;
        if !function.is_arrow {
            env.write(self.heap, THIS, this, function.span)?;
        }
        for (i, param) in function.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or_else(Approx::undefined);
            env.write(self.heap, &param.name, &value, param.span)?;
        }
        Ok(())
    }

    fn activate(
        &mut self,
        env: &mut Environment,
        function: &Function,
        closure: ClosureId,
        this: &Approx,
        args: &[Approx],
    ) -> Result<Completion, AnalysisError> {
        self.bind_arguments(env, function, closure, this, args)?;
        match &function.body {
            FunctionBody::Block(block) => self.statements(env, &block.body),
            FunctionBody::Expression(expr) => {
                let value = self.expression(env, expr)?;
                self.return_value(&value, function.span)?;
                Ok(Completion::Return)
            }
        }
    }

    fn return_value(&mut self, value: &Approx, span: Option<Span>) -> Result<(), AnalysisError> {
        let Some(activation) = self.stack.last() else {
            return Err(AnalysisError::invalid_program(
                "return outside of a function",
                span,
            ));
        };
        self.heap.join_into(activation.return_location, value);
        Ok(())
    }

    fn call(&mut self, env: &mut Environment, call: &CallExpression) -> Result<Approx, AnalysisError> {
        // Method calls bind `this` to the receiver
        let (callee, this) = match &call.callee {
            Expression::Member(member) => {
                let receiver = self.expression(env, &member.object)?;
                let key = self.property_key(env, &member.property)?;
                (self.read_property(&receiver, &key), receiver)
            }
            other => (self.expression(env, other)?, Approx::undefined()),
        };
        let mut args = Vec::with_capacity(call.arguments.len());
        for argument in &call.arguments {
            args.push(self.expression(env, argument)?);
        }

        let context = Context::CallSite(call.id);
        let mut result = Approx::bottom();
        for closure in callee.closures() {
            let value = self.call_closure(closure, &this, &args, context)?;
            result.join_in_place(&value);
        }

        // Opaque call: the callee is not in the program, so neither is its
        // result, and it may keep and later call any closure it receives
        if callee.unknown {
            result.join_in_place(&Approx::unknown());
            if self.config.escaping_closures_are_callbacks {
                for arg in &args {
                    for closure in arg.closures() {
                        self.register(Callback {
                            closure,
                            this: None,
                        });
                    }
                }
            }
        }
        Ok(result)
    }

    // ========== Statements ==========

    fn statements(&mut self, env: &mut Environment, body: &[Statement]) -> Result<Completion, AnalysisError> {
        for stmt in body {
            let completion = self.statement(env, stmt)?;
            if completion != Completion::Normal {
                return Ok(completion);
            }
        }
        Ok(Completion::Normal)
    }

    fn statement(&mut self, env: &mut Environment, stmt: &Statement) -> Result<Completion, AnalysisError> {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                self.variable_declaration(env, decl)?;
                Ok(Completion::Normal)
            }
            // Initialized on scope entry
            Statement::FunctionDeclaration(_) => Ok(Completion::Normal),
            Statement::Expression(stmt) => {
                self.expression(env, &stmt.expression)?;
                Ok(Completion::Normal)
            }
            Statement::Block(block) => self.block(env, block),
            Statement::If(if_stmt) => self.if_statement(env, if_stmt),
            Statement::Switch(switch) => self.switch(env, switch),
            Statement::While(while_stmt) => self.while_loop(env, while_stmt, false),
            Statement::DoWhile(while_stmt) => self.while_loop(env, while_stmt, true),
            Statement::For(for_stmt) => self.for_loop(env, for_stmt),
            Statement::Return(ret) => {
                let value = match &ret.argument {
                    Some(argument) => self.expression(env, argument)?,
                    None => Approx::undefined(),
                };
                self.return_value(&value, ret.span)?;
                Ok(Completion::Return)
            }
            Statement::Break(_) => Ok(Completion::Break),
            Statement::Continue(_) => Ok(Completion::Continue),
            Statement::Empty => Ok(Completion::Normal),
        }
    }

    fn variable_declaration(
        &mut self,
        env: &mut Environment,
        decl: &VariableDeclaration,
    ) -> Result<(), AnalysisError> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.expression(env, init)?,
                None if decl.kind.is_lexical() => Approx::undefined(),
                // `var x;` only declares; the hoisted binding stays unobserved
                None => continue,
            };
            env.write(self.heap, &declarator.id.name, &value, declarator.id.span)?;
        }
        Ok(())
    }

    fn block(&mut self, env: &mut Environment, block: &BlockStatement) -> Result<Completion, AnalysisError> {
        if self.info.scope(block.id).is_none() {
            return self.statements(env, &block.body);
        }
        self.enter_block_scope(env, block.id)?;
        let result = self.statements(env, &block.body);
        env.pop();
        result
    }

    fn if_statement(&mut self, env: &mut Environment, if_stmt: &IfStatement) -> Result<Completion, AnalysisError> {
        let test = self.expression(env, &if_stmt.test)?;
        match test.truthiness() {
            Some(true) => self.statement(env, &if_stmt.consequent),
            Some(false) => match &if_stmt.alternate {
                Some(alt) => self.statement(env, alt),
                None => Ok(Completion::Normal),
            },
            // Either branch may run
            None => {
                let consequent = self.statement(env, &if_stmt.consequent)?;
                let alternate = match &if_stmt.alternate {
                    Some(alt) => self.statement(env, alt)?,
                    None => Completion::Normal,
                };
                Ok(consequent.join(alternate))
            }
        }
    }

    fn switch(&mut self, env: &mut Environment, switch: &SwitchStatement) -> Result<Completion, AnalysisError> {
        let discriminant = self.expression(env, &switch.discriminant)?;
        let scoped = self.info.scope(switch.id).is_some();
        if scoped {
            self.enter_block_scope(env, switch.id)?;
        }
        let result = self.switch_cases(env, switch, &discriminant);
        if scoped {
            env.pop();
        }
        result
    }

    /// Run every case that may match through to the end of the switch and
    /// join the completions. A certain match ends the search; `default` runs
    /// only when no case certainly matched.
    fn switch_cases(
        &mut self,
        env: &mut Environment,
        switch: &SwitchStatement,
        discriminant: &Approx,
    ) -> Result<Completion, AnalysisError> {
        let mut completion: Option<Completion> = None;
        let mut matched = false;
        for (index, case) in switch.cases.iter().enumerate() {
            let Some(test) = &case.test else {
                continue;
            };
            let value = self.expression(env, test)?;
            let equal = operators::binary(BinaryOp::StrictEq, discriminant, &value).truthiness();
            if equal == Some(false) {
                continue;
            }
            let run = self.fall_through(env, switch.cases.get(index..).unwrap_or(&[]))?;
            completion = Some(completion.map_or(run, |c| c.join(run)));
            if equal == Some(true) {
                matched = true;
                break;
            }
        }
        if !matched {
            let run = match switch.cases.iter().position(|case| case.test.is_none()) {
                Some(index) => self.fall_through(env, switch.cases.get(index..).unwrap_or(&[]))?,
                None => Completion::Normal,
            };
            completion = Some(completion.map_or(run, |c| c.join(run)));
        }
        Ok(completion.unwrap_or(Completion::Normal))
    }

    fn fall_through(&mut self, env: &mut Environment, cases: &[SwitchCase]) -> Result<Completion, AnalysisError> {
        for case in cases {
            match self.statements(env, &case.consequent)? {
                Completion::Normal => {}
                Completion::Break => return Ok(Completion::Normal),
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn while_loop(
        &mut self,
        env: &mut Environment,
        stmt: &WhileStatement,
        body_first: bool,
    ) -> Result<Completion, AnalysisError> {
        self.run_loop(env, Some(&stmt.test), &stmt.body, None, body_first, stmt.span)
    }

    fn for_loop(&mut self, env: &mut Environment, stmt: &ForStatement) -> Result<Completion, AnalysisError> {
        let scoped = self.info.scope(stmt.id).is_some();
        if scoped {
            self.enter_block_scope(env, stmt.id)?;
        }
        let result = self.for_parts(env, stmt);
        if scoped {
            env.pop();
        }
        result
    }

    fn for_parts(&mut self, env: &mut Environment, stmt: &ForStatement) -> Result<Completion, AnalysisError> {
        match &stmt.init {
            Some(ForInit::Variable(decl)) => self.variable_declaration(env, decl)?,
            Some(ForInit::Expression(expr)) => {
                self.expression(env, expr)?;
            }
            None => {}
        }
        self.run_loop(
            env,
            stmt.test.as_ref(),
            &stmt.body,
            stmt.update.as_ref(),
            false,
            stmt.span,
        )
    }

    /// Re-run a loop until a whole iteration leaves the heap unchanged.
    ///
    /// An iteration that changes nothing would be repeated identically, so
    /// the heap at that point covers every iteration count. Code after the
    /// loop always runs: the loop may exit through `break` or its test.
    fn run_loop(
        &mut self,
        env: &mut Environment,
        test: Option<&Expression>,
        body: &Statement,
        update: Option<&Expression>,
        body_first: bool,
        span: Option<Span>,
    ) -> Result<Completion, AnalysisError> {
        let mut iterations = 0usize;
        loop {
            let generation = self.heap.generation();

            let enter = if body_first && iterations == 0 {
                true
            } else {
                match test {
                    Some(test) => self.expression(env, test)?.truthiness() != Some(false),
                    None => true,
                }
            };
            if !enter {
                break;
            }

            self.statement(env, body)?;
            if let Some(update) = update {
                self.expression(env, update)?;
            }

            iterations += 1;
            if self.heap.generation() == generation {
                break;
            }
            if iterations >= self.config.max_loop_iterations {
                let at = span.map(|s| format!(" at {}", s)).unwrap_or_default();
                return Err(AnalysisError::diverged(format!(
                    "loop{} did not stabilise after {} iterations",
                    at, iterations
                )));
            }
        }
        trace!(iterations, "loop stable");
        Ok(Completion::Normal)
    }

    // ========== Expressions ==========

    fn expression(&mut self, env: &mut Environment, expr: &Expression) -> Result<Approx, AnalysisError> {
        match expr {
            Expression::Literal(lit) => Ok(Approx::constant(lit.value.clone())),
            Expression::Identifier(id) => self.identifier(env, id),
            Expression::This(this) => env.read(self.heap, THIS, this.span),
            Expression::Assignment(assign) => self.assignment(env, assign),
            Expression::Update(update) => self.update(env, update),
            Expression::Binary(bin) => {
                let left = self.expression(env, &bin.left)?;
                let right = self.expression(env, &bin.right)?;
                Ok(operators::binary(bin.operator, &left, &right))
            }
            Expression::Logical(logical) => self.logical(env, logical),
            Expression::Unary(unary) => self.unary(env, unary),
            Expression::Conditional(cond) => self.conditional(env, cond),
            Expression::Sequence(seq) => {
                let mut last = Approx::undefined();
                for e in &seq.expressions {
                    last = self.expression(env, e)?;
                }
                Ok(last)
            }
            Expression::Object(object) => self.object(env, object),
            Expression::Array(array) => self.array(env, array),
            Expression::Member(member) => self.member(env, member),
            Expression::Call(call) => self.call(env, call),
            Expression::Function(function) => self.create_closure(env, function.id),
        }
    }

    fn identifier(&mut self, env: &Environment, id: &Identifier) -> Result<Approx, AnalysisError> {
        let binding = env
            .resolve(&id.name)
            .ok_or_else(|| AnalysisError::unbound_name(id.name.as_ref(), id.span))?;
        self.heap.record_read(id.id, binding.location);
        Ok(self.heap.value(binding.location))
    }

    /// Assignments join into their target and evaluate to the joined value
    fn assignment(
        &mut self,
        env: &mut Environment,
        assign: &AssignmentExpression,
    ) -> Result<Approx, AnalysisError> {
        match &assign.target {
            AssignmentTarget::Identifier(id) => {
                let value = match assign.operator {
                    None => self.expression(env, &assign.value)?,
                    Some(op) => {
                        let current = self.identifier(env, id)?;
                        let rhs = self.expression(env, &assign.value)?;
                        operators::binary(op, &current, &rhs)
                    }
                };
                env.write(self.heap, &id.name, &value, id.span)
            }
            AssignmentTarget::Member(member) => {
                let object = self.expression(env, &member.object)?;
                let key = self.property_key(env, &member.property)?;
                let value = match assign.operator {
                    None => self.expression(env, &assign.value)?,
                    Some(op) => {
                        let current = self.read_property(&object, &key);
                        let rhs = self.expression(env, &assign.value)?;
                        operators::binary(op, &current, &rhs)
                    }
                };
                self.write_property(&object, &key, &value, member.span)
            }
        }
    }

    fn update(&mut self, env: &mut Environment, update: &UpdateExpression) -> Result<Approx, AnalysisError> {
        let (old, new) = match &update.target {
            AssignmentTarget::Identifier(id) => {
                let current = self.identifier(env, id)?;
                let next = operators::update(update.operator, &current);
                let joined = env.write(self.heap, &id.name, &next, id.span)?;
                (current, joined)
            }
            AssignmentTarget::Member(member) => {
                let object = self.expression(env, &member.object)?;
                let key = self.property_key(env, &member.property)?;
                let current = self.read_property(&object, &key);
                let next = operators::update(update.operator, &current);
                let joined = self.write_property(&object, &key, &next, member.span)?;
                (current, joined)
            }
        };
        Ok(if update.prefix {
            new
        } else {
            operators::to_numeric(&old)
        })
    }

    fn logical(&mut self, env: &mut Environment, logical: &LogicalExpression) -> Result<Approx, AnalysisError> {
        let left = self.expression(env, &logical.left)?;
        if left.is_bottom() {
            return Ok(left);
        }
        let short_circuits = match logical.operator {
            LogicalOp::And => left.truthiness().map(|truthy| !truthy),
            LogicalOp::Or => left.truthiness(),
            LogicalOp::Nullish => nullishness(&left).map(|nullish| !nullish),
        };
        match short_circuits {
            Some(true) => Ok(left),
            Some(false) => self.expression(env, &logical.right),
            None => {
                let right = self.expression(env, &logical.right)?;
                Ok(left.join(&right))
            }
        }
    }

    fn unary(&mut self, env: &mut Environment, unary: &UnaryExpression) -> Result<Approx, AnalysisError> {
        // `typeof undeclared` is not an error
        if unary.operator == UnaryOp::Typeof
            && let Expression::Identifier(id) = &unary.argument
            && env.resolve(&id.name).is_none()
        {
            return Ok(Approx::constant(LiteralValue::from("undefined")));
        }
        let argument = self.expression(env, &unary.argument)?;
        Ok(operators::unary(unary.operator, &argument))
    }

    fn conditional(
        &mut self,
        env: &mut Environment,
        cond: &ConditionalExpression,
    ) -> Result<Approx, AnalysisError> {
        let test = self.expression(env, &cond.test)?;
        match test.truthiness() {
            Some(true) => self.expression(env, &cond.consequent),
            Some(false) => self.expression(env, &cond.alternate),
            None => {
                let consequent = self.expression(env, &cond.consequent)?;
                let alternate = self.expression(env, &cond.alternate)?;
                Ok(consequent.join(&alternate))
            }
        }
    }

    // ========== Objects ==========

    fn object(&mut self, env: &mut Environment, object: &ObjectExpression) -> Result<Approx, AnalysisError> {
        let owner = Approx::reference(self.heap.allocate_object(ObjectId(object.id)));
        for property in &object.properties {
            let key = self.property_key(env, &property.key)?;
            let value = self.expression(env, &property.value)?;
            self.write_property(&owner, &key, &value, object.span)?;
        }
        Ok(owner)
    }

    /// Arrays are objects with an index property per element and a length
    fn array(&mut self, env: &mut Environment, array: &ArrayExpression) -> Result<Approx, AnalysisError> {
        let owner = Approx::reference(self.heap.allocate_object(ObjectId(array.id)));
        for (index, element) in array.elements.iter().enumerate() {
            let Some(element) = element else {
                continue;
            };
            let value = self.expression(env, element)?;
            let key = Key::Name(Rc::from(index.to_string()));
            self.write_property(&owner, &key, &value, array.span)?;
        }
        let length = Approx::constant(LiteralValue::Number(array.elements.len() as f64));
        self.write_property(&owner, &Key::Name(Rc::from("length")), &length, array.span)?;
        Ok(owner)
    }

    fn member(&mut self, env: &mut Environment, member: &MemberExpression) -> Result<Approx, AnalysisError> {
        let object = self.expression(env, &member.object)?;
        let key = self.property_key(env, &member.property)?;
        Ok(self.read_property(&object, &key))
    }

    fn property_key(&mut self, env: &mut Environment, key: &PropertyKey) -> Result<Key, AnalysisError> {
        match key {
            PropertyKey::Static(name) => Ok(Key::Name(Rc::clone(name))),
            PropertyKey::Computed(expr) => {
                let value = self.expression(env, expr)?;
                if value.is_bottom() {
                    return Ok(Key::Never);
                }
                Ok(match value.value.as_primitive().filter(|_| !value.unknown) {
                    Some(p) => Key::Name(p.to_property_key()),
                    None => Key::Any,
                })
            }
        }
    }

    /// Read a property of every object the value may reference. Objects are
    /// open ended: a property that was never written reads as Bottom.
    fn read_property(&self, object: &Approx, key: &Key) -> Approx {
        let mut result = Approx::bottom();
        if matches!(key, Key::Never) {
            return result;
        }
        if object.unknown {
            result.join_in_place(&Approx::unknown());
        }

        match &object.value {
            AbstractValue::Constant(Value::Primitive(p)) => match (p, key) {
                (LiteralValue::String(s), Key::Name(name)) if name.as_ref() == "length" => {
                    let length = s.encode_utf16().count() as f64;
                    result.join_in_place(&Approx::constant(LiteralValue::Number(length)));
                }
                // Throws; contributes no value
                (LiteralValue::Undefined | LiteralValue::Null, _) => {}
                _ => {
                    result.join_in_place(&Approx::top());
                }
            },
            // Some primitive, possibly alongside references
            AbstractValue::Top if object.primitive => {
                result.join_in_place(&Approx::top());
            }
            _ => {}
        }

        for owner in &object.refs {
            match key {
                Key::Name(name) => {
                    if let Some(location) = self.heap.find_property(*owner, name) {
                        result.join_in_place(&self.heap.value(location));
                    }
                }
                Key::Any => {
                    if let Some(properties) = self.heap.object(*owner) {
                        for location in properties.properties.values() {
                            result.join_in_place(&self.heap.value(*location));
                        }
                    }
                    result.join_in_place(&Approx::undefined());
                }
                Key::Never => {}
            }
        }
        result
    }

    /// Join `value` into the property of every object the target may
    /// reference and return what the properties hold afterwards.
    ///
    /// A closure stored under a callback property name is registered with
    /// its owner as `this`. A closure stored into an unknown (host) object
    /// escapes.
    fn write_property(
        &mut self,
        object: &Approx,
        key: &Key,
        value: &Approx,
        span: Option<Span>,
    ) -> Result<Approx, AnalysisError> {
        let name = match key {
            Key::Name(name) => Some(name),
            Key::Never => return Ok(value.clone()),
            Key::Any if !object.refs.is_empty() => {
                return Err(AnalysisError::unsupported(
                    "computed property write with a non-constant key",
                    span,
                ));
            }
            Key::Any => None,
        };
        let is_callback = name.is_some_and(|n| self.config.is_callback_property(n));

        if object.unknown && (is_callback || self.config.escaping_closures_are_callbacks) {
            for closure in value.closures() {
                self.register(Callback {
                    closure,
                    this: None,
                });
            }
        }

        let Some(name) = name.filter(|_| !object.refs.is_empty()) else {
            // Writes to primitives are lost
            return Ok(value.clone());
        };

        let mut result = Approx::bottom();
        for owner in &object.refs {
            let location = self.heap.property(*owner, name);
            result.join_in_place(&self.heap.join_into(location, value));
            if is_callback {
                for closure in value.closures() {
                    self.register(Callback {
                        closure,
                        this: Some(*owner),
                    });
                }
            }
        }
        Ok(result)
    }
}

/// `Some` when the value is certainly (or certainly not) null or undefined
fn nullishness(value: &Approx) -> Option<bool> {
    if value.unknown {
        return None;
    }
    match &value.value {
        AbstractValue::Constant(Value::Primitive(LiteralValue::Undefined | LiteralValue::Null)) => {
            Some(true)
        }
        AbstractValue::Constant(_) => Some(false),
        AbstractValue::Bottom | AbstractValue::Top => None,
    }
}
