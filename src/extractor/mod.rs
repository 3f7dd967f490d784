//! Closure extractor
//!
//! A single pass over the program that records, for every function literal,
//! its lexical parent and the free variables it reads or writes, and for
//! every scope the names it declares. The interpreter consults the
//! free-variable table to decide which outer locations a new closure captures.
//!
//! The pass also assigns each scope, function and allocation site a
//! human-readable path (`global/outerFn1/x`) used by the reporter.

mod hoist;

use tracing::debug;

use crate::ast::{
    AssignmentTarget, BlockStatement, Expression, ForInit, ForStatement, Function, FunctionBody,
    FunctionId, MemberExpression, Name, NodeId, Program, PropertyKey, Span, Statement,
    SwitchStatement,
};
use crate::error::AnalysisError;
use crate::heap::DeclarationKind;
use crate::prelude::*;

pub use hoist::{for_declarations, lexical_declarations, switch_declarations, var_declarations};

/// Name under which `this` is bound in program and non-arrow function scopes
pub const THIS: &str = "this";

/// Path of the program scope
pub const GLOBAL_PATH: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Block,
}

/// A name made in a scope before any of its statements run
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: Name,
    pub kind: DeclarationKind,
    /// Function declarations are initialized with their closure on entry
    pub function: Option<FunctionId>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct ScopeInfo {
    pub node: NodeId,
    pub kind: ScopeKind,
    pub path: String,
    pub parent: Option<NodeId>,
    /// Function the scope belongs to; `None` for program-level scopes
    pub function: Option<FunctionId>,
    pub declarations: Vec<Declaration>,
    /// Declared names referenced from some nested function
    pub captured: IndexSet<Name>,
}

impl ScopeInfo {
    pub fn declares(&self, name: &str) -> bool {
        self.declarations.iter().any(|d| d.name.as_ref() == name)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub id: FunctionId,
    pub path: String,
    /// Enclosing function, `None` when defined at program level
    pub parent: Option<FunctionId>,
    /// Innermost scope the literal appears in
    pub parent_scope: NodeId,
    /// Names read or written in the body (nested functions included) that
    /// are not declared inside it, in order of first use
    pub free_variables: IndexSet<Name>,
    pub function: Rc<Function>,
}

/// Result of the extraction pass
#[derive(Debug, Clone)]
pub struct StaticInfo {
    program: NodeId,
    functions: Vec<FunctionInfo>,
    scopes: FxHashMap<NodeId, ScopeInfo>,
    implicit_globals: IndexSet<Name>,
    sites: FxHashMap<NodeId, String>,
}

impl StaticInfo {
    pub fn program_scope(&self) -> Result<&ScopeInfo, AnalysisError> {
        self.scopes
            .get(&self.program)
            .ok_or_else(|| AnalysisError::invalid_program("program scope missing", None))
    }

    pub fn function(&self, id: FunctionId) -> Result<&FunctionInfo, AnalysisError> {
        self.functions.get(id.index()).ok_or_else(|| {
            AnalysisError::invalid_program(format!("unknown function #{}", id.0), None)
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionInfo> {
        self.functions.iter()
    }

    pub fn scope(&self, node: NodeId) -> Option<&ScopeInfo> {
        self.scopes.get(&node)
    }

    /// All scopes, ordered by node id (document order)
    pub fn scopes(&self) -> Vec<&ScopeInfo> {
        let mut scopes: Vec<&ScopeInfo> = self.scopes.values().collect();
        scopes.sort_by_key(|s| s.node);
        scopes
    }

    /// Names assigned somewhere without being declared (sloppy-mode globals)
    pub fn implicit_globals(&self) -> &IndexSet<Name> {
        &self.implicit_globals
    }

    /// Description of an object or array literal's allocation site
    pub fn site(&self, node: NodeId) -> Option<&str> {
        self.sites.get(&node).map(|s| s.as_str())
    }

    pub fn is_captured(&self, scope: NodeId, name: &str) -> bool {
        self.scopes
            .get(&scope)
            .is_some_and(|s| s.captured.contains(name))
    }
}

/// Run the extraction pass over a lowered program
pub fn extract(program: &Program) -> Result<StaticInfo, AnalysisError> {
    let mut extractor = Extractor::new(program.function_count);

    let mut declarations = vec![this_declaration()];
    declarations.extend(var_declarations(&program.body));
    declarations.extend(lexical_declarations(&program.body));
    extractor.enter_scope(
        program.id,
        ScopeKind::Program,
        None,
        GLOBAL_PATH.to_string(),
        declarations,
    );
    extractor.statements(&program.body)?;
    extractor.exit_scope();

    extractor.finish(program.id)
}

fn this_declaration() -> Declaration {
    Declaration {
        name: Rc::from(THIS),
        kind: DeclarationKind::This,
        function: None,
        span: None,
    }
}

struct Frame {
    node: NodeId,
    kind: ScopeKind,
    function: Option<FunctionId>,
    path: String,
    names: FxHashSet<Name>,
}

struct Extractor {
    frames: Vec<Frame>,
    scopes: FxHashMap<NodeId, ScopeInfo>,
    functions: Vec<Option<FunctionInfo>>,
    implicit_globals: IndexSet<Name>,
    sites: FxHashMap<NodeId, String>,
    /// Every path handed out so far, for disambiguation
    paths: FxHashSet<String>,
}

impl Extractor {
    fn new(function_count: u32) -> Self {
        Extractor {
            frames: Vec::new(),
            scopes: FxHashMap::default(),
            functions: vec![None; function_count as usize],
            implicit_globals: index_set_new(),
            sites: FxHashMap::default(),
            paths: FxHashSet::default(),
        }
    }

    fn finish(self, program: NodeId) -> Result<StaticInfo, AnalysisError> {
        let Extractor {
            mut scopes,
            functions,
            implicit_globals,
            sites,
            ..
        } = self;

        let functions = functions
            .into_iter()
            .enumerate()
            .map(|(i, info)| {
                info.ok_or_else(|| {
                    AnalysisError::invalid_program(format!("function #{} never defined", i), None)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Implicit globals live in the program scope
        if let Some(global) = scopes.get_mut(&program) {
            for name in &implicit_globals {
                if global.declares(name) {
                    continue;
                }
                global.declarations.push(Declaration {
                    name: Rc::clone(name),
                    kind: DeclarationKind::Var,
                    function: None,
                    span: None,
                });
                if functions.iter().any(|f| f.free_variables.contains(name)) {
                    global.captured.insert(Rc::clone(name));
                }
            }
        }

        debug!(
            functions = functions.len(),
            scopes = scopes.len(),
            implicit_globals = implicit_globals.len(),
            "extraction done"
        );

        Ok(StaticInfo {
            program,
            functions,
            scopes,
            implicit_globals,
            sites,
        })
    }

    // ========== Scopes ==========

    fn enter_scope(
        &mut self,
        node: NodeId,
        kind: ScopeKind,
        function: Option<FunctionId>,
        path: String,
        declarations: Vec<Declaration>,
    ) {
        let names = declarations.iter().map(|d| Rc::clone(&d.name)).collect();
        self.scopes.insert(
            node,
            ScopeInfo {
                node,
                kind,
                path: path.clone(),
                parent: self.frames.last().map(|f| f.node),
                function,
                declarations,
                captured: index_set_new(),
            },
        );
        self.frames.push(Frame {
            node,
            kind,
            function,
            path,
            names,
        });
    }

    fn exit_scope(&mut self) {
        self.frames.pop();
    }

    fn current_path(&self) -> &str {
        self.frames.last().map_or(GLOBAL_PATH, |f| f.path.as_str())
    }

    /// Path of the innermost function (or the program), skipping blocks
    fn function_path(&self) -> &str {
        self.frames
            .iter()
            .rev()
            .find(|f| f.kind != ScopeKind::Block)
            .map_or(GLOBAL_PATH, |f| f.path.as_str())
    }

    fn current_function(&self) -> Option<FunctionId> {
        self.frames.last().and_then(|f| f.function)
    }

    /// Reserve `candidate`, suffixing `#2`, `#3`, ... when already taken
    fn unique_path(&mut self, candidate: String) -> String {
        if self.paths.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 2;
        loop {
            let path = format!("{}#{}", candidate, n);
            if self.paths.insert(path.clone()) {
                return path;
            }
            n += 1;
        }
    }

    // ========== Name resolution ==========

    /// Resolve a reference statically; every function crossed between the
    /// reference and the declaring scope gets `name` as a free variable.
    /// Unresolved names are free in every enclosing function.
    fn reference(&mut self, name: &Name) -> bool {
        let resolved = self.frames.iter().rposition(|f| f.names.contains(name));
        let home = resolved
            .and_then(|i| self.frames.get(i))
            .and_then(|f| f.function);
        let start = resolved.map_or(0, |i| i + 1);

        let mut crossed = false;
        for frame in self.frames.iter().skip(start) {
            if let Some(function) = frame.function
                && Some(function) != home
                && let Some(Some(info)) = self.functions.get_mut(function.index())
            {
                info.free_variables.insert(Rc::clone(name));
                crossed = true;
            }
        }

        if crossed
            && let Some(frame) = resolved.and_then(|i| self.frames.get(i))
            && let Some(scope) = self.scopes.get_mut(&frame.node)
        {
            scope.captured.insert(Rc::clone(name));
        }
        resolved.is_some()
    }

    fn assign_to(&mut self, name: &Name) {
        if !self.reference(name) {
            self.implicit_globals.insert(Rc::clone(name));
        }
    }

    // ========== Statements ==========

    fn statements(&mut self, body: &[Statement]) -> Result<(), AnalysisError> {
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Statement) -> Result<(), AnalysisError> {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                for declarator in &decl.declarations {
                    if let Some(init) = &declarator.init {
                        self.expression(init, Some(&declarator.id.name))?;
                    }
                }
                Ok(())
            }
            Statement::FunctionDeclaration(function) => self.function(function),
            Statement::Expression(stmt) => self.expression(&stmt.expression, None),
            Statement::Block(block) => self.block(block),
            Statement::If(if_stmt) => {
                self.expression(&if_stmt.test, None)?;
                self.statement(&if_stmt.consequent)?;
                if let Some(alt) = &if_stmt.alternate {
                    self.statement(alt)?;
                }
                Ok(())
            }
            Statement::Switch(switch) => self.switch(switch),
            Statement::While(while_stmt) | Statement::DoWhile(while_stmt) => {
                self.expression(&while_stmt.test, None)?;
                self.statement(&while_stmt.body)
            }
            Statement::For(for_stmt) => self.for_statement(for_stmt),
            Statement::Return(ret) => match &ret.argument {
                Some(argument) => self.expression(argument, None),
                None => Ok(()),
            },
            Statement::Break(_) | Statement::Continue(_) | Statement::Empty => Ok(()),
        }
    }

    fn block(&mut self, block: &BlockStatement) -> Result<(), AnalysisError> {
        let declarations = lexical_declarations(&block.body);
        if declarations.is_empty() {
            return self.statements(&block.body);
        }
        let path = self.unique_path(format!("{}/{{block}}", self.current_path()));
        let function = self.current_function();
        self.enter_scope(block.id, ScopeKind::Block, function, path, declarations);
        let result = self.statements(&block.body);
        self.exit_scope();
        result
    }

    fn switch(&mut self, switch: &SwitchStatement) -> Result<(), AnalysisError> {
        self.expression(&switch.discriminant, None)?;
        let declarations = switch_declarations(switch);
        let scoped = !declarations.is_empty();
        if scoped {
            let path = self.unique_path(format!("{}/{{switch}}", self.current_path()));
            let function = self.current_function();
            self.enter_scope(switch.id, ScopeKind::Block, function, path, declarations);
        }

        let result = self.switch_cases(switch);

        if scoped {
            self.exit_scope();
        }
        result
    }

    fn switch_cases(&mut self, switch: &SwitchStatement) -> Result<(), AnalysisError> {
        for case in &switch.cases {
            if let Some(test) = &case.test {
                self.expression(test, None)?;
            }
            self.statements(&case.consequent)?;
        }
        Ok(())
    }

    fn for_statement(&mut self, for_stmt: &ForStatement) -> Result<(), AnalysisError> {
        let declarations = for_declarations(for_stmt);
        let scoped = !declarations.is_empty();
        if scoped {
            let path = self.unique_path(format!("{}/{{for}}", self.current_path()));
            let function = self.current_function();
            self.enter_scope(for_stmt.id, ScopeKind::Block, function, path, declarations);
        }

        let result = self.for_parts(for_stmt);

        if scoped {
            self.exit_scope();
        }
        result
    }

    fn for_parts(&mut self, for_stmt: &ForStatement) -> Result<(), AnalysisError> {
        match &for_stmt.init {
            Some(ForInit::Variable(decl)) => {
                for declarator in &decl.declarations {
                    if let Some(init) = &declarator.init {
                        self.expression(init, Some(&declarator.id.name))?;
                    }
                }
            }
            Some(ForInit::Expression(expr)) => self.expression(expr, None)?,
            None => {}
        }
        if let Some(test) = &for_stmt.test {
            self.expression(test, None)?;
        }
        if let Some(update) = &for_stmt.update {
            self.expression(update, None)?;
        }
        self.statement(&for_stmt.body)
    }

    // ========== Functions ==========

    fn function(&mut self, function: &Rc<Function>) -> Result<(), AnalysisError> {
        let Some(slot) = self.functions.get(function.id.index()) else {
            return Err(AnalysisError::invalid_program(
                format!("function id {} out of range", function.id.0),
                function.span,
            ));
        };
        if slot.is_some() {
            return Err(AnalysisError::invalid_program(
                format!("function id {} defined twice", function.id.0),
                function.span,
            ));
        }

        let label = function
            .display_name()
            .map_or_else(|| "<anonymous>".to_string(), |n| n.to_string());
        let path = self.unique_path(format!("{}/{}", self.function_path(), label));
        let parent_scope = self.frames.last().map_or(NodeId(0), |f| f.node);

        if let Some(slot) = self.functions.get_mut(function.id.index()) {
            *slot = Some(FunctionInfo {
                id: function.id,
                path: path.clone(),
                parent: self.frames.last().and_then(|f| f.function),
                parent_scope,
                free_variables: index_set_new(),
                function: Rc::clone(function),
            });
        }

        let declarations = function_declarations(function);
        self.enter_scope(
            function.node,
            ScopeKind::Function,
            Some(function.id),
            path,
            declarations,
        );
        let result = match &function.body {
            FunctionBody::Block(block) => self.statements(&block.body),
            FunctionBody::Expression(expr) => self.expression(expr, None),
        };
        self.exit_scope();
        result
    }

    // ========== Expressions ==========

    /// `hint` names the binding or property the value is stored into; object
    /// literals use it to describe their allocation site
    fn expression(&mut self, expr: &Expression, hint: Option<&Name>) -> Result<(), AnalysisError> {
        match expr {
            Expression::Literal(_) => Ok(()),
            Expression::Identifier(id) => {
                self.reference(&id.name);
                Ok(())
            }
            Expression::This(_) => {
                self.reference(&Rc::from(THIS));
                Ok(())
            }
            Expression::Assignment(assign) => {
                let hint = self.assignment_target(&assign.target)?;
                self.expression(&assign.value, hint.as_ref())
            }
            Expression::Update(update) => {
                self.assignment_target(&update.target)?;
                Ok(())
            }
            Expression::Binary(bin) => {
                self.expression(&bin.left, None)?;
                self.expression(&bin.right, None)
            }
            Expression::Logical(logical) => {
                self.expression(&logical.left, hint)?;
                self.expression(&logical.right, hint)
            }
            Expression::Unary(unary) => self.expression(&unary.argument, None),
            Expression::Conditional(cond) => {
                self.expression(&cond.test, None)?;
                self.expression(&cond.consequent, hint)?;
                self.expression(&cond.alternate, hint)
            }
            Expression::Sequence(seq) => {
                for e in &seq.expressions {
                    self.expression(e, None)?;
                }
                Ok(())
            }
            Expression::Object(object) => {
                self.allocation_site(object.id, hint, "object", object.span);
                for property in &object.properties {
                    let key = match &property.key {
                        PropertyKey::Static(name) => Some(Rc::clone(name)),
                        PropertyKey::Computed(key) => {
                            self.expression(key, None)?;
                            None
                        }
                    };
                    self.expression(&property.value, key.as_ref())?;
                }
                Ok(())
            }
            Expression::Array(array) => {
                self.allocation_site(array.id, hint, "array", array.span);
                for element in array.elements.iter().flatten() {
                    self.expression(element, None)?;
                }
                Ok(())
            }
            Expression::Member(member) => self.member(member),
            Expression::Call(call) => {
                self.expression(&call.callee, None)?;
                for argument in &call.arguments {
                    self.expression(argument, None)?;
                }
                Ok(())
            }
            Expression::Function(function) => self.function(function),
        }
    }

    /// Walk an assignment target and return the name the stored value is
    /// known by
    fn assignment_target(&mut self, target: &AssignmentTarget) -> Result<Option<Name>, AnalysisError> {
        match target {
            AssignmentTarget::Identifier(id) => {
                self.assign_to(&id.name);
                Ok(Some(Rc::clone(&id.name)))
            }
            AssignmentTarget::Member(member) => {
                self.member(member)?;
                Ok(match &member.property {
                    PropertyKey::Static(name) => Some(Rc::clone(name)),
                    PropertyKey::Computed(_) => None,
                })
            }
        }
    }

    fn member(&mut self, member: &MemberExpression) -> Result<(), AnalysisError> {
        self.expression(&member.object, None)?;
        if let PropertyKey::Computed(key) = &member.property {
            self.expression(key, None)?;
        }
        Ok(())
    }

    fn allocation_site(&mut self, node: NodeId, hint: Option<&Name>, kind: &str, span: Option<Span>) {
        let label = match (hint, span) {
            (Some(name), _) => name.to_string(),
            (None, Some(span)) => format!("{{{}@{}}}", kind, span),
            (None, None) => format!("{{{}}}", kind),
        };
        let path = self.unique_path(format!("{}/{}", self.function_path(), label));
        self.sites.insert(node, path);
    }
}

/// Everything declared in a function's own scope: `this`, parameters,
/// hoisted vars and the body's lexical declarations. A named function
/// expression also sees its own name.
fn function_declarations(function: &Function) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    if !function.is_arrow {
        declarations.push(this_declaration());
    }
    for param in &function.params {
        declarations.push(Declaration {
            name: Rc::clone(&param.name),
            kind: DeclarationKind::Param,
            function: None,
            span: param.span,
        });
    }
    if let FunctionBody::Block(block) = &function.body {
        declarations.extend(var_declarations(&block.body));
        declarations.extend(lexical_declarations(&block.body));
    }
    if !function.is_declaration
        && let Some(name) = &function.name
        && !declarations.iter().any(|d| d.name == *name)
    {
        declarations.push(Declaration {
            name: Rc::clone(name),
            kind: DeclarationKind::Function,
            function: Some(function.id),
            span: function.span,
        });
    }
    declarations
}
