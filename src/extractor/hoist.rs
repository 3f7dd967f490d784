//! Declaration collection
//!
//! `var` declarations are hoisted to the enclosing function (or program)
//! scope; `let`, `const` and function declarations belong to the statement
//! list they appear in. Neither walk descends into function bodies, which
//! open scopes of their own.

use super::Declaration;
use crate::ast::{
    ForInit, ForStatement, Statement, SwitchStatement, VariableDeclaration, VariableKind,
};
use crate::heap::DeclarationKind;
use crate::prelude::*;

/// Recursively collect all `var` declarations of a function or program body
pub fn var_declarations(statements: &[Statement]) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for stmt in statements {
        collect_vars_stmt(stmt, &mut declarations);
    }
    declarations
}

fn collect_vars_stmt(stmt: &Statement, out: &mut Vec<Declaration>) {
    match stmt {
        Statement::VariableDeclaration(decl) => {
            if decl.kind == VariableKind::Var {
                collect_declarators(decl, out);
            }
        }

        // Vars hoist out of blocks and control flow
        Statement::Block(block) => {
            for s in block.body.iter() {
                collect_vars_stmt(s, out);
            }
        }

        Statement::If(if_stmt) => {
            collect_vars_stmt(&if_stmt.consequent, out);
            if let Some(ref alt) = if_stmt.alternate {
                collect_vars_stmt(alt, out);
            }
        }

        Statement::Switch(switch) => {
            for s in switch.cases.iter().flat_map(|case| case.consequent.iter()) {
                collect_vars_stmt(s, out);
            }
        }

        Statement::While(while_stmt) | Statement::DoWhile(while_stmt) => {
            collect_vars_stmt(&while_stmt.body, out);
        }

        Statement::For(for_stmt) => {
            if let Some(ForInit::Variable(decl)) = &for_stmt.init
                && decl.kind == VariableKind::Var
            {
                collect_declarators(decl, out);
            }
            collect_vars_stmt(&for_stmt.body, out);
        }

        // Function declarations are collected by the lexical walk; their
        // bodies are separate scopes
        Statement::FunctionDeclaration(_)
        | Statement::Expression(_)
        | Statement::Return(_)
        | Statement::Break(_)
        | Statement::Continue(_)
        | Statement::Empty => {}
    }
}

/// `let`, `const` and function declarations made directly in a statement list
pub fn lexical_declarations(statements: &[Statement]) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for stmt in statements {
        match stmt {
            Statement::VariableDeclaration(decl) if decl.kind.is_lexical() => {
                collect_declarators(decl, &mut declarations);
            }
            Statement::FunctionDeclaration(function) => {
                if let Some(name) = &function.name {
                    declarations.push(Declaration {
                        name: Rc::clone(name),
                        kind: DeclarationKind::Function,
                        function: Some(function.id),
                        span: function.span,
                    });
                }
            }
            _ => {}
        }
    }
    declarations
}

/// `let`/`const` declared in a `for` initializer
pub fn for_declarations(for_stmt: &ForStatement) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    if let Some(ForInit::Variable(decl)) = &for_stmt.init
        && decl.kind.is_lexical()
    {
        collect_declarators(decl, &mut declarations);
    }
    declarations
}

/// Lexical declarations of every case; a switch body is one block
pub fn switch_declarations(switch: &SwitchStatement) -> Vec<Declaration> {
    switch
        .cases
        .iter()
        .flat_map(|case| lexical_declarations(&case.consequent))
        .collect()
}

fn collect_declarators(decl: &VariableDeclaration, out: &mut Vec<Declaration>) {
    let kind = match decl.kind {
        VariableKind::Var => DeclarationKind::Var,
        VariableKind::Let => DeclarationKind::Let,
        VariableKind::Const => DeclarationKind::Const,
    };
    for declarator in &decl.declarations {
        out.push(Declaration {
            name: Rc::clone(&declarator.id.name),
            kind,
            function: None,
            span: declarator.id.span.or(decl.span),
        });
    }
}
