//! Integration tests for the analyzer, organized by component
//!
//! Programs are written as ESTree documents with the builders below, the
//! same shape esprima or acorn would emit for the equivalent source.

#![allow(clippy::unwrap_used, clippy::panic)]

mod environment;
mod errors;
mod lattice;
mod reporter;
mod scheduler;
mod transform;

use jsabsint::{Analysis, AnalysisError, Analyzer, AnalyzerConfig, Classification, Constant, LiteralValue};
use serde_json::{Value, json};

// ============ ESTree builders ============

pub fn program(body: Vec<Value>) -> Value {
    json!({"type": "Program", "sourceType": "script", "body": body})
}

pub fn ident(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

pub fn num(n: f64) -> Value {
    json!({"type": "Literal", "value": n})
}

pub fn string(s: &str) -> Value {
    json!({"type": "Literal", "value": s})
}

pub fn boolean(b: bool) -> Value {
    json!({"type": "Literal", "value": b})
}

pub fn null() -> Value {
    json!({"type": "Literal", "value": null, "raw": "null"})
}

pub fn undefined() -> Value {
    ident("undefined")
}

pub fn this() -> Value {
    json!({"type": "ThisExpression"})
}

fn declaration(kind: &str, name: &str, init: Value) -> Value {
    json!({
        "type": "VariableDeclaration",
        "kind": kind,
        "declarations": [{"type": "VariableDeclarator", "id": ident(name), "init": init}]
    })
}

pub fn var(name: &str, init: Value) -> Value {
    declaration("var", name, init)
}

/// `var name;`
pub fn var_uninit(name: &str) -> Value {
    declaration("var", name, Value::Null)
}

pub fn let_(name: &str, init: Value) -> Value {
    declaration("let", name, init)
}

pub fn const_(name: &str, init: Value) -> Value {
    declaration("const", name, init)
}

pub fn expr(expression: Value) -> Value {
    json!({"type": "ExpressionStatement", "expression": expression})
}

pub fn assign(target: Value, value: Value) -> Value {
    assign_op("=", target, value)
}

pub fn assign_op(operator: &str, target: Value, value: Value) -> Value {
    json!({"type": "AssignmentExpression", "operator": operator, "left": target, "right": value})
}

/// `target = value;`
pub fn set(target: Value, value: Value) -> Value {
    expr(assign(target, value))
}

pub fn member(object: Value, property: &str) -> Value {
    json!({"type": "MemberExpression", "computed": false, "object": object, "property": ident(property)})
}

pub fn computed(object: Value, key: Value) -> Value {
    json!({"type": "MemberExpression", "computed": true, "object": object, "property": key})
}

pub fn call(callee: Value, arguments: Vec<Value>) -> Value {
    json!({"type": "CallExpression", "callee": callee, "arguments": arguments})
}

fn params(names: &[&str]) -> Vec<Value> {
    names.iter().map(|n| ident(n)).collect()
}

pub fn function(name: Option<&str>, parameters: &[&str], body: Vec<Value>) -> Value {
    json!({
        "type": "FunctionExpression",
        "id": name.map(ident),
        "params": params(parameters),
        "body": block(body),
        "generator": false,
        "async": false
    })
}

pub fn function_decl(name: &str, parameters: &[&str], body: Vec<Value>) -> Value {
    json!({
        "type": "FunctionDeclaration",
        "id": ident(name),
        "params": params(parameters),
        "body": block(body),
        "generator": false,
        "async": false
    })
}

/// Arrow function with a concise body
pub fn arrow(parameters: &[&str], body: Value) -> Value {
    json!({
        "type": "ArrowFunctionExpression",
        "id": null,
        "params": params(parameters),
        "body": body,
        "expression": true
    })
}

pub fn ret(argument: Value) -> Value {
    json!({"type": "ReturnStatement", "argument": argument})
}

pub fn block(body: Vec<Value>) -> Value {
    json!({"type": "BlockStatement", "body": body})
}

pub fn if_(test: Value, consequent: Vec<Value>, alternate: Option<Vec<Value>>) -> Value {
    json!({
        "type": "IfStatement",
        "test": test,
        "consequent": block(consequent),
        "alternate": alternate.map(block)
    })
}

/// `cases` pairs a test (`None` for `default`) with its consequent
pub fn switch_(discriminant: Value, cases: Vec<(Option<Value>, Vec<Value>)>) -> Value {
    let cases: Vec<Value> = cases
        .into_iter()
        .map(|(test, consequent)| json!({"type": "SwitchCase", "test": test, "consequent": consequent}))
        .collect();
    json!({"type": "SwitchStatement", "discriminant": discriminant, "cases": cases})
}

pub fn while_(test: Value, body: Vec<Value>) -> Value {
    json!({"type": "WhileStatement", "test": test, "body": block(body)})
}

pub fn for_(init: Value, test: Value, update: Value, body: Vec<Value>) -> Value {
    json!({"type": "ForStatement", "init": init, "test": test, "update": update, "body": block(body)})
}

pub fn brk() -> Value {
    json!({"type": "BreakStatement", "label": null})
}

pub fn binary(operator: &str, left: Value, right: Value) -> Value {
    json!({"type": "BinaryExpression", "operator": operator, "left": left, "right": right})
}

pub fn logical(operator: &str, left: Value, right: Value) -> Value {
    json!({"type": "LogicalExpression", "operator": operator, "left": left, "right": right})
}

pub fn unary(operator: &str, argument: Value) -> Value {
    json!({"type": "UnaryExpression", "operator": operator, "prefix": true, "argument": argument})
}

pub fn update(operator: &str, prefix: bool, argument: Value) -> Value {
    json!({"type": "UpdateExpression", "operator": operator, "prefix": prefix, "argument": argument})
}

pub fn conditional(test: Value, consequent: Value, alternate: Value) -> Value {
    json!({"type": "ConditionalExpression", "test": test, "consequent": consequent, "alternate": alternate})
}

pub fn object(properties: Vec<(&str, Value)>) -> Value {
    let properties: Vec<Value> = properties
        .into_iter()
        .map(|(key, value)| {
            json!({
                "type": "Property",
                "key": ident(key),
                "computed": false,
                "value": value,
                "kind": "init"
            })
        })
        .collect();
    json!({"type": "ObjectExpression", "properties": properties})
}

pub fn array(elements: Vec<Value>) -> Value {
    json!({"type": "ArrayExpression", "elements": elements})
}

/// Attach a source location the way esprima does with `loc: true`
pub fn at(mut node: Value, line: u32, column: u32) -> Value {
    if let Some(map) = node.as_object_mut() {
        map.insert(
            "loc".to_string(),
            json!({"start": {"line": line, "column": column}, "end": {"line": line, "column": column + 1}}),
        );
    }
    node
}

// ============ Running ============

pub fn analyze(body: Vec<Value>) -> Analysis {
    Analyzer::new().analyze_value(&program(body)).unwrap()
}

pub fn analyze_result(body: Vec<Value>) -> Result<Analysis, AnalysisError> {
    Analyzer::new().analyze_value(&program(body))
}

pub fn analyze_with(config: AnalyzerConfig, body: Vec<Value>) -> Result<Analysis, AnalysisError> {
    Analyzer::with_config(config).analyze_value(&program(body))
}

/// Defaults plus the `foo` host function the callback fixture calls
pub fn host_config() -> AnalyzerConfig {
    AnalyzerConfig::default().with_externals(["foo"])
}

pub fn analyze_fixture(name: &str, config: AnalyzerConfig) -> Analysis {
    Analyzer::with_config(config).analyze_json(&fixture(name)).unwrap()
}

pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(path).unwrap()
}

// ============ Report assertions ============

pub fn constant_number(n: f64) -> Classification {
    Classification::Constant(Constant::Literal(LiteralValue::Number(n)))
}

pub fn constant_string(s: &str) -> Classification {
    Classification::Constant(Constant::Literal(LiteralValue::from(s)))
}

pub fn classification<'a>(analysis: &'a Analysis, description: &str) -> &'a Classification {
    match analysis.report().get(description) {
        Some(c) => c,
        None => {
            let known: Vec<&String> = analysis.report().iter().map(|(d, _)| d).collect();
            panic!("{} not reported; report has {:?}", description, known)
        }
    }
}
