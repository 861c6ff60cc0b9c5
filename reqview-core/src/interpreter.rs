//! Interpreter: evaluates a transform expression against a response.
//!
//! The only free identifier is `response`. There is no assignment, no
//! looping construct and no access to anything outside the bound value, so
//! evaluation is a pure function of the AST and the response.
use std::cmp::Ordering;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::ast::{Arg, BinaryOp, Expr, Lambda, LogicalOp, UnaryOp};

/// Name the response is bound to.
pub const RESPONSE_IDENT: &str = "response";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0} is not defined")]
    UnknownIdentifier(String),

    #[error("Cannot read property '{property}' of null")]
    NullAccess { property: String },

    #[error("{kind}.{method} is not a function")]
    UnknownMethod { kind: &'static str, method: String },

    #[error("{0} is not a function")]
    UnknownFunction(String),

    #[error("{name} expects {expected}")]
    BadArguments { name: String, expected: String },

    #[error("Type error: {0}")]
    Type(String),
}

/// Evaluate `expr` with `response` bound.
pub fn evaluate(expr: &Expr, response: &Value) -> Result<Value, EvalError> {
    let mut env = Env {
        response,
        locals: Vec::new(),
    };
    env.eval(expr)
}

struct Env<'a> {
    response: &'a Value,
    locals: Vec<(String, Value)>,
}

impl Env<'_> {
    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some((_, v)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(v.clone());
        }
        if name == RESPONSE_IDENT {
            return Ok(self.response.clone());
        }
        Err(EvalError::UnknownIdentifier(name.to_string()))
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(items) => items
                .iter()
                .map(|e| self.eval(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (key, e) in fields {
                    map.insert(key.clone(), self.eval(e)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object)?;
                if target.is_null() && *optional {
                    return Ok(Value::Null);
                }
                member(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(object)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
                optional,
            } => {
                let target = self.eval(receiver)?;
                if target.is_null() {
                    if *optional {
                        return Ok(Value::Null);
                    }
                    return Err(EvalError::NullAccess {
                        property: method.clone(),
                    });
                }
                self.call_method(target, method, args)
            }
            Expr::Call { function, args } => self.call_builtin(function, args),
            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                    UnaryOp::Neg => match v.as_f64() {
                        Some(n) => Ok(number_value(-n)),
                        None => Err(EvalError::Type(format!(
                            "cannot negate {}",
                            kind_name(&v)
                        ))),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                binary(*op, &l, &r)
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !truthy(&l),
                    LogicalOp::Or => truthy(&l),
                    LogicalOp::Nullish => !l.is_null(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval(test)?) {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }

    /// Invoke a lambda with positional arguments; missing ones are null.
    fn apply(&mut self, lambda: &Lambda, args: Vec<Value>) -> Result<Value, EvalError> {
        let base = self.locals.len();
        let mut args = args.into_iter();
        for name in &lambda.params {
            self.locals
                .push((name.clone(), args.next().unwrap_or(Value::Null)));
        }
        let result = self.eval(&lambda.body);
        self.locals.truncate(base);
        result
    }

    fn values(&mut self, args: &[Arg], name: &str) -> Result<Vec<Value>, EvalError> {
        args.iter()
            .map(|arg| match arg {
                Arg::Expr(e) => self.eval(e),
                Arg::Lambda(_) => Err(EvalError::BadArguments {
                    name: name.to_string(),
                    expected: "value arguments, not a function".to_string(),
                }),
            })
            .collect()
    }

    fn call_method(&mut self, target: Value, method: &str, args: &[Arg]) -> Result<Value, EvalError> {
        match target {
            Value::Array(items) => self.list_method(items, method, args),
            Value::String(s) => {
                let args = self.values(args, method)?;
                string_method(&s, method, &args)
            }
            other => Err(EvalError::UnknownMethod {
                kind: kind_name(&other),
                method: method.to_string(),
            }),
        }
    }

    fn list_method(&mut self, items: Vec<Value>, method: &str, args: &[Arg]) -> Result<Value, EvalError> {
        match method {
            "map" | "filter" | "find" | "some" | "every" => {
                let lambda = lambda_arg(method, args)?;
                let mut out = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    let result = self.apply(lambda, vec![item.clone(), Value::from(i)])?;
                    match method {
                        "map" => out.push(result),
                        "filter" if truthy(&result) => out.push(item),
                        "find" if truthy(&result) => return Ok(item),
                        "some" if truthy(&result) => return Ok(Value::Bool(true)),
                        "every" if !truthy(&result) => return Ok(Value::Bool(false)),
                        _ => {}
                    }
                }
                match method {
                    "find" => Ok(Value::Null),
                    "some" => Ok(Value::Bool(false)),
                    "every" => Ok(Value::Bool(true)),
                    _ => Ok(Value::Array(out)),
                }
            }
            "slice" => {
                let args = self.values(args, method)?;
                let (start, end) = slice_bounds(items.len(), &args, method)?;
                Ok(Value::Array(items[start..end].to_vec()))
            }
            "join" => {
                let args = self.values(args, method)?;
                let sep = match args.first() {
                    None => ",".to_string(),
                    Some(Value::String(s)) => s.clone(),
                    Some(_) => return Err(bad_args("join", "a string separator")),
                };
                let parts: Vec<String> = items.iter().map(display_string).collect();
                Ok(Value::String(parts.join(&sep)))
            }
            "includes" => {
                let args = self.values(args, method)?;
                let needle = args.first().ok_or_else(|| bad_args("includes", "one argument"))?;
                Ok(Value::Bool(items.iter().any(|v| loose_equal(v, needle))))
            }
            "reverse" => {
                let mut items = items;
                items.reverse();
                Ok(Value::Array(items))
            }
            "sort" => {
                let mut items = items;
                items.sort_by(compare_values);
                Ok(Value::Array(items))
            }
            "flat" => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Array(inner) => out.extend(inner),
                        other => out.push(other),
                    }
                }
                Ok(Value::Array(out))
            }
            other => Err(EvalError::UnknownMethod {
                kind: "list",
                method: other.to_string(),
            }),
        }
    }

    fn call_builtin(&mut self, function: &str, args: &[Arg]) -> Result<Value, EvalError> {
        if !BUILTINS.contains(&function) {
            return Err(EvalError::UnknownFunction(function.to_string()));
        }
        let args = self.values(args, function)?;
        let [arg] = args.as_slice() else {
            return Err(bad_args(function, "exactly one argument"));
        };
        match function {
            "keys" => object_arg(function, arg)
                .map(|m| Value::Array(m.keys().cloned().map(Value::String).collect())),
            "values" => object_arg(function, arg).map(|m| Value::Array(m.values().cloned().collect())),
            "entries" => object_arg(function, arg).map(|m| {
                Value::Array(
                    m.iter()
                        .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
                        .collect(),
                )
            }),
            "count" => match arg {
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                _ => Err(bad_args(function, "a list or object")),
            },
            "sum" => {
                let Value::Array(items) = arg else {
                    return Err(bad_args(function, "a list of numbers"));
                };
                let mut total = 0.0;
                for item in items {
                    total += item.as_f64().ok_or_else(|| bad_args(function, "a list of numbers"))?;
                }
                Ok(number_value(total))
            }
            "number" => Ok(match arg {
                Value::Number(_) => arg.clone(),
                Value::Bool(b) => Value::from(u8::from(*b)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(number_value)
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            }),
            _ => Ok(Value::String(display_string(arg))),
        }
    }
}

const BUILTINS: [&str; 7] = ["keys", "values", "entries", "count", "sum", "number", "string"];

fn bad_args(name: &str, expected: &str) -> EvalError {
    EvalError::BadArguments {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

fn lambda_arg<'a>(method: &str, args: &'a [Arg]) -> Result<&'a Lambda, EvalError> {
    match args {
        [Arg::Lambda(lambda)] => Ok(lambda),
        _ => Err(bad_args(method, "a single arrow function, e.g. x => x.id")),
    }
}

fn object_arg<'a>(name: &str, v: &'a Value) -> Result<&'a Map<String, Value>, EvalError> {
    v.as_object().ok_or_else(|| bad_args(name, "an object"))
}

fn member(target: &Value, property: &str) -> Result<Value, EvalError> {
    match target {
        Value::Null => Err(EvalError::NullAccess {
            property: property.to_string(),
        }),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) if property == "length" => Ok(Value::from(items.len())),
        Value::String(s) if property == "length" => Ok(Value::from(s.chars().count())),
        _ => Ok(Value::Null),
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Null, _) => Err(EvalError::NullAccess {
            property: display_string(index),
        }),
        (Value::Array(items), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        (Value::Array(_) | Value::String(_), Value::String(key)) => match array_index(key) {
            Some(i) => index_value(target, &Value::from(i)),
            None => member(target, key),
        },
        (_, Value::String(key)) => member(target, key),
        _ => Err(EvalError::Type(format!(
            "cannot index {} with {}",
            kind_name(target),
            kind_name(index)
        ))),
    }
}

/// A string key that names a list position, in canonical form only
/// (`"2"`, not `"02"` or `"+2"`).
fn array_index(key: &str) -> Option<u64> {
    key.parse::<u64>().ok().filter(|i| i.to_string() == key)
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    let str_arg = |i: usize| -> Result<&str, EvalError> {
        args.get(i)
            .and_then(Value::as_str)
            .ok_or_else(|| bad_args(method, "a string argument"))
    };
    match method {
        "includes" => Ok(Value::Bool(s.contains(str_arg(0)?))),
        "startsWith" => Ok(Value::Bool(s.starts_with(str_arg(0)?))),
        "endsWith" => Ok(Value::Bool(s.ends_with(str_arg(0)?))),
        "toUpperCase" => Ok(Value::String(s.to_uppercase())),
        "toLowerCase" => Ok(Value::String(s.to_lowercase())),
        "trim" => Ok(Value::String(s.trim().to_string())),
        "split" => Ok(Value::Array(
            s.split(str_arg(0)?)
                .map(|part| Value::String(part.to_string()))
                .collect(),
        )),
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), args, method)?;
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        other => Err(EvalError::UnknownMethod {
            kind: "string",
            method: other.to_string(),
        }),
    }
}

/// JS-style `slice(start?, end?)` with negative offsets counted from the end.
fn slice_bounds(len: usize, args: &[Value], method: &str) -> Result<(usize, usize), EvalError> {
    let resolve = |v: Option<&Value>, default: usize| -> Result<usize, EvalError> {
        let Some(v) = v else {
            return Ok(default);
        };
        let n = v
            .as_f64()
            .ok_or_else(|| bad_args(method, "numeric bounds"))?
            .trunc();
        let len = len as f64;
        let clamped = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
        Ok(clamped as usize)
    };
    let start = resolve(args.first(), 0)?;
    let end = resolve(args.get(1), len)?;
    Ok((start, end.max(start)))
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loose_equal(l, r))),
        BinaryOp::NotEq => return Ok(Value::Bool(!loose_equal(l, r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (l, r) {
                (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
                    Some(compare_values(l, r))
                }
                _ => None,
            };
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o == Ordering::Less,
                BinaryOp::Le => o != Ordering::Greater,
                BinaryOp::Gt => o == Ordering::Greater,
                _ => o != Ordering::Less,
            });
            return Ok(Value::Bool(result));
        }
        BinaryOp::Add if l.is_string() || r.is_string() => {
            return Ok(Value::String(display_string(l) + &display_string(r)));
        }
        _ => {}
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(EvalError::Type(format!(
            "cannot apply '{}' to {} and {}",
            op,
            kind_name(l),
            kind_name(r)
        )));
    };
    let n = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(number_value(n))
}

/// Structural equality where `1 == 1.0`.
fn loose_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| loose_equal(v, w)))
        }
        _ => l == r,
    }
}

/// Total order used by `sort()`: null < bool < number < string < list < object.
fn compare_values(l: &Value, r: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(l).cmp(&rank(r)),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Text form used by `+`, `join` and `string()`: strings unquoted,
/// everything else as compact JSON.
pub fn display_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integral results become JSON integers so `3` stays `3`, not `3.0`.
/// Non-finite results (division by zero) become `null`.
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn run(src: &str, response: Value) -> Result<Value, EvalError> {
        let expr = parse_expression(src).expect("expression should parse");
        evaluate(&expr, &response)
    }

    #[test]
    fn test_eval_length() {
        assert_eq!(run("response.rows.length", json!({"rows": [1, 2, 3]})).unwrap(), json!(3));
    }

    #[test]
    fn test_eval_missing_property_is_null() {
        assert_eq!(run("response.missing", json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_eval_null_access_errors() {
        let err = run("response.missing.deeper", json!({})).unwrap_err();
        assert_eq!(
            err,
            EvalError::NullAccess {
                property: "deeper".to_string()
            }
        );
        assert_eq!(err.to_string(), "Cannot read property 'deeper' of null");
    }

    #[test]
    fn test_eval_numeric_string_index() {
        let data = json!({"items": ["a", "b", "c"], "name": "xyz"});
        assert_eq!(run("response.items['1']", data.clone()).unwrap(), json!("b"));
        assert_eq!(run("response.name['2']", data.clone()).unwrap(), json!("z"));
        assert_eq!(run("response.items['length']", data.clone()).unwrap(), json!(3));
        assert_eq!(run("response.items['01']", data.clone()).unwrap(), Value::Null);
        assert_eq!(run("response.items['9']", data).unwrap(), Value::Null);
    }

    #[test]
    fn test_eval_optional_chaining() {
        assert_eq!(run("response.missing?.deeper", json!({})).unwrap(), Value::Null);
        assert_eq!(run("response.missing?.map(x => x)", json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_eval_map_filter_with_index() {
        let data = json!({"items": [{"id": 1, "on": true}, {"id": 2, "on": false}, {"id": 3, "on": true}]});
        assert_eq!(
            run("response.items.filter(x => x.on).map(x => x.id * 10)", data.clone()).unwrap(),
            json!([10, 30])
        );
        assert_eq!(
            run("response.items.map((x, i) => i)", data.clone()).unwrap(),
            json!([0, 1, 2])
        );
        assert_eq!(
            run("response.items.find(x => x.id == 2).on", data).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_eval_object_and_array_literals() {
        let data = json!({"user": {"first": "Ada", "last": "Lovelace", "age": 36}});
        assert_eq!(
            run(
                "{name: response.user.first + ' ' + response.user.last, tags: [1, 'two']}",
                data
            )
            .unwrap(),
            json!({"name": "Ada Lovelace", "tags": [1, "two"]})
        );
    }

    #[test]
    fn test_eval_lambda_shadows_response() {
        let data = json!({"xs": [1, 2]});
        assert_eq!(run("response.xs.map(response => response + 1)", data).unwrap(), json!([2, 3]));
    }

    #[test]
    fn test_eval_logical_and_conditional() {
        let data = json!({"a": 0, "b": "x", "c": null});
        assert_eq!(run("response.a || response.b", data.clone()).unwrap(), json!("x"));
        assert_eq!(run("response.a && response.b", data.clone()).unwrap(), json!(0));
        assert_eq!(run("response.c ?? 'dflt'", data.clone()).unwrap(), json!("dflt"));
        assert_eq!(run("response.a ?? 'dflt'", data.clone()).unwrap(), json!(0));
        assert_eq!(run("response.b === 'x' ? 1 : 2", data).unwrap(), json!(1));
    }

    #[test]
    fn test_eval_arithmetic() {
        let data = json!({});
        assert_eq!(run("7 / 2", data.clone()).unwrap(), json!(3.5));
        assert_eq!(run("7 % 4 - -1", data.clone()).unwrap(), json!(4));
        assert_eq!(run("1 / 0", data.clone()).unwrap(), Value::Null);
        assert!(matches!(run("[] * 2", data).unwrap_err(), EvalError::Type(_)));
    }

    #[test]
    fn test_eval_builtins() {
        let data = json!({"b": 2, "a": [1, 2, 3.5]});
        assert_eq!(run("keys(response)", data.clone()).unwrap(), json!(["b", "a"]));
        assert_eq!(run("sum(response.a)", data.clone()).unwrap(), json!(6.5));
        assert_eq!(run("count(response.a)", data.clone()).unwrap(), json!(3));
        assert_eq!(run("entries(response)[0]", data.clone()).unwrap(), json!(["b", 2]));
        assert_eq!(run("number('42')", data.clone()).unwrap(), json!(42));
        assert_eq!(run("string(response.b)", data).unwrap(), json!("2"));
    }

    #[test]
    fn test_eval_list_and_string_methods() {
        let data = json!({"xs": [3, 1, 2], "s": " Hello,World "});
        assert_eq!(run("response.xs.sort()", data.clone()).unwrap(), json!([1, 2, 3]));
        assert_eq!(run("response.xs.slice(-2)", data.clone()).unwrap(), json!([1, 2]));
        assert_eq!(run("response.xs.join('-')", data.clone()).unwrap(), json!("3-1-2"));
        assert_eq!(run("response.xs.includes(2.0)", data.clone()).unwrap(), json!(true));
        assert_eq!(run("[[1], 2, [3, 4]].flat()", data.clone()).unwrap(), json!([1, 2, 3, 4]));
        assert_eq!(
            run("response.s.trim().toLowerCase().split(',')", data.clone()).unwrap(),
            json!(["hello", "world"])
        );
        assert_eq!(run("response.s.trim().slice(0, 5)", data).unwrap(), json!("Hello"));
    }

    #[test]
    fn test_eval_unknown_names() {
        let data = json!({"xs": []});
        assert_eq!(
            run("window", data.clone()).unwrap_err(),
            EvalError::UnknownIdentifier("window".to_string())
        );
        assert_eq!(
            run("fetch('http://evil')", data.clone()).unwrap_err(),
            EvalError::UnknownFunction("fetch".to_string())
        );
        assert!(matches!(
            run("response.xs.push(1)", data).unwrap_err(),
            EvalError::UnknownMethod { kind: "list", .. }
        ));
    }

    #[test]
    fn test_eval_method_requires_lambda() {
        let err = run("response.xs.map(1)", json!({"xs": [1]})).unwrap_err();
        assert!(matches!(err, EvalError::BadArguments { .. }));
    }
}
