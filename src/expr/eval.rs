//! Evaluates a parsed `Expr` against a `Context`. Kept separate from the
//! grammar's `Parser` so that re-evaluating the same guardrail/filter
//! expression against different contexts — the common case for a
//! `Subscribe.filter` checked on every incoming fact — never touches the
//! message AST.

use super::{BinaryOp, Context, Expr};
use crate::error::Error;
use crate::value::Value;
use std::collections::BTreeMap;

/// Parse and evaluate an expression string in one step.
pub fn evaluate(expr_text: &str, ctx: &dyn Context) -> Result<Value, Error> {
    let expr = super::parse_expr(expr_text)
        .map_err(|e| Error::InvalidExpression(format!("{}:{}: {}", e.line, e.column, e.message)))?;
    Evaluator.eval(&expr, ctx)
}

/// Stateless evaluator — all state lives in the `Context` passed per call.
pub struct Evaluator;

impl Evaluator {
    pub fn eval(&self, expr: &Expr, ctx: &dyn Context) -> Result<Value, Error> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Path(p) => Ok(ctx.get(p).unwrap_or(Value::Null)),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, ctx)?);
                }
                Ok(Value::List(out))
            }
            Expr::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.eval(v, ctx)?);
                }
                Ok(Value::Object(out))
            }
            Expr::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs, ctx),
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        ctx: &dyn Context,
    ) -> Result<Value, Error> {
        match op {
            BinaryOp::Or => {
                let left = self.eval(lhs, ctx)?;
                if left.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
                let right = self.eval(rhs, ctx)?;
                Ok(Value::Boolean(right.is_truthy()))
            }
            BinaryOp::And => {
                let left = self.eval(lhs, ctx)?;
                if !left.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
                let right = self.eval(rhs, ctx)?;
                Ok(Value::Boolean(right.is_truthy()))
            }
            BinaryOp::Eq => {
                let left = self.eval(lhs, ctx)?;
                let right = self.eval(rhs, ctx)?;
                Ok(Value::Boolean(values_equal(&left, &right)))
            }
            BinaryOp::Ne => {
                let left = self.eval(lhs, ctx)?;
                let right = self.eval(rhs, ctx)?;
                Ok(Value::Boolean(!values_equal(&left, &right)))
            }
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => {
                let left = self.eval(lhs, ctx)?;
                let right = self.eval(rhs, ctx)?;
                let (a, b) = as_ordered_pair(&left, &right)?;
                let result = match op {
                    BinaryOp::Gt => a > b,
                    BinaryOp::Lt => a < b,
                    BinaryOp::Ge => a >= b,
                    BinaryOp::Le => a <= b,
                    _ => unreachable!(),
                };
                Ok(Value::Boolean(result))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let left = self.eval(lhs, ctx)?;
                let right = self.eval(rhs, ctx)?;
                let a = left
                    .as_f64()
                    .ok_or_else(|| Error::InvalidExpression(format!("not a number: {left}")))?;
                let b = right
                    .as_f64()
                    .ok_or_else(|| Error::InvalidExpression(format!("not a number: {right}")))?;
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => {
                        if b == 0.0 {
                            return Err(Error::DivisionByZero);
                        }
                        a / b
                    }
                    _ => unreachable!(),
                };
                Ok(Value::Float(result))
            }
        }
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn as_ordered_pair(a: &Value, b: &Value) -> Result<(f64, f64), Error> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Error::InvalidExpression(format!(
            "ordering requires numeric operands, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Equality per the protocol's rules: both-null is equal, null vs non-null
/// is never equal, numbers compare as doubles regardless of int/float
/// tagging, everything else compares by tagged-variant value equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// In-memory `Context` over a flat root map whose values may themselves be
/// `Value::Object`s, giving dotted paths (`agent.status`) real nesting
/// without the caller hand-building a tree. The convenience default for
/// callers/tests that don't need a richer backing store.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    root: BTreeMap<String, Value>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(root: BTreeMap<String, Value>) -> Self {
        Self { root }
    }
}

impl Context for MapContext {
    fn get(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?.clone();
        for segment in segments {
            current = match current {
                Value::Object(ref map) => match map.get(segment) {
                    Some(v) => v.clone(),
                    None => Value::Null,
                },
                _ => Value::Null,
            };
        }
        Some(current)
    }

    fn has(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    fn set(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop().expect("split always yields at least one segment");
        if segments.is_empty() {
            self.root.insert(last.to_string(), value);
            return;
        }
        let mut current = &mut self.root;
        let mut owned_chain: Vec<String> = Vec::new();
        for seg in &segments {
            owned_chain.push(seg.to_string());
            let entry = current
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(BTreeMap::new()));
            if !matches!(entry, Value::Object(_)) {
                *entry = Value::Object(BTreeMap::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => unreachable!(),
            };
        }
        current.insert(last.to_string(), value);
    }

    fn as_map(&self) -> BTreeMap<String, Value> {
        self.root.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guardrail_above_threshold_passes() {
        let mut ctx = MapContext::new();
        ctx.set("balance", Value::Integer(1500));
        let result = evaluate("balance>1000", &ctx).unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn guardrail_below_threshold_fails() {
        let mut ctx = MapContext::new();
        ctx.set("balance", Value::Integer(500));
        let result = evaluate("balance>1000", &ctx).unwrap();
        assert_eq!(result, Value::Boolean(false));
    }

    #[test]
    fn division_by_zero_is_a_typed_error() {
        let ctx = MapContext::new();
        let err = evaluate("1/0", &ctx).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero));
    }

    #[test]
    fn ordering_requires_numeric_operands() {
        let ctx = MapContext::new();
        let err = evaluate("\"a\">\"b\"", &ctx).unwrap_err();
        assert!(matches!(err, Error::InvalidExpression(_)));
    }

    #[test]
    fn integer_and_float_compare_equal_as_doubles() {
        let ctx = MapContext::new();
        let result = evaluate("1==1.0", &ctx).unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn null_never_equals_non_null() {
        let ctx = MapContext::new();
        assert_eq!(
            evaluate("null==0", &ctx).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(
            evaluate("null==null", &ctx).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn nested_path_resolves_through_objects() {
        let mut ctx = MapContext::new();
        ctx.set("agent.status", Value::String("ready".into()));
        assert_eq!(
            evaluate("agent.status==\"ready\"", &ctx).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(ctx.get("agent.missing"), Some(Value::Null));
    }

    #[test]
    fn short_circuit_or_skips_right_side() {
        let mut ctx = MapContext::new();
        ctx.set("flag", Value::Boolean(true));
        // Division by zero on the right would error if evaluated; short
        // circuit means it never runs.
        let result = evaluate("flag||1/0==0", &ctx).unwrap();
        assert_eq!(result, Value::Boolean(true));
    }
}
