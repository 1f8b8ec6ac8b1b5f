mod parser;

use crate::context::{Snapshot, Value};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
	Bool(bool),
	Number(f64),
	String(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	Contains,
	Matches,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Comparison { name: String, op: Op, literal: Literal },
	And(Box<Expr>, Box<Expr>),
	Or(Box<Expr>, Box<Expr>),
	Not(Box<Expr>),
}

/// A parsed transition predicate. Parsing happens once at config-load time;
/// evaluation happens once per transition check.
#[derive(Debug, Clone)]
pub struct Predicate {
	expr: Expr,
	source: String,
}

impl Predicate {
	pub fn parse(source: &str) -> Result<Self, Error> {
		let expr = parser::parse(source).map_err(|e| Error::config(format!("invalid predicate `{source}`: {e}")))?;
		Ok(Predicate { expr, source: source.to_string() })
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn eval(&self, snapshot: &Snapshot) -> bool {
		eval_expr(&self.expr, snapshot)
	}
}

fn eval_expr(expr: &Expr, snapshot: &Snapshot) -> bool {
	match expr {
		Expr::And(lhs, rhs) => eval_expr(lhs, snapshot) && eval_expr(rhs, snapshot),
		Expr::Or(lhs, rhs) => eval_expr(lhs, snapshot) || eval_expr(rhs, snapshot),
		Expr::Not(inner) => !eval_expr(inner, snapshot),
		Expr::Comparison { name, op, literal } => {
			let Some(value) = snapshot.get(name) else {
				tracing::warn!(predicate.variable = name.as_str(), "undefined predicate variable, evaluating to false");
				return false;
			};
			eval_comparison(value, *op, literal)
		}
	}
}

fn eval_comparison(value: &Value, op: Op, literal: &Literal) -> bool {
	match op {
		Op::Contains => value.as_str_rendered().contains(&literal_as_string(literal)),
		Op::Matches => match regex::Regex::new(&literal_as_string(literal)) {
			Ok(re) => re.is_match(&value.as_str_rendered()),
			Err(_) => false,
		},
		_ => match (numeric(value), numeric_literal(literal)) {
			(Some(l), Some(r)) => compare_f64(l, op, r),
			_ => compare_string(&value.as_str_rendered(), op, &literal_as_string(literal)),
		},
	}
}

fn numeric(value: &Value) -> Option<f64> {
	match value {
		Value::Int(i) => Some(*i as f64),
		Value::Float(f) => Some(*f),
		_ => None,
	}
}

fn numeric_literal(literal: &Literal) -> Option<f64> {
	match literal {
		Literal::Number(n) => Some(*n),
		_ => None,
	}
}

fn literal_as_string(literal: &Literal) -> String {
	match literal {
		Literal::Bool(b) => b.to_string(),
		Literal::Number(n) => n.to_string(),
		Literal::String(s) => s.clone(),
	}
}

fn compare_f64(l: f64, op: Op, r: f64) -> bool {
	match op {
		Op::Eq => l == r,
		Op::Ne => l != r,
		Op::Lt => l < r,
		Op::Le => l <= r,
		Op::Gt => l > r,
		Op::Ge => l >= r,
		Op::Contains | Op::Matches => unreachable!(),
	}
}

fn compare_string(l: &str, op: Op, r: &str) -> bool {
	match op {
		Op::Eq => l == r,
		Op::Ne => l != r,
		Op::Lt => l < r,
		Op::Le => l <= r,
		Op::Gt => l > r,
		Op::Ge => l >= r,
		Op::Contains | Op::Matches => unreachable!(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn snapshot(vars: &[(&str, Value)]) -> Snapshot {
		let ctx = crate::context::VariableContext::from_map(vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect::<HashMap<_, _>>());
		ctx.snapshot()
	}

	#[test]
	fn evaluates_simple_equality() {
		let p = Predicate::parse("status == 200").unwrap();
		assert!(p.eval(&snapshot(&[("status", Value::Int(200))])));
		assert!(!p.eval(&snapshot(&[("status", Value::Int(404))])));
	}

	#[test]
	fn evaluates_and_or_not() {
		let p = Predicate::parse("status == 200 and not (body contains \"error\")").unwrap();
		assert!(p.eval(&snapshot(&[("status", Value::Int(200)), ("body", Value::String("ok".into()))])));
		assert!(!p.eval(&snapshot(&[("status", Value::Int(200)), ("body", Value::String("error occurred".into()))])));
	}

	#[test]
	fn undefined_variable_is_falsy() {
		let p = Predicate::parse("missing == 1").unwrap();
		assert!(!p.eval(&snapshot(&[])));
	}
}
