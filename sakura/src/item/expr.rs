//! Expressions used by control-flow items.
//!
//! The expression surface is deliberately small: a literal or a name looked
//! up in the environment. Comparisons exist only inside `if` conditions.
//! Richer computation belongs in blossom handlers, not in the script.

use std::fmt;

use thiserror::Error;

use crate::value::{Value, ValueMap};

/// Evaluation failure inside an `if`, `for` or `for-each` head.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("undefined name \"{0}\"")]
    UndefinedName(String),
    #[error("cannot compare {left} with {right} using \"{op}\"")]
    IncomparableTypes {
        left: &'static str,
        right: &'static str,
        op: Comparator,
    },
    #[error("expected {expected} but found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// A literal value or a name resolved against the environment.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Value),
    Ident(String),
}

impl Expression {
    /// Evaluates to a value, deep-copying out of the environment.
    pub fn evaluate(&self, env: &ValueMap) -> Result<Value, EvalError> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Ident(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedName(name.clone())),
        }
    }

    /// Evaluates and requires an integer result.
    pub fn evaluate_int(&self, env: &ValueMap) -> Result<i64, EvalError> {
        let value = self.evaluate(env)?;
        value.as_int().ok_or(EvalError::TypeMismatch {
            expected: "int",
            found: value.type_name(),
        })
    }

    /// Evaluates and requires an array result.
    pub fn evaluate_array(&self, env: &ValueMap) -> Result<Vec<Value>, EvalError> {
        let value = self.evaluate(env)?;
        match value {
            Value::Array(items) => Ok(items),
            other => Err(EvalError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }
}

/// Comparison operator of an `if` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::Less => "<",
            Comparator::LessEqual => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// A two-sided boolean condition.
#[derive(Debug, Clone)]
pub struct Condition {
    pub left: Expression,
    pub op: Comparator,
    pub right: Expression,
}

impl Condition {
    /// Evaluates both sides against the environment and compares them.
    ///
    /// Equality is structural with int/float coercion; ordering is defined
    /// for numbers and for strings (lexicographic).
    pub fn evaluate(&self, env: &ValueMap) -> Result<bool, EvalError> {
        use std::cmp::Ordering;

        let left = self.left.evaluate(env)?;
        let right = self.right.evaluate(env)?;

        if let Comparator::Equal | Comparator::NotEqual = self.op {
            let equal = values_equal(&left, &right);
            return Ok((self.op == Comparator::Equal) == equal);
        }

        let cmp = compare_order(&left, &right).ok_or(EvalError::IncomparableTypes {
            left: left.type_name(),
            right: right.type_name(),
            op: self.op,
        })?;
        Ok(match self.op {
            Comparator::Less => cmp == Ordering::Less,
            Comparator::LessEqual => cmp != Ordering::Greater,
            Comparator::Greater => cmp == Ordering::Greater,
            _ => cmp != Ordering::Less,
        })
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
        (a, b) => a == b,
    }
}

fn compare_order(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(name: &str, value: Value) -> ValueMap {
        let mut env = ValueMap::new();
        env.insert(name.to_string(), value);
        env
    }

    #[test]
    fn test_ident_lookup_and_undefined_name() {
        let env = env_with("x", Value::Int(5));
        assert_eq!(
            Expression::Ident("x".to_string()).evaluate(&env).unwrap(),
            Value::Int(5)
        );
        assert!(matches!(
            Expression::Ident("y".to_string()).evaluate(&env),
            Err(EvalError::UndefinedName(name)) if name == "y"
        ));
    }

    #[test]
    fn test_condition_mixed_numeric_comparison() {
        let env = env_with("x", Value::Int(3));
        let condition = Condition {
            left: Expression::Ident("x".to_string()),
            op: Comparator::Less,
            right: Expression::Literal(Value::Float(3.5)),
        };
        assert!(condition.evaluate(&env).unwrap());
    }

    #[test]
    fn test_condition_equality_coerces_int_and_float() {
        let condition = Condition {
            left: Expression::Literal(Value::Int(2)),
            op: Comparator::Equal,
            right: Expression::Literal(Value::Float(2.0)),
        };
        assert!(condition.evaluate(&ValueMap::new()).unwrap());
    }

    #[test]
    fn test_condition_rejects_unordered_types() {
        let condition = Condition {
            left: Expression::Literal(Value::Bool(true)),
            op: Comparator::Greater,
            right: Expression::Literal(Value::Int(1)),
        };
        assert!(matches!(
            condition.evaluate(&ValueMap::new()),
            Err(EvalError::IncomparableTypes { .. })
        ));
    }

    #[test]
    fn test_evaluate_int_rejects_strings() {
        let expr = Expression::Literal(Value::String("nope".to_string()));
        assert!(matches!(
            expr.evaluate_int(&ValueMap::new()),
            Err(EvalError::TypeMismatch { expected: "int", .. })
        ));
    }

    #[test]
    fn test_evaluate_array() {
        let expr = Expression::Literal(Value::Array(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(
            expr.evaluate_array(&ValueMap::new()).unwrap(),
            vec![Value::Int(1), Value::Int(2)]
        );
    }
}
