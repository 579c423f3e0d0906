// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde_json::Value;

/// A single column constraint.
///
/// The variants are the whole vocabulary; evaluation and rendering match
/// on them exhaustively, so a new operator extends one enum instead of a
/// stringly-typed parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Neq(Value),
    /// Matches when the column equals any of the candidates.
    In(Vec<Value>),
    /// `IsNull(true)` matches null or absent columns, `IsNull(false)`
    /// matches present non-null ones.
    IsNull(bool),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
}

impl Condition {
    fn matches(&self, actual: &Value) -> bool {
        match self {
            Self::Eq(expected) => actual == expected,
            Self::Neq(expected) => actual != expected,
            Self::In(candidates) => candidates.contains(actual),
            Self::IsNull(expected) => actual.is_null() == *expected,
            Self::Gt(bound) => compare(actual, bound) == Some(Ordering::Greater),
            Self::Gte(bound) => matches!(compare(actual, bound), Some(Ordering::Greater | Ordering::Equal)),
            Self::Lt(bound) => compare(actual, bound) == Some(Ordering::Less),
            Self::Lte(bound) => matches!(compare(actual, bound), Some(Ordering::Less | Ordering::Equal)),
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Eq(v) => render_op(out, "eq", v),
            Self::Neq(v) => render_op(out, "neq", v),
            Self::In(vs) => render_op(out, "in", &Value::Array(vs.clone())),
            Self::IsNull(v) => render_op(out, "is_null", &Value::Bool(*v)),
            Self::Gt(v) => render_op(out, "gt", v),
            Self::Gte(v) => render_op(out, "gte", v),
            Self::Lt(v) => render_op(out, "lt", v),
            Self::Lte(v) => render_op(out, "lte", v),
        }
    }
}

fn render_op(out: &mut String, op: &str, value: &Value) {
    // Value's Display is compact JSON, which is stable for scalars and
    // arrays of scalars.
    let _ = write!(out, "{op}:{value}");
}

/// Ordering between two JSON scalars; `None` when they are not comparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A conjunction of column conditions.
///
/// Columns are kept sorted, so two filters built in different orders
/// render to the same canonical string and thus the same cache key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: BTreeMap<String, Condition>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[must_use]
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Eq(value.into()))
    }

    #[must_use]
    pub fn neq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Neq(value.into()))
    }

    #[must_use]
    pub fn is_in<I, V>(self, column: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.with(column, Condition::In(candidates.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn is_null(self, column: impl Into<String>, expected: bool) -> Self {
        self.with(column, Condition::IsNull(expected))
    }

    #[must_use]
    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Gt(value.into()))
    }

    #[must_use]
    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Gte(value.into()))
    }

    #[must_use]
    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Lt(value.into()))
    }

    #[must_use]
    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Lte(value.into()))
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.conditions.insert(column.into(), condition);
        self
    }

    /// Evaluates the filter against a row. Absent columns read as null.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|(column, condition)| {
            let actual = row.get(column).unwrap_or(&Value::Null);
            condition.matches(actual)
        })
    }

    /// When the filter is exactly one equality on `id`, returns that id.
    ///
    /// This is the shape a mutation must have for optimistic staging,
    /// which tracks rows individually.
    #[must_use]
    pub fn single_id(&self) -> Option<&Value> {
        if self.conditions.len() != 1 {
            return None;
        }
        match self.conditions.get("id") {
            Some(Condition::Eq(id)) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    /// Canonical rendering, used verbatim inside cache keys.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered = String::new();
        for (i, (column, condition)) in self.conditions.iter().enumerate() {
            if i > 0 {
                rendered.push('&');
            }
            let _ = write!(rendered, "{column}=");
            condition.render(&mut rendered);
        }
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn conjunction_requires_every_condition() {
        let filter = Filter::new().eq("user_id", "u1").gte("score", 10);
        assert!(filter.matches(&json!({"user_id": "u1", "score": 10})));
        assert!(!filter.matches(&json!({"user_id": "u1", "score": 9})));
        assert!(!filter.matches(&json!({"user_id": "u2", "score": 50})));
    }

    #[test]
    fn absent_columns_read_as_null() {
        let filter = Filter::new().is_null("deleted_at", true);
        assert!(filter.matches(&json!({"id": "g1"})));
        assert!(filter.matches(&json!({"id": "g1", "deleted_at": null})));
        assert!(!filter.matches(&json!({"id": "g1", "deleted_at": "2026-01-01"})));
    }

    #[test]
    fn in_matches_any_candidate() {
        let filter = Filter::new().is_in("status", ["active", "paused"]);
        assert!(filter.matches(&json!({"status": "paused"})));
        assert!(!filter.matches(&json!({"status": "done"})));
    }

    #[test]
    fn comparisons_across_types_never_match() {
        let filter = Filter::new().gt("score", 10);
        assert!(!filter.matches(&json!({"score": "high"})));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn rendering_is_order_independent() {
        let a = Filter::new().eq("user_id", "u1").gte("score", 10);
        let b = Filter::new().gte("score", 10).eq("user_id", "u1");
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), r#"score=gte:10&user_id=eq:"u1""#);
    }

    #[test]
    fn single_id_requires_exactly_one_eq_on_id() {
        assert_eq!(Filter::new().eq("id", "g1").single_id(), Some(&json!("g1")));
        assert_eq!(Filter::new().neq("id", "g1").single_id(), None);
        assert_eq!(Filter::new().eq("id", "g1").eq("user_id", "u1").single_id(), None);
        assert_eq!(Filter::new().single_id(), None);
    }
}
