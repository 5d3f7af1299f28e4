//! Declarative conditions evaluated against an event payload.
//!
//! Rules are authored as JSON and parsed once into a [`Condition`] tree:
//!
//! ```json
//! {"all": [
//!     {"field": "risk_level", "op": "in", "value": ["High", "Critical"]},
//!     {"field": "patient_id", "op": "exists", "value": true}
//! ]}
//! ```
//!
//! A node is either a combinator (`all` / `any`, or the explicit
//! `{"kind": "all", "children": [...]}` form) or a clause with `field`,
//! `op` and `value`. An empty object matches every event.
//!
//! Evaluation never fails: a missing field or mismatched types make a clause
//! false. JSON `null` counts as a missing field.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::{Payload, payload_value};

/// Clause operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseOp {
    Exists,
    Eq,
    Ne,
    In,
    Gte,
    Lte,
    Gt,
    Lt,
}

impl ClauseOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseOp::Exists => "exists",
            ClauseOp::Eq => "eq",
            ClauseOp::Ne => "ne",
            ClauseOp::In => "in",
            ClauseOp::Gte => "gte",
            ClauseOp::Lte => "lte",
            ClauseOp::Gt => "gt",
            ClauseOp::Lt => "lt",
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, ClauseOp::Gte | ClauseOp::Lte | ClauseOp::Gt | ClauseOp::Lt)
    }
}

impl fmt::Display for ClauseOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClauseOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exists" => Ok(ClauseOp::Exists),
            "eq" => Ok(ClauseOp::Eq),
            "ne" => Ok(ClauseOp::Ne),
            "in" => Ok(ClauseOp::In),
            "gte" => Ok(ClauseOp::Gte),
            "lte" => Ok(ClauseOp::Lte),
            "gt" => Ok(ClauseOp::Gt),
            "lt" => Ok(ClauseOp::Lt),
            _ => Err(format!("unknown operator '{s}'")),
        }
    }
}

/// Leaf comparison against one payload field
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: ClauseOp,
    pub value: Value,
}

impl Clause {
    pub fn new(field: impl Into<String>, op: ClauseOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn evaluate(&self, payload: &Payload) -> bool {
        let actual = payload_value(payload, &self.field);

        match self.op {
            ClauseOp::Exists => actual.is_some() == self.value.as_bool().unwrap_or(true),
            ClauseOp::Eq => actual.is_some_and(|a| values_equal(a, &self.value)),
            ClauseOp::Ne => actual.is_some_and(|a| !values_equal(a, &self.value)),
            ClauseOp::In => match (actual, &self.value) {
                (Some(a), Value::Array(options)) => options.iter().any(|o| values_equal(a, o)),
                _ => false,
            },
            ClauseOp::Gte | ClauseOp::Lte | ClauseOp::Gt | ClauseOp::Lt => {
                let (Some(a), Some(b)) = (actual.and_then(Value::as_f64), self.value.as_f64())
                else {
                    return false;
                };
                match self.op {
                    ClauseOp::Gte => a >= b,
                    ClauseOp::Lte => a <= b,
                    ClauseOp::Gt => a > b,
                    _ => a < b,
                }
            }
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "field": self.field,
            "op": self.op.as_str(),
            "value": self.value,
        })
    }
}

/// Condition tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// True iff every child is true (vacuously true when empty)
    All(Vec<Condition>),
    /// True iff some child is true (false when empty)
    Any(Vec<Condition>),
    Clause(Clause),
}

impl Condition {
    /// Condition that matches every payload.
    pub fn always() -> Self {
        Condition::All(Vec::new())
    }

    /// Parses an authored condition, rejecting malformed shapes and nesting
    /// deeper than `max_depth` combinator levels.
    pub fn parse(value: &Value, max_depth: usize) -> Result<Self, ValidationError> {
        parse_node(value, "condition", 0, max_depth)
    }

    pub fn evaluate(&self, payload: &Payload) -> bool {
        match self {
            Condition::All(children) => children.iter().all(|c| c.evaluate(payload)),
            Condition::Any(children) => children.iter().any(|c| c.evaluate(payload)),
            Condition::Clause(clause) => clause.evaluate(payload),
        }
    }

    /// Payload fields referenced anywhere in the tree.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::All(children) | Condition::Any(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
            Condition::Clause(clause) => {
                if !out.contains(&clause.field.as_str()) {
                    out.push(&clause.field);
                }
            }
        }
    }

    /// Authoring JSON for this tree (`{}` for the always-true condition).
    pub fn to_json(&self) -> Value {
        match self {
            Condition::All(children) if children.is_empty() => Value::Object(Map::new()),
            Condition::All(children) => {
                json!({ "all": children.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
            Condition::Any(children) => {
                json!({ "any": children.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
            Condition::Clause(clause) => clause.to_json(),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Evaluates `node` against `payload`.
pub fn evaluate(node: &Condition, payload: &Payload) -> bool {
    node.evaluate(payload)
}

fn parse_node(
    value: &Value,
    path: &str,
    depth: usize,
    max_depth: usize,
) -> Result<Condition, ValidationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ValidationError::condition(path, "expected an object"))?;

    if obj.is_empty() {
        return Ok(Condition::always());
    }
    let no_children = Value::Array(Vec::new());

    if obj.contains_key("field") {
        if obj.contains_key("all") || obj.contains_key("any") || obj.contains_key("kind") {
            return Err(ValidationError::condition(
                path,
                "node mixes a clause with a combinator",
            ));
        }
        return parse_clause(obj, path).map(Condition::Clause);
    }

    let (kind, children) = if let Some(kind) = obj.get("kind") {
        let kind = kind
            .as_str()
            .ok_or_else(|| ValidationError::condition(path, "'kind' must be a string"))?;
        (kind, obj.get("children").unwrap_or(&no_children))
    } else {
        match (obj.get("all"), obj.get("any")) {
            (Some(children), None) => ("all", children),
            (None, Some(children)) => ("any", children),
            (Some(_), Some(_)) => {
                return Err(ValidationError::condition(
                    path,
                    "node has both 'all' and 'any'",
                ));
            }
            (None, None) => {
                let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
                return Err(ValidationError::condition(
                    path,
                    format!("unrecognised node keys: {}", keys.join(", ")),
                ));
            }
        }
    };

    if depth >= max_depth {
        return Err(ValidationError::condition(
            path,
            format!("nesting exceeds {max_depth} levels"),
        ));
    }

    let items = children
        .as_array()
        .ok_or_else(|| ValidationError::condition(path, format!("'{kind}' must be a list")))?;

    let mut parsed = Vec::with_capacity(items.len());
    for (i, child) in items.iter().enumerate() {
        let child_path = format!("{path}.{kind}[{i}]");
        parsed.push(parse_node(child, &child_path, depth + 1, max_depth)?);
    }

    match kind {
        "all" => Ok(Condition::All(parsed)),
        "any" => Ok(Condition::Any(parsed)),
        other => Err(ValidationError::condition(
            path,
            format!("unknown combinator '{other}'"),
        )),
    }
}

fn parse_clause(obj: &Map<String, Value>, path: &str) -> Result<Clause, ValidationError> {
    let field = obj
        .get("field")
        .and_then(Value::as_str)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ValidationError::condition(path, "'field' must be a non-empty string"))?;

    let op: ClauseOp = obj
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::condition(path, "'op' must be a string"))?
        .parse()
        .map_err(|e: String| ValidationError::condition(path, e))?;

    let value = match (obj.get("value"), op) {
        (Some(value), _) => value.clone(),
        (None, ClauseOp::Exists) => Value::Bool(true),
        (None, _) => {
            return Err(ValidationError::condition(
                path,
                format!("'{op}' requires a value"),
            ));
        }
    };

    match op {
        ClauseOp::Exists if !value.is_boolean() => {
            return Err(ValidationError::condition(path, "'exists' value must be a boolean"));
        }
        ClauseOp::In => {
            let Some(options) = value.as_array() else {
                return Err(ValidationError::condition(path, "'in' value must be a list"));
            };
            if options.iter().any(|o| o.is_object() || o.is_array()) {
                return Err(ValidationError::condition(
                    path,
                    "'in' options must be scalars",
                ));
            }
        }
        op if op.is_numeric() && !value.is_number() => {
            return Err(ValidationError::condition(
                path,
                format!("'{op}' value must be a number"),
            ));
        }
        ClauseOp::Eq | ClauseOp::Ne if value.is_object() || value.is_array() => {
            return Err(ValidationError::condition(
                path,
                format!("'{op}' value must be a scalar"),
            ));
        }
        _ => {}
    }

    Ok(Clause::new(field, op, value))
}

/// Numbers compare by value; everything else by strict JSON equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn cond(value: Value) -> Condition {
        Condition::parse(&value, 8).unwrap()
    }

    #[test]
    fn test_empty_combinators() {
        let empty = Payload::new();
        assert!(evaluate(&Condition::All(vec![]), &empty));
        assert!(!evaluate(&Condition::Any(vec![]), &empty));
        assert!(cond(json!({"kind": "all", "children": []})).evaluate(&empty));
        assert!(!cond(json!({"kind": "any", "children": []})).evaluate(&empty));
    }

    #[test]
    fn test_empty_object_always_matches() {
        let c = cond(json!({}));
        assert_eq!(c, Condition::always());
        assert!(c.evaluate(&payload(json!({"anything": 1}))));
    }

    #[test]
    fn test_in_operator() {
        let c = cond(json!({"all": [
            {"field": "risk_level", "op": "in", "value": ["High", "Critical"]}
        ]}));
        assert!(c.evaluate(&payload(json!({"risk_level": "High"}))));
        assert!(!c.evaluate(&payload(json!({"risk_level": "Low"}))));
        assert!(!c.evaluate(&Payload::new()));
    }

    #[test]
    fn test_exists_operator() {
        let present = cond(json!({"field": "patient_id", "op": "exists", "value": true}));
        let absent = cond(json!({"field": "patient_id", "op": "exists", "value": false}));

        let with = payload(json!({"patient_id": 12}));
        let without = payload(json!({"other": 1}));
        let null = payload(json!({"patient_id": null}));

        assert!(present.evaluate(&with));
        assert!(!present.evaluate(&without));
        assert!(!present.evaluate(&null));
        assert!(absent.evaluate(&without));
        assert!(!absent.evaluate(&with));
    }

    #[test]
    fn test_exists_defaults_to_true() {
        let c = cond(json!({"field": "patient_id", "op": "exists"}));
        assert!(c.evaluate(&payload(json!({"patient_id": "p1"}))));
    }

    #[test]
    fn test_eq_and_ne() {
        let eq = cond(json!({"field": "priority", "op": "eq", "value": "stat"}));
        let ne = cond(json!({"field": "priority", "op": "ne", "value": "stat"}));

        assert!(eq.evaluate(&payload(json!({"priority": "stat"}))));
        assert!(!eq.evaluate(&payload(json!({"priority": "routine"}))));
        assert!(ne.evaluate(&payload(json!({"priority": "routine"}))));
        assert!(!ne.evaluate(&payload(json!({"priority": "stat"}))));

        // Absent field is false for both
        assert!(!eq.evaluate(&Payload::new()));
        assert!(!ne.evaluate(&Payload::new()));
    }

    #[test]
    fn test_eq_is_strict_across_types() {
        let c = cond(json!({"field": "medication_taken", "op": "eq", "value": false}));
        assert!(c.evaluate(&payload(json!({"medication_taken": false}))));
        assert!(!c.evaluate(&payload(json!({"medication_taken": 0}))));
        assert!(!c.evaluate(&payload(json!({"medication_taken": "false"}))));

        let c = cond(json!({"field": "age", "op": "eq", "value": 65}));
        assert!(c.evaluate(&payload(json!({"age": 65.0}))));
        assert!(!c.evaluate(&payload(json!({"age": "65"}))));
    }

    #[test]
    fn test_numeric_comparisons() {
        let p = payload(json!({"symptom_severity": 9, "oxygen_saturation": 88.5}));

        assert!(cond(json!({"field": "symptom_severity", "op": "gte", "value": 9})).evaluate(&p));
        assert!(!cond(json!({"field": "symptom_severity", "op": "gt", "value": 9})).evaluate(&p));
        assert!(cond(json!({"field": "symptom_severity", "op": "lte", "value": 9})).evaluate(&p));
        assert!(cond(json!({"field": "oxygen_saturation", "op": "lt", "value": 90})).evaluate(&p));
    }

    #[test]
    fn test_numeric_comparison_with_non_numeric_operand() {
        let c = cond(json!({"field": "risk_score", "op": "gte", "value": 0.5}));
        assert!(!c.evaluate(&payload(json!({"risk_score": "high"}))));
        assert!(!c.evaluate(&payload(json!({"risk_score": true}))));
        assert!(!c.evaluate(&payload(json!({"risk_score": null}))));
        assert!(!c.evaluate(&Payload::new()));
    }

    #[test]
    fn test_any_combinator() {
        let c = cond(json!({"any": [
            {"field": "symptom_severity", "op": "gte", "value": 9},
            {"field": "oxygen_saturation", "op": "lt", "value": 90}
        ]}));
        assert!(c.evaluate(&payload(json!({"symptom_severity": 3, "oxygen_saturation": 85}))));
        assert!(!c.evaluate(&payload(json!({"symptom_severity": 3, "oxygen_saturation": 97}))));
    }

    #[test]
    fn test_nested_combinators() {
        let c = cond(json!({"all": [
            {"field": "patient_id", "op": "exists", "value": true},
            {"any": [
                {"field": "priority", "op": "eq", "value": "stat"},
                {"field": "patient_age", "op": "gte", "value": 80}
            ]}
        ]}));
        assert!(c.evaluate(&payload(json!({"patient_id": 1, "priority": "stat"}))));
        assert!(c.evaluate(&payload(json!({"patient_id": 1, "patient_age": 82}))));
        assert!(!c.evaluate(&payload(json!({"patient_id": 1, "patient_age": 40}))));
        assert_eq!(c.fields(), vec!["patient_id", "priority", "patient_age"]);
    }

    #[test]
    fn test_rejects_unknown_operator() {
        let err = Condition::parse(
            &json!({"all": [{"field": "x", "op": "contains", "value": "a"}]}),
            8,
        )
        .unwrap_err();
        match err {
            ValidationError::InvalidCondition { path, message } => {
                assert_eq!(path, "condition.all[0]");
                assert!(message.contains("contains"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_malformed_shapes() {
        for bad in [
            json!([]),
            json!({"all": {"field": "x"}}),
            json!({"all": [], "any": []}),
            json!({"kind": "none", "children": []}),
            json!({"field": "x", "op": "in", "value": "High"}),
            json!({"field": "x", "op": "gte", "value": "9"}),
            json!({"field": "x", "op": "exists", "value": "yes"}),
            json!({"field": "", "op": "eq", "value": 1}),
            json!({"field": "x", "op": "eq"}),
            json!({"field": "x", "op": "eq", "value": 1, "all": []}),
            json!({"unexpected": true}),
        ] {
            assert!(Condition::parse(&bad, 8).is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn test_depth_limit() {
        let nested = json!({"all": [{"any": [{"all": [
            {"field": "x", "op": "eq", "value": 1}
        ]}]}]});
        assert!(Condition::parse(&nested, 3).is_ok());
        assert!(Condition::parse(&nested, 2).is_err());
    }

    #[test]
    fn test_to_json_round_trip() {
        let authored = json!({"all": [
            {"field": "risk_level", "op": "in", "value": ["High", "Critical"]},
            {"field": "patient_id", "op": "exists", "value": true}
        ]});
        let c = cond(authored.clone());
        assert_eq!(c.to_json(), authored);
        assert_eq!(serde_json::to_value(&c).unwrap(), authored);
        assert_eq!(Condition::always().to_json(), json!({}));
    }
}
