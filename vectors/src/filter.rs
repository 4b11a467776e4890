//! Generic metadata filter grammar and its per-backend translations.
//!
//! A filter maps a metadata field to one condition. The JSON form
//! accepts a bare scalar (equality), a bare array (membership), or an
//! operator object with one of `$eq $ne $gt $gte $lt $lte $in`. Each
//! backend gets the filter in its native predicate language; string
//! literals are escaped so metadata values can never break out of the
//! generated predicate.

use crate::error::{VectorError, VectorResult};
use qdrant_client::qdrant::{Condition, Filter as QdrantFilter, Range};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Value),
    Ne(Value),
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<Value>),
}

/// Field conditions combined with AND. Ordered map so generated
/// predicates are deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: BTreeMap<String, Comparison>,
}

fn numeric_operand(op: &str, value: &Value) -> VectorResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| VectorError::InvalidFilter(format!("{op} requires a numeric operand")))
}

impl Filter {
    pub fn parse(raw: &Value) -> VectorResult<Self> {
        let object = raw
            .as_object()
            .ok_or_else(|| VectorError::InvalidFilter("filter must be a JSON object".into()))?;

        let mut conditions = BTreeMap::new();
        for (field, condition) in object {
            conditions.insert(field.clone(), Self::parse_condition(condition)?);
        }
        Ok(Self { conditions })
    }

    fn parse_condition(condition: &Value) -> VectorResult<Comparison> {
        match condition {
            Value::Array(values) => Ok(Comparison::In(values.clone())),
            Value::Object(ops) => {
                if ops.len() != 1 {
                    return Err(VectorError::InvalidFilter(
                        "operator object must hold exactly one operator".into(),
                    ));
                }
                let (op, operand) = ops.iter().next().map(|(k, v)| (k.as_str(), v)).unwrap_or(("", &Value::Null));
                match op {
                    "$eq" => Ok(Comparison::Eq(operand.clone())),
                    "$ne" => Ok(Comparison::Ne(operand.clone())),
                    "$gt" => Ok(Comparison::Gt(numeric_operand("$gt", operand)?)),
                    "$gte" => Ok(Comparison::Gte(numeric_operand("$gte", operand)?)),
                    "$lt" => Ok(Comparison::Lt(numeric_operand("$lt", operand)?)),
                    "$lte" => Ok(Comparison::Lte(numeric_operand("$lte", operand)?)),
                    "$in" => operand
                        .as_array()
                        .map(|values| Comparison::In(values.clone()))
                        .ok_or_else(|| {
                            VectorError::InvalidFilter("$in requires an array operand".into())
                        }),
                    other => Err(VectorError::InvalidFilter(format!(
                        "unknown operator: {other}"
                    ))),
                }
            }
            scalar => Ok(Comparison::Eq(scalar.clone())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&String, &Comparison)> {
        self.conditions.iter()
    }

    /// Direct evaluation against a metadata map. `$ne` matches when the
    /// field is absent, mirroring the hosted backends' semantics.
    pub fn matches(&self, metadata: &std::collections::HashMap<String, Value>) -> bool {
        self.conditions.iter().all(|(field, cmp)| {
            let value = metadata.get(field);
            match cmp {
                Comparison::Eq(expected) => value.is_some_and(|v| json_eq(v, expected)),
                Comparison::Ne(expected) => !value.is_some_and(|v| json_eq(v, expected)),
                Comparison::Gt(n) => numeric_field(value).is_some_and(|v| v > *n),
                Comparison::Gte(n) => numeric_field(value).is_some_and(|v| v >= *n),
                Comparison::Lt(n) => numeric_field(value).is_some_and(|v| v < *n),
                Comparison::Lte(n) => numeric_field(value).is_some_and(|v| v <= *n),
                Comparison::In(options) => {
                    value.is_some_and(|v| options.iter().any(|opt| json_eq(v, opt)))
                }
            }
        })
    }

    /// Renders a SQL predicate over a JSONB `metadata` column. Every
    /// string literal and field name is single-quote doubled.
    pub fn to_sql_predicate(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, cmp)| sql_condition(field, cmp))
            .collect();
        Some(parts.join(" AND "))
    }

    /// Builds a qdrant filter: equalities and memberships as match
    /// conditions (`$ne` via must_not), range operators as `Range`.
    pub fn to_qdrant_filter(&self) -> VectorResult<QdrantFilter> {
        let mut must: Vec<Condition> = Vec::new();
        let mut must_not: Vec<Condition> = Vec::new();

        for (field, cmp) in &self.conditions {
            match cmp {
                Comparison::Eq(value) => must.push(qdrant_match(field, value)?),
                Comparison::Ne(value) => must_not.push(qdrant_match(field, value)?),
                Comparison::Gt(n) => must.push(qdrant_range(field, |r| r.gt = Some(*n))),
                Comparison::Gte(n) => must.push(qdrant_range(field, |r| r.gte = Some(*n))),
                Comparison::Lt(n) => must.push(qdrant_range(field, |r| r.lt = Some(*n))),
                Comparison::Lte(n) => must.push(qdrant_range(field, |r| r.lte = Some(*n))),
                Comparison::In(options) => must.push(qdrant_in(field, options)?),
            }
        }

        Ok(QdrantFilter {
            must,
            must_not,
            ..Default::default()
        })
    }

    /// Normalizes to Pinecone's Mongo-style dialect: every condition
    /// becomes an explicit operator object.
    pub fn to_pinecone_filter(&self) -> Option<Value> {
        if self.conditions.is_empty() {
            return None;
        }
        let mut object = serde_json::Map::new();
        for (field, cmp) in &self.conditions {
            let condition = match cmp {
                Comparison::Eq(v) => serde_json::json!({ "$eq": v }),
                Comparison::Ne(v) => serde_json::json!({ "$ne": v }),
                Comparison::Gt(n) => serde_json::json!({ "$gt": n }),
                Comparison::Gte(n) => serde_json::json!({ "$gte": n }),
                Comparison::Lt(n) => serde_json::json!({ "$lt": n }),
                Comparison::Lte(n) => serde_json::json!({ "$lte": n }),
                Comparison::In(values) => serde_json::json!({ "$in": values }),
            };
            object.insert(field.clone(), condition);
        }
        Some(Value::Object(object))
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn numeric_field(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn sql_escape(s: &str) -> String {
    s.replace('\'', "''")
}

fn sql_text_field(field: &str) -> String {
    format!("metadata->>'{}'", sql_escape(field))
}

fn sql_numeric_field(field: &str) -> String {
    format!("(metadata->>'{}')::numeric", sql_escape(field))
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", sql_escape(s)),
        Value::Bool(b) => format!("'{b}'"),
        Value::Number(n) => format!("'{n}'"),
        other => format!("'{}'", sql_escape(&other.to_string())),
    }
}

fn sql_condition(field: &str, cmp: &Comparison) -> String {
    match cmp {
        Comparison::Eq(Value::Number(n)) => format!("{} = {n}", sql_numeric_field(field)),
        Comparison::Eq(value) => format!("{} = {}", sql_text_field(field), sql_literal(value)),
        Comparison::Ne(Value::Number(n)) => format!(
            "({col} IS NULL OR ({col})::numeric <> {n})",
            col = sql_text_field(field)
        ),
        Comparison::Ne(value) => format!(
            "{} IS DISTINCT FROM {}",
            sql_text_field(field),
            sql_literal(value)
        ),
        Comparison::Gt(n) => format!("{} > {n}", sql_numeric_field(field)),
        Comparison::Gte(n) => format!("{} >= {n}", sql_numeric_field(field)),
        Comparison::Lt(n) => format!("{} < {n}", sql_numeric_field(field)),
        Comparison::Lte(n) => format!("{} <= {n}", sql_numeric_field(field)),
        Comparison::In(values) => {
            if values.iter().all(Value::is_number) {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("{} IN ({})", sql_numeric_field(field), rendered.join(", "))
            } else {
                let rendered: Vec<String> = values.iter().map(sql_literal).collect();
                format!("{} IN ({})", sql_text_field(field), rendered.join(", "))
            }
        }
    }
}

fn qdrant_match(field: &str, value: &Value) -> VectorResult<Condition> {
    match value {
        Value::String(s) => Ok(Condition::matches(field, s.clone())),
        Value::Bool(b) => Ok(Condition::matches(field, *b)),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            let int = n.as_i64().ok_or_else(|| {
                VectorError::InvalidFilter(format!("integer out of range: {n}"))
            })?;
            Ok(Condition::matches(field, int))
        }
        other => Err(VectorError::InvalidFilter(format!(
            "qdrant cannot match on value: {other}"
        ))),
    }
}

fn qdrant_range(field: &str, set: impl FnOnce(&mut Range)) -> Condition {
    let mut range = Range::default();
    set(&mut range);
    Condition::range(field, range)
}

fn qdrant_in(field: &str, options: &[Value]) -> VectorResult<Condition> {
    if options.iter().all(|v| v.is_string()) {
        let keywords: Vec<String> = options
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        Ok(Condition::matches(field, keywords))
    } else if options.iter().all(|v| v.is_i64() || v.is_u64()) {
        let integers: Vec<i64> = options.iter().filter_map(Value::as_i64).collect();
        Ok(Condition::matches(field, integers))
    } else {
        Err(VectorError::InvalidFilter(
            "$in requires all-string or all-integer options for this backend".into(),
        ))
    }
}
