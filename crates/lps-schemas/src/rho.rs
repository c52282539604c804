//! Codec for the ledger's typed-expression JSON.
//!
//! Read-only queries answer with `{"expr": [<expr>, ...]}` where each
//! expression is a single-key object naming its type, e.g.
//! `{"ExprString": {"data": "abc"}}` or
//! `{"ExprMap": {"data": {"k": {"ExprInt": {"data": 1}}}}}`.
//! Deploy results are read back with `data-at-name`, which answers with
//! `{"exprs": [{"expr": <expr>, "block": ..}, ...], "length": n}`.
//! Only the shapes the registry contract emits are modelled.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RhoValue {
    Nil,
    Bool(bool),
    Int(i64),
    String(String),
    Uri(String),
    /// Hex-encoded byte array.
    Bytes(String),
    List(Vec<RhoValue>),
    Tuple(Vec<RhoValue>),
    Set(Vec<RhoValue>),
    Map(BTreeMap<String, RhoValue>),
    Unforgeable(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RhoDecodeError(pub String);

impl fmt::Display for RhoDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rho decode: {}", self.0)
    }
}

impl std::error::Error for RhoDecodeError {}

fn err(msg: impl Into<String>) -> RhoDecodeError {
    RhoDecodeError(msg.into())
}

impl RhoValue {
    pub fn str(s: impl Into<String>) -> Self {
        RhoValue::String(s.into())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, RhoValue)>) -> Self {
        RhoValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RhoValue::String(s) | RhoValue::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RhoValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, RhoValue>> {
        match self {
            RhoValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Map lookup; `None` for non-maps and missing keys.
    pub fn get(&self, key: &str) -> Option<&RhoValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    pub fn from_json(v: &Value) -> Result<Self, RhoDecodeError> {
        if v.is_null() {
            return Ok(RhoValue::Nil);
        }
        let obj = v
            .as_object()
            .ok_or_else(|| err(format!("expected expression object, got {v}")))?;
        if obj.is_empty() {
            return Ok(RhoValue::Nil);
        }
        let (tag, body) = obj
            .iter()
            .next()
            .ok_or_else(|| err("empty expression"))?;
        let data = body.get("data");

        match tag.as_str() {
            "ExprNil" => Ok(RhoValue::Nil),
            "ExprBool" => data
                .and_then(Value::as_bool)
                .map(RhoValue::Bool)
                .ok_or_else(|| err("ExprBool without boolean data")),
            "ExprInt" => data
                .and_then(Value::as_i64)
                .map(RhoValue::Int)
                .ok_or_else(|| err("ExprInt without integer data")),
            "ExprString" => data
                .and_then(Value::as_str)
                .map(RhoValue::str)
                .ok_or_else(|| err("ExprString without string data")),
            "ExprUri" => data
                .and_then(Value::as_str)
                .map(|s| RhoValue::Uri(s.to_string()))
                .ok_or_else(|| err("ExprUri without string data")),
            "ExprBytes" => data
                .and_then(Value::as_str)
                .map(|s| RhoValue::Bytes(s.to_string()))
                .ok_or_else(|| err("ExprBytes without hex data")),
            "ExprList" | "ExprTuple" | "ExprSet" => {
                let items = data
                    .and_then(Value::as_array)
                    .ok_or_else(|| err(format!("{tag} without array data")))?
                    .iter()
                    .map(RhoValue::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match tag.as_str() {
                    "ExprList" => RhoValue::List(items),
                    "ExprTuple" => RhoValue::Tuple(items),
                    _ => RhoValue::Set(items),
                })
            }
            "ExprMap" => {
                let entries = data
                    .and_then(Value::as_object)
                    .ok_or_else(|| err("ExprMap without object data"))?;
                let mut out = BTreeMap::new();
                for (k, v) in entries {
                    out.insert(k.clone(), RhoValue::from_json(v)?);
                }
                Ok(RhoValue::Map(out))
            }
            "ExprUnforg" => {
                let id = data
                    .and_then(Value::as_object)
                    .and_then(|o| o.values().next())
                    .and_then(|inner| inner.get("data"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| err("ExprUnforg without id"))?;
                Ok(RhoValue::Unforgeable(id.to_string()))
            }
            other => Err(err(format!("unsupported expression type {other}"))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RhoValue::Nil => json!({ "ExprNil": {} }),
            RhoValue::Bool(b) => json!({ "ExprBool": { "data": b } }),
            RhoValue::Int(i) => json!({ "ExprInt": { "data": i } }),
            RhoValue::String(s) => json!({ "ExprString": { "data": s } }),
            RhoValue::Uri(s) => json!({ "ExprUri": { "data": s } }),
            RhoValue::Bytes(s) => json!({ "ExprBytes": { "data": s } }),
            RhoValue::List(xs) => json!({ "ExprList": { "data": xs.iter().map(Self::to_json).collect::<Vec<_>>() } }),
            RhoValue::Tuple(xs) => json!({ "ExprTuple": { "data": xs.iter().map(Self::to_json).collect::<Vec<_>>() } }),
            RhoValue::Set(xs) => json!({ "ExprSet": { "data": xs.iter().map(Self::to_json).collect::<Vec<_>>() } }),
            RhoValue::Map(m) => {
                let data: Map<String, Value> =
                    m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
                json!({ "ExprMap": { "data": data } })
            }
            RhoValue::Unforgeable(id) => {
                json!({ "ExprUnforg": { "data": { "UnforgPrivate": { "data": id } } } })
            }
        }
    }
}

/// Wrap expressions in the read-only query response envelope.
pub fn expr_response(values: &[RhoValue]) -> Value {
    json!({ "expr": values.iter().map(RhoValue::to_json).collect::<Vec<_>>() })
}

/// First expression of a read-only query response, `None` when the
/// response carries no expressions at all.
pub fn first_expr(body: &Value) -> Result<Option<RhoValue>, RhoDecodeError> {
    let exprs = body
        .get("expr")
        .and_then(Value::as_array)
        .ok_or_else(|| err("response has no .expr array"))?;
    exprs.first().map(RhoValue::from_json).transpose()
}

/// Wrap values in the `data-at-name` response envelope, newest first.
pub fn data_at_name_response(values: &[RhoValue]) -> Value {
    let exprs: Vec<Value> = values.iter().map(|v| json!({ "expr": v.to_json() })).collect();
    json!({ "exprs": exprs, "length": values.len() })
}

/// Most recent value sent on a name, `None` while nothing has been sent.
pub fn first_data_at_name(body: &Value) -> Result<Option<RhoValue>, RhoDecodeError> {
    let exprs = body
        .get("exprs")
        .and_then(Value::as_array)
        .ok_or_else(|| err("response has no .exprs array"))?;
    let Some(first) = exprs.first() else {
        return Ok(None);
    };
    let expr = first
        .get("expr")
        .ok_or_else(|| err("data-at-name entry has no .expr"))?;
    RhoValue::from_json(expr).map(Some)
}
