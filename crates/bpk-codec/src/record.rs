//! Generic records and the JSON front-end that maps them to packages.
//!
//! Streams carry [`GenericRecord`]s, not packages. Whoever writes a stream
//! decides how a package becomes a record; whoever reads it supplies a
//! [`RecordInterpreter`] that turns each record back into a package.
//! [`package_to_record`] and [`json_to_build_package`] are the built-in pair
//! and are exact inverses of each other.

use bpk_model::{
    AttributeMap, AttributeValue, BuildPackage, BuildPackageParsingError, RawBuildRule,
    RawTargetNode,
};
use bpk_types::{BuildTarget, PackagePath, RuleKind, RuleType};
use serde_json::{json, Map, Value};

use crate::error::{RecordError, RecordResult};

/// One decoded record, before interpretation.
pub type GenericRecord = Value;

/// Deepest nesting of arrays and objects a record may have.
///
/// `serde_json` refuses to parse past 127 levels, so writers stop short of it.
pub const MAX_RECORD_DEPTH: usize = 100;

/// Whether `record` nests arrays and objects more than `max` levels deep.
pub(crate) fn nests_deeper_than(record: &Value, max: usize) -> bool {
    match record {
        Value::Array(items) => max == 0 || items.iter().any(|v| nests_deeper_than(v, max - 1)),
        Value::Object(entries) => {
            max == 0 || entries.values().any(|v| nests_deeper_than(v, max - 1))
        }
        _ => false,
    }
}

/// Maps one decoded record to a package.
///
/// Implemented for every `Fn(GenericRecord) -> Result<BuildPackage, E>`, so
/// plain functions and closures work as interpreters.
pub trait RecordInterpreter {
    type Error;

    fn interpret(&self, record: GenericRecord) -> Result<BuildPackage, Self::Error>;
}

impl<F, E> RecordInterpreter for F
where
    F: Fn(GenericRecord) -> Result<BuildPackage, E>,
{
    type Error = E;

    fn interpret(&self, record: GenericRecord) -> Result<BuildPackage, E> {
        self(record)
    }
}

/// Convert a package into the record shape read by [`json_to_build_package`].
pub fn package_to_record(package: &BuildPackage) -> GenericRecord {
    json!({
        "path": package.path().as_str(),
        "rules": package.rules().iter().map(rule_to_json).collect::<Vec<_>>(),
        "errors": package
            .errors()
            .iter()
            .map(|error| json!({
                "message": error.message(),
                "stacktrace": error.stacktrace(),
            }))
            .collect::<Vec<_>>(),
    })
}

fn rule_to_json(rule: &RawBuildRule) -> Value {
    let node = rule.node();
    json!({
        "node": {
            "target": node.target().to_string(),
            "rule_type": {
                "name": node.rule_type().name(),
                "kind": node.rule_type().kind().as_str(),
            },
            "attributes": attributes_to_json(node.attributes()),
        },
        "deps": rule.deps().iter().map(ToString::to_string).collect::<Vec<_>>(),
    })
}

fn attributes_to_json(attributes: &AttributeMap) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(name, value)| (name.to_string(), attribute_to_json(value)))
            .collect(),
    )
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::None => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(n) => Value::from(*n),
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::List(items) => Value::Array(items.iter().map(attribute_to_json).collect()),
        AttributeValue::Dict(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect(),
        ),
    }
}

/// The default interpreter: the structural inverse of [`package_to_record`].
pub fn json_to_build_package(record: GenericRecord) -> RecordResult<BuildPackage> {
    let obj = object(&record, "record")?;
    let path = PackagePath::new(string(field(obj, "path", "")?, "path")?)?;

    let rules = array(field(obj, "rules", "")?, "rules")?
        .iter()
        .enumerate()
        .map(|(i, rule)| json_to_rule(rule, &format!("rules[{i}]")))
        .collect::<RecordResult<Vec<_>>>()?;

    let errors = array(field(obj, "errors", "")?, "errors")?
        .iter()
        .enumerate()
        .map(|(i, error)| json_to_parsing_error(error, &format!("errors[{i}]")))
        .collect::<RecordResult<Vec<_>>>()?;

    Ok(BuildPackage::new(path, rules, errors))
}

fn json_to_rule(value: &Value, at: &str) -> RecordResult<RawBuildRule> {
    let obj = object(value, at)?;

    let node_at = join(at, "node");
    let node = object(field(obj, "node", at)?, &node_at)?;
    let target = json_to_target(field(node, "target", &node_at)?, &join(&node_at, "target"))?;

    let type_at = join(&node_at, "rule_type");
    let rule_type = object(field(node, "rule_type", &node_at)?, &type_at)?;
    let name = string(field(rule_type, "name", &type_at)?, &join(&type_at, "name"))?;
    let kind = string(field(rule_type, "kind", &type_at)?, &join(&type_at, "kind"))?;
    let kind: RuleKind = kind
        .parse()
        .map_err(|_| RecordError::UnknownRuleKind(kind.to_string()))?;
    let rule_type = RuleType::new(name, kind)?;

    let attrs_at = join(&node_at, "attributes");
    let attributes = object(field(node, "attributes", &node_at)?, &attrs_at)?
        .iter()
        .map(|(name, value)| {
            json_to_attribute(value, &join(&attrs_at, name)).map(|value| (name.clone(), value))
        })
        .collect::<RecordResult<AttributeMap>>()?;

    let deps_at = join(at, "deps");
    let deps = array(field(obj, "deps", at)?, &deps_at)?
        .iter()
        .enumerate()
        .map(|(i, dep)| json_to_target(dep, &format!("{deps_at}[{i}]")))
        .collect::<RecordResult<Vec<_>>>()?;

    Ok(RawBuildRule::new(
        RawTargetNode::new(target, rule_type, attributes),
        deps,
    ))
}

fn json_to_target(value: &Value, at: &str) -> RecordResult<BuildTarget> {
    Ok(BuildTarget::parse(string(value, at)?)?)
}

fn json_to_attribute(value: &Value, at: &str) -> RecordResult<AttributeValue> {
    Ok(match value {
        Value::Null => AttributeValue::None,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(n) => AttributeValue::Int(n),
            None => {
                return Err(RecordError::UnsupportedValue {
                    field: at.to_string(),
                    value: n.to_string(),
                })
            }
        },
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(items) => AttributeValue::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| json_to_attribute(item, &format!("{at}[{i}]")))
                .collect::<RecordResult<_>>()?,
        ),
        Value::Object(entries) => AttributeValue::Dict(
            entries
                .iter()
                .map(|(k, v)| json_to_attribute(v, &join(at, k)).map(|v| (k.clone(), v)))
                .collect::<RecordResult<_>>()?,
        ),
    })
}

fn json_to_parsing_error(value: &Value, at: &str) -> RecordResult<BuildPackageParsingError> {
    let obj = object(value, at)?;
    let message = string(field(obj, "message", at)?, &join(at, "message"))?;
    let trace_at = join(at, "stacktrace");
    let stacktrace = array(field(obj, "stacktrace", at)?, &trace_at)?
        .iter()
        .enumerate()
        .map(|(i, line)| string(line, &format!("{trace_at}[{i}]")))
        .collect::<RecordResult<Vec<_>>>()?;
    Ok(BuildPackageParsingError::new(message, stacktrace))
}

fn join(at: &str, name: &str) -> String {
    if at.is_empty() {
        name.to_string()
    } else {
        format!("{at}.{name}")
    }
}

fn field<'a>(obj: &'a Map<String, Value>, name: &str, at: &str) -> RecordResult<&'a Value> {
    obj.get(name)
        .ok_or_else(|| RecordError::MissingField(join(at, name)))
}

fn object<'a>(value: &'a Value, at: &str) -> RecordResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| RecordError::WrongType {
        field: at.to_string(),
        expected: "an object",
    })
}

fn array<'a>(value: &'a Value, at: &str) -> RecordResult<&'a Vec<Value>> {
    value.as_array().ok_or_else(|| RecordError::WrongType {
        field: at.to_string(),
        expected: "an array",
    })
}

fn string<'a>(value: &'a Value, at: &str) -> RecordResult<&'a str> {
    value.as_str().ok_or_else(|| RecordError::WrongType {
        field: at.to_string(),
        expected: "a string",
    })
}
