//! Condition evaluation over a flattened attribute context.
//!
//! Evaluation is total: a malformed value or type mismatch makes the
//! affected leaf evaluate to `false` (logged at warn level), never an error.

use std::cmp::Ordering;

use serde_json::Value;

use crate::model::{
    AbacRequest, ConditionNode, FlattenedContext, LeafCondition, Operator, parse_hh_mm,
};

/// Flattens an [`AbacRequest`] into `domain.name → value` entries.
///
/// Only attributes that are present end up in the map; the `action` is
/// always present (it defaults to `"access"`).
#[must_use]
pub fn flatten_request(request: &AbacRequest) -> FlattenedContext {
    let mut ctx = FlattenedContext::new();

    let subject = &request.subject;
    if let Some(ref dept) = subject.dept {
        ctx.insert("subject.dept".to_string(), Value::from(dept.clone()));
    }
    if let Some(ref groups) = subject.groups {
        ctx.insert("subject.groups".to_string(), Value::from(groups.clone()));
    }
    if let Some(score) = subject.risk_score {
        ctx.insert("subject.riskScore".to_string(), Value::from(score));
    }
    if let Some(ref role) = subject.role {
        ctx.insert("subject.role".to_string(), Value::from(role.clone()));
    }
    if let Some(ref level) = subject.clearance_level {
        ctx.insert(
            "subject.clearanceLevel".to_string(),
            Value::from(level.clone()),
        );
    }

    let resource = &request.resource;
    if let Some(ref rtype) = resource.resource_type {
        ctx.insert("resource.type".to_string(), Value::from(rtype.clone()));
    }
    if let Some(ref env) = resource.env {
        ctx.insert("resource.env".to_string(), Value::from(env.clone()));
    }
    if let Some(ref classification) = resource.classification {
        ctx.insert(
            "resource.classification".to_string(),
            Value::from(classification.clone()),
        );
    }
    if let Some(ref owner) = resource.owner {
        ctx.insert("resource.owner".to_string(), Value::from(owner.clone()));
    }
    if let Some(ref sensitivity) = resource.sensitivity {
        ctx.insert(
            "resource.sensitivity".to_string(),
            Value::from(sensitivity.clone()),
        );
    }

    let context = &request.context;
    if let Some(ref geo) = context.geo {
        ctx.insert("context.geo".to_string(), Value::from(geo.clone()));
    }
    if let Some(trusted) = context.device_trusted {
        ctx.insert("context.deviceTrusted".to_string(), Value::from(trusted));
    }
    if let Some(ref tod) = context.time_of_day {
        ctx.insert("context.timeOfDay".to_string(), Value::from(tod.clone()));
    }
    if let Some(ref dow) = context.day_of_week {
        ctx.insert("context.dayOfWeek".to_string(), Value::from(dow.clone()));
    }
    if let Some(ref ip) = context.ip_address {
        ctx.insert("context.ipAddress".to_string(), Value::from(ip.clone()));
    }
    if let Some(ref ua) = context.user_agent {
        ctx.insert("context.userAgent".to_string(), Value::from(ua.clone()));
    }

    ctx.insert("action".to_string(), Value::from(request.action.clone()));
    ctx
}

/// Evaluates a condition tree against a flattened context.
#[must_use]
pub fn evaluate_node(node: &ConditionNode, ctx: &FlattenedContext) -> bool {
    match node {
        ConditionNode::All(children) => children.iter().all(|child| evaluate_node(child, ctx)),
        ConditionNode::Any(children) => children.iter().any(|child| evaluate_node(child, ctx)),
        ConditionNode::Leaf(leaf) => evaluate_leaf(leaf, ctx),
    }
}

fn evaluate_leaf(leaf: &LeafCondition, ctx: &FlattenedContext) -> bool {
    let actual = ctx.get(&leaf.path).unwrap_or(&Value::Null);
    leaf.checks
        .iter()
        .all(|check| apply_operator(actual, check.op, &check.value, &leaf.path))
}

/// Applies one operator. Type mismatches evaluate to `false`.
fn apply_operator(actual: &Value, op: Operator, expected: &Value, path: &str) -> bool {
    let result = match op {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Gt => compare(actual, expected, path) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(actual, expected, path),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(actual, expected, path) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(actual, expected, path),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => match expected.as_array() {
            Some(list) => list.contains(actual),
            None => {
                tracing::warn!(attr_path = %path, operator = %op, "Operator requires a list literal");
                false
            }
        },
        Operator::NotIn => match expected.as_array() {
            Some(list) => !list.contains(actual),
            None => {
                tracing::warn!(attr_path = %path, operator = %op, "Operator requires a list literal");
                true
            }
        },
        Operator::Contains => contains(actual, expected),
        Operator::NotContains => !contains(actual, expected),
    };

    tracing::trace!(
        attr_path = %path,
        operator = %op,
        actual = %actual,
        expected = %expected,
        result,
        "Operator applied"
    );

    result
}

/// Ordered comparison with safe, one-way coercion.
///
/// - `timeOfDay` attributes in `HH:MM` compare as minutes since midnight
/// - numbers compare numerically, strings lexicographically
/// - a string operand is coerced to float when the other side is numeric
/// - anything else is incomparable (`None`)
fn compare(actual: &Value, expected: &Value, path: &str) -> Option<Ordering> {
    if path.ends_with("timeOfDay")
        && let (Some(a), Some(b)) = (as_minutes(actual), as_minutes(expected))
    {
        return Some(a.cmp(&b));
    }

    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::Number(b)) => {
            let a: f64 = a.trim().parse().ok().or_else(|| {
                tracing::warn!(attr_path = %path, value = %a, "Value is not numeric; comparison fails");
                None
            })?;
            a.partial_cmp(&b.as_f64()?)
        }
        (Value::Number(a), Value::String(b)) => {
            let b: f64 = b.trim().parse().ok().or_else(|| {
                tracing::warn!(attr_path = %path, value = %b, "Value is not numeric; comparison fails");
                None
            })?;
            a.as_f64()?.partial_cmp(&b)
        }
        _ => None,
    }
}

fn as_minutes(value: &Value) -> Option<u32> {
    value.as_str().and_then(parse_hh_mm)
}

/// `contains` semantics: element membership on lists, substring on strings.
fn contains(container: &Value, item: &Value) -> bool {
    match container {
        Value::Array(elements) => elements.contains(item),
        Value::String(text) => text.contains(&stringify(item)),
        _ => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperatorCheck;
    use serde_json::json;

    fn leaf(path: &str, op: Operator, value: Value) -> ConditionNode {
        ConditionNode::Leaf(LeafCondition {
            path: path.to_string(),
            checks: vec![OperatorCheck { op, value }],
        })
    }

    fn ctx_from(pairs: &[(&str, Value)]) -> FlattenedContext {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_flatten_skips_absent_attributes() {
        let request: AbacRequest = serde_json::from_value(json!({
            "subject": {"dept": "HR", "riskScore": 20},
            "resource": {"type": "payroll"},
            "context": {"deviceTrusted": true, "geo": "CL"}
        }))
        .unwrap();

        let ctx = flatten_request(&request);
        assert_eq!(ctx.get("subject.dept"), Some(&json!("HR")));
        assert_eq!(ctx.get("subject.riskScore"), Some(&json!(20)));
        assert_eq!(ctx.get("resource.type"), Some(&json!("payroll")));
        assert_eq!(ctx.get("context.deviceTrusted"), Some(&json!(true)));
        assert_eq!(ctx.get("action"), Some(&json!("access")));
        assert!(!ctx.contains_key("subject.role"));
        assert!(!ctx.contains_key("resource.env"));
    }

    #[test]
    fn test_eq_and_ne() {
        let ctx = ctx_from(&[("subject.dept", json!("HR"))]);
        assert!(evaluate_node(&leaf("subject.dept", Operator::Eq, json!("HR")), &ctx));
        assert!(!evaluate_node(&leaf("subject.dept", Operator::Eq, json!("IT")), &ctx));
        assert!(evaluate_node(&leaf("subject.dept", Operator::Ne, json!("IT")), &ctx));
        // Missing attribute is null: equal only to null.
        assert!(!evaluate_node(&leaf("subject.role", Operator::Eq, json!("admin")), &ctx));
        assert!(evaluate_node(&leaf("subject.role", Operator::Eq, Value::Null), &ctx));
        assert!(evaluate_node(&leaf("subject.role", Operator::Ne, json!("admin")), &ctx));
    }

    #[test]
    fn test_relational_numeric() {
        let ctx = ctx_from(&[("subject.riskScore", json!(80))]);
        assert!(evaluate_node(&leaf("subject.riskScore", Operator::Gte, json!(70)), &ctx));
        assert!(evaluate_node(&leaf("subject.riskScore", Operator::Gt, json!(79)), &ctx));
        assert!(!evaluate_node(&leaf("subject.riskScore", Operator::Lt, json!(80)), &ctx));
        assert!(evaluate_node(&leaf("subject.riskScore", Operator::Lte, json!(80)), &ctx));
    }

    #[test]
    fn test_relational_string_coercion_is_one_way() {
        // String actual against numeric literal coerces the string.
        let ctx = ctx_from(&[("subject.riskScore", json!("75"))]);
        assert!(evaluate_node(&leaf("subject.riskScore", Operator::Gte, json!(70)), &ctx));
        // Non-numeric string cannot be coerced.
        let ctx = ctx_from(&[("subject.riskScore", json!("high"))]);
        assert!(!evaluate_node(&leaf("subject.riskScore", Operator::Gte, json!(70)), &ctx));
        // Incomparable types evaluate to false rather than erroring.
        let ctx = ctx_from(&[("subject.riskScore", json!(true))]);
        assert!(!evaluate_node(&leaf("subject.riskScore", Operator::Gte, json!(70)), &ctx));
    }

    #[test]
    fn test_relational_strings_lexicographic() {
        let ctx = ctx_from(&[("resource.classification", json!("internal"))]);
        assert!(evaluate_node(
            &leaf("resource.classification", Operator::Gt, json!("confidential")),
            &ctx
        ));
    }

    #[test]
    fn test_time_of_day_compares_minutes() {
        let ctx = ctx_from(&[("context.timeOfDay", json!("09:30"))]);
        assert!(evaluate_node(&leaf("context.timeOfDay", Operator::Gte, json!("09:00")), &ctx));
        assert!(evaluate_node(&leaf("context.timeOfDay", Operator::Lt, json!("18:00")), &ctx));
        // Lexicographic comparison would get "9:00" vs "18:00" wrong.
        let ctx = ctx_from(&[("context.timeOfDay", json!("9:00"))]);
        assert!(evaluate_node(&leaf("context.timeOfDay", Operator::Lt, json!("18:00")), &ctx));
        // Malformed time falls back to plain string comparison.
        let ctx = ctx_from(&[("context.timeOfDay", json!("soon"))]);
        assert!(evaluate_node(&leaf("context.timeOfDay", Operator::Gt, json!("later")), &ctx));
    }

    #[test]
    fn test_in_and_not_in() {
        let ctx = ctx_from(&[("context.geo", json!("US"))]);
        assert!(evaluate_node(&leaf("context.geo", Operator::In, json!(["US", "CA"])), &ctx));
        assert!(!evaluate_node(&leaf("context.geo", Operator::In, json!(["CL", "CO"])), &ctx));
        assert!(evaluate_node(&leaf("context.geo", Operator::NotIn, json!(["CL", "CO"])), &ctx));
        // Non-list literal: in is false, not_in is true.
        assert!(!evaluate_node(&leaf("context.geo", Operator::In, json!("US")), &ctx));
        assert!(evaluate_node(&leaf("context.geo", Operator::NotIn, json!("US")), &ctx));
        // Empty list: nothing is a member.
        assert!(!evaluate_node(&leaf("context.geo", Operator::In, json!([])), &ctx));
        assert!(evaluate_node(&leaf("context.geo", Operator::NotIn, json!([])), &ctx));
    }

    #[test]
    fn test_contains_on_lists_and_strings() {
        let ctx = ctx_from(&[("subject.groups", json!(["ADMINS", "HR_READERS"]))]);
        assert!(evaluate_node(&leaf("subject.groups", Operator::Contains, json!("ADMINS")), &ctx));
        assert!(!evaluate_node(&leaf("subject.groups", Operator::Contains, json!("AUDITORS")), &ctx));
        assert!(evaluate_node(
            &leaf("subject.groups", Operator::NotContains, json!("AUDITORS")),
            &ctx
        ));

        let ctx = ctx_from(&[("context.userAgent", json!("Mozilla/5.0 (X11; Linux)"))]);
        assert!(evaluate_node(&leaf("context.userAgent", Operator::Contains, json!("Linux")), &ctx));
        assert!(!evaluate_node(&leaf("context.userAgent", Operator::Contains, json!("Windows")), &ctx));

        // Scalar container: contains is false, not_contains true.
        let ctx = ctx_from(&[("subject.riskScore", json!(20))]);
        assert!(!evaluate_node(&leaf("subject.riskScore", Operator::Contains, json!(2)), &ctx));
        assert!(evaluate_node(&leaf("subject.riskScore", Operator::NotContains, json!(2)), &ctx));
    }

    #[test]
    fn test_and_short_circuit() {
        let ctx = ctx_from(&[("subject.dept", json!("HR")), ("resource.type", json!("payroll"))]);
        let node = ConditionNode::All(vec![
            leaf("subject.dept", Operator::Eq, json!("HR")),
            leaf("resource.type", Operator::Eq, json!("payroll")),
        ]);
        assert!(evaluate_node(&node, &ctx));

        let node = ConditionNode::All(vec![
            leaf("subject.dept", Operator::Eq, json!("IT")),
            leaf("resource.type", Operator::Eq, json!("payroll")),
        ]);
        assert!(!evaluate_node(&node, &ctx));
    }

    #[test]
    fn test_or_any_child() {
        let ctx = ctx_from(&[("subject.riskScore", json!(80)), ("context.geo", json!("CL"))]);
        let node = ConditionNode::Any(vec![
            leaf("subject.riskScore", Operator::Gte, json!(70)),
            leaf("context.geo", Operator::NotIn, json!(["CL", "CO"])),
        ]);
        assert!(evaluate_node(&node, &ctx));

        let ctx = ctx_from(&[("subject.riskScore", json!(10)), ("context.geo", json!("CL"))]);
        assert!(!evaluate_node(&node, &ctx));
    }

    #[test]
    fn test_multiple_checks_on_one_leaf_are_and_joined() {
        let node = ConditionNode::Leaf(LeafCondition {
            path: "subject.riskScore".to_string(),
            checks: vec![
                OperatorCheck {
                    op: Operator::Gte,
                    value: json!(10),
                },
                OperatorCheck {
                    op: Operator::Lt,
                    value: json!(50),
                },
            ],
        });
        assert!(evaluate_node(&node, &ctx_from(&[("subject.riskScore", json!(30))])));
        assert!(!evaluate_node(&node, &ctx_from(&[("subject.riskScore", json!(80))])));
    }
}
