//! Policy document validation and compilation.
//!
//! The validator walks the raw JSON document accumulating per-policy errors
//! (prefixed `Policy <n>:`) instead of failing fast, then applies set-level
//! checks: duplicate rule ids, missing Permit effects, and priority
//! clustering. Compilation turns a valid document into a [`PolicySet`] with
//! tagged condition trees, sorted by ascending priority (stable, so ties
//! keep file order).

use std::collections::HashSet;

use serde_json::Value;

use crate::model::{
    ConditionNode, DEFAULT_PRIORITY, Decision, LeafCondition, Operator, OperatorCheck, Policy,
    PolicySet, ValidationResult,
};

/// Attribute names allowed under `subject.`.
const SUBJECT_ATTRIBUTES: &[&str] = &["dept", "groups", "riskScore", "role", "clearanceLevel"];

/// Attribute names allowed under `resource.`.
const RESOURCE_ATTRIBUTES: &[&str] = &["type", "env", "classification", "owner", "sensitivity"];

/// Attribute names allowed under `context.`.
const CONTEXT_ATTRIBUTES: &[&str] = &[
    "geo",
    "deviceTrusted",
    "timeOfDay",
    "dayOfWeek",
    "ipAddress",
    "userAgent",
];

/// Syntactic and semantic validator for ABAC policy documents.
pub struct PolicyValidator;

impl PolicyValidator {
    /// Validates a policy document without building a policy set.
    #[must_use]
    pub fn validate_document(document: &Value) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let Some(policies) = document.get("policies").and_then(Value::as_array) else {
            errors.push("Missing 'policies' list in policy document".to_string());
            return ValidationResult {
                valid: false,
                errors,
                warnings,
                policies_count: 0,
            };
        };

        for (index, policy) in policies.iter().enumerate() {
            Self::validate_policy(policy, index, &mut errors, &mut warnings);
        }

        Self::validate_set_rules(policies, &mut errors, &mut warnings);

        ValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            policies_count: policies.len(),
        }
    }

    /// Validates and compiles a document into an ordered [`PolicySet`].
    ///
    /// # Errors
    ///
    /// Returns the failing [`ValidationResult`] when the document has errors.
    pub fn compile_document(document: &Value) -> Result<PolicySet, ValidationResult> {
        let result = Self::validate_document(document);
        if !result.valid {
            return Err(result);
        }

        let raw_policies = document
            .get("policies")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut policies = Vec::with_capacity(raw_policies.len());
        for raw in &raw_policies {
            policies.push(Self::compile_policy(raw));
        }
        // Stable sort: ties keep file order.
        policies.sort_by_key(|p| p.priority);

        Ok(PolicySet {
            version: document
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or("1.0")
                .to_string(),
            description: document
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            policies,
        })
    }

    fn validate_policy(
        policy: &Value,
        index: usize,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let prefix = format!("Policy {index}");

        let Some(object) = policy.as_object() else {
            errors.push(format!("{prefix}: Policy must be an object"));
            return;
        };

        for field in ["ruleId", "effect", "description", "conditions"] {
            if !object.contains_key(field) {
                errors.push(format!("{prefix}: Missing required field '{field}'"));
            }
        }

        if let Some(rule_id) = object.get("ruleId") {
            match rule_id.as_str() {
                Some(id) if !id.trim().is_empty() => {}
                _ => errors.push(format!("{prefix}: ruleId must be a non-empty string")),
            }
        }

        if let Some(effect) = object.get("effect") {
            let valid = effect.as_str().and_then(Decision::parse).is_some();
            if !valid {
                errors.push(format!(
                    "{prefix}: Invalid effect '{}'. Must be one of Permit, Deny, Challenge",
                    display_value(effect)
                ));
            }
        }

        if let Some(priority) = object.get("priority")
            && !priority.as_i64().is_some_and(|p| p >= 0)
        {
            errors.push(format!("{prefix}: Priority must be a non-negative integer"));
        }

        if let Some(conditions) = object.get("conditions") {
            Self::validate_conditions(conditions, &prefix, errors, warnings);
        }
    }

    fn validate_conditions(
        conditions: &Value,
        prefix: &str,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let Some(object) = conditions.as_object() else {
            errors.push(format!("{prefix}: Conditions must be an object"));
            return;
        };

        if object.is_empty() {
            errors.push(format!("{prefix}: Conditions must not be empty"));
            return;
        }

        for logical in ["AND", "OR"] {
            if let Some(branch) = object.get(logical) {
                let Some(children) = branch.as_array() else {
                    errors.push(format!(
                        "{prefix}: {logical} must contain a list of conditions"
                    ));
                    return;
                };
                if children.is_empty() {
                    errors.push(format!(
                        "{prefix}: {logical} must contain at least one condition"
                    ));
                }
                for (i, child) in children.iter().enumerate() {
                    Self::validate_conditions(
                        child,
                        &format!("{prefix}.{logical}[{i}]"),
                        errors,
                        warnings,
                    );
                }
                return;
            }
        }

        // Leaf object: attribute paths mapped to operator objects.
        for (attr_path, spec) in object {
            Self::validate_attribute_path(attr_path, prefix, errors);

            let Some(checks) = spec.as_object() else {
                errors.push(format!(
                    "{prefix}: Condition for '{attr_path}' must be an object"
                ));
                continue;
            };

            for (op_name, value) in checks {
                let Some(op) = Operator::parse(op_name) else {
                    errors.push(format!(
                        "{prefix}: Unsupported operator '{op_name}' for '{attr_path}'"
                    ));
                    continue;
                };
                Self::validate_operator_value(op, value, attr_path, prefix, errors);
            }
        }
    }

    fn validate_attribute_path(attr_path: &str, prefix: &str, errors: &mut Vec<String>) {
        if attr_path == "action" {
            return;
        }

        let Some((domain, attribute)) = attr_path.split_once('.') else {
            errors.push(format!(
                "{prefix}: Attribute path '{attr_path}' must be 'action' or contain a domain (subject/resource/context)"
            ));
            return;
        };

        let allowed = match domain {
            "subject" => SUBJECT_ATTRIBUTES,
            "resource" => RESOURCE_ATTRIBUTES,
            "context" => CONTEXT_ATTRIBUTES,
            _ => {
                errors.push(format!(
                    "{prefix}: Invalid domain '{domain}' in '{attr_path}'. Must be one of subject, resource, context"
                ));
                return;
            }
        };

        if !allowed.contains(&attribute) {
            errors.push(format!(
                "{prefix}: Invalid attribute '{attribute}' for domain '{domain}'. Valid attributes: {allowed:?}"
            ));
        }
    }

    fn validate_operator_value(
        op: Operator,
        value: &Value,
        attr_path: &str,
        prefix: &str,
        errors: &mut Vec<String>,
    ) {
        if op.requires_list_literal() && !value.is_array() {
            errors.push(format!(
                "{prefix}: Operator '{op}' for '{attr_path}' requires a list value"
            ));
        }
        if op.is_relational() && !(value.is_number() || value.is_string()) {
            errors.push(format!(
                "{prefix}: Operator '{op}' for '{attr_path}' requires a comparable value"
            ));
        }
    }

    fn validate_set_rules(policies: &[Value], errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        let rule_ids: Vec<&str> = policies
            .iter()
            .filter_map(|p| p.get("ruleId").and_then(Value::as_str))
            .collect();

        let mut seen = HashSet::new();
        let mut duplicates: Vec<&str> = Vec::new();
        for id in &rule_ids {
            if !seen.insert(*id) && !duplicates.contains(id) {
                duplicates.push(id);
            }
        }
        if !duplicates.is_empty() {
            errors.push(format!("Duplicate ruleIds found: {duplicates:?}"));
        }

        let has_permit = policies
            .iter()
            .any(|p| p.get("effect").and_then(Value::as_str) == Some("Permit"));
        if !policies.is_empty() && !has_permit {
            warnings.push(
                "No Permit policies found - this may result in all requests being denied"
                    .to_string(),
            );
        }

        let priorities: HashSet<i64> = policies
            .iter()
            .map(|p| {
                p.get("priority")
                    .and_then(Value::as_i64)
                    .unwrap_or(DEFAULT_PRIORITY)
            })
            .collect();
        if !policies.is_empty() && priorities.len() * 2 < policies.len() {
            warnings.push(
                "Many policies have the same priority - consider adjusting for better evaluation order"
                    .to_string(),
            );
        }
    }

    /// Compiles one raw policy object. Only called on validated input.
    fn compile_policy(raw: &Value) -> Policy {
        Policy {
            rule_id: raw
                .get("ruleId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            effect: raw
                .get("effect")
                .and_then(Value::as_str)
                .and_then(Decision::parse)
                .unwrap_or(Decision::Deny),
            description: raw
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            priority: raw
                .get("priority")
                .and_then(Value::as_i64)
                .unwrap_or(DEFAULT_PRIORITY),
            conditions: Self::compile_conditions(raw.get("conditions").unwrap_or(&Value::Null)),
        }
    }

    /// Builds the tagged condition tree from a validated conditions object.
    fn compile_conditions(conditions: &Value) -> ConditionNode {
        let Some(object) = conditions.as_object() else {
            return ConditionNode::All(Vec::new());
        };

        if let Some(children) = object.get("AND").and_then(Value::as_array) {
            return ConditionNode::All(children.iter().map(Self::compile_conditions).collect());
        }
        if let Some(children) = object.get("OR").and_then(Value::as_array) {
            return ConditionNode::Any(children.iter().map(Self::compile_conditions).collect());
        }

        let mut leaves = Vec::with_capacity(object.len());
        for (attr_path, spec) in object {
            let checks = spec
                .as_object()
                .map(|ops| {
                    ops.iter()
                        .filter_map(|(name, value)| {
                            Operator::parse(name).map(|op| OperatorCheck {
                                op,
                                value: value.clone(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            leaves.push(ConditionNode::Leaf(LeafCondition {
                path: attr_path.clone(),
                checks,
            }));
        }

        if leaves.len() == 1 {
            leaves.swap_remove(0)
        } else {
            ConditionNode::All(leaves)
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
