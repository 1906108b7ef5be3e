//! Core ABAC types: decisions, operators, condition trees, policies, and
//! the request/response shapes of the evaluation API.
//!
//! The condition tree is a closed sum type built once at policy load time;
//! evaluation dispatches on variant tags rather than re-inspecting JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Decision
// =============================================================================

/// Outcome of an authorization evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    /// Access is granted.
    Permit,
    /// Access is refused.
    Deny,
    /// Additional authentication is required before access can be granted.
    Challenge,
}

impl Decision {
    /// Returns the decision name as used on the wire and in policy files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permit => "Permit",
            Self::Deny => "Deny",
            Self::Challenge => "Challenge",
        }
    }

    /// Parses a decision from its wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Permit" => Some(Self::Permit),
            "Deny" => Some(Self::Deny),
            "Challenge" => Some(Self::Challenge),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Comparison operators usable in policy leaf conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Structural equality.
    Eq,
    /// Structural inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Membership of the actual value in a list literal.
    In,
    /// Non-membership of the actual value in a list literal.
    NotIn,
    /// Element membership (lists) or substring (strings).
    Contains,
    /// Negation of `Contains`.
    NotContains,
}

impl Operator {
    /// All supported operators, in the order they are documented.
    pub const ALL: [Operator; 10] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Contains,
        Self::NotContains,
    ];

    /// Returns the operator name as used in policy files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
        }
    }

    /// Parses an operator from its policy-file name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == value)
    }

    /// Returns `true` for the relational operators (`gt`, `gte`, `lt`, `lte`).
    #[must_use]
    pub fn is_relational(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }

    /// Returns `true` for the list-membership operators (`in`, `not_in`).
    #[must_use]
    pub fn requires_list_literal(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Condition Tree
// =============================================================================

/// A single operator check against an attribute value.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorCheck {
    /// Operator to apply.
    pub op: Operator,
    /// Expected value literal from the policy file.
    pub value: serde_json::Value,
}

/// Leaf predicate over one attribute path.
///
/// Multiple checks on the same leaf are AND-joined, matching the policy
/// grammar where one attribute object may carry several operators.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafCondition {
    /// Attribute path (`subject.dept`, `resource.env`, `context.geo`, `action`).
    pub path: String,
    /// Operator checks, all of which must hold.
    pub checks: Vec<OperatorCheck>,
}

/// Boolean expression tree attached to a policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    /// All children must evaluate true (short-circuits on false).
    All(Vec<ConditionNode>),
    /// Any child true yields true (short-circuits on true).
    Any(Vec<ConditionNode>),
    /// Single attribute predicate.
    Leaf(LeafCondition),
}

// =============================================================================
// Policies
// =============================================================================

/// Default priority assigned when a policy omits one.
pub const DEFAULT_PRIORITY: i64 = 100;

/// A loaded, validated ABAC policy. Immutable between reloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Unique rule identifier.
    pub rule_id: String,
    /// Effect when the conditions evaluate true.
    pub effect: Decision,
    /// Human-readable description.
    pub description: String,
    /// Evaluation priority; lower values are evaluated earlier.
    pub priority: i64,
    /// Compiled condition tree.
    pub conditions: ConditionNode,
}

/// Distribution of effects across a policy set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EffectsDistribution {
    /// Number of Permit policies.
    #[serde(rename = "Permit")]
    pub permit: usize,
    /// Number of Deny policies.
    #[serde(rename = "Deny")]
    pub deny: usize,
    /// Number of Challenge policies.
    #[serde(rename = "Challenge")]
    pub challenge: usize,
}

/// Ordered set of policies loaded from one file.
///
/// Policies are sorted by ascending priority; ties keep file order
/// (the sort is stable).
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySet {
    /// Version string from the policy file.
    pub version: String,
    /// Description from the policy file.
    pub description: String,
    /// Policies in evaluation order.
    pub policies: Vec<Policy>,
}

impl PolicySet {
    /// An empty policy set (used when the backing file is absent).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: "1.0".to_string(),
            description: String::new(),
            policies: Vec::new(),
        }
    }

    /// Counts policies per effect.
    #[must_use]
    pub fn effects_distribution(&self) -> EffectsDistribution {
        let mut dist = EffectsDistribution::default();
        for policy in &self.policies {
            match policy.effect {
                Decision::Permit => dist.permit += 1,
                Decision::Deny => dist.deny += 1,
                Decision::Challenge => dist.challenge += 1,
            }
        }
        dist
    }
}

// =============================================================================
// Validation Result
// =============================================================================

/// Outcome of validating a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// `true` when no errors were found.
    pub valid: bool,
    /// Accumulated errors, prefixed with `Policy <n>:` where applicable.
    pub errors: Vec<String>,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
    /// Number of policies examined.
    pub policies_count: usize,
}

impl ValidationResult {
    /// A passing result for the given number of policies.
    #[must_use]
    pub fn ok(policies_count: usize) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            policies_count,
        }
    }

    /// A failing result carrying a single error.
    #[must_use]
    pub fn failed(error: impl Into<String>, policies_count: usize) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
            policies_count,
        }
    }
}

// =============================================================================
// Request Attribute Bags
// =============================================================================

/// Attributes describing the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectAttributes {
    /// Department of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dept: Option<String>,

    /// Groups the user belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    /// Risk score in `[0, 100]`.
    #[serde(rename = "riskScore", skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<i64>,

    /// Role of the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Clearance level of the user.
    #[serde(rename = "clearanceLevel", skip_serializing_if = "Option::is_none")]
    pub clearance_level: Option<String>,
}

/// Attributes describing what is being accessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttributes {
    /// Resource type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Environment (dev, test, prod).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,

    /// Security classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    /// Resource owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Sensitivity level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<String>,
}

/// Environmental attributes of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextAttributes {
    /// Country code (ISO 3166-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,

    /// Whether the device is trusted.
    #[serde(rename = "deviceTrusted", skip_serializing_if = "Option::is_none")]
    pub device_trusted: Option<bool>,

    /// Time of day in `HH:MM`.
    #[serde(rename = "timeOfDay", skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<String>,

    /// Day of the week.
    #[serde(rename = "dayOfWeek", skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,

    /// Client IP address.
    #[serde(rename = "ipAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Client user agent.
    #[serde(rename = "userAgent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_action() -> String {
    "access".to_string()
}

/// An authorization request: three attribute bags plus an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbacRequest {
    /// Caller attributes.
    #[serde(default)]
    pub subject: SubjectAttributes,

    /// Resource attributes.
    #[serde(default)]
    pub resource: ResourceAttributes,

    /// Environmental attributes.
    #[serde(default)]
    pub context: ContextAttributes,

    /// Requested action, defaulting to `"access"`.
    #[serde(default = "default_action")]
    pub action: String,
}

impl Default for AbacRequest {
    fn default() -> Self {
        Self {
            subject: SubjectAttributes::default(),
            resource: ResourceAttributes::default(),
            context: ContextAttributes::default(),
            action: default_action(),
        }
    }
}

impl AbacRequest {
    /// Validates boundary constraints on the attribute bags.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint:
    /// `riskScore` outside `[0, 100]` or `timeOfDay` not in `HH:MM`.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(score) = self.subject.risk_score
            && !(0..=100).contains(&score)
        {
            return Err(format!("subject.riskScore must be in [0, 100], got {score}"));
        }
        if let Some(ref tod) = self.context.time_of_day
            && parse_hh_mm(tod).is_none()
        {
            return Err(format!("context.timeOfDay must be HH:MM, got '{tod}'"));
        }
        Ok(())
    }
}

/// Parses an `HH:MM` string into minutes since midnight.
///
/// Hours `0..=23` (one or two digits), minutes `00..=59` (two digits).
#[must_use]
pub fn parse_hh_mm(value: &str) -> Option<u32> {
    let (hours, minutes) = value.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let h: u32 = hours.parse().ok()?;
    let m: u32 = minutes.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

// =============================================================================
// Response
// =============================================================================

/// An authorization decision with supporting detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbacResponse {
    /// Final decision.
    pub decision: Decision,
    /// Rule references (or default-deny explanation) behind the decision.
    pub reasons: Vec<String>,
    /// Advice for the caller.
    #[serde(default)]
    pub advice: Vec<String>,
    /// Obligations the enforcement point must carry out.
    #[serde(default)]
    pub obligations: Vec<String>,
}

/// Flattened evaluation context: `domain.name` keys to attribute values.
///
/// A `BTreeMap` keeps the keys sorted, which both makes leaf lookup simple
/// and gives the decision cache a canonical ordering to fingerprint.
pub type FlattenedContext = BTreeMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_roundtrip() {
        for d in [Decision::Permit, Decision::Deny, Decision::Challenge] {
            assert_eq!(Decision::parse(d.as_str()), Some(d));
        }
        assert_eq!(Decision::parse("Allow"), None);
    }

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("eq"), Some(Operator::Eq));
        assert_eq!(Operator::parse("not_in"), Some(Operator::NotIn));
        assert_eq!(Operator::parse("not_contains"), Some(Operator::NotContains));
        assert_eq!(Operator::parse("matches"), None);
    }

    #[test]
    fn test_operator_classification() {
        assert!(Operator::Gt.is_relational());
        assert!(Operator::Lte.is_relational());
        assert!(!Operator::Eq.is_relational());
        assert!(Operator::In.requires_list_literal());
        assert!(Operator::NotIn.requires_list_literal());
        assert!(!Operator::Contains.requires_list_literal());
    }

    #[test]
    fn test_parse_hh_mm_boundaries() {
        assert_eq!(parse_hh_mm("00:00"), Some(0));
        assert_eq!(parse_hh_mm("23:59"), Some(23 * 60 + 59));
        assert_eq!(parse_hh_mm("9:30"), Some(9 * 60 + 30));
        assert_eq!(parse_hh_mm("24:00"), None);
        assert_eq!(parse_hh_mm("12:60"), None);
        assert_eq!(parse_hh_mm("12:5"), None);
        assert_eq!(parse_hh_mm("noon"), None);
        assert_eq!(parse_hh_mm(""), None);
    }

    #[test]
    fn test_request_validation_boundaries() {
        let mut request = AbacRequest::default();
        request.subject.risk_score = Some(0);
        assert!(request.validate().is_ok());
        request.subject.risk_score = Some(100);
        assert!(request.validate().is_ok());
        request.subject.risk_score = Some(101);
        assert!(request.validate().is_err());
        request.subject.risk_score = Some(-1);
        assert!(request.validate().is_err());

        request.subject.risk_score = Some(50);
        request.context.time_of_day = Some("23:59".to_string());
        assert!(request.validate().is_ok());
        request.context.time_of_day = Some("24:00".to_string());
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_action_default() {
        let request: AbacRequest = serde_json::from_value(serde_json::json!({
            "subject": {"dept": "HR"},
            "resource": {"type": "payroll"},
            "context": {}
        }))
        .unwrap();
        assert_eq!(request.action, "access");
        assert_eq!(request.subject.dept.as_deref(), Some("HR"));
        assert_eq!(request.resource.resource_type.as_deref(), Some("payroll"));
    }

    #[test]
    fn test_effects_distribution() {
        let leaf = ConditionNode::Leaf(LeafCondition {
            path: "action".to_string(),
            checks: vec![OperatorCheck {
                op: Operator::Eq,
                value: serde_json::json!("access"),
            }],
        });
        let mk = |id: &str, effect| Policy {
            rule_id: id.to_string(),
            effect,
            description: String::new(),
            priority: DEFAULT_PRIORITY,
            conditions: leaf.clone(),
        };
        let set = PolicySet {
            version: "1.0".to_string(),
            description: String::new(),
            policies: vec![
                mk("a", Decision::Permit),
                mk("b", Decision::Deny),
                mk("c", Decision::Permit),
            ],
        };
        let dist = set.effects_distribution();
        assert_eq!(dist.permit, 2);
        assert_eq!(dist.deny, 1);
        assert_eq!(dist.challenge, 0);
    }
}
