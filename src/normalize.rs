//! Output normalization — the `StepResult` contract.
//!
//! Every node handler returns a `StepResult`, whether its reasoning came
//! from the collaborator or from deterministic logic. `normalize` is a total
//! function: whatever the collaborator produced (truncated JSON, markdown
//! fencing, prose, nothing), the caller gets a valid StepResult back.

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

/// A suggested quick-reply option. `value` is what comes back verbatim when
/// the user taps it, which is what quick-match keys on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    pub label: String,
    pub value: String,
}

impl QuickReply {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// A reply whose value is its label.
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            value: text.clone(),
            label: text,
        }
    }
}

/// A service mapped against the taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSelection {
    /// What the user (or the collaborator) called it.
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub category_name: String,
    #[serde(default)]
    pub category_id: u32,
    #[serde(default)]
    pub subcategory_name: String,
    #[serde(default)]
    pub subcategory_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ServiceSelection {
    /// Best display name for this selection.
    pub fn display_name(&self) -> &str {
        if self.subcategory_name.is_empty() {
            &self.input
        } else {
            &self.subcategory_name
        }
    }
}

/// The collaborator's qualitative coverage output. Feeds the geo resolver;
/// never trusted as the final coverage itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoveragePatch {
    #[serde(default)]
    pub base_suburb: String,
    #[serde(default)]
    pub base_postcode: String,
    #[serde(default)]
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub regions_included: Vec<String>,
    #[serde(default)]
    pub regions_excluded: Vec<String>,
    #[serde(default)]
    pub barriers: Vec<String>,
    #[serde(default)]
    pub everywhere: bool,
    #[serde(default)]
    pub travel_notes: String,
}

/// A plan selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanChoice {
    pub plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// A typed fragment of collected facts produced by one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ServiceSelection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoveragePatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanChoice>,
}

impl FactsPatch {
    pub fn is_empty(&self) -> bool {
        self.services.is_none() && self.coverage.is_none() && self.plan.is_none()
    }
}

/// The normalized output of every node handler.
///
/// `options` distinguishes absent from explicitly empty: `None` means the
/// step produced no option list and the previous node's options remain in
/// effect; `Some(vec![])` means "no options, free text expected". Collapsing
/// the two leaks stale option lists across turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<QuickReply>>,
    #[serde(default, skip_serializing_if = "FactsPatch::is_empty")]
    pub facts: FactsPatch,
    pub step_complete: bool,
}

impl StepResult {
    /// A plain message with explicitly no options.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            message: text.into(),
            options: Some(Vec::new()),
            facts: FactsPatch::default(),
            step_complete: false,
        }
    }

    pub fn with_options(mut self, options: Vec<QuickReply>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_facts(mut self, facts: FactsPatch) -> Self {
        self.facts = facts;
        self
    }

    pub fn complete(mut self) -> Self {
        self.step_complete = true;
        self
    }

    /// Post-normalization schema check. A violation here is an
    /// implementation bug, not a user-facing condition.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if let Some(ref options) = self.options {
            for option in options {
                if option.value.is_empty() {
                    return Err(InvariantViolation::MalformedStepResult {
                        reason: format!("option '{}' has an empty value", option.label),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The collaborator's raw payload shape. Buttons may be bare strings or
/// label/value pairs; both normalize to `QuickReply`.
#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(alias = "message")]
    response: String,
    #[serde(default)]
    buttons: Option<Vec<ButtonSpec>>,
    #[serde(default)]
    services: Option<Vec<ServiceSelection>>,
    #[serde(default)]
    service_areas: Option<CoveragePatch>,
    #[serde(default)]
    plan: Option<PlanChoice>,
    #[serde(default)]
    step_complete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ButtonSpec {
    Plain(String),
    Full { label: String, value: String },
}

impl From<ButtonSpec> for QuickReply {
    fn from(button: ButtonSpec) -> Self {
        match button {
            ButtonSpec::Plain(text) => QuickReply::plain(text),
            ButtonSpec::Full { label, value } => QuickReply { label, value },
        }
    }
}

impl From<RawPayload> for StepResult {
    fn from(payload: RawPayload) -> Self {
        StepResult {
            message: payload.response,
            options: payload
                .buttons
                .map(|buttons| buttons.into_iter().map(QuickReply::from).collect()),
            facts: FactsPatch {
                services: payload.services,
                coverage: payload.service_areas,
                plan: payload.plan,
            },
            step_complete: payload.step_complete,
        }
    }
}

/// Normalize raw collaborator output into a `StepResult`. Total — never
/// fails.
///
/// Policy, in order: strict parse; strip one layer of fencing/prose and
/// retry once; degrade to a message-only result with explicitly no options
/// and `step_complete = false`.
pub fn normalize(raw: &str) -> StepResult {
    let trimmed = raw.trim();

    if let Ok(payload) = serde_json::from_str::<RawPayload>(trimmed) {
        return payload.into();
    }

    if let Some(inner) = strip_wrapper(trimmed) {
        if let Ok(payload) = serde_json::from_str::<RawPayload>(&inner) {
            return payload.into();
        }
    }

    tracing::debug!(
        len = raw.len(),
        "Collaborator output not parseable, degrading to message-only StepResult"
    );
    StepResult {
        message: raw.to_string(),
        options: Some(Vec::new()),
        facts: FactsPatch::default(),
        step_complete: false,
    }
}

/// Strip markdown fencing and surrounding prose, returning the outermost
/// JSON object if one is present.
fn strip_wrapper(text: &str) -> Option<String> {
    let mut candidate = text;

    // ```json ... ``` fencing
    if candidate.contains("```") {
        let mut parts = candidate.splitn(3, "```");
        let _before = parts.next();
        candidate = parts.next().unwrap_or(candidate);
        candidate = candidate.strip_prefix("json").unwrap_or(candidate);
    }

    // First '{' to last '}' — drops leading/trailing prose
    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(candidate[start..=end].to_string())
}
