use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured interpretation of a single journal entry as produced by the
/// generative provider (or supplied pre-generated by the client).
///
/// The five required fields must all be present and non-empty for the
/// analysis to be considered valid; the optional fields never affect
/// validity. The wire shape is camelCase on both the provider and client
/// paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredAnalysis {
    pub summary: String,
    pub key_symbols: Vec<String>,
    pub archetypes: Vec<String>,
    pub emotional_themes: Vec<String>,
    pub guided_reflection: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_connections: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_recognition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective_analysis: Option<String>,
}

/// Why a candidate analysis was rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("analysis payload is not a JSON object")]
    NotAnObject,
    #[error("analysis payload failed to deserialize: {0}")]
    Malformed(String),
    #[error("analysis is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

impl StructuredAnalysis {
    /// Checks the required-field rules. Pure and idempotent; lists must be
    /// non-empty and strings non-empty after trimming.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if self.summary.trim().is_empty() {
            missing.push("summary");
        }
        if self.key_symbols.is_empty() {
            missing.push("keySymbols");
        }
        if self.archetypes.is_empty() {
            missing.push("archetypes");
        }
        if self.emotional_themes.is_empty() {
            missing.push("emotionalThemes");
        }
        if self.guided_reflection.is_empty() {
            missing.push("guidedReflection");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }
}

/// Parses a candidate payload into a valid [`StructuredAnalysis`].
///
/// This is an explicit tagged parse: the result is either a fully typed,
/// validated analysis or an error enumerating what was wrong. No coercion
/// of near-miss payloads is attempted, and the same rules apply whether the
/// payload came from the client or fresh from the provider.
pub fn parse_analysis(raw: &serde_json::Value) -> Result<StructuredAnalysis, ValidationError> {
    if !raw.is_object() {
        return Err(ValidationError::NotAnObject);
    }
    let candidate: StructuredAnalysis = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    candidate.validate()?;
    Ok(candidate)
}
