use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Placeholders frozen into a [`FinalSummary`] when a field was never filled.
pub const NO_TRANSLATION: &str = "(not entered)";
pub const NO_EVALUATION: &str = "(no evaluation)";
pub const NO_SUGGESTION: &str = "(no AI assistance)";

/// How the simplification stage behaves: pick one of several ranked rewrites,
/// or confirm a single best rewrite with its translatability score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimplifyPolicy {
    #[default]
    #[serde(alias = "candidates")]
    CandidateBatch,
    #[serde(alias = "single")]
    SingleResult,
}

impl SimplifyPolicy {
    /// Stage entered after a successful simplification.
    pub fn review_stage(self) -> Stage {
        match self {
            SimplifyPolicy::CandidateBatch => Stage::Select,
            SimplifyPolicy::SingleResult => Stage::Confirm,
        }
    }
}

impl std::str::FromStr for SimplifyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "candidates" | "candidate_batch" | "batch" => Ok(SimplifyPolicy::CandidateBatch),
            "single" | "single_result" => Ok(SimplifyPolicy::SingleResult),
            other => Err(format!(
                "unknown policy '{other}' (expected 'candidates' or 'single')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Input,
    /// Choose one of the backend's ranked candidates.
    Select,
    /// Accept the backend's single simplified sentence.
    Confirm,
    Translate,
    Final,
}

impl Stage {
    pub fn title(self) -> &'static str {
        match self {
            Stage::Input => "1. Source sentence",
            Stage::Select => "2. Choose a rewrite",
            Stage::Confirm => "2. Confirm the rewrite",
            Stage::Translate => "3. Translate",
            Stage::Final => "4. Review",
        }
    }

    /// True once the simplified text has been accepted.
    pub fn is_past_review(self) -> bool {
        matches!(self, Stage::Translate | Stage::Final)
    }
}

/// Actions that talk to the backend. Each may have at most one request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    Simplify,
    Assist,
    Evaluate,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Simplify => "simplify",
            Trigger::Assist => "assist",
            Trigger::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// Candidate identifier. The backend sends numbers or strings; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for CandidateId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for CandidateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => CandidateId(n.to_string()),
            Raw::Float(f) => CandidateId(f.to_string()),
            Raw::Text(s) => CandidateId(s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub text: String,
    #[serde(default)]
    pub explanation: String,
}

/// Successful `/simplify` payload, in whichever shape the backend produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SimplifyReply {
    Candidates(Vec<Candidate>),
    Single { text: String, score: Option<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub comment: String,
}

impl Evaluation {
    pub fn to_display(&self) -> String {
        format!("Score: {}/100\n{}", self.score, self.comment)
    }
}

/// The single mutable record for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub stage: Stage,
    pub original_text: String,
    pub simplified_text: String,
    pub simplified_score: Option<f64>,
    pub candidates: Vec<Candidate>,
    pub selected_candidate: Option<CandidateId>,
    pub learner_translation: String,
    pub ai_suggestion: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub temperature: f64,
    pub final_summary: Option<FinalSummary>,
}

impl Session {
    pub fn new(temperature: f64) -> Self {
        Self {
            stage: Stage::Input,
            original_text: String::new(),
            simplified_text: String::new(),
            simplified_score: None,
            candidates: Vec::new(),
            selected_candidate: None,
            learner_translation: String::new(),
            ai_suggestion: None,
            evaluation: None,
            temperature,
            final_summary: None,
        }
    }

    pub fn candidate(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    pub fn selected(&self) -> Option<&Candidate> {
        self.selected_candidate
            .as_ref()
            .and_then(|id| self.candidate(id))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE)
    }
}

/// Frozen record shown on the review screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub completed_at: String,
    pub original: String,
    pub simplified: String,
    pub learner_translation: String,
    pub evaluation: String,
    pub ai_suggestion: String,
}

/// Labelled band of the temperature slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureBand {
    pub label: &'static str,
    pub description: &'static str,
}

/// Map a temperature to one of five bands, matching a 0..=10 slider.
pub fn temperature_band(temperature: f64) -> TemperatureBand {
    let step = (temperature * 10.0).round() as i64;
    if step <= 2 {
        TemperatureBand {
            label: "Conservative",
            description: "Stays very close to the original; candidates are similar and predictable.",
        }
    } else if step <= 4 {
        TemperatureBand {
            label: "Somewhat conservative",
            description: "Faithful to the original while trying small variations in wording.",
        }
    } else if step <= 6 {
        TemperatureBand {
            label: "Balanced",
            description: "Moderately diverse candidates that still track the original closely.",
        }
    } else if step <= 8 {
        TemperatureBand {
            label: "Somewhat creative",
            description: "More diverse candidates; boldly different phrasing for the same meaning.",
        }
    } else {
        TemperatureBand {
            label: "Creative",
            description: "Highly diverse candidates with very different sentence structures.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_ids_accept_numbers_and_strings() {
        let parsed: Vec<Candidate> = serde_json::from_str(
            r#"[{"id": 1, "text": "a", "explanation": "x"}, {"id": "b", "text": "b"}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].id, CandidateId::from(1));
        assert_eq!(parsed[1].id.as_str(), "b");
        assert_eq!(parsed[1].explanation, "");
    }

    #[test]
    fn temperature_bands_follow_slider_steps() {
        assert_eq!(temperature_band(0.0).label, "Conservative");
        assert_eq!(temperature_band(0.2).label, "Conservative");
        assert_eq!(temperature_band(0.3).label, "Somewhat conservative");
        assert_eq!(temperature_band(0.5).label, "Balanced");
        assert_eq!(temperature_band(0.7).label, "Somewhat creative");
        assert_eq!(temperature_band(1.0).label, "Creative");
    }

    #[test]
    fn policy_parses_short_names() {
        assert_eq!(
            "single".parse::<SimplifyPolicy>().unwrap(),
            SimplifyPolicy::SingleResult
        );
        assert_eq!(
            "Candidates".parse::<SimplifyPolicy>().unwrap(),
            SimplifyPolicy::CandidateBatch
        );
        assert!("both".parse::<SimplifyPolicy>().is_err());
    }
}
