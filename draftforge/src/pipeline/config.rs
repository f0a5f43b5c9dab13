//! Per-job pipeline configuration: stage→provider bindings, prompt parsing,
//! and the style/layout instruction contract.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::GenerationError;
use crate::pipeline::StageId;
use crate::provider::ProviderKind;

/// Default article length in characters when the prompt names none.
pub const DEFAULT_TARGET_LENGTH: u32 = 1500;

/// Binding of one stage to a provider kind and model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBinding {
    /// Which provider family runs the stage.
    pub kind: ProviderKind,
    /// Model identifier passed to the provider.
    pub model: String,
}

impl StageBinding {
    /// Creates a binding with the kind's default model.
    #[must_use]
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: kind.default_model().to_string(),
        }
    }

    /// Creates a binding with an explicit model.
    #[must_use]
    pub fn with_model(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
        }
    }
}

/// The per-job choice of which provider backs each stage.
///
/// Runtime data attached to the request, never a compile-time branch. A job
/// may mix providers across stages; unspecified stages use the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProviders {
    bindings: HashMap<StageId, StageBinding>,
}

impl Default for StageProviders {
    fn default() -> Self {
        let bindings = StageId::ALL
            .into_iter()
            .map(|stage| (stage, default_binding(stage)))
            .collect();
        Self { bindings }
    }
}

fn default_binding(stage: StageId) -> StageBinding {
    let kind = match stage {
        StageId::Opener | StageId::Editor => ProviderKind::OpenAi,
        StageId::Researcher => ProviderKind::Perplexity,
        StageId::Writer => ProviderKind::Gemini,
    };
    StageBinding::new(kind)
}

impl StageProviders {
    /// The binding for a stage. Stages absent from a deserialized config get
    /// their default binding.
    #[must_use]
    pub fn binding(&self, stage: StageId) -> StageBinding {
        self.bindings
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| default_binding(stage))
    }

    /// Overrides one stage's binding.
    #[must_use]
    pub fn with_override(mut self, stage: StageId, binding: StageBinding) -> Self {
        self.bindings.insert(stage, binding);
        self
    }

    /// Every distinct provider kind used across the stages.
    #[must_use]
    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.bindings.values().map(|b| b.kind).collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds.dedup();
        kinds
    }
}

/// The writing tone requested in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Authoritative but not stiff.
    #[default]
    Professional,
    /// Relaxed, conversational register.
    Casual,
    /// Explanatory, example-heavy.
    Educational,
    /// Direct address to the reader.
    Conversational,
}

impl Tone {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "casual" => Self::Casual,
            "educational" => Self::Educational,
            "conversational" => Self::Conversational,
            _ => Self::Professional,
        }
    }

    /// The instruction snippet injected into the writer's system prompt.
    #[must_use]
    pub const fn instruction(self) -> &'static str {
        match self {
            Self::Professional => {
                "Write with an authoritative, trustworthy tone without sounding stiff."
            }
            Self::Casual => "Write in a relaxed, friendly, conversational register.",
            Self::Educational => "Write in an explanatory, educational tone with many examples.",
            Self::Conversational => "Write as if speaking directly to the reader.",
        }
    }
}

/// Structured fields parsed from the free-form prompt.
///
/// The prompt is line-oriented `key: value` text; keys are recognized in
/// English and Korean (`topic`/`주제`, `tone`/`톤`, `keyword`/`키워드`,
/// `length`/`길이`). Lines without a recognized key are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    /// The article topic.
    pub topic: String,
    /// Requested writing tone.
    pub tone: Tone,
    /// Seed keywords.
    pub keywords: Vec<String>,
    /// Target body length in characters.
    pub target_length: u32,
}

impl PromptSpec {
    /// Parses a prompt, falling back to the title hint (or the whole prompt)
    /// as the topic when no topic line is present.
    #[must_use]
    pub fn parse(prompt: &str, title_hint: Option<&str>, tags: &[String]) -> Self {
        let mut topic = None;
        let mut tone = Tone::default();
        let mut keywords: Vec<String> = Vec::new();
        let mut target_length = DEFAULT_TARGET_LENGTH;

        for line in prompt.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if key.contains("topic") || key.contains("주제") {
                topic = Some(value.to_string());
            } else if key.contains("tone") || key.contains("톤") {
                tone = Tone::parse(value);
            } else if key.contains("keyword") || key.contains("키워드") {
                keywords = value
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(ToString::to_string)
                    .collect();
            } else if key.contains("length") || key.contains("길이") {
                let digits: String = value.chars().filter(char::is_ascii_digit).collect();
                target_length = digits.parse().unwrap_or(DEFAULT_TARGET_LENGTH);
            }
        }

        if keywords.is_empty() {
            keywords = tags.to_vec();
        }

        Self {
            topic: topic
                .or_else(|| title_hint.map(ToString::to_string))
                .unwrap_or_else(|| prompt.trim().to_string()),
            tone,
            keywords,
            target_length,
        }
    }
}

/// A style-profile or layout-template reference resolved to instruction text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    /// The instruction text injected into stage prompts.
    pub instruction: String,
    /// Whether the referenced profile/template is active.
    pub active: bool,
}

/// Resolves style-profile and layout-template ids to instruction text.
///
/// Inbound contract; the store behind it is external. `Ok(None)` means the id
/// does not exist, which `submit` converts to a dependency error.
pub trait InstructionResolver: Send + Sync {
    /// Resolves a style-profile id.
    fn resolve_style(&self, id: &str) -> Result<Option<ResolvedInstruction>, GenerationError>;

    /// Resolves a layout-template id.
    fn resolve_layout(&self, id: &str) -> Result<Option<ResolvedInstruction>, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_stage_providers() {
        let providers = StageProviders::default();
        assert_eq!(providers.binding(StageId::Opener).kind, ProviderKind::OpenAi);
        assert_eq!(providers.binding(StageId::Researcher).kind, ProviderKind::Perplexity);
        assert_eq!(providers.binding(StageId::Writer).kind, ProviderKind::Gemini);
        assert_eq!(providers.binding(StageId::Editor).kind, ProviderKind::OpenAi);
    }

    #[test]
    fn test_override_and_distinct_kinds() {
        let providers = StageProviders::default()
            .with_override(StageId::Writer, StageBinding::new(ProviderKind::OpenAi))
            .with_override(StageId::Researcher, StageBinding::new(ProviderKind::OpenAi));
        assert_eq!(providers.kinds(), vec![ProviderKind::OpenAi]);
    }

    #[test]
    fn test_parse_prompt_english_keys() {
        let spec = PromptSpec::parse(
            "topic: rust async patterns\ntone: casual\nkeywords: tokio, futures\nlength: 2000",
            None,
            &[],
        );
        assert_eq!(spec.topic, "rust async patterns");
        assert_eq!(spec.tone, Tone::Casual);
        assert_eq!(spec.keywords, vec!["tokio", "futures"]);
        assert_eq!(spec.target_length, 2000);
    }

    #[test]
    fn test_parse_prompt_korean_keys() {
        let spec = PromptSpec::parse("주제: 제주도 여행\n키워드: 제주, 맛집\n길이: 약 1800자", None, &[]);
        assert_eq!(spec.topic, "제주도 여행");
        assert_eq!(spec.keywords, vec!["제주", "맛집"]);
        assert_eq!(spec.target_length, 1800);
    }

    #[test]
    fn test_parse_prompt_fallbacks() {
        let tags = vec!["travel".to_string()];
        let spec = PromptSpec::parse("just a plain prompt", Some("Hint Title"), &tags);
        assert_eq!(spec.topic, "Hint Title");
        assert_eq!(spec.keywords, tags);
        assert_eq!(spec.target_length, DEFAULT_TARGET_LENGTH);
    }
}
