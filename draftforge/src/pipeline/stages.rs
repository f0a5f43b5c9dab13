//! The four stage handlers: Opener, Researcher, Writer, Editor.
//!
//! Each handler reads the accumulated context, calls its bound provider, and
//! returns a short human-readable summary for the job's stage record. Provider
//! failures propagate as errors; the caller aborts the remaining stages.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::LazyLock;

use super::article::{derive_excerpt, pad_hashtags, slugify, Article, ArticleMetadata, FaqEntry};
use super::quality::{naturalness_passes, naturalness_report, reading_time_minutes, seo_report};
use super::StageContext;
use crate::errors::GenerationError;
use crate::fetch::FetchDispatcher;
use crate::provider::{ProviderRequest, TextProvider};
use crate::text;

/// Maximum writer/editor revision iterations before accepting the draft with
/// a quality warning.
pub const MAX_REVISION_ITERATIONS: u32 = 3;

/// Token budget for each harvested reference excerpt in the research prompt.
const RESEARCH_CHUNK_TOKENS: usize = 2000;
/// At most this many harvested references are quoted to the researcher.
const MAX_REFERENCE_EXCERPTS: usize = 5;

/// Mechanical structural headings the writer is told to avoid but still emits
/// sometimes: `## 서론`, `## 본문 1`, numbered `결론` lines, and so on.
static STRUCTURAL_LABELS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^#{1,3}\s*(서론|본론|결론|마무리|인트로|아웃트로)[:\s]?$",
        r"(?i)^#{1,3}\s*(본문|body)\s*\d+",
        r"^\d+[.)\s]+(서론|본론|결론|마무리)",
        r"^(첫\s*번째|두\s*번째|세\s*번째|네\s*번째|다섯\s*번째)[:\s]",
        r"^#{1,3}\s*\d+\s*[.)\s]+(서론|본론|결론)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap_or_else(|_| unreachable!()))
    .collect()
});

/// Lines in the draft that read as structural labels, as `Line N: <text>`.
fn detect_structural_labels(content: &str) -> Vec<String> {
    let mut detected = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if STRUCTURAL_LABELS.iter().any(|p| p.is_match(line)) {
            detected.push(format!("Line {}: {line}", index + 1));
        }
    }
    detected
}

/// Pulls the outermost JSON object out of a model response.
///
/// Models wrap JSON in prose and code fences, so this takes the span from the
/// first `{` to the last `}` and tries to parse it. `None` means the caller
/// should fall back to treating the response as plain text.
fn extract_json<T: DeserializeOwned>(response: &str) -> Option<T> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&response[start..=end]).ok()
}

/// Structured output of the Opener stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OpenerBrief {
    /// Free-text topic analysis.
    #[serde(default)]
    pub topic_analysis: String,
    /// Concrete items the researcher should investigate.
    #[serde(default)]
    pub research_instructions: Vec<String>,
    /// Questions readers are likely to ask.
    #[serde(default)]
    pub faq_candidates: Vec<String>,
    /// Long-tail keywords to weave into the draft.
    #[serde(default)]
    pub additional_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EditorPayload {
    #[serde(default)]
    improved_content: String,
    #[serde(default)]
    seo_title: String,
    #[serde(default)]
    meta_description: String,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    faq: Vec<FaqEntry>,
    #[serde(default)]
    slug: String,
}

pub(super) async fn run_opener(
    provider: &dyn TextProvider,
    ctx: &mut StageContext,
) -> Result<String, GenerationError> {
    let system = "You are an SEO strategist. Analyze the topic's search intent and target \
                  audience, instruct the research team, and produce long-tail keywords. Be \
                  concrete and practical."
        .to_string();
    let prompt = format!(
        "Topic: {topic}\nSeed keywords: {keywords}\nTarget length: {length} characters\n\
         Respond in locale '{locale}'.\n\n\
         Produce:\n\
         1. A topic analysis: the core points readers must learn.\n\
         2. 5-7 concrete research instructions (real cases, statistics, expert views).\n\
         3. 3-5 FAQ question candidates.\n\
         4. 5 long-tail keywords with plausible search volume.\n\n\
         Respond with JSON only:\n\
         {{\n  \"topic_analysis\": \"...\",\n  \"research_instructions\": [\"...\"],\n\
           \"faq_candidates\": [\"...?\"],\n  \"additional_keywords\": [\"...\"]\n}}",
        topic = ctx.spec.topic,
        keywords = ctx.spec.keywords.join(", "),
        length = ctx.spec.target_length,
        locale = ctx.locale,
    );

    let response = provider
        .generate(
            &ProviderRequest::new(prompt)
                .with_system(system)
                .with_max_tokens(2048),
        )
        .await?;

    let brief = extract_json::<OpenerBrief>(&response).unwrap_or_else(|| OpenerBrief {
        topic_analysis: response,
        ..OpenerBrief::default()
    });
    let summary = format!(
        "topic analyzed: {} research items, {} extra keywords",
        brief.research_instructions.len(),
        brief.additional_keywords.len()
    );
    ctx.brief = Some(brief);
    Ok(summary)
}

pub(super) async fn run_researcher(
    provider: &dyn TextProvider,
    fetcher: &FetchDispatcher,
    ctx: &mut StageContext,
) -> Result<String, GenerationError> {
    let brief = ctx.brief.clone().unwrap_or_default();

    let mut harvested = Vec::new();
    if !ctx.reference_urls.is_empty() {
        let results = fetcher.fetch_all(&ctx.reference_urls).await;
        for result in results {
            if harvested.len() >= MAX_REFERENCE_EXCERPTS {
                break;
            }
            let Some(content) = result.content else {
                tracing::debug!(url = %result.url, error = ?result.error, "reference skipped");
                continue;
            };
            let excerpt = text::chunk(&content, RESEARCH_CHUNK_TOKENS)
                .into_iter()
                .next()
                .unwrap_or_default();
            if !excerpt.is_empty() {
                harvested.push((result.url, excerpt));
            }
        }
    }

    let instructions = if brief.research_instructions.is_empty() {
        format!("- general background on {}", ctx.spec.topic)
    } else {
        brief
            .research_instructions
            .iter()
            .map(|i| format!("- {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let faq = brief
        .faq_candidates
        .iter()
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n");
    let references = harvested
        .iter()
        .map(|(url, excerpt)| format!("### Source: {url}\n{excerpt}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = "You are a research analyst. Gather specific facts, recent statistics, real \
                  cases, and expert opinions, citing sources where possible."
        .to_string();
    let mut prompt = format!(
        "Topic: {topic}\nRespond in locale '{locale}'.\n\n\
         ## Research items:\n{instructions}\n\n## FAQ questions to answer:\n{faq}\n",
        topic = ctx.spec.topic,
        locale = ctx.locale,
    );
    if !references.is_empty() {
        prompt.push_str(&format!(
            "\n## Harvested reference material (use freely, verify claims):\n{references}\n"
        ));
    }
    prompt.push_str(
        "\nWrite research notes that a blog writer can use directly: concrete numbers, \
         examples, and short answers to each FAQ question.",
    );

    let response = provider
        .generate(
            &ProviderRequest::new(prompt)
                .with_system(system)
                .with_max_tokens(4096)
                .with_temperature(0.5),
        )
        .await?;

    let summary = format!(
        "research notes gathered ({} chars, {} harvested sources)",
        response.chars().count(),
        harvested.len()
    );
    ctx.research = Some(response);
    Ok(summary)
}

fn writer_system_prompt(ctx: &StageContext, revision_feedback: &str) -> String {
    let mut system = format!(
        "You are a professional blog writer with ten years of experience. {}\n\n\
         Humanization guidelines (mandatory):\n\
         1. Vary sentence length for rhythm.\n\
         2. Use first and second person, as in direct conversation.\n\
         3. Ask the reader occasional questions.\n\
         4. Add personal experience and opinion.\n\
         5. Use natural colloquial expressions.\n\
         6. Restrain transition words.\n\
         7. Prefer concrete numbers and cases over abstractions.\n\n\
         Never use structural labels (\"Introduction:\", \"Body 1:\", \"Conclusion:\") as \
         headings; every heading must reflect its section's content.\n\n\
         SEO: use each seed keyword naturally at least 5 times and each additional keyword \
         at least 3 times.",
        ctx.spec.tone.instruction()
    );
    if let Some(style) = &ctx.style_instruction {
        system.push_str(&format!("\n\nStyle profile to imitate:\n{style}"));
    }
    if !revision_feedback.is_empty() {
        system.push_str(&format!(
            "\n\nProblems found in the previous version - fix all of them:\n{revision_feedback}"
        ));
    }
    system
}

fn writer_user_prompt(ctx: &StageContext) -> String {
    let brief = ctx.brief.clone().unwrap_or_default();
    let structure = ctx.layout_instruction.as_ref().map_or_else(
        || {
            "## Required structure:\n1. An engaging hook (200-300 chars)\n\
             2. 3-5 substantive sections with specific information\n\
             3. A short wrap-up suggesting a next action"
                .to_string()
        },
        |layout| format!("## Article structure:\n{layout}\nFollow it without structural labels."),
    );
    format!(
        "Topic: {topic}\nTarget length: about {length} characters (excluding headings)\n\
         Seed keywords: {keywords}\nAdditional keywords: {additional}\n\
         Respond in locale '{locale}'.\n\nResearch notes:\n{research}\n\n\
         Write the complete blog post in markdown (# title, ## headings).\n\n{structure}",
        topic = ctx.spec.topic,
        length = ctx.spec.target_length,
        keywords = ctx.spec.keywords.join(", "),
        additional = brief.additional_keywords.join(", "),
        locale = ctx.locale,
        research = ctx.research.as_deref().unwrap_or(""),
    )
}

pub(super) async fn run_writer(
    provider: &dyn TextProvider,
    ctx: &mut StageContext,
) -> Result<String, GenerationError> {
    let response = provider
        .generate(
            &ProviderRequest::new(writer_user_prompt(ctx))
                .with_system(writer_system_prompt(ctx, ""))
                .with_max_tokens(8192)
                .with_temperature(0.8),
        )
        .await?;
    let summary = format!("draft written ({} chars)", response.chars().count());
    ctx.draft = Some(response);
    Ok(summary)
}

/// Asks the editor to rewrite structural-label headings in place.
///
/// The body text must survive untouched, so the result is accepted only when
/// it is at least half the draft's length. A provider failure here does not
/// fail the stage; the labels are simply left for the main edit pass and the
/// note records the failure.
async fn replace_structural_labels(
    editor: &dyn TextProvider,
    draft: &mut String,
    detected: &[String],
) -> String {
    let system = "You are an editing specialist. In the given blog post, replace any heading \
                  that is a mechanical structural label (\"서론\", \"본론 1\", \"결론\", \
                  \"Introduction\", \"Body 1\") with a specific, natural heading that reflects \
                  that section's content. Never change the body text; replace headings only, \
                  and keep headings that are not labels."
        .to_string();
    let prompt = format!(
        "Replace the structural-label headings in this post:\n\n{draft}\n\n\
         Rules:\n\
         - '## 서론' becomes a heading matching the opening content\n\
         - '## 본론 1' becomes a heading reflecting that section\n\
         - '## 결론' becomes a heading matching the wrap-up\n\
         - Do not edit the body text, only the headings\n\
         - Keep the markdown formatting\n\n\
         Return the complete post."
    );

    match editor
        .generate(
            &ProviderRequest::new(prompt)
                .with_system(system)
                .with_max_tokens(8192)
                .with_temperature(0.3),
        )
        .await
    {
        Ok(cleaned) if cleaned.chars().count() * 2 > draft.chars().count() => {
            *draft = cleaned;
            format!("{} structural labels detected and replaced", detected.len())
        }
        Ok(_) => format!(
            "{} structural labels detected (cleanup response discarded as truncated)",
            detected.len()
        ),
        Err(error) => format!(
            "{} structural labels detected (cleanup failed: {error})",
            detected.len()
        ),
    }
}

async fn edit_once(
    editor: &dyn TextProvider,
    ctx: &StageContext,
    draft: &str,
    iteration: u32,
) -> Result<EditorPayload, GenerationError> {
    let system = "You are a professional editor and SEO specialist. Review the post, fix \
                  anything that reads machine-written, and produce the final metadata."
        .to_string();
    let faq = ctx
        .brief
        .as_ref()
        .map(|b| b.faq_candidates.join("\n- "))
        .unwrap_or_default();
    let prompt = format!(
        "Review and improve this blog post (iteration {iteration}):\n\n---\n{draft}\n---\n\n\
         Topic: {topic}\nKeywords: {keywords}\nRespond in locale '{locale}'.\n\n\
         Tasks:\n\
         1. Improve quality: fix grammar, remove repetitive patterns, make it read human.\n\
         2. An SEO title (50-60 chars, keyword included).\n\
         3. A meta description (120-160 chars).\n\
         4. 30 hashtags.\n\
         5. Short answers to these FAQ questions:\n- {faq}\n\n\
         Respond with JSON only:\n\
         {{\n  \"improved_content\": \"...\",\n  \"seo_title\": \"...\",\n\
           \"meta_description\": \"...\",\n  \"hashtags\": [\"#...\"],\n\
           \"faq\": [{{\"question\": \"...?\", \"answer\": \"...\"}}],\n  \"slug\": \"...\"\n}}",
        topic = ctx.spec.topic,
        keywords = ctx.spec.keywords.join(", "),
        locale = ctx.locale,
    );

    let response = editor
        .generate(
            &ProviderRequest::new(prompt)
                .with_system(system)
                .with_max_tokens(8192)
                .with_temperature(0.4),
        )
        .await?;

    let mut payload = extract_json::<EditorPayload>(&response).unwrap_or_default();
    if payload.improved_content.trim().is_empty() {
        payload.improved_content = draft.to_string();
    }
    Ok(payload)
}

pub(super) async fn run_editor(
    editor: &dyn TextProvider,
    writer: &dyn TextProvider,
    ctx: &mut StageContext,
) -> Result<String, GenerationError> {
    let mut draft = ctx.draft.clone().unwrap_or_default();
    let mut payload = EditorPayload::default();
    let mut quality_warning = false;
    let mut quality_notes = Vec::new();
    let mut iterations_used = 0;

    for iteration in 1..=MAX_REVISION_ITERATIONS {
        iterations_used = iteration;

        let labels = detect_structural_labels(&draft);
        if !labels.is_empty() {
            tracing::debug!(iteration, count = labels.len(), "structural labels detected");
            quality_notes.push(replace_structural_labels(editor, &mut draft, &labels).await);
        }

        payload = edit_once(editor, ctx, &draft, iteration).await?;

        let report = naturalness_report(&payload.improved_content);
        if naturalness_passes(report.score) {
            break;
        }
        if iteration == MAX_REVISION_ITERATIONS {
            quality_warning = true;
            tracing::warn!(score = report.score, "draft kept after exhausting revisions");
            break;
        }

        let feedback = format!(
            "{}\n\nNaturalness score: {} (must be under 50)",
            report
                .issues
                .iter()
                .map(|i| format!("- {i}"))
                .collect::<Vec<_>>()
                .join("\n"),
            report.score
        );
        tracing::debug!(iteration, score = report.score, "revising draft");
        draft = writer
            .generate(
                &ProviderRequest::new(writer_user_prompt(ctx))
                    .with_system(writer_system_prompt(ctx, &feedback))
                    .with_max_tokens(8192)
                    .with_temperature(0.8),
            )
            .await?;
    }

    let content = payload.improved_content;
    let title = if payload.seo_title.trim().is_empty() {
        ctx.title_hint.clone().unwrap_or_else(|| ctx.spec.topic.clone())
    } else {
        payload.seo_title
    };
    let slug_base = if payload.slug.trim().is_empty() {
        &title
    } else {
        &payload.slug
    };

    let naturalness = naturalness_report(&content);
    let seo = seo_report(&content, &ctx.spec.keywords, &title, &payload.meta_description);
    let hashtags = pad_hashtags(
        payload
            .hashtags
            .into_iter()
            .map(|t| {
                if t.starts_with('#') {
                    t
                } else {
                    format!("#{t}")
                }
            })
            .collect(),
    );

    let article = Article {
        slug: slugify(slug_base),
        excerpt: derive_excerpt(&content),
        hashtags,
        metadata: ArticleMetadata {
            locale: ctx.locale.clone(),
            tags: ctx.tags.clone(),
            seo_keywords: ctx
                .brief
                .as_ref()
                .map(|b| b.additional_keywords.clone())
                .unwrap_or_default(),
            meta_description: payload.meta_description,
            faq: payload.faq,
            reading_time_minutes: reading_time_minutes(&content),
            seo_score: seo.score,
            seo_issues: seo.issues,
            naturalness_score: naturalness.score,
            naturalness_issues: naturalness.issues,
            quality_notes,
            quality_warning,
            iterations_used,
        },
        title,
        content,
    };

    let summary = format!(
        "final article ready: '{}' ({} min read, seo {}{})",
        article.title,
        article.metadata.reading_time_minutes,
        article.metadata.seo_score,
        if quality_warning { ", quality warning" } else { "" }
    );
    ctx.article = Some(article);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_json_from_fenced_response() {
        let response = "Here you go:\n```json\n{\"topic_analysis\": \"solid\", \
                        \"additional_keywords\": [\"a\", \"b\"]}\n```\nDone.";
        let brief: OpenerBrief = extract_json(response).unwrap();
        assert_eq!(brief.topic_analysis, "solid");
        assert_eq!(brief.additional_keywords, vec!["a", "b"]);
    }

    #[test]
    fn test_extract_json_missing_braces() {
        assert!(extract_json::<OpenerBrief>("no json here").is_none());
    }

    #[test]
    fn test_extract_json_malformed() {
        assert!(extract_json::<OpenerBrief>("{not valid json}").is_none());
    }

    #[test]
    fn test_detect_structural_labels_flags_mechanical_headings() {
        let draft = "## 서론\n시작합니다.\n\n## 본문 1\n내용.\n\n1. 결론\n끝.\n\n\
                     ## 여행 준비물 체크리스트\n목록.";
        let detected = detect_structural_labels(draft);
        assert_eq!(detected.len(), 3);
        assert!(detected[0].contains("서론"));
        assert!(detected[1].contains("본문 1"));
    }

    #[test]
    fn test_detect_structural_labels_ignores_content_headings() {
        let draft = "## 제주도에서 꼭 가야 할 곳\n본론으로 들어가면, 맛집이 많습니다.";
        assert!(detect_structural_labels(draft).is_empty());
    }

    #[tokio::test]
    async fn test_editor_rewrites_structural_label_headings() {
        use crate::pipeline::{PromptSpec, StageContext};
        use crate::provider::{ProviderFactory, ProviderKind};
        use crate::testing::{ProviderScript, ScriptedProviderFactory};
        use std::sync::Arc;

        let script = Arc::new(ProviderScript::new());
        script.push_ok(
            "## 여행 준비의 첫걸음\n시작합니다. 준비물은 많지 않습니다.\n\n\
             ## 꼭 챙겨야 할 것들\n내용.",
        );
        script.push_ok("{\"improved_content\": \"최종 본문입니다.\", \"seo_title\": \"여행 준비 가이드\"}");

        let factory = ScriptedProviderFactory::new(script.clone());
        let editor = factory.create(ProviderKind::OpenAi, "m").unwrap();
        let writer = factory.create(ProviderKind::Gemini, "m").unwrap();

        let mut ctx = StageContext::new(PromptSpec::parse("topic: 여행 준비", None, &[]), "ko");
        ctx.draft =
            Some("## 서론\n시작합니다. 준비물은 많지 않습니다.\n\n## 본문 1\n내용.".to_string());

        run_editor(editor.as_ref(), writer.as_ref(), &mut ctx)
            .await
            .unwrap();

        let requests = script.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].prompt.contains("## 서론"));
        assert!(requests[0]
            .system
            .as_deref()
            .unwrap()
            .contains("structural label"));

        let article = ctx.take_article().unwrap();
        assert_eq!(
            article.metadata.quality_notes,
            vec!["2 structural labels detected and replaced".to_string()]
        );
        assert_eq!(article.content, "최종 본문입니다.");
    }

    #[tokio::test]
    async fn test_editor_keeps_draft_when_label_cleanup_errors() {
        use crate::pipeline::{PromptSpec, StageContext};
        use crate::provider::{ProviderError, ProviderFactory, ProviderKind};
        use crate::testing::{ProviderScript, ScriptedProviderFactory};
        use std::sync::Arc;

        let script = Arc::new(ProviderScript::new());
        script.push_err(ProviderError::Timeout);
        script.push_ok("{\"improved_content\": \"최종 본문입니다.\", \"seo_title\": \"제목\"}");

        let factory = ScriptedProviderFactory::new(script.clone());
        let editor = factory.create(ProviderKind::OpenAi, "m").unwrap();
        let writer = factory.create(ProviderKind::Gemini, "m").unwrap();

        let mut ctx = StageContext::new(PromptSpec::parse("topic: 여행 준비", None, &[]), "ko");
        ctx.draft = Some("## 서론\n시작합니다.".to_string());

        run_editor(editor.as_ref(), writer.as_ref(), &mut ctx)
            .await
            .unwrap();

        // The main edit pass still ran on the unmodified draft.
        let requests = script.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("## 서론"));

        let article = ctx.take_article().unwrap();
        assert_eq!(article.metadata.quality_notes.len(), 1);
        assert!(article.metadata.quality_notes[0].contains("cleanup failed"));
    }

    #[test]
    fn test_editor_payload_defaults_missing_fields() {
        let payload: EditorPayload =
            extract_json("{\"seo_title\": \"A Title\"}").unwrap();
        assert_eq!(payload.seo_title, "A Title");
        assert!(payload.hashtags.is_empty());
        assert!(payload.improved_content.is_empty());
    }
}
