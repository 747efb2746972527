use serde::Serialize;
use tracing::warn;

use crate::journal::JournalEntry;
use crate::store::{Goal, Profile};
use crate::template::render_template;

/// Upper bound on entry text embedded in the summary prompt. Caps prompt
/// cost for very long submissions.
pub(crate) const SUMMARY_INPUT_MAX: usize = 1200;

/// Upper bound per prior-entry excerpt embedded as context.
const CONTEXT_EXCERPT_MAX: usize = 280;

/// Machine-readable shape the provider must fill when generating an
/// analysis. Kept as prose-adjacent JSON rather than a formal schema
/// because it is embedded verbatim in the prompt.
const ANALYSIS_SHAPE: &str = r#"{
  "summary": "one paragraph",
  "keySymbols": ["symbol", "..."],
  "archetypes": ["archetype", "..."],
  "emotionalThemes": ["theme", "..."],
  "guidedReflection": ["question", "..."],
  "narrativeAnalysis": "optional paragraph",
  "personalConnections": "optional paragraph",
  "patternRecognition": "optional paragraph",
  "perspectiveAnalysis": "optional paragraph"
}"#;

const SUMMARY_TEMPLATE: &str = "Condense this journal entry into 2-4 short factual bullet points.\n\
Report only what the entry itself says. Do not interpret, analyze, or speculate.\n\n\
Entry:\n{text}";

const COACH_TEMPLATE: &str = "You are a supportive dream-journaling coach.\n\n\
About this person: {profile}\n{goals}{recent}\n\
They just said: {message}\n\n\
Reply conversationally, in a few short paragraphs at most.";

/// Truncates `text` to at most `max` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt for the best-effort post-ingest summary.
pub(crate) fn summary_prompt(entry_text: &str) -> String {
    #[derive(Serialize)]
    struct Ctx<'a> {
        text: &'a str,
    }
    let ctx = Ctx {
        text: truncate_chars(entry_text, SUMMARY_INPUT_MAX),
    };
    render_template(SUMMARY_TEMPLATE, &ctx).unwrap_or_else(|e| {
        warn!(?e, "summary prompt render failed");
        format!("Summarize factually as bullets:\n{}", ctx.text)
    })
}

/// Prompt for structured analysis generation. Embeds the response shape,
/// the population rules for required vs. optional fields, and up to a few
/// of the owner's prior entries as stylistic context.
pub(crate) fn analysis_prompt(entry_text: &str, recent: &[JournalEntry]) -> String {
    let mut prompt = String::from(
        "You are an insightful dream analyst. Interpret the journal entry below \
         and respond with a single JSON object of this exact shape, and nothing else:\n\n",
    );
    prompt.push_str(ANALYSIS_SHAPE);
    prompt.push_str(
        "\n\nsummary, keySymbols, archetypes, emotionalThemes and guidedReflection \
         are required and must be non-empty. The remaining fields are optional; \
         include them only when the entry genuinely supports them.\n",
    );
    if !recent.is_empty() {
        prompt.push_str("\nEarlier entries from the same person, for tone and recurring themes:\n");
        for entry in recent {
            prompt.push_str("- ");
            prompt.push_str(truncate_chars(&entry.text, CONTEXT_EXCERPT_MAX));
            prompt.push('\n');
        }
    }
    prompt.push_str("\nEntry to analyze:\n");
    prompt.push_str(entry_text);
    prompt
}

/// Prompt for one coach turn.
pub(crate) fn coach_prompt(
    profile: &Profile,
    goals: &[Goal],
    recent: &[JournalEntry],
    user_message: &str,
) -> String {
    let goals = if goals.is_empty() {
        String::new()
    } else {
        let mut block = String::from("Active goals:\n");
        for goal in goals {
            block.push_str("- ");
            block.push_str(&goal.title);
            if let Some(detail) = &goal.detail {
                block.push_str(" (");
                block.push_str(detail);
                block.push(')');
            }
            block.push('\n');
        }
        block
    };
    let recent = if recent.is_empty() {
        String::new()
    } else {
        let mut block = String::from("Recent journal entries:\n");
        for entry in recent {
            block.push_str("- ");
            block.push_str(truncate_chars(&entry.text, CONTEXT_EXCERPT_MAX));
            block.push('\n');
        }
        block
    };

    #[derive(Serialize)]
    struct Ctx<'a> {
        profile: &'a str,
        goals: &'a str,
        recent: &'a str,
        message: &'a str,
    }
    let ctx = Ctx {
        profile: &profile.summary,
        goals: &goals,
        recent: &recent,
        message: user_message,
    };
    render_template(COACH_TEMPLATE, &ctx).unwrap_or_else(|e| {
        warn!(?e, "coach prompt render failed");
        format!("{}\n{}{}They said: {}", profile.summary, goals, recent, user_message)
    })
}
