//! Audio briefings and personalized impact analysis
//!
//! Turns a finished article into a podcast-style briefing (script via the
//! completion port, audio via the speech port) and produces the short
//! "how will this impact you" blurb for a known reader. Speech synthesis is
//! best-effort: a provider failure degrades the briefing to transcript-only.

use base64::Engine;
use serde::{Deserialize, Serialize};

use newswire_sdk::log_warning;

use crate::config::PipelineConfig;
use crate::ports::{CompletionPort, ProviderError, SpeechPort};
use crate::store::ArticleRecord;

/// Average spoken pace used for the duration estimate, words per minute.
const SPOKEN_WORDS_PER_MINUTE: f64 = 150.0;

const SCRIPT_SYSTEM: &str = "You write tight two-minute podcast scripts for a single news story. \
Conversational, spoken-word phrasing, no headings, no stage directions, no citations read \
aloud.";

const IMPACT_SYSTEM: &str = "You are a news analyst helping readers understand how current \
events might personally impact them. Keep it to 2-3 sentences, conversational and practical. \
If the story has no clear personal impact, say so plainly.";

/// Fallback text when the impact analysis provider call fails.
const IMPACT_FALLBACK: &str = "This story may have broader implications for society, but its \
direct personal impact depends on your specific circumstances and interests.";

/// A generated audio briefing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Briefing {
    pub transcript: String,
    /// Base64-encoded audio, absent when no speech port is available or the
    /// synthesis call failed.
    pub audio: Option<String>,
    pub duration_estimate_secs: u32,
}

/// Generate a podcast-style briefing for an article.
pub async fn generate_briefing(
    completion: &dyn CompletionPort,
    speech: Option<&dyn SpeechPort>,
    config: &PipelineConfig,
    article: &ArticleRecord,
    listener_context: Option<&str>,
) -> Result<Briefing, ProviderError> {
    let prompt = script_prompt(article, listener_context);
    let transcript = completion
        .complete_text(&config.writer_model, SCRIPT_SYSTEM, &prompt)
        .await?;

    let audio = match speech {
        Some(port) => match port.synthesize(&transcript).await {
            Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            Err(err) => {
                log_warning!("speech synthesis failed, returning transcript only: {}", err);
                None
            }
        },
        None => None,
    };

    Ok(Briefing {
        duration_estimate_secs: estimate_duration_secs(&transcript),
        transcript,
        audio,
    })
}

/// Personalized impact blurb for a reader. Provider failures degrade to a
/// fixed fallback string rather than an error.
pub async fn impact_analysis(
    completion: &dyn CompletionPort,
    config: &PipelineConfig,
    article: &ArticleRecord,
    user_context: &str,
) -> String {
    let prompt = format!(
        "Article Title: {}\nArticle Summary: {}\n\nUser's Personal Context: {}\n\n\
         Write the personalized \"How will this impact you\" section. Write only the impact \
         analysis, no additional formatting or labels.",
        article.title, article.summary, user_context
    );

    match completion
        .complete_text(&config.writer_model, IMPACT_SYSTEM, &prompt)
        .await
    {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            log_warning!("impact analysis failed: {}", err);
            IMPACT_FALLBACK.to_string()
        }
    }
}

fn script_prompt(article: &ArticleRecord, listener_context: Option<&str>) -> String {
    let mut prompt = format!(
        "Write a podcast script covering this article.\n\nTitle: {}\nSummary: {}\n\nContent:\n{}",
        article.title, article.summary, article.content
    );
    if let Some(context) = listener_context {
        prompt.push_str(&format!(
            "\n\nThe listener shared this about themselves; weave in relevance where natural:\n{}",
            context
        ));
    }
    prompt
}

fn estimate_duration_secs(transcript: &str) -> u32 {
    let words = transcript.split_whitespace().count() as f64;
    (words / SPOKEN_WORDS_PER_MINUTE * 60.0).round() as u32
}
