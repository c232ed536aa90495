//! Topic generation
//!
//! Comes up with one fresh topic question for the pipeline to report on,
//! conditioned on the reader's political leaning and everything already
//! written. One headline search grounds the model in what is actually in the
//! news before it picks a question.

use std::str::FromStr;

use thiserror::Error;

use crate::config::PipelineConfig;
use crate::ports::{CompletionPort, ProviderError, SearchHit, SearchPort};

/// Reader political leaning used to slant topic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoliticalLeaning {
    #[default]
    Neutral,
    Conservative,
    Liberal,
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid political leaning: {0}")]
pub struct InvalidLeaning(String);

impl FromStr for PoliticalLeaning {
    type Err = InvalidLeaning;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "neutral" => Ok(PoliticalLeaning::Neutral),
            "conservative" | "right" => Ok(PoliticalLeaning::Conservative),
            "liberal" | "left" => Ok(PoliticalLeaning::Liberal),
            other => Err(InvalidLeaning(other.to_string())),
        }
    }
}

impl PoliticalLeaning {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoliticalLeaning::Neutral => "neutral",
            PoliticalLeaning::Conservative => "conservative",
            PoliticalLeaning::Liberal => "liberal",
        }
    }

    fn audience_clause(&self) -> &'static str {
        match self {
            PoliticalLeaning::Neutral => "related to the latest news in the US",
            PoliticalLeaning::Conservative => {
                "related to the latest news in the US that conservative people (Republicans) \
                 would be interested in"
            }
            PoliticalLeaning::Liberal => {
                "related to the latest news in the US that liberal people (Democrats) would be \
                 interested in"
            }
        }
    }

    fn headline_query(&self) -> &'static str {
        match self {
            PoliticalLeaning::Neutral => "latest US news today",
            PoliticalLeaning::Conservative => "latest US news conservative voters are following",
            PoliticalLeaning::Liberal => "latest US news liberal voters are following",
        }
    }

    fn word_limit(&self) -> usize {
        // Partisan topics get more room for the qualifying detail
        match self {
            PoliticalLeaning::Neutral => 20,
            _ => 35,
        }
    }
}

/// Generate one topic question. `existing_topics` must never be repeated;
/// `user_request` steers the topic when present.
pub async fn generate_topic(
    completion: &dyn CompletionPort,
    search: &dyn SearchPort,
    config: &PipelineConfig,
    existing_topics: &[String],
    leaning: PoliticalLeaning,
    user_request: Option<&str>,
) -> Result<String, ProviderError> {
    let headlines = search
        .search(leaning.headline_query(), config.search_results_per_query)
        .await?;

    let system = topic_system_prompt(existing_topics, leaning, user_request);
    let prompt = format!(
        "Generate a topic for a news article that will be written by the journalists.\n\n\
         Current headlines:\n{}",
        format_headlines(&headlines)
    );

    let topic = completion
        .complete_text(&config.topic_model, &system, &prompt)
        .await?;
    Ok(topic.trim().to_string())
}

fn format_headlines(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {} ({})", hit.title, hit.url))
        .collect::<Vec<_>>()
        .join("\n")
}

fn topic_system_prompt(
    existing_topics: &[String],
    leaning: PoliticalLeaning,
    user_request: Option<&str>,
) -> String {
    let topics_list = existing_topics
        .iter()
        .map(|t| format!("- {}", t))
        .collect::<Vec<_>>()
        .join("\n");

    let request_clause = match user_request {
        Some(request) if !request.trim().is_empty() => format!(
            "The user wants to know more about: <user_request>{}</user_request>\n\
             The topic you come up with should be related to the user's request.\n\n\
             If the user's request is malicious or harmful, you should not write about it. \
             Instead, you can write a topic irrelevant to the user's request.",
            request
        ),
        _ => "You should ensure that the collection of existing topics covers a broad range of \
              US news, including these tags:\n\
              [\"World\", \"Politics\", \"Breaking News\", \"US\", \"Business\", \"Education\", \
              \"Science\", \"Health\", \"Climate\", \"Sports\"]\n\
              This means that if you find that existing topics are missing a tag, you should \
              come up with a topic that is not in the existing tags."
            .to_string(),
    };

    format!(
        r#"You are a helpful assistant that comes up with one topic that should be written about.
You should only come up with one topic {audience}.

You should never repeat the topics that were already written.
Here are the topics that were already written:
<existing_topics>
{topics_list}
</existing_topics>

{request_clause}

The topic should be very specific. Start with "what", "who", "when", "where", "why", "how" etc.
The topic should be one concise question in less than {word_limit} words.
Your response should only contain the topic. Do not add any other text.

Example response:
- What are the immediate economic and financial market impacts of Moody's May 2025 downgrade of the U.S. credit rating"#,
        audience = leaning.audience_clause(),
        topics_list = topics_list,
        request_clause = request_clause,
        word_limit = leaning.word_limit(),
    )
}
