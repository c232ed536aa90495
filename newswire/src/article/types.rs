//! Data structures for final news articles

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::article::prompts;

/// Political bias of a finished article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Neutral,
    Conservative,
    Liberal,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Neutral => "neutral",
            Bias::Conservative => "conservative",
            Bias::Liberal => "liberal",
        }
    }
}

/// The closed vocabulary of article topic tags. Anything outside this list is
/// rejected at deserialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicTag {
    World,
    Politics,
    #[serde(rename = "Breaking News")]
    BreakingNews,
    #[serde(rename = "US")]
    Us,
    Business,
    Education,
    Science,
    Health,
    Climate,
    Sports,
}

impl TopicTag {
    pub const ALL: [TopicTag; 10] = [
        TopicTag::World,
        TopicTag::Politics,
        TopicTag::BreakingNews,
        TopicTag::Us,
        TopicTag::Business,
        TopicTag::Education,
        TopicTag::Science,
        TopicTag::Health,
        TopicTag::Climate,
        TopicTag::Sports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicTag::World => "World",
            TopicTag::Politics => "Politics",
            TopicTag::BreakingNews => "Breaking News",
            TopicTag::Us => "US",
            TopicTag::Business => "Business",
            TopicTag::Education => "Education",
            TopicTag::Science => "Science",
            TopicTag::Health => "Health",
            TopicTag::Climate => "Climate",
            TopicTag::Sports => "Sports",
        }
    }
}

/// Length axis: short summary vs. in-depth analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthStyle {
    Short,
    Depth,
}

/// Register axis: informal vs. formal language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterStyle {
    Informal,
    Formal,
}

/// Posture axis: satirical vs. straight-laced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureStyle {
    Satirical,
    Straight,
}

#[derive(Debug, Error, PartialEq)]
pub enum StyleParseError {
    #[error("unknown writing style token: {0}")]
    UnknownToken(String),
    #[error("conflicting tokens for the same style axis: {0} and {1}")]
    ConflictingAxis(String, String),
}

/// A writing style is one value on each of three independent binary axes.
/// Every axis always contributes exactly one instruction fragment; the axes
/// compose rather than excluding each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritingStyle {
    pub length: LengthStyle,
    pub register: RegisterStyle,
    pub posture: PostureStyle,
}

impl Default for WritingStyle {
    fn default() -> Self {
        Self {
            length: LengthStyle::Depth,
            register: RegisterStyle::Formal,
            posture: PostureStyle::Straight,
        }
    }
}

impl WritingStyle {
    /// The composed style instruction: one fragment per axis, concatenated.
    pub fn instruction(&self) -> String {
        let mut out = String::new();
        out.push_str(match self.length {
            LengthStyle::Short => prompts::SHORT_FRAGMENT,
            LengthStyle::Depth => prompts::DEPTH_FRAGMENT,
        });
        out.push('\n');
        out.push_str(match self.register {
            RegisterStyle::Informal => prompts::INFORMAL_FRAGMENT,
            RegisterStyle::Formal => prompts::FORMAL_FRAGMENT,
        });
        out.push('\n');
        out.push_str(match self.posture {
            PostureStyle::Satirical => prompts::SATIRICAL_FRAGMENT,
            PostureStyle::Straight => prompts::STRAIGHT_FRAGMENT,
        });
        out.push('\n');
        out
    }

    /// The style as stored: one lowercase token per axis.
    pub fn tokens(&self) -> Vec<String> {
        vec![
            match self.length {
                LengthStyle::Short => "short",
                LengthStyle::Depth => "depth",
            }
            .to_string(),
            match self.register {
                RegisterStyle::Informal => "informal",
                RegisterStyle::Formal => "formal",
            }
            .to_string(),
            match self.posture {
                PostureStyle::Satirical => "satirical",
                PostureStyle::Straight => "straight",
            }
            .to_string(),
        ]
    }

    /// Parse a stored token list. Axes not mentioned keep their defaults;
    /// naming both values of one axis is an error.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, StyleParseError> {
        let mut style = WritingStyle::default();
        let mut length_token: Option<&str> = None;
        let mut register_token: Option<&str> = None;
        let mut posture_token: Option<&str> = None;

        for token in tokens {
            let token = token.as_ref();
            match token {
                "short" | "depth" => {
                    if let Some(prev) = length_token.filter(|p| *p != token) {
                        return Err(StyleParseError::ConflictingAxis(
                            prev.to_string(),
                            token.to_string(),
                        ));
                    }
                    length_token = Some(token);
                    style.length = if token == "short" {
                        LengthStyle::Short
                    } else {
                        LengthStyle::Depth
                    };
                }
                "informal" | "formal" => {
                    if let Some(prev) = register_token.filter(|p| *p != token) {
                        return Err(StyleParseError::ConflictingAxis(
                            prev.to_string(),
                            token.to_string(),
                        ));
                    }
                    register_token = Some(token);
                    style.register = if token == "informal" {
                        RegisterStyle::Informal
                    } else {
                        RegisterStyle::Formal
                    };
                }
                "satirical" | "straight" => {
                    if let Some(prev) = posture_token.filter(|p| *p != token) {
                        return Err(StyleParseError::ConflictingAxis(
                            prev.to_string(),
                            token.to_string(),
                        ));
                    }
                    posture_token = Some(token);
                    style.posture = if token == "satirical" {
                        PostureStyle::Satirical
                    } else {
                        PostureStyle::Straight
                    };
                }
                other => return Err(StyleParseError::UnknownToken(other.to_string())),
            }
        }

        Ok(style)
    }

    /// All eight axis permutations, for anonymous batch generation.
    pub fn all() -> Vec<WritingStyle> {
        let mut styles = Vec::with_capacity(8);
        for length in [LengthStyle::Short, LengthStyle::Depth] {
            for register in [RegisterStyle::Informal, RegisterStyle::Formal] {
                for posture in [PostureStyle::Satirical, PostureStyle::Straight] {
                    styles.push(WritingStyle {
                        length,
                        register,
                        posture,
                    });
                }
            }
        }
        styles
    }
}

/// The structured output of the final rewrite step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub bias: Bias,
    #[serde(default)]
    pub opposite_view: String,
    pub relevant_topics: Vec<TopicTag>,
}

/// JSON schema handed to the completion port for the article rewrite.
pub fn article_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string", "description": "The title of the news article." },
            "summary": { "type": "string", "description": "A summary of the news article." },
            "content": { "type": "string", "description": "The content of the news article." },
            "bias": {
                "type": "string",
                "enum": ["neutral", "conservative", "liberal"],
                "description": "The potential bias of the news article you just wrote."
            },
            "opposite_view": {
                "type": "string",
                "description": "A detailed analysis of the opposite political view; empty when the bias is neutral."
            },
            "relevant_topics": {
                "type": "array",
                "items": {
                    "type": "string",
                    "enum": TopicTag::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>()
                },
                "description": "Relevant topics, drawn only from the fixed vocabulary."
            }
        },
        "required": ["title", "summary", "content", "bias", "relevant_topics"]
    })
}
