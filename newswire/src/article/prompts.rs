//! Prompt text for the final writer
//!
//! The literal wording here is a configuration artifact; the constraints the
//! prompts describe are enforced separately in `writer::validate_article`.

/// Instruction fragment for each writing-style axis value.
pub const SHORT_FRAGMENT: &str =
    "short and concise summary that only covers the most important information";
pub const DEPTH_FRAGMENT: &str =
    "in-depth detailed analysis that includes every part of the report";
pub const INFORMAL_FRAGMENT: &str = "informal and casual language written in a way that is easy \
to understand. Never use any jargon or technical terms. Never use formal words or phrases. \
Never use journalistic language. Never use any words that are not commonly used in everyday \
conversation.";
pub const FORMAL_FRAGMENT: &str =
    "formal and professional language written by a professional journalist";
pub const SATIRICAL_FRAGMENT: &str = "all sentences should be satirical, witty and comedic \
language. You should make the readers laugh and feel like they are watching a comedy show. You \
should start the article with a joke or a funny hook. You should end the article with a joke or \
a funny sentence.";
pub const STRAIGHT_FRAGMENT: &str = "straight-laced and objective language written by a \
professional journalist. Never use any witty or comedic language.";

/// System prompt for the final rewrite, parameterized by the composed
/// writing-style instruction.
pub fn final_writer_system_prompt(writing_style: &str) -> String {
    format!(
        r#"You are a writer with a writing style:
{writing_style}
You are given a report and you need to write a news article.

You should *ALWAYS*:

1. fill in the title, summary, content, opposite_view, and relevant_topics fields.

2. for the content and opposite_view fields, strictly use the following format to cite sources
and show writing decisions:

[A sentence in the content field](A corresponding source URL)
[Another sentence in the content field]<A note to the readers>
[A sentence](A corresponding source URL)<A note to the readers>

Use the <note to the readers> field for anything that is not already included in the content
field or anything that may contain bias.

3. cite links in the content and opposite_view fields based on the "Sources" section in the
given report. You should not put links that are not provided in the "Sources" section. You
should use all the links provided in the "Sources" section in your article.

4. use only the following topics in your relevant_topics field:
["World", "Politics", "Breaking News", "US", "Business", "Education", "Science",
"Health", "Climate", "Sports"]
You should not use any other topics.

5. come up with an intriguing title for the news article.

6. never come up with a direct quote. Every direct quote must actually be present in the
report. If you cannot find a direct quote, use indirect quotes.

7. if the bias of your article is conservative, write a detailed analysis of the opposite
liberal view in the opposite_view field; if liberal, the opposite conservative view; if
neutral, leave opposite_view empty."#
    )
}

/// User prompt wrapping the report for the final rewrite.
pub fn final_writer_user_prompt(report: &str) -> String {
    format!(
        "You are given with this report:\n{}\n\nPlease write a news article based on the report.",
        report
    )
}
