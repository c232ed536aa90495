use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use newswire::article::WritingStyle;
use newswire::briefing::generate_briefing;
use newswire::cli::{default_db_path, Cli, Command};
use newswire::config::PipelineConfig;
use newswire::pipeline::{GenerationRequest, NewsPipeline};
use newswire::ports::{Ports, SpeechPort};
use newswire::providers::{AnthropicCompletion, OpenAiSpeech, TavilySearch};
use newswire::store::Database;
use newswire_sdk::{log_done, log_info, log_warning, StepStatus};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let db = Database::new(db_path)?;
    db.initialize_schema()?;
    let store = Arc::new(Mutex::new(db));

    match cli.command {
        Command::Generate {
            request,
            email,
            style,
            all_styles,
            count,
            concurrency,
            max_search_depth,
            number_of_queries,
        } => {
            let config = PipelineConfig {
                max_search_depth,
                number_of_queries,
                research_concurrency: concurrency,
                ..Default::default()
            };
            config.validate()?;

            let ports = build_ports(&config)?;
            let pipeline = NewsPipeline::new(ports, config, store);

            let style_override = style
                .map(|s| {
                    let tokens: Vec<&str> = s.split(',').map(str::trim).collect();
                    WritingStyle::from_tokens(&tokens)
                })
                .transpose()?;

            let generation = GenerationRequest {
                user_request: request,
                user_email: email,
                style_override,
            };

            for _ in 0..count {
                let (tx, mut rx) = mpsc::channel(64);
                let printer = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        render_event(&event);
                    }
                });

                let outcome = if all_styles {
                    pipeline.run_all_styles(&generation, &tx).await.map(|ids| {
                        log_done!("generated {} articles", ids.len());
                    })
                } else {
                    pipeline.run(&generation, &tx).await.map(|id| {
                        log_done!("generated article {}", id);
                    })
                };

                drop(tx);
                printer.await.ok();
                outcome?;
            }
        }

        Command::List { topic } => {
            let db = store.lock().unwrap();
            let articles = db.list_articles(topic.as_deref())?;
            if articles.is_empty() {
                log_info!("no articles stored yet");
            }
            for article in articles {
                println!(
                    "{:>5}  {}  [{}]  {}",
                    article.id,
                    article.created_at.format("%Y-%m-%d %H:%M"),
                    article.relevant_topics.join(", "),
                    article.title
                );
            }
        }

        Command::Show { id } => {
            let db = store.lock().unwrap();
            let article = db
                .get_article(id)?
                .with_context(|| format!("no article with id {}", id))?;
            println!("# {}\n", article.title);
            println!("{}\n", article.summary);
            println!("{}\n", article.content);
            if !article.opposite_view.is_empty() {
                println!("## The other side\n\n{}\n", article.opposite_view);
            }
            println!(
                "bias: {} | topics: {} | style: {}",
                article.bias,
                article.relevant_topics.join(", "),
                article.preferred_writing_style.join(", ")
            );
        }

        Command::Briefing {
            id,
            context,
            output,
        } => {
            let config = PipelineConfig::default();
            let ports = build_ports(&config)?;

            let article = {
                let db = store.lock().unwrap();
                db.get_article(id)?
                    .with_context(|| format!("no article with id {}", id))?
            };

            let briefing = generate_briefing(
                ports.completion.as_ref(),
                ports.speech.as_deref(),
                &config,
                &article,
                context.as_deref(),
            )
            .await?;

            println!("{}", briefing.transcript);
            log_info!("estimated duration: {}s", briefing.duration_estimate_secs);

            match (briefing.audio, output) {
                (Some(audio), Some(path)) => {
                    use base64::Engine;
                    let bytes = base64::engine::general_purpose::STANDARD
                        .decode(audio)
                        .context("decoding synthesized audio")?;
                    std::fs::write(&path, bytes)?;
                    newswire_sdk::log_file_saved!(path.display());
                }
                (None, Some(_)) => log_warning!("no audio was produced; nothing written"),
                _ => {}
            }
        }

        Command::Purge { days } => {
            let cutoff = chrono::Local::now() - chrono::Duration::days(days);
            let db = store.lock().unwrap();
            let reaped = db.purge_checkpoints_before(cutoff)?;
            log_done!("reaped {} stale workflow checkpoints", reaped);
        }
    }

    Ok(())
}

/// Construct the provider set from the environment. Speech is optional;
/// everything else is required.
fn build_ports(config: &PipelineConfig) -> Result<Ports> {
    let anthropic_key = std::env::var("ANTHROPIC_API_KEY")
        .context("ANTHROPIC_API_KEY environment variable is not set")?;
    let tavily_key = std::env::var("TAVILY_API_KEY")
        .context("TAVILY_API_KEY environment variable is not set")?;

    let completion = Arc::new(AnthropicCompletion::new(anthropic_key, config.retry.clone()));
    let search = Arc::new(TavilySearch::new(tavily_key, config.retry.clone()));
    let speech: Option<Arc<dyn SpeechPort>> = std::env::var("OPENAI_API_KEY")
        .ok()
        .map(|key| Arc::new(OpenAiSpeech::new(key, config.retry.clone())) as Arc<dyn SpeechPort>);

    Ok(Ports {
        completion,
        search,
        speech,
    })
}

fn render_event(event: &newswire_sdk::ProgressEvent) {
    // Machine-readable copy on stderr, human-readable line on stdout
    event.emit();
    match event.status {
        StepStatus::InProgress => println!("\x1b[36m→ [{}] {}\x1b[0m", event.step.as_str(), event.message),
        StepStatus::Completed => println!("\x1b[32m✓ [{}] {}\x1b[0m", event.step.as_str(), event.message),
        StepStatus::Failed => println!("\x1b[31m✗ [{}] {}\x1b[0m", event.step.as_str(), event.message),
    }
}
