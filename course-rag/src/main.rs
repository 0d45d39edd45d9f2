use std::sync::Arc;

use anyhow::Context;
use course_rag::{AnthropicClient, RagConfig, RagSystem};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const BANNER: &str = "Ask about the courses. /courses lists them, /new starts over, exit quits.\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = RagConfig::from_env().context("invalid configuration")?;
    let client = AnthropicClient::new(config.api_key.clone())?;
    let rag = RagSystem::builder().llm_client(Arc::new(client)).config(config).build()?;

    let docs = std::env::args().nth(1).unwrap_or_else(|| "docs".to_string());
    let (courses, chunks) = rag
        .add_course_folder(&docs, false)
        .await
        .with_context(|| format!("failed to load course documents from '{docs}'"))?;
    tracing::info!(courses, chunks, "course documents loaded");

    let mut session = rag.create_session().await;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(BANNER.as_bytes()).await?;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else { break };
        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "/new" => {
                session = rag.create_session().await;
                stdout.write_all(b"Started a new conversation.\n").await?;
            }
            "/courses" => {
                let analytics = rag.course_analytics().await?;
                let mut out = format!("{} course(s):\n", analytics.total_courses);
                for title in &analytics.course_titles {
                    out.push_str(&format!("  - {title}\n"));
                }
                stdout.write_all(out.as_bytes()).await?;
            }
            _ => match rag.query(question, Some(&session)).await {
                Ok((answer, sources)) => {
                    let mut out = format!("\n{answer}\n");
                    if !sources.is_empty() {
                        out.push_str("\nSources:\n");
                        for source in &sources {
                            let label = match source.lesson_number {
                                Some(n) => format!("{} - Lesson {n}", source.text),
                                None => source.text.clone(),
                            };
                            match &source.link {
                                Some(link) => out.push_str(&format!("  - {label} ({link})\n")),
                                None => out.push_str(&format!("  - {label}\n")),
                            }
                        }
                    }
                    out.push('\n');
                    stdout.write_all(out.as_bytes()).await?;
                }
                Err(e) => {
                    tracing::error!(error = %e, "query failed");
                    stdout.write_all(format!("Error: {e}\n").as_bytes()).await?;
                }
            },
        }
    }

    Ok(())
}
