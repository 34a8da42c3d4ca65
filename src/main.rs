use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use inbox_triage::auth::GoogleSession;
use inbox_triage::calendar::{Calendar, GoogleCalendar};
use inbox_triage::config::Config;
use inbox_triage::llm::create_provider;
use inbox_triage::mailbox::gmail::GmailMailbox;
use inbox_triage::mailbox::Mailbox;
use inbox_triage::pipeline::{TriagePipeline, TriageRunner};
use inbox_triage::rescue::SpamRescue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let command = std::env::args().nth(1).unwrap_or_else(|| "triage".to_string());

    eprintln!("📬 Inbox Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Mode: {}", command);
    eprintln!(
        "   Calendar: {}",
        if config.calendar_enabled { "enabled" } else { "disabled" }
    );

    let http = reqwest::Client::new();
    let session = Arc::new(GoogleSession::new(http.clone(), &config));
    let mailbox: Arc<dyn Mailbox> = Arc::new(GmailMailbox::new(http.clone(), Arc::clone(&session)));

    match command.as_str() {
        "triage" => run_triage(&config, http, session, mailbox).await?,
        "rescue" => {
            let rescue = SpamRescue::new(mailbox, config.personal_email.clone());
            let report = rescue.run().await?;
            eprintln!(
                "   Rescued {} of {} scanned ({} failed)",
                report.rescued, report.scanned, report.failed
            );
        }
        other => {
            eprintln!("Error: unknown command '{}' (expected 'triage' or 'rescue')", other);
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run_triage(
    config: &Config,
    http: reqwest::Client,
    session: Arc<GoogleSession>,
    mailbox: Arc<dyn Mailbox>,
) -> anyhow::Result<()> {
    let llm = create_provider(http.clone(), config);

    let calendar: Option<Arc<dyn Calendar>> = if config.calendar_enabled {
        Some(Arc::new(GoogleCalendar::new(http, session)))
    } else {
        None
    };

    let pipeline = TriagePipeline::new(llm, calendar);
    let runner = TriageRunner::new(mailbox, pipeline);

    match config.poll_interval_secs {
        Some(secs) => {
            eprintln!("   Polling every {}s\n", secs);
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            loop {
                ticker.tick().await;
                let query = config.unread_query(Utc::now());
                if let Err(e) = runner.run_cycle(&query, config.fetch_limit).await {
                    tracing::error!(error = %e, "Triage cycle failed");
                }
            }
        }
        None => {
            let query = config.unread_query(Utc::now());
            let report = runner.run_cycle(&query, config.fetch_limit).await?;
            eprintln!(
                "   Processed {} of {} listed ({} drafted, {} failed)",
                report.processed, report.listed, report.drafted, report.failed
            );
            Ok(())
        }
    }
}
