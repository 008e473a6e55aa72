mod analysis;
mod chat;
mod diff;
mod docx;
mod error;
mod models;
mod scraper;
mod utils;

use std::io;
use std::path::Path;

use clap::Parser;
use colored::Colorize;
use eyre::Result;
use log::{debug, info};

use crate::analysis::keywords::top_keywords;
use crate::analysis::requirements::mine_requirements;
use crate::chat::agent::{ResumeAgent, Strategy};
use crate::chat::caller::HttpCaller;
use crate::diff::review::ChangeReview;
use crate::models::job::{ScrapedPage, StructuredJob};
use crate::models::session::SessionState;
use crate::scraper::exa::ExaClient;
use crate::scraper::job::get_job_page;
use crate::utils::cli::{Args, Command, JobSource, SettingsAction};
use crate::utils::config::{Config, SettingsPatch, SettingsStore, config};
use crate::utils::log::Logger;
use crate::utils::review::{print_groups, print_inline, review_changes_interactive};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    Logger::init(args.verbosity);

    info!(
        "starting resume-tailor {}",
        format!("v{}", env!("CARGO_PKG_VERSION")).magenta()
    );

    match args.command {
        Command::Extract { job } => {
            let settings = config(args.config)?;
            let (_, job) = extract_job(&settings, &job).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Keywords { job, limit } => {
            let page = load_page(&config(args.config)?, &job).await?;
            print_keywords(page.source_text(), limit);
        }
        Command::Diff { original, candidate } => {
            let original = tokio::fs::read_to_string(&original).await?;
            let candidate = tokio::fs::read_to_string(&candidate).await?;

            let review = ChangeReview::compute(&original, &candidate);
            let mut out = io::stdout().lock();
            print_inline(&review, &mut out)?;
            print_groups(&review, &mut out)?;
            println!("{} change groups", review.groups().len().to_string().bold());
        }
        Command::Tailor {
            resume,
            job,
            output,
            yes,
        } => {
            let settings = config(args.config)?;
            tailor(settings, &resume, &job, &output, yes).await?;
        }
        Command::Settings { action } => {
            let store = SettingsStore::new(&args.config);
            let settings = match action {
                SettingsAction::Show => store.get()?,
                SettingsAction::Set { key, value } => store.set(SettingsPatch::from_pair(&key, &value)?)?,
            };
            println!("{}", toml::to_string_pretty(&settings.redacted())?);
        }
    }

    Ok(())
}

/// Scrapes (or reads) the posting, swapping in Exa's page text when deep
/// extraction is configured and the job came from a URL.
async fn load_page(settings: &Config, source: &JobSource) -> Result<ScrapedPage> {
    let mut page = get_job_page(source).await?;

    if settings.deep_extraction_enabled()
        && let Some(url) = &source.job_url
    {
        page.description = ExaClient::new()
            .fetch_contents(url, &settings.exa_api_key)
            .await?;
        info!("using deep extraction text ({} chars)", page.description.len());
    }

    Ok(page)
}

async fn extract_job(settings: &Config, source: &JobSource) -> Result<(ScrapedPage, StructuredJob)> {
    let page = load_page(settings, source).await?;

    let agent = ResumeAgent::new(Strategy::resolve(settings), HttpCaller::from_settings(settings));
    debug!("extraction strategy: {:?}", agent.strategy());

    let outcome = agent.extract_job(page.source_text(), &page).await?;
    info!(
        "extracted job '{}' at '{}' via {}",
        outcome.job.job_title,
        outcome.job.company_name,
        outcome.path.to_string().cyan()
    );

    Ok((page, outcome.job))
}

fn print_keywords(text: &str, limit: usize) {
    let mined = mine_requirements(text);
    if mined.is_empty() {
        println!("{}", "No requirement sections found.".yellow());
    }

    for (heading, items) in [
        ("Required", &mined.required),
        ("Preferred", &mined.preferred),
        ("Skills", &mined.skills),
    ] {
        if items.is_empty() {
            continue;
        }
        println!("{}", heading.cyan().bold());
        for item in items {
            println!("  • {item}");
        }
    }

    println!("{}", "Keywords".cyan().bold());
    println!("  {}", top_keywords(text, limit).join(", "));
}

async fn tailor(settings: Config, resume: &Path, source: &JobSource, output: &Path, yes: bool) -> Result<()> {
    let mut session = SessionState::new(settings);

    let bytes = tokio::fs::read(resume).await?;
    session.load_resume(bytes)?;
    let resume_text = session.resume_text().unwrap_or_default();

    let (page, job) = extract_job(&session.settings, source).await?;
    session.job = job;

    let tailored = session
        .agent()
        .tailor_resume(&resume_text, &session.job, &page.url)
        .await?;
    info!("tailored resume via {}", tailored.path.to_string().cyan());

    let review = session.start_review(&tailored.text)?;
    match yes {
        true => info!("accepting all {} changes", review.groups().len()),
        false => {
            let stdin = io::stdin();
            review_changes_interactive(review, &mut stdin.lock(), &mut io::stdout())?;
        }
    }

    let document = session.export_document()?;
    tokio::fs::write(output, document).await?;
    info!("wrote tailored resume to {}", output.display());

    Ok(())
}
