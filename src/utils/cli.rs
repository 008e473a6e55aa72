use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "resume-tailor")]
#[command(about = "Extract job postings and tailor a DOCX resume to them with a reviewable diff", long_about = None)]
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Sets the logger's verbosity level
    #[arg(short, long, value_name = "VERBOSITY", default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract structured fields (title, company, requirements...) from a job posting
    Extract {
        #[command(flatten)]
        job: JobSource,
    },

    /// Show the mined requirements and top keywords of a job posting
    Keywords {
        #[command(flatten)]
        job: JobSource,

        /// Number of keywords to print
        #[arg(short, long, default_value_t = crate::analysis::keywords::DEFAULT_KEYWORD_LIMIT)]
        limit: usize,
    },

    /// Show the reviewable change groups between two text files
    Diff {
        /// Original text file
        #[arg(long, value_name = "FILE")]
        original: PathBuf,

        /// Candidate text file
        #[arg(long, value_name = "FILE")]
        candidate: PathBuf,
    },

    /// Tailor a DOCX resume to a job posting
    Tailor {
        /// Resume document (.docx)
        #[arg(short, long, value_name = "FILE")]
        resume: PathBuf,

        #[command(flatten)]
        job: JobSource,

        /// Output document path
        #[arg(short, long, value_name = "FILE", default_value = "resume.tailored.docx")]
        output: PathBuf,

        /// Accept every change without the interactive review
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or update the stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the current settings with keys masked
    Show,

    /// Update a single setting
    Set {
        /// One of exa_api_key, llm_endpoint, llm_model, llm_mode, llm_api_key
        #[arg(long)]
        key: String,

        #[arg(long)]
        value: String,
    },
}

#[derive(ClapArgs, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct JobSource {
    /// URL to the job posting (LinkedIn, Indeed, etc.)
    #[arg(short, long, value_name = "URL")]
    pub job_url: Option<String>,

    /// Path to file containing job description
    #[arg(long, value_name = "FILE")]
    pub job_file: Option<PathBuf>,
}
