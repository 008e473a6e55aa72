use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::analysis::keywords::{DEFAULT_KEYWORD_LIMIT, contains_keyword, top_keywords};
use crate::models::job::{ScrapedPage, StructuredJob};
use crate::utils::text::take_chars;

const HEADING_MAX_CHARS: usize = 100;
const DESCRIPTION_FALLBACK_CHARS: usize = 3000;

const REQUIREMENT_KEYWORDS: &[&str] = &[
    "requirements",
    "qualifications",
    "what you'll need",
    "what you will need",
    "what we're looking for",
    "what we are looking for",
    "must have",
    "must-have",
    "you have",
    "you bring",
    "who you are",
    "nice to have",
    "preferred",
];
const CONTEXT_KEYWORDS: &[&str] = &[
    "benefits",
    "perks",
    "what we offer",
    "compensation",
    "salary",
    "location",
    "about us",
    "about the company",
    "our culture",
    "tech stack",
    "equal opportunity",
];
const DESCRIPTION_KEYWORDS: &[&str] = &[
    "responsibilities",
    "what you'll do",
    "what you will do",
    "about the role",
    "about the job",
    "the role",
    "job description",
    "overview",
    "your impact",
];

static REQUIREMENTS_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(requirements?|qualifications?|skills?|experience|education)").unwrap()
});
static CONTEXT_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(location|salary|benefits?|tech stack|technologies?|tools?|culture|team)").unwrap()
});
static TECH_STACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)\b(?:tech(?:nology)? stack|technologies|tools)\s*:\s*([^\n]+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Requirements,
    Context,
}

/// Section a line switches to, if it reads like a heading.
fn classify(line: &str) -> Option<Section> {
    if line.chars().count() >= HEADING_MAX_CHARS {
        return None;
    }

    let lower = line.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if has_any(REQUIREMENT_KEYWORDS) || REQUIREMENTS_ANCHOR.is_match(line) {
        Some(Section::Requirements)
    } else if has_any(CONTEXT_KEYWORDS) || CONTEXT_ANCHOR.is_match(line) {
        Some(Section::Context)
    } else if has_any(DESCRIPTION_KEYWORDS) {
        Some(Section::Description)
    } else {
        None
    }
}

/// Splits raw posting text into job fields without any network call. Never
/// fails; every field is at worst empty.
///
/// Heading lines land in the section they open, so "Benefits:" is the first
/// line of the additional context.
pub fn fallback_parse_job(raw: &str, page: &ScrapedPage) -> StructuredJob {
    let mut section = Section::Description;
    let mut description: Vec<&str> = Vec::new();
    let mut requirements: Vec<&str> = Vec::new();
    let mut context: Vec<String> = Vec::new();

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(next) = classify(line) {
            section = next;
        }
        match section {
            Section::Description => description.push(line),
            Section::Requirements => requirements.push(line),
            Section::Context => context.push(line.to_string()),
        }
    }

    if let Some(stack) = TECH_STACK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|stack| !stack.is_empty())
    {
        context.push(format!("Tech stack: {stack}"));
    }

    let description = match description.is_empty() {
        true => take_chars(raw.trim(), DESCRIPTION_FALLBACK_CHARS).to_string(),
        false => description.join("\n"),
    };

    debug!(
        "heuristic split: {} description chars, {} requirement lines, {} context lines",
        description.len(),
        requirements.len(),
        context.len()
    );

    StructuredJob {
        job_title: page.title.trim().to_string(),
        company_name: page.company.trim().to_string(),
        description,
        requirements: requirements.join("\n"),
        additional_context: context.join("\n"),
    }
}

/// Offline tailoring: adds one "Key strengths" line naming the job's top
/// keywords the resume already mentions. Leaves the text alone when none
/// match.
pub fn fallback_tailor(resume_text: &str, job: &StructuredJob) -> String {
    let matched: Vec<String> = top_keywords(&job.full_text(), DEFAULT_KEYWORD_LIMIT)
        .into_iter()
        .filter(|keyword| contains_keyword(resume_text, keyword))
        .collect();

    if matched.is_empty() {
        debug!("no job keywords found in the resume, leaving it unchanged");
        return resume_text.to_string();
    }

    let label = match job.job_title.trim() {
        "" => "Key strengths".to_string(),
        title => format!("Key strengths for {title}"),
    };

    format!("{}\n\n{}: {}", resume_text.trim_end(), label, matched.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_and_benefits_scenario() {
        let raw = "Requirements:\n- 5 years Python\n- SQL\n\nBenefits:\nRemote work";
        let job = fallback_parse_job(raw, &ScrapedPage::default());

        assert!(job.requirements.contains("5 years Python"));
        assert!(job.requirements.contains("SQL"));
        assert!(job.additional_context.contains("Remote work"));
        assert!(!job.requirements.contains("Remote work"));
    }

    #[test]
    fn test_heading_line_joins_its_section() {
        let raw = "We build rockets.\nRequirements:\n- Rust\nBenefits:\nHealth";
        let job = fallback_parse_job(raw, &ScrapedPage::default());
        assert_eq!(job.description, "We build rockets.");
        assert_eq!(job.requirements, "Requirements:\n- Rust");
        assert_eq!(job.additional_context, "Benefits:\nHealth");
    }

    #[test]
    fn test_seeds_title_and_company_from_page() {
        let page = ScrapedPage {
            title: " Backend Engineer ".to_string(),
            company: "Acme".to_string(),
            ..Default::default()
        };
        let job = fallback_parse_job("Build APIs.", &page);
        assert_eq!(job.job_title, "Backend Engineer");
        assert_eq!(job.company_name, "Acme");
        assert_eq!(job.description, "Build APIs.");
    }

    #[test]
    fn test_description_falls_back_to_raw_prefix() {
        let raw = format!("Requirements\n{}", "x".repeat(5000));
        let job = fallback_parse_job(&raw, &ScrapedPage::default());
        assert_eq!(job.description.chars().count(), DESCRIPTION_FALLBACK_CHARS);
        assert!(job.description.starts_with("Requirements"));
    }

    #[test]
    fn test_long_lines_never_switch_sections() {
        let long = format!("Requirements are discussed below {}", "a".repeat(120));
        let job = fallback_parse_job(&long, &ScrapedPage::default());
        assert_eq!(job.description, long);
        assert!(job.requirements.is_empty());
    }

    #[test]
    fn test_tech_stack_is_appended_to_context() {
        let raw = "About the role\nWe ship fast. Tech stack: Rust, Postgres, Kafka\nRequirements\n- Rust";
        let job = fallback_parse_job(raw, &ScrapedPage::default());
        assert!(job.additional_context.ends_with("Tech stack: Rust, Postgres, Kafka"));
    }

    #[test]
    fn test_never_fails_on_empty_input() {
        let job = fallback_parse_job("", &ScrapedPage::default());
        assert_eq!(job, StructuredJob::default());

        let job = fallback_parse_job("\n\n  \n", &ScrapedPage::default());
        assert!(job.description.is_empty());
    }

    #[test]
    fn test_fallback_tailor_appends_matching_keywords() {
        let job = StructuredJob {
            job_title: "Data Engineer".to_string(),
            description: "Python pipelines on Kafka. Python and SQL daily. Kubernetes a plus.".to_string(),
            ..Default::default()
        };
        let resume = "Jane Doe\nBuilt Python services backed by SQL.\n";
        let tailored = fallback_tailor(resume, &job);

        assert!(tailored.starts_with("Jane Doe\nBuilt Python services backed by SQL.\n\n"));
        assert!(tailored.ends_with("Key strengths for Data Engineer: python, sql"));
    }

    #[test]
    fn test_fallback_tailor_without_matches_is_identity() {
        let job = StructuredJob {
            description: "Haskell and OCaml".to_string(),
            ..Default::default()
        };
        assert_eq!(fallback_tailor("Java developer", &job), "Java developer");
    }
}
