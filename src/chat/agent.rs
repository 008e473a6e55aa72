use std::fmt;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Map, Value, json};

use crate::analysis::keywords::{DEFAULT_KEYWORD_LIMIT, top_keywords};
use crate::analysis::requirements::mine_requirements;
use crate::chat::caller::{CompletionRequest, LlmCaller, Task};
use crate::chat::fallback::{fallback_parse_job, fallback_tailor};
use crate::error::TailorError;
use crate::models::job::{ScrapedPage, StructuredJob};
use crate::utils::config::{LlmMode, Settings};
use crate::utils::text::{normalize, take_chars};

const SYSTEM_PROMPT: &str = include_str!("system_prompt.txt");
const EXTRACT_PROMPT: &str = include_str!("extract_prompt.txt");
const TAILOR_PROMPT: &str = include_str!("tailor_prompt.txt");

pub const MAX_EXTRACT_CHARS: usize = 8000;
const TRUNCATION_MARKER: &str = "\n\n[content truncated]";

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[\w-]*\s*(.*?)```").unwrap());
static WHOLE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[\w-]*[ \t]*\n?(.*?)\n?```$").unwrap());

/// How job extraction and tailoring are performed, decided once from the
/// settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Llm(LlmMode),
    Heuristic,
}

impl Strategy {
    pub fn resolve(settings: &Settings) -> Self {
        match settings.llm_configured() {
            true => Strategy::Llm(settings.llm_mode),
            false => Strategy::Heuristic,
        }
    }
}

/// Which path actually produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPath {
    Llm,
    Heuristic,
    HeuristicAfterFailure,
}

impl fmt::Display for StrategyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyPath::Llm => write!(f, "llm"),
            StrategyPath::Heuristic => write!(f, "heuristic"),
            StrategyPath::HeuristicAfterFailure => write!(f, "heuristic (llm call failed)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub job: StructuredJob,
    pub path: StrategyPath,
}

#[derive(Debug, Clone)]
pub struct TailorOutcome {
    pub text: String,
    pub path: StrategyPath,
}

pub struct ResumeAgent<C> {
    strategy: Strategy,
    caller: C,
}

impl<C: LlmCaller> ResumeAgent<C> {
    pub fn new(strategy: Strategy, caller: C) -> Self {
        Self { strategy, caller }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub async fn extract_job(&self, raw: &str, page: &ScrapedPage) -> Result<ExtractionOutcome, TailorError> {
        let text = normalize(raw);
        debug!("job text length after normalization: {} chars", text.len());

        if self.strategy == Strategy::Heuristic {
            info!("no llm configured, extracting job fields heuristically");
            return Ok(ExtractionOutcome {
                job: fallback_parse_job(&text, page),
                path: StrategyPath::Heuristic,
            });
        }

        info!("extracting job fields using llm");
        match self.llm_extract(&text, page).await {
            Ok(job) => Ok(ExtractionOutcome {
                job,
                path: StrategyPath::Llm,
            }),
            Err(e) if e.is_recoverable() => {
                warn!("llm extraction failed, using heuristic fallback: {}", e);
                Ok(ExtractionOutcome {
                    job: fallback_parse_job(&text, page),
                    path: StrategyPath::HeuristicAfterFailure,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn llm_extract(&self, text: &str, page: &ScrapedPage) -> Result<StructuredJob, TailorError> {
        let content = truncate_for_prompt(text);
        let prompt = EXTRACT_PROMPT
            .replace("{page_title}", &page.title)
            .replace("{page_url}", &page.url)
            .replace("{content}", &content);

        let request = CompletionRequest {
            task: Task::ExtractJob,
            system: SYSTEM_PROMPT.to_string(),
            payload: json!({
                "task": Task::ExtractJob.as_str(),
                "prompt": prompt,
                "url": page.url,
            }),
            prompt,
        };

        let response = self.caller.complete(&request).await?;
        debug!("extraction response: {} chars", response.len());

        let mut job = parse_job_response(&response)?;
        if job.job_title.is_empty() {
            job.job_title = page.title.trim().to_string();
        }
        if job.company_name.is_empty() {
            job.company_name = page.company.trim().to_string();
        }
        Ok(job)
    }

    pub async fn tailor_resume(
        &self,
        resume_text: &str,
        job: &StructuredJob,
        url: &str,
    ) -> Result<TailorOutcome, TailorError> {
        if resume_text.trim().is_empty() {
            return Err(TailorError::InputValidation("resume has no text".to_string()));
        }

        if self.strategy == Strategy::Heuristic {
            info!("no llm configured, tailoring with keyword heuristic");
            return Ok(TailorOutcome {
                text: fallback_tailor(resume_text, job),
                path: StrategyPath::Heuristic,
            });
        }

        info!("tailoring resume using llm");
        match self.llm_tailor(resume_text, job, url).await {
            Ok(text) => Ok(TailorOutcome {
                text,
                path: StrategyPath::Llm,
            }),
            Err(e) if e.is_recoverable() => {
                warn!("llm tailoring failed, using keyword heuristic: {}", e);
                Ok(TailorOutcome {
                    text: fallback_tailor(resume_text, job),
                    path: StrategyPath::HeuristicAfterFailure,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn llm_tailor(&self, resume_text: &str, job: &StructuredJob, url: &str) -> Result<String, TailorError> {
        let request = CompletionRequest {
            task: Task::Tailor,
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_tailor_prompt(resume_text, job),
            payload: json!({
                "task": Task::Tailor.as_str(),
                "resumeText": resume_text,
                "job": job,
                "url": url,
            }),
        };

        let response = self.caller.complete(&request).await?;
        let text = strip_code_fences(&response);
        if text.trim().is_empty() {
            return Err(TailorError::Parse("llm returned an empty resume".to_string()));
        }

        debug!("tailored text: {} chars (original {})", text.len(), resume_text.len());
        Ok(text)
    }
}

fn truncate_for_prompt(text: &str) -> String {
    let head = take_chars(text, MAX_EXTRACT_CHARS);
    match head.len() < text.len() {
        true => format!("{head}{TRUNCATION_MARKER}"),
        false => text.to_string(),
    }
}

fn build_tailor_prompt(resume_text: &str, job: &StructuredJob) -> String {
    let mined = mine_requirements(&[job.description.as_str(), job.requirements.as_str()].join("\n\n"));
    let keywords = top_keywords(&job.full_text(), DEFAULT_KEYWORD_LIMIT);

    let list = |items: &[String]| match items.is_empty() {
        true => "(none found)".to_string(),
        false => items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n"),
    };

    TAILOR_PROMPT
        .replace("{job_title}", &job.job_title)
        .replace("{company_name}", &job.company_name)
        .replace("{description}", &job.description)
        .replace("{requirements}", &job.requirements)
        .replace("{additional_context}", &job.additional_context)
        .replace("{required}", &list(&mined.required))
        .replace("{preferred}", &list(&mined.preferred))
        .replace("{skills}", &list(&mined.skills))
        .replace("{keywords}", &keywords.join(", "))
        .replace("{resume}", resume_text)
}

/// Parses the extraction answer: a fenced block first, otherwise the span
/// from the first `{` to the last `}`. Anything but a JSON object is an
/// error.
pub fn parse_job_response(response: &str) -> Result<StructuredJob, TailorError> {
    let fenced = FENCED_BLOCK
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|inner| !inner.is_empty());

    let candidate = match fenced {
        Some(inner) => inner,
        None => {
            let start = response
                .find('{')
                .ok_or_else(|| TailorError::Parse("no JSON object found in response".to_string()))?;
            let end = response
                .rfind('}')
                .filter(|end| *end > start)
                .ok_or_else(|| TailorError::Parse("malformed JSON in response".to_string()))?;
            &response[start..=end]
        }
    };

    let value: Value = serde_json::from_str(candidate).map_err(|e| {
        debug!("JSON parsing failed: {}", e);
        TailorError::Parse(format!("failed to parse extraction response: {e}"))
    })?;
    let Value::Object(fields) = value else {
        return Err(TailorError::Parse("extraction response is not a JSON object".to_string()));
    };

    Ok(StructuredJob {
        job_title: string_field(&fields, "jobTitle"),
        company_name: string_field(&fields, "companyName"),
        description: string_field(&fields, "description"),
        requirements: string_field(&fields, "requirements"),
        additional_context: string_field(&fields, "additionalContext"),
    })
}

/// Missing and null become "", lists are joined one item per line.
fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    fn plain(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            Value::Array(items) => items
                .iter()
                .map(plain)
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }

    fields.get(key).map(plain).unwrap_or_default()
}

fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim().replace('\r', "");
    match WHOLE_FENCE.captures(&trimmed).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().to_string(),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Records every request and answers with a canned result.
    struct CountingCaller {
        answer: Result<String, &'static str>,
        requests: RefCell<Vec<CompletionRequest>>,
    }

    impl CountingCaller {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn failing(message: &'static str) -> Self {
            Self {
                answer: Err(message),
                requests: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.borrow().len()
        }
    }

    impl LlmCaller for CountingCaller {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, TailorError> {
            self.requests.borrow_mut().push(request.clone());
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(TailorError::UpstreamCall {
                    service: "mock",
                    status: Some(500),
                    message: message.to_string(),
                }),
            }
        }
    }

    fn job() -> StructuredJob {
        StructuredJob {
            job_title: "Backend Engineer".to_string(),
            company_name: "Acme".to_string(),
            description: "Build Rust services.\n\nRequirements:\n- Experience with Rust\n- SQL".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_strategy_requires_key_and_endpoint() {
        let mut settings = Settings::default();
        assert_eq!(Strategy::resolve(&settings), Strategy::Heuristic);

        settings.llm_api_key = "sk-1".to_string();
        assert_eq!(Strategy::resolve(&settings), Strategy::Llm(LlmMode::OpenAi));

        settings.llm_endpoint = "  ".to_string();
        assert_eq!(Strategy::resolve(&settings), Strategy::Heuristic);
    }

    #[tokio::test]
    async fn test_unconfigured_settings_issue_no_calls() {
        let settings = Settings {
            llm_api_key: String::new(),
            exa_api_key: String::new(),
            ..Settings::default()
        };
        let agent = ResumeAgent::new(Strategy::resolve(&settings), CountingCaller::answering("{}"));

        let extracted = agent
            .extract_job("Requirements:\n- Rust", &ScrapedPage::default())
            .await
            .unwrap();
        let tailored = agent.tailor_resume("Rust developer", &job(), "").await.unwrap();

        assert_eq!(extracted.path, StrategyPath::Heuristic);
        assert_eq!(tailored.path, StrategyPath::Heuristic);
        assert_eq!(agent.caller.calls(), 0);
    }

    #[tokio::test]
    async fn test_fenced_json_is_parsed() {
        let response = "Here you go:\n```json\n{\"jobTitle\":\"Engineer\",\"companyName\":\"Acme\",\"requirements\":[\"Rust\",\"SQL\"]}\n```";
        let agent = ResumeAgent::new(Strategy::Llm(LlmMode::OpenAi), CountingCaller::answering(response));

        let outcome = agent.extract_job("some posting", &ScrapedPage::default()).await.unwrap();
        assert_eq!(outcome.path, StrategyPath::Llm);
        assert_eq!(outcome.job.job_title, "Engineer");
        assert_eq!(outcome.job.requirements, "Rust\nSQL");
        assert_eq!(outcome.job.description, "");
        assert_eq!(outcome.job.additional_context, "");
    }

    #[test]
    fn test_any_fence_tag_is_stripped() {
        for tag in ["javascript", "jsonc", "JSON", ""] {
            let response = format!("```{tag}\n{{\"jobTitle\": \"Engineer\"}}\n```");
            let job = parse_job_response(&response).unwrap();
            assert_eq!(job.job_title, "Engineer", "fence tag {tag:?}");
        }
    }

    #[test]
    fn test_bare_object_and_parse_failures() {
        let job = parse_job_response("Sure! {\"jobTitle\": \"Dev\", \"description\": null} Thanks").unwrap();
        assert_eq!(job.job_title, "Dev");
        assert_eq!(job.description, "");

        assert!(matches!(parse_job_response("no json here"), Err(TailorError::Parse(_))));
        assert!(matches!(parse_job_response("```json\n[1, 2]\n```"), Err(TailorError::Parse(_))));
        assert!(matches!(parse_job_response("{\"jobTitle\": }"), Err(TailorError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unparseable_answer_falls_back() {
        let page = ScrapedPage {
            title: "Data Engineer".to_string(),
            ..Default::default()
        };
        let agent = ResumeAgent::new(
            Strategy::Llm(LlmMode::OpenAi),
            CountingCaller::answering("I cannot help with that."),
        );

        let outcome = agent.extract_job("Requirements:\n- SQL", &page).await.unwrap();
        assert_eq!(outcome.path, StrategyPath::HeuristicAfterFailure);
        assert_eq!(outcome.job.job_title, "Data Engineer");
        assert_eq!(outcome.job.requirements, "Requirements:\n- SQL");
        assert_eq!(agent.caller.calls(), 1);
    }

    #[tokio::test]
    async fn test_long_input_is_truncated_with_marker() {
        let agent = ResumeAgent::new(Strategy::Llm(LlmMode::Generic), CountingCaller::answering("{}"));
        let raw = "word ".repeat(4000);
        agent.extract_job(&raw, &ScrapedPage::default()).await.unwrap();

        let requests = agent.caller.requests.borrow();
        assert!(requests[0].prompt.contains(TRUNCATION_MARKER));
        assert_eq!(requests[0].payload["task"], "extract");
        assert!(requests[0].prompt.len() < raw.len());
    }

    #[tokio::test]
    async fn test_tailor_strips_fences_and_sends_payload() {
        let agent = ResumeAgent::new(
            Strategy::Llm(LlmMode::Generic),
            CountingCaller::answering("```\nJane Doe\nRust engineer\n```"),
        );

        let outcome = agent
            .tailor_resume("Jane Doe\nEngineer", &job(), "https://jobs.example.com/1")
            .await
            .unwrap();
        assert_eq!(outcome.text, "Jane Doe\nRust engineer");
        assert_eq!(outcome.path, StrategyPath::Llm);

        let requests = agent.caller.requests.borrow();
        assert_eq!(requests[0].payload["task"], "tailor");
        assert_eq!(requests[0].payload["resumeText"], "Jane Doe\nEngineer");
        assert_eq!(requests[0].payload["job"]["jobTitle"], "Backend Engineer");
        assert!(requests[0].prompt.contains("- Experience with Rust"));
    }

    #[tokio::test]
    async fn test_failed_tailoring_falls_back() {
        let agent = ResumeAgent::new(Strategy::Llm(LlmMode::OpenAi), CountingCaller::failing("boom"));
        let outcome = agent.tailor_resume("Rust and SQL developer", &job(), "").await.unwrap();

        assert_eq!(outcome.path, StrategyPath::HeuristicAfterFailure);
        assert!(outcome.text.contains("Key strengths for Backend Engineer"));
    }

    #[tokio::test]
    async fn test_empty_resume_is_rejected() {
        let agent = ResumeAgent::new(Strategy::Heuristic, CountingCaller::answering(""));
        let err = agent.tailor_resume("   ", &job(), "").await.unwrap_err();
        assert!(matches!(err, TailorError::InputValidation(_)));
    }
}
