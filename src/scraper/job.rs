use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, info};
use reqwest::Url;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::TailorError;
use crate::models::job::ScrapedPage;
use crate::utils::cli::JobSource;
use crate::utils::text::normalize;

pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "table",
    "section", "article", "header", "footer", "main", "aside", "nav", "pre", "blockquote", "dt",
    "dd", "hr",
];

static SELECTORS: LazyLock<PageSelectors> = LazyLock::new(PageSelectors::new);

struct PageSelectors {
    og_title: Selector,
    title: Selector,
    description: Selector,
    og_description: Selector,
    site_name: Selector,
    body: Selector,
}

impl PageSelectors {
    fn new() -> Self {
        let parse = |s: &str| Selector::parse(s).unwrap();
        Self {
            og_title: parse(r#"meta[property="og:title"]"#),
            title: parse("title"),
            description: parse(r#"meta[name="description"]"#),
            og_description: parse(r#"meta[property="og:description"]"#),
            site_name: parse(r#"meta[property="og:site_name"]"#),
            body: parse("body"),
        }
    }
}

pub struct PageScraper {
    client: reqwest::Client,
}

impl Default for PageScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl PageScraper {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetches a posting page and pulls its title, meta data and visible
    /// text. The whole load is bounded by [`PAGE_LOAD_TIMEOUT`].
    pub async fn scrape(&self, url: &str) -> Result<ScrapedPage, TailorError> {
        let url = validate_url(url)?;
        info!("fetching job posting from: {}", url);

        let load = async {
            let response = self
                .client
                .get(url.clone())
                .header("User-Agent", USER_AGENT)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(TailorError::UpstreamCall {
                    service: "page",
                    status: Some(status.as_u16()),
                    message: format!("failed to load {url}"),
                });
            }

            Ok::<String, TailorError>(response.text().await?)
        };

        let html = tokio::time::timeout(PAGE_LOAD_TIMEOUT, load)
            .await
            .map_err(|_| {
                TailorError::upstream(
                    "page",
                    format!("{url} did not load within {}s", PAGE_LOAD_TIMEOUT.as_secs()),
                )
            })??;

        debug!("downloaded {} bytes of html", html.len());
        let page = parse_page(url.as_str(), &html);
        info!("successfully extracted job posting text ({} chars)", page.description.len());

        Ok(page)
    }

    /// Builds a page from a local text file: the first non-blank line is the
    /// title, the whole file the description.
    pub async fn from_file(path: &Path) -> Result<ScrapedPage, TailorError> {
        info!("reading job description from file: {}", path.display());

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TailorError::InputValidation(format!("cannot read {}: {e}", path.display())))?;
        if text.trim().is_empty() {
            return Err(TailorError::InputValidation(format!("{} is empty", path.display())));
        }

        Ok(page_from_text(&text, &path.display().to_string()))
    }
}

pub async fn get_job_page(source: &JobSource) -> Result<ScrapedPage, TailorError> {
    match (&source.job_url, &source.job_file) {
        (Some(url), _) => PageScraper::new().scrape(url).await,
        (None, Some(file)) => PageScraper::from_file(file).await,
        (None, None) => Err(TailorError::InputValidation(
            "either a job url or a job file is required".to_string(),
        )),
    }
}

pub fn validate_url(raw: &str) -> Result<Url, TailorError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| TailorError::InputValidation(format!("invalid url '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(TailorError::InputValidation(format!(
            "'{raw}' is not an http(s) url"
        ))),
    }
}

pub fn page_from_text(text: &str, source: &str) -> ScrapedPage {
    let description = normalize(text);
    ScrapedPage {
        title: description.lines().next().unwrap_or_default().trim().to_string(),
        url: source.to_string(),
        description,
        ..Default::default()
    }
}

pub fn parse_page(url: &str, html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);
    let selectors = &*SELECTORS;

    let meta = |selector: &Selector| {
        document
            .select(selector)
            .filter_map(|element| element.value().attr("content"))
            .map(str::trim)
            .find(|content| !content.is_empty())
            .map(str::to_string)
    };

    let title = meta(&selectors.og_title)
        .or_else(|| {
            document
                .select(&selectors.title)
                .next()
                .map(|element| element.text().collect::<String>().trim().to_string())
        })
        .unwrap_or_default();

    let description = document
        .select(&selectors.body)
        .next()
        .map(|body| {
            let mut text = String::new();
            collect_text(body, &mut text);
            normalize(&tidy_lines(&text))
        })
        .unwrap_or_default();

    ScrapedPage {
        title,
        url: url.to_string(),
        description,
        meta_description: meta(&selectors.description)
            .or_else(|| meta(&selectors.og_description))
            .unwrap_or_default(),
        company: meta(&selectors.site_name).unwrap_or_default(),
    }
}

/// Visible text of `element`, with a line break around block elements.
fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if block {
                out.push('\n');
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

/// Collapses runs of spaces inside each line and drops whitespace-only
/// lines down to a single blank one.
fn tidy_lines(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() && lines.last().is_some_and(|last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::{local_client, never_respond};

    const HTML: &str = r#"<!doctype html>
<html>
<head>
  <title>Senior Rust Engineer - Acme Careers</title>
  <meta name="description" content="Join Acme to build payments.">
  <meta property="og:site_name" content="Acme">
  <style>body { color: red; }</style>
</head>
<body>
  <nav>Home | Jobs</nav>
  <h1>Senior   Rust Engineer</h1>
  <script>window.tracking = "ignore me";</script>
  <div>
    <h2>Requirements</h2>
    <ul><li>5+ years with <b>Rust</b></li><li>SQL</li></ul>
  </div>
  <noscript>Enable JavaScript</noscript>
</body>
</html>"#;

    #[test]
    fn test_parse_page_fields() {
        let page = parse_page("https://jobs.acme.dev/1", HTML);
        assert_eq!(page.title, "Senior Rust Engineer - Acme Careers");
        assert_eq!(page.meta_description, "Join Acme to build payments.");
        assert_eq!(page.company, "Acme");
        assert_eq!(page.url, "https://jobs.acme.dev/1");
    }

    #[test]
    fn test_body_text_skips_scripts_and_keeps_lines() {
        let page = parse_page("https://jobs.acme.dev/1", HTML);
        assert!(page.description.contains("Senior Rust Engineer"));
        assert!(page.description.contains("Requirements\n\n5+ years with Rust\n\nSQL"));
        assert!(!page.description.contains("tracking"));
        assert!(!page.description.contains("Enable JavaScript"));
        assert!(!page.description.contains("color: red"));
    }

    #[test]
    fn test_og_title_wins() {
        let html = r#"<html><head><title>Fallback</title><meta property="og:title" content="Platform Engineer"></head><body></body></html>"#;
        let page = parse_page("https://example.com", html);
        assert_eq!(page.title, "Platform Engineer");
        assert_eq!(page.description, "");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/jobs/1").is_ok());
        assert!(validate_url(" http://example.com ").is_ok());
        for bad in ["ftp://example.com", "not a url", "file:///etc/passwd", ""] {
            assert!(
                matches!(validate_url(bad), Err(TailorError::InputValidation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_page_from_text_uses_first_line_as_title() {
        let page = page_from_text("\n\n  Data Engineer  \r\nWe move data.\n", "posting.txt");
        assert_eq!(page.title, "Data Engineer");
        assert_eq!(page.description, "Data Engineer  \nWe move data.");
        assert_eq!(page.url, "posting.txt");
    }

    #[tokio::test]
    async fn test_scrape_rejects_bad_url_without_network() {
        let err = PageScraper::new().scrape("mailto:jobs@example.com").await.unwrap_err();
        assert!(matches!(err, TailorError::InputValidation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_server_times_out_as_upstream_error() {
        let base = never_respond().await;
        let scraper = PageScraper {
            client: local_client(),
        };

        let err = scraper.scrape(&format!("{base}/job")).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            TailorError::UpstreamCall { service: "page", status: None, ref message }
                if message.ends_with("/job did not load within 15s")
        ));
    }
}
