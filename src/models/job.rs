use serde::{Deserialize, Serialize};

/// Raw page data as scraped, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPage {
    pub title: String,
    pub url: String,
    pub description: String,
    pub meta_description: String,
    pub company: String,
}

impl ScrapedPage {
    /// Text handed to structured extraction: the body text, or the meta
    /// description when the body came back empty.
    pub fn source_text(&self) -> &str {
        match self.description.trim().is_empty() {
            true => &self.meta_description,
            false => &self.description,
        }
    }
}

/// Named job fields. Every field is a plain string and defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredJob {
    pub job_title: String,
    pub company_name: String,
    pub description: String,
    pub requirements: String,
    pub additional_context: String,
}

impl StructuredJob {
    /// Description, requirements and context in one blob for keyword mining.
    pub fn full_text(&self) -> String {
        [
            self.description.as_str(),
            self.requirements.as_str(),
            self.additional_context.as_str(),
        ]
        .iter()
        .filter(|s| !s.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_job_uses_camel_case_keys() {
        let job = StructuredJob {
            job_title: "Engineer".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["jobTitle"], "Engineer");
        assert_eq!(value["additionalContext"], "");
    }

    #[test]
    fn test_source_text_falls_back_to_meta_description() {
        let page = ScrapedPage {
            meta_description: "Short summary".to_string(),
            ..Default::default()
        };
        assert_eq!(page.source_text(), "Short summary");
    }

    #[test]
    fn test_full_text_skips_empty_fields() {
        let job = StructuredJob {
            description: "Build things".to_string(),
            additional_context: "Remote".to_string(),
            ..Default::default()
        };
        assert_eq!(job.full_text(), "Build things\n\nRemote");
    }
}
