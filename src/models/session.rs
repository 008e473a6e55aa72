use log::info;

use crate::chat::agent::{ResumeAgent, Strategy};
use crate::chat::caller::HttpCaller;
use crate::diff::review::ChangeReview;
use crate::docx::document::ResumeDocument;
use crate::docx::remap::remap_runs;
use crate::error::{DocumentStructureError, TailorError};
use crate::models::job::StructuredJob;
use crate::utils::config::Config;

/// State of one tailoring session, handed explicitly from stage to stage.
pub struct SessionState {
    pub settings: Config,
    pub job: StructuredJob,
    pub resume: Option<ResumeDocument>,
    pub review: Option<ChangeReview>,
}

impl SessionState {
    pub fn new(settings: Config) -> Self {
        Self {
            settings,
            job: StructuredJob::default(),
            resume: None,
            review: None,
        }
    }

    /// Agent for this session, with the strategy resolved from its settings.
    pub fn agent(&self) -> ResumeAgent<HttpCaller> {
        ResumeAgent::new(
            Strategy::resolve(&self.settings),
            HttpCaller::from_settings(&self.settings),
        )
    }

    pub fn load_resume(&mut self, bytes: Vec<u8>) -> Result<&ResumeDocument, TailorError> {
        if bytes.is_empty() {
            return Err(TailorError::InputValidation("resume file is empty".to_string()));
        }

        let document = ResumeDocument::open(bytes)?;
        info!("loaded resume ({} runs)", document.layout().runs.len());

        self.review = None;
        Ok(self.resume.insert(document))
    }

    pub fn resume_text(&self) -> Option<String> {
        self.resume.as_ref().map(ResumeDocument::text)
    }

    /// Diffs `candidate` against the loaded resume, replacing any earlier
    /// review.
    pub fn start_review(&mut self, candidate: &str) -> Result<&mut ChangeReview, TailorError> {
        let original = self
            .resume_text()
            .ok_or_else(|| TailorError::InputValidation("no resume loaded".to_string()))?;

        let review = ChangeReview::compute(&original, candidate);
        info!("{} change groups to review", review.groups().len());

        Ok(self.review.insert(review))
    }

    /// Text after the accept/reject decisions, or the untouched resume text
    /// when nothing was reviewed yet.
    pub fn final_text(&self) -> Option<String> {
        match &self.review {
            Some(review) => Some(review.build_final_text()),
            None => self.resume_text(),
        }
    }

    /// Maps the final text back onto the resume's runs and rebuilds the
    /// document container.
    pub fn export_document(&self) -> Result<Vec<u8>, TailorError> {
        let document = self
            .resume
            .as_ref()
            .ok_or_else(|| TailorError::InputValidation("no resume loaded".to_string()))?;
        let final_text = self.final_text().unwrap_or_default();

        let layout = remap_runs(document.layout(), &document.text(), &final_text);
        if layout.runs.is_empty() {
            return Err(DocumentStructureError::NoRuns.into());
        }

        document.rebuild(&layout)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::docx::document::tests::{RESUME_BODY, docx_with};
    use crate::utils::config::{LlmMode, Settings};

    fn session() -> SessionState {
        let mut session = SessionState::new(Arc::new(Settings::default()));
        session.load_resume(docx_with(RESUME_BODY)).unwrap();
        session
    }

    #[test]
    fn test_review_then_export() {
        let mut session = session();
        let candidate = "Jane Doe\nBuilt scalable web apps using Java & SQL and Python.";
        let review = session.start_review(candidate).unwrap();
        assert_eq!(review.groups().len(), 2);
        review.set_accepted(1, false).unwrap();

        let expected = "Jane Doe\nBuilt scalable web apps using Java & SQL.";
        assert_eq!(session.final_text().as_deref(), Some(expected));

        let bytes = session.export_document().unwrap();
        let reopened = ResumeDocument::open(bytes).unwrap();
        assert_eq!(reopened.text(), expected);
    }

    #[test]
    fn test_agent_follows_session_settings() {
        assert_eq!(session().agent().strategy(), Strategy::Heuristic);

        let settings = Settings {
            llm_api_key: "sk-test".to_string(),
            llm_mode: LlmMode::Generic,
            ..Settings::default()
        };
        let session = SessionState::new(Arc::new(settings));
        assert_eq!(session.agent().strategy(), Strategy::Llm(LlmMode::Generic));
    }

    #[test]
    fn test_final_text_without_review_is_resume_text() {
        let session = session();
        assert_eq!(session.final_text(), session.resume_text());
    }

    #[test]
    fn test_review_needs_resume() {
        let mut session = SessionState::new(Arc::new(Settings::default()));
        assert!(session.start_review("text").is_err());
        assert!(session.export_document().is_err());
        assert!(matches!(
            session.load_resume(Vec::new()),
            Err(TailorError::InputValidation(_))
        ));
    }

    #[test]
    fn test_empty_final_text_is_a_structure_error() {
        let mut session = session();
        session.start_review("").unwrap();
        assert!(matches!(
            session.export_document(),
            Err(TailorError::DocumentStructure(DocumentStructureError::NoRuns))
        ));
    }
}
