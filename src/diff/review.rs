use serde::Serialize;

use crate::diff::engine::{DiffOp, diff_text};
use crate::error::TailorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSegment {
    pub op: DiffOp,
    pub text: String,
    /// `None` for equal text, which is never reviewable.
    pub group_id: Option<usize>,
}

/// One reviewable cluster of consecutive inserts and deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeGroup {
    pub id: usize,
    pub deleted_text: String,
    pub inserted_text: String,
    pub accepted: bool,
}

/// Diff between the original resume text and a tailored candidate, with the
/// user's accept/reject decisions per change group.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeReview {
    original: String,
    candidate: String,
    segments: Vec<DiffSegment>,
    groups: Vec<ChangeGroup>,
}

impl ChangeReview {
    pub fn compute(original: &str, candidate: &str) -> Self {
        let (segments, groups) = group_segments(
            diff_text(original, candidate)
                .into_iter()
                .map(|edit| (edit.op, edit.text)),
        );

        Self {
            original: original.to_string(),
            candidate: candidate.to_string(),
            segments,
            groups,
        }
    }

    pub fn segments(&self) -> &[DiffSegment] {
        &self.segments
    }

    pub fn groups(&self) -> &[ChangeGroup] {
        &self.groups
    }

    pub fn accepted_count(&self) -> usize {
        self.groups.iter().filter(|g| g.accepted).count()
    }

    pub fn set_accepted(&mut self, id: usize, accepted: bool) -> Result<(), TailorError> {
        let group = self
            .groups
            .get_mut(id)
            .ok_or_else(|| TailorError::InputValidation(format!("no change group #{}", id + 1)))?;
        group.accepted = accepted;
        Ok(())
    }

    pub fn toggle(&mut self, id: usize) -> Result<bool, TailorError> {
        let accepted = !self
            .groups
            .get(id)
            .ok_or_else(|| TailorError::InputValidation(format!("no change group #{}", id + 1)))?
            .accepted;
        self.set_accepted(id, accepted)?;
        Ok(accepted)
    }

    pub fn set_all(&mut self, accepted: bool) {
        for group in &mut self.groups {
            group.accepted = accepted;
        }
    }

    /// Flattens the accept/reject decisions into the final text: equal text
    /// always, deletions only when rejected, insertions only when accepted.
    pub fn build_final_text(&self) -> String {
        if self.groups.is_empty() {
            return self.candidate.clone();
        }

        let mut out = String::with_capacity(self.candidate.len().max(self.original.len()));
        for segment in &self.segments {
            let accepted = segment
                .group_id
                .and_then(|id| self.groups.get(id))
                .is_some_and(|g| g.accepted);
            let emit = match segment.op {
                DiffOp::Equal => true,
                DiffOp::Delete => !accepted,
                DiffOp::Insert => accepted,
            };
            if emit {
                out.push_str(&segment.text);
            }
        }
        out
    }
}

/// Assigns group ids: a new group starts at every non-equal segment that
/// follows an equal one (or opens the script).
pub fn group_segments(
    edits: impl IntoIterator<Item = (DiffOp, String)>,
) -> (Vec<DiffSegment>, Vec<ChangeGroup>) {
    let mut segments: Vec<DiffSegment> = Vec::new();
    let mut groups: Vec<ChangeGroup> = Vec::new();
    let mut previous_equal = true;

    for (op, text) in edits {
        if op == DiffOp::Equal {
            segments.push(DiffSegment {
                op,
                text,
                group_id: None,
            });
            previous_equal = true;
            continue;
        }

        if previous_equal {
            groups.push(ChangeGroup {
                id: groups.len(),
                deleted_text: String::new(),
                inserted_text: String::new(),
                accepted: true,
            });
        }
        previous_equal = false;

        let Some(group) = groups.last_mut() else {
            continue;
        };
        match op {
            DiffOp::Delete => group.deleted_text.push_str(&text),
            _ => group.inserted_text.push_str(&text),
        }
        segments.push(DiffSegment {
            op,
            text,
            group_id: Some(group.id),
        });
    }

    (segments, groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping_merges_interleaved_edits() {
        let (segments, groups) = group_segments(vec![
            (DiffOp::Delete, "a".to_string()),
            (DiffOp::Insert, "b".to_string()),
            (DiffOp::Delete, "c".to_string()),
            (DiffOp::Equal, " mid ".to_string()),
            (DiffOp::Insert, "d".to_string()),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].deleted_text, "ac");
        assert_eq!(groups[0].inserted_text, "b");
        assert_eq!(groups[1].inserted_text, "d");
        assert!(groups.iter().all(|g| g.accepted));

        let ids: Vec<Option<usize>> = segments.iter().map(|s| s.group_id).collect();
        assert_eq!(ids, vec![Some(0), Some(0), Some(0), None, Some(1)]);
    }

    #[test]
    fn test_scenario_accept_all_keeps_unchanged_spans() {
        let original = "Built web apps using Java.";
        let candidate = "Built scalable web apps using Java and Python.";
        let review = ChangeReview::compute(original, candidate);

        let final_text = review.build_final_text();
        assert_eq!(final_text, candidate);
        assert!(review.groups().iter().any(|g| g.inserted_text.contains("scalable")));
        assert!(review.groups().iter().any(|g| g.inserted_text.contains("Python")));

        let equal: String = review
            .segments()
            .iter()
            .filter(|s| s.op == DiffOp::Equal)
            .map(|s| s.text.as_str())
            .collect();
        assert!(equal.starts_with("Built"));
        assert!(equal.contains("web apps using Java"));
    }

    #[test]
    fn test_round_trip_accept_and_reject() {
        let pairs = [
            ("Built web apps using Java.", "Built scalable web apps using Java and Python."),
            ("Summary\nLed a team of 5.", "Summary\nLed a cross-functional team of 12.\nSkills"),
            ("delete everything", ""),
            ("", "brand new"),
            ("Python, SQL", "SQL, Python, Rust"),
        ];

        for (original, candidate) in pairs {
            let mut review = ChangeReview::compute(original, candidate);
            assert_eq!(review.build_final_text(), candidate);

            review.set_all(false);
            if !review.groups().is_empty() {
                assert_eq!(review.build_final_text(), original);
            }
        }
    }

    #[test]
    fn test_partial_acceptance() {
        let mut review = ChangeReview::compute(
            "Built web apps using Java.",
            "Built scalable web apps using Java and Python.",
        );
        assert_eq!(review.groups().len(), 2);

        review.set_accepted(1, false).unwrap();
        assert_eq!(review.build_final_text(), "Built scalable web apps using Java.");

        assert!(!review.toggle(0).unwrap());
        assert_eq!(review.build_final_text(), "Built web apps using Java.");
        assert_eq!(review.accepted_count(), 0);
    }

    #[test]
    fn test_no_groups_returns_candidate() {
        let review = ChangeReview::compute("same text", "same text");
        assert!(review.groups().is_empty());
        assert_eq!(review.build_final_text(), "same text");
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let mut review = ChangeReview::compute("a", "b");
        assert!(review.set_accepted(7, true).is_err());
        assert!(review.toggle(7).is_err());
    }
}
