use log::{debug, warn};

use crate::diff::engine::{DiffOp, diff_text};
use crate::docx::runs::{RunLayout, TextRun};

/// Owner of one character of the original plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Run(usize),
    Separator,
}

struct Piece {
    text: String,
    source: Option<usize>,
    paragraph: usize,
}

/// Maps `new_text` onto the runs of `original`, so that text surviving the
/// edit keeps its run's formatting and inserted text borrows the formatting
/// of the run it was inserted next to.
///
/// The returned layout always satisfies `layout.text() == new_text`; every
/// run carries a format handle cloned from an original run (or none when
/// the source run had none).
pub fn remap_runs(original: &RunLayout, original_text: &str, new_text: &str) -> RunLayout {
    let slots = slot_map(original);
    let derived = original.text();
    if derived != original_text {
        warn!("original text does not match the document runs, aligning against the runs instead");
    }

    let mut pieces: Vec<Piece> = Vec::new();
    let mut paragraph = 0;
    let mut cursor = 0;

    let mut emit = |c: char, source: Option<usize>, paragraph: &mut usize| {
        if c == '\n' {
            *paragraph += 1;
            return;
        }
        match pieces.last_mut() {
            Some(last) if last.source == source && last.paragraph == *paragraph => last.text.push(c),
            _ => pieces.push(Piece {
                text: c.to_string(),
                source,
                paragraph: *paragraph,
            }),
        }
    };

    for edit in diff_text(&derived, new_text) {
        match edit.op {
            DiffOp::Equal => {
                for c in edit.text.chars() {
                    let source = match slots.get(cursor) {
                        Some(Slot::Run(index)) => Some(*index),
                        _ => None,
                    };
                    emit(c, source, &mut paragraph);
                    cursor += 1;
                }
            }
            DiffOp::Delete => cursor += edit.text.chars().count(),
            DiffOp::Insert => {
                let anchor = insertion_anchor(&slots, cursor);
                for c in edit.text.chars() {
                    emit(c, anchor, &mut paragraph);
                }
            }
        }
    }

    let mut runs: Vec<TextRun> = Vec::with_capacity(pieces.len());
    let mut next_index = 0;
    for piece in pieces {
        let run_index = match runs.last() {
            Some(last) if last.paragraph_index == piece.paragraph => next_index,
            _ => 0,
        };
        next_index = run_index + 1;

        let source = piece.source.and_then(|index| original.runs.get(index));
        runs.push(TextRun {
            text: piece.text,
            properties: source.map(|run| run.properties.clone()).unwrap_or_default(),
            paragraph_index: piece.paragraph,
            run_index,
            format: source.and_then(|run| run.format.clone()),
        });
    }

    debug!(
        "remapped {} original runs onto {} runs across {} paragraphs",
        original.runs.len(),
        runs.len(),
        paragraph + 1
    );

    RunLayout {
        runs,
        paragraph_count: paragraph + 1,
    }
}

/// One slot per char of `layout.text()`.
fn slot_map(layout: &RunLayout) -> Vec<Slot> {
    let mut slots = Vec::new();
    for paragraph in 0..layout.paragraph_count.max(1) {
        if paragraph > 0 {
            slots.push(Slot::Separator);
        }
        for (index, run) in layout.runs.iter().enumerate() {
            if run.paragraph_index == paragraph {
                slots.extend(run.text.chars().map(|_| Slot::Run(index)));
            }
        }
    }
    slots
}

/// Run whose formatting inserted text at `cursor` should take: the run just
/// before the insertion point, then the one just after, then the nearest
/// run in either direction across paragraph breaks.
fn insertion_anchor(slots: &[Slot], cursor: usize) -> Option<usize> {
    let run_at = |i: usize| match slots.get(i) {
        Some(Slot::Run(index)) => Some(*index),
        _ => None,
    };

    cursor
        .checked_sub(1)
        .and_then(run_at)
        .or_else(|| run_at(cursor))
        .or_else(|| (cursor..slots.len()).find_map(run_at))
        .or_else(|| (0..cursor.min(slots.len())).rev().find_map(run_at))
}
