use std::io::{Cursor, Write};
use std::ops::Range;

use log::{debug, info};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::docx::document::{DOCUMENT_PART, ParagraphSpan, PartKind, ResumeDocument, RunSpan};
use crate::docx::runs::{FormatHandle, RunLayout, RunProperties, SOFT_BREAK, TextRun, escape_text};
use crate::error::{DocumentStructureError, TailorError};

impl ResumeDocument {
    /// Writes `layout` back into a copy of the original container. Only the
    /// main document part changes; every other entry is copied raw.
    pub fn rebuild(&self, layout: &RunLayout) -> Result<Vec<u8>, TailorError> {
        if layout.runs.is_empty() {
            return Err(DocumentStructureError::NoRuns.into());
        }
        if self.paragraphs.is_empty() {
            return Err(DocumentStructureError::NoParagraphs.into());
        }

        let xml = self.rebuild_xml(layout);
        debug!("rebuilt {} ({} -> {} bytes)", DOCUMENT_PART, self.xml.len(), xml.len());

        let mut source = zip::ZipArchive::new(Cursor::new(self.archive.as_slice()))?;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::with_capacity(self.archive.len())));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut wrote_document = false;
        for i in 0..source.len() {
            let entry = source.by_index_raw(i)?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                writer.start_file(DOCUMENT_PART, options)?;
                writer.write_all(xml.as_bytes())?;
                wrote_document = true;
            } else {
                writer.raw_copy_file(entry)?;
            }
        }

        if !wrote_document {
            return Err(DocumentStructureError::MissingPart(DOCUMENT_PART.to_string()).into());
        }

        let bytes = writer.finish()?.into_inner();
        info!("rebuilt document with {} runs", layout.runs.len());

        Ok(bytes)
    }

    fn rebuild_xml(&self, layout: &RunLayout) -> String {
        let mut by_paragraph: Vec<Vec<&TextRun>> = vec![Vec::new(); layout.paragraph_count.max(1)];
        for run in &layout.runs {
            if run.paragraph_index >= by_paragraph.len() {
                by_paragraph.resize(run.paragraph_index + 1, Vec::new());
            }
            by_paragraph[run.paragraph_index].push(run);
        }
        for runs in &mut by_paragraph {
            runs.sort_by_key(|run| run.run_index);
        }

        let original = &self.layout().runs;
        let mut out = String::with_capacity(self.xml.len() + 256);
        let mut cursor = 0;
        let mut first_run = 0;

        for (index, paragraph) in self.paragraphs.iter().enumerate() {
            out.push_str(&self.xml[cursor..paragraph.span.start]);
            let originals = &original[first_run..first_run + paragraph.runs.len()];
            first_run += paragraph.runs.len();

            let runs = by_paragraph.get(index).map(Vec::as_slice).unwrap_or_default();
            self.write_paragraph(&mut out, paragraph, originals, runs);
            cursor = paragraph.span.end;
        }

        // extra paragraphs go after the last one and copy its properties
        if let Some(last) = self.paragraphs.last() {
            let properties = last.properties.clone().map_or("", |range| &self.xml[range]);
            for runs in by_paragraph.iter().skip(self.paragraphs.len()) {
                out.push_str("<w:p>");
                out.push_str(properties);
                for run in runs {
                    write_run(&mut out, "", run);
                }
                out.push_str("</w:p>");
            }
        }

        out.push_str(&self.xml[cursor..]);
        out
    }

    /// Replaces the text runs of one paragraph in place, keeping everything
    /// between them. Runs are paired by position.
    fn write_paragraph(
        &self,
        out: &mut String,
        paragraph: &ParagraphSpan,
        originals: &[TextRun],
        runs: &[&TextRun],
    ) {
        if paragraph.self_closing {
            if runs.is_empty() {
                out.push_str(&self.xml[paragraph.span.clone()]);
                return;
            }
            out.push_str(&paragraph.open_tag);
            out.push('>');
            for run in runs {
                write_run(out, "", run);
            }
            out.push_str("</w:p>");
            return;
        }

        let Some(last_span) = paragraph.runs.last() else {
            out.push_str(&self.xml[paragraph.span.start..paragraph.inner.end]);
            for run in runs {
                write_run(out, "", run);
            }
            out.push_str(&self.xml[paragraph.inner.end..paragraph.span.end]);
            return;
        };

        let mut cursor = paragraph.span.start;
        for (k, span) in paragraph.runs.iter().enumerate() {
            out.push_str(&self.xml[cursor..span.span.start]);
            cursor = span.span.end;

            let Some(run) = runs.get(k) else {
                // the text is gone but drawings or fields in the run stay
                if let Some(original) = originals.get(k)
                    && self.has_other_children(span)
                {
                    let emptied = TextRun {
                        text: String::new(),
                        ..original.clone()
                    };
                    self.rewrite_run(out, span, &emptied);
                }
                continue;
            };
            let unchanged = originals
                .get(k)
                .is_some_and(|orig| orig.text == run.text && orig.format == run.format);
            match unchanged {
                true => out.push_str(&self.xml[span.span.clone()]),
                false => self.rewrite_run(out, span, run),
            }
        }

        for run in runs.iter().skip(paragraph.runs.len()) {
            write_run(out, &last_span.attrs, run);
        }
        out.push_str(&self.xml[cursor..paragraph.span.end]);
    }

    /// Whether the run holds anything besides its properties and text.
    fn has_other_children(&self, span: &RunSpan) -> bool {
        let mut skipped: Vec<Range<usize>> = span.properties.iter().cloned().collect();
        skipped.extend(span.parts.iter().map(|part| part.span.clone()));
        skipped.sort_by_key(|range| range.start);

        let mut cursor = open_tag_end(span);
        let close = span.span.end.saturating_sub("</w:r>".len()).max(cursor);
        let mut rest = String::new();
        for range in skipped {
            rest.push_str(&self.xml[cursor..range.start]);
            cursor = range.end;
        }
        rest.push_str(&self.xml[cursor.min(close)..close]);
        !rest.trim().is_empty()
    }

    /// Rewrites an existing run in place. Only its `<w:rPr>` (when the
    /// format changed) and its text-bearing children are touched; drawings,
    /// field characters and every other child stay where they were.
    ///
    /// Each original text child takes the next new piece of the same kind.
    /// New pieces that find no such child are written fresh just before it,
    /// and children left without a piece are dropped.
    fn rewrite_run(&self, out: &mut String, span: &RunSpan, run: &TextRun) {
        let xml = &self.xml;
        let mut cursor = span.span.start;

        let wanted = run_properties(run);
        let current = span.properties.clone().map(|range| &xml[range]);
        if current != wanted.as_deref() {
            let range = span.properties.clone().unwrap_or_else(|| {
                let end = open_tag_end(span);
                end..end
            });
            out.push_str(&xml[cursor..range.start]);
            out.push_str(wanted.as_deref().unwrap_or_default());
            cursor = range.end;
        }

        let pieces = text_pieces(&run.text);
        let mut next = 0;
        for part in &span.parts {
            out.push_str(&xml[cursor..part.span.start]);
            cursor = part.span.end;

            let Some(offset) = pieces[next..].iter().position(|piece| piece.kind() == part.kind) else {
                continue;
            };
            for piece in &pieces[next..next + offset] {
                piece.write(out);
            }
            match pieces[next + offset] {
                Piece::Text(_) => pieces[next + offset].write(out),
                Piece::Tab | Piece::Break => out.push_str(&xml[part.span.clone()]),
            }
            next += offset + 1;
        }

        for piece in &pieces[next..] {
            piece.write(out);
        }
        out.push_str(&xml[cursor..span.span.end]);
    }
}

fn open_tag_end(span: &RunSpan) -> usize {
    span.span.start + "<w:r".len() + span.attrs.len() + 1
}

/// Run text split at tabs and soft breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Tab,
    Break,
}

impl Piece<'_> {
    fn kind(self) -> PartKind {
        match self {
            Piece::Text(_) => PartKind::Text,
            Piece::Tab => PartKind::Tab,
            Piece::Break => PartKind::Break,
        }
    }

    fn write(self, out: &mut String) {
        match self {
            Piece::Text(text) => {
                out.push_str(r#"<w:t xml:space="preserve">"#);
                out.push_str(&escape_text(text));
                out.push_str("</w:t>");
            }
            Piece::Tab => out.push_str("<w:tab/>"),
            Piece::Break => out.push_str("<w:br/>"),
        }
    }
}

fn text_pieces(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        let marker = match c {
            '\t' => Piece::Tab,
            SOFT_BREAK => Piece::Break,
            _ => continue,
        };
        if start < i {
            pieces.push(Piece::Text(&text[start..i]));
        }
        pieces.push(marker);
        start = i + c.len_utf8();
    }
    if start < text.len() {
        pieces.push(Piece::Text(&text[start..]));
    }
    pieces
}

/// The `<w:rPr>` a written run should carry: its handle, else a minimal
/// block when it has any known property set.
fn run_properties(run: &TextRun) -> Option<String> {
    match &run.format {
        Some(handle) => Some(handle.as_xml().to_string()),
        None if run.properties != RunProperties::default() => {
            Some(FormatHandle::minimal(&run.properties).as_xml().to_string())
        }
        None => None,
    }
}

/// A run with no original counterpart.
fn write_run(out: &mut String, attrs: &str, run: &TextRun) {
    out.push_str("<w:r");
    out.push_str(attrs.trim_end_matches('/'));
    out.push('>');
    if let Some(properties) = run_properties(run) {
        out.push_str(&properties);
    }
    for piece in text_pieces(&run.text) {
        piece.write(out);
    }
    out.push_str("</w:r>");
}
