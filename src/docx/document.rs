use std::io::{Cursor, Read};
use std::ops::Range;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::docx::runs::{FormatHandle, RunLayout, RunProperties, SOFT_BREAK, TextRun, unescape};
use crate::error::{DocumentStructureError, TailorError};

pub const DOCUMENT_PART: &str = "word/document.xml";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z_][\w:.-]*)([^>]*)>").unwrap());

/// A DOCX resume: the untouched container bytes, the main document part
/// and the byte spans of every paragraph and text run inside it.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub(super) archive: Vec<u8>,
    pub(super) xml: String,
    pub(super) paragraphs: Vec<ParagraphSpan>,
    layout: RunLayout,
}

#[derive(Debug, Clone)]
pub(super) struct ParagraphSpan {
    pub span: Range<usize>,
    /// `<w:p ...>` without the closing `>` or `/>`.
    pub open_tag: String,
    /// Between the opening tag and `</w:p>`. Empty for `<w:p/>`.
    pub inner: Range<usize>,
    pub properties: Option<Range<usize>>,
    pub runs: Vec<RunSpan>,
    pub self_closing: bool,
}

#[derive(Debug, Clone)]
pub(super) struct RunSpan {
    pub span: Range<usize>,
    /// Attributes of the `<w:r>` tag, leading whitespace included.
    pub attrs: String,
    /// The run's `<w:rPr>` block.
    pub properties: Option<Range<usize>>,
    /// Text-bearing children in document order. Everything between them is
    /// non-text structure.
    pub parts: Vec<RunPart>,
}

#[derive(Debug, Clone)]
pub(super) struct RunPart {
    pub span: Range<usize>,
    pub kind: PartKind,
}

/// What a text-bearing run child contributes to the plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PartKind {
    /// `<w:t>`
    Text,
    /// `<w:tab/>`, read as `\t`
    Tab,
    /// `<w:br/>` or `<w:cr/>`, read as [`SOFT_BREAK`]
    Break,
}

#[derive(Default)]
struct RunScan {
    start: usize,
    attrs: String,
    depth: usize,
    text: String,
    parts: Vec<RunPart>,
    text_open: Option<Range<usize>>,
    rpr_start: Option<usize>,
    rpr: Option<Range<usize>>,
    rpr_depth: usize,
}

struct ParagraphScan {
    start: usize,
    open_tag: String,
    inner_start: usize,
    depth: usize,
    pr_start: Option<usize>,
    properties: Option<Range<usize>>,
    runs: Vec<(RunSpan, String)>,
    run: Option<RunScan>,
}

impl ResumeDocument {
    pub fn open(bytes: Vec<u8>) -> Result<Self, TailorError> {
        let xml = {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
            let mut part = archive
                .by_name(DOCUMENT_PART)
                .map_err(|_| DocumentStructureError::MissingPart(DOCUMENT_PART.to_string()))?;
            let mut xml = String::new();
            part.read_to_string(&mut xml)?;
            xml
        };

        let paragraphs = scan_paragraphs(&xml);
        if paragraphs.is_empty() {
            return Err(DocumentStructureError::NoParagraphs.into());
        }

        let mut runs = Vec::new();
        let mut spans = Vec::with_capacity(paragraphs.len());
        for (paragraph_index, paragraph) in paragraphs.into_iter().enumerate() {
            let mut run_spans = Vec::with_capacity(paragraph.runs.len());
            for (run_index, (span, text)) in paragraph.runs.into_iter().enumerate() {
                let rpr_xml = span.properties.clone().map(|range| &xml[range]);
                runs.push(TextRun {
                    text,
                    properties: rpr_xml.map(RunProperties::parse).unwrap_or_default(),
                    paragraph_index,
                    run_index,
                    format: rpr_xml.map(FormatHandle::capture),
                });
                run_spans.push(span);
            }
            spans.push(ParagraphSpan {
                span: paragraph.span,
                open_tag: paragraph.open_tag,
                inner: paragraph.inner,
                properties: paragraph.properties,
                runs: run_spans,
                self_closing: paragraph.self_closing,
            });
        }

        if runs.is_empty() {
            return Err(DocumentStructureError::NoRuns.into());
        }

        debug!("document has {} paragraphs and {} text runs", spans.len(), runs.len());

        let layout = RunLayout {
            runs,
            paragraph_count: spans.len(),
        };

        Ok(Self {
            archive: bytes,
            xml,
            paragraphs: spans,
            layout,
        })
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn text(&self) -> String {
        self.layout.text()
    }
}

/// Finished paragraph as produced by the scanner.
struct ScannedParagraph {
    span: Range<usize>,
    open_tag: String,
    inner: Range<usize>,
    properties: Option<Range<usize>>,
    runs: Vec<(RunSpan, String)>,
    self_closing: bool,
}

/// Walks every tag once. Only outermost `w:p` elements count as paragraphs,
/// so text boxes nested inside a run stay part of that run's structure.
fn scan_paragraphs(xml: &str) -> Vec<ScannedParagraph> {
    let mut paragraphs = Vec::new();
    let mut current: Option<ParagraphScan> = None;

    for caps in TAG.captures_iter(xml) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let closing = !caps[1].is_empty();
        let attrs = caps.get(3).map_or("", |m| m.as_str());
        let self_closing = attrs.ends_with('/');
        let name = name.as_str();

        let Some(paragraph) = current.as_mut() else {
            if name == "w:p" && !closing {
                let open_tag = format!("<w:p{}", attrs.trim_end_matches('/'));
                if self_closing {
                    paragraphs.push(ScannedParagraph {
                        span: whole.range(),
                        open_tag,
                        inner: whole.end()..whole.end(),
                        properties: None,
                        runs: Vec::new(),
                        self_closing: true,
                    });
                } else {
                    current = Some(ParagraphScan {
                        start: whole.start(),
                        open_tag,
                        inner_start: whole.end(),
                        depth: 1,
                        pr_start: None,
                        properties: None,
                        runs: Vec::new(),
                        run: None,
                    });
                }
            }
            continue;
        };

        if name == "w:p" && !self_closing {
            if closing {
                paragraph.depth -= 1;
                if paragraph.depth == 0 {
                    if let Some(p) = current.take() {
                        paragraphs.push(ScannedParagraph {
                            span: p.start..whole.end(),
                            open_tag: p.open_tag,
                            inner: p.inner_start..whole.start(),
                            properties: p.properties,
                            runs: p.runs,
                            self_closing: false,
                        });
                    }
                    continue;
                }
            } else {
                paragraph.depth += 1;
            }
            continue;
        }

        if paragraph.depth > 1 {
            continue;
        }

        match paragraph.run.as_mut() {
            None => match (name, closing) {
                ("w:r", false) if !self_closing => {
                    paragraph.run = Some(RunScan {
                        start: whole.start(),
                        attrs: attrs.to_string(),
                        depth: 1,
                        ..Default::default()
                    });
                }
                ("w:pPr", false) if paragraph.properties.is_none() => match self_closing {
                    true => paragraph.properties = Some(whole.range()),
                    false => paragraph.pr_start = Some(whole.start()),
                },
                ("w:pPr", true) => {
                    if let Some(start) = paragraph.pr_start.take() {
                        paragraph.properties = Some(start..whole.end());
                    }
                }
                _ => {}
            },
            Some(run) => {
                if name == "w:r" && !self_closing {
                    if !closing {
                        run.depth += 1;
                        continue;
                    }
                    run.depth -= 1;
                    if run.depth == 0 {
                        if let Some(run) = paragraph.run.take()
                            && !run.text.is_empty()
                        {
                            let span = RunSpan {
                                span: run.start..whole.end(),
                                attrs: run.attrs,
                                properties: run.rpr,
                                parts: run.parts,
                            };
                            paragraph.runs.push((span, run.text));
                        }
                    }
                    continue;
                }
                if run.depth > 1 {
                    continue;
                }
                scan_run_tag(run, xml, name, closing, self_closing, whole.range());
            }
        }
    }

    paragraphs
}

fn scan_run_tag(
    run: &mut RunScan,
    xml: &str,
    name: &str,
    closing: bool,
    self_closing: bool,
    tag: Range<usize>,
) {
    match (name, closing) {
        ("w:rPr", false) if run.rpr.is_none() => {
            if run.rpr_depth == 0 && self_closing {
                run.rpr = Some(tag);
            } else if !self_closing {
                if run.rpr_depth == 0 {
                    run.rpr_start = Some(tag.start);
                }
                run.rpr_depth += 1;
            }
        }
        ("w:rPr", true) if run.rpr.is_none() => {
            run.rpr_depth = run.rpr_depth.saturating_sub(1);
            if run.rpr_depth == 0
                && let Some(start) = run.rpr_start.take()
            {
                run.rpr = Some(start..tag.end);
            }
        }
        _ if run.rpr_depth > 0 => {}
        ("w:t", false) if !self_closing => run.text_open = Some(tag),
        ("w:t", true) => {
            if let Some(open) = run.text_open.take() {
                run.text.push_str(&unescape(&xml[open.end..tag.start]));
                run.parts.push(RunPart {
                    span: open.start..tag.end,
                    kind: PartKind::Text,
                });
            }
        }
        ("w:tab", false) => {
            run.text.push('\t');
            run.parts.push(RunPart {
                span: tag,
                kind: PartKind::Tab,
            });
        }
        ("w:br" | "w:cr", false) => {
            run.text.push(SOFT_BREAK);
            run.parts.push(RunPart {
                span: tag,
                kind: PartKind::Break,
            });
        }
        _ => {}
    }
}
