use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<w:b(?:\s+w:val="([^"]*)")?\s*/>"#).unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<w:i(?:\s+w:val="([^"]*)")?\s*/>"#).unwrap());
static UNDERLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<w:u\s+w:val="([^"]*)"\s*/>"#).unwrap());
static COLOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<w:color\s+w:val="([^"]*)""#).unwrap());
static SIZE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<w:sz\s+w:val="(\d+)""#).unwrap());
static FONT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<w:rFonts\b[^>]*?w:ascii="([^"]*)""#).unwrap());

/// Stand-in for `<w:br/>` and `<w:cr/>` in run text. `\n` already
/// separates paragraphs.
pub const SOFT_BREAK: char = '\u{000B}';

/// Opaque capture of a run's `<w:rPr>` block. Only cloned and compared,
/// never interpreted.
#[derive(Clone, PartialEq, Eq)]
pub struct FormatHandle(Arc<str>);

impl FormatHandle {
    pub fn capture(raw: &str) -> Self {
        Self(Arc::from(raw))
    }

    /// Rebuilds a bare `<w:rPr>` from parsed properties. Used only when no
    /// run is left to inherit a handle from.
    pub fn minimal(props: &RunProperties) -> Self {
        let mut xml = String::from("<w:rPr>");
        if let Some(font) = &props.font {
            let font = escape_attr(font);
            xml.push_str(&format!(r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}"/>"#));
        }
        if props.bold {
            xml.push_str("<w:b/>");
        }
        if props.italic {
            xml.push_str("<w:i/>");
        }
        if let Some(color) = &props.color {
            xml.push_str(&format!(r#"<w:color w:val="{}"/>"#, escape_attr(color)));
        }
        if let Some(size) = props.size {
            xml.push_str(&format!(r#"<w:sz w:val="{size}"/>"#));
        }
        if props.underline {
            xml.push_str(r#"<w:u w:val="single"/>"#);
        }
        xml.push_str("</w:rPr>");
        Self(Arc::from(xml))
    }

    pub fn as_xml(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FormatHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormatHandle({} bytes)", self.0.len())
    }
}

/// The handful of formatting flags this crate understands. Everything else
/// in the run properties travels inside the [`FormatHandle`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunProperties {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Option<String>,
    /// Half-points, as stored in `w:sz`.
    pub size: Option<u32>,
    pub font: Option<String>,
}

impl RunProperties {
    pub fn parse(rpr: &str) -> Self {
        let toggled = |re: &Regex| {
            re.captures(rpr).is_some_and(|caps| {
                !matches!(caps.get(1).map(|m| m.as_str()), Some("0" | "false" | "off"))
            })
        };
        let value = |re: &Regex| re.captures(rpr).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string());

        Self {
            bold: toggled(&BOLD),
            italic: toggled(&ITALIC),
            underline: value(&UNDERLINE).is_some_and(|v| v != "none"),
            color: value(&COLOR).filter(|c| c != "auto"),
            size: value(&SIZE).and_then(|s| s.parse().ok()),
            font: value(&FONT),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub properties: RunProperties,
    pub paragraph_index: usize,
    pub run_index: usize,
    pub format: Option<FormatHandle>,
}

/// Ordered runs of a document plus its paragraph count. Paragraphs without
/// any text run still count, so the plain text keeps their line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunLayout {
    pub runs: Vec<TextRun>,
    pub paragraph_count: usize,
}

impl RunLayout {
    /// Plain text: runs concatenated, paragraphs joined with `\n`.
    pub fn text(&self) -> String {
        let mut paragraphs = vec![String::new(); self.paragraph_count.max(1)];
        for run in &self.runs {
            if let Some(paragraph) = paragraphs.get_mut(run.paragraph_index) {
                paragraph.push_str(&run.text);
            }
        }
        paragraphs.join("\n")
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        let Some(end) = rest.find(';') else {
            break;
        };
        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
