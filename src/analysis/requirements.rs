use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const MAX_REQUIRED: usize = 8;
const MAX_PREFERRED: usize = 5;
const MAX_SKILLS: usize = 10;
const MAX_PHRASE_CHARS: usize = 80;

static REQUIRED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*(required|requirements|must[- ]haves?|key qualifications|minimum qualifications|basic qualifications|qualifications)\b").unwrap()
});
static PREFERRED_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*(preferred|nice[- ]to[- ]haves?|bonus( points)?)\b").unwrap()
});
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•·▪◦‣–]|\d+[.)])\s*").unwrap());
static PHRASE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:experience|familiarity|expertise)\s+(?:with|in)\s+([^.;:\n]+)").unwrap(),
        Regex::new(r"(?i)\b(?:proficiency|proficient|fluency|fluent)\s+(?:in|with)\s+([^.;:\n]+)").unwrap(),
    ]
});
static SKILL_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:skills|technologies|tech stack)\s*:\s*([^\n]+)").unwrap()
});

/// Requirement bullets and skill phrases mined from a job description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MinedRequirements {
    pub required: Vec<String>,
    pub preferred: Vec<String>,
    pub skills: Vec<String>,
}

impl MinedRequirements {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.preferred.is_empty() && self.skills.is_empty()
    }
}

pub fn mine_requirements(description: &str) -> MinedRequirements {
    MinedRequirements {
        required: section_bullets(description, &REQUIRED_HEADING, MAX_REQUIRED),
        preferred: section_bullets(description, &PREFERRED_HEADING, MAX_PREFERRED),
        skills: skill_phrases(description),
    }
}

/// Bullets under the first heading matching `heading`, up to the next blank
/// line or a "preferred" heading.
fn section_bullets(text: &str, heading: &Regex, limit: usize) -> Vec<String> {
    let mut lines = text.lines().skip_while(|line| !heading.is_match(line));
    if lines.next().is_none() {
        return Vec::new();
    }

    let mut bullets = Dedup::new(limit);
    let mut started = false;
    for line in lines {
        if line.trim().is_empty() {
            match started {
                true => break,
                false => continue,
            }
        }
        if PREFERRED_HEADING.is_match(line) {
            break;
        }

        started = true;
        let item = BULLET.replace(line, "");
        if bullets.push(item.trim()) {
            break;
        }
    }

    bullets.into_vec()
}

/// "experience with X", "proficiency in X" and "skills: X, Y" phrases in
/// order of appearance.
fn skill_phrases(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for pattern in PHRASE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }

    for caps in SKILL_LIST.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let mut offset = m.start();
            for part in m.as_str().split([',', ';']) {
                found.push((offset, part.to_string()));
                offset += part.len() + 1;
            }
        }
    }

    found.sort_by_key(|(position, _)| *position);

    let mut phrases = Dedup::new(MAX_SKILLS);
    for (_, phrase) in found {
        let phrase = phrase.trim().trim_end_matches(['.', ',', ')']).trim();
        if phrase.chars().count() > MAX_PHRASE_CHARS {
            continue;
        }
        if phrases.push(phrase) {
            break;
        }
    }

    phrases.into_vec()
}

/// Case-insensitive, order-preserving, capped collector.
struct Dedup {
    seen: HashSet<String>,
    items: Vec<String>,
    limit: usize,
}

impl Dedup {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
            limit,
        }
    }

    /// Returns true once the cap is reached.
    fn push(&mut self, item: &str) -> bool {
        if !item.is_empty() && self.seen.insert(item.to_lowercase()) {
            self.items.push(item.to_string());
        }
        self.items.len() >= self.limit
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "About the role\n\
        We build payment infrastructure.\n\
        \n\
        Requirements:\n\
        - 5+ years of backend development\n\
        - Experience with Rust or Go\n\
        - Proficiency in SQL\n\
        - 5+ years of backend development\n\
        \n\
        Preferred qualifications:\n\
        * Kubernetes\n\
        * Kafka\n\
        \n\
        Skills: Docker, Terraform; AWS\n";

    #[test]
    fn test_required_bullets_stop_at_blank_line() {
        let mined = mine_requirements(JD);
        assert_eq!(
            mined.required,
            vec![
                "5+ years of backend development",
                "Experience with Rust or Go",
                "Proficiency in SQL",
            ]
        );
    }

    #[test]
    fn test_preferred_bullets() {
        let mined = mine_requirements(JD);
        assert_eq!(mined.preferred, vec!["Kubernetes", "Kafka"]);
    }

    #[test]
    fn test_skill_phrases_in_order_of_appearance() {
        let mined = mine_requirements(JD);
        assert_eq!(
            mined.skills,
            vec!["Rust or Go", "SQL", "Docker", "Terraform", "AWS"]
        );
    }

    #[test]
    fn test_required_section_stops_at_preferred_boundary() {
        let text = "Must have:\n- Python\n- Linux\nNice to have:\n- Go";
        let mined = mine_requirements(text);
        assert_eq!(mined.required, vec!["Python", "Linux"]);
        assert_eq!(mined.preferred, vec!["Go"]);
    }

    #[test]
    fn test_caps_are_applied() {
        let bullets: String = (0..20).map(|i| format!("- item {i}\n")).collect();
        let text = format!("Requirements\n{bullets}\nPreferred\n{bullets}");
        let mined = mine_requirements(&text);
        assert_eq!(mined.required.len(), MAX_REQUIRED);
        assert_eq!(mined.preferred.len(), MAX_PREFERRED);
        assert_eq!(mined.required[0], "item 0");

        let skills: Vec<String> = (0..20).map(|i| format!("tool{i}")).collect();
        let mined = mine_requirements(&format!("Skills: {}", skills.join(", ")));
        assert_eq!(mined.skills.len(), MAX_SKILLS);
    }

    #[test]
    fn test_missing_sections_yield_empty_lists() {
        let mined = mine_requirements("We are a friendly company in Lisbon.");
        assert!(mined.is_empty());
        assert!(mine_requirements("").is_empty());
    }
}
