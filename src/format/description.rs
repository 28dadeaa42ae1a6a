use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

const SECTION_NAMES: &str = "REQUIREMENTS|QUALIFICATIONS|RESPONSIBILITIES|ABOUT US|SKILLS|EXPERIENCE|DUTIES|EDUCATION|BENEFITS|JOB DESCRIPTION|WHAT YOU'LL DO";

lazy_static! {
    static ref EXTRA_NEWLINES: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref SECTION_BREAK: Regex = Regex::new(&format!(r"(?i)\b({})\b", SECTION_NAMES)).unwrap();
    static ref BULLET_SPACING: Regex = Regex::new(r"(?m)^(\s*)([*\-•]|\d+\.)\s?(\S)").unwrap();
    // Leaves `scheme://` alone so links survive
    static ref COLON_SPACING: Regex = Regex::new(r"(\w+):([^\s/])").unwrap();
    static ref SENTENCE_BREAK: Regex = Regex::new(r"\.(\s)([A-Z])").unwrap();
    static ref LIST_BREAK: Regex = Regex::new(r"([a-z])(\s*)(\n?)(\s*)([*\-•]|\d+\.)\s+").unwrap();
    static ref BULLET_PREFIX: Regex = Regex::new(r"^\s*([*\-•]|\d+\.)\s+").unwrap();

    static ref HEADER: Regex = Regex::new(r"^[A-Z][A-Z\s\d]{3,}$").unwrap();
    static ref SECTION: Regex = Regex::new(
        r"(?i)^(REQUIREMENTS|QUALIFICATIONS|RESPONSIBILITIES|ABOUT US|SKILLS|EXPERIENCE|EDUCATION|BENEFITS|KEY RESPONSIBILITIES|JOB DESCRIPTION|WHO WE ARE|WHAT YOU'LL DO|DUTIES)[\s:-]*"
    )
    .unwrap();
    static ref TITLE_CASE: Regex = Regex::new(r"^([A-Z][a-z]+\s?)+:?$").unwrap();
    static ref LABEL_ONLY: Regex = Regex::new(r"^[A-Za-z\s\d]{3,}:$").unwrap();
    static ref SHORT_LABEL: Regex = Regex::new(r"^[\w\s]+:").unwrap();
    static ref BULLET: Regex = Regex::new(r"^(\s*)([*\-•]|\d+\.)\s+(.+)$").unwrap();
    static ref SKILL: Regex = Regex::new(
        r"(?i)(experience|knowledge|proficient|skill|degree|familiar|years|education|qualification|required)"
    )
    .unwrap();
    static ref EMAIL: Regex = Regex::new(r"[\w.-]+@[\w.-]+\.\w+").unwrap();
    static ref PHONE: Regex = Regex::new(r"\+?[\d\s()-]{7,}").unwrap();
    static ref APPLY: Regex = Regex::new(r"(?i)apply|email your|send your|application|submit your").unwrap();
    static ref JOB_DETAIL: Regex = Regex::new(
        r"(?i)\b(salary|compensation|location|contract|remote|position|start date|job type|duration):"
    )
    .unwrap();
    static ref URL: Regex = Regex::new(r"https?://\S+").unwrap();
}

pub const NO_DESCRIPTION: &str = "No description available.";

/// A run of inline text inside a block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Inline {
    Text(String),
    Link(String),
}

/// One structured line of a formatted job description
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DescriptionBlock {
    /// Blank line between groups
    Gap,
    /// ALL CAPS line
    Header { text: String },
    /// Known section heading such as "Requirements"
    Section { text: String },
    /// Title Case line or short `Label:` line
    Subheader { text: String },
    Bullet {
        marker: String,
        content: Vec<Inline>,
        /// Mentions experience, degrees, skills...
        emphasized: bool,
        /// First bullet of a new list
        spaced: bool,
    },
    Contact { text: String },
    Apply { content: Vec<Inline> },
    /// "Salary: ..." style detail line
    Detail { text: String },
    Paragraph { content: Vec<Inline>, long: bool },
    /// Unbulleted line inside a list
    ListContinuation { content: Vec<Inline> },
}

/// Split `text` into plain and link runs
pub fn linkify(text: &str) -> Vec<Inline> {
    let mut parts = Vec::new();
    let mut last = 0;

    for found in URL.find_iter(text) {
        if found.start() > last {
            parts.push(Inline::Text(text[last..found.start()].to_string()));
        }
        parts.push(Inline::Link(found.as_str().to_string()));
        last = found.end();
    }
    if last < text.len() || parts.is_empty() {
        parts.push(Inline::Text(text[last..].to_string()));
    }

    parts
}

/// Normalize line structure before classification: collapse blank runs,
/// break before section names, sentences and inline lists, fix spacing
/// after bullets and colons, indent bullet lines.
fn preprocess(description: &str) -> String {
    let text = EXTRA_NEWLINES.replace_all(description, "\n\n");
    let text = SECTION_BREAK.replace_all(&text, "\n${1}");
    let text = BULLET_SPACING.replace_all(&text, "${1}${2} ${3}");
    let text = COLON_SPACING.replace_all(&text, "${1}: ${2}");
    let text = SENTENCE_BREAK.replace_all(&text, ".\n${2}");
    let text = LIST_BREAK.replace_all(&text, "${1}\n${5} ");

    text.split('\n')
        .map(|line| {
            if BULLET_PREFIX.is_match(line) && !line.starts_with("  ") {
                format!("  {}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_subheader(line: &str, trimmed: &str) -> bool {
    (TITLE_CASE.is_match(trimmed) && line.chars().count() < 60)
        || (LABEL_ONLY.is_match(trimmed) && !trimmed.contains(' '))
        || (trimmed.chars().count() < 40 && SHORT_LABEL.is_match(trimmed))
}

/// Turn a plain-text job description into structured blocks.
///
/// Pattern based: ALL CAPS lines become headers, known section names become
/// sections, `*`/`-`/`•`/`1.` lines become bullets, and so on. Tracks
/// whether the previous lines formed a list so that continuation lines and
/// list spacing come out right.
pub fn format_description(description: &str) -> Vec<DescriptionBlock> {
    if description.is_empty() {
        return vec![DescriptionBlock::Paragraph {
            content: vec![Inline::Text(NO_DESCRIPTION.to_string())],
            long: false,
        }];
    }

    let processed = preprocess(description);
    let mut in_list = false;
    let mut prev_line_was_list = false;
    let mut blocks = Vec::new();

    for line in processed.split('\n') {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            prev_line_was_list = in_list;
            in_list = false;
            blocks.push(DescriptionBlock::Gap);
            continue;
        }

        if HEADER.is_match(trimmed) && trimmed.chars().count() > 4 {
            in_list = false;
            blocks.push(DescriptionBlock::Header { text: trimmed.to_string() });
            continue;
        }

        if SECTION.is_match(trimmed) {
            in_list = false;
            blocks.push(DescriptionBlock::Section { text: trimmed.to_string() });
            continue;
        }

        if is_subheader(line, trimmed) {
            in_list = false;
            blocks.push(DescriptionBlock::Subheader { text: trimmed.to_string() });
            continue;
        }

        if let Some(caps) = BULLET.captures(line) {
            let marker = caps[2].to_string();
            let content = &caps[3];
            let spaced = !prev_line_was_list && !in_list;
            in_list = true;
            prev_line_was_list = true;

            blocks.push(DescriptionBlock::Bullet {
                marker,
                emphasized: SKILL.is_match(content),
                content: linkify(content),
                spaced,
            });
            continue;
        }

        prev_line_was_list = in_list;

        if EMAIL.is_match(line) || PHONE.is_match(line) {
            in_list = false;
            blocks.push(DescriptionBlock::Contact { text: trimmed.to_string() });
            continue;
        }

        let length = line.chars().count();

        if APPLY.is_match(line) && length < 100 {
            in_list = false;
            blocks.push(DescriptionBlock::Apply { content: linkify(trimmed) });
            continue;
        }

        if JOB_DETAIL.is_match(line) && length < 100 {
            in_list = false;
            blocks.push(DescriptionBlock::Detail { text: trimmed.to_string() });
            continue;
        }

        if in_list {
            blocks.push(DescriptionBlock::ListContinuation { content: linkify(trimmed) });
        } else {
            blocks.push(DescriptionBlock::Paragraph {
                content: linkify(trimmed),
                long: trimmed.chars().count() > 200,
            });
        }
    }

    blocks
}
