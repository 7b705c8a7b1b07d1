//! Domain pattern parsing
//!
//! A pattern is split into labels, and runs of literal labels are merged
//! into the length-prefixed byte form they take inside a DNS question.

use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Literal(String),
    /// A whole `*` label: exactly one subdomain of any length
    Wildcard,
}

impl Label {
    fn from_part(part: &str) -> Self {
        if part == "*" {
            Label::Wildcard
        } else {
            Label::Literal(part.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Encoded bytes of one or more consecutive literal labels
    Run(Vec<u8>),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Domain as given on the command line
    pub source: String,
    pub segments: Vec<Segment>,
}

fn trim_domain(domain: &str) -> &str {
    domain.trim_matches(|c: char| c == '.' || c.is_whitespace())
}

/// Split a domain into labels, always ending with the empty root label.
pub fn parse_labels(domain: &str) -> Vec<Label> {
    let mut labels: Vec<Label> = trim_domain(domain).split('.').map(Label::from_part).collect();
    labels.push(Label::Literal(String::new()));
    labels
}

fn encode_label(buf: &mut Vec<u8>, text: &str) -> Result<(), CompileError> {
    let len = u8::try_from(text.len()).map_err(|_| CompileError::LabelTooLong {
        label: text.to_string(),
        len: text.len(),
    })?;
    buf.push(len);
    buf.extend_from_slice(text.as_bytes());
    Ok(())
}

/// Merge consecutive literal labels into runs. Wildcards are never merged.
pub fn merge_runs(labels: &[Label]) -> Result<Vec<Segment>, CompileError> {
    let mut segments = Vec::new();
    let mut run: Option<Vec<u8>> = None;

    for label in labels {
        match label {
            Label::Literal(text) => encode_label(run.get_or_insert_with(Vec::new), text)?,
            Label::Wildcard => {
                if let Some(bytes) = run.take() {
                    segments.push(Segment::Run(bytes));
                }
                segments.push(Segment::Wildcard);
            }
        }
    }

    if let Some(bytes) = run {
        segments.push(Segment::Run(bytes));
    }

    Ok(segments)
}

pub fn parse_pattern(domain: &str) -> Result<Pattern, CompileError> {
    if trim_domain(domain).is_empty() {
        return Err(CompileError::EmptyDomain(domain.to_string()));
    }

    let labels = parse_labels(domain);
    let segments = merge_runs(&labels)?;

    Ok(Pattern {
        source: domain.to_string(),
        segments,
    })
}
