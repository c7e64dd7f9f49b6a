//! Advisory content analysis of extracted text.
//!
//! Heuristic but stable: the same text always yields the same analysis.

use std::collections::BTreeMap;

use crate::domain::{Complexity, DocumentAnalysis};

use super::validator::DocumentKind;

/// Topic hints and the vocabulary that triggers them.
const TOPICS: &[(&str, &[&str])] = &[
    ("finance", &["finance", "financial", "accounting", "ledger", "invoice", "payment", "budget"]),
    ("procurement", &["procurement", "purchase", "purchasing", "vendor", "supplier"]),
    ("order-to-cash", &["order-to-cash", "sales", "order", "billing", "customer"]),
    ("inventory", &["inventory", "warehouse", "stock", "logistics"]),
    ("manufacturing", &["manufacturing", "production", "bom", "mrp"]),
    ("human resources", &["hr", "payroll", "employee", "recruitment"]),
    ("reporting", &["report", "reporting", "dashboard", "analytics", "kpi"]),
    ("integration", &["integration", "api", "interface", "migration"]),
    ("sap", &["sap", "abap", "s/4hana", "hana", "fiori"]),
    ("oracle", &["oracle", "netsuite"]),
    ("dynamics", &["dynamics", "d365", "navision"]),
];

/// Topics reported at most.
const MAX_TOPICS: usize = 5;

/// Derives a structural summary of extracted text.
pub fn analyze(text: &str, kind: DocumentKind) -> DocumentAnalysis {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let word_count = text.split_whitespace().count();
    let section_count = lines.iter().filter(|l| is_heading(l)).count();
    let has_tabular_data = matches!(
        kind,
        DocumentKind::Csv | DocumentKind::Xls | DocumentKind::Xlsx
    ) || looks_tabular(&lines);

    let complexity = match (word_count, section_count) {
        (w, s) if w < 500 && s < 5 => Complexity::Low,
        (w, _) if w < 3000 => Complexity::Medium,
        _ => Complexity::High,
    };

    DocumentAnalysis {
        section_count,
        word_count,
        line_count: lines.len(),
        char_count: text.chars().count(),
        has_tabular_data,
        topics: detect_topics(text),
        complexity,
    }
}

/// Markdown headings, numbered headings, short label lines and all-caps titles.
fn is_heading(line: &str) -> bool {
    if line.starts_with('#') {
        return true;
    }

    let len = line.chars().count();
    if len > 60 {
        return false;
    }

    if line.ends_with(':') && len > 1 {
        return true;
    }

    let numbered = line
        .split_once(' ')
        .is_some_and(|(head, rest)| {
            head.trim_end_matches('.')
                .split('.')
                .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
                && rest.chars().next().is_some_and(char::is_uppercase)
        });
    if numbered {
        return true;
    }

    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

/// At least two lines split by tabs or pipes, or two lines with the same
/// number of commas (two or more).
fn looks_tabular(lines: &[&str]) -> bool {
    let delimited = lines
        .iter()
        .filter(|l| l.contains('\t') || l.matches('|').count() >= 2)
        .count();
    if delimited >= 2 {
        return true;
    }

    let mut comma_rows: BTreeMap<usize, usize> = BTreeMap::new();
    for line in lines {
        let commas = line.matches(',').count();
        if commas >= 2 {
            *comma_rows.entry(commas).or_default() += 1;
        }
    }
    comma_rows.values().any(|&rows| rows >= 2)
}

fn detect_topics(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '/'))
        .filter(|t| !t.is_empty())
        .collect();

    let mut scored: Vec<(&str, usize)> = TOPICS
        .iter()
        .map(|(topic, vocab)| {
            let hits = tokens.iter().filter(|t| vocab.contains(t)).count();
            (*topic, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(MAX_TOPICS)
        .map(|(topic, _)| topic.to_string())
        .collect()
}
