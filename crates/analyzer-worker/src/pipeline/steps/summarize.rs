//! Query-focused extractive summary.

use std::collections::HashSet;

use async_trait::async_trait;

use super::indicators::NO_INDICATORS;
use crate::pipeline::{AnalysisStep, StepError, StepInput};

/// Sentences kept in a summary.
const MAX_SENTENCES: usize = 5;

/// Sentences used when nothing matches the query.
const FALLBACK_SENTENCES: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "what", "are", "was", "were", "how",
    "please", "provide", "give", "about", "into", "its", "our", "your",
];

/// Picks the sentences that best match the query, in document order, and
/// appends the indicator table when one was produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummarizeStep;

#[async_trait]
impl AnalysisStep for SummarizeStep {
    fn name(&self) -> &str {
        "summarize"
    }

    async fn run(&self, input: &StepInput<'_>) -> Result<String, StepError> {
        let text = input.text();
        let sentences = split_sentences(&text);
        if sentences.is_empty() {
            return Err(StepError::Permanent("Nothing to summarize".to_string()));
        }

        let terms = query_terms(input.query);
        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| (i, score(s, &terms)))
            .filter(|(_, score)| *score > 0)
            .collect();
        // Highest score first; ties keep document order.
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut picked: Vec<usize> = scored.iter().take(MAX_SENTENCES).map(|(i, _)| *i).collect();
        if picked.is_empty() {
            picked = (0..sentences.len().min(FALLBACK_SENTENCES)).collect();
        }
        picked.sort_unstable();

        let mut summary = format!("Summary for \"{}\":", input.query);
        for i in picked {
            summary.push_str("\n- ");
            summary.push_str(sentences[i]);
        }

        if let Some(indicators) = input
            .output_of("indicators")
            .filter(|o| !o.trim().is_empty() && *o != NO_INDICATORS)
        {
            summary.push_str("\n\nKey indicators:\n");
            summary.push_str(indicators);
        }
        Ok(summary)
    }
}

/// Splits at line breaks and at `.`, `!` or `?` followed by whitespace, so
/// amounts like `$1.2B` stay whole.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => Some(i),
            '.' | '!' | '?' => match chars.peek() {
                None => Some(i + 1),
                Some((_, next)) if next.is_whitespace() => Some(i + 1),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = boundary {
            sentences.push(&text[start..end]);
            start = end;
        }
    }
    sentences.push(&text[start..]);
    sentences
        .into_iter()
        .map(|s| s.trim().trim_start_matches(['.', '!', '?']).trim())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

fn query_terms(query: &str) -> HashSet<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn score(sentence: &str, terms: &HashSet<String>) -> usize {
    let lower = sentence.to_lowercase();
    terms.iter().filter(|t| lower.contains(t.as_str())).count()
}
