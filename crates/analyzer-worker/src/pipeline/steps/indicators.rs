//! Financial indicator scan.
//!
//! Each line mentioning a known metric contributes the last number on that
//! line. The first occurrence of a metric wins. Margins are derived from
//! revenue when the document does not state them.

use std::fmt::Write;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::pipeline::{AnalysisStep, StepError, StepInput};

/// Output when nothing recognisable was found.
pub const NO_INDICATORS: &str = "No financial indicators found.";

static METRICS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("revenue", r"(?i)\b(total\s+)?revenues?\b"),
        ("net_income", r"(?i)\b(net\s+income|net\s+earnings|net\s+profit)\b"),
        ("operating_income", r"(?i)\b(operating\s+income|operating\s+profit|EBIT)\b"),
        ("ebitda", r"(?i)\bEBITDA\b"),
        ("eps", r"(?i)\b(EPS|earnings\s+per\s+share)\b"),
        ("debt", r"(?i)\b(total\s+debt|long-?term\s+debt)\b"),
        ("cash", r"(?i)\bcash(\s+and\s+cash\s+equivalents)?\b"),
        ("free_cash_flow", r"(?i)\b(free\s+cash\s+flow|FCF)\b"),
        ("gross_margin", r"(?i)\bgross\s+margin\b"),
        ("operating_margin", r"(?i)\boperating\s+margin\b"),
        ("net_margin", r"(?i)\bnet\s+margin\b"),
        ("return_on_equity", r"(?i)\b(ROE|return\s+on\s+equity)\b"),
        ("yoy_growth", r"(?i)\b(YoY|year[-\s]*over[-\s]*year)\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\(?[$€£]?\d+(?:,\d{3})*(?:\.\d+)?\s*(?:billion|million|thousand|[bmk]\b)?%?\)?",
    )
    .unwrap()
});

/// Extracts common financial metrics from the document text.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorsStep;

#[async_trait]
impl AnalysisStep for IndicatorsStep {
    fn name(&self) -> &str {
        "indicators"
    }

    async fn run(&self, input: &StepInput<'_>) -> Result<String, StepError> {
        let found = scan(&input.text());
        if found.is_empty() {
            return Ok(NO_INDICATORS.to_string());
        }
        let mut out = String::new();
        for (name, value) in found {
            let _ = writeln!(out, "{name}: {}", format_value(value));
        }
        Ok(out.trim_end().to_string())
    }
}

/// Metrics in table order, derived margins last.
pub(crate) fn scan(text: &str) -> Vec<(&'static str, f64)> {
    let mut found: Vec<(&'static str, f64)> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        for (name, pattern) in METRICS.iter() {
            if found.iter().any(|(n, _)| n == name) || !pattern.is_match(line) {
                continue;
            }
            if let Some(value) = NUMBER
                .find_iter(line)
                .last()
                .and_then(|m| parse_number(m.as_str()))
            {
                found.push((*name, value));
            }
        }
    }

    let get = |key: &str| found.iter().find(|(n, _)| *n == key).map(|(_, v)| *v);
    let mut derived = Vec::new();
    if let Some(revenue) = get("revenue").filter(|r| *r != 0.0) {
        if get("net_margin").is_none() {
            if let Some(net) = get("net_income") {
                derived.push(("net_margin", net * 100.0 / revenue));
            }
        }
        if get("operating_margin").is_none() {
            if let Some(op) = get("operating_income") {
                derived.push(("operating_margin", op * 100.0 / revenue));
            }
        }
    }
    found.extend(derived);
    found
}

/// Parse tokens like `$1.2B`, `3,450`, `(120)`, `45%` or `10 million`.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let mut text = raw.trim().to_ascii_lowercase();
    let negative = text.starts_with('(') && text.ends_with(')');
    text = text
        .trim_matches(|c| c == '(' || c == ')')
        .replace(['$', '€', '£', ','], "");
    let text = text.trim_end_matches('%').trim();

    let (digits, multiplier) = [
        ("billion", 1e9),
        ("million", 1e6),
        ("thousand", 1e3),
        ("b", 1e9),
        ("m", 1e6),
        ("k", 1e3),
    ]
    .into_iter()
    .find_map(|(suffix, m)| text.strip_suffix(suffix).map(|d| (d.trim(), m)))
    .unwrap_or((text, 1.0));

    let value: f64 = digits.parse().ok()?;
    let signed = if negative { -value } else { value };
    Some(signed * multiplier)
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
