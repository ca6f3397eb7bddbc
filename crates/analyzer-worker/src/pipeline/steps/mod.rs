//! Built-in analysis steps.

mod extract;
mod http;
mod indicators;
mod summarize;

pub use extract::ExtractStep;
pub use http::HttpStep;
pub use indicators::IndicatorsStep;
pub use summarize::SummarizeStep;
