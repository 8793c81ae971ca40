use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod controller;
pub mod parse;
pub(crate) mod prompts;

pub use controller::ReportPipeline;
pub use parse::ParseError;

/// Inclusive bounds on how many competitors a request may ask for.
pub const MIN_COMPETITOR_COUNT: u8 = 3;
pub const MAX_COMPETITOR_COUNT: u8 = 10;

/// Options for a single analysis run. Immutable once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    company_name: String,
    competitor_count: u8,
    include_swot: bool,
    include_benchmarking: bool,
    include_forecast: bool,
}

impl AnalysisRequest {
    /// Construct a request, validating invariants before returning.
    pub fn new(
        company_name: impl Into<String>,
        competitor_count: u8,
        include_swot: bool,
        include_benchmarking: bool,
        include_forecast: bool,
    ) -> Result<Self, RequestValidationError> {
        let company_name = company_name.into().trim().to_string();
        if company_name.is_empty() {
            return Err(RequestValidationError::BlankCompanyName);
        }
        if !(MIN_COMPETITOR_COUNT..=MAX_COMPETITOR_COUNT).contains(&competitor_count) {
            return Err(RequestValidationError::CompetitorCountOutOfRange {
                count: competitor_count,
            });
        }
        Ok(Self {
            company_name,
            competitor_count,
            include_swot,
            include_benchmarking,
            include_forecast,
        })
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn competitor_count(&self) -> u8 {
        self.competitor_count
    }

    pub fn include_swot(&self) -> bool {
        self.include_swot
    }

    pub fn include_benchmarking(&self) -> bool {
        self.include_benchmarking
    }

    pub fn include_forecast(&self) -> bool {
        self.include_forecast
    }
}

/// Errors emitted while validating an [`AnalysisRequest`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("company name must not be blank")]
    BlankCompanyName,
    #[error(
        "competitor count must be within {MIN_COMPETITOR_COUNT}..={MAX_COMPETITOR_COUNT} (got {count})"
    )]
    CompetitorCountOutOfRange { count: u8 },
}

/// One competitor parsed out of the identification stage.
///
/// `market_share_percent` is extracted from the loosely-typed wire value
/// ("20%", "20.5 %", or a bare number); it stays `None` when the value
/// cannot be read as a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    #[serde(default)]
    pub products: Vec<String>,
    pub market_share_percent: Option<f32>,
    #[serde(default)]
    pub differentiation: String,
}

/// Outcome of a single non-fatal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Done,
    Failed,
    Skipped,
}

/// Per-stage outcomes for everything after competitor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageOutcomes {
    pub market: StageOutcome,
    pub technology: StageOutcome,
    pub swot: StageOutcome,
    pub report: StageOutcome,
}

/// Accumulator for one pipeline run. Fields populate monotonically as
/// stages succeed; a failed stage leaves its field `None`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub request: AnalysisRequest,
    pub competitors: Vec<Competitor>,
    pub market_position_text: Option<String>,
    pub technology_text: Option<String>,
    pub swot_text: Option<String>,
    pub full_report_text: Option<String>,
    pub stages: StageOutcomes,
}

impl AnalysisResult {
    /// Start a fresh accumulator once competitors are identified.
    pub(crate) fn new(request: AnalysisRequest, competitors: Vec<Competitor>) -> Self {
        Self {
            request,
            competitors,
            market_position_text: None,
            technology_text: None,
            swot_text: None,
            full_report_text: None,
            stages: StageOutcomes {
                market: StageOutcome::Skipped,
                technology: StageOutcome::Skipped,
                swot: StageOutcome::Skipped,
                report: StageOutcome::Skipped,
            },
        }
    }

    pub fn company_name(&self) -> &str {
        self.request.company_name()
    }
}

/// Named states of a pipeline run. Only competitor identification can
/// abort; every later stage transitions regardless of its own outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    CompetitorsIdentified,
    MarketDone,
    MarketFailed,
    TechDone,
    TechFailed,
    SwotDone,
    SwotSkipped,
    SwotFailed,
    Compiled,
    Done,
    Aborted,
}

/// Fatal failures that abort a run with no usable result.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("competitor identification produced an unusable response: {0}")]
    Parse(#[from] ParseError),
    #[error("competitor identification call failed: {0:#}")]
    Upstream(anyhow::Error),
}
