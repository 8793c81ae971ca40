pub mod llm;
pub mod pipeline;
pub mod report;

pub use llm::{
    client_from_settings, AnthropicClient, ChatMessage, CompletionClient, CompletionRequest,
    LlmSettings, NoopClient, OpenAiCompatClient, ProviderKind, ResponseFormat, Role,
};
pub use pipeline::{
    AnalysisRequest, AnalysisResult, Competitor, ParseError, PipelineError, ReportPipeline,
    RequestValidationError, RunState, StageOutcome, StageOutcomes, MAX_COMPETITOR_COUNT,
    MIN_COMPETITOR_COUNT,
};
pub use report::{render_report, OutputFormat};
