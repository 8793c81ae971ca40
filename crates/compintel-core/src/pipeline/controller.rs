use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, instrument, warn};

use super::{
    parse, prompts, AnalysisRequest, AnalysisResult, Competitor, PipelineError, RunState,
    StageOutcome,
};
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest, ResponseFormat};

const IDENTIFY_TEMPERATURE: f32 = 0.3;
const MARKET_TEMPERATURE: f32 = 0.4;
const MARKET_MAX_TOKENS: u32 = 1500;
const TECHNOLOGY_TEMPERATURE: f32 = 0.4;
const TECHNOLOGY_MAX_TOKENS: u32 = 1500;
const SWOT_TEMPERATURE: f32 = 0.3;
const SWOT_MAX_TOKENS: u32 = 1000;
const REPORT_TEMPERATURE: f32 = 0.3;
const REPORT_MAX_TOKENS: u32 = 2500;

/// Sequential report pipeline over an injected completion client.
///
/// One run issues at most five completion calls, strictly in order. Only
/// competitor identification aborts the run; every later stage records its
/// own outcome and the run continues with whatever accumulated.
pub struct ReportPipeline {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl ReportPipeline {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    #[instrument(
        name = "report_run",
        skip(self, request),
        fields(company = %request.company_name(), requested = request.competitor_count())
    )]
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, PipelineError> {
        let mut state = RunState::Init;

        let competitors = match self.identify_competitors(request).await {
            Ok(list) => list,
            Err(err) => {
                transition(&mut state, RunState::Aborted);
                return Err(err);
            }
        };
        transition(&mut state, RunState::CompetitorsIdentified);

        let mut result = AnalysisResult::new(request.clone(), competitors);

        let market_prompt = prompts::build_market_prompt(result.company_name(), &result.competitors);
        match self
            .text_stage(market_prompt, MARKET_TEMPERATURE, MARKET_MAX_TOKENS)
            .await
        {
            Ok(text) => {
                result.market_position_text = Some(text);
                result.stages.market = StageOutcome::Done;
                transition(&mut state, RunState::MarketDone);
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "market position analysis incomplete");
                result.stages.market = StageOutcome::Failed;
                transition(&mut state, RunState::MarketFailed);
            }
        }

        let technology_prompt =
            prompts::build_technology_prompt(result.company_name(), &result.competitors);
        match self
            .text_stage(technology_prompt, TECHNOLOGY_TEMPERATURE, TECHNOLOGY_MAX_TOKENS)
            .await
        {
            Ok(text) => {
                result.technology_text = Some(text);
                result.stages.technology = StageOutcome::Done;
                transition(&mut state, RunState::TechDone);
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "technology comparison incomplete");
                result.stages.technology = StageOutcome::Failed;
                transition(&mut state, RunState::TechFailed);
            }
        }

        if request.include_swot() {
            let swot_prompt = prompts::build_swot_prompt(
                result.company_name(),
                &result.competitors,
                result.market_position_text.as_deref(),
                result.technology_text.as_deref(),
            );
            match self
                .text_stage(swot_prompt, SWOT_TEMPERATURE, SWOT_MAX_TOKENS)
                .await
            {
                Ok(text) => {
                    result.swot_text = Some(text);
                    result.stages.swot = StageOutcome::Done;
                    transition(&mut state, RunState::SwotDone);
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "SWOT analysis incomplete");
                    result.stages.swot = StageOutcome::Failed;
                    transition(&mut state, RunState::SwotFailed);
                }
            }
        } else {
            result.stages.swot = StageOutcome::Skipped;
            transition(&mut state, RunState::SwotSkipped);
        }

        let report_prompt = prompts::build_report_prompt(&result);
        match self
            .text_stage(report_prompt, REPORT_TEMPERATURE, REPORT_MAX_TOKENS)
            .await
        {
            Ok(text) => {
                result.full_report_text = Some(text);
                result.stages.report = StageOutcome::Done;
                transition(&mut state, RunState::Compiled);
            }
            Err(err) => {
                warn!(
                    error = %format!("{err:#}"),
                    "report compilation failed; returning degraded result"
                );
                result.stages.report = StageOutcome::Failed;
            }
        }

        transition(&mut state, RunState::Done);
        Ok(result)
    }

    async fn identify_competitors(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Vec<Competitor>, PipelineError> {
        let completion = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompts::IDENTIFY_SYSTEM_PROMPT),
                ChatMessage::user(prompts::build_identify_prompt(
                    request.company_name(),
                    request.competitor_count(),
                )),
            ],
            temperature: IDENTIFY_TEMPERATURE,
            response_format: ResponseFormat::Json,
            max_tokens: None,
        };
        let raw = self
            .client
            .complete(&completion)
            .await
            .map_err(PipelineError::Upstream)?;
        let competitors =
            parse::parse_competitor_response(&raw, usize::from(request.competitor_count()))?;
        debug!(count = competitors.len(), "competitors identified");
        Ok(competitors)
    }

    /// Issue one freeform markdown call. An empty completion counts as a
    /// failure so optional fields are never populated with blank text.
    async fn text_stage(
        &self,
        prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let completion = CompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            temperature,
            response_format: ResponseFormat::Text,
            max_tokens: Some(max_tokens),
        };
        let text = self.client.complete(&completion).await?;
        if text.trim().is_empty() {
            bail!("stage completion returned no text");
        }
        Ok(text)
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = ?state, to = ?next, "pipeline state transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;

    const BETA_CO_JSON: &str = r#"{"competitors":[{"name":"Beta Co","products":["X"],"market_share":"20%","differentiation":"price"}]}"#;

    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call(&self, index: usize) -> CompletionRequest {
            self.calls.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.calls.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    fn request(include_swot: bool) -> AnalysisRequest {
        AnalysisRequest::new("Acme", 3, include_swot, false, false).unwrap()
    }

    fn pipeline(client: &Arc<ScriptedClient>) -> ReportPipeline {
        ReportPipeline::new(Arc::clone(client) as Arc<dyn CompletionClient>, "test-model")
    }

    #[tokio::test]
    async fn full_run_populates_every_section() {
        let client = ScriptedClient::new(vec![
            Ok(BETA_CO_JSON.to_string()),
            Ok("market text".to_string()),
            Ok("tech text".to_string()),
            Ok("swot text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(true)).await.unwrap();

        assert_eq!(
            result.competitors,
            vec![Competitor {
                name: "Beta Co".into(),
                products: vec!["X".into()],
                market_share_percent: Some(20.0),
                differentiation: "price".into(),
            }]
        );
        assert_eq!(result.market_position_text.as_deref(), Some("market text"));
        assert_eq!(result.technology_text.as_deref(), Some("tech text"));
        assert_eq!(result.swot_text.as_deref(), Some("swot text"));
        assert_eq!(result.full_report_text.as_deref(), Some("final report"));
        assert_eq!(result.stages.market, StageOutcome::Done);
        assert_eq!(result.stages.technology, StageOutcome::Done);
        assert_eq!(result.stages.swot, StageOutcome::Done);
        assert_eq!(result.stages.report, StageOutcome::Done);
        assert_eq!(client.call_count(), 5);

        let identify = client.call(0);
        assert_eq!(identify.response_format, ResponseFormat::Json);
        assert!((identify.temperature - IDENTIFY_TEMPERATURE).abs() < f32::EPSILON);
        let compile = client.call(4);
        assert_eq!(compile.max_tokens, Some(REPORT_MAX_TOKENS));
    }

    #[tokio::test]
    async fn invalid_json_aborts_before_later_stages() {
        let client = ScriptedClient::new(vec![Ok("not json".to_string())]);
        let err = pipeline(&client).run(&request(true)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_at_identification_aborts() {
        let client = ScriptedClient::new(vec![Err(anyhow!("quota exceeded"))]);
        let err = pipeline(&client).run(&request(false)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upstream(_)));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn market_failure_does_not_block_later_stages() {
        let client = ScriptedClient::new(vec![
            Ok(BETA_CO_JSON.to_string()),
            Err(anyhow!("timeout")),
            Ok("tech text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(false)).await.unwrap();

        assert!(result.market_position_text.is_none());
        assert_eq!(result.stages.market, StageOutcome::Failed);
        assert_eq!(result.technology_text.as_deref(), Some("tech text"));
        assert_eq!(result.full_report_text.as_deref(), Some("final report"));
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn swot_is_skipped_when_not_requested() {
        let client = ScriptedClient::new(vec![
            Ok(BETA_CO_JSON.to_string()),
            Ok("market text".to_string()),
            Ok("tech text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(false)).await.unwrap();
        assert_eq!(result.stages.swot, StageOutcome::Skipped);
        assert!(result.swot_text.is_none());
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn swot_prompt_reuses_accumulated_sections() {
        let client = ScriptedClient::new(vec![
            Ok(BETA_CO_JSON.to_string()),
            Ok("MARKET SECTION".to_string()),
            Err(anyhow!("timeout")),
            Ok("swot text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(true)).await.unwrap();
        assert_eq!(result.stages.swot, StageOutcome::Done);

        let swot_call = client.call(3);
        let prompt = &swot_call.messages[0].content;
        assert!(prompt.contains("MARKET SECTION"));
        assert!(!prompt.contains("Technology comparison:"));
    }

    #[tokio::test]
    async fn zero_competitors_still_runs_downstream() {
        let client = ScriptedClient::new(vec![
            Ok(r#"{"competitors": []}"#.to_string()),
            Ok("market text".to_string()),
            Ok("tech text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(false)).await.unwrap();
        assert!(result.competitors.is_empty());
        assert_eq!(result.full_report_text.as_deref(), Some("final report"));
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn competitor_list_is_truncated_to_request() {
        let raw = r#"{"competitors":[{"name":"A"},{"name":"B"},{"name":"C"},{"name":"D"}]}"#;
        let client = ScriptedClient::new(vec![
            Ok(raw.to_string()),
            Ok("market text".to_string()),
            Ok("tech text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(false)).await.unwrap();
        assert_eq!(result.competitors.len(), 3);
    }

    #[tokio::test]
    async fn compile_failure_returns_degraded_result() {
        let client = ScriptedClient::new(vec![
            Ok(BETA_CO_JSON.to_string()),
            Ok("market text".to_string()),
            Ok("tech text".to_string()),
            Err(anyhow!("model overloaded")),
        ]);
        let result = pipeline(&client).run(&request(false)).await.unwrap();
        assert!(result.full_report_text.is_none());
        assert_eq!(result.stages.report, StageOutcome::Failed);
        assert_eq!(result.market_position_text.as_deref(), Some("market text"));
    }

    #[tokio::test]
    async fn blank_stage_output_counts_as_failure() {
        let client = ScriptedClient::new(vec![
            Ok(BETA_CO_JSON.to_string()),
            Ok("   \n".to_string()),
            Ok("tech text".to_string()),
            Ok("final report".to_string()),
        ]);
        let result = pipeline(&client).run(&request(false)).await.unwrap();
        assert!(result.market_position_text.is_none());
        assert_eq!(result.stages.market, StageOutcome::Failed);
    }
}
