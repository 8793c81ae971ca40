//! Prompt construction for the five pipeline stages.

use super::{AnalysisResult, Competitor};

/// System prompt for competitor identification — enforces JSON-only output.
pub const IDENTIFY_SYSTEM_PROMPT: &str = "You are a competitive-intelligence analyst. \
    Respond with a single valid JSON object and nothing else. \
    Do not include markdown code fences or any text outside the JSON.";

pub fn build_identify_prompt(company: &str, competitor_count: u8) -> String {
    format!(
        r#"Identify the top {competitor_count} direct competitors for {company}.
For each competitor, include:
- Company name
- Primary competing products/services
- Estimated market share
- Key differentiation factors

Format as JSON with this structure:
{{
    "competitors": [
        {{
            "name": "Competitor Name",
            "products": ["product1", "product2"],
            "market_share": "X%",
            "differentiation": "Key differentiator"
        }}
    ]
}}"#
    )
}

pub fn build_market_prompt(company: &str, competitors: &[Competitor]) -> String {
    let context = serde_json::to_string_pretty(competitors).unwrap_or_default();
    format!(
        r#"Analyze the market positions of {company} and its competitors:
{context}

Provide:
1. Market share comparison
2. Growth trends
3. Geographic distribution
4. Customer segmentation

Format as markdown with clear sections and tables where appropriate."#
    )
}

pub fn build_technology_prompt(company: &str, competitors: &[Competitor]) -> String {
    format!(
        r#"Compare the technology stacks of {company} and: {names}

Include:
- Core technologies used
- R&D investment comparisons
- Patent analysis
- Technology adoption rates
- AI/ML capabilities

Present in a detailed markdown format with tables."#,
        names = competitor_names(competitors)
    )
}

pub fn build_swot_prompt(
    company: &str,
    competitors: &[Competitor],
    market_text: Option<&str>,
    technology_text: Option<&str>,
) -> String {
    let mut prompt = format!(
        r#"Create a comprehensive SWOT analysis for {company} considering its competitors: {names}

Include:
1. Strengths (relative to competitors)
2. Weaknesses (compared to competitors)
3. Opportunities (market gaps)
4. Threats (from competitors)

Format as markdown with clear sections."#,
        names = competitor_names(competitors)
    );
    if let Some(text) = market_text {
        prompt.push_str("\n\nMarket position analysis:\n");
        prompt.push_str(text);
    }
    if let Some(text) = technology_text {
        prompt.push_str("\n\nTechnology comparison:\n");
        prompt.push_str(text);
    }
    prompt
}

pub fn build_report_prompt(result: &AnalysisResult) -> String {
    let mut prompt = format!(
        r#"Compile a comprehensive competitive intelligence report for {company} including:
1. Executive Summary
2. Competitor Analysis
3. Market Position
4. Technology Comparison
5. Strategic Recommendations

Use all of the data below and format as markdown.

Identified competitors:
{competitors}"#,
        company = result.company_name(),
        competitors = serde_json::to_string_pretty(&result.competitors).unwrap_or_default(),
    );
    if let Some(text) = &result.market_position_text {
        prompt.push_str("\n\nMarket position analysis:\n");
        prompt.push_str(text);
    }
    if let Some(text) = &result.technology_text {
        prompt.push_str("\n\nTechnology comparison:\n");
        prompt.push_str(text);
    }
    if let Some(text) = &result.swot_text {
        prompt.push_str("\n\nSWOT analysis:\n");
        prompt.push_str(text);
    }
    prompt
}

fn competitor_names(competitors: &[Competitor]) -> String {
    if competitors.is_empty() {
        return "(none identified)".to_string();
    }
    competitors
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
