use std::fmt::Write;

use serde::Serialize;

use crate::pipeline::{AnalysisRequest, AnalysisResult, Competitor, StageOutcome, StageOutcomes};

const PREVIEW_CHARS: usize = 400;

/// Format styles supported by the default renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Markdown,
    Json,
}

/// Produce an export string from an `AnalysisResult` in the desired format.
pub fn render_report(result: &AnalysisResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Human => render_human(result),
        OutputFormat::Markdown => Ok(render_markdown(result)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport::from(result))?),
    }
}

fn render_human(result: &AnalysisResult) -> anyhow::Result<String> {
    let mut out = String::new();
    writeln!(
        out,
        "Competitive Intelligence Report: {}",
        result.company_name()
    )?;
    writeln!(
        out,
        "Competitors: {} identified (requested {})",
        result.competitors.len(),
        result.request.competitor_count()
    )?;
    writeln!(out)?;

    if result.competitors.is_empty() {
        writeln!(out, "No competitors identified.")?;
    } else {
        writeln!(out, "Competitors:")?;
        for competitor in &result.competitors {
            writeln!(out, "  - {}{}", competitor.name, share_suffix(competitor))?;
            if !competitor.products.is_empty() {
                writeln!(out, "    products: {}", competitor.products.join(", "))?;
            }
            if !competitor.differentiation.trim().is_empty() {
                writeln!(out, "    differentiation: {}", competitor.differentiation)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "Sections:")?;
    writeln!(out, "  - market position      {}", outcome_label(result.stages.market))?;
    writeln!(out, "  - technology           {}", outcome_label(result.stages.technology))?;
    writeln!(out, "  - swot                 {}", outcome_label(result.stages.swot))?;
    writeln!(out, "  - compiled report      {}", outcome_label(result.stages.report))?;

    if let Some(report) = &result.full_report_text {
        writeln!(out)?;
        writeln!(out, "Report preview:")?;
        writeln!(out, "{}", preview(report))?;
    }

    Ok(out)
}

/// Markdown export. The compiled report is returned verbatim when present;
/// otherwise a degraded document is assembled from whatever sections exist,
/// with placeholders for the missing ones.
fn render_markdown(result: &AnalysisResult) -> String {
    if let Some(report) = &result.full_report_text {
        return report.clone();
    }

    let mut out = format!(
        "# Competitive Intelligence Report: {}\n\n## Competitors\n\n",
        result.company_name()
    );
    if result.competitors.is_empty() {
        out.push_str("_No competitors identified._\n");
    } else {
        for competitor in &result.competitors {
            out.push_str(&format!(
                "- **{}**{}",
                competitor.name,
                share_suffix(competitor)
            ));
            if !competitor.products.is_empty() {
                out.push_str(&format!(" — products: {}", competitor.products.join(", ")));
            }
            if !competitor.differentiation.trim().is_empty() {
                out.push_str(&format!("; differentiation: {}", competitor.differentiation));
            }
            out.push('\n');
        }
    }

    push_section(&mut out, "Market Position", result.market_position_text.as_deref());
    push_section(&mut out, "Technology Comparison", result.technology_text.as_deref());
    if result.stages.swot != StageOutcome::Skipped {
        push_section(&mut out, "SWOT Analysis", result.swot_text.as_deref());
    }
    push_section(&mut out, "Compiled Report", None);

    out
}

fn push_section(out: &mut String, title: &str, text: Option<&str>) {
    out.push_str(&format!("\n## {title}\n\n"));
    match text {
        Some(text) => {
            out.push_str(text.trim_end());
            out.push('\n');
        }
        None => out.push_str("_Section unavailable._\n"),
    }
}

fn share_suffix(competitor: &Competitor) -> String {
    competitor
        .market_share_percent
        .map(|share| format!(" (market share {share}%)"))
        .unwrap_or_default()
}

fn outcome_label(outcome: StageOutcome) -> &'static str {
    match outcome {
        StageOutcome::Done => "available",
        StageOutcome::Failed => "unavailable",
        StageOutcome::Skipped => "skipped",
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    company_name: &'a str,
    request: &'a AnalysisRequest,
    competitors: &'a [Competitor],
    market_position_text: Option<&'a str>,
    technology_text: Option<&'a str>,
    swot_text: Option<&'a str>,
    full_report_text: Option<&'a str>,
    stages: &'a StageOutcomes,
}

impl<'a> From<&'a AnalysisResult> for JsonReport<'a> {
    fn from(result: &'a AnalysisResult) -> Self {
        Self {
            company_name: result.company_name(),
            request: &result.request,
            competitors: &result.competitors,
            market_position_text: result.market_position_text.as_deref(),
            technology_text: result.technology_text.as_deref(),
            swot_text: result.swot_text.as_deref(),
            full_report_text: result.full_report_text.as_deref(),
            stages: &result.stages,
        }
    }
}
