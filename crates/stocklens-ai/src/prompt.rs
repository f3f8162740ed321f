//! Prompt builders for stock analysis requests
//!
//! Each analysis kind renders the snapshot set into a compact data sheet
//! and wraps it with kind-specific instructions. Missing fields are printed
//! as `n/a` so the model never sees fabricated numbers.

use crate::transcript::ChatTurn;
use std::fmt::Write as _;
use stocklens_core::snapshot::{SecuritySnapshot, StatementRow};
use stocklens_core::{MetricField, SurpriseVerdict, TrendSignal};
use stocklens_sources::SearchItem;

/// What the caller is asking the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    /// Fundamentals-focused comparison
    FinancialAnalysis,
    /// Buy/hold/avoid framing with risk discussion
    InvestmentAdvice,
    /// 12-month target price ranges with reasoning
    TargetPrice,
}

impl AnalysisKind {
    /// Stable label for outcomes and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::FinancialAnalysis => "financial_analysis",
            Self::InvestmentAdvice => "investment_advice",
            Self::TargetPrice => "target_price",
        }
    }

    fn instructions(self) -> &'static str {
        match self {
            Self::FinancialAnalysis => {
                "Compare the companies' fundamentals: revenue and profit trajectory, \
                 margin structure, cash generation, and how the market is pricing each. \
                 Call out where the data is missing rather than guessing. Conclude with \
                 the relative strengths and weaknesses of each company."
            }
            Self::InvestmentAdvice => {
                "Assess each company as a potential investment: valuation vs growth, \
                 earnings momentum vs analyst expectations, and the main risks. Give a \
                 clear relative preference with reasoning. This is analysis for research \
                 purposes, not personal financial advice, and say so briefly."
            }
            Self::TargetPrice => {
                "Estimate a 12-month target price range for each company. Anchor every \
                 estimate in the supplied figures (EPS forecasts, forward PE, growth \
                 rates) and show the arithmetic. Give a bear, base, and bull case per \
                 company, and state the key assumptions behind each."
            }
        }
    }
}

const SYSTEM_PROMPT: &str =
    "You are an equity research analyst. Base every statement on the data sheet \
     provided in the user message; when a figure is marked n/a, say the data is \
     unavailable instead of estimating it. Be specific and quantitative.";

/// System prompt shared by all analysis kinds.
pub fn system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Build the user turn for a fresh analysis request.
pub fn build_analysis_prompt(
    kind: AnalysisKind,
    snapshots: &[SecuritySnapshot],
    search_context: Option<&str>,
) -> String {
    let mut prompt = String::new();
    let symbols: Vec<&str> = snapshots.iter().map(|s| s.symbol.as_str()).collect();
    let _ = writeln!(prompt, "Task: {}\n", kind.instructions());
    let _ = writeln!(prompt, "Companies: {}\n", symbols.join(", "));
    prompt.push_str("=== Data sheet ===\n");
    for snapshot in snapshots {
        prompt.push_str(&render_snapshot(snapshot));
        prompt.push('\n');
    }
    if let Some(context) = search_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("=== Recent web context ===\n");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt
}

/// Build the turn sequence for a follow-up question.
///
/// The base analysis (when present) and the full prior transcript precede
/// the new question, so the model answers in context.
pub fn build_follow_up_turns(
    kind: AnalysisKind,
    base_analysis: Option<&str>,
    transcript: &[ChatTurn],
    question: &str,
    snapshots: &[SecuritySnapshot],
) -> Vec<ChatTurn> {
    let mut turns = Vec::with_capacity(transcript.len() + 3);

    let mut opening = build_analysis_prompt(kind, snapshots, None);
    opening.push_str(
        "\nAnswer follow-up questions about this analysis using the data sheet above.",
    );
    turns.push(ChatTurn::user(opening));

    if let Some(base) = base_analysis.filter(|b| !b.trim().is_empty()) {
        turns.push(ChatTurn::assistant(base));
    }
    turns.extend(transcript.iter().cloned());
    turns.push(ChatTurn::user(question));
    turns
}

/// Render search items grouped under their symbol for the prompt.
pub fn render_search_context(groups: &[(String, Vec<SearchItem>)]) -> String {
    let mut out = String::new();
    for (symbol, items) in groups {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "[{symbol}]");
        for item in items {
            let date = item
                .published_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "undated".to_string());
            let source = item.source.as_deref().unwrap_or(&item.provider);
            let _ = writeln!(out, "- {} ({source}, {date})", item.title);
            if let Some(snippet) = &item.snippet {
                let _ = writeln!(out, "  {snippet}");
            }
        }
    }
    out
}

// ===== Snapshot rendering =====

fn render_snapshot(snapshot: &SecuritySnapshot) -> String {
    let mut out = String::new();
    let name = snapshot
        .realtime
        .name
        .as_ref()
        .map_or_else(|| snapshot.symbol.to_string(), |n| n.value.clone());
    let _ = writeln!(out, "--- {} ({name}) ---", snapshot.symbol);

    if let Some(currency) = &snapshot.currency.quote {
        let _ = writeln!(out, "Quote currency: {currency}");
    }
    let _ = writeln!(
        out,
        "Price: {} | Day change: {} | Market cap (B): {} | PE TTM: {}",
        num(&snapshot.realtime.price),
        pct(&snapshot.realtime.change_pct),
        num(&snapshot.realtime.market_cap_b),
        num(&snapshot.realtime.pe_ttm),
    );
    let _ = writeln!(
        out,
        "Momentum: 5d {} | 20d {} | 250d {} | Turnover (B): {}",
        pct(&snapshot.realtime.change_5d_pct),
        pct(&snapshot.realtime.change_20d_pct),
        pct(&snapshot.realtime.change_250d_pct),
        num(&snapshot.realtime.turnover_b),
    );

    let fin = &snapshot.financials;
    let _ = writeln!(
        out,
        "Latest financials: revenue (B) {} (YoY {}) | net income (B) {} (YoY {}) | EPS {}",
        num(&fin.revenue_b),
        pct(&fin.revenue_yoy_pct),
        num(&fin.net_income_b),
        pct(&fin.net_income_yoy_pct),
        num(&fin.eps),
    );
    let _ = writeln!(
        out,
        "Margins: gross {} | operating {} | net {} | ROE {}",
        pct(&fin.gross_margin_pct),
        pct(&fin.operating_margin_pct),
        pct(&fin.net_margin_pct),
        pct(&fin.roe_pct),
    );
    for row in &fin.history {
        out.push_str(&render_history_row(row));
    }

    let _ = writeln!(
        out,
        "Forecast EPS: current yr {} | next yr {} | next qtr {} | next earnings: {}",
        num(&snapshot.forecast.eps_current_year),
        num(&snapshot.forecast.eps_next_year),
        num(&snapshot.forecast.eps_next_quarter),
        snapshot
            .forecast
            .next_earnings_date
            .as_ref()
            .map_or_else(|| "n/a".to_string(), |d| d.value.to_string()),
    );
    let _ = writeln!(
        out,
        "Valuation: fwd PE {} | PEG {} | EV/EBITDA {} | P/S {} | P/B {}",
        num(&snapshot.valuation.forward_pe),
        num(&snapshot.valuation.peg),
        num(&snapshot.valuation.ev_to_ebitda),
        num(&snapshot.valuation.price_to_sales),
        num(&snapshot.valuation.price_to_book),
    );

    let exp = &snapshot.expectation;
    if exp.last_verdict != SurpriseVerdict::Insufficient
        || exp.trend_30d != TrendSignal::Insufficient
    {
        let _ = writeln!(
            out,
            "Expectations: last quarter {:?} | last 4 quarters {}B/{}M/{}I | streak {} | \
             avg surprise {} | revisions 7d {:?} / 30d {:?} / 60d {:?} / 90d {:?}",
            exp.last_verdict,
            exp.beat_count,
            exp.miss_count,
            exp.inline_count,
            exp.beat_streak,
            opt(exp.avg_surprise_pct, "%"),
            exp.trend_7d,
            exp.trend_30d,
            exp.trend_60d,
            exp.trend_90d,
        );
        if !exp.conclusion.is_empty() {
            let _ = writeln!(out, "Expectation read: {}", exp.conclusion);
        }
    }

    if !snapshot.news.is_empty() {
        out.push_str("Recent news:\n");
        for item in &snapshot.news {
            let _ = writeln!(
                out,
                "- {} ({})",
                item.title,
                item.publisher.as_deref().unwrap_or("unknown"),
            );
        }
    }
    out
}

fn render_history_row(row: &StatementRow) -> String {
    format!(
        "  {} {:?}: revenue (B) {} | net income (B) {} | EPS {} | OCF (B) {} | FCF (B) {}\n",
        row.period_end,
        row.period_type,
        opt(row.revenue_b, ""),
        opt(row.net_income_b, ""),
        opt(row.diluted_eps, ""),
        opt(row.operating_cash_flow_b, ""),
        opt(row.free_cash_flow_b, ""),
    )
}

fn num(field: &Option<MetricField<f64>>) -> String {
    field.as_ref().map_or_else(
        || "n/a".to_string(),
        |f| format!("{:.2} [{}]", f.value, f.source),
    )
}

fn pct(field: &Option<MetricField<f64>>) -> String {
    field.as_ref().map_or_else(
        || "n/a".to_string(),
        |f| format!("{:.2}% [{}]", f.value, f.source),
    )
}

fn opt(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}{unit}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocklens_core::{Provenance, Symbol};

    fn snapshot_with_price() -> SecuritySnapshot {
        let mut snapshot = SecuritySnapshot::empty(Symbol::parse("NVDA").unwrap());
        snapshot.realtime.price = Some(MetricField::new(187.32, Provenance::Finnhub));
        snapshot
    }

    #[test]
    fn test_analysis_prompt_lists_symbols_and_data() {
        let snapshots = vec![snapshot_with_price()];
        let prompt = build_analysis_prompt(AnalysisKind::FinancialAnalysis, &snapshots, None);
        assert!(prompt.contains("Companies: NVDA"));
        assert!(prompt.contains("187.32 [finnhub]"));
        assert!(!prompt.contains("Recent web context"));
    }

    #[test]
    fn test_missing_fields_render_as_na() {
        let snapshots = vec![SecuritySnapshot::empty(Symbol::parse("AMD").unwrap())];
        let prompt = build_analysis_prompt(AnalysisKind::TargetPrice, &snapshots, None);
        assert!(prompt.contains("Price: n/a"));
    }

    #[test]
    fn test_search_context_section_included_when_present() {
        let snapshots = vec![snapshot_with_price()];
        let prompt = build_analysis_prompt(
            AnalysisKind::InvestmentAdvice,
            &snapshots,
            Some("[NVDA]\n- headline"),
        );
        assert!(prompt.contains("Recent web context"));
        assert!(prompt.contains("- headline"));
    }

    #[test]
    fn test_follow_up_turns_order() {
        let snapshots = vec![snapshot_with_price()];
        let transcript = vec![
            ChatTurn::user("What about margins?"),
            ChatTurn::assistant("Gross margin is n/a in the sheet."),
        ];
        let turns = build_follow_up_turns(
            AnalysisKind::FinancialAnalysis,
            Some("Base analysis text."),
            &transcript,
            "And the valuation?",
            &snapshots,
        );

        assert_eq!(turns.len(), 5);
        assert_eq!(turns[1].text, "Base analysis text.");
        assert_eq!(turns.last().unwrap().text, "And the valuation?");
    }

    #[test]
    fn test_follow_up_without_base_analysis() {
        let snapshots = vec![snapshot_with_price()];
        let turns = build_follow_up_turns(
            AnalysisKind::FinancialAnalysis,
            None,
            &[],
            "Question?",
            &snapshots,
        );
        assert_eq!(turns.len(), 2);
    }

    #[test]
    fn test_render_search_context_groups_by_symbol() {
        let groups = vec![(
            "NVDA".to_string(),
            vec![SearchItem {
                provider: "exa".to_string(),
                title: "Earnings beat".to_string(),
                url: "https://a.example/1".to_string(),
                published_at: None,
                source: Some("reuters.com".to_string()),
                snippet: Some("Data-center revenue grew".to_string()),
            }],
        )];
        let rendered = render_search_context(&groups);
        assert!(rendered.contains("[NVDA]"));
        assert!(rendered.contains("(reuters.com, undated)"));
        assert!(rendered.contains("Data-center revenue grew"));
    }
}
