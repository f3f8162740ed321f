//! Expectation-vs-results calculator
//!
//! Pure functions over earnings history and estimate-revision rows. No
//! I/O, no clock: missing inputs yield `Insufficient`, never an
//! extrapolated value.

use stocklens_core::num::{pct_change, round2};
use stocklens_core::snapshot::{
    EarningsHistoryRow, EpsTrendRow, ExpectationGuidance, SurpriseVerdict, TrendSignal,
};

/// Surprise beyond this magnitude (percent) counts as a beat or miss.
const SURPRISE_BAND_PCT: f64 = 0.5;

/// Revision change (percent) for a strong signal.
const STRONG_REVISION_PCT: f64 = 8.0;

/// Revision change (percent) for a mild signal.
const MILD_REVISION_PCT: f64 = 3.0;

/// Quarters considered for counts, streak and average surprise.
const TRAILING_QUARTERS: usize = 4;

/// Classify one quarter's surprise percent.
pub fn classify_surprise(surprise_pct: Option<f64>) -> SurpriseVerdict {
    match surprise_pct {
        Some(s) if s.is_finite() => {
            if s > SURPRISE_BAND_PCT {
                SurpriseVerdict::Beat
            } else if s < -SURPRISE_BAND_PCT {
                SurpriseVerdict::Miss
            } else {
                SurpriseVerdict::Inline
            }
        }
        _ => SurpriseVerdict::Insufficient,
    }
}

/// Classify a consensus revision from `lookback` to `current`.
pub fn revision_signal(current: Option<f64>, lookback: Option<f64>) -> TrendSignal {
    let (Some(current), Some(lookback)) = (current, lookback) else {
        return TrendSignal::Insufficient;
    };
    let Some(delta) = pct_change(current, lookback) else {
        return TrendSignal::Insufficient;
    };
    if delta >= STRONG_REVISION_PCT {
        TrendSignal::StronglyUp
    } else if delta >= MILD_REVISION_PCT {
        TrendSignal::Up
    } else if delta <= -STRONG_REVISION_PCT {
        TrendSignal::StronglyDown
    } else if delta <= -MILD_REVISION_PCT {
        TrendSignal::Down
    } else {
        TrendSignal::Flat
    }
}

/// Build the full expectation summary.
///
/// `history` is expected newest first; `trend` rows are keyed by period
/// token, with `0y` (current fiscal year) driving the revision signals.
pub fn summarize(history: &[EarningsHistoryRow], trend: &[EpsTrendRow]) -> ExpectationGuidance {
    let recent = &history[..history.len().min(TRAILING_QUARTERS)];

    let verdicts: Vec<SurpriseVerdict> = recent
        .iter()
        .map(|row| classify_surprise(row.surprise_pct))
        .collect();

    let count = |verdict: SurpriseVerdict| -> u8 {
        u8::try_from(verdicts.iter().filter(|v| **v == verdict).count()).unwrap_or(u8::MAX)
    };
    let beat_count = count(SurpriseVerdict::Beat);
    let miss_count = count(SurpriseVerdict::Miss);
    let inline_count = count(SurpriseVerdict::Inline);

    let beat_streak = u8::try_from(
        verdicts
            .iter()
            .take_while(|v| **v == SurpriseVerdict::Beat)
            .count(),
    )
    .unwrap_or(u8::MAX);

    let surprises: Vec<f64> = recent
        .iter()
        .filter_map(|row| row.surprise_pct)
        .filter(|s| s.is_finite())
        .collect();
    let avg_surprise_pct = if surprises.is_empty() {
        None
    } else {
        #[allow(clippy::cast_precision_loss)]
        Some(round2(surprises.iter().sum::<f64>() / surprises.len() as f64))
    };

    let current_year = trend.iter().find(|row| row.period == "0y");
    let window = |lookback: fn(&EpsTrendRow) -> Option<f64>| {
        current_year.map_or(TrendSignal::Insufficient, |row| {
            revision_signal(row.current, lookback(row))
        })
    };
    let trend_7d = window(|row| row.days7_ago);
    let trend_30d = window(|row| row.days30_ago);
    let trend_60d = window(|row| row.days60_ago);
    let trend_90d = window(|row| row.days90_ago);

    let last_verdict = verdicts
        .first()
        .copied()
        .unwrap_or(SurpriseVerdict::Insufficient);

    let conclusion = conclusion_for(last_verdict, beat_count, miss_count, trend_30d, trend_90d);

    ExpectationGuidance {
        last_verdict,
        beat_count,
        miss_count,
        inline_count,
        beat_streak,
        avg_surprise_pct,
        trend_7d,
        trend_30d,
        trend_60d,
        trend_90d,
        conclusion,
    }
}

fn signal_score(signal: TrendSignal) -> i32 {
    match signal {
        TrendSignal::StronglyUp => 2,
        TrendSignal::Up => 1,
        TrendSignal::Flat | TrendSignal::Insufficient => 0,
        TrendSignal::Down => -1,
        TrendSignal::StronglyDown => -2,
    }
}

fn conclusion_for(
    last_verdict: SurpriseVerdict,
    beat_count: u8,
    miss_count: u8,
    trend_30d: TrendSignal,
    trend_90d: TrendSignal,
) -> String {
    if last_verdict == SurpriseVerdict::Insufficient
        && trend_30d == TrendSignal::Insufficient
        && trend_90d == TrendSignal::Insufficient
    {
        return "Insufficient earnings history to judge expectations".to_string();
    }

    let mut score: i32 = match last_verdict {
        SurpriseVerdict::Beat => 1,
        SurpriseVerdict::Miss => -1,
        SurpriseVerdict::Inline | SurpriseVerdict::Insufficient => 0,
    };
    score += i32::from(beat_count) - i32::from(miss_count);
    score += signal_score(trend_30d) + signal_score(trend_90d);

    let text = match score {
        4.. => "Consistently beating expectations and estimates are being revised up",
        2..=3 => "Running ahead of expectations",
        -1..=1 => "Tracking roughly in line with expectations",
        -3..=-2 => "Running behind expectations",
        _ => "Missing expectations and estimates are being revised down",
    };
    text.to_string()
}
