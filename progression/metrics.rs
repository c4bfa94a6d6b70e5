//! Summary metrics over a tumor-size timeline.

use serde::{Deserialize, Serialize};

/// Relative change at or below which a tumor counts as responding.
const PARTIAL_RESPONSE_CHANGE: f64 = -30.0;
/// Relative growth at or above which a tumor counts as progressing.
const PROGRESSION_CHANGE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthStatus {
    Growing,
    Shrinking,
}

/// RECIST-style response category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCategory {
    #[serde(rename = "Partial Response")]
    PartialResponse,
    #[serde(rename = "Stable Disease")]
    StableDisease,
    #[serde(rename = "Progressive Disease")]
    ProgressiveDisease,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressionMetrics {
    pub growth_percentage: Option<f64>,
    pub growth_status: Option<GrowthStatus>,
    /// Months for the tumor to double, only reported while growing.
    pub doubling_time: Option<f64>,
    pub response_category: Option<ResponseCategory>,
    /// First time point at which the size is at least 20% above the initial size.
    pub time_to_progression: Option<f64>,
}

/// Computes metrics for `sizes` observed at `times` (months).
///
/// `initial_size` overrides the first observation as the reference size. Fewer
/// than two observations, mismatched lengths or a non-positive reference yield
/// an empty record.
pub fn progression_metrics(
    sizes: &[f64],
    times: &[f64],
    initial_size: Option<f64>,
) -> ProgressionMetrics {
    let mut metrics = ProgressionMetrics::default();
    if sizes.len() < 2 || sizes.len() != times.len() {
        return metrics;
    }
    let initial = initial_size.unwrap_or(sizes[0]);
    if initial.is_nan() || initial <= 0.0 {
        return metrics;
    }

    let final_size = sizes[sizes.len() - 1];
    let change = (final_size / initial - 1.0) * 100.0;
    metrics.growth_percentage = Some(change);

    let growing = final_size > initial;
    metrics.growth_status = Some(if growing {
        GrowthStatus::Growing
    } else {
        GrowthStatus::Shrinking
    });

    let elapsed = times[times.len() - 1];
    if growing && elapsed > 0.0 {
        let monthly_log_growth = (final_size / initial).ln() / elapsed;
        metrics.doubling_time = Some(std::f64::consts::LN_2 / monthly_log_growth);
    }

    metrics.response_category = Some(if change <= PARTIAL_RESPONSE_CHANGE {
        ResponseCategory::PartialResponse
    } else if change >= PROGRESSION_CHANGE {
        ResponseCategory::ProgressiveDisease
    } else {
        ResponseCategory::StableDisease
    });

    metrics.time_to_progression = sizes
        .iter()
        .zip(times)
        .skip(1)
        .find(|&(&size, _)| (size / initial - 1.0) * 100.0 >= PROGRESSION_CHANGE)
        .map(|(_, &time)| time);

    metrics
}

/// Metrics for a monthly trajectory whose index is the month.
pub fn trajectory_metrics(sizes: &[f64]) -> ProgressionMetrics {
    let times: Vec<f64> = (0..sizes.len()).map(|month| month as f64).collect();
    progression_metrics(sizes, &times, None)
}
