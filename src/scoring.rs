//! Per-clue scoring, percentile aggregation, and final ranking (C1, spec §4.1).

/// Explicit epsilon for `avg_score` tie-break comparisons (spec §9) — never
/// compare scores for equality directly.
pub const SCORE_EPSILON: f64 = 0.01;

/// Sub-250ms speed kicker, configurable via `AppConfig::speed_bonus_threshold_ms`.
pub const DEFAULT_SPEED_BONUS_THRESHOLD_MS: u64 = 250;

/// Nearest-rank percentile: the ⌈p·n⌉-th smallest, 1-indexed. `p` is in [0,100].
/// Panics if `values` is empty — callers always have at least one attempt per
/// scored clue.
pub fn nearest_rank_percentile(values: &[u64], p: f64) -> u64 {
    assert!(!values.is_empty(), "percentile of empty sample");
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    let rank = rank.clamp(1, n);
    sorted[rank - 1]
}

pub fn min_latency(values: &[u64]) -> u64 {
    values.iter().copied().min().expect("empty latency sample")
}

/// `speed_norm = clamp(0, 1, (p95 - lat) / max(1, p95 - min))`.
fn speed_norm(lat: u64, min_lat: u64, p95_lat: u64) -> f64 {
    let denom = (p95_lat as i64 - min_lat as i64).max(1) as f64;
    let numer = (p95_lat as i64 - lat as i64) as f64;
    (numer / denom).clamp(0.0, 1.0)
}

/// Per-clue score for one attempt, given the clue's min/p95 latency over all
/// models' attempts. `format_ok = false` or `correct = false` scores 0,
/// regardless of latency (spec §8 boundary behavior).
pub fn clue_score(
    format_ok: bool,
    correct: bool,
    e2e_ms: u64,
    min_lat: u64,
    p95_lat: u64,
    speed_bonus_threshold_ms: u64,
) -> f64 {
    if !format_ok || !correct {
        return 0.0;
    }
    let base = 70.0 + 30.0 * speed_norm(e2e_ms, min_lat, p95_lat);
    let bonus = if e2e_ms < speed_bonus_threshold_ms { 2.0 } else { 0.0 };
    (base + bonus).min(100.0)
}

pub fn median(values: &[u64]) -> f64 {
    assert!(!values.is_empty(), "median of empty sample");
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

pub fn variance(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().copied().sum::<u64>() as f64 / values.len() as f64;
    values.iter().map(|&v| { let d = v as f64 - mean; d * d }).sum::<f64>() / values.len() as f64
}

/// One model's aggregate standing, ready for final ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingInput {
    pub model_id: String,
    pub avg_score: f64,
    pub total_correct: u32,
    pub median_e2e_ms: f64,
    pub e2e_variance: f64,
}

/// Final ranking (spec §4.1): `avg_score` descending (epsilon 0.01 equality),
/// tie-broken by more `total_correct`, then lower `median_e2e_ms`, then lower
/// `e2e_variance`. Stable sort; returns `(model_id, rank)` pairs, 1-indexed
/// dense ranks (no gaps — assigned positionally after the sort, so exact ties
/// still get distinct consecutive ranks per "ranks are a bijection" §8.6).
pub fn rank_models(mut inputs: Vec<RankingInput>) -> Vec<(String, u32)> {
    inputs.sort_by(|a, b| {
        let score_cmp = if (a.avg_score - b.avg_score).abs() > SCORE_EPSILON {
            b.avg_score.partial_cmp(&a.avg_score).unwrap()
        } else {
            std::cmp::Ordering::Equal
        };
        score_cmp
            .then_with(|| b.total_correct.cmp(&a.total_correct))
            .then_with(|| a.median_e2e_ms.partial_cmp(&b.median_e2e_ms).unwrap())
            .then_with(|| a.e2e_variance.partial_cmp(&b.e2e_variance).unwrap())
    });
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| (input.model_id, (i + 1) as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_rank_percentile_matches_scenario_a() {
        let lat = vec![50, 500, 100];
        assert_eq!(min_latency(&lat), 50);
        assert_eq!(nearest_rank_percentile(&lat, 95.0), 500);
    }

    #[test]
    fn scenario_a_scores() {
        let min_lat = 50;
        let p95_lat = 500;
        let m1 = clue_score(true, true, 50, min_lat, p95_lat, 250);
        let m2 = clue_score(true, true, 500, min_lat, p95_lat, 250);
        let m3 = clue_score(false, false, 100, min_lat, p95_lat, 250);
        assert!((m1 - 100.0).abs() < 1e-9);
        assert!((m2 - 70.0).abs() < 1e-9);
        assert_eq!(m3, 0.0);
    }

    #[test]
    fn format_violation_scores_zero_regardless_of_latency() {
        assert_eq!(clue_score(false, true, 1, 1, 100, 250), 0.0);
        assert_eq!(clue_score(true, false, 1, 1, 100, 250), 0.0);
    }

    #[test]
    fn speed_component_is_monotonic_in_latency() {
        let a = clue_score(true, true, 100, 50, 500, 250);
        let b = clue_score(true, true, 200, 50, 500, 250);
        assert!(a >= b);
    }

    #[test]
    fn scenario_e_tie_break_prefers_more_correct() {
        let inputs = vec![
            RankingInput { model_id: "X".into(), avg_score: 85.0, total_correct: 4, median_e2e_ms: 300.0, e2e_variance: 10.0 },
            RankingInput { model_id: "Y".into(), avg_score: 85.004, total_correct: 5, median_e2e_ms: 500.0, e2e_variance: 10.0 },
        ];
        let ranked = rank_models(inputs);
        assert_eq!(ranked[0].0, "Y");
        assert_eq!(ranked[0].1, 1);
        assert_eq!(ranked[1].0, "X");
        assert_eq!(ranked[1].1, 2);
    }

    #[test]
    fn ranks_are_dense_and_one_indexed() {
        let inputs = vec![
            RankingInput { model_id: "A".into(), avg_score: 90.0, total_correct: 5, median_e2e_ms: 100.0, e2e_variance: 0.0 },
            RankingInput { model_id: "B".into(), avg_score: 80.0, total_correct: 5, median_e2e_ms: 100.0, e2e_variance: 0.0 },
            RankingInput { model_id: "C".into(), avg_score: 70.0, total_correct: 5, median_e2e_ms: 100.0, e2e_variance: 0.0 },
        ];
        let ranked = rank_models(inputs);
        let ranks: Vec<u32> = ranked.iter().map(|(_, r)| *r).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn median_and_variance_basic() {
        assert_eq!(median(&[1, 2, 3]), 2.0);
        assert_eq!(median(&[1, 2, 3, 4]), 2.5);
        assert_eq!(variance(&[2, 2, 2]), 0.0);
    }
}
