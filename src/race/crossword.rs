//! Race Engine — Crossword mode (C5a, spec §4.4).
//!
//! Grounded on `benchmarks::orchestrator::Orchestrator`: a semaphore bounds
//! per-clue model concurrency, an `mpsc::UnboundedSender` is the single
//! event-emission sink, and a `CancellationToken` carries `end_early` /
//! client-disconnect signaling. Unlike the teacher's "benchmarks run
//! concurrently, tasks run sequentially", here models run concurrently
//! *within* a clue and clues run sequentially across the whole round set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::adapter::StreamingAdapter;
use crate::crossword::{prompt, Round};
use crate::model_spec::ModelSpec;
use crate::race::events::{
    ClueResult, PuzzleConfigView, RaceConfigView, RaceEvent, RaceResult, RaceResultView, RoundResult, StateView,
};
use crate::race::{ModelScore, RaceState, RaceStatus};
use crate::runner::{run_attempt, AttemptOptions, ChannelProgressSink};
use crate::scoring::{self, RankingInput};

pub struct CrosswordRaceConfig {
    pub id: String,
    pub name: String,
    pub rounds: Vec<Round>,
    pub models: Vec<ModelSpec>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub speed_bonus_threshold_ms: u64,
    pub max_concurrent_models: usize,
}

#[derive(Default)]
struct ModelTally {
    e2e_ms: Vec<u64>,
    ttft_ms: Vec<u64>,
    scores: Vec<f64>,
    correct: u32,
    attempts: u32,
}

/// Runs a full Crossword race to completion, emitting events as it goes.
/// Returns the final [`RaceResult`] (also emitted as the last `complete`
/// event). Never panics: fatal conditions are reported via an `error` event
/// and an empty-ish result with a zeroed scoreboard.
pub async fn run(
    config: CrosswordRaceConfig,
    adapters: HashMap<String, Arc<dyn StreamingAdapter>>,
    events: mpsc::UnboundedSender<RaceEvent>,
    session_cancel: CancellationToken,
) -> RaceResult {
    let race_start = Instant::now();
    let total_clues: u32 = config.rounds.iter().map(|r| r.clues.len() as u32).sum();
    let mut state = RaceState::new_pending(total_clues);

    let _ = events.send(RaceEvent::Config {
        config: RaceConfigView {
            id: config.id.clone(),
            name: config.name.clone(),
            models: config.models.clone(),
            puzzle: PuzzleConfigView::Crossword { rounds: config.rounds.clone() },
            created_at: config.created_at,
        },
    });

    state.status = RaceStatus::Running;
    state.started_at = Some(Utc::now());
    let _ = events.send(RaceEvent::State { state: StateView::Crossword(state.clone()) });

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_models.max(1)));
    let mut round_results = Vec::new();
    let mut tallies: HashMap<String, ModelTally> = config.models.iter().map(|m| (m.id.clone(), ModelTally::default())).collect();

    'rounds: for round in &config.rounds {
        state.current_round_id = Some(round.round_id.clone());
        let mut clue_results = Vec::new();
        let mut round_tallies: HashMap<String, ModelTally> =
            config.models.iter().map(|m| (m.id.clone(), ModelTally::default())).collect();

        for clue in &round.clues {
            if session_cancel.is_cancelled() {
                break 'rounds;
            }
            state.current_clue_id = Some(clue.clue_id.clone());
            let prompt_text = prompt::render(clue, round.output_rule);

            let mut handles = Vec::with_capacity(config.models.len());
            for model in &config.models {
                let Some(adapter) = adapters.get(&model.id).cloned() else { continue };
                let model = model.clone();
                let prompt_text = prompt_text.clone();
                let clue_id = clue.clue_id.clone();
                let opts = AttemptOptions::crossword(
                    clue.length,
                    round.output_rule,
                    clue.case_rule,
                    clue.allow_hyphen,
                    clue.answer.clone(),
                    round.max_tokens,
                    round.time_limit_ms,
                );
                let semaphore = semaphore.clone();
                let session_cancel = session_cancel.clone();
                let events = events.clone();

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    let _ = events.send(RaceEvent::ModelStart { model_id: model.id.clone(), guess_index: None });
                    let mut sink = ChannelProgressSink::new(model.id.clone(), None, events.clone());
                    let attempt = run_attempt(&model, Some(&clue_id), &prompt_text, &opts, adapter.as_ref(), &mut sink, &session_cancel, race_start).await;
                    let _ = events.send(RaceEvent::Attempt { attempt: attempt.clone() });
                    attempt
                }));
            }

            let mut attempts = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.await {
                    Ok(attempt) => attempts.push(attempt),
                    Err(_) => continue, // task panicked; treated as a missing attempt, never fatal
                }
            }

            if attempts.is_empty() {
                continue;
            }

            let latencies: Vec<u64> = attempts.iter().map(|a| a.e2e_ms).collect();
            let min_lat = scoring::min_latency(&latencies);
            let p95_lat = scoring::nearest_rank_percentile(&latencies, 95.0);

            for attempt in &mut attempts {
                attempt.clue_score = scoring::clue_score(
                    attempt.format_ok,
                    attempt.correct,
                    attempt.e2e_ms,
                    min_lat,
                    p95_lat,
                    config.speed_bonus_threshold_ms,
                );
                for tally in [
                    tallies.entry(attempt.model_id.clone()).or_default(),
                    round_tallies.entry(attempt.model_id.clone()).or_default(),
                ] {
                    tally.e2e_ms.push(attempt.e2e_ms);
                    if let Some(ttft) = attempt.ttft_ms {
                        tally.ttft_ms.push(ttft);
                    }
                    tally.scores.push(attempt.clue_score);
                    tally.attempts += 1;
                    if attempt.correct {
                        tally.correct += 1;
                    }
                }
            }

            let _ = events.send(RaceEvent::Clue { clue_id: clue.clue_id.clone(), attempts: attempts.clone() });

            state.completed_clues += 1;
            state.recompute_progress();
            let _ = events.send(RaceEvent::State { state: StateView::Crossword(state.clone()) });

            clue_results.push(ClueResult { clue_id: clue.clue_id.clone(), attempts });
        }

        let model_scores = score_models(&round_tallies, &config.models);
        let round_result = RoundResult { round_id: round.round_id.clone(), clue_results, model_scores };
        let _ = events.send(RaceEvent::Round { round_result: round_result.clone() });
        round_results.push(round_result);
    }

    let model_scores = score_models(&tallies, &config.models);
    state.status = RaceStatus::Completed;
    state.completed_at = Some(Utc::now());
    let _ = events.send(RaceEvent::State { state: StateView::Crossword(state.clone()) });

    let result = RaceResult { race_id: config.id.clone(), model_scores, rounds: round_results };
    let _ = events.send(RaceEvent::Complete { result: RaceResultView::Crossword(result.clone()) });
    result
}

fn score_models(tallies: &HashMap<String, ModelTally>, models: &[ModelSpec]) -> Vec<ModelScore> {
    let mut inputs = Vec::with_capacity(models.len());
    let mut by_id = HashMap::new();

    for model in models {
        let tally = tallies.get(&model.id);
        let (avg_score, total_correct, total_attempts, median_e2e, median_ttft, e2e_var) = match tally {
            Some(t) if t.attempts > 0 => {
                let avg = t.scores.iter().sum::<f64>() / t.scores.len() as f64;
                let median_e2e = scoring::median(&t.e2e_ms);
                let median_ttft = if t.ttft_ms.is_empty() { None } else { Some(scoring::median(&t.ttft_ms)) };
                let var = scoring::variance(&t.e2e_ms);
                (avg, t.correct, t.attempts, median_e2e, median_ttft, var)
            }
            _ => (0.0, 0, 0, 0.0, None, 0.0),
        };
        let accuracy_pct = if total_attempts > 0 { 100.0 * total_correct as f64 / total_attempts as f64 } else { 0.0 };
        inputs.push(RankingInput {
            model_id: model.id.clone(),
            avg_score,
            total_correct,
            median_e2e_ms: median_e2e,
            e2e_variance: e2e_var,
        });
        by_id.insert(
            model.id.clone(),
            (total_correct, total_attempts, accuracy_pct, avg_score, median_e2e, median_ttft, e2e_var),
        );
    }

    let ranked = scoring::rank_models(inputs);
    ranked
        .into_iter()
        .map(|(model_id, rank)| {
            let (total_correct, total_attempts, accuracy_pct, avg_score, median_e2e_ms, median_ttft_ms, e2e_variance) =
                by_id.remove(&model_id).unwrap_or_default();
            ModelScore { model_id, total_correct, total_attempts, accuracy_pct, avg_score, median_e2e_ms, median_ttft_ms, e2e_variance, rank }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;
    use crate::crossword::Clue;
    use crate::normalize::{CaseRule, OutputRule};
    use std::time::Duration;

    fn adapters(models: &[(&str, &str, u64)]) -> HashMap<String, Arc<dyn StreamingAdapter>> {
        models
            .iter()
            .map(|(id, text, latency_ms)| {
                let adapter: Arc<dyn StreamingAdapter> =
                    Arc::new(MockAdapter::new(*id, *text).with_latency(Duration::from_millis(*latency_ms)));
                (id.to_string(), adapter)
            })
            .collect()
    }

    #[tokio::test]
    async fn scenario_a_crossword_scoring() {
        let clue = Clue {
            clue_id: "c1".into(),
            prompt: "Capital of France".into(),
            answer: "paris".into(),
            length: 5,
            allow_hyphen: false,
            case_rule: CaseRule::Lower,
        };
        let round = Round { round_id: "r1".into(), clues: vec![clue], output_rule: OutputRule::Json, max_tokens: 16, time_limit_ms: 4000 };
        let models = vec![
            ModelSpec::new("m1", "M1", "mock:m1"),
            ModelSpec::new("m2", "M2", "mock:m2"),
            ModelSpec::new("m3", "M3", "mock:m3"),
        ];
        let adapters = adapters(&[
            ("m1", r#"{"answer":"paris"}"#, 50),
            ("m2", r#"{"answer":"paris"}"#, 500),
            ("m3", r#"{"answer":"london"}"#, 100),
        ]);

        let config = CrosswordRaceConfig {
            id: "race1".into(),
            name: "Test".into(),
            rounds: vec![round],
            models,
            created_at: Utc::now(),
            speed_bonus_threshold_ms: 250,
            max_concurrent_models: 8,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let result = run(config, adapters, tx, cancel).await;
        drop(rx.close());

        let mut scores: HashMap<String, &ModelScore> = result.model_scores.iter().map(|s| (s.model_id.clone(), s)).collect();
        assert_eq!(scores.remove("m1").unwrap().rank, 1);
        assert_eq!(scores.remove("m2").unwrap().rank, 2);
        assert_eq!(scores.remove("m3").unwrap().rank, 3);

        let m1 = result.model_scores.iter().find(|s| s.model_id == "m1").unwrap();
        assert!((m1.avg_score - 100.0).abs() < 1e-6);
        let m3 = result.model_scores.iter().find(|s| s.model_id == "m3").unwrap();
        assert_eq!(m3.avg_score, 0.0);
    }

    #[tokio::test]
    async fn clues_are_strictly_sequential_and_complete_event_is_last() {
        let clues = vec![
            Clue { clue_id: "c1".into(), prompt: "A".into(), answer: "cat".into(), length: 3, allow_hyphen: false, case_rule: CaseRule::Lower },
            Clue { clue_id: "c2".into(), prompt: "B".into(), answer: "dog".into(), length: 3, allow_hyphen: false, case_rule: CaseRule::Lower },
        ];
        let round = Round { round_id: "r1".into(), clues, output_rule: OutputRule::Plain, max_tokens: 16, time_limit_ms: 4000 };
        let models = vec![ModelSpec::new("m1", "M1", "mock:m1")];
        let adapters = adapters(&[("m1", "cat", 1)]);

        let config = CrosswordRaceConfig {
            id: "race1".into(),
            name: "Test".into(),
            rounds: vec![round],
            models,
            created_at: Utc::now(),
            speed_bonus_threshold_ms: 250,
            max_concurrent_models: 8,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        run(config, adapters, tx, cancel).await;

        let mut saw_complete = false;
        let mut clue_order = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if saw_complete {
                panic!("event after complete: {event:?}");
            }
            match event {
                RaceEvent::Clue { clue_id, .. } => clue_order.push(clue_id),
                RaceEvent::Complete { .. } => saw_complete = true,
                _ => {}
            }
        }
        assert!(saw_complete);
        assert_eq!(clue_order, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[tokio::test]
    async fn round_event_scores_are_round_local_not_cumulative() {
        let round1 = Round {
            round_id: "r1".into(),
            clues: vec![Clue {
                clue_id: "c1".into(),
                prompt: "A".into(),
                answer: "cat".into(),
                length: 3,
                allow_hyphen: false,
                case_rule: CaseRule::Lower,
            }],
            output_rule: OutputRule::Plain,
            max_tokens: 16,
            time_limit_ms: 4000,
        };
        let round2 = Round {
            round_id: "r2".into(),
            clues: vec![Clue {
                clue_id: "c2".into(),
                prompt: "B".into(),
                answer: "dog".into(),
                length: 3,
                allow_hyphen: false,
                case_rule: CaseRule::Lower,
            }],
            output_rule: OutputRule::Plain,
            max_tokens: 16,
            time_limit_ms: 4000,
        };
        let models = vec![ModelSpec::new("m1", "M1", "mock:m1")];
        // Wrong in round 1, correct in round 2: a cumulative tally would still
        // show round 2's score dragged down by round 1's miss.
        let adapters = adapters(&[("m1", "dog", 1)]);

        let config = CrosswordRaceConfig {
            id: "race1".into(),
            name: "Test".into(),
            rounds: vec![round1, round2],
            models,
            created_at: Utc::now(),
            speed_bonus_threshold_ms: 250,
            max_concurrent_models: 8,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        run(config, adapters, tx, cancel).await;

        let mut round_scores = HashMap::new();
        while let Ok(event) = rx.try_recv() {
            if let RaceEvent::Round { round_result } = event {
                let m1 = round_result.model_scores.iter().find(|s| s.model_id == "m1").unwrap().clone();
                round_scores.insert(round_result.round_id, m1);
            }
        }

        let r1 = round_scores.get("r1").unwrap();
        assert_eq!(r1.total_attempts, 1);
        assert_eq!(r1.total_correct, 0);
        assert_eq!(r1.avg_score, 0.0);

        let r2 = round_scores.get("r2").unwrap();
        assert_eq!(r2.total_attempts, 1);
        assert_eq!(r2.total_correct, 1);
        assert!(r2.avg_score > 0.0);
    }
}
