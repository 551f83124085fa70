//! Race Engine — Wordle mode (C5b, spec §4.5).
//!
//! Grounded on the same spawn/join/aggregate shape as [`super::crossword`],
//! but here each model's six-turn game is its own independent task: fully
//! parallel across models, strictly sequential within a model's own guesses
//! (spec §5). `race_state`/`model_states` are shared behind a `Mutex` rather
//! than owned by one task, since N model tasks each mutate their own slice of
//! the composite state concurrently — the per-model exclusivity spec §5
//! requires still holds, only the snapshot-for-emission step needs the lock.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::adapter::StreamingAdapter;
use crate::model_spec::ModelSpec;
use crate::race::events::{
    PuzzleConfigView, RaceConfigView, RaceEvent, RaceResultView, WordleRaceResult, WordleStateView,
};
use crate::race::{AttemptErrorKind, RaceState, RaceStatus};
use crate::runner::{run_attempt, AttemptOptions, ChannelProgressSink};
use crate::wordle::feedback::{self, LetterFeedback};
use crate::wordle::{self, WordleGameState, WordleGuess, WordleModelResult, MAX_GUESSES, WORD_LENGTH};

pub struct WordleRaceConfig {
    pub id: String,
    pub name: String,
    pub models: Vec<ModelSpec>,
    pub target_word: String,
    pub include_user: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub max_output_tokens: u32,
    pub timeout_ms: u64,
}

/// Runs a full Wordle race to completion, emitting events as it goes.
/// Returns the final [`WordleRaceResult`] (also emitted as the last
/// `complete` event).
pub async fn run(
    config: WordleRaceConfig,
    adapters: HashMap<String, Arc<dyn StreamingAdapter>>,
    events: mpsc::UnboundedSender<RaceEvent>,
    session_cancel: CancellationToken,
) -> WordleRaceResult {
    let race_start = Instant::now();
    let total_guesses = config.models.len() as u32 * MAX_GUESSES as u32;
    let race_state = Arc::new(Mutex::new(RaceState::new_pending(total_guesses)));
    let model_states: Arc<Mutex<HashMap<String, WordleGameState>>> = Arc::new(Mutex::new(
        config.models.iter().map(|m| (m.id.clone(), WordleGameState::default())).collect(),
    ));

    let _ = events.send(RaceEvent::Config {
        config: RaceConfigView {
            id: config.id.clone(),
            name: config.name.clone(),
            models: config.models.clone(),
            puzzle: PuzzleConfigView::Wordle {
                word_length: WORD_LENGTH as u8,
                max_guesses: MAX_GUESSES,
                target_word: if config.include_user { Some(config.target_word.clone()) } else { None },
            },
            created_at: config.created_at,
        },
    });

    {
        let mut s = race_state.lock().await;
        s.status = RaceStatus::Running;
        s.started_at = Some(Utc::now());
    }
    emit_state(&events, &race_state, &model_states).await;

    let target = config.target_word.clone();
    let mut handles = Vec::with_capacity(config.models.len());
    for model in &config.models {
        let Some(adapter) = adapters.get(&model.id).cloned() else { continue };
        let model = model.clone();
        let target = target.clone();
        let events = events.clone();
        let session_cancel = session_cancel.clone();
        let race_state = race_state.clone();
        let model_states = model_states.clone();
        let max_output_tokens = config.max_output_tokens;
        let timeout_ms = config.timeout_ms;

        handles.push(tokio::spawn(async move {
            let game = run_model_game(
                &model,
                &target,
                max_output_tokens,
                timeout_ms,
                adapter.as_ref(),
                &events,
                &session_cancel,
                race_start,
                &race_state,
                &model_states,
            )
            .await;
            (model.id.clone(), game)
        }));
    }

    let mut final_states: HashMap<String, WordleGameState> = HashMap::new();
    for handle in handles {
        if let Ok((model_id, game_state)) = handle.await {
            let _ = events.send(RaceEvent::ModelComplete { model_id: model_id.clone(), game_state: game_state.clone() });
            final_states.insert(model_id, game_state);
        }
    }
    // A model with no adapter registered never ran at all; it still needs an
    // honest (unsolved, did-not-finish) entry so the leaderboard accounts
    // for every model the caller asked to race, per spec §7's "leaderboard
    // honestly shows zero-score models".
    for model in &config.models {
        final_states.entry(model.id.clone()).or_insert_with(|| {
            let mut gs = WordleGameState::default();
            gs.did_not_finish = true;
            gs
        });
    }

    let model_results = rank_wordle(&config.models, &final_states);
    let winner = model_results.iter().find(|r| r.rank == 1 && r.solved).map(|r| r.model_id.clone());

    {
        let mut s = race_state.lock().await;
        s.status = RaceStatus::Completed;
        s.completed_at = Some(Utc::now());
    }
    emit_state(&events, &race_state, &model_states).await;

    let result = WordleRaceResult {
        race_id: config.id.clone(),
        target_word: config.target_word.clone(),
        winner,
        model_results,
    };
    let _ = events.send(RaceEvent::Complete { result: RaceResultView::Wordle(result.clone()) });
    result
}

/// Drives one model's independent six-turn game. Guesses within a model are
/// strictly sequential (spec §5); cancellation (timeout is per-attempt, not
/// per-game) freezes the game with `did_not_finish = true` rather than
/// `failed`, per spec §4.5's early-termination rule.
#[allow(clippy::too_many_arguments)]
async fn run_model_game(
    model: &ModelSpec,
    target: &str,
    max_output_tokens: u32,
    timeout_ms: u64,
    adapter: &dyn StreamingAdapter,
    events: &mpsc::UnboundedSender<RaceEvent>,
    session_cancel: &CancellationToken,
    race_start: Instant,
    race_state: &Arc<Mutex<RaceState>>,
    model_states: &Arc<Mutex<HashMap<String, WordleGameState>>>,
) -> WordleGameState {
    let mut game = WordleGameState::default();
    let opts = AttemptOptions::wordle_guess(max_output_tokens, timeout_ms);

    while game.guesses.len() < MAX_GUESSES as usize {
        if session_cancel.is_cancelled() {
            game.did_not_finish = true;
            break;
        }

        let guess_index = game.guesses.len() as u8;
        let prompt = wordle::prompt::render(&game, model.custom_prompt_template.as_deref());

        let _ = events.send(RaceEvent::ModelStart { model_id: model.id.clone(), guess_index: Some(guess_index) });
        let mut sink = ChannelProgressSink::new(model.id.clone(), Some(guess_index), events.clone());
        let attempt = run_attempt(model, None, &prompt, &opts, adapter, &mut sink, session_cancel, race_start).await;
        let was_cancelled = matches!(attempt.error, Some(AttemptErrorKind::Cancelled));

        let word = wordle::parse_guess(&attempt.output);
        let fb = feedback::feedback_str(&word, target).expect("parse_guess always yields 5 ascii letters");

        let wg = WordleGuess { attempt, word: word.clone(), feedback: fb, guess_index };
        let _ = events.send(RaceEvent::Guess { guess: wg.clone() });
        game.guesses.push(wg);

        publish_state(race_state, model_states, &model.id, &game).await;
        emit_state(events, race_state, model_states).await;

        if word == target {
            game.solved = true;
            game.solved_at_guess = Some(guess_index + 1);
            game.time_to_solve_ms = Some(game.guesses.iter().map(|g| g.attempt.e2e_ms).sum());
            break;
        }
        if was_cancelled {
            game.did_not_finish = true;
            break;
        }
        if game.guesses.len() == MAX_GUESSES as usize {
            game.failed = true;
            break;
        }
    }

    publish_state(race_state, model_states, &model.id, &game).await;
    game
}

async fn publish_state(
    race_state: &Arc<Mutex<RaceState>>,
    model_states: &Arc<Mutex<HashMap<String, WordleGameState>>>,
    model_id: &str,
    game: &WordleGameState,
) {
    {
        let mut states = model_states.lock().await;
        states.insert(model_id.to_string(), game.clone());
    }
    let mut s = race_state.lock().await;
    s.completed_clues += 1;
    s.recompute_progress();
}

async fn emit_state(
    events: &mpsc::UnboundedSender<RaceEvent>,
    race_state: &Arc<Mutex<RaceState>>,
    model_states: &Arc<Mutex<HashMap<String, WordleGameState>>>,
) {
    let s = race_state.lock().await.clone();
    let models = model_states.lock().await.clone();
    let _ = events.send(RaceEvent::State {
        state: crate::race::events::StateView::Wordle(WordleStateView {
            status: s.status,
            started_at: s.started_at,
            completed_at: s.completed_at,
            model_states: models,
        }),
    });
}

/// Final Wordle ranking (spec §4.5): solved ahead of unsolved; within
/// solved, fewer guesses then faster `time_to_solve_ms`; within unsolved,
/// higher closeness then more guesses made. Ties broken by `model_id` for a
/// deterministic bijection onto `{1,...,N}`.
fn rank_wordle(models: &[ModelSpec], states: &HashMap<String, WordleGameState>) -> Vec<WordleModelResult> {
    struct Standing {
        model_id: String,
        gs: WordleGameState,
    }

    let mut standings: Vec<Standing> = models
        .iter()
        .map(|m| Standing { model_id: m.id.clone(), gs: states.get(&m.id).cloned().unwrap_or_default() })
        .collect();

    standings.sort_by(|a, b| cmp_standing(&a.gs, &b.gs).then_with(|| a.model_id.cmp(&b.model_id)));

    standings
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let gs = s.gs;
            let last_fb = gs.last_feedback();
            let correct_letters =
                last_fb.map(|f| f.iter().filter(|x| **x == LetterFeedback::Correct).count() as u32);
            let present_letters =
                last_fb.map(|f| f.iter().filter(|x| **x == LetterFeedback::Present).count() as u32);
            let any_usage = gs.guesses.iter().any(|g| g.attempt.token_usage.is_some());
            let total_tokens = any_usage
                .then(|| gs.guesses.iter().filter_map(|g| g.attempt.token_usage.map(|u| u.total_tokens)).sum());

            WordleModelResult {
                model_id: s.model_id,
                solved: gs.solved,
                guess_count: gs.guesses.len() as u8,
                time_to_solve_ms: gs.time_to_solve_ms,
                closeness_score: if gs.solved { None } else { Some(gs.closeness()) },
                correct_letters: if gs.solved { None } else { correct_letters },
                present_letters: if gs.solved { None } else { present_letters },
                total_tokens,
                total_cost: None,
                did_not_finish: gs.did_not_finish,
                rank: (i + 1) as u32,
            }
        })
        .collect()
}

fn cmp_standing(a: &WordleGameState, b: &WordleGameState) -> Ordering {
    match (a.solved, b.solved) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a
            .guesses
            .len()
            .cmp(&b.guesses.len())
            .then_with(|| a.time_to_solve_ms.unwrap_or(u64::MAX).cmp(&b.time_to_solve_ms.unwrap_or(u64::MAX))),
        (false, false) => b.closeness().cmp(&a.closeness()).then_with(|| b.guesses.len().cmp(&a.guesses.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;
    use std::time::Duration;

    fn adapters(models: &[(&str, &str)]) -> HashMap<String, Arc<dyn StreamingAdapter>> {
        models
            .iter()
            .map(|(id, text)| {
                let adapter: Arc<dyn StreamingAdapter> = Arc::new(MockAdapter::new(*id, *text));
                (id.to_string(), adapter)
            })
            .collect()
    }

    fn config(models: Vec<ModelSpec>, target: &str) -> WordleRaceConfig {
        WordleRaceConfig {
            id: "race1".into(),
            name: "Test".into(),
            models,
            target_word: target.to_string(),
            include_user: false,
            created_at: Utc::now(),
            max_output_tokens: 10,
            timeout_ms: 2000,
        }
    }

    #[tokio::test]
    async fn solves_in_one_guess_when_model_answers_the_target() {
        let model = ModelSpec::new("m1", "M1", "mock:m1");
        let adapters = adapters(&[("m1", "slate")]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let result = run(config(vec![model], "slate"), adapters, tx, cancel).await;
        drop(rx.close());

        let m1 = &result.model_results[0];
        assert!(m1.solved);
        assert_eq!(m1.guess_count, 1);
        assert_eq!(m1.rank, 1);
        assert_eq!(result.winner.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn unsolved_game_fails_after_six_guesses() {
        let model = ModelSpec::new("m1", "M1", "mock:m1");
        let adapters = adapters(&[("m1", "zzzzz")]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let result = run(config(vec![model], "crane"), adapters, tx, cancel).await;
        drop(rx.close());

        let m1 = &result.model_results[0];
        assert!(!m1.solved);
        assert_eq!(m1.guess_count, 6);
        assert!(!m1.did_not_finish);
        assert!(result.winner.is_none());
    }

    #[tokio::test]
    async fn scenario_f_end_early_marks_did_not_finish() {
        let fast = ModelSpec::new("fast", "Fast", "mock:fast");
        let slow = ModelSpec::new("slow", "Slow", "mock:slow");

        let mut adapters: HashMap<String, Arc<dyn StreamingAdapter>> = HashMap::new();
        adapters.insert("fast".to_string(), Arc::new(MockAdapter::new("fast", "crane")));
        adapters.insert(
            "slow".to_string(),
            Arc::new(MockAdapter::new("slow", "cigar").hanging().with_latency(Duration::from_millis(5))),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            cancel2.cancel();
        });
        let result = run(config(vec![fast, slow], "crane"), adapters, tx, cancel).await;
        drop(rx.close());

        let fast_res = result.model_results.iter().find(|r| r.model_id == "fast").unwrap();
        let slow_res = result.model_results.iter().find(|r| r.model_id == "slow").unwrap();
        assert!(fast_res.solved);
        assert!(slow_res.did_not_finish);
        assert_eq!(result.winner.as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn model_with_no_registered_adapter_counts_as_did_not_finish() {
        let present = ModelSpec::new("present", "Present", "mock:present");
        let missing = ModelSpec::new("missing", "Missing", "mock:missing");
        let adapters = adapters(&[("present", "crane")]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let result = run(config(vec![present, missing], "crane"), adapters, tx, cancel).await;
        drop(rx.close());

        let missing_res = result.model_results.iter().find(|r| r.model_id == "missing").unwrap();
        assert!(missing_res.did_not_finish);
        assert!(!missing_res.solved);
    }
}
