// patternloop-coach/src/session.rs
// ============================================================================
// Module: Coaching Session Loop
// Description: The per-session cooperative controller that consumes frame
//              and audio events, evaluates DirectorPack invariants at 1Hz,
//              fires cooled-down interventions, and resolves their outcomes.
// Purpose: Implement the real-time coaching session controller: bucket a
//          session once at start, throttle frame evaluation to 1fps with
//          oldest-frame-wins semantics, enforce a per-rule cooldown so the
//          same violation does not re-fire every tick, and classify each
//          fired intervention's compliance within a bounded observation
//          window before the session closes.
// Dependencies: patternloop_core::{coaching, director_pack}, tokio
// ============================================================================

//! ## Overview
//! One [`SessionLoop`] owns one live session end to end. It is driven by a
//! `tokio::sync::mpsc::Receiver<InboundEvent>` fed by whatever terminates the
//! client connection (a websocket handler, a test harness, a [`FrameSource`]
//! replay adapter) and an [`crate::evaluator::RuleEvaluator`] that judges a
//! frame against one [`patternloop_core::DnaInvariant`] at a time.
//!
//! At most one frame is evaluated per `min_eval_interval` tick (1 second by
//! default): if a second frame arrives before the tick fires, it is dropped
//! and the first ("oldest") frame already held is kept. Audio measurements
//! are merged into the held frame's measurements at evaluation time so a
//! rule can read both in one call. Only rules whose
//! [`DnaInvariant::is_visual_per_frame`] reports `true` run on this 1Hz
//! tick; `DirectorPack.checkpoints` (elapsed seconds from session start)
//! drive a separate timer that evaluates every invariant — visual or not —
//! against the most recently merged frame regardless of whether a new
//! frame has arrived.
//!
//! A verdict only fires an intervention when it is non-compliant and its
//! confidence is at least [`MIN_INTERVENTION_CONFIDENCE`]. A fired
//! intervention puts its rule into cooldown for `rule_cooldown` and
//! opens a pending outcome that closes after `outcome_window`: if the rule
//! is re-evaluated as compliant before the window closes the outcome is
//! [`Compliance::Complied`], if it is re-evaluated as still violating the
//! outcome is [`Compliance::Violated`] (using the last observed verdict),
//! and if it is never re-evaluated the outcome is [`Compliance::Unknown`].
//! Control-bucket and holdout sessions evaluate rules and record outcomes
//! identically but never reach [`InterventionSink::deliver`], so measurement
//! stays symmetric across the experiment arms.
//!
//! [`FrameSource`]: crate::source::FrameSource

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;

use patternloop_core::CoachingIntervention;
use patternloop_core::CoachingOutcome;
use patternloop_core::CoachingUploadOutcome;
use patternloop_core::Compliance;
use patternloop_core::DirectorPack;
use patternloop_core::DnaInvariant;
use patternloop_core::InterventionId;
use patternloop_core::coaching::CoachingSession;
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio::time::interval;
use tokio::time::sleep_until;

/// The minimum verdict confidence required to fire a `CoachingIntervention`.
pub const MIN_INTERVENTION_CONFIDENCE: f64 = 0.5;

use crate::evaluator::RuleEvaluator;
use crate::events::FrameSample;
use crate::events::InboundEvent;
use crate::sink::InterventionSink;

/// The default rate at which a held frame is handed to the evaluator.
pub const DEFAULT_EVAL_INTERVAL: Duration = Duration::from_secs(1);
/// The default per-rule cooldown after an intervention fires.
pub const DEFAULT_RULE_COOLDOWN: Duration = Duration::from_secs(6);
/// The default window within which a fired intervention's compliance is observed.
pub const DEFAULT_OUTCOME_WINDOW: Duration = Duration::from_secs(10);

/// Static configuration for one [`SessionLoop`] run.
pub struct SessionConfig {
    /// The session being run, already bucketed via [`patternloop_core::assign_session`].
    pub session: CoachingSession,
    /// The invariant set this session is coached against.
    pub director_pack: DirectorPack,
    /// Minimum spacing between evaluated frames.
    pub min_eval_interval: Duration,
    /// Per-rule cooldown after a fired intervention.
    pub rule_cooldown: Duration,
    /// Window within which a fired intervention's re-evaluation resolves its outcome.
    pub outcome_window: Duration,
}

impl SessionConfig {
    /// Builds a session config using the spec's default timing constants.
    #[must_use]
    pub const fn new(session: CoachingSession, director_pack: DirectorPack) -> Self {
        Self {
            session,
            director_pack,
            min_eval_interval: DEFAULT_EVAL_INTERVAL,
            rule_cooldown: DEFAULT_RULE_COOLDOWN,
            outcome_window: DEFAULT_OUTCOME_WINDOW,
        }
    }
}

/// The terminal record of one completed [`SessionLoop::run`] call.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// The session-close record, persisted alongside the session row.
    pub upload_outcome: CoachingUploadOutcome,
    /// Every intervention fired during the session, in fire order.
    pub interventions: Vec<CoachingIntervention>,
    /// The resolved (or timed-out) outcome for every fired intervention.
    pub outcomes: Vec<CoachingOutcome>,
    /// Count of interventions the sink failed to deliver; these still appear
    /// in `interventions` and `outcomes` since evaluation and delivery are
    /// recorded independently.
    pub delivery_failures: u32,
}

/// Tracks one fired intervention awaiting compliance resolution.
struct PendingOutcome {
    /// The intervention awaiting resolution.
    intervention_id: InterventionId,
    /// The rule this outcome tracks.
    rule_id: String,
    /// When the intervention fired.
    fired_at: Instant,
    /// The most recent re-evaluation verdict observed for this rule, if any.
    last_status: Option<bool>,
}

impl PendingOutcome {
    /// Resolves this pending outcome using its last observed verdict.
    fn into_outcome(self, now: Instant) -> CoachingOutcome {
        let latency_sec = now.saturating_duration_since(self.fired_at).as_secs_f64();
        let (compliance, reason) = match self.last_status {
            Some(true) => (Compliance::Complied, None),
            Some(false) => (Compliance::Violated, None),
            None => (Compliance::Unknown, Some("no re-evaluation before window closed".to_string())),
        };
        CoachingOutcome { intervention_id: self.intervention_id, compliance, latency_sec, reason }
    }
}

/// Runs one coaching session to completion.
pub struct SessionLoop<E, S> {
    /// Session-level timing and pack configuration.
    config: SessionConfig,
    /// Collaborator that judges a frame against one invariant.
    evaluator: E,
    /// Destination for delivered coach lines.
    sink: S,
}

impl<E: RuleEvaluator, S: InterventionSink> SessionLoop<E, S> {
    /// Creates a session loop for `config`, evaluating with `evaluator` and
    /// delivering through `sink`.
    pub fn new(config: SessionConfig, evaluator: E, sink: S) -> Self {
        Self { config, evaluator, sink }
    }

    /// Runs the session to completion, consuming `events` until the channel
    /// closes (normal end) or a [`InboundEvent::Cancel`] arrives.
    pub async fn run(&self, mut events: Receiver<InboundEvent>) -> SessionSummary {
        let mut held_frame: Option<FrameSample> = None;
        let mut last_frame: Option<FrameSample> = None;
        let mut latest_audio: BTreeMap<String, f64> = BTreeMap::new();
        let mut cooldowns: HashMap<String, Instant> = HashMap::new();
        let mut pending_outcomes: Vec<PendingOutcome> = Vec::new();
        let mut outcomes: Vec<CoachingOutcome> = Vec::new();
        let mut interventions: Vec<CoachingIntervention> = Vec::new();
        let mut frames_evaluated: u64 = 0;
        let mut delivery_failures: u32 = 0;
        let mut cancelled = false;

        let mut ticker = interval(self.config.min_eval_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let session_start = Instant::now();
        let mut remaining_checkpoints: Vec<Instant> = self
            .config
            .director_pack
            .checkpoints
            .iter()
            .map(|&seconds| session_start + Duration::from_secs(u64::from(seconds)))
            .collect();
        remaining_checkpoints.sort();

        loop {
            let next_checkpoint = async {
                match remaining_checkpoints.first() {
                    Some(&at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                received = events.recv() => {
                    match received {
                        Some(InboundEvent::Frame(frame)) => {
                            if held_frame.is_none() {
                                held_frame = Some(frame);
                            }
                        }
                        Some(InboundEvent::Audio(audio)) => {
                            latest_audio = audio.measurements;
                        }
                        Some(InboundEvent::Cancel) => {
                            cancelled = true;
                            break;
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    self.resolve_expired_outcomes(&mut pending_outcomes, &mut outcomes);
                    if let Some(frame) = held_frame.take() {
                        frames_evaluated += 1;
                        let merged = merge_audio(frame, &latest_audio);
                        self.evaluate_invariants(
                            &merged,
                            self.config.director_pack.dna_invariants.iter().filter(|invariant| invariant.is_visual_per_frame()),
                            &mut cooldowns,
                            &mut pending_outcomes,
                            &mut interventions,
                            &mut delivery_failures,
                        );
                        last_frame = Some(merged);
                    }
                }
                () = next_checkpoint => {
                    let now = Instant::now();
                    remaining_checkpoints.retain(|&at| at > now);
                    self.resolve_expired_outcomes(&mut pending_outcomes, &mut outcomes);
                    if let Some(frame) = &last_frame {
                        self.evaluate_invariants(
                            frame,
                            self.config.director_pack.dna_invariants.iter(),
                            &mut cooldowns,
                            &mut pending_outcomes,
                            &mut interventions,
                            &mut delivery_failures,
                        );
                    }
                }
            }
        }

        let now = Instant::now();
        outcomes.extend(pending_outcomes.into_iter().map(|pending| pending.into_outcome(now)));

        let upload_outcome = CoachingUploadOutcome {
            session_id: self.config.session.session_id.clone(),
            uploaded: !cancelled,
            intervention_count: u32::try_from(interventions.len()).unwrap_or(u32::MAX),
            frames_evaluated,
            cancelled,
        };

        SessionSummary { upload_outcome, interventions, outcomes, delivery_failures }
    }

    /// Evaluates `invariants` against `frame`, recording re-evaluation
    /// status for any rule with a pending outcome and firing a cooled-down,
    /// confidence-gated [`CoachingIntervention`] for each non-compliant one.
    fn evaluate_invariants<'a>(
        &self,
        frame: &FrameSample,
        invariants: impl Iterator<Item = &'a DnaInvariant>,
        cooldowns: &mut HashMap<String, Instant>,
        pending_outcomes: &mut Vec<PendingOutcome>,
        interventions: &mut Vec<CoachingIntervention>,
        delivery_failures: &mut u32,
    ) {
        for invariant in invariants {
            let Ok(verdict) = self.evaluator.evaluate(invariant, frame) else {
                continue;
            };
            for pending in pending_outcomes.iter_mut() {
                if pending.rule_id == invariant.rule_id {
                    pending.last_status = Some(verdict.compliant);
                }
            }
            if verdict.compliant {
                continue;
            }
            if verdict.confidence < MIN_INTERVENTION_CONFIDENCE {
                continue;
            }
            if let Some(&cooled_until) = cooldowns.get(&invariant.rule_id) {
                if Instant::now() < cooled_until {
                    continue;
                }
            }
            let intervention_id = InterventionId::new(format!(
                "intv_{}_{}",
                self.config.session.session_id.as_str(),
                interventions.len() + 1
            ));
            let message = verdict.message.clone().unwrap_or_else(|| format!("{} violated", invariant.rule_id));
            let intervention = CoachingIntervention {
                intervention_id: intervention_id.clone(),
                session_id: self.config.session.session_id.clone(),
                rule_id: invariant.rule_id.clone(),
                confidence: verdict.confidence,
                elapsed_ms: frame.elapsed_ms,
                message,
            };
            if self.config.session.is_coached()
                && self.sink.deliver(&self.config.session.session_id, &intervention).is_err()
            {
                *delivery_failures += 1;
            }
            cooldowns.insert(invariant.rule_id.clone(), Instant::now() + self.config.rule_cooldown);
            pending_outcomes.push(PendingOutcome {
                intervention_id,
                rule_id: invariant.rule_id.clone(),
                fired_at: Instant::now(),
                last_status: None,
            });
            interventions.push(intervention);
        }
    }

    /// Moves every pending outcome whose observation window has closed into `outcomes`.
    fn resolve_expired_outcomes(
        &self,
        pending_outcomes: &mut Vec<PendingOutcome>,
        outcomes: &mut Vec<CoachingOutcome>,
    ) {
        let now = Instant::now();
        let window = self.config.outcome_window;
        let (expired, still_pending): (Vec<_>, Vec<_>) = pending_outcomes
            .drain(..)
            .partition(|pending| now.saturating_duration_since(pending.fired_at) >= window);
        *pending_outcomes = still_pending;
        outcomes.extend(expired.into_iter().map(|pending| pending.into_outcome(now)));
    }
}

/// Returns a copy of `frame` with `audio` measurements merged in, frame keys winning on conflict.
fn merge_audio(mut frame: FrameSample, audio: &BTreeMap<String, f64>) -> FrameSample {
    for (key, value) in audio {
        frame.measurements.entry(key.clone()).or_insert(*value);
    }
    frame
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use patternloop_core::CoachingMode;
    use patternloop_core::DirectorPackId;
    use patternloop_core::DnaInvariant;
    use patternloop_core::InvariantDomain;
    use patternloop_core::PatternLibraryId;
    use patternloop_core::SessionId;
    use patternloop_core::director_pack::Priority;
    use tokio::sync::mpsc;

    use super::*;
    use crate::evaluator::EvaluatorError;
    use crate::evaluator::RuleCompliance;
    use crate::sink::SinkError;

    /// An evaluator whose verdicts are scripted by test cases, keyed by call count.
    struct ScriptedEvaluator {
        verdicts: Mutex<Vec<bool>>,
        confidence: f64,
    }

    impl ScriptedEvaluator {
        fn new(verdicts: Vec<bool>) -> Self {
            Self { verdicts: Mutex::new(verdicts), confidence: 0.9 }
        }

        fn with_confidence(verdicts: Vec<bool>, confidence: f64) -> Self {
            Self { verdicts: Mutex::new(verdicts), confidence }
        }
    }

    impl RuleEvaluator for ScriptedEvaluator {
        fn evaluate(
            &self,
            invariant: &DnaInvariant,
            _sample: &FrameSample,
        ) -> Result<RuleCompliance, EvaluatorError> {
            let mut verdicts = self.verdicts.lock().expect("mutex poisoned");
            let compliant = if verdicts.is_empty() { true } else { verdicts.remove(0) };
            Ok(RuleCompliance {
                compliant,
                confidence: self.confidence,
                message: (!compliant).then(|| format!("{} failing", invariant.rule_id)),
                measured_value: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<String>>,
    }

    impl InterventionSink for RecordingSink {
        fn deliver(
            &self,
            _session_id: &SessionId,
            intervention: &CoachingIntervention,
        ) -> Result<(), SinkError> {
            self.delivered.lock().expect("mutex poisoned").push(intervention.rule_id.clone());
            Ok(())
        }
    }

    fn pack_with_one_rule() -> DirectorPack {
        DirectorPack {
            director_pack_id: DirectorPackId::new("pack_1"),
            dna_invariants: vec![DnaInvariant {
                rule_id: "composition:face_area".to_string(),
                domain: InvariantDomain::Composition,
                metric_id: "visual_face_area_ratio".to_string(),
                priority: Priority::Medium,
                weight: 1.0,
            }],
            mutation_slots: Vec::new(),
            forbidden_mutations: Vec::new(),
            checkpoints: Vec::new(),
            coach_line_templates: Vec::new(),
            runtime_contract: serde_json::json!({}),
        }
    }

    /// A pack with one audio-domain rule, ineligible for per-frame
    /// evaluation, plus a single checkpoint a few milliseconds out.
    fn pack_with_checkpoint_rule(checkpoint_secs: u32) -> DirectorPack {
        DirectorPack {
            director_pack_id: DirectorPackId::new("pack_1"),
            dna_invariants: vec![DnaInvariant {
                rule_id: "audio:hook_word_count".to_string(),
                domain: InvariantDomain::Audio,
                metric_id: "hook_word_count".to_string(),
                priority: Priority::Medium,
                weight: 1.0,
            }],
            mutation_slots: Vec::new(),
            forbidden_mutations: Vec::new(),
            checkpoints: vec![checkpoint_secs],
            coach_line_templates: Vec::new(),
            runtime_contract: serde_json::json!({}),
        }
    }

    /// A pack with one audio-domain rule and no checkpoints at all.
    fn pack_with_audio_rule() -> DirectorPack {
        DirectorPack {
            director_pack_id: DirectorPackId::new("pack_1"),
            dna_invariants: vec![DnaInvariant {
                rule_id: "audio:hook_word_count".to_string(),
                domain: InvariantDomain::Audio,
                metric_id: "hook_word_count".to_string(),
                priority: Priority::Medium,
                weight: 1.0,
            }],
            mutation_slots: Vec::new(),
            forbidden_mutations: Vec::new(),
            checkpoints: Vec::new(),
            coach_line_templates: Vec::new(),
            runtime_contract: serde_json::json!({}),
        }
    }

    fn coached_session() -> CoachingSession {
        // "sess_coached" hashes outside the control/holdout carve-outs.
        CoachingSession::start(
            SessionId::new("sess_coached"),
            "hash".to_string(),
            CoachingMode::Homage,
            PatternLibraryId::new("pattern_1"),
            "pack_hash".to_string(),
            DirectorPackId::new("pack_1"),
        )
    }

    fn frame_event(index: u64, elapsed_ms: u64) -> InboundEvent {
        let mut measurements = BTreeMap::new();
        measurements.insert("face_area_ratio".to_string(), 0.05);
        InboundEvent::Frame(FrameSample {
            session_id: SessionId::new("sess_coached"),
            elapsed_ms,
            frame_index: index,
            measurements,
        })
    }

    /// Test-only timing: short enough to run fast, long enough that the
    /// sender task's sleep reliably lands after at least one tick.
    fn fast_config(session: CoachingSession, director_pack: DirectorPack) -> SessionConfig {
        SessionConfig {
            session,
            director_pack,
            min_eval_interval: Duration::from_millis(15),
            rule_cooldown: Duration::from_millis(50),
            outcome_window: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn violating_frame_fires_a_delivered_intervention_for_a_coached_session() {
        let config = fast_config(coached_session(), pack_with_one_rule());
        let evaluator = ScriptedEvaluator::new(vec![false]);
        let sink = Arc::new(RecordingSink::default());
        let session = SessionLoop::new(config, evaluator, sink.clone());

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send(frame_event(0, 0)).await.expect("send");
            tokio::time::sleep(Duration::from_millis(40)).await;
            drop(tx);
        });

        let summary = session.run(rx).await;

        assert_eq!(summary.interventions.len(), 1);
        assert_eq!(sink.delivered.lock().expect("mutex poisoned").len(), 1);
        assert_eq!(summary.upload_outcome.frames_evaluated, 1);
        assert!(!summary.upload_outcome.cancelled);
    }

    #[tokio::test]
    async fn cancel_event_marks_the_session_cancelled() {
        let config = fast_config(coached_session(), pack_with_one_rule());
        let evaluator = ScriptedEvaluator::new(Vec::new());
        let sink = Arc::new(RecordingSink::default());
        let session = SessionLoop::new(config, evaluator, sink);

        let (tx, rx) = mpsc::channel(8);
        tx.send(InboundEvent::Cancel).await.expect("send");
        drop(tx);

        let summary = session.run(rx).await;

        assert!(summary.upload_outcome.cancelled);
        assert!(!summary.upload_outcome.uploaded);
    }

    #[tokio::test]
    async fn second_frame_in_the_same_window_is_dropped_oldest_frame_wins() {
        let config = fast_config(coached_session(), pack_with_one_rule());
        let evaluator = ScriptedEvaluator::new(Vec::new());
        let sink = Arc::new(RecordingSink::default());
        let session = SessionLoop::new(config, evaluator, sink);

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send(frame_event(0, 0)).await.expect("send");
            tx.send(frame_event(1, 10)).await.expect("send");
            tokio::time::sleep(Duration::from_millis(40)).await;
            drop(tx);
        });

        let summary = session.run(rx).await;

        assert_eq!(summary.upload_outcome.frames_evaluated, 1);
    }

    #[tokio::test]
    async fn non_visual_domain_rule_is_not_evaluated_on_the_per_frame_tick() {
        let config = fast_config(coached_session(), pack_with_audio_rule());
        let evaluator = ScriptedEvaluator::new(vec![false, false, false]);
        let sink = Arc::new(RecordingSink::default());
        let session = SessionLoop::new(config, evaluator, sink.clone());

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send(frame_event(0, 0)).await.expect("send");
            tokio::time::sleep(Duration::from_millis(40)).await;
            drop(tx);
        });

        let summary = session.run(rx).await;

        assert!(summary.interventions.is_empty());
        assert!(sink.delivered.lock().expect("mutex poisoned").is_empty());
        assert_eq!(summary.upload_outcome.frames_evaluated, 1);
    }

    #[tokio::test]
    async fn low_confidence_violation_does_not_fire_an_intervention() {
        let config = fast_config(coached_session(), pack_with_one_rule());
        let evaluator = ScriptedEvaluator::with_confidence(vec![false], 0.3);
        let sink = Arc::new(RecordingSink::default());
        let session = SessionLoop::new(config, evaluator, sink.clone());

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send(frame_event(0, 0)).await.expect("send");
            tokio::time::sleep(Duration::from_millis(40)).await;
            drop(tx);
        });

        let summary = session.run(rx).await;

        assert!(summary.interventions.is_empty());
        assert!(sink.delivered.lock().expect("mutex poisoned").is_empty());
    }

    #[tokio::test]
    async fn checkpoint_fires_independent_of_frames_and_evaluates_non_visual_rules() {
        let mut config = fast_config(coached_session(), pack_with_checkpoint_rule(1));
        config.min_eval_interval = Duration::from_millis(15);
        let evaluator = ScriptedEvaluator::new(vec![false]);
        let sink = Arc::new(RecordingSink::default());
        let session = SessionLoop::new(config, evaluator, sink.clone());

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            tx.send(frame_event(0, 0)).await.expect("send");
            tokio::time::sleep(Duration::from_millis(1100)).await;
            drop(tx);
        });

        let summary = session.run(rx).await;

        assert_eq!(summary.interventions.len(), 1);
        assert_eq!(summary.interventions[0].rule_id, "audio:hook_word_count");
        assert_eq!(sink.delivered.lock().expect("mutex poisoned").len(), 1);
    }
}
