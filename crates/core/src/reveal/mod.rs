//! Character-by-character reveal of an ordered list of content units.
//!
//! The sequencer is a small state machine driven by a single kind of tick.
//! At most one step is pending at any time, and every step lives in the
//! sequencer's own [`Scheduler`], so [`RevealSequencer::cancel`] leaves
//! nothing behind that could fire into a later run.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timeline::{Millis, Scheduler};

/// Presentation hint carried with a unit. The sequencer never interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleHint {
    #[default]
    Body,
    Headline,
    Emphasis,
    Signature,
}

/// One line or block of text revealed by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub text: String,
    /// Explicit hold for this unit; falls back to the run's [`HoldPolicy`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_ms: Option<Millis>,
    #[serde(default)]
    pub style: StyleHint,
}

impl ContentUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hold_ms: None,
            style: StyleHint::Body,
        }
    }

    pub fn with_hold(mut self, hold_ms: Millis) -> Self {
        self.hold_ms = Some(hold_ms);
        self
    }

    pub fn with_style(mut self, style: StyleHint) -> Self {
        self.style = style;
        self
    }
}

/// Position of a unit within its sequence, used to select hold overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitPosition {
    First,
    /// The unit immediately before the last one.
    Penultimate,
    Last,
    Index(usize),
}

impl UnitPosition {
    fn matches(self, index: usize, len: usize) -> bool {
        match self {
            UnitPosition::First => index == 0,
            UnitPosition::Penultimate => len >= 2 && index == len - 2,
            UnitPosition::Last => len >= 1 && index == len - 1,
            UnitPosition::Index(target) => index == target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldOverride {
    pub position: UnitPosition,
    pub hold_ms: Millis,
}

impl HoldOverride {
    pub fn new(position: UnitPosition, hold_ms: Millis) -> Self {
        Self { position, hold_ms }
    }
}

/// How long each unit stays on screen once fully revealed.
///
/// Overrides are checked in order and the first matching one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldPolicy {
    pub default_ms: Millis,
    #[serde(default)]
    pub overrides: Vec<HoldOverride>,
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self::uniform(2_500)
    }
}

impl HoldPolicy {
    pub fn uniform(hold_ms: Millis) -> Self {
        Self {
            default_ms: hold_ms,
            overrides: Vec::new(),
        }
    }

    pub fn hold_for(&self, index: usize, len: usize) -> Millis {
        self.overrides
            .iter()
            .find(|rule| rule.position.matches(index, len))
            .map(|rule| rule.hold_ms)
            .unwrap_or(self.default_ms)
    }
}

/// Everything a sequencer needs for one run.
#[derive(Debug, Clone)]
pub struct RevealPlan {
    pub units: Vec<ContentUnit>,
    pub char_interval_ms: Millis,
    pub holds: HoldPolicy,
    pub lead_in_ms: Millis,
}

impl RevealPlan {
    pub fn new(units: Vec<ContentUnit>, char_interval_ms: Millis, holds: HoldPolicy) -> Self {
        Self {
            units,
            char_interval_ms,
            holds,
            lead_in_ms: 0,
        }
    }

    pub fn with_lead_in(mut self, lead_in_ms: Millis) -> Self {
        self.lead_in_ms = lead_in_ms;
        self
    }
}

/// Observable progress of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RevealEvent {
    UnitStarted { index: usize },
    CharacterRevealed { index: usize, revealed: usize },
    HoldStarted { index: usize, revealed: usize, hold_ms: Millis },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Begin,
    Character,
    EndHold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug)]
pub struct RevealSequencer {
    plan: Option<RevealPlan>,
    char_counts: Vec<usize>,
    cursor: Option<usize>,
    revealed: usize,
    status: RevealStatus,
    steps: Scheduler<Step>,
}

impl Default for RevealSequencer {
    fn default() -> Self {
        Self {
            plan: None,
            char_counts: Vec::new(),
            cursor: None,
            revealed: 0,
            status: RevealStatus::Idle,
            steps: Scheduler::new(),
        }
    }
}

impl RevealSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run, cancelling whatever run was in progress.
    ///
    /// An empty plan completes immediately and the returned events contain
    /// the single [`RevealEvent::Completed`].
    pub fn start(&mut self, plan: RevealPlan, now: Millis) -> Vec<RevealEvent> {
        let dropped = self.steps.cancel_all();
        if dropped > 0 {
            debug!(dropped, "restarting reveal mid-run");
        }

        self.char_counts = plan.units.iter().map(|unit| unit.text.chars().count()).collect();
        self.cursor = None;
        self.revealed = 0;
        self.status = RevealStatus::Running;

        let lead_in = plan.lead_in_ms;
        let empty = plan.units.is_empty();
        self.plan = Some(plan);

        let mut events = Vec::new();
        if empty {
            self.status = RevealStatus::Completed;
            events.push(RevealEvent::Completed);
        } else if lead_in > 0 {
            self.steps.schedule(now, lead_in, Step::Begin);
        } else {
            self.enter_unit(0, now, &mut events);
        }
        events
    }

    /// Cancels every outstanding step. Safe to call repeatedly.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.steps.cancel_all();
        if self.status == RevealStatus::Running {
            self.status = RevealStatus::Cancelled;
        }
        dropped
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.steps.next_due()
    }

    /// Fires the earliest step due at `now`, if any.
    pub fn fire_next(&mut self, now: Millis) -> Vec<RevealEvent> {
        let mut events = Vec::new();
        let Some(step) = self.steps.pop_due(now) else {
            return events;
        };

        match step.payload {
            Step::Begin => self.enter_unit(0, step.due_ms, &mut events),
            Step::Character => self.reveal_character(step.due_ms, &mut events),
            Step::EndHold => self.finish_hold(step.due_ms, &mut events),
        }
        events
    }

    pub fn status(&self) -> RevealStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RevealStatus::Running
    }

    /// Index of the unit being revealed, `None` before the first unit.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn revealed_prefix_len(&self) -> usize {
        self.revealed
    }

    pub fn unit_count(&self) -> usize {
        self.char_counts.len()
    }

    /// The revealed prefix of the current unit.
    pub fn display_text(&self) -> &str {
        let (Some(plan), Some(index)) = (self.plan.as_ref(), self.cursor) else {
            return "";
        };
        let Some(unit) = plan.units.get(index) else {
            return "";
        };
        let end = unit
            .text
            .char_indices()
            .nth(self.revealed)
            .map(|(offset, _)| offset)
            .unwrap_or(unit.text.len());
        &unit.text[..end]
    }

    pub fn current_unit(&self) -> Option<&ContentUnit> {
        self.plan.as_ref()?.units.get(self.cursor?)
    }

    pub fn pending_timers(&self) -> usize {
        self.steps.pending()
    }

    fn enter_unit(&mut self, index: usize, now: Millis, events: &mut Vec<RevealEvent>) {
        self.cursor = Some(index);
        self.revealed = 0;
        events.push(RevealEvent::UnitStarted { index });

        if self.char_counts.get(index).copied().unwrap_or(0) == 0 {
            self.begin_hold(index, now, events);
        } else {
            let interval = self.char_interval();
            self.steps.schedule(now, interval, Step::Character);
        }
    }

    fn reveal_character(&mut self, now: Millis, events: &mut Vec<RevealEvent>) {
        let Some(index) = self.cursor else {
            return;
        };
        let total = self.char_counts.get(index).copied().unwrap_or(0);
        self.revealed = (self.revealed + 1).min(total);
        events.push(RevealEvent::CharacterRevealed {
            index,
            revealed: self.revealed,
        });

        if self.revealed >= total {
            self.begin_hold(index, now, events);
        } else {
            let interval = self.char_interval();
            self.steps.schedule(now, interval, Step::Character);
        }
    }

    fn begin_hold(&mut self, index: usize, now: Millis, events: &mut Vec<RevealEvent>) {
        let hold_ms = self.hold_for(index);
        events.push(RevealEvent::HoldStarted {
            index,
            revealed: self.revealed,
            hold_ms,
        });
        self.steps.schedule(now, hold_ms, Step::EndHold);
    }

    fn finish_hold(&mut self, now: Millis, events: &mut Vec<RevealEvent>) {
        let Some(index) = self.cursor else {
            return;
        };
        let next = index + 1;
        if next < self.char_counts.len() {
            self.enter_unit(next, now, events);
        } else {
            self.status = RevealStatus::Completed;
            events.push(RevealEvent::Completed);
        }
    }

    fn char_interval(&self) -> Millis {
        self.plan.as_ref().map(|plan| plan.char_interval_ms).unwrap_or(0)
    }

    fn hold_for(&self, index: usize) -> Millis {
        let Some(plan) = self.plan.as_ref() else {
            return 0;
        };
        plan.units
            .get(index)
            .and_then(|unit| unit.hold_ms)
            .unwrap_or_else(|| plan.holds.hold_for(index, plan.units.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fires every step due up to `until`, in time order.
    fn run_until(seq: &mut RevealSequencer, until: Millis) -> Vec<(Millis, RevealEvent)> {
        let mut log = Vec::new();
        while let Some(due) = seq.next_due() {
            if due > until {
                break;
            }
            for event in seq.fire_next(due) {
                log.push((due, event));
            }
        }
        log
    }

    fn completions(log: &[(Millis, RevealEvent)]) -> usize {
        log.iter()
            .filter(|(_, event)| *event == RevealEvent::Completed)
            .count()
    }

    fn plan(texts: &[&str], holds: &[Millis]) -> RevealPlan {
        let units = texts
            .iter()
            .zip(holds)
            .map(|(text, hold)| ContentUnit::new(*text).with_hold(*hold))
            .collect();
        RevealPlan::new(units, 80, HoldPolicy::default())
    }

    #[test]
    fn three_units_complete_once_at_exact_total() {
        let texts = ["Hello", "there", "friend!"];
        let holds = [2_000, 2_500, 2_000];
        let mut seq = RevealSequencer::new();
        assert_eq!(
            seq.start(plan(&texts, &holds), 0),
            vec![RevealEvent::UnitStarted { index: 0 }]
        );

        let total: Millis = texts
            .iter()
            .zip(holds)
            .map(|(text, hold)| text.chars().count() as Millis * 80 + hold)
            .sum();

        let early = run_until(&mut seq, total - 1);
        assert_eq!(completions(&early), 0);

        let rest = run_until(&mut seq, total);
        assert_eq!(completions(&rest), 1);
        assert_eq!(rest.last().map(|(at, _)| *at), Some(total));

        let holds_started: Vec<(usize, usize)> = early
            .iter()
            .filter_map(|(_, event)| match event {
                RevealEvent::HoldStarted { index, revealed, .. } => Some((*index, *revealed)),
                _ => None,
            })
            .collect();
        assert_eq!(holds_started, vec![(0, 5), (1, 5), (2, 7)]);
        assert_eq!(seq.status(), RevealStatus::Completed);
        assert_eq!(seq.pending_timers(), 0);
    }

    #[test]
    fn every_length_completes_exactly_once() {
        for n in 0..6 {
            let texts: Vec<String> = (0..n).map(|i| "x".repeat(i)).collect();
            let units = texts.iter().map(ContentUnit::new).collect();
            let mut seq = RevealSequencer::new();
            let mut log: Vec<(Millis, RevealEvent)> = seq
                .start(RevealPlan::new(units, 10, HoldPolicy::uniform(100)), 0)
                .into_iter()
                .map(|event| (0, event))
                .collect();
            log.extend(run_until(&mut seq, Millis::MAX));

            assert_eq!(completions(&log), 1, "length {n}");
            let held = log
                .iter()
                .filter(|(_, event)| matches!(event, RevealEvent::HoldStarted { .. }))
                .count();
            assert_eq!(held, n);
        }
    }

    #[test]
    fn cancel_mid_run_drops_every_step() {
        for cut in [0, 40, 85, 400, 2_430] {
            let mut seq = RevealSequencer::new();
            seq.start(plan(&["abcde", "fgh"], &[2_000, 2_000]), 0);
            run_until(&mut seq, cut);

            seq.cancel();
            assert_eq!(seq.pending_timers(), 0);
            assert_eq!(seq.status(), RevealStatus::Cancelled);
            assert!(run_until(&mut seq, Millis::MAX).is_empty());
        }
    }

    #[test]
    fn restart_replaces_previous_run() {
        let mut seq = RevealSequencer::new();
        seq.start(plan(&["first run"], &[1_000]), 0);
        run_until(&mut seq, 200);

        seq.start(plan(&["ab"], &[100]), 200);
        assert_eq!(seq.pending_timers(), 1);
        let log = run_until(&mut seq, Millis::MAX);

        assert_eq!(completions(&log), 1);
        assert_eq!(log.last().map(|(at, _)| *at), Some(200 + 160 + 100));
    }

    #[test]
    fn empty_unit_still_holds() {
        let mut seq = RevealSequencer::new();
        let events = seq.start(plan(&["", "a"], &[500, 100]), 0);
        assert_eq!(
            events,
            vec![
                RevealEvent::UnitStarted { index: 0 },
                RevealEvent::HoldStarted {
                    index: 0,
                    revealed: 0,
                    hold_ms: 500
                },
            ]
        );
        let log = run_until(&mut seq, Millis::MAX);
        assert_eq!(log.last().map(|(at, _)| *at), Some(500 + 80 + 100));
    }

    #[test]
    fn display_text_grows_by_characters() {
        let mut seq = RevealSequencer::new();
        seq.start(RevealPlan::new(vec![ContentUnit::new("héllo")], 80, HoldPolicy::uniform(10)), 0);
        assert_eq!(seq.display_text(), "");

        run_until(&mut seq, 160);
        assert_eq!(seq.revealed_prefix_len(), 2);
        assert_eq!(seq.display_text(), "hé");

        run_until(&mut seq, 400);
        assert_eq!(seq.display_text(), "héllo");
    }

    #[test]
    fn lead_in_defers_first_unit() {
        let mut seq = RevealSequencer::new();
        let plan = RevealPlan::new(vec![ContentUnit::new("a")], 100, HoldPolicy::uniform(0))
            .with_lead_in(1_000);
        assert!(seq.start(plan, 0).is_empty());
        assert_eq!(seq.cursor(), None);
        assert_eq!(seq.next_due(), Some(1_000));

        let log = run_until(&mut seq, Millis::MAX);
        assert_eq!(log.first(), Some(&(1_000, RevealEvent::UnitStarted { index: 0 })));
        assert_eq!(log.last(), Some(&(1_100, RevealEvent::Completed)));
    }

    #[test]
    fn hold_policy_resolves_positions_in_order() {
        let policy = HoldPolicy {
            default_ms: 2_500,
            overrides: vec![
                HoldOverride::new(UnitPosition::First, 2_000),
                HoldOverride::new(UnitPosition::Penultimate, 3_000),
                HoldOverride::new(UnitPosition::Last, 2_100),
            ],
        };
        let holds: Vec<Millis> = (0..5).map(|index| policy.hold_for(index, 5)).collect();
        assert_eq!(holds, vec![2_000, 2_500, 2_500, 3_000, 2_100]);
        assert_eq!(policy.hold_for(0, 1), 2_000);
        assert_eq!(policy.hold_for(1, 2), 2_100);
    }
}
