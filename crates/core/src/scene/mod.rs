use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::timeline::{Millis, Scheduler, TimerId};

/// Identifier of a branch path chosen by the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(String);

impl PathId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One discrete phase of the show.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scene", content = "path", rename_all = "kebab-case")]
pub enum Scene {
    Loading,
    Intro,
    Transition,
    BranchChoice,
    BranchContent(PathId),
    Finale,
    Ending,
}

impl Scene {
    pub fn initial() -> Self {
        Scene::Loading
    }

    /// Terminal scenes only leave through a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Scene::Ending)
    }

    pub fn accepts_gestures(&self) -> bool {
        matches!(self, Scene::BranchChoice | Scene::Ending)
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scene::Loading => f.write_str("loading"),
            Scene::Intro => f.write_str("intro"),
            Scene::Transition => f.write_str("transition"),
            Scene::BranchChoice => f.write_str("branch-choice"),
            Scene::BranchContent(path) => write!(f, "branch-content({path})"),
            Scene::Finale => f.write_str("finale"),
            Scene::Ending => f.write_str("ending"),
        }
    }
}

/// Timed cues that belong to the scene currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneCue {
    TransitionFaded,
    ReplayReady,
}

/// What a fired scene timer asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneStep {
    /// The pending transition is due. The scene only changes once the
    /// caller has torn the current one down and calls [`SceneMachine::enter`].
    TransitionDue { to: Scene },
    Cue(SceneCue),
}

/// Holds the current scene, the one pending transition and the branch
/// choice.
///
/// A transition request replaces any pending one: the earlier timer is
/// cancelled, not just ignored, so only the latest target can ever land.
#[derive(Debug)]
pub struct SceneMachine {
    current: Scene,
    branch: Option<PathId>,
    pending: Option<(TimerId, Scene)>,
    transitions: Scheduler<Scene>,
    cues: Scheduler<SceneCue>,
}

impl Default for SceneMachine {
    fn default() -> Self {
        Self {
            current: Scene::initial(),
            branch: None,
            pending: None,
            transitions: Scheduler::new(),
            cues: Scheduler::new(),
        }
    }
}

impl SceneMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &Scene {
        &self.current
    }

    pub fn is_transitioning(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_target(&self) -> Option<&Scene> {
        self.pending.as_ref().map(|(_, target)| target)
    }

    pub fn branch(&self) -> Option<&PathId> {
        self.branch.as_ref()
    }

    pub fn set_branch(&mut self, path: PathId) {
        self.branch = Some(path);
    }

    pub fn request_transition(&mut self, target: Scene, delay_ms: Millis, now: Millis) {
        if let Some((stale, previous)) = self.pending.take() {
            self.transitions.cancel(stale);
            debug!(%previous, %target, "superseding pending transition");
        }
        let id = self.transitions.schedule(now, delay_ms, target.clone());
        self.pending = Some((id, target));
    }

    pub fn schedule_cue(&mut self, cue: SceneCue, delay_ms: Millis, now: Millis) -> TimerId {
        self.cues.schedule(now, delay_ms, cue)
    }

    /// Drops the cues of the scene being left.
    pub fn clear_cues(&mut self) -> usize {
        self.cues.cancel_all()
    }

    pub fn next_due(&self) -> Option<Millis> {
        match (self.transitions.next_due(), self.cues.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires the earliest scene timer due at `now`. A transition due at the
    /// same instant as a cue goes first.
    pub fn fire_next(&mut self, now: Millis) -> Option<SceneStep> {
        let transition_due = self.transitions.next_due().filter(|due| *due <= now);
        let cue_due = self.cues.next_due().filter(|due| *due <= now);

        match (transition_due, cue_due) {
            (Some(t), Some(c)) if c < t => self.fire_cue(now),
            (Some(_), _) => self.fire_transition(now),
            (None, Some(_)) => self.fire_cue(now),
            (None, None) => None,
        }
    }

    /// Makes `to` the current scene and returns the one that was left.
    pub fn enter(&mut self, to: Scene) -> Scene {
        let from = std::mem::replace(&mut self.current, to);
        info!(%from, to = %self.current, "scene entered");
        from
    }

    /// Returns to the initial scene, dropping every pending timer and the
    /// branch choice.
    pub fn reset(&mut self) -> Scene {
        self.transitions.cancel_all();
        self.cues.cancel_all();
        self.pending = None;
        self.branch = None;
        let from = std::mem::replace(&mut self.current, Scene::initial());
        info!(%from, "scene reset");
        from
    }

    pub fn pending_timers(&self) -> usize {
        self.transitions.pending() + self.cues.pending()
    }

    fn fire_transition(&mut self, now: Millis) -> Option<SceneStep> {
        let fired = self.transitions.pop_due(now)?;
        match &self.pending {
            Some((id, _)) if *id == fired.id => self.pending = None,
            // Unreachable while request_transition cancels superseded timers.
            _ => return None,
        }
        Some(SceneStep::TransitionDue { to: fired.payload })
    }

    fn fire_cue(&mut self, now: Millis) -> Option<SceneStep> {
        let fired = self.cues.pop_due(now)?;
        Some(SceneStep::Cue(fired.payload))
    }
}
