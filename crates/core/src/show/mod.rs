//! The show orchestrator: one explicitly constructed value owning every
//! subsystem, a simulated clock and the event queue the presentation layer
//! subscribes to.
//!
//! Control flows down (scene entry and exit drive the subsystems) and input
//! flows up (pointer, touch and user actions arrive as method calls). All
//! waiting is expressed as timers in per-subsystem registries which the
//! orchestrator drains in global time order from [`Show::advance`].

use glam::Vec2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    assets::{AssetSignal, AudioBackend},
    audio::{AudioEvent, AudioSnapshot, AudioState, AudioSyncManager},
    config::ShowConfig,
    effects::{EffectId, EffectKind, EffectMotion, EffectPool, EphemeralEffect},
    gesture::{GestureDispatcher, Swipe, SwipeDirection},
    mapping::ViewportMapping,
    particles::{ParticleSimulator, PointerSample},
    render::{FieldTransform, RenderSurface},
    reveal::{RevealEvent, RevealPlan, RevealSequencer, StyleHint},
    scene::{PathId, Scene, SceneCue, SceneMachine, SceneStep},
    timeline::{Millis, PlaybackClock},
    Result, ShowError,
};

/// Everything observable that happened since the last drain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ShowEvent {
    SceneEntered { from: Scene, to: Scene },
    TransitionRequested { target: Scene, delay_ms: Millis },
    Reset { from: Scene },
    Reveal(RevealEvent),
    Swiped(Swipe),
    EffectSpawned { id: EffectId, kind: EffectKind },
    EffectExpired { id: EffectId },
    Audio(AudioEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectView {
    #[serde(flatten)]
    pub effect: EphemeralEffect,
    pub motion: EffectMotion,
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowSnapshot {
    pub now_ms: Millis,
    pub scene: Scene,
    pub transitioning: bool,
    pub branch: Option<PathId>,
    pub display_text: String,
    pub unit_index: Option<usize>,
    pub style: Option<StyleHint>,
    pub prompt_ready: bool,
    pub replay_ready: bool,
    pub audio: AudioSnapshot,
    pub effects: Vec<EffectView>,
    pub field_transform: FieldTransform,
}

#[derive(Debug, Clone, Copy, Default)]
struct PointerState {
    position: Vec2,
    down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerSource {
    Scene,
    Reveal,
    Audio,
    Effects,
}

#[derive(Debug)]
pub struct Show<B: AudioBackend> {
    config: ShowConfig,
    clock: PlaybackClock,
    rng: StdRng,
    scene: SceneMachine,
    sequencer: RevealSequencer,
    particles: ParticleSimulator,
    gestures: GestureDispatcher,
    audio: AudioSyncManager,
    effects: EffectPool,
    mapping: ViewportMapping,
    pointer: PointerState,
    backend: B,
    events: Vec<ShowEvent>,
    prompt_ready: bool,
    replay_ready: bool,
}

impl<B: AudioBackend> Show<B> {
    /// Mounts a show whose random layout is derived from `seed`.
    pub fn new(config: ShowConfig, seed: u64, backend: B) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed), backend)
    }

    pub fn with_rng(config: ShowConfig, mut rng: StdRng, backend: B) -> Self {
        let particles = ParticleSimulator::new(&config.particles, &mut rng);
        let mut show = Self {
            clock: PlaybackClock::new(),
            scene: SceneMachine::new(),
            sequencer: RevealSequencer::new(),
            particles,
            gestures: GestureDispatcher::new(config.gestures.swipe_threshold),
            audio: AudioSyncManager::new(config.audio.clone()),
            effects: EffectPool::new(config.effects.clone()),
            mapping: ViewportMapping::from_config(&config.viewport),
            pointer: PointerState::default(),
            backend,
            events: Vec::new(),
            prompt_ready: false,
            replay_ready: false,
            rng,
            config,
        };

        let mounted = show.audio.mount(&mut show.backend, 0);
        show.push_audio(mounted);
        show.setup_scene(&Scene::initial(), 0);
        info!("show mounted");
        show
    }

    // --- time -----------------------------------------------------------

    /// Moves simulated time forward, firing every timer that comes due in
    /// time order, including timers scheduled by earlier ones.
    pub fn advance(&mut self, delta_ms: Millis) {
        let target = self.clock.now().saturating_add(delta_ms);
        while let Some((due, source)) = self.next_timer() {
            if due > target {
                break;
            }
            self.clock.advance_to(due);
            self.fire(source, due);
        }
        self.clock.advance_to(target);
    }

    /// Per-frame callback: simulates particles against the live pointer
    /// state, writes into `surface`, and re-syncs audio.
    pub fn frame<S: RenderSurface + ?Sized>(&mut self, elapsed_ms: Millis, surface: &mut S) -> Result<()> {
        let pointer = PointerSample {
            ndc: self.mapping.to_ndc(self.pointer.position),
            active: self.pointer.down,
        };
        self.particles.frame(elapsed_ms, &pointer, surface);
        self.sync_audio();
        surface.present()
    }

    /// [`Show::advance`] followed by a [`Show::frame`] at the new time.
    pub fn tick<S: RenderSurface + ?Sized>(&mut self, delta_ms: Millis, surface: &mut S) -> Result<()> {
        self.advance(delta_ms);
        self.frame(self.clock.now(), surface)
    }

    // --- user actions ---------------------------------------------------

    pub fn begin(&mut self) -> Result<()> {
        if self.scene.current() != &Scene::Intro || self.scene.is_transitioning() {
            return Err(ShowError::invalid_action("begin", self.scene.current()));
        }
        info!("viewer began the show");
        self.audio.start();
        self.sync_audio();
        self.request(Scene::Transition, self.config.timing.begin_delay_ms);
        Ok(())
    }

    pub fn choose_path(&mut self, id: &str) -> Result<()> {
        if self.scene.current() != &Scene::BranchChoice || self.scene.is_transitioning() {
            return Err(ShowError::invalid_action("choose_path", self.scene.current()));
        }
        let path = PathId::new(id);
        if self.config.path(&path).is_none() {
            return Err(ShowError::UnknownPath(id.to_string()));
        }
        info!(%path, "branch chosen");
        self.scene.set_branch(path.clone());
        self.request(Scene::BranchContent(path), self.config.timing.choice_fade_ms);
        Ok(())
    }

    pub fn replay(&mut self) -> Result<()> {
        if !self.scene.current().is_terminal() {
            return Err(ShowError::invalid_action("replay", self.scene.current()));
        }
        self.reset();
        Ok(())
    }

    /// Returns to the initial scene. Every subsystem is torn down first, so
    /// no timer from the previous run can fire afterwards.
    pub fn reset(&mut self) {
        self.teardown_all();
        let from = self.scene.reset();
        self.events.push(ShowEvent::Reset { from: from.clone() });
        self.events.push(ShowEvent::SceneEntered {
            from,
            to: Scene::initial(),
        });
        let now = self.clock.now();
        self.setup_scene(&Scene::initial(), now);
    }

    /// Tears everything down on unmount, leaving no pending timers.
    pub fn shutdown(&mut self) {
        self.teardown_all();
        self.scene.reset();
        let events = self.audio.shutdown(&mut self.backend);
        self.push_audio(events);
        info!("show unmounted");
    }

    pub fn toggle_play(&mut self) -> bool {
        let playing = self.audio.toggle_play();
        self.sync_audio();
        playing
    }

    /// Stores `volume` clamped to `[0, 1]` and returns the stored value.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let applied = self.audio.set_volume(volume);
        self.sync_audio();
        applied
    }

    pub fn toggle_mute(&mut self) -> f32 {
        let applied = self.audio.toggle_mute();
        self.sync_audio();
        applied
    }

    // --- raw input ------------------------------------------------------

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.pointer.position = Vec2::new(x, y);
        let chance = self.config.effects.trail_spawn_chance.clamp(0.0, 1.0);
        if self.rng.random_bool(chance) {
            let origin = self.mapping.clamp(self.pointer.position);
            self.spawn_effect(EffectKind::TrailParticle, origin);
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pointer.position = Vec2::new(x, y);
        self.pointer.down = true;
    }

    pub fn pointer_up(&mut self, x: f32, y: f32) {
        self.pointer.position = Vec2::new(x, y);
        self.pointer.down = false;
    }

    pub fn click(&mut self, x: f32, y: f32) {
        let origin = self.mapping.clamp(Vec2::new(x, y));
        let id = self.effects.spawn_ripple(origin, self.clock.now(), &mut self.rng);
        self.events.push(ShowEvent::EffectSpawned {
            id,
            kind: EffectKind::ClickRipple,
        });
    }

    pub fn touch_start(&mut self, x: f32, y: f32) {
        self.gestures.touch_start(Vec2::new(x, y));
    }

    pub fn touch_move(&mut self, x: f32, y: f32) {
        self.gestures.touch_move(Vec2::new(x, y));
    }

    pub fn touch_cancel(&mut self) {
        self.gestures.touch_cancel();
    }

    /// Finishes a touch gesture and acts on the swipe, if one is dispatched.
    pub fn touch_end(&mut self, x: f32, y: f32) -> Option<Swipe> {
        let disabled = self.scene.is_transitioning() || !self.scene.current().accepts_gestures();
        let now = self.clock.now();
        let swipe = self
            .gestures
            .touch_end(Vec2::new(x, y), disabled, &mut self.effects, now)?;

        if let Some(indicator) = self.effects.live().last() {
            self.events.push(ShowEvent::EffectSpawned {
                id: indicator.id,
                kind: indicator.kind,
            });
        }
        self.events.push(ShowEvent::Swiped(swipe));
        self.on_swipe(swipe.direction);
        Some(swipe)
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.mapping.resize(width, height);
    }

    // --- audio provider signals ------------------------------------------

    pub fn apply_asset_signal(&mut self, signal: AssetSignal) {
        match signal {
            AssetSignal::Progress {
                buffered_end,
                duration,
            } => self.audio_progress(buffered_end, duration),
            AssetSignal::CanPlayThrough => self.audio_ready(),
        }
    }

    pub fn audio_progress(&mut self, buffered_end: f64, duration: f64) {
        let events = self.audio.on_progress(buffered_end, duration);
        self.push_audio(events);
    }

    pub fn audio_ready(&mut self) {
        let events = self.audio.on_ready();
        if events.is_empty() {
            return;
        }
        self.push_audio(events);
        if self.scene.current() == &Scene::Loading && !self.scene.is_transitioning() {
            self.request(Scene::Intro, self.loader_exit_delay());
        }
    }

    /// The provider rejected a `play()` it had accepted earlier.
    pub fn audio_play_rejected(&mut self, reason: &str) {
        let events = self.audio.on_play_rejected(reason);
        self.push_audio(events);
    }

    // --- observation ----------------------------------------------------

    pub fn drain_events(&mut self) -> Vec<ShowEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> ShowSnapshot {
        let now = self.clock.now();
        ShowSnapshot {
            now_ms: now,
            scene: self.scene.current().clone(),
            transitioning: self.scene.is_transitioning(),
            branch: self.scene.branch().cloned(),
            display_text: self.sequencer.display_text().to_string(),
            unit_index: self.sequencer.cursor(),
            style: self.sequencer.current_unit().map(|unit| unit.style),
            prompt_ready: self.prompt_ready,
            replay_ready: self.replay_ready,
            audio: self.audio.snapshot(),
            effects: self
                .effects
                .live()
                .iter()
                .map(|effect| EffectView {
                    effect: effect.clone(),
                    motion: self.effects.motion(effect, now),
                })
                .collect(),
            field_transform: self.particles.transform(),
        }
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    pub fn scene(&self) -> &Scene {
        self.scene.current()
    }

    pub fn is_transitioning(&self) -> bool {
        self.scene.is_transitioning()
    }

    pub fn display_text(&self) -> &str {
        self.sequencer.display_text()
    }

    pub fn audio_state(&self) -> AudioState {
        self.audio.state()
    }

    pub fn effects(&self) -> &[EphemeralEffect] {
        self.effects.live()
    }

    pub fn particles(&self) -> &ParticleSimulator {
        &self.particles
    }

    pub fn config(&self) -> &ShowConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Timers outstanding across every subsystem.
    pub fn pending_timers(&self) -> usize {
        self.scene.pending_timers()
            + self.sequencer.pending_timers()
            + self.audio.pending_timers()
            + self.effects.pending_timers()
    }

    // --- internals ------------------------------------------------------

    fn next_timer(&self) -> Option<(Millis, TimerSource)> {
        [
            (self.scene.next_due(), TimerSource::Scene),
            (self.sequencer.next_due(), TimerSource::Reveal),
            (self.audio.next_due(), TimerSource::Audio),
            (self.effects.next_due(), TimerSource::Effects),
        ]
        .into_iter()
        .filter_map(|(due, source)| due.map(|due| (due, source)))
        .min_by_key(|(due, _)| *due)
    }

    fn fire(&mut self, source: TimerSource, now: Millis) {
        match source {
            TimerSource::Scene => match self.scene.fire_next(now) {
                Some(SceneStep::TransitionDue { to }) => self.enter_scene(to, now),
                Some(SceneStep::Cue(cue)) => self.on_cue(cue),
                None => {}
            },
            TimerSource::Reveal => {
                for event in self.sequencer.fire_next(now) {
                    self.on_reveal(event);
                }
            }
            TimerSource::Audio => {
                let events = self.audio.fire_next(now, &mut self.backend, &mut self.rng);
                self.push_audio(events);
            }
            TimerSource::Effects => {
                if let Some(id) = self.effects.fire_next(now) {
                    self.events.push(ShowEvent::EffectExpired { id });
                }
            }
        }
    }

    /// Teardown of the scene being left, then the switch, then setup.
    fn enter_scene(&mut self, to: Scene, now: Millis) {
        self.teardown_scene();
        let from = self.scene.enter(to.clone());
        self.events.push(ShowEvent::SceneEntered {
            from,
            to: to.clone(),
        });
        self.setup_scene(&to, now);
    }

    /// Undoes everything a scene's setup started. Idempotent.
    fn teardown_scene(&mut self) {
        self.sequencer.cancel();
        self.gestures.teardown();
        let events = self.audio.stop_cue(&mut self.backend);
        self.push_audio(events);
        self.scene.clear_cues();
        self.prompt_ready = false;
        self.replay_ready = false;
    }

    fn teardown_all(&mut self) {
        self.teardown_scene();
        for id in self.effects.teardown() {
            self.events.push(ShowEvent::EffectExpired { id });
        }
        self.particles.clear_trail();
        self.pointer.down = false;
        let events = self.audio.reset(&mut self.backend);
        self.push_audio(events);
    }

    /// Entry actions run before the scene's own timed sequence starts.
    fn setup_scene(&mut self, scene: &Scene, now: Millis) {
        let timing = self.config.timing.clone();
        match scene {
            Scene::Loading => {
                if self.audio.state().loaded {
                    self.request(Scene::Intro, self.loader_exit_delay());
                } else {
                    self.audio.resume_loading(now);
                }
            }
            Scene::Intro => {
                let events = self.audio.start_cue(&mut self.backend, now);
                self.push_audio(events);
                let plan = RevealPlan::new(
                    self.config.content.intro.clone(),
                    self.config.reveal.intro_char_interval_ms,
                    self.config.reveal.intro_holds.clone(),
                )
                .with_lead_in(timing.intro_lead_in_ms);
                self.start_reveal(plan, now);
            }
            Scene::Transition => {
                self.scene
                    .schedule_cue(SceneCue::TransitionFaded, timing.transition_fade_ms, now);
            }
            Scene::BranchChoice => {
                let directions: Vec<SwipeDirection> = self
                    .config
                    .gestures
                    .choice_bindings
                    .iter()
                    .map(|binding| binding.direction)
                    .collect();
                self.gestures.arm(&directions);
            }
            Scene::BranchContent(path) => {
                let units = self
                    .config
                    .path(path)
                    .map(|branch| branch.units.clone())
                    .unwrap_or_default();
                let plan = RevealPlan::new(
                    units,
                    self.config.reveal.char_interval_ms,
                    self.config.reveal.memory_holds.clone(),
                );
                self.start_reveal(plan, now);
            }
            Scene::Finale => {
                info!("finale music cue");
                let plan = RevealPlan::new(
                    self.config.content.finale.clone(),
                    self.config.reveal.char_interval_ms,
                    self.config.reveal.finale_holds.clone(),
                )
                .with_lead_in(timing.finale_lead_in_ms);
                self.start_reveal(plan, now);
            }
            Scene::Ending => {
                if let Some(direction) = self.config.gestures.replay_direction {
                    self.gestures.arm(&[direction]);
                }
                self.scene
                    .schedule_cue(SceneCue::ReplayReady, timing.replay_prompt_delay_ms, now);
            }
        }
    }

    fn start_reveal(&mut self, plan: RevealPlan, now: Millis) {
        for event in self.sequencer.start(plan, now) {
            self.on_reveal(event);
        }
    }

    fn on_reveal(&mut self, event: RevealEvent) {
        let completed = event == RevealEvent::Completed;
        self.events.push(ShowEvent::Reveal(event));
        if !completed {
            return;
        }

        let timing = self.config.timing.clone();
        match self.scene.current().clone() {
            Scene::Intro => self.prompt_ready = true,
            Scene::BranchContent(_) => self.request(Scene::Finale, timing.branch_exit_delay_ms),
            Scene::Finale => self.request(Scene::Ending, timing.finale_exit_delay_ms),
            other => debug!(scene = %other, "reveal completed outside a reveal scene"),
        }
    }

    fn on_cue(&mut self, cue: SceneCue) {
        match cue {
            SceneCue::TransitionFaded => {
                self.request(Scene::BranchChoice, self.config.timing.transition_exit_delay_ms)
            }
            SceneCue::ReplayReady => self.replay_ready = true,
        }
    }

    fn on_swipe(&mut self, direction: SwipeDirection) {
        let outcome = match self.scene.current().clone() {
            Scene::BranchChoice => {
                let path = self
                    .config
                    .gestures
                    .choice_bindings
                    .iter()
                    .find(|binding| binding.direction == direction)
                    .map(|binding| binding.path.as_str().to_string());
                match path {
                    Some(path) => self.choose_path(&path),
                    None => Ok(()),
                }
            }
            Scene::Ending if self.config.gestures.replay_direction == Some(direction) => self.replay(),
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            debug!(%err, ?direction, "swipe action rejected");
        }
    }

    fn request(&mut self, target: Scene, delay_ms: Millis) {
        let now = self.clock.now();
        self.scene.request_transition(target.clone(), delay_ms, now);
        self.events
            .push(ShowEvent::TransitionRequested { target, delay_ms });
    }

    fn spawn_effect(&mut self, kind: EffectKind, origin: Vec2) -> EffectId {
        let id = self.effects.spawn(kind, origin, self.clock.now());
        self.events.push(ShowEvent::EffectSpawned { id, kind });
        id
    }

    fn sync_audio(&mut self) {
        let events = self.audio.sync(&mut self.backend);
        self.push_audio(events);
    }

    fn push_audio(&mut self, events: Vec<AudioEvent>) {
        self.events.extend(events.into_iter().map(ShowEvent::Audio));
    }

    fn loader_exit_delay(&self) -> Millis {
        self.config.timing.loader_hold_ms + self.config.timing.loader_fade_ms
    }
}
