use std::f32::consts::TAU;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    assets::{estimate_progress, AudioBackend},
    config::{AudioConfig, CueConfig},
    timeline::{Millis, Scheduler, TimerId},
};

/// Lifecycle of the background track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackPhase {
    Unloaded,
    Loading,
    Ready,
    Playing,
    Paused,
}

/// User-facing audio flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioState {
    pub loaded: bool,
    /// Set once by the first explicit user gesture, cleared only by reset.
    pub started: bool,
    /// Play/pause intent. Actual output also needs `loaded` and `started`.
    pub playing: bool,
    pub volume: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioSnapshot {
    pub phase: TrackPhase,
    pub state: AudioState,
    pub progress: f32,
    pub cue_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AudioEvent {
    PhaseChanged { from: TrackPhase, to: TrackPhase },
    Progress { percent: f32 },
    CueStarted,
    CueStopped,
}

/// Sine tone with an exponential gain ramp, rendered ahead of playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientCue {
    pub frequency_hz: f32,
    pub start_gain: f32,
    pub end_gain: f32,
    pub duration_ms: Millis,
}

impl AmbientCue {
    pub fn from_config(config: &CueConfig) -> Self {
        Self {
            frequency_hz: config.frequency_hz,
            start_gain: config.start_gain,
            end_gain: config.end_gain,
            duration_ms: config.duration_ms,
        }
    }

    /// Gain at `t` seconds into the cue. Exponential ramps cannot pass
    /// through zero, so both ends are floored at a small positive value.
    pub fn gain_at(&self, t: f32) -> f32 {
        let duration = self.duration_ms as f32 / 1_000.0;
        if duration <= 0.0 {
            return 0.0;
        }
        let start = self.start_gain.max(1.0e-4);
        let end = self.end_gain.max(1.0e-4);
        let progress = (t / duration).clamp(0.0, 1.0);
        start * (end / start).powf(progress)
    }

    pub fn sample_at(&self, t: f32) -> f32 {
        (TAU * self.frequency_hz * t).sin() * self.gain_at(t)
    }

    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let frames = (self.duration_ms as u128 * sample_rate as u128 / 1_000) as usize;
        let rate = sample_rate.max(1) as f32;
        (0..frames)
            .map(|frame| self.sample_at(frame as f32 / rate))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioTimer {
    ProgressCreep,
    StopCue,
}

/// Keeps the audio provider in line with the show: load progress, the
/// start/pause gate, volume and the time-boxed ambient cue.
#[derive(Debug)]
pub struct AudioSyncManager {
    config: AudioConfig,
    phase: TrackPhase,
    state: AudioState,
    progress: f32,
    /// Set after a refused `play()`; cleared by the next user toggle.
    blocked: bool,
    cue_active: bool,
    timers: Scheduler<AudioTimer>,
    creep: Option<TimerId>,
    cue_stop: Option<TimerId>,
}

impl AudioSyncManager {
    pub fn new(config: AudioConfig) -> Self {
        let volume = clamp_volume(config.track_volume);
        Self {
            config,
            phase: TrackPhase::Unloaded,
            state: AudioState {
                loaded: false,
                started: false,
                playing: true,
                volume,
            },
            progress: 0.0,
            blocked: false,
            cue_active: false,
            timers: Scheduler::new(),
            creep: None,
            cue_stop: None,
        }
    }

    /// Configures the provider and starts loading the track.
    pub fn mount<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, now: Millis) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        if self.phase != TrackPhase::Unloaded {
            return events;
        }
        backend.set_looping(self.config.looping);
        backend.set_volume(self.state.volume);
        backend.load();
        self.set_phase(TrackPhase::Loading, &mut events);
        self.schedule_creep(now);
        events
    }

    /// Restarts the fallback progress creep if the track is still loading.
    pub fn resume_loading(&mut self, now: Millis) {
        if self.phase == TrackPhase::Loading && self.creep.is_none() {
            self.schedule_creep(now);
        }
    }

    pub fn on_progress(&mut self, buffered_end: f64, duration: f64) -> Vec<AudioEvent> {
        if self.phase != TrackPhase::Loading {
            return Vec::new();
        }
        let estimate = estimate_progress(buffered_end, duration, self.config.progress_cap);
        self.raise_progress(estimate)
    }

    pub fn on_ready(&mut self) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        if self.state.loaded {
            return events;
        }
        self.state.loaded = true;
        self.progress = 100.0;
        if let Some(id) = self.creep.take() {
            self.timers.cancel(id);
        }
        events.push(AudioEvent::Progress { percent: 100.0 });
        self.set_phase(TrackPhase::Ready, &mut events);
        info!("background track ready");
        events
    }

    /// Records the first explicit user gesture. Later calls are no-ops.
    pub fn start(&mut self) -> bool {
        if self.state.started {
            return false;
        }
        self.state.started = true;
        true
    }

    pub fn toggle_play(&mut self) -> bool {
        self.state.playing = !self.state.playing;
        self.blocked = false;
        self.state.playing
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let clamped = clamp_volume(volume);
        if clamped != volume {
            warn!(requested = volume, applied = clamped, "volume out of range");
        }
        self.state.volume = clamped;
        clamped
    }

    /// Mutes, or restores the unmute volume when already silent.
    pub fn toggle_mute(&mut self) -> f32 {
        let target = if self.state.volume > 0.0 {
            0.0
        } else {
            self.config.unmute_volume
        };
        self.set_volume(target)
    }

    /// Applies the start/pause gate and re-asserts volume on the provider.
    /// Called once per rendered frame.
    pub fn sync<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        let wanted = self.state.loaded && self.state.started && self.state.playing;

        match (wanted, self.phase) {
            (true, TrackPhase::Ready | TrackPhase::Paused) if !self.blocked => match backend.play() {
                Ok(()) => self.set_phase(TrackPhase::Playing, &mut events),
                Err(err) => {
                    warn!(%err, "playback did not start");
                    self.refuse(&mut events);
                }
            },
            (false, TrackPhase::Playing) => {
                backend.pause();
                self.set_phase(TrackPhase::Paused, &mut events);
            }
            _ => {}
        }

        backend.set_volume(self.state.volume);
        events
    }

    /// A `play()` that was accepted but later rejected by the provider.
    pub fn on_play_rejected(&mut self, reason: &str) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        warn!(reason, "playback rejected");
        if self.phase == TrackPhase::Playing {
            self.refuse(&mut events);
        }
        events
    }

    /// A refused track is paused, so the next toggle retries it.
    fn refuse(&mut self, events: &mut Vec<AudioEvent>) {
        self.blocked = true;
        self.state.playing = false;
        self.set_phase(TrackPhase::Paused, events);
    }

    pub fn start_cue<B: AudioBackend + ?Sized>(&mut self, backend: &mut B, now: Millis) -> Vec<AudioEvent> {
        let mut events = self.stop_cue(backend);
        let cue = AmbientCue::from_config(&self.config.cue);
        if cue.duration_ms == 0 {
            debug!("skipping zero-length cue");
            return events;
        }
        let samples = cue.render(self.config.cue.sample_rate);
        backend.start_cue(&samples, self.config.cue.sample_rate);
        self.cue_active = true;
        self.cue_stop = Some(self.timers.schedule(now, cue.duration_ms, AudioTimer::StopCue));
        events.push(AudioEvent::CueStarted);
        events
    }

    /// Stops the cue and defuses its stop timer. Safe to call repeatedly.
    pub fn stop_cue<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Vec<AudioEvent> {
        let mut events = Vec::new();
        if !self.cue_active {
            return events;
        }
        if let Some(id) = self.cue_stop.take() {
            self.timers.cancel(id);
        }
        backend.stop_cue();
        self.cue_active = false;
        events.push(AudioEvent::CueStopped);
        events
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.timers.next_due()
    }

    pub fn fire_next<B: AudioBackend + ?Sized, R: Rng>(
        &mut self,
        now: Millis,
        backend: &mut B,
        rng: &mut R,
    ) -> Vec<AudioEvent> {
        let Some(timer) = self.timers.pop_due(now) else {
            return Vec::new();
        };
        match timer.payload {
            AudioTimer::ProgressCreep => {
                self.creep = None;
                if self.phase != TrackPhase::Loading {
                    return Vec::new();
                }
                let step = if self.config.fallback_max_step > 0.0 {
                    rng.random_range(0.0..self.config.fallback_max_step)
                } else {
                    0.0
                };
                let events = self.raise_progress(self.progress + step);
                self.schedule_creep(timer.due_ms);
                events
            }
            AudioTimer::StopCue => {
                debug!("cue window elapsed");
                self.cue_stop = None;
                backend.stop_cue();
                self.cue_active = false;
                vec![AudioEvent::CueStopped]
            }
        }
    }

    /// Clears the user gesture and any cue, keeping what has been loaded.
    pub fn reset<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Vec<AudioEvent> {
        let mut events = self.stop_cue(backend);
        self.cancel_all();
        self.state.started = false;
        self.state.playing = true;
        self.blocked = false;
        events.extend(self.sync(backend));
        events
    }

    /// Stops everything on unmount.
    pub fn shutdown<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Vec<AudioEvent> {
        let mut events = self.stop_cue(backend);
        self.cancel_all();
        if self.phase == TrackPhase::Playing {
            backend.pause();
            self.set_phase(TrackPhase::Paused, &mut events);
        }
        events
    }

    pub fn phase(&self) -> TrackPhase {
        self.phase
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn cue_active(&self) -> bool {
        self.cue_active
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn snapshot(&self) -> AudioSnapshot {
        AudioSnapshot {
            phase: self.phase,
            state: self.state,
            progress: self.progress,
            cue_active: self.cue_active,
        }
    }

    fn raise_progress(&mut self, estimate: f32) -> Vec<AudioEvent> {
        let next = estimate.min(self.config.progress_cap).max(self.progress);
        if next > self.progress {
            self.progress = next;
            vec![AudioEvent::Progress { percent: next }]
        } else {
            Vec::new()
        }
    }

    fn schedule_creep(&mut self, now: Millis) {
        if self.config.fallback_interval_ms > 0 {
            let id = self
                .timers
                .schedule(now, self.config.fallback_interval_ms, AudioTimer::ProgressCreep);
            self.creep = Some(id);
        }
    }

    fn cancel_all(&mut self) {
        self.timers.cancel_all();
        self.creep = None;
        self.cue_stop = None;
    }

    fn set_phase(&mut self, phase: TrackPhase, events: &mut Vec<AudioEvent>) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "track phase");
            events.push(AudioEvent::PhaseChanged {
                from: self.phase,
                to: phase,
            });
            self.phase = phase;
        }
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::assets::SimulatedTrack;

    fn mounted() -> (AudioSyncManager, SimulatedTrack) {
        let mut audio = AudioSyncManager::new(AudioConfig::default());
        let mut track = SimulatedTrack::new(10.0, 1.0);
        audio.mount(&mut track, 0);
        (audio, track)
    }

    #[test]
    fn volume_is_clamped_on_every_mutation() {
        let mut audio = AudioSyncManager::new(AudioConfig::default());
        assert_eq!(audio.set_volume(1.5), 1.0);
        assert_eq!(audio.state().volume, 1.0);
        assert_eq!(audio.set_volume(-0.2), 0.0);
        assert_eq!(audio.set_volume(f32::NAN), 0.0);
        assert_eq!(audio.set_volume(0.3), 0.3);

        assert_eq!(audio.toggle_mute(), 0.0);
        assert_eq!(audio.toggle_mute(), 0.4);
    }

    #[test]
    fn playback_needs_ready_and_started() {
        let (mut audio, mut track) = mounted();
        assert_eq!(audio.phase(), TrackPhase::Loading);
        assert!(track.is_looping());

        audio.start();
        audio.sync(&mut track);
        assert!(!track.is_playing());

        audio.on_ready();
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Playing);
        assert!(track.is_playing());

        audio.toggle_play();
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Paused);
        assert!(!track.is_playing());

        audio.toggle_play();
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Playing);
    }

    #[test]
    fn ready_without_start_stays_silent() {
        let (mut audio, mut track) = mounted();
        audio.on_ready();
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Ready);
        assert_eq!(track.play_calls(), 0);
    }

    #[test]
    fn refused_playback_waits_for_next_toggle() {
        let (mut audio, _) = mounted();
        let mut track = SimulatedTrack::new(10.0, 1.0).refusing_play();
        audio.on_ready();
        audio.start();

        audio.sync(&mut track);
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Paused);
        assert_eq!(track.play_calls(), 1);

        assert!(!audio.state().playing);

        track.set_refuse_play(false);
        assert!(audio.toggle_play());
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Playing);
        assert_eq!(track.play_calls(), 2);
    }

    #[test]
    fn late_rejection_pauses_and_one_toggle_retries() {
        let (mut audio, mut track) = mounted();
        audio.on_ready();
        audio.start();
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Playing);

        audio.on_play_rejected("device lost");
        assert_eq!(audio.phase(), TrackPhase::Paused);
        assert!(!audio.state().playing);

        assert!(audio.toggle_play());
        audio.sync(&mut track);
        assert_eq!(audio.phase(), TrackPhase::Playing);
        assert_eq!(track.play_calls(), 2);
    }

    #[test]
    fn sync_reasserts_volume() {
        let (mut audio, mut track) = mounted();
        track.set_volume(0.9);
        audio.set_volume(0.25);
        audio.sync(&mut track);
        assert_eq!(track.volume(), 0.25);
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let (mut audio, _) = mounted();
        audio.on_progress(5.0, 10.0);
        assert_relative_eq!(audio.progress(), 50.0);
        audio.on_progress(2.0, 10.0);
        assert_relative_eq!(audio.progress(), 50.0);
        audio.on_progress(10.0, 10.0);
        assert_relative_eq!(audio.progress(), 95.0);

        audio.on_ready();
        assert_relative_eq!(audio.progress(), 100.0);
        assert_eq!(audio.pending_timers(), 0);
    }

    #[test]
    fn fallback_creep_never_passes_cap() {
        let (mut audio, mut track) = mounted();
        let mut rng = StdRng::seed_from_u64(5);
        let mut now = 0;
        for _ in 0..200 {
            now = audio.next_due().expect("creep keeps running while loading");
            audio.fire_next(now, &mut track, &mut rng);
        }
        assert!(now >= 200 * 200);
        assert!(audio.progress() <= 95.0);
        assert!(audio.progress() > 50.0);
    }

    #[test]
    fn cue_is_time_boxed() {
        let (mut audio, mut track) = mounted();
        audio.on_ready();
        let mut rng = StdRng::seed_from_u64(1);

        let events = audio.start_cue(&mut track, 100);
        assert_eq!(events, vec![AudioEvent::CueStarted]);
        assert!(track.cue_playing());
        assert_eq!(audio.next_due(), Some(1_100));

        let events = audio.fire_next(1_100, &mut track, &mut rng);
        assert_eq!(events, vec![AudioEvent::CueStopped]);
        assert!(!track.cue_playing());
        assert!(!audio.cue_active());
    }

    #[test]
    fn ready_signal_only_defuses_progress_creep() {
        let (mut audio, mut track) = mounted();
        audio.start_cue(&mut track, 0);
        assert_eq!(audio.pending_timers(), 2);

        audio.on_ready();
        assert_eq!(audio.pending_timers(), 1);
        assert_eq!(audio.next_due(), Some(1_000));
    }

    #[test]
    fn stopping_cue_early_defuses_its_timer() {
        let (mut audio, mut track) = mounted();
        audio.on_ready();
        audio.start_cue(&mut track, 0);
        assert_eq!(audio.pending_timers(), 1);

        audio.stop_cue(&mut track);
        assert_eq!(audio.pending_timers(), 0);
        assert!(audio.stop_cue(&mut track).is_empty());
    }

    #[test]
    fn restarting_cue_keeps_single_stop_timer() {
        let (mut audio, mut track) = mounted();
        audio.start_cue(&mut track, 0);
        audio.start_cue(&mut track, 500);
        // One creep timer plus one stop timer.
        assert_eq!(audio.pending_timers(), 2);
        assert_eq!(track.cues_started(), 2);
    }

    #[test]
    fn reset_clears_start_but_keeps_load() {
        let (mut audio, mut track) = mounted();
        audio.on_ready();
        audio.start();
        audio.sync(&mut track);
        audio.start_cue(&mut track, 0);

        audio.reset(&mut track);
        let state = audio.state();
        assert!(state.loaded);
        assert!(!state.started);
        assert_eq!(audio.phase(), TrackPhase::Paused);
        assert!(!track.is_playing());
        assert!(!track.cue_playing());
        assert_eq!(audio.pending_timers(), 0);
    }

    #[test]
    fn cue_renders_decaying_tone() {
        let cue = AmbientCue::from_config(&CueConfig::default());
        assert_relative_eq!(cue.gain_at(0.0), 0.1);
        assert_relative_eq!(cue.gain_at(1.0), 0.01, epsilon = 1.0e-6);
        assert_relative_eq!(cue.gain_at(0.5), 0.1 * 0.1_f32.sqrt(), epsilon = 1.0e-6);

        let samples = cue.render(1_000);
        assert_eq!(samples.len(), 1_000);
        assert!(samples.iter().all(|s| s.abs() <= 0.1 + 1.0e-6));
    }
}
