use tracing::debug;

use crate::{timeline::Millis, Result, ShowError};

/// Audio collaborator driven by the show: the background track plus a
/// one-shot channel for procedurally rendered cues.
pub trait AudioBackend {
    /// Starts fetching the background track. Progress and readiness are
    /// reported back through [`AssetSignal`]s.
    fn load(&mut self);
    /// Starts or resumes the track. Providers may refuse, e.g. when the
    /// platform still requires a user gesture.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn set_volume(&mut self, volume: f32);
    fn set_looping(&mut self, looping: bool);
    fn start_cue(&mut self, samples: &[f32], sample_rate: u32);
    fn stop_cue(&mut self);
}

/// Notifications an audio provider raises while loading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssetSignal {
    Progress { buffered_end: f64, duration: f64 },
    CanPlayThrough,
}

/// Percentage of the track buffered, capped below 100 until the provider
/// reports it can play through.
pub fn estimate_progress(buffered_end: f64, duration: f64, cap: f32) -> f32 {
    let duration = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        1.0
    };
    let buffered = if buffered_end.is_finite() {
        buffered_end.max(0.0)
    } else {
        0.0
    };
    ((buffered / duration * 100.0) as f32).min(cap.clamp(0.0, 100.0))
}

/// Audio provider that buffers a track of known length at a fixed rate and
/// records what the show asked of it.
#[derive(Debug, Clone)]
pub struct SimulatedTrack {
    duration_secs: f64,
    buffer_rate: f64,
    buffered_secs: f64,
    loading: bool,
    ready: bool,
    refuse_play: bool,
    playing: bool,
    looping: bool,
    volume: f32,
    cue_samples: Option<usize>,
    play_calls: usize,
    cues_started: usize,
}

impl SimulatedTrack {
    /// `buffer_rate` is seconds of audio buffered per second of wall time.
    pub fn new(duration_secs: f64, buffer_rate: f64) -> Self {
        Self {
            duration_secs: duration_secs.max(0.0),
            buffer_rate: buffer_rate.max(0.0),
            buffered_secs: 0.0,
            loading: false,
            ready: false,
            refuse_play: false,
            playing: false,
            looping: false,
            volume: 1.0,
            cue_samples: None,
            play_calls: 0,
            cues_started: 0,
        }
    }

    /// Makes every `play()` fail, like a browser blocking autoplay.
    pub fn refusing_play(mut self) -> Self {
        self.refuse_play = true;
        self
    }

    pub fn set_refuse_play(&mut self, refuse: bool) {
        self.refuse_play = refuse;
    }

    /// Buffers `elapsed_ms` worth of audio and reports what changed.
    pub fn poll(&mut self, elapsed_ms: Millis) -> Vec<AssetSignal> {
        let mut signals = Vec::new();
        if !self.loading || self.ready {
            return signals;
        }

        self.buffered_secs = (self.buffered_secs + self.buffer_rate * elapsed_ms as f64 / 1_000.0)
            .min(self.duration_secs);
        signals.push(AssetSignal::Progress {
            buffered_end: self.buffered_secs,
            duration: self.duration_secs,
        });

        if self.buffered_secs >= self.duration_secs {
            self.ready = true;
            signals.push(AssetSignal::CanPlayThrough);
        }
        signals
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn cue_playing(&self) -> bool {
        self.cue_samples.is_some()
    }

    pub fn play_calls(&self) -> usize {
        self.play_calls
    }

    pub fn cues_started(&self) -> usize {
        self.cues_started
    }
}

impl AudioBackend for SimulatedTrack {
    fn load(&mut self) {
        self.loading = true;
    }

    fn play(&mut self) -> Result<()> {
        self.play_calls += 1;
        if self.refuse_play {
            return Err(ShowError::Playback("playback requires a user gesture".into()));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn start_cue(&mut self, samples: &[f32], sample_rate: u32) {
        debug!(samples = samples.len(), sample_rate, "cue started");
        self.cue_samples = Some(samples.len());
        self.cues_started += 1;
    }

    fn stop_cue(&mut self) {
        self.cue_samples = None;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn progress_is_capped_until_ready() {
        assert_relative_eq!(estimate_progress(30.0, 60.0, 95.0), 50.0);
        assert_relative_eq!(estimate_progress(60.0, 60.0, 95.0), 95.0);
        assert_relative_eq!(estimate_progress(90.0, 60.0, 95.0), 95.0);
    }

    #[test]
    fn unknown_duration_counts_as_one_second() {
        assert_relative_eq!(estimate_progress(0.5, f64::NAN, 95.0), 50.0);
        assert_relative_eq!(estimate_progress(0.25, 0.0, 95.0), 25.0);
        assert_relative_eq!(estimate_progress(f64::INFINITY, 10.0, 95.0), 0.0);
    }

    #[test]
    fn simulated_track_buffers_then_signals_ready() {
        let mut track = SimulatedTrack::new(10.0, 5.0);
        assert!(track.poll(1_000).is_empty());

        track.load();
        assert_eq!(
            track.poll(1_000),
            vec![AssetSignal::Progress {
                buffered_end: 5.0,
                duration: 10.0
            }]
        );
        let last = track.poll(1_000);
        assert_eq!(last.last(), Some(&AssetSignal::CanPlayThrough));
        assert!(track.poll(1_000).is_empty());
    }

    #[test]
    fn refusing_track_reports_playback_error() {
        let mut track = SimulatedTrack::new(1.0, 1.0).refusing_play();
        assert!(matches!(track.play(), Err(ShowError::Playback(_))));
        assert!(!track.is_playing());

        track.set_refuse_play(false);
        track.play().unwrap();
        assert!(track.is_playing());
        assert_eq!(track.play_calls(), 2);
    }
}
