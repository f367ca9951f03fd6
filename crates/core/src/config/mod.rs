use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    gesture::SwipeDirection,
    reveal::{ContentUnit, HoldOverride, HoldPolicy, StyleHint, UnitPosition},
    scene::PathId,
    timeline::Millis,
    Result,
};

/// Top-level configuration structure for a show.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    pub timing: TimingConfig,
    pub reveal: RevealConfig,
    pub particles: ParticleConfig,
    pub gestures: GestureConfig,
    pub audio: AudioConfig,
    pub effects: EffectConfig,
    pub viewport: ViewportConfig,
    pub content: ContentConfig,
}

impl ShowConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn path(&self, id: &PathId) -> Option<&BranchPath> {
        self.content.paths.iter().find(|path| &path.id == id)
    }
}

/// Delays between scenes and scene-local cues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long the loader shows "ready" before fading.
    pub loader_hold_ms: Millis,
    pub loader_fade_ms: Millis,
    pub begin_delay_ms: Millis,
    pub intro_lead_in_ms: Millis,
    /// Fade-out of the transition scene, including its trailing pause.
    pub transition_fade_ms: Millis,
    pub transition_exit_delay_ms: Millis,
    pub choice_fade_ms: Millis,
    pub branch_exit_delay_ms: Millis,
    pub finale_lead_in_ms: Millis,
    pub finale_exit_delay_ms: Millis,
    pub replay_prompt_delay_ms: Millis,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            loader_hold_ms: 800,
            loader_fade_ms: 500,
            begin_delay_ms: 500,
            intro_lead_in_ms: 1_000,
            transition_fade_ms: 1_500,
            transition_exit_delay_ms: 1_000,
            choice_fade_ms: 600,
            branch_exit_delay_ms: 1_000,
            finale_lead_in_ms: 1_000,
            finale_exit_delay_ms: 4_000,
            replay_prompt_delay_ms: 3_000,
        }
    }
}

/// Character cadence and hold policies for each revealed sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub intro_char_interval_ms: Millis,
    pub char_interval_ms: Millis,
    pub intro_holds: HoldPolicy,
    pub memory_holds: HoldPolicy,
    pub finale_holds: HoldPolicy,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            intro_char_interval_ms: 100,
            char_interval_ms: 80,
            intro_holds: HoldPolicy::uniform(2_000),
            memory_holds: HoldPolicy::uniform(2_700),
            finale_holds: HoldPolicy {
                default_ms: 2_500,
                overrides: vec![
                    HoldOverride::new(UnitPosition::First, 2_000),
                    HoldOverride::new(UnitPosition::Penultimate, 3_000),
                    HoldOverride::new(UnitPosition::Last, 2_000),
                ],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub count: usize,
    /// Half the edge length of the cube particles are sampled in.
    pub extent: f32,
    pub repulsion_radius: f32,
    pub force_gain: f32,
    /// Maps normalised pointer coordinates into field units.
    pub pointer_scale: f32,
    /// Multiplier applied (with inverted sign) while the pointer is held.
    pub activation_gain: f32,
    pub jitter_amplitude: f32,
    pub jitter_speed: f32,
    /// Field rotation about the vertical axis, in radians per second.
    pub rotation_speed: f32,
    pub breathing_amplitude: f32,
    pub breathing_period_ms: Millis,
    pub trail_length: usize,
    pub ambient_count: usize,
    pub ambient_extent: f32,
    pub ambient_max_speed: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 1_500,
            extent: 10.0,
            repulsion_radius: 2.0,
            force_gain: 0.6,
            pointer_scale: 5.0,
            activation_gain: 2.5,
            jitter_amplitude: 0.05,
            jitter_speed: 1.0,
            rotation_speed: 0.05,
            breathing_amplitude: 0.02,
            breathing_period_ms: 6_000,
            trail_length: 24,
            ambient_count: 200,
            ambient_extent: 10.0,
            ambient_max_speed: 0.01,
        }
    }
}

/// A swipe direction that selects a branch path while choices are shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwipeBinding {
    pub direction: SwipeDirection,
    pub path: PathId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub swipe_threshold: f32,
    pub choice_bindings: Vec<SwipeBinding>,
    pub replay_direction: Option<SwipeDirection>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        let bind = |direction, path: &str| SwipeBinding {
            direction,
            path: PathId::new(path),
        };
        Self {
            swipe_threshold: 50.0,
            choice_bindings: vec![
                bind(SwipeDirection::Left, "romantic"),
                bind(SwipeDirection::Up, "playful"),
                bind(SwipeDirection::Right, "sentimental"),
            ],
            replay_direction: Some(SwipeDirection::Up),
        }
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub track_volume: f32,
    pub looping: bool,
    /// Volume restored by the mute toggle when the track is silent.
    pub unmute_volume: f32,
    /// Highest progress estimate shown before the ready signal.
    pub progress_cap: f32,
    pub fallback_interval_ms: Millis,
    pub fallback_max_step: f32,
    pub cue: CueConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            track_volume: 0.5,
            looping: true,
            unmute_volume: 0.4,
            progress_cap: 95.0,
            fallback_interval_ms: 200,
            fallback_max_step: 15.0,
            cue: CueConfig::default(),
        }
    }
}

/// Procedural low-frequency cue played when the intro starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub frequency_hz: f32,
    pub start_gain: f32,
    pub end_gain: f32,
    pub duration_ms: Millis,
    pub sample_rate: u32,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 60.0,
            start_gain: 0.1,
            end_gain: 0.01,
            duration_ms: 1_000,
            sample_rate: 48_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub ripple_ttl_ms: Millis,
    pub indicator_ttl_ms: Millis,
    pub trail_ttl_ms: Millis,
    /// Lower bound applied to every TTL.
    pub min_ttl_ms: Millis,
    /// Probability that a pointer move leaves a trail particle behind.
    pub trail_spawn_chance: f64,
    pub ripple_max_scale: f32,
    /// Radial sparks thrown out by every click ripple.
    pub ripple_sparks: usize,
    /// Spark travel is `spark_distance` plus up to `spark_distance_jitter`.
    pub spark_distance: f32,
    pub spark_distance_jitter: f32,
    pub spark_duration_ms: Millis,
    pub spark_duration_jitter_ms: Millis,
    pub spark_max_delay_ms: Millis,
    pub indicator_travel: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            ripple_ttl_ms: 800,
            indicator_ttl_ms: 800,
            trail_ttl_ms: 1_000,
            min_ttl_ms: 16,
            trail_spawn_chance: 0.3,
            ripple_max_scale: 4.0,
            ripple_sparks: 8,
            spark_distance: 50.0,
            spark_distance_jitter: 30.0,
            spark_duration_ms: 600,
            spark_duration_jitter_ms: 400,
            spark_max_delay_ms: 100,
            indicator_travel: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// One selectable branch and the memories it reveals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchPath {
    pub id: PathId,
    pub title: String,
    pub units: Vec<ContentUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub intro: Vec<ContentUnit>,
    pub paths: Vec<BranchPath>,
    pub finale: Vec<ContentUnit>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        let units = |lines: &[&str]| -> Vec<ContentUnit> {
            lines.iter().map(|line| ContentUnit::new(*line)).collect()
        };
        let path = |id: &str, title: &str, lines: &[&str]| BranchPath {
            id: PathId::new(id),
            title: title.to_string(),
            units: units(lines),
        };

        let mut finale = units(&[
            "First of all...",
            "Thank you for being here.",
            "Some moments deserve more than a message.",
            "So this became a small film instead.",
            "One you can replay whenever you like.",
            "Because once",
            "is never quite enough.",
        ]);
        finale.push(ContentUnit::new("~").with_style(StyleHint::Emphasis));

        Self {
            intro: vec![ContentUnit::new("Put on your headphones").with_style(StyleHint::Headline)],
            paths: vec![
                path(
                    "romantic",
                    "Romantic Journey",
                    &[
                        "A first dance under the stars",
                        "A smile on a first evening out",
                        "Quiet moments, hands held",
                        "Every sunset watched together",
                    ],
                ),
                path(
                    "playful",
                    "Fun Adventures",
                    &[
                        "Silly photo booth adventures",
                        "Dancing in the rain",
                        "Midnight pizza runs",
                        "Laughing until crying",
                    ],
                ),
                path(
                    "sentimental",
                    "Memory Lane",
                    &[
                        "The day it felt like forever",
                        "Being held when it mattered most",
                        "Building dreams together",
                        "Every word that made time stop",
                    ],
                ),
            ],
            finale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ShowConfig::from_json_str(
            r#"{ "timing": { "begin_delay_ms": 50 }, "audio": { "track_volume": 0.8 } }"#,
        )
        .unwrap();

        assert_eq!(config.timing.begin_delay_ms, 50);
        assert_eq!(config.timing.loader_hold_ms, 800);
        assert_eq!(config.audio.track_volume, 0.8);
        assert_eq!(config.audio.cue.frequency_hz, 60.0);
        assert_eq!(config.content.paths.len(), 3);
    }

    #[test]
    fn default_config_survives_json() {
        let json = ShowConfig::default().to_json_pretty().unwrap();
        let parsed = ShowConfig::from_json_str(&json).unwrap();

        assert_eq!(parsed.reveal.finale_holds, RevealConfig::default().finale_holds);
        assert_eq!(parsed.gestures.choice_bindings.len(), 3);
        assert!(parsed.path(&PathId::new("playful")).is_some());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ShowConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::ShowError::Config(_)));
    }
}
