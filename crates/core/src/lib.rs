//! Core library for the show orchestrator.
//!
//! A show is a scripted, timed sequence of scenes (loading, intro, branch
//! choice, branch content, finale, ending) layered over a pointer-reactive
//! particle field and a background music track. Each module owns one
//! subsystem; [`show::Show`] wires them together around a simulated clock so
//! a whole playthrough can be driven deterministically.

pub mod assets;
pub mod audio;
pub mod config;
pub mod effects;
pub mod error;
pub mod gesture;
pub mod mapping;
pub mod particles;
pub mod render;
pub mod reveal;
pub mod scene;
pub mod show;
pub mod timeline;

pub use assets::{AssetSignal, AudioBackend, SimulatedTrack};
pub use audio::{AudioEvent, AudioSnapshot, AudioState, AudioSyncManager, TrackPhase};
pub use config::{AudioConfig, ShowConfig};
pub use effects::{EffectId, EffectKind, EffectPool, EphemeralEffect};
pub use error::{Result, ShowError};
pub use gesture::{GestureDispatcher, Swipe, SwipeDirection};
pub use mapping::ViewportMapping;
pub use particles::{ParticleSimulator, PointerSample};
pub use render::{FieldTransform, HeadlessSurface, PointBuffer, RenderSurface};
pub use reveal::{ContentUnit, HoldPolicy, RevealEvent, RevealPlan, RevealSequencer, StyleHint};
pub use scene::{PathId, Scene, SceneMachine};
pub use show::{Show, ShowEvent, ShowSnapshot};
pub use timeline::{Millis, PlaybackClock, ScheduledEvent, Scheduler, TimerId};
