// Strong typing over strings. Newtypes for durations, enums for gestures and stages.
// Config arrives from JS as JSON; every field has a default.

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::HeroError;

/// Duration in milliseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Millis(u32);

impl Millis {
    pub const fn new(ms: u32) -> Self {
        Millis(ms)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    #[cfg(test)]
    pub fn as_secs(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn saturating_add(self, other: Millis) -> Millis {
        Millis(self.0.saturating_add(other.0))
    }
}

/// Which behavior path a page session takes. Fixed at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceProfile {
    /// Desktop-class viewport: the intro runs unattended.
    Unconstrained,
    /// Narrow viewport: the intro holds before its last stage until the user enters.
    Constrained,
}

impl DeviceProfile {
    /// Widths at or below the threshold are constrained. A non-finite width
    /// compares false and lands on the unconstrained path.
    pub fn from_viewport_width(width_px: f64, threshold_px: u32) -> Self {
        if width_px <= threshold_px as f64 {
            DeviceProfile::Constrained
        } else {
            DeviceProfile::Unconstrained
        }
    }

    pub fn is_constrained(&self) -> bool {
        matches!(self, DeviceProfile::Constrained)
    }
}

/// Ambient page input that may count as a user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    PointerDown,
    TouchStart,
    TouchEnd,
    Scroll,
    Click,
}

impl GestureKind {
    /// The full set every unlock and retry subscription listens on.
    pub const ALL: [GestureKind; 5] = [
        GestureKind::PointerDown,
        GestureKind::TouchStart,
        GestureKind::TouchEnd,
        GestureKind::Scroll,
        GestureKind::Click,
    ];

    /// DOM event type name.
    pub fn event_name(&self) -> &'static str {
        match self {
            GestureKind::PointerDown => "pointerdown",
            GestureKind::TouchStart => "touchstart",
            GestureKind::TouchEnd => "touchend",
            GestureKind::Scroll => "scroll",
            GestureKind::Click => "click",
        }
    }
}

/// Visual stage of the intro timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Percentage counter rolling through its digits.
    Counter,
    /// Wordmark slides in, then splits out.
    Wordmark,
    /// Overlay blocks clip away and reveal the hero.
    Transition,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Counter => "counter",
            StageKind::Wordmark => "wordmark",
            StageKind::Transition => "transition",
        }
    }
}

/// One scripted stage with its fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub kind: StageKind,
    #[serde(rename = "duration_ms")]
    pub duration: Millis,
}

impl Stage {
    pub fn new(kind: StageKind, duration: Millis) -> Self {
        Stage { kind, duration }
    }
}

/// What the renderer is asked to show next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCue {
    Stage(StageKind),
    /// Timeline parked before its last stage; show the enter control.
    Checkpoint,
}

impl StageCue {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageCue::Stage(kind) => kind.as_str(),
            StageCue::Checkpoint => "checkpoint",
        }
    }
}

/// Ordered intro stages. The last one is the transition-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroScript {
    pub stages: Vec<Stage>,
}

impl IntroScript {
    pub fn new(stages: Vec<Stage>) -> Self {
        IntroScript { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.stages.len().checked_sub(1)
    }

    /// Sum of all stage durations.
    pub fn total_duration(&self) -> Millis {
        self.stages
            .iter()
            .fold(Millis::default(), |acc, stage| acc.saturating_add(stage.duration))
    }
}

impl Default for IntroScript {
    fn default() -> Self {
        IntroScript::new(vec![
            // 300ms lead-in plus five staggered counts.
            Stage::new(StageKind::Counter, Millis::new(5_300)),
            Stage::new(StageKind::Wordmark, Millis::new(1_300)),
            // Block stagger and delay included.
            Stage::new(StageKind::Transition, Millis::new(1_850)),
        ])
    }
}

/// Hero video assets. The mobile cut is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSources {
    pub desktop: String,
    #[serde(default)]
    pub mobile: Option<String>,
}

impl MediaSources {
    /// Asset for the session's profile, chosen once at mount.
    pub fn select(&self, profile: DeviceProfile) -> &str {
        match (profile, &self.mobile) {
            (DeviceProfile::Constrained, Some(mobile)) => mobile,
            _ => &self.desktop,
        }
    }
}

/// Configuration passed from JS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroConfig {
    /// Viewport width at or below which the device is constrained.
    #[serde(default = "default_viewport_threshold")]
    pub viewport_threshold_px: u32,
    /// Dead-man's switch for the intro timeline, from intro start.
    #[serde(default = "default_failsafe")]
    pub failsafe_ms: Millis,
    /// False on every visit after the first page load.
    #[serde(default = "default_true")]
    pub show_intro: bool,
    #[serde(default)]
    pub script: IntroScript,
    #[serde(default)]
    pub sources: Option<MediaSources>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_viewport_threshold() -> u32 {
    768
}

fn default_failsafe() -> Millis {
    Millis::new(12_000)
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for HeroConfig {
    fn default() -> Self {
        HeroConfig {
            viewport_threshold_px: default_viewport_threshold(),
            failsafe_ms: default_failsafe(),
            show_intro: true,
            script: IntroScript::default(),
            sources: None,
            log_level: default_log_level(),
        }
    }
}

impl HeroConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, HeroError> {
        let config: HeroConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HeroError> {
        if self.viewport_threshold_px == 0 {
            return Err(HeroError::InvalidConfig(
                "viewport_threshold_px must be positive".to_string(),
            ));
        }

        match self.script.stages.last() {
            Some(stage) if stage.kind == StageKind::Transition => {}
            Some(stage) => {
                return Err(HeroError::InvalidConfig(format!(
                    "intro script must end with a transition stage, found {}",
                    stage.kind.as_str()
                )))
            }
            None => {
                return Err(HeroError::InvalidConfig(
                    "intro script has no stages".to_string(),
                ))
            }
        }

        let total = self.script.total_duration();
        if self.failsafe_ms <= total {
            return Err(HeroError::InvalidConfig(format!(
                "failsafe_ms ({}) must exceed the script duration ({}ms)",
                self.failsafe_ms.as_u32(),
                total.as_u32()
            )));
        }

        self.level()?;
        Ok(())
    }

    /// Console log level.
    pub fn level(&self) -> Result<Level, HeroError> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| HeroError::InvalidConfig(format!("unknown log level: {}", self.log_level)))
    }
}
