// Strong typing over the host's loose property bag. Newtypes for tokens and frame ranges.
// See DESIGN.md: types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Playback status. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Inclusive frame segment to restrict playback to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    start: u32,
    end: u32,
}

impl FrameRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ControlError> {
        if start > end {
            return Err(ControlError::InvalidFrameRange(format!(
                "start frame {} is after end frame {}",
                start, end
            )));
        }
        Ok(FrameRange { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }
}

impl FromStr for FrameRange {
    type Err = ControlError;

    /// Parses the wire format: exactly two comma-separated base-10 integers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [start, end] = parts.as_slice() else {
            return Err(ControlError::InvalidFrameRange(format!(
                "expected two comma-separated frames, got {:?}",
                s
            )));
        };

        let parse = |segment: &str| {
            segment.parse::<u32>().map_err(|e| {
                ControlError::InvalidFrameRange(format!("bad frame {:?}: {}", segment, e))
            })
        };

        FrameRange::new(parse(start)?, parse(end)?)
    }
}

/// Frame position as last reported by the engine. Trusted, not validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FrameProgress {
    pub current_frame: f64,
    pub total_frame: f64,
}

/// Opaque caller-supplied command token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandToken(String);

impl CommandToken {
    pub fn new(value: impl Into<String>) -> Self {
        CommandToken(value.into())
    }

    /// Mint a fresh token, used when playback starts without a host command.
    pub fn generate() -> Self {
        CommandToken(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Animation definition data. The controller never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationAsset {
    pub source_url: String,
    pub data: Vec<u8>,
}

impl AnimationAsset {
    pub fn new(source_url: impl Into<String>, data: Vec<u8>) -> Self {
        AnimationAsset {
            source_url: source_url.into(),
            data,
        }
    }
}

/// Identity of one engine instance. Each instantiation gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn new(id: u32) -> Self {
        InstanceId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> Self {
        InstanceId(self.0.wrapping_add(1))
    }
}

/// Property bag delivered by the host on every refresh.
/// Field names follow the host manifest.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HostInputs {
    #[serde(rename = "LottieAnimationURL", default)]
    pub animation_url: Option<String>,
    #[serde(rename = "Speed", default)]
    pub speed: Option<f64>,
    #[serde(rename = "Loop", default)]
    pub looping: Option<bool>,
    #[serde(rename = "AutoPlay", default)]
    pub autoplay: Option<bool>,
    #[serde(rename = "StartAnimationToken", default)]
    pub start_token: Option<String>,
    #[serde(rename = "PauseAnimationToken", default)]
    pub pause_token: Option<String>,
    #[serde(rename = "StopAnimationToken", default)]
    pub stop_token: Option<String>,
    #[serde(rename = "StartEndFrame", default)]
    pub frame_range: Option<String>,
}

/// Values the host reads back after an output-changed notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostOutputs {
    #[serde(rename = "IsStopped")]
    pub is_stopped: bool,
    #[serde(rename = "IsPaused")]
    pub is_paused: bool,
    #[serde(rename = "StartAnimationToken")]
    pub start_token: Option<String>,
    #[serde(rename = "CurrentFrame")]
    pub current_frame: f64,
    #[serde(rename = "TotalFrame")]
    pub total_frame: f64,
}

/// Control configuration passed from JS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_renderer")]
    pub renderer: String,
    #[serde(default = "default_preserve_aspect_ratio")]
    pub preserve_aspect_ratio: String,
    /// Speed used when the host supplies none (or zero).
    #[serde(default = "default_speed")]
    pub default_speed: f64,
    /// Fetch attempts per URL before the control gives up on it.
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,
    /// Delay before the first retry; doubles for each retry after it.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            renderer: default_renderer(),
            preserve_aspect_ratio: default_preserve_aspect_ratio(),
            default_speed: default_speed(),
            max_fetch_attempts: default_max_fetch_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_renderer() -> String {
    "svg".to_string()
}

fn default_preserve_aspect_ratio() -> String {
    "xMidYMid slice".to_string()
}

fn default_speed() -> f64 {
    1.0
}

fn default_max_fetch_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u32 {
    500 // 0.5s
}

/// Options an engine instance is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    pub looping: bool,
    pub renderer: String,
    pub preserve_aspect_ratio: String,
    pub speed: f64,
}
