// Instance lifecycle: URL identity, the one-fetch-at-a-time creation guard, retry policy,
// and engine teardown before a new asset is built. Sans-IO: the caller performs the fetch.
// See DESIGN.md: control

use crate::adapter::{EngineAdapter, EngineFactory, RawEngineEvent};
use crate::controller::{ControlEvent, HostCommand, PlaybackController};
use crate::error::ControlError;
use crate::source;
use crate::types::{
    AnimationAsset, CommandToken, ControlConfig, EngineOptions, FrameRange, HostInputs,
    HostOutputs, InstanceId, PlaybackStatus,
};

/// Where the control is in getting an engine for its current URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CreationState {
    #[default]
    Idle,
    Fetching { url: String, attempt: u32 },
    Ready { url: String },
    /// Gave up on `url`. Cleared only by a different URL.
    Failed { url: String },
}

/// A fetch the caller must perform, then report via `complete_creation`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationRequest {
    pub url: String,
    pub attempt: u32,
    /// Bumped per new request and on unmount; results from older ones are stale.
    pub generation: u64,
    /// Wait this long before fetching.
    pub delay_ms: u32,
    pub looping: bool,
    pub autoplay: bool,
    pub speed: Option<f64>,
}

#[derive(Debug, Default)]
pub struct ViewUpdate {
    pub events: Vec<ControlEvent>,
    pub request: Option<CreationRequest>,
}

#[derive(Debug, Default)]
pub struct CreationOutcome {
    pub events: Vec<ControlEvent>,
    pub retry: Option<CreationRequest>,
}

/// One mounted animation control.
pub struct LottieControl<F: EngineFactory> {
    config: ControlConfig,
    factory: F,
    controller: PlaybackController<F::Engine>,
    creation: CreationState,
    next_instance: InstanceId,
    generation: u64,
    rejected_range: Option<String>,
}

impl<F: EngineFactory> LottieControl<F> {
    pub fn new(config: ControlConfig, factory: F) -> Self {
        let controller = PlaybackController::new(config.default_speed);
        LottieControl {
            config,
            factory,
            controller,
            creation: CreationState::Idle,
            next_instance: InstanceId::new(1),
            generation: 0,
            rejected_range: None,
        }
    }

    pub fn creation_state(&self) -> &CreationState {
        &self.creation
    }

    pub fn status(&self) -> PlaybackStatus {
        self.controller.status()
    }

    pub fn active_instance(&self) -> Option<InstanceId> {
        self.controller.active_instance()
    }

    pub fn outputs(&self) -> HostOutputs {
        self.controller.outputs()
    }

    /// Handle one host refresh.
    pub fn update_view(&mut self, inputs: &HostInputs) -> ViewUpdate {
        let mut update = ViewUpdate::default();

        match source::validate_url(inputs.animation_url.as_deref()) {
            Ok(url) => {
                if let Some(request) = self.request_creation(url, inputs) {
                    update.events.push(ControlEvent::OutputChanged);
                    update.request = Some(request);
                }
            }
            Err(e) => log::trace!("{}", e),
        }

        if self.controller.is_ready() {
            let command = HostCommand {
                start_token: inputs.start_token.as_deref(),
                pause_token: inputs.pause_token.as_deref(),
                stop_token: inputs.stop_token.as_deref(),
                frame_range: self.frame_range(inputs.frame_range.as_deref()),
                speed: inputs.speed,
            };
            update.events.extend(self.controller.apply(&command));
        }

        update
    }

    /// Report the result of fetching `request`. A failed fetch may come back
    /// as a retry request; a result for a request that is no longer current is dropped.
    pub fn complete_creation(
        &mut self,
        request: &CreationRequest,
        fetched: Result<Vec<u8>, ControlError>,
    ) -> CreationOutcome {
        let mut outcome = CreationOutcome::default();
        let current = CreationState::Fetching {
            url: request.url.clone(),
            attempt: request.attempt,
        };
        if request.generation != self.generation || self.creation != current {
            log::debug!(
                "discarding fetch result for {} (state {:?})",
                request.url,
                self.creation
            );
            return outcome;
        }

        let data = match fetched {
            Ok(data) => data,
            Err(e) => {
                log::warn!("{}", e);
                outcome.retry = self.retry(request);
                return outcome;
            }
        };

        let asset = AnimationAsset::new(request.url.clone(), data);
        let options = EngineOptions {
            looping: request.looping,
            renderer: self.config.renderer.clone(),
            preserve_aspect_ratio: self.config.preserve_aspect_ratio.clone(),
            speed: match request.speed {
                Some(speed) if speed != 0.0 && !speed.is_nan() => speed,
                _ => self.config.default_speed,
            },
        };
        let instance = self.next_instance;
        self.next_instance = instance.next();

        // Nothing may still be bound to the surface at this point.
        self.controller.detach();
        match self.factory.instantiate(&asset, &options, instance) {
            Ok(engine) => {
                log::info!(
                    "engine instance {} created for {}",
                    instance.as_u32(),
                    request.url
                );
                self.controller.attach(EngineAdapter::new(engine, instance));
                self.creation = CreationState::Ready {
                    url: request.url.clone(),
                };
                outcome.events.push(ControlEvent::OutputChanged);
                if request.autoplay {
                    outcome
                        .events
                        .extend(self.controller.autoplay(CommandToken::generate(), None));
                }
            }
            Err(e) => {
                log::warn!("{}", e);
                self.creation = CreationState::Failed {
                    url: request.url.clone(),
                };
            }
        }
        outcome
    }

    /// Feed an engine callback.
    pub fn on_engine_event(
        &mut self,
        instance: InstanceId,
        raw: RawEngineEvent,
    ) -> Vec<ControlEvent> {
        self.controller.on_engine_event(instance, raw)
    }

    /// Unmount: destroy the engine and forget URL and tokens.
    /// A fetch still in flight will be discarded when it lands.
    pub fn destroy(&mut self) {
        log::debug!("unmounting control");
        self.controller.reset();
        self.creation = CreationState::Idle;
        self.generation += 1;
        self.rejected_range = None;
    }

    fn request_creation(&mut self, url: &str, inputs: &HostInputs) -> Option<CreationRequest> {
        match &self.creation {
            CreationState::Fetching { url: pending, .. } => {
                if pending != url {
                    log::debug!(
                        "creation for {} in flight, dropping request for {}",
                        pending,
                        url
                    );
                }
                return None;
            }
            CreationState::Ready { url: current } | CreationState::Failed { url: current }
                if current == url =>
            {
                return None;
            }
            _ => {}
        }

        // Tear down the previous engine before the new asset lands.
        self.controller.detach();
        log::debug!("requesting animation {}", url);
        self.generation += 1;
        self.creation = CreationState::Fetching {
            url: url.to_string(),
            attempt: 1,
        };
        Some(CreationRequest {
            url: url.to_string(),
            attempt: 1,
            generation: self.generation,
            delay_ms: 0,
            looping: inputs.looping.unwrap_or(false),
            autoplay: inputs.autoplay.unwrap_or(false),
            speed: inputs.speed,
        })
    }

    fn retry(&mut self, request: &CreationRequest) -> Option<CreationRequest> {
        if request.attempt >= self.config.max_fetch_attempts {
            log::warn!(
                "giving up on {} after {} attempts",
                request.url,
                request.attempt
            );
            self.creation = CreationState::Failed {
                url: request.url.clone(),
            };
            return None;
        }

        let attempt = request.attempt + 1;
        self.creation = CreationState::Fetching {
            url: request.url.clone(),
            attempt,
        };
        Some(CreationRequest {
            attempt,
            delay_ms: self.retry_delay_ms(attempt),
            ..request.clone()
        })
    }

    // Doubles per attempt after the first retry.
    fn retry_delay_ms(&self, attempt: u32) -> u32 {
        let doublings = attempt.saturating_sub(2).min(16);
        self.config.retry_delay_ms.saturating_mul(1u32 << doublings)
    }

    fn frame_range(&mut self, raw: Option<&str>) -> Option<FrameRange> {
        match source::parse_frame_range(raw) {
            Ok(range) => {
                self.rejected_range = None;
                range
            }
            Err(e) => {
                // The host re-delivers the same value every refresh; warn once.
                if self.rejected_range.as_deref() != raw {
                    log::warn!("{}; playing the full range", e);
                    self.rejected_range = raw.map(str::to_string);
                }
                None
            }
        }
    }
}
