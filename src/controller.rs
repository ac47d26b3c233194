// Playback controller: the stopped/playing/paused state machine.
// Host refreshes and engine callbacks are the only inputs; both arrive as typed messages
// and every transition is decided here on one thread.
// See DESIGN.md: controller

use crate::adapter::{AnimationEngine, EngineAdapter, EngineEvent, RawEngineEvent};
use crate::arbiter::{TokenArbiter, TokenSlot};
use crate::types::{
    CommandToken, FrameProgress, FrameRange, HostOutputs, InstanceId, PlaybackStatus,
};

/// Commands carried by one host refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostCommand<'a> {
    pub start_token: Option<&'a str>,
    pub pause_token: Option<&'a str>,
    pub stop_token: Option<&'a str>,
    pub frame_range: Option<FrameRange>,
    pub speed: Option<f64>,
}

/// Notifications for the host binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    /// First frame after a play.
    Started { current_frame: f64, total_frame: f64 },
    Paused { current_frame: f64 },
    Stopped,
    Completed { current_frame: f64 },
    /// Host should re-read outputs.
    OutputChanged,
}

pub struct PlaybackController<E: AnimationEngine> {
    status: PlaybackStatus,
    progress: FrameProgress,
    resume_point: Option<f64>,
    awaiting_first_frame: bool,
    arbiter: TokenArbiter,
    adapter: Option<EngineAdapter<E>>,
    default_speed: f64,
}

impl<E: AnimationEngine> PlaybackController<E> {
    pub fn new(default_speed: f64) -> Self {
        PlaybackController {
            status: PlaybackStatus::Stopped,
            progress: FrameProgress::default(),
            resume_point: None,
            awaiting_first_frame: false,
            arbiter: TokenArbiter::new(),
            adapter: None,
            default_speed,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn progress(&self) -> FrameProgress {
        self.progress
    }

    pub fn resume_point(&self) -> Option<f64> {
        self.resume_point
    }

    pub fn is_ready(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn active_instance(&self) -> Option<InstanceId> {
        self.adapter.as_ref().map(EngineAdapter::instance)
    }

    /// Bind a freshly created engine. Any previous engine is destroyed first.
    pub fn attach(&mut self, adapter: EngineAdapter<E>) {
        self.detach();
        log::debug!("attached engine instance {}", adapter.instance().as_u32());
        self.adapter = Some(adapter);
    }

    /// Destroy the live engine, if any, and reset per-instance state.
    /// Command tokens survive so a re-delivered start does not replay the new asset.
    pub fn detach(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy();
        }
        self.status = PlaybackStatus::Stopped;
        self.progress = FrameProgress::default();
        self.resume_point = None;
        self.awaiting_first_frame = false;
    }

    /// Unmount: destroy the engine and forget every token.
    pub fn reset(&mut self) {
        self.detach();
        self.arbiter.reset();
    }

    /// Apply one host refresh. At most one of start/pause/stop acts per refresh,
    /// checked in that order. Speed is forwarded every time.
    pub fn apply(&mut self, command: &HostCommand<'_>) -> Vec<ControlEvent> {
        let mut events = Vec::new();
        if self.adapter.is_none() {
            log::trace!("engine not ready, ignoring refresh");
            return events;
        }

        let start_is_new = self.arbiter.accept(TokenSlot::Start, command.start_token);
        if start_is_new {
            // The echoed StartAnimationToken output changed.
            events.push(ControlEvent::OutputChanged);
        }

        if start_is_new && self.status != PlaybackStatus::Playing {
            self.play(command.frame_range, &mut events);
        } else if self.pause_requested(command.pause_token) {
            self.pause(&mut events);
        } else if self.stop_requested(command.stop_token) {
            self.stop(&mut events);
        } else if start_is_new {
            log::trace!("start token accepted while playing, not re-applied");
        }

        let speed = match command.speed {
            Some(speed) if speed != 0.0 && !speed.is_nan() => speed,
            _ => self.default_speed,
        };
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.set_speed(speed);
        }

        dedup_output_changed(events)
    }

    /// Begin playback under a locally minted start token.
    pub fn autoplay(
        &mut self,
        token: CommandToken,
        frame_range: Option<FrameRange>,
    ) -> Vec<ControlEvent> {
        let mut events = Vec::new();
        if self.adapter.is_none() {
            return events;
        }
        log::debug!("autoplay under token {}", token);
        self.arbiter.record_start(token);
        events.push(ControlEvent::OutputChanged);
        self.play(frame_range, &mut events);
        dedup_output_changed(events)
    }

    /// Feed one engine callback from instance `from`.
    pub fn on_engine_event(
        &mut self,
        from: InstanceId,
        raw: RawEngineEvent,
    ) -> Vec<ControlEvent> {
        let mut events = Vec::new();
        let Some(event) = self
            .adapter
            .as_mut()
            .and_then(|adapter| adapter.translate(from, raw))
        else {
            return events;
        };

        match event {
            EngineEvent::FrameEntered(progress) => {
                self.progress = progress;
                if self.awaiting_first_frame {
                    self.awaiting_first_frame = false;
                    events.push(ControlEvent::Started {
                        current_frame: progress.current_frame,
                        total_frame: progress.total_frame,
                    });
                    events.push(ControlEvent::OutputChanged);
                }
            }
            EngineEvent::Completed { current_frame } => {
                if self.status != PlaybackStatus::Playing {
                    log::trace!("completion while {:?}, ignored", self.status);
                    return events;
                }
                log::debug!("playback completed at frame {}", current_frame);
                self.progress.current_frame = current_frame;
                self.resume_point = None;
                self.awaiting_first_frame = false;
                self.status = PlaybackStatus::Stopped;
                events.push(ControlEvent::Completed { current_frame });
                events.push(ControlEvent::OutputChanged);
            }
        }
        events
    }

    pub fn outputs(&self) -> HostOutputs {
        HostOutputs {
            is_stopped: self.status == PlaybackStatus::Stopped,
            is_paused: self.status == PlaybackStatus::Paused,
            start_token: self.arbiter.active_start().map(|t| t.as_str().to_string()),
            current_frame: self.progress.current_frame,
            total_frame: self.progress.total_frame,
        }
    }

    fn pause_requested(&mut self, token: Option<&str>) -> bool {
        if !self.arbiter.accept(TokenSlot::Pause, token) {
            return false;
        }
        let fresh = token.unwrap_or_default();
        if !self.arbiter.is_active_session(fresh) {
            log::trace!("stale pause token {:?}", fresh);
            return false;
        }
        self.status == PlaybackStatus::Playing
    }

    fn stop_requested(&mut self, token: Option<&str>) -> bool {
        if !self.arbiter.accept(TokenSlot::Stop, token) {
            return false;
        }
        let fresh = token.unwrap_or_default();
        if !self.arbiter.is_active_session(fresh) {
            log::trace!("stale stop token {:?}", fresh);
            return false;
        }
        self.status != PlaybackStatus::Stopped
    }

    fn play(&mut self, frame_range: Option<FrameRange>, events: &mut Vec<ControlEvent>) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        let resume_from = self.resume_point.take();
        log::debug!(
            "play range {:?} from {:?} (was {:?})",
            frame_range,
            resume_from,
            self.status
        );
        adapter.play(frame_range, resume_from);
        self.awaiting_first_frame = true;
        self.status = PlaybackStatus::Playing;
        events.push(ControlEvent::OutputChanged);
    }

    fn pause(&mut self, events: &mut Vec<ControlEvent>) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        adapter.pause();
        let frame = self.progress.current_frame;
        log::debug!("paused at frame {}", frame);
        self.resume_point = Some(frame);
        self.status = PlaybackStatus::Paused;
        events.push(ControlEvent::Paused {
            current_frame: frame,
        });
        events.push(ControlEvent::OutputChanged);
    }

    fn stop(&mut self, events: &mut Vec<ControlEvent>) {
        let Some(adapter) = self.adapter.as_mut() else {
            return;
        };
        adapter.stop();
        log::debug!("stopped from {:?}", self.status);
        self.progress.current_frame = 0.0;
        self.resume_point = None;
        self.awaiting_first_frame = false;
        self.status = PlaybackStatus::Stopped;
        events.push(ControlEvent::Stopped);
        events.push(ControlEvent::OutputChanged);
    }
}

// One OutputChanged per batch is enough; keep it last.
fn dedup_output_changed(mut events: Vec<ControlEvent>) -> Vec<ControlEvent> {
    let changed = events.contains(&ControlEvent::OutputChanged);
    events.retain(|e| *e != ControlEvent::OutputChanged);
    if changed {
        events.push(ControlEvent::OutputChanged);
    }
    events
}
