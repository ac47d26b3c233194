// Animation engine adapter: owns one live engine handle and speaks its low-level command set.
// Engine-native callbacks come in as RawEngineEvent and leave as typed EngineEvent.
// See DESIGN.md: adapter

use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::types::{AnimationAsset, EngineOptions, FrameProgress, FrameRange, InstanceId};

/// Low-level commands of the external playback engine.
pub trait AnimationEngine {
    /// Play `[start, end]`, forcing the jump even if already inside the segment.
    fn play_segment(&mut self, start: f64, end: f64);
    fn go_to_and_play(&mut self, frame: f64);
    fn pause(&mut self);
    fn stop(&mut self);
    fn set_speed(&mut self, speed: f64);
    /// Unbind listeners and release render resources.
    fn destroy(&mut self);
}

/// Creates engine instances bound to the control's rendering surface.
pub trait EngineFactory {
    type Engine: AnimationEngine;

    fn instantiate(
        &mut self,
        asset: &AnimationAsset,
        options: &EngineOptions,
        instance: InstanceId,
    ) -> Result<Self::Engine, ControlError>;
}

/// Callback shapes as the engine emits them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RawEngineEvent {
    #[serde(rename_all = "camelCase")]
    EnterFrame { current_time: f64, total_time: f64 },
    Complete,
}

/// Engine callbacks as the controller consumes them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    FrameEntered(FrameProgress),
    Completed { current_frame: f64 },
}

/// Owned handle to one live engine instance.
pub struct EngineAdapter<E: AnimationEngine> {
    engine: E,
    instance: InstanceId,
    last_frame: f64,
    destroyed: bool,
}

impl<E: AnimationEngine> EngineAdapter<E> {
    pub fn new(engine: E, instance: InstanceId) -> Self {
        EngineAdapter {
            engine,
            instance,
            last_frame: 0.0,
            destroyed: false,
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Start playback of `range` (full asset when absent), continuing from
    /// `resume_from` instead of the range start when given.
    pub fn play(&mut self, range: Option<FrameRange>, resume_from: Option<f64>) {
        if self.destroyed {
            return;
        }
        match range {
            Some(range) => {
                let start = resume_from.unwrap_or(range.start() as f64);
                self.engine.play_segment(start, range.end() as f64);
            }
            None => self.engine.go_to_and_play(resume_from.unwrap_or(0.0)),
        }
    }

    pub fn pause(&mut self) {
        if !self.destroyed {
            self.engine.pause();
        }
    }

    pub fn stop(&mut self) {
        if !self.destroyed {
            self.engine.stop();
            self.last_frame = 0.0;
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        if !self.destroyed {
            self.engine.set_speed(speed);
        }
    }

    /// Translate a callback from instance `from`. Events from any other
    /// instance, or after destroy, are dropped.
    pub fn translate(&mut self, from: InstanceId, raw: RawEngineEvent) -> Option<EngineEvent> {
        if self.destroyed || from != self.instance {
            log::trace!(
                "dropping {:?} from instance {} (live: {})",
                raw,
                from.as_u32(),
                self.instance.as_u32()
            );
            return None;
        }

        match raw {
            RawEngineEvent::EnterFrame {
                current_time,
                total_time,
            } => {
                self.last_frame = current_time;
                Some(EngineEvent::FrameEntered(FrameProgress {
                    current_frame: current_time,
                    total_frame: total_time,
                }))
            }
            RawEngineEvent::Complete => Some(EngineEvent::Completed {
                current_frame: self.last_frame,
            }),
        }
    }

    /// Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        log::debug!("destroying engine instance {}", self.instance.as_u32());
        self.engine.destroy();
        self.destroyed = true;
    }
}

impl<E: AnimationEngine> Drop for EngineAdapter<E> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Engine call as recorded by `RecordingEngine`.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        PlaySegment(f64, f64),
        GoToAndPlay(f64),
        Pause,
        Stop,
        SetSpeed(f64),
        Destroy,
    }

    /// Shared log so tests can inspect calls after the engine is dropped.
    pub type CallLog = Rc<RefCell<Vec<(InstanceId, Call)>>>;

    pub struct RecordingEngine {
        pub instance: InstanceId,
        pub calls: CallLog,
    }

    impl RecordingEngine {
        fn record(&self, call: Call) {
            self.calls.borrow_mut().push((self.instance, call));
        }
    }

    impl AnimationEngine for RecordingEngine {
        fn play_segment(&mut self, start: f64, end: f64) {
            self.record(Call::PlaySegment(start, end));
        }
        fn go_to_and_play(&mut self, frame: f64) {
            self.record(Call::GoToAndPlay(frame));
        }
        fn pause(&mut self) {
            self.record(Call::Pause);
        }
        fn stop(&mut self) {
            self.record(Call::Stop);
        }
        fn set_speed(&mut self, speed: f64) {
            self.record(Call::SetSpeed(speed));
        }
        fn destroy(&mut self) {
            self.record(Call::Destroy);
        }
    }

    #[derive(Default)]
    pub struct RecordingFactory {
        pub calls: CallLog,
        pub created: Vec<(InstanceId, String, EngineOptions)>,
        pub fail_next: bool,
    }

    impl EngineFactory for RecordingFactory {
        type Engine = RecordingEngine;

        fn instantiate(
            &mut self,
            asset: &AnimationAsset,
            options: &EngineOptions,
            instance: InstanceId,
        ) -> Result<RecordingEngine, ControlError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(ControlError::EngineCreation("bad asset".to_string()));
            }
            self.created
                .push((instance, asset.source_url.clone(), options.clone()));
            Ok(RecordingEngine {
                instance,
                calls: Rc::clone(&self.calls),
            })
        }
    }

    pub fn recording_adapter(id: u32) -> (EngineAdapter<RecordingEngine>, CallLog) {
        let calls = CallLog::default();
        let engine = RecordingEngine {
            instance: InstanceId::new(id),
            calls: Rc::clone(&calls),
        };
        (EngineAdapter::new(engine, InstanceId::new(id)), calls)
    }

    pub fn calls_of(log: &CallLog) -> Vec<Call> {
        log.borrow().iter().map(|(_, call)| call.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn play_range_resumes_from_recorded_frame() {
        let (mut adapter, calls) = recording_adapter(1);
        let range = FrameRange::new(10, 20).unwrap();

        adapter.play(Some(range), None);
        adapter.play(Some(range), Some(15.0));
        adapter.play(None, None);
        adapter.play(None, Some(42.0));

        assert_eq!(
            calls_of(&calls),
            vec![
                Call::PlaySegment(10.0, 20.0),
                Call::PlaySegment(15.0, 20.0),
                Call::GoToAndPlay(0.0),
                Call::GoToAndPlay(42.0),
            ]
        );
    }

    #[test]
    fn complete_carries_last_entered_frame() {
        let (mut adapter, _calls) = recording_adapter(1);
        let id = adapter.instance();

        adapter.translate(
            id,
            RawEngineEvent::EnterFrame {
                current_time: 59.5,
                total_time: 60.0,
            },
        );
        assert_eq!(
            adapter.translate(id, RawEngineEvent::Complete),
            Some(EngineEvent::Completed {
                current_frame: 59.5
            })
        );
    }

    #[test]
    fn events_from_other_instances_dropped() {
        let (mut adapter, _calls) = recording_adapter(2);
        let stale = InstanceId::new(1);
        assert_eq!(adapter.translate(stale, RawEngineEvent::Complete), None);
    }

    #[test]
    fn destroy_is_idempotent_and_silences_engine() {
        let (mut adapter, calls) = recording_adapter(1);
        adapter.destroy();
        adapter.destroy();
        adapter.pause();
        let id = adapter.instance();
        assert_eq!(adapter.translate(id, RawEngineEvent::Complete), None);
        drop(adapter);

        assert_eq!(calls_of(&calls), vec![Call::Destroy]);
    }

    #[test]
    fn drop_destroys_live_engine() {
        let (adapter, calls) = recording_adapter(1);
        drop(adapter);
        assert_eq!(calls_of(&calls), vec![Call::Destroy]);
    }

    #[test]
    fn raw_events_use_engine_field_names() {
        let raw: RawEngineEvent =
            serde_json::from_str(r#"{"type":"enterFrame","currentTime":3.0,"totalTime":90.0}"#)
                .unwrap();
        assert_eq!(
            raw,
            RawEngineEvent::EnterFrame {
                current_time: 3.0,
                total_time: 90.0
            }
        );
        let raw: RawEngineEvent = serde_json::from_str(r#"{"type":"complete"}"#).unwrap();
        assert_eq!(raw, RawEngineEvent::Complete);
    }
}
