// lottie_control: Rust/WASM playback control for an embedded Lottie player.
// All state and policy live here; the host page only forwards property bags,
// engine callbacks, and fetch results.

mod adapter;
mod arbiter;
mod control;
mod controller;
mod error;
mod js_engine;
mod source;
mod types;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

pub use adapter::{AnimationEngine, EngineAdapter, EngineEvent, EngineFactory, RawEngineEvent};
pub use arbiter::{TokenArbiter, TokenSlot};
pub use control::{CreationOutcome, CreationRequest, CreationState, LottieControl, ViewUpdate};
pub use controller::{ControlEvent, HostCommand, PlaybackController};
pub use error::ControlError;
pub use js_engine::{JsEngine, JsEngineFactory};
pub use source::{is_valid_url, parse_frame_range};
pub use types::*;

/// Initialize panic hook and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    // A second module instance on the page already installed the logger.
    let _ = console_log::init_with_level(log::Level::Info);
}

/// Parse the JSON configuration handed over by the host page.
pub fn parse_config(config_json: &str) -> Result<ControlConfig, ControlError> {
    if config_json.trim().is_empty() {
        return Ok(ControlConfig::default());
    }
    Ok(serde_json::from_str(config_json)?)
}

/// Host page callbacks.
struct JsHost {
    fetch_asset: Function,
    notify_output_changed: Function,
}

impl JsHost {
    async fn fetch(&self, request: &CreationRequest) -> Result<Vec<u8>, ControlError> {
        let failed = |message: String| ControlError::FetchFailed {
            url: request.url.clone(),
            attempt: request.attempt,
            message,
        };

        let promise: Promise = self
            .fetch_asset
            .call1(&JsValue::NULL, &JsValue::from_str(&request.url))
            .and_then(|p| p.dyn_into::<Promise>().map_err(JsValue::from))
            .map_err(|e| failed(format!("{:?}", e)))?;
        let body = JsFuture::from(promise)
            .await
            .map_err(|e| failed(format!("{:?}", e)))?;

        body.as_string()
            .map(String::into_bytes)
            .ok_or_else(|| failed("response body is not text".to_string()))
    }

    fn publish(&self, events: &[ControlEvent]) {
        for event in events {
            log::debug!("control event: {:?}", event);
        }
        if events.contains(&ControlEvent::OutputChanged) {
            if let Err(e) = self.notify_output_changed.call0(&JsValue::NULL) {
                log::warn!("notifyOutputChanged threw: {:?}", e);
            }
        }
    }
}

type SharedControl = Rc<RefCell<LottieControl<JsEngineFactory>>>;
type EventQueue = Rc<RefCell<VecDeque<(InstanceId, RawEngineEvent)>>>;

/// Control instance exposed to JavaScript. One per mounted container.
///
/// Engine callbacks may fire synchronously from inside an engine command
/// (e.g. `goToAndPlay` renders and emits `enterFrame`), so they are queued and
/// drained once the control is free rather than applied re-entrantly.
#[wasm_bindgen]
pub struct LottieControlHandle {
    control: SharedControl,
    host: Rc<JsHost>,
    queue: EventQueue,
}

#[wasm_bindgen]
impl LottieControlHandle {
    /// Create a control.
    ///
    /// # Arguments
    /// * `config_json` - JSON `ControlConfig`; empty string for defaults
    /// * `load_animation` - `(data, options, instanceId) => AnimationItem`
    /// * `fetch_asset` - `(url) => Promise<string>`
    /// * `notify_output_changed` - `() => void`
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: &str,
        load_animation: Function,
        fetch_asset: Function,
        notify_output_changed: Function,
    ) -> Result<LottieControlHandle, JsValue> {
        let config = parse_config(config_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;

        Ok(LottieControlHandle {
            control: Rc::new(RefCell::new(LottieControl::new(
                config,
                JsEngineFactory::new(load_animation),
            ))),
            host: Rc::new(JsHost {
                fetch_asset,
                notify_output_changed,
            }),
            queue: EventQueue::default(),
        })
    }

    /// Apply a host property bag (JSON `HostInputs`).
    pub fn update_view(&self, props_json: &str) -> Result<(), JsValue> {
        let inputs: HostInputs = serde_json::from_str(props_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid properties: {}", e)))?;

        let update = self.control.borrow_mut().update_view(&inputs);
        self.host.publish(&update.events);
        drain(&self.control, &self.host, &self.queue);

        if let Some(request) = update.request {
            spawn_creation(
                Rc::clone(&self.control),
                Rc::clone(&self.host),
                Rc::clone(&self.queue),
                request,
            );
        }
        Ok(())
    }

    /// Engine `enterFrame` callback.
    pub fn on_enter_frame(&self, instance: u32, current_frame: f64, total_frame: f64) {
        self.queue.borrow_mut().push_back((
            InstanceId::new(instance),
            RawEngineEvent::EnterFrame {
                current_time: current_frame,
                total_time: total_frame,
            },
        ));
        drain(&self.control, &self.host, &self.queue);
    }

    /// Engine `complete` callback.
    pub fn on_complete(&self, instance: u32) {
        self.queue
            .borrow_mut()
            .push_back((InstanceId::new(instance), RawEngineEvent::Complete));
        drain(&self.control, &self.host, &self.queue);
    }

    /// Current outputs as JSON `HostOutputs`.
    pub fn get_outputs(&self) -> Result<String, JsValue> {
        let outputs = self.control.borrow().outputs();
        serde_json::to_string(&outputs)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Unmount: destroys the engine and resets tokens.
    pub fn destroy(&self) {
        self.queue.borrow_mut().clear();
        self.control.borrow_mut().destroy();
    }
}

/// Apply queued engine callbacks unless the control is already busy;
/// whoever holds it drains on the way out.
fn drain(control: &SharedControl, host: &JsHost, queue: &EventQueue) {
    loop {
        let Some((instance, raw)) = queue.borrow_mut().pop_front() else {
            return;
        };
        let events = match control.try_borrow_mut() {
            Ok(mut control) => control.on_engine_event(instance, raw),
            Err(_) => {
                queue.borrow_mut().push_front((instance, raw));
                return;
            }
        };
        host.publish(&events);
    }
}

fn spawn_creation(
    control: SharedControl,
    host: Rc<JsHost>,
    queue: EventQueue,
    mut request: CreationRequest,
) {
    wasm_bindgen_futures::spawn_local(async move {
        loop {
            if request.delay_ms > 0 {
                if let Err(e) = sleep(request.delay_ms).await {
                    log::warn!("retry timer failed: {:?}", e);
                    return;
                }
            }
            let fetched = host.fetch(&request).await;
            let outcome = control.borrow_mut().complete_creation(&request, fetched);
            host.publish(&outcome.events);
            drain(&control, &host, &queue);

            match outcome.retry {
                Some(next) => request = next,
                None => return,
            }
        }
    });
}

async fn sleep(ms: u32) -> Result<(), JsValue> {
    let set_timeout: Function = js_sys::Reflect::get(&js_sys::global(), &"setTimeout".into())?
        .dyn_into()?;
    let promise = Promise::new(&mut |resolve, _reject| {
        if let Err(e) = set_timeout.call2(&JsValue::NULL, &resolve, &JsValue::from(ms)) {
            log::warn!("setTimeout threw: {:?}", e);
        }
    });
    JsFuture::from(promise).await.map(|_| ())
}
