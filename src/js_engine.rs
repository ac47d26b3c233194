// JS-backed engine handle and factory. The page supplies `loadAnimation(data, options, instanceId)`
// returning a lottie-web style AnimationItem; everything here is plumbing onto that object.
// See DESIGN.md: js_engine

use js_sys::{Array, Function, Reflect, JSON};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::adapter::{AnimationEngine, EngineFactory};
use crate::error::ControlError;
use crate::types::{AnimationAsset, EngineOptions, InstanceId};

/// A live JS animation item.
pub struct JsEngine {
    item: JsValue,
}

impl JsEngine {
    fn call(&self, method: &str, args: &[JsValue]) {
        let result = Reflect::get(&self.item, &JsValue::from_str(method))
            .and_then(|f| f.dyn_into::<Function>().map_err(JsValue::from))
            .and_then(|f| f.apply(&self.item, &args.iter().collect::<Array>()));
        if let Err(e) = result {
            log::warn!("engine call {} failed: {:?}", method, e);
        }
    }
}

impl AnimationEngine for JsEngine {
    fn play_segment(&mut self, start: f64, end: f64) {
        let segment = Array::of2(&JsValue::from(start), &JsValue::from(end));
        self.call("playSegments", &[segment.into(), JsValue::TRUE]);
    }

    fn go_to_and_play(&mut self, frame: f64) {
        self.call("goToAndPlay", &[JsValue::from(frame), JsValue::TRUE]);
    }

    fn pause(&mut self) {
        self.call("pause", &[]);
    }

    fn stop(&mut self) {
        self.call("stop", &[]);
    }

    fn set_speed(&mut self, speed: f64) {
        self.call("setSpeed", &[JsValue::from(speed)]);
    }

    fn destroy(&mut self) {
        self.call("destroy", &[]);
    }
}

/// Creates engines through the page's loader function.
pub struct JsEngineFactory {
    load_animation: Function,
}

impl JsEngineFactory {
    pub fn new(load_animation: Function) -> Self {
        JsEngineFactory { load_animation }
    }
}

impl EngineFactory for JsEngineFactory {
    type Engine = JsEngine;

    fn instantiate(
        &mut self,
        asset: &AnimationAsset,
        options: &EngineOptions,
        instance: InstanceId,
    ) -> Result<JsEngine, ControlError> {
        let text = std::str::from_utf8(&asset.data).map_err(|e| {
            ControlError::EngineCreation(format!("{} is not UTF-8: {}", asset.source_url, e))
        })?;
        let data = JSON::parse(text).map_err(|e| {
            ControlError::EngineCreation(format!("{} is not JSON: {:?}", asset.source_url, e))
        })?;
        let options = JSON::parse(&serde_json::to_string(options)?)
            .map_err(|e| ControlError::Serialization(format!("{:?}", e)))?;

        let item = self
            .load_animation
            .call3(
                &JsValue::NULL,
                &data,
                &options,
                &JsValue::from(instance.as_u32()),
            )
            .map_err(|e| ControlError::EngineCreation(format!("loadAnimation threw: {:?}", e)))?;

        if item.is_undefined() || item.is_null() {
            return Err(ControlError::EngineCreation(
                "loadAnimation returned nothing".to_string(),
            ));
        }
        Ok(JsEngine { item })
    }
}
