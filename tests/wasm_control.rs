#![cfg(target_arch = "wasm32")]
use std::rc::Rc;

use js_sys::{Function, Promise, Reflect};
use lottie_control::{HostOutputs, LottieControlHandle};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

// Fake AnimationItem: records every call into `globalThis.__engineCalls`.
// Like lottie-web, it emits enterFrame from inside playSegments/goToAndPlay
// when `globalThis.__onEnterFrame` is installed.
fn fake_loader() -> Function {
    Function::new_with_args(
        "data, options, id",
        r#"
        globalThis.__engineCalls = globalThis.__engineCalls || [];
        const log = (name, args) => globalThis.__engineCalls.push([id, name, ...args]);
        return {
            playSegments: (...a) => {
                log('playSegments', a);
                if (globalThis.__onEnterFrame) globalThis.__onEnterFrame(id, a[0][0], 60);
            },
            goToAndPlay: (...a) => {
                log('goToAndPlay', a);
                if (globalThis.__onEnterFrame) globalThis.__onEnterFrame(id, a[0], 60);
            },
            pause: () => log('pause', []),
            stop: () => log('stop', []),
            setSpeed: (...a) => log('setSpeed', a),
            destroy: () => log('destroy', []),
        };
        "#,
    )
}

fn fake_fetch() -> Function {
    Function::new_with_args("url", "return Promise.resolve('{\"v\":\"5.7.0\"}');")
}

fn noop() -> Function {
    Function::new_no_args("")
}

fn engine_calls(name: &str) -> usize {
    let calls = Reflect::get(&js_sys::global(), &"__engineCalls".into()).unwrap();
    if calls.is_undefined() {
        return 0;
    }
    js_sys::Array::from(&calls)
        .iter()
        .filter(|call| js_sys::Array::from(call).get(1).as_string().as_deref() == Some(name))
        .count()
}

async fn tick() {
    let set_timeout: Function = Reflect::get(&js_sys::global(), &"setTimeout".into())
        .unwrap()
        .dyn_into()
        .unwrap();
    let promise = Promise::new(&mut |resolve, _| {
        set_timeout
            .call2(&JsValue::NULL, &resolve, &JsValue::from(10))
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

fn outputs(handle: &LottieControlHandle) -> HostOutputs {
    serde_json::from_str(&handle.get_outputs().unwrap()).unwrap()
}

#[wasm_bindgen_test]
fn rejects_bad_config() {
    assert!(LottieControlHandle::new("{oops", fake_loader(), fake_fetch(), noop()).is_err());
}

#[wasm_bindgen_test]
fn invalid_url_leaves_outputs_alone() {
    let handle = LottieControlHandle::new("", fake_loader(), fake_fetch(), noop()).unwrap();
    handle
        .update_view(r#"{"LottieAnimationURL":"not a url!!","StartAnimationToken":"A"}"#)
        .unwrap();

    let out = outputs(&handle);
    assert!(out.is_stopped);
    assert_eq!(out.start_token, None);
}

#[wasm_bindgen_test]
async fn start_pause_resume_through_js() {
    let handle = LottieControlHandle::new("", fake_loader(), fake_fetch(), noop()).unwrap();
    let url = "https://assets.example.com/anim.json";

    handle
        .update_view(&format!(r#"{{"LottieAnimationURL":"{url}"}}"#))
        .unwrap();
    tick().await;

    let plays_before = engine_calls("playSegments");
    handle
        .update_view(&format!(
            r#"{{"LottieAnimationURL":"{url}","StartAnimationToken":"A","StartEndFrame":"10,20"}}"#
        ))
        .unwrap();
    assert_eq!(engine_calls("playSegments"), plays_before + 1);
    assert!(!outputs(&handle).is_stopped);

    handle.on_enter_frame(1, 15.0, 60.0);
    handle
        .update_view(&format!(
            r#"{{"LottieAnimationURL":"{url}","StartAnimationToken":"A","PauseAnimationToken":"A","StartEndFrame":"10,20"}}"#
        ))
        .unwrap();

    let out = outputs(&handle);
    assert!(out.is_paused);
    assert_eq!(out.current_frame, 15.0);
    assert_eq!(out.total_frame, 60.0);

    handle.destroy();
    assert!(engine_calls("destroy") >= 1);
}

#[wasm_bindgen_test]
async fn enter_frame_fired_during_play_is_applied() {
    let handle =
        Rc::new(LottieControlHandle::new("", fake_loader(), fake_fetch(), noop()).unwrap());
    let url = "https://assets.example.com/sync.json";

    let callback_handle = Rc::clone(&handle);
    let on_enter_frame = Closure::wrap(Box::new(move |id: u32, current: f64, total: f64| {
        callback_handle.on_enter_frame(id, current, total);
    }) as Box<dyn Fn(u32, f64, f64)>);
    Reflect::set(
        &js_sys::global(),
        &"__onEnterFrame".into(),
        on_enter_frame.as_ref(),
    )
    .unwrap();

    handle
        .update_view(&format!(r#"{{"LottieAnimationURL":"{url}"}}"#))
        .unwrap();
    tick().await;
    handle
        .update_view(&format!(
            r#"{{"LottieAnimationURL":"{url}","StartAnimationToken":"A","StartEndFrame":"10,20"}}"#
        ))
        .unwrap();

    // The frame arrived while the control was busy and was applied afterwards.
    let out = outputs(&handle);
    assert!(!out.is_stopped);
    assert_eq!(out.current_frame, 10.0);
    assert_eq!(out.total_frame, 60.0);

    Reflect::set(&js_sys::global(), &"__onEnterFrame".into(), &JsValue::UNDEFINED).unwrap();
    handle.destroy();
    drop(on_enter_frame);
}
