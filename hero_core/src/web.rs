// Browser implementations of the host traits over web-sys and gloo.
// Nothing here decides anything; the controller and gate do.

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, LocalFutureObj};
use futures::task::{LocalSpawn, SpawnError};
use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use js_sys::{Function, Reflect};
use tracing::{debug, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{DomException, EventTarget, HtmlElement, HtmlMediaElement, HtmlVideoElement};

use crate::error::{HeroError, MediaError};
use crate::host::{GestureSource, Handle, MediaElement, MediaEvent, Scheduler, ScrollLock};
use crate::types::{GestureKind, Millis};

/// Drop `value` on a later task. A listener or timer may be detached from inside
/// its own callback, and its closure must outlive that call.
fn drop_later<T: 'static>(value: T) {
    wasm_bindgen_futures::spawn_local(async move { drop(value) });
}

fn describe(value: &JsValue) -> String {
    match value.dyn_ref::<DomException>() {
        Some(exception) => exception.name(),
        None => value.as_string().unwrap_or_else(|| format!("{value:?}")),
    }
}

// =============================================================================
// Media
// =============================================================================

/// The hero `<video>` element.
pub struct VideoElement {
    element: HtmlVideoElement,
}

impl VideoElement {
    /// Wraps the element and forces the attributes autoplay policies look at:
    /// muted, inline and looping.
    pub fn new(element: HtmlVideoElement) -> Self {
        element.set_muted(true);
        element.set_default_muted(true);
        element.set_loop(true);
        if let Err(err) = element.set_attribute("playsinline", "") {
            debug!(error = %describe(&err), "could not set playsinline");
        }
        VideoElement { element }
    }

    /// Point the element at `src` unless it already plays it.
    pub fn load_source(&self, src: &str) {
        if self.element.current_src().ends_with(src) {
            return;
        }
        self.element.set_src(src);
        self.element.load();
    }

    fn media(&self) -> &HtmlMediaElement {
        self.element.unchecked_ref()
    }

    fn failure_reason(&self) -> String {
        match self.media().error() {
            Some(error) => match error.code() {
                web_sys::MediaError::MEDIA_ERR_ABORTED => "MEDIA_ERR_ABORTED".to_string(),
                web_sys::MediaError::MEDIA_ERR_NETWORK => "MEDIA_ERR_NETWORK".to_string(),
                web_sys::MediaError::MEDIA_ERR_DECODE => "MEDIA_ERR_DECODE".to_string(),
                web_sys::MediaError::MEDIA_ERR_SRC_NOT_SUPPORTED => {
                    "MEDIA_ERR_SRC_NOT_SUPPORTED".to_string()
                }
                code => format!("media error code {code}"),
            },
            None => "unknown media error".to_string(),
        }
    }
}

impl MediaElement for VideoElement {
    fn request_play(&self) -> LocalBoxFuture<'static, Result<(), MediaError>> {
        // Called synchronously so the request carries the current gesture activation.
        let promise = self.media().play();
        async move {
            let promise = promise.map_err(|err| MediaError::PlaybackRejected(describe(&err)))?;
            JsFuture::from(promise)
                .await
                .map(|_| ())
                .map_err(|err| MediaError::PlaybackRejected(describe(&err)))
        }
        .boxed_local()
    }

    fn pause(&self) {
        if let Err(err) = self.media().pause() {
            debug!(error = %describe(&err), "pause failed");
        }
    }

    fn rewind(&self) {
        self.media().set_current_time(0.0);
    }

    fn is_paused(&self) -> bool {
        self.media().paused()
    }

    fn has_data(&self) -> bool {
        self.media().ready_state() >= HtmlMediaElement::HAVE_CURRENT_DATA
    }

    fn subscribe(&self, listener: Rc<dyn Fn(MediaEvent)>) -> Handle {
        let on_data = Rc::clone(&listener);
        let loaded = EventListener::new(&self.element, "loadeddata", move |_| {
            on_data(MediaEvent::DataReady)
        });

        let element = VideoElement {
            element: self.element.clone(),
        };
        let failed = EventListener::new(&self.element, "error", move |_| {
            listener(MediaEvent::LoadFailed(element.failure_reason()))
        });

        Handle::new(move || drop_later((loaded, failed)))
    }
}

// =============================================================================
// Gestures, timers, tasks
// =============================================================================

/// Ambient gestures on a page-level target. Listeners are passive.
pub struct DomGestures {
    target: EventTarget,
}

impl DomGestures {
    pub fn new(target: EventTarget) -> Self {
        DomGestures { target }
    }
}

impl GestureSource for DomGestures {
    fn listen(&self, kind: GestureKind, callback: Rc<dyn Fn(GestureKind)>) -> Handle {
        let listener = EventListener::new(&self.target, kind.event_name(), move |_| callback(kind));
        Handle::new(move || drop_later(listener))
    }
}

/// `setTimeout` through gloo-timers.
#[derive(Debug, Default)]
pub struct GlooScheduler;

impl Scheduler for GlooScheduler {
    fn set_timeout(&self, delay: Millis, callback: Box<dyn FnOnce()>) -> Handle {
        let timeout = Timeout::new(delay.as_u32(), callback);
        Handle::new(move || drop_later(timeout.cancel()))
    }
}

/// Spawns onto the browser microtask queue.
#[derive(Debug, Default)]
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

// =============================================================================
// Scroll
// =============================================================================

/// A smooth-scroll library instance exposing `stop()` and `start()`.
pub struct SmoothScrollLock {
    instance: JsValue,
}

impl SmoothScrollLock {
    pub fn new(instance: JsValue) -> Self {
        SmoothScrollLock { instance }
    }

    fn call(&self, method: &str) {
        let result = Reflect::get(&self.instance, &JsValue::from_str(method))
            .and_then(|value| value.dyn_into::<Function>())
            .and_then(|function| function.call0(&self.instance));
        if let Err(err) = result {
            warn!(method, error = %describe(&err), "smooth scroll call failed");
        }
    }
}

impl ScrollLock for SmoothScrollLock {
    fn suspend(&self) {
        self.call("stop");
    }

    fn resume(&self) {
        self.call("start");
    }
}

/// Fallback when the page has no smooth-scroll instance: `overflow: hidden` on body.
pub struct OverflowScrollLock {
    body: HtmlElement,
}

impl OverflowScrollLock {
    pub fn from_document() -> Result<Self, HeroError> {
        let body = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.body())
            .ok_or_else(|| HeroError::Dom("document has no body".to_string()))?;
        Ok(OverflowScrollLock { body })
    }
}

impl ScrollLock for OverflowScrollLock {
    fn suspend(&self) {
        if let Err(err) = self.body.style().set_property("overflow", "hidden") {
            warn!(error = %describe(&err), "could not lock body scroll");
        }
    }

    fn resume(&self) {
        if let Err(err) = self.body.style().remove_property("overflow") {
            warn!(error = %describe(&err), "could not unlock body scroll");
        }
    }
}
