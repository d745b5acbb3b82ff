// hero_core: intro sequencing and playback unlock for the landing-page hero.
// The crate owns every timing and autoplay decision; JS only draws the cues it is handed.

mod controller;
mod error;
mod gesture;
mod host;
mod intro;
mod logging;
mod media;
mod timeline;
mod types;
mod web;

#[cfg(test)]
mod testing;

use std::rc::Rc;

use js_sys::Function;
use tracing::warn;
use wasm_bindgen::prelude::*;
use web_sys::HtmlVideoElement;

pub use controller::{Collaborators, PageController, ScrollState, SessionOptions, SessionStatus};
pub use error::{ErrorKind, HeroError, IntroError, MediaError};
pub use gesture::{GestureSubscription, RetrySlot};
pub use host::{GestureSource, Handle, MediaElement, MediaEvent, Scheduler, ScrollLock, TimelineEngine};
pub use intro::{Advance, IntroSequencer, IntroState};
pub use media::{MediaGate, MediaStatus};
pub use timeline::ScriptedTimeline;
pub use types::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(err: HeroError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// One hero section, mounted for the lifetime of the page view.
#[wasm_bindgen]
pub struct HeroIntro {
    controller: PageController,
}

#[wasm_bindgen]
impl HeroIntro {
    /// Mounts the session. `renderer` is called with one cue name per stage
    /// (`"counter"`, `"wordmark"`, `"transition"`, `"checkpoint"`).
    /// `smooth_scroll` is the page's smooth-scroll instance, or `undefined`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: &str,
        video: HtmlVideoElement,
        renderer: Function,
        smooth_scroll: JsValue,
    ) -> Result<HeroIntro, JsValue> {
        let config = HeroConfig::from_json(config_json).map_err(to_js)?;
        logging::init(config.level().map_err(to_js)?);

        let window = web_sys::window()
            .ok_or_else(|| to_js(HeroError::Dom("no window".to_string())))?;
        // Unknown width falls through to the unconstrained path.
        let width = window
            .inner_width()
            .ok()
            .and_then(|width| width.as_f64())
            .unwrap_or(f64::INFINITY);
        let options = SessionOptions::from_config(&config, width);

        let video = web::VideoElement::new(video);
        if let Some(sources) = &config.sources {
            video.load_source(sources.select(options.profile));
        }

        let scroll_lock: Rc<dyn ScrollLock> = if smooth_scroll.is_object() {
            Rc::new(web::SmoothScrollLock::new(smooth_scroll))
        } else {
            Rc::new(web::OverflowScrollLock::from_document().map_err(to_js)?)
        };

        let scheduler: Rc<dyn Scheduler> = Rc::new(web::GlooScheduler);
        let timeline = ScriptedTimeline::new(Rc::clone(&scheduler), move |cue: StageCue| {
            if let Err(err) = renderer.call1(&JsValue::NULL, &JsValue::from_str(cue.as_str())) {
                warn!(cue = cue.as_str(), error = ?err, "intro renderer threw");
            }
        });

        let collaborators = Collaborators {
            media: Rc::new(video),
            scroll_lock,
            gestures: Rc::new(web::DomGestures::new(window.into())),
            scheduler,
            timeline: Rc::new(timeline),
            spawner: Rc::new(web::WasmSpawner),
        };

        Ok(HeroIntro {
            controller: PageController::mount(options, collaborators),
        })
    }

    /// Call from inside the enter button's tap handler.
    pub fn enter(&self) {
        self.controller.enter();
    }

    pub fn unmount(&self) {
        self.controller.unmount();
    }

    pub fn is_media_ready(&self) -> bool {
        self.controller.is_media_ready()
    }

    /// `"intro"`, `"checkpoint"`, `"finishing"` or `"entered"`.
    pub fn phase(&self) -> String {
        self.controller.intro_state().label().to_string()
    }

    /// Session snapshot as JSON.
    pub fn status(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.controller.status()).map_err(|e| to_js(e.into()))
    }
}
