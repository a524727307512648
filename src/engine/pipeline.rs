//! Key-down pipeline: sentinel filter, classification, foreground check,
//! modifier policy, cut-mode transition, injection.

use super::cut_mode::{CutMode, CutModeState};
use super::policy::ModifierRule;
use super::shortcut::ShortcutRole;
use crate::config::SettingsProvider;
use crate::platform::{ForegroundApp, KeyEvent, KeyInjector, TapVerdict, FINDER_BUNDLE_ID};

pub struct ShortcutPipeline {
    settings: Box<dyn SettingsProvider>,
    foreground: Box<dyn ForegroundApp>,
    injector: Box<dyn KeyInjector>,
    cut_mode: CutMode,
}

impl ShortcutPipeline {
    pub fn new(
        settings: Box<dyn SettingsProvider>,
        foreground: Box<dyn ForegroundApp>,
        injector: Box<dyn KeyInjector>,
    ) -> Self {
        Self {
            settings,
            foreground,
            injector,
            cut_mode: CutMode::new(),
        }
    }

    pub fn cut_mode(&self) -> CutModeState {
        self.cut_mode.state()
    }

    pub fn reset(&mut self) {
        self.cut_mode.reset();
    }

    pub fn handle_key_down(&mut self, event: &KeyEvent) -> TapVerdict {
        // Must stay first: our own output comes back through the same tap.
        if event.is_injected() {
            return TapVerdict::PassThrough;
        }

        // Classification is a plain match; do it before the foreground query
        // and the settings read so ordinary typing stays cheap.
        let Some(role) = ShortcutRole::classify(event.key_code) else {
            return TapVerdict::PassThrough;
        };

        if !self.foreground.is_frontmost(FINDER_BUNDLE_ID) {
            return TapVerdict::PassThrough;
        }

        let modifier = self.settings.shortcut_modifier();
        if !ModifierRule::for_modifier(modifier).matches(event.flags) {
            return TapVerdict::PassThrough;
        }

        let transition = self.cut_mode.on_shortcut(role, event.autorepeat);
        log::debug!(
            "pipeline: {:?} {:?}{} -> {:?}",
            role,
            event.flags,
            if event.autorepeat { " (repeat)" } else { "" },
            transition.verdict
        );

        if let Some(combo) = transition.inject {
            if let Err(e) = self.injector.post(combo.key_code, combo.flags) {
                // The physical key is already swallowed; losing the combo only
                // loses the shortcut.
                log::warn!("pipeline: dropped {combo:?}: {e}");
            }
        }

        transition.verdict
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
