//! Shortcut arbitration: modifier policy, key classification, the cut-mode
//! state machine and the pipeline that ties them to the OS seams.

mod cut_mode;
mod pipeline;
mod policy;
mod shortcut;

pub use cut_mode::CutModeState;
pub use pipeline::ShortcutPipeline;
pub use policy::ModifierFlags;
#[cfg(test)]
pub use shortcut::{KeyCombo, KEY_C, KEY_V, KEY_X};
