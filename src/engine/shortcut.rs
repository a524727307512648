//! Shortcut classification by physical key code.
//!
//! Key codes are ANSI positions per HIToolbox/Events.h, so the C/X/V keys are
//! recognised regardless of the active keyboard layout.

use super::policy::ModifierFlags;

/// kVK_ANSI_C
pub const KEY_C: u16 = 0x08;
/// kVK_ANSI_X
pub const KEY_X: u16 = 0x07;
/// kVK_ANSI_V
pub const KEY_V: u16 = 0x09;

/// Role of a recognised shortcut key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutRole {
    Copy,
    Cut,
    Paste,
}

impl ShortcutRole {
    /// Maps a physical key code to its role. Modifier and auto-repeat state
    /// are the caller's concern.
    pub const fn classify(key_code: u16) -> Option<Self> {
        match key_code {
            KEY_C => Some(Self::Copy),
            KEY_X => Some(Self::Cut),
            KEY_V => Some(Self::Paste),
            _ => None,
        }
    }

    #[cfg(test)]
    pub const fn key_code(self) -> u16 {
        match self {
            Self::Copy => KEY_C,
            Self::Cut => KEY_X,
            Self::Paste => KEY_V,
        }
    }
}

/// A key code plus the exact modifier mask to stamp on a synthetic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub key_code: u16,
    pub flags: ModifierFlags,
}

impl KeyCombo {
    /// Cmd+C: what Finder understands as "copy the selection".
    pub const COPY: Self = Self {
        key_code: KEY_C,
        flags: ModifierFlags::COMMAND,
    };

    /// Cmd+Option+V: Finder's "move item here".
    pub const MOVE_PASTE: Self = Self {
        key_code: KEY_V,
        flags: ModifierFlags::COMMAND.union(ModifierFlags::ALTERNATE),
    };
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
