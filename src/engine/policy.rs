//! Modifier policy resolution.
//!
//! `ModifierFlags` mirrors the CGEventFlags bit layout so values read from a
//! live event can be compared directly. `ModifierRule::for_modifier` maps the
//! configured `ShortcutModifier` to a required/disallowed pair.

use std::fmt;
use std::ops::BitOr;

use crate::config::ShortcutModifier;

// ---------------------------------------------------------------------------
// Modifier flags
// ---------------------------------------------------------------------------

/// Modifier bitmask with CGEventFlags layout.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ModifierFlags(u64);

impl ModifierFlags {
    #[cfg(test)]
    pub const NONE: Self = Self(0);
    /// kCGEventFlagMaskShift
    pub const SHIFT: Self = Self(0x0002_0000);
    /// kCGEventFlagMaskControl
    pub const CONTROL: Self = Self(0x0004_0000);
    /// kCGEventFlagMaskAlternate (Option)
    pub const ALTERNATE: Self = Self(0x0008_0000);
    /// kCGEventFlagMaskCommand
    pub const COMMAND: Self = Self(0x0010_0000);
    /// kCGEventFlagMaskSecondaryFn (Fn / Globe)
    pub const SECONDARY_FN: Self = Self(0x0080_0000);

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if `self` and `other` share at least one bit.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ModifierFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for ModifierFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ModifierFlags, &str); 5] = [
            (ModifierFlags::CONTROL, "Ctrl"),
            (ModifierFlags::ALTERNATE, "Alt"),
            (ModifierFlags::SHIFT, "Shift"),
            (ModifierFlags::COMMAND, "Cmd"),
            (ModifierFlags::SECONDARY_FN, "Fn"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Modifier rule
// ---------------------------------------------------------------------------

/// Required / disallowed modifier pair derived from a `ShortcutModifier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifierRule {
    pub required: ModifierFlags,
    pub disallowed: ModifierFlags,
}

impl ModifierRule {
    pub const fn for_modifier(modifier: ShortcutModifier) -> Self {
        use ModifierFlags as M;
        match modifier {
            ShortcutModifier::Control => Self {
                required: M::CONTROL,
                disallowed: M::COMMAND
                    .union(M::ALTERNATE)
                    .union(M::SHIFT)
                    .union(M::SECONDARY_FN),
            },
            ShortcutModifier::Command => Self {
                required: M::COMMAND,
                disallowed: M::CONTROL
                    .union(M::ALTERNATE)
                    .union(M::SHIFT)
                    .union(M::SECONDARY_FN),
            },
            ShortcutModifier::Function => Self {
                required: M::SECONDARY_FN,
                disallowed: M::CONTROL
                    .union(M::COMMAND)
                    .union(M::ALTERNATE)
                    .union(M::SHIFT),
            },
        }
    }

    /// A chord qualifies when it holds the required modifier and none of the
    /// disallowed ones. Unrelated bits (caps lock, numeric pad) are ignored.
    pub const fn matches(&self, flags: ModifierFlags) -> bool {
        flags.contains(self.required) && !flags.intersects(self.disallowed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
