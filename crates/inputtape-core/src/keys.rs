//! Virtual-key <-> symbol table and end-key equivalence classes
//!
//! Symbols are the names written to the event log, so they must never
//! change once released. Codes follow the Windows virtual-key numbering
//! for a US standard keyboard.

use crate::error::{Error, Result};
use std::fmt;

/// Common virtual key codes
pub mod vk {
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const ALT: u16 = 0x12;
    pub const ESCAPE: u16 = 0x1B;
    pub const LSHIFT: u16 = 0xA0;
    pub const RSHIFT: u16 = 0xA1;
    pub const LCONTROL: u16 = 0xA2;
    pub const RCONTROL: u16 = 0xA3;
    pub const LALT: u16 = 0xA4;
    pub const RALT: u16 = 0xA5;
}

const KEY_TABLE: &[(u16, &str)] = &[
    (0x08, "BACKSPACE"),
    (0x09, "TAB"),
    (0x0C, "CLEAR"),
    (0x0D, "ENTER"),
    (0x10, "SHIFT"),
    (0x11, "CTRL"),
    (0x12, "ALT"),
    (0x13, "PAUSE"),
    (0x14, "CAPSLOCK"),
    (0x1B, "ESC"),
    (0x20, "SPACEBAR"),
    (0x21, "PAGEUP"),
    (0x22, "PAGEDOWN"),
    (0x23, "END"),
    (0x24, "HOME"),
    (0x25, "LEFT"),
    (0x26, "UP"),
    (0x27, "RIGHT"),
    (0x28, "DOWN"),
    (0x29, "SELECT"),
    (0x2A, "PRINT"),
    (0x2C, "SNAPSHOT"),
    (0x2D, "INSERT"),
    (0x2E, "DELETE"),
    (0x30, "0"),
    (0x31, "1"),
    (0x32, "2"),
    (0x33, "3"),
    (0x34, "4"),
    (0x35, "5"),
    (0x36, "6"),
    (0x37, "7"),
    (0x38, "8"),
    (0x39, "9"),
    (0x41, "A"),
    (0x42, "B"),
    (0x43, "C"),
    (0x44, "D"),
    (0x45, "E"),
    (0x46, "F"),
    (0x47, "G"),
    (0x48, "H"),
    (0x49, "I"),
    (0x4A, "J"),
    (0x4B, "K"),
    (0x4C, "L"),
    (0x4D, "M"),
    (0x4E, "N"),
    (0x4F, "O"),
    (0x50, "P"),
    (0x51, "Q"),
    (0x52, "R"),
    (0x53, "S"),
    (0x54, "T"),
    (0x55, "U"),
    (0x56, "V"),
    (0x57, "W"),
    (0x58, "X"),
    (0x59, "Y"),
    (0x5A, "Z"),
    (0x5B, "LWIN"),
    (0x5C, "RWIN"),
    (0x70, "F1"),
    (0x71, "F2"),
    (0x72, "F3"),
    (0x73, "F4"),
    (0x74, "F5"),
    (0x75, "F6"),
    (0x76, "F7"),
    (0x77, "F8"),
    (0x78, "F9"),
    (0x79, "F10"),
    (0x7A, "F11"),
    (0x7B, "F12"),
    (0x90, "NUMLOCK"),
    (0x91, "SCROLL"),
    (0xA0, "LSHFT"),
    (0xA1, "RSHFT"),
    (0xA2, "LCTRL"),
    (0xA3, "RCTRL"),
    (0xA4, "LALT"),
    (0xA5, "RALT"),
    // OEM keys, US layout
    (0xBA, ";"),
    (0xBB, "+"),
    (0xBC, ","),
    (0xBD, "-"),
    (0xBE, "."),
    (0xBF, "/"),
    (0xC0, "~"),
    (0xDB, "["),
    (0xDC, "\\"),
    (0xDD, "]"),
    (0xDE, "'"),
];

/// Names accepted on the command line in addition to the table symbols
const ALIASES: &[(&str, &str)] = &[
    ("CONTROL", "CTRL"),
    ("LCONTROL", "LCTRL"),
    ("RCONTROL", "RCTRL"),
    ("LSHIFT", "LSHFT"),
    ("RSHIFT", "RSHFT"),
    ("MENU", "ALT"),
    ("ESCAPE", "ESC"),
    ("SPACE", "SPACEBAR"),
    ("RETURN", "ENTER"),
];

/// Symbol for a virtual key, `None` for keys outside the table
pub fn symbol_for(vk: u16) -> Option<&'static str> {
    KEY_TABLE.iter().find(|(code, _)| *code == vk).map(|(_, s)| *s)
}

/// Virtual key for a symbol (exact match, as written in the log)
pub fn vk_for(symbol: &str) -> Option<u16> {
    KEY_TABLE.iter().find(|(_, s)| *s == symbol).map(|(code, _)| *code)
}

/// Iterate over every supported `(vk, symbol)` pair
pub fn supported_keys() -> impl Iterator<Item = (u16, &'static str)> {
    KEY_TABLE.iter().copied()
}

/// Resolve a user-typed key name: case-insensitive, aliases allowed
pub fn resolve_name(name: &str) -> Option<u16> {
    let upper = name.trim().to_ascii_uppercase();
    let symbol = ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, s)| *s)
        .unwrap_or(upper.as_str());
    vk_for(symbol)
}

/// A logical termination key and every physical key that means the same thing.
///
/// `CTRL`, `SHIFT` and `ALT` expand to {generic, left, right}; sided names
/// such as `LCTRL` and every other key stand for themselves only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndKey {
    name: &'static str,
    class: Vec<u16>,
}

impl EndKey {
    pub fn parse(name: &str) -> Result<Self> {
        let vk = resolve_name(name).ok_or_else(|| Error::unknown_key(name))?;
        Ok(Self::from_vk(vk))
    }

    /// Build the class for a supported virtual key; unsupported keys form a
    /// class of one under the placeholder name `?`.
    pub fn from_vk(code: u16) -> Self {
        let class = match code {
            vk::CONTROL => vec![vk::CONTROL, vk::LCONTROL, vk::RCONTROL],
            vk::SHIFT => vec![vk::SHIFT, vk::LSHIFT, vk::RSHIFT],
            vk::ALT => vec![vk::ALT, vk::LALT, vk::RALT],
            other => vec![other],
        };
        Self {
            name: symbol_for(code).unwrap_or("?"),
            class,
        }
    }

    pub fn matches(&self, vk: u16) -> bool {
        self.class.contains(&vk)
    }

    pub fn class(&self) -> &[u16] {
        &self.class
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for EndKey {
    fn default() -> Self {
        Self::from_vk(vk::CONTROL)
    }
}

impl fmt::Display for EndKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_is_a_bijection() {
        let codes: HashSet<u16> = supported_keys().map(|(c, _)| c).collect();
        let symbols: HashSet<&str> = supported_keys().map(|(_, s)| s).collect();
        assert_eq!(codes.len(), KEY_TABLE.len());
        assert_eq!(symbols.len(), KEY_TABLE.len());
        for (code, symbol) in supported_keys() {
            assert_eq!(vk_for(symbol), Some(code));
            assert_eq!(symbol_for(code), Some(symbol));
        }
    }

    #[test]
    fn unsupported_keys_have_no_symbol() {
        assert_eq!(symbol_for(0xFF), None);
        assert_eq!(symbol_for(0x60), None); // numpad 0
        assert_eq!(symbol_for(0x07), None);
        assert_eq!(vk_for("p"), None);
    }

    #[test]
    fn resolve_is_case_insensitive_with_aliases() {
        assert_eq!(resolve_name("ctrl"), Some(vk::CONTROL));
        assert_eq!(resolve_name("Control"), Some(vk::CONTROL));
        assert_eq!(resolve_name("lshift"), Some(vk::LSHIFT));
        assert_eq!(resolve_name(" esc "), Some(vk::ESCAPE));
        assert_eq!(resolve_name("nope"), None);
    }

    #[test]
    fn ctrl_expands_to_both_sides() {
        let end = EndKey::parse("Ctrl").unwrap();
        assert!(end.matches(vk::CONTROL));
        assert!(end.matches(vk::LCONTROL));
        assert!(end.matches(vk::RCONTROL));
        assert!(!end.matches(vk::LSHIFT));
        assert_eq!(end.name(), "CTRL");
    }

    #[test]
    fn sided_and_plain_keys_stand_alone() {
        let end = EndKey::parse("LCTRL").unwrap();
        assert!(end.matches(vk::LCONTROL));
        assert!(!end.matches(vk::RCONTROL));

        let end = EndKey::parse("f12").unwrap();
        assert_eq!(end.class(), &[0x7B]);
    }

    #[test]
    fn unknown_end_key_is_an_error() {
        let err = EndKey::parse("hyper").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::UnknownKey);
    }
}
