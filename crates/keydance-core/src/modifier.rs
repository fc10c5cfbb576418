// Keydance Modifier Bits
// 8-bit modifier state as carried in a keyboard report

use std::fmt;

use bitflags::bitflags;

use crate::Key;

bitflags! {
    /// Modifier bits, laid out like the HID report's modifier byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mods: u8 {
        const LCTRL = 0x01;
        const LSHIFT = 0x02;
        const LALT = 0x04;
        const LGUI = 0x08;
        const RCTRL = 0x10;
        const RSHIFT = 0x20;
        const RALT = 0x40;
        const RGUI = 0x80;
    }
}

/// Errors from modifier parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModifierError {
    #[error("Unknown modifier: {0}")]
    Unknown(String),
}

const ALIASES: &[(&[&str], Mods)] = &[
    (&["CTRL", "C", "CONTROL", "LCTRL", "LC"], Mods::LCTRL),
    (&["RCTRL", "RC"], Mods::RCTRL),
    (&["SHIFT", "S", "LSHIFT"], Mods::LSHIFT),
    (&["RSHIFT"], Mods::RSHIFT),
    (&["ALT", "A", "OPT", "OPTION", "LALT", "LA"], Mods::LALT),
    (&["RALT", "RA", "ALTGR"], Mods::RALT),
    (
        &["GUI", "META", "SUPER", "WIN", "CMD", "COMMAND", "LGUI", "LMETA"],
        Mods::LGUI,
    ),
    (&["RGUI", "RMETA", "RSUPER", "RWIN", "RCMD"], Mods::RGUI),
];

impl Mods {
    /// Resolve a single modifier alias such as `Ctrl`, `RShift` or `Cmd`.
    ///
    /// Unsided names map to the left-hand bit.
    pub fn from_alias(alias: &str) -> Result<Self, ModifierError> {
        let upper = alias.trim().to_ascii_uppercase();
        ALIASES
            .iter()
            .find(|(names, _)| names.contains(&upper.as_str()))
            .map(|(_, mods)| *mods)
            .ok_or_else(|| ModifierError::Unknown(alias.trim().to_string()))
    }

    /// Parse a `-` or `+` separated list of aliases, e.g. `"Ctrl-Shift"`.
    pub fn parse_list(list: &str) -> Result<Self, ModifierError> {
        list.split(['-', '+'])
            .filter(|part| !part.trim().is_empty())
            .try_fold(Mods::empty(), |acc, part| Ok(acc | Self::from_alias(part)?))
    }

    /// The modifier bit a physical modifier key drives, if any
    pub fn from_key(key: Key) -> Option<Self> {
        match key.code() {
            29 => Some(Mods::LCTRL),
            42 => Some(Mods::LSHIFT),
            56 => Some(Mods::LALT),
            125 => Some(Mods::LGUI),
            97 => Some(Mods::RCTRL),
            54 => Some(Mods::RSHIFT),
            100 => Some(Mods::RALT),
            126 => Some(Mods::RGUI),
            _ => None,
        }
    }

    /// Check whether a key is one of the eight modifier keys
    pub fn is_key_modifier(key: Key) -> bool {
        Self::from_key(key).is_some()
    }
}

impl fmt::Display for Mods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        f.write_str(&names.join("-"))
    }
}
