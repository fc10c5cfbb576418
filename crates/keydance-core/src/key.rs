// Keydance Key Types
// Key codes (Linux input-event-codes.h numbering) and matrix positions

use std::fmt;
use std::str::FromStr;

/// Represents a single keyboard key code.
///
/// This is a newtype wrapper around u16 for type safety.
/// Named values match Linux input-event-codes.h; any other code is a valid
/// custom key (macro keys usually live outside the named range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(pub u16);

impl Key {
    /// Get the raw numeric code value
    pub fn code(self) -> u16 {
        self.0
    }

    /// Get the name of this key, if it has one
    pub fn name(self) -> Option<&'static str> {
        KEY_NAMES
            .iter()
            .find(|(_, code)| *code == self.0)
            .map(|(name, _)| *name)
    }
}

impl From<u16> for Key {
    fn from(code: u16) -> Self {
        Key(code)
    }
}

impl From<Key> for u16 {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "KC_{}", self.0),
        }
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        key_from_name(s).ok_or_else(|| format!("Unknown key: {}", s))
    }
}

/// Physical position of a key in the keyboard matrix.
///
/// Synthesized events are addressed by position, so the key id they carry is
/// resolved against whatever layer is active at replay time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyPos {
    pub row: u8,
    pub col: u8,
}

impl KeyPos {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for KeyPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

const KEY_NAMES: &[(&str, u16)] = &[
    ("ESC", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("MINUS", 12),
    ("EQUAL", 13),
    ("BACKSPACE", 14),
    ("TAB", 15),
    ("Q", 16),
    ("W", 17),
    ("E", 18),
    ("R", 19),
    ("T", 20),
    ("Y", 21),
    ("U", 22),
    ("I", 23),
    ("O", 24),
    ("P", 25),
    ("LEFT_BRACE", 26),
    ("RIGHT_BRACE", 27),
    ("ENTER", 28),
    ("LEFT_CTRL", 29),
    ("A", 30),
    ("S", 31),
    ("D", 32),
    ("F", 33),
    ("G", 34),
    ("H", 35),
    ("J", 36),
    ("K", 37),
    ("L", 38),
    ("SEMICOLON", 39),
    ("APOSTROPHE", 40),
    ("GRAVE", 41),
    ("LEFT_SHIFT", 42),
    ("BACKSLASH", 43),
    ("Z", 44),
    ("X", 45),
    ("C", 46),
    ("V", 47),
    ("B", 48),
    ("N", 49),
    ("M", 50),
    ("COMMA", 51),
    ("DOT", 52),
    ("SLASH", 53),
    ("RIGHT_SHIFT", 54),
    ("LEFT_ALT", 56),
    ("SPACE", 57),
    ("CAPSLOCK", 58),
    ("F1", 59),
    ("F2", 60),
    ("F3", 61),
    ("F4", 62),
    ("F5", 63),
    ("F6", 64),
    ("F7", 65),
    ("F8", 66),
    ("F9", 67),
    ("F10", 68),
    ("F11", 87),
    ("F12", 88),
    ("RIGHT_CTRL", 97),
    ("RIGHT_ALT", 100),
    ("HOME", 102),
    ("UP", 103),
    ("PAGE_UP", 104),
    ("LEFT", 105),
    ("RIGHT", 106),
    ("END", 107),
    ("DOWN", 108),
    ("PAGE_DOWN", 109),
    ("INSERT", 110),
    ("DELETE", 111),
    ("LEFT_META", 125),
    ("RIGHT_META", 126),
];

const KEY_ALIASES: &[(&str, &str)] = &[
    ("ESCAPE", "ESC"),
    ("RETURN", "ENTER"),
    ("BKSP", "BACKSPACE"),
    ("LCTRL", "LEFT_CTRL"),
    ("RCTRL", "RIGHT_CTRL"),
    ("LSHIFT", "LEFT_SHIFT"),
    ("RSHIFT", "RIGHT_SHIFT"),
    ("LALT", "LEFT_ALT"),
    ("RALT", "RIGHT_ALT"),
    ("LGUI", "LEFT_META"),
    ("RGUI", "RIGHT_META"),
    ("LMETA", "LEFT_META"),
    ("RMETA", "RIGHT_META"),
    ("PERIOD", "DOT"),
];

/// Look up a key by name, alias, or numeric code.
///
/// Names are case-insensitive and an optional `KEY_`/`KC_` prefix is
/// accepted. A bare number (`"301"`, `"0x12d"`) yields that raw code.
pub fn key_from_name(name: &str) -> Option<Key> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u16::from_str_radix(hex, 16).ok().map(Key);
    }
    if trimmed.len() > 1 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse::<u16>().ok().map(Key);
    }

    let upper = trimmed.to_ascii_uppercase();
    let bare = upper
        .strip_prefix("KEY_")
        .or_else(|| upper.strip_prefix("KC_"))
        .unwrap_or(&upper);
    // "KC_301" is how unnamed keys display, so it has to parse back
    if bare.len() > 1 && bare.bytes().all(|b| b.is_ascii_digit()) {
        return bare.parse::<u16>().ok().map(Key);
    }

    let canonical = KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == bare)
        .map(|(_, name)| *name)
        .unwrap_or(bare);

    KEY_NAMES
        .iter()
        .find(|(n, _)| *n == canonical)
        .map(|(_, code)| Key(*code))
}
