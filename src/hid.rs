//! Keyboard input through a HID gadget device (`/dev/hidgN`).
//!
//! The gadget side of a boot keyboard sends 8-byte reports: a modifier
//! bitmask, a reserved byte, and up to six pressed keycodes. [`Keyboard`]
//! writes those reports, pausing between press and release so the host sees
//! each key.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::error::{Error, Result};

/// Device used when no path is given.
pub const DEFAULT_DEVICE: &str = "/dev/hidg0";

/// Pause between pressing and releasing a key when none is configured.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(10);

/// Length of a keyboard report.
pub const REPORT_LEN: usize = 8;

/// Modifier bits of the first report byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifier(pub u8);

impl Modifier {
    pub const NONE: Modifier = Modifier(0x00);
    pub const LEFT_CTRL: Modifier = Modifier(0x01);
    pub const LEFT_SHIFT: Modifier = Modifier(0x02);
    pub const LEFT_ALT: Modifier = Modifier(0x04);
    pub const LEFT_META: Modifier = Modifier(0x08);
    pub const RIGHT_CTRL: Modifier = Modifier(0x10);
    pub const RIGHT_SHIFT: Modifier = Modifier(0x20);
    pub const RIGHT_ALT: Modifier = Modifier(0x40);
    pub const RIGHT_META: Modifier = Modifier(0x80);

    /// The modifier as a key, with the bits in the high byte.
    pub const fn key(self) -> Key {
        Key((self.0 as u16) << 8)
    }
}

impl BitOr for Modifier {
    type Output = Modifier;

    fn bitor(self, rhs: Modifier) -> Modifier {
        Modifier(self.0 | rhs.0)
    }
}

/// A key: modifier bits in the high byte, usage id in the low byte.
///
/// Keys combine with `|`, so `Key::LEFT_SHIFT | Key::A` is a capital A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Key(pub u16);

impl BitOr for Key {
    type Output = Key;

    fn bitor(self, rhs: Key) -> Key {
        Key(self.0 | rhs.0)
    }
}

impl Key {
    pub const NONE: Key = Key(0x00);
    pub const A: Key = Key(0x04);
    pub const B: Key = Key(0x05);
    pub const C: Key = Key(0x06);
    pub const D: Key = Key(0x07);
    pub const E: Key = Key(0x08);
    pub const F: Key = Key(0x09);
    pub const G: Key = Key(0x0a);
    pub const H: Key = Key(0x0b);
    pub const I: Key = Key(0x0c);
    pub const J: Key = Key(0x0d);
    pub const K: Key = Key(0x0e);
    pub const L: Key = Key(0x0f);
    pub const M: Key = Key(0x10);
    pub const N: Key = Key(0x11);
    pub const O: Key = Key(0x12);
    pub const P: Key = Key(0x13);
    pub const Q: Key = Key(0x14);
    pub const R: Key = Key(0x15);
    pub const S: Key = Key(0x16);
    pub const T: Key = Key(0x17);
    pub const U: Key = Key(0x18);
    pub const V: Key = Key(0x19);
    pub const W: Key = Key(0x1a);
    pub const X: Key = Key(0x1b);
    pub const Y: Key = Key(0x1c);
    pub const Z: Key = Key(0x1d);
    pub const DIGIT_1: Key = Key(0x1e);
    pub const DIGIT_2: Key = Key(0x1f);
    pub const DIGIT_3: Key = Key(0x20);
    pub const DIGIT_4: Key = Key(0x21);
    pub const DIGIT_5: Key = Key(0x22);
    pub const DIGIT_6: Key = Key(0x23);
    pub const DIGIT_7: Key = Key(0x24);
    pub const DIGIT_8: Key = Key(0x25);
    pub const DIGIT_9: Key = Key(0x26);
    pub const DIGIT_0: Key = Key(0x27);
    pub const ENTER: Key = Key(0x28);
    pub const ESCAPE: Key = Key(0x29);
    pub const BACKSPACE: Key = Key(0x2a);
    pub const TAB: Key = Key(0x2b);
    pub const SPACE: Key = Key(0x2c);
    pub const MINUS: Key = Key(0x2d);
    pub const EQUAL: Key = Key(0x2e);
    pub const LEFT_BRACKET: Key = Key(0x2f);
    pub const RIGHT_BRACKET: Key = Key(0x30);
    pub const BACKSLASH: Key = Key(0x31);
    pub const NON_US_HASH: Key = Key(0x32);
    pub const SEMICOLON: Key = Key(0x33);
    pub const APOSTROPHE: Key = Key(0x34);
    pub const GRAVE: Key = Key(0x35);
    pub const COMMA: Key = Key(0x36);
    pub const PERIOD: Key = Key(0x37);
    pub const SLASH: Key = Key(0x38);
    pub const CAPS_LOCK: Key = Key(0x39);
    pub const F1: Key = Key(0x3a);
    pub const F2: Key = Key(0x3b);
    pub const F3: Key = Key(0x3c);
    pub const F4: Key = Key(0x3d);
    pub const F5: Key = Key(0x3e);
    pub const F6: Key = Key(0x3f);
    pub const F7: Key = Key(0x40);
    pub const F8: Key = Key(0x41);
    pub const F9: Key = Key(0x42);
    pub const F10: Key = Key(0x43);
    pub const F11: Key = Key(0x44);
    pub const F12: Key = Key(0x45);
    pub const PRINT_SCREEN: Key = Key(0x46);
    pub const SCROLL_LOCK: Key = Key(0x47);
    pub const PAUSE: Key = Key(0x48);
    pub const INSERT: Key = Key(0x49);
    pub const HOME: Key = Key(0x4a);
    pub const PAGE_UP: Key = Key(0x4b);
    pub const DELETE: Key = Key(0x4c);
    pub const END: Key = Key(0x4d);
    pub const PAGE_DOWN: Key = Key(0x4e);
    pub const RIGHT_ARROW: Key = Key(0x4f);
    pub const LEFT_ARROW: Key = Key(0x50);
    pub const DOWN_ARROW: Key = Key(0x51);
    pub const UP_ARROW: Key = Key(0x52);
    pub const NUM_LOCK: Key = Key(0x53);
    pub const APPLICATION: Key = Key(0x65);
    pub const RETURN: Key = Key(0x9e);

    pub const LEFT_CTRL: Key = Modifier::LEFT_CTRL.key();
    pub const LEFT_SHIFT: Key = Modifier::LEFT_SHIFT.key();
    pub const LEFT_ALT: Key = Modifier::LEFT_ALT.key();
    pub const LEFT_META: Key = Modifier::LEFT_META.key();
    pub const RIGHT_CTRL: Key = Modifier::RIGHT_CTRL.key();
    pub const RIGHT_SHIFT: Key = Modifier::RIGHT_SHIFT.key();
    pub const RIGHT_ALT: Key = Modifier::RIGHT_ALT.key();
    pub const RIGHT_META: Key = Modifier::RIGHT_META.key();

    pub fn modifier(self) -> Modifier {
        Modifier((self.0 >> 8) as u8)
    }

    pub fn keycode(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

/// One keyboard input report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Report {
    pub modifier: Modifier,
    pub keycodes: [u8; 6],
}

impl Report {
    /// A report with `keys` held. Modifiers accumulate; keycodes beyond the
    /// sixth are dropped.
    pub fn with_keys(keys: &[Key]) -> Self {
        let mut report = Report::default();
        report.set_keys(keys);
        report
    }

    pub fn set_keys(&mut self, keys: &[Key]) -> &mut Self {
        let mut slot = 0;
        for key in keys {
            if slot == self.keycodes.len() {
                break;
            }
            self.modifier = self.modifier | key.modifier();
            let code = key.keycode();
            if code != 0 {
                self.keycodes[slot] = code;
                slot += 1;
            }
        }
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        *self = Report::default();
        self
    }

    /// Wire format: modifier, reserved zero, six keycodes.
    pub fn raw(&self) -> [u8; REPORT_LEN] {
        let mut raw = [0u8; REPORT_LEN];
        raw[0] = self.modifier.0;
        raw[2..].copy_from_slice(&self.keycodes);
        raw
    }
}

/// Characters to the keys that type them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keymap(HashMap<char, Key>);

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, c: char, key: Key) -> Option<Key> {
        self.0.insert(c, key)
    }

    /// The key for `c`, if mapped to something other than [`Key::NONE`].
    pub fn get(&self, c: char) -> Option<Key> {
        self.0.get(&c).copied().filter(|key| *key != Key::NONE)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// US QWERTY layout covering printable ASCII plus newline, tab,
    /// backspace and carriage return.
    pub fn us_qwerty() -> Self {
        let shift = Key::LEFT_SHIFT;
        let letters = [
            Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G, Key::H, Key::I,
            Key::J, Key::K, Key::L, Key::M, Key::N, Key::O, Key::P, Key::Q, Key::R,
            Key::S, Key::T, Key::U, Key::V, Key::W, Key::X, Key::Y, Key::Z,
        ];

        let mut map = Keymap::new();
        for (lower, key) in ('a'..='z').zip(letters) {
            map.insert(lower, key);
            map.insert(lower.to_ascii_uppercase(), shift | key);
        }

        // Unshifted and shifted character on the same key.
        let pairs = [
            ('1', '!', Key::DIGIT_1),
            ('2', '@', Key::DIGIT_2),
            ('3', '#', Key::DIGIT_3),
            ('4', '$', Key::DIGIT_4),
            ('5', '%', Key::DIGIT_5),
            ('6', '^', Key::DIGIT_6),
            ('7', '&', Key::DIGIT_7),
            ('8', '*', Key::DIGIT_8),
            ('9', '(', Key::DIGIT_9),
            ('0', ')', Key::DIGIT_0),
            ('`', '~', Key::GRAVE),
            ('-', '_', Key::MINUS),
            ('=', '+', Key::EQUAL),
            ('[', '{', Key::LEFT_BRACKET),
            (']', '}', Key::RIGHT_BRACKET),
            ('\\', '|', Key::BACKSLASH),
            (';', ':', Key::SEMICOLON),
            ('\'', '"', Key::APOSTROPHE),
            (',', '<', Key::COMMA),
            ('.', '>', Key::PERIOD),
            ('/', '?', Key::SLASH),
        ];
        for (plain, shifted, key) in pairs {
            map.insert(plain, key);
            map.insert(shifted, shift | key);
        }

        map.insert('\n', Key::ENTER);
        map.insert('\u{8}', Key::BACKSPACE);
        map.insert('\t', Key::TAB);
        map.insert(' ', Key::SPACE);
        map.insert('\r', Key::RETURN);
        map
    }
}

/// Resolve a device argument: empty means [`DEFAULT_DEVICE`], bare names live
/// under `/dev`.
pub fn resolve_device_path(name: &str) -> PathBuf {
    if name.is_empty() {
        PathBuf::from(DEFAULT_DEVICE)
    } else if name.starts_with('/') || name.starts_with("./") {
        PathBuf::from(name)
    } else {
        Path::new("/dev").join(name)
    }
}

/// A keyboard writing reports to `W`.
pub struct Keyboard<W: Write = File> {
    out: W,
    hold: Duration,
}

impl Keyboard<File> {
    /// Open a HID gadget device for writing. A zero `hold` selects
    /// [`DEFAULT_HOLD`].
    pub fn open(name: &str, hold: Duration) -> Result<Self> {
        let path = resolve_device_path(name);
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| Error::Device {
                path: path.clone(),
                message: e.to_string(),
            })?;
        debug!("opened HID device {}", path.display());
        Ok(Keyboard::new(file, hold))
    }
}

impl<W: Write> Keyboard<W> {
    pub fn new(out: W, hold: Duration) -> Self {
        let hold = if hold.is_zero() { DEFAULT_HOLD } else { hold };
        Self { out, hold }
    }

    /// A keyboard that never pauses. Meant for writers that are not devices.
    pub fn without_pauses(out: W) -> Self {
        Self {
            out,
            hold: Duration::ZERO,
        }
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn pause(&self) {
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
    }

    pub fn send_report(&mut self, report: &Report) -> Result<()> {
        self.out.write_all(&report.raw())?;
        Ok(())
    }

    /// Press `keys` together and leave them held.
    pub fn hold_keys(&mut self, keys: &[Key]) -> Result<()> {
        self.send_report(&Report::with_keys(keys))
    }

    pub fn release_keys(&mut self) -> Result<()> {
        self.out.write_all(&[0u8; REPORT_LEN])?;
        Ok(())
    }

    /// Press `keys` together, hold, release.
    pub fn chord_keys(&mut self, keys: &[Key]) -> Result<()> {
        self.hold_keys(keys)?;
        self.pause();
        self.release_keys()
    }

    /// Press and release each key in turn. [`Key::NONE`] is skipped.
    pub fn press_keys(&mut self, keys: &[Key]) -> Result<()> {
        for key in keys.iter().filter(|key| **key != Key::NONE) {
            self.hold_keys(std::slice::from_ref(key))?;
            self.pause();
            self.release_keys()?;
            self.pause();
        }
        Ok(())
    }

    /// Type `text` using `keymap`, US QWERTY when `None`.
    ///
    /// Stops at the first character the keymap does not cover; everything
    /// before it has already been typed.
    pub fn type_text(&mut self, text: &str, keymap: Option<&Keymap>) -> Result<()> {
        let default_keymap;
        let keymap = match keymap {
            Some(keymap) => keymap,
            None => {
                default_keymap = Keymap::us_qwerty();
                &default_keymap
            }
        };

        for c in text.chars() {
            let key = keymap.get(c).ok_or(Error::UnmappedCharacter(c))?;
            self.press_keys(&[key])?;
        }
        self.out.flush()?;
        Ok(())
    }
}
