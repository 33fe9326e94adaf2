// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buttons, keys, and the modifier bitmask attached to input signals.

bitflags::bitflags! {
    /// Button and key state at the time of an input event.
    ///
    /// The low three bits track pointer buttons, the next three track
    /// modifier keys. The two groups never overlap.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Left pointer button is held.
        const LEFT_DOWN    = 0b0000_0001;
        /// Middle pointer button is held.
        const MIDDLE_DOWN  = 0b0000_0010;
        /// Right pointer button is held.
        const RIGHT_DOWN   = 0b0000_0100;
        /// A control key is held.
        const CONTROL_DOWN = 0b0000_1000;
        /// A shift key is held.
        const SHIFT_DOWN   = 0b0001_0000;
        /// An alt key is held.
        const ALT_DOWN     = 0b0010_0000;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::empty()
    }
}

impl Modifiers {
    /// All button-state flags.
    pub const BUTTONS: Self = Self::LEFT_DOWN
        .union(Self::MIDDLE_DOWN)
        .union(Self::RIGHT_DOWN);

    /// All key-state flags.
    pub const KEYS: Self = Self::CONTROL_DOWN
        .union(Self::SHIFT_DOWN)
        .union(Self::ALT_DOWN);

    /// Build from a raw platform bitmask, dropping bits outside the 6-bit field.
    pub const fn from_raw(raw: u8) -> Self {
        Self::from_bits_truncate(raw)
    }

    /// Returns true if control is held.
    pub const fn control(self) -> bool {
        self.contains(Self::CONTROL_DOWN)
    }

    /// Returns true if shift is held.
    pub const fn shift(self) -> bool {
        self.contains(Self::SHIFT_DOWN)
    }
}

/// A pointer button, including the two wheel directions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Button {
    /// No button (or one the platform could not name).
    #[default]
    None,
    /// Primary button.
    Left,
    /// Secondary button.
    Right,
    /// Middle button.
    Middle,
    /// Wheel turned away from the user.
    WheelUp,
    /// Wheel turned toward the user.
    WheelDown,
}

impl Button {
    /// The modifier flag reporting this button as held, if it has one.
    pub const fn held_flag(self) -> Modifiers {
        match self {
            Self::Left => Modifiers::LEFT_DOWN,
            Self::Middle => Modifiers::MIDDLE_DOWN,
            Self::Right => Modifiers::RIGHT_DOWN,
            Self::None | Self::WheelUp | Self::WheelDown => Modifiers::empty(),
        }
    }
}

/// A keyboard key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs, reason = "Letter keys are self-describing.")]
pub enum Key {
    /// No key (or one without a mapping).
    #[default]
    None,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    /// Tabulator.
    Tab,
    /// Escape.
    Escape,
}

impl Key {
    const LETTERS: [Self; 26] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::O,
        Self::P,
        Self::Q,
        Self::R,
        Self::S,
        Self::T,
        Self::U,
        Self::V,
        Self::W,
        Self::X,
        Self::Y,
        Self::Z,
    ];

    /// Map a character as produced by a platform key event.
    ///
    /// Letters map case-insensitively; unmapped characters yield [`Key::None`].
    pub fn from_char(c: char) -> Self {
        match c {
            '\t' => Self::Tab,
            '\u{1b}' => Self::Escape,
            c if c.is_ascii_alphabetic() => u8::try_from(c.to_ascii_uppercase())
                .map(|b| Self::LETTERS[usize::from(b - b'A')])
                .unwrap_or(Self::None),
            _ => Self::None,
        }
    }
}
