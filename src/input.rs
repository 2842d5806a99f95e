//! Pointer and keyboard input delivered to the selection tools.
//!
//! Pointer positions are in viewport pixels with the origin at the top left.

use anno3d_spatial::glam::Vec2;

/// Set of pressed mouse buttons, using the DOM `buttons` bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MouseButtons(u8);

impl MouseButtons {
    pub const NONE: Self = Self(0);
    pub const PRIMARY: Self = Self(1);
    pub const SECONDARY: Self = Self(2);
    pub const AUXILIARY: Self = Self(4);
    pub const FOURTH: Self = Self(8);
    pub const FIFTH: Self = Self(16);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for MouseButtons {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Current pointer state as tracked by the tool manager.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pointer {
    /// Position in viewport pixels
    pub position: Vec2,
    pub buttons: MouseButtons,
    /// Set on movement, cleared after each tool update
    pub has_moved: bool,
}

impl Pointer {
    /// Apply an input event to the tracked state.
    pub fn apply(&mut self, event: &ToolEvent) {
        match *event {
            ToolEvent::PointerDown { position, buttons } => {
                self.position = position;
                self.buttons = buttons;
            }
            ToolEvent::PointerMove { position } => {
                self.position = position;
                self.has_moved = true;
            }
            ToolEvent::PointerUp { position } => {
                self.position = position;
                self.buttons = MouseButtons::NONE;
            }
            ToolEvent::KeyPressed { .. } | ToolEvent::KeyReleased { .. } => {}
        }
    }
}

/// Keyboard keys the tools react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Shift,
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

/// Events the tools respond to.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent {
    /// Mouse button pressed. `buttons` holds every button now down.
    PointerDown { position: Vec2, buttons: MouseButtons },
    /// Pointer moved.
    PointerMove { position: Vec2 },
    /// All mouse buttons released.
    PointerUp { position: Vec2 },
    /// Keyboard key pressed.
    KeyPressed { key: Key, modifiers: Modifiers },
    /// Keyboard key released.
    KeyReleased { key: Key, modifiers: Modifiers },
}
