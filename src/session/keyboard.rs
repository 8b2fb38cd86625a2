//! Keyboard key definitions.
//!
//! Named keys carry fixed DOM `key`/`code` values and a virtual key code.
//! [`Key::Char`] covers single printable characters, which is how most
//! extension shortcuts are typed.
//!
//! # Example
//!
//! ```ignore
//! use devtools_harness::Key;
//!
//! session.press_key(Key::Escape).await?;
//! session.press_key(Key::Char('f')).await?;
//! session.type_text("gg").await?;
//! ```

// ============================================================================
// Constants
// ============================================================================

/// Shift bit in the `modifiers` field.
pub(crate) const MODIFIER_SHIFT: u32 = 8;

// ============================================================================
// Key Enum
// ============================================================================

/// A key to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    // ========================================================================
    // Navigation & Control
    // ========================================================================
    /// Enter/Return key
    Enter,
    /// Tab key
    Tab,
    /// Escape key
    Escape,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Space bar
    Space,

    // ========================================================================
    // Arrow Keys
    // ========================================================================
    /// Arrow Up
    ArrowUp,
    /// Arrow Down
    ArrowDown,
    /// Arrow Left
    ArrowLeft,
    /// Arrow Right
    ArrowRight,

    // ========================================================================
    // Page Navigation
    // ========================================================================
    /// Home key
    Home,
    /// End key
    End,
    /// Page Up key
    PageUp,
    /// Page Down key
    PageDown,

    // ========================================================================
    // Characters
    // ========================================================================
    /// A single printable character.
    Char(char),
}

impl Key {
    /// Returns (key, code, virtual key code, printable) for named keys.
    fn named(self) -> Option<(&'static str, &'static str, u32, bool)> {
        let properties = match self {
            Key::Enter => ("Enter", "Enter", 13, false),
            Key::Tab => ("Tab", "Tab", 9, false),
            Key::Escape => ("Escape", "Escape", 27, false),
            Key::Backspace => ("Backspace", "Backspace", 8, false),
            Key::Delete => ("Delete", "Delete", 46, false),
            Key::Space => (" ", "Space", 32, true),
            Key::ArrowUp => ("ArrowUp", "ArrowUp", 38, false),
            Key::ArrowDown => ("ArrowDown", "ArrowDown", 40, false),
            Key::ArrowLeft => ("ArrowLeft", "ArrowLeft", 37, false),
            Key::ArrowRight => ("ArrowRight", "ArrowRight", 39, false),
            Key::Home => ("Home", "Home", 36, false),
            Key::End => ("End", "End", 35, false),
            Key::PageUp => ("PageUp", "PageUp", 33, false),
            Key::PageDown => ("PageDown", "PageDown", 34, false),
            Key::Char(_) => return None,
        };
        Some(properties)
    }

    /// Returns the DOM `key` value.
    #[must_use]
    pub fn key(self) -> String {
        match (self, self.named()) {
            (_, Some((key, ..))) => key.to_string(),
            (Key::Char(c), None) => c.to_string(),
            (_, None) => String::new(),
        }
    }

    /// Returns the DOM `code` value, if the key has a physical position.
    #[must_use]
    pub fn code(self) -> Option<String> {
        if let Some((_, code, ..)) = self.named() {
            return Some(code.to_string());
        }
        let Key::Char(c) = self else {
            return None;
        };

        if c.is_ascii_alphabetic() {
            Some(format!("Key{}", c.to_ascii_uppercase()))
        } else if c.is_ascii_digit() {
            Some(format!("Digit{c}"))
        } else if c == ' ' {
            Some("Space".to_string())
        } else {
            None
        }
    }

    /// Returns the Windows virtual key code, if known.
    #[must_use]
    pub fn key_code(self) -> Option<u32> {
        if let Some((_, _, key_code, _)) = self.named() {
            return Some(key_code);
        }
        match self {
            Key::Char(c) if c.is_ascii_alphanumeric() || c == ' ' => Some(c.to_ascii_uppercase() as u32),
            _ => None,
        }
    }

    /// Returns the text this key produces, if any.
    #[must_use]
    pub fn text(self) -> Option<String> {
        match (self, self.named()) {
            (_, Some((key, _, _, true))) => Some(key.to_string()),
            (Key::Char(c), None) if !c.is_control() => Some(c.to_string()),
            _ => None,
        }
    }

    /// Returns whether this key produces printable output.
    #[inline]
    #[must_use]
    pub fn is_printable(self) -> bool {
        self.text().is_some()
    }

    /// Returns the modifier bits implied by the key itself.
    #[inline]
    #[must_use]
    pub fn modifiers(self) -> u32 {
        match self {
            Key::Char(c) if c.is_ascii_uppercase() => MODIFIER_SHIFT,
            _ => 0,
        }
    }
}

impl From<char> for Key {
    fn from(c: char) -> Self {
        match c {
            '\n' | '\r' => Key::Enter,
            '\t' => Key::Tab,
            ' ' => Key::Space,
            c => Key::Char(c),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
