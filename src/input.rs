/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub const ESCAPE: Self = Self::Named(NamedKey::Escape);

    /// Parses a key name such as `Escape`, `f`, `7` or `F11`.
    ///
    /// Letters are case-insensitive and normalized to upper case.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=24).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Escape" | "Esc" => Escape,
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Backspace" => Backspace,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the non-printable keys the shell forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
    Space,
    Enter,
    Tab,
    Backspace,
    Left,
    Right,
    Up,
    Down,
}

/// Keys that drive the demo's two interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    pub quit: KeyCode,
    pub toggle_fullscreen: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: KeyCode::ESCAPE,
            toggle_fullscreen: KeyCode::Character('F'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(KeyCode::from_name("Escape"), Some(KeyCode::ESCAPE));
        assert_eq!(KeyCode::from_name("Esc"), Some(KeyCode::ESCAPE));
        assert_eq!(KeyCode::from_name("f"), Some(KeyCode::Character('F')));
        assert_eq!(KeyCode::from_name("7"), Some(KeyCode::Digit(7)));
        assert_eq!(KeyCode::from_name("F11"), Some(KeyCode::Function(11)));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(KeyCode::from_name(""), None);
        assert_eq!(KeyCode::from_name("F99"), None);
        assert_eq!(KeyCode::from_name("Hyper"), None);
    }

    #[test]
    fn default_bindings_match_the_demo() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.quit, KeyCode::ESCAPE);
        assert_eq!(KeyCode::from_name("f"), Some(bindings.toggle_fullscreen));
    }
}
