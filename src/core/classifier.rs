use crate::models::Category;

/// Separator the hook adapter uses when it joins held modifiers with a key.
const SEPARATOR: char = '+';

/// Tokens that mark a name as combination-class even when pressed alone.
const MODIFIER_TOKENS: &[&str] = &[
    "Ctrl",
    "Control",
    "Shift",
    "Alt",
    "AltGr",
    "Meta",
    "Super",
    "CapsLock",
];

/// Decides whether a decoded key name counts as a simple key or as a
/// shortcut combination. Pure and infallible; unrecognized input is Simple.
pub fn classify(name: &str) -> Category {
    if name.split(SEPARATOR).filter(|t| !t.is_empty()).count() > 1 {
        return Category::Combination;
    }

    if MODIFIER_TOKENS.iter().any(|token| name.contains(token)) {
        return Category::Combination;
    }

    Category::Simple
}

/// Builds the canonical combination identity for a key pressed with held
/// modifiers. Modifier order is fixed so the same chord always maps to the
/// same identity string.
pub fn compose_identity(meta: bool, ctrl: bool, alt: bool, shift: bool, key: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(5);
    if meta {
        parts.push("Meta");
    }
    if ctrl {
        parts.push("Ctrl");
    }
    if alt {
        parts.push("Alt");
    }
    if shift {
        parts.push("Shift");
    }
    parts.push(key);
    parts.join("+")
}
