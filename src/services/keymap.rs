//! Fixed translation table from keybind tokens to virtual-key codes.

use crate::domain::ports::VkCode;

/// Translate one token. Case-insensitive; covers modifiers, control keys,
/// arrows, F1-F12, letters, and digits. Unknown tokens map to `None`.
pub fn vk_code(token: &str) -> Option<VkCode> {
    let token = token.trim().to_lowercase();
    let code: u16 = match token.as_str() {
        "ctrl" | "control" => 0x11,
        "shift" => 0x10,
        "alt" => 0x12,
        "super" | "win" | "meta" | "cmd" => 0x5B,
        "enter" | "return" => 0x0D,
        "esc" | "escape" => 0x1B,
        "space" => 0x20,
        "tab" => 0x09,
        "backspace" => 0x08,
        "delete" | "del" => 0x2E,
        "left" => 0x25,
        "up" => 0x26,
        "right" => 0x27,
        "down" => 0x28,
        _ => {
            if let Some(n) = token.strip_prefix('f').and_then(|n| n.parse::<u16>().ok()) {
                if (1..=12).contains(&n) {
                    return Some(VkCode(0x70 + n - 1));
                }
                return None;
            }
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_lowercase() => 0x41 + (c as u16 - 'a' as u16),
                (Some(c), None) if c.is_ascii_digit() => 0x30 + (c as u16 - '0' as u16),
                _ => return None,
            }
        }
    };
    Some(VkCode(code))
}

/// Translate a token list, collecting the codes that resolve and the
/// tokens that do not.
pub fn resolve_tokens(tokens: &[String]) -> (Vec<VkCode>, Vec<String>) {
    let mut codes = Vec::with_capacity(tokens.len());
    let mut unknown = Vec::new();
    for token in tokens {
        match vk_code(token) {
            Some(code) => codes.push(code),
            None => unknown.push(token.clone()),
        }
    }
    (codes, unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_and_letters() {
        assert_eq!(vk_code("Ctrl"), Some(VkCode(0x11)));
        assert_eq!(vk_code("SHIFT"), Some(VkCode(0x10)));
        assert_eq!(vk_code("a"), Some(VkCode(0x41)));
        assert_eq!(vk_code("Z"), Some(VkCode(0x5A)));
        assert_eq!(vk_code("0"), Some(VkCode(0x30)));
        assert_eq!(vk_code("9"), Some(VkCode(0x39)));
    }

    #[test]
    fn function_keys_cover_f1_to_f12() {
        assert_eq!(vk_code("f1"), Some(VkCode(0x70)));
        assert_eq!(vk_code("F12"), Some(VkCode(0x7B)));
        assert_eq!(vk_code("f13"), None);
        assert_eq!(vk_code("f0"), None);
    }

    #[test]
    fn control_keys_and_aliases() {
        assert_eq!(vk_code("enter"), vk_code("return"));
        assert_eq!(vk_code("esc"), vk_code("escape"));
        assert_eq!(vk_code("del"), vk_code("delete"));
        assert_eq!(vk_code("win"), vk_code("super"));
    }

    #[test]
    fn unknown_tokens_are_none() {
        assert_eq!(vk_code("hyper"), None);
        assert_eq!(vk_code("ab"), None);
        assert_eq!(vk_code(""), None);
    }

    #[test]
    fn resolve_splits_known_from_unknown() {
        let tokens = vec!["ctrl".to_string(), "hyper".to_string(), "s".to_string()];
        let (codes, unknown) = resolve_tokens(&tokens);
        assert_eq!(codes, vec![VkCode(0x11), VkCode(0x53)]);
        assert_eq!(unknown, vec!["hyper".to_string()]);
    }
}
