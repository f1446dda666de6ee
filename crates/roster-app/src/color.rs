// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub const BLACK: &str = "#000000";
pub const WHITE: &str = "#FFFFFF";

/// `#` followed by exactly three or six hex digits.
pub fn is_valid_color(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.bytes().all(|byte| byte.is_ascii_hexdigit())
}

/// Black or white, whichever reads better on top of `background`.
/// Anything that does not parse as a color gets black.
pub fn contrast_color(background: Option<&str>) -> &'static str {
    let Some(raw) = background.filter(|raw| !raw.is_empty()) else {
        return BLACK;
    };
    let Some((red, green, blue)) = parse_rgb(raw) else {
        return BLACK;
    };

    let luminance = (u32::from(red) * 299 + u32::from(green) * 587 + u32::from(blue) * 114) / 1000;
    if luminance < 128 { WHITE } else { BLACK }
}

fn parse_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    let digits = raw.strip_prefix('#').unwrap_or(raw);
    let expanded: String = if digits.chars().count() == 3 {
        digits.chars().flat_map(|ch| [ch, ch]).collect()
    } else {
        digits.to_owned()
    };

    let channel = |index: usize| {
        expanded
            .get(index..index + 2)
            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
    };
    Some((channel(0)?, channel(2)?, channel(4)?))
}

#[cfg(test)]
mod tests {
    use super::{BLACK, WHITE, contrast_color, is_valid_color};

    #[test]
    fn valid_color_grammar() {
        assert!(is_valid_color("#fff"));
        assert!(is_valid_color("#0366d6"));
        assert!(is_valid_color("#ABCDEF"));
        assert!(!is_valid_color("#ffff"));
        assert!(!is_valid_color("123456"));
        assert!(!is_valid_color("#12345g"));
        assert!(!is_valid_color("#"));
        assert!(!is_valid_color(""));
    }

    #[test]
    fn contrast_for_extremes() {
        assert_eq!(contrast_color(Some("#000000")), WHITE);
        assert_eq!(contrast_color(Some("#FFFFFF")), BLACK);
    }

    #[test]
    fn short_form_expands_before_luminance() {
        // #aabbcc -> (170*299 + 187*587 + 204*114) / 1000 = 186
        assert_eq!(contrast_color(Some("#abc")), BLACK);
        assert_eq!(contrast_color(Some("#abc")), contrast_color(Some("#aabbcc")));
        assert_eq!(contrast_color(Some("#036")), WHITE);
    }

    #[test]
    fn missing_or_unparseable_is_black() {
        assert_eq!(contrast_color(None), BLACK);
        assert_eq!(contrast_color(Some("")), BLACK);
        assert_eq!(contrast_color(Some("zzz")), BLACK);
        assert_eq!(contrast_color(Some("#12")), BLACK);
    }

    #[test]
    fn hash_prefix_is_optional_for_contrast() {
        assert_eq!(contrast_color(Some("0366d6")), WHITE);
    }

    #[test]
    fn threshold_sits_at_128() {
        // grey 0x80 -> luminance exactly 128 -> black text
        assert_eq!(contrast_color(Some("#808080")), BLACK);
        assert_eq!(contrast_color(Some("#7f7f7f")), WHITE);
    }

    #[test]
    fn repeated_calls_agree() {
        for input in [Some("#fff"), Some("#0366d6"), Some("junk"), None] {
            assert_eq!(is_valid_color(input.unwrap_or("")), is_valid_color(input.unwrap_or("")));
            assert_eq!(contrast_color(input), contrast_color(input));
        }
    }
}
