//! Unit records and text normalization.

/// A store unit from the reference spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    pub shop: String,
    pub code: String,
    pub status: String,
    pub kind: String,
    pub technician: String,
    /// Already integer-normalized when the cell was numeric.
    pub technician_phone: String,
    pub branch: String,
    pub format: Option<String>,
    pub opened: Option<String>,
    pub closed: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Reduce text to lowercase Cyrillic/Latin letters, ASCII digits and single spaces.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if is_kept(c) {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}

fn is_kept(c: char) -> bool {
    matches!(c, 'а'..='я' | 'ё' | 'a'..='z' | '0'..='9')
}

/// Render an optional value, using "-" for missing or blank text.
pub fn or_dash(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => "-",
    }
}

/// Escape text for Telegram HTML messages.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("Привет, а что там с АЖУР?"), "привет а что там с ажур");
        assert_eq!(normalize("Shop-1 (Центр)"), "shop1 центр");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  кто \t\n  ажур  "), "кто ажур");
        assert_eq!(normalize("! ажур"), "ажур");
        assert_eq!(normalize("а ! б"), "а б");
    }

    #[test]
    fn test_normalize_keeps_yo() {
        assert_eq!(normalize("Ёлка"), "ёлка");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("?!."), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Привет, а что там с ажур?",
            "  ! кто   Shop-1 ",
            "ÄÖÜ mixed ёЁ 123",
            "\u{00a0}nbsp\u{2003}em",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("  ")), "-");
        assert_eq!(or_dash(Some(" x ")), "x");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("A <b> & C"), "A &lt;b&gt; &amp; C");
    }
}
