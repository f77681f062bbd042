//! Parsing `/labels` command text into label items.

use crate::labels::RenderError;

/// One label: barcode value, shop it belongs to and the item description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelItem {
    pub code: String,
    pub shop: String,
    pub name: String,
}

/// Parse lines of `CODE SHOP NAME...`. Blank lines are skipped.
pub fn parse_items(text: &str) -> Result<Vec<LabelItem>, RenderError> {
    let mut items = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let item = parse_line(line).ok_or_else(|| RenderError::MalformedLine {
            line: idx + 1,
            text: line.trim().to_string(),
        })?;
        items.push(item);
    }

    if items.is_empty() {
        return Err(RenderError::EmptyInput);
    }
    Ok(items)
}

/// Split into code, shop and the rest of the line kept verbatim.
fn parse_line(line: &str) -> Option<LabelItem> {
    let (code, rest) = split_token(line)?;
    let (shop, rest) = split_token(rest)?;
    let name = rest.trim();
    if name.is_empty() {
        return None;
    }
    Some(LabelItem {
        code: code.to_string(),
        shop: shop.to_string(),
        name: name.to_string(),
    })
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], &s[end..])),
        None => Some((s, "")),
    }
}

/// Greedy word wrap to at most `width` characters per line.
/// Words longer than a line are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(width.max(1)) {
            let needed = if current_len == 0 { chunk.len() } else { current_len + 1 + chunk.len() };
            if needed > width && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(chunk);
            current_len += chunk.len();
        }
    }
    if current_len > 0 {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_line() {
        let items = parse_items("0001 Shop1 Wireless Scanner").unwrap();
        assert_eq!(
            items,
            vec![LabelItem {
                code: "0001".into(),
                shop: "Shop1".into(),
                name: "Wireless Scanner".into(),
            }]
        );
    }

    #[test]
    fn test_parse_keeps_inner_spacing_and_skips_blank() {
        let items = parse_items("\n  0001\tАжур  Сканер   ручной \n\n0002 Ажур Принтер").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].shop, "Ажур");
        assert_eq!(items[0].name, "Сканер   ручной");
        assert_eq!(items[1].code, "0002");
    }

    #[test]
    fn test_parse_malformed_line() {
        let err = parse_items("0001 Shop1 Scanner\n0002 OnlyTwoTokens").unwrap_err();
        assert_eq!(
            err,
            RenderError::MalformedLine { line: 2, text: "0002 OnlyTwoTokens".into() }
        );
        assert!(err.to_string().contains("строке 2"));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_items("").unwrap_err(), RenderError::EmptyInput);
        assert_eq!(parse_items(" \n\t\n").unwrap_err(), RenderError::EmptyInput);
    }

    #[test]
    fn test_wrap_short_text() {
        assert_eq!(wrap("Wireless Scanner", 28), vec!["Wireless Scanner"]);
        assert!(wrap("   ", 28).is_empty());
    }

    #[test]
    fn test_wrap_breaks_on_words() {
        let lines = wrap("Сканер штрихкодов беспроводной с подставкой и кабелем", 28);
        assert_eq!(
            lines,
            vec!["Сканер штрихкодов", "беспроводной с подставкой и", "кабелем"]
        );
        assert!(lines.iter().all(|l| l.chars().count() <= 28));
    }

    #[test]
    fn test_wrap_splits_long_word() {
        assert_eq!(wrap("abcdefghij xy", 4), vec!["abcd", "efgh", "ij", "xy"]);
    }
}
