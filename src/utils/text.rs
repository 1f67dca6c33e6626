/// Truncates to `max_chars` characters, appending `...` when anything was cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Removes control characters (keeping newlines and tabs) and caps the length.
#[must_use]
pub fn sanitize_user_text(raw: &str, max_chars: usize) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(max_chars)
        .collect()
}

/// Renders a rich-text (HTML) description as plain text for chat messages.
#[must_use]
pub fn html_to_plain(html: &str) -> String {
    if !html.contains('<') {
        return html.trim().to_string();
    }
    html2text::from_read(html.as_bytes(), 100)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| html.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_with_ellipsis("short", 80), "short");
        let exactly = "a".repeat(80);
        assert_eq!(truncate_with_ellipsis(&exactly, 80), exactly);
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let long = "é".repeat(81);
        let out = truncate_with_ellipsis(&long, 80);
        assert_eq!(out.chars().count(), 83);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_user_text("a\u{0000}b\nc", 100), "ab\nc");
        assert_eq!(sanitize_user_text("abcdef", 3), "abc");
    }

    #[test]
    fn html_is_flattened() {
        let plain = html_to_plain("<div>Ship <strong>it</strong></div>");
        assert!(plain.contains("Ship"));
        assert!(plain.contains("it"));
        assert!(!plain.contains('<'));
        assert_eq!(html_to_plain("  plain  "), "plain");
    }
}
