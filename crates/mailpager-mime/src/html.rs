//! HTML to plain text.

/// Renders HTML as readable text: markup removed, entities decoded, block
/// elements on their own lines. Leading and trailing whitespace is trimmed.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    nanohtml2text::html2text(html).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup() {
        let text = html_to_text("<html><body><p>Hello <b>there</b></p></body></html>");
        assert!(text.contains("Hello there"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn block_elements_break_lines() {
        let text = html_to_text("<p>one</p><p>two</p>");
        assert!(text.starts_with("one"));
        assert!(text.ends_with("two"));
        assert!(text.contains('\n'));
    }

    #[test]
    fn empty_document() {
        assert_eq!(html_to_text("<html><body></body></html>"), "");
    }
}
