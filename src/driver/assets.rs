//! Static assets for browser startup.
//!
//! When no start URL is configured the browser opens an empty page whose
//! only content is the window title. The page travels inline as a base64
//! `data:` URI, so the title may contain any characters.

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

// ============================================================================
// Constants
// ============================================================================

/// HTML template for the blank start page.
const BLANK_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>$TITLE</title>
</head>
<body></body>
</html>"#;

// ============================================================================
// Public Functions
// ============================================================================

/// Builds the blank start page carrying `title` as a data URI.
///
/// # Returns
///
/// A `data:text/html;base64,...` URI that can be passed to `--app=`.
#[must_use]
pub fn blank_page_uri(title: &str) -> String {
    let html = BLANK_HTML_TEMPLATE.replace("$TITLE", &escape_html(title));
    format!("data:text/html;base64,{}", STANDARD.encode(html))
}

// ============================================================================
// Internal Functions
// ============================================================================

/// Escapes text for use inside an HTML element.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(uri: &str) -> String {
        let encoded = uri
            .strip_prefix("data:text/html;base64,")
            .expect("data uri prefix");
        String::from_utf8(STANDARD.decode(encoded).expect("base64")).expect("utf8")
    }

    #[test]
    fn test_blank_page_carries_title() {
        let html = decode(&blank_page_uri("My App"));
        assert!(html.contains("<title>My App</title>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_blank_page_escapes_title() {
        let html = decode(&blank_page_uri("<script>alert('x')</script> & co"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_blank_page_empty_title() {
        let html = decode(&blank_page_uri(""));
        assert!(html.contains("<title></title>"));
    }

    #[test]
    fn test_uri_is_single_argument() {
        let uri = blank_page_uri("spaces and , commas");
        assert!(!uri.contains(' '));
        assert_eq!(uri.matches(',').count(), 1);
    }
}
