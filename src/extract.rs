//! Forgiving, pattern-based extraction from raw XML fragments.
//!
//! Feeds in the wild are frequently invalid XML. A strict parser aborts on
//! the first malformed construct and loses the whole feed; matching patterns
//! against the raw text degrades per field instead. Nothing here panics or
//! returns an error: a field that cannot be extracted is simply absent.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Returns the trimmed text content of the first `<tag ...>...</tag>` span,
/// case-insensitive, shortest match, attributes on the opening tag ignored.
pub fn extract_tag_text(fragment: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"(?is)<{0}\b[^>]*>(.*?)</{0}>", regex::escape(tag));
    let re = Regex::new(&pattern).ok()?;
    re.captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Returns the value of `attr` on the first `<tag ...>` opening tag, accepting
/// single or double quotes.
pub fn extract_attribute(fragment: &str, tag: &str, attr: &str) -> Option<String> {
    let pattern = format!(
        r#"(?is)<{}\b[^>]*\b{}\s*=\s*["']([^"']+)["']"#,
        regex::escape(tag),
        regex::escape(attr)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Strips embedded markup, decodes XML/HTML character entities
/// (`&amp; &lt; &gt; &quot; &apos;` and friends), and trims whitespace.
/// Worst case on garbage input is an empty string.
pub fn sanitize_text(raw: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());

    let stripped = re_tags.replace_all(raw, "");
    html_escape::decode_html_entities(stripped.as_ref())
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_text_is_first_match_trimmed() {
        let xml = "<item><title>  First </title><title>Second</title></item>";
        assert_eq!(extract_tag_text(xml, "title").as_deref(), Some("First"));
    }

    #[test]
    fn tag_match_is_case_insensitive_and_ignores_attributes() {
        let xml = r#"<TITLE type="text">Budget vote</TITLE>"#;
        assert_eq!(
            extract_tag_text(xml, "title").as_deref(),
            Some("Budget vote")
        );
    }

    #[test]
    fn tag_text_spans_newlines_non_greedily() {
        let xml = "<entry><summary>line one\nline two</summary><summary>x</summary></entry>";
        assert_eq!(
            extract_tag_text(xml, "summary").as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn missing_or_selfclosing_tag_yields_none() {
        assert_eq!(extract_tag_text("<link href='u'/>", "link"), None);
        assert_eq!(extract_tag_text("plain text, no xml", "title"), None);
        assert_eq!(extract_tag_text("", "title"), None);
    }

    #[test]
    fn tag_name_is_matched_on_word_boundary() {
        // <linkrel> must not satisfy a lookup for <link>.
        let xml = "<linkrel>nope</linkrel>";
        assert_eq!(extract_tag_text(xml, "link"), None);
    }

    #[test]
    fn attribute_supports_both_quote_styles() {
        assert_eq!(
            extract_attribute(r#"<link rel="alternate" href="https://a.example/1"/>"#, "link", "href").as_deref(),
            Some("https://a.example/1")
        );
        assert_eq!(
            extract_attribute("<link href='https://a.example/2'/>", "link", "href").as_deref(),
            Some("https://a.example/2")
        );
    }

    #[test]
    fn attribute_absent_yields_none() {
        assert_eq!(extract_attribute("<link rel='self'/>", "link", "href"), None);
        assert_eq!(extract_attribute("", "link", "href"), None);
    }

    #[test]
    fn sanitize_strips_markup_and_decodes_entities() {
        let raw = " <b>Senator &amp; Governor</b> say &quot;aye&quot; ";
        assert_eq!(sanitize_text(raw), r#"Senator & Governor say "aye""#);
    }

    #[test]
    fn sanitize_never_panics_on_malformed_input() {
        assert_eq!(sanitize_text(""), "");
        assert_eq!(sanitize_text("<unclosed"), "<unclosed");
        // Empty angle pairs are not tags; they pass through untouched.
        assert_eq!(sanitize_text("<><>"), "<><>");
    }

    #[test]
    fn sanitize_is_idempotent_on_its_own_output() {
        let raw = "<p>Votes &amp; vetoes, <i>aye</i></p>";
        let once = sanitize_text(raw);
        assert_eq!(once, "Votes & vetoes, aye");
        assert_eq!(sanitize_text(&once), once);
    }
}
