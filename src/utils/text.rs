use std::collections::HashSet;

/// Strip all markup from user-supplied free text and trim it.
///
/// The result is plain text, not HTML: characters such as `&` and `<` are kept
/// as typed and must be escaped by whatever renders them.
pub fn sanitize_plain(input: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder.tags(HashSet::new());
    let cleaned = builder.clean(input).to_string();
    unescape_serialized_text(&cleaned).trim().to_string()
}

/// Like [`sanitize_plain`], but `None` when nothing is left after cleaning.
pub fn sanitize_required(input: &str) -> Option<String> {
    Some(sanitize_plain(input)).filter(|text| !text.is_empty())
}

// ammonia serializes text nodes with exactly these four escapes. A single pass
// keeps literal entity text like "&amp;lt;" from being decoded twice.
fn unescape_serialized_text(input: &str) -> String {
    const ESCAPES: [(&str, &str); 4] = [
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&nbsp;", "\u{a0}"),
    ];

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        match ESCAPES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push_str(ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_removed() {
        assert_eq!(
            sanitize_plain("  Great <b>work</b><script>alert(1)</script> "),
            "Great work"
        );
        assert_eq!(sanitize_plain("plain text"), "plain text");
    }

    #[test]
    fn test_plain_punctuation_survives() {
        assert_eq!(
            sanitize_plain("Tom & Jerry: 5 > 4 stars"),
            "Tom & Jerry: 5 > 4 stars"
        );
        assert_eq!(sanitize_plain("a < b && c"), "a < b && c");
        assert_eq!(sanitize_plain("literal &amp;lt; text"), "literal &lt; text");
    }

    #[test]
    fn test_cleaning_never_grows_text() {
        let title = "&".repeat(150);
        let cleaned = sanitize_plain(&title);

        assert_eq!(cleaned, title);
        assert!(cleaned.chars().count() <= 150);

        let mixed = "<i>R&amp;D</i> > ops ".repeat(10);
        assert!(sanitize_plain(&mixed).chars().count() <= mixed.chars().count());
    }

    #[test]
    fn test_required_text_rejects_markup_only() {
        assert_eq!(sanitize_required("<b></b>  "), None);
        assert_eq!(sanitize_required(" Fix sink & tap "), Some("Fix sink & tap".to_string()));
    }
}
