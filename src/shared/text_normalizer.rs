use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[\s\S]*?>").unwrap());

static WHITESPACE_RUN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strips HTML markup from survey text and collapses whitespace.
///
/// Tags are removed first, then literal `&nbsp;` entities become spaces, and
/// finally whitespace runs collapse to one space before trimming.
pub fn normalize_html(text: &str) -> String {
    let stripped = HTML_TAG_PATTERN.replace_all(text, "");
    let spaced = stripped.replace("&nbsp;", " ");
    WHITESPACE_RUN_PATTERN
        .replace_all(&spaced, " ")
        .trim()
        .to_string()
}

/// Wraps `value` in `quote` unless it is already wrapped.
pub fn quote_value(value: &str, quote: char) -> String {
    let already_quoted =
        value.len() >= 2 * quote.len_utf8() && value.starts_with(quote) && value.ends_with(quote);
    if already_quoted {
        value.to_string()
    } else {
        format!("{quote}{value}{quote}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_entities() {
        let input = "<div><b>How&nbsp;satisfied</b>\n are   you?</div>";
        assert_eq!(normalize_html(input), "How satisfied are you?");
    }

    #[test]
    fn test_multiline_tag() {
        let input = "<span\nstyle=\"color:red\">Red</span>";
        assert_eq!(normalize_html(input), "Red");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(normalize_html("Blue"), "Blue");
        assert_eq!(normalize_html("   "), "");
    }

    #[test]
    fn test_quote_value() {
        assert_eq!(quote_value("Red", '"'), "\"Red\"");
        assert_eq!(quote_value("\"Red\"", '"'), "\"Red\"");
        assert_eq!(quote_value("\"", '"'), "\"\"\"");
        assert_eq!(quote_value("Age group", '`'), "`Age group`");
    }
}
