//! Markup sanitizer with an allow-nothing policy.
//!
//! No tag or attribute survives. Elements whose content is executable or
//! invisible (script, style, ...) are dropped together with their content,
//! comments are dropped, and any `<` or `>` that does not start or end a tag
//! is escaped. The output never contains `<` or `>`, which makes the
//! transformation idempotent.

/// Elements removed together with everything up to their closing tag.
const CONTENT_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "noscript", "template", "object", "embed",
];

/// Strip markup from `text`.
pub fn sanitize(text: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical to `text`.
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('<') {
        let start = cursor + offset;
        push_text(&mut out, &text[cursor..start]);

        cursor = match markup_at(&lower, start) {
            Some(Markup {
                end,
                content_element: Some(name),
            }) => skip_element_content(&lower, end, name),
            Some(Markup { end, .. }) => end,
            None => {
                out.push_str("&lt;");
                start + 1
            }
        };
    }
    push_text(&mut out, &text[cursor..]);

    out
}

struct Markup {
    /// Byte offset just past the markup.
    end: usize,
    /// Set when the markup opens an element whose content must go too.
    content_element: Option<&'static str>,
}

/// Recognize a tag, closing tag, declaration or comment starting at `start`.
fn markup_at(lower: &str, start: usize) -> Option<Markup> {
    let rest = &lower[start..];

    if let Some(comment) = rest.strip_prefix("<!--") {
        let end = comment
            .find("-->")
            .map(|i| start + 4 + i + 3)
            .unwrap_or(lower.len());
        return Some(Markup {
            end,
            content_element: None,
        });
    }

    let first = rest[1..].chars().next()?;
    if !(first.is_ascii_alphabetic() || matches!(first, '/' | '!' | '?')) {
        return None;
    }

    let end = start + rest.find('>')? + 1;
    let name: String = rest[1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let content_element = CONTENT_ELEMENTS.iter().copied().find(|e| *e == name);

    Some(Markup {
        end,
        content_element,
    })
}

/// Offset just past `</name ...>`, or the end of input if the element is never closed.
fn skip_element_content(lower: &str, from: usize, name: &str) -> usize {
    let closing = format!("</{name}");
    match lower[from..].find(&closing) {
        Some(i) => {
            let tag_start = from + i;
            lower[tag_start..]
                .find('>')
                .map(|j| tag_start + j + 1)
                .unwrap_or(lower.len())
        }
        None => lower.len(),
    }
}

fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '>' => out.push_str("&gt;"),
            '\n' | '\r' | '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(sanitize("Tell me a story about a fox."), "Tell me a story about a fox.");
        assert_eq!(sanitize("line one\nline two\ttab"), "line one\nline two\ttab");
        assert_eq!(sanitize("llama2:13b"), "llama2:13b");
    }

    #[test]
    fn test_script_removed_with_content() {
        assert_eq!(sanitize("<script>alert(1)</script>"), "");
        assert_eq!(sanitize("hi <SCRIPT type=\"x\">alert(1)</ScRiPt> there"), "hi  there");
        assert_eq!(sanitize("<style>body{}</style>ok"), "ok");
        assert_eq!(sanitize("before<script>never closed"), "before");
    }

    #[test]
    fn test_tags_and_attributes_stripped() {
        assert_eq!(sanitize("Hello <b>world</b>"), "Hello world");
        assert_eq!(sanitize("<img src=x onerror=alert(1)>"), "");
        assert_eq!(sanitize("<a href=\"javascript:x()\">click</a>"), "click");
        assert_eq!(sanitize("a<!-- hidden -->b"), "ab");
        assert_eq!(sanitize("<!DOCTYPE html>text"), "text");
    }

    #[test]
    fn test_stray_brackets_escaped() {
        assert_eq!(sanitize("1 < 2 > 0"), "1 &lt; 2 &gt; 0");
        assert_eq!(sanitize("<<b>script>"), "&lt;script&gt;");
        assert_eq!(sanitize("<unterminated"), "&lt;unterminated");
    }

    #[test]
    fn test_control_characters_dropped() {
        assert_eq!(sanitize("a\u{0}b\u{7}c"), "abc");
    }

    #[test]
    fn test_non_ascii_preserved() {
        assert_eq!(sanitize("héllo <i>wörld</i> 日本"), "héllo wörld 日本");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<script>alert(1)</script>after",
            "1 < 2 > 0",
            "<<b>script>alert(1)<</b>/script>",
            "&lt;already escaped&gt;",
            "<div onclick=\"x\">text</div><!-- c",
            "plain",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert!(!once.contains('<') && !once.contains('>'), "{once:?}");
            assert_eq!(sanitize(&once), once, "input {input:?}");
        }
    }
}
