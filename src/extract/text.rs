//! Text cleanup shared by the extraction backends.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

static SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_-]*)[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

static WRAPPED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\r?\n?```\s*\z")
        .expect("wrapper pattern is valid")
});

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
});

/// Marker appended to truncated content.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Strips HTML tags, decodes the common entities and collapses whitespace.
#[must_use]
pub fn clean_html(content: &str) -> String {
    let without_tags = TAG_RE.replace_all(content, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..idx]),
        None => text.to_string(),
    }
}

/// Removes a Markdown code fence wrapping the whole reply, if there is one.
#[must_use]
pub fn strip_code_fences(reply: &str) -> &str {
    match WRAPPED_RE.captures(reply).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => reply.trim(),
    }
}

/// Bodies of fenced blocks whose language tag is one of `languages`, in order.
#[must_use]
pub fn fenced_blocks<'a>(content: &'a str, languages: &[&str]) -> Vec<&'a str> {
    FENCED_RE
        .captures_iter(content)
        .filter(|c| {
            let lang = c.get(1).map_or("", |m| m.as_str());
            languages.iter().any(|l| l.eq_ignore_ascii_case(lang))
        })
        .filter_map(|c| c.get(2).map(|m| m.as_str()))
        .collect()
}

/// Title of a document: the HTML `<title>`, else the first Markdown heading.
#[must_use]
pub fn document_title(content: &str) -> Option<String> {
    if let Some(title) = TITLE_RE.captures(content).and_then(|c| c.get(1)) {
        let title = clean_html(title.as_str());
        if !title.is_empty() {
            return Some(title);
        }
    }
    content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_html_strips_tags_and_entities() {
        let html = "<h1>Orders</h1>\n<p>Holds &amp; tracks   <b>orders</b></p>";
        assert_eq!(clean_html(html), "Orders Holds & tracks orders");
    }

    #[test]
    fn truncate_marks_the_cut() {
        assert_eq!(truncate_chars("abcdef", 3), "abc... [truncated]");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé... [truncated]");
    }

    #[test]
    fn strips_wrapping_fence() {
        assert_eq!(
            strip_code_fences("```json\n{\"tables\": []}\n```"),
            "{\"tables\": []}"
        );
        assert_eq!(strip_code_fences("  {\"tables\": []} "), "{\"tables\": []}");
    }

    #[test]
    fn finds_fenced_blocks_by_language() {
        let doc = "intro\n```yaml\ntables: []\n```\n```sql\nselect 1\n```\n```JSON\n{}\n```\n";
        assert_eq!(
            fenced_blocks(doc, &["yaml", "json"]),
            vec!["tables: []\n", "{}\n"]
        );
    }

    #[test]
    fn title_prefers_html_title() {
        assert_eq!(
            document_title("<html><title>Orders design</title><h1>Other</h1></html>"),
            Some("Orders design".into())
        );
        assert_eq!(
            document_title("text\n## Customers\nmore"),
            Some("Customers".into())
        );
        assert_eq!(document_title("plain text"), None);
    }
}
