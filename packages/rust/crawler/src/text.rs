//! Visible-text extraction from HTML.

use scraper::{Html, Node};

/// Elements whose text content is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Extract the visible text of a document with whitespace collapsed.
///
/// Text under `<script>`, `<style>` and similar elements is skipped. Runs of
/// whitespace (including newlines) become a single space.
pub fn html_to_text(doc: &Html) -> String {
    let mut out = String::new();

    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if hidden {
            continue;
        }

        for word in text.split_whitespace() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(word);
        }
    }

    out
}

/// Truncate to at most `max_chars` characters without splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_scripts_and_collapses_whitespace() {
        let doc = Html::parse_document(
            r#"<html><head><title>Acme</title><style>body { color: red }</style></head>
            <body>
              <h1>Acme   Freight</h1>
              <script>var tracking = 1;</script>
              <p>Ship
                 anything,
              anywhere.</p>
              <noscript>Enable JS</noscript>
            </body></html>"#,
        );
        assert_eq!(html_to_text(&doc), "Acme Freight Ship anything, anywhere.");
    }

    #[test]
    fn empty_document_is_empty_text() {
        let doc = Html::parse_document("");
        assert_eq!(html_to_text(&doc), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
