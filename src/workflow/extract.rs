//! Fenced code block extraction from model replies.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HTML_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```html\r?\n(.*?)```").expect("valid html block regex"));

static CSS_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```css\r?\n(.*?)```").expect("valid css block regex"));

/// Kind of generated code, and of the artifact it ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeKind {
    Html,
    Css,
}

impl CodeKind {
    /// Language tag used on fenced code blocks.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::Html => &HTML_BLOCK,
            Self::Css => &CSS_BLOCK,
        }
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Body of the first fenced block of the given kind, trimmed.
///
/// Returns an empty string when the reply has no such block.
pub fn extract_code(response: &str, kind: CodeKind) -> String {
    kind.pattern()
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_both_kinds_independently() {
        let reply = "Here you go:\n```html\n<nav>Menu</nav>\n```\nand\n```css\nnav { color: red; }\n```";
        assert_eq!(extract_code(reply, CodeKind::Html), "<nav>Menu</nav>");
        assert_eq!(extract_code(reply, CodeKind::Css), "nav { color: red; }");
    }

    #[test]
    fn test_missing_block_is_empty() {
        let reply = "```html\n<p>only markup</p>\n```";
        assert_eq!(extract_code(reply, CodeKind::Css), "");
        assert_eq!(extract_code("no code at all", CodeKind::Html), "");
    }

    #[test]
    fn test_first_block_wins() {
        let reply = "```css\na {}\n```\n```css\nb {}\n```";
        assert_eq!(extract_code(reply, CodeKind::Css), "a {}");
    }

    #[test]
    fn test_block_spans_lines_and_is_trimmed() {
        let reply = "```html\n\n  <div>\n    <p>x</p>\n  </div>\n\n```";
        assert_eq!(extract_code(reply, CodeKind::Html), "<div>\n    <p>x</p>\n  </div>");
    }

    #[test]
    fn test_unterminated_block_is_ignored() {
        assert_eq!(extract_code("```html\n<p>cut off", CodeKind::Html), "");
    }

    #[test]
    fn test_other_languages_do_not_match() {
        let reply = "```htmlx\n<p>nope</p>\n```\n```scss\n$a: 1;\n```";
        assert_eq!(extract_code(reply, CodeKind::Html), "");
        assert_eq!(extract_code(reply, CodeKind::Css), "");
    }

    #[test]
    fn test_code_kind_display() {
        assert_eq!(CodeKind::Html.to_string(), "html");
        assert_eq!(CodeKind::Css.keyword(), "css");
    }
}
