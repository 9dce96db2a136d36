//! Converts tracker-API HTML into the Telegram HTML subset.
//!
//! The tracker renders rich text as a small set of block and inline tags.
//! Telegram only accepts `{b, i, code, pre, a}`, so everything else is
//! rewritten into plain-text structure (headings, paragraphs, lists) and
//! unknown tags are stripped with their text preserved. The converter never
//! fails: malformed tag soup degrades to stripped text.

use crate::chunk::MAX_MESSAGE_LEN;
use regex::Regex;
use std::sync::OnceLock;

/// Glyph prefixed to heading lines.
const HEADING_GLYPH: &str = "📌";

/// Room reserved below the platform limit for the truncation notice.
const TRUNCATION_RESERVE: usize = 120;

/// Whole words that get a success glyph prefixed.
const POSITIVE_WORDS: &[&str] = &[
    "done",
    "completed",
    "complete",
    "succeeded",
    "success",
    "merged",
    "fixed",
    "resolved",
    "passed",
    "shipped",
];

/// Whole words that get a warning glyph prefixed.
const NEGATIVE_WORDS: &[&str] = &[
    "failed",
    "failure",
    "error",
    "errors",
    "blocked",
    "broken",
    "urgent",
    "critical",
    "regression",
];

/// Conversion options.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Linked from the truncation notice when the output is cut short.
    pub link_url: Option<String>,
    /// Prefix status glyphs onto known positive/negative words.
    pub inject_glyphs: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            link_url: None,
            inject_glyphs: true,
        }
    }
}

/// Which list construct encloses the current `<li>` items.
enum ListKind {
    Unordered,
    Ordered(usize),
}

/// Convert tracker HTML into Telegram-safe HTML.
pub fn convert(source: &str, options: &ConvertOptions) -> String {
    if source.trim().is_empty() {
        return String::new();
    }

    let converted = convert_tags(source);
    let normalized = normalize_whitespace(&converted);
    let decorated = if options.inject_glyphs {
        inject_glyphs(&normalized)
    } else {
        normalized
    };

    truncate_if_needed(decorated, options.link_url.as_deref())
}

/// Single pass over the source, rewriting tags into the platform subset.
fn convert_tags(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut lists: Vec<ListKind> = Vec::new();
    let mut link_open = false;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        let Some(gt) = rest.find('>') else {
            // Stray '<' with no closing bracket — keep it visible as text.
            out.push_str("&lt;");
            rest = &rest[1..];
            continue;
        };

        let tag_body = &rest[1..gt];
        rest = &rest[gt + 1..];

        let closing = tag_body.starts_with('/');
        let body = tag_body.trim_start_matches('/').trim_end_matches('/');
        let name: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let attrs = &body[name.len()..];

        match name.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if closing {
                    out.push_str("</b>\n\n");
                } else {
                    out.push_str("<b>");
                    out.push_str(HEADING_GLYPH);
                    out.push(' ');
                }
            }
            "p" => {
                if closing {
                    out.push_str("\n\n");
                }
            }
            "br" => out.push('\n'),
            "ul" => {
                if closing {
                    lists.pop();
                    out.push('\n');
                } else {
                    lists.push(ListKind::Unordered);
                }
            }
            "ol" => {
                if closing {
                    lists.pop();
                    out.push('\n');
                } else {
                    lists.push(ListKind::Ordered(0));
                }
            }
            "li" => {
                if closing {
                    out.push('\n');
                } else {
                    match lists.last_mut() {
                        Some(ListKind::Ordered(n)) => {
                            *n += 1;
                            out.push_str(&format!("{n}. "));
                        }
                        _ => out.push_str("• "),
                    }
                }
            }
            "b" | "strong" => out.push_str(if closing { "</b>" } else { "<b>" }),
            "i" | "em" => out.push_str(if closing { "</i>" } else { "<i>" }),
            // Open code/pre consumes its body verbatim, so a `closing`
            // match here is an orphan close tag — strip it.
            "code" => {
                if !closing {
                    out.push_str("<code>");
                    rest = copy_verbatim_until(&mut out, rest, "</code>");
                    out.push_str("</code>");
                }
            }
            "pre" => {
                if !closing {
                    out.push_str("<pre>");
                    rest = copy_verbatim_until(&mut out, rest, "</pre>");
                    out.push_str("</pre>");
                }
            }
            "a" => {
                if closing {
                    if link_open {
                        out.push_str("</a>");
                        link_open = false;
                    }
                } else if let Some(href) = extract_href(attrs) {
                    out.push_str("<a href=\"");
                    out.push_str(&href);
                    out.push_str("\">");
                    link_open = true;
                }
                // An <a> without an href is stripped like any unknown tag.
            }
            // Unknown tag: strip it, keep the surrounding text.
            _ => {}
        }
    }
    out.push_str(rest);

    // A dangling open link would make the whole payload unparsable.
    if link_open {
        out.push_str("</a>");
    }

    out
}

/// Copy code/pre inner text through untouched up to `close`. The source is
/// pre-escaped, so nothing inside is reinterpreted as a tag. An unclosed
/// block swallows the remainder of the input.
fn copy_verbatim_until<'a>(out: &mut String, rest: &'a str, close: &str) -> &'a str {
    match rest.find(close) {
        Some(end) => {
            out.push_str(&rest[..end]);
            &rest[end + close.len()..]
        }
        None => {
            out.push_str(rest);
            ""
        }
    }
}

/// Pull the href value out of an `<a>` tag's attribute text.
fn extract_href(attrs: &str) -> Option<String> {
    let idx = attrs.find("href=")?;
    let value = &attrs[idx + 5..];
    let quote = value.chars().next()?;
    if quote == '"' || quote == '\'' {
        let inner = &value[1..];
        let end = inner.find(quote)?;
        Some(inner[..end].to_string())
    } else {
        let end = value
            .find(|c: char| c.is_whitespace())
            .unwrap_or(value.len());
        Some(value[..end].to_string())
    }
}

/// Trim leading whitespace and collapse runs of 3+ newlines to exactly 2.
/// Trailing blank lines survive (collapsed, not removed).
fn normalize_whitespace(text: &str) -> String {
    let text = text.trim_start();
    let mut out = String::with_capacity(text.len());
    let mut run = 0usize;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run <= 2 {
                out.push('\n');
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out
}

fn positive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| word_regex(POSITIVE_WORDS))
}

fn negative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| word_regex(NEGATIVE_WORDS))
}

fn word_regex(words: &[&str]) -> Regex {
    let pattern = format!(r"(?i)\b({})\b", words.join("|"));
    Regex::new(&pattern).expect("vocabulary regex is statically valid")
}

/// Prefix status glyphs onto vocabulary words. Operates on the text between
/// tags only, so URLs and attribute values are never rewritten.
fn inject_glyphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    loop {
        let (segment, tag_and_rest) = match rest.find('<') {
            Some(lt) => (&rest[..lt], &rest[lt..]),
            None => (rest, ""),
        };

        let with_success = positive_re().replace_all(segment, "✅ $1");
        out.push_str(&negative_re().replace_all(&with_success, "⚠️ $1"));

        if tag_and_rest.is_empty() {
            break;
        }
        match tag_and_rest.find('>') {
            Some(gt) => {
                out.push_str(&tag_and_rest[..=gt]);
                rest = &tag_and_rest[gt + 1..];
            }
            None => {
                out.push_str(tag_and_rest);
                break;
            }
        }
    }

    out
}

/// Cut the output below the platform limit, preferring a paragraph boundary,
/// and append a truncation notice.
fn truncate_if_needed(text: String, link_url: Option<&str>) -> String {
    let threshold = MAX_MESSAGE_LEN - TRUNCATION_RESERVE;
    let char_count = text.chars().count();
    if char_count <= threshold {
        return text;
    }

    let cut_bytes = byte_index_at_char(&text, threshold);
    let head = &text[..cut_bytes];
    let cut = match head.rfind("\n\n") {
        Some(p) if p > 0 => p,
        _ => cut_bytes,
    };

    let mut out = text[..cut].trim_end().to_string();
    match link_url {
        Some(url) => {
            out.push_str(&format!(
                "\n\n<i>…truncated.</i> <a href=\"{url}\">View the full text</a>"
            ));
        }
        None => out.push_str("\n\n<i>…truncated.</i>"),
    }
    out
}

/// Byte offset of the `n`th character (or the end of the string).
fn byte_index_at_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
