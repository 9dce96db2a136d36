//! Splits long text into platform-sized pieces.
//!
//! Cuts prefer paragraph breaks, then line breaks, and only fall back to a
//! hard cut when no boundary sits in the back half of the window. The
//! markup-aware variant additionally refuses to strand an open tag in one
//! piece and its close in the next.

/// Maximum outbound message length the platform accepts.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Tags whose open/close pairs must stay inside a single chunk.
const PAIRED_TAGS: &[&str] = &["b", "i", "code", "pre", "a"];

/// Split `text` into chunks of at most `max_len` characters.
///
/// Text at or under the limit comes back as exactly one chunk, including
/// the empty string. Boundary cuts drop the whitespace at the cut point;
/// hard cuts keep every character.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    split(text, max_len, false)
}

/// Markup-aware variant for already-converted platform HTML.
pub fn chunk_markup(text: &str, max_len: usize) -> Vec<String> {
    split(text, max_len, true)
}

fn split(text: &str, max_len: usize, markup_aware: bool) -> Vec<String> {
    assert!(max_len > 0, "chunk window must be non-empty");

    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    loop {
        if rest.chars().count() <= max_len {
            if !rest.is_empty() {
                chunks.push(rest.to_string());
            }
            break;
        }

        let window_end = byte_index_at_char(rest, max_len);
        let midpoint = byte_index_at_char(rest, max_len / 2);
        let window = &rest[..window_end];

        let mut cut = pick_cut(window, midpoint);
        if markup_aware {
            cut = make_markup_safe(rest, window, cut);
        }

        match cut {
            Cut::Boundary(pos) => {
                let piece = rest[..pos].trim_end();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
                rest = rest[pos..].trim_start_matches('\n');
            }
            Cut::Hard(pos) => {
                chunks.push(rest[..pos].to_string());
                rest = &rest[pos..];
            }
        }
    }

    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cut {
    /// Cut at a newline; the boundary whitespace is dropped.
    Boundary(usize),
    /// Cut exactly here, keeping every character.
    Hard(usize),
}

/// Boundary preference for one window: last paragraph break past the
/// midpoint, else last line break past the midpoint, else a hard cut at
/// the window end.
fn pick_cut(window: &str, midpoint: usize) -> Cut {
    if let Some(pos) = window.rfind("\n\n") {
        if pos >= midpoint {
            return Cut::Boundary(pos);
        }
    }
    if let Some(pos) = window.rfind('\n') {
        if pos >= midpoint {
            return Cut::Boundary(pos);
        }
    }
    Cut::Hard(window.len())
}

/// Move an unsafe cut to a position that neither lands inside `<...>` nor
/// strands an unmatched open tag. Falls back to the nearest newline whose
/// prefix is tag-balanced, then to the original cut when nothing safer
/// exists (e.g. one oversized `<pre>` body).
fn make_markup_safe(rest: &str, window: &str, cut: Cut) -> Cut {
    let pos = match cut {
        Cut::Boundary(p) | Cut::Hard(p) => p,
    };

    // Never split the tag brackets themselves. A tag longer than the whole
    // window leaves nowhere better to cut, so keep the original position.
    let pos = match adjust_for_tag_brackets(rest, pos) {
        0 => pos,
        adjusted => adjusted,
    };

    if open_tag_depth(&rest[..pos]) == 0 {
        // A bracket back-off stays a hard cut so no characters are trimmed.
        return match cut {
            Cut::Boundary(_) => Cut::Boundary(pos),
            Cut::Hard(_) => Cut::Hard(pos),
        };
    }

    // Walk newlines backwards looking for a tag-balanced prefix.
    let mut search = &window[..pos.min(window.len())];
    while let Some(nl) = search.rfind('\n') {
        if nl > 0 && open_tag_depth(&rest[..nl]) == 0 {
            return Cut::Boundary(nl);
        }
        search = &search[..nl];
    }

    Cut::Hard(pos)
}

/// If `pos` falls between `<` and `>`, back up to the `<`.
fn adjust_for_tag_brackets(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = pos;
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b'>' => return pos,
            b'<' => return i,
            _ => {}
        }
    }
    pos
}

/// Net count of platform tags opened but not closed in `piece`.
fn open_tag_depth(piece: &str) -> i32 {
    let mut depth = 0i32;
    let mut rest = piece;
    while let Some(lt) = rest.find('<') {
        rest = &rest[lt + 1..];
        let Some(gt) = rest.find('>') else { break };
        let body = &rest[..gt];
        rest = &rest[gt + 1..];

        let closing = body.starts_with('/');
        let name: String = body
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if PAIRED_TAGS.contains(&name.as_str()) {
            depth += if closing { -1 } else { 1 };
        }
    }
    depth
}

fn byte_index_at_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
