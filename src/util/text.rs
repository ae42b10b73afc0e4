use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

const ELLIPSIS: char = '…';

/// Removes control characters from text received over the network.
///
/// Newlines and tabs are replaced with a single space so a title can never
/// break a one-line listing; every other control character is dropped.
/// Returns `Cow::Borrowed` when nothing needed changing.
///
/// ```
/// use hn_reader::util::sanitize_text;
///
/// assert_eq!(sanitize_text("plain"), "plain");
/// assert_eq!(sanitize_text("two\nlines"), "two lines");
/// assert_eq!(sanitize_text("bell\u{7}"), "bell");
/// ```
pub fn sanitize_text(s: &str) -> Cow<'_, str> {
    if !s.chars().any(char::is_control) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.chars()
            .filter_map(|c| match c {
                '\n' | '\r' | '\t' => Some(' '),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect(),
    )
}

/// Truncates `s` to at most `max_width` terminal columns, ending in `…`
/// when something was cut.
///
/// Width is measured with `unicode-width`, so wide (CJK, emoji) characters
/// count as two columns.
///
/// ```
/// use hn_reader::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 6), "Hello…");
/// assert_eq!(truncate_to_width("Test", 0), "");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let mut width = 0;
    // Byte index of the last char that still leaves room for the ellipsis.
    let mut keep = 0;

    for (idx, c) in s.char_indices() {
        let w = c.width().unwrap_or(0);
        if width + w > max_width {
            if max_width == 0 {
                return Cow::Borrowed("");
            }
            let mut out = s[..keep].to_string();
            out.push(ELLIPSIS);
            return Cow::Owned(out);
        }
        width += w;
        if width < max_width {
            keep = idx + c.len_utf8();
        }
    }

    Cow::Borrowed(s)
}
