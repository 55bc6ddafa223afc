//! Configurable XML text escaping.

use std::fmt::Write as _;

use crate::options::EntitySet;

/// Escapes `text` for XML character data.
///
/// Only the entities enabled in `entities` are replaced. With `numeric`,
/// every character outside `0x20..=0x7F` becomes a decimal character
/// reference (`é` → `&#233;`).
#[must_use]
pub fn escape_text(text: &str, entities: EntitySet, numeric: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' if entities.amp => out.push_str("&amp;"),
            '"' if entities.quot => out.push_str("&quot;"),
            '\'' if entities.apos => out.push_str("&apos;"),
            '<' if entities.lt => out.push_str("&lt;"),
            '>' if entities.gt => out.push_str("&gt;"),
            c if numeric && !(' '..='\u{7f}').contains(&c) => {
                let _ = write!(out, "&#{};", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out
}
