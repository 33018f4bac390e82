mod path_flags;

use std::borrow::Cow;

pub use crate::path_flags::PathFlags;

/// Bumped whenever the shape of generated template specs changes. Runtimes
/// refuse to instantiate specs stamped with a different revision.
pub const COMPILER_REVISION: u32 = 1;

/// Escapes a string for inclusion in HTML text or attribute values.
pub fn escape_expression(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'', '`', '=']) {
        return Cow::Borrowed(input);
    }

    let mut escaped = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '`' => escaped.push_str("&#x60;"),
            '=' => escaped.push_str("&#x3D;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
