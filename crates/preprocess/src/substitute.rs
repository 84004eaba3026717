//! Text-substitution primitives shared by the preprocessing pipeline.
//!
//! Functions:
//! - [`replace_with`]: regex find/replace with a per-match callback.
//! - [`strip_matches`]: delete every match of a pattern.
//! - [`balanced_close`]: locate the brace that closes an open block.

use regex::{Captures, Regex};

/// Replaces every match of `re` in `input` with the result of `f`, keeping
/// unmatched text untouched.
pub fn replace_with<F>(re: &Regex, input: &str, f: F) -> String
where
    F: FnMut(&Captures<'_>) -> String,
{
    re.replace_all(input, f).into_owned()
}

/// Removes every match of `re` from `input`. Line-anchored patterns leave
/// the line's newline behind, so a deleted declaration becomes an empty line.
pub fn strip_matches(re: &Regex, input: &str) -> String {
    re.replace_all(input, "").into_owned()
}

/// Scans `body` for the `}` closing a block whose `{` has already been
/// consumed, tracking nested braces by depth. Returns the byte index of that
/// closing brace, or `None` when the text ends while the block is still open.
///
/// Braces inside string literals or comments are counted like any other;
/// callers relying on this for function stripping inherit that limitation.
pub fn balanced_close(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, ch) in body.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                if depth == 0 {
                    return Some(index);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}
