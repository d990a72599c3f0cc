use std::borrow::Cow;

use crate::input::MAX_LINE;

const PID_TOKEN: &[u8] = b"$$";

fn find_token(haystack: &[u8]) -> Option<usize> {
    haystack.windows(PID_TOKEN.len()).position(|w| w == PID_TOKEN)
}

/// Replaces every `$$` with `pid`, scanning left to right. Inserted digits are
/// never rescanned. When the expansion would not fit in a line buffer the
/// input comes back untouched.
pub fn expand_pid(input: &[u8], pid: u32) -> Cow<'_, [u8]> {
    if find_token(input).is_none() {
        return Cow::Borrowed(input);
    }

    let pid = pid.to_string();
    let mut expanded = Vec::with_capacity(input.len() + pid.len());
    let mut rest = input;
    while let Some(at) = find_token(rest) {
        expanded.extend_from_slice(&rest[..at]);
        expanded.extend_from_slice(pid.as_bytes());
        rest = &rest[at + PID_TOKEN.len()..];
    }
    expanded.extend_from_slice(rest);

    if expanded.len() > MAX_LINE {
        tracing::debug!(len = expanded.len(), "$$ expansion exceeds line bound, left as-is");
        return Cow::Borrowed(input);
    }
    Cow::Owned(expanded)
}

/// `expand_pid` with the interpreter's own pid.
pub fn expand_variables(input: &[u8]) -> Cow<'_, [u8]> {
    expand_pid(input, std::process::id())
}
