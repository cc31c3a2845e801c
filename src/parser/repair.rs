//! Syntax repair for truncated or sloppily quoted model output.
//!
//! Repairs only substitute literals or append closers; nothing is ever removed.
//! Closers are appended by global deficit, all `]` before any `}`. That is a
//! heuristic, not bracket matching: a truncation that leaves a mapping open
//! inside a sequence (`[{"a": 1`) gets `]}` and stays broken.

const QUOTED_TRUE: &str = "\"true\"";
const QUOTED_FALSE: &str = "\"false\"";

/// Normalize quoting and close missing delimiters. Idempotent.
pub fn repair(text: &str) -> String {
    let mut out = substitute_literals(text);
    close_deficits(&mut out);
    out
}

/// Single quotes become double quotes and quoted booleans lose their quotes.
///
/// Apostrophes inside string values are converted too; values like `"she's"`
/// will not parse afterwards. Accepted: the fallback tier picks those up.
pub fn substitute_literals(text: &str) -> String {
    let mut out = text.replace('\'', "\"");
    // Unquoting can expose a new quoted literal (`""true""`), so run to a fixed point.
    while out.contains(QUOTED_TRUE) || out.contains(QUOTED_FALSE) {
        out = out.replace(QUOTED_TRUE, "true").replace(QUOTED_FALSE, "false");
    }
    out
}

/// Append missing `]` then missing `}`, counting every occurrence in the text.
fn close_deficits(text: &mut String) {
    let (open_sq, close_sq) = count_pair(text, '[', ']');
    let (open_curly, close_curly) = count_pair(text, '{', '}');
    push_n(text, ']', open_sq.saturating_sub(close_sq));
    push_n(text, '}', open_curly.saturating_sub(close_curly));
}

/// Second-chance closer: ignores delimiters inside string literals and
/// terminates a string the generation stopped in the middle of.
pub fn close_outside_strings(text: &str) -> String {
    let mut out = text.to_string();
    let mut in_string = false;
    let mut escaped = false;
    let mut open_sq: usize = 0;
    let mut close_sq: usize = 0;
    let mut open_curly: usize = 0;
    let mut close_curly: usize = 0;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => open_sq += 1,
            ']' => close_sq += 1,
            '{' => open_curly += 1,
            '}' => close_curly += 1,
            _ => {}
        }
    }

    if in_string {
        if escaped {
            out.push('\\');
        }
        out.push('"');
    }
    push_n(&mut out, ']', open_sq.saturating_sub(close_sq));
    push_n(&mut out, '}', open_curly.saturating_sub(close_curly));
    out
}

fn count_pair(text: &str, open: char, close: char) -> (usize, usize) {
    text.chars().fold((0, 0), |(o, c), ch| {
        if ch == open {
            (o + 1, c)
        } else if ch == close {
            (o, c + 1)
        } else {
            (o, c)
        }
    })
}

fn push_n(text: &mut String, c: char, n: usize) {
    text.extend(std::iter::repeat(c).take(n));
}

// ── Tests ──
