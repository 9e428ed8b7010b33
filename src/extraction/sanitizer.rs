//! Output sanitiser: repairs near-JSON emitted by the extraction worker.
//!
//! The worker runs in another runtime and sometimes prints that runtime's
//! literals (`None`, `True`, `NaN`, single-quoted strings) or stray control
//! characters. These rules turn such output into something `serde_json` can
//! decode. They are fixed textual substitutions, not a parser.
//!
//! ## Rule order
//!
//! 1. Strip zero-width characters and byte-order marks
//! 2. Strip `\n`, `\r` and `\t` (the record is a single logical line)
//! 3. `NaN` / `Infinity` → `null`
//! 4. `undefined` → `null`
//! 5. `'` → `"`
//! 6. `None` / `True` / `False` → `null` / `true` / `false`
//! 7. Trim surrounding whitespace
//!
//! Invisible characters go first so that a token split by one (`Na\u{200b}N`)
//! is still recognised by the word rules. Every quote is rewritten, so an
//! apostrophe inside a string value becomes a stray `"` and will usually make
//! decoding fail. That matches the behaviour existing workers were written
//! against.

use once_cell::sync::Lazy;
use regex::Regex;

/// Zero-width space/non-joiner/joiner, LRM/RLM, word joiner, BOM.
const INVISIBLE_CHARS: &[char] = &[
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}', '\u{2060}', '\u{FEFF}',
];

// Word boundaries are ASCII-only: a non-ASCII letter next to a token does not
// shield it from replacement.
static NON_FINITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)(?:NaN|Infinity)(?-u:\b)").expect("valid regex"));

static UNDEFINED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)undefined(?-u:\b)").expect("valid regex"));

static PY_NONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)None(?-u:\b)").expect("valid regex"));
static PY_TRUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)True(?-u:\b)").expect("valid regex"));
static PY_FALSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\b)False(?-u:\b)").expect("valid regex"));

/// Apply all rules, in order, to raw worker output.
pub fn sanitize(raw: &str) -> String {
    let s = strip_invisible(raw);
    let s = strip_control(&s);
    let s = NON_FINITE.replace_all(&s, "null");
    let s = UNDEFINED.replace_all(&s, "null");
    let s = s.replace('\'', "\"");
    let s = replace_foreign_literals(&s);
    s.trim().to_string()
}

// ── Rule 1 ───────────────────────────────────────────────────────────────────

fn strip_invisible(s: &str) -> String {
    s.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}

// ── Rule 2 ───────────────────────────────────────────────────────────────────

fn strip_control(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '\n' | '\r' | '\t')).collect()
}

// ── Rule 6 ───────────────────────────────────────────────────────────────────

fn replace_foreign_literals(s: &str) -> String {
    let s = PY_NONE.replace_all(s, "null");
    let s = PY_TRUE.replace_all(&s, "true");
    PY_FALSE.replace_all(&s, "false").into_owned()
}
