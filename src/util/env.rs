//! Terminal detection.

use atty::Stream;

#[must_use]
pub fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

#[must_use]
pub fn stdin_is_tty() -> bool {
    atty::is(Stream::Stdin)
}

/// Whether ANSI styling may be written to `stream`.
///
/// `NO_COLOR` (any value) and `TERM=dumb` turn styling off everywhere.
#[must_use]
pub fn color_enabled(stream: Stream) -> bool {
    color_allowed_by_env(std::env::var_os("NO_COLOR").is_some(), std::env::var("TERM").ok().as_deref())
        && atty::is(stream)
}

fn color_allowed_by_env(no_color_set: bool, term: Option<&str>) -> bool {
    if no_color_set {
        return false;
    }
    !matches!(term, Some(t) if t.eq_ignore_ascii_case("dumb"))
}
