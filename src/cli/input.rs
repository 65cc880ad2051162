//! Reading command input from files and stdin.

use std::io::Read;
use std::path::Path;

use crate::error::{LmcError, Result};
use crate::util::env::stdin_is_tty;

/// Read all of stdin, or `None` when stdin is a terminal.
///
/// # Errors
///
/// Read failure.
pub fn read_piped_stdin() -> Result<Option<String>> {
    if stdin_is_tty() {
        return Ok(None);
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

/// Text from an inline value, else a file, else piped stdin.
///
/// # Errors
///
/// `InvalidInput` when every source is absent or blank; I/O errors from the
/// file or stdin.
pub fn text_from(inline: Option<&str>, file: Option<&Path>, what: &str) -> Result<String> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => read_piped_stdin()?.unwrap_or_default(),
    };
    non_blank(text, what)
}

/// Reject blank text.
///
/// # Errors
///
/// `InvalidInput` naming `what`.
pub fn non_blank(text: String, what: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(LmcError::InvalidInput(format!("{what} is empty")));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;

    #[test]
    fn inline_wins_over_file() {
        let dir = TestDir::new();
        dir.create_file("p.txt", "from file");
        let path = dir.file_path("p.txt");
        assert_eq!(text_from(Some("inline"), Some(&path), "prompt").unwrap(), "inline");
        assert_eq!(text_from(None, Some(&path), "prompt").unwrap(), "from file");
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = text_from(Some("  \n"), None, "prompt").unwrap_err();
        assert!(matches!(err, LmcError::InvalidInput(msg) if msg == "prompt is empty"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TestDir::new();
        let err = text_from(None, Some(&dir.file_path("nope.txt")), "prompt").unwrap_err();
        assert!(matches!(err, LmcError::Io(_)));
    }
}
