//! Image attachments as `data:` URLs.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::error::{LmcError, Result};

/// Largest accepted image file.
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// MIME type for an accepted image extension.
fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn invalid(path: &Path, reason: impl Into<String>) -> LmcError {
    LmcError::InvalidImage {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Read an image file and encode it as `data:<mime>;base64,<payload>`.
///
/// # Errors
///
/// `InvalidImage` for an unsupported type, an empty file or one over
/// [`MAX_IMAGE_BYTES`]; I/O errors otherwise.
pub fn encode_image(path: &Path) -> Result<String> {
    let mime = mime_for(path)
        .ok_or_else(|| invalid(path, "unsupported type (expected png, jpeg, webp or gif)"))?;

    let size = std::fs::metadata(path)?.len();
    if size == 0 {
        return Err(invalid(path, "file is empty"));
    }
    if size > MAX_IMAGE_BYTES {
        return Err(invalid(
            path,
            format!("{size} bytes exceeds the 20 MB limit"),
        ));
    }

    let bytes = std::fs::read(path)?;
    tracing::debug!(path = %path.display(), mime, size, "Encoded image attachment");
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}

/// Encode every path, stopping at the first failure.
///
/// # Errors
///
/// The first error from [`encode_image`].
pub fn encode_images<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<String>> {
    paths.iter().map(|p| encode_image(p.as_ref())).collect()
}
