//! Photo loading for `post --photo`.

use std::io::{self, Read};
use std::path::Path;

use cap_std::{ambient_authority, fs::Dir};

use crate::domain::PhotoAttachment;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Guess an image media type from the file extension.
pub(super) fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => FALLBACK_MEDIA_TYPE,
    }
}

/// Read a photo through `cap_std`.
pub(super) fn load_photo(path: &Path) -> io::Result<PhotoAttachment> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "photo path must be a file"))?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|error| {
        io::Error::other(format!(
            "open photo directory '{}': {error}",
            parent.display()
        ))
    })?;
    let mut file = directory.open(Path::new(file_name)).map_err(|error| {
        io::Error::other(format!("open photo '{}': {error}", path.display()))
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|error| io::Error::other(format!("read photo '{}': {error}", path.display())))?;
    Ok(PhotoAttachment {
        bytes,
        media_type: media_type_for(path).to_owned(),
        file_name: file_name.to_string_lossy().into_owned(),
    })
}
