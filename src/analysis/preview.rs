//! Header-only image preview.
//!
//! Reads just enough of an image to report its format and dimensions; the
//! pixels are never decoded.

use std::io::Cursor;

use image::ImageReader;

/// Format and size of a selected image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Inspect image bytes. Returns `None` when the format is not recognised
/// or the header is unreadable.
pub fn preview(contents: &[u8]) -> Option<Preview> {
    let reader = ImageReader::new(Cursor::new(contents))
        .with_guessed_format()
        .ok()?;
    let format = reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;

    Some(Preview {
        mime_type: format.to_mime_type(),
        width,
        height,
    })
}
