//! File-extension to content-type mapping for attachment uploads.

/// Guesses a content type from the extension of `name`.
///
/// CouchDB stores whatever type the upload declares, so a coarse table
/// covering the common cases is enough. Unknown and missing extensions
/// fall back to `application/octet-stream`.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "c" | "h" | "cpp" | "cxx" | "py" | "md" | "text" | "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_extensions() {
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("scan.tiff"), "image/tiff");
        assert_eq!(content_type_for("notes.txt"), "text/plain");
        assert_eq!(content_type_for("paper.pdf"), "application/pdf");
    }

    #[test]
    fn unknown_or_missing_extension_is_octet_stream() {
        assert_eq!(content_type_for("archive.tar.zst"), "application/octet-stream");
        assert_eq!(content_type_for("README"), "application/octet-stream");
        assert_eq!(content_type_for("dotfile."), "application/octet-stream");
    }
}
