use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Error type for image payload handling
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("not an image file: {path} ({mime})")]
    NotAnImage { path: PathBuf, mime: String },
}

/// Encode raw bytes as an embeddable `data:` URI.
pub fn encode_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Read an image file and return its `data:` URI payload. The mime type
/// is guessed from the extension.
pub fn read_image_file(path: &Path) -> Result<String, ImageError> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_().as_str() != "image" {
        return Err(ImageError::NotAnImage {
            path: path.to_path_buf(),
            mime: mime.to_string(),
        });
    }
    let bytes = fs::read(path).map_err(|e| ImageError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(encode_data_uri(&bytes, mime.as_ref()))
}

/// Mime type named in a `data:` URI, if it is one
pub fn payload_mime(payload: &str) -> Option<&str> {
    let rest = payload.strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn encodes_bytes_with_mime() {
        assert_eq!(encode_data_uri(b"hi", "image/png"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn reads_png_by_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.png");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let payload = read_image_file(&path).unwrap();
        assert!(payload.starts_with("data:image/png;base64,"));
        assert_eq!(payload_mime(&payload), Some("image/png"));
    }

    #[test]
    fn rejects_non_image_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        fs::write(&path, "text").unwrap();
        assert!(matches!(
            read_image_file(&path),
            Err(ImageError::NotAnImage { .. })
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read_image_file(&tmp.path().join("gone.jpg")),
            Err(ImageError::ReadError { .. })
        ));
    }

    #[test]
    fn payload_mime_ignores_plain_strings() {
        assert_eq!(payload_mime("https://example.com/a.png"), None);
    }
}
