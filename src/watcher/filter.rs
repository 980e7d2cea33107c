//! Media file filtering and content-type detection.

use std::collections::HashSet;
use std::path::Path;

use crate::error::IndexError;
use crate::storage::FileType;

/// Decides which files are indexed and what kind of media they are.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    allowed_extensions: HashSet<String>,
}

impl MediaFilter {
    /// Create a filter for the given extensions (without dot, any case).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Whether the extension of `path` is on the allow list.
    #[must_use]
    pub fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.allowed_extensions.contains(&ext.to_lowercase()))
    }

    /// Content type of `path` and the media kind derived from it.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::ContentType` if no content type is known for the file.
    pub fn content_type(path: &Path) -> std::result::Result<(String, FileType), IndexError> {
        let mime = mime_guess::from_path(path)
            .first()
            .ok_or_else(|| IndexError::ContentType {
                path: path.display().to_string(),
            })?;

        let content_type = mime.essence_str().to_string();
        let file_type = FileType::from_content_type(&content_type);
        Ok((content_type, file_type))
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed_case_insensitive() {
        let filter = MediaFilter::new(["jpg", ".MP4"]);
        assert!(filter.is_allowed(Path::new("/data/a.jpg")));
        assert!(filter.is_allowed(Path::new("/data/A.JPG")));
        assert!(filter.is_allowed(Path::new("/data/clip.mp4")));
        assert!(!filter.is_allowed(Path::new("/data/notes.txt")));
        assert!(!filter.is_allowed(Path::new("/data/no_extension")));
    }

    #[test]
    fn test_default_filter() {
        let filter = MediaFilter::default();
        assert!(filter.is_allowed(Path::new("/data/a.heic")));
        assert!(!filter.is_allowed(Path::new("/data/a.pdf")));
    }

    #[test]
    fn test_content_type() {
        let (ct, ft) = MediaFilter::content_type(Path::new("/data/a.jpg")).unwrap();
        assert_eq!(ct, "image/jpeg");
        assert_eq!(ft, FileType::Image);

        let (ct, ft) = MediaFilter::content_type(Path::new("/data/clip.mp4")).unwrap();
        assert_eq!(ct, "video/mp4");
        assert_eq!(ft, FileType::Video);
    }

    #[test]
    fn test_unknown_content_type() {
        let err = MediaFilter::content_type(Path::new("/data/blob.zzzunknown")).unwrap_err();
        assert!(matches!(err, IndexError::ContentType { .. }));
    }
}
