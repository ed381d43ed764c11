//! Diagnostic artifacts (screenshots) written to a configured directory.
//!
//! Files are named `<scenario>-<step index>-<label>.png`, each part slugified,
//! e.g. `search-spider-04-failure.png`.

use crate::page::PageHandle;
use crate::result::HarnessResult;
use std::path::{Path, PathBuf};

/// Writes screenshots for one run
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact would be written to
    #[must_use]
    pub fn path_for(&self, scenario: &str, index: usize, label: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{index:02}-{}.png", slugify(scenario), slugify(label)))
    }

    /// Write PNG bytes
    pub async fn save(
        &self,
        scenario: &str,
        index: usize,
        label: &str,
        png: &[u8],
    ) -> HarnessResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(scenario, index, label);
        tokio::fs::write(&path, png).await?;
        tracing::debug!(path = %path.display(), bytes = png.len(), "artifact written");
        Ok(path)
    }

    /// Screenshot the page and write it
    pub async fn capture(
        &self,
        page: &PageHandle,
        scenario: &str,
        index: usize,
        label: &str,
    ) -> HarnessResult<PathBuf> {
        let png = page.driver().screenshot().await?;
        self.save(scenario, index, label, &png).await
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed to single `-`
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("artifact");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Search: Spider"), "search-spider");
        assert_eq!(slugify("  trailer modal / open  "), "trailer-modal-open");
        assert_eq!(slugify("Ver tráiler"), "ver-tráiler");
        assert_eq!(slugify("***"), "artifact");
    }

    #[test]
    fn test_path_for() {
        let store = ArtifactStore::new("/tmp/shots");
        assert_eq!(
            store.path_for("Homepage loads", 3, "failure"),
            PathBuf::from("/tmp/shots/homepage-loads-03-failure.png")
        );
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp.path().join("nested/screenshots"));
        let path = store.save("logo", 0, "loaded", b"png").await.unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(path).unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_capture_writes_screenshot() {
        let temp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(temp.path());
        let page = PageHandle::new(MockDriver::new());
        let path = store.capture(&page, "mobile", 1, "homepage").await.unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        assert!(path.ends_with("mobile-01-homepage.png"));
    }
}
