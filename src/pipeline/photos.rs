use sha2::{Digest, Sha256};

use crate::models::{PhotoLocation, PhotoReference};

/// Maps photo sources to flat archive entry names
///
/// The entry name is the SHA-256 of `bucket/path` plus the source extension,
/// so photos from any number of applicants share one archive directory
/// without collisions, and the same source always lands on the same name.
#[derive(Debug, Clone)]
pub struct PhotoLocator {
    default_bucket: String,
}

impl PhotoLocator {
    pub fn new(default_bucket: impl Into<String>) -> Self {
        Self {
            default_bucket: default_bucket.into(),
        }
    }

    pub fn locate(&self, source_bucket: &str, source_path: &str) -> PhotoLocation {
        let digest = Sha256::digest(format!("{source_bucket}/{source_path}").as_bytes());
        let destination = match extension(source_path) {
            Some(ext) => format!("{digest:x}.{ext}"),
            None => format!("{digest:x}"),
        };

        PhotoLocation {
            destination,
            source_bucket: source_bucket.to_string(),
            source_path: source_path.to_string(),
        }
    }

    /// Resolve a request's photo, falling back to the default bucket
    pub fn locate_reference(&self, photo: &PhotoReference) -> PhotoLocation {
        let bucket = photo.bucket.as_deref().unwrap_or(&self.default_bucket);
        self.locate(bucket, &photo.path)
    }
}

fn extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Retrieval links for the photo read path
#[derive(Debug, Clone)]
pub struct PhotoLinks {
    base_url: String,
}

impl PhotoLinks {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, location: &PhotoLocation) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            location.source_bucket,
            location.source_path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_is_stable_and_flat() {
        let locator = PhotoLocator::new("photos");
        let a = locator.locate("photos", "E09000007/app-1/photo.JPG");
        let b = locator.locate("photos", "E09000007/app-1/photo.JPG");

        assert_eq!(a, b);
        assert!(!a.destination.contains('/'));
        assert!(a.destination.ends_with(".jpg"));
        assert_eq!(a.destination.len(), 64 + 4);
        assert_eq!(a.source_path, "E09000007/app-1/photo.JPG");
    }

    #[test]
    fn test_same_path_in_other_bucket_does_not_collide() {
        let locator = PhotoLocator::new("photos");
        let a = locator.locate("photos", "app-1/photo.png");
        let b = locator.locate("archive", "app-1/photo.png");
        assert_ne!(a.destination, b.destination);
    }

    #[test]
    fn test_reference_without_bucket_uses_default() {
        let locator = PhotoLocator::new("elector-photos");
        let location = locator.locate_reference(&PhotoReference {
            bucket: None,
            path: "a/b.png".to_string(),
        });
        assert_eq!(location.source_bucket, "elector-photos");
    }

    #[test]
    fn test_odd_extensions_are_dropped() {
        assert_eq!(extension("a/photo"), None);
        assert_eq!(extension("a/.hidden"), None);
        assert_eq!(extension("a/photo.tar-gz"), None);
        assert_eq!(extension("a.dir/photo"), None);
        assert_eq!(extension("photo.jpeg"), Some("jpeg".to_string()));
    }

    #[test]
    fn test_photo_links() {
        let links = PhotoLinks::new("https://photos.example.org/");
        let location = PhotoLocator::new("b").locate("b", "x/y.png");
        assert_eq!(links.url_for(&location), "https://photos.example.org/b/x/y.png");
    }
}
