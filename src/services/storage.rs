use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use tokio::fs;
use tracing::debug;

use crate::error::AppError;

const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];
const PUBLIC_PREFIX: &str = "/static/uploads";

/// Trip images on local disk, served under `/static/uploads`.
#[derive(Clone)]
pub struct StorageService {
    root: Arc<PathBuf>,
}

impl StorageService {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    /// Stores an uploaded trip image and returns its public URL. Files with an
    /// unsupported extension are skipped and yield `None`.
    pub async fn save_trip_image(
        &self,
        user_id: i64,
        original_name: &str,
        data: &[u8],
    ) -> Result<Option<String>, AppError> {
        if data.is_empty() || !is_allowed_image(original_name) {
            return Ok(None);
        }
        let filename = format!(
            "{user_id}_{}_{}",
            Utc::now().timestamp_millis(),
            sanitize_filename(original_name)
        );
        self.ensure_structure().await?;
        fs::write(self.root().join(&filename), data).await?;
        debug!(user_id, %filename, "trip image stored");
        Ok(Some(format!("{PUBLIC_PREFIX}/{filename}")))
    }

    /// Removes an image stored by `save_trip_image`. URLs outside the upload
    /// prefix and files that are already gone are ignored.
    pub async fn discard(&self, public_url: &str) -> Result<(), AppError> {
        let Some(filename) = public_url
            .strip_prefix(PUBLIC_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|name| !name.is_empty() && !name.contains(['/', '\\']))
        else {
            return Ok(());
        };
        match fs::remove_file(self.root().join(filename)).await {
            Ok(()) => {
                debug!(%filename, "trip image discarded");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn is_allowed_image(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Keeps ASCII letters, digits, dots, dashes and underscores; everything else,
/// path separators included, becomes an underscore.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_are_accepted() {
        assert!(is_allowed_image("alps.JPG"));
        assert!(is_allowed_image("map.gif"));
        assert!(!is_allowed_image("notes.txt"));
        assert!(!is_allowed_image("png"));
    }

    #[test]
    fn filenames_lose_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/pass wd.png"), "pass_wd.png");
        assert_eq!(sanitize_filename("C:\\temp\\Ride #1.jpeg"), "Ride__1.jpeg");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
    }

    #[tokio::test]
    async fn stored_images_get_a_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path().join("uploads"));
        let url = storage
            .save_trip_image(3, "route.png", b"\x89PNG")
            .await
            .unwrap()
            .unwrap();
        assert!(url.starts_with("/static/uploads/3_"));
        assert!(url.ends_with("_route.png"));
        let skipped = storage.save_trip_image(3, "route.exe", b"MZ").await.unwrap();
        assert!(skipped.is_none());
    }

    #[tokio::test]
    async fn discarded_images_leave_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path().join("uploads"));
        let url = storage
            .save_trip_image(5, "summit.jpg", b"\xff\xd8")
            .await
            .unwrap()
            .unwrap();
        let filename = url.rsplit('/').next().unwrap().to_string();
        assert!(storage.root().join(&filename).exists());

        storage.discard(&url).await.unwrap();
        assert!(!storage.root().join(&filename).exists());
        storage.discard(&url).await.unwrap();
        storage.discard("/static/uploads/../bdd.sqlite").await.unwrap();
        storage.discard("https://example.com/a.png").await.unwrap();
    }
}
