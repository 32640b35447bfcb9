use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ext_from_mime, FileUpload, StorageProvider, StorageResult, StorageService};

lazy_static! {
    static ref SAFE_SEGMENT: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap();
}

/// A folder or file name that cannot climb out of the upload root.
pub fn is_safe_segment(segment: &str) -> bool {
    SAFE_SEGMENT.is_match(segment) && !segment.contains("..")
}

/// Files on local disk under `base_path`, served back at
/// `{base_url}/uploads/...`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub async fn init(base_path: impl Into<PathBuf>, base_url: &str) -> anyhow::Result<Self> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path)
            .await
            .with_context(|| format!("create upload dir {}", base_path.display()))?;
        info!(path = %base_path.display(), "local storage initialized");
        Ok(Self {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn public_url(&self, relative: &str) -> String {
        format!("{}/uploads/{}", self.base_url, relative)
    }

    /// Walks the upload tree for a file named `{file_id}` or `{file_id}.ext`.
    async fn find_file(&self, file_id: &str) -> anyhow::Result<Option<PathBuf>> {
        if !is_safe_segment(file_id) {
            return Ok(None);
        }
        let mut pending = vec![self.base_path.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("read dir {}", dir.display())),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let stem = name.split_once('.').map(|(s, _)| s).unwrap_or(&name[..]);
                if file_type.is_file() && stem == file_id {
                    return Ok(Some(entry.path()));
                }
            }
        }
        Ok(None)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

/// Extension of the original name, or one derived from the mime type.
fn extension(file: &FileUpload) -> String {
    let from_name = file
        .filename
        .as_deref()
        .and_then(|n| n.rsplit_once('.'))
        .filter(|(stem, _)| !stem.is_empty())
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match from_name {
        Some(ext) => format!(".{}", ext),
        None => file
            .content_type
            .as_deref()
            .and_then(ext_from_mime)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default(),
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload_file(
        &self,
        file: FileUpload,
        folder: Option<&str>,
    ) -> anyhow::Result<StorageResult> {
        anyhow::ensure!(!file.body.is_empty(), "cannot upload empty file");

        let folder = folder.filter(|f| !f.is_empty());
        let mut target = self.base_path.clone();
        if let Some(folder) = folder {
            anyhow::ensure!(is_safe_segment(folder), "invalid storage folder: {}", folder);
            target.push(folder);
            tokio::fs::create_dir_all(&target)
                .await
                .with_context(|| format!("create folder {}", target.display()))?;
        }

        let file_id = Uuid::new_v4().to_string();
        let stored_filename = format!("{}{}", file_id, extension(&file));
        let path = target.join(&stored_filename);
        tokio::fs::write(&path, &file.body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        let file_size = tokio::fs::metadata(&path).await?.len();

        let public_url = match folder {
            Some(folder) => self.public_url(&format!("{}/{}", folder, stored_filename)),
            None => self.public_url(&stored_filename),
        };
        info!(file_id = %file_id, url = %public_url, size = file_size, "file uploaded");

        Ok(StorageResult {
            file_id,
            original_filename: file.filename,
            stored_filename,
            public_url,
            file_size,
            content_type: file.content_type,
            provider: StorageProvider::Local,
        })
    }

    async fn delete_file(&self, file_id: &str) -> anyhow::Result<bool> {
        let Some(path) = self.find_file(file_id).await? else {
            warn!(file_id, "file not found for deletion");
            return Ok(false);
        };
        tokio::fs::remove_file(&path).await.map_err(|e| {
            error!(error = %e, file_id, "failed to delete file");
            anyhow::Error::from(e).context(format!("delete {}", path.display()))
        })?;
        info!(file_id, "file deleted");
        Ok(true)
    }

    async fn file_url(&self, file_id: &str) -> anyhow::Result<Option<String>> {
        let path = self.find_file(file_id).await?;
        Ok(path
            .and_then(|p| self.relative(&p))
            .map(|rel| self.public_url(&rel)))
    }

    async fn file_exists(&self, file_id: &str) -> anyhow::Result<bool> {
        Ok(self.find_file(file_id).await?.is_some())
    }

    fn provider(&self) -> StorageProvider {
        StorageProvider::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("nextra-storage-{}", Uuid::new_v4()))
    }

    fn png(name: &str) -> FileUpload {
        FileUpload {
            filename: Some(name.to_string()),
            content_type: Some("image/png".into()),
            body: Bytes::from_static(b"\x89PNG fake"),
        }
    }

    #[tokio::test]
    async fn upload_find_and_delete_in_folder() {
        let root = temp_root();
        let storage = LocalStorage::init(&root, "http://localhost:8080/").await.unwrap();

        let res = storage.upload_file(png("front.PNG"), Some("properties")).await.unwrap();
        assert_eq!(res.stored_filename, format!("{}.png", res.file_id));
        assert_eq!(
            res.public_url,
            format!("http://localhost:8080/uploads/properties/{}.png", res.file_id)
        );
        assert_eq!(res.file_size, 9);
        assert!(root.join("properties").join(&res.stored_filename).exists());

        assert!(storage.file_exists(&res.file_id).await.unwrap());
        assert_eq!(
            storage.file_url(&res.file_id).await.unwrap(),
            Some(res.public_url.clone())
        );
        assert_eq!(storage.file_id_from_url(&res.public_url), Some(res.file_id.clone()));

        assert!(storage.delete_file(&res.file_id).await.unwrap());
        assert!(!storage.file_exists(&res.file_id).await.unwrap());
        assert!(!storage.delete_file(&res.file_id).await.unwrap());

        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn extension_falls_back_to_mime_type() {
        let root = temp_root();
        let storage = LocalStorage::init(&root, "http://x").await.unwrap();
        let file = FileUpload {
            filename: None,
            content_type: Some("image/jpeg".into()),
            body: Bytes::from_static(b"jpeg"),
        };
        let res = storage.upload_file(file, None).await.unwrap();
        assert!(res.stored_filename.ends_with(".jpg"));
        assert_eq!(res.public_url, format!("http://x/uploads/{}", res.stored_filename));
        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[tokio::test]
    async fn rejects_traversal_and_empty_files() {
        let root = temp_root();
        let storage = LocalStorage::init(&root, "http://x").await.unwrap();
        assert!(storage.upload_file(png("a.png"), Some("../etc")).await.is_err());
        let empty = FileUpload {
            filename: Some("a.png".into()),
            content_type: Some("image/png".into()),
            body: Bytes::new(),
        };
        assert!(storage.upload_file(empty, None).await.is_err());
        assert!(!storage.file_exists("../secret").await.unwrap());
        tokio::fs::remove_dir_all(&root).await.ok();
    }

    #[test]
    fn safe_segments() {
        assert!(is_safe_segment("properties"));
        assert!(is_safe_segment("3f2a-11.png"));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment(".hidden"));
        assert!(!is_safe_segment("a..b"));
    }
}
