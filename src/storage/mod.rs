use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

pub mod handlers;
pub mod local;

pub use local::LocalStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageProvider {
    Local,
    S3,
    Azure,
    Minio,
}

impl std::str::FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(StorageProvider::Local),
            "s3" => Ok(StorageProvider::S3),
            "azure" => Ok(StorageProvider::Azure),
            "minio" => Ok(StorageProvider::Minio),
            other => anyhow::bail!("unknown storage provider: {}", other),
        }
    }
}

/// One file received from a client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FileUpload {
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Metadata of a stored file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageResult {
    pub file_id: String,
    pub original_filename: Option<String>,
    pub stored_filename: String,
    pub public_url: String,
    pub file_size: u64,
    pub content_type: Option<String>,
    pub provider: StorageProvider,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Stores `file` under `folder` (if any) with a fresh id.
    async fn upload_file(
        &self,
        file: FileUpload,
        folder: Option<&str>,
    ) -> anyhow::Result<StorageResult>;

    /// `false` when there was nothing to delete.
    async fn delete_file(&self, file_id: &str) -> anyhow::Result<bool>;

    async fn file_url(&self, file_id: &str) -> anyhow::Result<Option<String>>;

    async fn file_exists(&self, file_id: &str) -> anyhow::Result<bool>;

    fn provider(&self) -> StorageProvider;

    /// Last path segment of a public URL, without its extension.
    fn file_id_from_url(&self, url: &str) -> Option<String> {
        let name = url.rsplit('/').next()?;
        let id = match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        };
        (!id.is_empty()).then(|| id.to_string())
    }
}

/// Maps an image mime type to a file extension.
pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
pub use memory::MemoryStorage;

#[cfg(test)]
mod memory {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use super::*;

    /// Keeps files in a map and counts calls; ids listed in `fail_deletes`
    /// error on delete.
    #[derive(Default)]
    pub struct MemoryStorage {
        files: Mutex<BTreeMap<String, FileUpload>>,
        fail_deletes: Mutex<BTreeSet<String>>,
        uploads: Mutex<usize>,
        deletes: Mutex<Vec<String>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn upload_count(&self) -> usize {
            *self.uploads.lock().unwrap()
        }

        pub fn stored(&self) -> usize {
            self.files.lock().unwrap().len()
        }

        pub fn deleted_ids(&self) -> Vec<String> {
            self.deletes.lock().unwrap().clone()
        }

        pub fn fail_delete_of(&self, file_id: &str) {
            self.fail_deletes.lock().unwrap().insert(file_id.to_string());
        }
    }

    #[async_trait]
    impl StorageService for MemoryStorage {
        async fn upload_file(
            &self,
            file: FileUpload,
            folder: Option<&str>,
        ) -> anyhow::Result<StorageResult> {
            let id = uuid::Uuid::new_v4().to_string();
            let stored = format!("{}.jpg", id);
            let url = match folder {
                Some(f) => format!("http://test.local/uploads/{}/{}", f, stored),
                None => format!("http://test.local/uploads/{}", stored),
            };
            let result = StorageResult {
                file_id: id.clone(),
                original_filename: file.filename.clone(),
                stored_filename: stored,
                public_url: url,
                file_size: file.size() as u64,
                content_type: file.content_type.clone(),
                provider: StorageProvider::Local,
            };
            *self.uploads.lock().unwrap() += 1;
            self.files.lock().unwrap().insert(id, file);
            Ok(result)
        }

        async fn delete_file(&self, file_id: &str) -> anyhow::Result<bool> {
            self.deletes.lock().unwrap().push(file_id.to_string());
            if self.fail_deletes.lock().unwrap().contains(file_id) {
                anyhow::bail!("disk on fire");
            }
            Ok(self.files.lock().unwrap().remove(file_id).is_some())
        }

        async fn file_url(&self, file_id: &str) -> anyhow::Result<Option<String>> {
            let exists = self.files.lock().unwrap().contains_key(file_id);
            Ok(exists.then(|| format!("http://test.local/uploads/{}.jpg", file_id)))
        }

        async fn file_exists(&self, file_id: &str) -> anyhow::Result<bool> {
            Ok(self.files.lock().unwrap().contains_key(file_id))
        }

        fn provider(&self) -> StorageProvider {
            StorageProvider::Local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_is_last_segment_without_extension() {
        let storage = MemoryStorage::new();
        assert_eq!(
            storage.file_id_from_url("http://localhost:8080/uploads/properties/abc-123.png"),
            Some("abc-123".to_string())
        );
        assert_eq!(
            storage.file_id_from_url("http://localhost:8080/uploads/plain"),
            Some("plain".to_string())
        );
        assert_eq!(storage.file_id_from_url("http://localhost:8080/uploads/"), None);
    }

    #[test]
    fn ext_from_mime_known_types() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("LOCAL".parse::<StorageProvider>().unwrap(), StorageProvider::Local);
        assert_eq!("minio".parse::<StorageProvider>().unwrap(), StorageProvider::Minio);
        assert!("ftp".parse::<StorageProvider>().is_err());
    }
}
