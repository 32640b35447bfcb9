use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use super::model::{Property, MAX_IMAGES};
use crate::common::auditor::Auditor;
use crate::common::service::{EntityService, Readable};
use crate::error::AppError;
use crate::storage::{FileUpload, StorageService};

pub const IMAGES_FOLDER: &str = "properties";
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Keeps a property's image list and main image in step with the files
/// in storage.
#[derive(Clone)]
pub struct PropertyImageService {
    properties: EntityService<Property>,
    storage: Arc<dyn StorageService>,
}

fn validate_image(file: &FileUpload) -> Result<(), AppError> {
    if file.body.is_empty() {
        return Err(AppError::invalid("files", "Cannot upload empty file"));
    }
    let is_image = file
        .content_type
        .as_deref()
        .map(|ct| ct.starts_with("image/"))
        .unwrap_or(false);
    if !is_image {
        return Err(AppError::invalid(
            "files",
            "File must be an image (jpeg, png, gif, etc.)",
        ));
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Err(AppError::invalid(
            "files",
            "Image file size must not exceed 10MB",
        ));
    }
    Ok(())
}

fn too_many(adding: usize, current: usize) -> AppError {
    AppError::BadRequest(format!(
        "Cannot upload {} images. Maximum {} images per property allowed (current: {})",
        adding, MAX_IMAGES, current
    ))
}

impl PropertyImageService {
    pub fn new(properties: EntityService<Property>, storage: Arc<dyn StorageService>) -> Self {
        Self {
            properties,
            storage,
        }
    }

    /// Stores the whole batch and appends the URLs, or changes nothing.
    ///
    /// The cap and every file are checked before the first storage write.
    /// The cap is checked again under the row lock; if a concurrent upload
    /// won the race the files just written are removed again.
    #[instrument(skip(self, files, by), fields(files = files.len(), by = %by))]
    pub async fn upload_images(
        &self,
        id: i64,
        files: Vec<FileUpload>,
        set_as_main: bool,
        by: &Auditor,
    ) -> Result<Vec<String>, AppError> {
        let property = self.properties.get(id).await?;
        if files.is_empty() {
            return Err(AppError::invalid("files", "At least one file is required"));
        }
        let current = property.data.images.len();
        if current + files.len() > MAX_IMAGES {
            return Err(too_many(files.len(), current));
        }
        for file in &files {
            validate_image(file)?;
        }

        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            match self.storage.upload_file(file, Some(IMAGES_FOLDER)).await {
                Ok(stored) => urls.push(stored.public_url),
                Err(e) => {
                    self.discard(&urls).await;
                    return Err(AppError::Storage(e));
                }
            }
        }

        let added = urls.clone();
        let result = self
            .properties
            .modify(
                id,
                by,
                Box::new(move |p: &mut Property| {
                    if p.images.len() + added.len() > MAX_IMAGES {
                        return Err(too_many(added.len(), p.images.len()));
                    }
                    if set_as_main && p.main_image.is_none() {
                        p.main_image = added.first().cloned();
                    }
                    p.images.extend(added);
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(_) => {
                info!(count = urls.len(), "images added to property");
                Ok(urls)
            }
            Err(e) => {
                warn!(error = %e, "image batch rejected after upload, removing files");
                self.discard(&urls).await;
                Err(e)
            }
        }
    }

    #[instrument(skip(self, by), fields(by = %by))]
    pub async fn set_main_image(&self, id: i64, image_url: &str, by: &Auditor) -> Result<(), AppError> {
        let url = image_url.to_string();
        self.properties
            .modify(
                id,
                by,
                Box::new(move |p: &mut Property| {
                    if !p.images.contains(&url) {
                        return Err(AppError::BadRequest(
                            "Image URL not found in property images".into(),
                        ));
                    }
                    p.main_image = Some(url);
                    Ok(())
                }),
            )
            .await?;
        info!("main image set");
        Ok(())
    }

    /// Removing an unknown URL is a no-op. Only files that were listed on
    /// the property are deleted from storage.
    #[instrument(skip(self, by), fields(by = %by))]
    pub async fn delete_image(&self, id: i64, image_url: &str, by: &Auditor) -> Result<(), AppError> {
        let url = image_url.to_string();
        let modified = self
            .properties
            .modify_tracked(
                id,
                by,
                Box::new(move |p: &mut Property| {
                    p.images.retain(|i| *i != url);
                    if p.main_image.as_deref() == Some(url.as_str()) {
                        p.main_image = p.images.first().cloned();
                    }
                    Ok(())
                }),
            )
            .await?;

        if modified.before.images.len() != modified.record.data.images.len() {
            self.discard(&[image_url.to_string()]).await;
            info!("image removed from property");
        }
        Ok(())
    }

    /// Clears the list first, then deletes every file, carrying on past
    /// individual storage failures.
    #[instrument(skip(self, by), fields(by = %by))]
    pub async fn delete_all_images(&self, id: i64, by: &Auditor) -> Result<(), AppError> {
        let modified = self
            .properties
            .modify_tracked(
                id,
                by,
                Box::new(|p: &mut Property| {
                    p.main_image = None;
                    p.images.clear();
                    Ok(())
                }),
            )
            .await?;

        let removed = modified.before.images;
        self.discard(&removed).await;
        info!(count = removed.len(), "all images removed from property");
        Ok(())
    }

    /// Best effort: failures are logged and skipped.
    async fn discard(&self, urls: &[String]) {
        for url in urls {
            let Some(file_id) = self.storage.file_id_from_url(url) else {
                warn!(%url, "cannot derive file id from url");
                continue;
            };
            if let Err(e) = self.storage.delete_file(&file_id).await {
                error!(error = %e, %file_id, "failed to delete stored image");
            }
        }
    }
}
