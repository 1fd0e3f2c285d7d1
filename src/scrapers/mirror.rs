//! Copying card images into owned storage.

use async_trait::async_trait;

use crate::images::{ImageError, ImageProcessor};
use crate::storage::{ObjectMirror, StorageError};

/// Errors from mirroring one image.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Anything that can copy a remote image and return its new public URL.
#[async_trait]
pub trait CardImageMirror: Send + Sync {
    async fn mirror_image(&self, image_url: &str) -> Result<String, MirrorError>;
}

/// Fetch, normalize, and upload: the production mirror.
#[derive(Clone)]
pub struct ImageMirrorPipeline {
    processor: ImageProcessor,
    objects: ObjectMirror,
}

impl ImageMirrorPipeline {
    pub fn new(processor: ImageProcessor, objects: ObjectMirror) -> Self {
        Self { processor, objects }
    }
}

#[async_trait]
impl CardImageMirror for ImageMirrorPipeline {
    async fn mirror_image(&self, image_url: &str) -> Result<String, MirrorError> {
        let processed = self.processor.fetch_and_process(image_url).await?;
        let uploaded = self
            .objects
            .mirror(
                image_url,
                &processed.bytes,
                processed.format.extension(),
                processed.format.content_type(),
            )
            .await?;
        Ok(uploaded.url)
    }
}
