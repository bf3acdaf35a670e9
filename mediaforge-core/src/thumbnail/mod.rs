//! Thumbnail resolution: cache-or-generate against a durable store.

pub mod sizing;

mod coalesced;
pub use coalesced::{CoalescedThumbnails, ThumbnailOutcome};

use std::{any::type_name_of_val, fmt, sync::Arc};

use chrono::Utc;
use mediaforge_config::ThumbnailsConfig;
use mediaforge_model::{MediaDescriptor, ResizeMethod, ThumbnailRecord};
use tracing::{debug, info, warn};

use crate::{
    error::{ResolveError, Result},
    generate::GenerateThumbnail,
    store::ThumbnailStore,
};

/// Content types we can actually thumbnail, regardless of configuration.
const SUPPORTED_THUMBNAIL_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// Resolves thumbnails for media items: validates the request, picks the
/// canonical target size, and either returns the persisted record or
/// generates and persists a new one.
///
/// One call is one store lookup plus at most one generation; the service
/// does not itself coalesce concurrent duplicate requests. Callers that can
/// race on the same artifact should go through [`CoalescedThumbnails`].
pub struct ThumbnailService {
    store: Arc<dyn ThumbnailStore>,
    generator: Arc<dyn GenerateThumbnail>,
    config: ThumbnailsConfig,
}

impl fmt::Debug for ThumbnailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailService")
            .field("store", &type_name_of_val(self.store.as_ref()))
            .field("generator", &type_name_of_val(self.generator.as_ref()))
            .field("sizes", &self.config.sizes.len())
            .finish()
    }
}

impl ThumbnailService {
    pub fn new(
        store: Arc<dyn ThumbnailStore>,
        generator: Arc<dyn GenerateThumbnail>,
        config: ThumbnailsConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &ThumbnailsConfig {
        &self.config
    }

    /// Fetch or produce the thumbnail for `media` at the canonical size
    /// closest to the requested dimensions.
    ///
    /// Returns `Ok(None)` when generation fails: an undecodable source is
    /// not a read-path failure. Everything else surfaces as a typed
    /// [`ResolveError`].
    pub async fn get_thumbnail(
        &self,
        media: &MediaDescriptor,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> Result<Option<ThumbnailRecord>> {
        if width == 0 {
            return Err(ResolveError::InvalidArgument(
                "width must be positive",
            ));
        }
        if height == 0 {
            return Err(ResolveError::InvalidArgument(
                "height must be positive",
            ));
        }

        let (target_width, target_height) =
            sizing::select_target_size(&self.config.sizes, width, height);

        info!(
            origin = %media.origin,
            media_id = %media.media_id,
            target_width,
            target_height,
            method = %method,
            "looking up thumbnail"
        );

        let existing = self
            .store
            .get(
                &media.origin,
                &media.media_id,
                target_width,
                target_height,
                method,
            )
            .await
            .map_err(|err| {
                warn!(
                    origin = %media.origin,
                    media_id = %media.media_id,
                    error = %err,
                    "thumbnail lookup failed"
                );
                ResolveError::from(err)
            })?;
        if let Some(thumb) = existing {
            debug!(
                origin = %media.origin,
                media_id = %media.media_id,
                "found existing thumbnail"
            );
            return Ok(Some(thumb));
        }

        self.check_eligibility(media)?;

        info!(
            origin = %media.origin,
            media_id = %media.media_id,
            "generating new thumbnail"
        );
        let generated = match self
            .generator
            .generate(media, target_width, target_height, method)
            .await
        {
            Ok(generated) => generated,
            Err(err) => {
                // Best effort: callers get "no thumbnail", not a failure.
                warn!(
                    origin = %media.origin,
                    media_id = %media.media_id,
                    error = %err,
                    "thumbnail generation failed"
                );
                return Ok(None);
            }
        };

        let record = ThumbnailRecord {
            origin: media.origin.clone(),
            media_id: media.media_id.clone(),
            width: target_width,
            height: target_height,
            method,
            created_at: Utc::now(),
            content_type: generated.content_type,
            location: generated.location,
            size_bytes: generated.size_bytes,
        };

        if let Err(err) = self.store.insert(&record).await {
            // The artifact exists on disk even though the index write
            // failed; hand the record back alongside the error.
            warn!(
                origin = %media.origin,
                media_id = %media.media_id,
                error = %err,
                "failed to persist generated thumbnail"
            );
            return Err(ResolveError::StoreInsert {
                record: Box::new(record),
                message: err.to_string(),
            });
        }

        Ok(Some(record))
    }

    fn check_eligibility(&self, media: &MediaDescriptor) -> Result<()> {
        if !SUPPORTED_THUMBNAIL_TYPES
            .contains(&media.content_type.as_str())
        {
            warn!(
                content_type = %media.content_type,
                "cannot thumbnail this content type"
            );
            return Err(ResolveError::UnsupportedContentType {
                content_type: media.content_type.clone(),
            });
        }

        if !self
            .config
            .types
            .iter()
            .any(|allowed| allowed == &media.content_type)
        {
            warn!(
                content_type = %media.content_type,
                "content type is not in the configured allow-list"
            );
            return Err(ResolveError::UnsupportedContentType {
                content_type: media.content_type.clone(),
            });
        }

        if media.size_bytes > self.config.max_source_bytes {
            warn!(
                size_bytes = media.size_bytes,
                max_bytes = self.config.max_source_bytes,
                "media too large to thumbnail"
            );
            return Err(ResolveError::MediaTooLarge {
                size_bytes: media.size_bytes,
                max_bytes: self.config.max_source_bytes,
            });
        }

        Ok(())
    }
}
