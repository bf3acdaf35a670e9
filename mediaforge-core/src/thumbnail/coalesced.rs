//! Thumbnail resolution routed through the coalescing engine.
//!
//! [`super::ThumbnailService`] alone permits concurrent duplicate generation
//! of the same target size. This wrapper keys every request by its canonical
//! target dimensions and resolves it through a [`ResourceBroker`], so
//! differently-phrased requests for the same artifact share one lookup and
//! at most one generation.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mediaforge_model::{MediaDescriptor, ResizeMethod, ThumbnailRecord};
use tracing::debug;

use super::{ThumbnailService, sizing};
use crate::{
    error::{ResolveError, Result},
    resource::{
        BrokerError, BrokerOptions, FetchResource, ResourceBroker,
        WorkRequest,
    },
};

/// Outcome shared by every coalesced caller of one request.
pub type ThumbnailOutcome = Result<Option<ThumbnailRecord>>;

#[derive(Debug, Clone)]
struct ThumbnailJob {
    media: MediaDescriptor,
    width: u32,
    height: u32,
    method: ResizeMethod,
}

struct ThumbnailFetcher {
    service: Arc<ThumbnailService>,
}

#[async_trait]
impl FetchResource for ThumbnailFetcher {
    type Metadata = ThumbnailJob;
    type Output = ThumbnailOutcome;

    async fn fetch(
        &self,
        request: WorkRequest<ThumbnailJob>,
    ) -> ThumbnailOutcome {
        let ThumbnailJob {
            media,
            width,
            height,
            method,
        } = request.metadata;
        self.service
            .get_thumbnail(&media, width, height, method)
            .await
    }
}

/// Deduplicating front door for thumbnail resolution.
pub struct CoalescedThumbnails {
    service: Arc<ThumbnailService>,
    broker: ResourceBroker<ThumbnailFetcher>,
}

impl fmt::Debug for CoalescedThumbnails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoalescedThumbnails")
            .field("service", &self.service)
            .field("broker", &self.broker)
            .finish()
    }
}

impl CoalescedThumbnails {
    /// Wrap `service` behind a broker with `workers` generation slots.
    pub fn new(
        service: Arc<ThumbnailService>,
        workers: usize,
    ) -> std::result::Result<Self, BrokerError> {
        Self::with_options(service, workers, BrokerOptions::default())
    }

    pub fn with_options(
        service: Arc<ThumbnailService>,
        workers: usize,
        options: BrokerOptions,
    ) -> std::result::Result<Self, BrokerError> {
        let fetcher = ThumbnailFetcher {
            service: Arc::clone(&service),
        };
        let broker =
            ResourceBroker::with_options(workers, fetcher, options)?;
        Ok(Self { service, broker })
    }

    /// As [`ThumbnailService::get_thumbnail`], but concurrent callers whose
    /// requests map to the same canonical artifact share one computation.
    pub async fn get_thumbnail(
        &self,
        media: &MediaDescriptor,
        width: u32,
        height: u32,
        method: ResizeMethod,
    ) -> ThumbnailOutcome {
        // Validate here as well so caller bugs never touch the pool.
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

        // Key on the canonical target so (100,100) and (150,150) requests
        // that both map to the same candidate coalesce.
        let (target_width, target_height) = sizing::select_target_size(
            &self.service.config().sizes,
            width,
            height,
        );
        let identifier = format!(
            "{}/{}@{}x{}/{}",
            media.origin, media.media_id, target_width, target_height, method
        );
        debug!(identifier = %identifier, "coalescing thumbnail request");

        let job = ThumbnailJob {
            media: media.clone(),
            width,
            height,
            method,
        };
        match self.broker.resolve(identifier, job).await.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ResolveError::Interrupted),
        }
    }

    /// Shut down the underlying broker; see
    /// [`ResourceBroker::close`](crate::resource::ResourceBroker::close).
    pub async fn close(&self) {
        self.broker.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::thumbnail::test_support::*;

    fn coalesced(
        generator: Arc<StubGenerator>,
    ) -> (CoalescedThumbnails, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::new());
        let service = ThumbnailService::new(
            Arc::new(Arc::clone(&store)),
            Arc::new(generator),
            test_config(),
        );
        (
            CoalescedThumbnails::new(Arc::new(service), 4).unwrap(),
            store,
        )
    }

    #[tokio::test]
    async fn concurrent_duplicates_generate_once() {
        let generator =
            Arc::new(StubGenerator::slow(Duration::from_millis(40)));
        let (thumbs, store) = coalesced(Arc::clone(&generator));
        let thumbs = Arc::new(thumbs);

        let descriptor = media("image/png", 100);
        let mut handles = Vec::new();
        for _ in 0..6 {
            let thumbs = Arc::clone(&thumbs);
            let descriptor = descriptor.clone();
            handles.push(tokio::spawn(async move {
                thumbs
                    .get_thumbnail(&descriptor, 96, 96, ResizeMethod::Scale)
                    .await
            }));
        }

        for handle in handles {
            let record = handle.await.unwrap().unwrap().unwrap();
            assert_eq!((record.width, record.height), (200, 200));
        }
        assert_eq!(generator.call_count(), 1);
        assert_eq!(store.inner.len().await, 1);

        thumbs.close().await;
    }

    #[tokio::test]
    async fn different_requests_for_the_same_target_coalesce() {
        let generator =
            Arc::new(StubGenerator::slow(Duration::from_millis(40)));
        let (thumbs, _store) = coalesced(Arc::clone(&generator));
        let thumbs = Arc::new(thumbs);

        let descriptor = media("image/png", 100);
        // Both of these select the (200,200) candidate.
        let a = {
            let thumbs = Arc::clone(&thumbs);
            let descriptor = descriptor.clone();
            tokio::spawn(async move {
                thumbs
                    .get_thumbnail(&descriptor, 100, 100, ResizeMethod::Scale)
                    .await
            })
        };
        let b = {
            let thumbs = Arc::clone(&thumbs);
            let descriptor = descriptor.clone();
            tokio::spawn(async move {
                thumbs
                    .get_thumbnail(&descriptor, 150, 150, ResizeMethod::Scale)
                    .await
            })
        };

        let a = a.await.unwrap().unwrap().unwrap();
        let b = b.await.unwrap().unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(generator.call_count(), 1);

        thumbs.close().await;
    }

    #[tokio::test]
    async fn crop_and_scale_do_not_coalesce() {
        let generator = Arc::new(StubGenerator::new());
        let (thumbs, _store) = coalesced(Arc::clone(&generator));

        let descriptor = media("image/png", 100);
        thumbs
            .get_thumbnail(&descriptor, 96, 96, ResizeMethod::Scale)
            .await
            .unwrap();
        thumbs
            .get_thumbnail(&descriptor, 96, 96, ResizeMethod::Crop)
            .await
            .unwrap();

        assert_eq!(generator.call_count(), 2);

        thumbs.close().await;
    }

    #[tokio::test]
    async fn invalid_dimensions_never_reach_the_pool() {
        let generator = Arc::new(StubGenerator::new());
        let (thumbs, store) = coalesced(Arc::clone(&generator));

        let err = thumbs
            .get_thumbnail(&media("image/png", 100), 0, 96, ResizeMethod::Scale)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::InvalidArgument(_)));
        assert_eq!(store.get_count(), 0);
        assert_eq!(generator.call_count(), 0);

        thumbs.close().await;
    }

    #[tokio::test]
    async fn typed_failures_are_broadcast_to_every_waiter() {
        let generator =
            Arc::new(StubGenerator::slow(Duration::from_millis(40)));
        let (thumbs, _store) = coalesced(Arc::clone(&generator));
        let thumbs = Arc::new(thumbs);

        let descriptor = media("application/pdf", 100);
        let mut handles = Vec::new();
        for _ in 0..3 {
            let thumbs = Arc::clone(&thumbs);
            let descriptor = descriptor.clone();
            handles.push(tokio::spawn(async move {
                thumbs
                    .get_thumbnail(&descriptor, 96, 96, ResizeMethod::Scale)
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(
                err,
                ResolveError::UnsupportedContentType { .. }
            ));
        }
        // The rejection itself was computed at most once per in-flight
        // window; it never reached the generator.
        assert_eq!(generator.call_count(), 0);

        thumbs.close().await;
    }
}
