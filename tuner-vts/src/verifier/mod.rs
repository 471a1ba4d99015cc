//! Filter data output verification.
//!
//! Every filter a test case opens registers a [`FilterCallback`] in the
//! case's [`FilterCallbackMap`]. Once the scenario is streaming,
//! [`filter_data_output_test`] asks each callback in turn whether its filter
//! produced the expected output.

mod callback_map;
mod channel;

pub use callback_map::FilterCallbackMap;
pub use channel::{
    ChannelFilterCallback, FilterEvent, FilterEventSender, FilterExpectation, FilterOutputStats,
    FilterStatus,
};

use futures::future::BoxFuture;
use log::{debug, info, warn};

use tuner_vts_protocol::{FilterCheckError, FilterKey, ResourceRef, VerificationFailure};

/// Observer of one opened filter.
///
/// Implementations receive the filter's events through
/// [`FilterCallback::on_filter_event`] and decide, when asked, whether the
/// output seen so far is acceptable.
pub trait FilterCallback: Send + Sync {
    /// Filter this callback observes.
    fn filter(&self) -> ResourceRef;

    /// Wait for and check the filter's output.
    fn test_filter_data_output(&self) -> BoxFuture<'_, Result<(), FilterCheckError>>;

    /// Push one event into the callback. Returns `false` if it was dropped.
    fn on_filter_event(&self, _event: FilterEvent) -> bool {
        false
    }
}

/// Outcome of a passing verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// Keys that were checked, in ascending order.
    pub checked: Vec<FilterKey>,
}

/// Check every registered filter's output.
///
/// Callbacks are awaited one after another in key order. The map lock is only
/// held while taking the snapshot, so filter events keep flowing during the
/// waits. All failures are collected before returning.
pub async fn filter_data_output_test(
    callbacks: &FilterCallbackMap,
) -> Result<VerificationReport, VerificationFailure> {
    let snapshot = callbacks.snapshot();
    if snapshot.is_empty() {
        warn!("Filter output test ran with no registered filter");
        return Err(VerificationFailure::NoFiltersRegistered);
    }

    let mut checked = Vec::with_capacity(snapshot.len());
    let mut failures = Vec::new();
    for (key, callback) in snapshot {
        debug!("Checking output of {} ({})", key, callback.filter());
        match callback.test_filter_data_output().await {
            Ok(()) => debug!("Filter {} output OK", key),
            Err(e) => {
                warn!("Filter {} output check failed: {}", key, e);
                failures.push((key, e));
            }
        }
        checked.push(key);
    }

    if failures.is_empty() {
        info!("Filter output verified for {} filter(s)", checked.len());
        Ok(VerificationReport { checked })
    } else {
        Err(VerificationFailure::CallbacksFailed { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use futures::FutureExt;
    use tokio::sync::Notify;
    use tokio::time::timeout;
    use tuner_vts_protocol::{ResourceId, ResourceKind};

    struct FixedCallback {
        filter: ResourceRef,
        result: Result<(), FilterCheckError>,
        calls: AtomicUsize,
    }

    impl FixedCallback {
        fn new(kind: ResourceKind, id: u32, result: Result<(), FilterCheckError>) -> Arc<Self> {
            Arc::new(Self {
                filter: ResourceRef::new(kind, ResourceId(id)),
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl FilterCallback for FixedCallback {
        fn filter(&self) -> ResourceRef {
            self.filter
        }

        fn test_filter_data_output(&self) -> BoxFuture<'_, Result<(), FilterCheckError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result.clone();
            async move { result }.boxed()
        }
    }

    /// Signals `started` when asked, then holds the check until `release`.
    struct GatedCallback {
        filter: ResourceRef,
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl FilterCallback for GatedCallback {
        fn filter(&self) -> ResourceRef {
            self.filter
        }

        fn test_filter_data_output(&self) -> BoxFuture<'_, Result<(), FilterCheckError>> {
            async move {
                self.started.notify_one();
                self.release.notified().await;
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_empty_map_fails() {
        let map = FilterCallbackMap::new();
        assert_eq!(
            filter_data_output_test(&map).await,
            Err(VerificationFailure::NoFiltersRegistered)
        );
    }

    #[tokio::test]
    async fn test_all_callbacks_pass() {
        let map = FilterCallbackMap::new();
        map.register_filter(FixedCallback::new(ResourceKind::VideoFilter, 1, Ok(())));
        map.register_filter(FixedCallback::new(ResourceKind::AudioFilter, 0, Ok(())));

        let report = filter_data_output_test(&map).await.unwrap();
        assert_eq!(
            report.checked,
            vec![
                FilterKey::Filter(ResourceRef::new(ResourceKind::AudioFilter, ResourceId(0))),
                FilterKey::Filter(ResourceRef::new(ResourceKind::VideoFilter, ResourceId(1))),
            ]
        );
    }

    #[tokio::test]
    async fn test_one_failing_callback_is_named() {
        let map = FilterCallbackMap::new();
        let ok_a = FixedCallback::new(ResourceKind::AudioFilter, 0, Ok(()));
        let bad = FixedCallback::new(
            ResourceKind::VideoFilter,
            0,
            Err(FilterCheckError::NoOutput {
                received: 0,
                expected: 1,
            }),
        );
        let ok_b = FixedCallback::new(ResourceKind::SectionFilter, 0, Ok(()));
        map.register_filter(ok_a.clone());
        map.register_filter(bad.clone());
        map.register_filter(ok_b.clone());

        let err = filter_data_output_test(&map).await.unwrap_err();
        let bad_key = FilterKey::Filter(ResourceRef::new(ResourceKind::VideoFilter, ResourceId(0)));
        assert_eq!(err.failed_keys(), vec![bad_key]);
        assert!(err.to_string().contains("video_filter:0"));

        // Every callback is still asked once.
        assert_eq!(ok_a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bad.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok_b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_keys_sort_after_filter_keys() {
        let map = FilterCallbackMap::new();
        map.register(
            FilterKey::Session(7),
            FixedCallback::new(ResourceKind::PcrFilter, 0, Ok(())),
        );
        map.register_filter(FixedCallback::new(ResourceKind::IpFilter, 2, Ok(())));

        let report = filter_data_output_test(&map).await.unwrap();
        assert_eq!(report.checked.len(), 2);
        assert_eq!(report.checked[1], FilterKey::Session(7));
    }

    #[tokio::test]
    async fn test_map_stays_usable_while_a_check_is_pending() {
        let map = Arc::new(FilterCallbackMap::new());
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let first = map.register_filter(Arc::new(GatedCallback {
            filter: ResourceRef::new(ResourceKind::AudioFilter, ResourceId(0)),
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        }));

        let verification = tokio::spawn({
            let map = Arc::clone(&map);
            async move { filter_data_output_test(&map).await }
        });
        timeout(Duration::from_secs(1), started.notified())
            .await
            .expect("check never started");

        let late = FixedCallback::new(ResourceKind::VideoFilter, 0, Ok(()));
        let late_key = map.register_filter(late.clone());
        assert_eq!(map.len(), 2);
        map.clear();
        assert!(map.is_empty());
        let event = FilterEvent::Section {
            data: Bytes::from_static(&[0x47]),
        };
        assert!(!map.deliver(&late_key, event.clone()));
        assert!(!map.deliver(&first, event));

        release.notify_one();
        let report = timeout(Duration::from_secs(1), verification)
            .await
            .expect("verification blocked on the map")
            .unwrap()
            .unwrap();
        assert_eq!(report.checked, vec![first]);
        assert_eq!(late.calls.load(Ordering::SeqCst), 0);
    }
}
