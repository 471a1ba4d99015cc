//! Channel-backed filter callback.
//!
//! The HAL side pushes [`FilterEvent`]s through a [`FilterEventSender`]; the
//! test side awaits them in [`FilterCallback::test_filter_data_output`].

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use tuner_vts_protocol::{FilterCheckError, ResourceRef};

use super::FilterCallback;

/// Non-data status reported by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStatus {
    DataReady,
    LowWater,
    HighWater,
    Overflow,
}

/// One event emitted by an opened filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEvent {
    /// A complete section (section filter).
    Section { data: Bytes },
    /// An audio or video access unit with its presentation timestamp.
    Media { pts: u64, data: Bytes },
    Pes { data: Bytes },
    /// Record progress (bytes written so far).
    TsRecord { byte_number: u64 },
    IpPayload { data: Bytes },
    Status(FilterStatus),
}

impl FilterEvent {
    /// Payload of a data event. `None` for events that carry no payload.
    fn payload(&self) -> Option<&Bytes> {
        match self {
            FilterEvent::Section { data }
            | FilterEvent::Media { data, .. }
            | FilterEvent::Pes { data }
            | FilterEvent::IpPayload { data } => Some(data),
            FilterEvent::TsRecord { .. } | FilterEvent::Status(_) => None,
        }
    }
}

/// What a filter must produce to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterExpectation {
    /// Data events required before the wait expires.
    pub min_output_events: usize,
    pub wait_timeout: Duration,
}

impl Default for FilterExpectation {
    fn default() -> Self {
        Self {
            min_output_events: 1,
            wait_timeout: Duration::from_secs(3),
        }
    }
}

/// Counters accumulated while checking a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterOutputStats {
    pub data_events: usize,
    pub payload_bytes: usize,
    pub status_events: usize,
    pub overflows: usize,
}

/// Sending half handed to whatever produces the filter's events.
#[derive(Debug, Clone)]
pub struct FilterEventSender {
    tx: mpsc::UnboundedSender<FilterEvent>,
}

impl FilterEventSender {
    /// Returns `false` once the callback is gone.
    pub fn send(&self, event: FilterEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// [`FilterCallback`] fed through an unbounded channel.
pub struct ChannelFilterCallback {
    filter: ResourceRef,
    expectation: FilterExpectation,
    tx: mpsc::UnboundedSender<FilterEvent>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<FilterEvent>>,
    stats: Mutex<FilterOutputStats>,
}

impl ChannelFilterCallback {
    pub fn new(
        filter: ResourceRef,
        expectation: FilterExpectation,
    ) -> (std::sync::Arc<Self>, FilterEventSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = std::sync::Arc::new(Self {
            filter,
            expectation,
            tx: tx.clone(),
            rx: tokio::sync::Mutex::new(rx),
            stats: Mutex::new(FilterOutputStats::default()),
        });
        (callback, FilterEventSender { tx })
    }

    pub fn stats(&self) -> FilterOutputStats {
        *self.stats.lock()
    }

    async fn wait_for_output(&self) -> Result<(), FilterCheckError> {
        let expected = self.expectation.min_output_events;
        let deadline = Instant::now() + self.expectation.wait_timeout;
        let mut rx = self.rx.lock().await;
        let mut received = 0;

        while received < expected {
            let event = match timeout_at(deadline, rx.recv()).await {
                Ok(Some(event)) => event,
                Ok(None) | Err(_) => {
                    debug!(
                        "{}: {} of {} output event(s) before timeout",
                        self.filter, received, expected
                    );
                    return Err(FilterCheckError::NoOutput { received, expected });
                }
            };
            trace!("{}: {:?}", self.filter, event);
            if self.record(&event)? {
                received += 1;
            }
        }
        Ok(())
    }

    /// Account for one event. Returns whether it counts as output.
    fn record(&self, event: &FilterEvent) -> Result<bool, FilterCheckError> {
        let mut stats = self.stats.lock();
        if let FilterEvent::Status(status) = event {
            stats.status_events += 1;
            if *status == FilterStatus::Overflow {
                stats.overflows += 1;
                warn!("{}: filter buffer overflow", self.filter);
            }
            return Ok(false);
        }
        if let Some(data) = event.payload() {
            if data.is_empty() {
                return Err(FilterCheckError::Mismatch(format!(
                    "{} delivered an empty payload",
                    self.filter
                )));
            }
            stats.payload_bytes += data.len();
        }
        stats.data_events += 1;
        Ok(true)
    }
}

impl FilterCallback for ChannelFilterCallback {
    fn filter(&self) -> ResourceRef {
        self.filter
    }

    fn test_filter_data_output(&self) -> BoxFuture<'_, Result<(), FilterCheckError>> {
        self.wait_for_output().boxed()
    }

    fn on_filter_event(&self, event: FilterEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_vts_protocol::{ResourceId, ResourceKind};

    fn expectation(min: usize, millis: u64) -> FilterExpectation {
        FilterExpectation {
            min_output_events: min,
            wait_timeout: Duration::from_millis(millis),
        }
    }

    fn section() -> ResourceRef {
        ResourceRef::new(ResourceKind::SectionFilter, ResourceId(0))
    }

    #[tokio::test]
    async fn test_output_arrives() {
        let (callback, tx) = ChannelFilterCallback::new(section(), expectation(2, 1000));
        assert!(tx.send(FilterEvent::Status(FilterStatus::DataReady)));
        assert!(tx.send(FilterEvent::Section {
            data: Bytes::from_static(&[0x00, 0xB0, 0x0D]),
        }));
        assert!(tx.send(FilterEvent::Section {
            data: Bytes::from_static(&[0x42]),
        }));

        callback.test_filter_data_output().await.unwrap();
        let stats = callback.stats();
        assert_eq!(stats.data_events, 2);
        assert_eq!(stats.payload_bytes, 4);
        assert_eq!(stats.status_events, 1);
    }

    #[tokio::test]
    async fn test_no_output_times_out() {
        let (callback, tx) = ChannelFilterCallback::new(section(), expectation(2, 50));
        tx.send(FilterEvent::Section {
            data: Bytes::from_static(&[0x00]),
        });

        assert_eq!(
            callback.test_filter_data_output().await,
            Err(FilterCheckError::NoOutput {
                received: 1,
                expected: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_empty_payload_is_mismatch() {
        let (callback, _tx) = ChannelFilterCallback::new(section(), expectation(1, 1000));
        assert!(callback.on_filter_event(FilterEvent::Pes { data: Bytes::new() }));

        assert!(matches!(
            callback.test_filter_data_output().await,
            Err(FilterCheckError::Mismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_overflow_is_counted_not_fatal() {
        let (callback, tx) = ChannelFilterCallback::new(section(), expectation(1, 1000));
        tx.send(FilterEvent::Status(FilterStatus::Overflow));
        tx.send(FilterEvent::TsRecord { byte_number: 188 });

        callback.test_filter_data_output().await.unwrap();
        assert_eq!(callback.stats().overflows, 1);
        assert_eq!(callback.stats().data_events, 1);
    }

    #[tokio::test]
    async fn test_events_sent_from_another_task() {
        let (callback, tx) = ChannelFilterCallback::new(section(), expectation(3, 2000));
        let producer = tokio::spawn(async move {
            for pts in 0..3u64 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                tx.send(FilterEvent::Media {
                    pts,
                    data: Bytes::from_static(b"au"),
                });
            }
        });

        callback.test_filter_data_output().await.unwrap();
        producer.await.unwrap();
    }
}
