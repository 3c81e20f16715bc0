//! Mock frame transport
//!
//! Generates RGB8 frames at a fixed frequency in background threads and hands
//! them to the subscriber's callback, the way a simulator plugin would.
//! Every byte of frame `n` equals `n % 256`, so a torn frame is detectable.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use contracts::{
    ContractError, FrameCallback, FrameTransport, MockSourceConfig, SubscriptionId, Timestamp,
    BYTES_PER_PIXEL, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};

const DEFAULT_FREQUENCY_HZ: f64 = 30.0;
const DEFAULT_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / 30);

/// Mock transport configuration
#[derive(Debug, Clone)]
pub struct MockTransportConfig {
    /// Send frequency (Hz)
    pub frequency_hz: f64,
    /// Emitted image width
    pub width: u16,
    /// Emitted image height
    pub height: u16,
    /// Stop each subscription after this many frames
    pub max_frames: Option<u64>,
}

impl Default for MockTransportConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            max_frames: None,
        }
    }
}

impl From<&MockSourceConfig> for MockTransportConfig {
    fn from(config: &MockSourceConfig) -> Self {
        Self {
            frequency_hz: config.frequency_hz,
            width: config.width,
            height: config.height,
            max_frames: None,
        }
    }
}

fn pack(width: u16, height: u16) -> u32 {
    (u32::from(width) << 16) | u32::from(height)
}

fn unpack(packed: u32) -> (u16, u16) {
    ((packed >> 16) as u16, packed as u16)
}

/// Fill pattern of frame `sequence` for the given geometry
pub fn pattern_frame(sequence: u64, width: u16, height: u16) -> Vec<u8> {
    let len = usize::from(width) * usize::from(height) * usize::from(BYTES_PER_PIXEL);
    vec![sequence as u8; len]
}

/// In-process frame source
///
/// Each subscription gets its own delivery thread. Unsubscribing stops the
/// thread after its current frame; a callback in flight may still complete.
pub struct MockTransport {
    config: MockTransportConfig,
    interval: Duration,
    geometry: Arc<AtomicU32>,
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<u64, Arc<AtomicBool>>>,
    rejected: Mutex<HashSet<String>>,
    frames_emitted: Arc<AtomicU64>,
}

impl MockTransport {
    /// Create new mock transport
    ///
    /// The frequency must be finite, positive and give a representable period.
    pub fn new(config: MockTransportConfig) -> Result<Self> {
        let invalid = || TransportError::InvalidFrequency {
            frequency_hz: config.frequency_hz,
        };
        if !(config.frequency_hz.is_finite() && config.frequency_hz > 0.0) {
            return Err(invalid());
        }
        let interval =
            Duration::try_from_secs_f64(1.0 / config.frequency_hz).map_err(|_| invalid())?;
        Ok(Self::build(config, interval))
    }

    /// Create mock transport with default configuration
    pub fn with_defaults() -> Self {
        Self::build(MockTransportConfig::default(), DEFAULT_INTERVAL)
    }

    fn build(config: MockTransportConfig, interval: Duration) -> Self {
        Self {
            interval,
            geometry: Arc::new(AtomicU32::new(pack(config.width, config.height))),
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(HashMap::new()),
            rejected: Mutex::new(HashSet::new()),
            frames_emitted: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> &MockTransportConfig {
        &self.config
    }

    /// Change the geometry of emitted frames, independently of any consumer
    pub fn set_geometry(&self, width: u16, height: u16) {
        self.geometry.store(pack(width, height), Ordering::Relaxed);
        debug!(width, height, "mock source geometry changed");
    }

    /// Current emitted geometry
    pub fn geometry(&self) -> (u16, u16) {
        unpack(self.geometry.load(Ordering::Relaxed))
    }

    /// Refuse future subscriptions to `locator`
    pub fn reject_locator(&self, locator: impl Into<String>) {
        lock(&self.rejected).insert(locator.into());
    }

    /// Number of open subscriptions
    pub fn active_subscriptions(&self) -> usize {
        lock(&self.subscriptions).len()
    }

    /// Frames handed to callbacks so far (all subscriptions)
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::Relaxed)
    }

    fn open(&self, locator: &str, callback: FrameCallback) -> Result<SubscriptionId> {
        if lock(&self.rejected).contains(locator) {
            return Err(TransportError::locator_rejected(locator, "no such topic"));
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            id,
            locator: locator.to_string(),
            interval: self.interval,
            max_frames: self.config.max_frames,
            geometry: Arc::clone(&self.geometry),
            running: Arc::clone(&running),
            emitted: Arc::clone(&self.frames_emitted),
            callback,
        };

        // registered before the thread starts so an immediate unsubscribe is seen
        lock(&self.subscriptions).insert(id.0, running);
        if let Err(e) = thread::Builder::new()
            .name(format!("mock-transport-{}", id.0))
            .spawn(move || worker.run())
        {
            lock(&self.subscriptions).remove(&id.0);
            return Err(TransportError::Spawn(e));
        }

        debug!(subscription = %id, locator, "mock subscription opened");
        Ok(id)
    }
}

impl FrameTransport for MockTransport {
    fn subscribe(
        &self,
        locator: &str,
        callback: FrameCallback,
    ) -> std::result::Result<SubscriptionId, ContractError> {
        self.open(locator, callback).map_err(ContractError::from)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        match lock(&self.subscriptions).remove(&id.0) {
            Some(running) => {
                running.store(false, Ordering::SeqCst);
                debug!(subscription = %id, "mock subscription closed");
            }
            None => warn!(subscription = %id, "unknown subscription"),
        }
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        let subscriptions = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for running in subscriptions.values() {
            running.store(false, Ordering::SeqCst);
        }
        subscriptions.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker {
    id: SubscriptionId,
    locator: String,
    interval: Duration,
    max_frames: Option<u64>,
    geometry: Arc<AtomicU32>,
    running: Arc<AtomicBool>,
    emitted: Arc<AtomicU64>,
    callback: FrameCallback,
}

impl Worker {
    fn run(self) {
        debug!(
            subscription = %self.id,
            locator = %self.locator,
            interval_ms = self.interval.as_millis() as u64,
            "mock transport started"
        );

        let mut sequence: u64 = 0;
        let mut frame = Vec::new();

        while self.running.load(Ordering::Relaxed) {
            if self.max_frames.is_some_and(|max| sequence >= max) {
                break;
            }
            sequence += 1;

            let (width, height) = unpack(self.geometry.load(Ordering::Relaxed));
            let len = usize::from(width) * usize::from(height) * usize::from(BYTES_PER_PIXEL);
            frame.clear();
            frame.resize(len, sequence as u8);

            self.emitted.fetch_add(1, Ordering::Relaxed);
            (self.callback)(&frame, Timestamp::now());

            trace!(subscription = %self.id, sequence, width, height, "mock frame sent");

            thread::sleep(self.interval);
        }

        debug!(subscription = %self.id, frames = sequence, "mock transport stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn fast(max_frames: Option<u64>) -> MockTransport {
        MockTransport::new(MockTransportConfig {
            frequency_hz: 500.0,
            width: 4,
            height: 3,
            max_frames,
        })
        .unwrap()
    }

    fn wait_until(deadline_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_delivers_pattern_frames() {
        let transport = fast(Some(5));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);

        transport
            .subscribe(
                "cam",
                Arc::new(move |bytes: &[u8], _ts: Timestamp| {
                    sink.lock().unwrap().push(bytes.to_vec());
                }),
            )
            .unwrap();

        assert!(wait_until(2000, || frames.lock().unwrap().len() == 5));
        let frames = frames.lock().unwrap();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.len(), 4 * 3 * 3);
            assert_eq!(*frame, pattern_frame(i as u64 + 1, 4, 3));
        }
        assert_eq!(transport.frames_emitted(), 5);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let transport = fast(None);
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);

        let id = transport
            .subscribe(
                "cam",
                Arc::new(move |_: &[u8], _: Timestamp| {
                    counter.fetch_add(1, Ordering::Relaxed);
                }),
            )
            .unwrap();
        assert!(wait_until(2000, || count.load(Ordering::Relaxed) > 2));

        transport.unsubscribe(id);
        assert_eq!(transport.active_subscriptions(), 0);

        // at most one in-flight frame after unsubscribe
        thread::sleep(Duration::from_millis(20));
        let after = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::Relaxed), after);
    }

    #[test]
    fn test_rejected_locator() {
        let transport = fast(None);
        transport.reject_locator("~/missing");

        let err = transport
            .subscribe("~/missing", Arc::new(|_: &[u8], _: Timestamp| {}))
            .unwrap_err();
        assert!(matches!(err, ContractError::Subscription { .. }));
        assert_eq!(transport.active_subscriptions(), 0);
    }

    #[test]
    fn test_set_geometry_changes_emitted_length() {
        let transport = fast(None);
        let lengths = Arc::new(Mutex::new(HashSet::new()));
        let sink = Arc::clone(&lengths);

        let id = transport
            .subscribe(
                "cam",
                Arc::new(move |bytes: &[u8], _: Timestamp| {
                    sink.lock().unwrap().insert(bytes.len());
                }),
            )
            .unwrap();
        assert!(wait_until(2000, || lengths.lock().unwrap().contains(&36)));

        transport.set_geometry(2, 2);
        assert_eq!(transport.geometry(), (2, 2));
        assert!(wait_until(2000, || lengths.lock().unwrap().contains(&12)));
        transport.unsubscribe(id);
    }

    #[test]
    fn test_invalid_frequency() {
        let err = MockTransport::new(MockTransportConfig {
            frequency_hz: 0.0,
            ..Default::default()
        });
        assert!(matches!(err, Err(TransportError::InvalidFrequency { .. })));
    }

    #[test]
    fn test_unrepresentable_period_rejected() {
        for frequency_hz in [1e-300, f64::MIN_POSITIVE, f64::NAN, f64::INFINITY, -5.0] {
            let result = MockTransport::new(MockTransportConfig {
                frequency_hz,
                ..Default::default()
            });
            assert!(
                matches!(result, Err(TransportError::InvalidFrequency { .. })),
                "{frequency_hz} Hz accepted"
            );
        }

        let slow = MockTransport::new(MockTransportConfig {
            frequency_hz: 0.5,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(slow.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_unknown_unsubscribe_is_ignored() {
        let transport = MockTransport::with_defaults();
        transport.unsubscribe(SubscriptionId(42));
        assert_eq!(transport.active_subscriptions(), 0);
    }
}
