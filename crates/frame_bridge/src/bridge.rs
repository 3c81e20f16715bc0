//! Camera bridge: connection lifecycle and reconfiguration
//!
//! Lock order: session, then frame buffer, then calibration. No operation
//! calls the transport while holding the frame buffer lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{
    CameraConfig, ControlRequest, Extrinsics, FrameTransport, Intrinsics, OutputChannel,
    SubscriptionId,
};
use tracing::{error, info, instrument, warn};

use crate::buffer::{FrameBuffer, Geometry};
use crate::calibration::CalibrationModel;
use crate::error::Result;
use crate::ingest::IngestPath;
use crate::metrics::BridgeMetrics;
use crate::publish::PublishCycle;

/// Result of [`CameraBridge::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(SubscriptionId),
    /// Already subscribed; nothing changed
    AlreadyConnected,
    /// The transport refused the subscription; still disconnected
    Failed { reason: String },
}

/// Result of [`CameraBridge::disconnect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Disconnected,
    /// Not subscribed; nothing changed
    AlreadyDisconnected,
}

/// Result of [`CameraBridge::handle`]
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Connect(ConnectOutcome),
    Disconnect(DisconnectOutcome),
    Intrinsics(Intrinsics),
    Extrinsics(Extrinsics),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The bridge context
///
/// Owns the shared frame buffer, the calibration model and the transport
/// subscription. The ingest path and the publish cycle are handed out as
/// separate objects sharing the same buffer.
pub struct CameraBridge {
    buffer: Arc<FrameBuffer>,
    calibration: Mutex<CalibrationModel>,
    session: Mutex<Option<SubscriptionId>>,
    transport: Arc<dyn FrameTransport>,
    output: Arc<dyn OutputChannel>,
    metrics: Arc<BridgeMetrics>,
}

impl CameraBridge {
    /// Allocate the buffer for the configured geometry and publish the
    /// initial calibration on both ports.
    pub fn new(
        config: &CameraConfig,
        transport: Arc<dyn FrameTransport>,
        output: Arc<dyn OutputChannel>,
    ) -> Result<Self> {
        Self::with_metrics(config, transport, output, Arc::new(BridgeMetrics::new()))
    }

    pub fn with_metrics(
        config: &CameraConfig,
        transport: Arc<dyn FrameTransport>,
        output: Arc<dyn OutputChannel>,
        metrics: Arc<BridgeMetrics>,
    ) -> Result<Self> {
        let geometry = Geometry::new(config.width, config.height);
        let calibration =
            CalibrationModel::new(geometry, config.hfov, config.distortion, config.extrinsics)?;
        let buffer = FrameBuffer::with_limit(geometry, config.max_frame_bytes)
            .inspect_err(|_| metrics.inc_oom())?;
        metrics.set_frame_bytes(buffer.length());

        let bridge = Self {
            buffer: Arc::new(buffer),
            calibration: Mutex::new(calibration),
            session: Mutex::new(None),
            transport,
            output,
            metrics,
        };

        {
            let calibration = lock(&bridge.calibration);
            bridge.publish_intrinsics(calibration.intrinsics());
            bridge.publish_extrinsics(calibration.extrinsics());
            info!(
                %geometry,
                hfov = calibration.hfov(),
                focal = calibration.intrinsics().focal_x,
                "camera bridge initialised"
            );
        }

        Ok(bridge)
    }

    /// Shared frame buffer
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Ingest path bound to this bridge's buffer
    pub fn ingest_path(&self) -> IngestPath {
        IngestPath::new(Arc::clone(&self.buffer), Arc::clone(&self.metrics))
    }

    /// Publish cycle writing to this bridge's output channel
    ///
    /// The frame port is sized for the current geometry up front; an
    /// allocation failure is returned as `BridgeError::OutOfMemory`.
    pub fn publish_cycle(&self) -> Result<PublishCycle> {
        PublishCycle::new(
            Arc::clone(&self.buffer),
            Arc::clone(&self.output),
            Arc::clone(&self.metrics),
        )
    }

    pub fn is_started(&self) -> bool {
        self.buffer.is_started()
    }

    pub fn geometry(&self) -> Geometry {
        self.buffer.geometry()
    }

    /// Copy of the current calibration model
    pub fn calibration(&self) -> CalibrationModel {
        lock(&self.calibration).clone()
    }

    /// Subscribe to `locator`
    #[instrument(skip(self), fields(op = "connect"))]
    pub fn connect(&self, locator: &str) -> ConnectOutcome {
        let mut session = lock(&self.session);
        if session.is_some() {
            warn!("already connected");
            return ConnectOutcome::AlreadyConnected;
        }

        let callback = self.ingest_path().callback();
        match self.transport.subscribe(locator, callback) {
            Ok(id) => {
                *session = Some(id);
                self.buffer.lock().set_started(true);
                self.metrics.inc_reconfiguration("connect");
                info!(subscription = %id, "connected");
                ConnectOutcome::Connected(id)
            }
            Err(e) => {
                self.metrics.inc_connect_failure();
                error!(error = %e, "subscription failed");
                ConnectOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Drop the subscription
    ///
    /// Once this returns, no frame delivered by a late callback is accepted.
    #[instrument(skip(self), fields(op = "disconnect"))]
    pub fn disconnect(&self) -> DisconnectOutcome {
        let mut session = lock(&self.session);
        let Some(id) = session.take() else {
            warn!("already disconnected");
            return DisconnectOutcome::AlreadyDisconnected;
        };

        {
            let mut state = self.buffer.lock();
            state.set_started(false);
            state.discard_pending();
        }
        self.transport.unsubscribe(id);
        self.metrics.inc_reconfiguration("disconnect");
        info!(subscription = %id, "disconnected");
        DisconnectOutcome::Disconnected
    }

    /// Change the image geometry, then recompute and publish intrinsics.
    ///
    /// On error the previous geometry, buffer and calibration are kept.
    #[instrument(skip(self), fields(op = "set_format"))]
    pub fn set_format(&self, width: u16, height: u16) -> Result<Intrinsics> {
        let geometry = Geometry::new(width, height);
        let mut state = self.buffer.lock();
        let resized = match state.resize(geometry) {
            Ok(resized) => resized,
            Err(e) => {
                drop(state);
                if e.is_out_of_memory() {
                    self.metrics.inc_oom();
                }
                error!(error = %e, "image format unchanged");
                return Err(e);
            }
        };

        let mut calibration = lock(&self.calibration);
        let intrinsics = *calibration.set_geometry(geometry);
        drop(state);

        self.metrics.set_frame_bytes(resized.length);
        self.metrics.inc_reconfiguration("set_format");
        if resized.discarded_pending {
            info!("pending frame of previous format discarded");
        }
        info!(
            %geometry,
            focal = intrinsics.focal_x,
            "new intrinsic calibration"
        );
        self.publish_intrinsics(&intrinsics);
        Ok(intrinsics)
    }

    /// Change the horizontal field of view (radians)
    #[instrument(skip(self), fields(op = "set_hfov"))]
    pub fn set_field_of_view(&self, hfov: f32) -> Result<Intrinsics> {
        let intrinsics = *lock(&self.calibration).set_hfov(hfov)?;
        self.metrics.inc_reconfiguration("set_hfov");
        info!(focal = intrinsics.focal_x, "new intrinsic calibration");
        self.publish_intrinsics(&intrinsics);
        Ok(intrinsics)
    }

    /// Replace the distortion coefficients
    #[instrument(skip(self), fields(op = "set_distortion"))]
    pub fn set_distortion(&self, distortion: [f32; 5]) -> Result<Intrinsics> {
        let intrinsics = *lock(&self.calibration).set_distortion(distortion)?;
        self.metrics.inc_reconfiguration("set_distortion");
        info!("new intrinsic calibration");
        self.publish_intrinsics(&intrinsics);
        Ok(intrinsics)
    }

    /// Replace the extrinsic pose
    #[instrument(skip(self), fields(op = "set_extrinsics"))]
    pub fn set_extrinsics(&self, pose: [f32; 6]) -> Result<Extrinsics> {
        let extrinsics = *lock(&self.calibration).set_extrinsics(pose)?;
        self.metrics.inc_reconfiguration("set_extrinsics");
        info!("new extrinsic calibration");
        self.publish_extrinsics(&extrinsics);
        Ok(extrinsics)
    }

    /// Apply an out-of-band request; `default_locator` is used by a bare connect
    pub fn handle(&self, request: &ControlRequest, default_locator: &str) -> Result<RequestOutcome> {
        Ok(match request {
            ControlRequest::Connect { locator } => RequestOutcome::Connect(
                self.connect(locator.as_deref().unwrap_or(default_locator)),
            ),
            ControlRequest::Disconnect => RequestOutcome::Disconnect(self.disconnect()),
            ControlRequest::SetFormat { width, height } => {
                RequestOutcome::Intrinsics(self.set_format(*width, *height)?)
            }
            ControlRequest::SetHfov { hfov } => {
                RequestOutcome::Intrinsics(self.set_field_of_view(*hfov)?)
            }
            ControlRequest::SetDistortion { distortion } => {
                RequestOutcome::Intrinsics(self.set_distortion(*distortion)?)
            }
            ControlRequest::SetExtrinsics { extrinsics } => {
                RequestOutcome::Extrinsics(self.set_extrinsics(*extrinsics)?)
            }
        })
    }

    fn publish_intrinsics(&self, intrinsics: &Intrinsics) {
        if let Err(e) = self.output.write_intrinsics(intrinsics) {
            self.metrics.inc_publish_failure();
            warn!(error = %e, "intrinsic calibration publish failed");
        }
    }

    fn publish_extrinsics(&self, extrinsics: &Extrinsics) {
        if let Err(e) = self.output.write_extrinsics(extrinsics) {
            self.metrics.inc_publish_failure();
            warn!(error = %e, "extrinsic calibration publish failed");
        }
    }
}

impl Drop for CameraBridge {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = session {
            self.buffer.lock().set_started(false);
            self.transport.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::memory::MemoryOutput;
    use contracts::{ContractError, FrameCallback, Timestamp};
    use rand::Rng;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    /// Transport that stores callbacks so tests can fire them by hand
    #[derive(Default)]
    struct ManualTransport {
        next_id: AtomicU64,
        callbacks: Mutex<HashMap<u64, FrameCallback>>,
        unsubscribed: Mutex<Vec<u64>>,
    }

    impl ManualTransport {
        fn fire(&self, bytes: &[u8], ts: Timestamp) {
            let callbacks: Vec<_> = self.callbacks.lock().unwrap().values().cloned().collect();
            for cb in callbacks {
                cb(bytes, ts);
            }
        }

        fn subscriptions(&self) -> usize {
            self.callbacks.lock().unwrap().len()
        }
    }

    impl FrameTransport for ManualTransport {
        fn subscribe(
            &self,
            locator: &str,
            callback: FrameCallback,
        ) -> std::result::Result<SubscriptionId, ContractError> {
            if locator.is_empty() {
                return Err(ContractError::subscription(locator, "empty locator"));
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.callbacks.lock().unwrap().insert(id, callback);
            Ok(SubscriptionId(id))
        }

        fn unsubscribe(&self, id: SubscriptionId) {
            self.callbacks.lock().unwrap().remove(&id.0);
            self.unsubscribed.lock().unwrap().push(id.0);
        }
    }

    fn bridge_with(config: CameraConfig) -> (CameraBridge, Arc<ManualTransport>, Arc<MemoryOutput>) {
        let transport = Arc::new(ManualTransport::default());
        let output = Arc::new(MemoryOutput::new());
        let bridge = CameraBridge::new(&config, transport.clone(), output.clone()).unwrap();
        (bridge, transport, output)
    }

    fn bridge() -> (CameraBridge, Arc<ManualTransport>, Arc<MemoryOutput>) {
        bridge_with(CameraConfig::default())
    }

    #[test]
    fn test_startup_publishes_calibration() {
        let (bridge, _, output) = bridge();
        assert!(!bridge.is_started());
        assert_eq!(output.intrinsics_writes(), 1);
        assert_eq!(output.extrinsics_writes(), 1);

        let k = output.last_intrinsics().unwrap();
        assert_eq!(k.center_x, 160.0);
        assert_eq!(k.center_y, 120.0);
        assert_eq!(bridge.buffer().length(), 320 * 240 * 3);
    }

    #[test]
    fn test_connect_twice_warns_and_keeps_one_subscription() {
        let (bridge, transport, _) = bridge();
        assert!(matches!(
            bridge.connect("~/camera/image"),
            ConnectOutcome::Connected(_)
        ));
        assert_eq!(bridge.connect("~/camera/image"), ConnectOutcome::AlreadyConnected);
        assert_eq!(transport.subscriptions(), 1);
        assert!(bridge.is_started());
    }

    #[test]
    fn test_connect_failure_stays_disconnected() {
        let (bridge, _, _) = bridge();
        let outcome = bridge.connect("");
        assert!(matches!(outcome, ConnectOutcome::Failed { .. }));
        assert!(!bridge.is_started());
        assert_eq!(bridge.metrics().snapshot().connect_failures, 1);

        assert!(matches!(bridge.connect("ok"), ConnectOutcome::Connected(_)));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (bridge, transport, _) = bridge();
        bridge.connect("cam");

        assert_eq!(bridge.disconnect(), DisconnectOutcome::Disconnected);
        assert!(!bridge.is_started());
        let after_first = bridge.metrics().snapshot().reconfigurations;

        assert_eq!(bridge.disconnect(), DisconnectOutcome::AlreadyDisconnected);
        assert!(!bridge.is_started());
        assert_eq!(bridge.metrics().snapshot().reconfigurations, after_first);
        assert_eq!(transport.unsubscribed.lock().unwrap().len(), 1);

        assert_eq!(bridge.disconnect(), DisconnectOutcome::AlreadyDisconnected);
        assert_eq!(transport.unsubscribed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_no_ingest_after_disconnect() {
        let (bridge, transport, _) = bridge_with(CameraConfig {
            width: 2,
            height: 2,
            ..CameraConfig::default()
        });
        bridge.connect("cam");
        let callback = transport.callbacks.lock().unwrap().values().next().cloned().unwrap();

        callback(&[1u8; 12], Timestamp::default());
        assert!(bridge.buffer().has_new_frame());

        bridge.disconnect();
        assert!(!bridge.buffer().has_new_frame());

        // late delivery from a callback captured before unsubscribe
        callback(&[2u8; 12], Timestamp::default());
        assert!(!bridge.buffer().has_new_frame());
        assert_eq!(bridge.metrics().snapshot().not_started_drops, 1);
    }

    #[test]
    fn test_set_format_then_ingest_matching_length() {
        let (bridge, transport, output) = bridge();
        bridge.connect("cam");
        let mut cycle = bridge.publish_cycle().unwrap();

        let k = bridge.set_format(640, 480).unwrap();
        assert_eq!(bridge.buffer().length(), 640 * 480 * 3);
        assert_eq!(k.center_x, 320.0);
        assert_eq!(output.last_intrinsics().unwrap(), k);

        transport.fire(&vec![3u8; 640 * 480 * 3], Timestamp::new(1, 0));
        assert!(cycle.tick().unwrap());
        let frame = output.last_frame().unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
    }

    #[test]
    fn test_set_format_rejected_keeps_state() {
        let (bridge, _, output) = bridge_with(CameraConfig {
            max_frame_bytes: Some(320 * 240 * 3),
            ..CameraConfig::default()
        });
        let before = bridge.calibration();

        let err = bridge.set_format(640, 480).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfMemory { .. }));
        assert_eq!(bridge.geometry(), Geometry::new(320, 240));
        assert_eq!(bridge.calibration(), before);
        assert_eq!(output.intrinsics_writes(), 1);
        assert_eq!(bridge.metrics().snapshot().oom_events, 1);

        assert!(matches!(
            bridge.set_format(0, 480),
            Err(BridgeError::InvalidFormat { .. })
        ));
        assert_eq!(bridge.geometry(), Geometry::new(320, 240));
    }

    #[test]
    fn test_field_of_view_at_640x480() {
        let (bridge, _, output) = bridge();
        bridge.set_format(640, 480).unwrap();

        let hfov = 1.2f32;
        let k = bridge.set_field_of_view(hfov).unwrap();
        let expected = 320.0 / (hfov / 2.0).tan();
        assert!((k.focal_x - expected).abs() < 1e-3);
        assert_eq!(k.focal_y, k.focal_x);
        assert_eq!(k.center_x, 320.0);
        assert_eq!(k.center_y, 240.0);
        assert_eq!(output.intrinsics_writes(), 3);

        assert!(bridge.set_field_of_view(-0.1).is_err());
        assert_eq!(output.intrinsics_writes(), 3);
    }

    #[test]
    fn test_distortion_and_extrinsics_republish() {
        let (bridge, _, output) = bridge();
        let focal = bridge.calibration().intrinsics().focal_x;

        let k = bridge.set_distortion([0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
        assert_eq!(k.focal_x, focal);
        assert_eq!(output.last_intrinsics().unwrap().distortion, [0.1, 0.2, 0.3, 0.4, 0.5]);

        bridge.set_extrinsics([1.0, 0.0, 0.5, 0.0, 0.0, 2.5]).unwrap();
        let e = output.last_extrinsics().unwrap();
        assert_eq!(e.tz, 0.5);
        assert_eq!(e.rz, 2.5);
        assert_eq!(output.extrinsics_writes(), 2);
    }

    #[test]
    fn test_handle_dispatches_requests() {
        let (bridge, _, _) = bridge();
        let outcome = bridge
            .handle(&ControlRequest::Connect { locator: None }, "default")
            .unwrap();
        assert!(matches!(
            outcome,
            RequestOutcome::Connect(ConnectOutcome::Connected(_))
        ));

        let outcome = bridge
            .handle(&ControlRequest::SetFormat { width: 8, height: 6 }, "default")
            .unwrap();
        assert!(matches!(outcome, RequestOutcome::Intrinsics(k) if k.center_x == 4.0));

        let outcome = bridge.handle(&ControlRequest::Disconnect, "default").unwrap();
        assert_eq!(
            outcome,
            RequestOutcome::Disconnect(DisconnectOutcome::Disconnected)
        );
        assert_eq!(bridge.metrics().snapshot().reconfigurations, 3);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (bridge, transport, _) = bridge();
        bridge.connect("cam");
        drop(bridge);
        assert_eq!(transport.subscriptions(), 0);
    }

    #[test]
    fn test_reformat_racing_old_size_ingest() {
        let small = Geometry::new(16, 12);
        let large = Geometry::new(32, 24);
        let (bridge, transport, output) = bridge_with(CameraConfig {
            width: small.width,
            height: small.height,
            ..CameraConfig::default()
        });
        bridge.connect("cam");
        let bridge = Arc::new(bridge);

        let feeder = {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                let mut rng = rand::rng();
                for i in 0..2000u32 {
                    let g = if rng.random_bool(0.5) { small } else { large };
                    let fill = (i % 251) as u8;
                    transport.fire(&vec![fill; g.byte_len().unwrap()], Timestamp::default());
                }
            })
        };

        let reformatter = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || {
                for i in 0..200 {
                    let g = if i % 2 == 0 { large } else { small };
                    bridge.set_format(g.width, g.height).unwrap();
                }
            })
        };

        let mut cycle = bridge.publish_cycle().unwrap();
        for _ in 0..2000 {
            if cycle.tick().unwrap() {
                let frame = output.last_frame().unwrap();
                assert_eq!(frame.pixels.len(), frame.expected_len());
                let first = frame.pixels[0];
                assert!(frame.pixels.iter().all(|&b| b == first));
            }
        }

        feeder.join().unwrap();
        reformatter.join().unwrap();
    }
}
