//! # Integration Tests
//!
//! Cross-crate end-to-end tests: MockTransport -> CameraBridge -> Dispatcher.

#[cfg(test)]
mod contract_tests {
    use contracts::{BridgeConfig, ControlRequest};

    #[test]
    fn test_default_config_loads() {
        let config = config_loader::ConfigLoader::load_from_str(
            "",
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        assert_eq!(config.camera.width, BridgeConfig::default().camera.width);
        assert_eq!(ControlRequest::Disconnect.op_name(), "disconnect");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        BridgeConfig, FrameTransport, OutputChannel, PublishedRecord, SinkConfig, SinkType,
    };
    use dispatcher::{create_dispatcher, dispatch_channel, RecordReceiver};
    use frame_bridge::{CameraBridge, ConnectOutcome, DisconnectOutcome, MemoryOutput};
    use observability::PublishStats;
    use transport::{MockTransport, MockTransportConfig};

    fn source(width: u16, height: u16, frequency_hz: f64) -> Arc<MockTransport> {
        Arc::new(
            MockTransport::new(MockTransportConfig {
                frequency_hz,
                width,
                height,
                max_frames: None,
            })
            .unwrap(),
        )
    }

    /// Publish until `target` frames went out or `limit` ticks elapsed
    async fn drive(bridge: &CameraBridge, target: u64, limit: u32) -> u64 {
        let mut cycle = bridge.publish_cycle().unwrap();
        let mut published = 0;
        for _ in 0..limit {
            if cycle.tick().unwrap() {
                published += 1;
                if published >= target {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        published
    }

    fn collect_frames(rx: &mut RecordReceiver) -> Vec<PublishedRecord> {
        let mut records = Vec::new();
        while let Some(record) = rx.try_recv() {
            records.push(record);
        }
        records
    }

    /// End-to-end: MockTransport -> CameraBridge -> Dispatcher -> FileSink
    #[tokio::test]
    async fn test_e2e_file_sink_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::default();
        config.camera.width = 8;
        config.camera.height = 4;

        let (output, input_rx) = dispatch_channel(64);
        let output = Arc::new(output);
        let mut params = HashMap::new();
        params.insert(
            "base_path".to_string(),
            dir.path().to_string_lossy().to_string(),
        );
        let sinks = vec![
            SinkConfig {
                name: "disk".to_string(),
                sink_type: SinkType::File,
                queue_capacity: 64,
                params,
            },
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 64,
                params: HashMap::new(),
            },
        ];
        let dispatcher_task = create_dispatcher(sinks, input_rx).await.unwrap().spawn();

        let transport = source(8, 4, 200.0);
        let bridge = CameraBridge::new(
            &config.camera,
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            Arc::clone(&output) as Arc<dyn OutputChannel>,
        )
        .unwrap();
        assert!(matches!(
            bridge.connect(&config.source.locator),
            ConnectOutcome::Connected(_)
        ));

        let published = drive(&bridge, 5, 2000).await;
        assert_eq!(published, 5);
        bridge.set_extrinsics([1.0, 2.0, 3.0, 0.0, 0.0, 0.0]).unwrap();
        bridge.disconnect();

        drop(bridge);
        drop(output);
        let metrics = dispatcher_task.await.unwrap();

        for (_, m) in &metrics {
            assert_eq!(m.frames_written, 5);
            // initial intrinsics + initial extrinsics + set_extrinsics
            assert_eq!(m.calibrations_written, 3);
        }
        let pngs = std::fs::read_dir(dir.path().join("frames")).unwrap().count();
        assert_eq!(pngs, 5);
        let calibration =
            std::fs::read_to_string(dir.path().join("calibration.jsonl")).unwrap();
        assert_eq!(calibration.lines().count(), 3);
    }

    /// Geometry changes mid-stream: frames are rejected until the source follows
    #[tokio::test]
    async fn test_e2e_reformat_mid_stream() {
        let transport = source(16, 8, 250.0);
        let output = Arc::new(MemoryOutput::new());
        let mut config = BridgeConfig::default();
        config.camera.width = 16;
        config.camera.height = 8;
        let bridge = CameraBridge::new(
            &config.camera,
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            Arc::clone(&output) as Arc<dyn OutputChannel>,
        )
        .unwrap();
        bridge.connect("~/cam");
        assert_eq!(drive(&bridge, 2, 2000).await, 2);

        let intrinsics = bridge.set_format(32, 16).unwrap();
        assert!((intrinsics.center_x - 16.0).abs() < 1e-6);
        assert_eq!(output.last_intrinsics(), Some(intrinsics));

        // source still emits 16x8
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(bridge.metrics().snapshot().size_mismatches > 0);
        assert!(!bridge.buffer().has_new_frame());

        transport.set_geometry(32, 16);
        assert_eq!(drive(&bridge, 1, 2000).await, 1);
        let frame = output.last_frame().unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.pixels.len(), 32 * 16 * 3);
    }

    /// Disconnect stops publication; reconnect resumes it
    #[tokio::test]
    async fn test_e2e_disconnect_reconnect() {
        let transport = source(4, 4, 250.0);
        let output = Arc::new(MemoryOutput::new());
        let mut config = BridgeConfig::default();
        config.camera.width = 4;
        config.camera.height = 4;
        let bridge = CameraBridge::new(
            &config.camera,
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            Arc::clone(&output) as Arc<dyn OutputChannel>,
        )
        .unwrap();

        assert!(matches!(bridge.connect("~/cam"), ConnectOutcome::Connected(_)));
        assert_eq!(bridge.connect("~/cam"), ConnectOutcome::AlreadyConnected);
        assert_eq!(drive(&bridge, 1, 2000).await, 1);

        assert_eq!(bridge.disconnect(), DisconnectOutcome::Disconnected);
        assert_eq!(bridge.disconnect(), DisconnectOutcome::AlreadyDisconnected);
        assert_eq!(transport.active_subscriptions(), 0);
        let published_before = output.frame_writes();
        assert_eq!(drive(&bridge, 1, 20).await, 0);
        assert_eq!(output.frame_writes(), published_before);

        assert!(matches!(bridge.connect("~/cam"), ConnectOutcome::Connected(_)));
        assert_eq!(drive(&bridge, 1, 2000).await, 1);
    }

    /// A rejected locator leaves the bridge disconnected
    #[tokio::test]
    async fn test_e2e_connect_failure() {
        let transport = source(4, 4, 100.0);
        transport.reject_locator("~/missing");
        let output = Arc::new(MemoryOutput::new());
        let bridge = CameraBridge::new(
            &BridgeConfig::default().camera,
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            output as Arc<dyn OutputChannel>,
        )
        .unwrap();

        assert!(matches!(
            bridge.connect("~/missing"),
            ConnectOutcome::Failed { .. }
        ));
        assert!(!bridge.is_started());
        assert_eq!(bridge.metrics().snapshot().connect_failures, 1);
    }

    /// Published frames are never torn while the geometry flips under load
    #[tokio::test]
    async fn test_e2e_frames_never_torn() {
        let transport = source(24, 12, 1000.0);
        let (output, mut rx) = dispatch_channel(4096);
        let mut config = BridgeConfig::default();
        config.camera.width = 24;
        config.camera.height = 12;
        let bridge = CameraBridge::new(
            &config.camera,
            Arc::clone(&transport) as Arc<dyn FrameTransport>,
            Arc::new(output) as Arc<dyn OutputChannel>,
        )
        .unwrap();
        bridge.connect("~/cam");

        let mut cycle = bridge.publish_cycle().unwrap();
        let mut stats = PublishStats::new();
        for i in 0..400u32 {
            if i % 50 == 25 {
                let (w, h) = if (i / 50) % 2 == 0 { (12, 6) } else { (24, 12) };
                bridge.set_format(w, h).unwrap();
                transport.set_geometry(w, h);
            }
            if cycle.tick().unwrap() {
                stats.update(cycle.port(), contracts::Timestamp::now());
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        bridge.disconnect();

        let frames: Vec<_> = collect_frames(&mut rx)
            .into_iter()
            .filter_map(|r| match r {
                PublishedRecord::Frame(f) => Some(f),
                _ => None,
            })
            .collect();
        assert!(!frames.is_empty());
        assert_eq!(frames.len() as u64, stats.summary().frames);
        for frame in &frames {
            let expected = usize::from(frame.width) * usize::from(frame.height) * 3;
            assert_eq!(frame.pixels.len(), expected);
            let first = frame.pixels[0];
            assert!(frame.pixels.iter().all(|b| *b == first), "torn frame");
        }
    }

    /// Configuration file drives the initial calibration
    #[tokio::test]
    async fn test_e2e_config_to_calibration() {
        let content = r#"
[camera]
width = 640
height = 480
hfov = 1.5707964
extrinsics = [0.0, 0.0, 1.5, 0.0, 0.0, 0.0]
"#;
        let config = config_loader::ConfigLoader::load_from_str(
            content,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let output = Arc::new(MemoryOutput::new());
        let _bridge = CameraBridge::new(
            &config.camera,
            Arc::new(MockTransport::with_defaults()),
            Arc::clone(&output) as Arc<dyn OutputChannel>,
        )
        .unwrap();

        let intrinsics = output.last_intrinsics().unwrap();
        // fx = (w/2) / tan(hfov/2) = 320 for a 90 degree field of view
        assert!((intrinsics.focal_x - 320.0).abs() < 1e-3);
        assert_eq!(intrinsics.focal_x, intrinsics.focal_y);
        assert!((intrinsics.center_y - 240.0).abs() < 1e-6);
        assert!((output.last_extrinsics().unwrap().tz - 1.5).abs() < 1e-6);
    }
}
