use super::*;
use crate::config::{CameraConfig, CamkeeperConfig};
use crate::error::{CamkeeperError, StartError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn create_test_camera_config() -> CameraConfig {
    let mut config = CamkeeperConfig::default().camera;
    config.device = "/dev/camkeeper-test-missing".to_string();
    config.capture_binary = "camkeeper-test-missing-helper".to_string();
    config.stop_grace_secs = 1;
    config
}

/// Probe answering from fixed sets instead of the real system
#[derive(Default)]
struct FakeProbe {
    devices: HashSet<PathBuf>,
    binaries: HashSet<String>,
}

impl FakeProbe {
    fn with_device(mut self, path: &str) -> Self {
        self.devices.insert(PathBuf::from(path));
        self
    }

    fn with_binary(mut self, name: &str) -> Self {
        self.binaries.insert(name.to_string());
        self
    }
}

impl DeviceProbe for FakeProbe {
    fn device_exists(&self, path: &Path) -> bool {
        self.devices.contains(path)
    }

    fn find_binary(&self, name: &str) -> Option<PathBuf> {
        self.binaries
            .contains(name)
            .then(|| PathBuf::from("/usr/bin").join(name))
    }
}

async fn wait_for_exit(process: &mut CaptureProcess) -> Option<String> {
    for _ in 0..100 {
        if let Some(exit) = process.poll_exit() {
            return Some(exit);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

#[tokio::test]
async fn test_stop_before_start_is_noop_for_every_variant() {
    let config = Arc::new(create_test_camera_config());

    for mut backend in [
        CameraBackend::pi(Arc::clone(&config)),
        CameraBackend::usb(Arc::clone(&config)),
        CameraBackend::null(Arc::clone(&config)),
    ] {
        backend.stop().await;
        backend.stop().await;

        assert!(!backend.is_running());
        assert!(!backend.is_alive());
        assert!(backend.describe().pids.is_empty());
    }
}

#[tokio::test]
async fn test_null_backend_starts_without_capturing() {
    let mut backend = CameraBackend::null(Arc::new(create_test_camera_config()));

    backend.start().await.unwrap();

    assert!(!backend.is_running());
    assert!(!backend.is_alive());

    let info = backend.describe();
    assert_eq!(info.kind, BackendKind::Null);
    assert_eq!(info.rtsp_url, None);
    assert_eq!(info.last_frame_at, None);
}

#[tokio::test]
async fn test_usb_start_without_device_fails() {
    let mut backend = CameraBackend::usb(Arc::new(create_test_camera_config()));

    let err = backend.start().await.unwrap_err();

    assert!(matches!(err, StartError::DeviceNotFound { .. }));
    assert!(!backend.is_running());
}

#[tokio::test]
async fn test_usb_start_without_encoder_fails() {
    let device = tempfile::NamedTempFile::new().unwrap();
    let mut config = create_test_camera_config();
    config.device = device.path().to_string_lossy().to_string();
    config.encoder_binary = "camkeeper-test-missing-encoder".to_string();

    let mut backend = CameraBackend::usb(Arc::new(config));
    let err = backend.start().await.unwrap_err();

    match err {
        StartError::BinaryMissing { binary } => {
            assert_eq!(binary, "camkeeper-test-missing-encoder");
        }
        other => panic!("Expected BinaryMissing, got {}", other),
    }
}

#[tokio::test]
async fn test_pi_start_without_helper_fails() {
    let mut backend = CameraBackend::pi(Arc::new(create_test_camera_config()));

    let err = backend.start().await.unwrap_err();

    assert!(matches!(err, StartError::BinaryMissing { .. }));
    assert!(!backend.is_running());
}

#[tokio::test]
async fn test_usb_backend_detects_encoder_exit() {
    // `sleep` rejects the encoder arguments and exits right away
    let Some(sleep) = find_executable("sleep") else {
        println!("sleep not available - skipping");
        return;
    };

    let device = tempfile::NamedTempFile::new().unwrap();
    let mut config = create_test_camera_config();
    config.device = device.path().to_string_lossy().to_string();
    config.encoder_binary = sleep.to_string_lossy().to_string();

    let mut backend = CameraBackend::usb(Arc::new(config));
    backend.start().await.unwrap();

    assert!(backend.is_running());
    let info = backend.describe();
    assert_eq!(info.pids.len(), 1);
    assert!(info.last_frame_at.is_some());

    let mut alive = true;
    for _ in 0..100 {
        if !backend.is_alive() {
            alive = false;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(!alive, "encoder should have exited");
    assert!(!backend.is_running());
    assert!(backend.describe().last_exit.is_some());

    backend.stop().await;
    assert!(!backend.is_running());
}

#[test]
fn test_replacement_is_fresh() {
    let backend = CameraBackend::usb(Arc::new(create_test_camera_config()));
    let fresh = backend.replacement();

    assert_eq!(fresh.kind(), BackendKind::Usb);
    assert!(!fresh.is_running());
    assert_eq!(fresh.config().device, backend.config().device);
}

#[test]
fn test_factory_explicit_kinds() {
    let factory = BackendFactory::with_probe(FakeProbe::default());
    let mut config = create_test_camera_config();

    config.kind = "none".to_string();
    assert_eq!(factory.create(&config).unwrap().kind(), BackendKind::Null);

    // Device existence is deferred to start()
    config.kind = "usb".to_string();
    assert_eq!(factory.create(&config).unwrap().kind(), BackendKind::Usb);

    config.kind = "pi".to_string();
    let err = factory.create(&config).err().unwrap();
    assert!(matches!(err, CamkeeperError::InvalidConfig { .. }));

    let factory = BackendFactory::with_probe(
        FakeProbe::default().with_binary("camkeeper-test-missing-helper"),
    );
    assert_eq!(factory.create(&config).unwrap().kind(), BackendKind::Pi);
}

#[test]
fn test_factory_rejects_unknown_kind() {
    let factory = BackendFactory::with_probe(FakeProbe::default());
    let mut config = create_test_camera_config();
    config.kind = "thermal".to_string();

    let err = factory.create(&config).err().unwrap();
    assert!(!err.is_recoverable());
}

#[test]
fn test_factory_auto_prefers_usb() {
    let config = create_test_camera_config();

    let both = FakeProbe::default()
        .with_device("/dev/camkeeper-test-missing")
        .with_binary("camkeeper-test-missing-helper");
    let factory = BackendFactory::with_probe(both);
    assert_eq!(factory.create(&config).unwrap().kind(), BackendKind::Usb);

    let helper_only = FakeProbe::default().with_binary("camkeeper-test-missing-helper");
    let factory = BackendFactory::with_probe(helper_only);
    assert_eq!(factory.create(&config).unwrap().kind(), BackendKind::Pi);
}

#[tokio::test]
async fn test_factory_auto_falls_back_to_null() {
    let factory = BackendFactory::with_probe(FakeProbe::default());
    let config = create_test_camera_config();

    let mut backend = factory.create(&config).unwrap();
    assert_eq!(backend.kind(), BackendKind::Null);

    backend.start().await.unwrap();
    assert!(!backend.is_running());
}

#[test]
fn test_usb_command_line() {
    let mut config = create_test_camera_config();
    config.device = "/dev/video2".to_string();
    config.resolution = (640, 480);
    config.fps = 15;
    config.bitrate = 2_000_000;

    let stages = usb_pipeline(&config);
    assert_eq!(stages.len(), 1);

    let encoder = &stages[0];
    assert_eq!(encoder.program, "ffmpeg");
    assert!(encoder.args.windows(2).any(|w| w == ["-i", "/dev/video2"]));
    assert!(encoder.args.windows(2).any(|w| w == ["-video_size", "640x480"]));
    assert!(encoder.args.windows(2).any(|w| w == ["-framerate", "15"]));
    assert!(encoder.args.windows(2).any(|w| w == ["-b:v", "2000000"]));
    assert_eq!(
        encoder.args.last().map(String::as_str),
        Some("rtsp://127.0.0.1:8554/camera")
    );
}

#[test]
fn test_pi_command_line() {
    let config = create_test_camera_config();

    let stages = pi_pipeline(&config);
    assert_eq!(stages.len(), 2);

    let capture = &stages[0];
    assert_eq!(capture.program, "camkeeper-test-missing-helper");
    assert!(capture.args.windows(2).any(|w| w == ["--width", "1280"]));
    assert!(capture.args.windows(2).any(|w| w == ["-o", "-"]));

    let encoder = &stages[1];
    assert!(encoder.args.windows(2).any(|w| w == ["-i", "pipe:0"]));
    assert!(encoder.to_string().starts_with("ffmpeg "));
}

#[tokio::test]
async fn test_capture_process_terminates_gracefully() {
    let mut process = match CaptureProcess::spawn(&[CommandSpec::new("sleep").arg("30")]) {
        Ok(process) => process,
        Err(e) => {
            println!("sleep not available ({}) - skipping", e);
            return;
        }
    };

    assert!(process.is_alive());
    assert_eq!(process.pids().len(), 1);

    tokio::time::timeout(Duration::from_secs(5), process.terminate(Duration::from_secs(2)))
        .await
        .expect("terminate should finish within the grace period");

    assert!(!process.is_alive());
    assert!(process.pids().is_empty());
}

#[tokio::test]
async fn test_capture_process_pipes_stages() {
    let specs = [
        CommandSpec::new("sh").args(["-c", "echo frame"]),
        CommandSpec::new("cat"),
    ];
    let mut process = match CaptureProcess::spawn(&specs) {
        Ok(process) => process,
        Err(e) => {
            println!("sh/cat not available ({}) - skipping", e);
            return;
        }
    };

    assert!(wait_for_exit(&mut process).await.is_some());
    process.terminate(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_capture_process_spawn_failure() {
    let result = CaptureProcess::spawn(&[CommandSpec::new("/nonexistent/camkeeper-encoder")]);

    match result {
        Err(StartError::Spawn { program, .. }) => {
            assert_eq!(program, "/nonexistent/camkeeper-encoder");
        }
        Err(other) => panic!("Expected spawn error, got {}", other),
        Ok(_) => panic!("Expected spawn error"),
    }
}

#[test]
fn test_find_executable() {
    assert!(find_executable("").is_none());
    assert!(find_executable("camkeeper-test-missing-helper").is_none());
    assert!(find_executable("/nonexistent/ffmpeg").is_none());
}
