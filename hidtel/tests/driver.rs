use std::sync::{Arc, Mutex};

use hidtel::{
    async_trait,
    collection::{CollectionInfo, DeviceInfo, ReportInfo, ReportItem},
    driver::{DriverError, DriverState, HeadsetDriver},
    event::{Diagnostic, FeatureChange, HeadsetEvent},
    transport::{HidTransport, InputReportHandler, TransportError},
    usage::KnownUsage,
};

#[derive(Default)]
struct MockDevice {
    open: bool,
    refuse_open: bool,
    fail_open: bool,
    fail_close: bool,
    fail_send: bool,
    disconnect_on_send: bool,
    sent: Vec<(u8, Vec<u8>)>,
    handler: Option<InputReportHandler>,
}

struct MockTransport {
    collections: Vec<CollectionInfo>,
    device: Arc<Mutex<MockDevice>>,
}

#[async_trait]
impl HidTransport for MockTransport {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            vendor_id: 0x0b0e,
            product_id: 0x245e,
            product_name: "Mock Headset".to_string(),
        }
    }

    fn collections(&self) -> &[CollectionInfo] {
        &self.collections
    }

    fn is_open(&self) -> bool {
        self.device.lock().unwrap().open
    }

    async fn open(&self) -> Result<(), TransportError> {
        let mut device = self.device.lock().unwrap();
        if device.fail_open {
            return Err("permission denied".into());
        }
        device.open = !device.refuse_open;
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut device = self.device.lock().unwrap();
        device.open = false;
        if device.fail_close {
            return Err("close failed".into());
        }
        Ok(())
    }

    async fn send_report(&self, report_id: u8, data: &[u8]) -> Result<(), TransportError> {
        let mut device = self.device.lock().unwrap();
        if device.fail_send {
            if device.disconnect_on_send {
                device.open = false;
            }
            return Err("write failed".into());
        }
        device.sent.push((report_id, data.to_vec()));
        Ok(())
    }

    fn set_input_report_handler(&self, handler: Option<InputReportHandler>) {
        self.device.lock().unwrap().handler = handler;
    }
}

/// Output 0x02 carries the LED indicators, output 0x03 the ringer and input
/// 0x01 the hook switch and mute button.
fn headset() -> Vec<CollectionInfo> {
    let mut collection = CollectionInfo::new(0x0b, 0x05);

    collection.output_reports = vec![
        ReportInfo::new(0x02, vec![
            ReportItem::flags([
                KnownUsage::LedMute.usage(),
                KnownUsage::LedMicrophone.usage(),
                KnownUsage::LedOffHook.usage(),
                KnownUsage::LedRing.usage(),
                KnownUsage::LedHold.usage(),
            ]),
            ReportItem::padding(3),
        ]),
        ReportInfo::new(0x03, vec![
            ReportItem::flags([KnownUsage::TelephonyRinger.usage()]),
            ReportItem::padding(7),
        ]),
    ];
    collection.input_reports = vec![ReportInfo::new(0x01, vec![
        ReportItem::flags([
            KnownUsage::TelephonyHookSwitch.usage(),
            KnownUsage::TelephonyMute.usage(),
        ]),
        ReportItem::padding(6),
    ])];

    vec![collection]
}

fn mock() -> (MockTransport, Arc<Mutex<MockDevice>>) {
    let device = Arc::new(Mutex::new(MockDevice::default()));
    let transport = MockTransport {
        collections: headset(),
        device: Arc::clone(&device),
    };

    (transport, device)
}

async fn ready_driver() -> (HeadsetDriver<MockTransport>, Arc<Mutex<MockDevice>>) {
    let (transport, device) = mock();
    let driver = HeadsetDriver::new(transport);
    driver.init().await.unwrap();

    (driver, device)
}

fn inject(device: &Mutex<MockDevice>, report_id: u8, payload: &[u8]) {
    let device = device.lock().unwrap();
    if let Some(handler) = &device.handler {
        handler(report_id, payload);
    }
}

fn sent(device: &Mutex<MockDevice>) -> Vec<(u8, Vec<u8>)> {
    std::mem::take(&mut device.lock().unwrap().sent)
}

fn feature_changes(rx: &flume::Receiver<HeadsetEvent>) -> Vec<FeatureChange> {
    rx.try_iter()
        .filter_map(|event| match event {
            HeadsetEvent::FeatureChanged(change) => Some(change),
            _ => None,
        })
        .collect()
}

fn diagnostics(rx: &flume::Receiver<HeadsetEvent>) -> Vec<Diagnostic> {
    rx.try_iter()
        .filter_map(|event| match event {
            HeadsetEvent::Diagnostic(diagnostic) => Some(diagnostic),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_init() {
    let (transport, device) = mock();
    let driver = HeadsetDriver::new(transport);
    let rx = driver.listen();

    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert!(driver.output_reports().is_empty());

    driver.init().await.unwrap();

    assert_eq!(driver.state(), DriverState::Ready);
    assert_eq!(driver.input_reports().len(), 1);
    assert_eq!(driver.output_reports().len(), 2);
    assert_eq!(driver.device_info().product_name, "Mock Headset");
    assert!(device.lock().unwrap().handler.is_some());

    let states: Vec<DriverState> = rx
        .try_iter()
        .filter_map(|event| match event {
            HeadsetEvent::StateChanged(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![DriverState::Initializing, DriverState::Ready]);
}

#[tokio::test]
async fn test_init_twice() {
    let (driver, _device) = ready_driver().await;

    assert!(matches!(
        driver.init().await,
        Err(DriverError::InvalidState(DriverState::Ready))
    ));
}

#[tokio::test]
async fn test_open_refused() {
    let (transport, device) = mock();
    device.lock().unwrap().refuse_open = true;
    let driver = HeadsetDriver::new(transport);

    assert!(matches!(driver.init().await, Err(DriverError::OpenFailed)));
    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert!(device.lock().unwrap().handler.is_none());
    assert!(driver.input_reports().is_empty());
    assert!(driver.output_reports().is_empty());

    // The device can be retried once it becomes available.
    device.lock().unwrap().refuse_open = false;
    driver.init().await.unwrap();
    assert_eq!(driver.state(), DriverState::Ready);
}

#[tokio::test]
async fn test_open_error() {
    let (transport, device) = mock();
    device.lock().unwrap().fail_open = true;
    let driver = HeadsetDriver::new(transport);

    assert!(matches!(driver.init().await, Err(DriverError::Transport(_))));
    assert_eq!(driver.state(), DriverState::Uninitialized);
    assert!(driver.input_reports().is_empty());
    assert!(driver.output_reports().is_empty());
}

#[tokio::test]
async fn test_commands_before_init() {
    let (transport, device) = mock();
    let driver = HeadsetDriver::new(transport);

    assert!(matches!(
        driver.ring(true).await,
        Err(DriverError::NotReady(DriverState::Uninitialized))
    ));
    assert!(matches!(
        driver.mute(true).await,
        Err(DriverError::NotReady(DriverState::Uninitialized))
    ));
    assert!(matches!(
        driver.receive_feature_report(0x05).await,
        Err(DriverError::NotReady(DriverState::Uninitialized))
    ));

    assert!(sent(&device).is_empty());
    assert_eq!(driver.feature_state(KnownUsage::LedRing), None);
}

#[tokio::test]
async fn test_ring_fans_out() {
    let (driver, device) = ready_driver().await;

    driver.ring(true).await.unwrap();

    assert_eq!(sent(&device), vec![(0x02, vec![0x08]), (0x03, vec![0x01])]);
    assert_eq!(driver.feature_state(KnownUsage::LedRing), Some(true));
    assert_eq!(driver.feature_state(KnownUsage::TelephonyRinger), Some(true));

    driver.ring(false).await.unwrap();

    assert_eq!(sent(&device), vec![(0x02, vec![0x00]), (0x03, vec![0x00])]);
}

#[tokio::test]
async fn test_mute_sends_shared_report_once() {
    let (driver, device) = ready_driver().await;

    driver.mute(true).await.unwrap();

    assert_eq!(sent(&device), vec![(0x02, vec![0x03])]);
}

#[tokio::test]
async fn test_call_flow() {
    let (driver, device) = ready_driver().await;

    driver.ring(true).await.unwrap();
    sent(&device);

    driver.accept_call().await.unwrap();
    assert_eq!(sent(&device), vec![(0x02, vec![0x04]), (0x03, vec![0x00])]);

    driver.mute(true).await.unwrap();
    assert_eq!(sent(&device), vec![(0x02, vec![0x07])]);

    driver.hold(true).await.unwrap();
    assert_eq!(sent(&device), vec![(0x02, vec![0x17])]);

    driver.hangup().await.unwrap();
    assert_eq!(sent(&device), vec![(0x02, vec![0x00]), (0x03, vec![0x00])]);
    assert_eq!(driver.feature_state(KnownUsage::LedOffHook), Some(false));
}

#[tokio::test]
async fn test_decline_call() {
    let (driver, device) = ready_driver().await;

    driver.ring(true).await.unwrap();
    sent(&device);

    driver.decline_call().await.unwrap();

    assert_eq!(sent(&device), vec![(0x02, vec![0x00]), (0x03, vec![0x00])]);
    assert_eq!(driver.feature_state(KnownUsage::LedOffHook), None);
}

#[tokio::test]
async fn test_feature_not_exposed() {
    let (driver, device) = ready_driver().await;
    let rx = driver.listen();

    driver.online(true).await.unwrap();

    assert!(sent(&device).is_empty());
    assert_eq!(driver.feature_state(KnownUsage::LedOnline), None);
    assert_eq!(diagnostics(&rx), vec![Diagnostic::FeatureNotExposed {
        usage: KnownUsage::LedOnline,
    }]);
}

#[tokio::test]
async fn test_set_feature() {
    let (driver, device) = ready_driver().await;

    driver
        .set_feature(KnownUsage::LedOffHook, true)
        .await
        .unwrap();

    assert_eq!(sent(&device), vec![(0x02, vec![0x04])]);
}

#[tokio::test]
async fn test_send_failure_keeps_state() {
    let (driver, device) = ready_driver().await;
    device.lock().unwrap().fail_send = true;

    assert!(matches!(
        driver.ring(true).await,
        Err(DriverError::Transport(_))
    ));
    assert_eq!(driver.state(), DriverState::Ready);
    assert_eq!(driver.feature_state(KnownUsage::LedRing), Some(true));

    device.lock().unwrap().fail_send = false;
    driver.hold(false).await.unwrap();

    // The ring indicator was stored even though the first send failed.
    assert_eq!(sent(&device), vec![(0x02, vec![0x08])]);
}

#[tokio::test]
async fn test_send_failure_on_lost_device() {
    let (driver, device) = ready_driver().await;
    {
        let mut device = device.lock().unwrap();
        device.fail_send = true;
        device.disconnect_on_send = true;
    }

    assert!(driver.mute(true).await.is_err());
    assert_eq!(driver.state(), DriverState::Closed);
    assert!(matches!(
        driver.mute(false).await,
        Err(DriverError::NotReady(DriverState::Closed))
    ));
}

#[tokio::test]
async fn test_hook_switch() {
    let (driver, device) = ready_driver().await;
    let rx = driver.listen();

    inject(&device, 0x01, &[0x01]);

    assert_eq!(feature_changes(&rx), vec![
        FeatureChange {
            report_id: 0x01,
            usage: KnownUsage::TelephonyHookSwitch,
            previous: None,
            value: true,
        },
        FeatureChange {
            report_id: 0x01,
            usage: KnownUsage::TelephonyMute,
            previous: None,
            value: false,
        },
    ]);
    assert_eq!(
        driver.feature_state(KnownUsage::TelephonyHookSwitch),
        Some(true)
    );

    inject(&device, 0x01, &[0x00]);

    let changes = feature_changes(&rx);
    assert_eq!(changes.len(), 2);
    assert!(changes[0].is_transition());
    assert!(!changes[1].is_transition());
    assert_eq!(
        driver.feature_state(KnownUsage::TelephonyHookSwitch),
        Some(false)
    );
}

#[tokio::test]
async fn test_unsupported_input_report() {
    let (driver, device) = ready_driver().await;
    let rx = driver.listen();

    inject(&device, 0x09, &[0x01]);

    let events: Vec<HeadsetEvent> = rx.try_iter().collect();
    assert_eq!(events, vec![HeadsetEvent::Diagnostic(
        Diagnostic::UnsupportedInputReport { report_id: 0x09 }
    )]);
    assert_eq!(driver.feature_state(KnownUsage::TelephonyHookSwitch), None);
}

#[tokio::test]
async fn test_malformed_input_report() {
    let (driver, device) = ready_driver().await;
    let rx = driver.listen();

    inject(&device, 0x01, &[0x01, 0x00]);

    assert_eq!(diagnostics(&rx), vec![Diagnostic::MalformedInputReport {
        report_id: 0x01,
        expected: 1,
        actual: 2,
    }]);
    assert_eq!(driver.feature_state(KnownUsage::TelephonyHookSwitch), None);
}

#[tokio::test]
async fn test_input_does_not_send() {
    let (driver, device) = ready_driver().await;

    inject(&device, 0x01, &[0x03]);

    assert!(sent(&device).is_empty());
    assert_eq!(driver.feature_state(KnownUsage::TelephonyMute), Some(true));
}

#[tokio::test]
async fn test_close() {
    let (driver, device) = ready_driver().await;
    driver.mute(true).await.unwrap();

    driver.close().await.unwrap();

    assert_eq!(driver.state(), DriverState::Closed);
    assert!(!device.lock().unwrap().open);
    assert!(device.lock().unwrap().handler.is_none());
    assert_eq!(driver.feature_state(KnownUsage::LedMute), None);
    assert!(matches!(
        driver.ring(true).await,
        Err(DriverError::NotReady(DriverState::Closed))
    ));
    assert!(matches!(
        driver.init().await,
        Err(DriverError::InvalidState(DriverState::Closed))
    ));

    driver.close().await.unwrap();
    assert_eq!(driver.state(), DriverState::Closed);
}

#[tokio::test]
async fn test_close_failure() {
    let (driver, device) = ready_driver().await;
    driver.mute(true).await.unwrap();
    device.lock().unwrap().fail_close = true;

    assert!(matches!(
        driver.close().await,
        Err(DriverError::Transport(_))
    ));

    assert_eq!(driver.state(), DriverState::Closed);
    assert!(device.lock().unwrap().handler.is_none());
    assert_eq!(driver.feature_state(KnownUsage::LedMute), None);
}

#[tokio::test]
async fn test_close_uninitialized() {
    let (transport, _device) = mock();
    let driver = HeadsetDriver::new(transport);

    driver.close().await.unwrap();

    assert_eq!(driver.state(), DriverState::Uninitialized);
}

#[tokio::test]
async fn test_drop_removes_handler() {
    let (driver, device) = ready_driver().await;

    drop(driver);

    assert!(device.lock().unwrap().handler.is_none());
}

#[tokio::test]
async fn test_feature_report_unsupported() {
    let (driver, _device) = ready_driver().await;

    assert!(matches!(
        driver.receive_feature_report(0x05).await,
        Err(DriverError::Transport(_))
    ));
}
