//! Integration tests against a loopback UDP fake of the MM860.
//!
//! The fake binds an ephemeral localhost port, answers `MMQ` queries from a
//! scripted sequence of status lines (repeating the last one when the
//! script runs out), acknowledges other commands with an `OK` suffix, and
//! records every datagram it receives.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::net::UdpSocket;

use mantelmount::{
    Denied, MountClient, MountCommand, MountConfig, MountDevice, MountError, Preset,
    PresetPosition, RecallError,
};

struct FakeMount {
    addr: SocketAddr,
    received: Arc<StdMutex<Vec<String>>>,
}

impl FakeMount {
    async fn spawn(statuses: Vec<String>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let received = Arc::new(StdMutex::new(Vec::new()));
        let received_clone = received.clone();

        tokio::spawn(async move {
            let mut statuses = statuses.into_iter();
            let mut last: Option<String> = None;
            let mut buf = [0u8; 256];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                let text = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                received_clone.lock().unwrap().push(text.clone());

                let reply = if text == "MMQ" {
                    match statuses.next() {
                        Some(s) => {
                            last = Some(s.clone());
                            s
                        }
                        None => last.clone().unwrap_or_default(),
                    }
                } else {
                    format!("{text}OK")
                };

                if !reply.is_empty() {
                    let _ = socket.send_to(reply.as_bytes(), peer).await;
                }
            }
        });

        Self { addr, received }
    }

    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    fn device(&self) -> MountDevice {
        let mut config = MountConfig::new("127.0.0.1");
        config.port = self.addr.port();
        config.timeout_secs = 1.0;
        MountDevice::new(config)
    }
}

fn status_line(elevation: i32, azimuth: i32, left: i32, right: i32) -> String {
    format!("MMQ1,{elevation},{azimuth},{left},{right},0,42,1,0,312,0,150,0,0,95,97")
}

#[tokio::test]
async fn client_round_trips_a_reply() {
    let fake = FakeMount::spawn(vec![status_line(50, 10, 100, 100)]).await;

    let client = MountClient::new("127.0.0.1", fake.addr.port(), Duration::from_secs(1));
    let resp = client.send("MMQ", true, true).await.unwrap();

    assert_eq!(resp.command, "MMQ");
    assert_eq!(resp.raw, status_line(50, 10, 100, 100));
    assert_eq!(fake.received(), vec!["MMQ".to_string()]);
}

#[tokio::test]
async fn timeout_yields_empty_reply_not_an_error() {
    // A socket that receives but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = silent.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 256];
        loop {
            if silent.recv_from(&mut buf).await.is_err() {
                break;
            }
        }
    });

    let client = MountClient::new("127.0.0.1", addr.port(), Duration::from_millis(100));
    let resp = client.send("MMQ", true, true).await.unwrap();
    assert_eq!(resp.raw, "");
}

#[tokio::test]
async fn fire_and_forget_skips_the_reply_wait() {
    let fake = FakeMount::spawn(vec![]).await;

    let client = MountClient::new("127.0.0.1", fake.addr.port(), Duration::from_secs(1));
    let resp = client.send("MMJ0", false, false).await.unwrap();
    assert_eq!(resp.raw, "");
}

#[tokio::test]
async fn device_parses_an_echo_prefixed_reply() {
    let echoed = format!("MMQ\r\n{}", status_line(50, 10, 100, 100));
    let fake = FakeMount::spawn(vec![echoed]).await;

    let mut device = fake.device();
    let data = device.poll_once().await.unwrap();

    assert!(data.ok);
    assert_eq!(data.status.unwrap().elevation, 50);
}

#[tokio::test]
async fn device_reports_unparseable_reply_as_not_ok() {
    let fake = FakeMount::spawn(vec!["BOGUS".to_string()]).await;

    let mut device = fake.device();
    let data = device.poll_once().await.unwrap();

    assert!(!data.ok);
    assert!(data.status.is_none());
    assert_eq!(data.last_raw, "BOGUS");
}

#[tokio::test]
async fn recall_then_stop_learns_the_preset() {
    let fake = FakeMount::spawn(vec![
        status_line(50, 10, 100, 100),  // cold start
        status_line(60, 20, 150, 130),  // moving
        status_line(120, 45, 200, 180), // moving
        status_line(120, 45, 200, 180), // stopped edge
    ])
    .await;

    let mut device = fake.device();
    let stops = Arc::new(AtomicUsize::new(0));
    let counter = stops.clone();
    device.subscribe_movement_stopped(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    assert!(!device.poll_once().await.unwrap().moving);

    let resp = device
        .send_command(MountCommand::Recall(Preset::M3))
        .await
        .unwrap();
    assert_eq!(resp.raw, "MMR3OK");
    assert_eq!(device.pending_preset(), Some(Preset::M3));

    assert!(device.poll_once().await.unwrap().moving);
    assert!(device.poll_once().await.unwrap().moving);
    let data = device.poll_once().await.unwrap();
    assert!(!data.moving);

    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert_eq!(
        device.learned_presets().get(Preset::M3),
        Some(PresetPosition {
            elevation: 120,
            azimuth: 45
        })
    );
    assert_eq!(device.pending_preset(), None);
    assert_eq!(device.current_preset(), Some(Preset::M3));

    assert_eq!(
        fake.received(),
        vec!["MMQ", "MMR3", "MMQ", "MMQ", "MMQ"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn locked_jog_never_reaches_the_wire() {
    let fake = FakeMount::spawn(vec![
        status_line(50, 10, 100, 100),
        status_line(60, 20, 150, 130), // moving
    ])
    .await;

    let mut device = fake.device();
    device.poll_once().await.unwrap();
    device.poll_once().await.unwrap();
    assert!(device.is_moving());

    let err = device.send_command(MountCommand::JogUp).await.unwrap_err();
    assert!(matches!(err, MountError::Denied(Denied::LockedWhileMoving)));

    // Stop bypasses the lock and clears the pending preset.
    let resp = device.send_command(MountCommand::Stop).await.unwrap();
    assert_eq!(resp.raw, "MMJ0OK");

    let received = fake.received();
    assert!(!received.contains(&"MMJ2".to_string()));
    assert!(received.contains(&"MMJ0".to_string()));
}

#[tokio::test]
async fn busy_recall_sends_nothing() {
    let fake = FakeMount::spawn(vec![
        status_line(50, 10, 100, 100),
        status_line(60, 20, 150, 130), // moving
    ])
    .await;

    let mut device = fake.device();
    device.poll_once().await.unwrap();

    device
        .send_command(MountCommand::Recall(Preset::M1))
        .await
        .unwrap();
    device.poll_once().await.unwrap();
    assert!(device.is_moving());

    let err = device
        .send_command(MountCommand::Recall(Preset::M2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MountError::Recall(RecallError::Busy {
            requested: Preset::M2,
            pending: Preset::M1
        })
    ));

    let received = fake.received();
    assert!(received.contains(&"MMR1".to_string()));
    assert!(!received.contains(&"MMR2".to_string()));
}

#[tokio::test]
async fn raw_send_records_the_command_for_diagnostics() {
    let fake = FakeMount::spawn(vec![]).await;

    let mut device = fake.device();
    device.send_raw("MMC", true, true).await.unwrap();

    let record = device.last_command().unwrap();
    assert_eq!(record.command, "MMC");
    assert_eq!(record.reply, "MMCOK");
}
