#![allow(unused)]

use std::str::FromStr;

use log::{debug, LevelFilter};
use simplelog::SimpleLogger;
use tokio::io::DuplexStream;

use tkey_sim::{SimHandle, SimOptions};
use tkey_x25519::{transport::FramedTransport, DeviceHandle};

/// Device handle connected to an in-memory simulator
pub type SimDevice = DeviceHandle<FramedTransport<DuplexStream>>;

/// Setup logging, level set via `LOG_LEVEL`
pub fn log_init() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Setup logging and an in-memory simulator with the provided options
pub fn setup(opts: SimOptions) -> (SimHandle, SimDevice) {
    log_init();

    // Start simulator
    let (h, s) = tkey_sim::connect(opts);

    (h, DeviceHandle::from(FramedTransport::new(s)))
}

/// Touch the simulated device once it is waiting for a touch
pub async fn touch(h: &SimHandle) {
    touch_pending(h).await;

    debug!("Touch device");
    h.touch();
}

/// Resolve once the simulator has released its host connection
pub async fn disconnected(h: &SimHandle) {
    while h.is_connected() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

/// Check the host released the simulator connection
pub async fn assert_released(h: &SimHandle) {
    tokio::time::timeout(std::time::Duration::from_secs(2), disconnected(h))
        .await
        .expect("simulator connection not released");
}

/// Resolve once the simulator is waiting for a touch
pub async fn touch_pending(h: &SimHandle) {
    while !h.touch_pending() {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
