// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Handshake progress reporting
//!
//! The handshake reports progress through a [Reporter], allowing the CLI to
//! log to the console and tests to record events for assertions.

use std::{path::Path, time::Duration};

use log::{debug, error, info};
use serde::Serialize;

use tkey_x25519_proto::{DeviceIdentity, X25519_LEN};

use crate::{handshake::HandshakeState, handshake::Phase, ident::DeviceMode, Error, Outcome};

/// Receiver for handshake progress events, all methods default to no-ops
pub trait Reporter: Send {
    /// Handshake state transition
    fn state(&mut self, _state: HandshakeState) {}

    /// Device mode determined, with the firmware identity where available
    fn mode(&mut self, _mode: DeviceMode, _ident: Option<&DeviceIdentity>) {}

    /// Application load starting
    fn loading(&mut self, _size: usize) {}

    /// Verified application identity
    fn app(&mut self, _ident: &DeviceIdentity) {}

    /// Touch required for the following device call
    fn touch_required(&mut self, _phase: Phase) {}

    /// Host public key generated
    fn host_public(&mut self, _key: &[u8; X25519_LEN]) {}

    /// Device public key received
    fn device_public(&mut self, _key: &[u8; X25519_LEN]) {}

    /// Phase completed with the provided elapsed time
    fn phase_complete(&mut self, _phase: Phase, _elapsed: Duration) {}

    /// Run complete
    fn outcome(&mut self, _outcome: &Outcome) {}
}

/// [Reporter] discarding all events
impl Reporter for () {}

/// Composite [Reporter], forwarding events to both members
impl<A: Reporter, B: Reporter> Reporter for (A, B) {
    fn state(&mut self, state: HandshakeState) {
        self.0.state(state);
        self.1.state(state);
    }

    fn mode(&mut self, mode: DeviceMode, ident: Option<&DeviceIdentity>) {
        self.0.mode(mode, ident);
        self.1.mode(mode, ident);
    }

    fn loading(&mut self, size: usize) {
        self.0.loading(size);
        self.1.loading(size);
    }

    fn app(&mut self, ident: &DeviceIdentity) {
        self.0.app(ident);
        self.1.app(ident);
    }

    fn touch_required(&mut self, phase: Phase) {
        self.0.touch_required(phase);
        self.1.touch_required(phase);
    }

    fn host_public(&mut self, key: &[u8; X25519_LEN]) {
        self.0.host_public(key);
        self.1.host_public(key);
    }

    fn device_public(&mut self, key: &[u8; X25519_LEN]) {
        self.0.device_public(key);
        self.1.device_public(key);
    }

    fn phase_complete(&mut self, phase: Phase, elapsed: Duration) {
        self.0.phase_complete(phase, elapsed);
        self.1.phase_complete(phase, elapsed);
    }

    fn outcome(&mut self, outcome: &Outcome) {
        self.0.outcome(outcome);
        self.1.outcome(outcome);
    }
}

/// Touch prompt for the provided phase.
///
/// Only the shared secret computation is always touch gated by the app,
/// public key requests wait for touch only where the device is so configured.
pub fn touch_prompt(phase: Phase) -> String {
    match phase {
        Phase::SharedSecret => format!("tkey will flash when touch is required ({phase})..."),
        _ => format!("touch the tkey if it flashes ({phase})..."),
    }
}

/// [Reporter] writing progress to the log
#[derive(Clone, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn state(&mut self, state: HandshakeState) {
        debug!("Handshake state: {state}");
    }

    fn mode(&mut self, mode: DeviceMode, ident: Option<&DeviceIdentity>) {
        match (mode, ident) {
            (DeviceMode::Firmware, Some(i)) => {
                info!("Device is in firmware mode ({i}). Loading app...")
            }
            (_, Some(i)) => info!("Device not in firmware mode ({i})"),
            (_, None) => info!("Device not in firmware mode"),
        }
    }

    fn loading(&mut self, size: usize) {
        debug!("Loading {size} byte app");
    }

    fn app(&mut self, ident: &DeviceIdentity) {
        info!("Running app: {ident}");
    }

    fn touch_required(&mut self, phase: Phase) {
        info!("{}", touch_prompt(phase));
    }

    fn host_public(&mut self, key: &[u8; X25519_LEN]) {
        info!("host pub: {}", hex::encode(key));
    }

    fn device_public(&mut self, key: &[u8; X25519_LEN]) {
        info!("tkey pub: {}", hex::encode(key));
    }

    fn phase_complete(&mut self, phase: Phase, elapsed: Duration) {
        info!("tkey {phase} took {elapsed:?}");
    }

    fn outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::DeviceError(e) => error!("Run failed: {e}"),
            o => debug!("Outcome: {o}"),
        }
    }
}

/// Per-phase timing record
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub elapsed_ms: u64,
}

/// Machine readable run report, recorded via [Reporter].
///
/// Shared secrets are never recorded.
#[derive(Clone, PartialEq, Debug, Default, Serialize)]
pub struct RunReport {
    pub mode: Option<DeviceMode>,
    pub firmware: Option<String>,
    pub app: Option<String>,
    pub loaded: Option<usize>,
    pub host_public: Option<String>,
    pub device_public: Option<String>,
    pub touch_prompts: Vec<Phase>,
    pub states: Vec<HandshakeState>,
    pub phases: Vec<PhaseTiming>,
    pub outcome: Option<String>,
    pub success: bool,
}

impl RunReport {
    /// Write the report to a file as JSON
    pub async fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let s = serde_json::to_vec_pretty(self).map_err(std::io::Error::from)?;

        tokio::fs::write(path, s).await?;

        Ok(())
    }
}

impl Reporter for RunReport {
    fn state(&mut self, state: HandshakeState) {
        self.states.push(state);
    }

    fn mode(&mut self, mode: DeviceMode, ident: Option<&DeviceIdentity>) {
        self.mode = Some(mode);
        self.firmware = ident.map(|i| i.to_string());
    }

    fn loading(&mut self, size: usize) {
        self.loaded = Some(size);
    }

    fn app(&mut self, ident: &DeviceIdentity) {
        self.app = Some(ident.to_string());
    }

    fn touch_required(&mut self, phase: Phase) {
        self.touch_prompts.push(phase);
    }

    fn host_public(&mut self, key: &[u8; X25519_LEN]) {
        self.host_public = Some(hex::encode(key));
    }

    fn device_public(&mut self, key: &[u8; X25519_LEN]) {
        self.device_public = Some(hex::encode(key));
    }

    fn phase_complete(&mut self, phase: Phase, elapsed: Duration) {
        self.phases.push(PhaseTiming {
            phase,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    fn outcome(&mut self, outcome: &Outcome) {
        self.success = matches!(outcome, Outcome::Success);
        self.outcome = Some(outcome.to_string());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_json() {
        let mut r = (LogReporter, RunReport::default());

        r.host_public(&[0x11; 32]);
        r.touch_required(Phase::SharedSecret);
        r.phase_complete(Phase::SharedSecret, Duration::from_millis(12));
        r.outcome(&Outcome::Success);

        let v = serde_json::to_value(&r.1).unwrap();

        assert_eq!(v["host_public"], hex::encode([0x11; 32]));
        assert_eq!(v["touch_prompts"][0], "SharedSecret");
        assert_eq!(v["phases"][0]["elapsed_ms"], 12);
        assert_eq!(v["success"], true);
    }

    #[test]
    fn touch_prompts() {
        assert_eq!(
            touch_prompt(Phase::SharedSecret),
            "tkey will flash when touch is required (DoECDH)..."
        );

        // Public key requests are not always touch gated
        let p = touch_prompt(Phase::PublicKey);
        assert!(!p.contains("will flash"), "{p}");
        assert!(p.contains("GetPubKey"), "{p}");
    }
}
