// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device identity probing and mode classification

use log::{debug, warn};
use serde::Serialize;
use strum::Display;

use tkey_x25519_proto::{
    ident::{APP_NAME, FW_NAME},
    DeviceIdentity,
};

use crate::{Device, Error};

/// Device operating mode
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, Serialize)]
pub enum DeviceMode {
    /// Not the firmware, application not yet checked
    Unknown,
    /// Firmware running, awaiting application load
    Firmware,
    /// Expected x25519 application running
    Application,
}

/// Classify the device mode from a firmware identity probe (version ignored)
pub fn classify_mode(ident: &DeviceIdentity) -> DeviceMode {
    match ident.has_name(&FW_NAME) {
        true => DeviceMode::Firmware,
        false => DeviceMode::Unknown,
    }
}

/// Check an application identity matches the x25519 app (version ignored)
pub fn is_expected_application(ident: &DeviceIdentity) -> bool {
    ident.has_name(&APP_NAME)
}

/// Probe the firmware identity.
///
/// Returns `Ok(None)` where the device did not answer as the firmware
/// (end of stream, read timeout or not-OK frame status).
pub async fn probe_firmware<D: Device + ?Sized>(
    d: &mut D,
) -> Result<Option<DeviceIdentity>, Error> {
    indeterminate("firmware", d.firmware_identity().await)
}

/// Probe the application identity.
///
/// Returns `Ok(None)` where the device did not answer as an application.
pub async fn probe_application<D: Device + ?Sized>(
    d: &mut D,
) -> Result<Option<DeviceIdentity>, Error> {
    indeterminate("application", d.app_identity().await)
}

fn indeterminate(
    target: &str,
    r: Result<DeviceIdentity, Error>,
) -> Result<Option<DeviceIdentity>, Error> {
    match r {
        Ok(i) => {
            debug!("{target} identity: {i}");
            Ok(Some(i))
        }
        Err(e) if e.is_transient() => {
            debug!("{target} probe indeterminate: {e}");
            Ok(None)
        }
        Err(e) => {
            warn!("{target} probe failed: {e}");
            Err(e)
        }
    }
}
