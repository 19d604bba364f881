// Copyright (c) 2022-2023 The MobileCoin Foundation

//! The [Engine] models a TKey device running the firmware and x25519 app.
//!
//! This handles [Event] inputs and returns [Output] responses to the caller,
//! see [proto][crate::proto] for frame / protocol encodings.

use alloc::vec::Vec;

use strum::Display;
use x25519_dalek::{x25519, X25519_BASEPOINT_BYTES};
use zeroize::Zeroize;

use tkey_x25519_proto::{
    app::AppCode,
    fw::{MAX_APP_SIZE, USS_LEN},
    ident::{APP_NAME, APP_VERSION, FW_NAME},
    DeviceIdentity, FrameHeader, ProtocolParams, Status, X25519_LEN,
};

mod event;
pub use event::Event;

mod output;
pub use output::Output;

mod error;
pub use error::Error;

pub mod keys;
use keys::{blake2s, derive_cdi, derive_secret};

/// Firmware version reported by the engine
pub const FW_VERSION: u32 = 5;

/// Default unique device secret, for reproducible simulation
pub const DEFAULT_UDS: [u8; 32] = [0x5a; 32];

/// Engine internal state enumeration
#[derive(Copy, Clone, PartialEq, Debug, Display)]
pub enum State {
    /// Firmware running, awaiting application load
    Firmware,
    /// Application load in progress
    Loading,
    /// Application running
    App,
}

bitflags::bitflags! {
    /// Faults injected into device responses, for exercising host error paths
    #[derive(Default)]
    pub struct Faults: u8 {
        /// Flip a byte of computed shared secrets
        const CORRUPT_SHARED = 1 << 0;
        /// Respond to public key requests with a low order point
        const LOW_ORDER_PUBKEY = 1 << 1;
        /// Reject application loads
        const REJECT_LOAD = 1 << 2;
    }
}

/// [Engine] configuration
#[derive(Clone, PartialEq, Debug)]
pub struct Options {
    /// Unique device secret
    pub uds: [u8; 32],
    /// Identity reported by the firmware
    pub fw_ident: DeviceIdentity,
    /// Identity reported by loaded applications
    pub app_ident: DeviceIdentity,
    /// Key derivation parameters
    pub params: ProtocolParams,
    /// Injected faults
    pub faults: Faults,
    /// Require touch for public key requests as well as shared secret computation
    pub touch_on_pubkey: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            uds: DEFAULT_UDS,
            fw_ident: DeviceIdentity::new(FW_NAME.0, FW_NAME.1, FW_VERSION),
            app_ident: DeviceIdentity::new(APP_NAME.0, APP_NAME.1, APP_VERSION),
            params: ProtocolParams::V1,
            faults: Faults::empty(),
            touch_on_pubkey: false,
        }
    }
}

/// Request counters, for test assertions
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct Stats {
    pub fw_name_version: usize,
    pub load_app: usize,
    pub load_app_data: usize,
    pub app_name_version: usize,
    pub get_pubkey: usize,
    pub do_ecdh: usize,
}

/// [Engine] provides a hardware-independent model of the TKey firmware and x25519 app
pub struct Engine {
    state: State,
    opts: Options,

    image: Vec<u8>,
    image_size: usize,
    uss: Option<[u8; USS_LEN]>,

    cdi: [u8; 32],

    stats: Stats,
}

impl Engine {
    /// Create a new engine in firmware mode with the provided options
    pub fn new(opts: Options) -> Self {
        Self {
            state: State::Firmware,
            opts,
            image: Vec::new(),
            image_size: 0,
            uss: None,
            cdi: [0u8; 32],
            stats: Stats::default(),
        }
    }

    /// Fetch current engine state
    pub fn state(&self) -> State {
        self.state
    }

    /// Fetch request counters
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Fetch key derivation parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.opts.params
    }

    /// Update injected faults
    pub fn set_faults(&mut self, faults: Faults) {
        self.opts.faults = faults;
    }

    /// Reset to firmware mode, as on unplugging the device
    pub fn reset(&mut self) {
        #[cfg(feature = "log")]
        log::debug!("reset");

        self.state = State::Firmware;
        self.image.zeroize();
        self.image.clear();
        self.image_size = 0;
        self.uss.zeroize();
        self.cdi.zeroize();
    }

    /// Check whether an event must wait for a physical touch before [Engine::update]
    pub fn touch_required(&self, evt: &Event) -> bool {
        if self.state != State::App {
            return false;
        }

        match evt {
            Event::AppDoEcdh { args, .. } => args.require_touch,
            Event::AppGetPubkey { args } => self.opts.touch_on_pubkey && args.require_touch,
            _ => false,
        }
    }

    /// Decode a request frame, update the engine and encode the response,
    /// returning the response length.
    ///
    /// Touch requirements are treated as already satisfied.
    pub fn handle(
        &mut self,
        hdr: &FrameHeader,
        payload: &[u8],
        resp: &mut [u8],
    ) -> Result<usize, Error> {
        let out = match Event::parse(hdr, payload, &self.opts.params) {
            Ok(evt) => self.update(&evt)?,
            Err(_e) => {
                #[cfg(feature = "log")]
                log::debug!("parse failed: {:?}", _e);
                Output::Nok
            }
        };

        let n = out.encode(hdr, resp)?;

        Ok(n)
    }

    /// Handle incoming events
    pub fn update(&mut self, evt: &Event) -> Result<Output, Error> {
        #[cfg(feature = "log")]
        log::debug!("event: {:02x?} (state: {})", evt, self.state);

        // Firmware and application each refuse frames for the other endpoint
        if evt.is_firmware() == (self.state == State::App) {
            return Ok(Output::Nok);
        }

        let out = match evt {
            Event::FwNameVersion => {
                self.stats.fw_name_version += 1;
                Output::FwNameVersion(self.opts.fw_ident)
            }

            Event::FwLoadApp { size, uss } => {
                self.stats.load_app += 1;
                self.load_start(*size as usize, *uss)
            }

            Event::FwLoadAppData { data } => {
                self.stats.load_app_data += 1;
                self.load_data(data)
            }

            Event::AppNameVersion => {
                self.stats.app_name_version += 1;
                Output::AppNameVersion(self.opts.app_ident)
            }

            Event::AppGetPubkey { args } => {
                self.stats.get_pubkey += 1;

                let secret = derive_secret(args, &self.cdi);
                let mut public_key = x25519(*secret, X25519_BASEPOINT_BYTES);

                if self.opts.faults.contains(Faults::LOW_ORDER_PUBKEY) {
                    public_key = [0u8; X25519_LEN];
                }

                Output::AppPubkey {
                    status: Status::Ok,
                    public_key,
                }
            }

            Event::AppDoEcdh { args, peer } => {
                self.stats.do_ecdh += 1;

                let secret = derive_secret(args, &self.cdi);
                let mut shared = x25519(*secret, *peer);

                if self.opts.faults.contains(Faults::CORRUPT_SHARED) {
                    shared[0] ^= 0xff;
                }

                Output::AppShared {
                    status: Status::Ok,
                    shared,
                }
            }

            Event::AppBadLength { code } => match code {
                AppCode::DoEcdhReq => Output::AppShared {
                    status: Status::Bad,
                    shared: [0u8; X25519_LEN],
                },
                _ => Output::AppPubkey {
                    status: Status::Bad,
                    public_key: [0u8; X25519_LEN],
                },
            },

            Event::AppUnknown { .. } => Output::AppUnknown,
        };

        Ok(out)
    }

    fn load_start(&mut self, size: usize, uss: Option<[u8; USS_LEN]>) -> Output {
        if self.opts.faults.contains(Faults::REJECT_LOAD) || size == 0 || size > MAX_APP_SIZE {
            return Output::FwLoadApp(Status::Bad);
        }

        self.image.clear();
        self.image.reserve(size);
        self.image_size = size;
        self.uss = uss;
        self.state = State::Loading;

        Output::FwLoadApp(Status::Ok)
    }

    fn load_data(&mut self, data: &[u8]) -> Output {
        if self.state != State::Loading {
            return Output::FwLoadAppData(Status::Bad);
        }

        let n = (self.image_size - self.image.len()).min(data.len());
        self.image.extend_from_slice(&data[..n]);

        if self.image.len() < self.image_size {
            return Output::FwLoadAppData(Status::Ok);
        }

        // Image complete, derive CDI and start the app
        let digest = blake2s(&[&self.image]);
        self.cdi = derive_cdi(&self.opts.uds, &digest, self.uss.as_ref());

        self.image.zeroize();
        self.image.clear();
        self.uss.zeroize();
        self.state = State::App;

        #[cfg(feature = "log")]
        log::debug!("app loaded ({} bytes)", self.image_size);

        Output::FwLoadAppReady {
            status: Status::Ok,
            digest,
        }
    }
}

#[cfg(test)]
mod test {
    use tkey_x25519_proto::{app::KeyArgs, fw::LOAD_CHUNK_LEN};

    use super::*;

    fn load(e: &mut Engine, image: &[u8]) -> [u8; 32] {
        let r = e.update(&Event::FwLoadApp {
            size: image.len() as u32,
            uss: None,
        });
        assert_eq!(r, Ok(Output::FwLoadApp(Status::Ok)));

        let mut chunk = [0u8; LOAD_CHUNK_LEN];
        for (i, c) in image.chunks(LOAD_CHUNK_LEN).enumerate() {
            chunk.fill(0);
            chunk[..c.len()].copy_from_slice(c);

            match e.update(&Event::FwLoadAppData { data: &chunk }).unwrap() {
                Output::FwLoadAppData(Status::Ok) => (),
                Output::FwLoadAppReady { status, digest } => {
                    assert_eq!(status, Status::Ok);
                    assert_eq!(i, (image.len() - 1) / LOAD_CHUNK_LEN, "early ready");
                    return digest;
                }
                o => panic!("unexpected output: {o:?}"),
            }
        }

        panic!("load did not complete");
    }

    #[test]
    fn load_app() {
        let mut e = Engine::new(Options::default());
        assert_eq!(e.state(), State::Firmware);

        let image = [0xa5u8; 300];
        let digest = load(&mut e, &image);

        assert_eq!(digest, blake2s(&[&image]));
        assert_eq!(e.state(), State::App);
        assert_eq!(e.stats().load_app_data, 3);
    }

    #[test]
    fn endpoint_routing() {
        let mut e = Engine::new(Options::default());

        // App requests refused in firmware mode
        assert_eq!(e.update(&Event::AppNameVersion), Ok(Output::Nok));

        load(&mut e, &[1, 2, 3]);

        // Firmware requests refused in app mode
        assert_eq!(e.update(&Event::FwNameVersion), Ok(Output::Nok));
        assert_eq!(
            e.update(&Event::AppNameVersion),
            Ok(Output::AppNameVersion(Options::default().app_ident))
        );
    }

    #[test]
    fn oversized_load_rejected() {
        let mut e = Engine::new(Options::default());

        let r = e.update(&Event::FwLoadApp {
            size: MAX_APP_SIZE as u32 + 1,
            uss: None,
        });

        assert_eq!(r, Ok(Output::FwLoadApp(Status::Bad)));
        assert_eq!(e.state(), State::Firmware);
    }

    #[test]
    fn ecdh_matches_public_key() {
        let mut e = Engine::new(Options::default());
        load(&mut e, &[0x42; 1000]);

        let args = KeyArgs {
            domain: &[0x61; 78],
            user_secret: &[0x07; 16],
            require_touch: false,
        };

        let device_public = match e.update(&Event::AppGetPubkey { args }).unwrap() {
            Output::AppPubkey { status, public_key } if status == Status::Ok => public_key,
            o => panic!("unexpected output: {o:?}"),
        };

        let host_secret = [0x99u8; 32];
        let host_public = x25519(host_secret, X25519_BASEPOINT_BYTES);

        let shared = match e
            .update(&Event::AppDoEcdh {
                args,
                peer: host_public,
            })
            .unwrap()
        {
            Output::AppShared { status, shared } if status == Status::Ok => shared,
            o => panic!("unexpected output: {o:?}"),
        };

        assert_eq!(shared, x25519(host_secret, device_public));
    }

    #[test]
    fn touch_requirements() {
        let mut e = Engine::new(Options::default());
        load(&mut e, &[0x01; 10]);

        let args = KeyArgs {
            domain: &[0u8; 78],
            user_secret: &[0u8; 16],
            require_touch: true,
        };

        assert!(!e.touch_required(&Event::AppGetPubkey { args }));
        assert!(e.touch_required(&Event::AppDoEcdh {
            args,
            peer: [9u8; 32]
        }));

        let no_touch = KeyArgs {
            require_touch: false,
            ..args
        };
        assert!(!e.touch_required(&Event::AppDoEcdh {
            args: no_touch,
            peer: [9u8; 32]
        }));
    }

    #[test]
    fn reset_returns_to_firmware() {
        let mut e = Engine::new(Options::default());
        load(&mut e, &[0x01; 10]);

        e.reset();

        assert_eq!(e.state(), State::Firmware);
        assert!(matches!(
            e.update(&Event::FwNameVersion),
            Ok(Output::FwNameVersion(_))
        ));
    }
}
