// Copyright (c) 2022-2023 The MobileCoin Foundation

//! A simulated TKey for use from rust
//!
//! The [Simulator] serves a [tkey_x25519_core] engine over any async byte
//! stream, in-memory via [connect] for tests or over TCP via [Simulator::serve_tcp].
//! Touch is provided via [SimHandle::touch], or automatically where
//! [SimOptions::auto_touch] is set.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream},
    net::TcpListener,
    sync::Notify,
};

use tkey_x25519_core::engine::{Engine, Event, Faults, Options, Output, State, Stats};
use tkey_x25519_proto::{FrameHeader, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};

/// Default TCP port for the simulator
pub const DEFAULT_PORT: u16 = 6545;

/// Simulator options
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SimOptions {
    /// Device engine options
    pub engine: Options,
    /// Automatically provide touches when required
    pub auto_touch: bool,
}

/// Handle to a running [Simulator], for touch and fault control
#[derive(Clone)]
pub struct SimHandle {
    engine: Arc<Mutex<Engine>>,
    touch: Arc<Notify>,
    waiting: Arc<AtomicBool>,
    auto_touch: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl SimHandle {
    fn engine(&self) -> MutexGuard<'_, Engine> {
        match self.engine.lock() {
            Ok(e) => e,
            Err(p) => p.into_inner(),
        }
    }

    /// Touch the device.
    ///
    /// Touches only count while a request is waiting, see [SimHandle::touch_pending].
    pub fn touch(&self) {
        if !self.touch_pending() {
            debug!("Ignoring touch, no request waiting");
            return;
        }

        debug!("Touch");
        self.touch.notify_waiters();
    }

    /// Check whether the device is waiting for a touch
    pub fn touch_pending(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Check whether a host is currently being served
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Enable or disable automatic touches
    pub fn set_auto_touch(&self, auto_touch: bool) {
        self.auto_touch.store(auto_touch, Ordering::SeqCst);
    }

    /// Fetch request counters
    pub fn stats(&self) -> Stats {
        *self.engine().stats()
    }

    /// Fetch device state
    pub fn state(&self) -> State {
        self.engine().state()
    }

    /// Update injected faults
    pub fn set_faults(&self, faults: Faults) {
        self.engine().set_faults(faults);
    }

    /// Reset the device to firmware mode, as on unplugging and plugging in again
    pub fn replug(&self) {
        info!("Replug");
        self.engine().reset();
    }
}

/// Simulated TKey device
#[derive(Clone)]
pub struct Simulator {
    h: SimHandle,
}

impl Simulator {
    /// Create a new simulator with the provided options
    pub fn new(opts: SimOptions) -> Self {
        Self {
            h: SimHandle {
                engine: Arc::new(Mutex::new(Engine::new(opts.engine))),
                touch: Arc::new(Notify::new()),
                waiting: Arc::new(AtomicBool::new(false)),
                auto_touch: Arc::new(AtomicBool::new(opts.auto_touch)),
                connected: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Fetch a handle for controlling the simulator
    pub fn handle(&self) -> SimHandle {
        self.h.clone()
    }

    /// Serve requests from the provided stream until closed by the host
    pub async fn serve<S: AsyncRead + AsyncWrite + Unpin>(&self, mut s: S) -> anyhow::Result<()> {
        self.h.connected.store(true, Ordering::SeqCst);

        let r = self.serve_frames(&mut s).await;

        // Requests abandoned by the host no longer await touch
        self.h.waiting.store(false, Ordering::SeqCst);
        self.h.connected.store(false, Ordering::SeqCst);

        r
    }

    async fn serve_frames<S: AsyncRead + AsyncWrite + Unpin>(&self, s: &mut S) -> anyhow::Result<()> {
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        let mut resp = [0u8; MAX_FRAME_LEN];
        let mut next = None;

        loop {
            // Read frame header, exiting on host disconnect
            let h = match next.take() {
                Some(v) => v,
                None => {
                    let mut h = [0u8; 1];
                    match s.read_exact(&mut h).await {
                        Ok(_) => h[0],
                        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                            debug!("Host disconnected");
                            return Ok(());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            };

            let hdr = match FrameHeader::decode_byte(h) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Dropping invalid frame header 0x{:02x}: {}", h, e);
                    continue;
                }
            };

            let n = hdr.len.byte_len();
            s.read_exact(&mut payload[..n]).await?;

            // Requests awaiting touch end if the host disconnects or moves on
            let mut b = [0u8; 1];
            let out = tokio::select! {
                biased;

                out = self.handle_frame(&hdr, &payload[..n]) => out,
                r = s.read(&mut b) => {
                    self.h.waiting.store(false, Ordering::SeqCst);

                    match r? {
                        0 => {
                            info!("Host disconnected while awaiting touch");
                            return Ok(());
                        }
                        _ => {
                            warn!("Host sent a new frame while awaiting touch, dropping request");
                            next = Some(b[0]);
                            continue;
                        }
                    }
                }
            };

            let n = out.encode(&hdr, &mut resp)?;
            s.write_all(&resp[..n]).await?;
            s.flush().await?;
        }
    }

    /// Accept and serve TCP connections, one host at a time
    pub async fn serve_tcp(&self, l: TcpListener) -> anyhow::Result<()> {
        loop {
            let (s, addr) = l.accept().await?;

            info!("Host connected from {}", addr);

            if let Err(e) = self.serve(s).await {
                warn!("Connection from {} failed: {}", addr, e);
            }
        }
    }

    async fn handle_frame(&self, hdr: &FrameHeader, payload: &[u8]) -> Output {
        let params = *self.h.engine().params();

        let evt = match Event::parse(hdr, payload, &params) {
            Ok(v) => v,
            Err(e) => {
                debug!("Failed to parse frame ({:?}): {:?}", hdr, e);
                return Output::Nok;
            }
        };

        let touch_required = self.h.engine().touch_required(&evt);
        if touch_required && !self.h.auto_touch.load(Ordering::SeqCst) {
            info!("Waiting for touch");

            // Register before flagging so a touch racing the flag is not lost
            let touched = self.h.touch.notified();
            self.h.waiting.store(true, Ordering::SeqCst);
            touched.await;
            self.h.waiting.store(false, Ordering::SeqCst);
        }

        let r = self.h.engine().update(&evt);
        match r {
            Ok(v) => v,
            Err(e) => {
                warn!("Engine error: {:?}", e);
                Output::Nok
            }
        }
    }
}

/// Create a simulator served over an in-memory stream,
/// returning the control handle and the host end of the stream
pub fn connect(opts: SimOptions) -> (SimHandle, DuplexStream) {
    let (host, device) = tokio::io::duplex(4 * MAX_FRAME_LEN);

    let sim = Simulator::new(opts);
    let h = sim.handle();

    tokio::spawn(async move {
        if let Err(e) = sim.serve(device).await {
            warn!("Simulator exited: {}", e);
        }
    });

    (h, host)
}
