#![allow(unused)]

use std::{
    collections::VecDeque,
    str::FromStr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::{trace, LevelFilter};
use simplelog::SimpleLogger;

use tkey_x25519::{transport::Exchange, DeviceHandle, Error};
use tkey_x25519_core::engine::{Engine, Faults, Options};
use tkey_x25519_proto::{FrameHeader, MAX_FRAME_LEN};

/// Engine wrapper implementing [Exchange], touch requirements are satisfied automatically
#[derive(Clone)]
pub struct TestEngine {
    pub engine: Arc<Mutex<Engine>>,
    frames: VecDeque<Vec<u8>>,
    closed: bool,
}

impl TestEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            frames: VecDeque::new(),
            closed: false,
        }
    }

    pub fn set_faults(&self, faults: Faults) {
        self.engine.lock().unwrap().set_faults(faults);
    }
}

#[async_trait]
impl Exchange for TestEngine {
    async fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }

        trace!("tx: {:02x?}", frame);

        let hdr = FrameHeader::decode_byte(frame[0]).unwrap();
        assert_eq!(frame.len(), 1 + hdr.len.byte_len(), "frame length mismatch");

        let mut resp = [0u8; MAX_FRAME_LEN];
        let n = self
            .engine
            .lock()
            .unwrap()
            .handle(&hdr, &frame[1..], &mut resp)
            .unwrap();

        self.frames.push_back(resp[..n].to_vec());

        Ok(())
    }

    async fn recv(&mut self, buff: &mut [u8]) -> Result<(FrameHeader, usize), Error> {
        let f = self.frames.pop_front().ok_or(Error::Eof)?;

        trace!("rx: {:02x?}", f);

        let hdr = FrameHeader::decode_byte(f[0])?;
        let n = f.len() - 1;
        buff[..n].copy_from_slice(&f[1..]);

        Ok((hdr, n))
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self.closed {
            true => Err(Error::Closed),
            false => {
                self.closed = true;
                Ok(())
            }
        }
    }
}

/// Setup logging and a device handle over a fresh engine
pub fn setup(opts: Options) -> DeviceHandle<TestEngine> {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());

    DeviceHandle::from(TestEngine::new(Engine::new(opts)))
}
