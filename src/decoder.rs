use crate::cancellation_token::CancellationToken;
use crate::card::CardData;
use crate::clock::{Clock, SystemClock};
use crate::edge::{Edge, EdgeSource, PortId};
use crate::error::{Result, WiegandError};
use crate::frame::FrameAssembler;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Raised once per completed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardDecoded {
    pub card: CardData,
}

type CardHandler = Arc<dyn Fn(&CardDecoded) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct DecoderConfig {
    pub inactivity_timeout: Duration,
    pub poll_interval: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }
}

impl DecoderConfig {
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.inactivity_timeout.is_zero() {
            return Err(WiegandError::configuration(
                "inactivity timeout must be a positive duration",
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(WiegandError::configuration(
                "poll interval must be a positive duration",
            ));
        }

        Ok(())
    }
}

struct Shared {
    data0: PortId,
    data1: PortId,
    inactivity_timeout: Duration,
    clock: Arc<dyn Clock>,
    // Accumulator and last edge time live behind one lock so a finalize can
    // never interleave with a shift
    frame: Mutex<FrameAssembler>,
    handlers: Mutex<Vec<CardHandler>>,
    fault: Mutex<Option<WiegandError>>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Shared {
    fn frame(&self) -> MutexGuard<'_, FrameAssembler> {
        // The assembler is always left consistent, so a poisoned lock is still usable
        self.frame.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_fault(&self, err: WiegandError) {
        *self.fault.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
    }

    fn handle_edge(&self, edge: Edge) -> Result<()> {
        let bit = if edge.port == self.data0 {
            false
        } else if edge.port == self.data1 {
            true
        } else {
            return Err(WiegandError::InvalidPort {
                port: edge.port,
                data0: self.data0,
                data1: self.data1,
            });
        };

        self.frame().push_bit(bit, edge.timestamp);

        Ok(())
    }

    fn poll(&self) {
        let now = self.clock.now();
        let Some(raw) = self.frame().take_if_quiet(now, self.inactivity_timeout) else {
            return;
        };
        let event = CardDecoded {
            card: CardData::from_raw(raw),
        };

        // Snapshot so handlers can register more handlers without deadlocking
        let handlers: Vec<CardHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for handler in handlers {
            // A panicking handler must not take the poller down with it
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                self.set_fault(WiegandError::HandlerPanicked(panic_message(&*payload)));
            }
        }
    }
}

/// Decodes Wiegand frames from a DATA0/DATA1 pair of edge sources.
///
/// The poller runs until [`WiegandDecoder::stop`] is called or the decoder is dropped.
/// Frames of any non-zero length are emitted; use [`CardData::is_valid`] to tell
/// a clean 26-bit read from noise or a foreign format.
pub struct WiegandDecoder {
    shared: Arc<Shared>,
    token: CancellationToken,
    poller: Option<JoinHandle<()>>,
}

impl WiegandDecoder {
    /// Bind to the zero line (`data0`) and the one line (`data1`) and start polling
    pub fn new(
        data0: Option<&mut dyn EdgeSource>,
        data1: Option<&mut dyn EdgeSource>,
        config: DecoderConfig,
    ) -> Result<WiegandDecoder> {
        let data0 =
            data0.ok_or_else(|| WiegandError::configuration("DATA0 edge source is missing"))?;
        let data1 =
            data1.ok_or_else(|| WiegandError::configuration("DATA1 edge source is missing"))?;

        config.validate()?;

        if data0.port() == data1.port() {
            return Err(WiegandError::configuration(format!(
                "DATA0 and DATA1 must be distinct, both are port {}",
                data0.port()
            )));
        }

        let shared = Arc::new(Shared {
            data0: data0.port(),
            data1: data1.port(),
            inactivity_timeout: config.inactivity_timeout,
            clock: config.clock,
            frame: Mutex::new(FrameAssembler::new()),
            handlers: Mutex::new(Vec::new()),
            fault: Mutex::new(None),
        });
        let token = CancellationToken::new();

        let poller = {
            let shared = shared.clone();
            let token = token.clone();
            let interval = config.poll_interval;

            thread::Builder::new()
                .name("wiegand-poller".to_string())
                .spawn(move || {
                    while !token.is_canceled() {
                        shared.poll();

                        if !token.sleep(interval) {
                            break;
                        }
                    }
                })
                .map_err(|err| {
                    WiegandError::configuration(format!("unable to start poller: {}", err))
                })?
        };

        // From here on a failed subscription drops the decoder, which stops the poller
        let decoder = WiegandDecoder {
            shared,
            token,
            poller: Some(poller),
        };

        decoder.attach(data0)?;
        decoder.attach(data1)?;

        Ok(decoder)
    }

    fn attach(&self, source: &mut dyn EdgeSource) -> Result<()> {
        let shared = self.shared.clone();
        let token = self.token.clone();

        source.subscribe(Box::new(move |edge| {
            if let Err(err) = shared.handle_edge(edge) {
                // Miswired source, stop decoding and leave the error for the owner
                shared.set_fault(err);
                token.cancel();
            }
        }))
    }

    /// Register a handler for completed frames.  Handlers run in registration order on
    /// the poller thread and should return promptly; a slow handler delays the next frame.
    pub fn on_card_decoded<F>(&self, handler: F)
    where
        F: Fn(&CardDecoded) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(handler));
    }

    /// Feed a single edge in directly, as an edge source subscription would
    pub fn handle_edge(&self, edge: Edge) -> Result<()> {
        self.shared.handle_edge(edge)
    }

    /// Bits accumulated for the frame in progress
    pub fn pending_frame(&self) -> u64 {
        self.shared.frame().pending()
    }

    pub fn data0_port(&self) -> PortId {
        self.shared.data0
    }

    pub fn data1_port(&self) -> PortId {
        self.shared.data1
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.shared.inactivity_timeout
    }

    pub fn is_running(&self) -> bool {
        !self.token.is_canceled()
            && self
                .poller
                .as_ref()
                .is_some_and(|poller| !poller.is_finished())
    }

    /// Removes the last recorded fault: a foreign port from an edge source, which
    /// halts decoding, or a panicking handler, which does not
    pub fn take_fault(&self) -> Option<WiegandError> {
        self.shared
            .fault
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Stop the poller and wait for it to exit.  Bits still pending are discarded.
    pub fn stop(&mut self) {
        self.token.cancel();

        if let Some(poller) = self.poller.take() {
            // Joining ourselves from inside a handler would deadlock
            if poller.thread().id() != thread::current().id() {
                if let Err(payload) = poller.join() {
                    self.shared
                        .set_fault(WiegandError::HandlerPanicked(panic_message(&*payload)));
                }
            }
        }
    }
}

impl Drop for WiegandDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}
