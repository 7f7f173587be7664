mod cancellation_token;
mod card;
mod clock;
mod decoder;
mod edge;
mod error;
mod frame;
mod gpio;
mod log_macros;

pub use crate::cancellation_token::CancellationToken;
pub use crate::card::CardData;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::decoder::{
    CardDecoded, DecoderConfig, WiegandDecoder, DEFAULT_INACTIVITY_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
pub use crate::edge::{Edge, EdgeSink, EdgeSource, PortId};
pub use crate::error::{Result, WiegandError};
pub use crate::frame::FrameAssembler;
pub use crate::gpio::GpioEdgeSource;
use clap::{Parser, ValueEnum};
use core::fmt::Arguments;
use rppal::gpio::Gpio;
use std::error::Error;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

pub trait RppalWiegandLog {
    fn output(self: &Self, args: Arguments);
    fn warning(self: &Self, args: Arguments);
    fn error(self: &Self, args: Arguments);
    /// Called once the command line is parsed, before any other output
    fn set_color(self: &Self, _enabled: bool) {}
}

pub struct RppalWiegandTool<'a> {
    log: &'a dyn RppalWiegandLog,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
#[repr(u8)]
enum BcmPin {
    Pin1 = 1,
    Pin2,
    Pin3,
    Pin4,
    Pin5,
    Pin6,
    Pin7,
    Pin8,
    Pin9,
    Pin10,
    Pin11,
    Pin12,
    Pin13,
    Pin14,
    Pin15,
    Pin16,
    Pin17,
    Pin18,
    Pin19,
    Pin20,
    Pin21,
    Pin22,
    Pin23,
    Pin24,
    Pin25,
    Pin26,
    Pin27,
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Disable colors in output
    #[arg(long = "no-color", short = 'n', env = "NO_CLI_COLOR")]
    no_color: bool,
    /// BCM pin wired to the reader's DATA0 (green) line
    #[arg(long = "data0", short = '0')]
    data0_pin: BcmPin,
    /// BCM pin wired to the reader's DATA1 (white) line
    #[arg(long = "data1", short = '1')]
    data1_pin: BcmPin,
    /// Quiet period in milliseconds that ends a frame
    #[arg(
        long = "timeout-ms",
        short = 't',
        env = "WIEGAND_TIMEOUT_MS",
        default_value_t = 500
    )]
    timeout_ms: u64,
}

impl<'a> RppalWiegandTool<'a> {
    pub fn new(log: &'a dyn RppalWiegandLog) -> RppalWiegandTool<'a> {
        RppalWiegandTool { log }
    }

    pub fn run(
        self: &mut Self,
        args: impl IntoIterator<Item = std::ffi::OsString>,
    ) -> std::result::Result<(), Box<dyn Error>> {
        let cli = match Cli::try_parse_from(args) {
            Ok(m) => m,
            Err(err) => {
                output!(self.log, "{}", err.to_string());
                return Ok(());
            }
        };

        self.log.set_color(!cli.no_color);

        let gpio = Gpio::new()?;
        let mut data0 = GpioEdgeSource::new(&gpio, cli.data0_pin as u8)?;
        let mut data1 = GpioEdgeSource::new(&gpio, cli.data1_pin as u8)?;
        let config =
            DecoderConfig::default().with_inactivity_timeout(Duration::from_millis(cli.timeout_ms));
        let mut decoder = WiegandDecoder::new(Some(&mut data0), Some(&mut data1), config)?;

        // Handlers run on the poller thread, so hand cards back here for printing
        let (sender, receiver) = mpsc::channel();

        decoder.on_card_decoded(move |event: &CardDecoded| {
            let _ = sender.send(event.card);
        });

        let token = CancellationToken::new();
        let token_clone = token.clone();

        ctrlc::set_handler(move || token_clone.cancel())?;

        output!(
            self.log,
            "Listening on DATA0=BCM{} DATA1=BCM{}",
            decoder.data0_port(),
            decoder.data1_port()
        );

        while !token.is_canceled() {
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(card) => {
                    if !card.is_valid() {
                        warning!(self.log, "parity check failed for frame {:#x}", card.raw());
                    }

                    output!(self.log, "{}\n", card);
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(fault) = decoder.take_fault() {
                decoder.stop();
                return Err(Box::new(fault));
            }
        }

        if token.is_canceled() {
            warning!(self.log, "Ctrl+C received, stopping...");
        }

        decoder.stop();

        Ok(())
    }
}
