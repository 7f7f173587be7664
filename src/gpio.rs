use crate::edge::{Edge, EdgeSink, EdgeSource, PortId};
use crate::error::Result;
use rppal::gpio::{Gpio, InputPin, Trigger};
use std::time::Instant;

/// A Wiegand data line on a Raspberry Pi GPIO pin.
///
/// HID readers pull DATA0/DATA1 low for each bit and drive them high the rest of the
/// time, so the pin is left floating and only falling edges are watched.
pub struct GpioEdgeSource {
    pin: InputPin,
}

impl GpioEdgeSource {
    pub fn new(gpio: &Gpio, bcm_pin: u8) -> Result<GpioEdgeSource> {
        let pin = gpio.get(bcm_pin)?.into_input();

        Ok(GpioEdgeSource { pin })
    }
}

impl EdgeSource for GpioEdgeSource {
    fn port(&self) -> PortId {
        self.pin.pin()
    }

    fn subscribe(&mut self, mut sink: EdgeSink) -> Result<()> {
        let port = self.pin.pin();

        // The kernel timestamp uses its own clock, so stamp the edge on delivery
        // to stay comparable with the decoder's clock
        self.pin
            .set_async_interrupt(Trigger::FallingEdge, None, move |_event| {
                sink(Edge::new(port, Instant::now()))
            })?;

        Ok(())
    }
}

impl Drop for GpioEdgeSource {
    fn drop(&mut self) {
        let _ = self.pin.clear_async_interrupt();
    }
}
