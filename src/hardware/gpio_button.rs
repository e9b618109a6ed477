use core::convert::Infallible;

use embedded_hal::digital::InputPin;

use super::traits::Button;

/// Push button wired to ground with a pull-up, so pressed reads low.
pub struct GpioButton<P> {
    pin: P,
}

impl<P> GpioButton<P>
where
    P: InputPin<Error = Infallible>,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P> Button for GpioButton<P>
where
    P: InputPin<Error = Infallible>,
{
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low().unwrap_or_else(|never| match never {})
    }
}
