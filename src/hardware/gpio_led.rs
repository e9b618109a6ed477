use core::convert::Infallible;

use embedded_hal::digital::StatefulOutputPin;

use super::traits::Led;

/// Active-high LED on any output pin that cannot fail.
pub struct GpioLed<P> {
    pin: P,
}

impl<P> GpioLed<P>
where
    P: StatefulOutputPin<Error = Infallible>,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn is_on(&mut self) -> bool {
        self.pin
            .is_set_high()
            .unwrap_or_else(|never| match never {})
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P> Led for GpioLed<P>
where
    P: StatefulOutputPin<Error = Infallible>,
{
    fn on(&mut self) {
        self.pin.set_high().unwrap_or_else(|never| match never {})
    }

    fn off(&mut self) {
        self.pin.set_low().unwrap_or_else(|never| match never {})
    }

    fn toggle(&mut self) {
        self.pin.toggle().unwrap_or_else(|never| match never {})
    }
}
