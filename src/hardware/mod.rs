pub mod fr2355;
pub mod gpio_button;
pub mod gpio_led;
pub mod traits;

#[cfg(feature = "blue-pill")]
pub mod blue_pill;
