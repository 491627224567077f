mod device;
mod request;

pub use device::{HapticDevice, NullDevice};
pub use request::VibrationRequest;

#[cfg(test)]
pub use device::testing;
