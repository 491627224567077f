use log::debug;

use super::request::VibrationRequest;

/// Seam to whatever dual-motor controller backend is wired in.
///
/// Every call degrades to a `false` return instead of an error: the sequencer
/// clock has to keep running whether or not a pad is plugged in.
pub trait HapticDevice: Send {
    /// True only when a device with a dual-motor actuator is connected.
    fn is_available(&self) -> bool;

    /// Fire one rumble effect. Returns false when no device/actuator is
    /// present or the underlying call errors; never panics.
    fn vibrate(&mut self, request: &VibrationRequest) -> bool;

    /// Best-effort reset of any ongoing effect.
    fn stop_all(&mut self) -> bool;
}

// Stand-in used when no controller backend is wired up. Keeps the whole app
// usable for editing and timing work without hardware.
pub struct NullDevice;

impl HapticDevice for NullDevice {
    fn is_available(&self) -> bool {
        false
    }

    fn vibrate(&mut self, request: &VibrationRequest) -> bool {
        debug!(
            "no haptic device, dropping request (weak {:.2}, strong {:.2}, {}ms)",
            request.weak_magnitude, request.strong_magnitude, request.duration_ms
        );
        false
    }

    fn stop_all(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    // Records every request so tests can assert on what the engine issued.
    pub struct RecordingDevice {
        pub requests: Arc<Mutex<Vec<VibrationRequest>>>,
        pub stops: Arc<Mutex<usize>>,
        pub available: bool,
    }

    impl RecordingDevice {
        pub fn new() -> (Self, Arc<Mutex<Vec<VibrationRequest>>>) {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let device = Self {
                requests: requests.clone(),
                stops: Arc::new(Mutex::new(0)),
                available: true,
            };
            (device, requests)
        }
    }

    impl HapticDevice for RecordingDevice {
        fn is_available(&self) -> bool {
            self.available
        }

        fn vibrate(&mut self, request: &VibrationRequest) -> bool {
            if !self.available {
                return false;
            }
            self.requests.lock().unwrap().push(*request);
            true
        }

        fn stop_all(&mut self) -> bool {
            *self.stops.lock().unwrap() += 1;
            self.available
        }
    }
}
