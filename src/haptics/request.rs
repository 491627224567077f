// One dual-rumble call: both magnitudes are normalized, the delay and
// duration are flat milliseconds like the underlying effect APIs expect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VibrationRequest {
    pub start_delay_ms: u64,
    pub duration_ms: u64,
    pub weak_magnitude: f32,
    pub strong_magnitude: f32,
}

impl Default for VibrationRequest {
    fn default() -> Self {
        Self {
            start_delay_ms: 0,
            duration_ms: 200,
            weak_magnitude: 0.5,
            strong_magnitude: 0.8,
        }
    }
}
