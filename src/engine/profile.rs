use serde::{Deserialize, Serialize};

pub const MIN_DURATION_MS: u64 = 50;

// Per-instrument rumble config. Serialized field names match the overlay /
// export JSON format ("duration", "pattern").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    pub weak: f32,
    pub strong: f32,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(rename = "pattern")]
    pub shape: String,
    #[serde(default)]
    pub description: String,
}

impl Default for InstrumentProfile {
    fn default() -> Self {
        Self {
            weak: 0.5,
            strong: 0.5,
            duration_ms: 200,
            shape: "default".into(),
            description: String::new(),
        }
    }
}

impl InstrumentProfile {
    fn new(weak: f32, strong: f32, duration_ms: u64, shape: &str, description: &str) -> Self {
        Self {
            weak,
            strong,
            duration_ms,
            shape: shape.into(),
            description: description.into(),
        }
    }

    // Pull stored values back into their legal ranges; used on every path
    // that lets external data in (overlay files, config import).
    pub fn sanitize(&mut self) {
        self.weak = self.weak.clamp(0.0, 1.0);
        self.strong = self.strong.clamp(0.0, 1.0);
        self.duration_ms = self.duration_ms.max(MIN_DURATION_MS);
    }
}

// Partial profile as it arrives from user input or an overlay file. A full
// create requires weak, strong, and duration; the rest have fallbacks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub weak: Option<f32>,
    pub strong: Option<f32>,
    #[serde(rename = "duration")]
    pub duration_ms: Option<u64>,
    #[serde(rename = "pattern")]
    pub shape: Option<String>,
    pub description: Option<String>,
}

// What a set of simultaneous instruments collapses into for one rumble call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombinedProfile {
    pub weak: f32,
    pub strong: f32,
    pub duration_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalIntensity {
    pub weak: f32,
    pub strong: f32,
}

impl Default for GlobalIntensity {
    fn default() -> Self {
        Self {
            weak: 0.5,
            strong: 0.8,
        }
    }
}

pub fn default_profiles() -> Vec<(&'static str, InstrumentProfile)> {
    vec![
        (
            "Kick",
            InstrumentProfile::new(0.9, 1.0, 200, "punch", "Bass drum, heavy impact"),
        ),
        (
            "Snare",
            InstrumentProfile::new(0.7, 0.8, 150, "snap", "Snare, dry crack"),
        ),
        (
            "Hi-Hat",
            InstrumentProfile::new(0.3, 0.1, 80, "tick", "Hi-hat, light tick"),
        ),
        (
            "Ride",
            InstrumentProfile::new(0.4, 0.2, 120, "shimmer", "Ride, metallic wash"),
        ),
        (
            "Bass",
            InstrumentProfile::new(0.8, 0.9, 300, "rumble", "Bass, deep sustain"),
        ),
        (
            "Lead",
            InstrumentProfile::new(0.5, 0.6, 100, "pulse", "Lead, quick pulse"),
        ),
        (
            "Pad",
            InstrumentProfile::new(0.6, 0.3, 400, "wave", "Pad, soft wave"),
        ),
        (
            "FX",
            InstrumentProfile::new(0.4, 0.7, 250, "burst", "Effects, sharp burst"),
        ),
    ]
}
