// The vibration engine: maps instrument names to motor magnitudes, issues
// requests through the haptic device seam, and keeps track of in-flight
// effects so a global stop can clear everything.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::bail;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::haptics::{HapticDevice, VibrationRequest};
use crate::shared::{roster_position, unix_timestamp};

mod profile;

pub use profile::{
    CombinedProfile, GlobalIntensity, InstrumentProfile, MIN_DURATION_MS, ProfileConfig,
    default_profiles,
};

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EffectId(pub u64);

fn next_effect_id() -> EffectId {
    EffectId(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PlayOptions {
    pub delay_ms: u64,
    pub duration_ms: Option<u64>,
    pub intensity_multiplier: Option<f32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestMotor {
    Weak,
    Strong,
    Both,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub instruments: Option<HashMap<String, InstrumentProfile>>,
    pub global_intensity: Option<GlobalIntensity>,
    pub timestamp: Option<u64>,
}

#[derive(Clone, Copy, Debug)]
pub struct EngineStats {
    pub active_effects: usize,
    pub instrument_count: usize,
    pub device_available: bool,
    pub global_intensity: GlobalIntensity,
}

pub struct VibrationEngine {
    device: Box<dyn HapticDevice>,
    profiles: HashMap<String, InstrumentProfile>,
    global_intensity: GlobalIntensity,
    // in-flight requests by expiry; pruned lazily, cleared on global stop
    active: HashMap<EffectId, Instant>,
}

impl VibrationEngine {
    pub fn new(device: Box<dyn HapticDevice>) -> Self {
        let profiles = default_profiles()
            .into_iter()
            .map(|(name, profile)| (name.to_string(), profile))
            .collect();
        Self {
            device,
            profiles,
            global_intensity: GlobalIntensity::default(),
            active: HashMap::new(),
        }
    }

    /// Merge a JSON profile map over the built-in defaults. Any failure is a
    /// warning and the defaults stay in effect.
    pub fn load_instrument_config(&mut self, path: &Path) {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) => {
                warn!("could not read instrument config {}: {e}", path.display());
                return;
            }
        };
        let overlay: HashMap<String, ProfileConfig> = match serde_json::from_str(&data) {
            Ok(overlay) => overlay,
            Err(e) => {
                warn!("could not parse instrument config {}: {e}", path.display());
                return;
            }
        };
        for (name, config) in overlay {
            // partial entries inherit from the existing profile (or default)
            let mut profile = self.profile(&name);
            if let Some(weak) = config.weak {
                profile.weak = weak;
            }
            if let Some(strong) = config.strong {
                profile.strong = strong;
            }
            if let Some(duration_ms) = config.duration_ms {
                profile.duration_ms = duration_ms;
            }
            if let Some(shape) = config.shape {
                profile.shape = shape;
            }
            if let Some(description) = config.description {
                profile.description = description;
            }
            profile.sanitize();
            self.profiles.insert(name, profile);
        }
        info!("instrument config loaded from {}", path.display());
    }

    pub fn set_global_intensity(&mut self, weak: f32, strong: f32) {
        self.global_intensity.weak = weak.clamp(0.0, 1.0);
        self.global_intensity.strong = strong.clamp(0.0, 1.0);
    }

    pub fn global_intensity(&self) -> GlobalIntensity {
        self.global_intensity
    }

    /// Stored profile, or the generic fallback for unknown names. Total.
    pub fn profile(&self, instrument: &str) -> InstrumentProfile {
        self.profiles.get(instrument).cloned().unwrap_or_default()
    }

    /// Collapse simultaneous instruments into one profile: max of each field,
    /// so coinciding hits don't saturate the motors but the loudest one wins.
    pub fn combine(&self, instruments: &[String]) -> CombinedProfile {
        let mut combined = CombinedProfile {
            weak: 0.0,
            strong: 0.0,
            duration_ms: 0,
        };
        for name in instruments {
            let profile = self.profile(name);
            combined.weak = combined.weak.max(profile.weak);
            combined.strong = combined.strong.max(profile.strong);
            combined.duration_ms = combined.duration_ms.max(profile.duration_ms);
        }
        combined.weak = combined.weak.min(1.0);
        combined.strong = combined.strong.min(1.0);
        combined
    }

    /// Profile magnitudes scaled by the global intensity and an optional
    /// multiplier, clamped back into [0,1].
    pub fn final_magnitudes(&self, instrument: &str, multiplier: f32) -> (f32, f32) {
        let profile = self.profile(instrument);
        let weak = (profile.weak * self.global_intensity.weak * multiplier).clamp(0.0, 1.0);
        let strong = (profile.strong * self.global_intensity.strong * multiplier).clamp(0.0, 1.0);
        (weak, strong)
    }

    /// Single-instrument hit (manual pad presses, previews).
    pub fn play_note(&mut self, instrument: &str, options: PlayOptions) -> bool {
        if !self.device.is_available() {
            debug!("vibration unsupported, dropping note {instrument}");
            return false;
        }
        let profile = self.profile(instrument);
        let multiplier = options.intensity_multiplier.unwrap_or(1.0);
        let (weak, strong) = self.final_magnitudes(instrument, multiplier);
        let request = VibrationRequest {
            start_delay_ms: options.delay_ms,
            duration_ms: options.duration_ms.unwrap_or(profile.duration_ms),
            weak_magnitude: weak,
            strong_magnitude: strong,
        };
        self.issue(request)
    }

    /// One combined rumble for every instrument active on a step.
    pub fn play_step(&mut self, instruments: &[String], options: PlayOptions) -> bool {
        if instruments.is_empty() {
            return false;
        }
        if !self.device.is_available() {
            debug!("vibration unsupported, dropping step");
            return false;
        }
        let combined = self.combine(instruments);
        let request = VibrationRequest {
            start_delay_ms: options.delay_ms,
            duration_ms: options.duration_ms.unwrap_or(combined.duration_ms),
            weak_magnitude: (combined.weak * self.global_intensity.weak).clamp(0.0, 1.0),
            strong_magnitude: (combined.strong * self.global_intensity.strong).clamp(0.0, 1.0),
        };
        self.issue(request)
    }

    fn issue(&mut self, request: VibrationRequest) -> bool {
        self.prune_expired();
        let id = next_effect_id();
        let expiry = Instant::now() + Duration::from_millis(request.duration_ms);
        self.active.insert(id, expiry);
        let ok = self.device.vibrate(&request);
        if !ok {
            self.active.remove(&id);
        }
        ok
    }

    /// Clear the tracking set and reset the device, best effort.
    pub fn stop_all_vibrations(&mut self) -> bool {
        self.active.clear();
        self.device.stop_all()
    }

    /// Fire one of the motors directly, for checking a controller by feel.
    pub fn test_vibration(&mut self, motor: TestMotor, duration_ms: u64) -> bool {
        if !self.device.is_available() {
            debug!("vibration unsupported, dropping test");
            return false;
        }
        let (weak, strong) = match motor {
            TestMotor::Weak => (self.global_intensity.weak, 0.0),
            TestMotor::Strong => (0.0, self.global_intensity.strong),
            TestMotor::Both => (self.global_intensity.weak, self.global_intensity.strong),
        };
        self.issue(VibrationRequest {
            start_delay_ms: 0,
            duration_ms,
            weak_magnitude: weak,
            strong_magnitude: strong,
        })
    }

    fn prune_expired(&mut self) {
        let now = Instant::now();
        self.active.retain(|_, expiry| *expiry > now);
    }

    pub fn active_count(&mut self) -> usize {
        self.prune_expired();
        self.active.len()
    }

    pub fn device_available(&self) -> bool {
        self.device.is_available()
    }

    /// Register a custom instrument. Weak, strong, and duration are required;
    /// existing profiles are untouched when the config is invalid.
    pub fn create_profile(&mut self, name: &str, config: ProfileConfig) -> anyhow::Result<()> {
        let (Some(weak), Some(strong), Some(duration_ms)) =
            (config.weak, config.strong, config.duration_ms)
        else {
            bail!("invalid profile config for {name}: weak, strong, and duration are required");
        };
        let mut profile = InstrumentProfile {
            weak,
            strong,
            duration_ms,
            shape: config.shape.unwrap_or_else(|| "custom".into()),
            description: config
                .description
                .unwrap_or_else(|| format!("Custom profile: {name}")),
        };
        profile.sanitize();
        self.profiles.insert(name.to_string(), profile);
        info!("profile created: {name}");
        Ok(())
    }

    pub fn remove_profile(&mut self, name: &str) -> bool {
        self.profiles.remove(name).is_some()
    }

    pub fn available_instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort_by_key(|n| (roster_position(n), n.clone()));
        names
    }

    pub fn export_config(&self) -> EngineConfig {
        EngineConfig {
            instruments: Some(self.profiles.clone()),
            global_intensity: Some(self.global_intensity),
            timestamp: Some(unix_timestamp()),
        }
    }

    /// Replace the profile table and/or intensity from an exported config.
    /// Everything that comes in gets clamped.
    pub fn import_config(&mut self, config: EngineConfig) {
        if let Some(instruments) = config.instruments {
            self.profiles = instruments
                .into_iter()
                .map(|(name, mut profile)| {
                    profile.sanitize();
                    (name, profile)
                })
                .collect();
        }
        if let Some(intensity) = config.global_intensity {
            self.set_global_intensity(intensity.weak, intensity.strong);
        }
    }

    pub fn stats(&mut self) -> EngineStats {
        self.prune_expired();
        EngineStats {
            active_effects: self.active.len(),
            instrument_count: self.profiles.len(),
            device_available: self.device.is_available(),
            global_intensity: self.global_intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::haptics::NullDevice;
    use crate::haptics::testing::RecordingDevice;

    fn engine_with_recorder() -> (
        VibrationEngine,
        std::sync::Arc<std::sync::Mutex<Vec<VibrationRequest>>>,
    ) {
        let (device, requests) = RecordingDevice::new();
        (VibrationEngine::new(Box::new(device)), requests)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_instrument_gets_default_profile() {
        let engine = VibrationEngine::new(Box::new(NullDevice));
        let profile = engine.profile("Cowbell");
        assert_eq!(profile.weak, 0.5);
        assert_eq!(profile.strong, 0.5);
        assert_eq!(profile.duration_ms, 200);
    }

    #[test]
    fn combine_takes_max_not_sum() {
        // Kick (0.9/1.0) + Hi-Hat (0.3/0.1)
        let engine = VibrationEngine::new(Box::new(NullDevice));
        let combined = engine.combine(&names(&["Kick", "Hi-Hat"]));
        assert_eq!(combined.weak, 0.9);
        assert_eq!(combined.strong, 1.0);
        assert_eq!(combined.duration_ms, 200);
    }

    #[test]
    fn combine_duration_is_longest() {
        let engine = VibrationEngine::new(Box::new(NullDevice));
        let combined = engine.combine(&names(&["Hi-Hat", "Pad"]));
        assert_eq!(combined.duration_ms, 400);
    }

    #[test]
    fn final_magnitudes_scale_and_clamp() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        engine.set_global_intensity(0.5, 0.8);
        let (weak, strong) = engine.final_magnitudes("Kick", 1.0);
        assert!((weak - 0.45).abs() < 1e-6);
        assert!((strong - 0.8).abs() < 1e-6);
        // a huge multiplier still lands inside [0,1]
        let (weak, strong) = engine.final_magnitudes("Kick", 100.0);
        assert_eq!(weak, 1.0);
        assert_eq!(strong, 1.0);
    }

    #[test]
    fn global_intensity_is_clamped() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        engine.set_global_intensity(-3.0, 42.0);
        let intensity = engine.global_intensity();
        assert_eq!(intensity.weak, 0.0);
        assert_eq!(intensity.strong, 1.0);
    }

    #[test]
    fn play_step_issues_combined_request() {
        let (mut engine, requests) = engine_with_recorder();
        assert!(engine.play_step(&names(&["Kick", "Hi-Hat"]), PlayOptions::default()));
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert!((request.weak_magnitude - 0.45).abs() < 1e-6); // 0.9 * 0.5
        assert!((request.strong_magnitude - 0.8).abs() < 1e-6); // 1.0 * 0.8
        assert_eq!(request.duration_ms, 200);
        assert_eq!(request.start_delay_ms, 0);
    }

    #[test]
    fn play_step_rejects_empty_set() {
        let (mut engine, requests) = engine_with_recorder();
        assert!(!engine.play_step(&[], PlayOptions::default()));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn unavailable_device_returns_false_without_tracking() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        assert!(!engine.play_step(&names(&["Kick"]), PlayOptions::default()));
        assert!(!engine.play_note("Kick", PlayOptions::default()));
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn active_effects_expire_and_clear_on_stop() {
        let (mut engine, _requests) = engine_with_recorder();
        engine
            .create_profile(
                "Blip",
                ProfileConfig {
                    weak: Some(0.5),
                    strong: Some(0.5),
                    duration_ms: Some(50),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(engine.play_note("Blip", PlayOptions::default()));
        assert!(engine.play_note("Kick", PlayOptions::default()));
        assert_eq!(engine.active_count(), 2);

        std::thread::sleep(Duration::from_millis(70));
        assert_eq!(engine.active_count(), 1); // the 50ms one is gone

        engine.stop_all_vibrations();
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn create_profile_requires_all_fields() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        let result = engine.create_profile(
            "Broken",
            ProfileConfig {
                weak: Some(0.5),
                ..Default::default()
            },
        );
        assert!(result.is_err());
        // nothing was stored, lookups fall back to the default
        assert_eq!(engine.profile("Broken"), InstrumentProfile::default());
    }

    #[test]
    fn create_profile_clamps_inputs() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        engine
            .create_profile(
                "Slam",
                ProfileConfig {
                    weak: Some(1.5),
                    strong: Some(-0.2),
                    duration_ms: Some(10),
                    ..Default::default()
                },
            )
            .unwrap();
        let profile = engine.profile("Slam");
        assert_eq!(profile.weak, 1.0);
        assert_eq!(profile.strong, 0.0);
        assert_eq!(profile.duration_ms, MIN_DURATION_MS);
        assert_eq!(profile.shape, "custom");
    }

    #[test]
    fn remove_profile_reports_presence() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        assert!(engine.remove_profile("Kick"));
        assert!(!engine.remove_profile("Kick"));
    }

    #[test]
    fn config_round_trip() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        engine.set_global_intensity(0.3, 0.4);
        let exported = engine.export_config();

        let mut other = VibrationEngine::new(Box::new(NullDevice));
        other.import_config(exported);
        assert_eq!(other.global_intensity(), engine.global_intensity());
        assert_eq!(other.profile("Bass"), engine.profile("Bass"));
    }

    #[test]
    fn instrument_overlay_merges_over_defaults() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "Kick": {{ "weak": 0.2 }}, "Woodblock": {{ "weak": 0.1, "strong": 0.1, "duration": 60, "pattern": "knock" }} }}"#
        )
        .unwrap();
        engine.load_instrument_config(file.path());

        let kick = engine.profile("Kick");
        assert!((kick.weak - 0.2).abs() < 1e-6);
        assert_eq!(kick.strong, 1.0); // untouched fields keep their defaults
        assert_eq!(engine.profile("Woodblock").shape, "knock");
    }

    #[test]
    fn bad_overlay_file_keeps_defaults() {
        let mut engine = VibrationEngine::new(Box::new(NullDevice));
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json at all").unwrap();
        engine.load_instrument_config(file.path());
        assert_eq!(engine.profile("Kick").weak, 0.9);
        assert_eq!(engine.available_instruments().len(), 8);
    }

    #[test]
    fn roster_ordering_in_instrument_list() {
        let engine = VibrationEngine::new(Box::new(NullDevice));
        let instruments = engine.available_instruments();
        assert_eq!(instruments[0], "Kick");
        assert_eq!(instruments[7], "FX");
    }
}
