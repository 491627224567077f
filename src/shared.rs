// Constants and types shared between the engine, the sequencer, and the tui.
//
// The instrument roster is fixed and ordered; pattern rows are keyed by these
// names and everything that needs a deterministic instrument order (step
// events, the grid view, exported metadata) sorts by roster position.

use std::time::{SystemTime, UNIX_EPOCH};

pub const INSTRUMENTS: [&str; 8] = [
    "Kick", "Snare", "Hi-Hat", "Ride", "Bass", "Lead", "Pad", "FX",
];

pub const VALID_STEP_COUNTS: [usize; 4] = [8, 16, 32, 64];
pub const DEFAULT_STEPS: usize = 16;

pub const BPM_MIN: u32 = 60;
pub const BPM_MAX: u32 = 200;
pub const DEFAULT_BPM: u32 = 120;

// Position of an instrument in the roster; customs sort after the roster.
pub fn roster_position(name: &str) -> usize {
    INSTRUMENTS
        .iter()
        .position(|&i| i == name)
        .unwrap_or(INSTRUMENTS.len())
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Quit,

    // transport
    PlayPress,
    BpmAdjust(i32),
    CycleStepCount,
    StepForward,
    StepBackward,
    GoToStart,

    // grid editing
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    ToggleStep,
    ClearRow,
    ClearPattern,
    NextPreset,

    // rumble controls
    IntensityAdjust(f32),
    TestVibration,
}

// Everything the tui needs to draw one frame; the app builds this, the view
// just renders it.
#[derive(Clone, Debug)]
pub struct DisplayState {
    pub rows: Vec<(String, Vec<bool>)>, // roster order
    pub playing: bool,
    pub playing_step: Option<usize>,
    pub cursor: (usize, usize), // (row, step)
    pub bpm: u32,
    pub total_steps: usize,
    pub loop_count: u64,
    pub global_intensity: (f32, f32),
    pub active_effects: usize,
    pub device_available: bool,
    pub preset_name: Option<String>,
}
