// The composition object: owns the engine, the sequencer, and the pattern
// store for the lifetime of the process, and resolves tui input events into
// operations on them. The tui itself only ever sees a DisplayState.

use std::sync::{Arc, Mutex};

use crate::engine::{TestMotor, VibrationEngine};
use crate::haptics::HapticDevice;
use crate::pattern::PatternStore;
use crate::sequencer::Sequencer;
use crate::shared::{DisplayState, INSTRUMENTS, InputEvent, VALID_STEP_COUNTS};

const BPM_STEP: i32 = 5;
const TEST_VIBRATION_MS: u64 = 300;

pub struct App {
    pub engine: Arc<Mutex<VibrationEngine>>,
    pub sequencer: Sequencer,
    pub store: PatternStore,
    cursor_row: usize,
    cursor_step: usize,
    preset_index: Option<usize>,
}

impl App {
    pub fn new(device: Box<dyn HapticDevice>) -> Self {
        let engine = Arc::new(Mutex::new(VibrationEngine::new(device)));
        let sequencer = Sequencer::new(engine.clone());
        let app = Self {
            engine,
            sequencer,
            store: PatternStore::new(),
            cursor_row: 0,
            cursor_step: 0,
            preset_index: None,
        };
        app.sequencer.set_pattern(app.store.snapshot());
        app
    }

    /// Push the store's pattern into the sequencer after any edit.
    pub fn sync_pattern(&self) {
        self.sequencer.set_pattern(self.store.snapshot());
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Quit => {}

            InputEvent::PlayPress => {
                self.sequencer.toggle();
            }
            InputEvent::BpmAdjust(delta) => {
                let bpm = self.sequencer.bpm() as i32 + delta * BPM_STEP;
                self.sequencer.set_bpm(bpm.max(1) as u32);
            }
            InputEvent::CycleStepCount => {
                let current = self.store.current().len();
                let position = VALID_STEP_COUNTS
                    .iter()
                    .position(|&n| n == current)
                    .unwrap_or(0);
                let next = VALID_STEP_COUNTS[(position + 1) % VALID_STEP_COUNTS.len()];
                self.store.current_mut().resize(next);
                self.sequencer.set_total_steps(next);
                self.sync_pattern();
                self.cursor_step = self.cursor_step.min(next - 1);
            }
            InputEvent::StepForward => {
                self.sequencer.step_forward();
            }
            InputEvent::StepBackward => {
                self.sequencer.step_backward();
            }
            InputEvent::GoToStart => {
                self.sequencer.go_to_start();
            }

            InputEvent::CursorUp => {
                self.cursor_row = if self.cursor_row == 0 {
                    INSTRUMENTS.len() - 1
                } else {
                    self.cursor_row - 1
                };
            }
            InputEvent::CursorDown => {
                self.cursor_row = (self.cursor_row + 1) % INSTRUMENTS.len();
            }
            InputEvent::CursorLeft => {
                let steps = self.store.current().len();
                self.cursor_step = if self.cursor_step == 0 {
                    steps - 1
                } else {
                    self.cursor_step - 1
                };
            }
            InputEvent::CursorRight => {
                self.cursor_step = (self.cursor_step + 1) % self.store.current().len();
            }
            InputEvent::ToggleStep => {
                let instrument = INSTRUMENTS[self.cursor_row];
                self.store
                    .current_mut()
                    .toggle_step(instrument, self.cursor_step);
                self.preset_index = None;
                self.sync_pattern();
            }
            InputEvent::ClearRow => {
                let instrument = INSTRUMENTS[self.cursor_row];
                self.store.current_mut().clear_instrument(instrument);
                self.preset_index = None;
                self.sync_pattern();
            }
            InputEvent::ClearPattern => {
                self.store.current_mut().clear();
                self.preset_index = None;
                self.sync_pattern();
            }
            InputEvent::NextPreset => {
                let keys = self.store.preset_keys();
                if keys.is_empty() {
                    return;
                }
                let next = match self.preset_index {
                    Some(i) => (i + 1) % keys.len(),
                    None => 0,
                };
                if self.store.load_preset(&keys[next]) {
                    self.preset_index = Some(next);
                    self.sync_pattern();
                    self.cursor_step = self.cursor_step.min(self.store.current().len() - 1);
                }
            }

            InputEvent::IntensityAdjust(delta) => {
                let mut engine = self.engine.lock().unwrap();
                let intensity = engine.global_intensity();
                engine.set_global_intensity(intensity.weak + delta, intensity.strong + delta);
            }
            InputEvent::TestVibration => {
                self.engine
                    .lock()
                    .unwrap()
                    .test_vibration(TestMotor::Both, TEST_VIBRATION_MS);
            }
        }
    }

    pub fn display_state(&self) -> DisplayState {
        let playback = self.sequencer.playback_state();
        let stats = self.sequencer.stats();
        let engine_stats = self.engine.lock().unwrap().stats();
        let pattern = self.store.current();
        let rows = INSTRUMENTS
            .iter()
            .map(|&name| {
                (
                    name.to_string(),
                    pattern.rows().get(name).cloned().unwrap_or_default(),
                )
            })
            .collect();
        let preset_name = self.preset_index.and_then(|i| {
            let keys = self.store.preset_keys();
            keys.get(i)
                .and_then(|key| self.store.preset(key))
                .map(|preset| preset.name.clone())
        });
        DisplayState {
            rows,
            playing: playback.is_playing,
            playing_step: playback.is_playing.then_some(playback.current_step),
            cursor: (self.cursor_row, self.cursor_step),
            bpm: playback.bpm,
            total_steps: playback.total_steps,
            loop_count: stats.loop_count,
            global_intensity: (
                engine_stats.global_intensity.weak,
                engine_stats.global_intensity.strong,
            ),
            active_effects: engine_stats.active_effects,
            device_available: engine_stats.device_available,
            preset_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptics::NullDevice;

    fn app() -> App {
        App::new(Box::new(NullDevice))
    }

    #[test]
    fn toggle_at_cursor_reaches_the_sequencer() {
        let mut app = app();
        app.handle_input(InputEvent::CursorRight);
        app.handle_input(InputEvent::ToggleStep);
        assert!(app.store.current().get("Kick", 1));
        // the sequencer got the snapshot: stepping to 1 plays the kick
        app.sequencer.step_forward();
        assert_eq!(app.sequencer.preview_step(1), Some(vec!["Kick".to_string()]));
    }

    #[test]
    fn step_count_cycles_through_supported_sizes() {
        let mut app = app();
        assert_eq!(app.store.current().len(), 16);
        app.handle_input(InputEvent::CycleStepCount);
        assert_eq!(app.store.current().len(), 32);
        assert_eq!(app.sequencer.playback_state().total_steps, 32);
        app.handle_input(InputEvent::CycleStepCount);
        app.handle_input(InputEvent::CycleStepCount);
        assert_eq!(app.store.current().len(), 8);
    }

    #[test]
    fn bpm_adjust_respects_bounds() {
        let mut app = app();
        for _ in 0..40 {
            app.handle_input(InputEvent::BpmAdjust(1));
        }
        assert_eq!(app.sequencer.bpm(), 200);
        for _ in 0..80 {
            app.handle_input(InputEvent::BpmAdjust(-1));
        }
        assert_eq!(app.sequencer.bpm(), 60);
    }

    #[test]
    fn preset_cycling_tracks_the_name() {
        let mut app = app();
        assert!(app.display_state().preset_name.is_none());
        app.handle_input(InputEvent::NextPreset);
        let first = app.display_state().preset_name;
        assert!(first.is_some());
        app.handle_input(InputEvent::NextPreset);
        assert_ne!(app.display_state().preset_name, first);
        // editing clears the preset label
        app.handle_input(InputEvent::ToggleStep);
        assert!(app.display_state().preset_name.is_none());
    }

    #[test]
    fn cursor_wraps_on_both_axes() {
        let mut app = app();
        app.handle_input(InputEvent::CursorUp);
        assert_eq!(app.display_state().cursor.0, INSTRUMENTS.len() - 1);
        app.handle_input(InputEvent::CursorLeft);
        assert_eq!(app.display_state().cursor.1, 15);
    }

    #[test]
    fn intensity_adjust_clamps() {
        let mut app = app();
        for _ in 0..20 {
            app.handle_input(InputEvent::IntensityAdjust(0.1));
        }
        assert_eq!(app.display_state().global_intensity, (1.0, 1.0));
    }
}
