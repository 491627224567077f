// Pattern storage: a boolean grid keyed by the instrument roster, every row
// the same length. The sequencer only ever sees cloned snapshots of it.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::shared::{DEFAULT_STEPS, INSTRUMENTS, VALID_STEP_COUNTS, roster_position};

mod document;
mod presets;

pub use document::{DocumentMetadata, PatternDocument, load_document, save_document};
pub use presets::random_pattern;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    rows: HashMap<String, Vec<bool>>,
}

impl Pattern {
    pub fn empty(steps: usize) -> Self {
        let steps = if VALID_STEP_COUNTS.contains(&steps) {
            steps
        } else {
            warn!("invalid step count {steps}, using {DEFAULT_STEPS}");
            DEFAULT_STEPS
        };
        let rows = INSTRUMENTS
            .iter()
            .map(|&name| (name.to_string(), vec![false; steps]))
            .collect();
        Self { rows }
    }

    /// Normalize a foreign map onto the roster: non-roster rows are dropped,
    /// missing rows become silent, and every row is brought to one length
    /// (the first roster row with a supported length wins, else 16).
    pub fn from_map(map: HashMap<String, Vec<bool>>) -> Self {
        let steps = INSTRUMENTS
            .iter()
            .filter_map(|&name| map.get(name))
            .map(|row| row.len())
            .find(|len| VALID_STEP_COUNTS.contains(len))
            .unwrap_or(DEFAULT_STEPS);
        let rows = INSTRUMENTS
            .iter()
            .map(|&name| {
                let mut row = map.get(name).cloned().unwrap_or_default();
                row.resize(steps, false);
                (name.to_string(), row)
            })
            .collect();
        Self { rows }
    }

    /// Step count; rows are never empty and always share one length.
    pub fn len(&self) -> usize {
        self.rows.values().next().map(|row| row.len()).unwrap_or(0)
    }

    pub fn rows(&self) -> &HashMap<String, Vec<bool>> {
        &self.rows
    }

    pub fn get(&self, instrument: &str, step: usize) -> bool {
        self.rows
            .get(instrument)
            .and_then(|row| row.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn set_step(&mut self, instrument: &str, step: usize, value: bool) -> bool {
        match self.rows.get_mut(instrument).and_then(|row| row.get_mut(step)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn toggle_step(&mut self, instrument: &str, step: usize) -> bool {
        match self.rows.get_mut(instrument).and_then(|row| row.get_mut(step)) {
            Some(cell) => {
                *cell = !*cell;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for row in self.rows.values_mut() {
            row.fill(false);
        }
    }

    pub fn clear_instrument(&mut self, instrument: &str) -> bool {
        match self.rows.get_mut(instrument) {
            Some(row) => {
                row.fill(false);
                true
            }
            None => false,
        }
    }

    pub fn copy_instrument(&mut self, from: &str, to: &str) -> bool {
        let Some(source) = self.rows.get(from).cloned() else {
            return false;
        };
        match self.rows.get_mut(to) {
            Some(row) => {
                *row = source;
                true
            }
            None => false,
        }
    }

    pub fn invert_instrument(&mut self, instrument: &str) -> bool {
        match self.rows.get_mut(instrument) {
            Some(row) => {
                for cell in row.iter_mut() {
                    *cell = !*cell;
                }
                true
            }
            None => false,
        }
    }

    /// Rotate a row; positive shifts move hits later in the bar.
    pub fn shift_instrument(&mut self, instrument: &str, steps: i64) -> bool {
        let Some(row) = self.rows.get_mut(instrument) else {
            return false;
        };
        if row.is_empty() {
            return true;
        }
        let by = steps.rem_euclid(row.len() as i64) as usize;
        row.rotate_right(by);
        true
    }

    /// Change the step count: longer patterns repeat the existing material,
    /// shorter ones truncate. Unsupported sizes are rejected.
    pub fn resize(&mut self, new_steps: usize) -> bool {
        if !VALID_STEP_COUNTS.contains(&new_steps) {
            return false;
        }
        for row in self.rows.values_mut() {
            *row = row.iter().copied().cycle().take(new_steps).collect();
        }
        true
    }

    /// Instruments active on one step, in roster order.
    pub fn active_at(&self, step: usize) -> Vec<String> {
        let mut active: Vec<String> = self
            .rows
            .iter()
            .filter(|(_, row)| row.get(step).copied().unwrap_or(false))
            .map(|(name, _)| name.clone())
            .collect();
        active.sort_by_key(|name| (roster_position(name), name.clone()));
        active
    }

    pub fn stats(&self) -> PatternStats {
        let mut stats = PatternStats::default();
        for (name, row) in &self.rows {
            let active = row.iter().filter(|&&on| on).count();
            stats.total_steps += row.len();
            stats.active_steps += active;
            stats.instruments.insert(
                name.clone(),
                InstrumentStats {
                    total: row.len(),
                    active,
                    density: if row.is_empty() {
                        0.0
                    } else {
                        active as f64 / row.len() as f64
                    },
                },
            );
        }
        stats.global_density = if stats.total_steps == 0 {
            0.0
        } else {
            stats.active_steps as f64 / stats.total_steps as f64
        };
        stats
    }
}

#[derive(Clone, Debug, Default)]
pub struct PatternStats {
    pub total_steps: usize,
    pub active_steps: usize,
    pub global_density: f64,
    pub instruments: HashMap<String, InstrumentStats>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct InstrumentStats {
    pub total: usize,
    pub active: usize,
    pub density: f64,
}

#[derive(Clone, Debug)]
pub struct Preset {
    pub name: String,
    pub description: String,
    pub pattern: Pattern,
}

pub struct PatternStore {
    current: Pattern,
    presets: Vec<(String, Preset)>, // keyed, insertion-ordered
}

impl PatternStore {
    pub fn new() -> Self {
        Self {
            current: Pattern::empty(DEFAULT_STEPS),
            presets: presets::default_presets(),
        }
    }

    pub fn current(&self) -> &Pattern {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut Pattern {
        &mut self.current
    }

    /// Cloned snapshot for the sequencer.
    pub fn snapshot(&self) -> Pattern {
        self.current.clone()
    }

    pub fn set_current(&mut self, pattern: Pattern) {
        self.current = pattern;
    }

    pub fn preset_keys(&self) -> Vec<String> {
        self.presets.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn preset(&self, key: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, preset)| preset)
    }

    pub fn load_preset(&mut self, key: &str) -> bool {
        match self.preset(key) {
            Some(preset) => {
                self.current = preset.pattern.clone();
                true
            }
            None => false,
        }
    }

    pub fn save_preset(&mut self, key: &str, name: &str, description: &str) {
        let preset = Preset {
            name: name.to_string(),
            description: description.to_string(),
            pattern: self.current.clone(),
        };
        match self.presets.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = preset,
            None => self.presets.push((key.to_string(), preset)),
        }
    }

    pub fn delete_preset(&mut self, key: &str) -> bool {
        let before = self.presets.len();
        self.presets.retain(|(k, _)| k != key);
        self.presets.len() != before
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}
