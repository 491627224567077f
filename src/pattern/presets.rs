// Built-in starting points, written as beat strings ("1000...") per
// instrument, one char per 16th.

use std::collections::HashMap;

use super::{Pattern, Preset};
use crate::shared::DEFAULT_STEPS;

fn pattern_from_strings(rows: &[(&str, &str)]) -> Pattern {
    let map: HashMap<String, Vec<bool>> = rows
        .iter()
        .map(|&(instrument, beat)| {
            (
                instrument.to_string(),
                beat.chars().map(|c| c == '1').collect(),
            )
        })
        .collect();
    Pattern::from_map(map)
}

pub fn random_pattern(density: f64) -> Pattern {
    let mut pattern = Pattern::empty(DEFAULT_STEPS);
    let rows: Vec<String> = pattern.rows().keys().cloned().collect();
    for instrument in rows {
        for step in 0..DEFAULT_STEPS {
            pattern.set_step(&instrument, step, fastrand::f64() < density);
        }
    }
    pattern
}

pub(super) fn default_presets() -> Vec<(String, Preset)> {
    let presets = [
        (
            "kick",
            "Kick Pattern",
            "Basic bass drum",
            vec![("Kick", "1000100010001000")],
        ),
        (
            "snare",
            "Snare Pattern",
            "Backbeat snare",
            vec![("Snare", "0000100000001000")],
        ),
        (
            "hihat",
            "Hi-Hat Pattern",
            "Straight eighths",
            vec![("Hi-Hat", "1010101010101010")],
        ),
        (
            "bass",
            "Bass Pattern",
            "Simple bassline",
            vec![("Bass", "1000001000100000")],
        ),
        (
            "pulse",
            "Pulse Pattern",
            "Continuous pulse",
            vec![("Lead", "1111111111111111")],
        ),
        (
            "classic_rock",
            "Classic Rock",
            "Kick, snare and hats",
            vec![
                ("Kick", "1000001000000000"),
                ("Snare", "0000100000001000"),
                ("Hi-Hat", "1010101010101010"),
            ],
        ),
        (
            "house",
            "House Beat",
            "Four on the floor",
            vec![
                ("Kick", "1000100010001000"),
                ("Hi-Hat", "0101010101010101"),
            ],
        ),
    ];

    let mut out: Vec<(String, Preset)> = presets
        .into_iter()
        .map(|(key, name, description, rows)| {
            (
                key.to_string(),
                Preset {
                    name: name.to_string(),
                    description: description.to_string(),
                    pattern: pattern_from_strings(&rows),
                },
            )
        })
        .collect();
    out.push((
        "random".to_string(),
        Preset {
            name: "Random Pattern".to_string(),
            description: "Sparse random fill".to_string(),
            pattern: random_pattern(0.3),
        },
    ));
    out
}
