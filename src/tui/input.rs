use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use crate::shared::InputEvent;

// Keybinds:
//   Space        play / stop
//   arrows       move the grid cursor
//   Enter        toggle the step under the cursor
//   [ / ]        bpm down / up
//   l            cycle pattern length (8 -> 16 -> 32 -> 64)
//   , / .        scrub one step back / forward (stopped only)
//   g            jump to step 0
//   c            clear the cursor's row
//   0            clear the whole pattern
//   p            next built-in preset
//   - / =        global intensity down / up
//   v            test rumble on both motors
//   Esc          quit

pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],

        KeyCode::Up => vec![InputEvent::CursorUp],
        KeyCode::Down => vec![InputEvent::CursorDown],
        KeyCode::Left => vec![InputEvent::CursorLeft],
        KeyCode::Right => vec![InputEvent::CursorRight],
        KeyCode::Enter => vec![InputEvent::ToggleStep],

        KeyCode::Char('[') => vec![InputEvent::BpmAdjust(-1)],
        KeyCode::Char(']') => vec![InputEvent::BpmAdjust(1)],
        KeyCode::Char('l') => vec![InputEvent::CycleStepCount],

        KeyCode::Char(',') => vec![InputEvent::StepBackward],
        KeyCode::Char('.') => vec![InputEvent::StepForward],
        KeyCode::Char('g') => vec![InputEvent::GoToStart],

        KeyCode::Char('c') => vec![InputEvent::ClearRow],
        KeyCode::Char('0') => vec![InputEvent::ClearPattern],
        KeyCode::Char('p') => vec![InputEvent::NextPreset],

        KeyCode::Char('-') => vec![InputEvent::IntensityAdjust(-0.1)],
        KeyCode::Char('=') => vec![InputEvent::IntensityAdjust(0.1)],
        KeyCode::Char('v') => vec![InputEvent::TestVibration],

        _ => vec![],
    }
}
