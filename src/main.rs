mod app;
mod engine;
mod haptics;
mod pattern;
mod sequencer;
mod shared;
mod tui;

use std::path::PathBuf;

use crossterm::terminal;
use log::info;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use app::App;
use haptics::NullDevice;
use pattern::Pattern;
use shared::InputEvent;

const INSTRUMENT_CONFIG: &str = ".rumbleseq/instruments.json";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    env_logger::init();

    let project_dir: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    // No controller backend is wired in yet; the null device keeps the whole
    // app usable for pattern editing and timing work.
    let mut app = App::new(Box::new(NullDevice));

    // optional per-project instrument tweaks, non-fatal if absent or broken
    let overlay = project_dir.join(INSTRUMENT_CONFIG);
    if overlay.exists() {
        app.engine.lock().unwrap().load_instrument_config(&overlay);
    }

    // pick up the pattern from the previous session
    if let Some(document) = pattern::load_document(&project_dir) {
        app.store
            .set_current(Pattern::from_map(document.pattern.rows().clone()));
        app.sync_pattern();
    }

    // lifecycle events go to the log; anything else that wants them can
    // register its own listeners the same way
    app.sequencer.on_play(|| info!("playback started"));
    app.sequencer.on_stop(|| info!("playback stopped"));
    app.sequencer
        .on_loop(|count| info!("loop {count} complete"));

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(33); // ~30fps

    loop {
        let ds = app.display_state();
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds);
        })?;

        let events = tui::input::poll_input(tick_rate)?;
        for event in events {
            if event == InputEvent::Quit {
                // save before quitting
                let _ = pattern::save_document(&project_dir, &app.store.export_document());
                app.sequencer.stop();
                drop(term);
                return Ok(());
            }
            app.handle_input(event);
        }
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
