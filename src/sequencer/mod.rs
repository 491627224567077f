// The step scheduler: walks the pattern grid at a fixed tempo and turns each
// step into one combined rumble. Two states, Stopped and Playing; the tick
// task is the only thing that advances the step while playing, and this
// module is the only mutator of playback state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::engine::{PlayOptions, VibrationEngine};
use crate::pattern::Pattern;
use crate::shared::{BPM_MAX, BPM_MIN, DEFAULT_BPM, DEFAULT_STEPS, VALID_STEP_COUNTS};

mod events;
mod timer;

pub use events::{EventListeners, ListenerId};
pub use timer::RepeatingTask;

// Gap between stop and re-play when a live tempo change forces the tick task
// to be rebuilt with a new interval.
const RESTART_SETTLE: Duration = Duration::from_millis(50);

/// One step is a 16th note in 4/4, regardless of pattern length: longer
/// patterns span more bars at the same tempo.
pub fn step_duration_ms(bpm: u32) -> f64 {
    60.0 / bpm as f64 / 4.0 * 1000.0
}

pub fn step_duration(bpm: u32) -> Duration {
    Duration::from_secs_f64(60.0 / bpm as f64 / 4.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_step: usize,
    pub total_steps: usize,
    pub bpm: u32,
    pub step_duration: Duration,
    pub progress: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PlaybackStats {
    pub steps_executed: u64,
    pub loop_count: u64,
    pub elapsed: Option<Duration>,
}

#[derive(Default)]
struct StatsCore {
    start_time: Option<Instant>,
    steps_executed: u64,
    loop_count: u64,
}

struct PlaybackCore {
    pattern: Option<Pattern>,
    bpm: u32,
    total_steps: usize,
    current_step: usize,
    is_playing: bool,
    stats: StatsCore,
}

#[derive(Clone)]
pub struct Sequencer {
    state: Arc<Mutex<PlaybackCore>>,
    listeners: Arc<Mutex<EventListeners>>,
    engine: Arc<Mutex<VibrationEngine>>,
    task: Arc<Mutex<Option<RepeatingTask>>>,
}

impl Sequencer {
    pub fn new(engine: Arc<Mutex<VibrationEngine>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PlaybackCore {
                pattern: None,
                bpm: DEFAULT_BPM,
                total_steps: DEFAULT_STEPS,
                current_step: 0,
                is_playing: false,
                stats: StatsCore::default(),
            })),
            listeners: Arc::new(Mutex::new(EventListeners::default())),
            engine,
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// Load a pattern snapshot; the step count is derived from its rows.
    pub fn set_pattern(&self, pattern: Pattern) {
        let mut core = self.state.lock().unwrap();
        core.total_steps = pattern.len();
        if core.current_step >= core.total_steps {
            core.current_step = 0;
        }
        core.pattern = Some(pattern);
    }

    pub fn bpm(&self) -> u32 {
        self.state.lock().unwrap().bpm
    }

    /// Clamp into [60,200]. A live change rebuilds the tick task, so the
    /// restart gap from stop to play is audible by design.
    pub fn set_bpm(&self, bpm: u32) -> u32 {
        let clamped = bpm.clamp(BPM_MIN, BPM_MAX);
        let restart = {
            let mut core = self.state.lock().unwrap();
            let changed = clamped != core.bpm;
            core.bpm = clamped;
            changed && core.is_playing
        };
        if restart {
            self.restart();
        }
        clamped
    }

    /// Only 8/16/32/64 are playable; anything else is coerced to 16.
    pub fn set_total_steps(&self, steps: usize) -> usize {
        let steps = if VALID_STEP_COUNTS.contains(&steps) {
            steps
        } else {
            warn!("invalid step count {steps}, using {DEFAULT_STEPS}");
            DEFAULT_STEPS
        };
        let restart = {
            let mut core = self.state.lock().unwrap();
            core.total_steps = steps;
            if core.current_step >= steps {
                core.current_step = 0;
            }
            core.is_playing
        };
        if restart {
            self.restart();
        }
        steps
    }

    pub fn current_step(&self) -> usize {
        self.state.lock().unwrap().current_step
    }

    /// Manual playhead placement, clamped into range.
    pub fn set_current_step(&self, step: usize) {
        let mut core = self.state.lock().unwrap();
        core.current_step = step.min(core.total_steps.saturating_sub(1));
    }

    pub fn playback_state(&self) -> PlaybackState {
        let core = self.state.lock().unwrap();
        PlaybackState {
            is_playing: core.is_playing,
            current_step: core.current_step,
            total_steps: core.total_steps,
            bpm: core.bpm,
            step_duration: step_duration(core.bpm),
            progress: core.current_step as f64 / core.total_steps as f64,
        }
    }

    /// Start playback from step 0. Fails (false) when already playing or no
    /// pattern is loaded. Step 0 executes immediately, not after the first
    /// interval, so there is no perceptible startup gap.
    pub fn play(&self) -> bool {
        let interval = {
            let mut core = self.state.lock().unwrap();
            if core.is_playing || core.pattern.is_none() {
                return false;
            }
            core.is_playing = true;
            core.current_step = 0;
            core.stats.start_time = Some(Instant::now());
            info!("sequencer started: {} bpm, {} steps", core.bpm, core.total_steps);
            step_duration(core.bpm)
        };
        emit_play(&self.listeners);

        let state = self.state.clone();
        let engine = self.engine.clone();
        let listeners = self.listeners.clone();
        let task = RepeatingTask::spawn(interval, move || {
            step_once(&state, &engine, &listeners, true);
        });
        *self.task.lock().unwrap() = Some(task);
        true
    }

    /// Stop playback. Fails (false) when already stopped. The current step
    /// keeps its last value so the stop position can still be inspected.
    pub fn stop(&self) -> bool {
        {
            let mut core = self.state.lock().unwrap();
            if !core.is_playing {
                return false;
            }
            core.is_playing = false;
        }
        if let Some(task) = self.task.lock().unwrap().take() {
            task.cancel();
        }
        // best effort; a dead device must not keep the transport stuck
        let _ = self.engine.lock().unwrap().stop_all_vibrations();
        info!("sequencer stopped");
        emit_stop(&self.listeners);
        true
    }

    pub fn toggle(&self) -> bool {
        if self.state.lock().unwrap().is_playing {
            self.stop()
        } else {
            self.play()
        }
    }

    fn restart(&self) {
        if self.stop() {
            std::thread::sleep(RESTART_SETTLE);
            self.play();
        }
    }

    /// Execute the current step and advance, for manual scrubbing. Only
    /// while stopped.
    pub fn step_forward(&self) -> bool {
        if self.state.lock().unwrap().is_playing {
            return false;
        }
        step_once(&self.state, &self.engine, &self.listeners, false);
        true
    }

    pub fn step_backward(&self) -> bool {
        let mut core = self.state.lock().unwrap();
        if core.is_playing {
            return false;
        }
        core.current_step = if core.current_step == 0 {
            core.total_steps - 1
        } else {
            core.current_step - 1
        };
        true
    }

    pub fn go_to_start(&self) -> bool {
        let mut core = self.state.lock().unwrap();
        if core.is_playing {
            return false;
        }
        core.current_step = 0;
        true
    }

    /// Play the instruments of an arbitrary step without moving the
    /// playhead. None when the index is out of range or nothing is loaded.
    pub fn preview_step(&self, step: usize) -> Option<Vec<String>> {
        let active = {
            let core = self.state.lock().unwrap();
            if step >= core.total_steps {
                return None;
            }
            core.pattern.as_ref()?.active_at(step)
        };
        if !active.is_empty() {
            let _ = self
                .engine
                .lock()
                .unwrap()
                .play_step(&active, PlayOptions::default());
        }
        Some(active)
    }

    pub fn stats(&self) -> PlaybackStats {
        let core = self.state.lock().unwrap();
        PlaybackStats {
            steps_executed: core.stats.steps_executed,
            loop_count: core.stats.loop_count,
            elapsed: core.stats.start_time.map(|t| t.elapsed()),
        }
    }

    pub fn reset_stats(&self) {
        self.state.lock().unwrap().stats = StatsCore::default();
    }

    // listener registration, one registry per event kind

    pub fn on_play(&self, f: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.listeners.lock().unwrap().add_play(f)
    }

    pub fn on_stop(&self, f: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.listeners.lock().unwrap().add_stop(f)
    }

    pub fn on_step(&self, f: impl Fn(usize, &[String]) + Send + Sync + 'static) -> ListenerId {
        self.listeners.lock().unwrap().add_step(f)
    }

    pub fn on_loop(&self, f: impl Fn(u64) + Send + Sync + 'static) -> ListenerId {
        self.listeners.lock().unwrap().add_loop(f)
    }

    pub fn remove_play_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().unwrap().remove_play(id)
    }

    pub fn remove_stop_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().unwrap().remove_stop(id)
    }

    pub fn remove_step_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().unwrap().remove_step(id)
    }

    pub fn remove_loop_listener(&self, id: ListenerId) -> bool {
        self.listeners.lock().unwrap().remove_loop(id)
    }
}

// One tick: execute the current step, then advance. Free function so the
// tick task only captures the shared pieces, not a Sequencer handle.
// Listener fan-out happens with no lock held, so listeners may call stop().
fn step_once(
    state: &Mutex<PlaybackCore>,
    engine: &Mutex<VibrationEngine>,
    listeners: &Mutex<EventListeners>,
    require_playing: bool,
) {
    let executed = {
        let mut core = state.lock().unwrap();
        if require_playing && !core.is_playing {
            return;
        }
        match &core.pattern {
            Some(pattern) => {
                let step = core.current_step;
                let active = pattern.active_at(step);
                core.stats.steps_executed += 1;
                Some((step, active))
            }
            None => None,
        }
    };

    if let Some((step, active)) = &executed {
        if !active.is_empty() {
            // haptic failures are non-fatal, the clock keeps running
            let ok = engine
                .lock()
                .unwrap()
                .play_step(active, PlayOptions::default());
            if !ok {
                debug!("haptic request failed at step {step}");
            }
        }
        let snapshot = listeners.lock().unwrap().step_snapshot();
        for f in snapshot {
            f(*step, active);
        }
    }

    let looped = {
        let mut core = state.lock().unwrap();
        // a step listener may have stopped us mid-step; leave the playhead
        if require_playing && !core.is_playing {
            return;
        }
        core.current_step = (core.current_step + 1) % core.total_steps;
        if core.current_step == 0 {
            core.stats.loop_count += 1;
            Some(core.stats.loop_count)
        } else {
            None
        }
    };
    if let Some(count) = looped {
        let snapshot = listeners.lock().unwrap().loop_snapshot();
        for f in snapshot {
            f(count);
        }
    }
}

fn emit_play(listeners: &Mutex<EventListeners>) {
    let snapshot = listeners.lock().unwrap().play_snapshot();
    for f in snapshot {
        f();
    }
}

fn emit_stop(listeners: &Mutex<EventListeners>) {
    let snapshot = listeners.lock().unwrap().stop_snapshot();
    for f in snapshot {
        f();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::haptics::VibrationRequest;
    use crate::haptics::testing::RecordingDevice;
    use crate::pattern::PatternStore;

    fn sequencer_with_recorder() -> (Sequencer, Arc<Mutex<Vec<VibrationRequest>>>) {
        let (device, requests) = RecordingDevice::new();
        let engine = Arc::new(Mutex::new(VibrationEngine::new(Box::new(device))));
        (Sequencer::new(engine), requests)
    }

    fn kick_pattern() -> Pattern {
        // Kick on 0, 4, 8, 12 of a 16-step bar
        let mut store = PatternStore::new();
        assert!(store.load_preset("kick"));
        store.snapshot()
    }

    #[test]
    fn bpm_is_clamped_on_every_set() {
        let (seq, _) = sequencer_with_recorder();
        assert_eq!(seq.set_bpm(10), 60);
        assert_eq!(seq.set_bpm(999), 200);
        assert_eq!(seq.set_bpm(140), 140);
        assert_eq!(seq.bpm(), 140);
    }

    #[test]
    fn step_duration_formula() {
        assert_eq!(step_duration_ms(120), 125.0);
        assert_eq!(step_duration_ms(60), 250.0);
        assert_eq!(step_duration_ms(200), 75.0);
        assert_eq!(step_duration(120), Duration::from_millis(125));
    }

    #[test]
    fn invalid_step_counts_coerce_to_sixteen() {
        let (seq, _) = sequencer_with_recorder();
        for bad in [0, 7, 12, 17, 128] {
            assert_eq!(seq.set_total_steps(bad), 16);
        }
        assert_eq!(seq.set_total_steps(64), 64);
    }

    #[test]
    fn shrinking_step_count_resets_out_of_range_playhead() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_total_steps(32);
        seq.set_current_step(30);
        seq.set_total_steps(8);
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn play_requires_a_pattern() {
        let (seq, _) = sequencer_with_recorder();
        assert!(!seq.play());
        seq.set_pattern(kick_pattern());
        assert!(seq.play());
        assert!(!seq.play()); // already playing
        assert!(seq.stop());
    }

    #[test]
    fn stop_when_stopped_is_a_reported_noop() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        let before = seq.playback_state();
        assert!(!seq.stop());
        assert_eq!(seq.playback_state(), before);
    }

    #[test]
    fn first_step_fires_immediately() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        seq.set_bpm(60); // 250ms per step, slow enough to observe only step 0

        let steps: Arc<Mutex<Vec<(usize, Vec<String>)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = steps.clone();
        seq.on_step(move |step, active| sink.lock().unwrap().push((step, active.to_vec())));

        assert!(seq.play());
        std::thread::sleep(Duration::from_millis(60));
        assert!(seq.stop());

        let steps = steps.lock().unwrap();
        assert_eq!(steps.first(), Some(&(0, vec!["Kick".to_string()])));
        assert_eq!(steps.len(), 1); // no interval elapsed yet
    }

    #[test]
    fn two_manual_loops_hit_the_expected_steps() {
        // the spec scenario: 16-step kick pattern, two full loops
        let (seq, requests) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());

        let steps: Arc<Mutex<Vec<(usize, Vec<String>)>>> = Arc::new(Mutex::new(Vec::new()));
        let loops: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let step_sink = steps.clone();
        seq.on_step(move |step, active| step_sink.lock().unwrap().push((step, active.to_vec())));
        let loop_sink = loops.clone();
        seq.on_loop(move |count| loop_sink.lock().unwrap().push(count));

        for _ in 0..32 {
            assert!(seq.step_forward());
        }

        let steps = steps.lock().unwrap();
        assert_eq!(steps.len(), 32);
        for (i, (step, active)) in steps.iter().enumerate() {
            assert_eq!(*step, i % 16);
            if step % 4 == 0 {
                assert_eq!(active, &vec!["Kick".to_string()]);
            } else {
                assert!(active.is_empty());
            }
        }
        assert_eq!(*loops.lock().unwrap(), vec![1, 2]);
        assert_eq!(seq.current_step(), 0);
        // one rumble per kick hit, 4 per loop
        assert_eq!(requests.lock().unwrap().len(), 8);
        assert_eq!(seq.stats().loop_count, 2);
        assert_eq!(seq.stats().steps_executed, 32);
    }

    #[test]
    fn scrubbing_is_rejected_while_playing() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        assert!(seq.play());
        assert!(!seq.step_forward());
        assert!(!seq.step_backward());
        assert!(!seq.go_to_start());
        assert!(seq.stop());
    }

    #[test]
    fn step_backward_wraps_to_the_end() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        assert_eq!(seq.current_step(), 0);
        assert!(seq.step_backward());
        assert_eq!(seq.current_step(), 15);
        assert!(seq.step_backward());
        assert_eq!(seq.current_step(), 14);
        assert!(seq.go_to_start());
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn live_bpm_change_restarts_playback() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        let plays = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let p = plays.clone();
        seq.on_play(move || {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let s = stops.clone();
        seq.on_stop(move || {
            s.fetch_add(1, Ordering::SeqCst);
        });

        assert!(seq.play());
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        seq.set_bpm(180); // tick interval must be rebuilt
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(plays.load(Ordering::SeqCst), 2);
        assert!(seq.playback_state().is_playing);

        seq.set_bpm(180); // unchanged value, no restart
        assert_eq!(plays.load(Ordering::SeqCst), 2);

        assert!(seq.stop());
    }

    #[test]
    fn listeners_detach_individually() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = seq.on_step(move |_, _| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(seq.step_forward());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(seq.remove_step_listener(id));
        assert!(!seq.remove_step_listener(id));
        assert!(seq.step_forward());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_step_listener_may_stop_playback() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        seq.set_bpm(200); // 75ms steps so the test stays quick

        let stopper = seq.clone();
        seq.on_step(move |step, _| {
            if step >= 2 {
                stopper.stop();
            }
        });

        assert!(seq.play());
        std::thread::sleep(Duration::from_millis(400));
        let state = seq.playback_state();
        assert!(!state.is_playing);
        // the stop left the playhead where the listener fired
        assert_eq!(state.current_step, 2);
    }

    #[test]
    fn preview_does_not_move_the_playhead() {
        let (seq, requests) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        assert_eq!(seq.preview_step(4), Some(vec!["Kick".to_string()]));
        assert_eq!(seq.preview_step(1), Some(vec![]));
        assert_eq!(seq.preview_step(99), None);
        assert_eq!(seq.current_step(), 0);
        assert_eq!(requests.lock().unwrap().len(), 1); // only the kick preview rumbled
    }

    #[test]
    fn stats_reset() {
        let (seq, _) = sequencer_with_recorder();
        seq.set_pattern(kick_pattern());
        for _ in 0..5 {
            seq.step_forward();
        }
        assert_eq!(seq.stats().steps_executed, 5);
        seq.reset_stats();
        let stats = seq.stats();
        assert_eq!(stats.steps_executed, 0);
        assert_eq!(stats.loop_count, 0);
        assert!(stats.elapsed.is_none());
    }
}
