// Playback lifecycle fan-out: one explicit registry per event kind rather
// than a generic bus, so listener signatures stay statically checked.
//
// Listeners are stored as Arcs so emitters can snapshot the list and invoke
// it without holding the registry lock; a listener is therefore free to call
// back into the sequencer (including stop()).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

fn next_listener_id() -> ListenerId {
    ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

pub type PlayListener = Arc<dyn Fn() + Send + Sync>;
pub type StopListener = Arc<dyn Fn() + Send + Sync>;
pub type StepListener = Arc<dyn Fn(usize, &[String]) + Send + Sync>;
pub type LoopListener = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
pub struct EventListeners {
    on_play: Vec<(ListenerId, PlayListener)>,
    on_stop: Vec<(ListenerId, StopListener)>,
    on_step: Vec<(ListenerId, StepListener)>,
    on_loop: Vec<(ListenerId, LoopListener)>,
}

fn remove_from<T>(list: &mut Vec<(ListenerId, T)>, id: ListenerId) -> bool {
    let before = list.len();
    list.retain(|(entry, _)| *entry != id);
    list.len() != before
}

impl EventListeners {
    pub fn add_play(&mut self, f: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let id = next_listener_id();
        self.on_play.push((id, Arc::new(f)));
        id
    }

    pub fn add_stop(&mut self, f: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let id = next_listener_id();
        self.on_stop.push((id, Arc::new(f)));
        id
    }

    pub fn add_step(&mut self, f: impl Fn(usize, &[String]) + Send + Sync + 'static) -> ListenerId {
        let id = next_listener_id();
        self.on_step.push((id, Arc::new(f)));
        id
    }

    pub fn add_loop(&mut self, f: impl Fn(u64) + Send + Sync + 'static) -> ListenerId {
        let id = next_listener_id();
        self.on_loop.push((id, Arc::new(f)));
        id
    }

    pub fn remove_play(&mut self, id: ListenerId) -> bool {
        remove_from(&mut self.on_play, id)
    }

    pub fn remove_stop(&mut self, id: ListenerId) -> bool {
        remove_from(&mut self.on_stop, id)
    }

    pub fn remove_step(&mut self, id: ListenerId) -> bool {
        remove_from(&mut self.on_step, id)
    }

    pub fn remove_loop(&mut self, id: ListenerId) -> bool {
        remove_from(&mut self.on_loop, id)
    }

    pub fn play_snapshot(&self) -> Vec<PlayListener> {
        self.on_play.iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn stop_snapshot(&self) -> Vec<StopListener> {
        self.on_stop.iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn step_snapshot(&self) -> Vec<StepListener> {
        self.on_step.iter().map(|(_, f)| f.clone()).collect()
    }

    pub fn loop_snapshot(&self) -> Vec<LoopListener> {
        self.on_loop.iter().map(|(_, f)| f.clone()).collect()
    }
}
