// Cancellable repeating task, the replacement for a raw interval timer.
// Starting one returns a handle; cancelling is idempotent and safe from any
// thread, including the tick thread itself (it only signals, never joins).

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};

pub struct RepeatingTask {
    stop_tx: Sender<()>,
}

impl RepeatingTask {
    /// Run `f` immediately, then once per `interval`, until cancelled.
    pub fn spawn<F>(interval: Duration, mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        thread::spawn(move || {
            let ticker = tick(interval);
            // first fire happens right away, not after one interval
            f();
            loop {
                select! {
                    recv(ticker) -> _ => f(),
                    recv(stop_rx) -> _ => break,
                }
            }
        });
        Self { stop_tx }
    }

    pub fn cancel(&self) {
        let _ = self.stop_tx.try_send(());
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        // dropping the sender disconnects the stop channel, which also ends
        // the loop; the explicit send covers the case where the handle is
        // kept alive elsewhere
        self.cancel();
    }
}
