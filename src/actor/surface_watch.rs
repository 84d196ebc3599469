//! Debounced recomputation of a value derived from host layout.
//!
//! Host mutations, resizes and a slow fallback tick only mark the value
//! dirty; the recomputation itself runs at most once per frame. Results are
//! published on a watch channel and only when they change.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::common::log::trace_misc;
use crate::sys::host::HostSurface;

pub type Compute<T> = Box<dyn FnMut(&dyn HostSurface) -> T + Send>;

pub struct SurfaceWatch<T> {
    name: &'static str,
    host: Arc<dyn HostSurface>,
    frame: Duration,
    fallback: Duration,
    compute: Compute<T>,
    tx: Arc<watch::Sender<T>>,
}

impl<T> SurfaceWatch<T>
where T: PartialEq + Debug + Send + Sync + 'static
{
    pub fn new(
        name: &'static str,
        host: Arc<dyn HostSurface>,
        frame: Duration,
        fallback: Duration,
        tx: Arc<watch::Sender<T>>,
        compute: impl FnMut(&dyn HostSurface) -> T + Send + 'static,
    ) -> Self {
        Self {
            name,
            host,
            frame: frame.max(Duration::from_millis(1)),
            fallback: fallback.max(Duration::from_millis(1)),
            compute: Box::new(compute),
            tx,
        }
    }

    /// Spawns the watch on the current runtime. Cancelling `token` stops it.
    pub fn spawn(self, token: CancellationToken) { tokio::spawn(self.run(token)); }

    #[instrument(skip_all, fields(name = self.name))]
    pub async fn run(mut self, token: CancellationToken) {
        let mut events = self.host.subscribe();
        let mut fallback = tokio::time::interval(self.fallback);
        fallback.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut due: Option<Instant> = None;

        trace!("started");
        self.recompute();

        loop {
            let frame_due = due;
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = async {
                    match frame_due {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => {
                    due = None;
                    self.recompute();
                }
                event = events.recv() => match event {
                    Ok(_) | Err(RecvError::Lagged(_)) => self.schedule(&mut due),
                    Err(RecvError::Closed) => {
                        trace!("host closed");
                        break;
                    }
                },
                _ = fallback.tick() => self.schedule(&mut due),
            }
        }
        trace!("stopped");
    }

    fn schedule(&self, due: &mut Option<Instant>) {
        if due.is_none() {
            *due = Some(Instant::now() + self.frame);
        }
    }

    fn recompute(&mut self) {
        let value = trace_misc(self.name, || (self.compute)(self.host.as_ref()));
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            trace!(?value, "changed");
            *current = value;
            true
        });
    }
}
