//! Shutdown coordination between the signal watcher and the forwarding loop.
//!
//! The watcher owns a [`ShutdownHandle`]; the loop owns a [`DeliveryStream`]
//! subscribed to the same handle. Triggering shutdown stops the stream from
//! waiting for new deliveries. Deliveries the source already holds are still
//! handed out, so nothing the broker pushed before the stop is silently
//! dropped. A delivery already handed out is never interrupted.

use std::future::Future;
use std::pin::Pin;

use futures::future::FutureExt;
use futures::stream::{Stream, StreamExt};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::delivery::Delivery;

/// Cloneable trigger that stops every [`DeliveryStream`] subscribed to it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver that observes the shutdown flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

type BoxedDeliveries = Pin<Box<dyn Stream<Item = Delivery> + Send>>;
type BoxedCancel = Pin<Box<dyn Future<Output = ()> + Send>>;

/// How the stream empties its source once shutdown is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    /// The source was asked to stop; pull until it ends on its own.
    UntilEnd,
    /// No way to stop the source; hand out what is ready, then close.
    Ready,
}

enum Pulled {
    Item(Option<Delivery>),
    Stop,
}

/// Inbound deliveries that wind down when shutdown is requested.
///
/// On shutdown the stream runs its cancel hook, if any, and keeps yielding
/// until the source ends. Without a hook it yields only what the source has
/// ready and then closes. [`DeliveryStream::close`] stops immediately.
pub struct DeliveryStream {
    inner: Option<BoxedDeliveries>,
    cancel: Option<BoxedCancel>,
    drain: Option<Drain>,
    shutdown_rx: watch::Receiver<bool>,
}

impl DeliveryStream {
    /// Wrap a delivery source so that `shutdown` can stop it.
    pub fn new<S>(deliveries: S, shutdown: &ShutdownHandle) -> Self
    where
        S: Stream<Item = Delivery> + Send + 'static,
    {
        Self {
            inner: Some(Box::pin(deliveries)),
            cancel: None,
            drain: None,
            shutdown_rx: shutdown.subscribe(),
        }
    }

    /// Wrap a delivery source that `cancel` tells to stop producing.
    ///
    /// `cancel` runs once when shutdown is requested. The source must end
    /// after it completes, and everything it yields until then is handed out.
    pub fn with_cancel<S, F>(deliveries: S, shutdown: &ShutdownHandle, cancel: F) -> Self
    where
        S: Stream<Item = Delivery> + Send + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            cancel: Some(Box::pin(cancel)),
            ..Self::new(deliveries, shutdown)
        }
    }

    /// Pull the next delivery.
    ///
    /// Returns `None` once the source is exhausted, or once it has been
    /// drained after shutdown; after that it keeps returning `None`.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            let inner = self.inner.as_mut()?;

            let pulled = match self.drain {
                Some(Drain::UntilEnd) => Pulled::Item(inner.next().await),
                Some(Drain::Ready) => Pulled::Item(inner.next().now_or_never().flatten()),
                None => tokio::select! {
                    biased;
                    () = stop_requested(&mut self.shutdown_rx) => Pulled::Stop,
                    item = inner.next() => Pulled::Item(item),
                },
            };

            match pulled {
                Pulled::Stop => self.begin_drain().await,
                Pulled::Item(None) => {
                    self.close();
                    return None;
                }
                Pulled::Item(item) => return item,
            }
        }
    }

    async fn begin_drain(&mut self) {
        let drain = match self.cancel.take() {
            Some(cancel) => {
                cancel.await;
                Drain::UntilEnd
            }
            None => Drain::Ready,
        };
        debug!(?drain, "shutdown requested, draining delivery stream");
        self.drain = Some(drain);
    }

    /// Close the stream at once, dropping the source and anything it holds.
    pub fn close(&mut self) {
        self.cancel = None;
        if self.inner.take().is_some() {
            debug!("delivery stream closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether shutdown was observed and the stream is winding down.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.drain.is_some()
    }
}

/// Resolve once shutdown is requested. If every handle is dropped without
/// triggering, shutdown can no longer happen and this never resolves.
async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolve once the process receives SIGINT or SIGTERM.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Spawn the task that turns a termination signal into a shutdown request.
pub fn spawn_signal_watcher(handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, stopping delivery stream");
        handle.trigger();
    })
}
