use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use vtimer_core::{Result, TimerError, TimerHandle};

use crate::timer::Timer;

/// Future that completes when a timeout on some [`Timer`] fires.
///
/// Resolves to [`TimerError::Cancelled`] if the timeout is cleared first
/// (the callback holding the sender is dropped).
#[derive(Debug)]
pub struct Sleep {
    handle: TimerHandle,
    rx: oneshot::Receiver<()>,
}

impl Sleep {
    /// The underlying timeout, e.g. for `clear_timeout`.
    pub fn handle(&self) -> &TimerHandle {
        &self.handle
    }
}

impl Future for Sleep {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|fired| fired.map_err(|_| TimerError::Cancelled))
    }
}

/// Schedule a timeout on `timer` and return a future for it.
pub fn sleep<T: Timer + ?Sized>(timer: &T, delay_ms: f64) -> Result<Sleep> {
    let (tx, rx) = oneshot::channel();
    let handle = timer.set_timeout(
        Box::new(move || {
            let _ = tx.send(());
        }),
        delay_ms,
    )?;
    Ok(Sleep { handle, rx })
}
