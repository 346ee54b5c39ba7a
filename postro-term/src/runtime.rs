//! Blocking bridge to the async connection.
//!
//! The terminal is synchronous, every wait on the socket goes through [`Runtime::block_on`]
//! or [`Runtime::cancellable`]. The latter races the future against `SIGINT`: an interrupt
//! sends a cancel request to the server and keeps waiting, the server then fails the query
//! in band.
use std::{
    future::Future,
    io,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use postro_wire::CancelToken;
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Current thread runtime with an interrupt flag.
#[derive(Debug)]
pub struct Runtime {
    rt: tokio::runtime::Runtime,
    sigint: Option<Signal>,
    interrupted: AtomicBool,
}

impl Runtime {
    pub fn new() -> io::Result<Runtime> {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        // installing the handler keeps `SIGINT` from killing the process
        let sigint = {
            let _guard = rt.enter();
            match signal(SignalKind::interrupt()) {
                Ok(sigint) => Some(sigint),
                Err(err) => {
                    tracing::warn!(%err, "could not install interrupt handler");
                    None
                }
            }
        };

        Ok(Runtime { rt, sigint, interrupted: AtomicBool::new(false) })
    }

    /// An interrupt arrived since the flag was last cleared.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    /// Read and clear the interrupt flag.
    pub fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::Relaxed)
    }

    pub fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::Relaxed);
    }

    /// Run `fut` to completion, interrupts are only recorded.
    pub fn block_on<F: Future>(&mut self, fut: F) -> F::Output {
        self.cancellable(None, fut)
    }

    /// Run `fut` to completion, an interrupt sends a cancel request through `token`.
    pub fn cancellable<F: Future>(&mut self, token: Option<&CancelToken>, fut: F) -> F::Output {
        let Runtime { rt, sigint, interrupted } = self;
        rt.block_on(async {
            tokio::pin!(fut);
            loop {
                let Some(sigint) = sigint.as_mut() else {
                    return fut.await;
                };
                tokio::select! {
                    out = &mut fut => return out,
                    _ = sigint.recv() => {
                        interrupted.store(true, Ordering::Relaxed);
                        let Some(token) = token else { continue };
                        tracing::debug!(pid = token.process_id(), "sending cancel request");
                        match token.cancel().await {
                            Ok(()) => eprintln!("Cancel request sent"),
                            Err(err) => eprintln!("Could not send cancel request: {err}"),
                        }
                    }
                }
            }
        })
    }

    /// Sleep for `duration`, returns `false` when woken by an interrupt.
    pub fn sleep(&mut self, duration: Duration) -> bool {
        let Runtime { rt, sigint, interrupted } = self;
        rt.block_on(async {
            let sleep = tokio::time::sleep(duration);
            let Some(sigint) = sigint.as_mut() else {
                sleep.await;
                return true;
            };
            tokio::select! {
                _ = sleep => true,
                _ = sigint.recv() => {
                    interrupted.store(true, Ordering::Relaxed);
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn runs_futures_and_sleeps() {
        let mut rt = Runtime::new().unwrap();
        assert_eq!(rt.block_on(async { 40 + 2 }), 42);
        assert!(rt.sleep(Duration::from_millis(1)));
        assert!(!rt.interrupted());
        rt.set_interrupted();
        assert!(rt.take_interrupt());
        assert!(!rt.interrupted());
    }
}
