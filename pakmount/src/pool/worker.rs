//! Worker threads.
//!
//! A worker is a dedicated OS thread draining a request channel. Each
//! request carries a correlation id and a oneshot reply sender. Panics in a
//! job are caught and returned as an error reply; the thread keeps serving.
//!
//! Dropping a [`Worker`] closes its channel. The thread exits once its
//! current job (if any) returns. [`Worker::retire`] closes the channel and
//! hands back a receiver that resolves when the thread has exited, so the
//! pool can keep counting a hung thread against its category.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use super::config::TaskCategory;

/// Type-erased unit of work.
pub(crate) type Job = Box<dyn FnOnce() -> Box<dyn Any + Send> + Send>;

/// A job plus its routing information.
pub(crate) struct Request {
    pub id: u64,
    pub job: Job,
    pub reply: oneshot::Sender<Reply>,
}

/// Worker answer to a [`Request`].
pub(crate) struct Reply {
    pub id: u64,
    /// `Err` holds the panic message.
    pub outcome: Result<Box<dyn Any + Send>, String>,
}

/// Handle to one worker thread.
pub(crate) struct Worker {
    sender: mpsc::UnboundedSender<Request>,
    /// Closed when the thread exits.
    exited: oneshot::Receiver<()>,
}

impl Worker {
    pub(crate) fn spawn(
        category: TaskCategory,
        slot: usize,
        generation: u64,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (exit_tx, exited) = oneshot::channel::<()>();
        std::thread::Builder::new()
            .name(format!("pakmount-{}-{}.{}", category, slot, generation))
            .spawn(move || {
                let _exit = exit_tx;
                run(receiver)
            })?;
        Ok(Self { sender, exited })
    }

    /// Close the request channel and return the exit signal. The receiver
    /// completes (with an error) once the thread's current job returns.
    pub(crate) fn retire(self) -> oneshot::Receiver<()> {
        drop(self.sender);
        self.exited
    }

    /// Queue a request. Returns it back if the thread is gone.
    pub(crate) fn send(&self, request: Request) -> Result<(), Request> {
        self.sender.send(request).map_err(|e| e.0)
    }
}

fn run(mut receiver: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = receiver.blocking_recv() {
        let Request { id, job, reply } = request;
        trace!(request_id = id, "Worker executing job");
        let outcome = catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
        // Caller may have timed out and dropped the receiver.
        let _ = reply.send(Reply { id, outcome });
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
