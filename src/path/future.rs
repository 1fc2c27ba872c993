use crate::entities::movement::StepType;
use crate::path::request::{PathRequest, Route};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

/// A path search running off the tick thread. The owning pawn polls it once
/// per tick; a cancelled future never hands out its route.
#[derive(Debug)]
pub struct FutureRoute {
    cancel: Arc<AtomicBool>,
    pub request: PathRequest,
    pub step_type: StepType,
    pub detect_collision: bool,
    /// Sequence number of the walk request, shared with suspended tasks
    /// awaiting this route.
    pub seq: u64,
    pub awaited: bool,
    receiver: Receiver<Route>,
    route: Option<Route>,
    completed: bool,
}

impl FutureRoute {
    pub fn new(
        cancel: Arc<AtomicBool>,
        request: PathRequest,
        step_type: StepType,
        detect_collision: bool,
        receiver: Receiver<Route>,
    ) -> Self {
        Self {
            cancel,
            request,
            step_type,
            detect_collision,
            seq: 0,
            awaited: false,
            receiver,
            route: None,
            completed: false,
        }
    }

    pub fn with_seq(mut self, seq: u64, awaited: bool) -> Self {
        self.seq = seq;
        self.awaited = awaited;
        self
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Checks the worker channel without blocking. A worker that went away
    /// completes the future with a failed route.
    pub fn poll(&mut self) -> bool {
        if self.completed {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(route) => {
                self.route = Some(route);
                self.completed = true;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.route = Some(Route::failed(self.request.start));
                self.completed = true;
            }
        }
        self.completed
    }

    /// The finished route, unless the future was cancelled.
    pub fn take_route(&mut self) -> Option<Route> {
        if self.is_cancelled() {
            return None;
        }
        self.route.take()
    }
}
