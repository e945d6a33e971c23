//! Rendering-loop style frame scheduling
//!
//! A capture session asks its scheduler for one frame callback at a time and
//! re-arms after every callback, the way a browser animation-frame loop does.
//! Stopping a session cancels the outstanding request; callbacks that arrive
//! for a cancelled request are ignored by the session.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Identifier of one outstanding frame request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameRequestId(pub u64);

/// Host-side scheduler for frame callbacks
pub trait FrameScheduler {
    /// Ask for a callback on the next frame
    fn request_frame(&mut self) -> FrameRequestId;

    /// Withdraw a request. Cancelling an unknown or already fired id is a no-op.
    fn cancel_frame(&mut self, id: FrameRequestId);
}

impl<S: FrameScheduler + ?Sized> FrameScheduler for &mut S {
    fn request_frame(&mut self) -> FrameRequestId {
        (**self).request_frame()
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        (**self).cancel_frame(id)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    pending: VecDeque<FrameRequestId>,
    cancelled: u64,
}

/// Scheduler whose frames are fired by hand. Clones share one queue, so the
/// host keeps a clone to drive the session that owns the original.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<QueueState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest outstanding request, as a display refresh would
    pub fn next_frame(&self) -> Option<FrameRequestId> {
        self.state.borrow_mut().pending.pop_front()
    }

    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Number of requests withdrawn before they fired
    pub fn cancelled_count(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequestId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = FrameRequestId(state.next_id);
        state.pending.push_back(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        let mut state = self.state.borrow_mut();
        let before = state.pending.len();
        state.pending.retain(|pending| *pending != id);
        if state.pending.len() != before {
            state.cancelled += 1;
        }
    }
}
