use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{trace, warn};

static FRAME_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_frame_lock_poison_once(operation: &'static str) {
    if FRAME_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "frame lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// Advisory lock a secondary thread takes before mutating the grid.
/// Reentrant: taking it again on the owning thread never blocks.
#[derive(Debug, Default)]
pub struct FrameLock {
    state: Mutex<LockState>,
    released: Condvar,
}

/// Held for the duration of a mutation batch; releases on drop.
#[derive(Debug)]
pub struct FrameGuard<'a> {
    lock: &'a FrameLock,
    // Must be dropped on the thread that acquired it.
    _not_send: PhantomData<*const ()>,
}

impl FrameLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> FrameGuard<'_> {
        let me = thread::current().id();
        let mut state = self.lock_state("acquire");
        if state.owner == Some(me) {
            state.depth = state.depth.saturating_add(1);
            return self.guard();
        }
        while state.owner.is_some() {
            state = match self.released.wait(state) {
                Ok(state) => state,
                Err(poisoned) => {
                    warn_frame_lock_poison_once("wait");
                    poisoned.into_inner()
                }
            };
        }
        state.owner = Some(me);
        state.depth = 1;
        trace!("frame_lock_acquired");
        self.guard()
    }

    pub fn try_acquire(&self) -> Option<FrameGuard<'_>> {
        let me = thread::current().id();
        let mut state = self.lock_state("try_acquire");
        match state.owner {
            Some(owner) if owner == me => {
                state.depth = state.depth.saturating_add(1);
            }
            Some(_) => return None,
            None => {
                state.owner = Some(me);
                state.depth = 1;
            }
        }
        Some(self.guard())
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.lock_state("query").owner == Some(thread::current().id())
    }

    pub fn is_held(&self) -> bool {
        self.lock_state("query").owner.is_some()
    }

    fn guard(&self) -> FrameGuard<'_> {
        FrameGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    fn release(&self) {
        let mut state = self.lock_state("release");
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.released.notify_one();
        }
    }

    fn lock_state(&self, operation: &'static str) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn_frame_lock_poison_once(operation);
            poisoned.into_inner()
        })
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
