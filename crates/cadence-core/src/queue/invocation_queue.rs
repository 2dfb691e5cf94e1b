//! InvocationQueue - スレッドセーフな Invocation の両端キュー
//!
//! # 学習ポイント
//! - `std::sync::Mutex` で全操作を直列化（ロックを await 越しに保持しない）
//! - 通常は FIFO、リトライは自分より後の run_at を持つ最初の要素の前に差し込む
//! - counter による削除は O(n) の走査

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::Invocation;

/// Ordered, thread-safe collection of invocations.
///
/// All operations take the internal lock, so a `remove` from an execution
/// task never observes a half-applied `dequeue` from the scheduling loop.
#[derive(Debug, Default)]
pub struct InvocationQueue {
    members: Mutex<VecDeque<Invocation>>,
}

impl InvocationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Invocation>> {
        // No operation can panic half-way through a mutation, so a poisoned
        // lock still guards a consistent deque.
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue_at_tail(&self, invocation: Invocation) {
        self.lock().push_back(invocation);
    }

    /// Jump ahead of everything already queued.
    pub fn enqueue_at_head(&self, invocation: Invocation) {
        self.lock().push_front(invocation);
    }

    /// Insert ahead of the first member due strictly later than `invocation`.
    ///
    /// Members already due at or before its `run_at` keep their place.
    pub fn enqueue_before_later(&self, invocation: Invocation) {
        let mut members = self.lock();
        let index = members
            .iter()
            .position(|queued| queued.run_at > invocation.run_at)
            .unwrap_or(members.len());
        members.insert(index, invocation);
    }

    pub fn peek_head(&self) -> Option<Invocation> {
        self.lock().front().cloned()
    }

    pub fn peek_tail(&self) -> Option<Invocation> {
        self.lock().back().cloned()
    }

    pub fn dequeue(&self) -> Option<Invocation> {
        self.lock().pop_front()
    }

    /// Remove the head only if it is still the invocation identified by `counter`.
    ///
    /// The scheduling loop peeks, decides, then takes; a manual
    /// trigger or retry inserted in between must not be taken by mistake.
    pub fn dequeue_if_head(&self, counter: u64) -> Option<Invocation> {
        let mut members = self.lock();
        if members.front().is_some_and(|head| head.counter == counter) {
            members.pop_front()
        } else {
            None
        }
    }

    /// Unlink the member with `counter`. No-op if absent.
    pub fn remove(&self, counter: u64) -> Option<Invocation> {
        let mut members = self.lock();
        let index = members.iter().position(|inv| inv.counter == counter)?;
        members.remove(index)
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Head-to-tail snapshot.
    pub fn contents(&self) -> Vec<Invocation> {
        self.lock().iter().cloned().collect()
    }
}
