//! In-process work queue shared by a pool of worker threads. Push-then-close
//! from the coordinator; blocking pop from workers until drained.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct JobQueue<T> {
    inner: Mutex<Inner<T>>,
    cv: Condvar,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock().expect("job queue lock poisoned");
        inner.items.push_back(item);
        self.cv.notify_one();
    }

    /// No more pushes; blocked consumers drain what remains and then see None.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("job queue lock poisoned");
        inner.closed = true;
        self.cv.notify_all();
    }

    /// Next job, blocking while the queue is open and empty. None once the
    /// queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("job queue lock poisoned");
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self.cv.wait(inner).expect("job queue lock poisoned");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("job queue lock poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn pops_in_fifo_order() {
        let queue = JobQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        queue.close();
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn closed_empty_queue_returns_none() {
        let queue: JobQueue<u32> = JobQueue::new();
        queue.close();
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn workers_drain_the_queue_exactly_once() {
        let queue = JobQueue::new();
        let consumed = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while queue.pop().is_some() {
                        consumed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
            for i in 0..100 {
                queue.push(i);
            }
            queue.close();
        });
        assert_eq!(consumed.load(Ordering::SeqCst), 100);
    }
}
