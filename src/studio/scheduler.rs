use std::time::{Duration, Instant};

/// Deadline-ordered deferred work, polled from the event loop. Tasks with equal
/// deadlines run in the order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<T> {
    tasks: Vec<Scheduled<T>>,
    next_seq: u64,
}

#[derive(Debug)]
struct Scheduled<T> {
    due: Instant,
    seq: u64,
    task: T,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, due: Instant, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(Scheduled { due, seq, task });
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, task: T) {
        self.schedule_at(now + delay, task);
    }

    /// Removes and returns the earliest task due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        let index = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, scheduled)| scheduled.due <= now)
            .min_by_key(|(_, scheduled)| (scheduled.due, scheduled.seq))
            .map(|(index, _)| index)?;
        Some(self.tasks.swap_remove(index).task)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|scheduled| scheduled.due).min()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &T> {
        self.tasks.iter().map(|scheduled| &scheduled.task)
    }
}
