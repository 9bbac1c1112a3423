//! Frame-scheduled deferred tasks
//!
//! Tasks carry a due frame and a closure over some context `C`. The tick
//! driver takes the due tasks at the start of a frame and runs them in
//! (due frame, submission) order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

use super::types::ReplicationFrame;

pub type Task<C> = Box<dyn FnOnce(&mut C) + Send>;

pub struct ScheduledTask<C> {
    pub due: ReplicationFrame,
    pub name: &'static str,
    seq: u64,
    task: Task<C>,
}

impl<C> ScheduledTask<C> {
    pub fn run(self, context: &mut C) {
        trace!("Running scheduled task {} (due frame {})", self.name, self.due);
        (self.task)(context);
    }
}

impl<C> PartialEq for ScheduledTask<C> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<C> Eq for ScheduledTask<C> {}

impl<C> PartialOrd for ScheduledTask<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for ScheduledTask<C> {
    // Reversed: the heap pops the earliest (due, seq) first
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due, other.seq).cmp(&(self.due, self.seq))
    }
}

pub struct TaskScheduler<C> {
    heap: BinaryHeap<ScheduledTask<C>>,
    next_seq: u64,
}

impl<C> TaskScheduler<C> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn schedule<F>(&mut self, due: ReplicationFrame, name: &'static str, task: F)
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledTask {
            due,
            name,
            seq,
            task: Box::new(task),
        });
    }

    /// Remove and return every task due at or before `frame`, earliest first
    pub fn take_due(&mut self, frame: ReplicationFrame) -> Vec<ScheduledTask<C>> {
        let mut due = Vec::new();
        while self.heap.peek().map_or(false, |t| t.due <= frame) {
            if let Some(task) = self.heap.pop() {
                due.push(task);
            }
        }
        due
    }

    /// Run due tasks against a context that does not own the scheduler
    pub fn run_due(&mut self, frame: ReplicationFrame, context: &mut C) -> usize {
        let due = self.take_due(frame);
        let count = due.len();
        for task in due {
            task.run(context);
        }
        count
    }

    pub fn next_due(&self) -> Option<ReplicationFrame> {
        self.heap.peek().map(|t| t.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<C> Default for TaskScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for TaskScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("pending", &self.heap.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_in_due_then_submission_order() {
        let mut scheduler: TaskScheduler<Vec<&'static str>> = TaskScheduler::new();
        scheduler.schedule(5, "late", |log| log.push("late"));
        scheduler.schedule(2, "first", |log| log.push("first"));
        scheduler.schedule(2, "second", |log| log.push("second"));

        let mut log = Vec::new();
        assert_eq!(scheduler.run_due(1, &mut log), 0);
        assert_eq!(scheduler.run_due(3, &mut log), 2);
        assert_eq!(log, vec!["first", "second"]);
        assert_eq!(scheduler.next_due(), Some(5));

        assert_eq!(scheduler.run_due(10, &mut log), 1);
        assert_eq!(log, vec!["first", "second", "late"]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_take_due_leaves_future_tasks() {
        let mut scheduler: TaskScheduler<u32> = TaskScheduler::new();
        scheduler.schedule(1, "a", |n| *n += 1);
        scheduler.schedule(9, "b", |n| *n += 10);

        let due = scheduler.take_due(1);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].name, "a");
        assert_eq!(scheduler.len(), 1);

        let mut counter = 0;
        for task in due {
            task.run(&mut counter);
        }
        assert_eq!(counter, 1);
    }
}
