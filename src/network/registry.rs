use super::mailbox::WorkerId;
use super::protocol::TaskId;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskEntry {
    pub score: f64,
    pub completed: bool,
    /// Worker currently holding the task; `None` once its worker is lost.
    pub holder: Option<WorkerId>,
    pub issued_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Stored,
    Duplicate,
    NeverIssued,
}

/// 1ターン分のタスク表
///
/// Holds the `width * width` cross-product of (cpu move, opponent move) pairs
/// for one decision. Entries are created once, in ascending cpu move then
/// opponent move order, and are never removed.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    width: usize,
    entries: HashMap<TaskId, TaskEntry>,
    completed: usize,
}

impl TaskRegistry {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            entries: HashMap::with_capacity(width * width),
            completed: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.width * self.width
    }

    pub fn created(&self) -> usize {
        self.entries.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total()
    }

    fn all_tasks(&self) -> impl Iterator<Item = TaskId> {
        let width = self.width;
        (0..width).flat_map(move |cpu| (0..width).map(move |opp| TaskId::new(cpu, opp)))
    }

    /// Creates the first pair not yet created and issues it to `worker`.
    pub fn issue_next(&mut self, worker: WorkerId, now: Instant) -> Option<TaskId> {
        let task = self.all_tasks().find(|t| !self.entries.contains_key(t))?;
        self.entries.insert(
            task,
            TaskEntry {
                score: 0.0,
                completed: false,
                holder: Some(worker),
                issued_at: now,
            },
        );
        Some(task)
    }

    /// Hands an already created, unfinished task to `worker` if its holder is
    /// gone or has held it for at least `timeout`.
    pub fn reissue(&mut self, worker: WorkerId, now: Instant, timeout: Option<Duration>) -> Option<TaskId> {
        let task = self.all_tasks().find(|t| match self.entries.get(t) {
            Some(entry) if !entry.completed => {
                entry.holder.is_none()
                    || timeout.is_some_and(|limit| now.duration_since(entry.issued_at) >= limit)
            }
            _ => false,
        })?;
        if let Some(entry) = self.entries.get_mut(&task) {
            entry.holder = Some(worker);
            entry.issued_at = now;
        }
        Some(task)
    }

    /// Orphans every unfinished task held by `worker`. Returns how many.
    pub fn release(&mut self, worker: WorkerId) -> usize {
        let mut released = 0;
        for entry in self.entries.values_mut() {
            if !entry.completed && entry.holder == Some(worker) {
                entry.holder = None;
                released += 1;
            }
        }
        released
    }

    pub fn record(&mut self, task: TaskId, score: f64) -> Recorded {
        match self.entries.get_mut(&task) {
            None => Recorded::NeverIssued,
            Some(entry) if entry.completed => Recorded::Duplicate,
            Some(entry) => {
                entry.score = score;
                entry.completed = true;
                self.completed += 1;
                Recorded::Stored
            }
        }
    }

    /// Records a score computed by the master itself, creating the entry if
    /// no worker was ever given the task.
    pub fn complete_locally(&mut self, task: TaskId, score: f64, now: Instant) -> Recorded {
        self.entries.entry(task).or_insert(TaskEntry {
            score: 0.0,
            completed: false,
            holder: None,
            issued_at: now,
        });
        self.record(task, score)
    }

    /// Tasks without a result yet, created or not, in task order.
    pub fn outstanding(&self) -> Vec<TaskId> {
        self.all_tasks()
            .filter(|t| !self.entries.get(t).is_some_and(|e| e.completed))
            .collect()
    }

    /// Score of a completed task.
    pub fn score(&self, task: TaskId) -> Option<f64> {
        self.entries
            .get(&task)
            .filter(|e| e.completed)
            .map(|e| e.score)
    }

    pub fn entry(&self, task: TaskId) -> Option<&TaskEntry> {
        self.entries.get(&task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issues_cross_product_in_order_once() {
        let mut registry = TaskRegistry::new(3);
        let now = Instant::now();
        let mut issued = Vec::new();
        while let Some(task) = registry.issue_next(0, now) {
            issued.push(task.to_string());
        }
        assert_eq!(
            issued,
            vec!["0-0", "0-1", "0-2", "1-0", "1-1", "1-2", "2-0", "2-1", "2-2"]
        );
        assert_eq!(registry.created(), 9);
        assert_eq!(registry.total(), 9);
        assert!(!registry.is_complete());
    }

    #[test]
    fn test_record_completion_and_duplicates() {
        let mut registry = TaskRegistry::new(2);
        let now = Instant::now();
        let first = registry.issue_next(1, now).unwrap();

        assert_eq!(registry.record(TaskId::new(1, 1), 0.5), Recorded::NeverIssued);
        assert_eq!(registry.score(first), None);
        assert_eq!(registry.record(first, -1.0), Recorded::Stored);
        assert_eq!(registry.record(first, 1.0), Recorded::Duplicate);
        assert_eq!(registry.score(first), Some(-1.0));
        assert_eq!(registry.completed(), 1);

        while let Some(task) = registry.issue_next(1, now) {
            registry.record(task, 0.0);
        }
        assert!(registry.is_complete());
        assert!(registry.outstanding().is_empty());
    }

    #[test]
    fn test_reissue_after_release_or_timeout() {
        let mut registry = TaskRegistry::new(2);
        let start = Instant::now();
        let a = registry.issue_next(0, start).unwrap();
        let b = registry.issue_next(1, start).unwrap();

        // nothing is stale yet
        assert_eq!(registry.reissue(2, start, None), None);
        assert_eq!(registry.reissue(2, start, Some(Duration::from_secs(5))), None);

        assert_eq!(registry.release(1), 1);
        assert_eq!(registry.reissue(2, start, None), Some(b));
        assert_eq!(registry.entry(b).unwrap().holder, Some(2));

        let later = start + Duration::from_secs(10);
        assert_eq!(registry.reissue(3, later, Some(Duration::from_secs(5))), Some(a));
        assert_eq!(registry.entry(a).unwrap().holder, Some(3));

        registry.record(a, 0.25);
        assert_eq!(registry.outstanding(), vec![b, TaskId::new(1, 0), TaskId::new(1, 1)]);

        for task in registry.outstanding() {
            assert_eq!(registry.complete_locally(task, 0.0, later), Recorded::Stored);
        }
        assert!(registry.is_complete());
        assert_eq!(registry.created(), 4);
    }
}
