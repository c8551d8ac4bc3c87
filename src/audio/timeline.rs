//! Cancelable queue of timed entries
//!
//! Entries are keyed by a [`ScheduleHandle`] issued at insertion. Due entries
//! come out ordered by time, ties in insertion order. Removing an entry by
//! handle guarantees it is never returned by [`Timeline::take_due`].

/// Identifies one scheduled entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

impl ScheduleHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

struct Entry<T> {
    handle: ScheduleHandle,
    at: f64,
    payload: T,
}

pub struct Timeline<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn insert(&mut self, at: f64, payload: T) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let at = if at.is_finite() { at } else { 0.0 };
        self.entries.push(Entry {
            handle,
            at,
            payload,
        });
        handle
    }

    pub fn remove(&mut self, handle: ScheduleHandle) -> Option<T> {
        let index = self.entries.iter().position(|e| e.handle == handle)?;
        Some(self.entries.remove(index).payload)
    }

    pub fn contains(&self, handle: ScheduleHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Earliest pending time, if any.
    pub fn next_due(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.at).reduce(f64::min)
    }

    /// Removes and returns every entry with `at <= now`, earliest first.
    pub fn take_due(&mut self, now: f64) -> Vec<(f64, T)> {
        let mut due = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].at <= now {
                let entry = self.entries.remove(index);
                due.push((entry.handle, entry.at, entry.payload));
            } else {
                index += 1;
            }
        }
        due.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        due.into_iter().map(|(_, at, payload)| (at, payload)).collect()
    }
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}
