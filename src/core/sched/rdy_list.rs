//! Ready queues - one FIFO of activation entries per priority level
//!
//! Every pending activation of a task occupies one entry at its level, so a
//! task activated three times appears three times. The running entry of a
//! task sits at the level of its current effective priority. The bitmap in
//! [`PrioTable`] is kept in step with queue emptiness.

use heapless::Vec;

use crate::config::{OSEK_READY_LEVELS, TASK_QUEUE_DEPTH};
use crate::prio::PrioTable;
use crate::types::{Priority, ThreadId};

/// Ready queue for a single priority level
pub struct ReadyList {
    entries: Vec<ThreadId, TASK_QUEUE_DEPTH>,
}

impl ReadyList {
    /// Create a new empty ready list
    pub const fn new() -> Self {
        ReadyList {
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in scan order
    #[inline]
    pub fn as_slice(&self) -> &[ThreadId] {
        &self.entries
    }

    /// Append at the tail (FIFO order)
    pub fn insert_tail(&mut self, thread: ThreadId) -> Result<(), ThreadId> {
        self.entries.push(thread)
    }

    /// Insert at the head, so the entry is considered first
    pub fn insert_head(&mut self, thread: ThreadId) -> Result<(), ThreadId> {
        self.entries.insert(0, thread)
    }

    /// Remove the first entry belonging to `thread`
    ///
    /// # Returns
    /// `true` if an entry was removed
    pub fn remove(&mut self, thread: ThreadId) -> bool {
        match self.entries.iter().position(|&t| t == thread) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}

/// All ready levels plus the bitmap of non-empty ones
pub struct ReadyQueues {
    prio_tbl: PrioTable,
    lists: [ReadyList; OSEK_READY_LEVELS],
}

impl ReadyQueues {
    pub fn new() -> Self {
        ReadyQueues {
            prio_tbl: PrioTable::new(),
            lists: core::array::from_fn(|_| ReadyList::new()),
        }
    }

    #[inline]
    pub fn level(&self, prio: Priority) -> &ReadyList {
        &self.lists[prio as usize]
    }

    #[inline]
    pub fn prio_table(&self) -> &PrioTable {
        &self.prio_tbl
    }

    /// Highest non-empty level
    #[inline]
    pub fn highest(&self) -> Option<Priority> {
        self.prio_tbl.get_highest()
    }

    pub fn push_back(&mut self, prio: Priority, thread: ThreadId) -> Result<(), ThreadId> {
        self.lists[prio as usize].insert_tail(thread)?;
        self.prio_tbl.insert(prio);
        Ok(())
    }

    pub fn push_front(&mut self, prio: Priority, thread: ThreadId) -> Result<(), ThreadId> {
        self.lists[prio as usize].insert_head(thread)?;
        self.prio_tbl.insert(prio);
        Ok(())
    }

    /// Remove the first entry of `thread` at `prio`
    pub fn remove(&mut self, prio: Priority, thread: ThreadId) -> bool {
        let list = &mut self.lists[prio as usize];
        let removed = list.remove(thread);
        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
        removed
    }

    /// Count of entries of `thread` across all levels
    pub fn entries_of(&self, thread: ThreadId) -> usize {
        self.lists
            .iter()
            .map(|l| l.as_slice().iter().filter(|&&t| t == thread).count())
            .sum()
    }

    pub fn clear(&mut self) {
        for list in self.lists.iter_mut() {
            list.clear();
        }
        self.prio_tbl.init();
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ThreadId = ThreadId(0);
    const B: ThreadId = ThreadId(1);
    const C: ThreadId = ThreadId(2);

    #[test]
    fn test_fifo_within_level() {
        let mut q = ReadyQueues::new();
        q.push_back(5, A).unwrap();
        q.push_back(5, B).unwrap();
        q.push_back(5, A).unwrap();
        assert_eq!(q.level(5).as_slice(), &[A, B, A]);
        assert_eq!(q.entries_of(A), 2);
    }

    #[test]
    fn test_push_front_goes_first() {
        let mut q = ReadyQueues::new();
        q.push_back(3, A).unwrap();
        q.push_front(3, B).unwrap();
        assert_eq!(q.level(3).as_slice(), &[B, A]);
    }

    #[test]
    fn test_remove_updates_bitmap() {
        let mut q = ReadyQueues::new();
        q.push_back(2, A).unwrap();
        q.push_back(7, B).unwrap();
        assert_eq!(q.highest(), Some(7));

        assert!(q.remove(7, B));
        assert_eq!(q.highest(), Some(2));
        assert!(!q.remove(7, B));

        assert!(q.remove(2, A));
        assert_eq!(q.highest(), None);
    }

    #[test]
    fn test_remove_takes_first_only() {
        let mut q = ReadyQueues::new();
        q.push_back(4, A).unwrap();
        q.push_back(4, C).unwrap();
        q.push_back(4, A).unwrap();
        q.remove(4, A);
        assert_eq!(q.level(4).as_slice(), &[C, A]);
    }

    #[test]
    fn test_level_overflow() {
        let mut list = ReadyList::new();
        for _ in 0..TASK_QUEUE_DEPTH {
            list.insert_tail(A).unwrap();
        }
        assert_eq!(list.insert_tail(B), Err(B));
        assert_eq!(list.len(), TASK_QUEUE_DEPTH);
    }
}
