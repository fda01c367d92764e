//! Priority bitmap management for O(1) highest-ready lookup
//!
//! One bit per ready level; a set bit means the level's queue is not
//! empty. OSEK priorities grow with urgency, so the highest ready level is
//! the most significant set bit, found with CLZ.

use crate::config::{OSEK_READY_LEVELS, SUBSTRATE_LOWEST_PRIORITY};
use crate::types::Priority;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = (OSEK_READY_LEVELS + 31) / 32;

/// Priority bitmap table
///
/// Bit `p % 32` of word `p / 32` stands for level `p`.
#[derive(Clone, Copy)]
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    pub fn init(&mut self) {
        for word in self.bitmap.iter_mut() {
            *word = 0;
        }
    }

    /// Mark a level as non-empty
    #[inline]
    pub fn insert(&mut self, prio: Priority) {
        debug_assert!((prio as usize) < OSEK_READY_LEVELS);

        let word_idx = (prio / 32) as usize;
        let bit_pos = prio % 32;

        self.bitmap[word_idx] |= 1 << bit_pos;
    }

    /// Mark a level as empty
    #[inline]
    pub fn remove(&mut self, prio: Priority) {
        debug_assert!((prio as usize) < OSEK_READY_LEVELS);

        let word_idx = (prio / 32) as usize;
        let bit_pos = prio % 32;

        self.bitmap[word_idx] &= !(1 << bit_pos);
    }

    /// Highest non-empty level, if any
    #[inline]
    pub fn get_highest(&self) -> Option<Priority> {
        for (idx, &word) in self.bitmap.iter().enumerate().rev() {
            if word != 0 {
                let bit = 31 - word.leading_zeros() as usize;
                return Some((idx * 32 + bit) as Priority);
            }
        }
        None
    }

    /// Highest non-empty level strictly below `prio`
    pub fn next_below(&self, prio: Priority) -> Option<Priority> {
        (0..prio).rev().find(|&p| self.is_set(p))
    }

    /// Check if a specific level has any ready entries
    #[inline]
    pub fn is_set(&self, prio: Priority) -> bool {
        let word_idx = (prio / 32) as usize;
        let bit_pos = prio % 32;

        (self.bitmap[word_idx] & (1 << bit_pos)) != 0
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an OSEK priority onto the substrate's 0-is-highest scale
///
/// Task priority 0 lands on the lowest substrate level. Every OSEK level
/// stays below the System Manager.
#[inline]
pub fn substrate_priority(prio: Priority) -> u8 {
    SUBSTRATE_LOWEST_PRIORITY.saturating_sub(prio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OSEK_ISR1_PRIORITY, OSEK_ISR2_PRIORITY};

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), Some(5));

        table.insert(3);
        assert_eq!(table.get_highest(), Some(5));

        table.remove(5);
        assert_eq!(table.get_highest(), Some(3));

        table.remove(3);
        assert!(table.is_empty());
    }

    #[test]
    fn test_priority_order() {
        let mut table = PrioTable::new();

        table.insert(10);
        table.insert(5);
        table.insert(20);
        table.insert(0);
        table.insert(15);

        assert_eq!(table.get_highest(), Some(20));

        table.remove(20);
        assert_eq!(table.get_highest(), Some(15));

        assert_eq!(table.next_below(15), Some(10));
        assert_eq!(table.next_below(5), Some(0));
        assert_eq!(table.next_below(0), None);
    }

    #[test]
    fn test_boundary_levels() {
        let mut table = PrioTable::new();

        table.insert(0);
        table.insert(OSEK_ISR2_PRIORITY);
        assert_eq!(table.get_highest(), Some(OSEK_ISR2_PRIORITY));

        table.remove(OSEK_ISR2_PRIORITY);
        assert_eq!(table.get_highest(), Some(0));
    }

    #[test]
    fn test_substrate_mapping_keeps_order() {
        assert_eq!(substrate_priority(0), SUBSTRATE_LOWEST_PRIORITY);
        assert!(substrate_priority(10) < substrate_priority(9));
        assert!(substrate_priority(OSEK_ISR1_PRIORITY) < substrate_priority(OSEK_ISR2_PRIORITY));
    }
}
