//! Fixed-capacity object pools
//!
//! Objects are appended during initialization and addressed by index for
//! the rest of the run. Slots are only recycled by clearing the whole pool.

use core::ops::{Index, IndexMut};

use heapless::Vec;

use crate::error::{OsError, OsResult};

/// Arena of `N` objects addressed by stable indices
pub struct Pool<T, const N: usize> {
    slots: Vec<T, N>,
}

impl<T, const N: usize> Pool<T, N> {
    pub const fn new() -> Self {
        Pool { slots: Vec::new() }
    }

    /// Store an object and return its index
    ///
    /// # Returns
    /// * `Err(OsError::NoFreeSlot)` - every slot is in use
    pub fn alloc(&mut self, value: T) -> OsResult<u8> {
        let index = self.slots.len();
        self.slots.push(value).map_err(|_| OsError::NoFreeSlot)?;
        Ok(index as u8)
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<&T> {
        self.slots.get(index as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, index: u8) -> Option<&mut T> {
        self.slots.get_mut(index as usize)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.slots.is_full()
    }

    /// Iterate over `(index, object)` pairs in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (u8, &T)> {
        self.slots.iter().enumerate().map(|(i, v)| (i as u8, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u8, &mut T)> {
        self.slots.iter_mut().enumerate().map(|(i, v)| (i as u8, v))
    }

    /// Drop every object
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl<T, const N: usize> Default for Pool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Index<u8> for Pool<T, N> {
    type Output = T;

    #[inline]
    fn index(&self, index: u8) -> &T {
        &self.slots[index as usize]
    }
}

impl<T, const N: usize> IndexMut<u8> for Pool<T, N> {
    #[inline]
    fn index_mut(&mut self, index: u8) -> &mut T {
        &mut self.slots[index as usize]
    }
}
