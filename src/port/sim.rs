//! Simulated thread runtime for hosts
//!
//! Records what the kernel asks of the substrate without running any
//! thread bodies. The most recently resumed thread is the current one,
//! which is how services identify their caller in host tests.

use heapless::HistoryBuffer;

use crate::config::OSEK_MAX_TASKS;
use crate::error::FatalError;
use crate::port::{Port, PortError, ThreadEntry};
use crate::types::ThreadId;

/// Substrate operation as seen by the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Created(ThreadId),
    Resumed(ThreadId),
    Suspended(ThreadId),
    Terminated(ThreadId),
    Reset(ThreadId),
    Deleted(ThreadId),
    PreemptionChanged(ThreadId, u8),
}

#[derive(Debug, Clone, Copy)]
struct SimThread {
    created: bool,
    suspended: bool,
    terminated: bool,
    at_entry: bool,
    starts: u32,
    priority: u8,
    threshold: u8,
    stack_size: usize,
    entry: Option<ThreadEntry>,
}

impl SimThread {
    const fn new() -> Self {
        SimThread {
            created: false,
            suspended: true,
            terminated: false,
            at_entry: true,
            starts: 0,
            priority: 0,
            threshold: 0,
            stack_size: 0,
            entry: None,
        }
    }
}

/// Deterministic recording port
pub struct SimPort {
    threads: [SimThread; OSEK_MAX_TASKS],
    current: Option<ThreadId>,
    interrupts_masked: bool,
    history: HistoryBuffer<PortEvent, 64>,
}

impl SimPort {
    pub fn new() -> Self {
        SimPort {
            threads: [SimThread::new(); OSEK_MAX_TASKS],
            current: None,
            interrupts_masked: false,
            history: HistoryBuffer::new(),
        }
    }

    fn thread(&self, thread: ThreadId) -> Result<&SimThread, PortError> {
        self.threads
            .get(thread.index())
            .filter(|t| t.created)
            .ok_or(PortError::InvalidThread)
    }

    fn thread_mut(&mut self, thread: ThreadId) -> Result<&mut SimThread, PortError> {
        self.threads
            .get_mut(thread.index())
            .filter(|t| t.created)
            .ok_or(PortError::InvalidThread)
    }

    /// Pretend a different thread (or none) is executing
    pub fn set_current(&mut self, thread: Option<ThreadId>) {
        self.current = thread;
    }

    /// Whether the thread is created and not suspended
    pub fn is_running(&self, thread: ThreadId) -> bool {
        self.thread(thread).map_or(false, |t| !t.suspended)
    }

    pub fn is_created(&self, thread: ThreadId) -> bool {
        self.thread(thread).is_ok()
    }

    /// How many times the thread was started from its entry point
    pub fn starts(&self, thread: ThreadId) -> u32 {
        self.thread(thread).map_or(0, |t| t.starts)
    }

    pub fn priority(&self, thread: ThreadId) -> Option<u8> {
        self.thread(thread).ok().map(|t| t.priority)
    }

    pub fn threshold(&self, thread: ThreadId) -> Option<u8> {
        self.thread(thread).ok().map(|t| t.threshold)
    }

    pub fn stack_size(&self, thread: ThreadId) -> Option<usize> {
        self.thread(thread).ok().map(|t| t.stack_size)
    }

    pub fn entry(&self, thread: ThreadId) -> Option<ThreadEntry> {
        self.thread(thread).ok().and_then(|t| t.entry)
    }

    pub fn interrupts_masked(&self) -> bool {
        self.interrupts_masked
    }

    /// Recorded operations, oldest first
    pub fn history(&self) -> impl Iterator<Item = &PortEvent> {
        self.history.oldest_ordered()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    fn stop(&mut self, thread: ThreadId) {
        if self.current == Some(thread) {
            self.current = None;
        }
    }
}

impl Default for SimPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for SimPort {
    fn thread_create(
        &mut self,
        thread: ThreadId,
        entry: ThreadEntry,
        priority: u8,
        stack_size: usize,
    ) -> Result<(), PortError> {
        let slot = self
            .threads
            .get_mut(thread.index())
            .ok_or(PortError::NoMemory)?;
        if slot.created {
            return Err(PortError::InvalidState);
        }
        *slot = SimThread {
            created: true,
            priority,
            threshold: priority,
            stack_size,
            entry: Some(entry),
            ..SimThread::new()
        };
        self.history.write(PortEvent::Created(thread));
        Ok(())
    }

    fn thread_resume(&mut self, thread: ThreadId) -> Result<(), PortError> {
        let t = self.thread_mut(thread)?;
        if t.terminated {
            return Err(PortError::InvalidState);
        }
        if t.at_entry {
            t.at_entry = false;
            t.starts += 1;
        }
        t.suspended = false;
        self.current = Some(thread);
        self.history.write(PortEvent::Resumed(thread));
        Ok(())
    }

    fn thread_suspend(&mut self, thread: ThreadId) -> Result<(), PortError> {
        self.thread_mut(thread)?.suspended = true;
        self.stop(thread);
        self.history.write(PortEvent::Suspended(thread));
        Ok(())
    }

    fn thread_terminate(&mut self, thread: ThreadId) -> Result<(), PortError> {
        let t = self.thread_mut(thread)?;
        t.suspended = true;
        t.terminated = true;
        self.stop(thread);
        self.history.write(PortEvent::Terminated(thread));
        Ok(())
    }

    fn thread_reset(&mut self, thread: ThreadId) -> Result<(), PortError> {
        let t = self.thread_mut(thread)?;
        if !t.terminated {
            return Err(PortError::InvalidState);
        }
        t.terminated = false;
        t.at_entry = true;
        t.threshold = t.priority;
        self.history.write(PortEvent::Reset(thread));
        Ok(())
    }

    fn thread_delete(&mut self, thread: ThreadId) -> Result<(), PortError> {
        if !self.thread(thread)?.terminated {
            return Err(PortError::InvalidState);
        }
        self.threads[thread.index()] = SimThread::new();
        self.history.write(PortEvent::Deleted(thread));
        Ok(())
    }

    fn preemption_change(&mut self, thread: ThreadId, threshold: u8) -> Result<(), PortError> {
        self.thread_mut(thread)?.threshold = threshold;
        self.history.write(PortEvent::PreemptionChanged(thread, threshold));
        Ok(())
    }

    fn current_thread(&self) -> Option<ThreadId> {
        self.current
    }

    fn interrupts_disable(&mut self) {
        self.interrupts_masked = true;
    }

    fn interrupts_enable(&mut self) {
        self.interrupts_masked = false;
    }

    fn fatal(&mut self, error: FatalError) -> ! {
        panic!("OSEK fatal error {:?}", error)
    }
}
