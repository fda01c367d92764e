//! Core OSEK modules
//!
//! Contains the kernel state, the System Manager, the ready-queue scan,
//! and the task, resource, event, interrupt and alarm services.

pub mod config;
pub mod critical;
pub mod error;
pub mod event;
pub mod hooks;
pub mod interrupt;
pub mod kernel;
pub mod pool;
pub mod prio;
pub mod resource;
pub mod sched;
pub mod sysmgr;
pub mod task;
pub mod time;
pub mod types;
pub mod cs_cell;
