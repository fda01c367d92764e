//! Unit tests for the building blocks of the scheduler
//!
//! These tests run on the host (not embedded target) against the public
//! API of each module.

#[cfg(test)]
mod prio_tests {
    use osek::config::{OSEK_ISR2_PRIORITY, OSEK_READY_LEVELS};
    use osek::prio::{substrate_priority, PrioTable};

    #[test]
    fn test_all_levels() {
        let mut table = PrioTable::new();

        for prio in 0..OSEK_READY_LEVELS as u8 {
            table.insert(prio);
            assert_eq!(table.get_highest(), Some(prio));
        }

        for prio in (0..OSEK_READY_LEVELS as u8).rev() {
            assert_eq!(table.get_highest(), Some(prio));
            table.remove(prio);
        }
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_next_below_skips_empty_levels() {
        let mut table = PrioTable::new();
        table.insert(2);
        table.insert(7);
        table.insert(OSEK_ISR2_PRIORITY);

        assert_eq!(table.next_below(OSEK_ISR2_PRIORITY), Some(7));
        assert_eq!(table.next_below(7), Some(2));
        assert_eq!(table.next_below(2), None);
        assert_eq!(table.next_below(0), None);
    }

    #[test]
    fn test_duplicate_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        table.insert(5);
        assert!(table.is_set(5));

        table.remove(5);
        assert!(!table.is_set(5));
        assert!(table.is_empty());
    }

    #[test]
    fn test_substrate_priority_is_inverted() {
        assert!(substrate_priority(10) < substrate_priority(9));
        assert_eq!(substrate_priority(0), 31);
    }
}

#[cfg(test)]
mod ready_queue_tests {
    use osek::sched::ReadyQueues;
    use osek::types::ThreadId;

    #[test]
    fn test_activation_entries() {
        let mut queues = ReadyQueues::new();
        let a = ThreadId(0);
        let b = ThreadId(1);

        queues.push_back(3, a).unwrap();
        queues.push_back(3, b).unwrap();
        queues.push_back(3, a).unwrap();
        assert_eq!(queues.level(3).as_slice(), &[a, b, a]);
        assert_eq!(queues.entries_of(a), 2);

        assert!(queues.remove(3, a));
        assert_eq!(queues.level(3).as_slice(), &[b, a]);
        assert_eq!(queues.entries_of(a), 1);
    }

    #[test]
    fn test_bitmap_follows_queues() {
        let mut queues = ReadyQueues::new();
        let a = ThreadId(4);

        queues.push_front(8, a).unwrap();
        assert!(queues.prio_table().is_set(8));
        assert_eq!(queues.highest(), Some(8));

        assert!(!queues.remove(2, a));
        assert!(queues.remove(8, a));
        assert!(!queues.prio_table().is_set(8));
        assert_eq!(queues.highest(), None);
    }
}

#[cfg(test)]
mod error_tests {
    use osek::error::*;
    use osek::types::E_OK;

    #[test]
    fn test_status_codes() {
        assert_eq!(OsError::InvalidObject.status(), E_OS_ID);
        assert_eq!(OsError::ActivationLimitExceeded.status(), E_OS_LIMIT);
        assert_eq!(OsError::ListFull.status(), E_OS_LIMIT);
        assert_eq!(OsError::AlreadyOccupied.status(), E_OS_ACCESS);
        assert_eq!(OsError::CapabilityMissing.status(), E_OS_ACCESS);
        assert_eq!(OsError::NotInOrder.status(), E_OS_NOFUNC);
        assert_eq!(OsError::NotArmed.status(), E_OS_NOFUNC);
        assert_eq!(OsError::WrongCallContext.status(), E_OS_CALLEVEL);
        assert_eq!(OsError::ResourceStillHeld.status(), E_OS_RESOURCE);
        assert_eq!(OsError::InvalidState.status(), E_OS_STATE);
        assert_eq!(OsError::InvalidValue.status(), E_OS_VALUE);
        assert_ne!(OsError::System.status(), E_OK);
    }

    #[test]
    fn test_fatal_codes() {
        assert_eq!(FatalError::ObjectCreation.code(), 1);
        assert_eq!(FatalError::TaskEndingWithoutChainOrTerminate.code(), 27);
        assert_eq!(FatalError::SysmgrQueueSend.code(), 28);
        assert_eq!(FatalError::ReadyQueueOverflow.code(), 34);
    }

    #[test]
    fn test_error_debug() {
        let err = OsError::NotOccupied;
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("NotOccupied"));
    }
}

#[cfg(test)]
mod types_tests {
    use osek::types::*;

    #[test]
    fn test_task_state_enum() {
        assert_eq!(TaskState::Running as u8, 0);
        assert_eq!(TaskState::Waiting as u8, 1);
        assert_eq!(TaskState::Ready as u8, 2);
        assert_eq!(TaskState::Suspended as u8, 3);
    }

    #[test]
    fn test_handles_share_thread_slots() {
        assert_eq!(TaskId(3).thread(), ThreadId(3));
        assert_eq!(IsrId(3).thread(), ThreadId(3));
        assert_eq!(ThreadId(7).index(), 7);
        assert_eq!(RES_SCHEDULER, ResourceId(0));
    }

    #[test]
    fn test_hook_levels() {
        assert!(ExecutionContext::ErrorHook.is_hook());
        assert!(ExecutionContext::StartupHook.is_hook());
        assert!(!ExecutionContext::Task.is_hook());
        assert!(!ExecutionContext::AlarmCallback.is_hook());
    }
}

#[cfg(test)]
mod config_tests {
    use osek::config::*;

    #[test]
    fn test_config_values() {
        assert_eq!(OSEK_MAX_PRIORITY, 23);
        assert_eq!(OSEK_NON_SCHEDULE_PRIORITY, OSEK_MAX_PRIORITY + 1);
        assert!(OSEK_ISR2_PRIORITY > OSEK_NON_SCHEDULE_PRIORITY);
        assert_eq!(OSEK_READY_LEVELS, OSEK_ISR2_PRIORITY as usize + 1);
        assert!(OSEK_MAX_EVENTS <= 32);
        assert!(SYSMGR_QUEUE_DEPTH >= SYSMGR_QUEUE_MSG_COUNT);
        assert!(OSEK_STACK_MIN < OSEK_STACK_PADDING);
    }

    #[test]
    fn test_substrate_levels_fit() {
        assert!(OSEK_ISR1_PRIORITY <= SUBSTRATE_LOWEST_PRIORITY);
    }
}

#[cfg(test)]
mod port_tests {
    use osek::types::ThreadId;
    use osek::{Port, PortEvent, SimPort};

    fn body() {}

    #[test]
    fn test_interrupt_mask_flag() {
        let mut port = SimPort::new();
        assert!(!port.interrupts_masked());
        port.interrupts_disable();
        assert!(port.interrupts_masked());
        port.interrupts_enable();
        assert!(!port.interrupts_masked());
    }

    #[test]
    fn test_set_current_overrides_caller() {
        let mut port = SimPort::new();
        let t = ThreadId(5);
        port.thread_create(t, body, 20, 256).unwrap();
        port.thread_resume(t).unwrap();

        port.set_current(None);
        assert_eq!(port.current_thread(), None);
        assert!(port.is_running(t));
        assert!(port.entry(t).is_some());
    }

    #[test]
    fn test_clear_history() {
        let mut port = SimPort::new();
        let t = ThreadId(0);
        port.thread_create(t, body, 20, 256).unwrap();
        port.clear_history();
        port.preemption_change(t, 10).unwrap();

        let events: Vec<PortEvent> = port.history().copied().collect();
        assert_eq!(events, [PortEvent::PreemptionChanged(t, 10)]);
        assert_eq!(port.threshold(t), Some(10));
        assert_eq!(port.priority(t), Some(20));
    }
}
