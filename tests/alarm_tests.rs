//! Counter and alarm tests
//!
//! Time is driven with `Kernel::tick`, as the timer interrupt would.

use osek::*;

fn body() {}

fn kernel() -> Kernel<SimPort> {
    Kernel::new(SimPort::new())
}

fn base(max: TickType, ticks_per_base: TickType, min_cycle: TickType) -> AlarmBase {
    AlarmBase {
        max_allowed_value: max,
        ticks_per_base,
        min_cycle,
    }
}

/// Kernel with a system counter counting to `max`
fn with_system_counter(max: TickType) -> (Kernel<SimPort>, CounterId) {
    let mut k = kernel();
    let c = k.create_counter("System", base(max, 1, 1), 0).unwrap();
    k.define_system_counter(c).unwrap();
    (k, c)
}

fn ticks(k: &mut Kernel<SimPort>, n: u32) {
    for _ in 0..n {
        k.tick();
    }
}

#[cfg(test)]
mod counter_tests {
    use super::*;

    #[test]
    fn test_create_counter_validation() {
        let mut k = kernel();
        assert_eq!(
            k.create_counter("C", base(0, 1, 1), 0),
            Err(OsError::InvalidValue)
        );
        assert_eq!(
            k.create_counter("C", base(MAXALLOWEDVALUE + 1, 1, 1), 0),
            Err(OsError::InvalidValue)
        );
        assert_eq!(
            k.create_counter("C", base(100, 0, 1), 0),
            Err(OsError::InvalidValue)
        );
        assert_eq!(
            k.create_counter("C", base(100, 1, 101), 0),
            Err(OsError::InvalidValue)
        );
        assert_eq!(
            k.create_counter("C", base(100, 1, 1), 101),
            Err(OsError::InvalidValue)
        );

        let c = k.create_counter("C", base(100, 1, 1), 100).unwrap();
        assert_eq!(k.get_counter_value(c), Ok(100));
        assert_eq!(
            k.create_counter("C", base(100, 1, 1), 0),
            Err(OsError::NameExists)
        );
    }

    #[test]
    fn test_single_system_counter() {
        let (mut k, _) = with_system_counter(100);
        let other = k.create_counter("Other", base(100, 1, 1), 0).unwrap();
        assert_eq!(k.define_system_counter(other), Err(OsError::InvalidState));
    }

    #[test]
    fn test_counter_idle_before_start() {
        let (mut k, c) = with_system_counter(100);
        ticks(&mut k, 5);
        assert_eq!(k.get_counter_value(c), Ok(0));

        k.start_os(OSDEFAULTAPPMODE).unwrap();
        ticks(&mut k, 5);
        assert_eq!(k.get_counter_value(c), Ok(5));
    }

    #[test]
    fn test_ticks_per_base() {
        let mut k = kernel();
        let c = k.create_counter("Slow", base(100, 4, 1), 0).unwrap();
        k.define_system_counter(c).unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        ticks(&mut k, 3);
        assert_eq!(k.get_counter_value(c), Ok(0));
        ticks(&mut k, 1);
        assert_eq!(k.get_counter_value(c), Ok(1));
        ticks(&mut k, 8);
        assert_eq!(k.get_counter_value(c), Ok(3));
    }

    #[test]
    fn test_incr_counter() {
        let (mut k, system) = with_system_counter(100);
        let soft = k.create_counter("Soft", base(3, 1, 1), 0).unwrap();
        let a = k
            .create_task(TaskConfig::new("A", body).priority(1))
            .unwrap();
        let alarm = k
            .create_alarm(
                AlarmConfig::new("OnSoft", soft, AlarmAction::ActivateTask(a))
                    .autostart(AlarmStart::Relative { increment: 2, cycle: 0 }),
            )
            .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        assert_eq!(k.incr_counter(system), Err(OsError::InvalidObject));
        assert_eq!(k.incr_counter(CounterId(9)), Err(OsError::InvalidObject));

        k.incr_counter(soft).unwrap();
        assert_eq!(k.get_task_state(a), Ok(TaskState::Suspended));
        k.incr_counter(soft).unwrap();
        assert_eq!(k.get_task_state(a), Ok(TaskState::Running));
        assert_eq!(k.get_alarm(alarm), Err(OsError::NotArmed));

        k.incr_counter(soft).unwrap();
        k.incr_counter(soft).unwrap();
        assert_eq!(k.get_counter_value(soft), Ok(0));
        assert_eq!(k.get_counter_value(system), Ok(0));
    }
}

#[cfg(test)]
mod alarm_tests {
    use super::*;
    use std::sync::Mutex;
    use std::vec::Vec;

    #[test]
    fn test_relative_alarm_activates_task() {
        let (mut k, c) = with_system_counter(1000);
        let a = k
            .create_task(TaskConfig::new("A", body).priority(2))
            .unwrap();
        let alarm = k
            .create_alarm(AlarmConfig::new("Wake", c, AlarmAction::ActivateTask(a)))
            .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        k.set_rel_alarm(alarm, 7, 0).unwrap();
        assert_eq!(k.get_alarm(alarm), Ok(7));

        ticks(&mut k, 6);
        assert_eq!(k.get_task_state(a), Ok(TaskState::Suspended));
        assert_eq!(k.get_alarm(alarm), Ok(1));

        ticks(&mut k, 1);
        assert_eq!(k.get_task_id(), Some(a));
        assert_eq!(k.get_alarm(alarm), Err(OsError::NotArmed));
    }

    static CYCLIC_SEEN: Mutex<Vec<TickType>> = Mutex::new(Vec::new());

    fn record_cyclic(k: &mut Kernel<SimPort>) {
        assert_eq!(k.context(), ExecutionContext::AlarmCallback);
        let value = k.get_counter_value(CounterId(0)).unwrap();
        CYCLIC_SEEN.lock().unwrap().push(value);
    }

    #[test]
    fn test_cyclic_alarm_does_not_drift() {
        let (mut k, c) = with_system_counter(1000);
        k.create_alarm(
            AlarmConfig::new("Cyclic", c, AlarmAction::Callback(record_cyclic))
                .autostart(AlarmStart::Relative { increment: 10, cycle: 10 }),
        )
        .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        ticks(&mut k, 1500);

        let seen = CYCLIC_SEEN.lock().unwrap();
        let expected: Vec<TickType> = (1..=150u32).map(|n| (n * 10) % 1001).collect();
        assert_eq!(*seen, expected);
    }

    #[test]
    fn test_alarm_sets_event() {
        let (mut k, c) = with_system_counter(1000);
        let e = k
            .create_task(
                TaskConfig::new("E", body)
                    .priority(3)
                    .kind(TaskKind::Extended)
                    .autostart(true),
            )
            .unwrap();
        let ev = k.create_event().unwrap();
        k.register_event_to_task(ev, e).unwrap();
        k.create_alarm(
            AlarmConfig::new("Period", c, AlarmAction::SetEvent(e, ev))
                .autostart(AlarmStart::Relative { increment: 10, cycle: 10 }),
        )
        .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        for _ in 0..3 {
            k.wait_event(ev).unwrap();
            ticks(&mut k, 9);
            assert_eq!(k.get_task_state(e), Ok(TaskState::Waiting));
            ticks(&mut k, 1);
            assert_eq!(k.get_task_state(e), Ok(TaskState::Running));
            assert_eq!(k.get_event(e), Ok(ev));
            k.clear_event(ev).unwrap();
        }
        assert_eq!(k.get_counter_value(c), Ok(30));
    }

    #[test]
    fn test_absolute_alarm() {
        let (mut k, c) = with_system_counter(100);
        let a = k
            .create_task(TaskConfig::new("A", body).priority(2))
            .unwrap();
        let alarm = k
            .create_alarm(AlarmConfig::new("At", c, AlarmAction::ActivateTask(a)))
            .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        k.set_abs_alarm(alarm, 9, 0).unwrap();
        assert_eq!(k.get_alarm(alarm), Ok(9));
        ticks(&mut k, 9);
        assert_eq!(k.get_task_id(), Some(a));
        k.terminate_task().unwrap();

        // A start already passed waits for the counter to come round
        ticks(&mut k, 11);
        k.set_abs_alarm(alarm, 5, 0).unwrap();
        assert_eq!(k.get_alarm(alarm), Ok(86));
        ticks(&mut k, 85);
        assert_eq!(k.get_task_state(a), Ok(TaskState::Suspended));
        ticks(&mut k, 1);
        assert_eq!(k.get_task_id(), Some(a));
    }

    #[test]
    fn test_cancel_alarm() {
        let (mut k, c) = with_system_counter(100);
        let a = k
            .create_task(TaskConfig::new("A", body).priority(2))
            .unwrap();
        let alarm = k
            .create_alarm(AlarmConfig::new("Cancelled", c, AlarmAction::ActivateTask(a)))
            .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        assert_eq!(k.cancel_alarm(alarm), Err(OsError::NotArmed));
        k.set_rel_alarm(alarm, 5, 5).unwrap();
        ticks(&mut k, 3);
        k.cancel_alarm(alarm).unwrap();
        ticks(&mut k, 20);
        assert_eq!(k.get_task_state(a), Ok(TaskState::Suspended));

        // A cancelled alarm can be armed again
        k.set_rel_alarm(alarm, 1, 0).unwrap();
        ticks(&mut k, 1);
        assert_eq!(k.get_task_id(), Some(a));
    }

    #[test]
    fn test_set_alarm_checks() {
        let (mut k, c) = with_system_counter(100);
        let a = k
            .create_task(TaskConfig::new("A", body).priority(2))
            .unwrap();
        let fast = k.create_counter("Fast", base(100, 1, 10), 0).unwrap();
        let alarm = k
            .create_alarm(AlarmConfig::new("Checked", c, AlarmAction::ActivateTask(a)))
            .unwrap();
        let slow = k
            .create_alarm(AlarmConfig::new("MinCycle", fast, AlarmAction::ActivateTask(a)))
            .unwrap();

        assert_eq!(k.set_rel_alarm(alarm, 5, 0), Err(OsError::WrongCallContext));
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        assert_eq!(k.set_rel_alarm(alarm, 0, 0), Err(OsError::InvalidValue));
        assert_eq!(k.set_rel_alarm(alarm, 101, 0), Err(OsError::InvalidValue));
        assert_eq!(k.set_rel_alarm(alarm, 5, 101), Err(OsError::InvalidValue));
        assert_eq!(k.set_abs_alarm(alarm, 101, 0), Err(OsError::InvalidValue));
        assert_eq!(k.set_rel_alarm(slow, 5, 9), Err(OsError::InvalidValue));
        assert_eq!(k.set_rel_alarm(AlarmId(7), 5, 0), Err(OsError::InvalidObject));

        k.set_rel_alarm(alarm, 5, 0).unwrap();
        assert_eq!(k.set_rel_alarm(alarm, 5, 0), Err(OsError::InvalidState));
        assert_eq!(k.set_abs_alarm(alarm, 5, 0), Err(OsError::InvalidState));
        assert_eq!(k.get_alarm(slow), Err(OsError::NotArmed));
    }

    #[test]
    fn test_create_alarm_checks() {
        let (mut k, c) = with_system_counter(100);
        let basic = k
            .create_task(TaskConfig::new("B", body).priority(2))
            .unwrap();
        let ext = k
            .create_task(TaskConfig::new("E", body).kind(TaskKind::Extended))
            .unwrap();
        let action = AlarmAction::ActivateTask(basic);

        assert_eq!(
            k.create_alarm(AlarmConfig::new("X", CounterId(5), action)),
            Err(OsError::InvalidObject)
        );
        assert_eq!(
            k.create_alarm(AlarmConfig::new("X", c, AlarmAction::SetEvent(basic, 1))),
            Err(OsError::CapabilityMissing)
        );
        assert_eq!(
            k.create_alarm(AlarmConfig::new("X", c, AlarmAction::SetEvent(ext, 0))),
            Err(OsError::InvalidValue)
        );
        assert_eq!(
            k.create_alarm(
                AlarmConfig::new("X", c, action)
                    .autostart(AlarmStart::Relative { increment: 0, cycle: 0 })
            ),
            Err(OsError::InvalidValue)
        );
        assert_eq!(
            k.create_alarm(
                AlarmConfig::new("X", c, action)
                    .autostart(AlarmStart::Absolute { start: 101, cycle: 0 })
            ),
            Err(OsError::InvalidValue)
        );

        let x = k.create_alarm(AlarmConfig::new("X", c, action)).unwrap();
        assert_eq!(k.alarm_named("X"), Some(x));
        assert_eq!(
            k.create_alarm(AlarmConfig::new("X", c, action)),
            Err(OsError::NameExists)
        );
    }

    #[test]
    fn test_get_alarm_base() {
        let mut k = kernel();
        let c = k.create_counter("C", base(500, 2, 5), 0).unwrap();
        let a = k
            .create_task(TaskConfig::new("A", body).priority(2))
            .unwrap();
        let alarm = k
            .create_alarm(AlarmConfig::new("Base", c, AlarmAction::ActivateTask(a)))
            .unwrap();

        assert_eq!(k.get_alarm_base(alarm), Ok(base(500, 2, 5)));
        assert_eq!(k.get_alarm_base(AlarmId(3)), Err(OsError::InvalidObject));
    }

    #[test]
    fn test_autostart_alarm_app_mode() {
        const SERVICE_MODE: AppMode = 0x2;

        let (mut k, c) = with_system_counter(100);
        let a = k
            .create_task(TaskConfig::new("A", body).priority(2))
            .unwrap();
        let normal = k
            .create_alarm(
                AlarmConfig::new("Normal", c, AlarmAction::ActivateTask(a))
                    .autostart(AlarmStart::Relative { increment: 5, cycle: 0 }),
            )
            .unwrap();
        let service = k
            .create_alarm(
                AlarmConfig::new("Service", c, AlarmAction::ActivateTask(a))
                    .autostart(AlarmStart::Absolute { start: 20, cycle: 0 })
                    .app_mode(SERVICE_MODE),
            )
            .unwrap();
        k.start_os(SERVICE_MODE).unwrap();

        assert_eq!(k.get_active_application_mode(), SERVICE_MODE);
        assert_eq!(k.get_alarm(normal), Err(OsError::NotArmed));
        assert_eq!(k.get_alarm(service), Ok(20));
    }
}

#[cfg(test)]
mod deferral_tests {
    use super::*;

    /// Posts as many activations as the request channel holds
    fn flood(k: &mut Kernel<SimPort>) {
        for _ in 0..OSEK_MAX_ACTIVATION {
            k.activate_task(TaskId(0)).unwrap();
            k.activate_task(TaskId(1)).unwrap();
        }
    }

    /// Like `flood`, but one activation more than fits behind a pending request
    fn flood_after_other(k: &mut Kernel<SimPort>) {
        for _ in 0..OSEK_MAX_ACTIVATION {
            let _ = k.activate_task(TaskId(0));
            let _ = k.activate_task(TaskId(1));
        }
    }

    #[test]
    fn test_alarm_deferred_when_channel_full() {
        let (mut k, c) = with_system_counter(100);
        let t0 = k
            .create_task(TaskConfig::new("T0", body).priority(1).max_activation(8))
            .unwrap();
        let t1 = k
            .create_task(TaskConfig::new("T1", body).priority(1).max_activation(8))
            .unwrap();
        let t2 = k
            .create_task(TaskConfig::new("T2", body).priority(9))
            .unwrap();
        assert_eq!((t0, t1), (TaskId(0), TaskId(1)));

        k.create_alarm(
            AlarmConfig::new("Flood", c, AlarmAction::Callback(flood))
                .autostart(AlarmStart::Relative { increment: 3, cycle: 0 }),
        )
        .unwrap();
        let late = k
            .create_alarm(
                AlarmConfig::new("Late", c, AlarmAction::ActivateTask(t2))
                    .autostart(AlarmStart::Relative { increment: 3, cycle: 0 }),
            )
            .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        ticks(&mut k, 3);
        assert_eq!(k.activation_count(t0), Ok(8));
        assert_eq!(k.activation_count(t1), Ok(8));
        assert_eq!(k.get_task_state(t2), Ok(TaskState::Suspended));
        assert_eq!(k.get_alarm(late), Ok(0));

        // Fires on the following tick
        ticks(&mut k, 1);
        assert_eq!(k.get_task_id(), Some(t2));
        assert_eq!(k.get_alarm(late), Err(OsError::NotArmed));
    }

    #[test]
    fn test_callback_overflowing_channel_reports_limit() {
        let (mut k, c) = with_system_counter(100);
        let t0 = k
            .create_task(TaskConfig::new("T0", body).priority(1).max_activation(8))
            .unwrap();
        let t1 = k
            .create_task(TaskConfig::new("T1", body).priority(1).max_activation(8))
            .unwrap();
        let t2 = k
            .create_task(TaskConfig::new("T2", body).priority(9))
            .unwrap();
        assert_eq!((t0, t1), (TaskId(0), TaskId(1)));

        // The first alarm's request is already queued when the callback runs
        k.create_alarm(
            AlarmConfig::new("Early", c, AlarmAction::ActivateTask(t2))
                .autostart(AlarmStart::Relative { increment: 3, cycle: 0 }),
        )
        .unwrap();
        k.create_alarm(
            AlarmConfig::new("Flood", c, AlarmAction::Callback(flood_after_other))
                .autostart(AlarmStart::Relative { increment: 3, cycle: 0 }),
        )
        .unwrap();
        k.start_os(OSDEFAULTAPPMODE).unwrap();

        ticks(&mut k, 3);
        assert!(k.is_running());
        assert_eq!(k.get_task_id(), Some(t2));
        assert_eq!(k.activation_count(t0), Ok(8));
        assert_eq!(k.activation_count(t1), Ok(7));
        assert_eq!(
            k.last_error(),
            Some(ErrorInfo {
                service: ServiceId::ActivateTask,
                error: OsError::ListFull,
                param: 1,
            })
        );
    }
}
