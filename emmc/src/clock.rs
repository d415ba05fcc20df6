use core::fmt::Debug;

/// 微秒级计时
pub trait Clock: Debug + Send + Sync {
    /// 单调递增的当前时间
    fn now_us(&self) -> u64;

    fn sleep_us(&self, us: u64) {
        let deadline = self.now_us().saturating_add(us);
        while self.now_us() < deadline {
            core::hint::spin_loop();
        }
    }
}

/// 忙等直到`cond`成立或超时；返回`cond`最终是否成立。
pub fn wait_until(clock: &impl Clock, timeout_us: u64, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = clock.now_us().saturating_add(timeout_us);
    loop {
        if cond() {
            return true;
        }
        if clock.now_us() >= deadline {
            return cond();
        }
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::{wait_until, Clock};

    #[derive(Debug, Default)]
    struct TickClock(spin::Mutex<u64>);

    impl Clock for TickClock {
        fn now_us(&self) -> u64 {
            let mut now = self.0.lock();
            *now += 10;
            *now
        }
    }

    #[test]
    fn wait_until_times_out() {
        let clock = TickClock::default();
        assert!(!wait_until(&clock, 1000, || false));
        assert!(*clock.0.lock() >= 1000);
    }

    #[test]
    fn wait_until_succeeds() {
        let clock = TickClock::default();
        let polls = Cell::new(0);
        assert!(wait_until(&clock, 1000, || {
            polls.set(polls.get() + 1);
            polls.get() == 3
        }));
    }

    #[test]
    fn sleep_advances_time() {
        let clock = TickClock::default();
        clock.sleep_us(500);
        assert!(*clock.0.lock() >= 500);
    }
}
