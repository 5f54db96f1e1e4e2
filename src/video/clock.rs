use std::time::Duration;

/// Blocking delays used for hardware settling
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Wall clock, blocks the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
