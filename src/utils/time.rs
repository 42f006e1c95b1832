use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// 현재 시각 제공자 (초 단위 unix timestamp)
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// 시스템 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        current_timestamp()
    }
}

/// 수동으로 조정하는 시계 (시뮬레이션, 테스트용)
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self { now: AtomicU64::new(now) }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Get current timestamp
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// `then` 이후 경과 시간 (미래 시각이면 0)
pub fn age_of(then: u64, now: u64) -> u64 {
    now.saturating_sub(then)
}
