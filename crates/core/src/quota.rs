use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_DAILY_LIMIT: u32 = 50;

#[derive(Debug, Default)]
struct QuotaState {
    day: Option<NaiveDate>,
    used: u32,
}

impl QuotaState {
    fn roll(&mut self, today: NaiveDate) {
        if self.day != Some(today) {
            self.day = Some(today);
            self.used = 0;
        }
    }
}

/// In-memory daily call counter. Resets whenever the caller-supplied local date changes.
#[derive(Debug, Clone)]
pub struct DailyQuota {
    limit: u32,
    state: Arc<Mutex<QuotaState>>,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Arc::new(Mutex::new(QuotaState::default())),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Consumes one unit for `today`. Returns false without consuming when the limit is reached.
    pub async fn try_acquire(&self, today: NaiveDate) -> bool {
        let mut state = self.state.lock().await;
        state.roll(today);
        if state.used >= self.limit {
            return false;
        }
        state.used += 1;
        true
    }

    pub async fn is_exhausted(&self, today: NaiveDate) -> bool {
        let mut state = self.state.lock().await;
        state.roll(today);
        state.used >= self.limit
    }

    pub async fn used(&self, today: NaiveDate) -> u32 {
        let mut state = self.state.lock().await;
        state.roll(today);
        state.used
    }
}

impl Default for DailyQuota {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT)
    }
}
