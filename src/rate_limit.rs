use std::net::IpAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// A request budget over a fixed window, e.g. `5/minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub window: Duration,
}

impl Quota {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

impl FromStr for Quota {
    type Err = String;

    /// Accepts `N/unit` or `N per unit`, unit one of second, minute, hour, day
    /// (singular or plural).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(" per ", "/");
        let (count, unit) = normalized
            .split_once('/')
            .ok_or_else(|| "expected <count>/<unit>".to_string())?;

        let limit: u32 = count
            .trim()
            .parse()
            .map_err(|e| format!("invalid count: {e}"))?;
        if limit == 0 {
            return Err("count must be positive".to_string());
        }

        let secs = match unit.trim().trim_end_matches('s') {
            "second" => 1,
            "minute" => 60,
            "hour" => 60 * 60,
            "day" => 24 * 60 * 60,
            other => return Err(format!("unknown unit '{other}'")),
        };

        Ok(Quota::new(limit, Duration::from_secs(secs)))
    }
}

/// Per-client submission limiter enforcing every configured quota at once.
pub struct SubmissionRateLimiter {
    quotas: Vec<Quota>,
    /// (quota index, ip) -> (count, window_start)
    entries: DashMap<(usize, IpAddr), (u32, Instant)>,
}

impl SubmissionRateLimiter {
    pub fn new(quotas: Vec<Quota>) -> Self {
        Self {
            quotas,
            entries: DashMap::new(),
        }
    }

    /// Check and count a request. Returns Ok(()) or Err with retry-after seconds.
    /// A rejected request does not consume budget from any quota.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let now = Instant::now();

        let mut retry_after = None;
        for (idx, quota) in self.quotas.iter().enumerate() {
            let Some(entry) = self.entries.get(&(idx, ip)) else {
                continue;
            };
            let (count, start) = *entry.value();
            let elapsed = now.duration_since(start);
            if elapsed < quota.window && count >= quota.limit {
                let wait = quota.window.saturating_sub(elapsed).as_secs().max(1);
                retry_after = Some(retry_after.map_or(wait, |w: u64| w.max(wait)));
            }
        }
        if let Some(wait) = retry_after {
            return Err(wait);
        }

        for (idx, quota) in self.quotas.iter().enumerate() {
            let mut entry = self.entries.entry((idx, ip)).or_insert((0, now));
            let (count, start) = entry.value_mut();
            if now.duration_since(*start) >= quota.window {
                *count = 1;
                *start = now;
            } else {
                *count += 1;
            }
        }

        Ok(())
    }

    /// Remove entries whose window has fully elapsed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let quotas = &self.quotas;
        self.entries.retain(|(idx, _), (_, start)| {
            quotas
                .get(*idx)
                .is_some_and(|q| now.duration_since(*start) < q.window)
        });
    }

    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}
