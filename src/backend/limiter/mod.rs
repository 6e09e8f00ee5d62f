//! Rate Limiter
//!
//! Per-connection token buckets in two classes: `draw` for canvas mutations
//! and `cursor` for cursor moves. Refill is computed from elapsed wall time
//! at consume time, not from a scheduler tick, so an idle connection earns
//! its full burst back without any background work.
//!
//! A [`ConnectionLimiter`] is owned by the connection's session state: it is
//! created lazily with the connection and dropped with it, which is the
//! whole cleanup story. Over-limit messages are dropped silently; the only
//! trace is a log line throttled to at most one per second per class.

use std::time::Instant;

/// Tuning for both bucket classes.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub draw_capacity: f64,
    pub draw_refill_per_sec: f64,
    pub cursor_capacity: f64,
    pub cursor_refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            draw_capacity: 30.0,
            draw_refill_per_sec: 60.0,
            cursor_capacity: 60.0,
            cursor_refill_per_sec: 120.0,
        }
    }
}

/// Message class a bucket applies to. HELLO, sync delivery, PING and board
/// management are never classed and never limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Draw,
    Cursor,
}

impl MessageClass {
    fn name(self) -> &'static str {
        match self {
            Self::Draw => "draw",
            Self::Cursor => "cursor",
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_drop_log: Option<Instant>,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: Instant::now(),
            last_drop_log: None,
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// At most one log line per second per bucket.
    fn should_log_drop(&mut self, now: Instant) -> bool {
        match self.last_drop_log {
            Some(last) if now.duration_since(last).as_secs_f64() < 1.0 => false,
            _ => {
                self.last_drop_log = Some(now);
                true
            }
        }
    }
}

/// Both buckets for one connection.
#[derive(Debug)]
pub struct ConnectionLimiter {
    draw: TokenBucket,
    cursor: TokenBucket,
}

impl ConnectionLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            draw: TokenBucket::new(config.draw_capacity, config.draw_refill_per_sec),
            cursor: TokenBucket::new(config.cursor_capacity, config.cursor_refill_per_sec),
        }
    }

    /// Whether one message of `class` may pass right now.
    pub fn allow(&mut self, class: MessageClass) -> bool {
        self.allow_at(class, Instant::now())
    }

    fn allow_at(&mut self, class: MessageClass, now: Instant) -> bool {
        let bucket = match class {
            MessageClass::Draw => &mut self.draw,
            MessageClass::Cursor => &mut self.cursor,
        };

        if bucket.try_consume(now) {
            true
        } else {
            if bucket.should_log_drop(now) {
                tracing::debug!("[RateLimit] dropping {} messages (bucket empty)", class.name());
            }
            false
        }
    }
}
