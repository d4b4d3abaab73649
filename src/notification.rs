use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible message, e.g. "could not open document".
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(
        message: impl Into<String>,
        level: NotificationLevel,
        now: Instant,
        duration: Duration,
    ) -> Self {
        Self {
            message: message.into(),
            level,
            created_at: now,
            expires_at: now + duration,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn time_remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Newest-first queue of notifications with expiry.
#[derive(Debug)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::with_default_duration(Duration::from_secs(4))
    }
}

impl NotificationManager {
    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel, now: Instant) {
        let message = message.into();
        match level {
            NotificationLevel::Info => log::info!("{message}"),
            NotificationLevel::Warning => log::warn!("{message}"),
            NotificationLevel::Error => log::error!("{message}"),
        }
        self.notifications
            .insert(0, Notification::new(message, level, now, self.default_duration));
    }

    pub fn info(&mut self, message: impl Into<String>, now: Instant) {
        self.notify(message, NotificationLevel::Info, now);
    }

    pub fn warn(&mut self, message: impl Into<String>, now: Instant) {
        self.notify(message, NotificationLevel::Warning, now);
    }

    pub fn error(&mut self, message: impl Into<String>, now: Instant) {
        self.notify(message, NotificationLevel::Error, now);
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self, now: Instant) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired(now));
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_expiration() {
        let now = Instant::now();
        let n = Notification::new("test", NotificationLevel::Info, now, Duration::from_millis(50));
        assert!(!n.is_expired(now + Duration::from_millis(49)));
        assert!(n.is_expired(now + Duration::from_millis(50)));
        assert_eq!(n.time_remaining(now + Duration::from_millis(20)), Duration::from_millis(30));
    }

    #[test]
    fn manager_keeps_newest_first() {
        let now = Instant::now();
        let mut manager = NotificationManager::default();
        manager.info("First", now);
        manager.warn("Second", now);
        manager.error("Third", now);

        assert_eq!(manager.count(), 3);
        let current = manager.current().unwrap();
        assert_eq!(current.message, "Third");
        assert_eq!(current.level, NotificationLevel::Error);

        assert!(manager.dismiss_current());
        assert_eq!(manager.current().unwrap().message, "Second");
    }

    #[test]
    fn manager_removes_expired() {
        let now = Instant::now();
        let mut manager = NotificationManager::with_default_duration(Duration::from_millis(50));
        manager.info("Short-lived", now);
        assert!(!manager.update(now + Duration::from_millis(10)));
        assert!(manager.update(now + Duration::from_millis(60)));
        assert_eq!(manager.count(), 0);
    }
}
