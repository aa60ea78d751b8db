//! Per-author comment cooldown.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

pub struct CommentCooldown {
    window: Duration,
    last_post: Mutex<HashMap<String, Instant>>,
}

impl CommentCooldown {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_post: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.last_post
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Claims the window for `author` under one lock. `None` when the author
    /// posted within the window. The claim is undone when the reservation is
    /// dropped without `commit`.
    #[must_use]
    pub fn try_reserve(&self, author: &str) -> Option<CooldownReservation<'_>> {
        let mut map = self.lock();
        let previous = map.get(author).copied();
        if previous.is_some_and(|at| at.elapsed() < self.window) {
            return None;
        }

        let at = Instant::now();
        map.insert(author.to_string(), at);
        Some(CooldownReservation {
            cooldown: self,
            author: author.to_string(),
            at,
            previous,
            committed: false,
        })
    }

    /// Evicts entries older than `retention`, returning how many were removed.
    pub fn sweep(&self, retention: Duration) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, at| at.elapsed() < retention);
        before - map.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

pub struct CooldownReservation<'a> {
    cooldown: &'a CommentCooldown,
    author: String,
    at: Instant,
    previous: Option<Instant>,
    committed: bool,
}

impl CooldownReservation<'_> {
    /// Keeps the claim; the author's window starts at reservation time.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for CooldownReservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut map = self.cooldown.lock();
        // Leave entries written by a later reservation alone.
        if map.get(&self.author) != Some(&self.at) {
            return;
        }
        match self.previous {
            Some(previous) => {
                map.insert(self.author.clone(), previous);
            }
            None => {
                map.remove(&self.author);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_post_within_window_limited() {
        let cooldown = CommentCooldown::new(Duration::from_secs(30));
        cooldown.try_reserve("u1").unwrap().commit();
        assert!(cooldown.try_reserve("u1").is_none());
        assert!(cooldown.try_reserve("u2").is_some());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cooldown.try_reserve("u1").is_none());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cooldown.try_reserve("u1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reservation_blocked_until_dropped() {
        let cooldown = CommentCooldown::new(Duration::from_secs(30));

        let first = cooldown.try_reserve("u1").unwrap();
        assert!(cooldown.try_reserve("u1").is_none());

        drop(first);
        assert!(cooldown.is_empty());
        assert!(cooldown.try_reserve("u1").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_reservation_restores_previous_post() {
        let cooldown = CommentCooldown::new(Duration::from_secs(30));
        cooldown.try_reserve("u1").unwrap().commit();

        tokio::time::advance(Duration::from_secs(40)).await;
        drop(cooldown.try_reserve("u1").unwrap());

        // The older post stays on record for sweeping but no longer limits.
        assert_eq!(cooldown.len(), 1);
        assert_eq!(cooldown.sweep(Duration::from_secs(35)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_old_entries() {
        let cooldown = CommentCooldown::new(Duration::from_secs(30));
        cooldown.try_reserve("old").unwrap().commit();
        tokio::time::advance(Duration::from_secs(301)).await;
        cooldown.try_reserve("fresh").unwrap().commit();

        assert_eq!(cooldown.sweep(Duration::from_secs(300)), 1);
        assert_eq!(cooldown.len(), 1);
    }
}
