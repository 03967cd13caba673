use std::time::Duration;

use dashmap::DashMap;
use serenity::model::id::UserId;
use tokio::time::Instant;

/// When each user may next run a command.
#[derive(Debug, Default)]
pub struct Cooldowns {
    next_allowed: DashMap<UserId, Instant>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `user` may run the command again, if any.
    pub fn remaining(&self, user: UserId, now: Instant) -> Option<Duration> {
        let next = *self.next_allowed.get(&user)?;
        if next > now {
            return Some(next - now);
        }

        self.next_allowed.remove_if(&user, |_, next| *next <= now);
        None
    }

    /// Starts or refreshes the cooldown. A zero cooldown records nothing.
    pub fn start(&self, user: UserId, now: Instant, cooldown: Duration) {
        if cooldown.is_zero() {
            return;
        }

        self.next_allowed.insert(user, now + cooldown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_expires() {
        let cooldowns = Cooldowns::new();
        let user = UserId(1);
        let now = Instant::now();

        assert_eq!(cooldowns.remaining(user, now), None);

        cooldowns.start(user, now, Duration::from_secs(10));
        assert_eq!(
            cooldowns.remaining(user, now + Duration::from_secs(4)),
            Some(Duration::from_secs(6))
        );
        assert_eq!(cooldowns.remaining(UserId(2), now), None);

        let expired = now + Duration::from_secs(10);
        assert_eq!(cooldowns.remaining(user, expired), None);
    }

    #[test]
    fn refresh_moves_the_deadline() {
        let cooldowns = Cooldowns::new();
        let user = UserId(1);
        let now = Instant::now();

        cooldowns.start(user, now, Duration::from_secs(10));
        let later = now + Duration::from_secs(5);
        cooldowns.start(user, later, Duration::from_secs(10));

        assert_eq!(
            cooldowns.remaining(user, now + Duration::from_secs(12)),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn zero_cooldown_is_ignored() {
        let cooldowns = Cooldowns::new();
        let now = Instant::now();

        cooldowns.start(UserId(1), now, Duration::ZERO);
        assert_eq!(cooldowns.remaining(UserId(1), now), None);
    }
}
