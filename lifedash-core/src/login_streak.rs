//! Daily login streak kept on the user row.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginStreak {
    pub current: u32,
    pub longest: u32,
    pub last_login: Option<NaiveDate>,
}

impl LoginStreak {
    /// Apply a login on `today`.
    ///
    /// Same-day logins leave the counters alone, a login the day after the
    /// previous one extends the streak, and any longer gap restarts it at 1.
    pub fn advance(self, today: NaiveDate) -> Self {
        let (current, longest) = match self.last_login {
            None => (1, self.longest.max(1)),
            Some(last) if last == today => (self.current, self.longest),
            Some(last) if last + Duration::days(1) == today => {
                let current = self.current + 1;
                (current, self.longest.max(current))
            }
            Some(_) => (1, self.longest.max(1)),
        };

        Self {
            current,
            longest,
            last_login: Some(today),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_first_login() {
        let streak = LoginStreak::default().advance(day(1));
        assert_eq!(
            streak,
            LoginStreak {
                current: 1,
                longest: 1,
                last_login: Some(day(1)),
            }
        );
    }

    #[test]
    fn test_same_day_is_noop() {
        let streak = LoginStreak {
            current: 4,
            longest: 6,
            last_login: Some(day(10)),
        };
        assert_eq!(streak.advance(day(10)), streak);
    }

    #[test]
    fn test_consecutive_day_extends_and_raises_longest() {
        let streak = LoginStreak {
            current: 6,
            longest: 6,
            last_login: Some(day(10)),
        }
        .advance(day(11));

        assert_eq!(streak.current, 7);
        assert_eq!(streak.longest, 7);
        assert_eq!(streak.last_login, Some(day(11)));
    }

    #[test]
    fn test_gap_resets_but_keeps_longest() {
        let streak = LoginStreak {
            current: 3,
            longest: 9,
            last_login: Some(day(10)),
        }
        .advance(day(13));

        assert_eq!(streak.current, 1);
        assert_eq!(streak.longest, 9);
    }

    #[test]
    fn test_month_boundary() {
        let streak = LoginStreak {
            current: 2,
            longest: 2,
            last_login: NaiveDate::from_ymd_opt(2024, 4, 30),
        }
        .advance(day(1));

        assert_eq!(streak.current, 3);
    }
}
