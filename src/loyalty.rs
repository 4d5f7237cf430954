//! Loyalty Points

use jiff::{Timestamp, civil::Date, tz::TimeZone};

/// Consecutive login days that earn the streak bonus.
pub const STREAK_LENGTH: u32 = 7;

/// Points granted when a streak completes.
pub const STREAK_BONUS_POINTS: u64 = 50;

/// Minor units of final price that earn one point (10 points per 100 currency units).
pub const MINOR_UNITS_PER_POINT_EARNED: u64 = 1_000;

/// Discount percentage earned per returned ink bottle.
pub const INK_BOTTLE_REWARD_PERCENT: u16 = 5;

/// Days an ink bottle reward stays valid.
pub const INK_BOTTLE_REWARD_VALID_DAYS: u32 = 30;

/// Reason recorded on ink bottle reward discounts.
pub const INK_BOTTLE_REWARD_REASON: &str = "Ink bottle return reward";

/// Points earned by a settled order, floored.
pub const fn points_awarded(final_price: u64) -> u64 {
    final_price / MINOR_UNITS_PER_POINT_EARNED
}

/// Discount percentage earned by `returns` ink bottles, capped at 100. `None` when nothing was
/// returned.
pub fn ink_bottle_reward(returns: u32) -> Option<u16> {
    if returns == 0 {
        return None;
    }

    let percentage = u16::try_from(returns)
        .unwrap_or(u16::MAX)
        .saturating_mul(INK_BOTTLE_REWARD_PERCENT);

    Some(percentage.min(100))
}

/// Calendar day a login counts towards. Streaks are tracked in UTC.
pub fn login_date(at: Timestamp) -> Date {
    at.to_zoned(TimeZone::UTC).date()
}

/// State of a user's streak after a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginOutcome {
    /// New streak length.
    pub streak: u32,

    /// Bonus points to credit, zero unless the streak just completed.
    pub bonus_points: u64,
}

/// Advance a login streak.
///
/// A second login on the same day changes nothing. A login on the day after the previous one
/// extends the streak, and completing [`STREAK_LENGTH`] days grants [`STREAK_BONUS_POINTS`] and
/// resets the streak to zero. Any longer gap starts a new streak of one.
pub fn record_login(previous: Option<Date>, today: Date, streak: u32) -> LoginOutcome {
    let unchanged = LoginOutcome {
        streak,
        bonus_points: 0,
    };

    let Some(previous) = previous else {
        return LoginOutcome {
            streak: 1,
            bonus_points: 0,
        };
    };

    // A clock that moved backwards counts as the same day.
    if today <= previous {
        return unchanged;
    }

    let consecutive = previous.tomorrow().is_ok_and(|next| next == today);

    if !consecutive {
        return LoginOutcome {
            streak: 1,
            bonus_points: 0,
        };
    }

    let extended = streak.saturating_add(1);

    if extended >= STREAK_LENGTH {
        return LoginOutcome {
            streak: 0,
            bonus_points: STREAK_BONUS_POINTS,
        };
    }

    LoginOutcome {
        streak: extended,
        bonus_points: 0,
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn points_are_ten_per_hundred_units() {
        assert_eq!(points_awarded(200_00), 20);
        assert_eq!(points_awarded(100_00), 10);
        assert_eq!(points_awarded(9_99), 0);
        assert_eq!(points_awarded(1_000_00), 100);
    }

    #[test]
    fn ink_bottles_earn_five_percent_each() {
        assert_eq!(ink_bottle_reward(0), None);
        assert_eq!(ink_bottle_reward(1), Some(5));
        assert_eq!(ink_bottle_reward(3), Some(15));
        assert_eq!(ink_bottle_reward(20), Some(100));
    }

    #[test]
    fn ink_bottle_reward_is_capped_at_full_price() {
        assert_eq!(ink_bottle_reward(21), Some(100));
        assert_eq!(ink_bottle_reward(u32::MAX), Some(100));
    }

    #[test]
    fn first_login_starts_streak() {
        let outcome = record_login(None, date(2024, 3, 1), 0);

        assert_eq!(outcome.streak, 1);
        assert_eq!(outcome.bonus_points, 0);
    }

    #[test]
    fn same_day_login_is_unchanged() {
        let today = date(2024, 3, 1);

        assert_eq!(
            record_login(Some(today), today, 3),
            LoginOutcome {
                streak: 3,
                bonus_points: 0
            }
        );
    }

    #[test]
    fn next_day_login_extends_streak() {
        let outcome = record_login(Some(date(2024, 2, 29)), date(2024, 3, 1), 2);

        assert_eq!(outcome.streak, 3);
    }

    #[test]
    fn gap_resets_streak_to_one() {
        let outcome = record_login(Some(date(2024, 3, 1)), date(2024, 3, 3), 5);

        assert_eq!(outcome.streak, 1);
        assert_eq!(outcome.bonus_points, 0);
    }

    #[test]
    fn seventh_day_grants_bonus_and_resets() {
        let outcome = record_login(Some(date(2024, 3, 6)), date(2024, 3, 7), 6);

        assert_eq!(
            outcome,
            LoginOutcome {
                streak: 0,
                bonus_points: STREAK_BONUS_POINTS
            }
        );
    }

    #[test]
    fn login_date_is_utc_calendar_day() -> TestResult {
        let at: Timestamp = "2024-03-01T23:59:59Z".parse()?;

        assert_eq!(login_date(at), date(2024, 3, 1));

        Ok(())
    }
}
