use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a subscription month in days.
pub const DAYS_PER_MONTH: u64 = 30;

/// Represents a user in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's email address, lower-cased.
    pub email: String,
    /// The user's argon2id password hash (PHC string).
    pub password_hash: String,
    /// The purchased plan, if any.
    pub subscription_plan: Option<Plan>,
    /// Last day (inclusive) the subscription is active.
    pub subscription_expiry: Option<NaiveDate>,
    /// Remaining metered messages.
    pub token_count: i32,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the subscription covers `today`.
    pub fn is_subscribed(&self, today: NaiveDate) -> bool {
        self.subscription_expiry.is_some_and(|expiry| expiry >= today)
    }
}

/// A subscription plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    OneMonth,
    SixMonths,
    TwelveMonths,
}

impl Plan {
    /// Parses the plan code sent by clients (`"1"`, `"6"` or `"12"`).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(Plan::OneMonth),
            "6" => Some(Plan::SixMonths),
            "12" => Some(Plan::TwelveMonths),
            _ => None,
        }
    }

    /// Parses the label stored in the `users` table.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "1 Month" => Some(Plan::OneMonth),
            "6 Months" => Some(Plan::SixMonths),
            "1 Year" => Some(Plan::TwelveMonths),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Plan::OneMonth => "1 Month",
            Plan::SixMonths => "6 Months",
            Plan::TwelveMonths => "1 Year",
        }
    }

    pub fn months(self) -> u32 {
        match self {
            Plan::OneMonth => 1,
            Plan::SixMonths => 6,
            Plan::TwelveMonths => 12,
        }
    }

    /// Expiry date for a plan bought on `today`, using 30-day months.
    pub fn expiry_from(self, today: NaiveDate) -> NaiveDate {
        expiry_after_months(today, self.months())
    }
}

/// `today + 30 * months` days.
pub fn expiry_after_months(today: NaiveDate, months: u32) -> NaiveDate {
    today
        .checked_add_days(Days::new(DAYS_PER_MONTH * u64::from(months)))
        .unwrap_or(NaiveDate::MAX)
}

/// The response payload describing a user's allowance.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub plan: Option<&'static str>,
    pub subscription_expiry: Option<NaiveDate>,
    pub subscribed: bool,
    /// `None` while subscribed (unbounded).
    pub tokens_remaining: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn plan_codes_and_labels() {
        assert_eq!(Plan::from_code("6"), Some(Plan::SixMonths));
        assert_eq!(Plan::from_code("3"), None);
        assert_eq!(Plan::from_label(Plan::TwelveMonths.label()), Some(Plan::TwelveMonths));
    }

    #[test]
    fn six_month_plan_lasts_180_days() {
        assert_eq!(Plan::SixMonths.expiry_from(date(2026, 1, 1)), date(2026, 6, 30));
    }

    #[test]
    fn subscription_is_active_through_expiry_day() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: String::new(),
            subscription_plan: Some(Plan::OneMonth),
            subscription_expiry: Some(date(2026, 3, 10)),
            token_count: 0,
            created_at: Utc::now(),
        };
        assert!(user.is_subscribed(date(2026, 3, 10)));
        assert!(!user.is_subscribed(date(2026, 3, 11)));
    }
}
