//! Birthday recipient records.

use {
    anyhow::{Context, Result, bail},
    chrono::{Datelike, NaiveDate},
    serde::Deserialize,
};

/// One birthday entry from the recipient list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BirthdayRecord {
    /// Which session sends the greeting.
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: String,
    /// Raw recipient phone number; normalized at send time.
    pub number: String,
    /// Name substituted into the greeting template.
    pub name: String,
    /// Fixed `DD-MM`, no year, no locale variation.
    pub date: String,
}

impl BirthdayRecord {
    /// Parse the `DD-MM` date field into `(day, month)`.
    pub fn day_month(&self) -> Result<(u32, u32)> {
        let (day, month) = self
            .date
            .split_once('-')
            .with_context(|| format!("birthday date '{}' is not DD-MM", self.date))?;

        if day.len() != 2 || month.len() != 2 {
            bail!("birthday date '{}' is not two-digit DD-MM", self.date);
        }

        let day: u32 = day
            .parse()
            .with_context(|| format!("bad day in birthday date '{}'", self.date))?;
        let month: u32 = month
            .parse()
            .with_context(|| format!("bad month in birthday date '{}'", self.date))?;

        if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            bail!("birthday date '{}' out of range", self.date);
        }

        Ok((day, month))
    }

    /// Whether this entry is due on `today`.
    pub fn matches(&self, today: NaiveDate) -> Result<bool> {
        let (day, month) = self.day_month()?;
        Ok(day == today.day() && month == today.month())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str) -> BirthdayRecord {
        BirthdayRecord {
            user_id: "alice".into(),
            number: "9876543210".into(),
            name: "Grace".into(),
            date: date.into(),
        }
    }

    #[test]
    fn parses_day_month() {
        assert_eq!(record("05-11").day_month().unwrap(), (5, 11));
        assert_eq!(record("29-02").day_month().unwrap(), (29, 2));
    }

    #[test]
    fn rejects_malformed_dates() {
        for bad in ["5-11", "05/11", "05-13", "00-01", "32-01", "abc", ""] {
            assert!(record(bad).day_month().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn matches_day_and_month_only() {
        let today = NaiveDate::from_ymd_opt(2024, 11, 5).unwrap();
        assert!(record("05-11").matches(today).unwrap());
        assert!(!record("05-12").matches(today).unwrap());
        assert!(!record("06-11").matches(today).unwrap());
    }
}
