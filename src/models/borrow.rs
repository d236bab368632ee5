//! Borrow record model and the loan state machine
//!
//! The persisted `status` column is advisory: a record logically becomes
//! OVERDUE the moment `now > due_at`, whether or not the row has been touched
//! since. Every read-side decision therefore goes through [`BorrowRecord::logical_status`]
//! instead of trusting the stored enum.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

use super::book::BookSummary;
use super::user::UserSummary;

/// Loan lifecycle states
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Borrowed,
    Renewed,
    Overdue,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "borrowed",
            LoanStatus::Renewed => "renewed",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
        }
    }
}

/// Borrow record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renewed_count: i16,
    pub status: LoanStatus,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BorrowRecord {
    /// Status derived from (persisted status, due_at, returned_at, now).
    /// RETURNED is terminal; an unreturned record past its due date is
    /// overdue regardless of what the column says.
    pub fn logical_status(&self, now: DateTime<Utc>) -> LoanStatus {
        if self.returned_at.is_some() {
            LoanStatus::Returned
        } else if now > self.due_at {
            LoanStatus::Overdue
        } else {
            // A stale overdue stamp on an in-date record falls back to what
            // the renewal count says actually happened
            match self.status {
                LoanStatus::Overdue if self.renewed_count == 0 => LoanStatus::Borrowed,
                LoanStatus::Renewed | LoanStatus::Overdue => LoanStatus::Renewed,
                other => other,
            }
        }
    }

    /// Active = not yet returned (logically BORROWED, RENEWED or OVERDUE)
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.returned_at.is_none() && now > self.due_at
    }

    /// Check the renewal policy: only loans logically BORROWED or RENEWED
    /// may be renewed, and at most `max_renewals` times.
    pub fn ensure_renewable(&self, now: DateTime<Utc>, max_renewals: i16) -> AppResult<()> {
        match self.logical_status(now) {
            LoanStatus::Returned | LoanStatus::Overdue => Err(AppError::NotRenewable),
            LoanStatus::Borrowed | LoanStatus::Renewed => {
                if self.renewed_count >= max_renewals {
                    Err(AppError::MaxRenewalsExceeded(max_renewals))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Whole days overdue, rounded up. Zero when returned on or before the due
/// date; any fraction of a late day counts as a full day.
pub fn overdue_days(due_at: DateTime<Utc>, as_of: DateTime<Utc>) -> i64 {
    let late = as_of.signed_duration_since(due_at);
    if late <= Duration::zero() {
        return 0;
    }
    let ms = late.num_milliseconds();
    (ms + 86_399_999) / 86_400_000
}

/// Fine owed for a loan returned (or evaluated) at `as_of`. Always computed
/// fresh from `due_at`, overwriting any earlier lazy estimate.
pub fn fine_for(due_at: DateTime<Utc>, as_of: DateTime<Utc>, fine_per_day: Decimal) -> Decimal {
    Decimal::from(overdue_days(due_at, as_of)) * fine_per_day
}

/// Borrow record with embedded book (and, for admin views, user) details
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BorrowDetails {
    pub id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub renewed_count: i16,
    /// Logical status at read time
    pub status: LoanStatus,
    pub fine_amount: Decimal,
    pub fine_paid: bool,
    pub is_overdue: bool,
    pub book: BookSummary,
    pub user: Option<UserSummary>,
}

impl BorrowDetails {
    pub fn from_record(
        record: BorrowRecord,
        book: BookSummary,
        user: Option<UserSummary>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = record.logical_status(now);
        Self {
            id: record.id,
            borrowed_at: record.borrowed_at,
            due_at: record.due_at,
            returned_at: record.returned_at,
            renewed_count: record.renewed_count,
            status,
            fine_amount: record.fine_amount,
            fine_paid: record.fine_paid,
            is_overdue: status == LoanStatus::Overdue,
            book,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(due_at: DateTime<Utc>, status: LoanStatus) -> BorrowRecord {
        let borrowed_at = due_at - Duration::days(14);
        BorrowRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            borrowed_at,
            due_at,
            returned_at: None,
            renewed_count: 0,
            status,
            fine_amount: Decimal::ZERO,
            fine_paid: false,
            notes: None,
            created_at: borrowed_at,
            updated_at: borrowed_at,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn no_fine_when_returned_on_due_date() {
        let due = at(2025, 3, 1);
        assert_eq!(overdue_days(due, due), 0);
        assert_eq!(fine_for(due, due, Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn no_fine_when_returned_early() {
        let due = at(2025, 3, 1);
        assert_eq!(fine_for(due, due - Duration::days(3), Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn fine_is_one_per_whole_day_overdue() {
        let due = at(2025, 3, 1);
        assert_eq!(fine_for(due, due + Duration::days(3), Decimal::ONE), Decimal::from(3));
        assert_eq!(fine_for(due, due + Duration::days(6), Decimal::ONE), Decimal::from(6));
    }

    #[test]
    fn partial_day_overdue_counts_as_a_full_day() {
        let due = at(2025, 3, 1);
        assert_eq!(overdue_days(due, due + Duration::seconds(1)), 1);
        assert_eq!(overdue_days(due, due + Duration::days(2) + Duration::hours(5)), 3);
    }

    #[test]
    fn logical_status_derives_overdue_from_due_date() {
        let now = at(2025, 3, 10);
        let rec = record(now - Duration::days(1), LoanStatus::Borrowed);
        assert_eq!(rec.logical_status(now), LoanStatus::Overdue);
        assert!(rec.is_overdue(now));
        assert!(rec.is_active());
    }

    #[test]
    fn logical_status_ignores_stale_persisted_state() {
        // Column still says borrowed but the due date has passed
        let now = at(2025, 3, 10);
        let stale = record(now - Duration::hours(1), LoanStatus::Borrowed);
        assert_eq!(stale.logical_status(now), LoanStatus::Overdue);

        // Returned records are terminal whatever the column says
        let mut returned = record(now + Duration::days(3), LoanStatus::Borrowed);
        returned.returned_at = Some(now);
        assert_eq!(returned.logical_status(now), LoanStatus::Returned);
        assert!(!returned.is_active());
    }

    #[test]
    fn stale_overdue_stamp_on_in_date_record_follows_renewal_count() {
        // due_at pushed into the future while the column still says overdue
        let now = at(2025, 3, 10);
        let mut rec = record(now + Duration::days(5), LoanStatus::Overdue);
        assert_eq!(rec.logical_status(now), LoanStatus::Borrowed);

        rec.renewed_count = 1;
        assert_eq!(rec.logical_status(now), LoanStatus::Renewed);
    }

    #[test]
    fn renewal_allowed_below_cap() {
        let now = at(2025, 3, 10);
        let mut rec = record(now + Duration::days(4), LoanStatus::Borrowed);
        assert!(rec.ensure_renewable(now, 2).is_ok());
        rec.renewed_count = 1;
        rec.status = LoanStatus::Renewed;
        assert!(rec.ensure_renewable(now, 2).is_ok());
    }

    #[test]
    fn third_renewal_is_rejected() {
        let now = at(2025, 3, 10);
        let mut rec = record(now + Duration::days(4), LoanStatus::Renewed);
        rec.renewed_count = 2;
        assert!(matches!(
            rec.ensure_renewable(now, 2),
            Err(AppError::MaxRenewalsExceeded(2))
        ));
    }

    #[test]
    fn overdue_and_returned_loans_are_not_renewable() {
        let now = at(2025, 3, 10);
        let overdue = record(now - Duration::days(2), LoanStatus::Borrowed);
        assert!(matches!(overdue.ensure_renewable(now, 2), Err(AppError::NotRenewable)));

        let mut returned = record(now + Duration::days(2), LoanStatus::Borrowed);
        returned.returned_at = Some(now - Duration::days(1));
        assert!(matches!(returned.ensure_renewable(now, 2), Err(AppError::NotRenewable)));
    }
}
