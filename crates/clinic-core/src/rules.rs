//! # Cash Register Rules
//!
//! Closing arithmetic and the void preconditions, kept free of storage so
//! they can be tested at their boundaries.
//!
//! ## Closing
//! ```text
//! calculated = opening_balance + Σ income(active) − Σ expense(active)
//! difference = final_physical_amount − calculated
//!
//!   difference > 0  → surplus in the drawer
//!   difference < 0  → shortage
//! ```
//!
//! ## Voiding
//! ```text
//! ┌──────────────┐   no   ┌──────────────────┐   no   ┌──────────────────────┐
//! │ still active?├───────►│ AlreadyVoided    │        │                      │
//! └──────┬───────┘        └──────────────────┘        │                      │
//!        │ yes                                         │                      │
//! ┌──────▼───────┐  open  ┌──────────────────┐        │                      │
//! │ session state├───────►│ SessionStillOpen │        │                      │
//! └──────┬───────┘        └──────────────────┘        │                      │
//!        │ closed                                      │                      │
//! ┌──────▼─────────────────────┐  > window  ┌─────────▼──────────┐           │
//! │ now − closed_at ≤ window ? ├───────────►│ VoidWindowExpired  │           │
//! └──────┬─────────────────────┘            └────────────────────┘           │
//!        │ yes                                                                │
//!        ▼                                                                    │
//!      voidable                                                               │
//! ```

use chrono::{DateTime, Duration, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CashSession, LedgerTotals, Transaction};

/// Expected drawer content given the active totals.
pub fn calculated_balance(opening_balance: Money, totals: &LedgerTotals) -> CoreResult<Money> {
    opening_balance
        .checked_add(totals.income)
        .and_then(|balance| balance.checked_sub(totals.expense))
        .ok_or_else(|| overflow("calculated balance"))
}

/// Counted minus expected; positive is a surplus, negative a shortage.
pub fn closing_difference(final_physical_amount: Money, calculated: Money) -> CoreResult<Money> {
    final_physical_amount
        .checked_sub(calculated)
        .ok_or_else(|| overflow("closing difference"))
}

/// How far the current balance moved away from the closing snapshot.
pub fn post_close_drift(current_balance: Money, closing_balance: Money) -> CoreResult<Money> {
    current_balance
        .checked_sub(closing_balance)
        .ok_or_else(|| overflow("post-close drift"))
}

fn overflow(operation: &str) -> CoreError {
    CoreError::AmountOverflow {
        operation: operation.to_string(),
    }
}

/// The void window as a duration.
pub fn void_window(window_hours: i64) -> Duration {
    Duration::hours(window_hours)
}

/// Checks that `transaction` may be voided at `now`.
///
/// `session` must be the transaction's own session. The window is
/// inclusive: a void exactly `window_hours` after closing is accepted.
pub fn check_voidable(
    transaction: &Transaction,
    session: &CashSession,
    now: DateTime<Utc>,
    window_hours: i64,
) -> CoreResult<()> {
    if !transaction.is_active() {
        return Err(CoreError::AlreadyVoided(transaction.id.clone()));
    }

    let closed_at = match session.closed_at {
        Some(closed_at) if session.is_closed() => closed_at,
        _ => return Err(CoreError::SessionStillOpen(transaction.id.clone())),
    };

    if now - closed_at > void_window(window_hours) {
        return Err(CoreError::VoidWindowExpired {
            transaction_id: transaction.id.clone(),
            closed_at,
            window_hours,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        PaymentMethod, SessionStatus, TransactionOrigin, TransactionStatus, TransactionType,
    };
    use chrono::TimeZone;
    use rstest::rstest;

    fn closed_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap()
    }

    fn session(status: SessionStatus) -> CashSession {
        let closed = status == SessionStatus::Closed;
        CashSession {
            id: "s-1".into(),
            actor_id: "cashier-1".into(),
            opening_balance: Money::from_major(100_000),
            final_physical_amount: closed.then(|| Money::from_major(130_000)),
            closing_balance: closed.then(|| Money::from_major(130_000)),
            difference: closed.then(Money::zero),
            status,
            opened_at: closed_at() - Duration::hours(10),
            closed_at: closed.then(closed_at),
            closed_by_actor_id: closed.then(|| "cashier-1".to_string()),
            notes: None,
            closing_notes: None,
            closure_reason: None,
        }
    }

    fn transaction(status: TransactionStatus) -> Transaction {
        Transaction {
            id: "t-1".into(),
            session_id: "s-1".into(),
            transaction_type: TransactionType::Income,
            amount: Money::from_major(50_000),
            payment_method: PaymentMethod::Cash,
            status,
            origin: TransactionOrigin::ServicePayment,
            service_id: Some("svc-1".into()),
            patient_id: None,
            description: None,
            category: None,
            created_by_actor_id: "cashier-1".into(),
            created_at: closed_at() - Duration::hours(2),
            voided_by_actor_id: None,
            voided_at: None,
            void_reason: None,
        }
    }

    #[test]
    fn test_calculated_balance_and_difference() {
        let totals = LedgerTotals::new(Money::from_major(50_000), Money::from_major(20_000), 2);
        let calculated = calculated_balance(Money::from_major(100_000), &totals).unwrap();
        assert_eq!(calculated, Money::from_major(130_000));

        assert_eq!(
            closing_difference(Money::from_major(125_000), calculated).unwrap(),
            Money::from_major(-5_000)
        );
        assert_eq!(
            closing_difference(Money::from_major(130_000), calculated).unwrap(),
            Money::zero()
        );
        assert_eq!(
            post_close_drift(Money::from_major(80_000), calculated).unwrap(),
            Money::from_major(-50_000)
        );
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let totals = LedgerTotals::new(Money::from_cents(1), Money::zero(), 1);
        let result = calculated_balance(Money::from_cents(i64::MAX), &totals);
        assert!(matches!(result, Err(CoreError::AmountOverflow { .. })));

        let result = closing_difference(Money::zero(), Money::from_cents(i64::MIN));
        assert!(matches!(result, Err(CoreError::AmountOverflow { .. })));

        let result = post_close_drift(Money::from_cents(i64::MIN), Money::from_cents(1));
        assert!(matches!(result, Err(CoreError::AmountOverflow { .. })));
    }

    #[rstest]
    #[case::one_hour(Duration::hours(1))]
    #[case::just_inside(Duration::hours(24) - Duration::seconds(1))]
    #[case::exactly_at_window(Duration::hours(24))]
    fn test_void_within_window(#[case] after: Duration) {
        let result = check_voidable(
            &transaction(TransactionStatus::Active),
            &session(SessionStatus::Closed),
            closed_at() + after,
            24,
        );
        assert!(result.is_ok());
    }

    #[rstest]
    #[case::one_second_late(Duration::hours(24) + Duration::seconds(1))]
    #[case::next_days(Duration::hours(25))]
    fn test_void_after_window(#[case] after: Duration) {
        let result = check_voidable(
            &transaction(TransactionStatus::Active),
            &session(SessionStatus::Closed),
            closed_at() + after,
            24,
        );
        assert!(matches!(result, Err(CoreError::VoidWindowExpired { window_hours: 24, .. })));
    }

    #[test]
    fn test_void_open_session_rejected() {
        let result = check_voidable(
            &transaction(TransactionStatus::Active),
            &session(SessionStatus::Open),
            closed_at(),
            24,
        );
        assert!(matches!(result, Err(CoreError::SessionStillOpen(_))));
    }

    #[test]
    fn test_already_voided_checked_first() {
        let result = check_voidable(
            &transaction(TransactionStatus::Voided),
            &session(SessionStatus::Closed),
            closed_at() + Duration::hours(48),
            24,
        );
        assert!(matches!(result, Err(CoreError::AlreadyVoided(_))));
    }
}
