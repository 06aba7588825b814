//! # Validation Module
//!
//! Input validation for the cash register.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP controller                                              │
//! │  ├── Permission checks (capabilities)                                  │
//! │  └── Request parsing (Money::from_str)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: clinic-ledger services                                       │
//! │  └── THIS MODULE: amounts, reasons, free text                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (amount > 0, status values)                     │
//! │  ├── Partial UNIQUE index (one open session per actor)                 │
//! │  └── Triggers (append-only audit, immutable closed sessions)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use clinic_core::money::Money;
//! use clinic_core::validation::{validate_amount, validate_reason};
//!
//! validate_amount(Money::from_major(50_000)).unwrap();
//! let reason = validate_reason("  Duplicate charge ").unwrap();
//! assert_eq!(reason, "Duplicate charge");
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT, MAX_TEXT_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates the cash counted into the drawer when opening.
///
/// Zero is allowed (an empty drawer), negative is not.
///
/// ```rust
/// use clinic_core::money::Money;
/// use clinic_core::validation::validate_opening_balance;
///
/// assert!(validate_opening_balance(Money::zero()).is_ok());
/// assert!(validate_opening_balance(Money::from_cents(-1)).is_err());
/// ```
pub fn validate_opening_balance(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "opening balance".to_string(),
        });
    }
    check_max("opening balance", amount)
}

/// Validates the physically counted amount declared at closing.
pub fn validate_final_amount(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "final physical amount".to_string(),
        });
    }
    check_max("final physical amount", amount)
}

/// Validates a transaction amount.
///
/// ## Rules
/// - Must be strictly positive; the sign comes from the transaction type
/// - Must not exceed [`MAX_AMOUNT`]
pub fn validate_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    check_max("amount", amount)
}

fn check_max(field: &str, amount: Money) -> ValidationResult<()> {
    if amount > MAX_AMOUNT {
        return Err(ValidationError::TooLarge {
            field: field.to_string(),
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

// =============================================================================
// Text Validators
// =============================================================================

/// Validates a mandatory justification (void reason, forced closure reason).
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    validate_required_text("reason", reason)
}

/// Validates a required free-text field and returns it trimmed.
pub fn validate_required_text(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    check_length(field, value)?;
    Ok(value.to_string())
}

/// Validates optional free text (notes, descriptions).
///
/// Blank input is normalized to `None`.
pub fn validate_optional_text(field: &str, value: Option<&str>) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            check_length(field, v)?;
            Ok(Some(v.to_string()))
        }
    }
}

fn check_length(field: &str, value: &str) -> ValidationResult<()> {
    if value.chars().count() > MAX_TEXT_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_TEXT_LENGTH,
        });
    }
    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an actor identifier. Actors are opaque; only emptiness is checked.
pub fn validate_actor_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "actor id".to_string(),
        });
    }
    Ok(())
}

/// Validates a UUID string format.
///
/// ```rust
/// use clinic_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, true)]
    #[case(10_000_000, true)]
    #[case(-1, false)]
    #[case(MAX_AMOUNT.cents(), true)]
    #[case(MAX_AMOUNT.cents() + 1, false)]
    #[case(i64::MAX, false)]
    fn test_validate_opening_balance(#[case] cents: i64, #[case] ok: bool) {
        assert_eq!(validate_opening_balance(Money::from_cents(cents)).is_ok(), ok);
        assert_eq!(validate_final_amount(Money::from_cents(cents)).is_ok(), ok);
    }

    #[rstest]
    #[case(1, true)]
    #[case(5_000_000, true)]
    #[case(0, false)]
    #[case(-500, false)]
    #[case(MAX_AMOUNT.cents(), true)]
    #[case(i64::MAX, false)]
    fn test_validate_amount(#[case] cents: i64, #[case] ok: bool) {
        assert_eq!(validate_amount(Money::from_cents(cents)).is_ok(), ok);
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason(" Wrong amount ").unwrap(), "Wrong amount");
        assert!(matches!(
            validate_reason("   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_reason(&"x".repeat(MAX_TEXT_LENGTH + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_optional_text() {
        assert_eq!(validate_optional_text("notes", None).unwrap(), None);
        assert_eq!(validate_optional_text("notes", Some("  ")).unwrap(), None);
        assert_eq!(
            validate_optional_text("notes", Some(" morning shift ")).unwrap(),
            Some("morning shift".to_string())
        );
        assert!(validate_optional_text("notes", Some(&"x".repeat(2000))).is_err());
    }

    #[test]
    fn test_validate_ids() {
        assert!(validate_actor_id("cashier-1").is_ok());
        assert!(validate_actor_id(" ").is_err());

        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
