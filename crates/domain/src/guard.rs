//! Quantity guard: side-effect free validation of identifiers and quantities.

use common::CartLimits;

use crate::error::{AppError, ErrorCode};

/// Rejects an empty identifier.
pub fn require_identifier(field: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::invalid_request(format!("{field} is required")));
    }
    Ok(())
}

/// Rejects a quantity outside `1..=limits.max_quantity`.
pub fn validate_quantity(quantity: i64, limits: &CartLimits) -> Result<(), AppError> {
    if quantity <= 0 || quantity > limits.max_quantity {
        return Err(AppError::invalid_request(format!(
            "quantity must be between 1 and {}, got {quantity}",
            limits.max_quantity
        )));
    }
    Ok(())
}

/// Validates an `(owner, product, quantity)` request.
///
/// Succeeds iff both identifiers are non-empty and the quantity is in range.
pub fn validate_item_request(
    owner_id: &str,
    product_id: &str,
    quantity: i64,
    limits: &CartLimits,
) -> Result<(), AppError> {
    require_identifier("cart owner id", owner_id)?;
    require_identifier("product id", product_id)?;
    validate_quantity(quantity, limits)
}

/// Converts a stored quantity to `i32`, failing with `invalid_quantity`
/// instead of truncating.
pub fn safe_i32(value: i64) -> Result<i32, AppError> {
    i32::try_from(value).map_err(|e| {
        AppError::wrap(
            ErrorCode::InvalidQuantity,
            format!("quantity {value} is out of range"),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let limits = CartLimits::default();
        assert!(validate_item_request("u-1", "SKU-001", 1, &limits).is_ok());
        assert!(validate_item_request("u-1", "SKU-001", 1000, &limits).is_ok());
    }

    #[test]
    fn test_quantity_bounds() {
        let limits = CartLimits::default();
        for quantity in [0, -1, 1001, i64::MAX, i64::MIN] {
            let err = validate_item_request("u-1", "SKU-001", quantity, &limits).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRequest, "quantity {quantity}");
        }
    }

    #[test]
    fn test_empty_identifiers() {
        let limits = CartLimits::default();
        let err = validate_item_request("", "SKU-001", 1, &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        let err = validate_item_request("u-1", "", 1, &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_safe_i32_bounds() {
        assert_eq!(safe_i32(i64::from(i32::MAX)).unwrap(), i32::MAX);
        assert_eq!(safe_i32(i64::from(i32::MIN)).unwrap(), i32::MIN);

        let err = safe_i32(1_i64 << 31).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidQuantity);
        let err = safe_i32(-(1_i64 << 31) - 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidQuantity);
    }
}
