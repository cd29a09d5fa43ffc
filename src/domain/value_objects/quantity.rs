use crate::domain::errors::ValidationError;

/// Share count of a single trade. Always a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quantity(u64);

impl Quantity {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value <= 0 {
            return Err(ValidationError::InvalidQuantity(format!(
                "share count must be a positive integer, got {}",
                value
            )));
        }
        Ok(Quantity(value as u64))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Volume handed to the pricing function: positive for buys, negative for sells.
    pub fn signed(&self, negative: bool) -> i64 {
        if negative {
            -(self.0 as i64)
        } else {
            self.0 as i64
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_new_valid() {
        let qty = Quantity::new(100);
        assert!(qty.is_ok());
        assert_eq!(qty.unwrap().value(), 100);
    }

    #[test]
    fn test_quantity_new_negative() {
        assert!(matches!(
            Quantity::new(-5),
            Err(ValidationError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_quantity_new_zero() {
        assert!(Quantity::new(0).is_err());
    }

    #[test]
    fn test_quantity_signed() {
        let qty = Quantity::new(10).unwrap();
        assert_eq!(qty.signed(false), 10);
        assert_eq!(qty.signed(true), -10);
    }
}
