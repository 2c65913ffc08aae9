use serde::{Deserialize, Serialize};

use freshly_core::{DomainResult, ensure_non_empty};

use crate::order::OrderStatus;

/// Typed partial update for an order: `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl OrderPatch {
    pub fn sets_status(&self) -> bool {
        self.status.is_some()
    }

    /// Present shipping fields must still be non-empty.
    pub fn validate(&self) -> DomainResult<()> {
        let fields = [
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
            ("phone", &self.phone),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                ensure_non_empty(name, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshly_core::DomainError;

    #[test]
    fn blank_present_fields_are_rejected() {
        let patch = OrderPatch {
            country: Some("".to_string()),
            ..OrderPatch::default()
        };
        assert_eq!(
            patch.validate(),
            Err(DomainError::validation("country must not be empty"))
        );
    }

    #[test]
    fn absent_fields_are_fine() {
        assert_eq!(OrderPatch::default().validate(), Ok(()));
        assert!(!OrderPatch::default().sets_status());
    }
}
