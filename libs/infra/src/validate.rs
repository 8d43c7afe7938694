//! Payload validation subsystem over the `validator` derive rules.

use anyhow::Result;
use svckit::{Subsystem, Validator};

/// Runs a target's derive-generated rules; stateless, so the lifecycle is
/// the no-op default.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayloadValidator;

impl PayloadValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Subsystem for PayloadValidator {}

impl Validator for PayloadValidator {
    fn validate(&self, target: &dyn validator::Validate) -> Result<()> {
        target.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svckit::{NewUser, Validator as _};

    #[test]
    fn valid_payload_passes() {
        let validator = PayloadValidator::new();
        let draft = NewUser {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        };
        assert!(validator.validate(&draft).is_ok());
    }

    #[test]
    fn broken_email_is_reported_by_field() {
        let validator = PayloadValidator::new();
        let draft = NewUser {
            name: "Ada Lovelace".to_string(),
            email: "not-an-email".to_string(),
        };
        let err = validator.validate(&draft).unwrap_err();
        assert!(err.to_string().contains("email"), "got: {err}");
    }

    #[test]
    fn empty_name_is_rejected() {
        let validator = PayloadValidator::new();
        let draft = NewUser {
            name: String::new(),
            email: "ada@example.com".to_string(),
        };
        assert!(validator.validate(&draft).is_err());
    }
}
