//! # Secrets
//!
//! The fixed catalog of secrets QiTlalli needs, and the values put into them.
//!
//! Generated values come from a cryptographically secure RNG. Values only live
//! in memory for the duration of the run and are wiped when dropped.

use crate::constants::{PASSWORD_ALPHABET, PLACEHOLDER_SECRET_VALUE};
use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// How the value of a new secret is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePolicy {
    /// Random string of the given length over [`PASSWORD_ALPHABET`]
    Generated(usize),
    /// Fixed placeholder an operator must replace by hand
    Placeholder,
}

/// One required secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretSpec {
    pub name: &'static str,
    pub policy: ValuePolicy,
}

/// Secrets every QiTlalli project needs, in provisioning order
pub const REQUIRED_SECRETS: [SecretSpec; 5] = [
    SecretSpec {
        name: "qitlalli-db-password",
        policy: ValuePolicy::Generated(32),
    },
    SecretSpec {
        name: "qitlalli-admin-password",
        policy: ValuePolicy::Generated(24),
    },
    SecretSpec {
        name: "qitlalli-jwt-secret",
        policy: ValuePolicy::Generated(64),
    },
    SecretSpec {
        name: "qitlalli-email-password",
        policy: ValuePolicy::Placeholder,
    },
    SecretSpec {
        name: "qitlalli-whatsapp-token",
        policy: ValuePolicy::Placeholder,
    },
];

impl SecretSpec {
    /// Produce a fresh entry for this secret
    #[must_use]
    pub fn materialize(&self) -> SecretEntry {
        match self.policy {
            ValuePolicy::Generated(length) => SecretEntry {
                name: self.name.to_string(),
                value: generate_password(length),
                placeholder: false,
            },
            ValuePolicy::Placeholder => SecretEntry {
                name: self.name.to_string(),
                value: PLACEHOLDER_SECRET_VALUE.to_string(),
                placeholder: true,
            },
        }
    }
}

/// A secret name and the value stored in its first version
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretEntry {
    name: String,
    value: String,
    placeholder: bool,
}

impl SecretEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when the value must be replaced manually
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

impl std::fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretEntry")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

/// Random password of exactly `length` characters from [`PASSWORD_ALPHABET`]
///
/// `rand::rng()` is a CSPRNG reseeded from the operating system.
#[must_use]
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_ALPHABET.len());
            char::from(PASSWORD_ALPHABET[idx])
        })
        .collect()
}
