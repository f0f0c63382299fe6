// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validation Diagnostics
//!
//! Validator output is data, never an exception. Each failed check produces
//! one `Diagnostic` carrying a stable code, the field path it refers to, a
//! severity, and a message. A staging row with any `Blocking` diagnostic is
//! marked `Invalid`; a row with only `Advisory` diagnostics is `Warning`.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Diagnostic severity. `Blocking` prevents commit; `Advisory` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Blocking,
    Advisory,
}

/// A single structured validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine code, e.g. `required-field-missing`.
    pub code: String,
    /// Field path within the record, e.g. `household_size`.
    pub path: String,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn blocking(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            code: code.into(),
            path: path.into(),
            severity: Severity::Blocking,
            message: message.into(),
        }
    }

    pub fn advisory(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            code: code.into(),
            path: path.into(),
            severity: Severity::Advisory,
            message: message.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_helpers() {
        assert!(Diagnostic::blocking("c", "p", "m").is_blocking());
        assert!(!Diagnostic::advisory("c", "p", "m").is_blocking());
    }

    #[test]
    fn test_display_format() {
        let d = Diagnostic::blocking("required-field-missing", "first_name", "must not be empty");
        assert_eq!(d.to_string(), "[required-field-missing] first_name: must not be empty");
    }
}
