//! Redaction of session content before it leaves the machine.
//!
//! Every string leaf is run through the enabled categories in a fixed order:
//! secrets, PII, home-directory paths, then high-entropy tokens. Replacement
//! placeholders never match any pattern, so sanitizing twice is a no-op.

mod entropy;
mod patterns;
mod sanitizer;

pub use entropy::shannon_entropy;
pub use sanitizer::{RedactionCategory, HOME_PLACEHOLDER, RedactionReport, Sanitizer};
