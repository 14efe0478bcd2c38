//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across PIA. Anything that would be
//! harmful in a log line belongs in one of these:
//!
//! - the DependencyTrack API key
//! - OIDC identity tokens submitted by CI pipelines
//!
//! `SecretString` implements `Debug` with redaction, so a struct that derives
//! `Debug` and holds a secret is safe to log. The value is only reachable
//! through an explicit `expose_secret()` call, and is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct UploadCredentials {
//!     project_id: String,
//!     token: SecretString,
//! }
//!
//! let creds = UploadCredentials {
//!     project_id: "technology.csi".to_string(),
//!     token: SecretString::from("eyJhbGciOiJSUzI1NiJ9.e30.sig"),
//! };
//!
//! let debug = format!("{creds:?}");
//! assert!(!debug.contains("eyJhbGci"));
//!
//! let token: &str = creds.token.expose_secret();
//! assert!(token.starts_with("eyJ"));
//! ```
//!
//! # Serde Integration
//!
//! With the `serde` feature enabled on `secrecy`, secrets deserialize
//! directly from request bodies:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct Request {
//!     project_id: String,
//!     token: SecretString,
//! }
//!
//! let json = r#"{"project_id": "p1", "token": "secret-token"}"#;
//! let req: Request = serde_json::from_str(json).unwrap();
//! assert!(!format!("{req:?}").contains("secret-token"));
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_debug_is_redacted() {
        let secret = SecretString::from("dt-api-key-123");
        let debug = format!("{secret:?}");

        assert!(!debug.contains("dt-api-key-123"));
        assert_eq!(secret.expose_secret(), "dt-api-key-123");
    }
}
