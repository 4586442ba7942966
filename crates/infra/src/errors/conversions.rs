//! Conversions from external infrastructure errors into domain errors.

use helki_domain::HelkiError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HelkiError);

impl From<InfraError> for HelkiError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HelkiError> for InfraError {
    fn from(value: HelkiError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoHelkiError {
    fn into_helki(self) -> HelkiError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HelkiError */
/* -------------------------------------------------------------------------- */

impl IntoHelkiError for HttpError {
    fn into_helki(self) -> HelkiError {
        if self.is_builder() {
            return HelkiError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_timeout() {
            return HelkiError::TransientTransport("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return HelkiError::TransientTransport(format!("HTTP connection failure: {self}"));
        }

        if self.is_decode() || self.is_body() {
            return HelkiError::Internal(format!("failed to read HTTP response body: {self}"));
        }

        HelkiError::TransientTransport(format!("HTTP request failed: {self}"))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_helki())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
