//! Environment variable access.

use thiserror::Error;

/// Errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// A required variable is not set.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
    /// The variable is set but holds no usable value.
    #[error("environment variable {0} is empty or not valid unicode")]
    InvalidEnvVar(String),
}

/// Reads a required environment variable.
///
/// Blank values are rejected the same way as invalid unicode.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) | Err(std::env::VarError::NotUnicode(_)) => {
            Err(EnvError::InvalidEnvVar(name.to_string()))
        }
        Err(std::env::VarError::NotPresent) => Err(EnvError::MissingEnvVar(name.to_string())),
    }
}

/// Reads an optional environment variable; unset and blank both give `None`.
pub fn env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable() {
        let name = "SHARED_UTILS_TEST_SURELY_UNSET";
        assert_eq!(
            get_env_var(name),
            Err(EnvError::MissingEnvVar(name.to_string()))
        );
        assert_eq!(env_var_opt(name), None);
    }

    #[test]
    fn present_variable() {
        // PATH is set in every test environment this crate runs in.
        assert!(get_env_var("PATH").is_ok());
    }
}
