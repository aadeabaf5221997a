//! Process configuration errors.

/// Problem reading or validating `vigil.toml`.
///
/// `key` names the offending setting when one is to blame, so the binary
/// can point at the exact line an operator has to fix.
#[derive(Debug, Clone)]
pub struct ConfigError {
    /// What went wrong
    pub message: String,
    /// Dotted setting name, e.g. `scan.api_base`
    pub key: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Error not tied to a single setting, such as an unreadable file.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_error::ConfigError;
    ///
    /// let err = ConfigError::new("vigil.toml not found");
    /// assert!(err.key.is_none());
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            key: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Error for one setting with a rejected value.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_error::ConfigError;
    ///
    /// let err = ConfigError::invalid("prefix", "must not be empty");
    /// assert_eq!(err.key.as_deref(), Some("prefix"));
    /// assert!(err.to_string().contains("prefix: must not be empty"));
    /// ```
    #[track_caller]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new(message);
        err.key = Some(key.into());
        err
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "Configuration Error: {}: {}", key, self.message)?,
            None => write!(f, "Configuration Error: {}", self.message)?,
        }
        write!(f, " at line {} in {}", self.line, self.file)
    }
}

impl std::error::Error for ConfigError {}
