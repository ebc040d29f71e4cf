//! Configuration errors
//!
//! Every failure raised while loading or checking a [`crate::SigilConfig`] carries an
//! [`ErrorContext`] naming where it happened and what the operator can change.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

pub type SigilResult<T> = Result<T, SigilError>;

/// Where an error was raised and how to get past it
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Correlates the log line with the message shown to the operator
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub operation: Option<String>,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }
}

#[derive(Error, Debug)]
pub enum SigilError {
    /// The configuration file could not be read, parsed or written, or is unusable
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// A single setting holds a value that is not allowed
    #[error("Invalid value for {field}: {message}")]
    Validation {
        message: String,
        field: String,
        context: ErrorContext,
    },
}

impl SigilError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            SigilError::Config { context, .. } | SigilError::Validation { context, .. } => context,
        }
    }

    /// The offending setting, when one is known
    pub fn field(&self) -> Option<&str> {
        match self {
            SigilError::Validation { field, .. } => Some(field),
            SigilError::Config { .. } => None,
        }
    }

    /// Emit the error and its suggestions through `tracing`
    pub fn log(&self) {
        let context = self.context();
        error!(
            error_id = %context.error_id,
            component = %context.component,
            operation = ?context.operation,
            field = ?self.field(),
            error = %self,
            "Configuration rejected"
        );
        for suggestion in &context.suggestions {
            info!(error_id = %context.error_id, "💡 {}", suggestion);
        }
    }
}

/// Build a [`SigilError::Validation`] for `field`
#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::SigilError::Validation {
            message: $msg.to_string(),
            field: $field.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion(&format!("Check the value of {}", $field)),
        }
    };
}
