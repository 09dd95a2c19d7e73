//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use sakura::error::SakuraError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Bad --set or --values input
    Values(String),
    /// The runtime rejected or aborted the script
    Run(SakuraError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("{}", self);

        if let CliError::Values(_) = self {
            eprintln!();
            eprintln!("Initial values are passed as:");
            eprintln!("  --set key=value       (repeatable; value is a literal)");
            eprintln!("  --values file.json    (top-level JSON object)");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Values(msg) => write!(f, "Invalid initial values: {}", msg),
            CliError::Run(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Run(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SakuraError> for CliError {
    fn from(e: SakuraError) -> Self {
        CliError::Run(e)
    }
}
