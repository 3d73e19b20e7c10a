//! Broker credentials and how to ask for them

use async_trait::async_trait;
use std::fmt;
use std::io::{BufRead, IsTerminal, Write};
use tracing::warn;

/// User and password for the broker
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name
    pub user: String,
    /// Password
    pub password: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Result of asking the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    /// User entered credentials
    Provided(Credentials),
    /// User dismissed the prompt
    Canceled,
}

/// Asks for credentials
#[async_trait]
pub trait CredentialPrompt: Send + Sync + fmt::Debug {
    /// Whether the prompt can be shown in the current environment
    fn is_supported(&self) -> bool {
        true
    }

    /// Ask for credentials, pre-filling the user name
    async fn prompt(&self, user: &str) -> PromptOutcome;
}

/// Reads user and password from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    fn read(user: &str) -> std::io::Result<PromptOutcome> {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        let mut lines = stdin.lock();

        write!(stdout, "Broker user [{}]: ", user)?;
        stdout.flush()?;
        let mut entered_user = String::new();
        if lines.read_line(&mut entered_user)? == 0 {
            return Ok(PromptOutcome::Canceled);
        }

        write!(stdout, "Broker password: ")?;
        stdout.flush()?;
        let mut password = String::new();
        if lines.read_line(&mut password)? == 0 {
            return Ok(PromptOutcome::Canceled);
        }

        let entered_user = entered_user.trim();
        let user = if entered_user.is_empty() { user } else { entered_user };

        Ok(PromptOutcome::Provided(Credentials::new(
            user,
            password.trim_end_matches(['\r', '\n']),
        )))
    }
}

#[async_trait]
impl CredentialPrompt for ConsolePrompt {
    fn is_supported(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    async fn prompt(&self, user: &str) -> PromptOutcome {
        let user = user.to_string();
        match tokio::task::spawn_blocking(move || Self::read(&user)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("Failed to read credentials from console: {}", e);
                PromptOutcome::Canceled
            }
            Err(e) => {
                warn!("Console prompt task failed: {}", e);
                PromptOutcome::Canceled
            }
        }
    }
}
