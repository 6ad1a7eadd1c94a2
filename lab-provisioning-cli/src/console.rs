use async_trait::async_trait;
use lab_provisioning_orchestrator::Confirmation;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

/// Operator input. Menu commands and confirmations read from the same lines.
pub struct Console {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// `None` once stdin is closed.
    pub async fn prompt(&self, prompt: &str) -> std::io::Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        self.lines.lock().await.next_line().await
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Only a literal `Y` counts as consent.
pub fn is_consent(answer: &str) -> bool {
    answer.trim() == "Y"
}

#[async_trait]
impl Confirmation for Console {
    async fn confirm(&self, prompt: &str) -> bool {
        match self.prompt(&format!("{prompt} Type Y to proceed: ")).await {
            Ok(Some(answer)) => is_consent(&answer),
            Ok(None) => false,
            Err(error) => {
                warn!(%error, "could not read the confirmation");
                false
            }
        }
    }
}
