use super::{trim_line, Subscription, SubscriptionError};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

/// Newline-delimited payloads read from stdin; EOF closes the feed
pub struct StdinSubscription {
    reader: BufReader<Stdin>,
}

impl StdinSubscription {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinSubscription {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscription for StdinSubscription {
    async fn next(&mut self) -> Result<Option<Vec<u8>>, SubscriptionError> {
        loop {
            let mut line = Vec::new();
            let n = self
                .reader
                .read_until(b'\n', &mut line)
                .await
                .map_err(|e| SubscriptionError::Fatal(format!("stdin read failed: {}", e)))?;

            if n == 0 {
                return Ok(None);
            }

            let trimmed = trim_line(&line);
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_vec()));
            }
        }
    }

    fn name(&self) -> &'static str {
        "stdin"
    }
}
