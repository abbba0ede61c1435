//! Line-oriented console for `turnstile serve`.
//!
//! Every stdin line is `{"channel": ..., "message": ...}` where the channel
//! is `presentation`, `control` or `operator`. Everything the host emits is
//! written to stdout in the same envelope, one JSON document per line.

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use turnstile_host::{OperatorCommand, OperatorNotice, OperatorRequest};
use turnstile_protocol::ControlEvent;

#[derive(Debug, Deserialize)]
#[serde(tag = "channel", content = "message", rename_all = "camelCase")]
enum ConsoleLine {
    Presentation(Value),
    Control(ControlEvent),
    Operator(OperatorRequest),
}

fn envelope(channel: &str, message: Value) -> String {
    json!({ "channel": channel, "message": message }).to_string()
}

/// Routes stdin lines to the host's three inbound streams.
#[derive(Debug)]
pub struct Console {
    intents: mpsc::UnboundedSender<String>,
    control: mpsc::UnboundedSender<ControlEvent>,
    commands: mpsc::UnboundedSender<OperatorCommand>,
    output: mpsc::UnboundedSender<String>,
}

impl Console {
    /// Creates a console feeding the given streams.
    pub fn new(
        intents: mpsc::UnboundedSender<String>,
        control: mpsc::UnboundedSender<ControlEvent>,
        commands: mpsc::UnboundedSender<OperatorCommand>,
        output: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            intents,
            control,
            commands,
            output,
        }
    }

    /// Reads stdin until EOF. Dropping the console afterwards closes the
    /// intent stream, which stops the host.
    #[instrument(skip(self))]
    pub async fn run(self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            if !self.route(&line) {
                break;
            }
        }
        debug!("Console input closed");
    }

    /// Returns false once the host has gone away.
    fn route(&self, line: &str) -> bool {
        let parsed: ConsoleLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed console line");
                return true;
            }
        };
        match parsed {
            ConsoleLine::Presentation(intent) => self.intents.send(intent.to_string()).is_ok(),
            ConsoleLine::Control(event) => self.control.send(event).is_ok(),
            ConsoleLine::Operator(request) => {
                let (command, reply) = OperatorCommand::new(request);
                if self.commands.send(command).is_err() {
                    return false;
                }
                let output = self.output.clone();
                tokio::spawn(async move {
                    let Ok(reply) = reply.await else {
                        return;
                    };
                    if output.send(envelope("operator", reply.to_json())).is_err() {
                        debug!("Output closed before operator reply");
                    }
                });
                true
            }
        }
    }
}

/// Writes lines to stdout until every sender is gone.
pub fn spawn_writer(mut lines: mpsc::UnboundedReceiver<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = lines.recv().await {
            let written = async {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await
            };
            if let Err(e) = written.await {
                warn!(error = %e, "Failed to write stdout");
                break;
            }
        }
    })
}

/// Wraps presentation events for stdout.
pub fn forward_events(
    mut events: mpsc::UnboundedReceiver<String>,
    output: mpsc::UnboundedSender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = events.recv().await {
            let message = serde_json::from_str(&text).unwrap_or(Value::String(text));
            if output.send(envelope("presentation", message)).is_err() {
                break;
            }
        }
    })
}

/// Wraps operator notices for stdout.
pub fn forward_notices(
    mut notices: mpsc::UnboundedReceiver<OperatorNotice>,
    output: mpsc::UnboundedSender<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            let message =
                serde_json::to_value(&notice).unwrap_or_else(|_| json!(notice.to_string()));
            if output.send(envelope("notice", message)).is_err() {
                break;
            }
        }
    })
}
