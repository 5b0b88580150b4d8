//! Line based transport between the in-process bus and a pair of byte streams,
//! usually stdin and stdout.
//!
//! Every input line is `<topic> <payload>` and is published as is. Blank lines
//! and lines starting with `#` are skipped. Every attribute published on the
//! bus (any topic with an `atts` level) is written out as one JSON object per
//! line: `{"topic": "…", "payload": …, "retain": true}`.

use anyhow::Context;
use ocd_bridge::bus::{Bus, Message};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
struct OutputLine<'a> {
    topic: &'a str,
    /// The payload itself if it is JSON, otherwise the payload as a string.
    payload: serde_json::Value,
    retain: bool,
}

impl<'a> From<&'a Message> for OutputLine<'a> {
    fn from(message: &'a Message) -> Self {
        let payload = serde_json::from_slice(&message.payload).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(&message.payload).into_owned())
        });

        Self {
            topic: &message.topic,
            payload,
            retain: message.retain,
        }
    }
}

fn parse_line(line: &str) -> Option<Message> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (topic, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    Some(Message::new(topic.to_string(), payload.trim().to_string()))
}

fn is_attribute(topic: &str) -> bool {
    topic.split('/').any(|level| level == "atts")
}

/// Runs until `token` is cancelled. The end of `input` only stops publishing,
/// attributes are written until cancellation.
pub(crate) async fn run<B, R, W>(
    bus: B,
    input: R,
    mut output: W,
    token: CancellationToken,
) -> anyhow::Result<()>
where
    B: Bus,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut messages = bus.subscribe("#")?;
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,
            line = lines.next_line(), if input_open => {
                let Some(line) = line.context("Failed to read input")? else {
                    tracing::debug!("Input closed");
                    input_open = false;
                    continue;
                };

                if let Some(message) = parse_line(&line) {
                    if let Err(error) = bus.publish(message) {
                        tracing::warn!("Ignoring input line `{line}`: {error}");
                    }
                }
            }
            message = messages.recv() => {
                let Some(message) = message else { break };
                if !is_attribute(&message.topic) {
                    continue;
                }

                let mut line = serde_json::to_vec(&OutputLine::from(&message))?;
                line.push(b'\n');
                output.write_all(&line).await.context("Failed to write output")?;
                output.flush().await?;
            }
        }
    }

    Ok(())
}
