use std::io;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use super::codec::TclCodec;

/// Default port of the OpenOCD TCL RPC server.
pub const DEFAULT_TCL_PORT: u16 = 6666;

/// Prefix of the result when a wrapped command raised a TCL error.
const ERROR_MARKER: &str = "ocd-bridge-error:";

#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum TclError {
    /// Could not connect to OpenOCD at {address}
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    /// Connection to OpenOCD failed
    Io(#[from] io::Error),
    /// OpenOCD closed the connection
    Disconnected,
    /// `{command}` failed: {message}
    Command { command: String, message: String },
    /// Unexpected response to `{command}`: `{response}`
    UnexpectedResponse { command: String, response: String },
}

/// A connection to the TCL RPC server of OpenOCD.
///
/// The protocol has no request ids, so the client keeps strictly one command
/// in flight and reads its response before sending the next.
#[derive(Debug)]
pub struct TclClient<T = TcpStream> {
    framed: Framed<T, TclCodec>,
}

impl TclClient<TcpStream> {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TclError> {
        let address = format!("{host}:{port}");

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|source| TclError::Connect {
                address: address.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        tracing::info!("Connected to OpenOCD at {address}");

        Ok(Self::new(stream))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> TclClient<T> {
    pub fn new(io: T) -> Self {
        Self {
            framed: Framed::new(io, TclCodec::new()),
        }
    }

    /// Sends `script` verbatim and returns whatever OpenOCD answers.
    pub async fn raw(&mut self, script: &str) -> Result<String, TclError> {
        tracing::trace!("tcl > {script}");
        self.framed.send(script).await?;

        let response = self.framed.next().await.ok_or(TclError::Disconnected)??;
        tracing::trace!("tcl < {response}");

        Ok(response)
    }

    /// Runs `command` and returns its result.
    ///
    /// The TCL RPC server answers errors with the plain error text, just like a
    /// result. The command is therefore run inside `catch` so a failure can be
    /// told apart from a result. It is passed to `catch` as a single quoted
    /// word, so a command that does not parse, e.g. one with unbalanced braces,
    /// fails inside `catch` as well.
    pub async fn execute(&mut self, command: &str) -> Result<String, TclError> {
        let script = format!(
            "set ocd_bridge_status [catch {} ocd_bridge_result]; \
             if {{$ocd_bridge_status}} {{concat {ERROR_MARKER} $ocd_bridge_result}} \
             else {{set ocd_bridge_result}}",
            quote_word(command)
        );

        let response = self.raw(&script).await?;

        match response.strip_prefix(ERROR_MARKER) {
            Some(message) => Err(TclError::Command {
                command: command.to_string(),
                message: message.trim().to_string(),
            }),
            None => Ok(response.trim().to_string()),
        }
    }
}

/// Quotes `text` as one TCL word that evaluates to `text` unchanged.
///
/// Every character with a meaning to the TCL parser is backslash escaped. A
/// backslash-newline would be read as a line continuation, so line breaks are
/// written as `\n`.
fn quote_word(text: &str) -> String {
    if text.is_empty() {
        return "{}".to_string();
    }

    let mut quoted = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\\' | '{' | '}' | '[' | ']' | '$' | '"' | ';' | ' ' | '#' => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }
    quoted
}
