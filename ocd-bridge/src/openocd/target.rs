use std::fmt;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::address::{parse_hex, Address};
use crate::error::Error;
use crate::protocol::{CpuRegisters, TargetInfo, Width};

use super::{TclClient, TclError};

/// Execution state of the debugged core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Running,
    Halted,
    Reset,
    DebugRunning,
    Unknown,
}

impl TargetState {
    /// Maps the name reported by `curstate`. Names this bridge does not know,
    /// like `unavailable` on a target without power, map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "running" => TargetState::Running,
            "halted" => TargetState::Halted,
            "reset" => TargetState::Reset,
            "debug-running" => TargetState::DebugRunning,
            _ => TargetState::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetState::Running => "running",
            TargetState::Halted => "halted",
            TargetState::Reset => "reset",
            TargetState::DebugRunning => "debug-running",
            TargetState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A debug server that can access a target.
#[allow(async_fn_in_trait)]
pub trait Target {
    /// Reads a single value of `width` bytes.
    async fn read_memory(&mut self, address: Address, width: Width) -> Result<u64, Error>;

    async fn write_memory(&mut self, address: Address, width: Width, value: u64)
        -> Result<(), Error>;

    async fn read_register(&mut self, name: &str) -> Result<u64, Error>;

    async fn write_register(&mut self, name: &str, value: u64) -> Result<(), Error>;

    async fn available_registers(&mut self) -> Result<CpuRegisters, Error>;

    async fn state(&mut self) -> Result<TargetState, Error>;

    /// Resets the target, leaving it halted at the reset vector if `halt` is set.
    async fn reset(&mut self, halt: bool) -> Result<(), Error>;

    async fn halt(&mut self) -> Result<(), Error>;

    async fn resume(&mut self) -> Result<(), Error>;

    async fn info(&mut self) -> Result<TargetInfo, Error>;

    /// Runs a raw debug server command.
    async fn command(&mut self, command: &str) -> Result<String, Error>;
}

/// Bits per access for a width in bytes.
pub(crate) fn access_bits(width: Width) -> Result<u32, Error> {
    match width {
        1 | 2 | 4 | 8 => Ok(width * 8),
        other => Err(Error::UnsupportedWidth(other)),
    }
}

/// [`Target`] implementation on top of the OpenOCD TCL RPC server.
#[derive(Debug)]
pub struct OpenOcd<T = TcpStream> {
    client: TclClient<T>,
}

impl OpenOcd<TcpStream> {
    pub async fn connect(host: &str, port: u16) -> Result<Self, Error> {
        Ok(Self::new(TclClient::connect(host, port).await?))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> OpenOcd<T> {
    pub fn new(client: TclClient<T>) -> Self {
        Self { client }
    }

    async fn exec(&mut self, command: &str) -> Result<String, Error> {
        Ok(self.client.execute(command).await?)
    }

    /// Queries an optional piece of target information.
    async fn probe(&mut self, command: &str) -> Option<String> {
        match self.client.execute(command).await {
            Ok(value) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(error) => {
                tracing::debug!("{command} not available: {error}");
                None
            }
        }
    }
}

fn unexpected(command: &str, response: &str) -> Error {
    TclError::UnexpectedResponse {
        command: command.to_string(),
        response: response.to_string(),
    }
    .into()
}

impl<T: AsyncRead + AsyncWrite + Unpin> Target for OpenOcd<T> {
    async fn read_memory(&mut self, address: Address, width: Width) -> Result<u64, Error> {
        let command = format!("read_memory {address} {} 1", access_bits(width)?);
        let response = self.exec(&command).await?;

        response
            .split_whitespace()
            .next()
            .and_then(|value| parse_hex(value).ok())
            .ok_or_else(|| unexpected(&command, &response))
    }

    async fn write_memory(
        &mut self,
        address: Address,
        width: Width,
        value: u64,
    ) -> Result<(), Error> {
        let command = format!(
            "write_memory {address} {} {{{value:#x}}}",
            access_bits(width)?
        );
        self.exec(&command).await?;
        Ok(())
    }

    async fn read_register(&mut self, name: &str) -> Result<u64, Error> {
        let command = format!("get_reg {{{name}}}");
        let response = self.exec(&command).await?;

        // `get_reg` answers with a dict: `<name> <value>`.
        response
            .split_whitespace()
            .nth(1)
            .and_then(|value| parse_hex(value).ok())
            .ok_or_else(|| unexpected(&command, &response))
    }

    async fn write_register(&mut self, name: &str, value: u64) -> Result<(), Error> {
        self.exec(&format!("set_reg {{{name} {value:#x}}}")).await?;
        Ok(())
    }

    async fn available_registers(&mut self) -> Result<CpuRegisters, Error> {
        let response = self.exec("reg").await?;
        Ok(parse_register_list(&response))
    }

    async fn state(&mut self) -> Result<TargetState, Error> {
        let response = self.exec("[target current] curstate").await?;
        Ok(TargetState::from_name(&response))
    }

    async fn reset(&mut self, halt: bool) -> Result<(), Error> {
        self.exec(if halt { "reset halt" } else { "reset run" })
            .await?;
        Ok(())
    }

    async fn halt(&mut self) -> Result<(), Error> {
        self.exec("halt").await?;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), Error> {
        self.exec("resume").await?;
        Ok(())
    }

    async fn info(&mut self) -> Result<TargetInfo, Error> {
        let name = self.exec("target current").await?;

        Ok(TargetInfo {
            name: Some(name),
            endianness: self.probe("[target current] cget -endian").await,
            chipname: self.probe("set _CHIPNAME").await,
            cputapid: self.probe("set _CPUTAPID").await,
            workareasize: self.probe("[target current] cget -work-area-size").await,
        })
    }

    async fn command(&mut self, command: &str) -> Result<String, Error> {
        self.exec(command).await
    }
}

/// Parses the output of the `reg` command.
///
/// Each register is listed as `(<index>) <name> (/<bits>)`, optionally followed
/// by `: <value>` when the value is cached. Other lines are section headers.
fn parse_register_list(output: &str) -> CpuRegisters {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix('(')?;
            let (_index, rest) = rest.split_once(')')?;
            let mut parts = rest.split_whitespace();
            let name = parts.next()?;
            let bits = parts
                .next()?
                .trim_end_matches(':')
                .strip_prefix("(/")?
                .strip_suffix(')')?
                .parse()
                .ok()?;
            Some((name.to_string(), bits))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::openocd::tcl::tests::fake_server;

    fn openocd(responses: &[(&str, &str)]) -> OpenOcd<tokio::io::DuplexStream> {
        let responses = responses
            .iter()
            .map(|(command, response)| (command.to_string(), response.to_string()))
            .collect::<HashMap<_, _>>();
        OpenOcd::new(fake_server(responses))
    }

    #[test_case(1, 8)]
    #[test_case(2, 16)]
    #[test_case(4, 32)]
    #[test_case(8, 64)]
    fn supported_widths(width: Width, bits: u32) {
        assert_eq!(access_bits(width).unwrap(), bits);
    }

    #[test_case(0)]
    #[test_case(3)]
    #[test_case(16)]
    fn unsupported_widths(width: Width) {
        assert!(matches!(access_bits(width), Err(Error::UnsupportedWidth(w)) if w == width));
    }

    #[tokio::test]
    async fn read_memory_parses_value() {
        let mut target = openocd(&[("read_memory 0x20000000 32 1", "0xdeadbeef")]);

        let value = target
            .read_memory(Address::new(0x2000_0000), 4)
            .await
            .unwrap();

        assert_eq!(value, 0xdead_beef);
    }

    #[tokio::test]
    async fn write_memory_command() {
        let mut target = openocd(&[("write_memory 0x20000000 16 {0xbeef}", "")]);

        target
            .write_memory(Address::new(0x2000_0000), 2, 0xbeef)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn read_register_from_dict() {
        let mut target = openocd(&[("get_reg {pc}", "pc 0x08000130")]);

        assert_eq!(target.read_register("pc").await.unwrap(), 0x0800_0130);
    }

    #[tokio::test]
    async fn garbage_response_is_reported() {
        let mut target = openocd(&[("get_reg {pc}", "pc")]);

        let error = target.read_register("pc").await.unwrap_err();

        assert!(matches!(
            error,
            Error::Tcl(TclError::UnexpectedResponse { .. })
        ));
    }

    #[tokio::test]
    async fn state_is_parsed() {
        let mut target = openocd(&[("[target current] curstate", "halted")]);

        assert_eq!(target.state().await.unwrap(), TargetState::Halted);
    }

    #[tokio::test]
    async fn info_tolerates_missing_fields() {
        let mut target = openocd(&[
            ("target current", "stm32f4x.cpu"),
            ("[target current] cget -endian", "little"),
            ("set _CHIPNAME", "stm32f4x"),
        ]);

        let info = target.info().await.unwrap();

        assert_eq!(
            info,
            TargetInfo {
                name: Some("stm32f4x.cpu".to_string()),
                endianness: Some("little".to_string()),
                chipname: Some("stm32f4x".to_string()),
                cputapid: None,
                workareasize: None,
            }
        );
    }

    #[test]
    fn register_list() {
        let output = "===== arm v7m registers\n\
                      (0) r0 (/32): 0x00000000\n\
                      (1) r1 (/32)\n\
                      (16) xPSR (/32): 0x01000000\n\
                      ===== Cortex-M DWT registers\n\
                      (42) d0 (/64)\n";

        let registers = parse_register_list(output);

        assert_eq!(
            registers,
            CpuRegisters::from([
                ("r0".to_string(), 32),
                ("r1".to_string(), 32),
                ("xPSR".to_string(), 32),
                ("d0".to_string(), 64),
            ])
        );
    }

    #[test_case("running", TargetState::Running)]
    #[test_case("debug-running", TargetState::DebugRunning)]
    #[test_case("halted\n", TargetState::Halted)]
    #[test_case("unavailable", TargetState::Unknown)]
    fn state_names(input: &str, expected: TargetState) {
        assert_eq!(TargetState::from_name(input), expected);
    }
}
