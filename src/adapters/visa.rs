//! VISA transport for GPIB/USB/Ethernet instruments
//!
//! Wraps the `visa-rs` crate behind the [`Transport`] trait. Everything is
//! synchronous and blocking; the VISA session timeout is the only bound on a
//! hung instrument call.
//!
//! Supports resource strings like:
//! - "GPIB0::15::INSTR" (GPIB interface)
//! - "USB0::0x1234::0x5678::SERIAL::INSTR" (USB)
//! - "TCPIP0::192.168.1.100::INSTR" (Ethernet/LXI)

use std::ffi::CString;
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use log::debug;
use visa_rs::prelude::*;

use crate::adapters::Transport;
use crate::error::{BenchError, MeasureResult};

/// Blocking VISA session to one instrument.
pub struct VisaTransport {
    /// VISA resource string (e.g., "GPIB0::15::INSTR")
    resource_string: String,

    /// Line terminator appended to every command (typically "\n" for SCPI)
    line_terminator: String,

    instrument: Instrument,
}

impl VisaTransport {
    /// Opens a VISA session to `resource` with the given I/O timeout.
    pub fn open(resource: &str, timeout: Duration) -> MeasureResult<Self> {
        let rm = DefaultRM::new()?;
        let name = CString::new(resource)
            .map_err(|_| BenchError::Config(format!("invalid VISA resource string '{resource}'")))?;
        let instrument = rm.open(&name.into(), AccessMode::NO_LOCK, timeout)?;
        debug!("VISA resource '{resource}' opened");

        Ok(Self {
            resource_string: resource.to_string(),
            line_terminator: "\n".to_string(),
            instrument,
        })
    }

    /// Set line terminator for commands
    pub fn with_line_terminator(mut self, terminator: &str) -> Self {
        self.line_terminator = terminator.to_string();
        self
    }

    /// The resource string this session was opened with.
    pub fn resource(&self) -> &str {
        &self.resource_string
    }
}

impl Transport for VisaTransport {
    fn write(&mut self, command: &str) -> MeasureResult<()> {
        let payload = format!("{}{}", command, self.line_terminator);
        self.instrument.write_all(payload.as_bytes())?;
        debug!("VISA write: {command}");
        Ok(())
    }

    fn query(&mut self, command: &str) -> MeasureResult<String> {
        self.write(command)?;
        let mut response = String::new();
        {
            let mut reader = BufReader::new(&self.instrument);
            reader.read_line(&mut response)?;
        }
        debug!("VISA query '{}' -> {} bytes", command, response.len());
        Ok(response)
    }
}
