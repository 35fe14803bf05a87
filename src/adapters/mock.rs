//! Scripted transport for tests and dry runs.

use std::collections::{HashMap, VecDeque};
use std::io;

use crate::adapters::Transport;
use crate::error::MeasureResult;

/// In-memory [`Transport`] that replays scripted responses.
///
/// Each query command owns a queue of responses consumed front to back, so a
/// repeated query (the settle loop) can see a different answer every sweep.
/// Every command sent is recorded for later assertions.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: HashMap<String, VecDeque<String>>,
    written: Vec<String>,
    queried: Vec<String>,
}

impl MockTransport {
    /// Creates a transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one response for `command`. Repeated calls for the same command
    /// queue further sweeps.
    pub fn on_query(mut self, command: &str, response: &str) -> Self {
        self.responses
            .entry(command.to_string())
            .or_default()
            .push_back(response.to_string());
        self
    }

    /// Commands sent with [`Transport::write`], in order.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// Commands sent with [`Transport::query`], in order.
    pub fn queried(&self) -> &[String] {
        &self.queried
    }
}

impl Transport for MockTransport {
    fn write(&mut self, command: &str) -> MeasureResult<()> {
        self.written.push(command.to_string());
        Ok(())
    }

    fn query(&mut self, command: &str) -> MeasureResult<String> {
        self.queried.push(command.to_string());
        let response = self
            .responses
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotConnected,
                    format!("no scripted response left for '{command}'"),
                )
            })?;
        Ok(response)
    }
}
