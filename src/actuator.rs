//! Actuator drivers
//!
//! `BinaryLineWriter` presents the command as an 8-bit parallel word on
//! eight output lines (line 0 = least significant bit) plus a separate stop
//! line. Which physical pins back those lines is up to the `OutputLines`
//! implementation.

use tracing::{debug, info};

use crate::collaborators::ActuatorDriver;

pub const DATA_LINES: usize = 8;

/// Digital outputs behind the binary writer
pub trait OutputLines: Send {
    /// Drive data line `index` (0..8)
    fn set_line(&mut self, index: usize, high: bool);
    fn set_stop_line(&mut self, high: bool);
}

pub struct BinaryLineWriter<L: OutputLines> {
    lines: L,
    debug: bool,
}

impl<L: OutputLines> BinaryLineWriter<L> {
    pub fn new(mut lines: L, debug: bool) -> Self {
        for index in 0..DATA_LINES {
            lines.set_line(index, false);
        }
        lines.set_stop_line(false);
        if debug {
            info!("Initialized {} data lines and stop line", DATA_LINES);
        }
        Self { lines, debug }
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    fn clear(&mut self) {
        for index in 0..DATA_LINES {
            self.lines.set_line(index, false);
        }
    }
}

impl<L: OutputLines> ActuatorDriver for BinaryLineWriter<L> {
    fn send(&mut self, command: u8) {
        self.clear();
        self.lines.set_stop_line(false);
        for bit in 0..DATA_LINES {
            self.lines.set_line(bit, (command >> bit) & 1 == 1);
        }
        if self.debug {
            info!("Wrote {} ({:08b}) to output lines", command, command);
        }
    }

    fn send_stop(&mut self) {
        self.clear();
        self.lines.set_stop_line(true);
        if self.debug {
            info!("Stop line raised");
        }
    }
}

/// Driver that only logs, for dry runs without hardware
#[derive(Debug, Default)]
pub struct LoggingActuator {
    pub last: Option<u8>,
    pub stopped: bool,
}

impl ActuatorDriver for LoggingActuator {
    fn send(&mut self, command: u8) {
        self.last = Some(command);
        self.stopped = false;
        info!("Actuator command: {}", command);
    }

    fn send_stop(&mut self) {
        self.stopped = true;
        debug!("Actuator held at stop");
    }
}
