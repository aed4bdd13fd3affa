//! Concrete [`SerialLine`] over a real serial port (§4.C, §6 "Serial").

use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use echonet_lite::transport::SerialLine;
use echonet_lite::TransportError;

/// 115200 8N1, 30 s read timeout (§6).
pub const BAUD_RATE: u32 = 115_200;
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps a `serialport::SerialPort` with line buffering, mirroring the
/// `serialport` usage pattern for RL7023-class modems.
pub struct PortSerialLine {
    port: BufReader<Box<dyn serialport::SerialPort>>,
}

impl PortSerialLine {
    pub fn open(path: &str) -> Result<Self, TransportError> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|err| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?;
        Ok(Self { port: BufReader::new(port) })
    }
}

impl SerialLine for PortSerialLine {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.get_mut().write_all(bytes)?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut line = Vec::new();
        match self.port.read_until(b'\n', &mut line) {
            Ok(0) => Err(TransportError::Timeout),
            Ok(_) => {
                while matches!(line.last(), Some(b'\r') | Some(b'\n')) {
                    line.pop();
                }
                Ok(line)
            }
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => Err(TransportError::Timeout),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn close(self) {
        drop(self.port);
    }
}
