//! Serial port writes behind a trait, so motor drivers can be tested without
//! hardware.

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;

/// Write side of a serial port.
#[async_trait]
pub trait SerialPortIO: Send {
    /// Writes all of `data`.
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Waits until buffered output has been handed to the device.
    async fn flush(&mut self) -> io::Result<()>;
}

/// [`SerialPortIO`] over a `tokio_serial::SerialStream`.
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
    path: String,
}

impl std::fmt::Debug for TokioSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSerialPort")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
        }
    }

    /// Device path the port was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }
}
