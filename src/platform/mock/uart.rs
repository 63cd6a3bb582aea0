//! Mock UART implementation for testing

use crate::platform::{
    error::{PlatformError, UartError},
    traits::{UartConfig, UartPort},
    Result,
};
use std::collections::VecDeque;
use std::vec::Vec;

/// Mock UART implementation
///
/// Provides in-memory buffers for transmit and receive data,
/// allowing unit tests to verify UART operations without hardware.
///
/// # Example
///
/// ```ignore
/// use pico_drivers::platform::mock::MockUart;
/// use pico_drivers::platform::traits::UartPort;
///
/// let mut uart = MockUart::new();
/// uart.configure(&Default::default()).unwrap();
///
/// uart.write(b"Hello").unwrap();
/// assert_eq!(uart.tx_buffer(), b"Hello");
///
/// uart.inject_rx_data(b"World");
/// let mut buf = [0u8; 5];
/// assert_eq!(uart.read_available(&mut buf).unwrap(), 5);
/// ```
#[derive(Debug)]
pub struct MockUart {
    config: Option<UartConfig>,
    tx_buffer: Vec<u8>,
    rx_buffer: VecDeque<u8>,
    flushes: u32,
}

impl MockUart {
    /// Create a new mock UART
    pub fn new() -> Self {
        Self {
            config: None,
            tx_buffer: Vec::new(),
            rx_buffer: VecDeque::new(),
            flushes: 0,
        }
    }

    /// Get transmitted data (for test verification)
    pub fn tx_buffer(&self) -> &[u8] {
        &self.tx_buffer
    }

    /// Clear transmit buffer
    pub fn clear_tx_buffer(&mut self) {
        self.tx_buffer.clear();
    }

    /// Inject receive data (for test setup)
    pub fn inject_rx_data(&mut self, data: &[u8]) {
        self.rx_buffer.extend(data.iter().copied());
    }

    /// Number of `flush` calls
    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    /// Configuration applied by the transport
    pub fn config(&self) -> Option<&UartConfig> {
        self.config.as_ref()
    }

    fn check(&self) -> Result<()> {
        match self.config {
            Some(_) => Ok(()),
            None => Err(PlatformError::Uart(UartError::WriteFailed)),
        }
    }
}

impl Default for MockUart {
    fn default() -> Self {
        Self::new()
    }
}

impl UartPort for MockUart {
    fn configure(&mut self, config: &UartConfig) -> Result<()> {
        if config.baud_rate == 0 {
            return Err(PlatformError::Uart(UartError::InvalidBaudRate));
        }
        self.config = Some(*config);
        Ok(())
    }

    fn release(&mut self) {
        self.config = None;
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check()?;
        self.tx_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if self.config.is_none() {
            return Err(PlatformError::Uart(UartError::ReadFailed));
        }
        let mut count = 0;
        for slot in buffer.iter_mut() {
            match self.rx_buffer.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn available(&self) -> usize {
        self.rx_buffer.len()
    }

    fn flush(&mut self) -> Result<()> {
        self.check()?;
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_uart_write_and_read() {
        let mut uart = MockUart::new();
        uart.configure(&UartConfig::default()).unwrap();

        assert_eq!(uart.write(b"Hello").unwrap(), 5);
        assert_eq!(uart.tx_buffer(), b"Hello");

        uart.inject_rx_data(b"World");
        assert_eq!(uart.available(), 5);
        let mut buf = [0u8; 3];
        assert_eq!(uart.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"Wor");
        assert_eq!(uart.available(), 2);
    }

    #[test]
    fn test_mock_uart_rejects_zero_baud() {
        let mut uart = MockUart::new();
        let config = UartConfig {
            baud_rate: 0,
            ..Default::default()
        };
        assert_eq!(
            uart.configure(&config),
            Err(PlatformError::Uart(UartError::InvalidBaudRate))
        );
    }
}
