//! UART port trait

use crate::platform::Result;

/// UART parity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartParity {
    /// No parity bit
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// UART stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartStopBits {
    /// One stop bit
    One,
    /// Two stop bits
    Two,
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// TX pin
    pub tx_pin: u8,
    /// RX pin
    pub rx_pin: u8,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5..=8)
    pub data_bits: u8,
    /// Parity
    pub parity: UartParity,
    /// Stop bits
    pub stop_bits: UartStopBits,
    /// Receive buffer size in bytes
    pub rx_buffer_size: u16,
    /// Transmit buffer size in bytes
    pub tx_buffer_size: u16,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            tx_pin: 0,
            rx_pin: 1,
            baud_rate: 115_200,
            data_bits: 8,
            parity: UartParity::None,
            stop_bits: UartStopBits::One,
            rx_buffer_size: 256,
            tx_buffer_size: 256,
        }
    }
}

/// UART port trait
///
/// Reads never block: `read_available` copies whatever is buffered. Timeouts
/// are implemented by the transport on top of the platform clock.
pub trait UartPort {
    /// Apply pins, baud rate and framing
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Uart(UartError::InvalidBaudRate)` if the rate
    /// cannot be generated.
    fn configure(&mut self, config: &UartConfig) -> Result<()>;

    /// Return the peripheral to its reset state
    fn release(&mut self);

    /// Queue `data` for transmission, returning the number of bytes accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Copy buffered received bytes into `buffer`, returning how many
    fn read_available(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Number of received bytes waiting
    fn available(&self) -> usize;

    /// Block until the transmit queue is empty
    fn flush(&mut self) -> Result<()>;
}
