//! UART transport
//!
//! Byte-stream transport with millisecond read timeouts measured on the
//! platform clock. Reads poll the port and wait between polls with the clock's
//! blocking delay; there is no suspension.

use crate::core::traits::TimeSource;
use crate::platform::traits::{UartConfig, UartParity, UartPort, UartStopBits};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportState, TransportType};

/// Delay between receive polls
const POLL_INTERVAL_US: u32 = 100;

/// UART transport over a [`UartPort`]
pub struct UartTransport<P, C> {
    core: TransportCore,
    port: P,
    clock: C,
    config: UartConfig,
}

impl<P: UartPort, C: TimeSource> UartTransport<P, C> {
    /// Create a transport called `name` with the default configuration
    pub fn new(name: &str, port: P, clock: C) -> Self {
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::Uart),
            port,
            clock,
            config: UartConfig::default(),
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration
    pub fn configure(&mut self, config: UartConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: UartConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Typed configuration
    pub fn uart_config(&self) -> &UartConfig {
        &self.config
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable underlying port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn mirror_config(&mut self) {
        let c = self.config;
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("tx", format_args!("{}", c.tx_pin));
        let _ = map.set("rx", format_args!("{}", c.rx_pin));
        let _ = map.set("baud", format_args!("{}", c.baud_rate));
        let _ = map.set("data_bits", format_args!("{}", c.data_bits));
        let parity = match c.parity {
            UartParity::None => "none",
            UartParity::Even => "even",
            UartParity::Odd => "odd",
        };
        let _ = map.set("parity", format_args!("{}", parity));
        let stop_bits = match c.stop_bits {
            UartStopBits::One => 1,
            UartStopBits::Two => 2,
        };
        let _ = map.set("stop_bits", format_args!("{}", stop_bits));
        let _ = map.set("rx_buf", format_args!("{}", c.rx_buffer_size));
        let _ = map.set("tx_buf", format_args!("{}", c.tx_buffer_size));
    }

    fn begin_op(&mut self, op: &str) -> Result<()> {
        let now = self.clock.now_us();
        self.core.check_ready(now, op)
    }

    fn finish<T>(&mut self, result: Result<T>, op: &str) -> Result<T> {
        let now = self.clock.now_us();
        self.core.complete(result, now, op)
    }

    /// Queue `data` for transmission
    ///
    /// # Errors
    ///
    /// `BufferOverflow` if the port accepted fewer bytes than offered.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.begin_op("write")?;
        let result = match self.port.write(data) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(_) => Err(TransportError::BufferOverflow),
            Err(e) => Err(e.into()),
        };
        self.finish(result, "write")
    }

    /// Queue one byte
    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write(&[byte])
    }

    /// Queue a UTF-8 string
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.write(text.as_bytes())
    }

    /// Received bytes waiting
    pub fn available(&self) -> usize {
        if matches!(self.core.state(), TransportState::Ready | TransportState::Error) {
            self.port.available()
        } else {
            0
        }
    }

    /// Block until the transmit queue drains
    pub fn flush(&mut self) -> Result<()> {
        self.begin_op("flush")?;
        let result = self.port.flush().map_err(TransportError::from);
        self.finish(result, "flush")
    }

    /// Read up to `buffer.len()` bytes, waiting at most `timeout_ms`
    ///
    /// Returns as soon as the buffer is full or the window closes. A partial
    /// read is a success.
    ///
    /// # Errors
    ///
    /// `Timeout` if nothing arrived within the window.
    pub fn read(&mut self, buffer: &mut [u8], timeout_ms: u32) -> Result<usize> {
        self.begin_op("read")?;
        let result = self.poll(buffer, timeout_ms, None).map(|(n, _)| n);
        self.finish(result, "read")
    }

    /// Read one byte, waiting at most `timeout_ms`
    pub fn read_byte(&mut self, timeout_ms: u32) -> Result<u8> {
        let mut byte = [0u8];
        self.read(&mut byte, timeout_ms)?;
        Ok(byte[0])
    }

    /// Read until `terminator`, the buffer is full, or `timeout_ms` passes
    ///
    /// The terminator is consumed but not stored. Returns the number of bytes
    /// stored; an empty line before the terminator yields `Ok(0)`.
    ///
    /// # Errors
    ///
    /// `Timeout` if neither data nor the terminator arrived.
    pub fn read_until(
        &mut self,
        terminator: u8,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<usize> {
        self.begin_op("read_until")?;
        let result = self.poll(buffer, timeout_ms, Some(terminator)).map(|(n, _)| n);
        self.finish(result, "read_until")
    }

    /// Poll the port until `buffer` is full, `terminator` is seen, or the
    /// window closes
    fn poll(
        &mut self,
        buffer: &mut [u8],
        timeout_ms: u32,
        terminator: Option<u8>,
    ) -> Result<(usize, bool)> {
        let start = self.clock.now_us();
        let window_us = u64::from(timeout_ms) * 1000;
        let mut count = 0;
        loop {
            match terminator {
                None => {
                    count += self.port.read_available(&mut buffer[count..])?;
                }
                Some(term) => {
                    let mut byte = [0u8];
                    while count < buffer.len() && self.port.read_available(&mut byte)? == 1 {
                        if byte[0] == term {
                            return Ok((count, true));
                        }
                        buffer[count] = byte[0];
                        count += 1;
                    }
                }
            }
            if count == buffer.len() {
                return Ok((count, false));
            }
            if self.clock.elapsed_since(start) >= window_us {
                break;
            }
            self.clock.delay_us(POLL_INTERVAL_US);
        }
        if count == 0 {
            Err(TransportError::Timeout)
        } else {
            Ok((count, false))
        }
    }
}

impl<P: UartPort, C: TimeSource> Transport for UartTransport<P, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        "uart:stream,timeout,read_until"
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        let result = if !(5..=8).contains(&self.config.data_bits) || self.config.baud_rate == 0 {
            Err(TransportError::InvalidArgument)
        } else {
            self.port.configure(&self.config).map_err(TransportError::from)
        };
        let now = self.clock.now_us();
        self.core.finish_init(result, now)
    }

    fn deinit(&mut self) {
        if self.core.state() != TransportState::Uninitialized {
            self.port.release();
        }
        self.core.deinit();
    }
}
