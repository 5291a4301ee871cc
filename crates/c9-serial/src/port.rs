//! 基于 `serialport` 的串口传输实现
//!
//! C9 的 RS-232 链路固定 8N1、无流控。`serialport` 自身没有行
//! 成帧，`read_line` 以单字节读取累积到结尾符，由总截止时间
//! 界定。

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::debug;

use crate::{Transport, TransportError};

/// 定长读取使用的口超时；上层协议对裸读没有显式超时参数
const RAW_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// 串口传输
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// 创建一个未连接的串口传输
    ///
    /// `path` 形如 `/dev/ttyUSB0`（或 Windows 上的 `COM3`），同时
    /// 充当设备标识。
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            port: None,
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::NotConnected)
    }

    fn map_io(err: std::io::Error, timeout: TransportError) -> TransportError {
        if err.kind() == std::io::ErrorKind::TimedOut {
            timeout
        } else {
            TransportError::Io(err)
        }
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let port = serialport::new(&self.path, self.baud_rate)
            .timeout(RAW_READ_TIMEOUT)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|e| TransportError::Port(format!("open {}: {}", self.path, e)))?;

        debug!(path = %self.path, baud = self.baud_rate, "serial port opened");
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.port = None;
        debug!(path = %self.path, "serial port closed");
        Ok(())
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        port.set_timeout(timeout)
            .map_err(|e| TransportError::Port(e.to_string()))?;
        port.write_all(data)
            .map_err(|e| Self::map_io(e, TransportError::WriteTimeout))?;
        port.flush()
            .map_err(|e| Self::map_io(e, TransportError::WriteTimeout))?;
        Ok(())
    }

    fn read_line(
        &mut self,
        terminator: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let port = self.port_mut()?;
        let mut line: Vec<u8> = Vec::with_capacity(64);
        let mut byte = [0u8; 1];

        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(TransportError::ReadTimeout)?;
            port.set_timeout(remaining)
                .map_err(|e| TransportError::Port(e.to_string()))?;
            match port.read(&mut byte) {
                Ok(0) => return Err(TransportError::ReadTimeout),
                Ok(_) => line.push(byte[0]),
                Err(e) => return Err(Self::map_io(e, TransportError::ReadTimeout)),
            }
            if line.ends_with(terminator) {
                line.truncate(line.len() - terminator.len());
                return Ok(line);
            }
        }
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let port = self.port_mut()?;
        port.set_timeout(RAW_READ_TIMEOUT)
            .map_err(|e| TransportError::Port(e.to_string()))?;
        let mut buf = vec![0u8; n];
        port.read_exact(&mut buf)
            .map_err(|e| Self::map_io(e, TransportError::ReadTimeout))?;
        Ok(buf)
    }

    fn device_id(&self) -> String {
        self.path.clone()
    }
}
