//! 辅助 COM 口透传
//!
//! C9 面板上的辅助 COM 口可经控制器代理收发串口数据：COM 命令
//! 走常规协议通道，数据本身走传输层的裸读/裸写。

use std::time::Duration;

use tracing::{debug, warn};

use c9_driver::DriverError;
use c9_protocol::{Command, ErrorCode};
use c9_serial::{Transport, TransportError};

use crate::controller::{C9Controller, parse_int};
use crate::error::ClientError;

/// 空的 COM /S 响应最多重查这么多次
const COM_SIZE_RETRIES: u32 = 5;

/// COM /W 之后、写数据之前的建立间隔
const COM_WRITE_SETTLE: Duration = Duration::from_millis(10);

/// 写完数据后的排空间隔
const COM_WRITE_DRAIN: Duration = Duration::from_millis(100);

impl<T: Transport> C9Controller<T> {
    /// 以给定波特率初始化辅助 COM 口（编号与 C9 面板标注一致）
    pub fn com_init(&mut self, port: u8, baudrate: u32) -> Result<(), ClientError> {
        let command = Command::new("COM")
            .flag('I', true)
            .arg(port)
            .arg(i64::from(baudrate));
        self.link.request(&command)?;
        Ok(())
    }

    /// 清空辅助 COM 口的输入缓冲
    pub fn com_flush(&mut self, port: u8) -> Result<(), ClientError> {
        self.link
            .request(&Command::new("COM").flag('F', true).arg(port))?;
        Ok(())
    }

    /// 辅助 COM 口输入缓冲中的字节数
    ///
    /// 固件偶发返回空响应，做有界重查。
    pub fn com_rx_size(&mut self, port: u8) -> Result<usize, ClientError> {
        for _ in 0..=COM_SIZE_RETRIES {
            let response = self
                .link
                .request(&Command::new("COM").flag('S', true).arg(port))?;
            if !response.is_empty() {
                let size = parse_int(&response)?;
                return usize::try_from(size)
                    .map_err(|_| ClientError::InvalidResponse(response));
            }
            warn!(port, "empty COM rx size response, requerying");
        }
        Err(ClientError::InvalidResponse(
            "COM rx size response stayed empty".into(),
        ))
    }

    /// 从辅助 COM 口读取 `num_bytes` 个字节
    ///
    /// COM /R 之后数据经控制器转发到主链路，以裸读取回。协议
    /// 通道在转发超时时上报 CRC 错误，对调用方呈现为读超时；
    /// 裸读超时则返回空数据。
    pub fn com_read(
        &mut self,
        port: u8,
        num_bytes: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        let command = Command::new("COM")
            .flag('R', true)
            .arg(port)
            .arg(timeout.as_millis() as i64)
            .arg(num_bytes as i64);
        match self.link.request(&command) {
            Ok(_) => {}
            Err(DriverError::Device(err)) if err.kind() == Some(ErrorCode::InvalidCrc) => {
                return Err(TransportError::ReadTimeout.into());
            }
            Err(err) => return Err(err.into()),
        }

        let data = match self.link.transport_mut().read(num_bytes) {
            Ok(data) => data,
            Err(TransportError::ReadTimeout) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(port, bytes = data.len(), "received COM data");
        Ok(data)
    }

    /// 向辅助 COM 口写出数据
    pub fn com_write(&mut self, port: u8, data: &[u8]) -> Result<(), ClientError> {
        let command = Command::new("COM")
            .flag('W', true)
            .arg(port)
            .arg(data.len() as i64);
        self.link.request(&command)?;

        spin_sleep::sleep(COM_WRITE_SETTLE);
        let write_timeout = self.link.config().write_timeout;
        self.link.transport_mut().write(data, write_timeout)?;
        debug!(port, bytes = data.len(), "sent COM data");
        spin_sleep::sleep(COM_WRITE_DRAIN);
        Ok(())
    }
}
