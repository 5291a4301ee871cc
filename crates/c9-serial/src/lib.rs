//! # C9 Serial
//!
//! 传输层抽象：带读写超时的阻塞字节流。
//!
//! 协议层不关心字节流背后是 FTDI 串口还是 TCP 透传，只要求
//! [`Transport`] 合同：连接管理、带超时的写入、按结尾符读取一行、
//! 定长读取。超时与 I/O 失败以独立的错误类别上浮，供请求引擎
//! 按重试预算处理。

use std::time::Duration;

use thiserror::Error;

pub mod port;

#[cfg(feature = "mock")]
pub mod mock;

pub use port::SerialTransport;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Write timeout")]
    WriteTimeout,
    #[error("Read timeout")]
    ReadTimeout,
    #[error("Serial port error: {0}")]
    Port(String),
    #[error("Transport not connected")]
    NotConnected,
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            TransportError::WriteTimeout | TransportError::ReadTimeout
        )
    }
}

/// 阻塞字节流合同
///
/// 所有方法都是阻塞的；写入与读取由调用方给定的超时界定。
/// 同一物理设备可能被多个控制器实例引用，互斥由上层的连接
/// 管理器负责，传输实现自身不做并发控制。
pub trait Transport: Send {
    /// 打开底层链路
    fn connect(&mut self) -> Result<(), TransportError>;

    /// 关闭底层链路（再次 `connect` 前所有 I/O 返回 `NotConnected`）
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// 在超时内写出全部字节
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// 读取一行，直到出现 `terminator`
    ///
    /// 返回的字节已剥离结尾符。超时内没有凑齐一行则返回
    /// [`TransportError::ReadTimeout`]。
    fn read_line(&mut self, terminator: &[u8], timeout: Duration)
    -> Result<Vec<u8>, TransportError>;

    /// 读取恰好 `n` 个字节（COM 透传的裸数据通道）
    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError>;

    /// 物理设备标识，连接管理器以此为键共享设备锁
    fn device_id(&self) -> String;
}
