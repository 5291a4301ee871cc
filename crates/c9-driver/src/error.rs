//! 驱动层错误类型定义

use c9_protocol::{DeviceError, ErrorCode};
use c9_serial::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层 I/O 或超时失败（重试预算耗尽后上浮）
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// 设备上报的协议错误
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// 设备锁获取超时（引擎本地合成，错误码 50，不重试）
    #[error("controller {address} deadlocked waiting for device lock")]
    Deadlock { address: u8 },

    /// 响应无法按协议语法理解（如损坏的 ERROR 行）
    #[error("invalid response: {0}")]
    Response(String),
}

impl DriverError {
    /// 携带的数字错误码（传输错误与响应损坏没有错误码）
    pub fn code(&self) -> Option<u16> {
        match self {
            DriverError::Device(err) => Some(err.code),
            DriverError::Deadlock { .. } => Some(ErrorCode::ControllerDeadlock.into()),
            DriverError::Transport(_) | DriverError::Response(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlock_carries_the_reserved_code() {
        let err = DriverError::Deadlock { address: 1 };
        assert_eq!(err.code(), Some(50));
        assert!(err.to_string().contains("deadlocked"));
    }

    #[test]
    fn device_error_code_passes_through() {
        let err: DriverError = DeviceError::new(8, "invalid axis").into();
        assert_eq!(err.code(), Some(8));
    }

    #[test]
    fn transport_error_has_no_code() {
        let err: DriverError = TransportError::ReadTimeout.into();
        assert_eq!(err.code(), None);
    }
}
