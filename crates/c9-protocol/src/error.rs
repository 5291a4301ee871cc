//! 协议错误码与错误类型定义

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// C9 固件错误码枚举
///
/// 响应以 `ERROR <code>: <message>` 开头时携带这些编码。
/// 50 号（控制器死锁）由请求引擎本地合成，设备永远不会发送。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    Timeout = 1,
    InvalidCommand = 2,
    InvalidArgument = 3,
    InvalidSeparator = 4,
    TooManyArguments = 5,
    CmdNotFound = 6,
    InvalidArguments = 7,
    InvalidAxis = 8,
    InvalidPosition = 9,
    InvalidVelocity = 10,
    InvalidAcceleration = 11,
    AxisMoving = 12,
    EepromRead = 13,
    EepromWrite = 14,
    AxisFeatureUnavailable = 15,
    ModbusTimeout = 16,
    ModbusInvalidResponse = 17,
    InvalidTempController = 18,
    InvalidJoint = 19,
    InvalidCrc = 20,
    Homing = 21,
    ScaleError = 34,
    /// 锁获取超时时由引擎合成，不属于设备协议
    ControllerDeadlock = 50,
}

impl ErrorCode {
    /// 此错误码是否表示可重试的瞬时成帧/解析问题
    ///
    /// 可重试集合之外的错误码是设备对命令语义的拒绝，重发同一条
    /// 命令不会有不同结果。
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidCrc
                | ErrorCode::InvalidArgument
                | ErrorCode::InvalidArguments
                | ErrorCode::InvalidSeparator
                | ErrorCode::InvalidCommand
                | ErrorCode::CmdNotFound
        )
    }
}

/// 设备上报的错误：数字错误码 + 可读消息
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("device error {code}: {message}")]
pub struct DeviceError {
    /// 原始错误码（可能不在 [`ErrorCode`] 枚举内）
    pub code: u16,
    /// 设备附带的错误消息
    pub message: String,
}

impl DeviceError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.into(), message)
    }

    /// CRC 校验失败的规范化形式（可重试）
    pub fn invalid_crc() -> Self {
        Self::from_code(ErrorCode::InvalidCrc, "Invalid response CRC")
    }

    /// 尝试把原始错误码映射到已知枚举
    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::try_from(self.code).ok()
    }

    /// 未知错误码一律视为不可重试
    pub fn is_retryable(&self) -> bool {
        self.kind().is_some_and(ErrorCode::is_retryable)
    }
}

/// 响应解析的结构性错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// CRC 尾部不匹配，或响应结构/编码损坏到无法校验
    ///
    /// 按协议约定与设备上报的 `INVALID_CRC` 同等对待（可重试）。
    #[error("Invalid response CRC")]
    InvalidCrc,

    /// `ERROR` 行存在但无法解析出错误码和消息
    #[error("Malformed device error line: {0:?}")]
    MalformedError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_set_is_exactly_the_framing_errors() {
        let retryable = [
            ErrorCode::InvalidCrc,
            ErrorCode::InvalidArgument,
            ErrorCode::InvalidArguments,
            ErrorCode::InvalidSeparator,
            ErrorCode::InvalidCommand,
            ErrorCode::CmdNotFound,
        ];
        for code in retryable {
            assert!(code.is_retryable(), "{code:?} should be retryable");
        }
        for code in [
            ErrorCode::Timeout,
            ErrorCode::InvalidAxis,
            ErrorCode::AxisMoving,
            ErrorCode::Homing,
            ErrorCode::ScaleError,
            ErrorCode::ControllerDeadlock,
        ] {
            assert!(!code.is_retryable(), "{code:?} should be fatal");
        }
    }

    #[test]
    fn unknown_code_is_fatal() {
        let err = DeviceError::new(999, "mystery");
        assert_eq!(err.kind(), None);
        assert!(!err.is_retryable());
    }

    #[test]
    fn code_round_trips_through_primitive() {
        assert_eq!(ErrorCode::try_from(20u16), Ok(ErrorCode::InvalidCrc));
        assert_eq!(u16::from(ErrorCode::ScaleError), 34);
        assert!(ErrorCode::try_from(33u16).is_err());
    }
}
