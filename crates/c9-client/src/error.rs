//! 客户端层错误类型定义

use c9_driver::DriverError;
use c9_serial::TransportError;
use thiserror::Error;

/// 客户端层错误类型
///
/// 引擎层的错误原样透传（调用方看到与直接调用引擎相同的类型）；
/// 本层自身只新增在任何 I/O 之前检查的前置条件失败，以及响应
/// 形状不符合命令约定的情况。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 请求引擎错误（协议 / 传输 / 死锁）
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 速度与加速度必须成对给出（发出任何请求之前检查）
    #[error("velocity and acceleration must be set together")]
    SpeedPair,

    /// 操作至少需要一个轴
    #[error("at least one axis required")]
    NoAxes,

    /// 响应形状与命令约定不符
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Driver(err.into())
    }
}

impl ClientError {
    /// 携带的数字错误码（如有）
    pub fn code(&self) -> Option<u16> {
        match self {
            ClientError::Driver(err) => err.code(),
            _ => None,
        }
    }
}
