//! # C9 Protocol
//!
//! C9 运动控制器串口文本协议的编码与解析（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 命令参数与出站帧构建
//! - `response`: 入站响应解析（CRC 校验、设备日志剥离、错误解码）
//! - `crc`: CRC32 信封计算
//! - `error`: 协议错误码枚举与错误类型
//!
//! ## 线路格式
//!
//! 协议是以回车结尾的 ASCII 文本。完整（framed）模式在命令体前加上
//! 地址 / 序列号 / CRC 头部；调试（debug）模式只发送裸命令体，
//! 用于 USB 直连等简化链路。
//!
//! ```text
//! framed:  @<address> 99 <crc32-hex> <sequence> <body>\r
//! debug:   <body>\r
//! ```
//!
//! 响应以 `\r\n` 结尾；framed 模式下最后一个 `\r` 分段是对前面载荷
//! 重新计算的 CRC 尾部。

pub mod command;
pub mod crc;
pub mod error;
pub mod response;

pub use command::{Command, Param, WireMode, encode_frame};
pub use error::{DeviceError, ErrorCode, ProtocolError};
pub use response::{DEVICE_LOG_MARKER, Response, decode_device_error, parse_response};

/// 序列号下界（序列号永远不为 0）
pub const SEQUENCE_MIN: u8 = 1;

/// 序列号上界（到达后回绕到 [`SEQUENCE_MIN`]）
pub const SEQUENCE_MAX: u8 = 98;

/// 推进旋转序列号
///
/// 序列号取值范围 1..=98；98 之后回绕到 1，0 永远不会出现在线路上。
#[inline]
pub fn next_sequence(current: u8) -> u8 {
    if current >= SEQUENCE_MAX {
        SEQUENCE_MIN
    } else {
        current + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_rotates_without_zero() {
        let mut seq = SEQUENCE_MIN;
        for _ in 0..300 {
            assert!(seq >= SEQUENCE_MIN && seq <= SEQUENCE_MAX);
            seq = next_sequence(seq);
        }
    }

    #[test]
    fn sequence_wraps_from_max_to_min() {
        assert_eq!(next_sequence(SEQUENCE_MAX), SEQUENCE_MIN);
        assert_eq!(next_sequence(97), 98);
        assert_eq!(next_sequence(1), 2);
    }
}
