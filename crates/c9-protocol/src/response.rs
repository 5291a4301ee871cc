//! 入站响应解析
//!
//! 响应是一行以 `\r\n` 结尾的字节（传输层已剥掉结尾符）。framed
//! 模式下最后一个 `\r` 分段是 CRC 尾部；载荷内以 `|` 开头的行是
//! 设备侧日志，路由到日志接收器而不返回给调用方。

use crate::command::WireMode;
use crate::crc;
use crate::error::{DeviceError, ProtocolError};

/// 设备日志行的保留前缀
pub const DEVICE_LOG_MARKER: u8 = b'|';

/// 解析后的逻辑响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// 逻辑响应文本（已剥离日志行、首尾空白）
    pub text: String,
    /// 从载荷中剥离出的设备日志行（已去掉 `|` 前缀）
    pub device_logs: Vec<String>,
}

fn trim_framing(mut body: &[u8]) -> &[u8] {
    while let Some((&first, rest)) = body.split_first() {
        if first == b'\r' || first == b'\0' {
            body = rest;
        } else {
            break;
        }
    }
    while let Some((&last, rest)) = body.split_last() {
        if last == b'\r' || last == b'\0' {
            body = rest;
        } else {
            break;
        }
    }
    body
}

/// 解析一条原始响应
///
/// framed 模式下先校验 CRC 尾部：在最后一个 `\r` 处切开，对载荷
/// 补回回车重算 CRC，与尾部数值比较。任何结构性损坏（缺少尾部、
/// 尾部不是十六进制、UTF-8 解码失败）都归一化为
/// [`ProtocolError::InvalidCrc`]，与设备上报的 CRC 错误同等对待。
pub fn parse_response(raw: &[u8], mode: WireMode) -> Result<Response, ProtocolError> {
    let body: &[u8] = match mode {
        WireMode::Debug => raw,
        WireMode::Framed => {
            let split = raw
                .iter()
                .rposition(|&b| b == b'\r')
                .ok_or(ProtocolError::InvalidCrc)?;
            let (payload, trailer) = (&raw[..split], &raw[split + 1..]);
            let payload = trim_framing(payload);

            let trailer = std::str::from_utf8(trailer)
                .map_err(|_| ProtocolError::InvalidCrc)?
                .trim();
            let advertised =
                u32::from_str_radix(trailer, 16).map_err(|_| ProtocolError::InvalidCrc)?;
            if advertised != crc::line_checksum(payload) {
                return Err(ProtocolError::InvalidCrc);
            }
            payload
        }
    };

    // 剥离设备日志行，其余行合并为逻辑响应
    let mut device_logs = Vec::new();
    let mut lines: Vec<&[u8]> = Vec::new();
    for line in body.split(|&b| b == b'\r') {
        if line.first() == Some(&DEVICE_LOG_MARKER) {
            let log = std::str::from_utf8(&line[1..]).map_err(|_| ProtocolError::InvalidCrc)?;
            device_logs.push(log.to_string());
        } else {
            lines.push(line);
        }
    }

    let joined = lines.join(&b"\n"[..]);
    let text = std::str::from_utf8(&joined)
        .map_err(|_| ProtocolError::InvalidCrc)?
        .trim()
        .to_string();

    Ok(Response { text, device_logs })
}

/// 从逻辑响应解码设备错误
///
/// 以 `ERROR` 开头的响应解析为 `ERROR <code>: <message>`；格式损坏
/// 时返回 [`ProtocolError::MalformedError`]，绝不 panic。
pub fn decode_device_error(text: &str) -> Result<Option<DeviceError>, ProtocolError> {
    let Some(rest) = text.strip_prefix("ERROR") else {
        return Ok(None);
    };
    let malformed = || ProtocolError::MalformedError(text.to_string());
    let (code, message) = rest.split_once(':').ok_or_else(malformed)?;
    let code: u16 = code.trim().parse().map_err(|_| malformed())?;
    Ok(Some(DeviceError::new(code, message.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一条带合法 CRC 尾部的 framed 响应
    fn framed_line(payload: &str) -> Vec<u8> {
        let crc = crc::line_checksum(payload.as_bytes());
        format!("{payload}\r{crc:08x}").into_bytes()
    }

    #[test]
    fn debug_mode_returns_payload_as_text() {
        let resp = parse_response(b"0 0 0 0", WireMode::Debug).unwrap();
        assert_eq!(resp.text, "0 0 0 0");
        assert!(resp.device_logs.is_empty());
    }

    #[test]
    fn framed_mode_accepts_valid_trailer() {
        let resp = parse_response(&framed_line("1500 100 200"), WireMode::Framed).unwrap();
        assert_eq!(resp.text, "1500 100 200");
    }

    #[test]
    fn framed_mode_rejects_bad_trailer() {
        let mut raw = b"1500 100 200\r".to_vec();
        raw.extend_from_slice(b"deadbeef");
        assert_eq!(
            parse_response(&raw, WireMode::Framed),
            Err(ProtocolError::InvalidCrc)
        );
    }

    #[test]
    fn missing_trailer_is_a_crc_failure() {
        assert_eq!(
            parse_response(b"no carriage return here", WireMode::Framed),
            Err(ProtocolError::InvalidCrc)
        );
    }

    #[test]
    fn nul_and_cr_framing_noise_is_stripped_before_checksum() {
        let crc = crc::line_checksum(b"OK");
        let raw = format!("\0\rOK\r{crc:08x}").into_bytes();
        let resp = parse_response(&raw, WireMode::Framed).unwrap();
        assert_eq!(resp.text, "OK");
    }

    #[test]
    fn log_lines_are_diverted_not_returned() {
        let resp = parse_response(b"|homing axis 2\r42\r|done", WireMode::Debug).unwrap();
        assert_eq!(resp.text, "42");
        assert_eq!(resp.device_logs, vec!["homing axis 2", "done"]);
    }

    #[test]
    fn log_lines_are_part_of_the_checksummed_payload() {
        let resp = parse_response(&framed_line("|note\r7"), WireMode::Framed).unwrap();
        assert_eq!(resp.text, "7");
        assert_eq!(resp.device_logs, vec!["note"]);
    }

    #[test]
    fn invalid_utf8_is_a_crc_failure() {
        assert_eq!(
            parse_response(&[0xff, 0xfe, b'x'], WireMode::Debug),
            Err(ProtocolError::InvalidCrc)
        );
    }

    #[test]
    fn error_line_decodes_code_and_message() {
        let err = decode_device_error("ERROR 3: bad arg").unwrap().unwrap();
        assert_eq!(err.code, 3);
        assert_eq!(err.message, "bad arg");
    }

    #[test]
    fn non_error_text_decodes_to_none() {
        assert_eq!(decode_device_error("0 0 0 0").unwrap(), None);
    }

    #[test]
    fn malformed_error_line_is_typed_not_a_panic() {
        assert!(matches!(
            decode_device_error("ERROR nonsense"),
            Err(ProtocolError::MalformedError(_))
        ));
        assert!(matches!(
            decode_device_error("ERROR x: y"),
            Err(ProtocolError::MalformedError(_))
        ));
    }
}
