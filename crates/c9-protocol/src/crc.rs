//! CRC32 信封计算
//!
//! framed 模式下，出站帧头部携带对 `<sequence> <body>\r` 计算的
//! CRC32；入站响应的最后一个 `\r` 分段是设备对响应载荷计算的同一
//! CRC32。两侧都使用 ISO-HDLC（zlib）多项式，线路上渲染为 8 位
//! 小写十六进制。

use crc::{CRC_32_ISO_HDLC, Crc};

const C9_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// 计算一段字节的 CRC32
pub fn checksum(data: &[u8]) -> u32 {
    C9_CRC.checksum(data)
}

/// 计算 `data + b"\r"` 的 CRC32，不做中间分配
///
/// 响应校验需要对去掉尾部后的载荷补回一个回车再计算。
pub fn line_checksum(data: &[u8]) -> u32 {
    let mut digest = C9_CRC.digest();
    digest.update(data);
    digest.update(b"\r");
    digest.finalize()
}

/// 渲染为线路格式：8 位小写十六进制
pub fn checksum_hex(data: &[u8]) -> String {
    format!("{:08x}", checksum(data))
}
