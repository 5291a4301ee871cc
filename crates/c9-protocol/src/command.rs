//! 命令参数与出站帧构建
//!
//! 一个 [`Command`] 对应一条出站帧：命令名 + 标志集合 + 位置参数。
//! 参数用标签联合 [`Param`] 表达，发射规则（缺省跳过、浮点取整、
//! 布尔存在性）由类型系统保证，而不是运行时分支。

use smallvec::SmallVec;

use crate::crc;

/// 命令参数的标签联合
///
/// - `Bool(true)` 的标志发射为 `/X 1`，`Bool(false)` 整个省略
/// - `Float` 先四舍五入到最近整数再以十进制文本发射
/// - `Int` 按十进制文本原样发射
/// - `Absent` 整个省略（区别于发射空占位）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Float(f64),
    Absent,
}

impl Param {
    /// 渲染为线路文本；`None` 表示该参数不出现在帧里
    fn render(self) -> Option<String> {
        match self {
            Param::Bool(true) => Some("1".to_string()),
            Param::Bool(false) | Param::Absent => None,
            Param::Int(v) => Some(v.to_string()),
            Param::Float(v) => Some(format!("{}", v.round() as i64)),
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, Param::Absent | Param::Bool(false))
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<u8> for Param {
    fn from(v: u8) -> Self {
        Param::Int(v as i64)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Absent, Into::into)
    }
}

/// 线路模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMode {
    /// 完整协议：地址 / 序列号 / CRC 头部
    Framed,
    /// 简化调试协议：裸命令体，无头部（USB 直连时使用）
    Debug,
}

/// 一条待编码的命令
///
/// 构建后不可变，与单条出站帧一一对应。
#[derive(Debug, Clone)]
pub struct Command {
    name: &'static str,
    flags: SmallVec<[(char, Param); 4]>,
    args: SmallVec<[Param; 8]>,
}

impl Command {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            flags: SmallVec::new(),
            args: SmallVec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// 追加一个标志；`Absent` / `Bool(false)` 的标志不会出现在帧里
    pub fn flag(mut self, name: char, value: impl Into<Param>) -> Self {
        self.flags.push((name, value.into()));
        self
    }

    /// 追加一个位置参数
    pub fn arg(mut self, value: impl Into<Param>) -> Self {
        self.args.push(value.into());
        self
    }

    /// 追加一串位置参数
    pub fn args<I, P>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// 渲染命令体：`<name> (/<flag> <value>)* (<arg>)*`
    pub fn body(&self) -> String {
        let mut out = String::with_capacity(32);
        out.push_str(self.name);
        for (flag, value) in &self.flags {
            if let Some(text) = value.render() {
                out.push_str(" /");
                out.push(*flag);
                out.push(' ');
                out.push_str(&text);
            }
        }
        for arg in &self.args {
            if let Some(text) = arg.render() {
                out.push(' ');
                out.push_str(&text);
            }
        }
        out
    }
}

/// 编码一条出站帧
///
/// framed 模式的 CRC 覆盖 `<sequence> <body>\r`（序列号起、含结尾
/// 回车），头部为 `@<address> 99 <crc>`。纯函数，无副作用。
pub fn encode_frame(command: &Command, mode: WireMode, sequence: u8, address: u8) -> Vec<u8> {
    match mode {
        WireMode::Debug => {
            let mut frame = command.body().into_bytes();
            frame.push(b'\r');
            frame
        }
        WireMode::Framed => {
            let mut payload = format!("{} {}", sequence, command.body()).into_bytes();
            payload.push(b'\r');
            let crc = crc::checksum_hex(&payload);
            let mut frame = format!("@{} 99 {} ", address, crc).into_bytes();
            frame.extend_from_slice(&payload);
            frame
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn debug_frame_is_bare_body() {
        let cmd = Command::new("PING");
        assert_eq!(encode_frame(&cmd, WireMode::Debug, 7, 1), b"PING\r");
    }

    #[test]
    fn framed_frame_carries_header_and_crc() {
        let cmd = Command::new("PING");
        let frame = encode_frame(&cmd, WireMode::Framed, 7, 1);
        let text = String::from_utf8(frame).unwrap();
        let expected_crc = crc::checksum_hex(b"7 PING\r");
        assert_eq!(text, format!("@1 99 {expected_crc} 7 PING\r"));
    }

    #[test]
    fn boolean_flags_emit_only_when_true() {
        let cmd = Command::new("HOME").flag('C', true).flag('K', false);
        assert_eq!(cmd.body(), "HOME /C 1");
    }

    #[test]
    fn absent_params_are_omitted_entirely() {
        let cmd = Command::new("MOVE")
            .flag('V', Option::<i64>::None)
            .flag('A', Some(2000i64))
            .arg(Param::Absent)
            .arg(3i64);
        assert_eq!(cmd.body(), "MOVE /A 2000 3");
    }

    #[test]
    fn float_params_round_to_nearest_integer() {
        let cmd = Command::new("MOVE").flag('X', 12.4f64).arg(99.6f64).arg(-0.4f64);
        assert_eq!(cmd.body(), "MOVE /X 12 100 0");
    }

    #[test]
    fn int_params_emit_verbatim() {
        let cmd = Command::new("CRSL").arg(0i64).arg(12i64);
        assert_eq!(cmd.body(), "CRSL 0 12");
    }

    proptest! {
        /// 对任意合法命令编码后，对帧内载荷重算 CRC 必须与头部一致
        #[test]
        fn encoded_crc_matches_recomputation(
            seq in 1u8..=98,
            address in 0u8..=31,
            args in proptest::collection::vec(-100_000i64..100_000, 0..6),
        ) {
            let cmd = Command::new("MOVE").args(args);
            let frame = encode_frame(&cmd, WireMode::Framed, seq, address);
            let text = std::str::from_utf8(&frame).unwrap();

            // 头部：@<addr> 99 <crc>，其后是载荷
            let mut parts = text.splitn(4, ' ');
            let addr_tok = parts.next().unwrap();
            prop_assert_eq!(addr_tok, format!("@{address}"));
            prop_assert_eq!(parts.next().unwrap(), "99");
            let crc_tok = parts.next().unwrap();
            let payload = parts.next().unwrap();

            let recomputed = crc::checksum(payload.as_bytes());
            let advertised = u32::from_str_radix(crc_tok, 16).unwrap();
            prop_assert_eq!(advertised, recomputed);
        }
    }
}
