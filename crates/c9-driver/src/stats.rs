//! 请求统计
//!
//! 纯计数器：请求/响应/命令总数、错误总数、按错误码的直方图。

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// 无法归类到设备错误码的错误（传输层失败）在直方图里的键
pub const UNCLASSIFIED_ERROR: i32 = -1;

/// 控制器请求统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ControllerStats {
    /// 发出的请求次数（重试逐次计数）
    pub requests: u64,
    /// 收到的响应次数
    pub responses: u64,
    /// 发出的命令次数
    pub commands: u64,
    /// 错误总数
    pub errors: u64,
    error_codes: BTreeMap<i32, u64>,
}

impl ControllerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次错误
    ///
    /// `code` 为设备错误码；传输错误等无码错误传 `None`，
    /// 归入 [`UNCLASSIFIED_ERROR`]。
    pub fn add_error(&mut self, code: Option<u16>) {
        self.errors += 1;
        let key = code.map_or(UNCLASSIFIED_ERROR, i32::from);
        *self.error_codes.entry(key).or_default() += 1;
    }

    /// 某个错误码出现的次数
    pub fn error_count(&self, code: i32) -> u64 {
        self.error_codes.get(&code).copied().unwrap_or(0)
    }

    /// 错误码直方图
    pub fn error_codes(&self) -> &BTreeMap<i32, u64> {
        &self.error_codes
    }

    /// 日志用的紧凑摘要，如 `-1=1, 20=3`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (code, count) in &self.error_codes {
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "{code}={count}");
        }
        out
    }
}
