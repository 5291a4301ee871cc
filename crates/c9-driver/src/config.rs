//! 控制器配置
//!
//! 纯数据（POD）配置结构，字段逐项带默认值，可从 TOML 反序列化。
//! 运行时状态（序列号、统计、锁）不放在这里。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 以秒为单位序列化 `Duration`（配置文件里写 `0.5` 这样的浮点秒）
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        f64::deserialize(deserializer).map(Duration::from_secs_f64)
    }
}

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// 控制器配置
///
/// 默认值与 C9 固件的出厂链路参数匹配：串口往返 0.5 s 量级，
/// 重试预算 10 次，锁等待 2 分钟视为死锁。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// 控制器网络地址（framed 帧头部的 `@<address>`）
    pub address: u8,

    /// 使用简化调试协议（无 CRC/序列号头部，USB 直连时需要）
    pub debug_protocol: bool,

    /// 单次写入超时
    #[serde(with = "duration_secs")]
    pub write_timeout: Duration,

    /// 单次读取超时
    #[serde(with = "duration_secs")]
    pub read_timeout: Duration,

    /// 传输错误重试的退避基准
    #[serde(with = "duration_secs")]
    pub retry_timeout: Duration,

    /// 设备锁获取超时；超过即判定死锁
    #[serde(with = "duration_secs")]
    pub lock_timeout: Duration,

    /// 写/读对之后的链路间隔
    #[serde(with = "duration_secs")]
    pub command_delay: Duration,

    /// 失败命令的重试次数
    pub retries: u32,

    /// 命令派发延迟的估计值（移动时长预测用）
    #[serde(with = "duration_secs")]
    pub move_wait_delay: Duration,

    /// 预测时长的安全缩放因子（刻意低估，由轮询兜底）
    pub move_wait_scale: f64,

    /// 启用移动时长预测（睡眠以减少协议抖动）
    pub move_prediction: bool,

    /// 暂停状态的轮询间隔
    #[serde(with = "duration_secs")]
    pub pause_poll_interval: Duration,

    /// 轴运动状态的轮询间隔
    #[serde(with = "duration_secs")]
    pub moving_poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            address: 1,
            debug_protocol: false,
            write_timeout: Duration::from_millis(500),
            read_timeout: Duration::from_millis(500),
            retry_timeout: Duration::from_millis(500),
            lock_timeout: Duration::from_secs(120),
            command_delay: Duration::from_micros(1500),
            retries: 10,
            move_wait_delay: Duration::from_millis(100),
            move_wait_scale: 0.8,
            move_prediction: true,
            pause_poll_interval: Duration::from_millis(500),
            moving_poll_interval: Duration::from_millis(10),
        }
    }
}

impl ControllerConfig {
    /// 从 TOML 文本加载
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// 从 TOML 文件加载
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_factory_link_parameters() {
        let config = ControllerConfig::default();
        assert_eq!(config.address, 1);
        assert_eq!(config.retries, 10);
        assert_eq!(config.lock_timeout, Duration::from_secs(120));
        assert_eq!(config.move_wait_scale, 0.8);
        assert!(config.move_prediction);
        assert!(!config.debug_protocol);
    }

    #[test]
    fn toml_overrides_only_named_fields() {
        let config = ControllerConfig::from_toml_str(
            r#"
            address = 3
            read_timeout = 1.5
            retries = 2
            debug_protocol = true
            "#,
        )
        .unwrap();
        assert_eq!(config.address, 3);
        assert_eq!(config.read_timeout, Duration::from_secs_f64(1.5));
        assert_eq!(config.retries, 2);
        assert!(config.debug_protocol);
        // 未覆盖的字段保持默认
        assert_eq!(config.write_timeout, Duration::from_millis(500));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = ControllerConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = ControllerConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
