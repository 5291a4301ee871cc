//! # C9 Driver
//!
//! 请求引擎层：C9 协议的状态机与并发收口点。
//!
//! 本层把协议编码、设备互斥、超时与重试策略收敛到单一入口
//! [`C9Link::request_with`]：
//!
//! - 旋转序列号分配（1..=98，随机起点）
//! - 暂停门（可从其他线程暂停/恢复）
//! - 每物理设备一把互斥锁，获取超时视为死锁（致命，错误码 50）
//! - 锁只覆盖单次写/读对，重试之间不持有
//! - 传输错误按指数退避重试；协议错误按可重试集合分类
//!
//! 上层（c9-client）在此之上构建领域操作。

mod config;
mod connection;
mod engine;
mod error;
mod stats;

pub use config::{ConfigError, ControllerConfig};
pub use connection::{ConnectionManager, DeviceLock};
pub use engine::{C9Link, PauseHandle, RequestOptions};
pub use error::DriverError;
pub use stats::{ControllerStats, UNCLASSIFIED_ERROR};
