//! 请求引擎
//!
//! [`C9Link`] 是协议状态机与并发收口点：序列号分配、暂停门、
//! 设备锁下的单次写/读交换、错误分类与有界重试循环都在
//! [`C9Link::request_with`] 一处完成。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info, warn};

use c9_protocol::{
    Command, DeviceError, SEQUENCE_MAX, SEQUENCE_MIN, WireMode, decode_device_error, encode_frame,
    next_sequence, parse_response,
};
use c9_serial::Transport;

use crate::config::ControllerConfig;
use crate::connection::DeviceLock;
use crate::error::DriverError;
use crate::stats::ControllerStats;

/// 单次请求的可选覆盖项
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// 覆盖读取超时（慢命令如 HOME 需要分钟级等待）
    pub timeout: Option<Duration>,
    /// 覆盖重试预算
    pub retries: Option<u32>,
    /// 显式序列号（给定时计数器不受影响）
    pub sequence: Option<u8>,
    /// 强制取新序列号（即使给了显式序列号）
    pub reset_sequence: bool,
}

impl RequestOptions {
    pub fn timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// 暂停句柄
///
/// 可克隆到其他线程；暂停后引擎在下一次尝试开始处阻塞轮询，
/// 恢复后继续。不会打断已在途的写/读交换。
#[derive(Clone)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn pause(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 传输错误重试的指数退避
///
/// `2^((total − remaining) · 0.3) · base`：第一次重试等一个基准，
/// 之后逐次放大。
fn retry_backoff(total: u32, remaining: u32, base: Duration) -> Duration {
    let exponent = f64::from(total - remaining) * 0.3;
    Duration::from_secs_f64(2f64.powf(exponent) * base.as_secs_f64())
}

/// C9 协议链路
///
/// 每条逻辑连接一个实例，持有传输、配置、旋转序列号与统计。
/// 引用同一物理设备的多条链路必须共享同一把 [`DeviceLock`]
/// （经由 `ConnectionManager` 解析）。
pub struct C9Link<T: Transport> {
    transport: T,
    lock: DeviceLock,
    config: ControllerConfig,
    sequence: u8,
    paused: Arc<AtomicBool>,
    stats: ControllerStats,
}

impl<T: Transport> C9Link<T> {
    /// 创建链路
    ///
    /// 序列号从 1..=98 的随机值起步，避免两条新链路发出相同的
    /// 诊断标签。
    pub fn new(transport: T, lock: DeviceLock, config: ControllerConfig) -> Self {
        let sequence = rand::thread_rng().gen_range(SEQUENCE_MIN..=SEQUENCE_MAX);
        Self {
            transport,
            lock,
            config,
            sequence,
            paused: Arc::new(AtomicBool::new(false)),
            stats: ControllerStats::new(),
        }
    }

    pub fn connect(&mut self) -> Result<(), DriverError> {
        Ok(self.transport.connect()?)
    }

    pub fn disconnect(&mut self) -> Result<(), DriverError> {
        Ok(self.transport.disconnect()?)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// 当前线路模式
    pub fn wire_mode(&self) -> WireMode {
        if self.config.debug_protocol {
            WireMode::Debug
        } else {
            WireMode::Framed
        }
    }

    /// 切换简化调试协议（USB 直连回退时使用）
    pub fn set_debug_protocol(&mut self, debug: bool) {
        self.config.debug_protocol = debug;
    }

    /// 更新控制器网络地址（ADDR 命令生效后调用）
    pub fn set_address(&mut self, address: u8) {
        self.config.address = address;
    }

    /// 暂停句柄（可克隆到其他线程）
    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle(Arc::clone(&self.paused))
    }

    /// 裸传输访问（COM 透传的数据通道）
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// 取当前序列号并推进计数器
    fn advance_sequence(&mut self) -> u8 {
        let current = self.sequence;
        self.sequence = next_sequence(current);
        current
    }

    /// 以默认选项发出请求
    pub fn request(&mut self, command: &Command) -> Result<String, DriverError> {
        self.request_with(command, RequestOptions::default())
    }

    /// 发出请求并返回逻辑响应文本
    ///
    /// 单条命令的完整生命周期：
    ///
    /// 1. 暂停门（逐次尝试检查）
    /// 2. 序列号解析（循环外一次；重试复用同一序列号）
    /// 3. 编码出站帧
    /// 4. 带超时获取设备锁；超时即死锁，致命且不重试
    /// 5. 锁内写入 → 读一行 → 链路间隔；锁不跨重试持有
    /// 6. 解析响应，设备日志路由到 `c9::device`
    /// 7. 分类：传输错误退避重试；CRC 类失败与可重试错误码
    ///    消耗预算重试；其余错误上浮
    pub fn request_with(
        &mut self,
        command: &Command,
        opts: RequestOptions,
    ) -> Result<String, DriverError> {
        let total = opts.retries.unwrap_or(self.config.retries);
        let mut remaining = total;
        let sequence = match opts.sequence {
            Some(sequence) if !opts.reset_sequence => sequence,
            _ => self.advance_sequence(),
        };
        let mode = self.wire_mode();
        let address = self.config.address;
        let read_timeout = opts.timeout.unwrap_or(self.config.read_timeout);

        loop {
            while self.paused.load(Ordering::Relaxed) {
                thread::sleep(self.config.pause_poll_interval);
            }

            let frame = encode_frame(command, mode, sequence, address);
            debug!(
                command = command.name(),
                sequence,
                remaining,
                raw = %String::from_utf8_lossy(&frame).trim_end(),
                "sending command"
            );
            self.stats.requests += 1;
            self.stats.commands += 1;

            let lock = Arc::clone(&self.lock);
            let Some(guard) = lock.try_lock_for(self.config.lock_timeout) else {
                error!(address, "controller deadlocked: device lock not acquired");
                return Err(DriverError::Deadlock { address });
            };

            let exchange = match self.transport.write(&frame, self.config.write_timeout) {
                Ok(()) => self.transport.read_line(b"\r\n", read_timeout),
                Err(err) => Err(err),
            };
            // 链路间隔：给控制器留出处理下一帧的时间
            spin_sleep::sleep(self.config.command_delay);
            drop(guard);

            let line = match exchange {
                Ok(line) => line,
                Err(err) => {
                    if remaining == 0 {
                        error!(error = %err, "transport error, retries exhausted");
                        return Err(err.into());
                    }
                    self.stats.add_error(None);
                    warn!(error = %err, remaining, "transport error, will retry");
                    let backoff = retry_backoff(total, remaining, self.config.retry_timeout);
                    debug!(backoff_secs = backoff.as_secs_f64(), "retry backoff");
                    thread::sleep(backoff);
                    remaining -= 1;
                    continue;
                }
            };

            self.stats.responses += 1;
            debug!(raw = %String::from_utf8_lossy(&line), "response received");

            let device_error = match parse_response(&line, mode) {
                Ok(response) => {
                    for log in &response.device_logs {
                        info!(target: "c9::device", "{log}");
                    }
                    match decode_device_error(&response.text) {
                        Ok(None) => return Ok(response.text),
                        Ok(Some(err)) => err,
                        Err(err) => {
                            self.stats.add_error(None);
                            return Err(DriverError::Response(err.to_string()));
                        }
                    }
                }
                // 结构性损坏与 CRC 不匹配同等对待：可重试
                Err(_) => DeviceError::invalid_crc(),
            };

            self.stats.add_error(Some(device_error.code));
            warn!(code = device_error.code, message = %device_error.message, "device error");
            debug!(errors = %self.stats.summary(), "error counts");

            if device_error.is_retryable() && remaining > 0 {
                remaining -= 1;
                continue;
            }

            error!(code = device_error.code, message = %device_error.message, "request failed");
            return Err(device_error.into());
        }
    }
}
