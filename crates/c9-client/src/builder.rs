//! 控制器构建器
//!
//! 传输 + 配置 + 连接管理器 → 控制器。设备锁从调用方持有的
//! [`ConnectionManager`] 解析，引用同一物理设备的控制器自然
//! 共享同一把锁。

use std::time::Duration;

use tracing::info;

use c9_driver::{C9Link, ConnectionManager, ControllerConfig, DriverError};
use c9_serial::Transport;

use crate::controller::C9Controller;
use crate::error::ClientError;

/// C9 控制器构建器
///
/// ```rust,no_run
/// use c9_client::C9Controller;
/// use c9_driver::ConnectionManager;
/// use c9_serial::SerialTransport;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = ConnectionManager::new();
/// let mut controller = C9Controller::builder(SerialTransport::new("/dev/ttyUSB0", 115_200))
///     .address(2)
///     .retries(5)
///     .connect(&manager)?;
/// # Ok(())
/// # }
/// ```
pub struct C9Builder<T: Transport> {
    transport: T,
    config: ControllerConfig,
}

impl<T: Transport> C9Builder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: ControllerConfig::default(),
        }
    }

    /// 整体替换配置（如从 TOML 加载的）
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// 控制器网络地址
    pub fn address(mut self, address: u8) -> Self {
        self.config.address = address;
        self
    }

    /// 使用简化调试协议（USB 直连）
    pub fn debug_protocol(mut self, debug: bool) -> Self {
        self.config.debug_protocol = debug;
        self
    }

    /// 失败命令的重试预算
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// 单次读取超时
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// 单次写入超时
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// 启用/停用移动时长预测
    pub fn move_prediction(mut self, enabled: bool) -> Self {
        self.config.move_prediction = enabled;
        self
    }

    /// 构建控制器，不做任何 I/O
    pub fn build(self, manager: &ConnectionManager) -> C9Controller<T> {
        let lock = manager.device_lock(&self.transport.device_id());
        C9Controller::from_link(C9Link::new(self.transport, lock, self.config))
    }

    /// 构建控制器并建立连接
    ///
    /// 打开传输后用 PING 验证链路。framed 协议的 PING 失败且失败
    /// 来自设备（而非传输）时，回退到调试协议再试一次——USB 直连
    /// 的 C9 只认调试协议。
    pub fn connect(self, manager: &ConnectionManager) -> Result<C9Controller<T>, ClientError> {
        let debug_protocol = self.config.debug_protocol;
        let mut controller = self.build(manager);
        controller.connect()?;

        match controller.ping() {
            Ok(()) => {}
            Err(ClientError::Driver(DriverError::Device(_))) if !debug_protocol => {
                info!("framed ping failed, falling back to debug protocol");
                controller.link.set_debug_protocol(true);
                controller.ping()?;
            }
            Err(err) => return Err(err),
        }

        Ok(controller)
    }
}
