//! 连接管理器
//!
//! 每个物理设备任一时刻至多一条在途请求，由每设备一把的互斥锁
//! 保证。锁的所有权属于显式的 [`ConnectionManager`] 对象——由
//! 调用方创建并共享给引用同一设备的所有控制器实例，而不是进程
//! 级的隐式单例。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// 设备互斥锁
///
/// 引用同一物理设备的控制器共享同一个 `Arc`；
/// `try_lock_for` 为请求引擎提供有界的获取超时。
pub type DeviceLock = Arc<Mutex<()>>;

/// 每设备锁的属主
///
/// 以传输层上报的设备标识为键，首次使用时惰性创建，之后同一
/// 标识永远解析到同一把锁。管理器存活期间锁不会被移除。
#[derive(Default)]
pub struct ConnectionManager {
    locks: Mutex<HashMap<String, DeviceLock>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析设备标识对应的锁（不存在则创建）
    pub fn device_lock(&self, device_id: &str) -> DeviceLock {
        let mut locks = self.locks.lock();
        locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 已登记的设备数量
    pub fn device_count(&self) -> usize {
        self.locks.lock().len()
    }
}
