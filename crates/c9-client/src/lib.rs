//! # C9 Client
//!
//! 面向领域的高层 API：在请求引擎之上封装 C9 机械臂的运动与
//! I/O 操作。
//!
//! ## 职责
//!
//! - 工程单位换算（毫米/度 × 1000 → 原始计数，读取方向相反）
//! - 为底层命令（MOVE / ARM / HOME / SPIN / CRSL / POS / OUTP /
//!   ADC / INP / STAT / COM …）构建标志与参数
//! - 运动命令的时长预测等待：先按预测时长睡眠以减少协议抖动，
//!   再以轴运动轮询收敛到地面真值
//! - 轴位置/归位事件与数字输出状态事件的观察者分发
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use c9_client::{C9Controller, MoveOptions};
//! use c9_driver::ConnectionManager;
//! use c9_serial::SerialTransport;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new();
//!     let transport = SerialTransport::new("/dev/ttyUSB0", 115_200);
//!     let mut controller = C9Controller::builder(transport).connect(&manager)?;
//!
//!     controller.home(&[], Default::default())?;
//!     controller.move_axis(2, 12_000.0, MoveOptions::default())?;
//!     Ok(())
//! }
//! ```

mod builder;
mod com;
mod controller;
mod error;
mod events;
mod motion;

pub use builder::C9Builder;
pub use controller::{
    AXIS_CAROUSEL, AXIS_COLUMN, AXIS_ELBOW, AXIS_GRIPPER, AXIS_SHOULDER, C9Controller, ElbowBias,
    MAIN_AXES, NUM_MAIN_AXES, is_aux_axis,
};
pub use error::ClientError;
pub use events::{
    AxisEvent, AxisEventKind, EventDispatcher, HandlerResult, OutputEvent, OutputEventKind,
};
pub use motion::{ArmMove, HomeOptions, MoveOptions};

// 常用底层类型一并导出，调用方无需直接依赖下层 crate
pub use c9_driver::{ConnectionManager, ControllerConfig, DriverError, PauseHandle};
pub use c9_protocol::{DeviceError, ErrorCode};
pub use c9_serial::{SerialTransport, Transport, TransportError};
