//! 归位并移动示例
//!
//! 演示最常见的工作流：连接 C9、归位机械臂、按工程单位移动
//! 立柱轴、读取末端笛卡尔位置。
//!
//! 运行前把串口路径换成实际设备：
//!
//! ```bash
//! cargo run -p c9-client --example home_and_move -- /dev/ttyUSB0
//! ```

use c9_client::{AXIS_COLUMN, AxisEvent, AxisEventKind, C9Controller, MoveOptions};
use c9_driver::ConnectionManager;
use c9_serial::SerialTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let manager = ConnectionManager::new();
    let transport = SerialTransport::new(path, 115_200);
    let mut c9 = C9Controller::builder(transport).connect(&manager)?;

    println!("firmware: {}", c9.info()?);

    // 观察立柱轴的位置事件
    c9.register_axis_handler(AXIS_COLUMN, AxisEventKind::Position, |event| {
        if let AxisEvent::Position(position) = event {
            println!("column position event: {position}");
        }
        Ok(())
    });

    println!("homing...");
    c9.home(&[], Default::default())?;

    println!("moving column to 50 mm...");
    c9.move_axis(
        AXIS_COLUMN,
        50.0,
        MoveOptions {
            units: true,
            ..MoveOptions::default()
        },
    )?;

    let [x, y, z] = c9.cartesian_position()?;
    println!("effector at x={x:.1} y={y:.1} z={z:.1} (mm)");

    c9.disconnect()?;
    Ok(())
}
