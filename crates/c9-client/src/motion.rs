//! 运动命令封装
//!
//! MOVE / ARM / HOME / SPIN / CRSL / SWEL 的参数构建、响应解析
//! 与完成等待。运动响应的首个 token 是预测时长（ms），其余是
//! 各轴最终位置。
//!
//! 完成等待分两段：预测启用时先睡眠
//! `max(0, 预测时长 × 缩放 / 1000 − 已耗时 − 派发延迟估计)`
//! 以减少协议抖动，然后始终进入 MVNG 轮询直到所有请求轴停止。
//! 睡眠只是优化，轮询才是权威的完成信号。

use std::time::{Duration, Instant};

use c9_driver::RequestOptions;
use c9_protocol::Command;
use c9_serial::Transport;

use crate::controller::{
    AXIS_CAROUSEL, AXIS_COLUMN, AXIS_ELBOW, AXIS_GRIPPER, AXIS_SHOULDER, C9Controller, ElbowBias,
    MAIN_AXES, UNIT_SCALE, parse_ints,
};
use crate::error::ClientError;
use crate::events::AxisEvent;

/// MOVE 命令选项
#[derive(Debug, Clone, Copy)]
pub struct MoveOptions {
    /// 运动速度（计数/s），必须与加速度成对给出
    pub velocity: Option<i64>,
    /// 运动加速度（计数/s²）
    pub acceleration: Option<i64>,
    /// 相对运动
    pub relative: bool,
    /// 位置按工程单位给出（×1000 成计数）
    pub units: bool,
    /// 等待运动完成
    pub wait: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            velocity: None,
            acceleration: None,
            relative: false,
            units: false,
            wait: true,
        }
    }
}

/// ARM（笛卡尔）运动目标
///
/// 各分量都是可选的：只移动覆盖所需的最少轴。x 与 y 成对使用。
#[derive(Debug, Clone, Copy, Default)]
pub struct ArmMove {
    /// x 位置（mm）
    pub x: Option<f64>,
    /// y 位置（mm）
    pub y: Option<f64>,
    /// z 位置（mm）
    pub z: Option<f64>,
    /// 夹爪位置（度）
    pub gripper: Option<f64>,
    /// 运动速度（计数/s），必须与加速度成对给出
    pub velocity: Option<i64>,
    /// 运动加速度（计数/s²）
    pub acceleration: Option<i64>,
    /// 肘部偏置覆盖
    pub elbow_bias: Option<ElbowBias>,
    /// 相对运动
    pub relative: bool,
    /// 等待运动完成
    pub wait: bool,
}

impl ArmMove {
    /// 等待完成的空目标（逐字段填充）
    pub fn new() -> Self {
        Self {
            wait: true,
            ..Self::default()
        }
    }
}

/// HOME 命令选项
#[derive(Debug, Clone, Copy)]
pub struct HomeOptions {
    /// 仅在上电后尚未归位时执行
    pub if_needed: bool,
    /// 跳过实际归位动作（警告：仅调试用）
    pub skip: bool,
    /// 归位超时
    pub timeout: Duration,
    /// 启用双次归位兜底（见 [`C9Controller::home`]）
    pub double_home: bool,
}

impl Default for HomeOptions {
    fn default() -> Self {
        Self {
            if_needed: true,
            skip: false,
            timeout: Duration::from_secs(240),
            double_home: false,
        }
    }
}

/// 预测睡眠时长，永不为负
///
/// `duration_ms` 是设备上报的预测运动时长；`scale` 刻意低估，
/// 剩余部分交给轮询收敛。
fn predicted_wait(
    duration_ms: f64,
    scale: f64,
    elapsed: Duration,
    dispatch_delay: Duration,
) -> Duration {
    let secs =
        duration_ms * scale / 1000.0 - elapsed.as_secs_f64() - dispatch_delay.as_secs_f64();
    if secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// 解析运动响应：`<duration_ms> <pos>...`
fn parse_motion_response(text: &str) -> Result<(f64, Vec<i64>), ClientError> {
    let mut tokens = text.split_whitespace();
    let duration = tokens
        .next()
        .ok_or_else(|| ClientError::InvalidResponse(text.to_string()))?
        .parse::<f64>()
        .map_err(|_| ClientError::InvalidResponse(text.to_string()))?;
    let positions = tokens
        .map(|token| {
            token
                .parse()
                .map_err(|_| ClientError::InvalidResponse(text.to_string()))
        })
        .collect::<Result<Vec<i64>, _>>()?;
    Ok((duration, positions))
}

impl<T: Transport> C9Controller<T> {
    /// 移动一组轴到目标位置
    ///
    /// `targets` 是（轴号，目标位置）对；返回设备上报的各轴最终
    /// 位置（原始计数），并按请求顺序为每个轴分发位置事件。
    pub fn move_axes(
        &mut self,
        targets: &[(u8, f64)],
        opts: MoveOptions,
    ) -> Result<Vec<i64>, ClientError> {
        if opts.velocity.is_some() != opts.acceleration.is_some() {
            return Err(ClientError::SpeedPair);
        }

        let mut command = Command::new("MOVE")
            .flag('V', opts.velocity)
            .flag('A', opts.acceleration)
            .flag('R', opts.relative)
            .flag('U', opts.units);
        for &(axis, position) in targets {
            let position = if opts.units { position * UNIT_SCALE } else { position };
            command = command.arg(axis).arg(position);
        }

        let response = self.link.request(&command)?;
        let dispatched = Instant::now();
        let (duration_ms, positions) = parse_motion_response(&response)?;

        let axes: Vec<u8> = targets.iter().map(|&(axis, _)| axis).collect();
        self.dispatch_position_events(&axes, &positions);

        if opts.wait {
            self.wait_after_motion(duration_ms, dispatched, &axes)?;
        }
        Ok(positions)
    }

    /// 移动单个轴
    pub fn move_axis(
        &mut self,
        axis: u8,
        position: f64,
        opts: MoveOptions,
    ) -> Result<i64, ClientError> {
        let positions = self.move_axes(&[(axis, position)], opts)?;
        positions
            .first()
            .copied()
            .ok_or_else(|| ClientError::InvalidResponse("empty move response".into()))
    }

    /// 移动机械臂到笛卡尔位置
    ///
    /// 只移动覆盖目标所需的最少轴；返回主轴最终位置并为其分发
    /// 位置事件。
    pub fn move_arm(&mut self, target: ArmMove) -> Result<Vec<i64>, ClientError> {
        if target.velocity.is_some() != target.acceleration.is_some() {
            return Err(ClientError::SpeedPair);
        }

        let mut axes: Vec<u8> = Vec::new();
        let mut command = Command::new("ARM")
            .flag('V', target.velocity)
            .flag('A', target.acceleration)
            .flag('R', target.relative);

        if let Some(x) = target.x {
            command = command.flag('X', x * UNIT_SCALE);
            axes.extend([AXIS_ELBOW, AXIS_SHOULDER]);
        }
        if let Some(y) = target.y {
            command = command.flag('Y', y * UNIT_SCALE);
            if !axes.contains(&AXIS_ELBOW) {
                axes.extend([AXIS_ELBOW, AXIS_SHOULDER]);
            }
        }
        if let Some(z) = target.z {
            command = command.flag('Z', z * UNIT_SCALE);
            axes.push(AXIS_COLUMN);
        }
        if let Some(gripper) = target.gripper {
            command = command.flag('G', gripper * UNIT_SCALE);
            axes.push(AXIS_GRIPPER);
        }
        if let Some(bias) = target.elbow_bias {
            command = command.flag('B', bias as i64);
        }

        let response = self.link.request(&command)?;
        let dispatched = Instant::now();
        let (duration_ms, positions) = parse_motion_response(&response)?;

        self.dispatch_position_events(&MAIN_AXES, &positions);

        if target.wait {
            self.wait_after_motion(duration_ms, dispatched, &axes)?;
        }
        Ok(positions)
    }

    /// 归位
    ///
    /// `axes` 为空时归位全部主轴（机械臂本体）。返回归位后的主轴
    /// 位置，并分发归位与位置事件。
    ///
    /// 已知固件怪癖：霍尔传感器未接时单次归位可能不准。当归位全部
    /// 主轴、未跳过、启用 `double_home` 且首次返回位置全为 0 时，
    /// 以相同语义再归位一次。这是有意保留的兜底，不是可以悄悄
    /// 删掉的重复请求。
    pub fn home(&mut self, axes: &[u8], opts: HomeOptions) -> Result<Vec<i64>, ClientError> {
        let command = Command::new("HOME")
            .flag('C', opts.if_needed)
            .flag('K', opts.skip)
            .args(axes.iter().copied());
        let request = RequestOptions::timeout(opts.timeout);
        let mut response = self.link.request_with(&command, request)?;

        if axes.is_empty() && response == "0 0 0 0" && !opts.skip && opts.double_home {
            let again = Command::new("HOME").flag('C', false).flag('K', false);
            response = self.link.request_with(&again, request)?;
        }

        let positions = parse_ints(&response)?;
        for axis in MAIN_AXES {
            self.events.dispatch_axis_event(Some(axis), &AxisEvent::Home);
        }
        self.dispatch_position_events(&MAIN_AXES, &positions);
        Ok(positions)
    }

    /// 急停：立即断开给定轴的电机
    pub fn halt(&mut self, axes: &[u8]) -> Result<(), ClientError> {
        if axes.is_empty() {
            return Err(ClientError::NoAxes);
        }
        self.link
            .request(&Command::new("HALT").args(axes.iter().copied()))?;
        Ok(())
    }

    /// 开始（或停止）旋转给定轴
    pub fn spin_axis(
        &mut self,
        axes: &[u8],
        velocity: Option<i64>,
        acceleration: Option<i64>,
        stop: bool,
    ) -> Result<(), ClientError> {
        let command = Command::new("SPIN")
            .flag('V', velocity)
            .flag('A', acceleration)
            .flag('H', stop)
            .args(axes.iter().copied());
        self.link.request(&command)?;
        Ok(())
    }

    /// 停止旋转给定轴
    pub fn spin_axis_stop(&mut self, axes: &[u8]) -> Result<(), ClientError> {
        self.spin_axis(axes, None, None, true)
    }

    /// 转盘转到给定索引位（0 是原位）
    pub fn carousel(&mut self, carousel: u8, index: i64, wait: bool) -> Result<(), ClientError> {
        self.link
            .request(&Command::new("CRSL").arg(carousel).arg(index))?;
        if wait {
            self.wait_for_axis(AXIS_CAROUSEL)?;
        }
        Ok(())
    }

    /// 保持末端位置不变，换一个肘位（必要时切换偏置）
    pub fn swap_elbow(&mut self) -> Result<(), ClientError> {
        self.link.request(&Command::new("SWEL"))?;
        self.wait_for_axes(&[AXIS_ELBOW, AXIS_SHOULDER])
    }

    /// 开盖：夹爪逆时针旋转的同时 z 轴按螺距同步上移
    ///
    /// 调用前机械臂应已夹紧瓶盖。返回开盖后的笛卡尔位置，复盖时
    /// 需要回到这个位置。
    pub fn uncap(&mut self, pitch_mm: f64, rotations: f64) -> Result<[f64; 3], ClientError> {
        self.move_axes(
            &[
                (AXIS_GRIPPER, -rotations * 360.0),
                (AXIS_COLUMN, pitch_mm * rotations),
            ],
            MoveOptions {
                relative: true,
                units: true,
                ..MoveOptions::default()
            },
        )?;
        self.cartesian_position()
    }

    /// 复盖：开盖的逆动作
    ///
    /// 调用前应把机械臂移回 [`C9Controller::uncap`] 返回的位置，
    /// 夹爪仍然夹着瓶盖。
    pub fn recap(&mut self, pitch_mm: f64, rotations: f64) -> Result<[f64; 3], ClientError> {
        self.move_axes(
            &[
                (AXIS_GRIPPER, rotations * 360.0),
                (AXIS_COLUMN, -pitch_mm * rotations),
            ],
            MoveOptions {
                relative: true,
                units: true,
                ..MoveOptions::default()
            },
        )?;
        self.cartesian_position()
    }

    /// 阻塞直到给定轴全部停止
    ///
    /// MVNG 轮询是运动完成的权威信号；无界等待，由设备上报收敛。
    pub fn wait_for_axes(&mut self, axes: &[u8]) -> Result<(), ClientError> {
        if axes.is_empty() {
            return Ok(());
        }
        let poll_interval = self.link.config().moving_poll_interval;
        while self.axes_moving(axes)?.into_iter().any(|moving| moving) {
            spin_sleep::sleep(poll_interval);
        }
        Ok(())
    }

    /// 阻塞直到单个轴停止
    pub fn wait_for_axis(&mut self, axis: u8) -> Result<(), ClientError> {
        self.wait_for_axes(&[axis])
    }

    /// 阻塞直到全部主轴停止
    pub fn wait_for_main_axes(&mut self) -> Result<(), ClientError> {
        self.wait_for_axes(&MAIN_AXES)
    }

    /// 按请求顺序分发各轴的位置事件
    fn dispatch_position_events(&mut self, axes: &[u8], positions: &[i64]) {
        for (&axis, &position) in axes.iter().zip(positions) {
            self.events
                .dispatch_axis_event(Some(axis), &AxisEvent::Position(position));
        }
    }

    /// 运动命令后的完成等待：可选的预测睡眠 + 权威的轮询
    fn wait_after_motion(
        &mut self,
        duration_ms: f64,
        dispatched: Instant,
        axes: &[u8],
    ) -> Result<(), ClientError> {
        let config = self.link.config();
        let (prediction, scale, dispatch_delay) = (
            config.move_prediction,
            config.move_wait_scale,
            config.move_wait_delay,
        );
        if prediction {
            let sleep = predicted_wait(duration_ms, scale, dispatched.elapsed(), dispatch_delay);
            spin_sleep::sleep(sleep);
        }
        self.wait_for_axes(axes)
    }
}
