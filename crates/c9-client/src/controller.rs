//! C9 控制器门面
//!
//! [`C9Controller`] 把请求引擎包装成面向领域的操作集合。本文件
//! 承载基础协议、状态查询与数字/模拟 I/O；运动命令在
//! [`crate::motion`]，COM 透传在 [`crate::com`]。

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use c9_driver::{C9Link, ControllerStats, PauseHandle, RequestOptions};
use c9_protocol::Command;
use c9_serial::Transport;

use crate::builder::C9Builder;
use crate::error::ClientError;
use crate::events::{
    AxisEvent, AxisEventKind, EventDispatcher, HandlerResult, OutputEvent, OutputEventKind,
};

/// 夹爪轴号
pub const AXIS_GRIPPER: u8 = 0;
/// 肘部轴号
pub const AXIS_ELBOW: u8 = 1;
/// 肩部轴号
pub const AXIS_SHOULDER: u8 = 2;
/// 立柱轴号
pub const AXIS_COLUMN: u8 = 3;
/// 转盘轴号
pub const AXIS_CAROUSEL: u8 = 4;

/// 主轴数量；编号 ≥ 4 的轴是辅助轴
pub const NUM_MAIN_AXES: usize = 4;
/// 主轴集合（机械臂本体）
pub const MAIN_AXES: [u8; 4] = [AXIS_GRIPPER, AXIS_ELBOW, AXIS_SHOULDER, AXIS_COLUMN];

/// 该轴是否为辅助轴
pub fn is_aux_axis(axis: u8) -> bool {
    usize::from(axis) >= NUM_MAIN_AXES
}

/// 工程单位 ↔ 原始计数的换算系数
pub(crate) const UNIT_SCALE: f64 = 1000.0;

/// PING 的专用超时与重试预算
const PING_TIMEOUT: Duration = Duration::from_secs(1);
const PING_RETRIES: u32 = 5;

/// 笛卡尔位置查询偶发返回残缺行，最多重查这么多次
const CARTESIAN_RETRIES: u32 = 10;

/// 肘部偏置策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElbowBias {
    /// 肩部尽量靠近中心
    MinShoulder = 0,
    /// 肩部尽量远离中心
    MaxShoulder = 1,
    /// 新位置尽量贴近旧位置，避免肘部大幅摆动
    Closest = 2,
}

impl TryFrom<i64> for ElbowBias {
    type Error = ClientError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ElbowBias::MinShoulder),
            1 => Ok(ElbowBias::MaxShoulder),
            2 => Ok(ElbowBias::Closest),
            other => Err(ClientError::InvalidResponse(format!(
                "unknown elbow bias {other}"
            ))),
        }
    }
}

/// C9 控制器客户端
///
/// 每条逻辑连接一个实例。引用同一物理设备的多个实例通过共享的
/// `ConnectionManager` 解析到同一把设备锁，任一时刻至多一条在途
/// 请求。
pub struct C9Controller<T: Transport> {
    pub(crate) link: C9Link<T>,
    pub(crate) events: EventDispatcher,
}

impl<T: Transport> C9Controller<T> {
    /// 进入构建器
    pub fn builder(transport: T) -> C9Builder<T> {
        C9Builder::new(transport)
    }

    pub(crate) fn from_link(link: C9Link<T>) -> Self {
        Self {
            link,
            events: EventDispatcher::new(),
        }
    }

    pub fn connect(&mut self) -> Result<(), ClientError> {
        Ok(self.link.connect()?)
    }

    pub fn disconnect(&mut self) -> Result<(), ClientError> {
        Ok(self.link.disconnect()?)
    }

    /// 请求统计
    pub fn stats(&self) -> &ControllerStats {
        self.link.stats()
    }

    /// 暂停句柄（可克隆到其他线程）
    pub fn pause_handle(&self) -> PauseHandle {
        self.link.pause_handle()
    }

    // ------------------------------------------------------------------
    // 事件注册
    // ------------------------------------------------------------------

    /// 注册轴事件处理器
    pub fn register_axis_handler(
        &mut self,
        axis: u8,
        kind: AxisEventKind,
        handler: impl FnMut(&AxisEvent) -> HandlerResult + Send + 'static,
    ) {
        self.events.register_axis_handler(axis, kind, handler);
    }

    /// 注册输出事件处理器
    pub fn register_output_handler(
        &mut self,
        output: u8,
        kind: OutputEventKind,
        handler: impl FnMut(&OutputEvent) -> HandlerResult + Send + 'static,
    ) {
        self.events.register_output_handler(output, kind, handler);
    }

    // ------------------------------------------------------------------
    // 基础协议
    // ------------------------------------------------------------------

    /// 连通性检查：发送 PING
    ///
    /// 专用的短超时与小重试预算，并强制取新序列号。
    pub fn ping(&mut self) -> Result<(), ClientError> {
        let opts = RequestOptions {
            timeout: Some(PING_TIMEOUT),
            retries: Some(PING_RETRIES),
            reset_sequence: true,
            ..RequestOptions::default()
        };
        self.link.request_with(&Command::new("PING"), opts)?;
        Ok(())
    }

    /// 固件名称与版本
    pub fn info(&mut self) -> Result<String, ClientError> {
        Ok(self.link.request(&Command::new("INFO"))?)
    }

    /// 查询控制器网络地址
    pub fn address(&mut self) -> Result<u8, ClientError> {
        let response = self.link.request(&Command::new("ADDR"))?;
        let address = parse_int(&response)?;
        u8::try_from(address)
            .map_err(|_| ClientError::InvalidResponse(format!("address out of range: {address}")))
    }

    /// 修改控制器网络地址，之后的帧使用新地址
    pub fn set_address(&mut self, new_address: u8) -> Result<u8, ClientError> {
        let response = self.link.request(&Command::new("ADDR").arg(new_address))?;
        let address = parse_int(&response)?;
        self.link.set_address(new_address);
        u8::try_from(address)
            .map_err(|_| ClientError::InvalidResponse(format!("address out of range: {address}")))
    }

    /// 查询各主轴的标定值
    pub fn calibration(&mut self) -> Result<Vec<i64>, ClientError> {
        let mut values = Vec::with_capacity(NUM_MAIN_AXES);
        for axis in MAIN_AXES {
            let response = self.link.request(&Command::new("CALI").arg(axis))?;
            values.push(parse_int(&response)?);
        }
        Ok(values)
    }

    /// 覆写各主轴的标定值（危险操作：逐轴写入并等待其停止）
    pub fn set_calibration(&mut self, values: [i64; 4]) -> Result<Vec<i64>, ClientError> {
        let mut result = Vec::with_capacity(values.len());
        for (axis, value) in MAIN_AXES.into_iter().zip(values) {
            let response = self.link.request(&Command::new("CALI").arg(axis).arg(value))?;
            result.push(parse_int(&response)?);
            self.wait_for_axis(axis)?;
        }
        Ok(result)
    }

    /// 查询或设置默认运动速度与加速度（计数/s、计数/s²）
    pub fn speed(
        &mut self,
        velocity: Option<i64>,
        acceleration: Option<i64>,
    ) -> Result<(i64, i64), ClientError> {
        let command = Command::new("SPED").arg(velocity).arg(acceleration);
        let response = self.link.request(&command)?;
        let values = parse_ints(&response)?;
        match values.as_slice() {
            [velocity, acceleration] => Ok((*velocity, *acceleration)),
            _ => Err(ClientError::InvalidResponse(response)),
        }
    }

    // ------------------------------------------------------------------
    // 状态查询
    // ------------------------------------------------------------------

    /// 查询多个轴的当前位置
    ///
    /// `units` 为真时按工程单位（÷1000）返回并请求 `U` 标志；
    /// `motor` 为真时从电机控制器取实际位置而非 C9 内部值。
    pub fn axis_positions(
        &mut self,
        axes: &[u8],
        units: bool,
        motor: bool,
    ) -> Result<Vec<f64>, ClientError> {
        let command = Command::new("POS")
            .flag('U', units)
            .flag('M', motor)
            .args(axes.iter().copied());
        let response = self.link.request(&command)?;
        let scale = if units { UNIT_SCALE } else { 1.0 };
        Ok(parse_floats(&response)?
            .into_iter()
            .map(|p| p / scale)
            .collect())
    }

    /// 查询单个轴的当前位置
    pub fn axis_position(&mut self, axis: u8, units: bool, motor: bool) -> Result<f64, ClientError> {
        let positions = self.axis_positions(&[axis], units, motor)?;
        positions
            .first()
            .copied()
            .ok_or_else(|| ClientError::InvalidResponse("empty position response".into()))
    }

    /// N9 末端的笛卡尔位置（mm）
    ///
    /// 固件偶发返回残缺行；不足三个值时做有界重查。
    pub fn cartesian_position(&mut self) -> Result<[f64; 3], ClientError> {
        for _ in 0..CARTESIAN_RETRIES {
            let response = self.link.request(&Command::new("POS").flag('C', true))?;
            let values = parse_floats(&response)?;
            if let [x, y, z] = values.as_slice() {
                return Ok([x / UNIT_SCALE, y / UNIT_SCALE, z / UNIT_SCALE]);
            }
            debug!(response = %response, "short cartesian position response, requerying");
            spin_sleep::sleep(Duration::from_millis(10));
        }
        Err(ClientError::InvalidResponse(
            "cartesian position never returned three values".into(),
        ))
    }

    /// 轴的实际速度（计数/s）
    pub fn axis_velocity(&mut self, axis: u8) -> Result<f64, ClientError> {
        let response = self.link.request(&Command::new("VEL").arg(axis))?;
        parse_float(&response)
    }

    /// 查询轴的实际电流；给定 `max_current` 时先设置最大电流
    pub fn axis_current(
        &mut self,
        axis: u8,
        max_current: Option<i64>,
        max: bool,
    ) -> Result<i64, ClientError> {
        let max = max || max_current.is_some();
        let command = Command::new("CURR")
            .flag('M', max)
            .arg(axis)
            .arg(max_current);
        let response = self.link.request(&command)?;
        parse_int(&response)
    }

    /// 查询多个轴的运动状态（真 = 在动）
    pub fn axes_moving(&mut self, axes: &[u8]) -> Result<Vec<bool>, ClientError> {
        let command = Command::new("MVNG").args(axes.iter().copied());
        let response = self.link.request(&command)?;
        Ok(response
            .split_whitespace()
            .map(|token| token == "1")
            .collect())
    }

    /// 查询单个轴的运动状态
    pub fn axis_moving(&mut self, axis: u8) -> Result<bool, ClientError> {
        Ok(self.link.request(&Command::new("MVNG").arg(axis))? == "1")
    }

    /// 轴状态字（-1 表示故障）
    pub fn axis_state(&mut self, axis: u8) -> Result<i64, ClientError> {
        let response = self.link.request(&Command::new("STAT").arg(axis))?;
        parse_int(&response)
    }

    /// 轴故障码（`0000` 表示无故障）
    pub fn axis_error(&mut self, axis: u8) -> Result<String, ClientError> {
        Ok(self.link.request(&Command::new("STAT").flag('E', true).arg(axis))?)
    }

    /// 全部轴的故障表
    pub fn axis_errors(&mut self) -> Result<BTreeMap<u8, String>, ClientError> {
        let response = self.link.request(&Command::new("STAT").flag('F', true))?;
        let mut errors = BTreeMap::new();
        for line in response.lines() {
            let mut tokens = line.split_whitespace();
            let (Some(axis), Some(code)) = (tokens.next(), tokens.next()) else {
                return Err(ClientError::InvalidResponse(line.to_string()));
            };
            let axis: u8 = axis
                .parse()
                .map_err(|_| ClientError::InvalidResponse(line.to_string()))?;
            errors.insert(axis, code.to_string());
        }
        Ok(errors)
    }

    // ------------------------------------------------------------------
    // 数字/模拟 I/O
    // ------------------------------------------------------------------

    /// 查询数字输出状态
    pub fn output(&mut self, output: u8) -> Result<bool, ClientError> {
        Ok(self.link.request(&Command::new("OUTP").arg(output))? == "1")
    }

    /// 设置数字输出状态并分发状态事件
    pub fn set_output(&mut self, output: u8, state: bool) -> Result<bool, ClientError> {
        let value: i64 = if state { 1 } else { 0 };
        self.link.request(&Command::new("OUTP").arg(output).arg(value))?;
        self.events
            .dispatch_output_event(Some(output), &OutputEvent::State(state));
        Ok(state)
    }

    /// 翻转数字输出状态
    pub fn output_toggle(&mut self, output: u8) -> Result<bool, ClientError> {
        let state = self.output(output)?;
        self.set_output(output, !state)
    }

    /// 查询一组（或全部）数字输出状态
    pub fn outputs(&mut self, pins: &[u8], all: bool) -> Result<Vec<bool>, ClientError> {
        let command = Command::new("OUTP").flag('A', all).args(pins.iter().copied());
        let response = self.link.request(&command)?;
        parse_ints(&response).map(|values| values.into_iter().map(|v| v != 0).collect())
    }

    /// 模拟输入电压（V）
    pub fn analog(&mut self, pin: u8) -> Result<f64, ClientError> {
        let response = self.link.request(&Command::new("ADC").arg(pin))?;
        Ok(parse_float(&response)? / UNIT_SCALE)
    }

    /// 一组（或全部）模拟输入电压
    pub fn analog_inputs(&mut self, pins: &[u8], all: bool) -> Result<Vec<f64>, ClientError> {
        let command = Command::new("ADC").flag('A', all).args(pins.iter().copied());
        let response = self.link.request(&command)?;
        Ok(parse_floats(&response)?
            .into_iter()
            .map(|v| v / UNIT_SCALE)
            .collect())
    }

    /// 数字输入状态
    pub fn digital(&mut self, pin: u8) -> Result<bool, ClientError> {
        let response = self.link.request(&Command::new("INP").arg(pin))?;
        Ok(parse_int(&response)? != 0)
    }

    /// 一组（或全部）数字输入状态
    pub fn digital_inputs(&mut self, pins: &[u8], all: bool) -> Result<Vec<bool>, ClientError> {
        let command = Command::new("INP").flag('A', all).args(pins.iter().copied());
        let response = self.link.request(&command)?;
        parse_ints(&response).map(|values| values.into_iter().map(|v| v != 0).collect())
    }

    /// 称量（mg）；`tare` 为真时先去皮
    pub fn weigh_scale(&mut self, tare: bool) -> Result<f64, ClientError> {
        let response = self.link.request(&Command::new("WEIG").flag('T', tare))?;
        parse_float(&response)
    }

    // ------------------------------------------------------------------
    // 机械臂几何
    // ------------------------------------------------------------------

    /// 查询肘部偏置策略
    pub fn elbow_bias(&mut self) -> Result<ElbowBias, ClientError> {
        let response = self.link.request(&Command::new("BIAS"))?;
        ElbowBias::try_from(parse_int(&response)?)
    }

    /// 设置肘部偏置策略
    pub fn set_elbow_bias(&mut self, bias: ElbowBias) -> Result<ElbowBias, ClientError> {
        let response = self.link.request(&Command::new("BIAS").arg(bias as i64))?;
        ElbowBias::try_from(parse_int(&response)?)
    }

    /// 末端连杆长度偏移（mm）
    pub fn elbow_length(&mut self) -> Result<f64, ClientError> {
        let response = self.link.request(&Command::new("JLEN"))?;
        Ok(parse_float(&response)? / UNIT_SCALE)
    }

    /// 设置末端连杆长度偏移（mm），用于探针等附件
    pub fn set_elbow_length(&mut self, length_mm: f64) -> Result<(), ClientError> {
        self.link
            .request(&Command::new("JLEN").arg(length_mm * UNIT_SCALE))?;
        Ok(())
    }

    /// 启用/停用探针（固定 41.5 mm 的连杆偏移）
    pub fn use_probe(&mut self, probe: bool) -> Result<(), ClientError> {
        const PROBE_OFFSET_MM: f64 = 41.5;
        self.set_elbow_length(if probe { PROBE_OFFSET_MM } else { 0.0 })
    }
}

// ----------------------------------------------------------------------
// 响应解析辅助
// ----------------------------------------------------------------------

pub(crate) fn parse_int(text: &str) -> Result<i64, ClientError> {
    text.trim()
        .parse()
        .map_err(|_| ClientError::InvalidResponse(text.to_string()))
}

pub(crate) fn parse_float(text: &str) -> Result<f64, ClientError> {
    text.trim()
        .parse()
        .map_err(|_| ClientError::InvalidResponse(text.to_string()))
}

pub(crate) fn parse_ints(text: &str) -> Result<Vec<i64>, ClientError> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|_| ClientError::InvalidResponse(text.to_string()))
        })
        .collect()
}

pub(crate) fn parse_floats(text: &str) -> Result<Vec<f64>, ClientError> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|_| ClientError::InvalidResponse(text.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_axis_boundary() {
        assert!(!is_aux_axis(AXIS_GRIPPER));
        assert!(!is_aux_axis(AXIS_COLUMN));
        assert!(is_aux_axis(AXIS_CAROUSEL));
        assert!(is_aux_axis(9));
    }

    #[test]
    fn elbow_bias_round_trips() {
        for bias in [ElbowBias::MinShoulder, ElbowBias::MaxShoulder, ElbowBias::Closest] {
            assert_eq!(ElbowBias::try_from(bias as i64).unwrap(), bias);
        }
        assert!(ElbowBias::try_from(3).is_err());
    }

    #[test]
    fn parse_helpers_reject_garbage() {
        assert_eq!(parse_ints("100 -200 300").unwrap(), vec![100, -200, 300]);
        assert!(parse_ints("100 x").is_err());
        assert_eq!(parse_float(" 1.5 ").unwrap(), 1.5);
        assert!(parse_int("").is_err());
    }
}
