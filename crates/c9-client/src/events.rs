//! 轴与输出事件的观察者分发
//!
//! 两个相互独立的注册表：按轴号与按输出号，各自把
//! （实体，事件类别）映射到有序的处理器列表。带实体号分发只
//! 调用该实体的处理器，按注册顺序；不带实体号则按实体号升序
//! 广播给所有已注册实体。
//!
//! 处理器同步调用；单个处理器失败记录到日志后继续分发其余
//! 处理器，不会中断调用方（与早期版本的传播行为不同，属于
//! 有意的行为变更）。

use std::collections::BTreeMap;

use tracing::warn;

/// 处理器返回值；`Err` 会被记录但不会中断分发
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type AxisHandler = Box<dyn FnMut(&AxisEvent) -> HandlerResult + Send>;
type OutputHandler = Box<dyn FnMut(&OutputEvent) -> HandlerResult + Send>;

/// 轴事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisEvent {
    /// 运动命令后上报的目标位置（原始计数）
    Position(i64),
    /// 轴已归位
    Home,
}

impl AxisEvent {
    pub fn kind(&self) -> AxisEventKind {
        match self {
            AxisEvent::Position(_) => AxisEventKind::Position,
            AxisEvent::Home => AxisEventKind::Home,
        }
    }
}

/// 轴事件类别（注册键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AxisEventKind {
    Position,
    Home,
}

/// 数字输出事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    /// 输出状态变更
    State(bool),
}

impl OutputEvent {
    pub fn kind(&self) -> OutputEventKind {
        match self {
            OutputEvent::State(_) => OutputEventKind::State,
        }
    }
}

/// 输出事件类别（注册键）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputEventKind {
    State,
}

/// 事件分发器
#[derive(Default)]
pub struct EventDispatcher {
    axis_handlers: BTreeMap<u8, BTreeMap<AxisEventKind, Vec<AxisHandler>>>,
    output_handlers: BTreeMap<u8, BTreeMap<OutputEventKind, Vec<OutputHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册轴事件处理器（同一键的处理器按注册顺序调用）
    pub fn register_axis_handler(
        &mut self,
        axis: u8,
        kind: AxisEventKind,
        handler: impl FnMut(&AxisEvent) -> HandlerResult + Send + 'static,
    ) {
        self.axis_handlers
            .entry(axis)
            .or_default()
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
    }

    /// 注册输出事件处理器
    pub fn register_output_handler(
        &mut self,
        output: u8,
        kind: OutputEventKind,
        handler: impl FnMut(&OutputEvent) -> HandlerResult + Send + 'static,
    ) {
        self.output_handlers
            .entry(output)
            .or_default()
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
    }

    /// 分发一个轴事件
    ///
    /// `axis` 为 `None` 时按轴号升序广播给所有已注册轴。
    pub fn dispatch_axis_event(&mut self, axis: Option<u8>, event: &AxisEvent) {
        let kind = event.kind();
        match axis {
            Some(axis) => {
                if let Some(handlers) = self
                    .axis_handlers
                    .get_mut(&axis)
                    .and_then(|by_kind| by_kind.get_mut(&kind))
                {
                    run_handlers(handlers, event, "axis", axis);
                }
            }
            None => {
                for (&axis, by_kind) in &mut self.axis_handlers {
                    if let Some(handlers) = by_kind.get_mut(&kind) {
                        run_handlers(handlers, event, "axis", axis);
                    }
                }
            }
        }
    }

    /// 分发一个输出事件（`None` 广播）
    pub fn dispatch_output_event(&mut self, output: Option<u8>, event: &OutputEvent) {
        let kind = event.kind();
        match output {
            Some(output) => {
                if let Some(handlers) = self
                    .output_handlers
                    .get_mut(&output)
                    .and_then(|by_kind| by_kind.get_mut(&kind))
                {
                    run_output_handlers(handlers, event, output);
                }
            }
            None => {
                for (&output, by_kind) in &mut self.output_handlers {
                    if let Some(handlers) = by_kind.get_mut(&kind) {
                        run_output_handlers(handlers, event, output);
                    }
                }
            }
        }
    }
}

fn run_handlers(handlers: &mut [AxisHandler], event: &AxisEvent, entity: &str, id: u8) {
    for (index, handler) in handlers.iter_mut().enumerate() {
        if let Err(err) = handler(event) {
            warn!(entity, id, index, error = %err, "event handler failed");
        }
    }
}

fn run_output_handlers(handlers: &mut [OutputHandler], event: &OutputEvent, id: u8) {
    for (index, handler) in handlers.iter_mut().enumerate() {
        if let Err(err) = handler(event) {
            warn!(entity = "output", id, index, error = %err, "event handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> AxisHandler) {
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &str| -> AxisHandler {
            let log = log_clone.clone();
            let name = name.to_string();
            Box::new(move |event: &AxisEvent| {
                log.lock().push(format!("{name}:{event:?}"));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let (log, make) = recorder();
        let mut dispatcher = EventDispatcher::new();
        let first = make("first");
        let second = make("second");
        dispatcher.register_axis_handler(2, AxisEventKind::Position, first);
        dispatcher.register_axis_handler(2, AxisEventKind::Position, second);

        dispatcher.dispatch_axis_event(Some(2), &AxisEvent::Position(100));

        assert_eq!(
            log.lock().clone(),
            vec!["first:Position(100)", "second:Position(100)"]
        );
    }

    #[test]
    fn targeted_dispatch_skips_other_axes() {
        let (log, make) = recorder();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_axis_handler(0, AxisEventKind::Position, make("gripper"));
        dispatcher.register_axis_handler(3, AxisEventKind::Position, make("column"));

        dispatcher.dispatch_axis_event(Some(3), &AxisEvent::Position(7));

        assert_eq!(log.lock().clone(), vec!["column:Position(7)"]);
    }

    #[test]
    fn broadcast_reaches_every_axis_in_ascending_order() {
        let (log, make) = recorder();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_axis_handler(3, AxisEventKind::Home, make("column"));
        dispatcher.register_axis_handler(1, AxisEventKind::Home, make("elbow"));

        dispatcher.dispatch_axis_event(None, &AxisEvent::Home);

        assert_eq!(log.lock().clone(), vec!["elbow:Home", "column:Home"]);
    }

    #[test]
    fn kind_mismatch_does_not_fire() {
        let (log, make) = recorder();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_axis_handler(1, AxisEventKind::Home, make("elbow"));

        dispatcher.dispatch_axis_event(Some(1), &AxisEvent::Position(5));

        assert!(log.lock().is_empty());
    }

    #[test]
    fn failing_handler_does_not_abort_dispatch() {
        let (log, make) = recorder();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_axis_handler(
            1,
            AxisEventKind::Position,
            |_: &AxisEvent| -> HandlerResult { Err("boom".into()) },
        );
        dispatcher.register_axis_handler(1, AxisEventKind::Position, make("survivor"));

        dispatcher.dispatch_axis_event(Some(1), &AxisEvent::Position(1));

        assert_eq!(log.lock().clone(), vec!["survivor:Position(1)"]);
    }

    #[test]
    fn output_state_events_dispatch_by_output_number() {
        let seen: Arc<Mutex<Vec<(u8, bool)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        for output in [4u8, 9] {
            let seen = seen.clone();
            dispatcher.register_output_handler(
                output,
                OutputEventKind::State,
                move |event: &OutputEvent| {
                    let OutputEvent::State(on) = event;
                    seen.lock().push((output, *on));
                    Ok(())
                },
            );
        }

        dispatcher.dispatch_output_event(Some(9), &OutputEvent::State(true));
        dispatcher.dispatch_output_event(None, &OutputEvent::State(false));

        assert_eq!(
            seen.lock().clone(),
            vec![(9, true), (4, false), (9, false)]
        );
    }
}
