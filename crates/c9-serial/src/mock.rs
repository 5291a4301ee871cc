//! 脚本化传输后端（测试用）
//!
//! 预先排队响应行或超时，记录所有写出的帧。内部状态放在共享
//! 句柄里：克隆一个 `MockTransport` 留在测试侧，原件移交给控制
//! 器，两侧观察同一份状态。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{Transport, TransportError};

enum ReadStep {
    Line(Vec<u8>),
    Timeout,
}

#[derive(Default)]
struct MockState {
    reads: VecDeque<ReadStep>,
    writes: Vec<Vec<u8>>,
    write_faults: u32,
    connected: bool,
}

/// 脚本化传输
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Mutex<MockState>>,
    device: String,
}

impl MockTransport {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(MockState {
                connected: true,
                ..MockState::default()
            })),
            device: device.into(),
        }
    }

    /// 排队一次 `read_line` / `read` 的返回数据（不含行结尾符）
    pub fn push_line(&self, line: impl AsRef<[u8]>) {
        self.shared
            .lock()
            .reads
            .push_back(ReadStep::Line(line.as_ref().to_vec()));
    }

    /// 排队一次读取超时
    pub fn push_timeout(&self) {
        self.shared.lock().reads.push_back(ReadStep::Timeout);
    }

    /// 让接下来的 `n` 次写入以写超时失败
    pub fn fail_writes(&self, n: u32) {
        self.shared.lock().write_faults = n;
    }

    /// 迄今写出的全部帧
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared.lock().writes.clone()
    }

    /// 迄今写出的帧数
    pub fn write_count(&self) -> usize {
        self.shared.lock().writes.len()
    }

    fn pop_read(&self) -> Result<Vec<u8>, TransportError> {
        match self.shared.lock().reads.pop_front() {
            Some(ReadStep::Line(line)) => Ok(line),
            Some(ReadStep::Timeout) | None => Err(TransportError::ReadTimeout),
        }
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.shared.lock().connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.shared.lock().connected = false;
        Ok(())
    }

    fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.write_faults > 0 {
            state.write_faults -= 1;
            return Err(TransportError::WriteTimeout);
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    fn read_line(
        &mut self,
        _terminator: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.pop_read()
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut data = self.pop_read()?;
        data.truncate(n);
        Ok(data)
    }

    fn device_id(&self) -> String {
        self.device.clone()
    }
}
