//! Non-blocking Buffer - 생산자를 절대 막지 않는 큐
//!
//! `send`는 소비자를 기다리지 않습니다. 드레인 루틴 하나가 보낸 순서대로
//! 항목을 용량 1짜리 tokio 채널로 옮기고, 소비자는 그 채널을 읽습니다.
//! 느리거나 없는 소비자는 드레인 루틴만 멈추게 할 뿐 생산자는 막지 않습니다.
//!
//! ```text
//! send() ──► VecDeque (Mutex) ──► drain ──► mpsc(1) ──► receiver
//! ```
//!
//! ## 드레인 루틴
//!
//! - tokio 런타임 안에서 생성되면 tokio 태스크로 실행됩니다 (`Notify`로 깨움).
//!   읽히지 않는 receiver는 대기 중인 태스크 하나만 붙잡습니다.
//! - 런타임 밖에서 생성되면 전용 OS 스레드로 실행됩니다 (`Condvar`로 깨움).
//!   이 경우 버퍼마다 스레드 하나가 receiver가 닫히거나 버퍼가 닫힐 때까지 남습니다.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::trace;

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    /// 스레드 드레인용
    available: Condvar,
    /// 태스크 드레인용
    wake: Notify,
}

/// 다음 드레인 단계
enum Next<T> {
    Item(T),
    Finished,
    Wait,
}

impl<T> Shared<T> {
    fn poll_next(state: &mut State<T>) -> Next<T> {
        match state.queue.pop_front() {
            Some(item) => Next::Item(item),
            None if state.closed => Next::Finished,
            None => Next::Wait,
        }
    }

    /// receiver가 사라짐: 남은 항목은 버리고 이후 send도 버림
    fn abandon(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.queue.clear();
        trace!("buffer receiver dropped, drain stopped");
    }
}

/// 생산자와 소비자를 분리하는 큐
///
/// ## 사용법
///
/// ```ignore
/// let buffer = NonBlockingBuffer::new();
/// let mut rx = buffer.take_receiver().unwrap();
///
/// buffer.send("chunk");
/// buffer.close();
///
/// while let Some(chunk) = rx.recv().await { /* ... */ }
/// ```
pub struct NonBlockingBuffer<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    receiver: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T: Send + 'static> NonBlockingBuffer<T> {
    /// 버퍼를 만들고 드레인 루틴 시작
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            wake: Notify::new(),
        });
        let (tx, rx) = mpsc::channel(1);

        let drain = Arc::clone(&shared);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Self::drain_task(drain, tx));
            }
            Err(_) => {
                std::thread::spawn(move || Self::drain_thread(drain, tx));
            }
        }

        Self {
            shared,
            receiver: Mutex::new(Some(rx)),
        }
    }

    async fn drain_task(shared: Arc<Shared<T>>, tx: mpsc::Sender<T>) {
        loop {
            let next = Shared::poll_next(&mut shared.state.lock());
            let item = match next {
                Next::Item(item) => item,
                // `tx`가 drop되면서 출력 채널이 닫힘
                Next::Finished => return,
                Next::Wait => {
                    shared.wake.notified().await;
                    continue;
                }
            };

            if tx.send(item).await.is_err() {
                shared.abandon();
                return;
            }
        }
    }

    fn drain_thread(shared: Arc<Shared<T>>, tx: mpsc::Sender<T>) {
        loop {
            let next = {
                let mut state = shared.state.lock();
                loop {
                    match Shared::poll_next(&mut state) {
                        Next::Wait => shared.available.wait(&mut state),
                        next => break next,
                    }
                }
            };

            let Next::Item(item) = next else {
                return;
            };

            if tx.blocking_send(item).is_err() {
                shared.abandon();
                return;
            }
        }
    }

    fn wake(&self) {
        self.shared.available.notify_all();
        self.shared.wake.notify_one();
    }

    /// 항목 추가. 소비자를 기다리지 않으며 `close` 이후에는 버려집니다.
    pub fn send(&self, item: T) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.wake();
    }

    /// 더 이상 받지 않음. 이미 쌓인 항목은 전달된 뒤 출력 채널이 닫힙니다.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        drop(state);
        self.wake();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// 아직 출력 채널로 넘어가지 않은 항목 수
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// 출력 채널 가져오기. 첫 호출만 반환합니다.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<T>> {
        self.receiver.lock().take()
    }
}

impl<T: Send + 'static> Default for NonBlockingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for NonBlockingBuffer<T> {
    fn drop(&mut self) {
        self.close();
    }
}
