//! 유한 용량 큐 -- 단계 간 엔트리 전달과 backpressure, 종료 브로드캐스트
//!
//! [`BoundedQueue`]는 파이프라인에서 두 번 사용됩니다 (수집 큐, 알림 큐).
//! 단계 사이의 유일한 공유 가변 상태이며, 모든 접근은 내부 mutex로 직렬화됩니다.
//! mutex는 `VecDeque`의 push/pop 동안에만 잡히고 `.await` 경계를 넘지 않습니다.
//!
//! # 대기 규칙
//! - [`enqueue`](BoundedQueue::enqueue): 용량이 찼으면 공간이 생기거나 큐가 닫힐 때까지 대기
//! - [`dequeue`](BoundedQueue::dequeue): 비어 있으면 엔트리가 들어오거나 큐가 닫힐 때까지 대기
//! - [`shutdown`](BoundedQueue::shutdown): 대기 중인 모든 태스크를 깨움
//!
//! 닫힌 큐에 남은 엔트리는 버려지지 않습니다. `dequeue`는 큐가 닫히고
//! **그리고** 비었을 때만 `None`(종료 신호)을 반환합니다.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use logwarden_core::metrics as m;

/// 닫힌 큐에 넣으려던 엔트리를 돌려주는 에러
#[derive(PartialEq, Eq)]
pub struct QueueClosed<T>(pub T);

impl<T> QueueClosed<T> {
    /// 전달하지 못한 엔트리를 꺼냅니다.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueueClosed").finish_non_exhaustive()
    }
}

impl<T> fmt::Display for QueueClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is closed")
    }
}

impl<T> std::error::Error for QueueClosed<T> {}

/// [`BoundedQueue::try_enqueue`] 실패 사유
#[derive(PartialEq, Eq)]
pub enum TryEnqueueError<T> {
    /// 용량이 가득 참
    Full(T),
    /// 큐가 닫힘
    Closed(T),
}

impl<T> TryEnqueueError<T> {
    /// 전달하지 못한 엔트리를 꺼냅니다.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.debug_tuple("Full").finish_non_exhaustive(),
            Self::Closed(_) => f.debug_tuple("Closed").finish_non_exhaustive(),
        }
    }
}

impl<T> fmt::Display for TryEnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("queue is full"),
            Self::Closed(_) => f.write_str("queue is closed"),
        }
    }
}

impl<T> std::error::Error for TryEnqueueError<T> {}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// 스레드 안전 FIFO 큐
///
/// `capacity == 0`이면 용량 제한이 없습니다. `closed` 플래그는 한 번
/// `true`가 되면 다시 `false`가 되지 않습니다.
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
    label: &'static str,
}

impl<T> BoundedQueue<T> {
    /// 새 큐를 생성합니다. `capacity == 0`이면 무제한입니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(4096)),
                closed: false,
            }),
            capacity,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            label: "queue",
        }
    }

    /// 메트릭 레이블(`queue=<label>`)을 지정합니다.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// 큐 끝에 엔트리를 추가합니다.
    ///
    /// 용량이 가득 찼으면 공간이 생길 때까지 대기합니다. 큐가 이미 닫혔거나
    /// 대기 중에 닫히면 엔트리 소유권을 [`QueueClosed`]로 돌려줍니다.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueClosed<T>> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            // 상태 확인 전에 대기자로 등록해야 shutdown/pop 알림을 놓치지 않는다
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    drop(state);
                    self.record_rejected();
                    return Err(QueueClosed(item));
                }
                if self.has_room(&state) {
                    state.items.push_back(item);
                    let len = state.items.len();
                    let room_left = self.has_room(&state);
                    drop(state);

                    self.not_empty.notify_one();
                    if room_left {
                        self.not_full.notify_one();
                    }
                    self.record_depth(len);
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// 대기하지 않고 엔트리 추가를 시도합니다.
    pub fn try_enqueue(&self, item: T) -> Result<(), TryEnqueueError<T>> {
        let mut state = self.lock();
        if state.closed {
            drop(state);
            self.record_rejected();
            return Err(TryEnqueueError::Closed(item));
        }
        if !self.has_room(&state) {
            return Err(TryEnqueueError::Full(item));
        }
        state.items.push_back(item);
        let len = state.items.len();
        drop(state);

        self.not_empty.notify_one();
        self.record_depth(len);
        Ok(())
    }

    /// 큐 앞의 엔트리를 꺼냅니다.
    ///
    /// 비어 있으면 엔트리가 들어오거나 큐가 닫힐 때까지 대기합니다.
    /// 큐가 닫히고 비었으면 `None`을 반환합니다 (종료 신호).
    pub async fn dequeue(&self) -> Option<T> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    let len = state.items.len();
                    drop(state);

                    if self.capacity > 0 {
                        self.not_full.notify_one();
                    }
                    if len > 0 {
                        self.not_empty.notify_one();
                    }
                    self.record_depth(len);
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// 대기하지 않고 엔트리를 꺼냅니다. 비어 있으면 `None`입니다.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        let len = state.items.len();
        drop(state);

        if self.capacity > 0 {
            self.not_full.notify_one();
        }
        self.record_depth(len);
        Some(item)
    }

    /// 큐를 닫고 대기 중인 모든 태스크를 깨웁니다. 여러 번 호출해도 안전합니다.
    ///
    /// 남아 있는 엔트리는 유지되며 소비자가 계속 꺼낼 수 있습니다.
    pub fn shutdown(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        tracing::debug!(queue = self.label, "queue shut down");
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// 큐를 닫고 남은 엔트리를 모두 해제합니다. 해제한 엔트리 수를 반환합니다.
    ///
    /// 여러 번 호출해도 안전하며 두 번째 호출부터는 0을 반환합니다.
    /// 이 큐를 사용하는 모든 태스크가 종료된 뒤에 호출해야 합니다.
    pub fn destroy(&self) -> usize {
        let discarded: VecDeque<T> = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.items)
        };
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();

        let count = discarded.len();
        if count > 0 {
            tracing::warn!(queue = self.label, discarded = count, "queue destroyed with pending entries");
        }
        self.record_depth(0);
        count
    }

    /// 현재 엔트리 수
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// 최대 용량 (0 = 무제한)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 닫혔는지 여부
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 사용률을 0.0~1.0 범위로 반환합니다. 무제한 큐는 항상 0.0입니다.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        let len = self.len();
        f64::from(u32::try_from(len).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }

    fn has_room(&self, state: &State<T>) -> bool {
        self.capacity == 0 || state.items.len() < self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // 패닉이 난 스레드가 있어도 VecDeque 자체는 일관된 상태다
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_depth(&self, len: usize) {
        metrics::gauge!(m::QUEUE_DEPTH, m::LABEL_QUEUE => self.label).set(len as f64);
    }

    fn record_rejected(&self) {
        metrics::counter!(m::QUEUE_REJECTED_TOTAL, m::LABEL_QUEUE => self.label).increment(1);
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("BoundedQueue")
            .field("label", &self.label)
            .field("len", &state.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}
