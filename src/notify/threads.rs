use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

use crate::core::models::MessageRef;

/// Oldest entries are evicted beyond this many work items.
pub const DEFAULT_THREAD_CAPACITY: usize = 5_000;

#[derive(Default)]
struct Inner {
    by_item: HashMap<String, MessageRef>,
    order: VecDeque<String>,
}

/// Remembers the channel message posted for each work item so later events can
/// reply in its thread.
pub struct ThreadStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for ThreadStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_THREAD_CAPACITY)
    }
}

impl ThreadStore {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub async fn remember(&self, work_item_id: &str, message: MessageRef) {
        let mut inner = self.inner.lock().await;
        if inner
            .by_item
            .insert(work_item_id.to_string(), message)
            .is_none()
        {
            inner.order.push_back(work_item_id.to_string());
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.by_item.remove(&oldest);
            }
        }
    }

    pub async fn lookup(&self, work_item_id: &str) -> Option<MessageRef> {
        self.inner.lock().await.by_item.get(work_item_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(ts: &str) -> MessageRef {
        MessageRef {
            channel: "C1".into(),
            ts: ts.into(),
        }
    }

    #[tokio::test]
    async fn remembers_and_evicts_oldest() {
        let store = ThreadStore::with_capacity(2);
        store.remember("a", msg("1")).await;
        store.remember("b", msg("2")).await;
        store.remember("c", msg("3")).await;
        assert!(store.lookup("a").await.is_none());
        assert_eq!(store.lookup("c").await, Some(msg("3")));
    }

    #[tokio::test]
    async fn overwrite_keeps_single_slot() {
        let store = ThreadStore::with_capacity(2);
        store.remember("a", msg("1")).await;
        store.remember("a", msg("9")).await;
        store.remember("b", msg("2")).await;
        assert_eq!(store.lookup("a").await, Some(msg("9")));
    }
}
