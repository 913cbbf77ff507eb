//! タグ単位の排他制御

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// タグごとに非同期ロックを払い出す
///
/// エントリは弱参照で持ち、保持者も待機者もいなくなれば破棄される。
#[derive(Debug, Default)]
pub struct TagLocks {
    locks: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl TagLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tag` のロックを取得し、ガードが破棄されるまで保持する
    pub async fn acquire(&self, tag: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| lock.strong_count() > 0);

            match locks.get(tag).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(tag.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };

        lock.lock_owned().await
    }

    /// ロック中または待機中のタグ数
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}
