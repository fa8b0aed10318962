//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! A minimal async waitgroup: the dispatcher tracks in-flight workers so
//! graceful shutdown can block on every spawned worker having been reaped
//! before the process exits.

use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::Notify;

struct Inner {
    count: Mutex<usize>,
    notify: Notify,
}

#[derive(Clone)]
pub struct WaitGroup(Arc<Inner>);

impl WaitGroup {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            count: Mutex::new(0),
            notify: Notify::new(),
        }))
    }

    /// Registers one in-flight worker. The returned guard decrements the
    /// count when dropped, which happens on every exit path including a
    /// panic unwind.
    pub fn add(&self) -> WorkerGuard {
        *self.0.count.lock().unwrap() += 1;
        WorkerGuard(self.clone())
    }

    /// Blocks until every currently-registered worker has been reaped.
    pub async fn wait(&self) {
        loop {
            if *self.0.count.lock().unwrap() == 0 {
                return;
            }
            self.0.notify.notified().await;
        }
    }

    fn done(&self) {
        let mut count = self.0.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.0.notify.notify_waiters();
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorkerGuard(WaitGroup);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.0.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_returns_immediately_when_empty() {
        let wg = WaitGroup::new();
        wg.wait().await;
    }

    #[tokio::test]
    async fn wait_blocks_until_all_guards_drop() {
        let wg = WaitGroup::new();
        let guard_a = wg.add();
        let guard_b = wg.add();

        let wg_clone = wg.clone();
        let waiter = tokio::spawn(async move {
            wg_clone.wait().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard_a);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard_b);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
