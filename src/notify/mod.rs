use notify_rust::{Notification, Timeout};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::config::NotificationsConfig;

pub mod recording;

/// 通知调度器
///
/// 只能“N 秒后发送”或“清空全部待发送”，没有按条目取消。
/// 两个操作都是发出即忘，失败只记日志。
pub trait Dispatcher: Send + Sync {
    fn schedule_at(&self, fire_in_seconds: u64, title: &str, body: &str);
    fn clear_all(&self);
}

impl<T: Dispatcher + ?Sized> Dispatcher for Arc<T> {
    fn schedule_at(&self, fire_in_seconds: u64, title: &str, body: &str) {
        (**self).schedule_at(fire_in_seconds, title, body);
    }

    fn clear_all(&self) {
        (**self).clear_all();
    }
}

impl<T: Dispatcher + ?Sized> Dispatcher for Box<T> {
    fn schedule_at(&self, fire_in_seconds: u64, title: &str, body: &str) {
        (**self).schedule_at(fire_in_seconds, title, body);
    }

    fn clear_all(&self) {
        (**self).clear_all();
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("notifications are disabled")]
    Disabled,
    #[error("notification platform error: {0}")]
    Platform(String),
}

/// 桌面通知调度器
///
/// 每个待发送通知是一个睡眠中的 tokio 任务，`clear_all` 直接中止全部任务。
pub struct DesktopDispatcher {
    settings: Arc<NotificationsConfig>,
    runtime: Handle,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl DesktopDispatcher {
    pub fn new(settings: NotificationsConfig, runtime: Handle) -> Self {
        Self {
            settings: Arc::new(settings),
            runtime,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn check_available(&self) -> Result<(), DispatchError> {
        if self.settings.enabled {
            Ok(())
        } else {
            Err(DispatchError::Disabled)
        }
    }

    /// 尚未触发的通知数量
    pub fn pending_count(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|task| !task.is_finished());
        pending.len()
    }
}

impl Dispatcher for DesktopDispatcher {
    fn schedule_at(&self, fire_in_seconds: u64, title: &str, body: &str) {
        if let Err(e) = self.check_available() {
            tracing::debug!("Skipping notification {:?}: {}", title, e);
            return;
        }

        let settings = Arc::clone(&self.settings);
        let title = title.to_string();
        let body = body.to_string();
        let task = self.runtime.spawn(async move {
            sleep(Duration::from_secs(fire_in_seconds)).await;
            let shown =
                tokio::task::spawn_blocking(move || show_notification(&settings, &title, &body))
                    .await;
            match shown {
                Ok(Ok(())) => tracing::info!("Notification delivered"),
                Ok(Err(e)) => tracing::warn!("Failed to send notification: {}", e),
                Err(e) => tracing::warn!("Notification task failed: {}", e),
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }

    fn clear_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let count = pending.len();
        for task in pending.drain(..) {
            task.abort();
        }
        tracing::debug!("Cleared {} pending notifications", count);
    }
}

impl Drop for DesktopDispatcher {
    fn drop(&mut self) {
        self.clear_all();
    }
}

/// 发送系统通知
fn show_notification(
    settings: &NotificationsConfig,
    title: &str,
    body: &str,
) -> Result<(), DispatchError> {
    Notification::new()
        .appname(&settings.app_name)
        .summary(&format!("⏰ {}", title))
        .body(body)
        .icon(&settings.icon)
        .timeout(Timeout::Milliseconds(settings.timeout_ms))
        .show()
        .map(|_| ())
        .map_err(|e| DispatchError::Platform(e.to_string()))
}

/// 只写日志不发通知，用于 `noted --dry-run`
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn schedule_at(&self, fire_in_seconds: u64, title: &str, body: &str) {
        tracing::info!("[dry-run] in {}s: {} - {}", fire_in_seconds, title, body);
    }

    fn clear_all(&self) {
        tracing::info!("[dry-run] clear all pending notifications");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool) -> NotificationsConfig {
        NotificationsConfig {
            enabled,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn disabled_notifications_are_a_no_op() {
        let dispatcher = DesktopDispatcher::new(settings(false), Handle::current());
        dispatcher.schedule_at(60, "Time is up!", "Tea");
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn clear_all_aborts_pending_notifications() {
        let dispatcher = DesktopDispatcher::new(settings(true), Handle::current());
        dispatcher.schedule_at(3600, "Time is up!", "Tea");
        dispatcher.schedule_at(7200, "1 hour left!", "Tea");
        assert_eq!(dispatcher.pending_count(), 2);

        dispatcher.clear_all();
        assert_eq!(dispatcher.pending_count(), 0);
    }
}
