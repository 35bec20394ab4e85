//! 串行事件循环
//!
//! 便签变更命令和每秒一次的显示刷新是两个独立事件源，汇入同一个 `select!` 循环。
//! 每条变更命令都完整执行（存储修改 + 清空 + 全部重新提交）后才处理下一事件；
//! 显示刷新只计算倒计时，从不触发对账。

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::clock::TimeSource;
use crate::countdown::{project, CountdownView};
use crate::db::NoteStore;
use crate::error::{Error, Result};
use crate::models::Note;
use crate::notes::{save_draft, NoteDraft};
use crate::notify::Dispatcher;
use crate::schedule::{ReconcileSummary, Reconciler};

const COMMAND_BUFFER: usize = 64;

pub enum Command {
    Save {
        draft: NoteDraft,
        reply: oneshot::Sender<Result<Note>>,
    },
    Delete {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetDone {
        id: String,
        done: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    /// 外部进程改了数据库，重新读取并对账
    Reload,
    Shutdown,
}

/// 一条便签的倒计时显示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownSnapshot {
    pub note_id: String,
    pub text: String,
    pub view: CountdownView,
}

pub struct Engine<D> {
    store: NoteStore,
    reconciler: Reconciler<D>,
    clock: Arc<dyn TimeSource>,
    finished: HashSet<String>,
    display: watch::Sender<Vec<CountdownSnapshot>>,
}

impl<D: Dispatcher> Engine<D> {
    pub fn new(store: NoteStore, dispatcher: D, clock: Arc<dyn TimeSource>) -> Self {
        let (display, _) = watch::channel(Vec::new());
        Self {
            store,
            reconciler: Reconciler::new(dispatcher),
            clock,
            finished: HashSet::new(),
            display,
        }
    }

    pub fn dispatcher(&self) -> &D {
        self.reconciler.dispatcher()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CountdownSnapshot>> {
        self.display.subscribe()
    }

    /// 从存储读取全部便签并对账
    ///
    /// 读取失败时仍清空已提交的通知，不留下已删除便签的提醒
    pub fn reconcile_now(&mut self) -> Result<ReconcileSummary> {
        let notes = match self.store.list() {
            Ok(notes) => notes,
            Err(e) => {
                self.reconciler.dispatcher().clear_all();
                return Err(e);
            }
        };
        Ok(self.reconciler.reconcile(&notes, self.clock.now()))
    }

    /// 处理一条命令，返回 `false` 表示应停止循环
    pub fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Save { draft, reply } => {
                // 保存和对账必须用同一个时刻
                let now = self.clock.now();
                let result = save_draft(&self.store, &draft, now).map(|(note, snapshot)| {
                    self.reconciler.reconcile(&snapshot, now);
                    note
                });
                let _ = reply.send(result);
            }
            Command::Delete { id, reply } => {
                let now = self.clock.now();
                let result = self.store.remove(&id).map(|snapshot| {
                    tracing::info!("Deleted note {}", id);
                    self.reconciler.reconcile(&snapshot, now);
                });
                let _ = reply.send(result);
            }
            Command::SetDone { id, done, reply } => {
                // 完成状态不影响调度
                let result = self
                    .store
                    .set_done(&id, done, self.clock.now())
                    .map(|_| ());
                let _ = reply.send(result);
            }
            Command::Reload => {
                if let Err(e) = self.reconcile_now() {
                    tracing::error!("Failed to reload notes: {}", e);
                }
            }
            Command::Shutdown => {
                tracing::info!("Engine shutting down");
                return false;
            }
        }
        true
    }

    /// 显示刷新：计算所有倒计时并发布
    pub fn tick(&mut self) -> Vec<CountdownSnapshot> {
        let notes = match self.store.list() {
            Ok(notes) => notes,
            Err(e) => {
                tracing::warn!("Failed to read notes for display: {}", e);
                return Vec::new();
            }
        };
        let now = self.clock.now();

        let snapshots: Vec<CountdownSnapshot> = notes
            .iter()
            .filter_map(|note| {
                project(note, now).map(|view| CountdownSnapshot {
                    note_id: note.id.clone(),
                    text: note.text.clone(),
                    view,
                })
            })
            .collect();

        let finished: HashSet<String> = snapshots
            .iter()
            .filter(|s| s.view.is_done)
            .map(|s| s.note_id.clone())
            .collect();
        for id in finished.difference(&self.finished) {
            tracing::info!("Countdown finished for note {}", id);
        }
        self.finished = finished;

        self.display.send_replace(snapshots.clone());
        snapshots
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, tick_every: Duration) {
        if let Err(e) = self.reconcile_now() {
            tracing::error!("Initial reconcile failed: {}", e);
        }

        let mut ticker = interval(tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }
}

impl<D: Dispatcher + 'static> Engine<D> {
    /// 在当前 tokio 运行时里启动事件循环
    pub fn spawn(self, tick_every: Duration) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let handle = EngineHandle {
            commands: tx,
            display: self.subscribe(),
        };
        let task = tokio::spawn(self.run(rx, tick_every));
        (handle, task)
    }
}

/// 事件循环的异步入口，可以克隆
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    display: watch::Receiver<Vec<CountdownSnapshot>>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::EngineStopped)?;
        response.await.map_err(|_| Error::EngineStopped)?
    }

    pub async fn save(&self, draft: NoteDraft) -> Result<Note> {
        self.request(|reply| Command::Save { draft, reply }).await
    }

    pub async fn delete(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.request(|reply| Command::Delete { id, reply }).await
    }

    pub async fn set_done(&self, id: impl Into<String>, done: bool) -> Result<()> {
        let id = id.into();
        self.request(|reply| Command::SetDone { id, done, reply })
            .await
    }

    pub async fn reload(&self) -> Result<()> {
        self.commands
            .send(Command::Reload)
            .await
            .map_err(|_| Error::EngineStopped)
    }

    /// 给非异步线程（IPC 监听）用
    pub fn blocking_reload(&self) -> Result<()> {
        self.commands
            .blocking_send(Command::Reload)
            .map_err(|_| Error::EngineStopped)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::EngineStopped)
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<CountdownSnapshot>> {
        self.display.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.commands.is_closed()
    }
}
