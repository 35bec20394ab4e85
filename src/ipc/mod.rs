//! 命令行与守护进程之间的本地套接字通信
//!
//! 每行一条 JSON 消息。CLI 修改数据库后发送 `NotesChanged`，守护进程收到后重新对账。

use interprocess::local_socket::{
    prelude::*, GenericFilePath, GenericNamespaced, ListenerOptions, Name, NameType, Stream,
};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::thread;

use crate::engine::EngineHandle;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcMessage {
    NotesChanged,
}

impl IpcMessage {
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// 支持命名空间套接字的平台用命名空间，否则落到临时目录下的文件
fn socket_name(raw: &str) -> io::Result<Name<'static>> {
    if GenericNamespaced::is_supported() {
        Ok(raw.to_ns_name::<GenericNamespaced>()?.into_owned())
    } else {
        let path = std::env::temp_dir().join(raw);
        Ok(path.as_path().to_fs_name::<GenericFilePath>()?.into_owned())
    }
}

/// 通知守护进程便签已变更
pub fn notify_daemon(raw_name: &str) -> Result<()> {
    let name = socket_name(raw_name)?;
    let mut conn = Stream::connect(name)?;
    conn.write_all(IpcMessage::NotesChanged.encode()?.as_bytes())?;
    conn.flush()?;
    Ok(())
}

/// 启动监听线程，把收到的消息转成引擎命令
///
/// 每个连接在自己的线程里读一行，卡住的客户端不会挡住后面的通知
pub fn spawn_listener(raw_name: &str, engine: EngineHandle) -> Result<thread::JoinHandle<()>> {
    let name = socket_name(raw_name)?;
    let listener = ListenerOptions::new().name(name).create_sync()?;
    tracing::info!("Listening for note changes on {}", raw_name);

    let handle = thread::Builder::new()
        .name("ipc-listener".to_string())
        .spawn(move || {
            for conn in listener.incoming() {
                if engine.is_stopped() {
                    tracing::info!("Engine stopped, closing IPC listener");
                    break;
                }
                let conn = match conn {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Incoming connection failed: {}", e);
                        continue;
                    }
                };
                let engine = engine.clone();
                let spawned = thread::Builder::new()
                    .name("ipc-conn".to_string())
                    .spawn(move || {
                        if let Err(e) = read_message(conn, || engine.blocking_reload()) {
                            tracing::debug!("IPC connection ended with error: {}", e);
                        }
                    });
                if let Err(e) = spawned {
                    tracing::warn!("Failed to spawn IPC connection thread: {}", e);
                }
            }
        })?;
    Ok(handle)
}

/// 每个连接只读一条消息
fn read_message<R: Read>(conn: R, on_change: impl FnOnce() -> Result<()>) -> Result<()> {
    let mut line = String::new();
    BufReader::new(conn).read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    match IpcMessage::decode(&line) {
        Ok(IpcMessage::NotesChanged) => {
            tracing::debug!("Received NotesChanged");
            on_change()
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed IPC message {:?}: {}", line.trim(), e);
            Ok(())
        }
    }
}
