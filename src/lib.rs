//! 带倒计时和提醒的便签
//!
//! 核心是提醒调度：便签变更后清空通知调度器，再按全部便签重新推导并提交触发时间。

pub mod clock;
pub mod config;
pub mod countdown;
pub mod db;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod models;
pub mod notes;
pub mod notify;
pub mod schedule;

pub use error::{Error, Result};
