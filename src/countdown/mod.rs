use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Note;

/// 倒计时显示状态，每次刷新重新计算，不修改便签
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownView {
    pub remaining_seconds: u64,
    pub display: String,
    pub is_done: bool,
}

/// 没有配置倒计时的便签返回 `None`
pub fn project(note: &Note, now: DateTime<Utc>) -> Option<CountdownView> {
    let end = note.countdown_end()?;
    let remaining_seconds = u64::try_from((end - now).num_seconds()).unwrap_or(0);

    Some(CountdownView {
        remaining_seconds,
        display: format_remaining(remaining_seconds),
        is_done: remaining_seconds == 0,
    })
}

/// 格式化剩余时间
///
/// 前导的 0 单位省略，第一个非零单位之后的单位全部显示，秒总是显示。
pub fn format_remaining(total: u64) -> String {
    let units = [
        (total / 86_400, 'd'),
        (total % 86_400 / 3_600, 'h'),
        (total % 3_600 / 60, 'm'),
        (total % 60, 's'),
    ];

    let first = units
        .iter()
        .position(|(value, _)| *value > 0)
        .unwrap_or(units.len() - 1);

    let parts: Vec<String> = units[first..]
        .iter()
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();
    format!("{} left", parts.join(" "))
}
