use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 便签类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoteKind {
    #[default]
    Reminder = 0,
    Todo = 1,
    Idea = 2,
    Personal = 3,
}

impl NoteKind {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => NoteKind::Todo,
            2 => NoteKind::Idea,
            3 => NoteKind::Personal,
            _ => NoteKind::Reminder,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NoteKind::Reminder => "Reminder",
            NoteKind::Todo => "To-Do",
            NoteKind::Idea => "Idea",
            NoteKind::Personal => "Personal",
        }
    }
}

/// 提醒规则：相对倒计时结束时间何时提醒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReminderRule {
    #[default]
    TimeUp = 0,
    OneHourBefore = 1,
    OneDayBefore = 2,
    SpecificOffsetBefore = 3,
}

impl ReminderRule {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => ReminderRule::OneHourBefore,
            2 => ReminderRule::OneDayBefore,
            3 => ReminderRule::SpecificOffsetBefore,
            _ => ReminderRule::TimeUp,
        }
    }
}

/// 便签数据模型
///
/// `countdown_end_at` 只在保存时计算一次，`has_countdown` 为假或
/// `countdown_seconds == 0` 时必为 `None`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub text: String,
    pub kind: NoteKind,
    pub done: bool,
    pub has_countdown: bool,
    pub countdown_seconds: u64,
    pub countdown_end_at: Option<DateTime<Utc>>,
    pub reminder_rule: ReminderRule,
    /// 仅在 `SpecificOffsetBefore` 时有意义
    pub specific_offset_seconds: u64,
    /// 固定日期提醒，与倒计时无关
    pub fixed_reminder_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(id: String, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            kind: NoteKind::default(),
            done: false,
            has_countdown: false,
            countdown_seconds: 0,
            countdown_end_at: None,
            reminder_rule: ReminderRule::default(),
            specific_offset_seconds: 0,
            fixed_reminder_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 倒计时是否已配置（有结束时间）
    pub fn countdown_end(&self) -> Option<DateTime<Utc>> {
        if self.has_countdown {
            self.countdown_end_at
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriggerKind {
    TimeUp,
    /// 相对倒计时结束时间的提醒
    Relative,
    /// 固定日期提醒
    Fixed,
}

/// 一次待发送的通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub note_id: String,
    pub kind: TriggerKind,
    pub fire_at: DateTime<Utc>,
    pub title: &'static str,
    pub body: String,
}
