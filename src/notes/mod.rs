// 便签保存流程
// 表单里的原始输入在这里被规整成 Note，时长字段的非法输入统一按 0 处理

use chrono::{DateTime, Duration, Utc};

use crate::db::NoteStore;
use crate::error::{Error, Result};
use crate::models::{Note, NoteKind, ReminderRule};

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// 天/时/分/秒 四个原始输入框
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationFields {
    pub days: String,
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
}

impl DurationFields {
    /// 把总秒数拆回四个字段，用于编辑已有便签
    pub fn from_seconds(total: u64) -> Self {
        let days = total / SECONDS_PER_DAY;
        let rest = total % SECONDS_PER_DAY;
        Self {
            days: days.to_string(),
            hours: (rest / SECONDS_PER_HOUR).to_string(),
            minutes: (rest % SECONDS_PER_HOUR / SECONDS_PER_MINUTE).to_string(),
            seconds: (rest % SECONDS_PER_MINUTE).to_string(),
        }
    }

    pub fn total_seconds(&self) -> u64 {
        coerce_field(&self.days)
            .saturating_mul(SECONDS_PER_DAY)
            .saturating_add(coerce_field(&self.hours).saturating_mul(SECONDS_PER_HOUR))
            .saturating_add(coerce_field(&self.minutes).saturating_mul(SECONDS_PER_MINUTE))
            .saturating_add(coerce_field(&self.seconds))
    }
}

/// 负数、非数字、空串都当作 0
fn coerce_field(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        return value;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value.floor() as u64,
        _ => {
            tracing::debug!("Coercing invalid duration field {:?} to 0", raw);
            0
        }
    }
}

/// 编辑表单的状态
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    /// `Some` 表示编辑已有便签
    pub id: Option<String>,
    pub text: String,
    pub kind: NoteKind,
    pub has_countdown: bool,
    pub countdown: DurationFields,
    pub reminder_rule: ReminderRule,
    pub specific_offset: DurationFields,
    pub fixed_reminder_at: Option<DateTime<Utc>>,
}

impl NoteDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            id: Some(note.id.clone()),
            text: note.text.clone(),
            kind: note.kind,
            has_countdown: note.has_countdown,
            countdown: DurationFields::from_seconds(note.countdown_seconds),
            reminder_rule: note.reminder_rule,
            specific_offset: DurationFields::from_seconds(note.specific_offset_seconds),
            fixed_reminder_at: note.fixed_reminder_at,
        }
    }

    /// 生成要保存的便签；倒计时结束时间在这里按 `now` 重新计算
    fn build(&self, id: String, existing: Option<&Note>, now: DateTime<Utc>) -> Result<Note> {
        if self.text.trim().is_empty() {
            return Err(Error::EmptyText);
        }

        let countdown_seconds = self.countdown.total_seconds();
        let countdown_end_at = if self.has_countdown && countdown_seconds > 0 {
            i64::try_from(countdown_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|span| now.checked_add_signed(span))
        } else {
            None
        };

        Ok(Note {
            id,
            text: self.text.clone(),
            kind: self.kind,
            done: existing.is_some_and(|note| note.done),
            has_countdown: self.has_countdown,
            countdown_seconds,
            countdown_end_at,
            reminder_rule: self.reminder_rule,
            specific_offset_seconds: self.specific_offset.total_seconds(),
            fixed_reminder_at: self.fixed_reminder_at,
            created_at: existing.map_or(now, |note| note.created_at),
            updated_at: now,
        })
    }
}

/// 保存便签，返回保存后的便签和新的完整快照
pub fn save_draft(
    store: &NoteStore,
    draft: &NoteDraft,
    now: DateTime<Utc>,
) -> Result<(Note, Vec<Note>)> {
    let note = match &draft.id {
        Some(id) => {
            let existing = store
                .get(id)?
                .ok_or_else(|| Error::NoteNotFound(id.clone()))?;
            draft.build(id.clone(), Some(&existing), now)?
        }
        None => draft.build(store.next_id(now)?, None, now)?,
    };

    let snapshot = store.upsert(&note)?;
    tracing::info!(
        "Saved note {} (countdown: {}s, rule: {:?})",
        note.id,
        note.countdown_seconds,
        note.reminder_rule
    );
    Ok((note, snapshot))
}

/// 搜索便签
pub fn search<'a>(notes: &'a [Note], query: &str) -> Vec<&'a Note> {
    let query_lower = query.to_lowercase();
    notes
        .iter()
        .filter(|note| note.text.to_lowercase().contains(&query_lower))
        .collect()
}
