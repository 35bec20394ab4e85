//! 从单个便签推导出通知触发时间
//!
//! 纯函数：只依赖便签字段和传入的当前时间。

use chrono::{DateTime, Duration, Utc};

use crate::models::{Note, ReminderRule, Trigger, TriggerKind};

pub const TIME_UP_TITLE: &str = "Time is up!";
pub const ONE_HOUR_TITLE: &str = "1 hour left!";
pub const ONE_DAY_TITLE: &str = "1 day left!";
pub const CUSTOM_OFFSET_TITLE: &str = "Custom time left!";
pub const FIXED_REMINDER_TITLE: &str = "Reminder!";

/// 推导顺序：到时通知、相对提醒、固定日期提醒
///
/// 相对提醒必须严格早于到时通知且严格晚于 `now`，否则直接丢弃，不做截断。
pub fn derive(note: &Note, now: DateTime<Utc>) -> Vec<Trigger> {
    if note.text.trim().is_empty() {
        return Vec::new();
    }

    let trigger = |kind, fire_at, title| Trigger {
        note_id: note.id.clone(),
        kind,
        fire_at,
        title,
        body: note.text.clone(),
    };

    let mut triggers = Vec::with_capacity(2);

    if let Some(end) = note.countdown_end().filter(|end| *end > now) {
        triggers.push(trigger(TriggerKind::TimeUp, end, TIME_UP_TITLE));

        if let Some((offset, title)) = relative_offset(note) {
            if let Some(fire_at) = end.checked_sub_signed(offset) {
                if now < fire_at && fire_at < end {
                    triggers.push(trigger(TriggerKind::Relative, fire_at, title));
                }
            }
        }
    }

    if let Some(fixed) = note.fixed_reminder_at.filter(|at| *at > now) {
        triggers.push(trigger(TriggerKind::Fixed, fixed, FIXED_REMINDER_TITLE));
    }

    triggers
}

fn relative_offset(note: &Note) -> Option<(Duration, &'static str)> {
    match note.reminder_rule {
        ReminderRule::TimeUp => None,
        ReminderRule::OneHourBefore => Some((Duration::hours(1), ONE_HOUR_TITLE)),
        ReminderRule::OneDayBefore => Some((Duration::days(1), ONE_DAY_TITLE)),
        ReminderRule::SpecificOffsetBefore => {
            if note.specific_offset_seconds == 0 {
                return None;
            }
            let seconds = i64::try_from(note.specific_offset_seconds).ok()?;
            Some((Duration::try_seconds(seconds)?, CUSTOM_OFFSET_TITLE))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 4, 10, 0, 0).unwrap()
    }

    fn countdown(seconds: i64, rule: ReminderRule) -> Note {
        let mut note = Note::new("1".into(), "Submit report".into(), t0());
        note.has_countdown = true;
        note.countdown_seconds = seconds as u64;
        note.countdown_end_at = Some(t0() + Duration::seconds(seconds));
        note.reminder_rule = rule;
        note
    }

    fn fire_times(triggers: &[Trigger]) -> Vec<(DateTime<Utc>, &'static str)> {
        triggers.iter().map(|t| (t.fire_at, t.title)).collect()
    }

    #[test]
    fn two_hour_countdown_with_hour_reminder() {
        let note = countdown(7200, ReminderRule::OneHourBefore);
        let triggers = derive(&note, t0());

        assert_eq!(
            fire_times(&triggers),
            vec![
                (t0() + Duration::seconds(7200), TIME_UP_TITLE),
                (t0() + Duration::seconds(3600), ONE_HOUR_TITLE),
            ]
        );
        assert!(triggers.iter().all(|t| t.body == "Submit report" && t.note_id == "1"));
    }

    #[test]
    fn short_countdown_drops_past_hour_reminder() {
        let note = countdown(30, ReminderRule::OneHourBefore);
        assert_eq!(
            fire_times(&derive(&note, t0())),
            vec![(t0() + Duration::seconds(30), TIME_UP_TITLE)]
        );
    }

    #[test]
    fn exactly_one_hour_countdown_drops_reminder_at_now() {
        let note = countdown(3600, ReminderRule::OneHourBefore);
        assert_eq!(derive(&note, t0()).len(), 1);
    }

    #[test]
    fn one_day_reminder() {
        let note = countdown(3 * 86_400, ReminderRule::OneDayBefore);
        assert_eq!(
            fire_times(&derive(&note, t0())),
            vec![
                (t0() + Duration::days(3), TIME_UP_TITLE),
                (t0() + Duration::days(2), ONE_DAY_TITLE),
            ]
        );
    }

    #[test]
    fn specific_offset_reminder() {
        let mut note = countdown(600, ReminderRule::SpecificOffsetBefore);
        note.specific_offset_seconds = 120;
        assert_eq!(
            fire_times(&derive(&note, t0())),
            vec![
                (t0() + Duration::seconds(600), TIME_UP_TITLE),
                (t0() + Duration::seconds(480), CUSTOM_OFFSET_TITLE),
            ]
        );
    }

    #[test]
    fn zero_specific_offset_emits_no_reminder() {
        let note = countdown(600, ReminderRule::SpecificOffsetBefore);
        assert_eq!(derive(&note, t0()).len(), 1);
    }

    #[test]
    fn offset_equal_to_duration_is_dropped() {
        let mut note = countdown(600, ReminderRule::SpecificOffsetBefore);
        note.specific_offset_seconds = 600;
        assert_eq!(derive(&note, t0()).len(), 1);
    }

    #[test]
    fn time_up_rule_has_single_trigger() {
        let note = countdown(7200, ReminderRule::TimeUp);
        assert_eq!(derive(&note, t0()).len(), 1);
    }

    #[test]
    fn no_countdown_means_no_triggers_for_any_rule() {
        for rule in [
            ReminderRule::TimeUp,
            ReminderRule::OneHourBefore,
            ReminderRule::OneDayBefore,
            ReminderRule::SpecificOffsetBefore,
        ] {
            let mut note = countdown(90_000, rule);
            note.specific_offset_seconds = 60;
            note.has_countdown = false;
            assert!(derive(&note, t0()).is_empty(), "{rule:?}");
        }
    }

    #[test]
    fn blank_text_means_no_triggers() {
        let mut note = countdown(7200, ReminderRule::OneHourBefore);
        note.fixed_reminder_at = Some(t0() + Duration::hours(5));
        note.text = " \t ".into();
        assert!(derive(&note, t0()).is_empty());
    }

    #[test]
    fn expired_countdown_emits_nothing() {
        let note = countdown(60, ReminderRule::OneHourBefore);
        assert!(derive(&note, t0() + Duration::seconds(60)).is_empty());
    }

    #[test]
    fn fixed_reminder_without_countdown() {
        let mut note = Note::new("9".into(), "Dentist".into(), t0());
        note.fixed_reminder_at = Some(t0() + Duration::days(1));

        let triggers = derive(&note, t0());
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, TriggerKind::Fixed);
        assert_eq!(triggers[0].title, FIXED_REMINDER_TITLE);
    }

    #[test]
    fn fixed_and_relative_reminders_both_fire() {
        let mut note = countdown(7200, ReminderRule::OneHourBefore);
        note.fixed_reminder_at = Some(t0() + Duration::minutes(10));

        let kinds: Vec<TriggerKind> = derive(&note, t0()).iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TriggerKind::TimeUp, TriggerKind::Relative, TriggerKind::Fixed]
        );
    }

    #[test]
    fn past_fixed_reminder_is_dropped() {
        let mut note = Note::new("9".into(), "Dentist".into(), t0());
        note.fixed_reminder_at = Some(t0() - Duration::seconds(1));
        assert!(derive(&note, t0()).is_empty());
    }
}
