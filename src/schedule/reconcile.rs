//! 对账：清空调度器，再按当前全部便签重新提交
//!
//! 调度器没有按条目取消的能力，所以每次变更都整体重建。

use chrono::{DateTime, Utc};

use super::derive::derive;
use crate::models::Note;
use crate::notify::Dispatcher;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub submitted: usize,
    /// 取整后不足一秒而未提交的触发
    pub dropped: usize,
}

pub struct Reconciler<D> {
    dispatcher: D,
}

impl<D: Dispatcher> Reconciler<D> {
    pub fn new(dispatcher: D) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn reconcile(&self, notes: &[Note], now: DateTime<Utc>) -> ReconcileSummary {
        self.dispatcher.clear_all();

        let mut summary = ReconcileSummary::default();
        for trigger in notes.iter().flat_map(|note| derive(note, now)) {
            let fire_in_seconds = (trigger.fire_at - now).num_seconds();
            if fire_in_seconds <= 0 {
                summary.dropped += 1;
                continue;
            }
            tracing::debug!(
                "Scheduling {:?} for note {} in {}s",
                trigger.kind,
                trigger.note_id,
                fire_in_seconds
            );
            self.dispatcher
                .schedule_at(fire_in_seconds.unsigned_abs(), trigger.title, &trigger.body);
            summary.submitted += 1;
        }

        tracing::info!(
            "Reconciled {} notes: {} scheduled, {} dropped",
            notes.len(),
            summary.submitted,
            summary.dropped
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderRule;
    use crate::notify::recording::{DispatchCall, RecordingDispatcher};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 18, 0, 0).unwrap()
    }

    fn note(id: &str, text: &str, seconds: i64, rule: ReminderRule) -> Note {
        let mut note = Note::new(id.into(), text.into(), t0());
        note.has_countdown = true;
        note.countdown_seconds = seconds as u64;
        note.countdown_end_at = Some(t0() + Duration::seconds(seconds));
        note.reminder_rule = rule;
        note
    }

    #[test]
    fn clears_then_submits_every_trigger() {
        let reconciler = Reconciler::new(RecordingDispatcher::default());
        let notes = vec![
            note("1", "Oven", 7200, ReminderRule::OneHourBefore),
            note("2", "Parking", 900, ReminderRule::TimeUp),
        ];

        let summary = reconciler.reconcile(&notes, t0());

        assert_eq!(summary, ReconcileSummary { submitted: 3, dropped: 0 });
        assert_eq!(
            reconciler.dispatcher().calls(),
            vec![
                DispatchCall::ClearAll,
                DispatchCall::schedule(7200, "Time is up!", "Oven"),
                DispatchCall::schedule(3600, "1 hour left!", "Oven"),
                DispatchCall::schedule(900, "Time is up!", "Parking"),
            ]
        );
    }

    #[test]
    fn fractional_second_is_floored_and_sub_second_dropped() {
        let reconciler = Reconciler::new(RecordingDispatcher::default());
        let now = t0() + Duration::milliseconds(899_500);
        let notes = vec![note("2", "Parking", 900, ReminderRule::TimeUp)];

        let summary = reconciler.reconcile(&notes, now);
        assert_eq!(summary, ReconcileSummary { submitted: 0, dropped: 1 });
        assert_eq!(reconciler.dispatcher().calls(), vec![DispatchCall::ClearAll]);

        reconciler.dispatcher().reset();
        reconciler.reconcile(&notes, t0() + Duration::milliseconds(500));
        assert_eq!(
            reconciler.dispatcher().calls(),
            vec![
                DispatchCall::ClearAll,
                DispatchCall::schedule(899, "Time is up!", "Parking"),
            ]
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let reconciler = Reconciler::new(RecordingDispatcher::default());
        let notes = vec![note("1", "Oven", 7200, ReminderRule::OneHourBefore)];

        reconciler.reconcile(&notes, t0());
        let first = reconciler.dispatcher().calls();
        reconciler.dispatcher().reset();
        reconciler.reconcile(&notes, t0());

        assert_eq!(reconciler.dispatcher().calls(), first);
    }

    #[test]
    fn deleted_note_leaves_no_trace() {
        let reconciler = Reconciler::new(RecordingDispatcher::default());
        let mut notes = vec![
            note("1", "Oven", 7200, ReminderRule::OneHourBefore),
            note("2", "Parking", 900, ReminderRule::TimeUp),
        ];
        reconciler.reconcile(&notes, t0());

        notes.retain(|n| n.id != "1");
        reconciler.dispatcher().reset();
        reconciler.reconcile(&notes, t0());

        let calls = reconciler.dispatcher().calls();
        assert_eq!(calls.first(), Some(&DispatchCall::ClearAll));
        assert!(calls.iter().all(|call| match call {
            DispatchCall::Schedule { body, .. } => body != "Oven",
            DispatchCall::ClearAll => true,
        }));
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn empty_note_set_only_clears() {
        let reconciler = Reconciler::new(RecordingDispatcher::default());
        let summary = reconciler.reconcile(&[], t0());
        assert_eq!(summary, ReconcileSummary::default());
        assert_eq!(reconciler.dispatcher().calls(), vec![DispatchCall::ClearAll]);
    }
}
