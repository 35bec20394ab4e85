//! 提醒调度

mod derive;
mod reconcile;

pub use derive::{
    derive, CUSTOM_OFFSET_TITLE, FIXED_REMINDER_TITLE, ONE_DAY_TITLE, ONE_HOUR_TITLE,
    TIME_UP_TITLE,
};
pub use reconcile::{ReconcileSummary, Reconciler};
