//! Mean waiting time between process checkpoints.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;

use crate::{
    dataset::{parse_datetime, Dataset, Value},
    schema::{ColumnRoles, Role},
};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    Ticket,
    Password,
    Gate,
    Invoice,
    Release,
}

impl Checkpoint {
    /// Checkpoints in the order a truck passes them.
    pub const CHAIN: [Checkpoint; 5] = [
        Checkpoint::Ticket,
        Checkpoint::Password,
        Checkpoint::Gate,
        Checkpoint::Invoice,
        Checkpoint::Release,
    ];

    pub fn role(&self) -> Role {
        match self {
            Checkpoint::Ticket => Role::TicketTime,
            Checkpoint::Password => Role::PasswordTime,
            Checkpoint::Gate => Role::GateTime,
            Checkpoint::Invoice => Role::InvoiceTime,
            Checkpoint::Release => Role::ReleaseTime,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::Ticket => "ticket",
            Checkpoint::Password => "password",
            Checkpoint::Gate => "gate",
            Checkpoint::Invoice => "invoice",
            Checkpoint::Release => "release",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapStats {
    pub samples: usize,
    pub mean_secs: f64,
}

impl GapStats {
    pub fn mean_hms(&self) -> String {
        format_hms(self.mean_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapSummary {
    pub from: Checkpoint,
    pub to: Checkpoint,
    /// `None` when a column is missing or no row qualified.
    pub stats: Option<GapStats>,
}

/// Render seconds as `h:mm:ss`, dropping fractions. Negative input renders as zero.
pub fn format_hms(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Mean gap from `from` to `to` over rows where both times are present and
/// the gap lies in `[0, 24h)`. Both times are placed on the row's ticket date.
pub fn mean_gap(
    dataset: &Dataset,
    roles: &ColumnRoles,
    from: Checkpoint,
    to: Checkpoint,
) -> Option<GapStats> {
    let from_idx = dataset.column_index(roles.column(from.role())?)?;
    let to_idx = dataset.column_index(roles.column(to.role())?)?;
    let anchor_idx = roles.anchor_date().and_then(|c| dataset.column_index(c));

    let mut samples = 0usize;
    let mut total = 0.0f64;
    for row in &dataset.rows {
        let date = match anchor_idx {
            Some(j) => match cell_date(&row[j]) {
                Some(d) => d,
                None => continue,
            },
            None => NaiveDate::default(),
        };
        let (start, end) = match (cell_time(&row[from_idx]), cell_time(&row[to_idx])) {
            (Some(a), Some(b)) => (NaiveDateTime::new(date, a), NaiveDateTime::new(date, b)),
            _ => continue,
        };
        let gap = (end - start).num_seconds() as f64;
        if (0.0..SECONDS_PER_DAY).contains(&gap) {
            samples += 1;
            total += gap;
        }
    }

    (samples > 0).then(|| GapStats {
        samples,
        mean_secs: total / samples as f64,
    })
}

/// The four consecutive intervals of [`Checkpoint::CHAIN`].
pub fn checkpoint_summary(dataset: &Dataset, roles: &ColumnRoles) -> Vec<GapSummary> {
    Checkpoint::CHAIN
        .windows(2)
        .map(|pair| GapSummary {
            from: pair[0],
            to: pair[1],
            stats: mean_gap(dataset, roles, pair[0], pair[1]),
        })
        .collect()
}

fn cell_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(dt) => Some(dt.date()),
        Value::Text(s) => parse_datetime(s).map(|dt| dt.date()),
        _ => None,
    }
}

/// Time of day from a date cell, an `HH:MM[:SS]` string or a day fraction.
fn cell_time(value: &Value) -> Option<NaiveTime> {
    let time = match value {
        Value::Date(dt) => Some(dt.time()),
        Value::Text(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
                .or_else(|| parse_datetime(s).map(|dt| dt.time()))
        }
        Value::Number(n) if (0.0..1.0).contains(n) => {
            let secs = (n * SECONDS_PER_DAY).round() as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs.min(86_399), 0)
        }
        _ => None,
    };
    time.map(|t| t.with_nanosecond(0).unwrap_or(t))
}
