use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use serenity::all::UserId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("invalid date range `{0}`, expected YYYY-MM-DD:YYYY-MM-DD with start <= end")]
    InvalidRange(String),
    #[error("the poll is already closed")]
    AlreadyClosed,
}

/// Part of the day a slot button stands for, in intra-day order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Morning,
    Afternoon,
    Evening,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Morning, Period::Afternoon, Period::Evening];

    pub fn name(self) -> &'static str {
        match self {
            Period::Morning => "Morning",
            Period::Afternoon => "Afternoon",
            Period::Evening => "Evening",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Period::Morning => "morning",
            Period::Afternoon => "afternoon",
            Period::Evening => "evening",
        }
    }

    fn from_key(key: &str) -> Option<Period> {
        match key {
            "morning" => Some(Period::Morning),
            "afternoon" => Some(Period::Afternoon),
            "evening" => Some(Period::Evening),
            _ => None,
        }
    }
}

/// One offered time slot. Ordering is chronological, then by period within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub period: Period,
}

impl TimeSlot {
    /// Stable component custom id, round-trips through `parse_custom_id`.
    pub fn custom_id(&self) -> String {
        format!("slot:{}:{}", self.date, self.period.key())
    }

    pub fn parse_custom_id(id: &str) -> Option<TimeSlot> {
        let rest = id.strip_prefix("slot:")?;
        let (date, period) = rest.split_once(':')?;
        Some(TimeSlot {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?,
            period: Period::from_key(period)?,
        })
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d (%A)"), self.period.name())
    }
}

/// Inclusive range of survey dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Parses `YYYY-MM-DD:YYYY-MM-DD`. Rejects malformed dates and start > end.
    pub fn parse(input: &str) -> Result<DateRange, PollError> {
        let invalid = || PollError::InvalidRange(input.to_string());
        let (start, end) = input.split_once(':').ok_or_else(invalid)?;
        let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
        let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
        if start > end {
            return Err(invalid());
        }
        Ok(DateRange { start, end })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }

    /// Expands to one slot per (date, period), chronological then intra-day order.
    pub fn slots(&self) -> Vec<TimeSlot> {
        self.dates()
            .flat_map(|date| Period::ALL.into_iter().map(move |period| TimeSlot { date, period }))
            .collect()
    }
}

/// A slot together with the number of distinct users who picked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedSlot {
    pub slot: TimeSlot,
    pub count: usize,
}

/// Final outcome of one survey, computed once at close from the last snapshot.
///
/// `best`/`second_best` are `None` when nobody selected anything (or only one
/// distinct slot was ever picked). The attendance lists cover exactly the users
/// who made at least one selection; users who never clicked appear in neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    pub ranked: Vec<RankedSlot>,
    pub best: Option<RankedSlot>,
    pub second_best: Option<RankedSlot>,
    pub can_attend_best: Vec<UserId>,
    pub cannot_attend_best: Vec<UserId>,
    pub can_attend_second_best: Vec<UserId>,
    pub cannot_attend_second_best: Vec<UserId>,
}

#[derive(Debug, Default)]
struct PollState {
    selections: HashMap<UserId, BTreeSet<TimeSlot>>,
    closed: bool,
    tallied: bool,
}

/// Owns the lifecycle of one poll: the offered slot grid, the per-user
/// selections while the window is open, and the tally at close.
///
/// `record_selection` may be called from concurrently running interaction
/// tasks; a single coarse mutex over the state is enough at this cardinality.
#[derive(Debug)]
pub struct PollAggregator {
    offered: Vec<TimeSlot>,
    open_for: Duration,
    state: Mutex<PollState>,
}

impl PollAggregator {
    pub fn new(range: DateRange, open_for: Duration) -> Self {
        PollAggregator {
            offered: range.slots(),
            open_for,
            state: Mutex::new(PollState::default()),
        }
    }

    pub fn offered(&self) -> &[TimeSlot] {
        &self.offered
    }

    pub fn open_for(&self) -> Duration {
        self.open_for
    }

    /// Idempotently adds `slot` to the user's selection set.
    ///
    /// Returns the user's current selections (sorted) when the poll is open,
    /// or `None` when the window has closed — late clicks are dropped, not queued.
    pub fn record_selection(&self, user: UserId, slot: TimeSlot) -> Option<Vec<TimeSlot>> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return None;
        }
        let selected = state.selections.entry(user).or_default();
        selected.insert(slot);
        Some(selected.iter().copied().collect())
    }

    /// Stops accepting selections without tallying. Irreversible; a later
    /// `close_and_tally` still reports whatever was collected before the cancel.
    pub fn cancel(&self) {
        self.state.lock().unwrap().closed = true;
    }

    /// Closes the poll and tallies the final snapshot. One-shot: a second call
    /// returns `PollError::AlreadyClosed` instead of recomputing.
    pub fn close_and_tally(&self) -> Result<TallyResult, PollError> {
        let mut state = self.state.lock().unwrap();
        if state.tallied {
            return Err(PollError::AlreadyClosed);
        }
        state.closed = true;
        state.tallied = true;
        Ok(tally(&self.offered, &state.selections))
    }
}

fn tally(offered: &[TimeSlot], selections: &HashMap<UserId, BTreeSet<TimeSlot>>) -> TallyResult {
    let mut ranked: Vec<RankedSlot> = offered
        .iter()
        .map(|&slot| RankedSlot {
            slot,
            count: selections.values().filter(|picked| picked.contains(&slot)).count(),
        })
        .filter(|r| r.count > 0)
        .collect();
    // stable sort: ties keep the chronological order of the offered sequence
    ranked.sort_by(|a, b| b.count.cmp(&a.count));

    let best = ranked.first().copied();
    let second_best = ranked.get(1).copied();

    let (can_attend_best, cannot_attend_best) = partition(selections, best.map(|r| r.slot));
    let (can_attend_second_best, cannot_attend_second_best) =
        partition(selections, second_best.map(|r| r.slot));

    TallyResult {
        ranked,
        best,
        second_best,
        can_attend_best,
        cannot_attend_best,
        can_attend_second_best,
        cannot_attend_second_best,
    }
}

// splits all users who made any selection into those who picked the slot and those who did not
fn partition(
    selections: &HashMap<UserId, BTreeSet<TimeSlot>>,
    slot: Option<TimeSlot>,
) -> (Vec<UserId>, Vec<UserId>) {
    let Some(slot) = slot else {
        return (Vec::new(), Vec::new());
    };
    let mut can = Vec::new();
    let mut cannot = Vec::new();
    for (user, picked) in selections {
        if picked.contains(&slot) {
            can.push(*user);
        } else {
            cannot.push(*user);
        }
    }
    can.sort_unstable();
    cannot.sort_unstable();
    (can, cannot)
}
