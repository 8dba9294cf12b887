use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::models::{Candidate, Direction};

/// Canned column messages shown instead of a departure list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Nothing in either direction within the horizon.
    NoTrains { horizon_minutes: u32 },
    /// Nothing in this column's direction.
    NoDirection(Direction),
    /// Too many consecutive failed polls.
    Reconnecting,
}

impl Placeholder {
    pub fn text(self) -> String {
        match self {
            Placeholder::NoTrains { horizon_minutes } => {
                format!("No trains scheduled next {}m", horizon_minutes)
            }
            Placeholder::NoDirection(direction) => format!("No {} trains", direction.label()),
            Placeholder::Reconnecting => "Reconnecting...".to_string(),
        }
    }
}

/// Where the board's output goes.
///
/// Every hook defaults to a no-op so a target only implements what it can show.
pub trait BoardRenderer: Send + Sync {
    fn render_column(&self, _column: Direction, _candidates: &[Candidate]) {}

    fn render_placeholder(&self, _column: Direction, _placeholder: Placeholder) {}

    /// Live indicator: false while a poll is in flight or failing.
    fn set_live(&self, _live: bool) {}

    fn set_alert(&self, _text: Option<&str>) {}

    /// Publisher clock the rendered minutes were computed against.
    fn set_reference_time(&self, _reference_time: i64) {}

    fn set_degraded(&self, _degraded: bool) {}
}

/// What one board column currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnView {
    Departures { trains: Vec<Candidate> },
    Message { text: String },
}

/// Complete immutable snapshot of the board.
///
/// Published by the update loop via ArcSwap, read lock-free by the web handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardSnapshot {
    pub westbound: ColumnView,
    pub eastbound: ColumnView,
    pub alert: Option<String>,
    pub live: bool,
    pub degraded: bool,
    pub reference_time: i64,
    /// Local epoch seconds of the last column render.
    pub updated_at: i64,
}

impl BoardSnapshot {
    /// Create an empty snapshot for initialization.
    pub fn empty() -> Self {
        let loading = ColumnView::Message {
            text: "Loading...".to_string(),
        };
        BoardSnapshot {
            westbound: loading.clone(),
            eastbound: loading,
            alert: None,
            live: false,
            degraded: false,
            reference_time: 0,
            updated_at: 0,
        }
    }

    fn column_mut(&mut self, direction: Direction) -> &mut ColumnView {
        match direction {
            Direction::West => &mut self.westbound,
            Direction::East => &mut self.eastbound,
        }
    }
}

/// Renders into an in-memory `BoardSnapshot`.
pub struct SnapshotRenderer {
    snapshot: ArcSwap<BoardSnapshot>,
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        SnapshotRenderer {
            snapshot: ArcSwap::from_pointee(BoardSnapshot::empty()),
        }
    }

    pub fn snapshot(&self) -> Arc<BoardSnapshot> {
        self.snapshot.load_full()
    }

    fn update(&self, f: impl Fn(&mut BoardSnapshot)) {
        self.snapshot.rcu(|current| {
            let mut next = BoardSnapshot::clone(current);
            f(&mut next);
            next
        });
    }

    fn set_column(&self, column: Direction, view: ColumnView) {
        let now = chrono::Utc::now().timestamp();
        self.update(|s| {
            *s.column_mut(column) = view.clone();
            s.updated_at = now;
        });
    }
}

impl Default for SnapshotRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardRenderer for SnapshotRenderer {
    fn render_column(&self, column: Direction, candidates: &[Candidate]) {
        self.set_column(
            column,
            ColumnView::Departures {
                trains: candidates.to_vec(),
            },
        );
    }

    fn render_placeholder(&self, column: Direction, placeholder: Placeholder) {
        self.set_column(
            column,
            ColumnView::Message {
                text: placeholder.text(),
            },
        );
    }

    fn set_live(&self, live: bool) {
        self.update(|s| s.live = live);
    }

    fn set_alert(&self, text: Option<&str>) {
        let text = text.map(str::to_string);
        self.update(|s| s.alert = text.clone());
    }

    fn set_reference_time(&self, reference_time: i64) {
        self.update(|s| s.reference_time = reference_time);
    }

    fn set_degraded(&self, degraded: bool) {
        self.update(|s| s.degraded = degraded);
    }
}
