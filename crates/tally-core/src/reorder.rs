use tracing::debug;

use crate::task::TaskId;

/// A completed drag gesture, ready for `TaskStore::move_before`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reorder {
    pub source: TaskId,
    pub target: TaskId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DragState {
    #[default]
    Idle,
    Dragging {
        source: TaskId,
    },
}

/// State machine over a drag gesture. It never touches the store itself; it
/// only turns gesture events into at most one `Reorder` command, so the whole
/// thing is testable without any display layer. Ids are resolved against the
/// full collection, never against the filtered view's visual positions.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Gesture started over the row for `source`.
    pub fn gesture_start(&mut self, source: TaskId) {
        debug!(%source, "drag started");
        self.state = DragState::Dragging { source };
    }

    /// Gesture is hovering over a row. Returns true while a drag is pending,
    /// which the caller uses to accept the row as a drop target instead of
    /// letting the default (incompatible) handling run.
    pub fn gesture_over(&mut self, _over: TaskId) -> bool {
        self.is_dragging()
    }

    /// Drop over the row for `target`. Yields a command when a drag was
    /// pending and the target differs from the source; the pending source is
    /// cleared either way.
    pub fn drop_on(&mut self, target: TaskId) -> Option<Reorder> {
        let DragState::Dragging { source } = self.state else {
            return None;
        };
        self.state = DragState::Idle;

        if source == target {
            debug!(%source, "dropped on itself; nothing to do");
            return None;
        }

        debug!(%source, %target, "drop produced reorder");
        Some(Reorder { source, target })
    }

    /// Gesture ended without a drop.
    pub fn cancel(&mut self) {
        if self.is_dragging() {
            debug!("drag cancelled");
        }
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_on_other_row_yields_reorder() {
        let a = TaskId::new();
        let b = TaskId::new();

        let mut drag = DragController::new();
        drag.gesture_start(a);
        assert!(drag.gesture_over(b));

        let cmd = drag.drop_on(b).expect("reorder command");
        assert_eq!(cmd, Reorder { source: a, target: b });
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drop_on_source_row_is_discarded() {
        let a = TaskId::new();

        let mut drag = DragController::new();
        drag.gesture_start(a);
        assert!(drag.drop_on(a).is_none());
        assert!(!drag.is_dragging());
    }

    #[test]
    fn drop_without_drag_is_ignored() {
        let mut drag = DragController::new();
        assert!(!drag.gesture_over(TaskId::new()));
        assert!(drag.drop_on(TaskId::new()).is_none());
    }

    #[test]
    fn cancel_clears_pending_source() {
        let a = TaskId::new();
        let b = TaskId::new();

        let mut drag = DragController::new();
        drag.gesture_start(a);
        drag.cancel();
        assert!(!drag.is_dragging());
        assert!(drag.drop_on(b).is_none());
    }

    #[test]
    fn restarting_replaces_the_source() {
        let a = TaskId::new();
        let b = TaskId::new();
        let c = TaskId::new();

        let mut drag = DragController::new();
        drag.gesture_start(a);
        drag.gesture_start(b);
        let cmd = drag.drop_on(c).expect("reorder command");
        assert_eq!(cmd.source, b);
    }
}
