//! Keeps the highlighted row inside the visible window of a result list.

/// Rows taken by the overlay chrome: two border rows, the search box, and the separator.
pub const RESERVED_ROWS: usize = 4;

/// Selected row and first visible row of a result list.
///
/// For a non-empty list, `start <= highlight <= start + visible - 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub highlight: usize,
    pub start: usize,
}

impl Viewport {
    /// Number of result rows that fit on screen.
    pub fn visible_count(available_rows: usize, reserved_rows: usize, count: usize) -> usize {
        available_rows.saturating_sub(reserved_rows).min(count)
    }

    /// Select the next row, scrolling one row when it leaves the window.
    pub fn move_down(&mut self, count: usize, visible: usize) {
        if count == 0 {
            *self = Self::default();
            return;
        }
        let visible = visible.max(1);
        self.highlight = (self.highlight + 1).min(count - 1);
        if self.highlight >= self.start + visible {
            self.start = self.highlight + 1 - visible;
        }
    }

    /// Select the previous row.
    ///
    /// Reaching the top visible row scrolls up one row, so the row above the
    /// selection stays in view.
    pub fn move_up(&mut self, count: usize, visible: usize) {
        if count == 0 {
            *self = Self::default();
            return;
        }
        if self.start + 1 == self.highlight {
            self.start = self.start.saturating_sub(1);
        }
        self.highlight = self.highlight.saturating_sub(1);
        self.clamp(count, visible);
    }

    /// Position anchored to the editor cursor.
    ///
    /// `lines` holds the original line index of each result, in result order.
    /// The first result at or after `current_line` is selected, and the window
    /// starts far enough above it to mirror where the cursor sat in the editor.
    pub fn anchored(
        lines: &[usize],
        current_line: usize,
        scroll_fraction: f64,
        available_rows: usize,
        visible: usize,
    ) -> Self {
        if lines.is_empty() {
            return Self::default();
        }
        let highlight = lines
            .iter()
            .position(|&line| line >= current_line)
            .unwrap_or(lines.len() - 1);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let offset = (scroll_fraction.max(0.0) * available_rows as f64).ceil() as usize;
        let mut view = Self {
            highlight,
            start: highlight.saturating_sub(offset),
        };
        view.clamp(lines.len(), visible);
        view
    }

    /// Restore the invariant after the list or the window changed size.
    pub fn clamp(&mut self, count: usize, visible: usize) {
        if count == 0 {
            *self = Self::default();
            return;
        }
        let visible = visible.max(1);
        self.highlight = self.highlight.min(count - 1);
        if self.start > self.highlight {
            self.start = self.highlight;
        }
        if self.highlight >= self.start + visible {
            self.start = self.highlight + 1 - visible;
        }
    }

    /// Index range of the rows to draw.
    pub fn window(&self, count: usize, visible: usize) -> std::ops::Range<usize> {
        let start = self.start.min(count);
        start..(start + visible).min(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holds_invariant(view: Viewport, count: usize, visible: usize) -> bool {
        count == 0
            || (view.start <= view.highlight && view.highlight < view.start + visible.max(1))
    }

    #[test]
    fn scrolls_one_row_past_the_bottom_edge() {
        let mut view = Viewport::default();
        for _ in 0..4 {
            view.move_down(10, 5);
        }
        assert_eq!(view, Viewport { highlight: 4, start: 0 });
        view.move_down(10, 5);
        assert_eq!(view, Viewport { highlight: 5, start: 1 });
    }

    #[test]
    fn stops_at_the_last_row() {
        let mut view = Viewport::default();
        for _ in 0..20 {
            view.move_down(10, 5);
            assert!(holds_invariant(view, 10, 5));
        }
        assert_eq!(view, Viewport { highlight: 9, start: 5 });
    }

    #[test]
    fn moving_onto_the_top_row_scrolls_up_one() {
        let mut view = Viewport { highlight: 5, start: 4 };
        view.move_up(10, 5);
        assert_eq!(view, Viewport { highlight: 4, start: 3 });
        view.move_up(10, 5);
        assert_eq!(view, Viewport { highlight: 3, start: 2 });
    }

    #[test]
    fn moving_onto_the_first_row_stays_at_origin() {
        let mut view = Viewport { highlight: 1, start: 0 };
        view.move_up(10, 5);
        assert_eq!(view, Viewport::default());
    }

    #[test]
    fn moving_up_inside_the_window_keeps_start() {
        let mut view = Viewport { highlight: 7, start: 4 };
        view.move_up(10, 5);
        assert_eq!(view, Viewport { highlight: 6, start: 4 });
    }

    #[test]
    fn scrolls_back_up_to_the_origin() {
        let mut view = Viewport { highlight: 5, start: 5 };
        view.move_up(10, 5);
        assert_eq!(view, Viewport { highlight: 4, start: 4 });
        for _ in 0..10 {
            view.move_up(10, 5);
            assert!(holds_invariant(view, 10, 5));
        }
        assert_eq!(view, Viewport::default());
    }

    #[test]
    fn single_row_window_follows_the_highlight_up() {
        let mut view = Viewport { highlight: 3, start: 3 };
        view.move_up(10, 1);
        assert_eq!(view, Viewport { highlight: 2, start: 2 });
        let mut view = Viewport { highlight: 3, start: 2 };
        view.move_up(10, 1);
        assert!(holds_invariant(view, 10, 1));
    }

    #[test]
    fn empty_list_pins_to_origin() {
        let mut view = Viewport { highlight: 3, start: 2 };
        view.move_down(0, 5);
        assert_eq!(view, Viewport::default());
        assert_eq!(Viewport::anchored(&[], 10, 0.5, 30, 0), Viewport::default());
    }

    #[test]
    fn visible_count_subtracts_chrome() {
        assert_eq!(Viewport::visible_count(24, RESERVED_ROWS, 100), 20);
        assert_eq!(Viewport::visible_count(24, RESERVED_ROWS, 3), 3);
        assert_eq!(Viewport::visible_count(2, RESERVED_ROWS, 3), 0);
    }

    #[test]
    fn anchored_selects_first_line_at_or_after_cursor() {
        let lines = [2, 7, 11, 40];
        let view = Viewport::anchored(&lines, 8, 0.0, 30, 4);
        assert_eq!(view.highlight, 2);
        assert_eq!(view.start, 2);
    }

    #[test]
    fn anchored_mirrors_editor_scroll_position() {
        let lines: Vec<usize> = (0..100).collect();
        let view = Viewport::anchored(&lines, 50, 0.5, 20, 16);
        assert_eq!(view, Viewport { highlight: 50, start: 40 });
    }

    #[test]
    fn anchored_keeps_highlight_on_screen() {
        let lines: Vec<usize> = (0..100).collect();
        let view = Viewport::anchored(&lines, 50, 1.0, 30, 10);
        assert_eq!(view, Viewport { highlight: 50, start: 41 });
        assert!(holds_invariant(view, 100, 10));
    }

    #[test]
    fn anchored_falls_back_to_last_result() {
        let view = Viewport::anchored(&[1, 2, 3], 90, 0.0, 30, 3);
        assert_eq!(view.highlight, 2);
    }

    #[test]
    fn window_bounds_rows_to_draw() {
        let view = Viewport { highlight: 6, start: 4 };
        assert_eq!(view.window(8, 5), 4..8);
        assert_eq!(view.window(20, 5), 4..9);
    }
}
