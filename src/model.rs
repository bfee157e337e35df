use chrono::{NaiveTime, Timelike};

/// Cursor movement / stretch direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn delta(self) -> isize {
        match self {
            Direction::Up => -1,
            Direction::Down => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Insert,
    Select,
    Stretch,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Normal => "NOR",
            Mode::Insert => "INS",
            Mode::Select => "SEL",
            Mode::Stretch => "STR",
        }
    }
}

/// A state-machine bug surfaced by the post-event invariant check. Never
/// reachable through clamped input handling; treated as fatal by the caller.
#[derive(thiserror::Error, Debug)]
pub enum InvariantViolation {
    #[error("selected block while editing (selected {selected}, cursor {cursor})")]
    SelectionDuringInsert { selected: usize, cursor: usize },
    #[error("cursor {cursor} out of bounds for {num_blocks} blocks")]
    CursorOutOfBounds { cursor: usize, num_blocks: usize },
    #[error("viewport range must be positive")]
    EmptyViewport,
    #[error("viewport end {vp_end} exceeds {num_blocks} blocks")]
    ViewportOverrun { vp_end: usize, num_blocks: usize },
    #[error("cursor {cursor} outside viewport [{vp_start}, {vp_end})")]
    CursorOutsideViewport {
        cursor: usize,
        vp_start: usize,
        vp_end: usize,
    },
    #[error("span id {id} occupies a non-contiguous run (gap at block {gap})")]
    SpanNotContiguous { id: usize, gap: usize },
}

/// The day grid and everything that mutates it: block labels, span
/// membership, cursor, selection, mode, and the viewport window. Owns no
/// terminal state; the renderer reads it through the accessors below.
#[derive(Debug)]
pub struct Planner {
    labels: Vec<String>,
    spans: Vec<usize>,
    cursor: usize,
    selected: Option<usize>,
    mode: Mode,
    vp_start: usize,
    vp_range: usize,
    clock_block: Option<usize>,
    day_start_hour: u32,
    blocks_per_hour: u32,
}

/// Rows-per-block display density: a terminal of height h shows h/3 blocks.
const VIEWPORT_DIVISOR: usize = 3;

impl Planner {
    pub fn new(hours_in_day: u32, blocks_per_hour: u32, day_start_hour: u32) -> Self {
        let num_blocks = (hours_in_day * blocks_per_hour).max(1) as usize;
        Planner {
            labels: vec![String::new(); num_blocks],
            spans: (0..num_blocks).collect(),
            cursor: 0,
            selected: None,
            mode: Mode::Normal,
            vp_start: 0,
            vp_range: 1,
            clock_block: None,
            day_start_hour,
            blocks_per_hour: blocks_per_hour.max(1),
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, idx: usize) -> &str {
        &self.labels[idx]
    }

    pub fn span_id(&self, idx: usize) -> usize {
        self.spans[idx]
    }

    /// First block of the span containing `idx`.
    pub fn span_head(&self, idx: usize) -> usize {
        self.span_run(self.spans[idx]).0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn vp_start(&self) -> usize {
        self.vp_start
    }

    pub fn vp_end(&self) -> usize {
        (self.vp_start + self.vp_range).min(self.num_blocks())
    }

    pub fn clock_block(&self) -> Option<usize> {
        self.clock_block
    }

    /// Start-of-block time in fractional hours, for display only.
    pub fn block_start_hour(&self, idx: usize) -> f64 {
        f64::from(self.day_start_hour) + idx as f64 / f64::from(self.blocks_per_hour)
    }

    /// Move the cursor one block, clamped at the grid edges. If the block
    /// under the cursor is selected, the move drags it: labels swap and the
    /// selection follows. Span membership is untouched by a drag; a single
    /// dragged block was never stretched.
    pub fn navigate(&mut self, dir: Direction) {
        if self.mode == Mode::Insert {
            return;
        }
        if self.mode == Mode::Stretch {
            self.stretch(dir);
            return;
        }
        let initial = self.cursor;
        self.cursor = clamp_index(initial as isize + dir.delta(), self.num_blocks());
        if self.selected == Some(initial) {
            self.labels.swap(initial, self.cursor);
            self.selected = Some(self.cursor);
        }
        self.adjust_vp_start();
    }

    /// Grow the span under the cursor by one block in `dir`. The absorbed
    /// neighbor loses its old membership (last writer wins at the boundary),
    /// which truncates an adjacent multi-block span by one element. Labels
    /// never change here.
    fn stretch(&mut self, dir: Direction) {
        let id = self.spans[self.cursor];
        let (mut start, mut end) = self.span_run(id);
        match dir {
            Direction::Up => {
                if start > 0 {
                    start -= 1;
                }
                self.cursor = start;
            }
            Direction::Down => {
                if end + 1 < self.num_blocks() {
                    end += 1;
                }
                self.cursor = end;
            }
        }
        if self.spans[self.cursor] != id {
            tracing::debug!(
                absorbed = self.cursor,
                from_span = self.spans[self.cursor],
                into_span = id,
                "stretch truncated neighboring span"
            );
        }
        for slot in &mut self.spans[start..=end] {
            *slot = id;
        }
        self.adjust_vp_start();
    }

    /// Toggle the "picked up" marker on the block under the cursor, entering
    /// or leaving Select mode with it.
    pub fn toggle_select(&mut self) {
        if self.mode == Mode::Insert {
            return;
        }
        if self.selected == Some(self.cursor) {
            self.selected = None;
            self.mode = Mode::Normal;
        } else {
            self.selected = Some(self.cursor);
            self.mode = Mode::Select;
        }
    }

    /// Enter Insert mode and hand back the label the editor should be seeded
    /// with. Clears any selection first so the Selection/Insert exclusion
    /// can never be violated by this transition.
    pub fn enter_insert(&mut self) -> &str {
        self.selected = None;
        self.mode = Mode::Insert;
        &self.labels[self.cursor]
    }

    /// Commit the editor's text into the focused block and return to Normal.
    pub fn commit_insert(&mut self, text: String) {
        self.labels[self.cursor] = text;
        self.mode = Mode::Normal;
    }

    pub fn toggle_stretch(&mut self) {
        match self.mode {
            Mode::Insert => {}
            Mode::Stretch => self.mode = Mode::Normal,
            _ => self.mode = Mode::Stretch,
        }
    }

    /// Drop back to Normal mode, clearing any selection. Insert mode is
    /// handled by the caller via `commit_insert` since the committed text
    /// lives in the editor widget.
    pub fn escape(&mut self) {
        self.selected = None;
        self.mode = Mode::Normal;
    }

    /// Recompute how many blocks fit in a terminal of the given height and
    /// reclamp the window around the cursor.
    pub fn resize(&mut self, height: u16) {
        self.vp_range = (height as usize / VIEWPORT_DIVISOR).max(1);
        self.adjust_vp_start();
    }

    /// Project the wall clock onto a block index, for highlighting only.
    pub fn clock_tick(&mut self, now: NaiveTime) {
        let hour = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
        let offset = (hour - f64::from(self.day_start_hour)) * f64::from(self.blocks_per_hour);
        self.clock_block = if offset < 0.0 {
            None
        } else {
            let idx = offset as usize;
            (idx < self.num_blocks()).then_some(idx)
        };
    }

    /// Minimal scroll keeping the cursor inside `[vp_start, vp_end)`.
    fn adjust_vp_start(&mut self) {
        if self.cursor < self.vp_start {
            self.vp_start = self.cursor;
        } else if self.cursor >= self.vp_end().saturating_sub(1) {
            let old = self.vp_start;
            self.vp_start = (self.cursor + 1).saturating_sub(self.vp_range);
            if self.vp_start != old {
                tracing::debug!(
                    cursor = self.cursor,
                    vp_start = self.vp_start,
                    vp_range = self.vp_range,
                    "viewport scrolled down"
                );
            }
        }
    }

    /// Contiguous run `[start, end]` of blocks sharing span `id`. A linear
    /// scan; N is small and fixed.
    fn span_run(&self, id: usize) -> (usize, usize) {
        let mut start = self.num_blocks();
        let mut end = 0;
        for (i, &s) in self.spans.iter().enumerate() {
            if s == id {
                start = start.min(i);
                end = i;
            }
        }
        (start, end)
    }

    /// Validate the state after an event. Any failure is a logic defect in
    /// the planner itself, not a user-facing condition; the event loop
    /// aborts on it with this state attached for diagnosis.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if let Some(selected) = self.selected {
            if self.mode == Mode::Insert {
                return Err(InvariantViolation::SelectionDuringInsert {
                    selected,
                    cursor: self.cursor,
                });
            }
        }
        if self.cursor >= self.num_blocks() {
            return Err(InvariantViolation::CursorOutOfBounds {
                cursor: self.cursor,
                num_blocks: self.num_blocks(),
            });
        }
        if self.vp_range == 0 {
            return Err(InvariantViolation::EmptyViewport);
        }
        if self.vp_end() > self.num_blocks() {
            return Err(InvariantViolation::ViewportOverrun {
                vp_end: self.vp_end(),
                num_blocks: self.num_blocks(),
            });
        }
        if self.cursor < self.vp_start || self.cursor >= self.vp_end() {
            return Err(InvariantViolation::CursorOutsideViewport {
                cursor: self.cursor,
                vp_start: self.vp_start,
                vp_end: self.vp_end(),
            });
        }
        for id in self.spans.iter().copied() {
            let (start, end) = self.span_run(id);
            if let Some(gap) = (start..=end).find(|&i| self.spans[i] != id) {
                return Err(InvariantViolation::SpanNotContiguous { id, gap });
            }
        }
        Ok(())
    }
}

fn clamp_index(pos: isize, len: usize) -> usize {
    pos.clamp(0, len.saturating_sub(1) as isize) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(blocks: usize) -> Planner {
        let mut p = Planner::new(blocks as u32, 1, 9);
        p.resize(3 * blocks as u16); // whole grid visible
        p
    }

    fn assert_valid(p: &Planner) {
        if let Err(violation) = p.check_invariants() {
            panic!("invariant violated: {violation}\n{p:#?}");
        }
    }

    #[test]
    fn cursor_clamps_at_grid_edges() {
        let mut p = planner(4);
        p.navigate(Direction::Up);
        assert_eq!(p.cursor(), 0);
        for _ in 0..10 {
            p.navigate(Direction::Down);
        }
        assert_eq!(p.cursor(), 3);
        assert_valid(&p);
    }

    #[test]
    fn drag_move_swaps_labels_and_selection() {
        let mut p = planner(8);
        p.commit_insert("standup".into());
        p.toggle_select();
        assert_eq!(p.selected(), Some(0));
        assert_eq!(p.mode(), Mode::Select);

        p.navigate(Direction::Down);
        assert_eq!(p.cursor(), 1);
        assert_eq!(p.label(0), "");
        assert_eq!(p.label(1), "standup");
        assert_eq!(p.selected(), Some(1));

        p.escape();
        assert_eq!(p.selected(), None);
        assert_eq!(p.mode(), Mode::Normal);
        assert_valid(&p);
    }

    #[test]
    fn drag_move_leaves_spans_alone() {
        let mut p = planner(8);
        p.toggle_select();
        p.navigate(Direction::Down);
        assert_eq!(p.span_id(0), 0);
        assert_eq!(p.span_id(1), 1);
    }

    #[test]
    fn drag_at_edge_is_a_no_op() {
        let mut p = planner(4);
        p.commit_insert("coffee".into());
        p.toggle_select();
        p.navigate(Direction::Up);
        assert_eq!(p.cursor(), 0);
        assert_eq!(p.label(0), "coffee");
        assert_eq!(p.selected(), Some(0));
    }

    #[test]
    fn toggle_select_twice_returns_to_normal() {
        let mut p = planner(8);
        p.toggle_select();
        p.toggle_select();
        assert_eq!(p.selected(), None);
        assert_eq!(p.mode(), Mode::Normal);
    }

    #[test]
    fn entering_insert_clears_selection() {
        let mut p = planner(8);
        p.toggle_select();
        let seed = p.enter_insert().to_string();
        assert_eq!(seed, "");
        assert_eq!(p.selected(), None);
        assert_eq!(p.mode(), Mode::Insert);
        assert_valid(&p);
    }

    #[test]
    fn navigation_is_suppressed_in_insert_mode() {
        let mut p = planner(8);
        p.enter_insert();
        p.navigate(Direction::Down);
        assert_eq!(p.cursor(), 0);
    }

    #[test]
    fn commit_insert_writes_label_and_exits() {
        let mut p = planner(8);
        p.enter_insert();
        p.commit_insert("review PRs".into());
        assert_eq!(p.label(0), "review PRs");
        assert_eq!(p.mode(), Mode::Normal);
    }

    #[test]
    fn stretch_down_absorbs_next_block() {
        let mut p = planner(8);
        for _ in 0..3 {
            p.navigate(Direction::Down);
        }
        p.toggle_stretch();
        p.navigate(Direction::Down);
        assert_eq!(p.span_id(3), 3);
        assert_eq!(p.span_id(4), 3);
        assert_eq!(p.cursor(), 4);
        assert_valid(&p);
    }

    #[test]
    fn stretch_up_pins_cursor_at_grid_edge() {
        let mut p = planner(8);
        p.toggle_stretch();
        p.navigate(Direction::Up);
        assert_eq!(p.cursor(), 0);
        assert_eq!(p.span_id(0), 0);
        assert_valid(&p);
    }

    #[test]
    fn stretch_truncates_neighboring_span() {
        let mut p = planner(8);
        // grow span 2 over blocks 2..=4
        p.navigate(Direction::Down);
        p.navigate(Direction::Down);
        p.toggle_stretch();
        p.navigate(Direction::Down);
        p.navigate(Direction::Down);
        assert_eq!(p.span_id(4), 2);
        p.toggle_stretch();

        // grow span 5 upward; it steals block 4 from span 2
        p.navigate(Direction::Down);
        assert_eq!(p.cursor(), 5);
        p.toggle_stretch();
        p.navigate(Direction::Up);
        assert_eq!(p.span_id(4), 5);
        assert_eq!(p.span_id(3), 2);
        assert_eq!(p.span_id(2), 2);
        assert_valid(&p);
    }

    #[test]
    fn spans_stay_contiguous_under_repeated_stretching() {
        let mut p = planner(8);
        p.toggle_stretch();
        let moves = [
            Direction::Down,
            Direction::Down,
            Direction::Up,
            Direction::Down,
            Direction::Down,
            Direction::Up,
            Direction::Up,
            Direction::Down,
        ];
        for dir in moves {
            p.navigate(dir);
            assert_valid(&p);
        }
    }

    #[test]
    fn stretch_never_touches_labels() {
        let mut p = planner(8);
        p.commit_insert("deep work".into());
        p.toggle_stretch();
        p.navigate(Direction::Down);
        p.navigate(Direction::Down);
        assert_eq!(p.label(0), "deep work");
        assert_eq!(p.label(1), "");
        assert_eq!(p.label(2), "");
    }

    #[test]
    fn exiting_stretch_leaves_spans_in_place() {
        let mut p = planner(8);
        p.toggle_stretch();
        p.navigate(Direction::Down);
        p.toggle_stretch();
        assert_eq!(p.mode(), Mode::Normal);
        assert_eq!(p.span_id(1), 0);
    }

    #[test]
    fn span_head_points_at_first_block_of_run() {
        let mut p = planner(8);
        p.toggle_stretch();
        p.navigate(Direction::Down);
        p.navigate(Direction::Down);
        assert_eq!(p.span_head(2), 0);
        assert_eq!(p.span_head(0), 0);
        assert_eq!(p.span_head(3), 3);
    }

    #[test]
    fn resize_derives_viewport_range_from_height() {
        let mut p = Planner::new(24, 1, 9);
        p.resize(30);
        assert_eq!(p.vp_end(), 10);
        p.resize(2);
        assert_eq!(p.vp_end() - p.vp_start(), 1);
        assert_valid(&p);
    }

    #[test]
    fn viewport_follows_cursor_down_minimally() {
        let mut p = Planner::new(24, 1, 9);
        p.resize(30); // vp_range = 10
        for _ in 0..15 {
            p.navigate(Direction::Down);
        }
        assert_eq!(p.cursor(), 15);
        assert_eq!(p.vp_start(), 6);
        assert_valid(&p);
    }

    #[test]
    fn viewport_follows_cursor_back_up() {
        let mut p = Planner::new(24, 1, 9);
        p.resize(30);
        for _ in 0..15 {
            p.navigate(Direction::Down);
        }
        for _ in 0..15 {
            p.navigate(Direction::Up);
        }
        assert_eq!(p.cursor(), 0);
        assert_eq!(p.vp_start(), 0);
        assert_valid(&p);
    }

    #[test]
    fn viewport_moves_at_most_one_block_per_step() {
        let mut p = Planner::new(24, 1, 9);
        p.resize(30);
        let mut prev = p.vp_start();
        for _ in 0..23 {
            p.navigate(Direction::Down);
            assert!(p.vp_start().saturating_sub(prev) <= 1);
            prev = p.vp_start();
            assert_valid(&p);
        }
    }

    #[test]
    fn clock_projects_into_the_grid() {
        let mut p = Planner::new(8, 2, 9);
        p.clock_tick(NaiveTime::from_hms_opt(9, 40, 0).unwrap());
        assert_eq!(p.clock_block(), Some(1));
        p.clock_tick(NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(p.clock_block(), None);
        p.clock_tick(NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        assert_eq!(p.clock_block(), None);
    }

    #[test]
    fn block_start_hour_tracks_resolution() {
        let p = Planner::new(8, 2, 9);
        assert_eq!(p.block_start_hour(0), 9.0);
        assert_eq!(p.block_start_hour(3), 10.5);
    }

    #[test]
    fn checker_flags_non_contiguous_spans() {
        let mut p = planner(4);
        p.spans = vec![0, 1, 0, 3];
        assert!(matches!(
            p.check_invariants(),
            Err(InvariantViolation::SpanNotContiguous { id: 0, gap: 1 })
        ));
    }

    #[test]
    fn checker_flags_empty_viewport() {
        let mut p = planner(4);
        p.vp_range = 0;
        assert!(matches!(
            p.check_invariants(),
            Err(InvariantViolation::EmptyViewport)
        ));
    }

    #[test]
    fn checker_flags_selection_during_insert() {
        let mut p = planner(4);
        p.selected = Some(0);
        p.mode = Mode::Insert;
        assert!(matches!(
            p.check_invariants(),
            Err(InvariantViolation::SelectionDuringInsert { .. })
        ));
    }
}
