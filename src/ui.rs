use crate::config::{Config, Theme};
use crate::model::{Direction, Mode, Planner};
use anyhow::{anyhow, Result};
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction as LayoutDirection, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::Duration;

pub fn run(config: Config) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(config);
    let size = terminal.size()?;
    app.handle_resize(size.width, size.height);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    planner: Planner,
    editor: LabelEditor,
    styles: Styles,
    workday_end: usize,
}

/// One-line text field for authoring a block label. Byte-indexed cursor,
/// char-stepped movement.
#[derive(Default)]
struct LabelEditor {
    value: String,
    cursor: usize,
}

struct Styles {
    normal_block: Style,
    current_block: Style,
    selected_block: Style,
    workday_block: Style,
    past_block: Style,
    title: Style,
}

impl App {
    fn new(config: Config) -> Self {
        let planner = Planner::new(
            config.hours_in_day,
            config.blocks_per_hour,
            config.day_start_hour,
        );
        let workday_end = (config.day_length_hours * config.blocks_per_hour) as usize;
        App {
            planner,
            editor: LabelEditor::default(),
            styles: Styles::from_theme(&config.theme),
            workday_end,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        self.tick_clock();
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::Resize(width, height) => {
                        self.handle_resize(width, height);
                        self.check()?;
                    }
                    _ => {}
                }
            } else {
                self.tick_clock();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(true);
        }
        let quit = match self.planner.mode() {
            Mode::Insert => self.handle_insert_key(key),
            _ => self.handle_normal_key(key),
        };
        self.check()?;
        Ok(quit)
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Up | KeyCode::Char('k') => self.planner.navigate(Direction::Up),
            KeyCode::Down | KeyCode::Char('j') => self.planner.navigate(Direction::Down),
            KeyCode::Enter => self.planner.toggle_select(),
            KeyCode::Char('i') => {
                let seed = self.planner.enter_insert().to_string();
                self.editor.seed(&seed);
            }
            KeyCode::Char('v') => self.planner.toggle_stretch(),
            KeyCode::Esc => self.planner.escape(),
            _ => {}
        }
        false
    }

    fn handle_insert_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                let text = self.editor.take();
                self.planner.commit_insert(text);
            }
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Backspace => self.editor.backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.editor.insert_char(c);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_resize(&mut self, width: u16, height: u16) {
        tracing::debug!(width, height, "window resized");
        self.planner.resize(height);
    }

    fn tick_clock(&mut self) {
        self.planner.clock_tick(Local::now().time());
    }

    /// Post-event invariant gate. A failure here is a planner bug; bubble
    /// it up with the full state so the loop tears down and exits non-zero.
    fn check(&self) -> Result<()> {
        self.planner
            .check_invariants()
            .map_err(|violation| anyhow!("{violation}\nplanner state: {:#?}", self.planner))
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(2),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_blocks(f, layout[1]);
        self.draw_footer(f, layout[2]);
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(" Schedule ", self.styles.title),
            Span::raw("  "),
            Span::styled(
                Local::now().format("%A %B %-d").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(title), area);
    }

    fn draw_blocks(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines = Vec::new();
        for i in self.planner.vp_start()..self.planner.vp_end() {
            lines.push(Line::from(""));
            lines.push(self.block_line(i));
        }
        f.render_widget(Paragraph::new(lines), area);
    }

    fn block_line(&self, i: usize) -> Line<'static> {
        let cursor_indicator = if self.planner.cursor() == i { ">" } else { " " };
        let joined_above = i > 0 && self.planner.span_id(i - 1) == self.planner.span_id(i);
        let span_marker = if joined_above { "│" } else { " " };

        let style = self.block_style(i);
        let time = format_block_hour(self.planner.block_start_hour(i));

        let mut spans = vec![
            Span::styled(format!("{:>9} ", time), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{}{} ", cursor_indicator, span_marker), style),
        ];
        if self.planner.mode() == Mode::Insert && self.planner.cursor() == i {
            spans.push(Span::styled(self.editor.with_caret(), style));
        } else {
            spans.push(Span::styled(self.planner.label(i).to_string(), style));
        }
        Line::from(spans)
    }

    /// Highlight precedence: selected > current time > workday band > past.
    fn block_style(&self, i: usize) -> Style {
        if self.planner.selected() == Some(i) {
            return self.styles.selected_block;
        }
        if self.planner.clock_block() == Some(i) {
            return self.styles.current_block;
        }
        if i < self.workday_end {
            return self.styles.workday_block;
        }
        if self
            .planner
            .clock_block()
            .is_some_and(|current| i < current)
        {
            return self.styles.past_block;
        }
        self.styles.normal_block
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(LayoutDirection::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);

        let help = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help, rows[0]);

        let status = Line::from(vec![
            Span::styled(
                format!(" {} ", self.planner.mode().label()),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "  block {}/{}  window [{}, {})",
                    self.planner.cursor() + 1,
                    self.planner.num_blocks(),
                    self.planner.vp_start(),
                    self.planner.vp_end(),
                ),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        f.render_widget(Paragraph::new(status), rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let spans = match self.planner.mode() {
            Mode::Insert => vec![
                Span::styled("Esc", Style::default().fg(Color::LightYellow)),
                Span::raw(" save label  "),
                Span::styled("←→", Style::default().fg(Color::LightCyan)),
                Span::raw(" move caret"),
            ],
            Mode::Stretch => vec![
                Span::styled("↑↓ / k j", Style::default().fg(Color::LightCyan)),
                Span::raw(" stretch span  "),
                Span::styled("v/Esc", Style::default().fg(Color::LightYellow)),
                Span::raw(" done  "),
                Span::styled("q", Style::default().fg(Color::LightRed)),
                Span::raw(" quit"),
            ],
            _ => vec![
                Span::styled("↑↓ / k j", Style::default().fg(Color::LightCyan)),
                Span::raw(" move  "),
                Span::styled("Enter", Style::default().fg(Color::LightGreen)),
                Span::raw(" pick up  "),
                Span::styled("i", Style::default().fg(Color::LightMagenta)),
                Span::raw(" edit  "),
                Span::styled("v", Style::default().fg(Color::LightYellow)),
                Span::raw(" stretch  "),
                Span::styled("Esc", Style::default().fg(Color::Gray)),
                Span::raw(" normal  "),
                Span::styled("q", Style::default().fg(Color::LightRed)),
                Span::raw(" quit"),
            ],
        };
        Line::from(spans)
    }
}

impl LabelEditor {
    fn seed(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = value.len();
    }

    fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.value)
    }

    fn move_left(&mut self) {
        if let Some((idx, _)) = self.value[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
        }
    }

    fn move_right(&mut self) {
        if let Some(ch) = self.value[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    fn backspace(&mut self) {
        if let Some((idx, _)) = self.value[..self.cursor].char_indices().next_back() {
            self.value.drain(idx..self.cursor);
            self.cursor = idx;
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl Styles {
    fn from_theme(theme: &Theme) -> Self {
        Styles {
            normal_block: Style::default().fg(parse_color(&theme.normal_block, Color::DarkGray)),
            current_block: Style::default()
                .bg(parse_color(&theme.current_block, Color::Magenta))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            selected_block: Style::default()
                .bg(parse_color(&theme.selected_block, Color::Blue))
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            workday_block: Style::default().fg(parse_color(&theme.workday_block, Color::Red)),
            past_block: Style::default()
                .fg(parse_color(&theme.past_text, Color::Gray))
                .add_modifier(Modifier::DIM),
            title: Style::default()
                .fg(parse_color(&theme.title_fg, Color::White))
                .bg(parse_color(&theme.title_bg, Color::Green))
                .add_modifier(Modifier::BOLD),
        }
    }
}

fn parse_color(name: &str, fallback: Color) -> Color {
    name.parse().unwrap_or_else(|_| {
        tracing::warn!(name, "unrecognized color in theme, using fallback");
        fallback
    })
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// 12-hour clock label for a fractional 24-hour timestamp.
fn format_block_hour(hour24: f64) -> String {
    let whole = hour24.floor();
    let mins = ((hour24 - whole) * 60.0).floor() as u32;
    let mut hrs = (whole as u32) % 12;
    if hrs == 0 {
        hrs = 12;
    }
    let period = if (hour24 as u32) % 24 < 12 { "am" } else { "pm" };
    format!("{}:{:02} {}", hrs, mins, period)
}
