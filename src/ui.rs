use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};

use crate::domain::GridConfig;
use crate::model::{Model, UIData};

const CMDLINE_HEIGH: u16 = 1;
const STATUSLINE_HEIGH: u16 = 1;
const TABLE_HEADER_HEIGHT: u16 = 1;
const COLUMN_SPACING: u16 = 1;

pub struct TableUI {
    show_index: bool,
}

impl TableUI {
    pub fn new(cfg: &GridConfig) -> Self {
        Self {
            show_index: cfg.show_index,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let banner_height = u16::from(uidata.banner.is_some());
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(banner_height),
                Constraint::Min(TABLE_HEADER_HEIGHT + 1),
                Constraint::Length(STATUSLINE_HEIGH),
                Constraint::Length(CMDLINE_HEIGH),
            ])
            .split(frame.area());

        if let Some(banner) = &uidata.banner {
            Self::render_banner(frame, chunks[0], banner);
        }
        self.render_table(frame, chunks[1], uidata);
        Self::render_statusline(frame, chunks[2], uidata);
        Self::render_cmdline(frame, chunks[3], uidata);

        if uidata.show_record {
            Self::render_record(frame, uidata);
        }
        if uidata.show_popup {
            Self::render_popup(frame, &uidata.popup_message);
        }
    }

    fn render_banner(frame: &mut Frame, area: Rect, message: &str) {
        let banner = Paragraph::new(format!(" {message}  (Esc to dismiss)"))
            .style(Style::default().fg(Color::White).bg(Color::Red));
        frame.render_widget(banner, area);
    }

    fn render_table(&self, frame: &mut Frame, area: Rect, uidata: &UIData) {
        if uidata.headers.is_empty() {
            let empty = Paragraph::new("No data")
                .centered()
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(empty, area);
            return;
        }

        let index_width = if self.show_index { Self::index_width(uidata) } else { 0 };
        let available = area.width.saturating_sub(index_width);
        let first = Self::first_visible_column(&uidata.widths, uidata.selected_column, available);
        let columns: Vec<usize> = (first..uidata.headers.len()).collect();

        let mut widths = Vec::with_capacity(columns.len() + 1);
        let mut header = Vec::with_capacity(columns.len() + 1);
        if self.show_index {
            widths.push(Constraint::Length(index_width.saturating_sub(COLUMN_SPACING)));
            header.push(Cell::from(""));
        }
        for &col in &columns {
            widths.push(Constraint::Length(uidata.widths[col]));
            let style = if col == uidata.selected_column {
                Style::default().fg(Color::Black).bg(Color::LightBlue)
            } else {
                Style::default().fg(Color::Yellow)
            };
            header.push(Cell::from(uidata.headers[col].as_str()).style(style));
        }

        let rows = uidata.rows.iter().enumerate().map(|(row_idx, row)| {
            let mut cells = Vec::with_capacity(columns.len() + 1);
            if self.show_index {
                cells.push(
                    Cell::from((uidata.first_row + row_idx + 1).to_string())
                        .style(Style::default().fg(Color::DarkGray)),
                );
            }
            for &col in &columns {
                let mut cell = Cell::from(row[col].as_str());
                if row_idx == uidata.selected_row && col == uidata.selected_column {
                    cell = cell.style(Style::default().add_modifier(Modifier::REVERSED));
                }
                cells.push(cell);
            }
            let row = Row::new(cells);
            if row_idx == uidata.selected_row {
                row.style(Style::default().bg(Color::DarkGray))
            } else {
                row
            }
        });

        let table = Table::new(rows, widths)
            .column_spacing(COLUMN_SPACING)
            .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)));
        frame.render_widget(table, area);
    }

    fn render_statusline(frame: &mut Frame, area: Rect, uidata: &UIData) {
        let mut spans = vec![
            Span::from(format!(" {} ", uidata.name)).bold(),
            Span::from(format!(
                " page {}/{} ",
                uidata.page,
                uidata.total_pages.max(1)
            )),
            Span::from(format!(" {} items ", uidata.total_items)),
        ];
        if !uidata.search.is_empty() {
            spans.push(Span::from(format!(" search: {} ", uidata.search)).yellow());
        }
        spans.push(Span::from(format!(" {}", uidata.status_message)).dark_gray());
        let status = Paragraph::new(Line::from(spans))
            .style(Style::default().bg(Color::Blue).fg(Color::White));
        frame.render_widget(status, area);
    }

    fn render_cmdline(frame: &mut Frame, area: Rect, uidata: &UIData) {
        let Some(mode) = uidata.cmd_mode.filter(|_| uidata.active_cmdinput) else {
            frame.render_widget(Paragraph::new("? help  q quit"), area);
            return;
        };
        let prompt = mode.prompt();
        let line = Line::from(vec![
            Span::from(prompt).green(),
            Span::from(uidata.cmdinput.input.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), area);

        let prompt_width = u16::try_from(prompt.chars().count()).unwrap_or(u16::MAX);
        let cursor = u16::try_from(uidata.cmdinput.curser_pos).unwrap_or(u16::MAX);
        let x = area
            .x
            .saturating_add(prompt_width)
            .saturating_add(cursor)
            .min(area.right().saturating_sub(1));
        frame.set_cursor_position((x, area.y));
    }

    fn render_record(frame: &mut Frame, uidata: &UIData) {
        let area = Self::popup_area(frame.area(), 70, 70);
        let key_width = uidata
            .record
            .iter()
            .map(|(k, _)| k.chars().count())
            .max()
            .unwrap_or(0);
        let rows = uidata.record.iter().map(|(key, value)| {
            Row::new(vec![
                Cell::from(key.as_str()).style(Style::default().fg(Color::Yellow)),
                Cell::from(value.as_str()),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Length(u16::try_from(key_width).unwrap_or(u16::MAX)),
                Constraint::Min(1),
            ],
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Record (Esc to close) "),
        );
        frame.render_widget(Clear, area);
        frame.render_widget(table, area);
    }

    fn render_popup(frame: &mut Frame, message: &str) {
        let area = Self::popup_area(frame.area(), 60, 80);
        let popup = Paragraph::new(message)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Help ")
                    .style(Style::default().fg(Color::Cyan)),
            );
        frame.render_widget(Clear, area);
        frame.render_widget(popup, area);
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let width = area.width * percent_x / 100;
        let height = area.height * percent_y / 100;
        Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        }
    }

    fn index_width(uidata: &UIData) -> u16 {
        let last_row_no = uidata.first_row + uidata.rows.len();
        let digits = last_row_no.to_string().len();
        u16::try_from(digits).unwrap_or(u16::MAX) + COLUMN_SPACING
    }

    // Leftmost column such that the selected one still fits into `available`.
    fn first_visible_column(widths: &[u16], selected: usize, available: u16) -> usize {
        let mut first = 0;
        while first < selected {
            let used: u32 = widths[first..=selected]
                .iter()
                .map(|w| u32::from(*w) + u32::from(COLUMN_SPACING))
                .sum();
            if used <= u32::from(available) {
                break;
            }
            first += 1;
        }
        first
    }
}
