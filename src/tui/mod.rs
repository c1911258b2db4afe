//! Ratatui-based terminal UI.
//!
//! The TUI provides a settings panel for the calibration knobs (component
//! cap, fold count, Savitzky-Golay parameters, synthetic sample count) and
//! refits on every change, rendering the RMSECV curve and the
//! predicted-vs-observed scatter side by side.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use plotters::style::RGBColor;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use crate::app::pipeline::{self, RunOutput};
use crate::cli::FitArgs;
use crate::domain::FitConfig;
use crate::error::AppError;
use crate::io::ingest::IngestedData;

mod plotters_chart;

use plotters_chart::{AxisSpec, SocPlottersChart};

/// Adjustable settings rows, top to bottom.
const FIELD_COUNT: usize = 6;

const CHOSEN_COLOR: RGBColor = RGBColor(0, 255, 0); // green
const WORST_COLOR: RGBColor = RGBColor(255, 0, 0); // red

/// Start the TUI.
pub fn run(args: FitArgs) -> Result<(), AppError> {
    let mut config = crate::app::fit_config_from_args(&args);
    if !config.synthetic && config.csv_path.is_none() {
        config.csv_path = Some(crate::cli::picker::prompt_for_csv_path()?);
    }

    // Load before touching the terminal so ingest errors print normally.
    let ingest = pipeline::load_input(&config)?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(config, ingest);
    app.refit();
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

struct App {
    config: FitConfig,
    /// Loaded (or generated) spectra, kept so settings changes refit without
    /// re-reading the CSV.
    ingest: IngestedData,
    run: Option<RunOutput>,
    selected_field: usize,
    status: String,
}

impl App {
    fn new(config: FitConfig, ingest: IngestedData) -> Self {
        Self {
            config,
            ingest,
            run: None,
            selected_field: 0,
            status: "Ready.".to_string(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Up => {
                if self.selected_field > 0 {
                    self.selected_field -= 1;
                }
            }
            KeyCode::Down => {
                if self.selected_field < FIELD_COUNT - 1 {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::Char('r') => {
                if self.config.synthetic {
                    self.config.seed = self.config.seed.wrapping_add(1);
                    if self.reload() {
                        self.status = format!("Resampled (seed {}).", self.config.seed);
                    }
                } else if self.refit() {
                    self.status = "Refitted.".to_string();
                }
            }
            KeyCode::Char('d') => {
                if let Some(run) = &self.run {
                    match crate::debug::write_debug_bundle(run, &self.config) {
                        Ok(path) => {
                            self.status = format!("Wrote debug bundle: {}", path.display());
                        }
                        Err(err) => {
                            self.status = format!("Debug write failed: {err}");
                        }
                    }
                } else {
                    self.status = "No fit to dump yet.".to_string();
                }
            }
            _ => {}
        }
        false
    }

    fn adjust_field(&mut self, delta: i32) {
        match self.selected_field {
            0 => {
                let next = if delta >= 0 {
                    self.config.max_components.saturating_add(1)
                } else {
                    self.config.max_components.saturating_sub(1)
                };
                self.config.max_components = next.max(1);
                if self.refit() {
                    self.status = format!("max components: {}", self.config.max_components);
                }
            }
            1 => {
                let next = if delta >= 0 {
                    self.config.folds.saturating_add(1)
                } else {
                    self.config.folds.saturating_sub(1)
                };
                self.config.folds = next.max(2);
                if self.refit() {
                    self.status = format!("folds: {}", self.config.folds);
                }
            }
            2 => {
                let sg = &mut self.config.preprocess;
                sg.window = if delta >= 0 {
                    sg.window.saturating_add(2)
                } else {
                    sg.window.saturating_sub(2).max(1)
                };
                // Keep the polynomial inside the window and the derivative
                // inside the polynomial; `validate` requires both.
                sg.polyorder = sg.polyorder.min(sg.window - 1);
                sg.derivative = sg.derivative.min(sg.polyorder);
                if self.refit() {
                    self.status = format!("preprocess: {}", self.config.preprocess.label());
                }
            }
            3 => {
                let sg = &mut self.config.preprocess;
                sg.polyorder = if delta >= 0 {
                    (sg.polyorder + 1).min(sg.window - 1)
                } else {
                    sg.polyorder.saturating_sub(1)
                };
                sg.derivative = sg.derivative.min(sg.polyorder);
                if self.refit() {
                    self.status = format!("preprocess: {}", self.config.preprocess.label());
                }
            }
            4 => {
                let sg = &mut self.config.preprocess;
                sg.derivative = if delta >= 0 {
                    (sg.derivative + 1).min(sg.polyorder)
                } else {
                    sg.derivative.saturating_sub(1)
                };
                if self.refit() {
                    self.status = format!("preprocess: {}", self.config.preprocess.label());
                }
            }
            5 => {
                if !self.config.synthetic {
                    self.status = "Sample count only applies to synthetic data.".to_string();
                    return;
                }
                let next = if delta >= 0 {
                    self.config.sample_count.saturating_add(10)
                } else {
                    self.config.sample_count.saturating_sub(10)
                };
                self.config.sample_count = next.max(10);
                if self.reload() {
                    self.status = format!("samples: {}", self.config.sample_count);
                }
            }
            _ => {}
        }
    }

    /// Refit on the held data. Failures land in the status line so the user
    /// can adjust settings instead of losing the session.
    fn refit(&mut self) -> bool {
        match pipeline::run_fit_with_data(&self.config, self.ingest.clone()) {
            Ok(run) => {
                self.status = format!(
                    "Fitted: k={} (RMSECV={:.4})",
                    run.outcome.chosen.components, run.outcome.chosen.rmse
                );
                self.run = Some(run);
                true
            }
            Err(err) => {
                self.status = format!("Fit failed: {err}");
                false
            }
        }
    }

    /// Regenerate the input (synthetic settings changed), then refit.
    fn reload(&mut self) -> bool {
        match pipeline::load_input(&self.config) {
            Ok(ingest) => {
                self.ingest = ingest;
                self.refit()
            }
            Err(err) => {
                self.status = format!("Load failed: {err}");
                false
            }
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("soc", Style::default().fg(Color::Cyan)),
            Span::raw(" — PLS regression on VNIR soil spectra"),
        ]));

        let stats = self.ingest.dataset.stats();
        lines.push(Line::from(Span::styled(
            format!(
                "source: {} | target: {} | n={} | bands={} | {} | folds: {}",
                source_label(&self.config),
                self.ingest.target_column,
                stats.n_samples,
                stats.n_bands,
                self.config.preprocess.label(),
                self.config.folds,
            ),
            Style::default().fg(Color::Gray),
        )));

        if let Some(run) = &self.run {
            let cv = &run.artifact.cross_validation;
            lines.push(Line::from(Span::styled(
                format!(
                    "k={} | RMSECV={:.4} | R2cv={:.3} | RPD={:.2} | bias={:+.4}",
                    run.outcome.chosen.components, cv.rmse, cv.r2, cv.rpd, cv.bias,
                ),
                Style::default().fg(Color::Gray),
            )));
        }

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(8)])
            .split(area);

        let charts = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[0]);

        self.draw_cv_chart(frame, charts[0]);
        self.draw_scatter_chart(frame, charts[1]);
        self.draw_settings(frame, chunks[1]);
    }

    fn draw_cv_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("RMSECV vs components").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = &self.run else {
            self.draw_waiting(frame, inner);
            return;
        };

        let (line, chosen, x_bounds, y_bounds) = cv_series(run);
        let spec = AxisSpec {
            x_bounds,
            y_bounds,
            x_label: "components",
            y_label: "rmsecv",
            fmt_x: fmt_axis_count,
            fmt_y: fmt_axis_metric,
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = SocPlottersChart {
            line: &line,
            points: &line,
            highlight: &chosen,
            highlight_color: CHOSEN_COLOR,
            spec,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, &spec);
        }
    }

    fn draw_scatter_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title("CV predicted vs observed")
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = &self.run else {
            self.draw_waiting(frame, inner);
            return;
        };

        let (identity, points, worst, x_bounds, y_bounds) = scatter_series(run);
        let spec = AxisSpec {
            x_bounds,
            y_bounds,
            x_label: "observed",
            y_label: "predicted",
            fmt_x: fmt_axis_soc,
            fmt_y: fmt_axis_soc,
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = SocPlottersChart {
            line: &identity,
            points: &points,
            highlight: &worst,
            highlight_color: WORST_COLOR,
            spec,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, &spec);
        }
    }

    fn draw_waiting(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let msg = Paragraph::new("Waiting for a successful fit...")
            .style(Style::default().fg(Color::Yellow))
            .block(Block::default());
        frame.render_widget(msg, area);
    }

    fn draw_settings(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let sg = &self.config.preprocess;
        let samples_note = if self.config.synthetic {
            String::new()
        } else {
            " (synthetic only)".to_string()
        };

        let items = vec![
            ListItem::new(format!("Max components: {}", self.config.max_components)),
            ListItem::new(format!("CV folds: {}", self.config.folds)),
            ListItem::new(format!("SG window: {}", sg.window)),
            ListItem::new(format!("SG polyorder: {}", sg.polyorder)),
            ListItem::new(format!("SG derivative: {}", sg.derivative)),
            ListItem::new(format!(
                "Samples: {}{samples_note}",
                self.config.sample_count
            )),
        ];

        let list = List::new(items)
            .block(Block::default().title("Settings").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ratatui::widgets::ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ select  ←/→ adjust  r resample/refit  d debug  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn source_label(config: &FitConfig) -> String {
    if config.synthetic {
        return format!("synthetic (seed {})", config.seed);
    }
    match &config.csv_path {
        Some(path) => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        None => "-".to_string(),
    }
}

/// Build the RMSECV-vs-components series for Plotters.
fn cv_series(run: &RunOutput) -> (Vec<(f64, f64)>, Vec<(f64, f64)>, [f64; 2], [f64; 2]) {
    let line: Vec<(f64, f64)> = run
        .outcome
        .scores
        .iter()
        .map(|s| (s.components as f64, s.rmse))
        .collect();
    let chosen = vec![(
        run.outcome.chosen.components as f64,
        run.outcome.chosen.rmse,
    )];

    let mut x0 = line.first().map(|p| p.0).unwrap_or(1.0);
    let mut x1 = line.last().map(|p| p.0).unwrap_or(2.0);
    if x1 <= x0 {
        x0 -= 0.5;
        x1 += 0.5;
    }

    let (mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(_, y) in &line {
        y0 = y0.min(y);
        y1 = y1.max(y);
    }
    if !y0.is_finite() || !y1.is_finite() || y1 <= y0 {
        y0 = 0.0;
        y1 = 1.0;
    }
    let pad = ((y1 - y0).abs() * 0.05).max(1e-12);

    (line, chosen, [x0, x1], [y0 - pad, y1 + pad])
}

/// Build the predicted-vs-observed series for Plotters.
///
/// Both axes share one range so the identity diagonal reads at 45 degrees.
fn scatter_series(
    run: &RunOutput,
) -> (
    Vec<(f64, f64)>,
    Vec<(f64, f64)>,
    Vec<(f64, f64)>,
    [f64; 2],
    [f64; 2],
) {
    let points: Vec<(f64, f64)> = run.residuals.iter().map(|r| (r.y_obs, r.y_cv)).collect();
    let worst: Vec<(f64, f64)> = run.worst.iter().map(|r| (r.y_obs, r.y_cv)).collect();

    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in &points {
        lo = lo.min(x).min(y);
        hi = hi.max(x).max(y);
    }
    if !lo.is_finite() || !hi.is_finite() || hi <= lo {
        lo = 0.0;
        hi = 1.0;
    }
    let pad = ((hi - lo).abs() * 0.05).max(1e-12);
    let bounds = [lo - pad, hi + pad];

    let identity = vec![(bounds[0], bounds[0]), (bounds[1], bounds[1])];

    (identity, points, worst, bounds, bounds)
}

fn fmt_axis_count(v: f64) -> String {
    format!("{v:.0}")
}

fn fmt_axis_metric(v: f64) -> String {
    format!("{v:.3}")
}

fn fmt_axis_soc(v: f64) -> String {
    format!("{v:.2}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    spec: &AxisSpec<'_>,
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = spec.x_bounds[0] + u * (spec.x_bounds[1] - spec.x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = (spec.fmt_x)(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub((label.len() / 2) as u16);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = spec.y_bounds[0] + u * (spec.y_bounds[1] - spec.y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = (spec.fmt_y)(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label.len() as u16);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(spec.x_label)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(spec.y_label)
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
