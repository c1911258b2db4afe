//! Plotters-powered diagnostic chart widget for Ratatui.
//!
//! Why Plotters instead of Ratatui's built-in `Chart` widget?
//! - nicer axis + mesh rendering
//! - less manual work for ticks/labels
//! - easy to extend later (legend, annotations, exportable PNG/SVG backends, etc.)
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Axis bounds, labels, and tick formatters shared by the chart widget and
/// the tick gutter drawn around it.
#[derive(Clone, Copy)]
pub struct AxisSpec<'a> {
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    /// Axis labels (kept simple for terminal rendering).
    pub x_label: &'a str,
    pub y_label: &'a str,
    /// Formatting of tick labels.
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

/// A lightweight, render-only chart description.
///
/// The widget is intentionally data-driven: all series and bounds are computed
/// outside the render call. This keeps `render()` focused on drawing and makes
/// it easy to test/benchmark the data prep separately. The same widget serves
/// both diagnostic charts (RMSECV curve, predicted-vs-observed scatter).
pub struct SocPlottersChart<'a> {
    /// Connected line series (the RMSECV curve, or the identity diagonal).
    pub line: &'a [(f64, f64)],
    /// Scatter series for every sample/candidate.
    pub points: &'a [(f64, f64)],
    /// Scatter series drawn last (the chosen candidate, the worst samples).
    pub highlight: &'a [(f64, f64)],
    pub highlight_color: RGBColor,
    pub spec: AxisSpec<'a>,
}

impl<'a> Widget for SocPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        // In that case, we render a small hint rather than panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.spec.x_bounds[0];
        let x1 = self.spec.x_bounds[1];
        let y0 = self.spec.y_bounds[0];
        let y1 = self.spec.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        // `plotters-ratatui-backend` draws Plotters primitives via Ratatui's
        // `Canvas` widget, which ultimately writes to the terminal buffer.
        //
        // We delegate rendering to the crate-provided widget helper to avoid
        // coupling our code to its internal backend types.
        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                // Small margins keep the chart readable without wasting space.
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Axes + tick labels.
            //
            // We disable the mesh lines to reduce visual clutter in low-resolution
            // terminal rendering; the axes + labels are usually enough here.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.spec.x_label)
                .y_desc(self.spec.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.spec.fmt_x)(*v))
                .y_label_formatter(&|v| (self.spec.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            // Series styling: keep the palette high-contrast for terminal readability.
            let line_color = RGBColor(0, 255, 255); // cyan
            let points_color = WHITE;

            // 1) Line series.
            chart.draw_series(LineSeries::new(self.line.iter().copied(), &line_color))?;

            // 2) All points.
            chart.draw_series(
                self.points
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), points_color)),
            )?;

            // 3) Highlights.
            //
            // We intentionally avoid `Circle` markers here. The underlying
            // `plotters-ratatui-backend` currently maps circle radii incorrectly
            // (pixel radius -> normalized canvas units), producing huge circles.
            //
            // A colored `Pixel` gives a clean “dot” highlight that looks good in
            // terminals and reliably overrides the base (white) point.
            chart.draw_series(
                self.highlight
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), self.highlight_color)),
            )?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
