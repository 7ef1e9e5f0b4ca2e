use std::collections::BTreeMap;

use eframe::egui;
use egui_plot::{Legend, Plot, PlotPoint, PlotPoints, Points};

use super::color::topic_color;
use crate::output::scatter::ScatterRow;

/// Hover tooltips only appear within this many screen pixels of a point.
const HOVER_RADIUS: f32 = 12.0;

const POINT_RADIUS: f32 = 3.5;

/// One legend entry and its points.
struct TopicSeries {
    name: String,
    color: egui::Color32,
    points: Vec<[f64; 2]>,
}

pub struct TopicMapApp {
    rows: Vec<ScatterRow>,
    series: Vec<TopicSeries>,
}

impl TopicMapApp {
    pub fn new(rows: Vec<ScatterRow>, names: Vec<(i32, String)>) -> Self {
        let names: BTreeMap<i32, String> = names.into_iter().collect();

        let mut grouped: BTreeMap<i32, Vec<[f64; 2]>> = BTreeMap::new();
        for row in &rows {
            grouped.entry(row.topic).or_default().push([row.x, row.y]);
        }

        let min_topic = grouped.keys().next().copied().unwrap_or(0);
        let max_topic = grouped.keys().next_back().copied().unwrap_or(0);

        let series = grouped
            .into_iter()
            .map(|(topic, points)| TopicSeries {
                name: names
                    .get(&topic)
                    .cloned()
                    .unwrap_or_else(|| topic.to_string()),
                color: topic_color(topic, min_topic, max_topic),
                points,
            })
            .collect();

        Self { rows, series }
    }
}

impl eframe::App for TopicMapApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0; 4]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let plot = Plot::new("topic_map")
                    .legend(Legend::default())
                    .show_background(false)
                    .show_x(false)
                    .show_y(false)
                    .data_aspect(1.0)
                    .show(ui, |plot_ui| {
                        for s in &self.series {
                            let points: PlotPoints = s.points.iter().copied().collect();
                            plot_ui.points(
                                Points::new(points)
                                    .name(&s.name)
                                    .color(s.color)
                                    .radius(POINT_RADIUS),
                            );
                        }
                    });

                let Some(pointer) = plot.response.hover_pos() else {
                    return;
                };

                let nearest = self
                    .rows
                    .iter()
                    .map(|row| {
                        let screen = plot
                            .transform
                            .position_from_point(&PlotPoint::new(row.x, row.y));
                        (row, screen.distance(pointer))
                    })
                    .filter(|(_, d)| *d <= HOVER_RADIUS)
                    .min_by(|a, b| a.1.total_cmp(&b.1));

                if let Some((row, _)) = nearest {
                    plot.response.on_hover_text(row.truncated.as_str());
                }
            });
    }
}
