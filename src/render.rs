//! Draws a positioned graph with `egui` and feeds pointer input back into the
//! viewport controller.

use crate::graph::{GraphNode, GraphNodeKind, NodeId};
use crate::layout::LayoutResult;
use crate::viewport::{ViewportController, ViewportState};
use egui::{
    Align2, Color32, FontId, Painter, Pos2, Rect, Response, Sense, Shape, Stroke, StrokeKind, Ui,
    Vec2, vec2,
};

pub const CORNER_RADIUS: f32 = 8.0;
pub const STROKE_WIDTH: f32 = 2.0;
pub const ARROW_POINTER_LENGTH: f32 = 10.0;
const TITLE_FONT_SIZE: f32 = 14.0;
const DETAIL_FONT_SIZE: f32 = 11.0;
const DETAIL_FIRST_LINE: f32 = 35.0;
const DETAIL_LINE_SPACING: f32 = 15.0;
const DETAIL_INSET: f32 = 10.0;

pub const HOVER_STROKE: Color32 = Color32::from_rgb(0xff, 0xff, 0x00);
pub const SELECTED_STROKE: Color32 = Color32::WHITE;
pub const EDGE_COLOR: Color32 = Color32::from_rgb(0x95, 0xa5, 0xa6);
pub const BACKGROUND: Color32 = Color32::from_rgb(0x1e, 0x1e, 0x1e);

/// Fill and shadow colors keyed by the displayed node type.
pub fn node_colors(type_name: &str) -> (Color32, Color32) {
    match type_name {
        "Conv" => (
            Color32::from_rgb(0x34, 0x98, 0xdb),
            Color32::from_rgb(0x29, 0x80, 0xb9),
        ),
        "ReLU" => (
            Color32::from_rgb(0xe7, 0x4c, 0x3c),
            Color32::from_rgb(0xc0, 0x39, 0x2b),
        ),
        "Input" => (
            Color32::from_rgb(0x2e, 0xcc, 0x71),
            Color32::from_rgb(0x27, 0xae, 0x60),
        ),
        "Output" => (
            Color32::from_rgb(0xe6, 0x7e, 0x22),
            Color32::from_rgb(0xd3, 0x54, 0x00),
        ),
        _ => (
            Color32::from_rgb(0x34, 0x49, 0x5e),
            Color32::from_rgb(0x2c, 0x3e, 0x50),
        ),
    }
}

/// Text shown under a node's title.
pub fn detail_lines(node: &GraphNode) -> Vec<String> {
    let GraphNodeKind::Layer {
        op_type: _,
        layer,
        details,
    } = &node.kind
    else {
        return vec![];
    };
    let mut lines = vec![];
    lines.extend(details.weight_label());
    lines.extend(details.bias_label());
    match node.label.as_str() {
        "Conv" => {
            for attribute in ["kernel_shape", "strides", "pads", "dilations"] {
                if layer.has_attribute(attribute) {
                    lines.push(format!("{attribute} (?)"));
                }
            }
        }
        "Reshape" => lines.push("shape (?)".to_string()),
        "Transpose" => lines.push("perm (?)".to_string()),
        _ => {}
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeVisual {
    pub id: NodeId,
    /// Canvas-local screen rectangle.
    pub rect: Rect,
    pub fill: Color32,
    pub shadow: Color32,
    pub stroke: Option<Color32>,
    pub title: String,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeVisual {
    pub id: String,
    pub from: Pos2,
    pub to: Pos2,
}

/// Screen-space draw list for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub scale: f32,
    pub nodes: Vec<NodeVisual>,
    pub edges: Vec<EdgeVisual>,
}

impl RenderFrame {
    pub fn build(layout: &LayoutResult, state: &ViewportState) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|x| {
                let (fill, shadow) = node_colors(&x.node.type_name());
                let stroke = if state.is_selected(x.id()) {
                    Some(SELECTED_STROKE)
                } else if state.is_hovered(x.id()) {
                    Some(HOVER_STROKE)
                } else {
                    None
                };
                NodeVisual {
                    id: x.id().clone(),
                    rect: state.model_rect_to_screen(x.rect()),
                    fill,
                    shadow,
                    stroke,
                    title: x.node.label.clone(),
                    details: detail_lines(&x.node),
                }
            })
            .collect();

        let index = layout.node_index();
        let mut edges = Vec::with_capacity(layout.edges.len());
        for edge in &layout.edges {
            let (Some(source), Some(target)) = (index.get(&edge.source), index.get(&edge.target))
            else {
                log::warn!("Edge {} references a node missing from the layout", edge.id);
                continue;
            };
            let source = source.rect();
            let target = target.rect();
            edges.push(EdgeVisual {
                id: edge.id.clone(),
                from: state.model_to_screen(source.right_center()),
                to: state.model_to_screen(target.left_center()),
            });
        }

        Self {
            scale: state.scale,
            nodes,
            edges,
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeVisual> {
        self.nodes.iter().find(|x| &x.id == id)
    }

    /// Paints the frame with canvas-local coordinates shifted by `origin`.
    pub fn paint(&self, painter: &Painter, origin: Vec2) {
        let scale = self.scale;
        let edge_stroke = Stroke::new(STROKE_WIDTH, EDGE_COLOR);
        for edge in &self.edges {
            let from = edge.from + origin;
            let to = edge.to + origin;
            painter.line_segment([from, to], edge_stroke);
            let direction = to - from;
            if direction.length() > f32::EPSILON {
                let dir = direction.normalized();
                let tip_length = ARROW_POINTER_LENGTH * scale;
                let back = to - dir * tip_length;
                let side = dir.rot90() * tip_length * 0.5;
                painter.add(Shape::convex_polygon(
                    vec![to, back + side, back - side],
                    EDGE_COLOR,
                    Stroke::NONE,
                ));
            }
        }

        let corner = CORNER_RADIUS * scale;
        for node in &self.nodes {
            let rect = node.rect.translate(origin);
            painter.add(Shape::rect_filled(
                rect.translate(vec2(3.0, 3.0) * scale),
                corner,
                node.shadow.gamma_multiply(0.6),
            ));
            painter.add(Shape::rect_filled(rect, corner, node.fill));
            if let Some(color) = node.stroke {
                painter.add(Shape::rect_stroke(
                    rect,
                    corner,
                    (STROKE_WIDTH, color),
                    StrokeKind::Outside,
                ));
            }
            painter.text(
                rect.center_top() + vec2(0.0, DETAIL_INSET * scale),
                Align2::CENTER_TOP,
                &node.title,
                FontId::proportional(TITLE_FONT_SIZE * scale),
                Color32::WHITE,
            );
            for (i, line) in node.details.iter().enumerate() {
                let y = DETAIL_FIRST_LINE + i as f32 * DETAIL_LINE_SPACING;
                painter.text(
                    rect.min + vec2(DETAIL_INSET, y) * scale,
                    Align2::LEFT_TOP,
                    line,
                    FontId::proportional(DETAIL_FONT_SIZE * scale),
                    Color32::from_white_alpha(220),
                );
            }
        }
    }
}

/// Interactive canvas: pan by dragging, wheel zoom at the cursor, hover and
/// click-to-select.
pub struct GraphCanvas<'a> {
    layout: Option<&'a LayoutResult>,
}

impl<'a> GraphCanvas<'a> {
    pub fn new(layout: Option<&'a LayoutResult>) -> Self {
        Self { layout }
    }

    pub fn show(self, ui: &mut Ui, viewport: &mut ViewportController) -> Response {
        let available = ui.available_size();
        viewport.resize(available.x, available.y);
        let (response, painter) =
            ui.allocate_painter(viewport.viewport_size(), Sense::click_and_drag());
        let origin = response.rect.min;
        let local = |pos: Pos2| (pos - origin).to_pos2();

        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                viewport.begin_drag(local(pos));
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                viewport.drag(local(pos));
            }
        }
        if response.drag_stopped() {
            viewport.end_drag();
        }

        if let Some(pos) = response.hover_pos() {
            let pointer = local(pos);
            // egui reports wheel-up as positive, which zooms in
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                viewport.zoom(pointer, -scroll);
            }
            let hit = self.layout.and_then(|x| viewport.hit_test(x, pointer));
            if response.clicked() && hit.is_some() {
                viewport.select(hit.clone());
            }
            viewport.hover(hit);
        } else {
            viewport.hover(None);
        }

        painter.rect_filled(response.rect, 0.0, BACKGROUND);
        if let Some(layout) = self.layout {
            RenderFrame::build(layout, viewport.state()).paint(&painter, origin.to_vec2());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutSpacing;
    use crate::graph::Edge;
    use crate::layout::{LayeredLayoutEngine, PositionedNode, build_and_layout};
    use crate::metadata::LayerRecord;
    use crate::resolver::resolve;
    use futures::executor::block_on;
    use std::time::{Duration, Instant};

    fn chain() -> LayoutResult {
        let layers = vec![
            LayerRecord::new(
                1,
                &["x", "conv1.weight", "conv1.bias"],
                &["h"],
                &["kernel_shape", "pads"],
            ),
            LayerRecord::new(2, &["h"], &["y"], &[]),
        ];
        let (nodes, edges) =
            resolve(&layers, &["x".to_string()], &["y".to_string()]).into_nodes_and_edges();
        block_on(build_and_layout(
            &LayeredLayoutEngine,
            nodes,
            edges,
            &LayoutSpacing::default(),
        ))
        .unwrap()
    }

    #[test]
    fn test_colors_by_type() {
        assert_eq!(node_colors("Conv").0, Color32::from_rgb(0x34, 0x98, 0xdb));
        assert_eq!(node_colors("Output").1, Color32::from_rgb(0xd3, 0x54, 0x00));
        assert_eq!(node_colors("Transpose"), node_colors("Reshape"));
    }

    #[test]
    fn test_conv_detail_lines() {
        let layout = chain();
        let conv = layout.node(&NodeId::for_layer(1)).unwrap();
        assert_eq!(
            detail_lines(&conv.node),
            vec!["W (conv1)", "B (conv1)", "kernel_shape (?)", "pads (?)"]
        );
        let input = layout.node(&NodeId::from("x")).unwrap();
        assert!(detail_lines(&input.node).is_empty());
    }

    #[test]
    fn test_edges_run_right_to_left_middle() {
        let layout = chain();
        let state = ViewportState {
            scale: 2.0,
            offset_x: 10.0,
            offset_y: -5.0,
            ..Default::default()
        };
        let frame = RenderFrame::build(&layout, &state);
        assert_eq!(frame.edges.len(), layout.edges.len());
        let edge = &frame.edges[0];
        let source = layout.node(&layout.edges[0].source).unwrap().rect();
        let target = layout.node(&layout.edges[0].target).unwrap().rect();
        assert_eq!(edge.from, state.model_to_screen(source.right_center()));
        assert_eq!(edge.to, state.model_to_screen(target.left_center()));
    }

    #[test]
    fn test_selection_wins_over_hover() {
        let layout = chain();
        let id = NodeId::for_layer(1);
        let state = ViewportState {
            hovered: Some(id.clone()),
            selected: Some(id.clone()),
            ..Default::default()
        };
        let frame = RenderFrame::build(&layout, &state);
        assert_eq!(frame.node(&id).unwrap().stroke, Some(SELECTED_STROKE));

        let state = ViewportState {
            hovered: Some(id.clone()),
            ..Default::default()
        };
        let frame = RenderFrame::build(&layout, &state);
        assert_eq!(frame.node(&id).unwrap().stroke, Some(HOVER_STROKE));
        assert_eq!(frame.node(&NodeId::from("y")).unwrap().stroke, None);
    }

    #[test]
    fn test_headless_canvas_frame() {
        let layout = chain();
        let mut viewport = ViewportController::default();
        let ctx = egui::Context::default();
        let output = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                GraphCanvas::new(Some(&layout)).show(ui, &mut viewport);
            });
        });
        assert!(!output.shapes.is_empty());
        assert!(!viewport.is_dragging());
        assert_eq!(viewport.state().hovered, None);
    }

    #[test]
    fn test_canvas_keeps_minimum_size() {
        let mut viewport = ViewportController::default();
        let ctx = egui::Context::default();
        let input = egui::RawInput {
            screen_rect: Some(Rect::from_min_size(Pos2::ZERO, vec2(300.0, 200.0))),
            ..Default::default()
        };
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                GraphCanvas::new(None).show(ui, &mut viewport);
            });
        });
        assert_eq!(viewport.viewport_size(), vec2(800.0, 600.0));
    }

    #[test]
    fn test_long_chain_frame_builds_quickly() {
        let n = 6000;
        let nodes = (0..n)
            .map(|i| PositionedNode {
                node: GraphNode {
                    id: NodeId::for_layer(i),
                    kind: GraphNodeKind::Input,
                    width: 140.0,
                    height: 80.0,
                    label: format!("t{i}"),
                },
                x: i as f32 * 220.0,
                y: 0.0,
            })
            .collect();
        let edges = (1..n)
            .map(|i| Edge::new(NodeId::for_layer(i - 1), NodeId::for_layer(i), "t"))
            .collect();
        let layout = LayoutResult { nodes, edges };

        let start = Instant::now();
        let frame = RenderFrame::build(&layout, &ViewportState::default());
        let elapsed = start.elapsed();
        assert_eq!(frame.edges.len(), (n - 1) as usize);
        assert!(elapsed < Duration::from_secs(1), "frame took {elapsed:?}");
    }
}
