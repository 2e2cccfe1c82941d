//! Pan/zoom camera over the laid-out graph.
//!
//! Screen coordinates are canvas-local pixels. A model-space point `m` is
//! drawn at `m * scale + offset`.

use crate::config::ViewerConfig;
use crate::graph::NodeId;
use crate::layout::LayoutResult;
use egui::{Pos2, Rect, Vec2, pos2, vec2};
use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub hovered: Option<NodeId>,
    pub selected: Option<NodeId>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            hovered: None,
            selected: None,
        }
    }
}

impl ViewportState {
    pub fn offset(&self) -> Vec2 {
        vec2(self.offset_x, self.offset_y)
    }

    fn set_offset(&mut self, offset: Vec2) {
        self.offset_x = offset.x;
        self.offset_y = offset.y;
    }

    pub fn model_to_screen(&self, model: Pos2) -> Pos2 {
        pos2(
            model.x * self.scale + self.offset_x,
            model.y * self.scale + self.offset_y,
        )
    }

    pub fn screen_to_model(&self, screen: Pos2) -> Pos2 {
        pos2(
            (screen.x - self.offset_x) / self.scale,
            (screen.y - self.offset_y) / self.scale,
        )
    }

    pub fn model_rect_to_screen(&self, rect: Rect) -> Rect {
        Rect::from_min_max(self.model_to_screen(rect.min), self.model_to_screen(rect.max))
    }

    pub fn is_hovered(&self, id: &NodeId) -> bool {
        self.hovered.as_ref() == Some(id)
    }

    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selected.as_ref() == Some(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { last: Pos2 },
}

pub struct ViewportController {
    state: ViewportState,
    drag: DragState,
    viewport_size: Vec2,
    wheel_zoom_step: f32,
    button_zoom_step: f32,
    min_viewport_size: Vec2,
    viewport_margin: f32,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl ViewportController {
    pub fn new(config: &ViewerConfig) -> Self {
        let min_viewport_size = vec2(config.min_viewport_size[0], config.min_viewport_size[1]);
        Self {
            state: ViewportState::default(),
            drag: DragState::Idle,
            viewport_size: min_viewport_size,
            wheel_zoom_step: config.wheel_zoom_step,
            button_zoom_step: config.button_zoom_step,
            min_viewport_size,
            viewport_margin: config.viewport_margin,
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport_size
    }

    /// Fits the viewport to a container of the given size, keeping a margin
    /// and never going below the minimum canvas size.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport_size = vec2(
            self.min_viewport_size.x.max(width - self.viewport_margin),
            self.min_viewport_size.y.max(height - self.viewport_margin),
        );
    }

    pub fn begin_drag(&mut self, pointer: Pos2) {
        self.drag = DragState::Dragging { last: pointer };
    }

    /// Pans by the pointer movement since the last drag event. Ignored
    /// unless a drag is in progress.
    pub fn drag(&mut self, pointer: Pos2) -> bool {
        let DragState::Dragging { last } = self.drag else {
            return false;
        };
        let offset = self.state.offset() + (pointer - last);
        self.state.set_offset(offset);
        self.drag = DragState::Dragging { last: pointer };
        true
    }

    pub fn end_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Wheel zoom keeping the model point under `pointer` fixed on screen.
    /// Positive deltas (wheel pulled back) zoom out.
    pub fn zoom(&mut self, pointer: Pos2, wheel_delta: f32) {
        if wheel_delta == 0.0 || !wheel_delta.is_finite() {
            return;
        }
        let anchor = self.state.screen_to_model(pointer);
        let scale = if wheel_delta > 0.0 {
            self.state.scale / self.wheel_zoom_step
        } else {
            self.state.scale * self.wheel_zoom_step
        };
        self.state.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        let offset = pointer.to_vec2() - anchor.to_vec2() * self.state.scale;
        self.state.set_offset(offset);
    }

    pub fn zoom_in(&mut self) {
        self.state.scale = (self.state.scale * self.button_zoom_step).min(MAX_SCALE);
    }

    pub fn zoom_out(&mut self) {
        self.state.scale = (self.state.scale / self.button_zoom_step).max(MIN_SCALE);
    }

    /// Scale 1, with the given model-space bounds centered in the viewport.
    pub fn reset(&mut self, bounds: Option<Rect>) {
        self.state.scale = 1.0;
        let offset = match bounds {
            Some(bounds) => vec2(
                (self.viewport_size.x - bounds.width()) / 2.0 - bounds.min.x,
                (self.viewport_size.y - bounds.height()) / 2.0 - bounds.min.y,
            ),
            None => Vec2::ZERO,
        };
        self.state.set_offset(offset);
    }

    pub fn reset_to(&mut self, layout: &LayoutResult) {
        self.reset(layout.bounding_rect());
    }

    pub fn hover(&mut self, node: Option<NodeId>) {
        self.state.hovered = node;
    }

    /// Selecting the selected node again clears the selection.
    pub fn select(&mut self, node: Option<NodeId>) {
        if node.is_some() && self.state.selected == node {
            self.state.selected = None;
        } else {
            self.state.selected = node;
        }
    }

    pub fn clear_selection(&mut self) {
        self.state.selected = None;
    }

    /// Drops hover/selection that refer to nodes not present in `layout`.
    pub fn retain_valid(&mut self, layout: Option<&LayoutResult>) {
        let valid = |id: &Option<NodeId>| match (id, layout) {
            (Some(id), Some(layout)) => layout.contains(id),
            (Some(_), None) => false,
            (None, _) => true,
        };
        if !valid(&self.state.hovered) {
            self.state.hovered = None;
        }
        if !valid(&self.state.selected) {
            self.state.selected = None;
        }
    }

    pub fn screen_to_model(&self, screen: Pos2) -> Pos2 {
        self.state.screen_to_model(screen)
    }

    pub fn model_to_screen(&self, model: Pos2) -> Pos2 {
        self.state.model_to_screen(model)
    }

    /// The model-space region currently visible in the viewport.
    pub fn visible_model_rect(&self) -> Rect {
        Rect::from_min_max(
            self.screen_to_model(Pos2::ZERO),
            self.screen_to_model(self.viewport_size.to_pos2()),
        )
    }

    /// Topmost node under the pointer; later nodes are drawn above earlier ones.
    pub fn hit_test(&self, layout: &LayoutResult, pointer: Pos2) -> Option<NodeId> {
        let model = self.screen_to_model(pointer);
        layout
            .nodes
            .iter()
            .rev()
            .find(|x| x.rect().contains(model))
            .map(|x| x.id().clone())
    }
}
