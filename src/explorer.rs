//! A viewing session: which model is selected, its committed layout, and the
//! camera over it.
//!
//! Selecting a model resolves its graph immediately and hands back a future
//! for the layout. Futures may complete in any order; only the outcome of the
//! most recent selection is committed.

use crate::config::{ViewPolicy, ViewerConfig};
use crate::graph::NodeId;
use crate::layout::{
    LayoutEngine, LayoutError, LayoutResult, LayoutSequencer, LayoutTicket, build_and_layout,
};
use crate::metadata::{MetadataError, ModelCatalog};
use crate::render::GraphCanvas;
use crate::resolver::{ResolverOptions, resolve_model};
use crate::viewport::ViewportController;
use egui::{Align2, Ui, vec2};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum GraphDisplay {
    #[default]
    Idle,
    Ready(LayoutResult),
    EmptyGraph,
    Failed(LayoutError),
}

impl GraphDisplay {
    pub fn layout(&self) -> Option<&LayoutResult> {
        match self {
            GraphDisplay::Ready(x) => Some(x),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct LayoutOutcome {
    pub ticket: LayoutTicket,
    pub model: String,
    pub result: Result<LayoutResult, LayoutError>,
}

/// Contents of the node details panel.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDetails {
    pub id: NodeId,
    pub type_name: String,
    pub hovered: Option<NodeId>,
}

pub struct GraphExplorer<E: LayoutEngine> {
    config: ViewerConfig,
    resolver_options: ResolverOptions,
    engine: Arc<E>,
    catalog: ModelCatalog,
    selected_model: Option<String>,
    sequencer: LayoutSequencer,
    display: GraphDisplay,
    viewport: ViewportController,
    in_flight: Vec<LocalBoxFuture<'static, LayoutOutcome>>,
}

impl<E: LayoutEngine + 'static> GraphExplorer<E> {
    pub fn new(config: ViewerConfig, engine: E, catalog: ModelCatalog) -> Self {
        Self {
            resolver_options: ResolverOptions::from_config(&config),
            viewport: ViewportController::new(&config),
            config,
            engine: Arc::new(engine),
            catalog,
            selected_model: None,
            sequencer: LayoutSequencer::new(),
            display: GraphDisplay::Idle,
            in_flight: vec![],
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    pub fn display(&self) -> &GraphDisplay {
        &self.display
    }

    pub fn layout(&self) -> Option<&LayoutResult> {
        self.display.layout()
    }

    pub fn is_loading(&self) -> bool {
        self.sequencer.is_pending()
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    /// Starts a layout for `file_name`, superseding any layout still in
    /// flight. The previous graph stays on display until the returned future's
    /// outcome is committed.
    pub fn select_model(
        &mut self,
        file_name: &str,
    ) -> Result<impl Future<Output = LayoutOutcome> + use<E>, MetadataError> {
        let entry = self.catalog.get(file_name)?;
        let graph = resolve_model(&self.resolver_options, &entry.metadata_json);
        log::debug!(
            "Resolved {file_name}: {} nodes, {} edges, {} unresolved tensors",
            graph.node_count(),
            graph.edges.len(),
            graph.unresolved.len()
        );
        let (nodes, edges) = graph.into_nodes_and_edges();

        self.selected_model = Some(file_name.to_string());
        let ticket = self.sequencer.issue();
        let engine = self.engine.clone();
        let spacing = self.config.spacing.clone();
        let model = file_name.to_string();
        Ok(async move {
            let result = build_and_layout(engine.as_ref(), nodes, edges, &spacing).await;
            LayoutOutcome {
                ticket,
                model,
                result,
            }
        })
    }

    /// Applies a finished layout. Returns false, leaving the session
    /// untouched, when a newer selection has been made since it was started.
    pub fn commit(&mut self, outcome: LayoutOutcome) -> bool {
        if !self.sequencer.settle(outcome.ticket) {
            return false;
        }
        let had_graph = self.display.layout().is_some();
        self.display = match outcome.result {
            Ok(layout) => {
                if self.config.view_policy == ViewPolicy::Reset || !had_graph {
                    self.viewport.reset_to(&layout);
                }
                GraphDisplay::Ready(layout)
            }
            Err(LayoutError::EmptyGraph) => {
                log::info!("Model {} has no nodes", outcome.model);
                self.viewport.reset(None);
                GraphDisplay::EmptyGraph
            }
            Err(err) => {
                log::warn!("Layout of {} failed: {err}", outcome.model);
                GraphDisplay::Failed(err)
            }
        };
        self.viewport.retain_valid(self.display.layout());
        true
    }

    /// Starts a layout and keeps it until [`Self::poll_layouts`] sees it
    /// finish.
    pub fn request_model(&mut self, file_name: &str) -> Result<(), MetadataError> {
        let future = self.select_model(file_name)?;
        self.in_flight.push(future.boxed_local());
        Ok(())
    }

    /// Polls every layout started by [`Self::request_model`] once, committing
    /// those that are done. Returns true if the display changed.
    pub fn poll_layouts(&mut self) -> bool {
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        let mut changed = false;
        let mut running = vec![];
        for mut future in std::mem::take(&mut self.in_flight) {
            match future.poll_unpin(&mut cx) {
                Poll::Ready(outcome) => changed |= self.commit(outcome),
                Poll::Pending => running.push(future),
            }
        }
        self.in_flight = running;
        changed
    }

    /// Selects a model and drives its layout to completion on this thread.
    pub fn load_blocking(&mut self, file_name: &str) -> Result<&GraphDisplay, MetadataError> {
        let outcome = futures::executor::block_on(self.select_model(file_name)?);
        self.commit(outcome);
        Ok(&self.display)
    }

    pub fn reset_view(&mut self) {
        let bounds = self.display.layout().and_then(|x| x.bounding_rect());
        self.viewport.reset(bounds);
    }

    pub fn status_text(&self) -> Option<String> {
        if self.is_loading() {
            return Some("Loading Model Graph...".to_string());
        }
        match &self.display {
            GraphDisplay::Idle => Some("No model selected".to_string()),
            GraphDisplay::Ready(_) => None,
            GraphDisplay::EmptyGraph => Some(LayoutError::EmptyGraph.to_string()),
            GraphDisplay::Failed(err) => Some(err.to_string()),
        }
    }

    /// `Nodes: N | Edges: M | Scale: s | Position: (x, y)`
    pub fn debug_readout(&self) -> String {
        let (nodes, edges) = self
            .display
            .layout()
            .map(|x| (x.nodes.len(), x.edges.len()))
            .unwrap_or_default();
        let state = self.viewport.state();
        format!(
            "Nodes: {nodes} | Edges: {edges} | Scale: {:.2} | Position: ({:.0}, {:.0})",
            state.scale, state.offset_x, state.offset_y
        )
    }

    pub fn selection_details(&self) -> Option<NodeDetails> {
        let state = self.viewport.state();
        let id = state.selected.clone()?;
        let type_name = self
            .display
            .layout()
            .and_then(|x| x.node(&id))
            .map(|x| x.node.type_name())
            .unwrap_or_default();
        Some(NodeDetails {
            id,
            type_name,
            hovered: state.hovered.clone(),
        })
    }

    /// One frame of the explorer: commits finished layouts, then draws the
    /// debug line, toolbar, status, canvas and the details panel for the
    /// selected node. Picking another model starts its layout.
    pub fn show(&mut self, ui: &mut Ui) {
        self.poll_layouts();

        let mut requested = None;
        ui.horizontal_wrapped(|ui| {
            if let Some(layout) = self.display.layout() {
                ui.monospace(format!("Debug: {}", layout.summary()));
            }
            ui.label(self.debug_readout());
        });
        ui.horizontal(|ui| {
            let current = self.selected_model.clone().unwrap_or_default();
            egui::ComboBox::from_id_salt("model_select")
                .selected_text(current.clone())
                .show_ui(ui, |ui| {
                    for entry in self.catalog.entries() {
                        let is_current = entry.file_name == current;
                        let response = ui.selectable_label(is_current, &entry.file_name);
                        if response.clicked() && !is_current {
                            requested = Some(entry.file_name.clone());
                        }
                    }
                });
            if ui.button("+").clicked() {
                self.viewport.zoom_in();
            }
            if ui.button("-").clicked() {
                self.viewport.zoom_out();
            }
            if ui.button("Reset").clicked() {
                self.reset_view();
            }
            if self.is_loading() {
                ui.spinner();
            }
        });
        if let Some(status) = self.status_text() {
            ui.label(status);
        }
        GraphCanvas::new(self.display.layout()).show(ui, &mut self.viewport);

        if let Some(details) = self.selection_details() {
            let ctx = ui.ctx().clone();
            egui::Window::new("Node Details")
                .anchor(Align2::RIGHT_TOP, vec2(-16.0, 80.0))
                .collapsible(false)
                .resizable(false)
                .show(&ctx, |ui| {
                    ui.label(format!("ID: {}", details.id));
                    if !details.type_name.is_empty() {
                        ui.label(format!("Type: {}", details.type_name));
                    }
                    let hovered = details.hovered.as_ref().map(|x| x.to_string());
                    ui.label(format!("Hovered: {}", hovered.as_deref().unwrap_or("None")));
                    if ui.button("Close").clicked() {
                        self.viewport.clear_selection();
                    }
                });
        }

        if let Some(file_name) = requested {
            match self.request_model(&file_name) {
                Ok(()) => log::info!("Loading {file_name}"),
                Err(err) => log::warn!("Could not open {file_name}: {err}"),
            }
        }
        if self.is_loading() {
            ui.ctx().request_repaint();
        }
    }
}
