//! UI panels for the application
//!
//! Toolbar, records grid, selection summary, record popup, and the small
//! overlays drawn on top of the map.

use crate::app::state::{AppState, MessageLevel, SidebarTab, format_number_with_commas};
use egui::{Color32, RichText, Ui};
use footprint_lib::{BaseLayer, RecordId, SelectionSource, Status, ToolMode};

const ROW_HEIGHT: f32 = 22.0;

/// Render the top toolbar: tools, view actions and the search box
pub fn toolbar(ctx: &egui::Context, state: &mut AppState) {
    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal_wrapped(|ui| {
            let mode = state.engine.tool_mode();
            if ui
                .selectable_label(mode == ToolMode::Box, "▭ Box")
                .on_hover_text("Click two corners to select everything inside")
                .clicked()
            {
                state.engine.select_tool(ToolMode::Box);
            }
            if ui
                .selectable_label(mode == ToolMode::Radius, "◯ Radius")
                .on_hover_text("Drag from a center to select everything within the circle")
                .clicked()
            {
                state.engine.select_tool(ToolMode::Radius);
            }
            if mode != ToolMode::None && ui.button("✕ Cancel").clicked() {
                state.engine.cancel_tool();
            }

            ui.separator();

            if ui.button("🗑 Clear selection").clicked() {
                state.engine.clear_selection();
            }
            if ui.button("🎯 Fit").on_hover_text("Fit map to all features").clicked() {
                state.pending_fit_bounds = true;
            }
            if ui.button("📍 Recenter").on_hover_text("Center on my location").clicked() {
                state.recenter();
            }

            ui.separator();

            let mut show_labels = state.engine.show_labels();
            if ui.checkbox(&mut show_labels, "Labels").changed() {
                state.engine.set_show_labels(show_labels);
            }
            base_layer_picker(ui, state);

            ui.separator();

            let search = ui.add(
                egui::TextEdit::singleline(&mut state.search_text)
                    .hint_text("🔍 Search records...")
                    .desired_width(220.0),
            );
            if search.changed() {
                tracing::trace!(text = %state.search_text, "Search edited");
            }
            if state.loader.is_busy() {
                ui.spinner();
            }
        });
    });
}

fn base_layer_picker(ui: &mut Ui, state: &mut AppState) {
    let current = state.engine.base_layer();
    let layers = [
        (BaseLayer::Osm, "🗺 Streets"),
        (BaseLayer::Satellite, "🛰 Satellite"),
    ];
    for (layer, name) in layers {
        if ui.selectable_label(current == layer, name).clicked() {
            state.engine.set_base_layer(layer);
        }
    }
}

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());

    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the main sidebar (responsive: side on landscape, bottom on portrait)
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    let screen_size = ctx.viewport_rect().size();
    if screen_size.y > screen_size.x {
        egui::TopBottomPanel::bottom("main_sidebar")
            .default_height(300.0)
            .min_height(180.0)
            .max_height(ctx.viewport_rect().height() * 0.6)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state));
    } else {
        egui::SidePanel::right("main_sidebar")
            .default_width(420.0)
            .min_width(300.0)
            .max_width(640.0)
            .resizable(true)
            .show(ctx, |ui| render_sidebar_content(ui, state));
    }
}

fn render_sidebar_content(ui: &mut Ui, state: &mut AppState) {
    let selected = state.selected_count();
    ui.horizontal(|ui| {
        ui.selectable_value(
            &mut state.ui_settings.active_tab,
            SidebarTab::Records,
            "📋 Records",
        );
        ui.selectable_value(
            &mut state.ui_settings.active_tab,
            SidebarTab::Selection,
            format!("✔ Selection ({selected})"),
        );
        ui.selectable_value(
            &mut state.ui_settings.active_tab,
            SidebarTab::Settings,
            "⚙ Settings",
        );
    });

    ui.separator();
    render_messages(ui, state);

    match state.ui_settings.active_tab {
        SidebarTab::Records => render_records_tab(ui, state),
        SidebarTab::Selection => render_selection_tab(ui, state),
        SidebarTab::Settings => {
            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| render_settings_tab(ui, state));
        }
    }
}

fn render_messages(ui: &mut Ui, state: &mut AppState) {
    if state.messages.is_empty() {
        return;
    }

    let mut dismiss = None;
    for (idx, message) in state.messages.iter().enumerate() {
        let (icon, color) = match message.level {
            MessageLevel::Info => ("ℹ", ui.visuals().text_color()),
            MessageLevel::Error => ("⚠", Color32::RED),
        };
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("{icon} {}", message.text)).small().color(color));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("✕").clicked() {
                    dismiss = Some(idx);
                }
            });
        });
    }
    if let Some(idx) = dismiss {
        state.messages.remove(idx);
    }
    ui.separator();
}

enum RowAction {
    Toggle(RecordId),
    Show(RecordId),
}

/// Render the Records tab: summary, filters and the grid
fn render_records_tab(ui: &mut Ui, state: &mut AppState) {
    render_summary(ui, state);
    ui.add_space(4.0);

    ui.horizontal(|ui| {
        ui.checkbox(&mut state.ui_settings.only_in_view, "Only in view");
        if ui
            .button("Select in view")
            .on_hover_text("Replace the selection with every feature in view")
            .clicked()
        {
            let ids: Vec<RecordId> = state.engine.viewport().in_view_ids().collect();
            state.engine.set_grid_selection(ids);
        }
        if ui.button("📂 Open...").clicked() {
            state.loader.show_picker = true;
        }
    });
    ui.separator();

    let rows = state.visible_rows();
    if rows.is_empty() {
        let text = if state.loader.source.is_none() {
            "No records loaded. Open a JSON file or drop one onto the window."
        } else if state.loader.is_busy() {
            "Loading..."
        } else {
            "No matching records"
        };
        ui.label(RichText::new(text).weak());
        return;
    }

    grid_header(ui);

    let mut actions = Vec::new();
    egui::ScrollArea::vertical()
        .id_salt("records_grid")
        .auto_shrink([false, false])
        .show_rows(ui, ROW_HEIGHT, rows.len(), |ui, range| {
            for &id in &rows[range] {
                let Some(record) = state.engine.record(id) else {
                    continue;
                };
                let has_feature = state.engine.index().contains(id);
                let mut checked = state.engine.is_selected(id);

                ui.horizontal(|ui| {
                    ui.set_height(ROW_HEIGHT);
                    if ui.checkbox(&mut checked, "").changed() {
                        actions.push(RowAction::Toggle(id));
                    }
                    status_swatch(ui, &record.status);
                    let id_label = ui.add_sized(
                        [56.0, ROW_HEIGHT],
                        egui::Label::new(RichText::new(id.to_string()).monospace())
                            .sense(egui::Sense::click()),
                    );
                    ui.add_sized(
                        [120.0, ROW_HEIGHT],
                        egui::Label::new(record.label()).truncate(),
                    );
                    ui.add_sized(
                        [90.0, ROW_HEIGHT],
                        egui::Label::new(
                            RichText::new(Status::parse(&record.status).label()).small(),
                        )
                        .truncate(),
                    );
                    ui.add_sized(
                        [70.0, ROW_HEIGHT],
                        egui::Label::new(RichText::new(&record.priority).small()).truncate(),
                    );
                    if has_feature {
                        if ui.small_button("🔎").on_hover_text("Show on map").clicked()
                            || id_label.clicked()
                        {
                            actions.push(RowAction::Show(id));
                        }
                    } else {
                        ui.label(RichText::new("no geometry").small().weak());
                    }
                });
            }
        });

    for action in actions {
        match action {
            RowAction::Toggle(id) => {
                state.engine.toggle_grid_row(id);
            }
            RowAction::Show(id) => {
                state.engine.open_popup(id);
                state.pending_zoom_to = vec![id];
            }
        }
    }
}

fn grid_header(ui: &mut Ui) {
    ui.horizontal(|ui| {
        ui.add_space(24.0 + 14.0);
        let columns = [
            ("Id", 56.0),
            ("Site / Name", 120.0),
            ("Status", 90.0),
            ("Priority", 70.0),
        ];
        for (title, width) in columns {
            ui.add_sized([width, ROW_HEIGHT], egui::Label::new(RichText::new(title).strong()));
        }
    });
}

fn status_swatch(ui: &mut Ui, status: &str) {
    let color = Status::parse(status).color();
    let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
    ui.painter().circle_filled(
        rect.center(),
        5.0,
        Color32::from_rgb(color.r, color.g, color.b),
    );
}

/// Counts shown above the grid
fn render_summary(ui: &mut Ui, state: &AppState) {
    let engine = &state.engine;
    let selected = state.selected_count();
    egui::Grid::new("summary_grid")
        .num_columns(2)
        .spacing([12.0, 2.0])
        .show(ui, |ui| {
            ui.label("Records:");
            ui.label(RichText::new(format_number_with_commas(engine.records().len())).strong());
            ui.end_row();

            ui.label("On map:");
            ui.label(RichText::new(format_number_with_commas(engine.index().len())).strong());
            ui.end_row();

            ui.label("In view:");
            let in_view = engine.viewport().in_view_count();
            ui.label(RichText::new(format_number_with_commas(in_view)).strong());
            ui.end_row();

            ui.label("Selected:");
            ui.label(
                RichText::new(format_number_with_commas(selected))
                    .strong()
                    .color(ui.visuals().selection.stroke.color),
            );
            ui.end_row();
        });
}

/// Render the Selection tab: what is selected and where it came from
fn render_selection_tab(ui: &mut Ui, state: &mut AppState) {
    let projection = state.engine.selection_projection();

    ui.label(RichText::new(format!("{} selected", projection.selected_count())).strong());
    if let Some((count, source)) = *state.last_change.borrow() {
        ui.label(
            RichText::new(format!("Last change: {count} from {}", source_name(source)))
                .small()
                .weak(),
        );
    }
    if !projection.stale.is_empty() {
        ui.label(
            RichText::new(format!(
                "{} selected id(s) are not in the current results",
                projection.stale.len()
            ))
            .small()
            .color(ui.visuals().warn_fg_color),
        )
        .on_hover_text(format!("{:?}", projection.stale));
    }

    ui.horizontal(|ui| {
        if ui.button("🗑 Clear").clicked() {
            state.engine.clear_selection();
        }
        if ui.button("🎯 Zoom to selection").clicked() {
            state.pending_zoom_to = projection.highlighted.iter().copied().collect();
        }
    });
    ui.separator();

    let mut actions = Vec::new();
    egui::ScrollArea::vertical()
        .id_salt("selection_list")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for record in state.engine.selected_records() {
                ui.horizontal(|ui| {
                    status_swatch(ui, &record.status);
                    ui.label(RichText::new(record.id.to_string()).monospace());
                    ui.label(record.label());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✕").on_hover_text("Deselect").clicked() {
                            actions.push(RowAction::Toggle(record.id));
                        }
                        if projection.highlighted.contains(&record.id)
                            && ui.small_button("🔎").on_hover_text("Show on map").clicked()
                        {
                            actions.push(RowAction::Show(record.id));
                        }
                    });
                });
            }
        });

    for action in actions {
        match action {
            RowAction::Toggle(id) => {
                state.engine.toggle_grid_row(id);
            }
            RowAction::Show(id) => {
                state.engine.open_popup(id);
                state.pending_zoom_to = vec![id];
            }
        }
    }
}

fn source_name(source: SelectionSource) -> &'static str {
    match source {
        SelectionSource::Grid => "grid",
        SelectionSource::MapClick => "map click",
        SelectionSource::Popup => "popup",
        SelectionSource::BoxQuery => "box query",
        SelectionSource::RadiusQuery => "radius query",
        SelectionSource::Programmatic => "program",
    }
}

/// Render the Settings tab
fn render_settings_tab(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🗺 Map").strong());
    ui.add_space(6.0);

    ui.horizontal(|ui| base_layer_picker(ui, state));
    let mut show_labels = state.engine.show_labels();
    if ui.checkbox(&mut show_labels, "Show feature labels").changed() {
        state.engine.set_show_labels(show_labels);
    }

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    ui.label(RichText::new("📂 Data").strong());
    ui.add_space(6.0);

    egui::Grid::new("data_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Source:");
            ui.label(state.loader.source_name().unwrap_or_else(|| "none".to_string()));
            ui.end_row();

            if let Some(stats) = state.loader.last_stats {
                ui.label("Drawable:");
                ui.label(format_number_with_commas(stats.features));
                ui.end_row();

                ui.label("Invalid geometry:");
                ui.label(format_number_with_commas(stats.invalid));
                ui.end_row();

                ui.label("No geometry:");
                ui.label(format_number_with_commas(stats.missing));
                ui.end_row();

                ui.label("Parsed / reused:");
                ui.label(format!("{} / {}", stats.parsed, stats.reused));
                ui.end_row();

                ui.label("Last fetch:");
                let fetch_ms = state.loader.last_fetch_ms;
                let color = if fetch_ms < 100.0 {
                    Color32::GREEN
                } else if fetch_ms < 500.0 {
                    Color32::YELLOW
                } else {
                    Color32::RED
                };
                ui.label(RichText::new(format!("{fetch_ms:.0} ms")).color(color));
                ui.end_row();
            }
        });

    ui.add_space(4.0);
    if ui.button("🔄 Refetch").clicked() {
        state.search.cancel();
        state.start_fetch(ui.ctx());
    }

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    ui.label(RichText::new("ℹ About").strong());
    ui.add_space(4.0);
    ui.label(RichText::new("Footprint Viewer").small());
    ui.label(
        RichText::new("Map and records grid with one shared selection")
            .small()
            .weak(),
    );
    ui.add_space(4.0);
    ui.label(RichText::new("Keyboard shortcuts:").small());
    ui.label(RichText::new("  F1 / Ctrl+H - Toggle help").small().weak());
    ui.label(RichText::new("  Esc - Cancel the active tool").small().weak());
    ui.label(RichText::new("  Ctrl/Shift + Click - Add or remove a feature").small().weak());
}

/// Popup for the record last clicked on the map or shown from the grid
pub fn record_popup(ctx: &egui::Context, state: &mut AppState) {
    let Some(record) = state.engine.popup_record() else {
        return;
    };

    let id = record.id;
    let selected = state.engine.is_selected(id);
    let rows: Vec<(&str, String)> = [
        ("Site", record.site_id.clone()),
        ("Name", record.name.clone()),
        ("Status", Some(Status::parse(&record.status).label().to_string())),
        ("Priority", Some(record.priority.clone())),
        ("Team", record.team.clone()),
        ("Assignee", record.assignee.clone()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.filter(|v| !v.is_empty()).map(|v| (key, v)))
    .collect();

    let mut open = true;
    let mut toggle = false;
    egui::Window::new(format!("Record {id}"))
        .id(egui::Id::new("record_popup"))
        .open(&mut open)
        .collapsible(false)
        .resizable(false)
        .default_width(240.0)
        .anchor(egui::Align2::LEFT_TOP, [12.0, 12.0])
        .show(ctx, |ui| {
            egui::Grid::new("popup_grid")
                .num_columns(2)
                .spacing([12.0, 4.0])
                .show(ui, |ui| {
                    for (key, value) in &rows {
                        ui.label(RichText::new(*key).weak());
                        ui.label(value.as_str());
                        ui.end_row();
                    }
                });
            ui.add_space(6.0);
            let text = if selected { "Deselect" } else { "Select" };
            if ui.button(text).clicked() {
                toggle = true;
            }
        });

    if toggle {
        state.engine.toggle_popup_record();
    }
    if !open {
        state.engine.close_popup();
    }
}

/// Hint shown on the map while a selection tool is active
pub fn tool_hint(ui: &mut Ui, state: &AppState) {
    let text = match state.engine.tool_mode() {
        ToolMode::None => return,
        ToolMode::Box if state.engine.interaction().is_drawing() => "Click the opposite corner",
        ToolMode::Box => "Click the first corner",
        ToolMode::Radius => "Drag from the center outwards",
    };

    let rect = ui.max_rect();
    let size = egui::vec2(300.0, 36.0);
    let hint_rect = egui::Rect::from_center_size(
        rect.center_top() + egui::vec2(0.0, 12.0 + size.y / 2.0),
        size,
    );
    ui.painter()
        .rect_filled(hint_rect, 10.0, Color32::from_black_alpha(180));
    ui.painter().text(
        hint_rect.center(),
        egui::Align2::CENTER_CENTER,
        format!("{text} · Esc to cancel"),
        egui::FontId::proportional(14.0),
        Color32::WHITE,
    );
}

/// Show file picker dialog
pub fn show_file_picker(ctx: &egui::Context, state: &mut AppState) {
    if !state.loader.show_picker {
        return;
    }
    state.loader.show_picker = false;

    if let Some(path) = rfd::FileDialog::new()
        .add_filter("JSON records", &["json"])
        .set_title("Open records file")
        .pick_file()
    {
        state.open_file(path, ctx);
    }
}

/// Help overlay
pub fn help_overlay(ctx: &egui::Context, show_help: &mut bool) {
    egui::Window::new("Help")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.heading("Footprint Viewer");
            ui.add_space(8.0);

            ui.label("The map and the records grid share one selection.");
            ui.add_space(12.0);

            ui.label(RichText::new("Selecting").strong());
            ui.label("• Tick rows in the grid");
            ui.label("• Ctrl or Shift + Click a feature to add or remove it");
            ui.label("• ▭ Box: click two corners");
            ui.label("• ◯ Radius: drag from the center outwards");
            ui.add_space(8.0);

            ui.label(RichText::new("Navigation").strong());
            ui.label("• Click a feature to see its details");
            ui.label("• Drag to pan, scroll to zoom");
            ui.label("• 'Fit' shows every feature");
            ui.add_space(8.0);

            ui.label(RichText::new("Keyboard Shortcuts").strong());
            ui.label("• F1 or Ctrl+H - Toggle this help");
            ui.label("• Esc - Cancel the active tool");
            ui.add_space(12.0);

            if ui.button("Close").clicked() {
                *show_help = false;
            }
        });
}

/// Handle drag and drop of a JSON records file
pub fn handle_drag_and_drop(ctx: &egui::Context, state: &mut AppState) {
    let hovered_files = ctx.input(|i| !i.raw.hovered_files.is_empty());
    let dropped_files: Vec<_> = ctx.input(|i| i.raw.dropped_files.clone());

    if hovered_files {
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("drop_preview"),
        ));
        let screen_rect = ctx.content_rect();
        let bg_rect = egui::Rect::from_center_size(screen_rect.center(), egui::vec2(380.0, 80.0));
        painter.rect_filled(bg_rect, 16.0, Color32::from_black_alpha(180));
        painter.text(
            screen_rect.center(),
            egui::Align2::CENTER_CENTER,
            "📂 Drop a JSON file here",
            egui::FontId::proportional(28.0),
            Color32::WHITE,
        );
    }

    // Only the last JSON file counts; there is a single record source
    let dropped = dropped_files
        .into_iter()
        .filter_map(|file| file.path)
        .filter(|path| path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")))
        .next_back();
    if let Some(path) = dropped {
        state.open_file(path, ctx);
    }
}
