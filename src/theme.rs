//! Dark palette shared by all panels

use eframe::egui::{self, Color32, Rounding, Stroke, Visuals};

pub const BASE: Color32 = Color32::from_rgb(0x1e, 0x1e, 0x2e);
pub const TEXT: Color32 = Color32::from_rgb(0xcd, 0xd6, 0xf4);
pub const SURFACE: Color32 = Color32::from_rgb(0x31, 0x32, 0x44);
pub const OVERLAY: Color32 = Color32::from_rgb(0x45, 0x47, 0x5a);
pub const ACCENT: Color32 = Color32::from_rgb(0x89, 0xb4, 0xfa);
pub const ACCENT_ACTIVE: Color32 = Color32::from_rgb(0x74, 0xc7, 0xec);
pub const DANGER: Color32 = Color32::from_rgb(0xf3, 0x8b, 0xa8);
pub const WARN: Color32 = Color32::from_rgb(0xf9, 0xe2, 0xaf);
pub const OK: Color32 = Color32::from_rgb(0xa6, 0xe3, 0xa1);
pub const MAUVE: Color32 = Color32::from_rgb(0xcb, 0xa6, 0xf7);
pub const MUTED: Color32 = Color32::from_rgb(0x6c, 0x70, 0x86);
pub const SUBTLE: Color32 = Color32::from_rgb(0x58, 0x5b, 0x70);

pub fn apply(ctx: &egui::Context) {
    let mut visuals = Visuals::dark();
    visuals.override_text_color = Some(TEXT);
    visuals.panel_fill = BASE;
    visuals.window_fill = BASE;
    visuals.window_stroke = Stroke::new(1.0, OVERLAY);
    visuals.extreme_bg_color = SURFACE;
    visuals.faint_bg_color = SURFACE;
    visuals.selection.bg_fill = OVERLAY;
    visuals.selection.stroke = Stroke::new(1.0, ACCENT);
    visuals.hyperlink_color = ACCENT;

    let rounding = Rounding::same(4.0);
    for widget in [
        &mut visuals.widgets.noninteractive,
        &mut visuals.widgets.inactive,
        &mut visuals.widgets.hovered,
        &mut visuals.widgets.active,
        &mut visuals.widgets.open,
    ] {
        widget.rounding = rounding;
    }
    visuals.widgets.noninteractive.bg_stroke = Stroke::new(1.0, OVERLAY);
    visuals.widgets.inactive.weak_bg_fill = SURFACE;
    visuals.widgets.inactive.bg_fill = SURFACE;
    visuals.widgets.hovered.weak_bg_fill = OVERLAY;
    visuals.widgets.hovered.bg_fill = OVERLAY;
    visuals.widgets.active.weak_bg_fill = OVERLAY;

    ctx.set_visuals(visuals);
}

/// Filled button in one of the palette's call-to-action colors.
pub fn filled_button(text: &str, fill: Color32) -> egui::Button<'static> {
    egui::Button::new(egui::RichText::new(text.to_owned()).strong().color(BASE))
        .fill(fill)
        .min_size(egui::vec2(0.0, 34.0))
}
