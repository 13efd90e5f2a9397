use ratatui::style::Color;

use crate::preferences::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub panel_bg: Color,
    pub panel_focused_bg: Color,
    pub panel_selected_bg: Color,
    pub border_idle: Color,
    pub border_focused: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub accent: Color,
    pub highlight: Color,
    pub success: Color,
    pub error: Color,
}

pub const DARK: Palette = Palette {
    bg: Color::Rgb(30, 30, 46),
    panel_bg: Color::Rgb(24, 24, 36),
    panel_focused_bg: Color::Rgb(49, 50, 68),
    panel_selected_bg: Color::Rgb(69, 71, 90),
    border_idle: Color::Rgb(49, 50, 68),
    border_focused: Color::Rgb(137, 180, 250),
    text_primary: Color::Rgb(205, 214, 244),
    text_secondary: Color::Rgb(166, 173, 200),
    accent: Color::Rgb(137, 180, 250),
    highlight: Color::Rgb(249, 226, 175),
    success: Color::Rgb(166, 227, 161),
    error: Color::Rgb(243, 139, 168),
};

/// Warm paper tones for the default theme.
pub const LIGHT: Palette = Palette {
    bg: Color::Rgb(250, 246, 238),
    panel_bg: Color::Rgb(241, 234, 220),
    panel_focused_bg: Color::Rgb(228, 218, 198),
    panel_selected_bg: Color::Rgb(214, 200, 174),
    border_idle: Color::Rgb(214, 200, 174),
    border_focused: Color::Rgb(139, 69, 19),
    text_primary: Color::Rgb(51, 40, 30),
    text_secondary: Color::Rgb(112, 96, 80),
    accent: Color::Rgb(139, 69, 19),
    highlight: Color::Rgb(178, 34, 34),
    success: Color::Rgb(64, 128, 43),
    error: Color::Rgb(190, 30, 45),
};

pub fn palette(theme: Theme) -> &'static Palette {
    match theme {
        Theme::Light => &LIGHT,
        Theme::Dark => &DARK,
    }
}
