use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeName {
    Light,
    Dark,
}

impl ThemeName {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode {
            ThemeName::Dark
        } else {
            ThemeName::Light
        }
    }
}

/// Colours the UI draws with; one palette per theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub foreground: Color,
    pub muted: Color,
    pub accent: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
    pub heading: Color,
    pub code: Color,
    pub link: Color,
    pub quote: Color,
    pub error: Color,
}

impl Palette {
    pub fn for_theme(theme: ThemeName) -> Self {
        match theme {
            ThemeName::Dark => Self {
                background: Color::Rgb(30, 30, 30),
                foreground: Color::Rgb(212, 212, 212),
                muted: Color::Gray,
                accent: Color::Cyan,
                selection_bg: Color::Blue,
                selection_fg: Color::Black,
                heading: Color::Rgb(224, 224, 224),
                code: Color::Yellow,
                link: Color::Rgb(120, 174, 237),
                quote: Color::Gray,
                error: Color::LightRed,
            },
            ThemeName::Light => Self {
                background: Color::Rgb(250, 250, 250),
                foreground: Color::Rgb(34, 34, 34),
                muted: Color::DarkGray,
                accent: Color::Blue,
                selection_bg: Color::LightBlue,
                selection_fg: Color::Black,
                heading: Color::Black,
                code: Color::Magenta,
                link: Color::Blue,
                quote: Color::DarkGray,
                error: Color::Red,
            },
        }
    }

    pub fn for_dark_mode(dark_mode: bool) -> Self {
        Self::for_theme(ThemeName::from_dark_mode(dark_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_mode_selects_dark_palette() {
        assert_eq!(ThemeName::from_dark_mode(true), ThemeName::Dark);
        let dark = Palette::for_dark_mode(true);
        let light = Palette::for_dark_mode(false);
        assert_ne!(dark.background, light.background);
    }
}
