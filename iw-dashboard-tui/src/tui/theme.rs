use ratatui::style::Color;

pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub highlight: Color,
    pub accent: Color,
    pub muted: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub heat_low: (u8, u8, u8), // zip intensity scale endpoints
    pub heat_high: (u8, u8, u8),
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            bg: Color::Black,
            fg: Color::White,
            highlight: Color::Yellow,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            error: Color::Red,
            warning: Color::LightYellow,
            success: Color::LightGreen,
            heat_low: (32, 40, 48),
            heat_high: (255, 149, 0),
        }
    }
    pub fn light() -> Self {
        Self {
            bg: Color::White,
            fg: Color::Black,
            highlight: Color::Blue,
            accent: Color::DarkGray,
            muted: Color::Gray,
            error: Color::Red,
            warning: Color::LightYellow,
            success: Color::Green,
            heat_low: (240, 240, 240),
            heat_high: (200, 60, 20),
        }
    }
    pub fn nord() -> Self {
        Self {
            bg: Color::Rgb(46, 52, 64),
            fg: Color::Rgb(216, 222, 233),
            highlight: Color::Rgb(136, 192, 208),
            accent: Color::Rgb(129, 161, 193),
            muted: Color::Rgb(76, 86, 106),
            error: Color::Rgb(191, 97, 106),
            warning: Color::Rgb(235, 203, 139),
            success: Color::Rgb(163, 190, 140),
            heat_low: (59, 66, 82),
            heat_high: (208, 135, 112),
        }
    }
    pub fn catppuccin() -> Self {
        Self {
            bg: Color::Rgb(30, 30, 46),
            fg: Color::Rgb(205, 214, 244),
            highlight: Color::Rgb(137, 180, 250),
            accent: Color::Rgb(137, 220, 235),
            muted: Color::Rgb(108, 112, 134),
            error: Color::Rgb(243, 139, 168),
            warning: Color::Rgb(250, 179, 135),
            success: Color::Rgb(166, 227, 161),
            heat_low: (49, 50, 68),
            heat_high: (250, 179, 135),
        }
    }
    pub fn colorblind() -> Self {
        Self {
            bg: Color::Black,
            fg: Color::White,
            highlight: Color::Yellow,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            error: Color::Rgb(0xFF, 0x8C, 0x00), // orange instead of red
            warning: Color::LightYellow,
            success: Color::Rgb(0x00, 0x80, 0xFF), // blue instead of green
            heat_low: (0x10, 0x10, 0x40),
            heat_high: (0xFF, 0xD7, 0x00),
        }
    }
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            "nord" => Self::nord(),
            "catppuccin" => Self::catppuccin(),
            "colorblind" => Self::colorblind(),
            _ => Self::dark(),
        }
    }

    pub fn heat(&self, ratio: f64) -> Color {
        let (r, g, b) = iw_dashboard_core::intensity::lerp_rgb(self.heat_low, self.heat_high, ratio);
        Color::Rgb(r, g, b)
    }
}
