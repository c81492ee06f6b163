//! Startup banner for the terminal dashboard: "CALL DESK" with a vertical gradient.

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

/// Signal orange (#ff7a1a).
const SIGNAL_ORANGE: (u8, u8, u8) = (0xff, 0x7a, 0x1a);
/// Deep teal (#12b5a6).
const DEEP_TEAL: (u8, u8, u8) = (0x12, 0xb5, 0xa6);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let mix = |x: u8, y: u8| (f64::from(x) * (1.0 - t) + f64::from(y) * t).round() as u8;
    (mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

/// Figlet art for the title, or the plain title when the font is unavailable.
fn title_art() -> String {
    FIGfont::standard()
        .ok()
        .and_then(|font| font.convert("CALL DESK").map(|figure| figure.to_string()))
        .unwrap_or_else(|| "CALL DESK\n".to_string())
}

/// Prints the title with a gradient from orange to teal, then the version.
pub fn print_welcome() {
    let mut out = stdout();
    let art = title_art();
    let lines: Vec<&str> = art.lines().collect();
    let last = lines.len().saturating_sub(1).max(1);

    for (i, line) in lines.iter().enumerate() {
        let (r, g, b) = lerp_rgb(SIGNAL_ORANGE, DEEP_TEAL, i as f64 / last as f64);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
        let _ = out.execute(ResetColor);
    }

    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: DEEP_TEAL.0,
        g: DEEP_TEAL.1,
        b: DEEP_TEAL.2,
    }));
    let _ = out.execute(Print(format!(
        "GoHighLevel call recordings v{}\r\n",
        env!("CARGO_PKG_VERSION")
    )));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp_rgb(SIGNAL_ORANGE, DEEP_TEAL, 0.0), SIGNAL_ORANGE);
        assert_eq!(lerp_rgb(SIGNAL_ORANGE, DEEP_TEAL, 1.0), DEEP_TEAL);
    }

    #[test]
    fn test_title_art_not_empty() {
        assert!(!title_art().trim().is_empty());
    }
}
