pub mod banner;
pub mod tui;

/// Prints the welcome banner and applies the theme for all subsequent inquire prompts.
/// Call once before starting the dashboard.
pub fn init_ui() {
    banner::print_welcome();
    tui::apply_theme();
}
