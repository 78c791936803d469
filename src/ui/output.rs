use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub dim: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() {
            return Self::plain();
        }
        Self::colored()
    }

    fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            dim: Style::new().white().dimmed(),
        }
    }

    fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            dim: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}

pub fn header(text: &str) {
    println!("📱 {}", text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("✅ {}", label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("❌ {}", label.style(theme().error.clone()));
}

pub fn info(label: &str, value: &str) {
    println!("{}: {}", label.style(theme().dim.clone()), value);
}
