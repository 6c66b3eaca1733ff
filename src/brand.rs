//! Realtor branding.
//!
//! Brand values are plain data. Pushing them onto a rendering surface goes
//! through [`ThemeSurface`] so nothing here touches global state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub name: String,
    pub ai_name: String,
    #[serde(default)]
    pub logo: String,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub background: String,
    pub surface: String,
    pub text_primary: String,
    pub text_secondary: String,
    pub border: String,
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub success: String,
    pub warning: String,
    pub error: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeVar {
    pub name: &'static str,
    pub value: String,
}

impl Theme {
    pub fn css_variables(&self) -> Vec<ThemeVar> {
        vec![
            ThemeVar {
                name: "--brand-primary",
                value: self.primary.clone(),
            },
            ThemeVar {
                name: "--brand-secondary",
                value: self.secondary.clone(),
            },
            ThemeVar {
                name: "--brand-accent",
                value: self.accent.clone(),
            },
            ThemeVar {
                name: "--brand-success",
                value: self.success.clone(),
            },
        ]
    }
}

impl Brand {
    /// Opening line of the intake chat.
    pub fn greeting(&self, client_name: &str) -> String {
        format!(
            "Hi {}! I'm {}, your private concierge for {}. Let's find your exceptional home.",
            client_name, self.ai_name, self.name
        )
    }

    pub fn apply_to(&self, surface: &mut dyn ThemeSurface) {
        for var in self.theme.css_variables() {
            surface.set_variable(var.name, &var.value);
        }
        surface.set_title(&self.name);
    }
}

/// Something that can display themed output.
pub trait ThemeSurface {
    fn set_variable(&mut self, name: &str, value: &str);
    fn set_title(&mut self, title: &str);
}

/// Collects variables into a `:root` stylesheet.
#[derive(Debug, Default)]
pub struct StyleSheet {
    title: String,
    variables: Vec<(String, String)>,
}

impl StyleSheet {
    pub fn for_brand(brand: &Brand) -> Self {
        let mut sheet = Self::default();
        brand.apply_to(&mut sheet);
        sheet
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn render(&self) -> String {
        let mut css = format!("/* {} */\n:root {{\n", self.title);
        for (name, value) in &self.variables {
            css.push_str(&format!("  {}: {};\n", name, value));
        }
        css.push_str("}\n");
        css
    }
}

impl ThemeSurface for StyleSheet {
    fn set_variable(&mut self, name: &str, value: &str) {
        match self.variables.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.variables.push((name.to_string(), value.to_string())),
        }
    }

    fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }
}
