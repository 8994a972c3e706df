use std::collections::BTreeSet;
use std::fmt::Write as _;

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::message::PublishState;
use crate::views::{
    ConfirmationView, ErrorView, FALLBACK_TEMPLATE, FormView, ListView, Screen, ScreenData,
    TemplateKey,
};

pub trait TemplateRenderer {
    fn has_template(&self, key: &str) -> bool;

    fn render(&mut self, key: &str, screen: &Screen) -> anyhow::Result<String>;
}

/// Picks the renderer key for a screen. Error pages without a registered
/// status template fall back to [`FALLBACK_TEMPLATE`]; `None` means nothing
/// can show this screen.
pub fn resolve_template<R: TemplateRenderer + ?Sized>(
    renderer: &R,
    template: TemplateKey,
) -> Option<&'static str> {
    let key = template.name();
    if renderer.has_template(key) {
        return Some(key);
    }
    match template {
        TemplateKey::Error(_) if renderer.has_template(FALLBACK_TEMPLATE) => {
            Some(FALLBACK_TEMPLATE)
        }
        _ => None,
    }
}

/// Plain-text templates for terminal output.
#[derive(Debug, Clone)]
pub struct TextRenderer {
    color: bool,
    templates: BTreeSet<&'static str>,
}

impl TextRenderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        let mut renderer = Self::plain();
        renderer.color = color;
        if cfg.get_bool("progress").unwrap_or(false) {
            renderer.templates.insert("transition");
        }
        Ok(renderer)
    }

    /// No colour, no transition screen.
    pub fn plain() -> Self {
        Self {
            color: false,
            templates: [
                "message-list",
                "message-form",
                "confirmation",
                "401",
                "404",
                FALLBACK_TEMPLATE,
            ]
            .into_iter()
            .collect(),
        }
    }

    fn render_list(&self, list: &ListView) -> anyhow::Result<String> {
        if list.messages.is_empty() {
            return Ok("No messages.\n".to_string());
        }

        let headers = ["ID", "State", "Level", "Begins", "Expires", "Tags", "Content", "Actions"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let rows = list
            .messages
            .iter()
            .map(|row| {
                let id = row
                    .message
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let state = match row.state {
                    PublishState::Published => self.paint(row.state.label(), "32"),
                    PublishState::Scheduled => self.paint(row.state.label(), "33"),
                    PublishState::Expired => self.paint(row.state.label(), "31"),
                };
                let actions = row
                    .controls
                    .iter()
                    .map(|control| control.kind.slug())
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![
                    self.paint(&id, "33"),
                    state,
                    row.level_name.to_string(),
                    row.begins_display.clone().unwrap_or_default(),
                    row.expires_display.clone().unwrap_or_else(|| "never".to_string()),
                    row.message.tags.join(", "),
                    first_line(&row.message.content),
                    actions,
                ]
            })
            .collect();

        let mut out = String::new();
        write_table(&mut out, headers, rows)?;
        Ok(out)
    }

    fn render_form(&self, view: &FormView) -> anyhow::Result<String> {
        let mut out = String::new();
        if let Some(error) = &view.error {
            writeln!(out, "{}", self.paint(&format!("error: {error}"), "31"))?;
        }
        writeln!(out, "content   {}", view.form.content)?;

        let levels = view
            .levels
            .iter()
            .map(|level| format!("({}) {}", if level.checked { "x" } else { " " }, level.name))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "level     {levels}")?;

        for group in &view.tag_groups {
            let tags = group
                .tags
                .iter()
                .map(|tag| format!("[{}] {}", if tag.checked { "x" } else { " " }, tag.name))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(out, "{:<9} {tags}", group.name)?;
        }

        writeln!(out, "begins    {}", view.form.begins)?;
        match &view.expires_min {
            Some(min) => writeln!(out, "expires   {} (after {min})", view.form.expires)?,
            None => writeln!(out, "expires   {}", view.form.expires)?,
        }
        Ok(out)
    }

    fn render_confirmation(&self, view: &ConfirmationView) -> anyhow::Result<String> {
        let mut out = String::new();
        let id = view
            .row
            .message
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "{}", self.paint(&format!("Message {id} saved."), "32"))?;
        writeln!(out, "state     {}", view.row.state.label())?;
        writeln!(out, "level     {}", view.row.level_name)?;
        writeln!(out, "content   {}", view.row.message.content)?;
        if let Some(begins) = &view.row.begins_display {
            writeln!(out, "begins    {begins}")?;
        }
        if let Some(expires) = &view.row.expires_display {
            writeln!(out, "expires   {expires}")?;
        }
        Ok(out)
    }

    fn render_error(&self, key: &str, view: &ErrorView) -> anyhow::Result<String> {
        let text = match key {
            "401" => format!("Not authorized to manage messages: {}", view.error),
            "404" => format!("Not found: {}", view.error),
            _ => match view.status {
                Some(status) => format!("Request failed (HTTP {status}): {}", view.error),
                None => format!("Request failed: {}", view.error),
            },
        };
        Ok(format!("{}\n", self.paint(&text, "31")))
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

impl TemplateRenderer for TextRenderer {
    fn has_template(&self, key: &str) -> bool {
        self.templates.contains(key)
    }

    #[tracing::instrument(skip(self, screen), fields(header = %screen.header))]
    fn render(&mut self, key: &str, screen: &Screen) -> anyhow::Result<String> {
        let body = match (key, &screen.data) {
            ("transition", _) => "...\n".to_string(),
            ("message-list", ScreenData::List(list)) => self.render_list(list)?,
            ("message-form", ScreenData::Form(form)) => self.render_form(form)?,
            ("confirmation", ScreenData::Confirmation(view)) => self.render_confirmation(view)?,
            (_, ScreenData::Error(view)) if self.has_template(key) => self.render_error(key, view)?,
            _ => return Err(anyhow!("template {key} cannot render this screen")),
        };

        if screen.header.is_empty() {
            return Ok(body);
        }
        Ok(format!("{}\n{}", self.paint(&screen.header, "1"), body))
    }
}

fn first_line(text: &str) -> String {
    const MAX_WIDTH: usize = 48;
    let line = text.lines().next().unwrap_or_default().trim();
    if UnicodeWidthStr::width(line) <= MAX_WIDTH {
        return line.to_string();
    }
    let mut out = String::new();
    for ch in line.chars() {
        if UnicodeWidthStr::width(out.as_str()) + 2 > MAX_WIDTH {
            break;
        }
        out.push(ch);
    }
    out.push('…');
    out
}

fn write_table(
    out: &mut String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(out, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(out)?;

    for width in &widths {
        write!(out, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(out)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(out, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
