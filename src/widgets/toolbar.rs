use crate::theme::Theme;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolbarItem {
    /// Pushes every later item to the right edge.
    Spacer,
    Command {
        id: String,
        label: String,
        hint: Option<String>,
    },
}

/// Named, ordered toolbar items.
#[derive(Clone, Debug, Default)]
pub struct Toolbar {
    items: Vec<(String, ToolbarItem)>,
}

impl Toolbar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Returns false, leaving the toolbar unchanged, when the
    /// name is already taken.
    pub fn add_item(&mut self, name: impl Into<String>, item: ToolbarItem) -> bool {
        let name = name.into();
        if self.items.iter().any(|(n, _)| *n == name) {
            return false;
        }
        self.items.push((name, item));
        true
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &ToolbarItem> {
        self.items.iter().map(|(_, i)| i)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn button_spans(
        &self,
        items: &[&ToolbarItem],
        is_enabled: &dyn Fn(&str) -> bool,
        theme: &Theme,
    ) -> Vec<Span<'static>> {
        let mut spans = Vec::new();
        for item in items {
            if let ToolbarItem::Command { id, label, hint } = item {
                let style = if is_enabled(id) {
                    theme.text_active_bold()
                } else {
                    theme.text_muted()
                };
                let text = match hint {
                    Some(h) => format!("[ {label} {h} ]"),
                    None => format!("[ {label} ]"),
                };
                spans.push(Span::styled(text, style));
                spans.push(Span::raw(" "));
            }
        }
        spans
    }

    pub fn draw(
        &self,
        f: &mut Frame,
        area: Rect,
        is_enabled: &dyn Fn(&str) -> bool,
        theme: &Theme,
    ) {
        let split = self
            .items
            .iter()
            .position(|(_, i)| *i == ToolbarItem::Spacer)
            .unwrap_or(self.items.len());
        let left: Vec<&ToolbarItem> = self.items[..split].iter().map(|(_, i)| i).collect();
        let right: Vec<&ToolbarItem> = self.items[split..].iter().map(|(_, i)| i).collect();
        f.render_widget(
            Paragraph::new(Line::from(self.button_spans(&left, is_enabled, theme))),
            area,
        );
        f.render_widget(
            Paragraph::new(Line::from(self.button_spans(&right, is_enabled, theme)))
                .alignment(Alignment::Right),
            area,
        );
    }
}
