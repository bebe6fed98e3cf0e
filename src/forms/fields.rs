use std::{collections::HashMap, sync::Arc};

use tracing::warn;

use super::schema::{FieldDefinition, FieldKind};
use crate::web::escape_html;

/// What a widget needs to draw one question.
pub struct FieldView<'a> {
    pub field: &'a FieldDefinition,
    /// 1-based position within the subsection.
    pub position: usize,
    pub value: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Renderer and validator for one [`FieldKind`].
pub trait FieldWidget: Send + Sync {
    fn render(&self, view: &FieldView<'_>) -> String;

    /// Checks a non-empty submitted value. Empty values always mean "unanswered".
    fn validate(&self, field: &FieldDefinition, value: &str) -> Result<(), String>;
}

#[derive(Clone)]
pub struct FieldRegistry {
    widgets: HashMap<FieldKind, Arc<dyn FieldWidget>>,
}

impl FieldRegistry {
    pub fn empty() -> Self {
        Self {
            widgets: HashMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(FieldKind::Radio, Arc::new(RadioWidget));
        registry.register(FieldKind::Text, Arc::new(TextWidget));
        registry
    }

    pub fn register(&mut self, kind: FieldKind, widget: Arc<dyn FieldWidget>) {
        self.widgets.insert(kind, widget);
    }

    pub fn render(&self, view: &FieldView<'_>) -> String {
        match self.widgets.get(&view.field.kind) {
            Some(widget) => widget.render(view),
            None => {
                warn!(kind = ?view.field.kind, field = %view.field.name, "no widget registered");
                String::new()
            }
        }
    }

    pub fn validate(&self, field: &FieldDefinition, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Ok(());
        }
        match self.widgets.get(&field.kind) {
            Some(widget) => widget.validate(field, value),
            None => Err("This question cannot be answered here.".to_string()),
        }
    }
}

fn render_heading(view: &FieldView<'_>) -> String {
    let marker = if view.field.required {
        r#" <span class="required">*</span>"#
    } else {
        ""
    };
    format!(
        r#"<p class="field-label">{position}. {label}{marker}</p>"#,
        position = view.position,
        label = escape_html(&view.field.label),
    )
}

fn render_error(view: &FieldView<'_>) -> String {
    view.error
        .map(|error| format!(r#"<p class="field-error">{}</p>"#, escape_html(error)))
        .unwrap_or_default()
}

struct RadioWidget;

impl FieldWidget for RadioWidget {
    fn render(&self, view: &FieldView<'_>) -> String {
        let name = escape_html(&view.field.name);
        let options = view
            .field
            .options
            .iter()
            .map(|option| {
                let checked = if view.value == Some(option.as_str()) {
                    " checked"
                } else {
                    ""
                };
                format!(
                    r#"<label class="radio-option"><input type="radio" name="{name}" value="{value}"{checked}> {value}</label>"#,
                    value = escape_html(option),
                )
            })
            .collect::<String>();

        format!(
            r#"<div class="field-card">{heading}<div class="radio-row">{options}</div>{error}</div>"#,
            heading = render_heading(view),
            error = render_error(view),
        )
    }

    fn validate(&self, field: &FieldDefinition, value: &str) -> Result<(), String> {
        if field.options.iter().any(|option| option == value) {
            Ok(())
        } else {
            Err(format!("'{value}' is not one of the available options."))
        }
    }
}

struct TextWidget;

impl FieldWidget for TextWidget {
    fn render(&self, view: &FieldView<'_>) -> String {
        format!(
            r#"<div class="field-card">{heading}<input type="text" name="{name}" value="{value}">{error}</div>"#,
            heading = render_heading(view),
            name = escape_html(&view.field.name),
            value = escape_html(view.value.unwrap_or_default()),
            error = render_error(view),
        )
    }

    fn validate(&self, field: &FieldDefinition, value: &str) -> Result<(), String> {
        match &field.pattern {
            Some(pattern) if !pattern.is_match(value) => {
                Err("The answer is not in the expected format.".to_string())
            }
            _ => Ok(()),
        }
    }
}
