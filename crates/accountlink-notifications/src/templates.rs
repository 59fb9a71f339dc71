use std::collections::HashMap;

use accountlink_auth::action::{
    EMAIL_CHANGE_TEMPLATE, RECOVERY_TEMPLATE, REGISTER_TEMPLATE, TOKEN_TEMPLATE,
};

use crate::error::NotificationError;

/// Values substituted into `{{variable}}` placeholders.
pub type MailContext = HashMap<String, serde_json::Value>;

/// Rendered mail content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub body: String,
    pub html_body: Option<String>,
}

impl Template {
    pub fn text(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            html_body: None,
        }
    }
}

/// Simple template renderer using {{variable}} syntax
pub struct TemplateRenderer {
    templates: HashMap<String, Template>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Renderer preloaded with the account mail templates.
    pub fn with_defaults() -> Self {
        let mut renderer = Self::new();
        renderer.register(Template::text(
            TOKEN_TEMPLATE,
            "Hello {{username}},\n\n\
             {{description}}\n\n\
             {{button_label}}: {{link}}\n\n\
             {{footer}}\n\n\
             {{site_name}}",
        ));
        renderer.register(Template::text(
            REGISTER_TEMPLATE,
            "Welcome to {{site_name}}, {{username}}!\n\n\
             Confirm your account here: {{link}}\n\n\
             {{site_name}}",
        ));
        renderer.register(Template::text(
            RECOVERY_TEMPLATE,
            "Hello {{username}},\n\n\
             The email address of your account was changed to {{new_email}}.\n\
             If this was not you, restore your previous address here: {{link}}\n\n\
             {{site_name}}",
        ));
        renderer.register(Template::text(
            EMAIL_CHANGE_TEMPLATE,
            "Hello {{username}},\n\n\
             This is now the email address of your {{site_name}} account.\n\
             Log in with it here: {{link}}\n\n\
             {{site_name}}",
        ));
        renderer
    }

    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&Template> {
        self.templates.get(template_id)
    }

    pub fn render(
        &self,
        template_id: &str,
        subject: &str,
        data: &MailContext,
    ) -> Result<RenderedContent, NotificationError> {
        let template = self
            .templates
            .get(template_id)
            .ok_or(NotificationError::TemplateNotFound(template_id.to_string()))?;

        Ok(RenderedContent {
            subject: render_string(subject, data),
            body: render_string(&template.body, data),
            html_body: template
                .html_body
                .as_ref()
                .map(|s| render_string(s, data)),
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn render_string(template: &str, data: &MailContext) -> String {
    let mut result = template.to_string();

    for (key, value) in data {
        let placeholder = format!("{{{{{}}}}}", key);
        let replacement = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => String::new(),
            _ => value.to_string(),
        };
        result = result.replace(&placeholder, &replacement);
    }

    result
}
