use chip_agent::ChatService;
use std::sync::Arc;

const INDEX_TEMPLATE: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    /// Rendered chat page served at `/`
    pub page: Arc<str>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, assistant_name: &str) -> Self {
        let page = INDEX_TEMPLATE.replace("{{assistant_name}}", &escape_html(assistant_name));
        Self {
            chat,
            page: page.into(),
        }
    }
}

/// Escape the assistant name for both element text and a quoted attribute
fn escape_html(raw: &str) -> String {
    html_escape::encode_double_quoted_attribute(raw).into_owned()
}
