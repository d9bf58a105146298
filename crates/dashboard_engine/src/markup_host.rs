use std::collections::{HashMap, VecDeque};

use crate::{Embedder, LoadTicket, ScriptElement, ScriptEvent, ScriptHost};

/// Host that serializes each container to an HTML string.
///
/// Recreated scripts are written as plain `<script>` tags, which a browser
/// executes in document order when the markup is served. External loads are
/// queued until [`Embedder::settle_loads`] drains them.
#[derive(Debug, Default)]
pub struct MarkupHost {
    containers: HashMap<String, String>,
    pending: VecDeque<LoadTicket>,
}

impl MarkupHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markup(&self, container: &str) -> &str {
        self.containers.get(container).map_or("", String::as_str)
    }

    fn take_pending(&mut self) -> Option<LoadTicket> {
        self.pending.pop_front()
    }

    fn push_script(&mut self, container: &str, script: &ScriptElement) {
        let out = self.containers.entry(container.to_string()).or_default();
        out.push_str("<script");
        for (name, value) in &script.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        if let Some(text) = &script.text {
            out.push_str(text);
        }
        out.push_str("</script>");
    }
}

impl ScriptHost for MarkupHost {
    fn clear(&mut self, container: &str) {
        self.containers.insert(container.to_string(), String::new());
        self.pending.retain(|ticket| ticket.container != container);
    }

    fn append_markup(&mut self, container: &str, markup: &str) {
        self.containers
            .entry(container.to_string())
            .or_default()
            .push_str(markup);
    }

    fn run_inline(&mut self, container: &str, script: &ScriptElement) {
        self.push_script(container, script);
    }

    fn begin_load(&mut self, container: &str, script: &ScriptElement, ticket: LoadTicket) {
        self.push_script(container, script);
        self.pending.push_back(ticket);
    }

    fn remove(&mut self, container: &str) {
        self.containers.remove(container);
        self.pending.retain(|ticket| ticket.container != container);
    }
}

impl Embedder<MarkupHost> {
    /// Mark every queued external script as loaded so the chains run to completion.
    pub fn settle_loads(&mut self) {
        while let Some(ticket) = self.host_mut().take_pending() {
            self.on_script_event(&ticket, ScriptEvent::Loaded);
        }
    }

    /// Render `fragment` into `container` and return the settled markup.
    pub fn render_markup(&mut self, container: &str, fragment: Option<&str>) -> String {
        self.render(container, fragment);
        self.settle_loads();
        self.host().markup(container).to_string()
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}
