//! Ordered, re-executable embedding of HTML fragments that carry scripts.
//!
//! Scripts parsed out of a fragment are never inserted as-is: each one is
//! recreated as a fresh element and attached in document order. An external
//! script blocks the chain until the host reports its load or error event.
//!
//! Every render starts a new chain with a fresh [`ChainToken`]. Load tickets
//! carry the token, so events from a superseded chain are ignored.

use std::collections::HashMap;

use dashboard_logging::{dashboard_trace, dashboard_warn};

use crate::fragment::{parse_fragment, ScriptDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainToken(u64);

/// Identifies one pending external script load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub container: String,
    pub chain: ChainToken,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEvent {
    Loaded,
    Failed,
}

/// A newly created script element built from a [`ScriptDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub attributes: Vec<(String, String)>,
    /// Set for inline scripts only.
    pub text: Option<String>,
}

impl ScriptElement {
    fn recreate(descriptor: &ScriptDescriptor) -> Self {
        let text = if descriptor.is_external() {
            None
        } else {
            Some(descriptor.text.clone())
        };
        Self {
            attributes: descriptor.attributes.clone(),
            text,
        }
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, value)| name.eq_ignore_ascii_case("src") && !value.trim().is_empty())
            .map(|(_, value)| value.as_str())
    }
}

/// The document the embedder writes into.
pub trait ScriptHost {
    /// Remove everything inside `container`.
    fn clear(&mut self, container: &str);

    fn append_markup(&mut self, container: &str, markup: &str);

    /// Attach an inline script; it has executed when this returns.
    fn run_inline(&mut self, container: &str, script: &ScriptElement);

    /// Attach an external script. The host later passes `ticket` to
    /// [`Embedder::on_script_event`] once the script loads or fails.
    fn begin_load(&mut self, container: &str, script: &ScriptElement, ticket: LoadTicket);

    /// Drop `container` from the document altogether.
    fn remove(&mut self, container: &str) {
        self.clear(container);
    }
}

#[derive(Debug)]
struct Chain {
    token: ChainToken,
    scripts: Vec<ScriptDescriptor>,
    cursor: usize,
    awaiting: Option<usize>,
}

impl Chain {
    fn is_settled(&self) -> bool {
        self.awaiting.is_none() && self.cursor >= self.scripts.len()
    }
}

pub struct Embedder<H: ScriptHost> {
    host: H,
    chains: HashMap<String, Chain>,
    next_token: u64,
}

impl<H: ScriptHost> Embedder<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            chains: HashMap::new(),
            next_token: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Containers that have been rendered and not released.
    pub fn containers(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Forget `container`: its chain is dropped and pending tickets become stale.
    pub fn release(&mut self, container: &str) {
        if self.chains.remove(container).is_some() {
            self.host.remove(container);
        }
    }

    /// Replace the contents of `container` with `fragment` and start its script chain.
    ///
    /// `None` or a blank fragment leaves the container empty.
    pub fn render(&mut self, container: &str, fragment: Option<&str>) -> ChainToken {
        self.next_token += 1;
        let token = ChainToken(self.next_token);
        self.chains.insert(
            container.to_string(),
            Chain {
                token,
                scripts: Vec::new(),
                cursor: 0,
                awaiting: None,
            },
        );
        self.host.clear(container);

        let parsed = fragment.map(parse_fragment).unwrap_or_default();
        if parsed.is_empty() {
            return token;
        }
        if !parsed.markup.is_empty() {
            self.host.append_markup(container, &parsed.markup);
        }
        if let Some(chain) = self.chains.get_mut(container) {
            chain.scripts = parsed.scripts;
        }
        self.advance(container);
        token
    }

    /// Continue the chain after an external script settled.
    ///
    /// Returns `false` when the ticket belongs to a superseded chain or was already used.
    pub fn on_script_event(&mut self, ticket: &LoadTicket, event: ScriptEvent) -> bool {
        let Some(chain) = self.chains.get_mut(&ticket.container) else {
            return false;
        };
        if chain.token != ticket.chain || chain.awaiting != Some(ticket.index) {
            dashboard_trace!(
                "Ignoring stale script event for {} #{}",
                ticket.container,
                ticket.index
            );
            return false;
        }
        if event == ScriptEvent::Failed {
            dashboard_warn!(
                "External script #{} in {} failed to load; continuing",
                ticket.index,
                ticket.container
            );
        }
        chain.awaiting = None;
        chain.cursor = ticket.index + 1;
        self.advance(&ticket.container);
        true
    }

    /// `true` once every script of the container's current chain has run.
    pub fn is_settled(&self, container: &str) -> bool {
        self.chains.get(container).is_none_or(Chain::is_settled)
    }

    fn advance(&mut self, container: &str) {
        let Some(chain) = self.chains.get_mut(container) else {
            return;
        };
        while chain.cursor < chain.scripts.len() {
            let index = chain.cursor;
            let element = ScriptElement::recreate(&chain.scripts[index]);
            if element.src().is_some() {
                chain.awaiting = Some(index);
                let ticket = LoadTicket {
                    container: container.to_string(),
                    chain: chain.token,
                    index,
                };
                self.host.begin_load(container, &element, ticket);
                return;
            }
            self.host.run_inline(container, &element);
            chain.cursor += 1;
        }
    }
}
