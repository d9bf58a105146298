use ego_tree::NodeId;
use scraper::{Html, Selector};

/// A script element pulled out of a fragment, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptDescriptor {
    pub attributes: Vec<(String, String)>,
    /// Inline code; always empty for external scripts.
    pub text: String,
}

impl ScriptDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Non-blank `src` attribute, if any.
    pub fn src(&self) -> Option<&str> {
        self.attribute("src").filter(|src| !src.trim().is_empty())
    }

    pub fn is_external(&self) -> bool {
        self.src().is_some()
    }
}

/// Static markup with every script removed, plus the removed scripts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedFragment {
    pub markup: String,
    pub scripts: Vec<ScriptDescriptor>,
}

impl ParsedFragment {
    pub fn is_empty(&self) -> bool {
        self.markup.is_empty() && self.scripts.is_empty()
    }
}

/// Parse an untrusted HTML fragment into stripped markup and ordered script descriptors.
///
/// The fragment is trimmed first. Parsing never fails: broken markup is
/// recovered by the HTML parser, and blank input yields an empty result.
pub fn parse_fragment(fragment: &str) -> ParsedFragment {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return ParsedFragment::default();
    }

    let mut doc = Html::parse_fragment(trimmed);
    let Ok(selector) = Selector::parse("script") else {
        return ParsedFragment::default();
    };

    let mut scripts = Vec::new();
    let mut script_ids: Vec<NodeId> = Vec::new();
    for element in doc.select(&selector) {
        let attributes: Vec<(String, String)> = element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        let mut descriptor = ScriptDescriptor {
            attributes,
            text: String::new(),
        };
        if !descriptor.is_external() {
            descriptor.text = element.text().collect();
        }
        scripts.push(descriptor);
        script_ids.push(element.id());
    }

    for id in script_ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    ParsedFragment {
        markup: doc.root_element().inner_html(),
        scripts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_extracted_in_document_order() {
        let parsed = parse_fragment(
            r#"
            <div id="plot">x</div>
            <script>window.a = 1;</script>
            <section><script src="https://cdn.example/plotly.js" charset="utf-8"></script></section>
            <script type="text/javascript">window.b = window.a + 1;</script>
            "#,
        );

        assert_eq!(parsed.scripts.len(), 3);
        assert_eq!(parsed.scripts[0].text, "window.a = 1;");
        assert_eq!(parsed.scripts[1].src(), Some("https://cdn.example/plotly.js"));
        assert_eq!(parsed.scripts[1].attribute("charset"), Some("utf-8"));
        assert_eq!(parsed.scripts[1].text, "");
        assert_eq!(parsed.scripts[2].attribute("type"), Some("text/javascript"));
        assert!(!parsed.markup.contains("<script"));
        assert!(parsed.markup.starts_with("<div id=\"plot\">x</div>"));
        assert!(parsed.markup.contains("<section></section>"));
    }

    #[test]
    fn blank_fragment_is_empty() {
        assert!(parse_fragment("").is_empty());
        assert!(parse_fragment("  \n\t ").is_empty());
    }

    #[test]
    fn malformed_markup_does_not_panic() {
        let parsed = parse_fragment("<div><span>unclosed <script>go()</script><<>>");
        assert_eq!(parsed.scripts.len(), 1);
        assert_eq!(parsed.scripts[0].text, "go()");
        assert!(!parsed.markup.contains("go()"));
    }

    #[test]
    fn empty_src_counts_as_inline() {
        let parsed = parse_fragment(r#"<script src="">inline()</script>"#);
        assert!(!parsed.scripts[0].is_external());
        assert_eq!(parsed.scripts[0].text, "inline()");
    }
}
