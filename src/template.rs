//! Pluggable templating.

use std::sync::Arc;

use ahash::HashMap;
use parking_lot::RwLock;
use serde_json::Value;

/// Turns a template and resolved data into markup.
pub trait TemplateEngine: Send + Sync + 'static {
    /// Check a template when its element is defined.
    fn validate(&self, template: &str) -> anyhow::Result<()>;

    /// Render `template` with `data`.
    fn render(&self, template: &str, data: &Value) -> anyhow::Result<String>;
}

/// Mustache templates, backed by the [`mustache`] crate.
///
/// Variables (`{{name}}` escaped, `{{{name}}}` and `{{&name}}` raw), dotted names, sections,
/// inverted sections and comments all follow the mustache rules. Compiled templates are cached
/// by their source.
///
/// ```
/// use serde_json::json;
/// use volume_flow::{Interpolator, TemplateEngine};
///
/// let out = Interpolator::new()
///     .render("<p>{{greeting}} {{user.name}}</p>", &json!({"greeting": "hi", "user": {"name": "<b>"}}))
///     .unwrap();
/// assert_eq!(out, "<p>hi &lt;b&gt;</p>");
/// ```
#[derive(Default)]
pub struct Interpolator {
    compiled: RwLock<HashMap<String, Arc<mustache::Template>>>,
}

impl Interpolator {
    /// An engine with an empty template cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, template: &str) -> anyhow::Result<Arc<mustache::Template>> {
        if let Some(compiled) = self.compiled.read().get(template) {
            return Ok(compiled.clone());
        }
        let compiled = Arc::new(
            mustache::compile_str(template).map_err(|err| anyhow::anyhow!("{err}"))?,
        );
        self.compiled
            .write()
            .insert(template.to_owned(), compiled.clone());
        Ok(compiled)
    }
}

impl std::fmt::Debug for Interpolator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpolator")
            .field("compiled", &self.compiled.read().len())
            .finish()
    }
}

impl TemplateEngine for Interpolator {
    fn validate(&self, template: &str) -> anyhow::Result<()> {
        self.compile(template).map(drop)
    }

    fn render(&self, template: &str, data: &Value) -> anyhow::Result<String> {
        self.compile(template)?
            .render_to_string(data)
            .map_err(|err| anyhow::anyhow!("{err}"))
    }
}
