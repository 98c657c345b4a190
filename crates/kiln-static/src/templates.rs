//! Template engine for rendering pages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use minijinja::{path_loader, AutoEscape, Environment, Value};

use kiln_data::DataTree;

/// Context shared by every page of a render pass.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Key under which templates see the data tree (e.g. `data`)
    pub data_key: String,
    /// The data tree
    pub data: DataTree,
    /// Base URL, exposed unescaped as `root`
    pub root: String,
}

impl PageContext {
    fn to_map(&self) -> BTreeMap<String, Value> {
        let mut ctx = BTreeMap::new();
        ctx.insert(self.data_key.clone(), Value::from_serialize(&self.data));
        ctx.insert(
            "root".to_string(),
            Value::from_safe_string(self.root.clone()),
        );
        ctx
    }
}

/// Template engine using minijinja.
///
/// Templates are loaded lazily from the search roots, so a new engine must be
/// created to pick up edits.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine that resolves template names against `roots`, in order.
    pub fn new(roots: &[PathBuf]) -> Self {
        let mut env = Environment::new();

        let loaders: Vec<_> = roots.iter().cloned().map(path_loader).collect();
        env.set_loader(move |name| {
            for loader in &loaders {
                if let Some(source) = loader(name)? {
                    return Ok(Some(source));
                }
            }
            Ok(None)
        });

        // .njk is not a known extension; escape everything like HTML.
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_filter("markdown", markdown_filter);

        Self { env }
    }

    /// Render the named template with the page context.
    pub fn render_page(&self, name: &str, context: &PageContext) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(name)?;
        tmpl.render(context.to_map())
    }
}

fn markdown_filter(source: String) -> Value {
    Value::from_safe_string(render_markdown(&source))
}

/// Render markdown to HTML.
pub fn render_markdown(content: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(content, options);

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}
