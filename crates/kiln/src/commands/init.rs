//! Scaffold a new kiln project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files created by `kiln init`, relative to the project directory.
const SCAFFOLD: &[(&str, &str)] = &[
    ("src/layouts/base.njk", DEFAULT_LAYOUT),
    ("src/partials/nav.njk", DEFAULT_NAV),
    ("src/pages/index.njk", DEFAULT_INDEX),
    ("src/data/site/title.json", "\"My Site\"\n"),
    ("src/data/nav/items.json", DEFAULT_NAV_ITEMS),
    ("src/assets/js/app.js", DEFAULT_SCRIPT),
    ("src/assets/css/app.css", DEFAULT_STYLE),
    ("src/static/robots.txt", "User-agent: *\nAllow: /\n"),
];

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln...");

    let project_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let src_dir = project_dir.join("src");

    if src_dir.exists() && !yes {
        tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    write_file(config_path, DEFAULT_CONFIG, yes)?;
    for (relative, contents) in SCAFFOLD {
        write_file(&project_dir.join(relative), contents, yes)?;
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'kiln build --serve --watch' to start developing.");

    Ok(())
}

fn write_file(path: &Path, contents: &str, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Created {}", path.display());

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Kiln Configuration

[site]
# Source directory
src = "src"

# Output directory for disk builds
dist = "dist"

# Base URL, available to templates as `root`
base_url = "/"

[server]
host = "127.0.0.1"
port = 3000
open = true

[build]
# Collapse HTML whitespace in production builds
minify_html = true

# Desktop notifications for build problems
notify = true
"#;

const DEFAULT_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% block title %}{{ data.site.title }}{% endblock %}</title>
  <link rel="stylesheet" href="{{ root }}assets/css/app.css">
</head>
<body>
  {% include "partials/nav.njk" %}
  <main>
    {% block content %}{% endblock %}
  </main>
  <script type="module" src="{{ root }}assets/js/app.js"></script>
</body>
</html>
"#;

const DEFAULT_NAV: &str = r#"<nav>
  <ul>
    {% for item in data.nav.items %}
    <li><a href="{{ root }}{{ item.href }}">{{ item.label }}</a></li>
    {% endfor %}
  </ul>
</nav>
"#;

const DEFAULT_INDEX: &str = r#"{% extends "layouts/base.njk" %}

{% block content %}
<h1>{{ data.site.title }}</h1>

{{ "Pages live in `src/pages`, data in `src/data`." | markdown }}
{% endblock %}
"#;

const DEFAULT_NAV_ITEMS: &str = r#"[
  { "label": "Home", "href": "" }
]
"#;

const DEFAULT_SCRIPT: &str = r#"document.documentElement.classList.add('js');
"#;

const DEFAULT_STYLE: &str = r#"body {
  font-family: system-ui, sans-serif;
  margin: 0 auto;
  max-width: 48rem;
  padding: 0 1rem;
}
"#;
