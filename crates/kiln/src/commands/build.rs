//! Site build command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use kiln_server::{DevServer, DevServerConfig, Rebuilder};
use kiln_static::{
    report_problems, BuildConfig, DesktopNotifier, MemoryOutput, Notifier, OutputTarget,
    SilentNotifier, StaticBuilder,
};

use crate::config::ConfigFile;

/// Modes selected on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildMode {
    pub production: bool,
    pub serve: bool,
    pub watch: bool,
}

/// Run the build command.
pub async fn run(config: &ConfigFile, project_dir: PathBuf, mode: BuildMode) -> Result<()> {
    // Serving always builds into memory.
    let output = if mode.serve {
        OutputTarget::Memory(MemoryOutput::new())
    } else {
        OutputTarget::Disk(project_dir.join(&config.site.dist))
    };

    let builder = Arc::new(StaticBuilder::new(BuildConfig {
        project_dir,
        src_dir: PathBuf::from(&config.site.src),
        output,
        production: mode.production,
        base_url: config.site.base_url.clone(),
        minify_html: config.build.minify_html,
    }));

    let notifier: Arc<dyn Notifier> = if config.build.notify {
        Arc::new(DesktopNotifier::new())
    } else {
        Arc::new(SilentNotifier)
    };

    tracing::info!(
        "Building {} site into {}...",
        if mode.production { "production" } else { "development" },
        builder.output().describe()
    );

    let build = Arc::clone(&builder);
    let result = match tokio::task::spawn_blocking(move || build.build())
        .await
        .context("Build task failed")?
    {
        Ok(result) => result,
        Err(fatal) => {
            report_problems(std::slice::from_ref(&fatal), notifier.as_ref());
            return Err(fatal).context("Build failed");
        }
    };

    tracing::info!(
        "Built {} pages, {} assets and {} bundles in {}ms",
        result.pages,
        result.assets,
        result.bundles,
        result.duration_ms
    );
    report_problems(&result.problems, notifier.as_ref());

    if mode.serve {
        let OutputTarget::Memory(memory) = builder.output() else {
            anyhow::bail!("Serving requires an in-memory build");
        };

        let server_config = DevServerConfig {
            host: config.server.host.clone(),
            port: config.server.port,
            open: config.server.open,
            live_reload: mode.watch,
        };
        let mut server = DevServer::new(server_config, memory.clone());
        if mode.watch {
            server = server.with_rebuilder(Rebuilder::new(Arc::clone(&builder), notifier));
        }
        server.start().await?;
    } else if mode.watch {
        Rebuilder::new(builder, notifier).watch().await?;
    } else if !result.is_clean() {
        anyhow::bail!("Build finished with {} problem(s)", result.problems.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use crate::config::BuildSettings;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn quiet_config() -> ConfigFile {
        ConfigFile {
            build: BuildSettings {
                minify_html: true,
                notify: false,
            },
            ..ConfigFile::default()
        }
    }

    #[tokio::test]
    async fn one_shot_build_writes_dist() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/pages/index.njk", "<p>{{ data.site.title }}</p>");
        write(temp.path(), "src/data/site/title.json", "\"Kiln\"");

        run(&quiet_config(), temp.path().to_path_buf(), BuildMode::default())
            .await
            .unwrap();

        let html = fs::read_to_string(temp.path().join("dist/index.html")).unwrap();
        assert_eq!(html, "<p>Kiln</p>");
    }

    #[tokio::test]
    async fn scaffold_builds_cleanly() {
        let temp = tempdir().unwrap();
        crate::commands::init::run(&temp.path().join("kiln.toml"), false)
            .await
            .unwrap();

        run(&quiet_config(), temp.path().to_path_buf(), BuildMode::default())
            .await
            .unwrap();

        let dist = temp.path().join("dist");
        let html = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(html.contains("<h1>My Site</h1>"));
        assert!(dist.join("assets/css/app.css").exists());
        assert!(dist.join("assets/js/app.js").exists());
        assert!(dist.join("static/robots.txt").exists());
    }

    #[tokio::test]
    async fn one_shot_build_fails_on_problems() {
        let temp = tempdir().unwrap();
        write(temp.path(), "src/pages/index.njk", "<p>{{ data.site.title }}</p>");
        write(temp.path(), "src/data/site/title.json", "{ broken");

        let err = run(&quiet_config(), temp.path().to_path_buf(), BuildMode::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("1 problem"));
    }

    #[tokio::test]
    async fn missing_source_is_fatal() {
        let temp = tempdir().unwrap();

        let err = run(&quiet_config(), temp.path().to_path_buf(), BuildMode::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Build failed"));
    }
}
