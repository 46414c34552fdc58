//! Tree command - print the watched root's directory structure.

use crate::app::App;
use crate::OutputFormat;
use shelf_core::{Config, DirectoryTree};
use std::fmt::Write;
use std::path::Path;

/// Run the tree command.
pub fn run(config: Config, output: OutputFormat) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let tree = DirectoryTree::build(&app.root, &app.config.exclude_rules())?;

    match output {
        OutputFormat::Text => print!("{}", render(&tree)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
    }

    Ok(())
}

/// Indented listing, one directory per line.
fn render(tree: &DirectoryTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", tree.root().display());
    render_children(tree, tree.root(), 1, &mut out);
    out
}

fn render_children(tree: &DirectoryTree, dir: &Path, depth: usize, out: &mut String) {
    let Some(children) = tree.children(dir) else {
        return;
    };
    for name in children {
        let _ = writeln!(out, "{}{}/", "  ".repeat(depth), name);
        render_children(tree, &dir.join(name), depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::ExcludeRules;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_render() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("reports/2024")).unwrap();
        fs::create_dir_all(root.join("photos")).unwrap();

        let tree = DirectoryTree::build(root, &ExcludeRules::none()).unwrap();
        let expected = format!("{}\n  photos/\n  reports/\n    2024/\n", root.display());
        assert_eq!(render(&tree), expected);
    }

    #[test]
    fn test_run_leaves_no_index() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("docs");
        fs::create_dir_all(root.join("reports")).unwrap();

        let mut config = Config::default();
        config.general.watched_root = Some(root);
        config.general.index_path = Some(temp_dir.path().join("index"));

        run(config, OutputFormat::Text).unwrap();
        assert!(!temp_dir.path().join("index").exists());
    }
}
