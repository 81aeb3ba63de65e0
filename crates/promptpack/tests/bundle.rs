use std::fs;
use std::time::Instant;

use promptpack::Workspace;
use promptpack::app::export::{ExportFormat, ExportOptions};
use promptpack::app::scan::{Scanner, ScannerConfig};
use promptpack::infra::config::Config;
use time::macros::datetime;

fn options(format: ExportFormat) -> ExportOptions {
    ExportOptions {
        format,
        minify: false,
        now: datetime!(2024-06-01 12:00 UTC),
    }
}

fn scanned_workspace(root: &std::path::Path) -> Workspace {
    let config = Config::default();
    let scan = Scanner::new()
        .scan(&ScannerConfig::from_config(root.to_path_buf(), &config))
        .expect("scan");
    let mut workspace = Workspace::from_config(&config).expect("workspace");
    workspace
        .load_local(scan.label, scan.records, datetime!(2024-06-01 11:55 UTC))
        .expect("load");
    workspace
}

#[test]
fn scanned_folder_renders_tree_and_code() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("app");
    fs::create_dir_all(root.join("src/components")).unwrap();
    fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
    fs::write(root.join("src/components/Button.tsx"), "export const Button = 1;\n").unwrap();
    fs::write(root.join("src/index.ts"), "import './components/Button';\n").unwrap();
    fs::write(root.join("src/logo.svg.png"), [0u8, 1, 2]).unwrap();
    fs::write(root.join("package.json"), "{}\n").unwrap();
    fs::write(root.join("node_modules/left-pad/index.js"), "ignored").unwrap();

    let mut workspace = scanned_workspace(&root);
    workspace.select_all(Instant::now());

    let tree = workspace.export(&options(ExportFormat::Tree), None).unwrap();
    insta::assert_snapshot!(tree.text, @r"
    ├── src
    │   ├── components
    │   │   └── Button.tsx
    │   ├── index.ts
    │   └── logo.svg.png
    └── package.json
    ");

    let code = workspace.export(&options(ExportFormat::FullCode), None).unwrap();
    let button = code.text.find("// src/components/Button.tsx\nexport const Button = 1;").unwrap();
    let index = code.text.find("// src/index.ts\nimport './components/Button';").unwrap();
    let logo = code.text.find("// src/logo.svg.png\n// [binary file skipped]").unwrap();
    assert!(button < index && index < logo);
    assert_eq!(code.file_count, 4);
}

#[test]
fn markdown_summary_describes_local_snapshot() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("notes");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("one.md"), "a\nb\n").unwrap();
    fs::write(root.join("two.md"), "c\n").unwrap();

    let mut workspace = scanned_workspace(&root);
    workspace.toggle("one.md", true, Instant::now());

    let summary = workspace.export(&options(ExportFormat::Markdown), None).unwrap();
    assert!(summary.text.contains("- Folder: notes"));
    assert!(summary.text.contains("(moderate, 5 min ago)"));
    assert!(summary.text.contains("- Files scanned: 2"));
    assert!(summary.text.contains("- Selected lines: 2"));
    assert!(summary.text.ends_with("- one.md"));
}
