use std::path::Path;

use flowsvg::config::AppConfig;
use flowsvg::host::{DocumentKind, HostOptions, convert_document, find_blocks};

const LESSON_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Request lifecycle</title>
    <script src="https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js"></script>
    <script>
        mermaid.initialize({ startOnLoad: true, theme: 'default' });
    </script>
    <script src="/assets/site.js"></script>
</head>
<body>
    <h1>Request lifecycle</h1>
    <div class="mermaid-diagram">
        <div class="mermaid">
            flowchart TD
                A[Browser] --&gt;|GET /| B(index.php)
                B --&gt; C{Logged in?}
                C --&gt;|yes| D[Dashboard]
                C --&gt;|no| E[Login form]
        </div>
    </div>
    <p>Then the template engine runs:</p>
    <pre class="mermaid">
        graph LR
            T[Template] --> R[Rendered &amp; cached]
    </pre>
</body>
</html>
"#;

#[test]
fn html_page_gets_inline_svgs_and_loses_runtime_scripts() {
    let conversion = convert_document(LESSON_PAGE, DocumentKind::Html, &HostOptions::default());
    let out = &conversion.content;

    assert_eq!(conversion.report.blocks_found, 2);
    assert_eq!(conversion.report.converted, 2);
    assert_eq!(conversion.report.placeholders, 0);
    assert_eq!(conversion.report.scripts_removed, 2);

    assert_eq!(out.matches("<svg").count(), 2);
    assert!(!out.to_lowercase().contains("mermaid.min.js"));
    assert!(!out.contains("mermaid.initialize"));
    assert!(!out.contains(r#"<div class="mermaid">"#));
    assert!(!out.contains(r#"<pre class="mermaid">"#));
    assert!(out.contains(r#"<script src="/assets/site.js"></script>"#));
    assert!(out.contains("Rendered &amp; cached"));
    assert!(out.contains("<p>Then the template engine runs:</p>"));
}

#[test]
fn converted_page_is_stable_on_second_run() {
    let options = HostOptions::default();
    let first = convert_document(LESSON_PAGE, DocumentKind::Html, &options);
    let second = convert_document(&first.content, DocumentKind::Html, &options);

    assert_eq!(second.report.blocks_found, 0);
    assert!(!second.report.changed());
    assert_eq!(second.content, first.content);
}

#[test]
fn html_sources_are_cleaned_before_parsing() {
    let blocks = find_blocks(LESSON_PAGE, DocumentKind::Html);
    assert!(blocks[0].source.starts_with("flowchart TD"));
    assert!(blocks[0].source.contains("A[Browser] -->|GET /| B(index.php)"));
    assert!(blocks[1].source.contains("R[Rendered & cached]"));
}

#[test]
fn markdown_converts_only_diagram_fences() {
    let markdown = r#"# Notes

```mermaid
flowchart LR
    A[Write] --> B[Review] --> C[Ship]
```

```rust
fn main() {
    println!("A --> B");
}
```
"#;
    let conversion = convert_document(markdown, DocumentKind::Markdown, &HostOptions::default());
    let out = &conversion.content;

    assert_eq!(conversion.report.blocks_found, 1);
    assert_eq!(out.matches("<svg").count(), 1);
    assert!(!out.contains("```mermaid"));
    assert!(out.contains("```rust\nfn main() {\n    println!(\"A --> B\");\n}\n```"));
    assert!(out.starts_with("# Notes\n\n<div"));
}

#[test]
fn configuration_flows_into_the_host() {
    let config = AppConfig::from_toml(
        r#"
[render]
canvas_width = 1000

[host]
wrapper_class = "static-diagram"
caption = ""
remove_scripts = false
"#,
    )
    .unwrap();
    let options = HostOptions {
        render: config.render.options(),
        host: config.host,
    };

    let conversion = convert_document(LESSON_PAGE, DocumentKind::Html, &options);
    let out = &conversion.content;

    assert_eq!(out.matches(r#"<div class="static-diagram""#).count(), 2);
    assert!(out.contains(r#"width="1000.00""#));
    assert!(out.contains("mermaid.min.js"));
    assert_eq!(conversion.report.scripts_removed, 0);
}

#[test]
fn kinds_are_inferred_from_extensions() {
    assert_eq!(DocumentKind::from_path(Path::new("lesson.php")), Some(DocumentKind::Html));
    assert_eq!(DocumentKind::from_path(Path::new("docs/guide.markdown")), Some(DocumentKind::Markdown));
}
