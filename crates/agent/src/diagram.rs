//! Architecture diagram rendering.
//!
//! Collects resources from every definition file in the working directory,
//! maps a fixed whitelist of resource types to node kinds, and renders a
//! PNG through the Graphviz `dot` subprocess. Unrecognized resource types
//! are parsed but never drawn. Duplicate (type, name) declarations across
//! files are collapsed last-write-wins.
//!
//! Rendering is best-effort: a missing `dot` binary, a non-zero exit, or a
//! missing output file all yield "no diagram", never a turn failure.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);
const DIAGRAM_STEM: &str = "architecture_diagram";

/// Resource types that become diagram nodes, with their display categories.
const NODE_WHITELIST: &[(&str, &str)] = &[
    ("aws_instance", "EC2"),
    ("aws_autoscaling_group", "Auto Scaling"),
    ("aws_db_instance", "RDS"),
    ("aws_lb", "ELB"),
    ("aws_alb", "ELB"),
    ("aws_vpc", "VPC"),
    ("aws_internet_gateway", "Internet Gateway"),
];

#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Renders a diagram of the resources declared under `work_dir`.
    /// `Ok(None)` means no diagram was produced (no resources, renderer
    /// unavailable, or render failure).
    async fn render(&self, work_dir: &Path) -> Result<Option<PathBuf>>;
}

/// Ordered map from resource type to declared names. Deterministic
/// iteration keeps the emitted DOT stable across runs.
pub type ResourceMap = BTreeMap<String, BTreeSet<String>>;

/// Parses every `*.tf` file under `dir` (sorted traversal) and collects
/// `resource` blocks by type and name. Unparseable files are skipped.
pub fn collect_resources(dir: &Path) -> ResourceMap {
    let mut resources = ResourceMap::new();
    for path in definition_files(dir) {
        let Ok(raw) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Ok(body) = hcl::parse(&raw) else {
            tracing::debug!(path = %path.display(), "skipping unparseable definition file");
            continue;
        };
        for block in body.blocks() {
            if block.identifier.as_str() != "resource" {
                continue;
            }
            let (Some(r_type), Some(r_name)) = (block.labels.first(), block.labels.get(1)) else {
                continue;
            };
            resources
                .entry(r_type.as_str().to_string())
                .or_default()
                .insert(r_name.as_str().to_string());
        }
    }
    resources
}

fn definition_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "tf") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn node_category(resource_type: &str) -> Option<&'static str> {
    NODE_WHITELIST
        .iter()
        .find(|(known, _)| *known == resource_type)
        .map(|(_, category)| *category)
}

fn node_id(resource_type: &str, name: &str) -> String {
    format!("{resource_type}_{name}").replace(|c: char| !c.is_ascii_alphanumeric(), "_")
}

/// Emits Graphviz DOT for the whitelisted resources and the fixed set of
/// well-known relationships: gateway → load balancer → compute instance →
/// managed database.
pub fn render_dot(resources: &ResourceMap) -> String {
    let mut dot = String::from(
        "digraph architecture {\n  rankdir=TB;\n  bgcolor=transparent;\n  pad=0.5;\n  \
         node [shape=box, style=\"rounded,filled\", fillcolor=\"#eef3fb\"];\n",
    );

    for (r_type, names) in resources {
        let Some(category) = node_category(r_type) else {
            continue;
        };
        for name in names {
            dot.push_str(&format!(
                "  {} [label=\"{category}\\n{name}\"];\n",
                node_id(r_type, name)
            ));
        }
    }

    let mut edge = |from_type: &str, to_type: &str, label: Option<&str>| {
        let (Some(from), Some(to)) = (resources.get(from_type), resources.get(to_type)) else {
            return;
        };
        for from_name in from {
            for to_name in to {
                match label {
                    Some(label) => dot.push_str(&format!(
                        "  {} -> {} [label=\"{label}\"];\n",
                        node_id(from_type, from_name),
                        node_id(to_type, to_name)
                    )),
                    None => dot.push_str(&format!(
                        "  {} -> {};\n",
                        node_id(from_type, from_name),
                        node_id(to_type, to_name)
                    )),
                }
            }
        }
    };

    edge("aws_internet_gateway", "aws_lb", None);
    edge("aws_internet_gateway", "aws_alb", None);
    edge("aws_lb", "aws_instance", Some("routes traffic"));
    edge("aws_alb", "aws_instance", Some("routes traffic"));
    edge("aws_instance", "aws_db_instance", Some("SQL Connection"));

    dot.push_str("}\n");
    dot
}

/// Production renderer backed by the Graphviz `dot` binary.
#[derive(Clone, Debug, Default)]
pub struct DotRenderer;

#[async_trait]
impl DiagramRenderer for DotRenderer {
    async fn render(&self, work_dir: &Path) -> Result<Option<PathBuf>> {
        let resources = collect_resources(work_dir);
        if resources.values().all(BTreeSet::is_empty) || resources.is_empty() {
            return Ok(None);
        }
        if resources.keys().all(|r_type| node_category(r_type).is_none()) {
            tracing::debug!("no whitelisted resource types to draw");
            return Ok(None);
        }

        let Ok(dot_binary) = which::which("dot") else {
            tracing::warn!("graphviz `dot` not found in PATH, skipping diagram");
            return Ok(None);
        };

        let dot_source = render_dot(&resources);
        let dot_path = work_dir.join(format!("{DIAGRAM_STEM}.dot"));
        let png_path = work_dir.join(format!("{DIAGRAM_STEM}.png"));
        tokio::fs::write(&dot_path, &dot_source)
            .await
            .with_context(|| format!("writing {}", dot_path.display()))?;

        let run = Command::new(dot_binary)
            .arg("-Tpng")
            .arg("-o")
            .arg(&png_path)
            .arg(&dot_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match tokio::time::timeout(RENDER_TIMEOUT, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "diagram renderer failed to start");
                return Ok(None);
            }
            Err(_) => {
                tracing::warn!(timeout = ?RENDER_TIMEOUT, "diagram render timed out");
                return Ok(None);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(stderr = %stderr, "diagram render failed");
            return Ok(None);
        }
        if !png_path.exists() {
            tracing::warn!(path = %png_path.display(), "renderer exited cleanly but produced no file");
            return Ok(None);
        }

        Ok(Some(png_path))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{collect_resources, render_dot, DiagramRenderer, DotRenderer};

    fn write_tf(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).expect("write tf");
    }

    const STACK: &str = r#"
provider "aws" { region = "us-east-1" }

resource "aws_internet_gateway" "igw" {}
resource "aws_lb" "frontend" {}
resource "aws_instance" "api-server" { instance_type = "t2.micro" }
resource "aws_db_instance" "main-db" { engine = "postgres" }
resource "aws_iam_role" "unrendered" {}
"#;

    #[test]
    fn collects_resources_by_type_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tf(dir.path(), "main.tf", STACK);

        let resources = collect_resources(dir.path());
        assert!(resources["aws_instance"].contains("api-server"));
        assert!(resources["aws_db_instance"].contains("main-db"));
        // Parsed even though it is never rendered as a node.
        assert!(resources.contains_key("aws_iam_role"));
    }

    #[test]
    fn duplicate_names_across_files_collapse() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tf(dir.path(), "a.tf", "resource \"aws_instance\" \"web\" { ami = \"a\" }");
        write_tf(dir.path(), "b.tf", "resource \"aws_instance\" \"web\" { ami = \"b\" }");

        let resources = collect_resources(dir.path());
        assert_eq!(resources["aws_instance"].len(), 1);
    }

    #[test]
    fn unparseable_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tf(dir.path(), "bad.tf", "this { is not hcl");
        write_tf(dir.path(), "good.tf", "resource \"aws_vpc\" \"net\" {}");

        let resources = collect_resources(dir.path());
        assert_eq!(resources.len(), 1);
        assert!(resources["aws_vpc"].contains("net"));
    }

    #[test]
    fn dot_contains_whitelisted_nodes_and_known_edges() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tf(dir.path(), "main.tf", STACK);

        let dot = render_dot(&collect_resources(dir.path()));
        assert!(dot.contains("api_server"));
        assert!(dot.contains("routes traffic"));
        assert!(dot.contains("SQL Connection"));
        assert!(dot.contains("aws_internet_gateway_igw -> aws_lb_frontend"));
        assert!(!dot.contains("unrendered"));
    }

    #[tokio::test]
    async fn render_of_empty_work_dir_is_none_without_subprocess() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rendered = DotRenderer.render(dir.path()).await.expect("render");
        assert!(rendered.is_none());
    }

    #[tokio::test]
    async fn render_with_only_unrecognized_types_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tf(dir.path(), "main.tf", "resource \"aws_iam_role\" \"r\" {}");
        let rendered = DotRenderer.render(dir.path()).await.expect("render");
        assert!(rendered.is_none());
    }
}
