use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;

use docgraph_core::{Document, DocumentConfig, LinkViolation, LoadReport};
use docgraph_registry::builtin::BASE;
use docgraph_registry::{TypeId, TypeRegistry};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        Command::Types(args) => cmd_types(&args, cli.format)?,
        Command::Check(args) => cmd_check(&args, cli.format)?,
        Command::Objects(args) => cmd_objects(&args, cli.format)?,
    };
    print!("{output}");
    Ok(())
}

#[derive(Serialize)]
struct TypeRow {
    name: String,
    parent: Option<String>,
    #[serde(rename = "abstract")]
    is_abstract: bool,
}

fn cmd_types(args: &TypesArgs, format: OutputFormat) -> anyhow::Result<String> {
    let registry = TypeRegistry::with_builtins();
    let root_name = args.root.as_deref().unwrap_or(BASE);
    let root = registry.from_name(root_name);
    if root.is_bad() {
        bail!("unknown type: {root_name}");
    }

    let mut out = String::new();
    match format {
        OutputFormat::Json => {
            let rows: Vec<TypeRow> = registry
                .all_derived_from(root)
                .into_iter()
                .filter_map(|id| {
                    let desc = registry.descriptor(id)?;
                    Some(TypeRow {
                        name: desc.name().to_string(),
                        parent: desc.parent().and_then(|p| registry.name(p)).map(str::to_string),
                        is_abstract: desc.is_abstract(),
                    })
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
        }
        OutputFormat::Text => write_type_tree(&registry, root, 0, &mut out)?,
    }
    Ok(out)
}

fn write_type_tree(
    registry: &TypeRegistry,
    id: TypeId,
    depth: usize,
    out: &mut String,
) -> std::fmt::Result {
    let Some(desc) = registry.descriptor(id) else {
        return Ok(());
    };
    let indent = "  ".repeat(depth);
    if desc.is_abstract() {
        writeln!(out, "{indent}{} {}", desc.name().bold(), "(abstract)".dimmed())?;
    } else {
        writeln!(out, "{indent}{}", desc.name().bold())?;
    }
    for &child in desc.children() {
        write_type_tree(registry, child, depth + 1, out)?;
    }
    Ok(())
}

fn load(file: &Path, config: Option<&Path>) -> anyhow::Result<(Document, LoadReport)> {
    let config = match config {
        Some(path) => DocumentConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => DocumentConfig::default(),
    };
    let registry = Arc::new(TypeRegistry::with_builtins());
    Document::open_path(registry, config, file)
        .with_context(|| format!("failed to load {}", file.display()))
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    file: String,
    report: &'a LoadReport,
    violations: Vec<LinkViolation>,
    digest: String,
}

fn cmd_check(args: &CheckArgs, format: OutputFormat) -> anyhow::Result<String> {
    let (doc, report) = load(&args.file, args.config.as_deref())?;
    let violations = doc.verify_back_links();
    let digest = doc.digest();

    let mut out = String::new();
    if format == OutputFormat::Json {
        let output = CheckOutput {
            file: args.file.display().to_string(),
            report: &report,
            violations,
            digest,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(out);
    }

    let mark = if report.is_clean() && violations.is_empty() {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };
    writeln!(
        out,
        "{mark} {} (format {}, {})",
        args.file.display(),
        report.version.format,
        if report.version.producer.is_empty() { "unknown producer" } else { report.version.producer.as_str() },
    )?;
    writeln!(out, "  objects:            {}", report.objects)?;
    writeln!(out, "  skipped objects:    {}", report.skipped_objects)?;
    writeln!(out, "  skipped attributes: {}", report.skipped_attributes)?;
    writeln!(out, "  ignored fields:     {}", report.ignored_fields)?;
    writeln!(out, "  mismatched values:  {}", report.mismatched_values)?;
    writeln!(out, "  links resolved:     {}", report.links.resolved)?;
    writeln!(out, "  broken links:       {}", report.links.broken.len())?;
    for broken in &report.links.broken {
        writeln!(
            out,
            "    serial {}.{} -> missing serial {}",
            broken.owner_serial,
            broken.attribute,
            broken.missing_serial.to_string().red()
        )?;
    }
    if violations.is_empty() {
        writeln!(out, "  back-links:         {}", "consistent".green())?;
    } else {
        writeln!(out, "  back-links:         {} violations", violations.len().to_string().red())?;
        for violation in &violations {
            writeln!(out, "    {violation}")?;
        }
    }
    writeln!(out, "  digest:             {}", digest.dimmed())?;
    Ok(out)
}

#[derive(Serialize)]
struct ObjectRow {
    serial: u64,
    type_name: String,
    label: String,
    links: usize,
    back_links: usize,
}

fn cmd_objects(args: &ObjectsArgs, format: OutputFormat) -> anyhow::Result<String> {
    let (doc, _) = load(&args.file, args.config.as_deref())?;
    let mut rows: Vec<ObjectRow> = doc
        .objects()
        .map(|obj| ObjectRow {
            serial: obj.serial(),
            type_name: obj.type_name().to_string(),
            label: obj.label().to_string(),
            links: obj.link_targets().len(),
            back_links: obj.back_links().len(),
        })
        .collect();
    rows.sort_by_key(|row| row.serial);

    let mut out = String::new();
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?,
        OutputFormat::Text => {
            if rows.is_empty() {
                writeln!(out, "{}", "no objects".dimmed())?;
            }
            for row in &rows {
                writeln!(
                    out,
                    "{:>6}  {:<20} {:<24} links {:<3} back-links {}",
                    row.serial.to_string().bold(),
                    row.type_name,
                    row.label,
                    row.links,
                    row.back_links
                )?;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_core::AttributeSpec;
    use docgraph_registry::builtin::{ATTRIBUTE_LINK, DOCUMENT_OBJECT, LABEL};
    use std::path::PathBuf;

    fn saved_document(dir: &Path) -> PathBuf {
        let registry = Arc::new(TypeRegistry::with_builtins());
        let mut doc = Document::new(registry, DocumentConfig::default());
        let a = doc.create_object(DOCUMENT_OBJECT).unwrap();
        let b = doc.create_object(DOCUMENT_OBJECT).unwrap();
        doc.set(a, LABEL, "First").unwrap();
        doc.set(b, LABEL, "Second").unwrap();
        let next = doc
            .add_dynamic_attribute(a, &AttributeSpec::new(ATTRIBUTE_LINK, "Next"))
            .unwrap();
        doc.set_link(a, &next, Some(b)).unwrap();
        doc.commit_transaction();

        let path = dir.join("model.json");
        doc.save_to_path(&path).unwrap();
        path
    }

    #[test]
    fn types_tree_lists_builtins() {
        colored::control::set_override(false);
        let out = cmd_types(&TypesArgs { root: None }, OutputFormat::Text).unwrap();
        assert!(out.starts_with("Base"));
        assert!(out.contains("  Attribute (abstract)"));
        assert!(out.contains("DocumentObject"));
    }

    #[test]
    fn types_subtree_as_json() {
        let args = TypesArgs { root: Some("AttributeLink".into()) };
        let out = cmd_types(&args, OutputFormat::Json).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&out).unwrap();
        let names: Vec<&str> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert_eq!(names[0], "AttributeLink");
        assert!(names.contains(&"AttributeLinkOwned"));
        assert!(!names.contains(&"AttributeFloat"));
    }

    #[test]
    fn unknown_root_type_fails() {
        let args = TypesArgs { root: Some("Nope".into()) };
        assert!(cmd_types(&args, OutputFormat::Text).is_err());
    }

    #[test]
    fn check_reports_a_clean_document() {
        let dir = tempfile::tempdir().unwrap();
        let file = saved_document(dir.path());
        let args = CheckArgs { file, config: None };
        let out = cmd_check(&args, OutputFormat::Json).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["report"]["objects"], 2);
        assert_eq!(json["report"]["links"]["resolved"], 1);
        assert!(json["violations"].as_array().unwrap().is_empty());
        assert_eq!(json["digest"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn check_text_output() {
        colored::control::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let file = saved_document(dir.path());
        let out = cmd_check(&CheckArgs { file, config: None }, OutputFormat::Text).unwrap();
        assert!(out.starts_with("✓"));
        assert!(out.contains("objects:            2"));
        assert!(out.contains("back-links:         consistent"));
    }

    #[test]
    fn check_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = CheckArgs { file: dir.path().join("absent.json"), config: None };
        assert!(cmd_check(&args, OutputFormat::Text).is_err());
    }

    #[test]
    fn objects_lists_serials_and_links() {
        let dir = tempfile::tempdir().unwrap();
        let file = saved_document(dir.path());
        let out = cmd_objects(&ObjectsArgs { file, config: None }, OutputFormat::Json).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&out).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["label"], "First");
        assert_eq!(rows[0]["links"], 1);
        assert_eq!(rows[1]["label"], "Second");
        assert_eq!(rows[1]["back_links"], 1);
    }
}
