//! Analysis run
//!
//! Reads a persisted extraction tree, builds the field catalog from the
//! module documents, extracts references from every automation document,
//! resolves them and writes the Rosetta map.

use crate::persist::{read_documents, write_json, DataLayout};
use anyhow::Context;
use rosetta_aggregate::{RosettaAggregator, RosettaMap};
use rosetta_core::{FieldReference, SourceKind};
use rosetta_extract::{
    blueprints, extractor_for, parse_module_document, workflows, ExtractContext, Extraction,
    FunctionCall,
};
use rosetta_resolve::{FieldCatalog, IdentityResolver};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Inputs of an analysis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Root of the extraction tree
    pub data_dir: PathBuf,
    /// Where to write the Rosetta JSON
    pub output: PathBuf,
    /// Emit entries for catalog fields nothing references
    pub include_unreferenced: bool,
}

/// What an analysis run produced
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// The Rosetta map as written
    pub map: RosettaMap,
    /// Catalog rows loaded
    pub catalog_rows: usize,
    /// Catalog rows rejected (duplicate ids, missing modules)
    pub catalog_rejected: usize,
    /// References extracted
    pub references: usize,
    /// Document entries the extractors could not use
    pub skipped: usize,
    /// Files that could not be read or parsed
    pub unreadable_files: usize,
    /// Function invocations found in workflows and blueprints
    pub function_calls: Vec<FunctionCall>,
}

/// Build the catalog from `modules/`
///
/// Rows the catalog rejects are logged and counted; the file name stem is
/// used as module name when a document carries none.
#[must_use]
pub fn load_catalog(layout: &DataLayout) -> (FieldCatalog, usize, usize) {
    let (documents, unreadable) = read_documents(&layout.subsystem_dir("modules"));
    let mut catalog = FieldCatalog::new();
    let mut rejected = 0;

    for (path, document) in &documents {
        let stem = path.file_stem().and_then(|s| s.to_str());
        let parsed = parse_module_document(document, stem);
        for diagnostic in &parsed.diagnostics {
            tracing::debug!("{diagnostic}");
        }
        rejected += parsed.skipped;
        for entry in parsed.entries {
            if let Err(e) = catalog.insert(entry) {
                tracing::warn!("{}: {e}", path.display());
                rejected += 1;
            }
        }
    }

    tracing::info!(
        "catalog: {} fields across {} modules ({} rejected)",
        catalog.len(),
        catalog.modules().count(),
        rejected
    );
    (catalog, rejected, unreadable)
}

/// Extraction output of every automation document
#[derive(Debug, Default)]
struct Harvest {
    extraction: Extraction,
    function_calls: Vec<FunctionCall>,
    unreadable: usize,
}

fn harvest(layout: &DataLayout) -> Harvest {
    let mut harvest = Harvest::default();

    let (documents, unreadable) = read_documents(&layout.subsystem_dir("workflows"));
    harvest.unreadable += unreadable;
    for (_, document) in &documents {
        let context = ExtractContext::default();
        harvest
            .extraction
            .merge(extractor_for(SourceKind::Workflow).extract(document, &context));
        harvest
            .function_calls
            .extend(workflows::function_calls(document, &context));
    }

    let (documents, unreadable) = read_documents(&layout.subsystem_dir("blueprints"));
    harvest.unreadable += unreadable;
    let mut blueprint_names: HashMap<String, (String, Option<String>)> = HashMap::new();
    for (_, document) in &documents {
        let module = document
            .pointer("/metadata/Tab/Name")
            .and_then(Value::as_str)
            .map(str::to_string);
        for (id, name) in blueprints::blueprint_names(document) {
            blueprint_names.insert(id, (name, module.clone()));
        }
    }

    let (documents, unreadable) = read_documents(&layout.transitions_dir());
    harvest.unreadable += unreadable;
    for (path, document) in &documents {
        let mut context = ExtractContext::default();
        if let Some((name, module)) = blueprint_id(path).and_then(|id| blueprint_names.get(id)) {
            context = context.with_parent(name.clone());
            if let Some(module) = module {
                context = context.with_module(module.clone());
            }
        } else {
            tracing::debug!("{}: no matching blueprint document", path.display());
        }
        harvest
            .extraction
            .merge(extractor_for(SourceKind::Blueprint).extract(document, &context));
        harvest
            .function_calls
            .extend(blueprints::function_calls(document, &context));
    }

    let (documents, unreadable) = read_documents(&layout.subsystem_dir("functions"));
    harvest.unreadable += unreadable;
    for (_, document) in &documents {
        harvest.extraction.merge(
            extractor_for(SourceKind::Function).extract(document, &ExtractContext::default()),
        );
    }

    harvest
}

/// Blueprint id prefix of `<blueprint_id>_<name>_<transition_id>.json`
fn blueprint_id(path: &Path) -> Option<&str> {
    path.file_stem()?.to_str()?.split('_').next().filter(|id| !id.is_empty())
}

/// Run the whole analysis and write the Rosetta JSON
///
/// # Errors
/// Returns an error if the output file cannot be written.
pub fn analyze(options: &AnalysisOptions) -> anyhow::Result<AnalysisReport> {
    let layout = DataLayout::new(&options.data_dir);
    tracing::info!("analyzing {}", layout.root().display());

    let (catalog, catalog_rejected, catalog_unreadable) = load_catalog(&layout);
    if catalog.is_empty() {
        tracing::warn!("field catalog is empty; every reference will be unmapped");
    }

    let harvest = harvest(&layout);
    for diagnostic in &harvest.extraction.diagnostics {
        tracing::debug!("{diagnostic}");
    }
    let references: &[FieldReference] = &harvest.extraction.references;

    let resolution = IdentityResolver::new(&catalog).resolve(references);
    let aggregator = if options.include_unreferenced {
        RosettaAggregator::new().with_catalog(&catalog)
    } else {
        RosettaAggregator::new()
    };
    let map = aggregator.aggregate(&resolution);

    write_json(&options.output, &map)
        .with_context(|| format!("writing rosetta map to {}", options.output.display()))?;

    let report = AnalysisReport {
        catalog_rows: catalog.len(),
        catalog_rejected,
        references: references.len(),
        skipped: harvest.extraction.skipped,
        unreadable_files: catalog_unreadable + harvest.unreadable,
        function_calls: harvest.function_calls,
        map,
    };
    log_summary(&report, &options.output);
    Ok(report)
}

fn log_summary(report: &AnalysisReport, output: &Path) {
    let summary = &report.map.summary;
    tracing::info!("wrote {}", output.display());
    tracing::info!(
        "{} fields ({} ambiguous, {} unreferenced) from {} references; {} unmapped",
        summary.entries,
        summary.ambiguous_entries,
        summary.unreferenced_entries,
        report.references,
        summary.unmapped_references
    );
    tracing::info!(
        "{} entries skipped by extractors, {} unreadable files, {} catalog rows rejected",
        report.skipped,
        report.unreadable_files,
        report.catalog_rejected
    );

    let from_workflows = report
        .function_calls
        .iter()
        .filter(|call| call.caller_kind == SourceKind::Workflow)
        .count();
    tracing::info!(
        "function calls: {from_workflows} from workflows, {} from blueprints",
        report.function_calls.len() - from_workflows
    );
}
