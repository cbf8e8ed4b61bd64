//! Extraction run
//!
//! For each subsystem: list fetch, then a detail batch, then any dependent
//! sub-resource batches. Every batch goes through the [`FetchController`], so
//! pacing, backoff and cooldown apply uniformly. Whatever completed is
//! persisted before a hard error stops the run.

use crate::endpoints::{Endpoints, FUNCTION_PAGE_SIZE, WORKFLOW_PAGE_SIZE};
use crate::persist::{
    document_file_name, sanitize_file_name, write_json, DataLayout, FailureRecord,
};
use indexmap::{IndexMap, IndexSet};
use rosetta_extract::is_extractable_module;
use rosetta_extract::json::{array_at, as_text, text_at, unwrap_envelope};
use rosetta_extract::workflows::rule_actions;
use rosetta_fetch::{
    BatchReport, FailureKind, FetchController, FetchDescriptor, FetchError, Pacer, Transport,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Extractable subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Module field schemas
    Modules,
    /// Workflow rules
    Workflows,
    /// Blueprint processes and transitions
    Blueprints,
    /// Functions
    Functions,
}

impl Subsystem {
    /// Every subsystem in run order
    pub const ALL: [Self; 4] = [Self::Modules, Self::Workflows, Self::Blueprints, Self::Functions];

    /// Directory and log name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Modules => "modules",
            Self::Workflows => "workflows",
            Self::Blueprints => "blueprints",
            Self::Functions => "functions",
        }
    }
}

impl Display for Subsystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modules" | "module" => Ok(Self::Modules),
            "workflows" | "workflow" => Ok(Self::Workflows),
            "blueprints" | "blueprint" => Ok(Self::Blueprints),
            "functions" | "function" => Ok(Self::Functions),
            other => Err(format!(
                "unknown subsystem '{other}' (expected modules, workflows, blueprints or functions)"
            )),
        }
    }
}

/// Outcome of one subsystem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubsystemSummary {
    /// Items returned by the list requests
    pub listed: usize,
    /// Documents written
    pub persisted: usize,
    /// Failed or never attempted items
    pub failed: usize,
    /// Hard error that stopped the subsystem
    pub aborted: Option<String>,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Per-subsystem results in run order
    pub subsystems: IndexMap<String, SubsystemSummary>,
    /// Hard error that stopped the run
    #[serde(skip)]
    pub hard_error: Option<FetchError>,
}

impl RunSummary {
    /// Whether a hard error stopped the run
    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.hard_error.is_some()
    }

    /// Documents written across subsystems
    #[must_use]
    pub fn persisted(&self) -> usize {
        self.subsystems.values().map(|s| s.persisted).sum()
    }
}

/// Failure bookkeeping for one subsystem
#[derive(Default)]
struct Tracker {
    summary: SubsystemSummary,
    failures: Vec<FailureRecord>,
    abort: Option<FetchError>,
}

impl Tracker {
    /// Record a batch's failures; returns the batch and whether it was aborted
    fn absorb(&mut self, stage: &str, report: BatchReport) -> (BatchReport, bool) {
        let (report, abort) = report.into_parts();

        for failure in report.failures() {
            self.failures.push(FailureRecord {
                stage: stage.to_string(),
                key: failure.key.clone(),
                kind: match failure.kind {
                    FailureKind::RateLimited => "rate_limited",
                    FailureKind::ItemError => "item_error",
                }
                .to_string(),
                reason: failure.reason.clone(),
                attempts: failure.attempts,
            });
        }
        if let Some(aborted) = report.aborted() {
            self.failures.push(FailureRecord {
                stage: stage.to_string(),
                key: aborted.key.clone(),
                kind: "hard_error".to_string(),
                reason: aborted.reason.clone(),
                attempts: 1,
            });
        }
        for key in report.not_attempted() {
            self.failures.push(FailureRecord {
                stage: stage.to_string(),
                key: key.clone(),
                kind: "not_attempted".to_string(),
                reason: "batch aborted before this item".to_string(),
                attempts: 0,
            });
        }

        let aborted = abort.is_some();
        if let Some(error) = abort {
            self.summary.aborted = Some(error.to_string());
            self.abort = Some(error);
        }
        (report, aborted)
    }
}

/// Drives every subsystem through one controller
pub struct ExtractionRun<'a, T, P> {
    controller: &'a FetchController<T, P>,
    endpoints: &'a Endpoints,
    layout: &'a DataLayout,
}

impl<'a, T: Transport, P: Pacer> ExtractionRun<'a, T, P> {
    /// Create a run
    #[must_use]
    pub fn new(
        controller: &'a FetchController<T, P>,
        endpoints: &'a Endpoints,
        layout: &'a DataLayout,
    ) -> Self {
        Self {
            controller,
            endpoints,
            layout,
        }
    }

    /// Extract `subsystems` in order, stopping at the first hard error
    ///
    /// # Errors
    /// Returns an error only for local I/O failures. A hard error from the
    /// CRM is reported through [`RunSummary::hard_error`] after everything
    /// fetched so far has been written.
    pub async fn run(&self, subsystems: &[Subsystem]) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        for &subsystem in subsystems {
            tracing::info!("extracting {subsystem}");
            let mut tracker = Tracker::default();
            match subsystem {
                Subsystem::Modules => self.modules(&mut tracker).await?,
                Subsystem::Workflows => self.workflows(&mut tracker).await?,
                Subsystem::Blueprints => self.blueprints(&mut tracker).await?,
                Subsystem::Functions => self.functions(&mut tracker).await?,
            }

            self.layout
                .write_failures(subsystem.as_str(), &tracker.failures)?;
            tracker.summary.failed = tracker.failures.len();
            tracing::info!(
                "{subsystem}: {} listed, {} persisted, {} failed",
                tracker.summary.listed,
                tracker.summary.persisted,
                tracker.summary.failed
            );
            summary
                .subsystems
                .insert(subsystem.as_str().to_string(), tracker.summary);

            if let Some(error) = tracker.abort {
                tracing::error!("{subsystem}: {error}; stopping the run");
                summary.hard_error = Some(error);
                break;
            }
        }

        Ok(summary)
    }

    async fn batch(&self, label: &str, descriptors: Vec<FetchDescriptor>) -> BatchReport {
        self.controller.run(label, descriptors).await
    }

    /// Fetch list pages one at a time until a short or empty page
    async fn paged_list(
        &self,
        tracker: &mut Tracker,
        label: &str,
        envelope: &str,
        page_size: usize,
        page: impl Fn(usize) -> FetchDescriptor,
        next: impl Fn(usize) -> usize,
    ) -> (Vec<Value>, bool) {
        let mut items = Vec::new();
        let mut cursor = 1;
        loop {
            let (report, aborted) = tracker.absorb("list", self.batch(label, vec![page(cursor)]).await);
            if aborted {
                return (items, true);
            }
            let Some((_, document)) = report.successes().next() else {
                tracing::warn!("{label}: page at {cursor} failed, stopping pagination");
                break;
            };
            let found = array_at(document, envelope);
            items.extend(found.iter().cloned());
            tracing::info!("{label}: {} items (total {})", found.len(), items.len());
            if found.len() < page_size {
                break;
            }
            cursor = next(cursor);
        }
        (items, false)
    }

    async fn modules(&self, tracker: &mut Tracker) -> anyhow::Result<()> {
        let (report, aborted) = tracker.absorb(
            "list",
            self.batch("modules:list", vec![self.endpoints.modules_list()]).await,
        );
        if aborted {
            return Ok(());
        }
        let all: Vec<Value> = report
            .successes()
            .flat_map(|(_, document)| array_at(document, "modules").iter().cloned())
            .collect();
        tracker.summary.listed = all.len();
        write_json(&self.layout.index_file("modules"), &json!({ "modules": all }))?;

        let mut selected: IndexMap<String, &Value> = IndexMap::new();
        for module in all.iter().filter(|m| is_extractable_module(m)) {
            if let Some(api_name) = text_at(module, "api_name") {
                selected.insert(api_name, module);
            }
        }
        tracing::info!("{} of {} modules are extractable", selected.len(), all.len());

        let descriptors = selected
            .keys()
            .map(|api_name| self.endpoints.module_fields(api_name))
            .collect();
        let (report, _) = tracker.absorb("fields", self.batch("modules:fields", descriptors).await);

        for (key, fields) in report.successes() {
            let api_name = key.trim_start_matches("fields:");
            let Some(metadata) = selected.get(api_name) else {
                continue;
            };
            let document = json!({ "metadata": metadata, "fields": fields });
            self.layout.write_document(
                Subsystem::Modules.as_str(),
                &format!("{api_name}.json"),
                &document,
            )?;
            tracker.summary.persisted += 1;
        }
        Ok(())
    }

    async fn workflows(&self, tracker: &mut Tracker) -> anyhow::Result<()> {
        let (rules, aborted) = self
            .paged_list(
                tracker,
                "workflows:list",
                "workflow_rules",
                WORKFLOW_PAGE_SIZE,
                |page| self.endpoints.workflows_page(page),
                |page| page + 1,
            )
            .await;
        tracker.summary.listed = rules.len();
        write_json(
            &self.layout.index_file("workflows"),
            &json!({ "workflow_rules": rules }),
        )?;
        if aborted {
            return Ok(());
        }

        let descriptors = rules
            .iter()
            .filter_map(|rule| text_at(rule, "id"))
            .map(|id| self.endpoints.workflow_detail(&id))
            .collect();
        let (report, aborted) =
            tracker.absorb("detail", self.batch("workflows:detail", descriptors).await);

        let mut detailed: Vec<Value> = report
            .successes()
            .map(|(_, document)| unwrap_envelope(document, "workflow_rules").clone())
            .collect();

        if !aborted {
            let action_ids: IndexSet<String> =
                detailed.iter().flat_map(field_update_ids).collect();
            let descriptors = action_ids
                .iter()
                .map(|id| self.endpoints.field_update(id))
                .collect();
            let (report, _) = tracker.absorb(
                "field_updates",
                self.batch("workflows:field_updates", descriptors).await,
            );
            let details: IndexMap<String, Value> = report
                .successes()
                .map(|(key, document)| {
                    (
                        key.trim_start_matches("field_update:").to_string(),
                        unwrap_envelope(document, "field_updates").clone(),
                    )
                })
                .collect();
            for rule in &mut detailed {
                enrich_workflow(rule, &details);
            }
        }

        for rule in &detailed {
            let id = text_at(rule, "id").unwrap_or_default();
            let name = text_at(rule, "name").unwrap_or_else(|| format!("workflow_{id}"));
            self.layout.write_document(
                Subsystem::Workflows.as_str(),
                &document_file_name(&name, &id),
                rule,
            )?;
            tracker.summary.persisted += 1;
        }
        Ok(())
    }

    async fn functions(&self, tracker: &mut Tracker) -> anyhow::Result<()> {
        let (functions, aborted) = self
            .paged_list(
                tracker,
                "functions:list",
                "functions",
                FUNCTION_PAGE_SIZE,
                |start| self.endpoints.functions_page(start),
                |start| start + FUNCTION_PAGE_SIZE,
            )
            .await;
        tracker.summary.listed = functions.len();
        write_json(&self.layout.index_file("functions"), &json!({ "functions": functions }))?;
        if aborted {
            return Ok(());
        }

        let by_id: IndexMap<String, &Value> = functions
            .iter()
            .filter_map(|function| Some((text_at(function, "id")?, function)))
            .collect();
        let descriptors = by_id
            .keys()
            .map(|id| self.endpoints.function_detail(id))
            .collect();
        let (report, _) = tracker.absorb("detail", self.batch("functions:detail", descriptors).await);

        for (key, document) in report.successes() {
            let id = key.trim_start_matches("function:");
            let Some(listed) = by_id.get(id) else {
                continue;
            };
            let detail = unwrap_envelope(document, "functions");
            let name = text_at(listed, "api_name")
                .or_else(|| text_at(listed, "name"))
                .unwrap_or_else(|| format!("function_{id}"));
            let display_name = text_at(listed, "display_name").unwrap_or_else(|| name.clone());
            let module = listed
                .get("module")
                .or_else(|| detail.get("module"))
                .cloned()
                .unwrap_or(Value::Null);
            let script = detail.get("script").cloned().unwrap_or(Value::Null);

            let persisted = json!({
                "id": id,
                "name": name,
                "display_name": display_name,
                "module": module,
                "script": script,
            });
            self.layout.write_document(
                Subsystem::Functions.as_str(),
                &document_file_name(&name, id),
                &persisted,
            )?;
            tracker.summary.persisted += 1;
        }
        Ok(())
    }

    async fn blueprints(&self, tracker: &mut Tracker) -> anyhow::Result<()> {
        let (report, aborted) = tracker.absorb(
            "list",
            self.batch("blueprints:list", vec![self.endpoints.blueprints_list()])
                .await,
        );
        if aborted {
            return Ok(());
        }
        let processes: Vec<Value> = report
            .successes()
            .flat_map(|(_, document)| array_at(document, "Processes").iter().cloned())
            .collect();
        tracker.summary.listed = processes.len();
        write_json(&self.layout.index_file("blueprints"), &json!({ "Processes": processes }))?;

        let by_id: IndexMap<String, &Value> = processes
            .iter()
            .filter_map(|process| Some((text_at(process, "Id")?, process)))
            .collect();
        let descriptors = by_id
            .iter()
            .map(|(id, process)| {
                let module = blueprint_module(process).unwrap_or_default();
                self.endpoints.blueprint_detail(id, &module)
            })
            .collect();
        let (report, aborted) =
            tracker.absorb("detail", self.batch("blueprints:detail", descriptors).await);

        let mut transitions: IndexMap<String, (String, String)> = IndexMap::new();
        let mut transition_batch = Vec::new();
        for (key, details) in report.successes() {
            let id = key.trim_start_matches("blueprint:");
            let Some(metadata) = by_id.get(id) else {
                continue;
            };
            let name = text_at(metadata, "Name").unwrap_or_else(|| format!("blueprint_{id}"));
            let document = json!({ "metadata": metadata, "details": details });
            self.layout.write_document(
                Subsystem::Blueprints.as_str(),
                &document_file_name(&name, id),
                &document,
            )?;
            tracker.summary.persisted += 1;

            let module = blueprint_module(metadata).unwrap_or_default();
            let layout_id = text_at(metadata, "Layout.Id")
                .or_else(|| text_at(details, "Layout.Id"));
            let Some(layout_id) = layout_id else {
                tracing::warn!("blueprint {name}: no layout id, skipping transitions");
                continue;
            };
            for transition in array_at(details, "TransitionsMeta") {
                let Some(transition_id) = text_at(transition, "TransitionId") else {
                    continue;
                };
                let transition_name = text_at(transition, "Name").unwrap_or_default();
                let descriptor =
                    self.endpoints
                        .transition(id, &transition_id, &module, &layout_id);
                transitions.insert(
                    descriptor.key.clone(),
                    (
                        id.to_string(),
                        format!("{transition_name}_{transition_id}"),
                    ),
                );
                transition_batch.push(descriptor);
            }
        }
        if aborted {
            return Ok(());
        }

        let (report, _) = tracker.absorb(
            "transitions",
            self.batch("blueprints:transitions", transition_batch).await,
        );
        let transitions_dir = self.layout.transitions_dir();
        for (key, document) in report.successes() {
            let Some((blueprint_id, suffix)) = transitions.get(key) else {
                continue;
            };
            let file_name = sanitize_file_name(&format!("{blueprint_id}_{suffix}.json"));
            write_json(&transitions_dir.join(file_name), document)?;
            tracker.summary.persisted += 1;
        }
        Ok(())
    }
}

fn blueprint_module(process: &Value) -> Option<String> {
    text_at(process, "Tab.Name").or_else(|| text_at(process, "Module"))
}

fn action_groups_mut(condition: &mut Map<String, Value>) -> Vec<&mut Value> {
    let mut groups = Vec::new();
    for (key, group) in condition.iter_mut() {
        match key.as_str() {
            "instant_actions" => groups.push(group),
            "scheduled_actions" if group.is_array() => {
                if let Value::Array(items) = group {
                    groups.extend(items.iter_mut());
                }
            }
            "scheduled_actions" => groups.push(group),
            _ => {}
        }
    }
    groups
}

fn actions_mut(rule: &mut Value) -> Vec<&mut Map<String, Value>> {
    let mut actions = Vec::new();
    let Some(conditions) = rule.get_mut("conditions").and_then(Value::as_array_mut) else {
        return actions;
    };
    for condition in conditions.iter_mut().filter_map(Value::as_object_mut) {
        for group in action_groups_mut(condition) {
            if let Some(list) = group.get_mut("actions").and_then(Value::as_array_mut) {
                actions.extend(list.iter_mut().filter_map(Value::as_object_mut));
            }
        }
    }
    actions
}

fn is_field_update(action: &Value) -> bool {
    action.get("type").and_then(Value::as_str) == Some("field_updates")
}

fn field_update_ids(rule: &Value) -> Vec<String> {
    rule_actions(rule)
        .filter(|action| is_field_update(action))
        .filter_map(|action| text_at(action, "id"))
        .collect()
}

/// Copy field update details onto the workflow's `field_updates` actions
///
/// `details` maps action id to the `field_updates[0]` detail document. Adds
/// `field_api_name`, `field_id`, `field_value`, `update_type` and `module`
/// to each action that has a detail, and a `field_updates_summary` to the
/// rule when it has any field update action.
pub fn enrich_workflow(rule: &mut Value, details: &IndexMap<String, Value>) {
    let mut total = 0;
    let mut enriched = 0;
    for action in actions_mut(rule) {
        if action.get("type").and_then(Value::as_str) != Some("field_updates") {
            continue;
        }
        total += 1;
        let Some(detail) = action
            .get("id")
            .and_then(as_text)
            .and_then(|id| details.get(&id))
        else {
            continue;
        };
        let copied = [
            ("field_api_name", detail.pointer("/field/api_name")),
            ("field_id", detail.pointer("/field/id")),
            ("field_value", detail.get("value")),
            ("update_type", detail.get("type")),
            ("module", detail.pointer("/module/api_name")),
        ];
        for (name, value) in copied {
            action.insert(name.to_string(), value.cloned().unwrap_or(Value::Null));
        }
        enriched += 1;
    }
    if total > 0 {
        if let Some(object) = rule.as_object_mut() {
            object.insert(
                "field_updates_summary".into(),
                json!({ "total_field_update_actions": total, "enriched_actions": enriched }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subsystem_names() {
        assert_eq!("Workflows".parse::<Subsystem>(), Ok(Subsystem::Workflows));
        assert_eq!("function".parse::<Subsystem>(), Ok(Subsystem::Functions));
        assert!("reports".parse::<Subsystem>().is_err());
    }

    #[test]
    fn enriches_instant_and_scheduled_field_updates() {
        let mut rule = json!({
            "id": "1",
            "conditions": [{
                "instant_actions": {"actions": [
                    {"type": "field_updates", "id": "a1"},
                    {"type": "email_notifications", "id": "e1"}
                ]},
                "scheduled_actions": [{"actions": [{"type": "field_updates", "id": "a2"}]}]
            }]
        });
        let details: IndexMap<String, Value> = [(
            "a1".to_string(),
            json!({
                "field": {"api_name": "Stage", "id": "F1"},
                "value": "Closed Won",
                "type": "static",
                "module": {"api_name": "Deals"}
            }),
        )]
        .into_iter()
        .collect();

        assert_eq!(field_update_ids(&rule), vec!["a1".to_string(), "a2".to_string()]);
        enrich_workflow(&mut rule, &details);

        let action = &rule["conditions"][0]["instant_actions"]["actions"][0];
        assert_eq!(action["field_api_name"], "Stage");
        assert_eq!(action["field_id"], "F1");
        assert_eq!(action["field_value"], "Closed Won");
        assert_eq!(action["update_type"], "static");
        assert_eq!(action["module"], "Deals");
        assert!(rule["conditions"][0]["instant_actions"]["actions"][1]
            .get("field_api_name")
            .is_none());
        assert_eq!(
            rule["field_updates_summary"],
            json!({"total_field_update_actions": 2, "enriched_actions": 1})
        );
    }

    #[test]
    fn field_update_ids_read_like_the_extractor() {
        let mut rule = json!({
            "conditions": [{
                "instant_actions": {"actions": [
                    {"type": "field_updates", "id": " a1 "},
                    {"type": "field_updates", "id": 42},
                    {"type": "field_updates", "id": "  "}
                ]}
            }]
        });
        assert_eq!(field_update_ids(&rule), vec!["a1".to_string(), "42".to_string()]);

        let details: IndexMap<String, Value> = [
            ("a1".to_string(), json!({"field": {"api_name": "Stage"}})),
            ("42".to_string(), json!({"field": {"api_name": "Amount"}})),
        ]
        .into_iter()
        .collect();
        enrich_workflow(&mut rule, &details);

        let actions = &rule["conditions"][0]["instant_actions"]["actions"];
        assert_eq!(actions[0]["field_api_name"], "Stage");
        assert_eq!(actions[1]["field_api_name"], "Amount");
        assert_eq!(
            rule["field_updates_summary"],
            json!({"total_field_update_actions": 3, "enriched_actions": 2})
        );
    }

    #[test]
    fn rule_without_field_updates_is_untouched() {
        let mut rule = json!({"id": "1", "conditions": []});
        enrich_workflow(&mut rule, &IndexMap::new());
        assert!(rule.get("field_updates_summary").is_none());
    }
}
