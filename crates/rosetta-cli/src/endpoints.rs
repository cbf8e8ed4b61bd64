//! CRM endpoint catalogue
//!
//! Builds the [`FetchDescriptor`] for every list, detail and sub-resource
//! request an extraction run issues. Descriptor keys are stable so failures
//! can be traced back to the item that produced them.

use rosetta_fetch::FetchDescriptor;

/// Workflow rules per list page
pub const WORKFLOW_PAGE_SIZE: usize = 200;

/// Functions per list page
pub const FUNCTION_PAGE_SIZE: usize = 50;

const MODULE_STATUSES: &str = "user_hidden,system_hidden,scheduled_for_deletion,visible";
const FIELD_UPDATE_INNER_DETAILS: &str = "module.plural_label,related_module.module_name,\
related_module.plural_label,related_module.singular_label,display_value,field.ui_type";

/// URL builder for one org
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_url: String,
    org_id: String,
}

impl Endpoints {
    /// Create endpoints for `org_id` under `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, org_id: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self {
            base_url,
            org_id: org_id.into().trim().to_string(),
        }
    }

    /// Base URL without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Org id used for the legacy blueprint pages
    #[inline]
    #[must_use]
    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn org_page(&self, page: &str) -> String {
        format!("{}/org{}/{page}", self.base_url, self.org_id)
    }

    /// Every module, hidden ones included
    #[must_use]
    pub fn modules_list(&self) -> FetchDescriptor {
        FetchDescriptor::new("modules", self.url("v6/settings/modules"))
            .with_param("include", "team_spaces")
            .with_param("status", MODULE_STATUSES)
    }

    /// Field schema of one module
    #[must_use]
    pub fn module_fields(&self, module: &str) -> FetchDescriptor {
        FetchDescriptor::new(format!("fields:{module}"), self.url("v2.2/settings/fields"))
            .with_param("module", module)
            .with_param("type", "all")
            .with_param("skip_field_permission", "true")
            .with_param("api_name_page", "true")
    }

    /// One page of workflow rules, starting at 1
    #[must_use]
    pub fn workflows_page(&self, page: usize) -> FetchDescriptor {
        FetchDescriptor::new(
            format!("workflows:page:{page}"),
            self.url("v8/settings/automation/workflow_rules"),
        )
        .with_param("page", page.to_string())
        .with_param("per_page", WORKFLOW_PAGE_SIZE.to_string())
    }

    /// Full workflow rule with conditions and actions
    #[must_use]
    pub fn workflow_detail(&self, id: &str) -> FetchDescriptor {
        FetchDescriptor::new(
            format!("workflow:{id}"),
            self.url(&format!("v8/settings/automation/workflow_rules/{id}")),
        )
    }

    /// Field update action detail
    #[must_use]
    pub fn field_update(&self, id: &str) -> FetchDescriptor {
        FetchDescriptor::new(
            format!("field_update:{id}"),
            self.url(&format!("v8/settings/automation/field_updates/{id}")),
        )
        .with_param("include_inner_details", FIELD_UPDATE_INNER_DETAILS)
    }

    /// One page of functions, `start` is 1-based
    #[must_use]
    pub fn functions_page(&self, start: usize) -> FetchDescriptor {
        FetchDescriptor::new(
            format!("functions:start:{start}"),
            self.url("v2/settings/functions"),
        )
        .with_param("start", start.to_string())
        .with_param("limit", FUNCTION_PAGE_SIZE.to_string())
    }

    /// Function source
    #[must_use]
    pub fn function_detail(&self, id: &str) -> FetchDescriptor {
        FetchDescriptor::new(
            format!("function:{id}"),
            self.url(&format!("v2/settings/functions/{id}")),
        )
        .with_param("category", "standalone")
        .with_param("source", "crm")
        .with_param("language", "deluge")
    }

    /// Every blueprint process
    #[must_use]
    pub fn blueprints_list(&self) -> FetchDescriptor {
        FetchDescriptor::new("blueprints", self.org_page("ProcessFlow.do"))
            .with_param("action", "showAllProcesses")
            .with_param("pageTitle", "crm.label.process.automation")
            .with_param("allowMultiClick", "true")
            .with_param("isFromBack", "true")
            .with_param("module", "All")
    }

    /// Blueprint process with its transition list
    #[must_use]
    pub fn blueprint_detail(&self, id: &str, module: &str) -> FetchDescriptor {
        FetchDescriptor::new(format!("blueprint:{id}"), self.org_page("ProcessFlow.do"))
            .with_param("action", "getProcessDetails")
            .with_param("module", module)
            .with_param("processId", id)
            .with_param("toolTip", module)
            .with_param("isFromBack", "true")
    }

    /// One blueprint transition
    #[must_use]
    pub fn transition(
        &self,
        blueprint_id: &str,
        transition_id: &str,
        module: &str,
        layout_id: &str,
    ) -> FetchDescriptor {
        FetchDescriptor::new(
            format!("transition:{blueprint_id}:{transition_id}"),
            self.org_page("FlowTransition.do"),
        )
        .with_param("Module", module)
        .with_param("action", "getTransitionDetails")
        .with_param("TransitionId", transition_id)
        .with_param("LayoutId", layout_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> Endpoints {
        Endpoints::new("https://crm.zoho.com/crm/", "123")
    }

    fn param<'a>(descriptor: &'a FetchDescriptor, name: &str) -> Option<&'a str> {
        descriptor
            .params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn trailing_slash_is_dropped() {
        assert_eq!(
            endpoints().modules_list().url,
            "https://crm.zoho.com/crm/v6/settings/modules"
        );
    }

    #[test]
    fn blueprint_pages_live_under_org() {
        let detail = endpoints().blueprint_detail("900", "Potentials");
        assert_eq!(detail.url, "https://crm.zoho.com/crm/org123/ProcessFlow.do");
        assert_eq!(detail.key, "blueprint:900");
        assert_eq!(param(&detail, "processId"), Some("900"));
        assert_eq!(param(&detail, "toolTip"), Some("Potentials"));
    }

    #[test]
    fn paging_params() {
        let page = endpoints().workflows_page(3);
        assert_eq!(param(&page, "page"), Some("3"));
        assert_eq!(param(&page, "per_page"), Some("200"));

        let functions = endpoints().functions_page(51);
        assert_eq!(functions.key, "functions:start:51");
        assert_eq!(param(&functions, "limit"), Some("50"));
    }

    #[test]
    fn transition_keys_are_unique_per_blueprint() {
        let e = endpoints();
        let a = e.transition("900", "T1", "Potentials", "L-1");
        let b = e.transition("901", "T1", "Potentials", "L-1");
        assert_ne!(a.key, b.key);
        assert_eq!(param(&a, "LayoutId"), Some("L-1"));
    }
}
