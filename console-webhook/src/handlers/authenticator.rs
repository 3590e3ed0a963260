use std::sync::Arc;

use console_audit::Recorder;
use console_rules::{match_command, Rule};
use console_types::{Console, ConsoleTemplate};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use kube::{Api, Resource, ResourceExt};
use axum::extract::State;
use axum::Json;

use crate::admission::{object, submitter};
use crate::AppState;

/// Step: overrides `spec.user` with the submitting user's identity,
/// regardless of what the submitter sent (`spec.md` §4.5).
fn patched_user(console: &serde_json::Value, username: &str) -> json_patch::Patch {
    let mut modified = console.clone();
    modified["spec"]["user"] = serde_json::Value::String(username.to_string());
    modified["status"]["requestEventEmitted"] = serde_json::Value::Bool(true);
    json_patch::diff(console, &modified)
}

fn rules_from_template(template: &ConsoleTemplate) -> (Vec<Rule>, Option<Rule>) {
    let rules = template
        .spec
        .authorisation_rules
        .iter()
        .map(|r| Rule {
            name: r.name.clone(),
            match_command_elements: r.match_command_elements.clone(),
            authorisations_required: r.authorisations_required,
            subjects: r.subjects.iter().map(|s| s.name.clone()).collect(),
        })
        .collect();
    let default = template.spec.default_authorisation_rule.as_ref().map(|r| Rule {
        name: r.name.clone(),
        match_command_elements: r.match_command_elements.clone(),
        authorisations_required: r.authorisations_required,
        subjects: r.subjects.iter().map(|s| s.name.clone()).collect(),
    });
    (rules, default)
}

pub async fn handle(
    State(state): State<AppState>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(err) => {
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };
    let mut res = AdmissionResponse::from(&req);

    let Some(raw) = req.object.clone() else {
        return Json(res.into_review());
    };
    let username = submitter(&req).to_string();
    let raw_value = match serde_json::to_value(&raw) {
        Ok(v) => v,
        Err(err) => return Json(res.deny(err.to_string()).into_review()),
    };

    let patch = patched_user(&raw_value, &username);
    res = match res.clone().with_patch(patch) {
        Ok(res) => res,
        Err(err) => res.deny(err.to_string()),
    };

    if let Ok(console) = object::<Console>(&req) {
        let namespace = raw.namespace().unwrap_or_default();
        let name = raw.name_any();
        let required_authorisations = resolve_required_authorisations(&state, &namespace, &console).await;
        let creation_time = console
            .meta()
            .creation_timestamp
            .as_ref()
            .and_then(|t| chrono::DateTime::from_timestamp(t.0.as_second(), 0))
            .unwrap_or_else(chrono::Utc::now);
        record_request(
            &state.recorder,
            creation_time,
            &namespace,
            &name,
            &console,
            &username,
            required_authorisations,
        )
        .await;
    }

    Json(res.into_review())
}

/// Best-effort: if the template can't be read, falls back to 0 rather
/// than failing a mutating webhook over an audit-only detail.
async fn resolve_required_authorisations(state: &AppState, namespace: &str, console: &Console) -> u32 {
    let api: Api<ConsoleTemplate> = Api::namespaced(state.client.clone(), namespace);
    let Ok(template) = api.get(&console.spec.console_template_ref).await else {
        return 0;
    };
    let command = console
        .spec
        .command
        .clone()
        .or_else(|| template.spec.default_command.clone())
        .unwrap_or_default();
    let (rules, default) = rules_from_template(&template);
    match_command(&rules, default.as_ref(), &command)
        .map(|matched| matched.rule.authorisations_required)
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
async fn record_request(
    recorder: &Arc<Recorder>,
    creation_time: chrono::DateTime<chrono::Utc>,
    namespace: &str,
    name: &str,
    console: &Console,
    username: &str,
    required_authorisations: u32,
) {
    recorder
        .console_request(
            creation_time,
            namespace,
            name,
            &console.spec.reason,
            username,
            &console.spec.console_template_ref,
            required_authorisations,
            std::collections::BTreeMap::new(),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::authentication::v1::UserInfo;
    use kube::core::admission::Operation;
    use kube::core::gvk::{GroupVersionKind, GroupVersionResource};
    use kube::core::{DynamicObject, TypeMeta};

    use super::*;

    #[test]
    fn patched_user_overrides_a_spoofed_spec_user() {
        let submitted = serde_json::json!({
            "apiVersion": "console.example.io/v1",
            "kind": "Console",
            "metadata": {"name": "my-console", "namespace": "default"},
            "spec": {
                "user": "someone-else",
                "reason": "debugging",
                "consoleTemplateRef": "default",
            },
        });

        let patch = patched_user(&submitted, "alice");
        let mut patched = submitted.clone();
        json_patch::patch(&mut patched, &patch).unwrap();

        assert_eq!(patched["spec"]["user"], "alice");
        assert_eq!(patched["status"]["requestEventEmitted"], true);
    }

    /// Builds the `AdmissionRequest` the way the API server would, to
    /// exercise the same decode path `handle` uses.
    fn create_request(object: serde_json::Value, username: &str) -> AdmissionRequest<DynamicObject> {
        AdmissionRequest {
            types: TypeMeta::default(),
            uid: "test-uid".to_string(),
            kind: GroupVersionKind::gvk("console.example.io", "v1", "Console"),
            resource: GroupVersionResource::gvr("console.example.io", "v1", "consoles"),
            sub_resource: None,
            request_kind: None,
            request_resource: None,
            request_sub_resource: None,
            name: "my-console".to_string(),
            namespace: Some("default".to_string()),
            operation: Operation::Create,
            user_info: UserInfo {
                username: Some(username.to_string()),
                ..Default::default()
            },
            object: Some(serde_json::from_value(object).unwrap()),
            old_object: None,
            dry_run: false,
            options: None,
        }
    }

    #[test]
    fn submitter_identifies_the_requesting_user_from_an_in_memory_request() {
        let object = serde_json::json!({
            "apiVersion": "console.example.io/v1",
            "kind": "Console",
            "metadata": {"name": "my-console", "namespace": "default"},
            "spec": {
                "user": "someone-else",
                "reason": "debugging",
                "consoleTemplateRef": "default",
            },
        });
        let req = create_request(object, "alice");

        assert_eq!(submitter(&req), "alice");
        let console = object::<Console>(&req).unwrap();
        assert_eq!(console.spec.user, "someone-else");
    }

    #[test]
    fn rules_from_template_carries_over_default_and_named_rules() {
        let template: ConsoleTemplate = serde_json::from_value(serde_json::json!({
            "apiVersion": "console.example.io/v1",
            "kind": "ConsoleTemplate",
            "metadata": {"name": "default", "namespace": "default"},
            "spec": {
                "template": {},
                "defaultTimeoutSeconds": 60,
                "maxTimeoutSeconds": 3600,
                "defaultAuthorisationRule": {
                    "name": "default",
                    "authorisationsRequired": 1,
                    "subjects": [{"kind": "Group", "name": "sres"}],
                },
                "authorisationRules": [{
                    "name": "prod-access",
                    "matchCommandElements": ["kubectl", "exec"],
                    "authorisationsRequired": 2,
                    "subjects": [{"kind": "Group", "name": "prod-approvers"}],
                }],
            },
        }))
        .unwrap();

        let (rules, default) = rules_from_template(&template);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "prod-access");
        assert_eq!(rules[0].authorisations_required, 2);
        let default = default.unwrap();
        assert_eq!(default.name, "default");
        assert_eq!(default.authorisations_required, 1);
    }
}
