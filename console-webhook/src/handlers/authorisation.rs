use std::collections::HashSet;

use axum::extract::State;
use axum::Json;
use console_types::{Console, ConsoleAuthorisation, ConsoleAuthorisationSpec, Subject};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use kube::{Api, Resource, ResourceExt};

use crate::admission::{old_object, object, submitter};
use crate::AppState;

/// `spec.md` §4.4: computes the add/remove diff and validates it against
/// the single-approval-per-update rule.
fn validate_update(old: &ConsoleAuthorisationSpec, new: &ConsoleAuthorisationSpec, username: &str, console_owner: &str) -> Result<(), String> {
    if old.console_ref != new.console_ref {
        return Err("consoleRef is immutable".to_string());
    }

    let old_set: HashSet<_> = old.authorisations.iter().map(Subject::identity).collect();
    let new_set: HashSet<_> = new.authorisations.iter().map(Subject::identity).collect();

    let add: Vec<&Subject> = new
        .authorisations
        .iter()
        .filter(|s| !old_set.contains(&s.identity()))
        .collect();
    let remove_count = old
        .authorisations
        .iter()
        .filter(|s| !new_set.contains(&s.identity()))
        .count();

    if remove_count != 0 {
        return Err("removing an existing authorisation is not permitted".to_string());
    }
    if add.len() > 1 {
        return Err("at most one authorisation may be added per update".to_string());
    }
    let Some(added) = add.first() else {
        return Err("update made no change to authorisations".to_string());
    };
    if added.name != username {
        return Err(format!(
            "added authorisation '{}' does not match submitting user '{username}'",
            added.name
        ));
    }
    if added.name == console_owner {
        return Err("the Console's owner may not approve their own session".to_string());
    }
    Ok(())
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

    let (old, new) = match (old_object::<ConsoleAuthorisation>(&req), object::<ConsoleAuthorisation>(&req)) {
        (Ok(old), Ok(new)) => (old, new),
        (Err(err), _) | (_, Err(err)) => return Json(res.deny(err.to_string()).into_review()),
    };
    let username = submitter(&req).to_string();

    let namespace = new.namespace().unwrap_or_default();
    let consoles: Api<Console> = Api::namespaced(state.client.clone(), &namespace);
    let console = match consoles.get(&new.spec.console_ref).await {
        Ok(console) => console,
        Err(err) => return Json(res.deny(err.to_string()).into_review()),
    };

    match validate_update(&old.spec, &new.spec, &username, &console.spec.user) {
        Ok(()) => {
            let creation_time = console
                .meta()
                .creation_timestamp
                .as_ref()
                .and_then(|t| chrono::DateTime::from_timestamp(t.0.as_second(), 0))
                .unwrap_or_else(chrono::Utc::now);
            state
                .recorder
                .console_authorise(creation_time, &namespace, &new.spec.console_ref, &username)
                .await;
        }
        Err(message) => res = res.deny(message),
    }

    Json(res.into_review())
}

#[cfg(test)]
mod tests {
    use console_types::Subject;
    use k8s_openapi::api::authentication::v1::UserInfo;
    use kube::core::admission::Operation;
    use kube::core::gvk::{GroupVersionKind, GroupVersionResource};
    use kube::core::{DynamicObject, TypeMeta};

    use super::*;

    fn spec(authorisations: Vec<Subject>) -> ConsoleAuthorisationSpec {
        ConsoleAuthorisationSpec {
            console_ref: "my-console".to_string(),
            authorisations,
        }
    }

    #[test]
    fn rejects_self_approval() {
        let old = spec(vec![]);
        let new = spec(vec![Subject::user("alice")]);
        let err = validate_update(&old, &new, "alice", "alice").unwrap_err();
        assert!(err.contains("own session"));
    }

    #[test]
    fn rejects_approval_added_by_someone_else() {
        let old = spec(vec![]);
        let new = spec(vec![Subject::user("bob")]);
        let err = validate_update(&old, &new, "alice", "owner").unwrap_err();
        assert!(err.contains("does not match submitting user"));
    }

    #[test]
    fn rejects_more_than_one_addition() {
        let old = spec(vec![]);
        let new = spec(vec![Subject::user("alice"), Subject::user("bob")]);
        let err = validate_update(&old, &new, "alice", "owner").unwrap_err();
        assert!(err.contains("at most one"));
    }

    #[test]
    fn rejects_removal() {
        let old = spec(vec![Subject::user("alice")]);
        let new = spec(vec![]);
        let err = validate_update(&old, &new, "alice", "owner").unwrap_err();
        assert!(err.contains("removing"));
    }

    #[test]
    fn rejects_console_ref_change() {
        let old = spec(vec![]);
        let new = ConsoleAuthorisationSpec {
            console_ref: "other-console".to_string(),
            authorisations: vec![],
        };
        let err = validate_update(&old, &new, "alice", "owner").unwrap_err();
        assert!(err.contains("immutable"));
    }

    #[test]
    fn accepts_a_single_approval_by_a_distinct_user() {
        let old = spec(vec![]);
        let new = spec(vec![Subject::user("bob")]);
        assert!(validate_update(&old, &new, "bob", "alice").is_ok());
    }

    /// Builds the `AdmissionRequest` the way the API server would, to
    /// exercise the same `old_object`/`object` decode path `handle` uses.
    fn update_request(old: &ConsoleAuthorisation, new: &ConsoleAuthorisation, username: &str) -> AdmissionRequest<DynamicObject> {
        let to_dynamic = |v: &ConsoleAuthorisation| -> DynamicObject {
            serde_json::from_value(serde_json::to_value(v).unwrap()).unwrap()
        };
        AdmissionRequest {
            types: TypeMeta::default(),
            uid: "test-uid".to_string(),
            kind: GroupVersionKind::gvk("console.example.io", "v1", "ConsoleAuthorisation"),
            resource: GroupVersionResource::gvr("console.example.io", "v1", "consoleauthorisations"),
            sub_resource: None,
            request_kind: None,
            request_resource: None,
            request_sub_resource: None,
            name: new.meta().name.clone().unwrap_or_default(),
            namespace: new.meta().namespace.clone(),
            operation: Operation::Update,
            user_info: UserInfo {
                username: Some(username.to_string()),
                ..Default::default()
            },
            object: Some(to_dynamic(new)),
            old_object: Some(to_dynamic(old)),
            dry_run: false,
            options: None,
        }
    }

    #[test]
    fn decodes_old_and_new_from_an_in_memory_admission_request() {
        let mut old = ConsoleAuthorisation::new("my-console", spec(vec![]));
        old.metadata.namespace = Some("default".to_string());
        let mut new = old.clone();
        new.spec = spec(vec![Subject::user("alice")]);

        let req = update_request(&old, &new, "alice");

        let decoded_old = old_object::<ConsoleAuthorisation>(&req).unwrap();
        let decoded_new = object::<ConsoleAuthorisation>(&req).unwrap();
        assert_eq!(decoded_old.spec, old.spec);
        assert_eq!(decoded_new.spec, new.spec);
        assert_eq!(submitter(&req), "alice");
    }
}
