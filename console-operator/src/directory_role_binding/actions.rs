use std::collections::BTreeMap;

use console_directory::Registry;
use console_types::{
    condition_types, DirectoryRoleBinding, DirectoryRoleBindingStatus, RoleRef as DrbRoleRef,
    DIRECTORY_ROLE_BINDING_LABEL,
};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject as K8sSubject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, Client, Resource, ResourceExt};

use crate::util::{patch_status, Error};

fn condition(type_: &str, status: &str, reason: &str, message: &str) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Time(k8s_openapi::jiff::Timestamp::now()),
        observed_generation: None,
    }
}

fn instance_name(instance: &DirectoryRoleBinding) -> Result<&str, Error> {
    instance
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("DirectoryRoleBinding is missing metadata.name".to_string()))
}

fn instance_namespace(instance: &DirectoryRoleBinding) -> Result<&str, Error> {
    instance
        .meta()
        .namespace
        .as_deref()
        .ok_or_else(|| Error::UserInput("DirectoryRoleBinding is missing metadata.namespace".to_string()))
}

fn to_k8s_role_ref(role_ref: &DrbRoleRef) -> RoleRef {
    RoleRef {
        api_group: role_ref.api_group.clone(),
        kind: role_ref.kind.clone(),
        name: role_ref.name.clone(),
    }
}

fn to_k8s_subject(subject: &console_types::Subject) -> K8sSubject {
    K8sSubject {
        api_group: subject.api_group.clone(),
        kind: subject.kind.clone(),
        name: subject.name.clone(),
        namespace: subject.namespace.clone(),
    }
}

/// A `RoleRef` is immutable on the Kubernetes `RoleBinding` object itself;
/// if the DRB's spec disagrees with what's already on the child, that's an
/// External-Fatal configuration error (`spec.md` §7), not something to sync.
pub fn role_ref_matches(role_binding: &RoleBinding, instance: &DirectoryRoleBinding) -> bool {
    role_binding.role_ref == to_k8s_role_ref(&instance.spec.role_ref)
}

pub async fn fail(client: Client, instance: &DirectoryRoleBinding, message: String) -> Result<(), Error> {
    patch_status(client, instance, |status: &mut DirectoryRoleBindingStatus| {
        status
            .conditions
            .push(condition(condition_types::FAILED, "True", "RoleRefMismatch", &message));
    })
    .await?;
    Ok(())
}

/// Step 1: ensures the managed child `RoleBinding` exists, owned by the DRB.
pub async fn ensure_role_binding(client: Client, instance: &DirectoryRoleBinding) -> Result<RoleBinding, Error> {
    let namespace = instance_namespace(instance)?;
    let name = instance_name(instance)?;
    let api: Api<RoleBinding> = Api::namespaced(client.clone(), namespace);
    match api.get(name).await {
        Ok(rb) => Ok(rb),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            let rb = RoleBinding {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    labels: Some(BTreeMap::from([(
                        DIRECTORY_ROLE_BINDING_LABEL.to_string(),
                        name.to_string(),
                    )])),
                    owner_references: Some(vec![instance.controller_owner_ref(&()).unwrap()]),
                    ..Default::default()
                },
                role_ref: to_k8s_role_ref(&instance.spec.role_ref),
                subjects: Some(Vec::new()),
            };
            match api.create(&PostParams::default(), &rb).await {
                Ok(created) => Ok(created),
                Err(kube::Error::Api(ae)) if ae.code == 409 => api.get(name).await.map_err(Error::from),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Step 2: expands the DRB's subjects through the directory registry.
pub async fn expand_subjects(
    registry: &Registry,
    instance: &DirectoryRoleBinding,
) -> Result<Vec<console_types::Subject>, Error> {
    registry.expand(&instance.spec.subjects).await.map_err(Error::from)
}

/// Step 3: writes the expanded subject set to the managed `RoleBinding` if
/// it differs from what's currently there.
pub async fn sync_role_binding(
    client: Client,
    instance: &DirectoryRoleBinding,
    expanded: Vec<console_types::Subject>,
) -> Result<(), Error> {
    let namespace = instance_namespace(instance)?;
    let name = instance_name(instance)?;
    let api: Api<RoleBinding> = Api::namespaced(client, namespace);
    let subjects = expanded.iter().map(to_k8s_subject).collect::<Vec<_>>();
    let patch = serde_json::json!({ "subjects": subjects });
    api.patch(
        name,
        &kube::api::PatchParams::default(),
        &kube::api::Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

pub fn current_subjects(role_binding: &RoleBinding) -> Vec<console_types::Subject> {
    role_binding
        .subjects
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|s| console_types::Subject {
            api_group: s.api_group.clone(),
            kind: s.kind.clone(),
            name: s.name.clone(),
            namespace: s.namespace.clone(),
        })
        .collect()
}
