use std::collections::BTreeMap;

use console_audit::Recorder;
use console_types::{
    condition_types, Console, ConsoleAuthorisation, ConsoleAuthorisationSpec, ConsolePhase,
    ConsoleStatus, ConsoleTemplate, DirectoryRoleBinding, DirectoryRoleBindingSpec, RoleRef,
    Subject, CONSOLE_NAME_LABEL,
};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, Client, Resource, ResourceExt};

use crate::util::{hash_spec, patch_status, Error};

fn instance_name(instance: &Console) -> Result<&str, Error> {
    instance
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("Console is missing metadata.name".to_string()))
}

fn instance_namespace(instance: &Console) -> Result<&str, Error> {
    instance
        .meta()
        .namespace
        .as_deref()
        .ok_or_else(|| Error::UserInput("Console is missing metadata.namespace".to_string()))
}

fn condition(type_: &str, status: &str, reason: &str, message: &str) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Time(chrono_now()),
        observed_generation: None,
    }
}

fn chrono_now() -> k8s_openapi::jiff::Timestamp {
    k8s_openapi::jiff::Timestamp::now()
}

fn creation_time(instance: &Console) -> chrono::DateTime<chrono::Utc> {
    instance
        .meta()
        .creation_timestamp
        .as_ref()
        .and_then(|t| chrono::DateTime::from_timestamp(t.0.as_second(), 0))
        .unwrap_or_else(chrono::Utc::now)
}

/// Step 2: first-observed reconcile. Resolves the governing authorisation
/// rule and effective timeout, and sets the initial phase.
///
/// `ConsoleRequest` is emitted by the authenticator webhook at admission
/// time, not here: it is the only point where the submitting user's
/// identity is authoritative (`spec.md` §9). A Console admitted without
/// passing through that webhook simply never gets a `ConsoleRequest`.
pub async fn initialise(
    client: Client,
    instance: &Console,
    phase: ConsolePhase,
    expiry_time: chrono::DateTime<chrono::Utc>,
    rule_name: String,
) -> Result<(), Error> {
    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status.phase = Some(phase);
        status.expiry_time = Some(Time(
            k8s_openapi::jiff::Timestamp::from_second(expiry_time.timestamp())
                .unwrap_or_else(|_| chrono_now()),
        ));
        status.authorisation_rule = Some(rule_name);
    })
    .await?;
    Ok(())
}

/// Step 3: lazily creates the companion ConsoleAuthorisation if it does not
/// yet exist, owned by the Console.
pub async fn ensure_console_authorisation(client: Client, instance: &Console) -> Result<(), Error> {
    let namespace = instance_namespace(instance)?;
    let name = instance_name(instance)?;
    let api: Api<ConsoleAuthorisation> = Api::namespaced(client.clone(), namespace);
    match api.get(name).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            let object = ConsoleAuthorisation {
                metadata: ObjectMeta {
                    name: Some(name.to_string()),
                    namespace: Some(namespace.to_string()),
                    owner_references: Some(vec![instance.controller_owner_ref(&()).unwrap()]),
                    ..Default::default()
                },
                spec: ConsoleAuthorisationSpec {
                    console_ref: name.to_string(),
                    authorisations: Vec::new(),
                },
                status: None,
            };
            match api.create(&PostParams::default(), &object).await {
                Ok(_) => Ok(()),
                Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn advance_to_pending(client: Client, instance: &Console) -> Result<(), Error> {
    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status.phase = Some(ConsolePhase::Pending);
        status.conditions.push(condition(
            condition_types::AUTHORISED,
            "True",
            "ApprovalsSatisfied",
            "required approvals were granted",
        ));
    })
    .await?;
    Ok(())
}

fn job_resource(instance: &Console, template: &ConsoleTemplate) -> Result<Job, Error> {
    let name = instance_name(instance)?.to_string();
    let namespace = instance_namespace(instance)?.to_string();
    let command = instance
        .spec
        .command
        .clone()
        .or_else(|| template.spec.default_command.clone());
    let interactive = !instance.spec.non_interactive.unwrap_or(false);

    let mut pod_template = template.spec.template.clone();
    let pod_spec = pod_template.spec.get_or_insert_with(Default::default);
    if let Some(container) = pod_spec.containers.first_mut() {
        if let Some(command) = command {
            container.command = Some(command);
        }
        container.tty = Some(interactive);
        container.stdin = Some(interactive);
    }
    pod_spec.restart_policy = Some("Never".to_string());

    let labels = pod_template
        .metadata
        .get_or_insert_with(Default::default)
        .labels
        .get_or_insert_with(Default::default);
    labels.insert(CONSOLE_NAME_LABEL.to_string(), name.clone());

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace),
            owner_references: Some(vec![instance.controller_owner_ref(&()).unwrap()]),
            annotations: Some({
                let mut annotations = BTreeMap::new();
                annotations.insert(
                    console_common::annotations::SPEC_HASH.to_string(),
                    hash_spec(&instance.spec),
                );
                annotations.insert(
                    console_common::annotations::CREATED_BY.to_string(),
                    "console-operator".to_string(),
                );
                annotations
            }),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            template: pod_template,
            ..Default::default()
        }),
        status: None,
    })
}

fn attach_subjects(instance: &Console, template: &ConsoleTemplate) -> Vec<Subject> {
    let mut subjects = vec![Subject::user(instance.spec.user.clone())];
    subjects.extend(template.spec.additional_attach_subjects.iter().cloned());
    console_types::dedup_preserve_order(subjects)
}

/// Step 4: synthesises the Job and the attach-granting DirectoryRoleBinding,
/// then emits `ConsoleStart`.
pub async fn create_job(
    client: Client,
    instance: &Console,
    template: &ConsoleTemplate,
    recorder: &Recorder,
) -> Result<(), Error> {
    let namespace = instance_namespace(instance)?;
    let name = instance_name(instance)?;

    let job = job_resource(instance, template)?;
    let jobs: Api<Job> = Api::namespaced(client.clone(), namespace);
    match jobs.create(&PostParams::default(), &job).await {
        Ok(_) => {}
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(e) => return Err(e.into()),
    }

    let drb = DirectoryRoleBinding {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            owner_references: Some(vec![instance.controller_owner_ref(&()).unwrap()]),
            ..Default::default()
        },
        spec: DirectoryRoleBindingSpec {
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: "console-pod-attach".to_string(),
            },
            subjects: attach_subjects(instance, template),
        },
        status: None,
    };
    let drbs: Api<DirectoryRoleBinding> = Api::namespaced(client.clone(), namespace);
    match drbs.create(&PostParams::default(), &drb).await {
        Ok(_) => {}
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(e) => return Err(e.into()),
    }

    patch_status(client.clone(), instance, |status: &mut ConsoleStatus| {
        status.job_name = Some(name.to_string());
    })
    .await?;

    recorder
        .console_start(creation_time(instance), namespace, name, name)
        .await;

    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status.start_event_emitted = true;
    })
    .await?;
    Ok(())
}

pub async fn advance_to_running(client: Client, instance: &Console, pod_name: String) -> Result<(), Error> {
    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status.phase = Some(ConsolePhase::Running);
        status.pod_name = Some(pod_name);
        // probe_job keeps reporting AdvanceToRunning for as long as the
        // console stays Running; only record the condition the first time.
        if !status.conditions.iter().any(|c| c.type_ == condition_types::READY) {
            status
                .conditions
                .push(condition(condition_types::READY, "True", "ContainerRunning", "the console's container is running"));
        }
    })
    .await?;
    Ok(())
}

/// Steps 6/7: stop the Console, deleting the Job (which cascades to the
/// Pod) if it hasn't already terminated on its own, and emit
/// `ConsoleTerminate`.
pub async fn stop(
    client: Client,
    instance: &Console,
    recorder: &Recorder,
    timed_out: bool,
    completion_time: Option<chrono::DateTime<chrono::Utc>>,
    container_statuses: BTreeMap<String, String>,
) -> Result<(), Error> {
    let namespace = instance_namespace(instance)?;
    if let Some(job_name) = instance.status.as_ref().and_then(|s| s.job_name.clone()) {
        let jobs: Api<Job> = Api::namespaced(client.clone(), namespace);
        match jobs
            .delete(&job_name, &kube::api::DeleteParams::background())
            .await
        {
            Ok(_) => {}
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }

    patch_status(client.clone(), instance, |status: &mut ConsoleStatus| {
        status.phase = Some(ConsolePhase::Stopped);
        if let Some(completion_time) = completion_time {
            status.completion_time = Some(Time(
                k8s_openapi::jiff::Timestamp::from_second(completion_time.timestamp())
                    .unwrap_or_else(|_| chrono_now()),
            ));
        }
    })
    .await?;

    recorder
        .console_terminate(
            creation_time(instance),
            namespace,
            instance_name(instance)?,
            timed_out,
            container_statuses,
        )
        .await;

    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status.terminate_event_emitted = true;
    })
    .await?;
    Ok(())
}

pub async fn fail(client: Client, instance: &Console, message: String) -> Result<(), Error> {
    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status
            .conditions
            .push(condition(condition_types::FAILED, "True", "ConfigurationError", &message));
    })
    .await?;
    Ok(())
}

/// Emits `ConsoleTerminate` for a Console that reaches GC eligibility
/// without ever having passed through `stop` (e.g. TTL-before-running
/// elapsed while still `Pending`/`PendingAuthorisation`), mirroring `stop`'s
/// `terminate_event_emitted` guard so a Console that did stop normally
/// isn't double-audited here.
pub async fn gc_terminate(client: Client, instance: &Console, recorder: &Recorder) -> Result<(), Error> {
    let already_emitted = instance.status.as_ref().is_some_and(|s| s.terminate_event_emitted);
    if already_emitted {
        return Ok(());
    }

    recorder
        .console_terminate(
            creation_time(instance),
            instance_namespace(instance)?,
            instance_name(instance)?,
            true,
            BTreeMap::new(),
        )
        .await;

    patch_status(client, instance, |status: &mut ConsoleStatus| {
        status.terminate_event_emitted = true;
    })
    .await?;
    Ok(())
}

pub async fn delete_console(client: Client, instance: &Console) -> Result<(), Error> {
    let namespace = instance_namespace(instance)?;
    let name = instance_name(instance)?;
    let api: Api<Console> = Api::namespaced(client, namespace);
    match api.delete(name, &kube::api::DeleteParams::background()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn get_pod(client: Client, namespace: &str, job_name: &str) -> Result<Option<Pod>, Error> {
    let api: Api<Pod> = Api::namespaced(client, namespace);
    let list = api
        .list(&kube::api::ListParams::default().labels(&format!("job-name={job_name}")))
        .await?;
    Ok(list.items.into_iter().next())
}
