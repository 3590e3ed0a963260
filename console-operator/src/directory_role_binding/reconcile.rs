use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use console_directory::Registry;
use console_types::{DirectoryRoleBinding, Subject};
use futures::stream::StreamExt;
use k8s_openapi::api::rbac::v1::RoleBinding;
use kube::client::Client;
use kube::runtime::{controller::Action, Controller};
use kube::{Api, ResourceExt};
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use metrics::counter;
use owo_colors::OwoColorize;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::actions;
use crate::util::{
    colors::{FG1, FG2},
    Error,
};

/// How often a stable DRB is revisited even without a watch event.
const REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Entrypoint for the `DirectoryRoleBinding` controller.
pub async fn run(client: Client, registry: Arc<Registry>, namespace: String) -> Result<(), Error> {
    println!("{}", "⚙️ Starting DirectoryRoleBinding controller...".green());

    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone(), registry));

    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("console-operator-{}", uuid::Uuid::new_v4()));
    let lease_ttl = Duration::from_secs(15);
    let renew_every = Duration::from_secs(5);
    let leadership = LeaseLock::new(
        client.clone(),
        &namespace,
        LeaseLockParams {
            holder_id,
            lease_name: "directory-role-binding-controller-lock".to_string(),
            lease_ttl,
        },
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        console_common::shutdown::shutdown_signal().await;
        shutdown_signal.cancel();
    });

    let mut controller_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut tick = tokio::time::interval(renew_every);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Some(task) = controller_task.take() {
                    task.abort();
                    task.await.ok();
                }
                break Ok(())
            },
            _ = tick.tick() => {}
        }
        let lease = match leadership.try_acquire_or_renew().await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("leader election renew/acquire failed: {e}");
                if let Some(task) = controller_task.take() {
                    task.abort();
                }
                continue;
            }
        };
        if matches!(lease, LeaseLockResult::Acquired(_)) {
            if controller_task.is_none() {
                println!(
                    "{}",
                    "👑 Acquired leadership; starting DirectoryRoleBinding controller".green()
                );
                let client_for_controller = client.clone();
                let context_for_controller = context.clone();
                let controller_namespace = namespace.clone();
                let crd_api: Api<DirectoryRoleBinding> =
                    Api::namespaced(client_for_controller.clone(), &controller_namespace);
                controller_task = Some(tokio::spawn(async move {
                    Controller::new(crd_api, Default::default())
                        .owns(
                            Api::<RoleBinding>::namespaced(client_for_controller, &controller_namespace),
                            Default::default(),
                        )
                        .run(reconcile, on_error, context_for_controller)
                        .for_each(|_res| async move {})
                        .await;
                }));
            }
        } else if let Some(task) = controller_task.take() {
            eprintln!("lost leadership; stopping DirectoryRoleBinding controller");
            task.abort();
        }
    }
}

struct ContextData {
    client: Client,
    registry: Arc<Registry>,
    last_action: Mutex<HashMap<(String, String), (String, Instant)>>,
}

impl ContextData {
    fn new(client: Client, registry: Arc<Registry>) -> Self {
        ContextData {
            client,
            registry,
            last_action: Mutex::new(HashMap::new()),
        }
    }
}

#[derive(Debug, Clone)]
enum DrbAction {
    Requeue(Duration),
    Sync(Vec<Subject>),
    Fail(String),
    NoOp,
}

impl DrbAction {
    fn to_str(&self) -> &'static str {
        match self {
            DrbAction::Requeue(_) => "Requeue",
            DrbAction::Sync(_) => "Sync",
            DrbAction::Fail(_) => "Fail",
            DrbAction::NoOp => "NoOp",
        }
    }
}

async fn reconcile(instance: Arc<DirectoryRoleBinding>, context: Arc<ContextData>) -> Result<Action, Error> {
    let client = context.client.clone();
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("DirectoryRoleBinding must be namespaced".to_string()))?;
    let name = instance.name_any();

    counter!("directory_role_binding_reconcile_total", "namespace" => namespace.clone()).increment(1);

    let action = determine_action(client.clone(), &context.registry, &instance).await?;

    if !matches!(action, DrbAction::NoOp) {
        let mut la = context.last_action.lock().await;
        let key = (namespace.clone(), name.clone());
        let previous = la.insert(key, (action.to_str().to_string(), Instant::now()));
        if previous.as_ref().map(|(a, _)| a.as_str()) != Some(action.to_str()) {
            println!(
                "🔧 {}{}{}{}{}",
                namespace.color(FG2),
                "/".color(FG1),
                name.color(FG2),
                " ACTION: ".color(FG1),
                action.to_str().color(FG2),
            );
        }
    }

    counter!("directory_role_binding_action_total", "namespace" => namespace.clone(), "action" => action.to_str())
        .increment(1);

    let result = match action {
        DrbAction::Requeue(duration) => Action::requeue(duration),
        DrbAction::Sync(expanded) => {
            actions::sync_role_binding(client, &instance, expanded).await?;
            Action::requeue(REFRESH_INTERVAL)
        }
        DrbAction::Fail(message) => {
            actions::fail(client, &instance, message).await?;
            Action::requeue(Duration::from_secs(30))
        }
        DrbAction::NoOp => Action::requeue(REFRESH_INTERVAL),
    };

    Ok(result)
}

async fn determine_action(
    client: Client,
    registry: &Registry,
    instance: &DirectoryRoleBinding,
) -> Result<DrbAction, Error> {
    if instance.metadata.deletion_timestamp.is_some() {
        return Ok(DrbAction::Requeue(Duration::from_secs(2)));
    }

    let role_binding = actions::ensure_role_binding(client.clone(), instance).await?;

    if !actions::role_ref_matches(&role_binding, instance) {
        return Ok(DrbAction::Fail(format!(
            "roleRef {:?} is immutable and does not match the existing RoleBinding's roleRef",
            instance.spec.role_ref
        )));
    }

    let expanded = actions::expand_subjects(registry, instance).await?;
    let current = actions::current_subjects(&role_binding);

    if subject_sets_differ(&current, &expanded) {
        Ok(DrbAction::Sync(expanded))
    } else {
        Ok(DrbAction::NoOp)
    }
}

fn subject_sets_differ(current: &[Subject], expanded: &[Subject]) -> bool {
    let current: HashSet<_> = current.iter().map(Subject::identity).collect();
    let expanded: HashSet<_> = expanded.iter().map(Subject::identity).collect();
    current != expanded
}

fn on_error(instance: Arc<DirectoryRoleBinding>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!(
            "DirectoryRoleBinding reconciliation error: {:?} {:?}",
            error,
            instance.name_any()
        )
        .red()
    );
    Action::requeue(Duration::from_secs(5))
}
