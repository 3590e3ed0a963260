use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use console_audit::Recorder;
use console_rules::{match_command, Rule};
use console_types::{Console, ConsoleAuthorisation, ConsolePhase, ConsoleTemplate};
use futures::stream::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::runtime::{controller::Action, Controller};
use kube::{Api, ResourceExt};
use kube::client::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use metrics::counter;
use owo_colors::OwoColorize;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::actions;
use super::gc::{gc_eligible, gc_time};
use crate::util::{
    colors::{FG1, FG2},
    Error, PROBE_INTERVAL,
};

/// Entrypoint for the `Console` controller.
pub async fn run(client: Client, recorder: Arc<Recorder>, namespace: String) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Console controller...".green());

    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone(), recorder));

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
            lease_name: "console-controller-lock".to_string(),
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
                println!("{}", "👑 Acquired leadership; starting Console controller".green());
                let client_for_controller = client.clone();
                let context_for_controller = context.clone();
                let controller_namespace = namespace.clone();
                let crd_api: Api<Console> = Api::namespaced(client_for_controller.clone(), &controller_namespace);
                controller_task = Some(tokio::spawn(async move {
                    Controller::new(crd_api, Default::default())
                        .owns(
                            Api::<Job>::namespaced(client_for_controller, &controller_namespace),
                            Default::default(),
                        )
                        .run(reconcile, on_error, context_for_controller)
                        .for_each(|_res| async move {})
                        .await;
                }));
            }
        } else if let Some(task) = controller_task.take() {
            eprintln!("lost leadership; stopping Console controller");
            task.abort();
        }
    }
}

struct ContextData {
    client: Client,
    recorder: Arc<Recorder>,
    last_action: Mutex<HashMap<(String, String), (String, Instant)>>,
}

impl ContextData {
    fn new(client: Client, recorder: Arc<Recorder>) -> Self {
        ContextData {
            client,
            recorder,
            last_action: Mutex::new(HashMap::new()),
        }
    }
}

#[derive(Debug, Clone)]
enum ConsoleAction {
    Requeue(Duration),
    Initialise {
        phase: ConsolePhase,
        expiry_time: DateTime<Utc>,
        rule_name: String,
    },
    EnsureAuthorisation,
    AdvanceToPending,
    CreateJob,
    AdvanceToRunning {
        pod_name: String,
    },
    Stop {
        timed_out: bool,
        completion_time: Option<DateTime<Utc>>,
        container_statuses: BTreeMap<String, String>,
    },
    GcDelete,
    Fail(String),
    NoOp,
}

impl ConsoleAction {
    fn to_str(&self) -> &'static str {
        match self {
            ConsoleAction::Requeue(_) => "Requeue",
            ConsoleAction::Initialise { .. } => "Initialise",
            ConsoleAction::EnsureAuthorisation => "EnsureAuthorisation",
            ConsoleAction::AdvanceToPending => "AdvanceToPending",
            ConsoleAction::CreateJob => "CreateJob",
            ConsoleAction::AdvanceToRunning { .. } => "AdvanceToRunning",
            ConsoleAction::Stop { .. } => "Stop",
            ConsoleAction::GcDelete => "GcDelete",
            ConsoleAction::Fail(_) => "Fail",
            ConsoleAction::NoOp => "NoOp",
        }
    }
}

async fn reconcile(instance: Arc<Console>, context: Arc<ContextData>) -> Result<Action, Error> {
    let client = context.client.clone();
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("Console must be namespaced".to_string()))?;
    let name = instance.name_any();

    counter!("console_reconcile_total", "namespace" => namespace.clone()).increment(1);

    let action = determine_action(client.clone(), &instance).await?;

    if !matches!(action, ConsoleAction::NoOp) {
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

    counter!("console_action_total", "namespace" => namespace.clone(), "action" => action.to_str()).increment(1);

    let result = match action {
        ConsoleAction::Requeue(duration) => Action::requeue(duration),
        ConsoleAction::Initialise {
            phase,
            expiry_time,
            rule_name,
        } => {
            actions::initialise(client, &instance, phase, expiry_time, rule_name).await?;
            Action::requeue(Duration::from_secs(1))
        }
        ConsoleAction::EnsureAuthorisation => {
            actions::ensure_console_authorisation(client, &instance).await?;
            Action::requeue(Duration::from_secs(5))
        }
        ConsoleAction::AdvanceToPending => {
            actions::advance_to_pending(client, &instance).await?;
            Action::requeue(Duration::from_secs(1))
        }
        ConsoleAction::CreateJob => {
            let template = load_template(client.clone(), &instance).await?;
            actions::create_job(client, &instance, &template, &context.recorder).await?;
            Action::requeue(Duration::from_secs(2))
        }
        ConsoleAction::AdvanceToRunning { pod_name } => {
            actions::advance_to_running(client, &instance, pod_name).await?;
            Action::requeue(PROBE_INTERVAL)
        }
        ConsoleAction::Stop {
            timed_out,
            completion_time,
            container_statuses,
        } => {
            actions::stop(
                client,
                &instance,
                &context.recorder,
                timed_out,
                completion_time,
                container_statuses,
            )
            .await?;
            Action::requeue(Duration::from_secs(5))
        }
        ConsoleAction::GcDelete => {
            actions::gc_terminate(client.clone(), &instance, &context.recorder).await?;
            actions::delete_console(client, &instance).await?;
            Action::await_change()
        }
        ConsoleAction::Fail(message) => {
            actions::fail(client, &instance, message).await?;
            Action::requeue(Duration::from_secs(30))
        }
        ConsoleAction::NoOp => Action::requeue(PROBE_INTERVAL),
    };

    Ok(result)
}

async fn load_template(client: Client, instance: &Console) -> Result<ConsoleTemplate, Error> {
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("Console must be namespaced".to_string()))?;
    let api: Api<ConsoleTemplate> = Api::namespaced(client, &namespace);
    api.get(&instance.spec.console_template_ref)
        .await
        .map_err(|e| match e {
            kube::Error::Api(ae) if ae.code == 404 => Error::Configuration(format!(
                "ConsoleTemplate '{}' not found",
                instance.spec.console_template_ref
            )),
            e => e.into(),
        })
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

async fn determine_action(client: Client, instance: &Console) -> Result<ConsoleAction, Error> {
    if instance.metadata.deletion_timestamp.is_some() {
        return Ok(ConsoleAction::Requeue(Duration::from_secs(2)));
    }

    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("Console must be namespaced".to_string()))?;
    let name = instance.name_any();

    let template = match load_template(client.clone(), instance).await {
        Ok(t) => t,
        Err(Error::Configuration(message)) => return Ok(ConsoleAction::Fail(message)),
        Err(e) => return Err(e),
    };

    let effective_timeout_secs = instance
        .spec
        .timeout_seconds
        .unwrap_or(template.spec.default_timeout_seconds)
        .min(template.spec.max_timeout_seconds);
    let ttl_before_running = chrono::Duration::seconds(
        instance
            .spec
            .ttl_seconds_before_running
            .or(template.spec.default_ttl_seconds_before_running)
            .unwrap_or(console_types::DEFAULT_TTL_BEFORE_RUNNING_SECONDS)
            .min(console_types::MAX_TTL_BEFORE_RUNNING_SECONDS) as i64,
    );
    let ttl_after_finished = chrono::Duration::seconds(
        instance
            .spec
            .ttl_seconds_after_finished
            .or(template.spec.default_ttl_seconds_after_finished)
            .unwrap_or(console_types::DEFAULT_TTL_AFTER_FINISHED_SECONDS)
            .min(console_types::MAX_TTL_AFTER_FINISHED_SECONDS) as i64,
    );

    let creation_time = instance
        .metadata
        .creation_timestamp
        .as_ref()
        .and_then(|t| DateTime::from_timestamp(t.0.as_second(), 0))
        .unwrap_or_else(Utc::now);
    let expiry_time = instance
        .status
        .as_ref()
        .and_then(|s| s.expiry_time.as_ref())
        .and_then(|t| DateTime::from_timestamp(t.0.as_second(), 0))
        .unwrap_or(creation_time + chrono::Duration::seconds(effective_timeout_secs as i64));
    let completion_time = instance
        .status
        .as_ref()
        .and_then(|s| s.completion_time.as_ref())
        .and_then(|t| DateTime::from_timestamp(t.0.as_second(), 0));

    let phase = instance.status.as_ref().and_then(|s| s.phase);

    let gc = gc_time(
        phase,
        creation_time,
        completion_time,
        expiry_time,
        ttl_before_running,
        ttl_after_finished,
    );
    if gc_eligible(gc, Utc::now()) {
        return Ok(ConsoleAction::GcDelete);
    }

    match phase {
        None => {
            let command = instance
                .spec
                .command
                .clone()
                .or_else(|| template.spec.default_command.clone())
                .unwrap_or_default();
            let (rules, default) = rules_from_template(&template);
            let matched = match_command(&rules, default.as_ref(), &command)?;
            let has_rules =
                !template.spec.authorisation_rules.is_empty() || template.spec.default_authorisation_rule.is_some();
            let phase = if has_rules {
                ConsolePhase::PendingAuthorisation
            } else {
                ConsolePhase::Pending
            };
            Ok(ConsoleAction::Initialise {
                phase,
                expiry_time,
                rule_name: matched.name.to_string(),
            })
        }
        Some(ConsolePhase::PendingAuthorisation) => {
            let authorisations: Api<ConsoleAuthorisation> = Api::namespaced(client, &namespace);
            let authorisation = match authorisations.get(&name).await {
                Ok(a) => a,
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    return Ok(ConsoleAction::EnsureAuthorisation);
                }
                Err(e) => return Err(e.into()),
            };
            let command = instance
                .spec
                .command
                .clone()
                .or_else(|| template.spec.default_command.clone())
                .unwrap_or_default();
            let (rules, default) = rules_from_template(&template);
            let matched = match_command(&rules, default.as_ref(), &command)?;
            let approvers: Vec<String> = authorisation
                .spec
                .authorisations
                .iter()
                .map(|s| s.name.clone())
                .collect();
            if console_rules::authorisation_satisfied(matched.rule, &instance.spec.user, &approvers) {
                Ok(ConsoleAction::AdvanceToPending)
            } else {
                Ok(ConsoleAction::Requeue(Duration::from_secs(5)))
            }
        }
        Some(ConsolePhase::Pending) => {
            let Some(job_name) = instance.status.as_ref().and_then(|s| s.job_name.clone()) else {
                return Ok(ConsoleAction::CreateJob);
            };
            probe_job(client, &namespace, &job_name, expiry_time).await
        }
        Some(ConsolePhase::Running) => {
            let job_name = instance
                .status
                .as_ref()
                .and_then(|s| s.job_name.clone())
                .unwrap_or_else(|| name.clone());
            probe_job(client, &namespace, &job_name, expiry_time).await
        }
        Some(ConsolePhase::Stopped) | Some(ConsolePhase::Destroyed) => Ok(ConsoleAction::NoOp),
    }
}

/// Step 5/6/7: inspects the Job's pod to decide whether the Console should
/// advance to `Running`, stop on completion, or stop because the expiry
/// instant has passed.
async fn probe_job(
    client: Client,
    namespace: &str,
    job_name: &str,
    expiry_time: DateTime<Utc>,
) -> Result<ConsoleAction, Error> {
    if Utc::now() >= expiry_time {
        return Ok(ConsoleAction::Stop {
            timed_out: true,
            completion_time: None,
            container_statuses: BTreeMap::new(),
        });
    }

    let Some(pod) = actions::get_pod(client, namespace, job_name).await? else {
        return Ok(ConsoleAction::Requeue(Duration::from_secs(3)));
    };

    let all_terminated = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| {
            !statuses.is_empty()
                && statuses
                    .iter()
                    .all(|c| c.state.as_ref().is_some_and(|s| s.terminated.is_some()))
        });
    if all_terminated {
        let statuses = pod
            .status
            .as_ref()
            .and_then(|s| s.container_statuses.as_ref())
            .cloned()
            .unwrap_or_default();
        let container_statuses = statuses
            .iter()
            .map(|c| {
                let message = c
                    .state
                    .as_ref()
                    .and_then(|s| s.terminated.as_ref())
                    .map(|t| {
                        format!(
                            "exit code {}, reason: {}",
                            t.exit_code,
                            t.reason.as_deref().unwrap_or("(no reason provided)")
                        )
                    })
                    .unwrap_or_default();
                (c.name.clone(), message)
            })
            .collect();
        return Ok(ConsoleAction::Stop {
            timed_out: false,
            completion_time: Some(Utc::now()),
            container_statuses,
        });
    }

    // The first container is the one the Console's command/tty/stdin were
    // set on (`actions::job_resource`); its entering the `running` container
    // state, not pod-level readiness, is what step 5 of the algorithm means
    // by "reaches Running" (`spec.md` §4.2).
    let running = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|cs| cs.first())
        .is_some_and(|c| c.state.as_ref().is_some_and(|s| s.running.is_some()));
    if running {
        Ok(ConsoleAction::AdvanceToRunning {
            pod_name: pod.name_any(),
        })
    } else {
        Ok(ConsoleAction::Requeue(Duration::from_secs(3)))
    }
}

fn on_error(instance: Arc<Console>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!("Console reconciliation error: {:?} {:?}", error, instance.name_any()).red()
    );
    Action::requeue(Duration::from_secs(5))
}
