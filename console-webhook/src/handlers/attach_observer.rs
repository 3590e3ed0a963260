use axum::extract::State;
use axum::Json;
use console_types::{Console, CONSOLE_NAME_LABEL};
use k8s_openapi::api::core::v1::{Pod, PodAttachOptions};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use kube::{Api, Resource, ResourceExt};

use crate::admission::{object, submitter};
use crate::AppState;

/// `spec.md` §4.7: admits the attach unchanged; a Console label triggers an
/// audit event as a side effect, never a denial.
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
    let res = AdmissionResponse::from(&req);

    let Some(namespace) = req.namespace.clone() else {
        return Json(res.into_review());
    };
    let pod_name = req.name.clone();

    let pods: Api<Pod> = Api::namespaced(state.client.clone(), &namespace);
    let pod = match pods.get(&pod_name).await {
        Ok(pod) => pod,
        Err(err) => return Json(res.deny(err.to_string()).into_review()),
    };

    let Some(console_name) = pod.labels().get(CONSOLE_NAME_LABEL) else {
        return Json(res.into_review());
    };

    if req.dry_run {
        return Json(res.into_review());
    }

    let consoles: Api<Console> = Api::namespaced(state.client.clone(), &namespace);
    let console = match consoles.get(console_name).await {
        Ok(console) => console,
        Err(err) => return Json(res.deny(err.to_string()).into_review()),
    };

    let container = object::<PodAttachOptions>(&req)
        .ok()
        .and_then(|opts| opts.container)
        .unwrap_or_default();
    let username = submitter(&req).to_string();
    let creation_time = console
        .meta()
        .creation_timestamp
        .as_ref()
        .and_then(|t| chrono::DateTime::from_timestamp(t.0.as_second(), 0))
        .unwrap_or_else(chrono::Utc::now);

    state
        .recorder
        .console_attach(creation_time, &namespace, console_name, &username, &pod_name, &container)
        .await;

    Json(res.into_review())
}
