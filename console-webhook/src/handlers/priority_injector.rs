use axum::extract::State;
use axum::Json;
use console_types::PRIORITY_INJECTOR_LABEL;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use kube::{Api, ResourceExt};
use metrics::counter;

use crate::admission::object;
use crate::AppState;

/// `spec.md` §4.11: defaults a pod's priority class from its namespace's
/// `priority-injector` label. Never denies; unmatched pods pass through.
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
    let namespace = req.namespace.clone().unwrap_or_default();

    counter!("handle_total", "namespace" => namespace.clone()).increment(1);

    let pod = match object::<Pod>(&req) {
        Ok(pod) => pod,
        Err(err) => {
            counter!("errors_total", "namespace" => namespace).increment(1);
            return Json(res.deny(err.to_string()).into_review());
        }
    };

    let namespaces: Api<Namespace> = Api::all(state.client.clone());
    let ns = match namespaces.get(&namespace).await {
        Ok(ns) => ns,
        Err(err) => {
            counter!("errors_total", "namespace" => namespace).increment(1);
            return Json(res.deny(err.to_string()).into_review());
        }
    };

    let class = ns.labels().get(PRIORITY_INJECTOR_LABEL);
    let already_set = pod
        .spec
        .as_ref()
        .is_some_and(|spec| spec.priority_class_name.is_some());

    let Some(class) = class.filter(|_| !already_set) else {
        counter!("skip_total", "namespace" => namespace).increment(1);
        return Json(res.into_review());
    };

    let original = match serde_json::to_value(&pod) {
        Ok(value) => value,
        Err(err) => {
            counter!("errors_total", "namespace" => namespace).increment(1);
            return Json(res.deny(err.to_string()).into_review());
        }
    };
    let mut modified = original.clone();
    modified["spec"]["priorityClassName"] = serde_json::Value::String(class.clone());
    modified["spec"]["priority"] = serde_json::Value::Null;
    let patch = json_patch::diff(&original, &modified);

    let res = match res.clone().with_patch(patch) {
        Ok(res) => res,
        Err(err) => {
            counter!("errors_total", "namespace" => namespace).increment(1);
            return Json(res.deny(err.to_string()).into_review());
        }
    };

    counter!("mutate_total", "namespace" => namespace).increment(1);
    Json(res.into_review())
}
