use axum::extract::State;
use axum::Json;
use console_rules::{validate, Rule};
use console_types::ConsoleTemplate;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;

use crate::admission::object;
use crate::AppState;

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

/// `spec.md` §4.6: rejects with an error enumerating every invalid rule element.
fn validation_errors(template: &ConsoleTemplate) -> Option<String> {
    let (rules, default) = rules_from_template(template);
    match validate(&rules, default.as_ref()) {
        Ok(()) => None,
        Err(errors) => Some(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        ),
    }
}

pub async fn handle(
    State(_state): State<AppState>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let req: AdmissionRequest<DynamicObject> = match body.try_into() {
        Ok(req) => req,
        Err(err) => {
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };
    let mut res = AdmissionResponse::from(&req);

    let template = match object::<ConsoleTemplate>(&req) {
        Ok(template) => template,
        Err(err) => return Json(res.deny(err.to_string()).into_review()),
    };

    if let Some(message) = validation_errors(&template) {
        res = res.deny(message);
    }

    Json(res.into_review())
}
