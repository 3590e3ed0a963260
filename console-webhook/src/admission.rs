use kube::core::admission::AdmissionRequest;
use kube::core::DynamicObject;
use serde::de::DeserializeOwned;

use crate::util::Error;

/// Decodes the submitted object of an [`AdmissionRequest`] into a typed CRD
/// struct.
pub fn object<T: DeserializeOwned>(req: &AdmissionRequest<DynamicObject>) -> Result<T, Error> {
    let obj = req
        .object
        .clone()
        .ok_or_else(|| Error::InvalidRequest("admission request carried no object".to_string()))?;
    serde_json::from_value(serde_json::to_value(obj)?).map_err(Error::from)
}

/// Decodes the prior version of the submitted object, present on `UPDATE`.
pub fn old_object<T: DeserializeOwned>(req: &AdmissionRequest<DynamicObject>) -> Result<T, Error> {
    let obj = req
        .old_object
        .clone()
        .ok_or_else(|| Error::InvalidRequest("admission request carried no old object".to_string()))?;
    serde_json::from_value(serde_json::to_value(obj)?).map_err(Error::from)
}

/// The submitting user's identity (`spec.md` §4.4, §4.5).
pub fn submitter(req: &AdmissionRequest<DynamicObject>) -> &str {
    &req.user_info.username
}
