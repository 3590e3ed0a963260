pub mod attach_observer;
pub mod authenticator;
pub mod authorisation;
pub mod priority_injector;
pub mod template_validator;
