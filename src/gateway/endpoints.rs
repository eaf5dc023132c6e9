//! Backend paths.

pub const SEND_OTP: &str = "/users/send-otp";
pub const VERIFY_OTP: &str = "/users/verify-otp";
pub const GEOGRAPHY: &str = "/geography";

pub fn profile_by_phone(phone: &str) -> String {
    format!("/users/mobile/{phone}")
}

pub fn user(id: &str) -> String {
    format!("/users/{id}")
}

/// Path of an entity created by a wizard, e.g. `/agents/AG-104`.
pub fn entity(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}
