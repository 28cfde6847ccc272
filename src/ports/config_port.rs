//! Configuration access port.
//!
//! Typed getters fall back to the supplied default when a key is missing or
//! does not parse; validation of required keys happens in
//! [`crate::domain::config_validation`].

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Trimmed, non-empty value.
    fn get_non_empty(&self, section: &str, key: &str) -> Option<String> {
        self.get_string(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
