pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

use bond_valuation_core::ArithmeticContext;

/// Read a typed value from `path`, falling back to piped stdin.
pub fn load<T: DeserializeOwned>(
    path: Option<&str>,
    missing: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        file::read_structured(path)
    } else if let Some(data) = stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Err(missing.into())
    }
}

/// Arithmetic context from a file, or the defaults.
pub fn load_context(path: Option<&str>) -> Result<ArithmeticContext, Box<dyn std::error::Error>> {
    match path {
        Some(path) => file::read_structured(path),
        None => Ok(ArithmeticContext::default()),
    }
}
