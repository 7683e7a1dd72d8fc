//! Cross-crate integration tests for fxrack

#[cfg(test)]
mod rack_integration;
