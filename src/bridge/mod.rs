pub mod error;
pub mod transform;
pub mod convert;
pub mod projector;
pub mod params;
pub mod node;

#[cfg(test)]
pub(crate) mod test_log;
