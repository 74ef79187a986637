pub mod actuation;
pub mod capture;
pub mod control;
pub mod detection;
pub mod remote;
pub mod shared;
pub mod skill;

#[cfg(test)]
pub(crate) mod test_support;
