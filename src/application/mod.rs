pub mod pipeline;
pub mod relay;
pub mod worker;

#[cfg(test)]
mod functional_tests;
