//! Classroom grader: classroom bookkeeping around an AI grading pipeline.
//!
//! The grading core lives in [`grading`]; everything else is the web layer
//! that feeds it student and reference answers.

pub mod config;
pub mod domain;
pub mod error;
pub mod grading;
pub mod logic;
pub mod openai;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
