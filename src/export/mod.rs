// SPDX-License-Identifier: Apache-2.0

pub mod pipeline;
pub mod sink;
pub mod types;
pub mod writers;

pub use pipeline::persist_run;
pub use sink::{ArtifactSink, FileSink};
pub use types::*;
