//! ProcessingNode: applies its pipe to the incoming payload.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::payload::Payload;
use crate::pipeline::pipe::Pipe;

#[derive(Debug, Clone)]
pub struct ProcessingNode {
    name: String,
    pipe: Option<Pipe>,
}

impl ProcessingNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pipe: None,
        }
    }

    pub fn with_pipe(mut self, pipe: Pipe) -> Self {
        self.pipe = Some(pipe);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipe(&self) -> Option<&Pipe> {
        self.pipe.as_ref()
    }

    pub fn set_pipe(&mut self, pipe: Pipe) {
        self.pipe = Some(pipe);
    }

    /// Invoke the pipe; an absent input is treated as an empty payload.
    ///
    /// Fails with [`PipelineError::MissingPipe`] when no pipe is attached.
    pub fn process(&self, incoming: Option<&Payload>) -> PipelineResult<Payload> {
        let pipe = self.pipe.as_ref().ok_or(PipelineError::MissingPipe)?;

        match incoming {
            Some(payload) => pipe.invoke(payload),
            None => pipe.invoke(&Payload::new()),
        }
    }
}
