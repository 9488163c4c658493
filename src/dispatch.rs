// src/dispatch.rs

use crate::backend::Generate;
use crate::error::AppError;
use crate::extract::extract_code_blocks;
use crate::types::{BackendKind, Outcome};

pub const DEFAULT_TEMPERATURE: f32 = 0.25;

/// End-of-text marker some models leave in their output.
const END_OF_TEXT: &str = "<|endoftext|>";

/// Characters the hosted backend leaves after the code inside the first block.
const HOSTED_TRAILER_CHARS: usize = 4;

/// Sends prompts to one backend and turns raw model text into an answer.
pub struct Dispatcher<G: Generate> {
    backend: G,
}

impl<G: Generate> Dispatcher<G> {
    pub fn new(backend: G) -> Self {
        Self { backend }
    }

    /// Prompts `model_id` with `message`.
    ///
    /// Any local backend error is logged and comes back as [`Outcome::Failed`].
    /// That covers errors the server reports (a non-2xx reply) as well as
    /// transport failures such as a refused connection or an undecodable body.
    /// Hosted backend errors of either kind are returned as `Err`.
    pub fn dispatch(
        &self,
        message: &str,
        model_id: &str,
        temperature: f32,
        extract_code: bool,
    ) -> Result<Outcome, AppError> {
        let kind = self.backend.kind();
        match kind {
            BackendKind::Local => {
                tracing::info!("Prompting {} running locally using {}.", model_id, kind)
            }
            BackendKind::Hosted => tracing::info!("Prompting {} on {}", model_id, kind),
        }

        let raw = match self.backend.generate(message, model_id, temperature) {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(Outcome::NoAnswer),
            Err(err) => {
                return match kind {
                    BackendKind::Local => {
                        let message = err.message();
                        tracing::error!("{}", message);
                        Ok(Outcome::Failed { message })
                    }
                    BackendKind::Hosted => Err(AppError::BackendError {
                        backend: kind.to_string(),
                        source: err,
                    }),
                };
            }
        };

        if !extract_code {
            return Ok(Outcome::Answer(raw.replace(END_OF_TEXT, "\n")));
        }

        let Some(first) = extract_code_blocks(&raw).into_iter().next() else {
            tracing::debug!("no fenced code block in {} output", kind);
            return Ok(Outcome::NoAnswer);
        };

        let code = match kind {
            BackendKind::Local => first.code.replace("```", "\n"),
            BackendKind::Hosted => trim_trailer(&first.code).to_string(),
        };
        Ok(Outcome::Answer(code))
    }
}

/// Drops the hosted stop-sequence trailer, counting characters rather than bytes.
fn trim_trailer(code: &str) -> &str {
    let cut = code
        .char_indices()
        .rev()
        .nth(HOSTED_TRAILER_CHARS - 1)
        .map_or(0, |(idx, _)| idx);
    &code[..cut]
}
