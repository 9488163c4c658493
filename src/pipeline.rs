// src/pipeline.rs

use crate::backend::Generate;
use crate::dispatch::Dispatcher;
use crate::display::Present;
use crate::error::AppError;
use crate::tasks::{Job, Task};
use crate::types::Outcome;
use console::{Key, Style, Term};
use std::io::Write;

/// What to do when the local backend reports an error for a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Stop the run.
    Halt,
    /// Log it and move on to the next method.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Quit,
}

/// Decides whether to go on after each method, given how it went.
pub trait Stepper {
    fn after(&mut self, job: &Job, outcome: &Outcome) -> Step;
}

/// Runs straight through.
pub struct NoPause;

impl Stepper for NoPause {
    fn after(&mut self, _job: &Job, _outcome: &Outcome) -> Step {
        Step::Continue
    }
}

/// Waits for a key on the terminal: `q` or Esc quits, anything else continues.
pub struct InteractiveStepper {
    term: Term,
    hint_style: Style,
}

impl InteractiveStepper {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            hint_style: Style::new().dim(),
        }
    }
}

impl Default for InteractiveStepper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stepper for InteractiveStepper {
    fn after(&mut self, job: &Job, outcome: &Outcome) -> Step {
        if !self.term.is_term() {
            return Step::Continue;
        }

        let status = match outcome {
            Outcome::Answer(_) => "answered",
            Outcome::NoAnswer => "no answer",
            Outcome::Failed { .. } => "failed",
        };
        let mut stderr = self.term.clone();
        if let Err(e) = write!(
            stderr,
            "{}",
            self.hint_style.apply_to(format!(
                "{} ({}). Press Enter for the next method, q to quit ",
                job.label, status
            ))
        ) {
            tracing::debug!("Display error: {}", e);
        }

        let step = match self.term.read_key() {
            Ok(Key::Char('q' | 'Q')) | Ok(Key::Escape) => Step::Quit,
            Ok(_) => Step::Continue,
            Err(e) => {
                tracing::warn!("Could not read from terminal ({}); continuing", e);
                Step::Continue
            }
        };
        self.term.clear_line().ok();
        step
    }
}

/// Tallies for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub answered: usize,
    pub empty: usize,
    pub failed: usize,
    pub stopped_early: bool,
}

/// Everything that stays fixed across the methods of one run.
pub struct RunSettings<'a> {
    pub task: Task,
    pub model: &'a str,
    pub temperature: f32,
    pub on_failure: FailurePolicy,
}

/// Prompts the backend once per job, one job at a time.
///
/// Hosted backend errors end the run with `Err`; local failures follow `on_failure`.
pub fn run<G: Generate>(
    jobs: &[Job],
    dispatcher: &Dispatcher<G>,
    presenter: &dyn Present,
    stepper: &mut dyn Stepper,
    settings: &RunSettings<'_>,
) -> Result<RunSummary, AppError> {
    let task = settings.task;
    let mut summary = RunSummary::default();

    for job in jobs {
        tracing::info!(
            "Asking to {} for {} (lines {}-{})",
            task.description(),
            job.label,
            job.lines.0,
            job.lines.1
        );

        let outcome = dispatcher.dispatch(
            &job.instruction,
            settings.model,
            settings.temperature,
            task.extract_code(),
        )?;
        summary.processed += 1;

        match &outcome {
            Outcome::Answer(answer) => {
                summary.answered += 1;
                presenter
                    .present(&job.instruction, answer, task.title(), task.syntax())
                    .unwrap_or_else(|e| tracing::warn!("Display error: {}", e));
            }
            Outcome::NoAnswer => {
                summary.empty += 1;
                tracing::warn!("No answer for {}", job.label);
            }
            Outcome::Failed { .. } => {
                summary.failed += 1;
                if settings.on_failure == FailurePolicy::Halt {
                    tracing::info!("Stopping after failure on {}", job.label);
                    summary.stopped_early = true;
                    break;
                }
            }
        }

        if stepper.after(job, &outcome) == Step::Quit {
            summary.stopped_early = true;
            break;
        }
    }

    tracing::info!(
        "Processed {} method(s): {} answered, {} empty, {} failed",
        summary.processed,
        summary.answered,
        summary.empty,
        summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::types::BackendKind;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;

    /// Replies from a script, one per call.
    struct ScriptedBackend {
        kind: BackendKind,
        replies: RefCell<VecDeque<Result<Option<String>, BackendError>>>,
    }

    impl ScriptedBackend {
        fn local(replies: Vec<Result<Option<String>, BackendError>>) -> Self {
            Self {
                kind: BackendKind::Local,
                replies: RefCell::new(replies.into()),
            }
        }
    }

    impl Generate for ScriptedBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn generate(&self, _: &str, _: &str, _: f32) -> Result<Option<String>, BackendError> {
            self.replies
                .borrow_mut()
                .pop_front()
                .expect("more calls than scripted replies")
        }
    }

    #[derive(Default)]
    struct RecordingPresenter {
        shown: RefCell<Vec<(String, String, String)>>,
    }

    impl Present for RecordingPresenter {
        fn present(&self, _instruction: &str, answer: &str, title: &str, syntax: &str) -> io::Result<()> {
            self.shown
                .borrow_mut()
                .push((answer.to_string(), title.to_string(), syntax.to_string()));
            Ok(())
        }
    }

    /// Quits after `remaining` methods, remembering what it was shown.
    struct QuitAfter {
        remaining: usize,
        seen: Vec<(String, bool)>,
    }

    impl QuitAfter {
        fn new(remaining: usize) -> Self {
            Self {
                remaining,
                seen: Vec::new(),
            }
        }
    }

    impl Stepper for QuitAfter {
        fn after(&mut self, job: &Job, outcome: &Outcome) -> Step {
            self.seen.push((job.label.clone(), matches!(outcome, Outcome::Failed { .. })));
            self.remaining -= 1;
            if self.remaining == 0 { Step::Quit } else { Step::Continue }
        }
    }

    fn jobs(n: usize) -> Vec<Job> {
        (0..n)
            .map(|i| Job {
                label: format!("m{i}()"),
                lines: (i + 1, i + 1),
                instruction: format!("Question {i}"),
            })
            .collect()
    }

    fn code(text: &str) -> Result<Option<String>, BackendError> {
        Ok(Some(format!("```java\n{text}\n```")))
    }

    fn failure() -> Result<Option<String>, BackendError> {
        Err(BackendError::Response {
            status: 500,
            message: "out of memory".to_string(),
        })
    }

    fn settings(on_failure: FailurePolicy) -> RunSettings<'static> {
        RunSettings {
            task: Task::JavaTest,
            model: "granite-code:20b-instruct",
            temperature: 0.25,
            on_failure,
        }
    }

    #[test]
    fn presents_each_answer_in_order() {
        let dispatcher = Dispatcher::new(ScriptedBackend::local(vec![code("a"), code("b")]));
        let presenter = RecordingPresenter::default();

        let summary = run(
            &jobs(2),
            &dispatcher,
            &presenter,
            &mut NoPause,
            &settings(FailurePolicy::Halt),
        )
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.answered, 2);
        assert!(!summary.stopped_early);
        let shown = presenter.shown.borrow();
        assert_eq!(shown[0], ("a\n".to_string(), "Generated Test".to_string(), "java".to_string()));
        assert_eq!(shown[1].0, "b\n");
    }

    #[test]
    fn halt_policy_stops_at_first_failure() {
        let dispatcher = Dispatcher::new(ScriptedBackend::local(vec![code("a"), failure()]));
        let presenter = RecordingPresenter::default();

        let summary = run(
            &jobs(3),
            &dispatcher,
            &presenter,
            &mut NoPause,
            &settings(FailurePolicy::Halt),
        )
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert!(summary.stopped_early);
        assert_eq!(presenter.shown.borrow().len(), 1);
    }

    #[test]
    fn skip_policy_continues_past_failures() {
        let dispatcher = Dispatcher::new(ScriptedBackend::local(vec![
            failure(),
            Ok(Some("no code here".to_string())),
            code("c"),
        ]));
        let presenter = RecordingPresenter::default();

        let summary = run(
            &jobs(3),
            &dispatcher,
            &presenter,
            &mut NoPause,
            &settings(FailurePolicy::Skip),
        )
        .unwrap();

        assert_eq!(
            summary,
            RunSummary {
                processed: 3,
                answered: 1,
                empty: 1,
                failed: 1,
                stopped_early: false,
            }
        );
    }

    #[test]
    fn stepper_can_quit_the_run() {
        let dispatcher = Dispatcher::new(ScriptedBackend::local(vec![code("a"), failure()]));
        let presenter = RecordingPresenter::default();
        let mut stepper = QuitAfter::new(2);

        let summary = run(
            &jobs(5),
            &dispatcher,
            &presenter,
            &mut stepper,
            &settings(FailurePolicy::Skip),
        )
        .unwrap();

        assert_eq!(summary.processed, 2);
        assert!(summary.stopped_early);
        assert_eq!(
            stepper.seen,
            vec![("m0()".to_string(), false), ("m1()".to_string(), true)]
        );
    }

    #[test]
    fn hosted_errors_end_the_run() {
        let backend = ScriptedBackend {
            kind: BackendKind::Hosted,
            replies: RefCell::new(vec![failure()].into()),
        };
        let dispatcher = Dispatcher::new(backend);
        let presenter = RecordingPresenter::default();

        let result = run(
            &jobs(2),
            &dispatcher,
            &presenter,
            &mut NoPause,
            &settings(FailurePolicy::Skip),
        );
        assert!(matches!(result, Err(AppError::BackendError { .. })));
    }
}
