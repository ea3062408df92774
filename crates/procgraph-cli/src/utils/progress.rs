use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use procgraph::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

struct RunDisplay {
    pb: ProgressBar,
    /// Name of the procedure phase in progress, if any.
    phase: Option<&'static str>,
    completed_phases: Vec<&'static str>,
}

impl RunDisplay {
    fn handle(&mut self, progress: Progress) {
        match progress {
            Progress::PhaseStart { name } => {
                self.phase = Some(name);
                self.pb.reset();
                self.pb.set_length(0);
                self.pb.set_style(CliProgressHandler::spinner_style());
                self.pb
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                self.pb.set_message(format!("{}...", name));
            }
            Progress::PhaseFinish => {
                self.pb.disable_steady_tick();
                match self.phase.take() {
                    Some(name) => {
                        self.completed_phases.push(name);
                        self.pb.finish_with_message(format!("✓ {}", name));
                    }
                    None => self.pb.finish_with_message("✓ Done"),
                }
            }
            Progress::TaskStart { total_steps } => {
                // One step per top-level node of the procedure.
                self.pb.disable_steady_tick();
                self.pb.reset();
                self.pb.set_length(total_steps);
                self.pb.set_position(0);
                self.pb.set_style(CliProgressHandler::bar_style());
                self.pb.set_message(self.phase.unwrap_or("Nodes").to_string());
            }
            Progress::TaskIncrement => self.pb.inc(1),
            Progress::TaskFinish => {
                let length = self.pb.length().unwrap_or(0);
                if self.pb.position() < length {
                    self.pb.set_position(length);
                }
                self.pb.finish();
            }
            Progress::Message(msg) => {
                if self.pb.is_finished() {
                    self.pb.set_message(msg);
                } else {
                    self.pb.println(format!("  › {}", msg));
                }
            }
        }
    }
}

/// Renders procedure run events: a spinner per phase and a node bar while executing.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<RunDisplay>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Loading procedure...");
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(RunDisplay {
                pb,
                phase: None,
                completed_phases: Vec::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = Arc::clone(&self.display);

        Box::new(move |progress: Progress| match display.lock() {
            Ok(mut display) => display.handle(progress),
            Err(_) => warn!("Progress display mutex was poisoned. Cannot update progress."),
        })
    }

    /// Phases that have run to completion, in order.
    pub fn completed_phases(&self) -> Vec<&'static str> {
        self.display
            .lock()
            .map(|d| d.completed_phases.clone())
            .unwrap_or_default()
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<12} [{bar:40.cyan/blue}] {pos}/{len} nodes ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
