use std::io::{self, BufRead, Write};

use crate::command::{self, Command, ParsedCommand};
use crate::error::Result;
use crate::input::LineReader;
use crate::jobs::JobManager;
use crate::prompt::Prompt;
use crate::signal_handler::SignalHandler;
use crate::spawn::{self, Status};
use crate::variables::expand_variables;

pub struct Shell<R> {
    prompt: Prompt,
    reader: LineReader<R>,
    job_manager: JobManager,
    signals: SignalHandler,
    last_status: Status,
    running: bool,
}

impl<R: BufRead> Shell<R> {
    pub fn new(source: R, prompt: Prompt) -> Result<Self> {
        Ok(Self {
            prompt,
            reader: LineReader::new(source),
            job_manager: JobManager::new(),
            signals: SignalHandler::install()?,
            last_status: Status::default(),
            running: true,
        })
    }

    /// Loops until `exit`, end of input or a fatal error. Tracked jobs are
    /// terminated on every way out.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            if let Err(e) = self.step() {
                self.shutdown();
                return Err(e);
            }
        }
        Ok(())
    }

    /// One trip around the loop: signals, reaping, one line.
    fn step(&mut self) -> Result<()> {
        self.signals.setup_shell()?;
        self.report_finished_jobs();

        self.prompt.display();
        let Some(line) = self.reader.read_line()? else {
            tracing::debug!("end of input");
            self.shutdown();
            return Ok(());
        };

        let line = expand_variables(&line);
        let mode = self.signals.mode();
        let parsed = ParsedCommand::parse(&line, mode);
        tracing::trace!(
            line = ?parsed.raw_line(),
            args = ?parsed.args(),
            ?mode,
            tstp = self.signals.deliveries(),
            "parsed"
        );

        let result = self.dispatch(Command::parse(parsed));
        let _ = io::stdout().flush();
        result
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        if command.is_builtin() {
            tracing::debug!(?command, "builtin");
        }

        match command {
            Command::Noop => {}
            Command::Exit => self.shutdown(),
            Command::Cd(dir) => command::change_directory(dir.as_deref()),
            Command::Status => println!("{}", self.last_status),
            Command::External { args, background } => {
                if background {
                    let pid = spawn::spawn_background(args)?;
                    self.job_manager.add(pid);
                } else {
                    self.last_status = spawn::spawn_foreground(args)?;
                }
            }
        }
        Ok(())
    }

    fn report_finished_jobs(&mut self) {
        for (pid, status) in self.job_manager.poll_all() {
            println!("background pid {pid} is done: {status}");
        }
        let _ = io::stdout().flush();
    }

    fn shutdown(&mut self) {
        if !self.job_manager.is_empty() {
            tracing::debug!(
                jobs = self.job_manager.len(),
                pids = ?self.job_manager.pids(),
                "terminating background jobs"
            );
        }
        self.job_manager.terminate_all();
        self.running = false;
    }
}
