use super::console::{self, Flow};
use super::{spawn_console_reader, Exit, NativeStudio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Console-only event loop. Runs until `/quit`, a restart request, or the input
/// closing with no deferred work left.
pub fn run(studio: &mut NativeStudio) -> Exit {
    let (sender, receiver) = mpsc::channel();
    spawn_console_reader(move |line| match line {
        Some(line) => sender.send(line).is_ok(),
        None => false,
    });

    studio.on_start(Instant::now());
    let mut input_open = true;
    loop {
        let now = Instant::now();
        studio.tick(now);
        if studio.host().restart_pending() {
            return Exit::Restart;
        }

        let wait = studio
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(FRAME_INTERVAL)
            .min(FRAME_INTERVAL);

        if !input_open {
            if studio.next_deadline().is_none() {
                log::info!("Input closed, leaving");
                return Exit::Quit;
            }
            std::thread::sleep(wait);
            continue;
        }

        match receiver.recv_timeout(wait) {
            Ok(line) => {
                if let Some(command) = console::parse(&line) {
                    if console::dispatch(studio, command, Instant::now()) == Flow::Quit {
                        return Exit::Quit;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => input_open = false,
        }
    }
}
