#![forbid(unsafe_code)]

use la_engine::{Engine, Event, Request};
use std::io::{BufRead, Write};
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

/// Reads one JSON request per line until EOF. Blank lines are ignored;
/// anything that does not decode, including invalid UTF-8, is answered with
/// an `error` event and the loop moves on to the next line.
pub(crate) fn serve(engine: &Engine, mut reader: impl BufRead) -> std::io::Result<()> {
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_slice::<Request>(trimmed) {
            Ok(request) => engine.handle(request),
            Err(err) => {
                tracing::warn!(error = %err, bytes = trimmed.len(), "malformed request");
                engine.emit(Event::unknown_error(format!("invalid request: {err}")));
            }
        }
    }
}

/// Serializes events to stdout on a dedicated thread until every sender is
/// gone.
pub(crate) fn spawn_event_writer(events: Receiver<Event>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("la-stdout".to_string())
        .spawn(move || {
            let mut stdout = std::io::stdout().lock();
            for event in events {
                if let Err(err) = write_newline_json(&mut stdout, &event) {
                    tracing::error!(error = %err, "failed to write event; dropping the rest");
                    return;
                }
            }
        })
}

fn write_newline_json(
    stdout: &mut std::io::StdoutLock<'_>,
    event: &Event,
) -> Result<(), Box<dyn std::error::Error>> {
    writeln!(stdout, "{}", serde_json::to_string(event)?)?;
    stdout.flush()?;
    Ok(())
}
