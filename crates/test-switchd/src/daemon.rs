//! Line-oriented command loop used by the `test-switchd` binary.
//!
//! Each input line is one JSON [`Command`]; each output line is the JSON
//! [`CommandResponse`] for it, in order. Commands run on tokio's blocking
//! pool because the engine sleeps and waits on file locks.

use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::driver::{Command, CommandResponse, DriverCommands};

/// Serves commands from `reader` until EOF, returning the driver afterwards.
pub async fn serve<R, W>(
    reader: R,
    mut writer: W,
    mut driver: DriverCommands,
) -> io::Result<DriverCommands>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        let request = line.trim();
        if request.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Command>(request) {
            Ok(command) => {
                debug!(command = command.name(), "Dispatching");
                let (returned, response) = tokio::task::spawn_blocking(move || {
                    let response = driver.handle(command);
                    (driver, response)
                })
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                driver = returned;
                response
            }
            Err(e) => CommandResponse::bad_request(format!("Invalid command: {}", e)),
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        handled += 1;
    }

    info!("Input closed after {} command(s)", handled);
    Ok(driver)
}

/// Like [`serve`], but stops early when `shutdown` resolves.
///
/// Returns `Ok(None)` on a shutdown request. A failing `shutdown` future
/// (for example a signal handler that could not be installed) is an error.
pub async fn serve_until<R, W, S>(
    reader: R,
    writer: W,
    driver: DriverCommands,
    shutdown: S,
) -> io::Result<Option<DriverCommands>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = io::Result<()>>,
{
    tokio::select! {
        served = serve(reader, writer, driver) => served.map(Some),
        signal = shutdown => {
            signal.map_err(|e| io::Error::new(e.kind(), format!("shutdown signal: {}", e)))?;
            info!("Shutdown requested");
            Ok(None)
        }
    }
}
