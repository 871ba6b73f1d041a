use std::io;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::debug;

use crate::command::{self, Command};
use crate::engine::{Arbiter, ArbiterError, BookingRequest, TripRequest};
use crate::limits::MAX_LINE_LEN;
use crate::observability::{COMMAND_DURATION_SECONDS, COMMANDS_TOTAL, command_label};

/// Serve one client: one JSON command per line in, one JSON response per line out.
pub async fn process_connection<S>(socket: S, arbiter: &Arbiter) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    while let Some(line) = framed.next().await {
        let response = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(arbiter, &line).await,
            // Framed ends the stream after a decode error, so this is the last reply.
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                error_response("limit_exceeded", "request line too long")
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };
        framed.send(response).await.map_err(codec_io)?;
    }
    Ok(())
}

fn codec_io(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Parse, execute and render one request line.
pub async fn handle_line(arbiter: &Arbiter, line: &str) -> String {
    let cmd = match command::parse(line) {
        Ok(cmd) => cmd,
        Err(e) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => "unknown", "status" => "error").increment(1);
            return error_response("invalid_input", &e.to_string());
        }
    };

    let label = command_label(&cmd);
    let start = Instant::now();
    let result = execute(arbiter, cmd).await;
    metrics::histogram!(COMMAND_DURATION_SECONDS, "command" => label).record(start.elapsed().as_secs_f64());

    match result {
        Ok(value) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "ok").increment(1);
            json!({ "ok": true, "result": value }).to_string()
        }
        Err(e) => {
            metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => "error").increment(1);
            debug!(command = label, error = %e, "command failed");
            error_response(e.code(), &e.to_string())
        }
    }
}

fn error_response(code: &str, message: &str) -> String {
    json!({ "ok": false, "error": code, "message": message }).to_string()
}

fn to_value(v: impl Serialize) -> Result<Value, ArbiterError> {
    serde_json::to_value(v).map_err(|e| ArbiterError::InvalidInput(e.to_string()))
}

pub async fn execute(arbiter: &Arbiter, cmd: Command) -> Result<Value, ArbiterError> {
    match cmd {
        Command::Availability { date, duration_minutes } => {
            to_value(arbiter.available_slots(date, duration_minutes).await?)
        }
        Command::Quote {
            origin,
            destination,
            stops,
            date,
            start_time,
            service,
            has_pets,
        } => {
            let trip = TripRequest {
                origin,
                destination,
                stops,
                date,
                start_time,
                service,
                has_pets,
            };
            to_value(arbiter.quote_trip(&trip).await?)
        }
        Command::QuoteTier { hours, hourly_rate } => to_value(arbiter.quote_tier(hours, hourly_rate)?),
        Command::Book {
            date,
            start_time,
            hours,
            duration_minutes,
            pricing,
            label,
        } => {
            let req = BookingRequest {
                date,
                start_time,
                hours,
                duration_minutes,
                pricing,
                label,
            };
            to_value(arbiter.book(req).await?)
        }
        Command::Block {
            date,
            start_time,
            end_time,
            label,
        } => to_value(arbiter.block(date, start_time, end_time, label).await?),
        Command::Reschedule { id, date, start_time } => {
            to_value(arbiter.reschedule(id, date, start_time).await?)
        }
        Command::Transition { id, status } => to_value(arbiter.transition(id, status).await?),
        Command::Cancel { id } => to_value(arbiter.cancel(id).await?),
        Command::List { date } => {
            let records = arbiter.list_day(date).await?;
            Ok(json!({ "records": to_value(records)? }))
        }
        Command::ClearRouteCache => {
            let cleared = arbiter.route_cache().len();
            arbiter.clear_route_cache();
            Ok(json!({ "cleared": cleared }))
        }
    }
}
