//! Synchronous command server.
//!
//! Operators and the curator talk to a head over a small TCP surface:
//! one framed JSON command in, one framed JSON acknowledgement out.
//! Commands with unparseable or out-of-range numerics are rejected with
//! an explicit error reply, never silently defaulted.

use crate::error::Result;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use theia_core::bus::wire;
use theia_core::command::{COMMAND_CHANNEL, HeadCommand, HeadReply, HeadStatus, REPLY_CHANNEL};
use theia_core::stepper::StepperState;

/// Apply one command to the controller state and build its acknowledgement.
///
/// Target and speed changes take effect on the next seek tick; nothing
/// here blocks on the seek loop.
pub fn apply_command(state: &StepperState, head_name: &str, command: HeadCommand) -> HeadReply {
    match command {
        HeadCommand::Position { target, speed } => {
            if let Some(speed) = speed {
                if let Err(reply) = set_speed_checked(state, speed) {
                    return reply;
                }
            }
            state.set_target(target);
            HeadReply::ok()
        }
        HeadCommand::Rotation { degrees, speed } => {
            if !degrees.is_finite() {
                return HeadReply::error(format!("rotation is not finite: {}", degrees));
            }
            if let Some(speed) = speed {
                if let Err(reply) = set_speed_checked(state, speed) {
                    return reply;
                }
            }
            state.set_target(state.steps_for_degrees(degrees));
            HeadReply::ok()
        }
        HeadCommand::Speed { speed } => match set_speed_checked(state, speed) {
            Ok(()) => HeadReply::ok(),
            Err(reply) => reply,
        },
        HeadCommand::Zero => {
            state.zero();
            log::info!("Zeroed position and target");
            HeadReply::ok()
        }
        HeadCommand::Status => {
            let pos = state.pos();
            HeadReply::Ok {
                status: Some(HeadStatus {
                    head: head_name.to_string(),
                    position: pos,
                    target: state.target(),
                    rotation: state.rotation_degrees(pos),
                    speed: state.speed(),
                }),
            }
        }
    }
}

fn set_speed_checked(state: &StepperState, speed: f32) -> std::result::Result<(), HeadReply> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(HeadReply::error(format!(
            "speed must be positive: {}",
            speed
        )));
    }
    state.set_speed(speed);
    Ok(())
}

/// TCP command server for one head.
pub struct CommandServer {
    listener: TcpListener,
    state: Arc<StepperState>,
    head_name: String,
    running: Arc<AtomicBool>,
}

impl CommandServer {
    /// Bind the command socket. Port 0 picks an ephemeral port (tests).
    pub fn bind(
        bind_address: &str,
        state: Arc<StepperState>,
        head_name: String,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        Ok(Self {
            listener,
            state,
            head_name,
            running,
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; one handler thread per client connection.
    pub fn run(&self) -> Result<()> {
        self.listener.set_nonblocking(true)?;

        while self.running.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    log::debug!("Command client connected: {}", addr);
                    let state = Arc::clone(&self.state);
                    let running = Arc::clone(&self.running);
                    let head_name = self.head_name.clone();

                    let spawned = std::thread::Builder::new()
                        .name("head-command".to_string())
                        .spawn(move || {
                            if let Err(e) = handle_client(stream, &state, &head_name, &running) {
                                log::debug!("Command client {} closed: {}", addr, e);
                            }
                        });
                    if let Err(e) = spawned {
                        log::error!("Failed to spawn command handler: {}", e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    log::error!("Accept error: {}", e);
                }
            }
        }

        log::info!("Command server stopped");
        Ok(())
    }
}

fn handle_client(
    mut stream: TcpStream,
    state: &StepperState,
    head_name: &str,
    running: &AtomicBool,
) -> Result<()> {
    // Read timeout so the handler notices shutdown
    stream.set_read_timeout(Some(Duration::from_millis(500)))?;

    while running.load(Ordering::Relaxed) {
        let frame = match wire::read_frame(&mut stream)? {
            Some(frame) => frame,
            None => continue, // timeout, poll shutdown again
        };

        if frame.channel != COMMAND_CHANNEL {
            let reply = HeadReply::error(format!("unexpected channel: {:?}", frame.channel));
            write_reply(&mut stream, &reply)?;
            continue;
        }

        let reply = match serde_json::from_slice::<HeadCommand>(&frame.payload) {
            Ok(command) => {
                log::info!("Received command: {:?}", command);
                apply_command(state, head_name, command)
            }
            Err(e) => {
                log::warn!("Rejected malformed command: {}", e);
                HeadReply::error(format!("malformed command: {}", e))
            }
        };

        write_reply(&mut stream, &reply)?;
    }

    Ok(())
}

fn write_reply(stream: &mut TcpStream, reply: &HeadReply) -> Result<()> {
    let payload = serde_json::to_vec(reply).map_err(theia_core::Error::Json)?;
    wire::write_frame(stream, REPLY_CHANNEL, &payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use theia_core::command::HeadCommandClient;
    use theia_core::stepper::DEFAULT_SPEED;

    fn state() -> StepperState {
        StepperState::new(200, DEFAULT_SPEED)
    }

    #[test]
    fn position_command_sets_target() {
        let state = state();
        let reply = apply_command(&state, "head-01", HeadCommand::Position {
            target: 120,
            speed: None,
        });
        assert_eq!(reply, HeadReply::ok());
        assert_eq!(state.target(), 120);
        assert_eq!(state.speed(), DEFAULT_SPEED);
    }

    #[test]
    fn rotation_command_converts_degrees() {
        let state = state();
        let reply = apply_command(&state, "head-01", HeadCommand::Rotation {
            degrees: 342.0,
            speed: Some(25.0),
        });
        assert_eq!(reply, HeadReply::ok());
        assert_eq!(state.target(), 190);
        assert_eq!(state.speed(), 25.0);
    }

    #[test]
    fn non_positive_speed_is_rejected_without_side_effects() {
        let state = state();
        let reply = apply_command(&state, "head-01", HeadCommand::Speed { speed: -1.0 });
        assert!(matches!(reply, HeadReply::Error { .. }));
        assert_eq!(state.speed(), DEFAULT_SPEED);

        // A rejected speed rider must not move the target either.
        let reply = apply_command(&state, "head-01", HeadCommand::Position {
            target: 50,
            speed: Some(0.0),
        });
        assert!(matches!(reply, HeadReply::Error { .. }));
        assert_eq!(state.target(), 0);
    }

    #[test]
    fn status_reports_controller_state() {
        let state = state();
        state.set_target(100);
        state.step_toward_target();

        let reply = apply_command(&state, "head-01", HeadCommand::Status);
        match reply {
            HeadReply::Ok {
                status: Some(status),
            } => {
                assert_eq!(status.head, "head-01");
                assert_eq!(status.position, 1);
                assert_eq!(status.target, 100);
                assert!((status.rotation - 1.8).abs() < 1e-4);
            }
            other => panic!("expected status, got {:?}", other),
        }
    }

    #[test]
    fn zero_resets_both_position_and_target() {
        let state = state();
        state.set_target(10);
        while state.step_toward_target().is_some() {}

        let reply = apply_command(&state, "head-01", HeadCommand::Zero);
        assert_eq!(reply, HeadReply::ok());
        assert_eq!(state.pos(), 0);
        assert_eq!(state.target(), 0);
    }

    #[test]
    fn command_round_trip_over_tcp() {
        let state = Arc::new(state());
        let running = Arc::new(AtomicBool::new(true));
        let server = CommandServer::bind(
            "127.0.0.1:0",
            Arc::clone(&state),
            "head-01".to_string(),
            Arc::clone(&running),
        )
        .unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let server_thread = std::thread::spawn(move || {
            let _ = server.run();
        });

        let client = HeadCommandClient::new(&addr);
        let reply = client
            .send(&HeadCommand::Position {
                target: 42,
                speed: None,
            })
            .unwrap();
        assert_eq!(reply, HeadReply::ok());
        assert_eq!(state.target(), 42);

        // Malformed numeric input comes back as an explicit error.
        let reply = client.send(&HeadCommand::Speed { speed: -3.0 }).unwrap();
        assert!(matches!(reply, HeadReply::Error { .. }));

        running.store(false, Ordering::Relaxed);
        server_thread.join().unwrap();
    }
}
