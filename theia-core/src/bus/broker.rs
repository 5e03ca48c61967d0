//! Minimal pub/sub broker.
//!
//! One reader thread per connected client feeds a single fan-out thread,
//! so frames from any one publisher reach subscribers in publish order.
//! Subscribers register by sending a control frame; publishers just send.
//! A dead or misbehaving subscriber is dropped, never waited on.

use crate::bus::wire::{self, CONTROL_SUBSCRIBE, Frame};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum BrokerEvent {
    Frame { client: usize, frame: Frame },
    Closed { client: usize },
}

/// Pub/sub broker for the installation event channel.
pub struct Broker {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Broker {
    /// Bind the broker socket. Port 0 picks an ephemeral port (tests).
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run until the shutdown flag is set. Blocks the calling thread.
    pub fn run(self, shutdown: Arc<AtomicBool>) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        log::info!("Bus broker listening on {}", self.local_addr);

        let (event_tx, event_rx) = crossbeam_channel::unbounded::<BrokerEvent>();

        let mut writers: HashMap<usize, TcpStream> = HashMap::new();
        let mut subscriptions: HashMap<usize, HashSet<String>> = HashMap::new();
        let mut next_id: usize = 0;
        let mut forwarded: u64 = 0;

        // Reusable buffer for frame encoding (avoids allocations)
        let mut frame_buffer = Vec::with_capacity(4096);

        while !shutdown.load(Ordering::Relaxed) {
            // Accept new clients (non-blocking)
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    let id = next_id;
                    next_id += 1;

                    let _ = stream.set_nodelay(true);
                    match stream.try_clone() {
                        Ok(writer) => {
                            writers.insert(id, writer);
                            log::info!("Bus client {} connected: {}", id, addr);
                            Self::spawn_reader(id, stream, event_tx.clone(), Arc::clone(&shutdown));
                        }
                        Err(e) => {
                            log::error!("Failed to clone client stream {}: {}", addr, e);
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    log::error!("Accept error: {}", e);
                }
            }

            // Drain pending events with a short timeout so the accept loop
            // and shutdown flag stay responsive
            match event_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(BrokerEvent::Frame { client, frame }) => {
                    if frame.channel == CONTROL_SUBSCRIBE {
                        match String::from_utf8(frame.payload) {
                            Ok(channel) => {
                                log::debug!("Client {} subscribed to {:?}", client, channel);
                                subscriptions.entry(client).or_default().insert(channel);
                            }
                            Err(_) => {
                                log::warn!("Client {} sent non-UTF-8 subscription", client);
                            }
                        }
                    } else {
                        forwarded += 1;
                        Self::fan_out(
                            client,
                            &frame,
                            &mut writers,
                            &mut subscriptions,
                            &mut frame_buffer,
                        );
                    }
                }
                Ok(BrokerEvent::Closed { client }) => {
                    writers.remove(&client);
                    subscriptions.remove(&client);
                    log::info!("Bus client {} disconnected", client);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(Error::Protocol("broker event channel closed".to_string()));
                }
            }
        }

        log::info!("Bus broker exiting ({} frames forwarded)", forwarded);
        Ok(())
    }

    /// Run on a named background thread.
    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("bus-broker".to_string())
            .spawn(move || {
                if let Err(e) = self.run(shutdown) {
                    log::error!("Bus broker error: {}", e);
                }
            })?;
        Ok(handle)
    }

    fn spawn_reader(
        id: usize,
        stream: TcpStream,
        event_tx: crossbeam_channel::Sender<BrokerEvent>,
        shutdown: Arc<AtomicBool>,
    ) {
        let spawned = thread::Builder::new()
            .name(format!("bus-reader-{}", id))
            .spawn(move || {
                let mut stream = stream;
                // Read timeout so the thread notices shutdown
                let _ = stream.set_read_timeout(Some(Duration::from_millis(500)));

                while !shutdown.load(Ordering::Relaxed) {
                    match wire::read_frame(&mut stream) {
                        Ok(Some(frame)) => {
                            if event_tx.send(BrokerEvent::Frame { client: id, frame }).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {} // timeout, poll shutdown again
                        Err(_) => break,
                    }
                }
                let _ = event_tx.send(BrokerEvent::Closed { client: id });
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn reader for client {}: {}", id, e);
        }
    }

    /// Forward a frame to every subscriber of its channel except the
    /// sender, dropping clients whose connection has failed.
    fn fan_out(
        sender: usize,
        frame: &Frame,
        writers: &mut HashMap<usize, TcpStream>,
        subscriptions: &mut HashMap<usize, HashSet<String>>,
        buffer: &mut Vec<u8>,
    ) {
        if let Err(e) = wire::encode_frame(&frame.channel, &frame.payload, buffer) {
            log::warn!("Dropping unencodable frame from client {}: {}", sender, e);
            return;
        }

        let mut dead = Vec::new();
        for (&id, stream) in writers.iter_mut() {
            if id == sender {
                continue;
            }
            let subscribed = subscriptions
                .get(&id)
                .is_some_and(|channels| channels.contains(&frame.channel));
            if !subscribed {
                continue;
            }

            if let Err(e) = std::io::Write::write_all(stream, buffer) {
                log::debug!("Dropping client {}: {}", id, e);
                dead.push(id);
            }
        }

        for id in dead {
            writers.remove(&id);
            subscriptions.remove(&id);
        }
    }
}
