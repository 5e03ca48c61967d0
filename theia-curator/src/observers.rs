//! Live observer fan-out.
//!
//! Dashboards connect over TCP and receive selected bus messages verbatim.
//! The relay pushes payloads onto a lock-free bounded queue; a dedicated
//! broadcaster thread owns the listener and the client set. A slow, full,
//! or dead observer costs a dropped message or a dropped client and never a
//! stalled relay.

use crate::error::Result;
use crossbeam_queue::ArrayQueue;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use theia_core::bus::wire;

/// Messages buffered for observers before the oldest start dropping.
const QUEUE_CAPACITY: usize = 1000;

/// Frame channel observer messages are tagged with.
const OBSERVER_CHANNEL: &str = "events";

/// Relay-side handle: non-blocking enqueue of payloads for broadcast.
#[derive(Clone)]
pub struct ObserverSender {
    queue: Arc<ArrayQueue<Vec<u8>>>,
}

impl ObserverSender {
    /// Sender over an explicit queue (tests pair this with their own
    /// queue instead of a live hub).
    pub fn new(queue: Arc<ArrayQueue<Vec<u8>>>) -> Self {
        Self { queue }
    }

    /// Enqueue one payload; returns immediately. Best-effort: when the
    /// queue is full the message is dropped.
    pub fn send(&self, payload: Vec<u8>) {
        if self.queue.push(payload).is_err() {
            tracing::trace!("Observer queue full, dropped message");
        }
    }
}

/// Broadcaster owning the observer listener and client set.
pub struct ObserverHub {
    queue: Arc<ArrayQueue<Vec<u8>>>,
    local_addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl ObserverHub {
    /// Bind the observer socket and start the broadcaster thread.
    pub fn start(bind_address: &str, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let queue = Arc::new(ArrayQueue::new(QUEUE_CAPACITY));
        let thread_queue = Arc::clone(&queue);

        let thread = thread::Builder::new()
            .name("observer-hub".to_string())
            .spawn(move || {
                broadcast_loop(listener, thread_queue, shutdown);
            })?;

        Ok(Self {
            queue,
            local_addr,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn sender(&self) -> ObserverSender {
        ObserverSender::new(Arc::clone(&self.queue))
    }

    /// Wait for the broadcaster to exit (after shutdown is signaled).
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn broadcast_loop(
    listener: TcpListener,
    queue: Arc<ArrayQueue<Vec<u8>>>,
    shutdown: Arc<AtomicBool>,
) {
    let mut clients: Vec<TcpStream> = Vec::new();
    let mut broadcast_count: u64 = 0;

    // Reusable buffer for frame encoding
    let mut frame_buffer = Vec::with_capacity(4096);

    while !shutdown.load(Ordering::Relaxed) {
        // Accept new observers (non-blocking)
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!("Observer connected: {}", addr);
                clients.push(stream);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                tracing::error!("Observer accept error: {}", e);
            }
        }

        // Batch process queued messages (bounded per iteration so accepts
        // are not starved)
        let mut batch = 0;
        while let Some(payload) = queue.pop() {
            if wire::encode_frame(OBSERVER_CHANNEL, &payload, &mut frame_buffer).is_err() {
                continue;
            }

            clients.retain_mut(|client| match client.write_all(&frame_buffer) {
                Ok(_) => true,
                Err(e) => {
                    if let Ok(addr) = client.peer_addr() {
                        tracing::debug!("Observer {} disconnected: {}", addr, e);
                    }
                    false
                }
            });
            broadcast_count += 1;

            batch += 1;
            if batch >= 50 {
                break;
            }
        }

        if queue.is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
    }

    tracing::info!("Observer hub exiting ({} messages broadcast)", broadcast_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use theia_core::bus::wire::read_frame;

    #[test]
    fn observers_receive_enqueued_payloads_verbatim() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut hub = ObserverHub::start("127.0.0.1:0", Arc::clone(&shutdown)).unwrap();
        let sender = hub.sender();

        let mut observer = TcpStream::connect(hub.local_addr()).unwrap();
        // Broadcaster must pick the client up before the send.
        thread::sleep(Duration::from_millis(100));

        sender.send(br#"{"type":"active","data":{}}"#.to_vec());

        let frame = read_frame(&mut observer).unwrap().unwrap();
        assert_eq!(frame.channel, "events");
        assert_eq!(frame.payload, br#"{"type":"active","data":{}}"#);

        shutdown.store(true, Ordering::Relaxed);
        hub.join();
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let queue = Arc::new(ArrayQueue::new(2));
        let sender = ObserverSender::new(Arc::clone(&queue));

        sender.send(vec![1]);
        sender.send(vec![2]);
        sender.send(vec![3]); // dropped, returns immediately

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap(), vec![1]);
    }
}
