//! Publisher and subscriber ends of the event bus.
//!
//! Connection failure is surfaced to the owning process as an error and is
//! fatal to that process's event path; reconnection policy lives outside
//! the core.

use crate::bus::wire::{self, CONTROL_SUBSCRIBE};
use crate::error::Result;
use crate::messages::BusMessage;
use std::net::TcpStream;

/// Publishing end of the bus.
pub struct BusPublisher {
    stream: TcpStream,
}

impl BusPublisher {
    /// Connect to the broker.
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let _ = stream.set_nodelay(true);
        log::info!("Bus publisher connected to {}", addr);
        Ok(Self { stream })
    }

    /// Publish one message on a channel.
    pub fn publish(&mut self, channel: &str, message: &BusMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.publish_raw(channel, &payload)
    }

    /// Publish pre-encoded JSON bytes on a channel.
    pub fn publish_raw(&mut self, channel: &str, payload: &[u8]) -> Result<()> {
        wire::write_frame(&mut self.stream, channel, payload)
    }
}

/// One message pulled off the bus: channel plus raw JSON payload.
///
/// The payload stays raw so passthrough kinds can be re-broadcast
/// verbatim; `decode` parses it into the closed message union.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub channel: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn decode(&self) -> Result<BusMessage> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Subscribing end of the bus.
pub struct BusSubscriber {
    stream: TcpStream,
}

impl BusSubscriber {
    /// Connect to the broker and subscribe to the given channels.
    pub fn connect(addr: &str, channels: &[&str]) -> Result<Self> {
        let mut stream = TcpStream::connect(addr)?;
        let _ = stream.set_nodelay(true);

        for channel in channels {
            wire::write_frame(&mut stream, CONTROL_SUBSCRIBE, channel.as_bytes())?;
        }

        log::info!("Bus subscriber connected to {} ({:?})", addr, channels);
        Ok(Self { stream })
    }

    /// Set the receive timeout used by [`try_recv`](Self::try_recv).
    /// `None` blocks forever.
    pub fn set_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Block until the next message arrives, in bus arrival order.
    pub fn recv(&mut self) -> Result<Envelope> {
        loop {
            if let Some(envelope) = self.try_recv()? {
                return Ok(envelope);
            }
        }
    }

    /// Receive the next message, or `None` if the read timed out.
    ///
    /// Lets a receive loop poll its shutdown flag between messages.
    pub fn try_recv(&mut self) -> Result<Option<Envelope>> {
        Ok(wire::read_frame(&mut self.stream)?.map(|frame| Envelope {
            channel: frame.channel,
            payload: frame.payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Broker;
    use crate::messages::{EVENTS_CHANNEL, MotionDetected};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn motion(camera: &str, position: f32) -> BusMessage {
        BusMessage::MotionDetected(MotionDetected {
            camera_name: camera.to_string(),
            position,
            timestamp: None,
        })
    }

    #[test]
    fn published_messages_reach_subscribers_in_order() {
        let broker = Broker::bind("127.0.0.1:0").unwrap();
        let addr = broker.local_addr().to_string();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = broker.spawn(Arc::clone(&shutdown)).unwrap();

        let mut subscriber = BusSubscriber::connect(&addr, &[EVENTS_CHANNEL]).unwrap();
        // Give the broker a beat to register the subscription before
        // anything is published.
        std::thread::sleep(std::time::Duration::from_millis(100));

        let mut publisher = BusPublisher::connect(&addr).unwrap();
        for i in 0..10 {
            publisher.publish(EVENTS_CHANNEL, &motion("camera-01", i as f32)).unwrap();
        }

        for i in 0..10 {
            let envelope = subscriber.recv().unwrap();
            assert_eq!(envelope.channel, EVENTS_CHANNEL);
            match envelope.decode().unwrap() {
                BusMessage::MotionDetected(m) => {
                    assert_eq!(m.position, i as f32);
                    assert_eq!(m.camera_name, "camera-01");
                }
                other => panic!("wrong kind: {:?}", other),
            }
        }

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn frames_on_other_channels_are_not_delivered() {
        let broker = Broker::bind("127.0.0.1:0").unwrap();
        let addr = broker.local_addr().to_string();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = broker.spawn(Arc::clone(&shutdown)).unwrap();

        let mut subscriber = BusSubscriber::connect(&addr, &[EVENTS_CHANNEL]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));

        let mut publisher = BusPublisher::connect(&addr).unwrap();
        publisher.publish_raw("other-channel", b"{}").unwrap();
        publisher.publish(EVENTS_CHANNEL, &motion("camera-02", 1.0)).unwrap();

        // Only the events-channel message arrives.
        let envelope = subscriber.recv().unwrap();
        assert_eq!(envelope.channel, EVENTS_CHANNEL);

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
