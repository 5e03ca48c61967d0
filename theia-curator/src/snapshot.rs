//! On-demand grid snapshots for diagnostics.
//!
//! Connecting to the snapshot port returns one binary PGM image of the
//! current grid and closes the connection. Read-only; no side effects.

use crate::error::Result;
use std::io::Write;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use theia_core::grid::{AttentionGrid, SharedGrid};

/// Encode the grid as a binary PGM (P5) image.
pub fn encode_pgm(grid: &AttentionGrid) -> Vec<u8> {
    let (width, height, pixels) = grid.to_grayscale();

    let mut out = Vec::with_capacity(32 + pixels.len());
    out.extend_from_slice(format!("P5\n{} {}\n255\n", width, height).as_bytes());

    // Grid row 0 is the bottom of world space; PGM rows go top-down.
    for row in (0..height).rev() {
        out.extend_from_slice(&pixels[row * width..(row + 1) * width]);
    }
    out
}

/// Snapshot server owning its listener thread.
pub struct SnapshotServer {
    local_addr: SocketAddr,
    thread: Option<JoinHandle<()>>,
}

impl SnapshotServer {
    /// Bind the snapshot socket and start serving.
    pub fn start(bind_address: &str, grid: SharedGrid, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let thread = thread::Builder::new()
            .name("snapshot".to_string())
            .spawn(move || {
                serve_loop(listener, grid, shutdown);
            })?;

        Ok(Self {
            local_addr,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve_loop(listener: TcpListener, grid: SharedGrid, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                tracing::debug!("Snapshot requested by {}", addr);
                let image = encode_pgm(&grid.lock());
                if let Err(e) = stream.write_all(&image) {
                    tracing::debug!("Snapshot write to {} failed: {}", addr, e);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                tracing::error!("Snapshot accept error: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theia_core::geom::Vec2;
    use theia_core::grid::GridConfig;

    #[test]
    fn pgm_has_header_and_one_byte_per_cell() {
        let mut grid = AttentionGrid::new(&GridConfig {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 4.0,
            max_y: 4.0,
            width: 4,
            height: 4,
        });
        grid.deposit(Vec2::new(0.0, 3.5), Vec2::new(4.0, 3.5), 1.0);

        let image = encode_pgm(&grid);
        assert!(image.starts_with(b"P5\n4 4\n255\n"));
        assert_eq!(image.len(), b"P5\n4 4\n255\n".len() + 16);

        // The deposit row is at the top of world space, so it is the first
        // pixel row of the image.
        let pixels = &image[b"P5\n4 4\n255\n".len()..];
        assert!(pixels[..4].iter().all(|&p| p > 0));
        assert!(pixels[12..].iter().all(|&p| p == 0));
    }
}
