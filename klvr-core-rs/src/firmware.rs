//! Firmware update orchestrator
//!
//! Tracks a pending image per board and applies it only after a simulated
//! reboot completes:
//!
//! ```text
//! Idle ──upload──► PendingApply ──reboot──► Rebooting ──(delay)──► Idle
//! ```
//!
//! Both boards share one update session. The device's `current_version`
//! moves to the session `target_version` once neither board holds a pending
//! image and both have received an image since the session opened. That
//! closes the session; the next upload opens a new one.
//!
//! Reboot completions run as spawned tasks, one handle stored per board.
//! Completions for different boards never wait on each other; every state
//! change happens under one short lock that is never held across an await.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result};
use crate::types::{Board, DeviceStatus};
use crate::version::{VersionSources, FALLBACK_VERSION};

/// Timing of the simulated transfer and reboot
#[derive(Debug, Clone, Copy)]
pub struct FirmwareTiming {
    /// Delay between a reboot command and the board coming back
    pub reboot_delay: Duration,
    /// Simulated transfer time of an upload
    pub upload_latency: Duration,
}

impl Default for FirmwareTiming {
    fn default() -> Self {
        Self {
            reboot_delay: Duration::from_secs(2),
            upload_latency: Duration::from_secs(1),
        }
    }
}

/// Per-board update state
#[derive(Debug, Clone, Default)]
struct BoardState {
    pending_image_size: usize,
    pending_version: Option<String>,
    is_rebooting: bool,
    /// Received an image in the open session
    in_session: bool,
    images_received: u32,
    last_upload_at: Option<DateTime<Utc>>,
}

impl BoardState {
    fn has_pending(&self) -> bool {
        self.pending_image_size > 0 || self.pending_version.is_some()
    }

    fn clear_pending(&mut self) {
        self.pending_image_size = 0;
        self.pending_version = None;
    }
}

#[derive(Debug, Default)]
struct BoardSlot {
    state: BoardState,
    reboot: Option<JoinHandle<()>>,
}

/// Session shared by both boards
#[derive(Debug)]
struct Session {
    current_version: String,
    target_version: Option<String>,
}

#[derive(Debug)]
struct Inner {
    session: Session,
    main: BoardSlot,
    rear: BoardSlot,
}

impl Inner {
    fn board(&self, board: Board) -> &BoardSlot {
        match board {
            Board::Main => &self.main,
            Board::Rear => &self.rear,
        }
    }

    fn board_mut(&mut self, board: Board) -> &mut BoardSlot {
        match board {
            Board::Main => &mut self.main,
            Board::Rear => &mut self.rear,
        }
    }

    /// Both boards applied the image they received this session
    fn converged(&self) -> bool {
        Board::ALL.iter().all(|&b| {
            let state = &self.board(b).state;
            !state.has_pending() && state.in_session
        })
    }

    fn close_session(&mut self) {
        for board in Board::ALL {
            self.board_mut(board).state.in_session = false;
        }
    }

    /// Deferred half of a reboot: apply the image, maybe converge, come back up
    fn complete_reboot(&mut self, board: Board) {
        let slot = self.board_mut(board);
        if slot.state.has_pending() {
            info!(
                "{} board applied firmware {} ({} bytes)",
                board,
                slot.state.pending_version.as_deref().unwrap_or(FALLBACK_VERSION),
                slot.state.pending_image_size
            );
            slot.state.clear_pending();
        }

        if self.converged() {
            let version = self
                .session
                .target_version
                .clone()
                .unwrap_or_else(|| FALLBACK_VERSION.to_string());
            if version != self.session.current_version {
                info!(
                    "Firmware converged: {} -> {}",
                    self.session.current_version, version
                );
            }
            self.session.current_version = version;
            self.close_session();
        }

        let slot = self.board_mut(board);
        slot.state.is_rebooting = false;
        slot.reboot = None;
        info!("{} board reboot complete", board);
    }
}

/// Result of a recorded upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub board: Board,
    pub size: usize,
    pub version: String,
    pub target_version: String,
}

/// Read-only view of one board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub pending_image_size: usize,
    pub pending_version: Option<String>,
    pub is_rebooting: bool,
    pub images_received: u32,
    pub last_upload_at: Option<DateTime<Utc>>,
}

/// Read-only view of the whole orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareSnapshot {
    pub current_version: String,
    pub target_version: Option<String>,
    pub main: BoardSnapshot,
    pub rear: BoardSnapshot,
    pub status: DeviceStatus,
}

impl FirmwareSnapshot {
    pub fn board(&self, board: Board) -> &BoardSnapshot {
        match board {
            Board::Main => &self.main,
            Board::Rear => &self.rear,
        }
    }
}

/// Two-board firmware orchestrator
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct Firmware {
    inner: Arc<Mutex<Inner>>,
    timing: FirmwareTiming,
}

impl Firmware {
    pub fn new(current_version: impl Into<String>, timing: FirmwareTiming) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                session: Session {
                    current_version: current_version.into(),
                    target_version: None,
                },
                main: BoardSlot::default(),
                rear: BoardSlot::default(),
            })),
            timing,
        }
    }

    pub fn timing(&self) -> FirmwareTiming {
        self.timing
    }

    /// Receive an image for `board`
    ///
    /// Waits out the simulated transfer first, holding no lock, so other
    /// boards and status reads proceed meanwhile. A second upload before the
    /// reboot simply replaces the pending image.
    pub async fn upload(
        &self,
        board: Board,
        image: &[u8],
        sources: VersionSources<'_>,
    ) -> Result<UploadReceipt> {
        if image.is_empty() {
            return Err(DeviceError::MalformedRequest(format!(
                "empty firmware image for {} board",
                board
            )));
        }

        debug!("Receiving {} bytes for {} board", image.len(), board);
        if !self.timing.upload_latency.is_zero() {
            tokio::time::sleep(self.timing.upload_latency).await;
        }

        let mut inner = self.inner.lock();
        let target = match board {
            Board::Main => None,
            Board::Rear => inner.session.target_version.clone(),
        };
        let version = sources.resolve(target.as_deref()).to_string();

        let slot = inner.board_mut(board);
        slot.state.pending_image_size = image.len();
        slot.state.pending_version = Some(version.clone());
        slot.state.in_session = true;
        slot.state.images_received += 1;
        slot.state.last_upload_at = Some(Utc::now());
        if slot.state.is_rebooting {
            warn!(
                "{} board received firmware while rebooting; it applies when the reboot completes",
                board
            );
        }

        let target_version = inner
            .session
            .target_version
            .get_or_insert_with(|| version.clone())
            .clone();

        info!(
            "{} board firmware {} received ({} bytes), target {}",
            board,
            version,
            image.len(),
            target_version
        );

        Ok(UploadReceipt {
            board,
            size: image.len(),
            version,
            target_version,
        })
    }

    /// Start a simulated reboot of `board` and return immediately
    ///
    /// The completion runs after the reboot delay and always runs once
    /// scheduled. A board that is still rebooting rejects a new reboot.
    /// Must be called from within a tokio runtime.
    pub fn reboot(&self, board: Board) -> Result<()> {
        let mut inner = self.inner.lock();
        let slot = inner.board_mut(board);
        if slot.state.is_rebooting {
            return Err(DeviceError::AlreadyRebooting(board));
        }
        slot.state.is_rebooting = true;

        let shared = Arc::clone(&self.inner);
        let delay = self.timing.reboot_delay;
        slot.reboot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.lock().complete_reboot(board);
        }));

        info!("{} board rebooting, back in {:?}", board, delay);
        Ok(())
    }

    /// Wait for every scheduled reboot to finish
    pub async fn wait_for_reboots(&self) {
        let handles: Vec<_> = {
            let mut inner = self.inner.lock();
            Board::ALL
                .iter()
                .filter_map(|&b| inner.board_mut(b).reboot.take())
                .collect()
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Reboot task failed: {}", e);
            }
        }
    }

    pub fn current_version(&self) -> String {
        self.inner.lock().session.current_version.clone()
    }

    pub fn target_version(&self) -> Option<String> {
        self.inner.lock().session.target_version.clone()
    }

    pub fn is_rebooting(&self, board: Board) -> bool {
        self.inner.lock().board(board).state.is_rebooting
    }

    /// Status label derived from both boards' reboot flags
    pub fn status(&self) -> DeviceStatus {
        let inner = self.inner.lock();
        DeviceStatus::from_flags(
            inner.main.state.is_rebooting,
            inner.rear.state.is_rebooting,
        )
    }

    pub fn snapshot(&self) -> FirmwareSnapshot {
        let inner = self.inner.lock();
        let board = |b: Board| {
            let s = &inner.board(b).state;
            BoardSnapshot {
                pending_image_size: s.pending_image_size,
                pending_version: s.pending_version.clone(),
                is_rebooting: s.is_rebooting,
                images_received: s.images_received,
                last_upload_at: s.last_upload_at,
            }
        };

        FirmwareSnapshot {
            current_version: inner.session.current_version.clone(),
            target_version: inner.session.target_version.clone(),
            main: board(Board::Main),
            rear: board(Board::Rear),
            status: DeviceStatus::from_flags(
                inner.main.state.is_rebooting,
                inner.rear.state.is_rebooting,
            ),
        }
    }

    /// Debug override of the reported version
    pub fn set_current_version(&self, version: impl Into<String>) {
        let version = version.into();
        info!("Current firmware version overridden to {}", version);
        self.inner.lock().session.current_version = version;
    }

    /// Debug override of the session target
    pub fn set_target_version(&self, version: impl Into<String>) {
        let version = version.into();
        info!("Target firmware version overridden to {}", version);
        self.inner.lock().session.target_version = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firmware() -> Firmware {
        Firmware::new("0.1.0", FirmwareTiming::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_board_update_scenario() {
        let fw = firmware();

        let receipt = fw
            .upload(Board::Main, &[0u8; 1024], VersionSources::new(Some("2.0.0"), None))
            .await
            .unwrap();
        assert_eq!(receipt.version, "2.0.0");
        assert_eq!(fw.target_version().as_deref(), Some("2.0.0"));

        // Rear inherits the session target
        let receipt = fw
            .upload(Board::Rear, &[0u8; 512], VersionSources::default())
            .await
            .unwrap();
        assert_eq!(receipt.version, "2.0.0");

        fw.reboot(Board::Main).unwrap();
        assert_eq!(fw.status(), DeviceStatus::RebootingMain);
        fw.wait_for_reboots().await;

        // Only main applied so far
        assert_eq!(fw.current_version(), "0.1.0");
        assert_eq!(fw.status(), DeviceStatus::Ready);

        fw.reboot(Board::Rear).unwrap();
        fw.wait_for_reboots().await;
        assert_eq!(fw.current_version(), "2.0.0");

        let snap = fw.snapshot();
        assert_eq!(snap.main.pending_image_size, 0);
        assert_eq!(snap.rear.pending_version, None);
        assert_eq!(snap.main.images_received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_main_only_keeps_version() {
        let fw = firmware();
        fw.upload(Board::Main, b"image", VersionSources::new(Some("3.0.0"), None))
            .await
            .unwrap();
        fw.reboot(Board::Main).unwrap();
        fw.wait_for_reboots().await;

        assert_eq!(fw.current_version(), "0.1.0");
        assert_eq!(fw.snapshot().main.pending_image_size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_main_ignores_session_target() {
        let fw = firmware();
        fw.set_target_version("9.9.9");

        let receipt = fw
            .upload(Board::Main, b"image", VersionSources::default())
            .await
            .unwrap();
        assert_eq!(receipt.version, FALLBACK_VERSION);

        let receipt = fw
            .upload(Board::Rear, b"image", VersionSources::new(None, Some("4.2.0")))
            .await
            .unwrap();
        assert_eq!(receipt.version, "4.2.0");
        assert_eq!(receipt.target_version, "9.9.9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reboots_are_independent() {
        let fw = firmware();
        fw.upload(Board::Main, &[1u8; 100], VersionSources::new(Some("2.0.0"), None))
            .await
            .unwrap();
        fw.upload(Board::Rear, &[1u8; 200], VersionSources::new(Some("2.0.0"), None))
            .await
            .unwrap();

        fw.reboot(Board::Main).unwrap();
        fw.reboot(Board::Rear).unwrap();
        assert_eq!(fw.status(), DeviceStatus::RebootingBoth);

        // New upload to main mid-reboot is applied by main's completion only
        fw.upload(Board::Main, &[2u8; 300], VersionSources::new(Some("2.0.0"), None))
            .await
            .unwrap();
        assert_eq!(fw.snapshot().rear.pending_image_size, 200);

        fw.wait_for_reboots().await;
        let snap = fw.snapshot();
        assert_eq!(snap.main.pending_image_size, 0);
        assert_eq!(snap.rear.pending_image_size, 0);
        assert_eq!(snap.current_version, "2.0.0");
        assert_eq!(snap.status, DeviceStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reboot_while_rebooting_rejected() {
        let fw = firmware();
        fw.reboot(Board::Rear).unwrap();
        assert_eq!(
            fw.reboot(Board::Rear),
            Err(DeviceError::AlreadyRebooting(Board::Rear))
        );
        // The other board is unaffected
        fw.reboot(Board::Main).unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fw.status(), DeviceStatus::Ready);
        fw.reboot(Board::Rear).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reboot_without_images_keeps_version() {
        let fw = firmware();
        fw.set_target_version("5.0.0");
        fw.reboot(Board::Main).unwrap();
        fw.reboot(Board::Rear).unwrap();
        fw.wait_for_reboots().await;

        assert_eq!(fw.current_version(), "0.1.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_image_rejected() {
        let fw = firmware();
        let err = fw
            .upload(Board::Main, &[], VersionSources::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_request");
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_latency_does_not_block_reads() {
        let fw = firmware();
        let uploader = fw.clone();
        let task = tokio::spawn(async move {
            uploader
                .upload(Board::Main, b"slow", VersionSources::default())
                .await
        });

        tokio::task::yield_now().await;
        // Transfer still in flight; state readable and unchanged
        assert_eq!(fw.snapshot().main.images_received, 0);

        task.await.unwrap().unwrap();
        assert_eq!(fw.snapshot().main.images_received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_cycle_needs_both_boards() {
        let fw = firmware();
        for board in Board::ALL {
            fw.upload(board, b"image", VersionSources::new(Some("2.0.0"), None))
                .await
                .unwrap();
            fw.reboot(board).unwrap();
        }
        fw.wait_for_reboots().await;
        assert_eq!(fw.current_version(), "2.0.0");

        fw.set_target_version("3.0.0");
        fw.upload(Board::Main, b"image", VersionSources::new(Some("3.0.0"), None))
            .await
            .unwrap();
        fw.reboot(Board::Main).unwrap();
        fw.wait_for_reboots().await;
        assert_eq!(fw.current_version(), "2.0.0");

        fw.upload(Board::Rear, b"image", VersionSources::default())
            .await
            .unwrap();
        fw.reboot(Board::Rear).unwrap();
        fw.wait_for_reboots().await;
        assert_eq!(fw.current_version(), "3.0.0");
        assert_eq!(fw.snapshot().main.images_received, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_override_survives_imageless_reboot() {
        let fw = firmware();
        for board in Board::ALL {
            fw.upload(board, b"image", VersionSources::new(Some("2.0.0"), None))
                .await
                .unwrap();
            fw.reboot(board).unwrap();
        }
        fw.wait_for_reboots().await;
        assert_eq!(fw.current_version(), "2.0.0");

        fw.set_current_version("7.0.0");
        fw.reboot(Board::Main).unwrap();
        fw.wait_for_reboots().await;
        assert_eq!(fw.current_version(), "7.0.0");
    }

    #[test]
    fn test_debug_overrides() {
        let fw = firmware();
        fw.set_current_version("7.0.0");
        fw.set_target_version("8.0.0");

        let snap = fw.snapshot();
        assert_eq!(snap.current_version, "7.0.0");
        assert_eq!(snap.target_version.as_deref(), Some("8.0.0"));
    }
}
