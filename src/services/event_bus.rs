//! Internal event/audit bus.
//!
//! Every admission, retry-round transition, recovery selection, gate
//! verdict, and governance round emits a [`KernelEvent`] with a monotonic
//! [`SequenceNumber`] over a broadcast channel, mirrored into a bounded ring
//! buffer. This is the live tap other in-process observers (tests, the
//! controller's tab-delimited append log) subscribe to; the session archive
//! (C9) is what persists the same decisions durably.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by `EventBus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Event category for filtering and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Queue,
    Decomposition,
    Scheduler,
    Execution,
    Retry,
    Recovery,
    Gate,
    Governance,
    Archive,
    Controller,
}

/// Kernel decision-point payloads. One variant per
/// component's key decision, carrying the structured fields a test or a
/// log consumer would assert on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum KernelEvent {
    GoalAdmitted { source_index: usize, scheduling_weight: u32, used_slots: u32 },
    GoalStarvationTick { source_index: usize, wait_ticks: u64 },
    GoalCompleted { source_index: usize, status: String },
    RetryRoundStarted { round: u32, goals_in: u32 },
    RetryRoundFinished { round: u32, adaptive_backpressure_applied: bool },
    RecoverySelected { signature: String, action_label: String, source: String },
    RecoveryUpdated { signature: String, succeeded: bool },
    GateEvaluated { profile: String, passed: bool, source: String },
    GovernanceRoundCompleted { round: u32, stop_reason: Option<String> },
    SessionArchived { kind: String, file: String },
    ControllerCycleCompleted { cycle: u32, processed_goals: u32 },
}

/// Unified event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub category: EventCategory,
    pub correlation_id: Option<Uuid>,
    pub payload: KernelEvent,
}

/// Build a `UnifiedEvent`; the sequence number is assigned by the bus on
/// publish, so it is always set to 0 here.
pub fn make_event(
    severity: EventSeverity,
    category: EventCategory,
    correlation_id: Option<Uuid>,
    payload: KernelEvent,
) -> UnifiedEvent {
    UnifiedEvent {
        id: EventId::new(),
        sequence: SequenceNumber(0),
        timestamp: Utc::now(),
        severity,
        category,
        correlation_id,
        payload,
    }
}

/// Configuration for the `EventBus`.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
    /// Number of recent events retained in the in-memory ring buffer.
    pub ring_buffer_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024, ring_buffer_capacity: 512 }
    }
}

/// Central event bus for broadcasting kernel decisions to observers, with a
/// bounded ring buffer so late subscribers (and the test harness) can
/// inspect recent history without a subscription active at publish time.
pub struct EventBus {
    sender: broadcast::Sender<UnifiedEvent>,
    sequence: AtomicU64,
    ring_buffer: Arc<RwLock<VecDeque<UnifiedEvent>>>,
    config: EventBusConfig,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
            ring_buffer: Arc::new(RwLock::new(VecDeque::with_capacity(config.ring_buffer_capacity))),
            config,
        }
    }

    /// Publish an event, assigning its sequence number and mirroring it into
    /// the ring buffer before broadcasting.
    pub async fn publish(&self, mut event: UnifiedEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        event.sequence = SequenceNumber(seq);

        {
            let mut buffer = self.ring_buffer.write().await;
            if buffer.len() >= self.config.ring_buffer_capacity {
                buffer.pop_front();
            }
            buffer.push_back(event.clone());
        }

        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnifiedEvent> {
        self.sender.subscribe()
    }

    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub async fn recent(&self) -> Vec<UnifiedEvent> {
        self.ring_buffer.read().await.iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}
